//! Self-testing: recording results per class, and the signed certificates students show at the
//! door.

use crate::{
    logic::{access::Actor, ApiError, Context},
    schema::{Testing, TestingResult, User},
};
use chrono::NaiveDate;
use failure::Fallible;
use log::info;
use serde_derive::Serialize;

/// A student of a class, with their result on a day.
#[derive(Clone, Debug, Serialize)]
pub struct TestingEntry {
    /// The student's ID.
    pub user_id: i32,

    /// The student's name.
    pub name: String,

    /// The ID of the day's record, if there is one.
    pub testing_id: Option<i32>,

    /// The day's result, if there is one.
    pub result: Option<TestingResult>,
}

/// Everything a self-testing certificate shows.
#[derive(Clone, Debug, Serialize)]
pub struct TestingCertificate {
    /// The school's name.
    pub school_name: String,

    /// The tested student.
    pub student: User,

    /// The record being certified.
    pub testing: Testing,

    /// The signed token that proves the result.
    pub token: String,

    /// The last day the certificate holds.
    pub valid_until: NaiveDate,
}

/// A result token that checked out.
#[derive(Clone, Debug, Serialize)]
pub struct VerifiedTesting {
    /// The student's ID.
    pub user_id: i32,

    /// The student's name.
    pub name: String,

    /// The certified result.
    pub result: TestingResult,

    /// The day of the test.
    pub date: NaiveDate,
}

/// Lists the students of a class with their results on a day.
pub async fn class_testing(
    ctx: &Context,
    actor: &Actor,
    class: i32,
    date: NaiveDate,
) -> Fallible<Vec<TestingEntry>> {
    let class = ctx.db.get_class(class).await?.ok_or_else(|| actor.missing())?;
    if !actor.can_test_class(&class) {
        return Err(ApiError::Forbidden.into());
    }

    let results = ctx.db.get_testing_for_class(class.id, date).await?;
    let mut entries = Vec::new();
    for student in ctx.db.get_class_students(class.id).await? {
        let name = ctx
            .db
            .get_user(student)
            .await?
            .map(|user| user.name)
            .unwrap_or_default();
        let testing = results.iter().find(|testing| testing.user_id == student);
        entries.push(TestingEntry {
            user_id: student,
            name,
            testing_id: testing.map(|testing| testing.id),
            result: testing.map(|testing| testing.result),
        });
    }
    Ok(entries)
}

/// Records a student's result on a day.
pub async fn set_result(
    ctx: &Context,
    actor: &Actor,
    class: i32,
    student: i32,
    date: NaiveDate,
    result: TestingResult,
) -> Fallible<Testing> {
    let class = ctx.db.get_class(class).await?.ok_or_else(|| actor.missing())?;
    if !actor.can_test_class(&class) {
        return Err(ApiError::Forbidden.into());
    }
    if !ctx.db.get_class_students(class.id).await?.contains(&student) {
        return Err(ApiError::BadRequest("user isn't in this class".to_string()).into());
    }
    let testing = ctx
        .db
        .set_testing(student, actor.id, class.id, date, result)
        .await?;
    info!(
        "User {} recorded {} for {} on {}",
        actor.id, result, student, date
    );
    Ok(testing)
}

/// Issues a certificate for a student's result on a day. Since anyone who gets this far may see
/// the student, a missing result is reported as such.
pub async fn certificate(
    ctx: &Context,
    actor: &Actor,
    student: i32,
    date: NaiveDate,
) -> Fallible<TestingCertificate> {
    if !actor.can_see_testing_of(student) {
        return Err(ApiError::Forbidden.into());
    }
    let user = ctx
        .db
        .get_user(student)
        .await?
        .ok_or_else(|| actor.missing())?;
    let testing = ctx
        .db
        .get_testing(student, date)
        .await?
        .ok_or(ApiError::NotFound)?;
    let (token, valid_until) =
        ctx.tokens
            .issue_testing(student, testing.result, testing.id, testing.date)?;
    Ok(TestingCertificate {
        school_name: ctx.config.school_name.clone(),
        student: user,
        testing,
        token,
        valid_until,
    })
}

/// Checks a result token. The result must still be on record, unchanged.
pub async fn verify(ctx: &Context, token: &str) -> Fallible<VerifiedTesting> {
    let claims = ctx.tokens.validate_testing(token)?;
    let testing = ctx
        .db
        .get_testing_record(claims.test_id)
        .await?
        .ok_or(ApiError::Forbidden)?;
    if testing.user_id != claims.user_id || testing.result != claims.result {
        return Err(ApiError::Forbidden.into());
    }
    let user = ctx
        .db
        .get_user(claims.user_id)
        .await?
        .ok_or(ApiError::Forbidden)?;
    Ok(VerifiedTesting {
        user_id: user.id,
        name: user.name,
        result: testing.result,
        date: testing.date,
    })
}
