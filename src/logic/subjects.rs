//! Subjects, and who takes them.

use crate::{
    logic::{access::Actor, classes::require_teacher, require, ApiError, Context},
    schema::Subject,
};
use failure::Fallible;
use log::info;
use serde_derive::Serialize;
use std::collections::BTreeSet;

/// A subject along with its students. The students are only listed for those who teach it.
#[derive(Clone, Debug, Serialize)]
pub struct SubjectDetails {
    /// The subject itself.
    #[serde(flatten)]
    pub subject: Subject,

    /// The subject's students, for those who teach it.
    pub students: Option<BTreeSet<i32>>,
}

/// Gets a subject and its current students, if the actor may see it.
pub(crate) async fn visible_subject(
    ctx: &Context,
    actor: &Actor,
    id: i32,
) -> Fallible<(Subject, BTreeSet<i32>)> {
    let (subject, students) = ctx
        .db
        .get_subject_with_students(id)
        .await?
        .ok_or_else(|| actor.missing())?;
    if !actor.can_see_subject(&subject, &students) {
        return Err(ApiError::Forbidden.into());
    }
    Ok((subject, students))
}

/// Creates a subject, returning its ID. A subject created for a class takes its students from
/// that class.
pub async fn create_subject(
    ctx: &Context,
    actor: &Actor,
    teacher: i32,
    name: String,
    long_name: String,
    class: Option<i32>,
) -> Fallible<i32> {
    actor.require_admin_tier()?;
    require("name", &name)?;
    require_teacher(ctx, teacher).await?;
    if let Some(class) = class {
        if ctx.db.get_class(class).await?.is_none() {
            return Err(ApiError::BadRequest("class_id doesn't name a class".to_string()).into());
        }
    }
    let id = ctx
        .db
        .create_subject(teacher, name, long_name, class)
        .await?;
    info!("User {} created subject {}", actor.id, id);
    Ok(id)
}

/// Lists the subjects the actor may see.
pub async fn list_subjects(ctx: &Context, actor: &Actor) -> Fallible<Vec<Subject>> {
    let subjects = ctx.db.get_subjects().await?;
    Ok(subjects
        .into_iter()
        .filter(|(subject, students)| actor.can_see_subject(subject, students))
        .map(|(subject, _)| subject)
        .collect())
}

/// Gets a subject.
pub async fn get_subject(ctx: &Context, actor: &Actor, id: i32) -> Fallible<SubjectDetails> {
    let (subject, students) = visible_subject(ctx, actor, id).await?;
    let students = if actor.can_teach(&subject) {
        Some(students)
    } else {
        None
    };
    Ok(SubjectDetails { subject, students })
}

/// Loads a subject whose own roster is about to change.
async fn own_roster_subject(ctx: &Context, actor: &Actor, id: i32) -> Fallible<Subject> {
    if !actor.can_manage_memberships() {
        return Err(ApiError::Forbidden.into());
    }
    let subject = ctx.db.get_subject(id).await?.ok_or(ApiError::NotFound)?;
    if subject.inherits_class {
        return Err(
            ApiError::Conflict("This subject takes its students from a class".to_string()).into(),
        );
    }
    Ok(subject)
}

/// Adds a student to a subject. Adding a student that already takes it is a conflict.
pub async fn add_student(ctx: &Context, actor: &Actor, subject: i32, user: i32) -> Fallible<()> {
    let _ = own_roster_subject(ctx, actor, subject).await?;
    if ctx.db.get_user(user).await?.is_none() {
        return Err(ApiError::NotFound.into());
    }
    if !ctx.db.add_subject_student(subject, user).await? {
        return Err(ApiError::Conflict("User is already in this subject".to_string()).into());
    }
    Ok(())
}

/// Removes a student from a subject. Removing a student that doesn't take it does nothing.
pub async fn remove_student(
    ctx: &Context,
    actor: &Actor,
    subject: i32,
    user: i32,
) -> Fallible<()> {
    let _ = own_roster_subject(ctx, actor, subject).await?;
    ctx.db.remove_subject_student(subject, user).await
}

/// Deletes a subject, with its meetings.
pub async fn delete_subject(ctx: &Context, actor: &Actor, id: i32) -> Fallible<()> {
    actor.require_admin_tier()?;
    if ctx.db.get_subject(id).await?.is_none() {
        return Err(ApiError::NotFound.into());
    }
    ctx.db.delete_subject(id).await?;
    info!("User {} deleted subject {}", actor.id, id);
    Ok(())
}
