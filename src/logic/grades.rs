//! Grades.

use crate::{
    logic::{access::Actor, meetings::taught_meeting, ApiError, Context},
    schema::{Grade, Subject},
};
use failure::Fallible;
use log::info;
use serde_derive::Deserialize;

/// A new grade, given at a meeting.
#[derive(Clone, Debug, Deserialize)]
pub struct GradeForm {
    /// The graded student.
    pub user_id: i32,

    /// From 1 to 5.
    pub grade: i32,

    /// Whether it's for a written assessment.
    #[serde(default)]
    pub is_written: bool,

    /// The grading period, 1 or 2.
    pub period: i32,

    /// Whether it's the final grade for the subject.
    #[serde(default)]
    pub is_final: bool,
}

/// The changes to a grade. Absent fields are left alone.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct GradePatch {
    /// A new grade, from 1 to 5.
    pub grade: Option<i32>,

    /// Whether it's for a written assessment.
    pub is_written: Option<bool>,

    /// A new grading period.
    pub period: Option<i32>,

    /// Whether it's the final grade.
    pub is_final: Option<bool>,
}

fn check_grade(grade: i32, period: i32) -> Result<(), ApiError> {
    if grade < 1 || grade > 5 {
        return Err(ApiError::BadRequest("grade must be between 1 and 5".to_string()));
    }
    if period != 1 && period != 2 {
        return Err(ApiError::BadRequest("period must be 1 or 2".to_string()));
    }
    Ok(())
}

/// Lists the grades given in the subject of a meeting.
pub async fn meeting_grades(ctx: &Context, actor: &Actor, meeting: i32) -> Fallible<Vec<Grade>> {
    let (_, subject, _) = taught_meeting(ctx, actor, meeting).await?;
    ctx.db.get_grades_for_subject(subject.id).await
}

/// Gives a grade to a student at a meeting, returning the grade's ID.
pub async fn create_grade(
    ctx: &Context,
    actor: &Actor,
    meeting: i32,
    form: GradeForm,
) -> Fallible<i32> {
    let (meeting, subject, students) = taught_meeting(ctx, actor, meeting).await?;
    check_grade(form.grade, form.period)?;
    if !students.contains(&form.user_id) {
        return Err(ApiError::BadRequest("user doesn't take this subject".to_string()).into());
    }
    let id = ctx
        .db
        .create_grade(Grade {
            id: 0,
            user_id: form.user_id,
            teacher_id: actor.id,
            subject_id: subject.id,
            grade: form.grade,
            is_written: form.is_written,
            period: form.period,
            is_final: form.is_final,
            date: meeting.date,
        })
        .await?;
    info!(
        "User {} graded {} with {} in subject {}",
        actor.id, form.user_id, form.grade, subject.id
    );
    Ok(id)
}

/// Gets a grade and its subject, if the actor may change it.
async fn changeable_grade(ctx: &Context, actor: &Actor, id: i32) -> Fallible<(Grade, Subject)> {
    let grade = ctx.db.get_grade(id).await?.ok_or_else(|| actor.missing())?;
    let subject = ctx
        .db
        .get_subject(grade.subject_id)
        .await?
        .ok_or_else(|| actor.missing())?;
    if !actor.can_change_grade(&grade, &subject) {
        return Err(ApiError::Forbidden.into());
    }
    Ok((grade, subject))
}

/// Changes a grade.
pub async fn update_grade(
    ctx: &Context,
    actor: &Actor,
    id: i32,
    patch: GradePatch,
) -> Fallible<Grade> {
    let (mut grade, _) = changeable_grade(ctx, actor, id).await?;
    grade.grade = patch.grade.unwrap_or(grade.grade);
    grade.is_written = patch.is_written.unwrap_or(grade.is_written);
    grade.period = patch.period.unwrap_or(grade.period);
    grade.is_final = patch.is_final.unwrap_or(grade.is_final);
    check_grade(grade.grade, grade.period)?;
    ctx.db.update_grade(grade.clone()).await?;
    Ok(grade)
}

/// Deletes a grade.
pub async fn delete_grade(ctx: &Context, actor: &Actor, id: i32) -> Fallible<()> {
    let _ = changeable_grade(ctx, actor, id).await?;
    ctx.db.delete_grade(id).await?;
    info!("User {} deleted grade {}", actor.id, id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        logic::{
            meetings::{create_meeting, MeetingForm},
            test_util::{actor, context, register_as},
        },
        schema::Role,
    };
    use chrono::NaiveDate;

    fn api_err<T: std::fmt::Debug>(r: Fallible<T>) -> ApiError {
        r.unwrap_err().downcast::<ApiError>().unwrap()
    }

    fn form(user_id: i32, grade: i32) -> GradeForm {
        GradeForm {
            user_id,
            grade,
            is_written: false,
            period: 1,
            is_final: false,
        }
    }

    async fn setup() -> (Context, Actor, Actor, i32, i32, i32) {
        let ctx = context();
        let _ = register_as(&ctx, "admin@school.si", Role::Admin).await;
        let t1 = register_as(&ctx, "t1@school.si", Role::Teacher).await;
        let t2 = register_as(&ctx, "t2@school.si", Role::Teacher).await;
        let s1 = register_as(&ctx, "s1@school.si", Role::Student).await;
        let s2 = register_as(&ctx, "s2@school.si", Role::Student).await;
        let subject = ctx
            .db
            .create_subject(t1, "MAT".to_string(), "Mathematics".to_string(), None)
            .await
            .unwrap();
        assert!(ctx.db.add_subject_student(subject, s1).await.unwrap());

        let t1 = actor(&ctx, t1, Role::Teacher).await;
        let t2 = actor(&ctx, t2, Role::Teacher).await;
        let meeting = create_meeting(
            &ctx,
            &t1,
            MeetingForm {
                meeting_name: "Test".to_string(),
                subject_id: subject,
                date: NaiveDate::from_ymd_opt(2021, 10, 4).unwrap(),
                hour: 1,
                teacher_id: None,
                is_mandatory: true,
                url: String::new(),
                details: String::new(),
                is_grading: true,
                is_written_assessment: false,
                is_test: false,
            },
        )
        .await
        .unwrap();
        (ctx, t1, t2, meeting, s1, s2)
    }

    #[tokio::test]
    async fn grades_are_given_to_members_only() {
        let (ctx, t1, _, meeting, s1, s2) = setup().await;
        let id = create_grade(&ctx, &t1, meeting, form(s1, 4)).await.unwrap();
        let grade = ctx.db.get_grade(id).await.unwrap().unwrap();
        assert_eq!(grade.teacher_id, t1.id);
        assert_eq!(grade.date, NaiveDate::from_ymd_opt(2021, 10, 4).unwrap());

        assert_eq!(
            api_err(create_grade(&ctx, &t1, meeting, form(s2, 4)).await),
            ApiError::BadRequest("user doesn't take this subject".to_string())
        );
        assert_eq!(
            api_err(create_grade(&ctx, &t1, meeting, form(s1, 6)).await),
            ApiError::BadRequest("grade must be between 1 and 5".to_string())
        );
        assert_eq!(meeting_grades(&ctx, &t1, meeting).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn other_teachers_cannot_touch_grades() {
        let (ctx, t1, t2, meeting, s1, _) = setup().await;
        let id = create_grade(&ctx, &t1, meeting, form(s1, 2)).await.unwrap();

        assert_eq!(api_err(meeting_grades(&ctx, &t2, meeting).await), ApiError::Forbidden);
        assert_eq!(
            api_err(update_grade(&ctx, &t2, id, GradePatch::default()).await),
            ApiError::Forbidden
        );
        assert_eq!(api_err(delete_grade(&ctx, &t2, id).await), ApiError::Forbidden);

        let patch = GradePatch {
            grade: Some(3),
            is_final: Some(true),
            ..GradePatch::default()
        };
        let grade = update_grade(&ctx, &t1, id, patch).await.unwrap();
        assert_eq!(grade.grade, 3);
        assert!(grade.is_final);

        delete_grade(&ctx, &t1, id).await.unwrap();
        assert!(ctx.db.get_grade(id).await.unwrap().is_none());
    }
}
