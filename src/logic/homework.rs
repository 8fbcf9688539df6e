//! Homework, and each student's progress on it.

use crate::{
    logic::{
        access::Actor, meetings::held_meeting, require, subjects::visible_subject, ApiError,
        Context,
    },
    schema::{Homework, HomeworkStatus},
};
use chrono::NaiveDate;
use failure::Fallible;
use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A new piece of homework.
#[derive(Clone, Debug, Deserialize)]
pub struct HomeworkForm {
    /// A short title.
    pub name: String,

    /// What is to be done.
    #[serde(default)]
    pub description: String,

    /// The day it's due.
    pub to_date: NaiveDate,
}

/// A piece of homework with the statuses the actor may see.
#[derive(Clone, Debug, Serialize)]
pub struct HomeworkEntry {
    /// The homework itself.
    #[serde(flatten)]
    pub homework: Homework,

    /// Each visible student's progress, by student ID.
    pub statuses: BTreeMap<i32, HomeworkStatus>,
}

/// Gives homework at a meeting, returning its ID. It's given on the day of the meeting.
pub async fn create_homework(
    ctx: &Context,
    actor: &Actor,
    meeting: i32,
    form: HomeworkForm,
) -> Fallible<i32> {
    let (meeting, subject, _) = held_meeting(ctx, actor, meeting).await?;
    require("name", &form.name)?;
    if form.to_date < meeting.date {
        return Err(ApiError::BadRequest("to_date is before the meeting".to_string()).into());
    }
    ctx.db
        .create_homework(Homework {
            id: 0,
            teacher_id: actor.id,
            subject_id: subject.id,
            meeting_id: meeting.id,
            name: form.name,
            description: form.description,
            to_date: form.to_date,
            from_date: meeting.date,
        })
        .await
}

/// Lists a subject's homework. Those who teach the subject see every student's status, with
/// unchecked ones as `UNKNOWN`; students and parents see only their own.
pub async fn subject_homework(
    ctx: &Context,
    actor: &Actor,
    subject: i32,
) -> Fallible<Vec<HomeworkEntry>> {
    let (subject, students) = visible_subject(ctx, actor, subject).await?;
    let shown = if actor.can_teach(&subject) {
        students
    } else {
        actor
            .own_students()
            .intersection(&students)
            .cloned()
            .collect()
    };

    let homework = ctx.db.get_homework_for_subject(subject.id).await?;
    Ok(homework
        .into_iter()
        .map(|(homework, recorded)| {
            let statuses = shown
                .iter()
                .map(|&student| {
                    let status = recorded
                        .get(&student)
                        .cloned()
                        .unwrap_or(HomeworkStatus::Unknown);
                    (student, status)
                })
                .collect();
            HomeworkEntry { homework, statuses }
        })
        .collect())
}

/// Records a student's progress on a piece of homework.
pub async fn set_status(
    ctx: &Context,
    actor: &Actor,
    homework: i32,
    student: i32,
    status: HomeworkStatus,
) -> Fallible<()> {
    let hw = ctx
        .db
        .get_homework(homework)
        .await?
        .ok_or_else(|| actor.missing())?;
    let (subject, students) = ctx
        .db
        .get_subject_with_students(hw.subject_id)
        .await?
        .ok_or_else(|| actor.missing())?;
    if !actor.can_teach(&subject) {
        return Err(ApiError::Forbidden.into());
    }
    if !students.contains(&student) {
        return Err(ApiError::BadRequest("user doesn't take this subject".to_string()).into());
    }
    ctx.db.set_homework_status(homework, student, status).await
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
    use maplit::btreemap;

    fn api_err<T: std::fmt::Debug>(r: Fallible<T>) -> ApiError {
        r.unwrap_err().downcast::<ApiError>().unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 10, d).unwrap()
    }

    #[tokio::test]
    async fn students_see_only_their_own_status() {
        let ctx = context();
        let _ = register_as(&ctx, "admin@school.si", Role::Admin).await;
        let t = register_as(&ctx, "t@school.si", Role::Teacher).await;
        let s1 = register_as(&ctx, "s1@school.si", Role::Student).await;
        let s2 = register_as(&ctx, "s2@school.si", Role::Student).await;
        let subject = ctx
            .db
            .create_subject(t, "ENG".to_string(), "English".to_string(), None)
            .await
            .unwrap();
        assert!(ctx.db.add_subject_student(subject, s1).await.unwrap());
        assert!(ctx.db.add_subject_student(subject, s2).await.unwrap());

        let teacher = actor(&ctx, t, Role::Teacher).await;
        let meeting = create_meeting(
            &ctx,
            &teacher,
            MeetingForm {
                meeting_name: "Essays".to_string(),
                subject_id: subject,
                date: day(4),
                hour: 1,
                teacher_id: None,
                is_mandatory: true,
                url: String::new(),
                details: String::new(),
                is_grading: false,
                is_written_assessment: false,
                is_test: false,
            },
        )
        .await
        .unwrap();

        let form = HomeworkForm {
            name: "Essay".to_string(),
            description: "300 words".to_string(),
            to_date: day(3),
        };
        assert_eq!(
            api_err(create_homework(&ctx, &teacher, meeting, form.clone()).await),
            ApiError::BadRequest("to_date is before the meeting".to_string())
        );
        let hw = create_homework(
            &ctx,
            &teacher,
            meeting,
            HomeworkForm {
                to_date: day(11),
                ..form
            },
        )
        .await
        .unwrap();

        set_status(&ctx, &teacher, hw, s1, HomeworkStatus::Done)
            .await
            .unwrap();

        let all = subject_homework(&ctx, &teacher, subject).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].homework.from_date, day(4));
        assert_eq!(
            all[0].statuses,
            btreemap! {s1 => HomeworkStatus::Done, s2 => HomeworkStatus::Unknown}
        );

        let student = actor(&ctx, s2, Role::Student).await;
        let mine = subject_homework(&ctx, &student, subject).await.unwrap();
        assert_eq!(mine[0].statuses, btreemap! {s2 => HomeworkStatus::Unknown});

        assert_eq!(
            api_err(set_status(&ctx, &student, hw, s2, HomeworkStatus::Done).await),
            ApiError::Forbidden
        );
    }
}
