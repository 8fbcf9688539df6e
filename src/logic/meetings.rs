//! Meetings (single lessons), the timetable, and attendance.

use crate::{
    logic::{access::Actor, require, ApiError, Context},
    schema::{Absence, AbsenceType, Meeting, Subject},
};
use chrono::NaiveDate;
use failure::Fallible;
use log::info;
use serde_derive::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The longest timetable range that can be asked for, in days.
const MAX_TIMETABLE_DAYS: i64 = 366;

/// The fields of a meeting that can be set when creating or changing it.
#[derive(Clone, Debug, Deserialize)]
pub struct MeetingForm {
    /// A display name.
    pub meeting_name: String,

    /// The subject the meeting belongs to.
    pub subject_id: i32,

    /// The day of the meeting.
    pub date: NaiveDate,

    /// The school hour of the meeting.
    pub hour: i32,

    /// The teacher holding the meeting, if it's not the subject's own teacher.
    #[serde(default)]
    pub teacher_id: Option<i32>,

    /// Whether attendance is mandatory.
    #[serde(default)]
    pub is_mandatory: bool,

    /// A link for online meetings.
    #[serde(default)]
    pub url: String,

    /// Free-form details.
    #[serde(default)]
    pub details: String,

    /// Whether grades are given.
    #[serde(default)]
    pub is_grading: bool,

    /// Whether it's a written assessment.
    #[serde(default)]
    pub is_written_assessment: bool,

    /// Whether it's a test.
    #[serde(default)]
    pub is_test: bool,
}

impl MeetingForm {
    fn check(&self) -> Result<(), ApiError> {
        require("meeting_name", &self.meeting_name)?;
        if self.hour < 0 {
            return Err(ApiError::BadRequest("hour is negative".to_string()));
        }
        Ok(())
    }

    fn into_meeting(self, id: i32, subject: &Subject) -> Meeting {
        let teacher_id = self.teacher_id.unwrap_or(subject.teacher_id);
        Meeting {
            id,
            meeting_name: self.meeting_name,
            teacher_id,
            subject_id: subject.id,
            date: self.date,
            hour: self.hour,
            is_mandatory: self.is_mandatory,
            url: self.url,
            details: self.details,
            is_substitution: teacher_id != subject.teacher_id,
            is_grading: self.is_grading,
            is_written_assessment: self.is_written_assessment,
            is_test: self.is_test,
        }
    }
}

/// A student on a meeting's roster, with what was recorded for them.
#[derive(Clone, Debug, Serialize)]
pub struct RosterEntry {
    /// The student's ID.
    pub user_id: i32,

    /// The student's name.
    pub name: String,

    /// The ID of the recorded absence, if any.
    pub absence_id: Option<i32>,

    /// What was recorded. `PRESENT` when nothing was.
    pub absence_type: AbsenceType,

    /// Whether the absence is excused.
    pub is_excused: bool,
}

/// Gets a meeting along with its subject and the subject's students, if the actor may see it.
pub(crate) async fn visible_meeting(
    ctx: &Context,
    actor: &Actor,
    id: i32,
) -> Fallible<(Meeting, Subject, BTreeSet<i32>)> {
    let meeting = ctx.db.get_meeting(id).await?.ok_or_else(|| actor.missing())?;
    let (subject, students) = ctx
        .db
        .get_subject_with_students(meeting.subject_id)
        .await?
        .ok_or_else(|| actor.missing())?;
    if !actor.can_see_meeting(&meeting, &subject, &students) {
        return Err(ApiError::Forbidden.into());
    }
    Ok((meeting, subject, students))
}

/// Gets a meeting the actor holds.
pub(crate) async fn held_meeting(
    ctx: &Context,
    actor: &Actor,
    id: i32,
) -> Fallible<(Meeting, Subject, BTreeSet<i32>)> {
    let (meeting, subject, students) = visible_meeting(ctx, actor, id).await?;
    if !actor.can_hold(&meeting, &subject) {
        return Err(ApiError::Forbidden.into());
    }
    Ok((meeting, subject, students))
}

/// Gets a meeting of a subject the actor teaches.
pub(crate) async fn taught_meeting(
    ctx: &Context,
    actor: &Actor,
    id: i32,
) -> Fallible<(Meeting, Subject, BTreeSet<i32>)> {
    let (meeting, subject, students) = visible_meeting(ctx, actor, id).await?;
    if !actor.can_teach(&subject) {
        return Err(ApiError::Forbidden.into());
    }
    Ok((meeting, subject, students))
}

/// Lists the meetings the actor may see between two days, inclusive.
pub async fn timetable(
    ctx: &Context,
    actor: &Actor,
    start: NaiveDate,
    end: NaiveDate,
) -> Fallible<Vec<Meeting>> {
    if end < start {
        return Err(ApiError::BadRequest("end is before start".to_string()).into());
    }
    if (end - start).num_days() > MAX_TIMETABLE_DAYS {
        return Err(ApiError::BadRequest("the range is too long".to_string()).into());
    }

    let subjects = ctx
        .db
        .get_subjects()
        .await?
        .into_iter()
        .map(|(subject, students)| (subject.id, (subject, students)))
        .collect::<BTreeMap<_, _>>();
    let meetings = ctx.db.get_meetings_between(start, end).await?;
    Ok(meetings
        .into_iter()
        .filter(|meeting| match subjects.get(&meeting.subject_id) {
            Some((subject, students)) => actor.can_see_meeting(meeting, subject, students),
            None => false,
        })
        .collect())
}

/// Creates a meeting, returning its ID.
pub async fn create_meeting(ctx: &Context, actor: &Actor, form: MeetingForm) -> Fallible<i32> {
    form.check()?;
    let subject = ctx
        .db
        .get_subject(form.subject_id)
        .await?
        .ok_or_else(|| actor.missing())?;
    if !actor.can_teach(&subject) {
        return Err(ApiError::Forbidden.into());
    }
    let id = ctx.db.create_meeting(form.into_meeting(0, &subject)).await?;
    info!("User {} created meeting {} in subject {}", actor.id, id, subject.id);
    Ok(id)
}

/// Gets a meeting.
pub async fn get_meeting(ctx: &Context, actor: &Actor, id: i32) -> Fallible<Meeting> {
    let (meeting, _, _) = visible_meeting(ctx, actor, id).await?;
    Ok(meeting)
}

/// Changes a meeting. A meeting can't be moved to another subject.
pub async fn update_meeting(
    ctx: &Context,
    actor: &Actor,
    id: i32,
    form: MeetingForm,
) -> Fallible<Meeting> {
    form.check()?;
    let (_, subject, _) = taught_meeting(ctx, actor, id).await?;
    if form.subject_id != subject.id {
        return Err(ApiError::BadRequest("subject_id can't be changed".to_string()).into());
    }
    let meeting = form.into_meeting(id, &subject);
    ctx.db.update_meeting(meeting.clone()).await?;
    Ok(meeting)
}

/// Deletes a meeting, along with the absences and homework recorded at it.
pub async fn delete_meeting(ctx: &Context, actor: &Actor, id: i32) -> Fallible<()> {
    let _ = taught_meeting(ctx, actor, id).await?;
    ctx.db.delete_meeting(id).await?;
    info!("User {} deleted meeting {}", actor.id, id);
    Ok(())
}

/// Lists the students of a meeting, with the attendance recorded for each.
pub async fn meeting_absences(
    ctx: &Context,
    actor: &Actor,
    id: i32,
) -> Fallible<Vec<RosterEntry>> {
    let (_, _, students) = held_meeting(ctx, actor, id).await?;
    let mut recorded = ctx
        .db
        .get_absences_for_meeting(id)
        .await?
        .into_iter()
        .map(|absence| (absence.user_id, absence))
        .collect::<BTreeMap<_, _>>();

    let mut roster = Vec::with_capacity(students.len());
    for student in students {
        let name = ctx
            .db
            .get_user(student)
            .await?
            .map(|user| user.name)
            .unwrap_or_default();
        roster.push(match recorded.remove(&student) {
            Some(absence) => RosterEntry {
                user_id: student,
                name,
                absence_id: Some(absence.id),
                absence_type: absence.absence_type,
                is_excused: absence.is_excused,
            },
            None => RosterEntry {
                user_id: student,
                name,
                absence_id: None,
                absence_type: AbsenceType::Unknown,
                is_excused: false,
            },
        });
    }
    Ok(roster)
}

/// Records a student's attendance at a meeting.
pub async fn set_absence(
    ctx: &Context,
    actor: &Actor,
    meeting: i32,
    user: i32,
    absence_type: AbsenceType,
    is_excused: bool,
) -> Fallible<Absence> {
    let (_, _, students) = held_meeting(ctx, actor, meeting).await?;
    if !students.contains(&user) {
        return Err(ApiError::BadRequest("user isn't on this meeting's roster".to_string()).into());
    }
    ctx.db
        .set_absence(meeting, user, actor.id, absence_type, is_excused)
        .await
}
