//! Users, their records, and the links between parents and children.

use crate::{
    logic::{
        access::{reportable_absences, Actor},
        ApiError, Context,
    },
    schema::{Absence, Class, Grade, Role, User},
};
use chrono::{Datelike, NaiveDate};
use failure::Fallible;
use log::info;
use serde_derive::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The changes to a user's profile. Absent fields are left alone.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct UserPatch {
    /// A new email address.
    pub email: Option<String>,

    /// A new display name.
    pub name: Option<String>,

    /// A new birth certificate number.
    pub birth_certificate_number: Option<String>,

    /// A new date of birth.
    pub birthday: Option<NaiveDate>,

    /// A new city of birth.
    pub city_of_birth: Option<String>,

    /// A new country of birth.
    pub country_of_birth: Option<String>,

    /// Whether the student is passing the year.
    pub is_passing: Option<bool>,
}

/// A student's grades in one subject.
#[derive(Clone, Debug, Serialize)]
pub struct SubjectGrades {
    /// The subject's ID.
    pub subject_id: i32,

    /// The subject's name.
    pub subject_name: String,

    /// Every grade, in the order given.
    pub grades: Vec<Grade>,

    /// The average of the grades that aren't final, if there are any.
    pub average: Option<f64>,

    /// The final grade, once it's been given.
    pub final_grade: Option<i32>,
}

/// An absence, with the names of everyone and everything it refers to.
#[derive(Clone, Debug, Serialize)]
pub struct AbsenceEntry {
    /// The absence itself.
    #[serde(flatten)]
    pub absence: Absence,

    /// The absent student's name.
    pub user_name: String,

    /// The name of the teacher who recorded the absence.
    pub teacher_name: String,

    /// The name of the meeting that was missed.
    pub meeting_name: String,
}

/// Everything a certificate of schooling shows.
#[derive(Clone, Debug, Serialize)]
pub struct SchoolingCertificate {
    /// The school's name.
    pub school_name: String,

    /// The student it's issued for.
    pub student: User,

    /// The student's class.
    pub class: Class,

    /// The principal who signs it.
    pub principal: User,

    /// The day it's issued.
    pub issued: NaiveDate,
}

/// Loads every class if the actor's permission checks depend on them.
pub(crate) async fn classes_for(
    ctx: &Context,
    actor: &Actor,
) -> Fallible<Vec<(Class, BTreeSet<i32>)>> {
    if actor.needs_classes_for_records() {
        ctx.db.get_classes().await
    } else {
        Ok(Vec::new())
    }
}

fn redact(actor: &Actor, mut user: User) -> User {
    if !actor.can_see_birth_certificates() {
        user.birth_certificate_number = String::new();
    }
    user
}

/// Gets a user's profile. Students always get their own, whichever ID they ask for.
pub async fn get_user_data(ctx: &Context, actor: &Actor, id: i32) -> Fallible<User> {
    let id = match actor.role {
        Role::Student => actor.id,
        _ => id,
    };
    let user = ctx.db.get_user(id).await?.ok_or_else(|| actor.missing())?;
    let classes = classes_for(ctx, actor).await?;
    if !actor.can_see_user(&user, &classes) {
        return Err(ApiError::Forbidden.into());
    }
    Ok(redact(actor, user))
}

/// Changes a user's profile.
pub async fn patch_user(ctx: &Context, actor: &Actor, id: i32, patch: UserPatch) -> Fallible<User> {
    actor.require_admin_tier()?;
    let mut user = ctx.db.get_user(id).await?.ok_or(ApiError::NotFound)?;

    if let Some(email) = patch.email {
        if email.trim().is_empty() {
            return Err(ApiError::BadRequest("email is empty".to_string()).into());
        }
        if email != user.email && ctx.db.get_user_by_email(email.clone()).await?.is_some() {
            return Err(ApiError::Duplicate("Email is already taken".to_string()).into());
        }
        user.email = email;
    }
    if let Some(name) = patch.name {
        user.name = name;
    }
    if let Some(number) = patch.birth_certificate_number {
        user.birth_certificate_number = number;
    }
    if patch.birthday.is_some() {
        user.birthday = patch.birthday;
    }
    if let Some(city) = patch.city_of_birth {
        user.city_of_birth = city;
    }
    if let Some(country) = patch.country_of_birth {
        user.country_of_birth = country;
    }
    if let Some(is_passing) = patch.is_passing {
        user.is_passing = is_passing;
    }

    ctx.db.update_user(user.clone()).await?;
    Ok(redact(actor, user))
}

/// Lists users, optionally only those with one role.
pub async fn list_users(ctx: &Context, actor: &Actor, role: Option<Role>) -> Fallible<Vec<User>> {
    actor.require_admin_tier()?;
    let users = match role {
        Some(role) => ctx.db.get_users_with_role(role).await?,
        None => ctx.db.get_users().await?,
    };
    Ok(users.into_iter().map(|user| redact(actor, user)).collect())
}

/// Changes a user's role.
pub async fn change_role(ctx: &Context, actor: &Actor, id: i32, role: Role) -> Fallible<()> {
    actor.require_admin_tier()?;
    if !actor.can_grant(role) {
        return Err(ApiError::Forbidden.into());
    }
    let user = ctx.db.get_user(id).await?.ok_or(ApiError::NotFound)?;
    if user.role == Role::Admin && actor.role != Role::Admin {
        return Err(ApiError::Forbidden.into());
    }
    if !ctx.db.set_role(id, role).await? {
        return Err(ApiError::NotFound.into());
    }
    info!("User {} made {} a(n) {}", actor.id, id, role);
    Ok(())
}

/// Deletes a user and everything recorded about them.
pub async fn delete_user(ctx: &Context, actor: &Actor, id: i32) -> Fallible<()> {
    actor.require_admin_tier()?;
    let user = ctx.db.get_user(id).await?.ok_or(ApiError::NotFound)?;
    if user.role == Role::Admin && actor.role != Role::Admin {
        return Err(ApiError::Forbidden.into());
    }
    ctx.db.delete_user(id).await?;
    info!("User {} deleted {} ({})", actor.id, user.email, id);
    Ok(())
}

/// Whether the actor is the teacher of some class.
pub async fn has_class(ctx: &Context, actor: &Actor) -> Fallible<bool> {
    match actor.role {
        Role::Teacher | Role::Admin | Role::Principal | Role::PrincipalAssistant => {}
        Role::Parent | Role::Student | Role::SchoolPsychologist | Role::Unverified => {
            return Err(ApiError::Forbidden.into())
        }
    }
    let classes = ctx.db.get_classes().await?;
    Ok(classes.iter().any(|(class, _)| class.teacher == actor.id))
}

/// Whether today is the actor's birthday.
pub async fn has_birthday(ctx: &Context, actor: &Actor, today: NaiveDate) -> Fallible<bool> {
    let user = ctx.db.get_user(actor.id).await?.ok_or(ApiError::Forbidden)?;
    let birthday = user
        .birthday
        .ok_or_else(|| ApiError::BadRequest("birthday isn't set".to_string()))?;
    if birthday > today {
        return Err(ApiError::Conflict("Invalid birthday".to_string()).into());
    }
    Ok(birthday.month() == today.month() && birthday.day() == today.day())
}

/// Fails unless the actor may see this kind of record (absences or grades) of the student. The
/// check comes before the existence check, so a missing student looks the same as a forbidden
/// one to everybody outside the administration.
async fn check_records(
    ctx: &Context,
    actor: &Actor,
    student: i32,
    parents_allowed: bool,
) -> Fallible<()> {
    let classes = classes_for(ctx, actor).await?;
    if !actor.can_see_records_of(student, &classes, parents_allowed) {
        return Err(ApiError::Forbidden.into());
    }
    if ctx.db.get_user(student).await?.is_none() {
        return Err(actor.missing().into());
    }
    Ok(())
}

/// Lists a student's absences. Only actual absences (absent or late) are listed.
pub async fn absences_of(
    ctx: &Context,
    actor: &Actor,
    student: i32,
) -> Fallible<Vec<AbsenceEntry>> {
    check_records(ctx, actor, student, ctx.config.parent_view_absences).await?;
    let absences = reportable_absences(ctx.db.get_absences_for_user(student).await?);

    let mut names = BTreeMap::<i32, String>::new();
    let mut entries = Vec::with_capacity(absences.len());
    for absence in absences {
        let user_name = name_of(ctx, &mut names, absence.user_id).await?;
        let teacher_name = name_of(ctx, &mut names, absence.teacher_id).await?;
        let meeting_name = ctx
            .db
            .get_meeting(absence.meeting_id)
            .await?
            .map(|meeting| meeting.meeting_name)
            .unwrap_or_default();
        entries.push(AbsenceEntry {
            absence,
            user_name,
            teacher_name,
            meeting_name,
        });
    }
    Ok(entries)
}

/// Looks up a user's name, remembering the ones already looked up. A deleted user has no name.
async fn name_of(ctx: &Context, names: &mut BTreeMap<i32, String>, id: i32) -> Fallible<String> {
    if let Some(name) = names.get(&id) {
        return Ok(name.clone());
    }
    let name = ctx
        .db
        .get_user(id)
        .await?
        .map(|user| user.name)
        .unwrap_or_default();
    let _ = names.insert(id, name.clone());
    Ok(name)
}

/// Lists a student's grades, grouped by subject.
pub async fn grades_of(
    ctx: &Context,
    actor: &Actor,
    student: i32,
) -> Fallible<Vec<SubjectGrades>> {
    check_records(ctx, actor, student, ctx.config.parent_view_grades).await?;

    let mut by_subject = BTreeMap::<i32, Vec<Grade>>::new();
    for grade in ctx.db.get_grades_for_user(student).await? {
        by_subject.entry(grade.subject_id).or_default().push(grade);
    }

    let mut out = Vec::with_capacity(by_subject.len());
    for (subject_id, grades) in by_subject {
        let subject_name = ctx
            .db
            .get_subject(subject_id)
            .await?
            .map(|subject| subject.long_name)
            .unwrap_or_default();
        out.push(summarize_grades(subject_id, subject_name, grades));
    }
    Ok(out)
}

fn summarize_grades(subject_id: i32, subject_name: String, grades: Vec<Grade>) -> SubjectGrades {
    let running = grades
        .iter()
        .filter(|grade| !grade.is_final)
        .map(|grade| grade.grade)
        .collect::<Vec<_>>();
    let average = if running.is_empty() {
        None
    } else {
        Some(f64::from(running.iter().sum::<i32>()) / running.len() as f64)
    };
    let final_grade = grades
        .iter()
        .rev()
        .find(|grade| grade.is_final)
        .map(|grade| grade.grade);
    SubjectGrades {
        subject_id,
        subject_name,
        grades,
        average,
        final_grade,
    }
}

/// Gathers what's needed to issue a certificate of schooling for a student.
pub async fn certificate_of_schooling(
    ctx: &Context,
    actor: &Actor,
    id: i32,
    today: NaiveDate,
) -> Fallible<SchoolingCertificate> {
    if !actor.can_issue_certificates() {
        return Err(ApiError::Forbidden.into());
    }
    let student = ctx.db.get_user(id).await?.ok_or_else(|| actor.missing())?;
    if student.role != Role::Student {
        return Err(ApiError::BadRequest("user isn't a student".to_string()).into());
    }
    let class = ctx
        .db
        .get_classes()
        .await?
        .into_iter()
        .find(|(_, students)| students.contains(&id))
        .map(|(class, _)| class)
        .ok_or_else(|| ApiError::Conflict("Student isn't enrolled in a class".to_string()))?;
    let principal = ctx
        .db
        .get_principal()
        .await?
        .ok_or_else(|| ApiError::Conflict("The school has no principal".to_string()))?;

    info!("User {} issued a certificate of schooling for {}", actor.id, id);
    Ok(SchoolingCertificate {
        school_name: ctx.config.school_name.clone(),
        student,
        class,
        principal,
        issued: today,
    })
}

/// Links a child to a parent.
pub async fn link_child(ctx: &Context, actor: &Actor, parent: i32, child: i32) -> Fallible<()> {
    if !actor.can_manage_memberships() {
        return Err(ApiError::Forbidden.into());
    }
    let parent_user = ctx.db.get_user(parent).await?.ok_or(ApiError::NotFound)?;
    if parent_user.role != Role::Parent {
        return Err(ApiError::BadRequest("user isn't a parent".to_string()).into());
    }
    if ctx.db.get_user(child).await?.is_none() {
        return Err(ApiError::NotFound.into());
    }
    if !ctx.db.add_child(parent, child).await? {
        return Err(ApiError::Conflict("Child is already linked to this parent".to_string()).into());
    }
    Ok(())
}

/// Unlinks a child from a parent. Unlinking a child that isn't linked does nothing.
pub async fn unlink_child(ctx: &Context, actor: &Actor, parent: i32, child: i32) -> Fallible<()> {
    if !actor.can_manage_memberships() {
        return Err(ApiError::Forbidden.into());
    }
    if ctx.db.get_user(parent).await?.is_none() {
        return Err(ApiError::NotFound.into());
    }
    ctx.db.remove_child(parent, child).await
}

/// Lists the actor's children.
pub async fn children_of(ctx: &Context, actor: &Actor) -> Fallible<Vec<User>> {
    if actor.role != Role::Parent {
        return Err(ApiError::Forbidden.into());
    }
    let mut children = Vec::with_capacity(actor.children.len());
    for &child in &actor.children {
        if let Some(user) = ctx.db.get_user(child).await? {
            children.push(redact(actor, user));
        }
    }
    Ok(children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        logic::test_util::{actor, context, register_as},
        schema::AbsenceType,
    };
    use std::sync::Arc;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn api_err<T: std::fmt::Debug>(r: Fallible<T>) -> ApiError {
        r.unwrap_err().downcast::<ApiError>().unwrap()
    }

    /// One class taught by T1 with student S, and a meeting where S was absent, late and present
    /// in turn.
    struct School {
        ctx: Context,
        admin: i32,
        t1: i32,
        t2: i32,
        s: i32,
    }

    async fn school() -> School {
        let ctx = context();
        let admin = register_as(&ctx, "admin@school.si", Role::Admin).await;
        let t1 = register_as(&ctx, "t1@school.si", Role::Teacher).await;
        let t2 = register_as(&ctx, "t2@school.si", Role::Teacher).await;
        let s = register_as(&ctx, "s@school.si", Role::Student).await;

        let class = ctx
            .db
            .create_class("1.a".to_string(), t1, "2021/2022".to_string())
            .await
            .unwrap();
        assert!(ctx.db.add_class_student(class, s).await.unwrap());
        let subject = ctx
            .db
            .create_subject(t1, "MAT".to_string(), "Mathematics".to_string(), Some(class))
            .await
            .unwrap();

        for (hour, absence_type) in [AbsenceType::Absent, AbsenceType::Late, AbsenceType::Present]
            .iter()
            .enumerate()
        {
            let meeting = ctx
                .db
                .create_meeting(crate::schema::Meeting {
                    id: 0,
                    meeting_name: "Lesson".to_string(),
                    teacher_id: t1,
                    subject_id: subject,
                    date: day(2021, 10, 4),
                    hour: hour as i32,
                    is_mandatory: true,
                    url: String::new(),
                    details: String::new(),
                    is_substitution: false,
                    is_grading: false,
                    is_written_assessment: false,
                    is_test: false,
                })
                .await
                .unwrap();
            let _ = ctx
                .db
                .set_absence(meeting, s, t1, *absence_type, false)
                .await
                .unwrap();
        }

        School {
            ctx,
            admin,
            t1,
            t2,
            s,
        }
    }

    #[tokio::test]
    async fn teachers_see_absences_only_of_their_own_students() {
        let School { ctx, t1, t2, s, .. } = school().await;

        let other = actor(&ctx, t2, Role::Teacher).await;
        assert_eq!(api_err(absences_of(&ctx, &other, s).await), ApiError::Forbidden);

        let owner = actor(&ctx, t1, Role::Teacher).await;
        let absences = absences_of(&ctx, &owner, s).await.unwrap();
        let types = absences
            .iter()
            .map(|entry| entry.absence.absence_type)
            .collect::<Vec<_>>();
        assert_eq!(types, vec![AbsenceType::Absent, AbsenceType::Late]);
        for entry in &absences {
            assert_eq!(entry.user_name, "s");
            assert_eq!(entry.teacher_name, "t1");
            assert_eq!(entry.meeting_name, "Lesson");
        }
    }

    #[tokio::test]
    async fn students_see_only_their_own_absences() {
        let School { ctx, s, .. } = school().await;
        let other = register_as(&ctx, "s2@school.si", Role::Student).await;

        let me = actor(&ctx, s, Role::Student).await;
        assert_eq!(absences_of(&ctx, &me, s).await.unwrap().len(), 2);

        let them = actor(&ctx, other, Role::Student).await;
        assert_eq!(api_err(absences_of(&ctx, &them, s).await), ApiError::Forbidden);
    }

    #[tokio::test]
    async fn parents_see_absences_only_when_enabled() {
        let School { mut ctx, s, .. } = school().await;
        let parent = register_as(&ctx, "p@school.si", Role::Parent).await;
        assert!(ctx.db.add_child(parent, s).await.unwrap());
        let me = actor(&ctx, parent, Role::Parent).await;

        assert_eq!(api_err(absences_of(&ctx, &me, s).await), ApiError::Forbidden);

        ctx.config = Arc::new(crate::logic::Config {
            parent_view_absences: true,
            ..Default::default()
        });
        assert_eq!(absences_of(&ctx, &me, s).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn missing_students_are_only_reported_to_the_administration() {
        let School { ctx, admin, .. } = school().await;
        let psychologist = register_as(&ctx, "psy@school.si", Role::SchoolPsychologist).await;

        let me = actor(&ctx, admin, Role::Admin).await;
        assert_eq!(api_err(absences_of(&ctx, &me, 999).await), ApiError::NotFound);

        let me = actor(&ctx, psychologist, Role::SchoolPsychologist).await;
        assert_eq!(api_err(absences_of(&ctx, &me, 999).await), ApiError::Forbidden);
    }

    #[tokio::test]
    async fn students_always_get_their_own_data() {
        let School { ctx, s, t1, .. } = school().await;
        let me = actor(&ctx, s, Role::Student).await;
        let user = get_user_data(&ctx, &me, t1).await.unwrap();
        assert_eq!(user.id, s);
    }

    #[tokio::test]
    async fn only_admins_see_birth_certificate_numbers() {
        let School { ctx, admin, t1, s, .. } = school().await;
        let patch = UserPatch {
            birth_certificate_number: Some("123-456".to_string()),
            ..UserPatch::default()
        };
        let me = actor(&ctx, admin, Role::Admin).await;
        let patched = patch_user(&ctx, &me, s, patch).await.unwrap();
        assert_eq!(patched.birth_certificate_number, "123-456");

        let teacher = actor(&ctx, t1, Role::Teacher).await;
        let seen = get_user_data(&ctx, &teacher, s).await.unwrap();
        assert_eq!(seen.birth_certificate_number, "");
    }

    #[tokio::test]
    async fn birthdays_are_checked_against_today() {
        let School { ctx, admin, s, .. } = school().await;
        let me = actor(&ctx, s, Role::Student).await;
        assert_eq!(
            api_err(has_birthday(&ctx, &me, day(2021, 10, 4)).await),
            ApiError::BadRequest("birthday isn't set".to_string())
        );

        let patch = UserPatch {
            birthday: Some(day(2008, 10, 4)),
            ..UserPatch::default()
        };
        let admin = actor(&ctx, admin, Role::Admin).await;
        let _ = patch_user(&ctx, &admin, s, patch).await.unwrap();

        assert!(has_birthday(&ctx, &me, day(2021, 10, 4)).await.unwrap());
        assert!(!has_birthday(&ctx, &me, day(2021, 10, 5)).await.unwrap());
        assert_eq!(
            api_err(has_birthday(&ctx, &me, day(2005, 1, 1)).await),
            ApiError::Conflict("Invalid birthday".to_string())
        );
    }

    #[tokio::test]
    async fn principals_cannot_appoint_admins() {
        let School { ctx, t1, .. } = school().await;
        let principal = register_as(&ctx, "boss@school.si", Role::Principal).await;
        let me = actor(&ctx, principal, Role::Principal).await;
        assert_eq!(
            api_err(change_role(&ctx, &me, t1, Role::Admin).await),
            ApiError::Forbidden
        );
        change_role(&ctx, &me, t1, Role::PrincipalAssistant)
            .await
            .unwrap();
        assert_eq!(
            ctx.db.get_user(t1).await.unwrap().unwrap().role,
            Role::PrincipalAssistant
        );
    }

    #[tokio::test]
    async fn only_admins_change_an_admins_role() {
        let School { ctx, admin, .. } = school().await;
        let principal = register_as(&ctx, "boss@school.si", Role::Principal).await;
        let me = actor(&ctx, principal, Role::Principal).await;
        assert_eq!(
            api_err(change_role(&ctx, &me, admin, Role::Student).await),
            ApiError::Forbidden
        );
        assert_eq!(ctx.db.get_user(admin).await.unwrap().unwrap().role, Role::Admin);

        let assistant = register_as(&ctx, "help@school.si", Role::PrincipalAssistant).await;
        let me = actor(&ctx, assistant, Role::PrincipalAssistant).await;
        assert_eq!(
            api_err(change_role(&ctx, &me, admin, Role::Teacher).await),
            ApiError::Forbidden
        );

        let other = register_as(&ctx, "admin2@school.si", Role::Admin).await;
        let me = actor(&ctx, admin, Role::Admin).await;
        change_role(&ctx, &me, other, Role::Teacher).await.unwrap();
        assert_eq!(ctx.db.get_user(other).await.unwrap().unwrap().role, Role::Teacher);
    }

    #[tokio::test]
    async fn certificates_need_a_class_and_a_principal() {
        let School { ctx, admin, s, .. } = school().await;
        let me = actor(&ctx, admin, Role::Admin).await;
        assert_eq!(
            api_err(certificate_of_schooling(&ctx, &me, s, day(2021, 10, 4)).await),
            ApiError::Conflict("The school has no principal".to_string())
        );

        let principal = register_as(&ctx, "boss@school.si", Role::Principal).await;
        let certificate = certificate_of_schooling(&ctx, &me, s, day(2021, 10, 4))
            .await
            .unwrap();
        assert_eq!(certificate.student.id, s);
        assert_eq!(certificate.class.name, "1.a");
        assert_eq!(certificate.principal.id, principal);
        assert_eq!(certificate.school_name, "Test School");
    }

    #[tokio::test]
    async fn children_are_linked_once() {
        let School { ctx, admin, s, .. } = school().await;
        let parent = register_as(&ctx, "p@school.si", Role::Parent).await;
        let me = actor(&ctx, admin, Role::Admin).await;

        link_child(&ctx, &me, parent, s).await.unwrap();
        assert_eq!(
            api_err(link_child(&ctx, &me, parent, s).await),
            ApiError::Conflict("Child is already linked to this parent".to_string())
        );
        assert_eq!(
            api_err(link_child(&ctx, &me, s, parent).await),
            ApiError::BadRequest("user isn't a parent".to_string())
        );

        let parent_actor = actor(&ctx, parent, Role::Parent).await;
        let children = children_of(&ctx, &parent_actor).await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, s);

        unlink_child(&ctx, &me, parent, s).await.unwrap();
        unlink_child(&ctx, &me, parent, s).await.unwrap();
        assert!(ctx.db.get_children(parent).await.unwrap().is_empty());
    }

    #[test]
    fn final_grades_are_kept_out_of_the_average() {
        let grade = |id, grade, is_final| Grade {
            id,
            user_id: 1,
            teacher_id: 2,
            subject_id: 3,
            grade,
            is_written: false,
            period: 1,
            is_final,
            date: day(2021, 10, 4),
        };
        let summary = summarize_grades(
            3,
            "Mathematics".to_string(),
            vec![grade(1, 5, false), grade(2, 4, false), grade(3, 3, true)],
        );
        assert_eq!(summary.average, Some(4.5));
        assert_eq!(summary.final_grade, Some(3));

        let empty = summarize_grades(3, "Mathematics".to_string(), Vec::new());
        assert_eq!(empty.average, None);
        assert_eq!(empty.final_grade, None);
    }
}
