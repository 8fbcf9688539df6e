//! Classes and their students.

use crate::{
    logic::{access::Actor, require, ApiError, Context},
    schema::{Class, Role},
};
use failure::Fallible;
use log::info;
use serde_derive::Serialize;

/// A student, as listed in a class.
#[derive(Clone, Debug, Serialize)]
pub struct Member {
    /// The student's ID.
    pub id: i32,

    /// The student's name.
    pub name: String,
}

/// A class with its teacher's name and its students.
#[derive(Clone, Debug, Serialize)]
pub struct ClassDetails {
    /// The class itself.
    #[serde(flatten)]
    pub class: Class,

    /// The name of the class's teacher.
    pub teacher_name: String,

    /// The class's students.
    pub students: Vec<Member>,
}

/// Checks that a user exists and is a teacher.
pub(crate) async fn require_teacher(ctx: &Context, id: i32) -> Fallible<()> {
    match ctx.db.get_user(id).await? {
        Some(ref user) if user.role == Role::Teacher => Ok(()),
        _ => Err(ApiError::BadRequest("teacher_id doesn't name a teacher".to_string()).into()),
    }
}

/// Creates a class, returning its ID.
pub async fn create_class(
    ctx: &Context,
    actor: &Actor,
    name: String,
    teacher: i32,
    class_year: String,
) -> Fallible<i32> {
    actor.require_admin_tier()?;
    require("name", &name)?;
    require_teacher(ctx, teacher).await?;
    let id = ctx.db.create_class(name, teacher, class_year).await?;
    info!("User {} created class {}", actor.id, id);
    Ok(id)
}

/// Lists the classes the actor may see. The administration may pass `of` to list the classes a
/// given user is a student in instead.
///
/// A parent gets one entry per child and class, named after both (`"1.a - Ana"`).
pub async fn list_classes(ctx: &Context, actor: &Actor, of: Option<i32>) -> Fallible<Vec<Class>> {
    let classes = ctx.db.get_classes().await?;
    if let Some(user) = of {
        actor.require_admin_tier()?;
        return Ok(classes
            .into_iter()
            .filter(|(_, students)| students.contains(&user))
            .map(|(class, _)| class)
            .collect());
    }
    if actor.role != Role::Parent {
        return Ok(actor.visible_classes(classes));
    }

    let mut labelled = Vec::new();
    for (class, students) in classes {
        for &child in actor.children.intersection(&students) {
            let child_name = ctx
                .db
                .get_user(child)
                .await?
                .map(|user| user.name)
                .unwrap_or_default();
            labelled.push(Class {
                name: format!("{} - {}", class.name, child_name),
                ..class.clone()
            });
        }
    }
    Ok(labelled)
}

/// Gets a class, with its students.
pub async fn get_class(ctx: &Context, actor: &Actor, id: i32) -> Fallible<ClassDetails> {
    let class = ctx.db.get_class(id).await?.ok_or_else(|| actor.missing())?;
    if !actor.can_inspect_class(&class) {
        return Err(ApiError::Forbidden.into());
    }

    let teacher_name = ctx
        .db
        .get_user(class.teacher)
        .await?
        .map(|user| user.name)
        .unwrap_or_default();
    let mut students = Vec::new();
    for student in ctx.db.get_class_students(id).await? {
        if let Some(user) = ctx.db.get_user(student).await? {
            students.push(Member {
                id: user.id,
                name: user.name,
            });
        }
    }
    Ok(ClassDetails {
        class,
        teacher_name,
        students,
    })
}

/// Adds a student to a class. Adding a student that's already in it is a conflict.
pub async fn add_student(ctx: &Context, actor: &Actor, class: i32, user: i32) -> Fallible<()> {
    if !actor.can_manage_memberships() {
        return Err(ApiError::Forbidden.into());
    }
    if ctx.db.get_class(class).await?.is_none() || ctx.db.get_user(user).await?.is_none() {
        return Err(ApiError::NotFound.into());
    }
    if !ctx.db.add_class_student(class, user).await? {
        return Err(ApiError::Conflict("User is already in this class".to_string()).into());
    }
    Ok(())
}

/// Removes a student from a class. Removing a student that isn't in it does nothing.
pub async fn remove_student(ctx: &Context, actor: &Actor, class: i32, user: i32) -> Fallible<()> {
    if !actor.can_manage_memberships() {
        return Err(ApiError::Forbidden.into());
    }
    if ctx.db.get_class(class).await?.is_none() {
        return Err(ApiError::NotFound.into());
    }
    ctx.db.remove_class_student(class, user).await
}

/// Deletes a class.
pub async fn delete_class(ctx: &Context, actor: &Actor, id: i32) -> Fallible<()> {
    actor.require_admin_tier()?;
    if ctx.db.get_class(id).await?.is_none() {
        return Err(ApiError::NotFound.into());
    }
    ctx.db.delete_class(id).await?;
    info!("User {} deleted class {}", actor.id, id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::test_util::{actor, context, register_as};

    fn api_err<T: std::fmt::Debug>(r: Fallible<T>) -> ApiError {
        r.unwrap_err().downcast::<ApiError>().unwrap()
    }

    #[tokio::test]
    async fn class_listing_follows_the_actor() {
        let ctx = context();
        let admin = register_as(&ctx, "admin@school.si", Role::Admin).await;
        let t1 = register_as(&ctx, "t1@school.si", Role::Teacher).await;
        let t2 = register_as(&ctx, "t2@school.si", Role::Teacher).await;
        let s1 = register_as(&ctx, "s1@school.si", Role::Student).await;
        let s2 = register_as(&ctx, "s2@school.si", Role::Student).await;
        let parent = register_as(&ctx, "p@school.si", Role::Parent).await;
        let psychologist = register_as(&ctx, "psy@school.si", Role::SchoolPsychologist).await;

        let admin = actor(&ctx, admin, Role::Admin).await;
        let a = create_class(&ctx, &admin, "1.a".to_string(), t1, "2021".to_string())
            .await
            .unwrap();
        let b = create_class(&ctx, &admin, "1.b".to_string(), t2, "2021".to_string())
            .await
            .unwrap();
        add_student(&ctx, &admin, a, s1).await.unwrap();
        add_student(&ctx, &admin, b, s2).await.unwrap();
        assert!(ctx.db.add_child(parent, s2).await.unwrap());

        let ids = |classes: Vec<Class>| classes.into_iter().map(|c| c.id).collect::<Vec<_>>();
        assert_eq!(ids(list_classes(&ctx, &admin, None).await.unwrap()), vec![a, b]);

        let teacher = actor(&ctx, t1, Role::Teacher).await;
        assert_eq!(ids(list_classes(&ctx, &teacher, None).await.unwrap()), vec![a]);

        let student = actor(&ctx, s2, Role::Student).await;
        assert_eq!(ids(list_classes(&ctx, &student, None).await.unwrap()), vec![b]);

        let parent = actor(&ctx, parent, Role::Parent).await;
        assert_eq!(ids(list_classes(&ctx, &parent, None).await.unwrap()), vec![b]);

        let psychologist = actor(&ctx, psychologist, Role::SchoolPsychologist).await;
        assert!(list_classes(&ctx, &psychologist, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn the_administration_lists_classes_of_other_users() {
        let ctx = context();
        let admin = register_as(&ctx, "admin@school.si", Role::Admin).await;
        let t = register_as(&ctx, "t@school.si", Role::Teacher).await;
        let s = register_as(&ctx, "s@school.si", Role::Student).await;
        let principal = register_as(&ctx, "principal@school.si", Role::Principal).await;

        let admin = actor(&ctx, admin, Role::Admin).await;
        let a = create_class(&ctx, &admin, "1.a".to_string(), t, "2021".to_string())
            .await
            .unwrap();
        let _ = create_class(&ctx, &admin, "1.b".to_string(), t, "2021".to_string())
            .await
            .unwrap();
        add_student(&ctx, &admin, a, s).await.unwrap();

        let principal = actor(&ctx, principal, Role::Principal).await;
        let classes = list_classes(&ctx, &principal, Some(s)).await.unwrap();
        assert_eq!(classes.into_iter().map(|c| c.id).collect::<Vec<_>>(), vec![a]);
        assert!(list_classes(&ctx, &admin, Some(9999)).await.unwrap().is_empty());

        let teacher = actor(&ctx, t, Role::Teacher).await;
        assert_eq!(
            api_err(list_classes(&ctx, &teacher, Some(s)).await),
            ApiError::Forbidden
        );
        let student = actor(&ctx, s, Role::Student).await;
        assert_eq!(
            api_err(list_classes(&ctx, &student, Some(s)).await),
            ApiError::Forbidden
        );
    }

    #[tokio::test]
    async fn parents_see_a_class_per_child() {
        let ctx = context();
        let admin = register_as(&ctx, "admin@school.si", Role::Admin).await;
        let t = register_as(&ctx, "t@school.si", Role::Teacher).await;
        let ana = register_as(&ctx, "ana@school.si", Role::Student).await;
        let bor = register_as(&ctx, "bor@school.si", Role::Student).await;
        let parent = register_as(&ctx, "p@school.si", Role::Parent).await;

        let admin = actor(&ctx, admin, Role::Admin).await;
        let a = create_class(&ctx, &admin, "1.a".to_string(), t, "2021".to_string())
            .await
            .unwrap();
        let b = create_class(&ctx, &admin, "2.b".to_string(), t, "2021".to_string())
            .await
            .unwrap();
        add_student(&ctx, &admin, a, ana).await.unwrap();
        add_student(&ctx, &admin, a, bor).await.unwrap();
        add_student(&ctx, &admin, b, bor).await.unwrap();
        assert!(ctx.db.add_child(parent, ana).await.unwrap());
        assert!(ctx.db.add_child(parent, bor).await.unwrap());

        let parent = actor(&ctx, parent, Role::Parent).await;
        let classes = list_classes(&ctx, &parent, None).await.unwrap();
        let labels = classes
            .iter()
            .map(|c| (c.id, c.name.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(
            labels,
            vec![(a, "1.a - ana"), (a, "1.a - bor"), (b, "2.b - bor")]
        );
    }

    #[tokio::test]
    async fn duplicate_adds_conflict_and_removals_are_idempotent() {
        let ctx = context();
        let admin = register_as(&ctx, "admin@school.si", Role::Admin).await;
        let t = register_as(&ctx, "t@school.si", Role::Teacher).await;
        let s = register_as(&ctx, "s@school.si", Role::Student).await;
        let admin = actor(&ctx, admin, Role::Admin).await;
        let class = create_class(&ctx, &admin, "2.c".to_string(), t, "2021".to_string())
            .await
            .unwrap();

        add_student(&ctx, &admin, class, s).await.unwrap();
        assert_eq!(
            api_err(add_student(&ctx, &admin, class, s).await),
            ApiError::Conflict("User is already in this class".to_string())
        );
        assert_eq!(ctx.db.get_class_students(class).await.unwrap().len(), 1);

        remove_student(&ctx, &admin, class, s).await.unwrap();
        remove_student(&ctx, &admin, class, s).await.unwrap();
        assert!(ctx.db.get_class_students(class).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn only_the_administration_changes_memberships() {
        let ctx = context();
        let _ = register_as(&ctx, "admin@school.si", Role::Admin).await;
        let t = register_as(&ctx, "t@school.si", Role::Teacher).await;
        let s = register_as(&ctx, "s@school.si", Role::Student).await;
        let class = ctx
            .db
            .create_class("3.a".to_string(), t, "2021".to_string())
            .await
            .unwrap();

        let teacher = actor(&ctx, t, Role::Teacher).await;
        assert_eq!(
            api_err(add_student(&ctx, &teacher, class, s).await),
            ApiError::Forbidden
        );
        assert_eq!(
            api_err(remove_student(&ctx, &teacher, class, s).await),
            ApiError::Forbidden
        );
    }

    #[tokio::test]
    async fn class_details_are_masked_for_outsiders() {
        let ctx = context();
        let admin = register_as(&ctx, "admin@school.si", Role::Admin).await;
        let t1 = register_as(&ctx, "t1@school.si", Role::Teacher).await;
        let t2 = register_as(&ctx, "t2@school.si", Role::Teacher).await;
        let s = register_as(&ctx, "s@school.si", Role::Student).await;
        let class = ctx
            .db
            .create_class("4.a".to_string(), t1, "2021".to_string())
            .await
            .unwrap();
        assert!(ctx.db.add_class_student(class, s).await.unwrap());

        let owner = actor(&ctx, t1, Role::Teacher).await;
        let details = get_class(&ctx, &owner, class).await.unwrap();
        assert_eq!(details.teacher_name, "t1");
        assert_eq!(details.students.len(), 1);
        assert_eq!(details.students[0].id, s);

        let other = actor(&ctx, t2, Role::Teacher).await;
        assert_eq!(api_err(get_class(&ctx, &other, class).await), ApiError::Forbidden);
        assert_eq!(api_err(get_class(&ctx, &other, 999).await), ApiError::Forbidden);

        let admin = actor(&ctx, admin, Role::Admin).await;
        assert_eq!(api_err(get_class(&ctx, &admin, 999).await), ApiError::NotFound);
    }

    #[tokio::test]
    async fn classes_need_a_real_teacher() {
        let ctx = context();
        let admin = register_as(&ctx, "admin@school.si", Role::Admin).await;
        let s = register_as(&ctx, "s@school.si", Role::Student).await;
        let admin = actor(&ctx, admin, Role::Admin).await;
        assert_eq!(
            api_err(create_class(&ctx, &admin, "5.a".to_string(), s, "2021".to_string()).await),
            ApiError::BadRequest("teacher_id doesn't name a teacher".to_string())
        );
    }
}
