use crate::{
    logic::{
        self,
        access::Actor,
        users::{AbsenceEntry, UserPatch},
        Context,
    },
    router::{
        auth::authed,
        util::{form, id, FutureExt},
    },
    schema::{Role, User},
    view::{render_html, success},
};
use chrono::Local;
use serde_derive::Deserialize;
use warp::Filter;

pub fn get_data(ctx: &Context) -> Resp!() {
    id()
        .and(warp::path::end())
        .and(authed(ctx))
        .and_then(|id: i32, ctx: Context, actor: Actor| {
            async move { logic::users::get_user_data(&ctx, &actor, id).await }.err_to_rejection()
        })
        .map(|user: User| success(user))
        .boxed()
}

pub fn patch_data(ctx: &Context) -> Resp!() {
    id()
        .and(warp::path::end())
        .and(authed(ctx))
        .and(form())
        .and_then(|id: i32, ctx: Context, actor: Actor, patch: UserPatch| {
            async move { logic::users::patch_user(&ctx, &actor, id, patch).await }
                .err_to_rejection()
        })
        .map(|user: User| success(user))
        .boxed()
}

/// Lists users, all of them or only those with one role.
pub fn list(ctx: &Context, role: Option<Role>) -> Resp!() {
    warp::path::end()
        .and(authed(ctx))
        .and_then(move |ctx: Context, actor: Actor| {
            async move { logic::users::list_users(&ctx, &actor, role).await }.err_to_rejection()
        })
        .map(|users: Vec<User>| success(users))
        .boxed()
}

pub fn change_role(ctx: &Context) -> Resp!() {
    #[derive(Debug, Deserialize)]
    struct Form {
        role: Role,
    }

    id()
        .and(warp::path::end())
        .and(authed(ctx))
        .and(form())
        .and_then(|id: i32, ctx: Context, actor: Actor, form: Form| {
            async move { logic::users::change_role(&ctx, &actor, id, form.role).await }
                .err_to_rejection()
        })
        .map(|()| success(()))
        .boxed()
}

pub fn delete(ctx: &Context) -> Resp!() {
    id()
        .and(warp::path::end())
        .and(authed(ctx))
        .and_then(|id: i32, ctx: Context, actor: Actor| {
            async move { logic::users::delete_user(&ctx, &actor, id).await }.err_to_rejection()
        })
        .map(|()| success(()))
        .boxed()
}

pub fn has_class(ctx: &Context) -> Resp!() {
    warp::path::end()
        .and(authed(ctx))
        .and_then(|ctx: Context, actor: Actor| {
            async move { logic::users::has_class(&ctx, &actor).await }.err_to_rejection()
        })
        .map(|has: bool| success(has))
        .boxed()
}

pub fn has_birthday(ctx: &Context) -> Resp!() {
    warp::path::end()
        .and(authed(ctx))
        .and_then(|ctx: Context, actor: Actor| {
            async move {
                let today = Local::now().date_naive();
                logic::users::has_birthday(&ctx, &actor, today).await
            }
            .err_to_rejection()
        })
        .map(|has: bool| success(has))
        .boxed()
}

pub fn absences(ctx: &Context) -> Resp!() {
    id()
        .and(warp::path::end())
        .and(authed(ctx))
        .and_then(|id: i32, ctx: Context, actor: Actor| {
            async move { logic::users::absences_of(&ctx, &actor, id).await }.err_to_rejection()
        })
        .map(|absences: Vec<AbsenceEntry>| success(absences))
        .boxed()
}

pub fn grades(ctx: &Context) -> Resp!() {
    id()
        .and(warp::path::end())
        .and(authed(ctx))
        .and_then(|id: i32, ctx: Context, actor: Actor| {
            async move { logic::users::grades_of(&ctx, &actor, id).await }.err_to_rejection()
        })
        .map(|grades: Vec<logic::users::SubjectGrades>| success(grades))
        .boxed()
}

pub fn certificate_of_schooling(ctx: &Context) -> Resp!() {
    id()
        .and(warp::path::end())
        .and(authed(ctx))
        .and_then(|id: i32, ctx: Context, actor: Actor| {
            async move {
                let today = Local::now().date_naive();
                let certificate =
                    logic::users::certificate_of_schooling(&ctx, &actor, id, today).await?;
                render_html("certificate-of-schooling.html", certificate)
            }
            .err_to_rejection()
        })
        .boxed()
}

pub fn link_child(ctx: &Context) -> Resp!() {
    id()
        .and(warp::path("child"))
        .and(id())
        .and(warp::path::end())
        .and(authed(ctx))
        .and_then(|parent: i32, child: i32, ctx: Context, actor: Actor| {
            async move { logic::users::link_child(&ctx, &actor, parent, child).await }
                .err_to_rejection()
        })
        .map(|()| success(()))
        .boxed()
}

pub fn unlink_child(ctx: &Context) -> Resp!() {
    id()
        .and(warp::path("child"))
        .and(id())
        .and(warp::path::end())
        .and(authed(ctx))
        .and_then(|parent: i32, child: i32, ctx: Context, actor: Actor| {
            async move { logic::users::unlink_child(&ctx, &actor, parent, child).await }
                .err_to_rejection()
        })
        .map(|()| success(()))
        .boxed()
}

pub fn children(ctx: &Context) -> Resp!() {
    warp::path::end()
        .and(authed(ctx))
        .and_then(|ctx: Context, actor: Actor| {
            async move { logic::users::children_of(&ctx, &actor).await }.err_to_rejection()
        })
        .map(|children: Vec<User>| success(children))
        .boxed()
}
