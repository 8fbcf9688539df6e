use crate::{
    logic::{self, access::Actor, homework::HomeworkEntry, subjects::SubjectDetails, Context},
    router::{
        auth::authed,
        util::{form, id, FutureExt},
    },
    schema::Subject,
    view::{created, success},
};
use serde_derive::Deserialize;
use warp::Filter;

pub fn create(ctx: &Context) -> Resp!() {
    #[derive(Debug, Deserialize)]
    struct Form {
        teacher_id: i32,
        name: String,
        #[serde(default)]
        long_name: String,
        #[serde(default)]
        class_id: Option<i32>,
    }

    warp::path::end()
        .and(authed(ctx))
        .and(form())
        .and_then(|ctx: Context, actor: Actor, form: Form| {
            async move {
                logic::subjects::create_subject(
                    &ctx,
                    &actor,
                    form.teacher_id,
                    form.name,
                    form.long_name,
                    form.class_id,
                )
                .await
            }
            .err_to_rejection()
        })
        .map(|id: i32| created(id))
        .boxed()
}

pub fn list(ctx: &Context) -> Resp!() {
    warp::path::end()
        .and(authed(ctx))
        .and_then(|ctx: Context, actor: Actor| {
            async move { logic::subjects::list_subjects(&ctx, &actor).await }.err_to_rejection()
        })
        .map(|subjects: Vec<Subject>| success(subjects))
        .boxed()
}

pub fn get(ctx: &Context) -> Resp!() {
    id()
        .and(warp::path::end())
        .and(authed(ctx))
        .and_then(|id: i32, ctx: Context, actor: Actor| {
            async move { logic::subjects::get_subject(&ctx, &actor, id).await }.err_to_rejection()
        })
        .map(|subject: SubjectDetails| success(subject))
        .boxed()
}

pub fn delete(ctx: &Context) -> Resp!() {
    id()
        .and(warp::path::end())
        .and(authed(ctx))
        .and_then(|id: i32, ctx: Context, actor: Actor| {
            async move { logic::subjects::delete_subject(&ctx, &actor, id).await }
                .err_to_rejection()
        })
        .map(|()| success(()))
        .boxed()
}

pub fn add_user(ctx: &Context) -> Resp!() {
    id()
        .and(warp::path("add_user"))
        .and(id())
        .and(warp::path::end())
        .and(authed(ctx))
        .and_then(|subject: i32, user: i32, ctx: Context, actor: Actor| {
            async move { logic::subjects::add_student(&ctx, &actor, subject, user).await }
                .err_to_rejection()
        })
        .map(|()| success(()))
        .boxed()
}

pub fn remove_user(ctx: &Context) -> Resp!() {
    id()
        .and(warp::path("remove_user"))
        .and(id())
        .and(warp::path::end())
        .and(authed(ctx))
        .and_then(|subject: i32, user: i32, ctx: Context, actor: Actor| {
            async move { logic::subjects::remove_student(&ctx, &actor, subject, user).await }
                .err_to_rejection()
        })
        .map(|()| success(()))
        .boxed()
}

pub fn homework(ctx: &Context) -> Resp!() {
    id()
        .and(warp::path("homework"))
        .and(warp::path::end())
        .and(authed(ctx))
        .and_then(|id: i32, ctx: Context, actor: Actor| {
            async move { logic::homework::subject_homework(&ctx, &actor, id).await }
                .err_to_rejection()
        })
        .map(|homework: Vec<HomeworkEntry>| success(homework))
        .boxed()
}
