use crate::{
    logic::{self, access::Actor, classes::ClassDetails, Context},
    router::{
        auth::authed,
        util::{form, id, FutureExt},
    },
    schema::Class,
    view::{created, success},
};
use serde_derive::Deserialize;
use warp::Filter;

pub fn create(ctx: &Context) -> Resp!() {
    #[derive(Debug, Deserialize)]
    struct Form {
        name: String,
        teacher_id: i32,
        #[serde(default)]
        class_year: String,
    }

    warp::path::end()
        .and(authed(ctx))
        .and(form())
        .and_then(|ctx: Context, actor: Actor, form: Form| {
            async move {
                logic::classes::create_class(&ctx, &actor, form.name, form.teacher_id, form.class_year)
                    .await
            }
            .err_to_rejection()
        })
        .map(|id: i32| created(id))
        .boxed()
}

pub fn list(ctx: &Context) -> Resp!() {
    #[derive(Debug, Deserialize)]
    struct Query {
        id: Option<i32>,
    }

    warp::path::end()
        .and(authed(ctx))
        .and(warp::query())
        .and_then(|ctx: Context, actor: Actor, query: Query| {
            async move { logic::classes::list_classes(&ctx, &actor, query.id).await }
                .err_to_rejection()
        })
        .map(|classes: Vec<Class>| success(classes))
        .boxed()
}

pub fn get(ctx: &Context) -> Resp!() {
    id()
        .and(warp::path::end())
        .and(authed(ctx))
        .and_then(|id: i32, ctx: Context, actor: Actor| {
            async move { logic::classes::get_class(&ctx, &actor, id).await }.err_to_rejection()
        })
        .map(|class: ClassDetails| success(class))
        .boxed()
}

pub fn delete(ctx: &Context) -> Resp!() {
    id()
        .and(warp::path::end())
        .and(authed(ctx))
        .and_then(|id: i32, ctx: Context, actor: Actor| {
            async move { logic::classes::delete_class(&ctx, &actor, id).await }.err_to_rejection()
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
        .and_then(|class: i32, user: i32, ctx: Context, actor: Actor| {
            async move { logic::classes::add_student(&ctx, &actor, class, user).await }
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
        .and_then(|class: i32, user: i32, ctx: Context, actor: Actor| {
            async move { logic::classes::remove_student(&ctx, &actor, class, user).await }
                .err_to_rejection()
        })
        .map(|()| success(()))
        .boxed()
}
