use crate::{
    logic::{self, access::Actor, grades::GradePatch, Context},
    router::{
        auth::authed,
        util::{form, id, FutureExt},
    },
    schema::Grade,
    view::success,
};
use warp::Filter;

pub fn patch(ctx: &Context) -> Resp!() {
    id()
        .and(warp::path::end())
        .and(authed(ctx))
        .and(form())
        .and_then(|id: i32, ctx: Context, actor: Actor, patch: GradePatch| {
            async move { logic::grades::update_grade(&ctx, &actor, id, patch).await }
                .err_to_rejection()
        })
        .map(|grade: Grade| success(grade))
        .boxed()
}

pub fn delete(ctx: &Context) -> Resp!() {
    id()
        .and(warp::path::end())
        .and(authed(ctx))
        .and_then(|id: i32, ctx: Context, actor: Actor| {
            async move { logic::grades::delete_grade(&ctx, &actor, id).await }.err_to_rejection()
        })
        .map(|()| success(()))
        .boxed()
}
