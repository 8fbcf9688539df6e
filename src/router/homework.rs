use crate::{
    logic::{self, access::Actor, Context},
    router::{
        auth::authed,
        util::{form, id, FutureExt},
    },
    schema::HomeworkStatus,
    view::success,
};
use serde_derive::Deserialize;
use warp::Filter;

/// Records a student's progress on a piece of homework.
pub fn set_status(ctx: &Context) -> Resp!() {
    #[derive(Debug, Deserialize)]
    struct Form {
        status: HomeworkStatus,
    }

    id()
        .and(id())
        .and(warp::path::end())
        .and(authed(ctx))
        .and(form())
        .and_then(|id: i32, student: i32, ctx: Context, actor: Actor, form: Form| {
            async move {
                logic::homework::set_status(&ctx, &actor, id, student, form.status).await
            }
            .err_to_rejection()
        })
        .map(|()| success(()))
        .boxed()
}
