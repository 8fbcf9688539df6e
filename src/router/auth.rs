use crate::{
    logic::{
        self,
        access::Actor,
        auth::{claims_from_header, Claims},
        Context,
    },
    router::util::{form, with_ctx, FutureExt},
    view::{created, success},
};
use failure::Error;
use serde_derive::Deserialize;
use warp::{Filter, Rejection};

/// A filter that authenticates the caller from their bearer token. A missing or bad token is
/// rejected as `Forbidden`.
pub fn authed(ctx: &Context) -> impl Clone + Filter<Extract = (Context, Actor), Error = Rejection> {
    with_ctx(ctx)
        .and(warp::header::optional::<String>("authorization"))
        .and_then(|ctx: Context, header: Option<String>| {
            async move {
                let actor = logic::auth::authed_actor(&ctx, header).await?;
                Ok::<_, Error>((ctx, actor))
            }
            .err_to_rejection()
        })
        .untuple_one()
}

/// A filter that reads the caller's claims, if they sent a valid bearer token.
pub fn opt_claims(
    ctx: &Context,
) -> impl Clone + Filter<Extract = (Context, Option<Claims>), Error = Rejection> {
    with_ctx(ctx)
        .and(warp::header::optional::<String>("authorization"))
        .map(|ctx: Context, header: Option<String>| {
            let claims = claims_from_header(&ctx.tokens, header.as_ref().map(|h| h.as_str()));
            (ctx, claims)
        })
        .untuple_one()
}

pub fn login(ctx: &Context) -> Resp!() {
    #[derive(Debug, Deserialize)]
    struct Form {
        email: String,
        pass: String,
    }

    warp::path::end()
        .and(with_ctx(ctx))
        .and(form())
        .and_then(|ctx: Context, form: Form| {
            async move { logic::auth::login(&ctx, form.email, form.pass).await }.err_to_rejection()
        })
        .map(|token: String| success(token))
        .boxed()
}

pub fn register(ctx: &Context) -> Resp!() {
    #[derive(Debug, Deserialize)]
    struct Form {
        email: String,
        pass: String,
        name: String,
    }

    warp::path::end()
        .and(opt_claims(ctx))
        .and(form())
        .and_then(|ctx: Context, claims: Option<Claims>, form: Form| {
            async move {
                let user = logic::auth::register(&ctx, claims, form.email, form.pass, form.name)
                    .await?;
                Ok::<_, Error>(user.id)
            }
            .err_to_rejection()
        })
        .map(|id: i32| created(id))
        .boxed()
}
