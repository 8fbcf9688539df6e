use crate::{
    logic::{
        self,
        access::Actor,
        testing::{TestingEntry, VerifiedTesting},
        Context,
    },
    router::{
        auth::authed,
        util::{form, id, with_ctx, FutureExt},
    },
    schema::{Testing, TestingResult},
    view::{render_html, success},
};
use chrono::{Local, NaiveDate};
use serde_derive::Deserialize;
use warp::Filter;

/// The day to look at; today if not given.
#[derive(Debug, Deserialize)]
struct DateQuery {
    date: Option<NaiveDate>,
}

impl DateQuery {
    fn date(&self) -> NaiveDate {
        self.date.unwrap_or_else(|| Local::now().date_naive())
    }
}

pub fn class(ctx: &Context) -> Resp!() {
    id()
        .and(warp::path::end())
        .and(authed(ctx))
        .and(warp::query())
        .and_then(|class: i32, ctx: Context, actor: Actor, query: DateQuery| {
            async move { logic::testing::class_testing(&ctx, &actor, class, query.date()).await }
                .err_to_rejection()
        })
        .map(|entries: Vec<TestingEntry>| success(entries))
        .boxed()
}

pub fn set_result(ctx: &Context) -> Resp!() {
    #[derive(Debug, Deserialize)]
    struct Form {
        date: Option<NaiveDate>,
        result: TestingResult,
    }

    id()
        .and(id())
        .and(warp::path::end())
        .and(authed(ctx))
        .and(form())
        .and_then(
            |class: i32, student: i32, ctx: Context, actor: Actor, form: Form| {
                async move {
                    let date = form.date.unwrap_or_else(|| Local::now().date_naive());
                    logic::testing::set_result(&ctx, &actor, class, student, date, form.result)
                        .await
                }
                .err_to_rejection()
            },
        )
        .map(|testing: Testing| success(testing))
        .boxed()
}

pub fn certificate(ctx: &Context) -> Resp!() {
    id()
        .and(warp::path::end())
        .and(authed(ctx))
        .and(warp::query())
        .and_then(|student: i32, ctx: Context, actor: Actor, query: DateQuery| {
            async move {
                let certificate =
                    logic::testing::certificate(&ctx, &actor, student, query.date()).await?;
                render_html("self-testing.html", certificate)
            }
            .err_to_rejection()
        })
        .boxed()
}

pub fn verify(ctx: &Context) -> Resp!() {
    warp::path!(String)
        .and(with_ctx(ctx))
        .and_then(|token: String, ctx: Context| {
            async move { logic::testing::verify(&ctx, &token).await }.err_to_rejection()
        })
        .map(|verified: VerifiedTesting| success(verified))
        .boxed()
}
