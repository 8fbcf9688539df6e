//! The HTTP server.
//!
//! > **Router** is the the only module that knows anything about HTTP. Every other part of the
//! > system has no knowledge of how the request is really being made. The router's responsibility
//! > is to call into the domain logic, and then render that response data with an appropriate view.

mod auth;
mod classes;
mod errors;
mod grades;
mod homework;
mod meetings;
mod subjects;
mod testing;
mod users;
mod util;


use crate::{logic::Context, schema::Role};
use failure::Fallible;
use log::{info, warn};
use std::{convert::Infallible, net::SocketAddr};
use warp::{Filter, Reply};

/// Starts an HTTP server at the given address. Only returns if the address can't be bound; if the
/// server itself exits, it's restarted.
pub async fn serve_on(addr: SocketAddr, ctx: Context) -> Fallible<()> {
    loop {
        info!("Starting to serve...");
        let (addr, server) = warp::serve(routes(&ctx)).try_bind_ephemeral(addr)?;
        info!("Listening on {}", addr);
        server.await;
        warn!("HTTP server exited; restarting...");
    }
}

/// Every route, with errors rendered and requests logged.
pub fn routes(ctx: &Context) -> impl Clone + Filter<Extract = (impl Reply,), Error = Infallible> {
    user_routes(ctx)
        .or(class_routes(ctx))
        .or(subject_routes(ctx))
        .or(meeting_routes(ctx))
        .or(testing_routes(ctx))
        .recover(errors::recover)
        .with(warp::log("meetplan::router"))
}

fn user_routes(ctx: &Context) -> Resp!() {
    route_any! {
        POST ("user" / "login") => auth::login(ctx),
        POST ("user" / "new") => auth::register(ctx),
        GET ("user" / "get" / "data") => users::get_data(ctx),
        PATCH ("user" / "get" / "data") => users::patch_data(ctx),
        GET ("user" / "get" / "absences") => users::absences(ctx),
        GET ("user" / "get" / "grades") => users::grades(ctx),
        GET ("user" / "get" / "certificate_of_schooling") => users::certificate_of_schooling(ctx),
        GET ("user" / "get" / "testing") => testing::certificate(ctx),
        GET ("user" / "has" / "class") => users::has_class(ctx),
        GET ("user" / "has" / "birthday") => users::has_birthday(ctx),
        PATCH ("user" / "role") => users::change_role(ctx),
        DELETE ("user") => users::delete(ctx),
        GET ("users") => users::list(ctx, None),
        GET ("teachers") => users::list(ctx, Some(Role::Teacher)),
        GET ("students") => users::list(ctx, Some(Role::Student)),
        PUT ("parent") => users::link_child(ctx),
        DELETE ("parent") => users::unlink_child(ctx),
        GET ("parent" / "children") => users::children(ctx),
    }
    .boxed()
}

fn class_routes(ctx: &Context) -> Resp!() {
    route_any! {
        POST ("class" / "new") => classes::create(ctx),
        GET ("classes") => classes::list(ctx),
        GET ("class" / "get") => classes::get(ctx),
        DELETE ("class" / "get") => classes::delete(ctx),
        PATCH ("class" / "get") => classes::add_user(ctx),
        DELETE ("class" / "get") => classes::remove_user(ctx),
    }
    .boxed()
}

fn subject_routes(ctx: &Context) -> Resp!() {
    route_any! {
        POST ("subject" / "new") => subjects::create(ctx),
        GET ("subjects") => subjects::list(ctx),
        GET ("subject" / "get") => subjects::get(ctx),
        GET ("subject" / "get") => subjects::homework(ctx),
        DELETE ("subject" / "get") => subjects::delete(ctx),
        PATCH ("subject" / "get") => subjects::add_user(ctx),
        DELETE ("subject" / "get") => subjects::remove_user(ctx),
    }
    .boxed()
}

fn meeting_routes(ctx: &Context) -> Resp!() {
    route_any! {
        GET ("timetable") => meetings::timetable(ctx),
        POST ("meeting" / "new") => meetings::create(ctx),
        GET ("meeting" / "get") => meetings::get(ctx),
        PATCH ("meeting" / "get") => meetings::patch(ctx),
        DELETE ("meeting" / "get") => meetings::delete(ctx),
        GET ("meeting" / "get") => meetings::absences(ctx),
        PATCH ("meeting" / "get") => meetings::set_absence(ctx),
        GET ("meeting" / "get") => meetings::grades(ctx),
        POST ("meeting" / "get") => meetings::new_grade(ctx),
        POST ("meeting" / "get") => meetings::new_homework(ctx),
        PATCH ("grades" / "get") => grades::patch(ctx),
        DELETE ("grades" / "get") => grades::delete(ctx),
        PATCH ("homework" / "get") => homework::set_status(ctx),
    }
    .boxed()
}

fn testing_routes(ctx: &Context) -> Resp!() {
    route_any! {
        GET ("testing" / "verify") => testing::verify(ctx),
        GET ("testing") => testing::class(ctx),
        PATCH ("testing") => testing::set_result(ctx),
    }
    .boxed()
}
