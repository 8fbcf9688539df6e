use crate::logic::{parse_field, Context};
use failure::Error;
use futures::{future::MapErr, TryFuture, TryFutureExt};
use serde::de::DeserializeOwned;
use std::convert::Infallible;
use warp::{reject::Reject, Filter, Rejection};

/// The largest form body accepted.
const MAX_FORM_BYTES: u64 = 16 * 1024;

/// An error from the logic, on its way to `errors::recover`.
#[derive(Debug)]
pub struct ErrorRejection(pub Error);

impl Reject for ErrorRejection {}

/// Wraps an error in a `warp::Rejection`.
pub fn reject(err: Error) -> Rejection {
    warp::reject::custom(ErrorRejection(err))
}

/// An extension trait for Futures.
pub trait FutureExt: TryFuture<Error = Error> + Sized {
    /// Converts an error to a `warp::Rejection`.
    fn err_to_rejection(self) -> MapErr<Self, fn(Error) -> Rejection> {
        let reject: fn(Error) -> Rejection = reject;
        self.map_err(reject)
    }
}

impl<F: TryFuture<Error = Error>> FutureExt for F {}

/// Provides the context to a handler.
pub fn with_ctx(ctx: &Context) -> impl Clone + Filter<Extract = (Context,), Error = Infallible> {
    let ctx = ctx.clone();
    warp::any().map(move || ctx.clone())
}

/// Parses a form-encoded body.
pub fn form<T: 'static + DeserializeOwned + Send>(
) -> impl Clone + Filter<Extract = (T,), Error = Rejection> {
    warp::body::content_length_limit(MAX_FORM_BYTES).and(warp::body::form())
}

/// Matches a path segment holding an ID. A segment that isn't a number is a `BadRequest`.
pub fn id() -> impl Clone + Filter<Extract = (i32,), Error = Rejection> {
    warp::path::param().and_then(|segment: String| async move {
        parse_field::<i32>("id", &segment).map_err(|err| reject(err.into()))
    })
}
