use crate::{logic::ApiError, router::util::ErrorRejection, util::log_err, view::failure};
use log::debug;
use std::convert::Infallible;
use warp::{
    filters::body::BodyDeserializeError,
    http::StatusCode,
    reject::{
        InvalidQuery, LengthRequired, MethodNotAllowed, MissingHeader, PayloadTooLarge,
        UnsupportedMediaType,
    },
    reply::{Json, WithStatus},
    Rejection,
};

/// The status code for an error the caller gets to see.
pub fn status_of(err: &ApiError) -> StatusCode {
    match err {
        ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        ApiError::Forbidden => StatusCode::FORBIDDEN,
        ApiError::NotFound => StatusCode::NOT_FOUND,
        ApiError::Conflict(_) => StatusCode::CONFLICT,
        ApiError::Duplicate(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

/// Renders every rejection as an error envelope. Internal errors are logged, and their details
/// stay in the log.
pub async fn recover(rejection: Rejection) -> Result<WithStatus<Json>, Infallible> {
    let (status, msg) = if let Some(ErrorRejection(err)) = rejection.find::<ErrorRejection>() {
        match err.downcast_ref::<ApiError>() {
            Some(err) => (status_of(err), err.to_string()),
            None => {
                log_err(err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        }
    } else if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if let Some(err) = rejection.find::<BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("Bad Request: {}", err))
    } else if let Some(err) = rejection.find::<InvalidQuery>() {
        (StatusCode::BAD_REQUEST, format!("Bad Request: {}", err))
    } else if let Some(err) = rejection.find::<MissingHeader>() {
        (StatusCode::BAD_REQUEST, format!("Bad Request: {}", err))
    } else if rejection.find::<LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, "Length Required".to_string())
    } else if rejection.find::<PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large".to_string())
    } else if rejection.find::<UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Unsupported Media Type".to_string(),
        )
    } else if rejection.find::<MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed".to_string())
    } else {
        debug!("Unhandled rejection: {:?}", rejection);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error".to_string(),
        )
    };
    Ok(failure(status, msg))
}
