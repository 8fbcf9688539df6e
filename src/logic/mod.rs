//! Business logic.
//!
//! > **Logic** is the "business (or domain) logic" of the application. The router will pull the
//! > necessary information out of the HTTP request, and call into this module as quickly as
//! > possible to do all the actual work.
//!
//! Every operation takes the authenticated [`Actor`](access::Actor) and asks it whether the
//! operation is allowed before touching the database. Any refusal is the same
//! [`ApiError::Forbidden`], whatever the reason was.

pub mod access;
pub mod auth;
pub mod classes;
pub mod grades;
pub mod homework;
pub mod meetings;
pub mod subjects;
pub mod testing;
pub mod users;

use crate::{dal::DB, logic::auth::Tokens};
use failure::Fail;
use std::sync::Arc;

/// The errors that callers get to see. Anything else is an internal error.
#[derive(Debug, Fail, PartialEq)]
pub enum ApiError {
    /// A parameter was missing or malformed.
    #[fail(display = "Bad Request: {}", _0)]
    BadRequest(String),

    /// The caller isn't allowed to do this. Deliberately says nothing more.
    #[fail(display = "Forbidden")]
    Forbidden,

    /// The requested entity doesn't exist. Only admin-tier callers get to see this; everybody
    /// else gets `Forbidden`.
    #[fail(display = "Not found")]
    NotFound,

    /// The request conflicts with the current state, e.g. adding a student to a class twice.
    #[fail(display = "{}", _0)]
    Conflict(String),

    /// The resource being created already exists.
    #[fail(display = "{}", _0)]
    Duplicate(String),
}

/// Flags that change what the server allows.
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// Only admin-tier users may register new users.
    pub block_registrations: bool,

    /// Parents may see their children's absences.
    pub parent_view_absences: bool,

    /// Parents may see their children's grades.
    pub parent_view_grades: bool,

    /// The school's name, as printed on certificates.
    pub school_name: String,
}

/// Everything an operation needs.
#[allow(missing_debug_implementations)]
#[derive(Clone)]
pub struct Context {
    /// The database.
    pub db: DB,

    /// The bearer token signer.
    pub tokens: Tokens,

    /// The server's configuration.
    pub config: Arc<Config>,
}

impl Context {
    /// Bundles up a context.
    pub fn new(db: DB, tokens: Tokens, config: Config) -> Context {
        Context {
            db,
            tokens,
            config: Arc::new(config),
        }
    }
}

/// Parses a required form field that arrived as a string, turning a malformed one into a
/// `BadRequest`.
pub(crate) fn parse_field<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ApiError> {
    value
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("{} is malformed", name)))
}

/// Rejects empty required fields.
pub(crate) fn require(name: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        Err(ApiError::BadRequest(format!("{} isn't provided", name)))
    } else {
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_util;
