//! Authentication and authorization-related logic.

use crate::{
    logic::{access::Actor, require, ApiError, Context},
    schema::{Role, TestingResult, User},
    util::blocking,
};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, NaiveDate, Utc};
use failure::{format_err, Fallible};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::{debug, info};
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use serde::de::DeserializeOwned;
use serde_derive::{Deserialize, Serialize};
use std::{collections::BTreeSet, sync::Arc};
use uuid::Uuid;

/// The issuer of every token this server signs.
pub const ISSUER: &str = "MeetPlanCA";

/// The signing key used in debug mode, so tokens survive restarts.
const DEBUG_KEY: &[u8] = b"46ad2cb520028e1f5e2eab8d860a547353ddbabdb6affb923c075c92518c7e02";

/// How long a login token is valid for, in hours.
const LOGIN_HOURS: i64 = 24;

/// How long after the test date a self-testing token stays valid, in hours.
const TESTING_GRACE_HOURS: i64 = 48;

/// The claims in a login token.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Claims {
    /// The user's ID.
    pub user_id: i32,

    /// The user's email address.
    pub email: String,

    /// The user's role at the time of login.
    pub role: Role,

    /// The issuer; always `ISSUER`.
    pub iss: String,

    /// The expiry, in seconds since the epoch.
    pub exp: i64,
}

/// The claims in a self-testing result token.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TestingClaims {
    /// The tested student's ID.
    pub user_id: i32,

    /// The result.
    pub result: TestingResult,

    /// The ID of the testing record.
    pub test_id: i32,

    /// A unique ID for the certificate.
    pub jti: Uuid,

    /// The issuer; always `ISSUER`.
    pub iss: String,

    /// The expiry, in seconds since the epoch.
    pub exp: i64,
}

/// Signs and checks bearer tokens. The key is fixed for the life of the process.
#[allow(missing_debug_implementations)]
#[derive(Clone)]
pub struct Tokens {
    secret: Arc<Vec<u8>>,
}

impl Tokens {
    /// Creates a token signer with the given key.
    pub fn new(secret: &[u8]) -> Tokens {
        Tokens {
            secret: Arc::new(secret.to_vec()),
        }
    }

    /// Creates a token signer with a random key. Tokens don't survive a restart.
    pub fn random() -> Tokens {
        let secret = OsRng
            .sample_iter(&Alphanumeric)
            .take(100)
            .collect::<Vec<u8>>();
        Tokens::new(&secret)
    }

    /// Creates a token signer for the given mode: a fixed key when debugging, a random one
    /// otherwise.
    pub fn for_mode(debug: bool) -> Tokens {
        if debug {
            info!("Debug mode: signing tokens with the fixed debug key");
            Tokens::new(DEBUG_KEY)
        } else {
            Tokens::random()
        }
    }

    /// Issues a login token, valid for a day.
    pub fn issue(&self, email: &str, role: Role, user_id: i32) -> Fallible<String> {
        let exp = Utc::now() + Duration::hours(LOGIN_HOURS);
        self.sign(&Claims {
            user_id,
            email: email.to_string(),
            role,
            iss: ISSUER.to_string(),
            exp: exp.timestamp(),
        })
    }

    /// Checks a login token. Every way it can fail (bad signature, wrong issuer, expired,
    /// unverified role) is the same `Forbidden`.
    pub fn validate(&self, token: &str) -> Result<Claims, ApiError> {
        let claims = self.check::<Claims>(token)?;
        if claims.iss != ISSUER {
            return Err(ApiError::Forbidden);
        }
        match claims.role {
            Role::Unverified => Err(ApiError::Forbidden),
            _ => Ok(claims),
        }
    }

    /// Issues a token attesting to a self-testing result, valid until two days after the test.
    /// Returns the token and the day it expires.
    pub fn issue_testing(
        &self,
        user_id: i32,
        result: TestingResult,
        test_id: i32,
        date: NaiveDate,
    ) -> Fallible<(String, NaiveDate)> {
        let expires = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| format_err!("Invalid test date {}", date))?
            + Duration::hours(TESTING_GRACE_HOURS);
        let token = self.sign(&TestingClaims {
            user_id,
            result,
            test_id,
            jti: Uuid::new_v4(),
            iss: ISSUER.to_string(),
            exp: expires.and_utc().timestamp(),
        })?;
        Ok((token, expires.date()))
    }

    /// Checks a self-testing result token.
    pub fn validate_testing(&self, token: &str) -> Result<TestingClaims, ApiError> {
        let claims = self.check::<TestingClaims>(token)?;
        if claims.iss != ISSUER {
            return Err(ApiError::Forbidden);
        }
        Ok(claims)
    }

    pub(crate) fn sign<T: serde::Serialize>(&self, claims: &T) -> Fallible<String> {
        let key = EncodingKey::from_secret(&self.secret);
        Ok(encode(&Header::new(Algorithm::HS256), claims, &key)?)
    }

    fn check<T: DeserializeOwned>(&self, token: &str) -> Result<T, ApiError> {
        let key = DecodingKey::from_secret(&self.secret);
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        decode::<T>(token, &key, &validation)
            .map(|data| data.claims)
            .map_err(|err| {
                debug!("Rejected a token: {}", err);
                ApiError::Forbidden
            })
    }
}

/// Extracts the token from an `Authorization` header. Both `Bearer <token>` and a bare token are
/// accepted.
pub fn bearer_token(header: &str) -> Option<&str> {
    let mut words = header.split_whitespace();
    match words.next()? {
        scheme if scheme.eq_ignore_ascii_case("bearer") => words.next(),
        token => Some(token),
    }
}

/// Validates the claims in an `Authorization` header, if any.
pub fn claims_from_header(tokens: &Tokens, header: Option<&str>) -> Option<Claims> {
    let token = bearer_token(header?)?;
    tokens.validate(token).ok()
}

/// Returns the actor authenticated by the given `Authorization` header. A missing or bad token
/// is `Forbidden`.
pub async fn authed_actor(ctx: &Context, header: Option<String>) -> Fallible<Actor> {
    let claims = claims_from_header(&ctx.tokens, header.as_ref().map(|h| h.as_str()))
        .ok_or(ApiError::Forbidden)?;
    actor_for(ctx, claims).await
}

/// Turns validated claims into an actor, looking up a parent's children.
pub async fn actor_for(ctx: &Context, claims: Claims) -> Fallible<Actor> {
    let children = match claims.role {
        Role::Parent => ctx.db.get_children(claims.user_id).await?,
        _ => BTreeSet::new(),
    };
    Ok(Actor {
        id: claims.user_id,
        role: claims.role,
        children,
    })
}

/// Hashes a password with Argon2 and a random salt.
pub fn hash_password(password: &str) -> Fallible<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| format_err!("Couldn't hash password: {}", err))
}

/// Checks a password against a hash from `hash_password`.
pub fn check_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(_) => false,
    }
}

/// Checks a user's password, returning a login token. Unverified users can't log in.
pub async fn login(ctx: &Context, email: String, password: String) -> Fallible<String> {
    let user = ctx
        .db
        .get_user_by_email(email)
        .await?
        .ok_or(ApiError::Forbidden)?;
    if user.role == Role::Unverified {
        return Err(ApiError::Forbidden.into());
    }

    let hash = user.password.clone();
    let matches = blocking(move || Ok(check_password(&password, &hash))).await?;
    if !matches {
        return Err(ApiError::Forbidden.into());
    }

    info!("{} logged in", user.email);
    ctx.tokens.issue(&user.email, user.role, user.id)
}

/// Registers a user. While registrations are blocked, only admin-tier users may register others.
pub async fn register(
    ctx: &Context,
    registrar: Option<Claims>,
    email: String,
    password: String,
    name: String,
) -> Fallible<User> {
    if ctx.config.block_registrations {
        match registrar {
            Some(ref claims) if claims.role.is_admin_tier() => {}
            _ => return Err(ApiError::Forbidden.into()),
        }
    }
    require("email", &email)?;
    require("pass", &password)?;
    require("name", &name)?;

    let hash = blocking(move || hash_password(&password)).await?;
    let user = ctx
        .db
        .create_user(email, hash, name)
        .await?
        .ok_or_else(|| ApiError::Duplicate("User is already in database".to_string()))?;
    info!("Registered {} ({}) as {}", user.email, user.id, user.role);
    Ok(user)
}
