//! Helpers for tests that need a database.

use crate::{
    dal::DB,
    logic::{
        access::Actor,
        auth::{hash_password, Tokens},
        Config, Context,
    },
    schema::Role,
};

/// A context with a fresh in-memory database and default configuration.
pub fn context() -> Context {
    Context::new(
        DB::in_memory().unwrap(),
        Tokens::random(),
        Config {
            school_name: "Test School".to_string(),
            ..Config::default()
        },
    )
}

/// Creates a user with the given role and the password `"pass"`, returning their ID. The name is
/// the part of the email before the `@`.
pub async fn register_as(ctx: &Context, email: &str, role: Role) -> i32 {
    let name = email.split('@').next().unwrap_or(email).to_string();
    let user = ctx
        .db
        .create_user(email.to_string(), hash_password("pass").unwrap(), name)
        .await
        .unwrap()
        .unwrap();
    assert!(ctx.db.set_role(user.id, role).await.unwrap());
    user.id
}

/// The actor for a user, looking up their children if they're a parent.
pub async fn actor(ctx: &Context, id: i32, role: Role) -> Actor {
    Actor {
        id,
        role,
        children: ctx.db.get_children(id).await.unwrap(),
    }
}
