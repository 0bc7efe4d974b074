use std::env;

use crmlite_core::auth::{hash_password, PasswordError};
use crmlite_db::repositories::{RepositoryError, SqlUserRepository, UserRepository};
use secrecy::SecretString;

use crate::commands::{open_migrated, prepare, CommandResult, StepFailure};

pub const PASSWORD_ENV: &str = "CRMLITE_USER_PASSWORD";

/// Provisions a sign-in account. The password comes from `--password` or,
/// failing that, from `CRMLITE_USER_PASSWORD`.
pub fn run(username: &str, password: Option<String>) -> CommandResult {
    let username = username.trim();
    if username.is_empty() {
        return CommandResult::failure("create-user", "input_validation", "username is empty", 2);
    }

    let Some(password) = password.or_else(|| env::var(PASSWORD_ENV).ok()) else {
        return CommandResult::failure(
            "create-user",
            "input_validation",
            format!("no password given; pass --password or set {PASSWORD_ENV}"),
            2,
        );
    };

    let password_hash = match hash_password(&SecretString::from(password)) {
        Ok(hash) => hash,
        Err(PasswordError::Empty) => {
            let message = "password is empty";
            return CommandResult::failure("create-user", "input_validation", message, 2);
        }
        Err(error) => {
            return CommandResult::failure("create-user", "password_hash", error.to_string(), 5);
        }
    };

    let (config, runtime) = match prepare("create-user") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_migrated(&config).await?;
        let users = SqlUserRepository::new(pool.clone());

        let created: Result<i64, StepFailure> =
            match users.create(username, &password_hash).await {
                Ok(user) => Ok(user.id.0),
                Err(RepositoryError::Conflict { .. }) => {
                    Err(("user_exists", format!("user `{username}` already exists"), 5u8))
                }
                Err(error) => Err(("user_create", error.to_string(), 5u8)),
            };

        pool.close().await;
        created
    });

    match result {
        Ok(id) => {
            CommandResult::success("create-user", format!("created user `{username}` (id {id})"))
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("create-user", error_class, message, exit_code)
        }
    }
}
