// src/accounts.rs
use crate::auth::{hash_password, verify_dummy, verify_password};
use crate::db::Database;
use crate::error::{Apology, DatabaseError};
use crate::models::User;
use log::{error, info, warn};
use rust_decimal::Decimal;
use tokio::task;
use warp::http::StatusCode;

pub const INVALID_CREDENTIALS: &str = "invalid username and/or password";

fn present(field: Option<&str>) -> Option<&str> {
    field.filter(|v| !v.is_empty())
}

fn present_username(field: Option<&str>) -> Option<&str> {
    present(field.map(str::trim))
}

fn hashing_failed(e: task::JoinError) -> Apology {
    error!("Password hashing task failed: {}", e);
    Apology::internal()
}

/// Hashes on the blocking pool; the key stretching is CPU bound.
async fn hash_in_background(password: &str) -> Result<String, Apology> {
    let password = password.to_string();
    task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(hashing_failed)
}

/// Checks `password` against `stored`, or burns a dummy verification when there is no hash.
async fn verify_in_background(stored: Option<String>, password: &str) -> Result<bool, Apology> {
    let password = password.to_string();
    task::spawn_blocking(move || match stored {
        Some(hash) => verify_password(&hash, &password),
        None => verify_dummy(&password),
    })
    .await
    .map_err(hashing_failed)
}

pub async fn register(
    db: &Database,
    initial_cash: Decimal,
    username: Option<&str>,
    password: Option<&str>,
    confirmation: Option<&str>,
) -> Result<User, Apology> {
    let username = present_username(username)
        .ok_or_else(|| Apology::new("Providing a username is required"))?;
    let password = present(password).ok_or_else(|| Apology::new("Password is required"))?;
    let confirmation =
        present(confirmation).ok_or_else(|| Apology::new("Confirming password is required"))?;

    if db.find_user_by_username(username).await?.is_some() {
        return Err(Apology::new("Username already exists"));
    }
    if password != confirmation {
        return Err(Apology::new(
            "Please ensure that the passwords entered in both fields are identical. Passwords are case-sensitive.",
        ));
    }

    let hash = hash_in_background(password).await?;
    match db.create_user(username, &hash, initial_cash).await {
        Ok(user) => Ok(user),
        Err(DatabaseError::UsernameTaken(_)) => Err(Apology::new("Username already exists")),
        Err(e) => Err(e.into()),
    }
}

/// Unknown usernames and wrong passwords fail with the same message.
pub async fn login(
    db: &Database,
    username: Option<&str>,
    password: Option<&str>,
) -> Result<User, Apology> {
    let username = present_username(username)
        .ok_or_else(|| Apology::with_status("must provide username", StatusCode::FORBIDDEN))?;
    let password = present(password)
        .ok_or_else(|| Apology::with_status("must provide password", StatusCode::FORBIDDEN))?;

    let user = db.find_user_by_username(username).await?;
    let stored = user.as_ref().map(|u| u.hash.clone());
    let verified = if verify_in_background(stored, password).await? {
        user
    } else {
        None
    };

    match verified {
        Some(user) => {
            info!("User {} logged in", user.id);
            Ok(user)
        }
        None => {
            warn!("Failed login for {:?}", username);
            Err(Apology::with_status(INVALID_CREDENTIALS, StatusCode::FORBIDDEN))
        }
    }
}

pub async fn change_password(
    db: &Database,
    user_id: i64,
    current_password: Option<&str>,
    new_password: Option<&str>,
    confirmation: Option<&str>,
) -> Result<(), Apology> {
    let (Some(current), Some(new), Some(confirmation)) = (
        present(current_password),
        present(new_password),
        present(confirmation),
    ) else {
        return Err(Apology::new("You must fill all fields"));
    };

    let user = db.get_user(user_id).await?;
    if !verify_in_background(Some(user.hash), current).await? {
        return Err(Apology::with_status("Invalid password", StatusCode::FORBIDDEN));
    }
    if new != confirmation {
        return Err(Apology::new(
            "Please ensure that the new password and confirmation fields match.",
        ));
    }

    let hash = hash_in_background(new).await?;
    db.update_password_hash(user_id, &hash).await?;
    Ok(())
}
