// src/error.rs
use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;
use warp::http::StatusCode;
use warp::reject::Reject;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Username already exists: {0}")]
    UsernameTaken(String),

    #[error("User not found: {0}")]
    UserNotFound(i64),

    #[error("Insufficient cash: needed {needed}, available {available}")]
    InsufficientCash { needed: Decimal, available: Decimal },

    #[error("Insufficient shares: requested {requested}, held {held}")]
    InsufficientShares { requested: i64, held: i64 },
}

pub type Result<T> = std::result::Result<T, DatabaseError>;

#[derive(Error, Debug)]
pub enum QuoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Quote provider rate limit: {0}")]
    RateLimited(String),

    #[error("Invalid price for {symbol}: {raw}")]
    InvalidPrice { symbol: String, raw: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// User-facing failure, rendered as an apology page with `status`.
#[derive(Debug)]
pub struct Apology {
    pub message: String,
    pub status: StatusCode,
}

impl Apology {
    pub fn new(message: impl Into<String>) -> Self {
        Apology {
            message: message.into(),
            status: StatusCode::BAD_REQUEST,
        }
    }

    pub fn with_status(message: impl Into<String>, status: StatusCode) -> Self {
        Apology {
            message: message.into(),
            status,
        }
    }

    pub fn internal() -> Self {
        Apology::with_status(
            "Something went wrong, please try again",
            StatusCode::INTERNAL_SERVER_ERROR,
        )
    }
}

impl fmt::Display for Apology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.status.as_u16())
    }
}

impl std::error::Error for Apology {}

impl Reject for Apology {}

impl From<DatabaseError> for Apology {
    fn from(e: DatabaseError) -> Self {
        log::error!("Store failure: {}", e);
        Apology::internal()
    }
}

/// Raised by the session gate when no valid session cookie is present.
#[derive(Debug)]
pub struct Unauthenticated;

impl Reject for Unauthenticated {}
