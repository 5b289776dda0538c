// src/auth.rs
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::{debug, error};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const SESSION_COOKIE: &str = "session";

pub const PASSWORD_ITERATIONS: u32 = 50_000;
const SALT_LEN: usize = 16;
const HASH_SCHEME: &str = "sha256";

// Verified against when the username is unknown, so both login failures cost the same.
const DUMMY_HASH: &str = "sha256$50000$00000000000000000000000000000000$0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Serialize, Deserialize)]
struct Claims {
    sub: String,
    username: String,
    exp: usize,
}

/// Identity carried by a valid session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub id: i64,
    pub username: String,
}

/// Signs and verifies session tokens.
pub struct SessionKeys {
    secret: Vec<u8>,
    ttl: Duration,
}

impl SessionKeys {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        SessionKeys {
            secret: secret.to_vec(),
            ttl,
        }
    }

    pub fn create_token(&self, user_id: i64, username: &str) -> Option<String> {
        let claims = Claims {
            sub: user_id.to_string(),
            username: username.to_string(),
            exp: (Utc::now() + self.ttl).timestamp() as usize,
        };
        match encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        ) {
            Ok(token) => Some(token),
            Err(e) => {
                error!("Failed to sign session token: {}", e);
                None
            }
        }
    }

    /// Returns the session user for a valid, unexpired token.
    pub fn verify(&self, token: &str) -> Option<SessionUser> {
        let data = match decode::<Claims>(
            token,
            &DecodingKey::from_secret(&self.secret),
            &Validation::default(),
        ) {
            Ok(data) => data,
            Err(e) => {
                debug!("Rejected session token: {}", e);
                return None;
            }
        };
        let id = data.claims.sub.parse().ok()?;
        Some(SessionUser {
            id,
            username: data.claims.username,
        })
    }

    pub fn session_cookie(&self, token: &str) -> String {
        format!(
            "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
            SESSION_COOKIE,
            token,
            self.ttl.num_seconds()
        )
    }
}

pub fn clear_session_cookie() -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", SESSION_COOKIE)
}

fn digest(salt: &[u8], password: &str, iterations: u32) -> [u8; 32] {
    let mut out: [u8; 32] = Sha256::new()
        .chain_update(salt)
        .chain_update(password.as_bytes())
        .finalize()
        .into();
    for _ in 1..iterations {
        out = Sha256::new()
            .chain_update(out)
            .chain_update(salt)
            .chain_update(password.as_bytes())
            .finalize()
            .into();
    }
    out
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub fn hash_password(password: &str) -> String {
    hash_password_with_iterations(password, PASSWORD_ITERATIONS)
}

pub fn hash_password_with_iterations(password: &str, iterations: u32) -> String {
    let salt: [u8; SALT_LEN] = rand::random();
    let hash = digest(&salt, password, iterations.max(1));
    format!(
        "{}${}${}${}",
        HASH_SCHEME,
        iterations.max(1),
        hex::encode(salt),
        hex::encode(hash)
    )
}

pub fn verify_password(stored: &str, password: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(iterations), Some(salt), Some(expected), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    if scheme != HASH_SCHEME {
        return false;
    }
    let (Ok(iterations), Ok(salt), Ok(expected)) = (
        iterations.parse::<u32>(),
        hex::decode(salt),
        hex::decode(expected),
    ) else {
        return false;
    };
    if iterations == 0 {
        return false;
    }
    constant_time_eq(&digest(&salt, password, iterations), &expected)
}

/// Burns the same work as a real verification; always false.
pub fn verify_dummy(password: &str) -> bool {
    verify_password(DUMMY_HASH, password);
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> SessionKeys {
        SessionKeys::new(b"test-secret", Duration::hours(1))
    }

    #[test]
    fn test_password_hash_round_trip() {
        let stored = hash_password_with_iterations("hunter2", 10);
        assert!(stored.starts_with("sha256$10$"));
        assert!(!stored.contains("hunter2"));
        assert!(verify_password(&stored, "hunter2"));
        assert!(!verify_password(&stored, "hunter3"));
    }

    #[test]
    fn test_password_hash_is_salted() {
        let a = hash_password_with_iterations("same", 5);
        let b = hash_password_with_iterations("same", 5);
        assert_ne!(a, b);
        assert!(verify_password(&a, "same"));
        assert!(verify_password(&b, "same"));
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        assert!(!verify_password("", ""));
        assert!(!verify_password("plaintext", "plaintext"));
        assert!(!verify_password("md5$1$00$00", "x"));
        assert!(!verify_password("sha256$0$00$00", "x"));
        assert!(!verify_password("sha256$1$zz$00", "x"));
        assert!(!verify_dummy("anything"));
    }

    #[test]
    fn test_session_token_round_trip() {
        let keys = keys();
        let token = keys.create_token(7, "alice").unwrap();
        assert_eq!(
            keys.verify(&token),
            Some(SessionUser {
                id: 7,
                username: "alice".to_string()
            })
        );
    }

    #[test]
    fn test_session_token_rejects_other_secret() {
        let token = keys().create_token(7, "alice").unwrap();
        let other = SessionKeys::new(b"another-secret", Duration::hours(1));
        assert_eq!(other.verify(&token), None);
        assert_eq!(keys().verify("not-a-token"), None);
    }

    #[test]
    fn test_expired_session_token() {
        let keys = SessionKeys::new(b"test-secret", Duration::hours(-2));
        let token = keys.create_token(7, "alice").unwrap();
        assert_eq!(keys.verify(&token), None);
    }

    #[test]
    fn test_cookies() {
        assert_eq!(
            keys().session_cookie("abc"),
            "session=abc; HttpOnly; SameSite=Lax; Path=/; Max-Age=3600"
        );
        assert!(clear_session_cookie().contains("Max-Age=0"));
    }
}
