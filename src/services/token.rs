//! Session token issuer.
//!
//! Mints and validates signed JWTs carrying identity and role claims. The
//! auth flow requests issuance and never stores tokens; validity lives
//! entirely in the signature and expiry.

use anyhow::{Context, Result};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Signed claim set bound to one authenticated account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account id as a string (JWT subject convention)
    pub sub: String,
    pub username: String,
    pub role_id: i32,
    /// Lower-case role name resolved at login time
    pub role: String,
    /// Expiration timestamp (seconds since epoch)
    pub exp: usize,
}

#[derive(Clone)]
pub struct TokenIssuer {
    secret: String,
    expiration_hours: i64,
}

impl TokenIssuer {
    #[must_use]
    pub const fn new(secret: String, expiration_hours: i64) -> Self {
        Self {
            secret,
            expiration_hours,
        }
    }

    /// Random 64-char hex secret for deployments that did not configure one.
    /// Tokens signed with it do not survive a restart.
    #[must_use]
    pub fn random_secret() -> String {
        use rand::Rng;

        let mut rng = rand::rng();
        let bytes: [u8; 32] = rng.random();

        bytes.iter().fold(String::with_capacity(64), |mut acc, b| {
            use std::fmt::Write;
            let _ = write!(acc, "{b:02x}");
            acc
        })
    }

    pub fn issue(
        &self,
        account_id: i32,
        username: &str,
        role_id: i32,
        role: &str,
    ) -> Result<String> {
        let expiration = Utc::now()
            .checked_add_signed(chrono::Duration::hours(self.expiration_hours))
            .context("Invalid expiry timestamp")?
            .timestamp();

        let claims = Claims {
            sub: account_id.to_string(),
            username: username.to_string(),
            role_id,
            role: role.to_string(),
            exp: usize::try_from(expiration).context("Expiry before epoch")?,
        };

        debug!(
            "Issuing session token for {username} ({account_id}), expires in {}h",
            self.expiration_hours
        );

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .context("Failed to sign session token")
    }

    pub fn validate(&self, token: &str) -> Result<Claims> {
        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .context("Invalid or expired token")?;

        Ok(decoded.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_and_validate_round_trip() {
        let issuer = TokenIssuer::new("test-secret-key-12345".to_string(), 12);

        let token = issuer.issue(42, "alice", 2, "editor").unwrap();
        assert!(!token.is_empty());

        let claims = issuer.validate(&token).unwrap();
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.role_id, 2);
        assert_eq!(claims.role, "editor");
    }

    #[test]
    fn malformed_token_rejected() {
        let issuer = TokenIssuer::new("test-secret-key-12345".to_string(), 12);

        assert!(issuer.validate("invalid.token.here").is_err());
    }

    #[test]
    fn wrong_secret_rejected() {
        let issuer = TokenIssuer::new("secret-one".to_string(), 12);
        let other = TokenIssuer::new("secret-two".to_string(), 12);

        let token = issuer.issue(1, "admin", 1, "admin").unwrap();
        assert!(other.validate(&token).is_err());
    }

    #[test]
    fn random_secrets_differ() {
        assert_ne!(TokenIssuer::random_secret(), TokenIssuer::random_secret());
    }
}
