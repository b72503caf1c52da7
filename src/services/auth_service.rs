//! Domain service for authentication.
//!
//! Handles the login state machine (lookup, active check, password
//! verification, lockout bookkeeping, token issuance) plus the logout and
//! session-check side channels, with their audit emission contracts.

use serde::Serialize;
use thiserror::Error;

/// Errors specific to authentication operations.
///
/// The wording is caller-visible: unknown-username and wrong-password both
/// surface as [`AuthError::InvalidCredentials`] so responses cannot be used
/// to enumerate usernames.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Your account has been disabled. Please contact an administrator.")]
    AccountDisabled,

    #[error("Incorrect password. Account disabled after {threshold} failed login attempts.")]
    AccountLocked { threshold: u32 },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Caller identity attached to authenticated requests, decoded from the
/// session token. Passed explicitly into each operation; there is no
/// ambient "current user".
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: i32,
    pub username: String,
    pub role_id: i32,
    pub role: String,
}

/// Minimal account projection returned on login.
#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    pub id: i32,
    pub username: String,
    pub role_id: i32,
}

/// Successful login result: a signed session token plus the projection.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: String,
    pub user: AccountSummary,
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Runs the full login state machine for one attempt.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] for an unknown username or
    /// wrong password, [`AuthError::AccountLocked`] when this attempt trips
    /// the threshold, and [`AuthError::AccountDisabled`] for an account
    /// that was already inactive.
    async fn login(
        &self,
        username: &str,
        password: &str,
        source_ip: Option<String>,
    ) -> Result<LoginOutcome, AuthError>;

    /// Records the logout event. Fire-and-forget: the acknowledgement to
    /// the caller never depends on the audit write.
    async fn logout(&self, identity: &Identity, source_ip: Option<String>);

    /// Records a session check ("who am I") for the given identity.
    async fn session_check(
        &self,
        identity: &Identity,
        source_ip: Option<String>,
    ) -> Result<(), AuthError>;
}
