//! Audit sink.
//!
//! Thin wrapper over the append-only `audit_logs` table with three write
//! modes. `record` propagates failures to the caller; `record_best_effort`
//! awaits the write but only logs a failure, so a dead sink can never roll
//! back an authentication decision already taken; `record_detached` spawns
//! the write and returns immediately for events the response must not wait
//! on (logout, listing views).

use serde_json::Value;
use tracing::error;

use crate::db::{NewAuditEvent, Store};

/// Closed taxonomy of security-relevant actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    UserLogin,
    LoginFailed,
    LoginBlockedInactive,
    AccountLocked,
    UserLogout,
    SessionCheck,
    ViewAuditLogs,
}

impl AuditAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UserLogin => "USER_LOGIN",
            Self::LoginFailed => "LOGIN_FAILED",
            Self::LoginBlockedInactive => "LOGIN_BLOCKED_INACTIVE",
            Self::AccountLocked => "ACCOUNT_LOCKED",
            Self::UserLogout => "USER_LOGOUT",
            Self::SessionCheck => "SESSION_CHECK",
            Self::ViewAuditLogs => "VIEW_AUDIT_LOGS",
        }
    }
}

/// One event to append. `details` is a JSON value whose schema varies by
/// action; `Value::Null` is stored as an absent payload.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub actor_id: Option<i32>,
    pub action: AuditAction,
    pub subject_table: Option<&'static str>,
    pub subject_id: Option<i32>,
    pub source_ip: Option<String>,
    pub details: Value,
}

impl AuditEntry {
    fn into_event(self) -> NewAuditEvent {
        let details = if self.details.is_null() {
            None
        } else {
            Some(self.details.to_string())
        };

        NewAuditEvent {
            user_id: self.actor_id,
            action_type: self.action.as_str().to_string(),
            table_name: self.subject_table.map(str::to_string),
            record_id: self.subject_id,
            ip_address: self.source_ip,
            details,
        }
    }
}

#[derive(Clone)]
pub struct AuditService {
    store: Store,
}

impl AuditService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    /// Synchronous append; the caller decides what a failure means.
    pub async fn record(&self, entry: AuditEntry) -> anyhow::Result<()> {
        self.store.append_audit_event(entry.into_event()).await
    }

    /// Awaited append whose failure is logged and swallowed. Used on the
    /// login path: the account-row write and the audit write are
    /// independent operations, and a failed audit write must not disturb
    /// the authentication outcome.
    pub async fn record_best_effort(&self, entry: AuditEntry) {
        let action = entry.action;
        if let Err(e) = self.store.append_audit_event(entry.into_event()).await {
            error!(action = action.as_str(), error = %e, "Failed to write audit event");
        }
    }

    /// Fire-and-forget append on a detached task. The caller's response
    /// never waits on the sink.
    pub fn record_detached(&self, entry: AuditEntry) {
        let store = self.store.clone();
        let action = entry.action;
        let event = entry.into_event();

        tokio::spawn(async move {
            if let Err(e) = store.append_audit_event(event).await {
                error!(action = action.as_str(), error = %e, "Failed to write audit event");
            }
        });
    }
}
