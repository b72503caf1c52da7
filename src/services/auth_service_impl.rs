//! `SeaORM` implementation of the `AuthService` trait.
//!
//! Every terminal branch of the login flow emits exactly one audit event,
//! except unknown-username, which emits none because there is no account
//! identity to attach it to. Audit writes on this path are best-effort:
//! the account-row update and the audit append stay independent so a slow
//! or failing sink cannot leave the account row inconsistent.

use async_trait::async_trait;
use serde_json::json;

use crate::db::Store;
use crate::db::repositories::user::verify_password;
use crate::services::audit::{AuditAction, AuditEntry, AuditService};
use crate::services::auth_service::{
    AccountSummary, AuthError, AuthService, Identity, LoginOutcome,
};
use crate::services::lockout::LockoutPolicy;
use crate::services::token::TokenIssuer;

/// Role name used when an account references a role row that no longer
/// exists. Deliberate fallback, not an error.
const FALLBACK_ROLE: &str = "viewer";

pub struct SeaOrmAuthService {
    store: Store,
    audit: AuditService,
    tokens: TokenIssuer,
    lockout: LockoutPolicy,
}

impl SeaOrmAuthService {
    #[must_use]
    pub const fn new(
        store: Store,
        audit: AuditService,
        tokens: TokenIssuer,
        lockout: LockoutPolicy,
    ) -> Self {
        Self {
            store,
            audit,
            tokens,
            lockout,
        }
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn login(
        &self,
        username: &str,
        password: &str,
        source_ip: Option<String>,
    ) -> Result<LoginOutcome, AuthError> {
        // Account lookup. Unknown username ends the attempt without an
        // audit event and with the same message as a wrong password.
        let Some((user, password_hash)) = self.store.get_user_with_password(username).await? else {
            return Err(AuthError::InvalidCredentials);
        };

        // Active check happens before password verification: a disabled
        // account never touches its attempt counter again.
        if !user.is_active {
            self.audit
                .record_best_effort(AuditEntry {
                    actor_id: Some(user.id),
                    action: AuditAction::LoginBlockedInactive,
                    subject_table: Some("users"),
                    subject_id: Some(user.id),
                    source_ip,
                    details: json!({
                        "username": user.username,
                        "reason": "Account is disabled (locked).",
                    }),
                })
                .await;
            return Err(AuthError::AccountDisabled);
        }

        let is_match = verify_password(password, &password_hash)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        if !is_match {
            let current = u32::try_from(user.failed_attempt_count).unwrap_or(0);
            let decision = self.lockout.on_failed_attempt(current);
            let next_count = i32::try_from(decision.next_count).unwrap_or(i32::MAX);

            // One conditional row update covers both the counter and, when
            // locking, the active flag.
            self.store
                .record_failed_attempt(
                    user.id,
                    user.failed_attempt_count,
                    next_count,
                    decision.lock_account,
                )
                .await?;

            if decision.lock_account {
                self.audit
                    .record_best_effort(AuditEntry {
                        actor_id: Some(user.id),
                        action: AuditAction::AccountLocked,
                        subject_table: Some("users"),
                        subject_id: Some(user.id),
                        source_ip,
                        details: json!({
                            "username": user.username,
                            "attempts": decision.next_count,
                            "status": "LOCKED",
                        }),
                    })
                    .await;
                return Err(AuthError::AccountLocked {
                    threshold: self.lockout.threshold(),
                });
            }

            self.audit
                .record_best_effort(AuditEntry {
                    actor_id: Some(user.id),
                    action: AuditAction::LoginFailed,
                    subject_table: Some("users"),
                    subject_id: Some(user.id),
                    source_ip,
                    details: json!({
                        "reason": "Incorrect password attempt",
                        "attempt_count": decision.next_count,
                    }),
                })
                .await;
            return Err(AuthError::InvalidCredentials);
        }

        // Success: the counter resets, but only accounts that actually
        // accumulated failures pay for the extra write.
        if user.failed_attempt_count > 0 {
            self.store.reset_failed_attempts(user.id).await?;
        }

        let role_name = match self.store.get_role(user.role_id).await? {
            Some(role) => role.name.to_lowercase(),
            None => FALLBACK_ROLE.to_string(),
        };

        let token = self
            .tokens
            .issue(user.id, &user.username, user.role_id, &role_name)
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        self.audit
            .record_best_effort(AuditEntry {
                actor_id: Some(user.id),
                action: AuditAction::UserLogin,
                subject_table: Some("users"),
                subject_id: Some(user.id),
                source_ip,
                details: json!({
                    "username": user.username.clone(),
                    "role": role_name,
                }),
            })
            .await;

        Ok(LoginOutcome {
            token,
            user: AccountSummary {
                id: user.id,
                username: user.username,
                role_id: user.role_id,
            },
        })
    }

    async fn logout(&self, identity: &Identity, source_ip: Option<String>) {
        self.audit.record_detached(AuditEntry {
            actor_id: Some(identity.id),
            action: AuditAction::UserLogout,
            subject_table: None,
            subject_id: None,
            source_ip,
            details: json!({ "detail": "Manual logout from client" }),
        });
    }

    async fn session_check(
        &self,
        identity: &Identity,
        source_ip: Option<String>,
    ) -> Result<(), AuthError> {
        self.audit
            .record(AuditEntry {
                actor_id: Some(identity.id),
                action: AuditAction::SessionCheck,
                subject_table: Some("users"),
                subject_id: Some(identity.id),
                source_ip,
                details: json!({ "endpoint": "/api/auth/me" }),
            })
            .await?;

        Ok(())
    }
}
