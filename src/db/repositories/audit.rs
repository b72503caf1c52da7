use anyhow::{Context, Result};
use sea_orm::{DatabaseConnection, EntityTrait, QueryOrder, QuerySelect, Set};

use crate::entities::{audit_logs, users};

/// Fields for one audit row. The repository owns the insert timestamp;
/// everything else comes from the caller.
#[derive(Debug, Clone)]
pub struct NewAuditEvent {
    pub user_id: Option<i32>,
    pub action_type: String,
    pub table_name: Option<String>,
    pub record_id: Option<i32>,
    pub ip_address: Option<String>,
    pub details: Option<String>,
}

/// Actor projection joined onto audit rows for listing.
#[derive(Debug, Clone)]
pub struct AuditActor {
    pub id: i32,
    pub username: String,
    pub role_id: i32,
}

pub struct AuditRepository {
    conn: DatabaseConnection,
}

impl AuditRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Append one event. The log is insert-only; there is no update path.
    pub async fn append(&self, event: NewAuditEvent) -> Result<()> {
        let active = audit_logs::ActiveModel {
            user_id: Set(event.user_id),
            action_type: Set(event.action_type),
            table_name: Set(event.table_name),
            record_id: Set(event.record_id),
            ip_address: Set(event.ip_address),
            details: Set(event.details),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        audit_logs::Entity::insert(active)
            .exec(&self.conn)
            .await
            .context("Failed to append audit event")?;

        Ok(())
    }

    /// Most-recent events, newest first, each with its actor when the
    /// account still exists. The id tiebreak keeps the order strict for
    /// rows created within the same timestamp.
    pub async fn recent_with_actor(
        &self,
        limit: u64,
    ) -> Result<Vec<(audit_logs::Model, Option<AuditActor>)>> {
        let rows = audit_logs::Entity::find()
            .find_also_related(users::Entity)
            .order_by_desc(audit_logs::Column::CreatedAt)
            .order_by_desc(audit_logs::Column::Id)
            .limit(limit)
            .all(&self.conn)
            .await
            .context("Failed to list audit events")?;

        Ok(rows
            .into_iter()
            .map(|(log, user)| {
                let actor = user.map(|u| AuditActor {
                    id: u.id,
                    username: u.username,
                    role_id: u.role_id,
                });
                (log, actor)
            })
            .collect())
    }
}
