use axum::{Json, extract::State, http::HeaderMap};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState};
use crate::db::AuditActor;
use crate::entities::audit_logs;
use crate::services::{AuditAction, AuditEntry, Identity};

/// Listing cap; the log itself is unbounded.
const MAX_AUDIT_ROWS: u64 = 100;

#[derive(Debug, Serialize)]
pub struct AuditActorDto {
    pub id: i32,
    pub username: String,
    pub role_id: i32,
}

#[derive(Debug, Serialize)]
pub struct AuditLogDto {
    pub id: i64,
    pub user_id: Option<i32>,
    pub action_type: String,
    pub table_name: Option<String>,
    pub record_id: Option<i32>,
    pub ip_address: Option<String>,
    pub details: Option<Value>,
    pub created_at: String,
    pub user: Option<AuditActorDto>,
}

impl AuditLogDto {
    fn from_row(log: audit_logs::Model, actor: Option<AuditActor>) -> Self {
        // Details were serialized on the way in; a row that predates the
        // JSON convention is surfaced verbatim as a string.
        let details = log
            .details
            .map(|raw| serde_json::from_str(&raw).unwrap_or(Value::String(raw)));

        Self {
            id: log.id,
            user_id: log.user_id,
            action_type: log.action_type,
            table_name: log.table_name,
            record_id: log.record_id,
            ip_address: log.ip_address,
            details,
            created_at: log.created_at,
            user: actor.map(|a| AuditActorDto {
                id: a.id,
                username: a.username,
                role_id: a.role_id,
            }),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuditLogsResponse {
    pub logs: Vec<AuditLogDto>,
    pub total: usize,
}

/// GET /audit
/// Most-recent audit events with their actors, admin only. Viewing the
/// log is itself an audited action.
pub async fn list_audit_logs(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    axum::Extension(identity): axum::Extension<Identity>,
) -> Result<Json<ApiResponse<AuditLogsResponse>>, ApiError> {
    let rows = state.store().recent_audit_events(MAX_AUDIT_ROWS).await?;

    let logs: Vec<AuditLogDto> = rows
        .into_iter()
        .map(|(log, actor)| AuditLogDto::from_row(log, actor))
        .collect();
    let total = logs.len();

    state.audit().record_detached(AuditEntry {
        actor_id: Some(identity.id),
        action: AuditAction::ViewAuditLogs,
        subject_table: Some("audit_logs"),
        subject_id: None,
        source_ip: super::auth::client_ip(&headers),
        details: json!({
            "endpoint": "/api/audit",
            "records_viewed": total,
        }),
    });

    Ok(Json(ApiResponse::success(AuditLogsResponse { logs, total })))
}
