use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::entities::audit_logs;

pub mod migrator;
pub mod repositories;

pub use repositories::audit::{AuditActor, NewAuditEvent};
pub use repositories::role::Role;
pub use repositories::user::User;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn role_repo(&self) -> repositories::role::RoleRepository {
        repositories::role::RoleRepository::new(self.conn.clone())
    }

    fn audit_repo(&self) -> repositories::audit::AuditRepository {
        repositories::audit::AuditRepository::new(self.conn.clone())
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.user_repo().get_by_username(username).await
    }

    pub async fn get_user_with_password(
        &self,
        username: &str,
    ) -> Result<Option<(User, String)>> {
        self.user_repo().get_by_username_with_password(username).await
    }

    pub async fn get_user_by_id(&self, id: i32) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.user_repo().list().await
    }

    pub async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role_id: i32,
    ) -> Result<User> {
        self.user_repo().create(username, password_hash, role_id).await
    }

    pub async fn record_failed_attempt(
        &self,
        id: i32,
        expected_count: i32,
        next_count: i32,
        lock_account: bool,
    ) -> Result<()> {
        self.user_repo()
            .record_failed_attempt(id, expected_count, next_count, lock_account)
            .await
    }

    pub async fn reset_failed_attempts(&self, id: i32) -> Result<()> {
        self.user_repo().reset_failed_attempts(id).await
    }

    pub async fn deactivate_user(&self, username: &str) -> Result<bool> {
        self.user_repo().deactivate(username).await
    }

    pub async fn reactivate_user(&self, username: &str) -> Result<bool> {
        self.user_repo().reactivate(username).await
    }

    pub async fn get_role(&self, id: i32) -> Result<Option<Role>> {
        self.role_repo().get(id).await
    }

    pub async fn get_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        self.role_repo().get_by_name(name).await
    }

    pub async fn append_audit_event(&self, event: NewAuditEvent) -> Result<()> {
        self.audit_repo().append(event).await
    }

    pub async fn recent_audit_events(
        &self,
        limit: u64,
    ) -> Result<Vec<(audit_logs::Model, Option<AuditActor>)>> {
        self.audit_repo().recent_with_actor(limit).await
    }
}
