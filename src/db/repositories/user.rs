use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tokio::task;

use crate::config::SecurityConfig;
use crate::entities::users;

/// Account data returned from the repository (without the password hash)
#[derive(Debug, Clone)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub role_id: i32,
    pub is_active: bool,
    pub failed_attempt_count: i32,
    pub created_at: String,
    pub updated_at: String,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            role_id: model.role_id,
            is_active: model.is_active,
            failed_attempt_count: model.failed_attempt_count,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Get account by username
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user by username")?;

        Ok(user.map(User::from))
    }

    /// Get account by username along with its password hash (login path)
    pub async fn get_by_username_with_password(
        &self,
        username: &str,
    ) -> Result<Option<(User, String)>> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user by username")?;

        Ok(user.map(|u| {
            let password_hash = u.password_hash.clone();
            (User::from(u), password_hash)
        }))
    }

    /// Get account by ID
    pub async fn get_by_id(&self, id: i32) -> Result<Option<User>> {
        let user = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        Ok(user.map(User::from))
    }

    pub async fn list(&self) -> Result<Vec<User>> {
        let users = users::Entity::find()
            .order_by_asc(users::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list users")?;

        Ok(users.into_iter().map(User::from).collect())
    }

    /// Insert a new account with an already-hashed password.
    pub async fn create(
        &self,
        username: &str,
        password_hash: &str,
        role_id: i32,
    ) -> Result<User> {
        let now = chrono::Utc::now().to_rfc3339();

        let active = users::ActiveModel {
            username: Set(username.to_string()),
            password_hash: Set(password_hash.to_string()),
            role_id: Set(role_id),
            is_active: Set(true),
            failed_attempt_count: Set(0),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to insert user")?;

        Ok(User::from(model))
    }

    /// Persist the outcome of a wrong-password attempt in one conditional
    /// row update. The filter on the previously-read attempt count is the
    /// optimistic guard that serializes concurrent attempts on the same
    /// account row: if another attempt won the race, zero rows match and
    /// the write surfaces as an error instead of silently overwriting.
    pub async fn record_failed_attempt(
        &self,
        id: i32,
        expected_count: i32,
        next_count: i32,
        lock_account: bool,
    ) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();

        let mut update = users::Entity::update_many()
            .col_expr(users::Column::FailedAttemptCount, Expr::value(next_count))
            .col_expr(users::Column::UpdatedAt, Expr::value(now))
            .filter(users::Column::Id.eq(id))
            .filter(users::Column::FailedAttemptCount.eq(expected_count));

        if lock_account {
            update = update.col_expr(users::Column::IsActive, Expr::value(false));
        }

        let result = update
            .exec(&self.conn)
            .await
            .context("Failed to persist failed login attempt")?;

        if result.rows_affected == 0 {
            anyhow::bail!("Concurrent update of attempt count for user {id}");
        }

        Ok(())
    }

    /// Zero the attempt counter after a successful authentication.
    pub async fn reset_failed_attempts(&self, id: i32) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();

        users::Entity::update_many()
            .col_expr(users::Column::FailedAttemptCount, Expr::value(0))
            .col_expr(users::Column::UpdatedAt, Expr::value(now))
            .filter(users::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to reset attempt count")?;

        Ok(())
    }

    /// Disable an account without touching its attempt counter
    /// (administrative disable, indistinguishable from a lockout to
    /// anyone trying to log in). Returns false if no such account exists.
    pub async fn deactivate(&self, username: &str) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();

        let result = users::Entity::update_many()
            .col_expr(users::Column::IsActive, Expr::value(false))
            .col_expr(users::Column::UpdatedAt, Expr::value(now))
            .filter(users::Column::Username.eq(username))
            .exec(&self.conn)
            .await
            .context("Failed to deactivate user")?;

        Ok(result.rows_affected > 0)
    }

    /// Reactivate a locked or disabled account and zero its counter.
    /// Returns false if no such account exists.
    pub async fn reactivate(&self, username: &str) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();

        let result = users::Entity::update_many()
            .col_expr(users::Column::IsActive, Expr::value(true))
            .col_expr(users::Column::FailedAttemptCount, Expr::value(0))
            .col_expr(users::Column::UpdatedAt, Expr::value(now))
            .filter(users::Column::Username.eq(username))
            .exec(&self.conn)
            .await
            .context("Failed to reactivate user")?;

        Ok(result.rows_affected > 0)
    }
}

/// Verify a plaintext password against a stored Argon2id hash.
/// Runs in `spawn_blocking` because Argon2 is CPU-intensive and would
/// stall the async runtime if run inline.
pub async fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    let password = password.to_string();
    let password_hash = password_hash.to_string();

    let is_valid = task::spawn_blocking(move || {
        let parsed_hash = PasswordHash::new(&password_hash)
            .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

        let argon2 = Argon2::default();
        Ok::<bool, anyhow::Error>(
            argon2
                .verify_password(password.as_bytes(), &parsed_hash)
                .is_ok(),
        )
    })
    .await
    .context("Password verification task panicked")??;

    Ok(is_valid)
}

/// Hash a password using Argon2id with optional custom params.
/// If config is None, uses the library defaults.
pub fn hash_password(password: &str, config: Option<&SecurityConfig>) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let argon2 = if let Some(cfg) = config {
        let params = Params::new(
            cfg.argon2_memory_cost_kib,
            cfg.argon2_time_cost,
            cfg.argon2_parallelism,
            None,
        )
        .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    } else {
        Argon2::default()
    };

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}
