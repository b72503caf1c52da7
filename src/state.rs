use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

use crate::config::Config;
use crate::db::Store;
use crate::services::{
    AuditService, AuthService, LockoutPolicy, SeaOrmAuthService, TokenIssuer,
};

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub audit: AuditService,

    pub tokens: TokenIssuer,

    pub auth_service: Arc<dyn AuthService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let audit = AuditService::new(store.clone());

        let secret = if config.security.token_secret.is_empty() {
            warn!("No token secret configured; using a random one (tokens will not survive restarts)");
            TokenIssuer::random_secret()
        } else {
            config.security.token_secret.clone()
        };
        let tokens = TokenIssuer::new(secret, config.security.token_ttl_hours);

        let lockout = LockoutPolicy::new(config.security.lockout_threshold);

        let auth_service = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            audit.clone(),
            tokens.clone(),
            lockout,
        )) as Arc<dyn AuthService>;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            store,
            audit,
            tokens,
            auth_service,
        })
    }

    pub async fn config(&self) -> Config {
        self.config.read().await.clone()
    }
}
