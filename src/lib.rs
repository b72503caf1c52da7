pub mod api;
mod cli;
pub mod config;
pub mod db;
pub mod entities;
pub mod services;
pub mod state;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
pub use config::Config;
use db::Store;
use db::repositories::user::hash_password;

pub async fn run() -> anyhow::Result<()> {
    let config = Config::load()?;
    config.validate()?;

    let prometheus_handle = if config.observability.metrics_enabled {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let builder = PrometheusBuilder::new();
        let handle = builder
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        info!("Prometheus metrics recorder initialized");
        Some(handle)
    } else {
        None
    };

    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let fmt_layer = tracing_subscriber::fmt::layer();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    if config.observability.loki_enabled {
        let url = url::Url::parse(&config.observability.loki_url).context("Invalid Loki URL")?;

        let (layer, task) = tracing_loki::builder()
            .label("app", "docuvault")?
            .extra_field("env", "production")?
            .build_url(url)?;

        tokio::spawn(task);

        registry.with(layer).init();
        info!(
            "Loki logging initialized at {}",
            config.observability.loki_url
        );
    } else {
        registry.init();
    }

    let cli = Cli::parse();

    match cli.command {
        None | Some(Commands::Serve) => run_server(config, prometheus_handle).await,

        Some(Commands::CreateUser {
            username,
            role,
            password,
        }) => cmd_create_user(&config, &username, &role, &password).await,

        Some(Commands::ListUsers) => cmd_list_users(&config).await,

        Some(Commands::DisableUser { username }) => cmd_disable_user(&config, &username).await,

        Some(Commands::UnlockUser { username }) => cmd_unlock_user(&config, &username).await,
    }
}

async fn run_server(
    config: Config,
    prometheus_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
) -> anyhow::Result<()> {
    info!(
        "Docuvault v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let port = config.server.port;
    let state = api::create_app_state_from_config(config, prometheus_handle).await?;

    let app = api::router(state).await;
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let server_handle = tokio::spawn(async move {
        info!("Web API running at http://0.0.0.0:{port}");
        if let Err(e) = axum::serve(listener, app).await {
            error!("Web server error: {}", e);
        }
    });

    info!("Server running. Press Ctrl+C to stop.");

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received");
        }
        Err(e) => {
            error!("Error listening for shutdown: {}", e);
        }
    }

    server_handle.abort();
    info!("Server stopped");

    Ok(())
}

async fn open_store(config: &Config) -> anyhow::Result<Store> {
    Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await
}

async fn cmd_create_user(
    config: &Config,
    username: &str,
    role: &str,
    password: &str,
) -> anyhow::Result<()> {
    if username.is_empty() {
        anyhow::bail!("Username cannot be empty");
    }
    if password.len() < 8 {
        anyhow::bail!("Password must be at least 8 characters");
    }

    let store = open_store(config).await?;

    let role = store
        .get_role_by_name(&role.to_lowercase())
        .await?
        .with_context(|| format!("Unknown role '{role}' (expected admin, editor or viewer)"))?;

    if store.get_user_by_username(username).await?.is_some() {
        anyhow::bail!("Username '{username}' is already taken");
    }

    let password_hash = hash_password(password, Some(&config.security))?;
    let user = store.create_user(username, &password_hash, role.id).await?;

    println!("Created user '{}' (id {}, role {})", user.username, user.id, role.name);
    Ok(())
}

async fn cmd_list_users(config: &Config) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let users = store.list_users().await?;

    if users.is_empty() {
        println!("No accounts.");
        return Ok(());
    }

    println!("{:<5} {:<24} {:<8} {:<8} {}", "ID", "USERNAME", "ROLE", "ACTIVE", "FAILED");
    for user in users {
        let role_name = store
            .get_role(user.role_id)
            .await?
            .map_or_else(|| "?".to_string(), |r| r.name);

        println!(
            "{:<5} {:<24} {:<8} {:<8} {}",
            user.id, user.username, role_name, user.is_active, user.failed_attempt_count
        );
    }

    Ok(())
}

async fn cmd_disable_user(config: &Config, username: &str) -> anyhow::Result<()> {
    let store = open_store(config).await?;

    if store.deactivate_user(username).await? {
        println!("Account '{username}' disabled.");
    } else {
        println!("No account named '{username}'.");
    }

    Ok(())
}

async fn cmd_unlock_user(config: &Config, username: &str) -> anyhow::Result<()> {
    let store = open_store(config).await?;

    if store.reactivate_user(username).await? {
        println!("Account '{username}' reactivated.");
    } else {
        println!("No account named '{username}'.");
    }

    Ok(())
}
