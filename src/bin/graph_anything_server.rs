use std::sync::Arc;

use anyhow::Context;
use axum::{Json, Router, middleware::from_fn_with_state, routing::get};
use graph_anything::api::{AuthenticatedUser, GraphApp, IdentityConfig, identity_middleware};
use graph_anything::config::ServerConfig;
use graph_anything::models::{UpsertUserPayload, UserId};
use graph_anything::operations::GraphRepository;
use graph_anything::session::{SessionUser, possessive_name};
use graph_anything::store::GraphStore;
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
struct ServerApp {
    repository: GraphRepository,
}

impl GraphApp for ServerApp {
    fn repository(&self) -> GraphRepository {
        self.repository.clone()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let store = open_store(&config).await?;
    let repository = GraphRepository::new(store);

    let fallback_user = match (config.require_user_header, config.default_user_id) {
        (false, Some(id)) => {
            let user = SessionUser {
                id: UserId(id),
                email: config.default_user_email.clone(),
                display_name: config
                    .default_user_email
                    .split('@')
                    .next()
                    .unwrap_or_default()
                    .to_string(),
            };
            repository
                .create_user_document(
                    user.id,
                    UpsertUserPayload {
                        email: user.email.clone(),
                        display_name: Some(user.display_name.clone()),
                    },
                )
                .await
                .map_err(|err| anyhow::anyhow!("failed to seed default user: {err}"))?;
            Some(user)
        }
        _ => None,
    };

    let api_v1 = Router::new()
        .route("/healthz", get(health_handler))
        .route("/whoami", get(whoami_handler))
        .merge(graph_anything::api::routes::<ServerApp>());

    let app = Router::new()
        .nest("/api/v1", api_v1)
        .layer(from_fn_with_state(
            IdentityConfig { fallback_user },
            identity_middleware,
        ))
        .with_state(ServerApp { repository });

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind listener on {}", config.bind))?;

    tracing::info!(bind = %config.bind, "graph anything server listening");
    tracing::info!("api base path: /api/v1");
    tracing::info!("identity headers: x-user-id, x-user-email, x-user-name");

    axum::serve(listener, app)
        .await
        .context("graph anything server failed")
}

#[cfg(feature = "sqlx")]
async fn open_store(config: &ServerConfig) -> anyhow::Result<Arc<dyn GraphStore>> {
    use graph_anything::db::{PgGraphStore, create_graph_tables};
    use graph_anything::memory::MemoryGraphStore;
    use sqlx::postgres::PgPoolOptions;

    let Some(database_url) = &config.database_url else {
        tracing::warn!("DATABASE_URL not set; graphs are kept in memory only");
        return Ok(Arc::new(MemoryGraphStore::new()));
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(database_url)
        .await
        .context("failed to connect to postgres")?;
    create_graph_tables(&pool)
        .await
        .context("failed to run graph migrations")?;
    tracing::info!(max_connections = config.max_connections, "connected to postgres");

    Ok(Arc::new(PgGraphStore::new(Arc::new(pool))))
}

#[cfg(not(feature = "sqlx"))]
async fn open_store(config: &ServerConfig) -> anyhow::Result<Arc<dyn GraphStore>> {
    use graph_anything::memory::MemoryGraphStore;

    if config.database_url.is_some() {
        anyhow::bail!("DATABASE_URL is set but this build has no postgres support");
    }
    tracing::warn!("graphs are kept in memory only");
    Ok(Arc::new(MemoryGraphStore::new()))
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "ok": true
    }))
}

async fn whoami_handler(auth_user: AuthenticatedUser) -> Json<serde_json::Value> {
    Json(json!({
        "userId": auth_user.id().to_string(),
        "email": auth_user.0.email,
        "displayName": auth_user.0.display_name,
        "accountHeading": format!("{} Account", possessive_name(&auth_user.0.display_name)),
    }))
}
