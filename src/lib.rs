pub mod api;
pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod store;

pub use api::routes::create_router;
pub use api::{AdapterState, AppState};
pub use error::{AdapterError, Result};
pub use model::*;
pub use store::{Backend, MemoryStore, PostgresStore};

use axum::serve;
use log::info;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::{AppConfig, StoreKind};

/// Router with state for the given backend
pub fn build_app<S: Backend + 'static>(store: S, config: &AppConfig) -> axum::Router {
    let state = Arc::new(AdapterState::new(store));
    create_router::<S>(&config.server).with_state(state)
}

/// Serve an app on an already bound listener
pub async fn serve_app(listener: TcpListener, app: axum::Router) -> anyhow::Result<()> {
    info!("Adapter listening on http://{}", listener.local_addr()?);
    serve(listener, app).await?;
    Ok(())
}

/// Connect the configured backend and serve until shutdown
pub async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.server_address()).await?;

    let app = match config.adapter.store {
        StoreKind::Memory => {
            info!("Using in-memory backend");
            build_app(MemoryStore::new(), &config)
        }
        StoreKind::Postgres => {
            info!("Connecting to PostgreSQL...");
            let database_url = config.database_url();
            let max_connections = config.database.max_connections.unwrap_or(20);
            let store = PostgresStore::new(&database_url, max_connections).await?;
            store.migrate().await?;
            build_app(store, &config)
        }
    };

    serve_app(listener, app).await
}
