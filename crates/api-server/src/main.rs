//! Lexigraph API Server
//!
//! Serves weighted synonym neighborhoods from a lexical graph store, with
//! on-demand generated study content cached per node.
//!
//! ## Environment Variables
//!
//! - `PORT`: Server port (default: 3000)
//! - `STORE_MODE`: `memory` or `http` (default: memory)
//! - `STORE_FIXTURE`: JSON fixture loaded into the memory store (optional)
//! - `STORE_URL`, `STORE_DATABASE`, `STORE_USER`, `STORE_PASSWORD`,
//!   `STORE_TIMEOUT_MS`: HTTP store connection settings
//! - `GENERATOR_URL`, `GENERATOR_API_KEY`, `GENERATOR_MODEL`,
//!   `GENERATOR_TIMEOUT_SECS`: content generator settings (unset
//!   `GENERATOR_URL` disables augmentation)
//! - `AUGMENT_DB_PATH`: SQLite file for the augmentation cache
//! - `AUGMENT_WAIT_MS`: graph-endpoint augmentation wait budget
//! - `DEFAULT_HOP_LIMIT`, `MAX_HOP_LIMIT`: per-hop candidate bounds

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_server::{create_router_with_middleware, AppState, ServerConfig, StoreMode};
use augment_cache::{Augmentor, ContentStore};
use generation_client::GenerationClient;
use lexicon_graph::{GraphStore, HttpGraphStore, MemoryGraphStore};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api_server=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    tracing::info!("Starting Lexigraph API server on {}", addr);

    // Graph store per configured mode
    let store: Arc<dyn GraphStore> = match config.store_mode {
        StoreMode::Http => {
            let store = HttpGraphStore::from_env().expect("failed to build HTTP store client");
            tracing::info!("Graph store: http");
            Arc::new(store)
        }
        StoreMode::Memory => match config.store_fixture {
            Some(ref path) => match MemoryGraphStore::from_fixture_file(path) {
                Ok(store) => {
                    tracing::info!(
                        "Graph store: memory, {} nodes / {} edges from {:?}",
                        store.node_count(),
                        store.edge_count(),
                        path
                    );
                    Arc::new(store)
                }
                Err(e) => {
                    tracing::error!("Failed to load fixture {:?}: {}", path, e);
                    tracing::warn!("Falling back to an empty in-memory store");
                    Arc::new(MemoryGraphStore::new())
                }
            },
            None => {
                tracing::info!("Graph store: memory (empty; set STORE_FIXTURE to seed it)");
                Arc::new(MemoryGraphStore::new())
            }
        },
    };

    // Augmentation cache - fall back to an ephemeral store if the file
    // cannot be opened rather than refusing to serve the graph.
    let content_store = match ContentStore::open(&config.augment_db_path).await {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(
                "Failed to open augmentation cache at {:?}: {}",
                config.augment_db_path,
                e
            );
            tracing::warn!("Augmented content will not survive restarts");
            ContentStore::in_memory()
                .await
                .expect("failed to open in-memory cache")
        }
    };

    let generator = GenerationClient::from_env().expect("failed to build generator client");
    let generator_configured = generator.is_configured();
    if generator_configured {
        tracing::info!("Content generator configured");
    } else {
        tracing::info!("No content generator; augmentation will be served from cache only");
    }

    let state = Arc::new(AppState {
        store,
        augmentor: Augmentor::new(content_store, Arc::new(generator)),
        generator_configured,
        config,
    });

    // Create router with middleware
    let app = create_router_with_middleware(state);

    // Start server with graceful shutdown
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }
}
