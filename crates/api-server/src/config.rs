//! Server configuration from environment variables.
//!
//! Store and generator connection settings live with their own crates
//! (`lexicon_graph::StoreConfig`, `generation_client::GeneratorConfig`);
//! this covers everything the server itself decides.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Which [`lexicon_graph::GraphStore`] implementation backs the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// In-process store, optionally seeded from a JSON fixture.
    Memory,
    /// Deployed property-graph store reached over HTTP.
    Http,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub store_mode: StoreMode,
    /// Fixture file loaded into the memory store on startup.
    pub store_fixture: Option<PathBuf>,
    /// Per-hop candidate limit when the request does not pass one.
    pub default_hop_limit: u32,
    /// Upper bound on the request `limit` parameter.
    pub max_hop_limit: u32,
    /// SQLite file backing the augmented-content cache.
    pub augment_db_path: PathBuf,
    /// How long the graph endpoint waits for opportunistic augmentation.
    pub augment_wait: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            store_mode: StoreMode::Memory,
            store_fixture: None,
            default_hop_limit: 50,
            max_hop_limit: 200,
            augment_db_path: PathBuf::from("./lexigraph_data/augment.db"),
            augment_wait: Duration::from_millis(800),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let store_mode = match std::env::var("STORE_MODE")
            .map(|v| v.to_ascii_lowercase())
            .ok()
            .as_deref()
        {
            Some("http") => StoreMode::Http,
            _ => StoreMode::Memory,
        };

        Self {
            port: env_parse("PORT", defaults.port),
            store_mode,
            store_fixture: std::env::var("STORE_FIXTURE").ok().map(PathBuf::from),
            default_hop_limit: env_parse("DEFAULT_HOP_LIMIT", defaults.default_hop_limit),
            max_hop_limit: env_parse("MAX_HOP_LIMIT", defaults.max_hop_limit),
            augment_db_path: std::env::var("AUGMENT_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.augment_db_path),
            augment_wait: Duration::from_millis(env_parse(
                "AUGMENT_WAIT_MS",
                defaults.augment_wait.as_millis() as u64,
            )),
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
