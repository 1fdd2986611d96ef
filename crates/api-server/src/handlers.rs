//! Request handlers for API endpoints.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;

use augment_cache::{AugmentedContent, Augmentor};
use lexicon_graph::{
    assemble, collect_subgraph, resolve_center, Depth, GraphResult, GraphStore, SearchField,
};

use crate::config::{ServerConfig, StoreMode};
use crate::error::ApiError;

// ============================================================================
// Application State
// ============================================================================

/// Shared application state: the graph store behind its read contract and
/// the augmentation service.
pub struct AppState {
    pub store: Arc<dyn GraphStore>,
    pub augmentor: Augmentor,
    pub generator_configured: bool,
    pub config: ServerConfig,
}

pub type SharedState = Arc<AppState>;

// ============================================================================
// Health Check
// ============================================================================

pub async fn health_check(State(state): State<SharedState>) -> Json<serde_json::Value> {
    let mode = match state.config.store_mode {
        StoreMode::Memory => "memory",
        StoreMode::Http => "http",
    };

    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "store": {
            "mode": mode,
            "stats": state.store.stats(),
        },
        "augmentation": {
            "generatorConfigured": state.generator_configured,
            "stats": state.augmentor.stats(),
        },
    }))
}

// ============================================================================
// Graph Query
// ============================================================================

/// Raw `/lexical/graph` query string. Everything arrives as an optional
/// string and is validated in one place, before any store call.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphParams {
    #[serde(default)]
    pub center: Option<String>,
    #[serde(default)]
    pub depth: Option<String>,
    #[serde(default)]
    pub search_field: Option<String>,
    #[serde(default)]
    pub limit: Option<String>,
    #[serde(default)]
    pub augment: Option<String>,
}

/// A validated graph request.
#[derive(Debug)]
struct GraphQuery {
    center: String,
    field: SearchField,
    depth: Depth,
    limit: u32,
    augment: bool,
}

impl GraphQuery {
    fn from_params(params: &GraphParams, config: &ServerConfig) -> Result<Self, ApiError> {
        let center = match params.center.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => term.to_string(),
            _ => {
                return Err(ApiError::Validation(
                    "center must be a non-empty string".to_string(),
                ))
            }
        };

        let field = match params.search_field.as_deref() {
            None => SearchField::Orthographic,
            Some(raw) => SearchField::parse(raw).ok_or_else(|| {
                ApiError::Validation(format!(
                    "searchField must be one of orthographic, phonetic, \
                     transliteration, translation; got '{raw}'"
                ))
            })?,
        };

        let depth = match params.depth.as_deref() {
            None => Depth::One,
            Some(raw) => raw
                .parse::<u8>()
                .ok()
                .and_then(Depth::from_u8)
                .ok_or_else(|| ApiError::Validation(format!("depth must be 1 or 2; got '{raw}'")))?,
        };

        let limit = match params.limit.as_deref() {
            None => config.default_hop_limit,
            Some(raw) => {
                let parsed: u32 = raw.parse().map_err(|_| {
                    ApiError::Validation(format!("limit must be an integer; got '{raw}'"))
                })?;
                if parsed < 1 || parsed > config.max_hop_limit {
                    return Err(ApiError::Validation(format!(
                        "limit must be between 1 and {}; got {parsed}",
                        config.max_hop_limit
                    )));
                }
                parsed
            }
        };

        let augment = parse_bool_param("augment", params.augment.as_deref())?;

        Ok(Self {
            center,
            field,
            depth,
            limit,
            augment,
        })
    }
}

fn parse_bool_param(name: &str, raw: Option<&str>) -> Result<bool, ApiError> {
    match raw {
        None | Some("false") | Some("0") => Ok(false),
        Some("true") | Some("1") => Ok(true),
        Some(other) => Err(ApiError::Validation(format!(
            "{name} must be true or false; got '{other}'"
        ))),
    }
}

#[derive(Debug, Serialize)]
pub struct GraphResponse {
    #[serde(flatten)]
    pub graph: GraphResult,
    /// Present only when augmentation was requested and finished in budget.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub augmentation: Option<AugmentedContent>,
}

pub async fn lexical_graph(
    State(state): State<SharedState>,
    Query(params): Query<GraphParams>,
) -> Result<Json<GraphResponse>, ApiError> {
    let query = GraphQuery::from_params(&params, &state.config)?;

    let center = resolve_center(state.store.as_ref(), query.field, &query.center).await?;
    let subgraph =
        collect_subgraph(state.store.as_ref(), &center, query.depth, query.limit).await?;
    let graph = assemble(&center, subgraph);

    let augmentation = if query.augment {
        augment_within_budget(&state, &graph.center.id).await
    } else {
        None
    };

    Ok(Json(GraphResponse {
        graph,
        augmentation,
    }))
}

/// Best-effort enrichment of the center node. Failure or budget expiry
/// degrades to an omitted field; the graph response stays 200. An expired
/// wait only detaches this caller, the generation itself keeps running.
async fn augment_within_budget(state: &AppState, node_id: &str) -> Option<AugmentedContent> {
    let budget = state.config.augment_wait;
    match tokio::time::timeout(budget, state.augmentor.get_or_generate(node_id, false)).await {
        Ok(Ok(content)) => Some(content),
        Ok(Err(e)) => {
            warn!(node_id = %node_id, error = %e, "augmentation skipped");
            None
        }
        Err(_) => {
            warn!(
                node_id = %node_id,
                budget_ms = budget.as_millis() as u64,
                "augmentation exceeded wait budget"
            );
            None
        }
    }
}

// ============================================================================
// Explicit Augmentation
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct AugmentParams {
    #[serde(default)]
    pub force: Option<String>,
}

pub async fn lexical_augment(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(params): Query<AugmentParams>,
) -> Result<Json<AugmentedContent>, ApiError> {
    let force = parse_bool_param("force", params.force.as_deref())?;
    if id.trim().is_empty() {
        return Err(ApiError::Validation(
            "node id must be a non-empty string".to_string(),
        ));
    }

    let content = state.augmentor.get_or_generate(&id, force).await?;
    Ok(Json(content))
}
