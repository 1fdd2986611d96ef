//! Graph store adapter over the property store's transactional HTTP API.
//!
//! Statements are staged with [`StagedQuery`]: parameters are bound up
//! front and the statement text is checked against the bound set before
//! anything is sent, so a query referencing an unbound name fails locally
//! as a construction defect instead of a store round trip.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{error, warn};

use crate::model::{Depth, EdgeRecord, NeighborRecord, NodeRecord, SearchField};
use crate::store::{GraphStore, Result, StoreCounters, StoreError, StoreStats};

/// Pause before the single transient-failure retry.
const RETRY_BACKOFF: Duration = Duration::from_millis(200);

const HOP1_STATEMENT: &str =
    "MATCH (c:Word {kanji: $center})-[r:SYNONYM]-(n:Word) \
     RETURN DISTINCT startNode(r).kanji, endNode(r).kanji, r.strength, r.relation, r.mutual_sense, \
     n.kanji, n.kana, n.romaji, n.english, n.jlpt_level, n.domain, n.pos \
     ORDER BY r.strength DESC LIMIT $limit";

const HOP2_STATEMENT: &str =
    "MATCH (c:Word {kanji: $center})-[:SYNONYM]-(n:Word)-[r:SYNONYM]-(m:Word) \
     WHERE m.kanji <> $center \
     RETURN DISTINCT startNode(r).kanji, endNode(r).kanji, r.strength, r.relation, r.mutual_sense, \
     m.kanji, m.kana, m.romaji, m.english, m.jlpt_level, m.domain, m.pos \
     ORDER BY r.strength DESC LIMIT $limit";

fn lookup_statement(field: SearchField) -> String {
    let pattern = match field {
        SearchField::Orthographic => "MATCH (w:Word {kanji: $term})",
        SearchField::Phonetic => "MATCH (w:Word {kana: $term})",
        SearchField::Transliteration => "MATCH (w:Word) WHERE toLower(w.romaji) = toLower($term)",
        SearchField::Translation => "MATCH (w:Word) WHERE toLower(w.english) = toLower($term)",
    };
    format!(
        "{} RETURN w.kanji, w.kana, w.romaji, w.english, w.jlpt_level, w.domain, w.pos",
        pattern
    )
}

/// Configuration for [`HttpGraphStore`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Store base URL.
    pub base_url: String,
    /// Database name in the transactional endpoint path.
    pub database: String,
    /// Basic auth user.
    pub user: String,
    /// Basic auth password.
    pub password: String,
    /// Per-request timeout. This is the traversal path deadline.
    pub timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:7474".to_string(),
            database: "lexicon".to_string(),
            user: "neo4j".to_string(),
            password: String::new(),
            timeout: Duration::from_millis(2000),
        }
    }
}

impl StoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let timeout_ms = std::env::var("STORE_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(2000);
        Self {
            base_url: std::env::var("STORE_URL").unwrap_or(defaults.base_url),
            database: std::env::var("STORE_DATABASE").unwrap_or(defaults.database),
            user: std::env::var("STORE_USER").unwrap_or(defaults.user),
            password: std::env::var("STORE_PASSWORD").unwrap_or_default(),
            timeout: Duration::from_millis(timeout_ms),
        }
    }
}

/// A parameterized statement staged for the transactional endpoint.
#[derive(Debug, Clone)]
pub struct StagedQuery {
    statement: String,
    parameters: Map<String, Value>,
}

impl StagedQuery {
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            parameters: Map::new(),
        }
    }

    /// Bind a scalar parameter.
    pub fn bind(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.to_string(), value.into());
        self
    }

    pub fn statement(&self) -> &str {
        &self.statement
    }

    /// Check every `$name` reference in the statement against the bound
    /// set. Statements may only reference bound parameters, never names
    /// expected to come from elsewhere.
    pub fn validate(&self) -> Result<()> {
        for name in referenced_parameters(&self.statement) {
            if !self.parameters.contains_key(&name) {
                return Err(StoreError::UnboundParameter(name));
            }
        }
        Ok(())
    }

    fn into_wire(self) -> Value {
        serde_json::json!({
            "statement": self.statement,
            "parameters": self.parameters,
        })
    }
}

/// Extract `$identifier` references from a statement.
fn referenced_parameters(statement: &str) -> Vec<String> {
    static PARAM_RE: OnceLock<Regex> = OnceLock::new();
    let re = PARAM_RE
        .get_or_init(|| Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)").expect("valid literal regex"));
    re.captures_iter(statement).map(|c| c[1].to_string()).collect()
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    #[serde(default)]
    errors: Vec<ServerError>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    #[allow(dead_code)]
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    data: Vec<RowEntry>,
}

#[derive(Debug, Deserialize)]
struct RowEntry {
    row: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ServerError {
    code: String,
    message: String,
}

/// Graph store talking to the deployed lexicon over HTTP.
pub struct HttpGraphStore {
    config: StoreConfig,
    http: Client,
    counters: StoreCounters,
}

impl HttpGraphStore {
    /// Create a new store adapter with the given configuration.
    pub fn new(config: StoreConfig) -> Result<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            config,
            http,
            counters: StoreCounters::default(),
        })
    }

    /// Create a store adapter from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(StoreConfig::from_env())
    }

    fn commit_url(&self) -> String {
        format!(
            "{}/db/{}/tx/commit",
            self.config.base_url.trim_end_matches('/'),
            self.config.database
        )
    }

    /// Run staged statements in one implicit transaction. Transient
    /// failures are retried exactly once; construction and query errors
    /// fail immediately.
    async fn commit(&self, statements: Vec<StagedQuery>) -> Result<Vec<StatementResult>> {
        for staged in &statements {
            if let Err(e) = staged.validate() {
                error!(statement = staged.statement(), "{}", e);
                return Err(e);
            }
        }

        let body = serde_json::json!({
            "statements": statements
                .into_iter()
                .map(StagedQuery::into_wire)
                .collect::<Vec<_>>(),
        });

        match self.send(&body).await {
            Err(e) if e.is_transient() => {
                self.counters.record_retry();
                warn!(error = %e, "transient store failure, retrying once");
                tokio::time::sleep(RETRY_BACKOFF).await;
                self.send(&body).await
            }
            other => other,
        }
    }

    async fn send(&self, body: &Value) -> Result<Vec<StatementResult>> {
        let response = self
            .http
            .post(self.commit_url())
            .basic_auth(&self.config.user, Some(&self.config.password))
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(StoreError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let data: CommitResponse = response.json().await?;
        if let Some(first) = data.errors.into_iter().next() {
            return Err(StoreError::Query {
                code: first.code,
                message: first.message,
            });
        }
        Ok(data.results)
    }
}

#[async_trait::async_trait]
impl GraphStore for HttpGraphStore {
    async fn lookup(&self, field: SearchField, term: &str) -> Result<Vec<NodeRecord>> {
        self.counters.record_lookup();

        let staged = StagedQuery::new(lookup_statement(field)).bind("term", term);
        let results = self.commit(vec![staged]).await?;

        let mut nodes = Vec::new();
        if let Some(first) = results.first() {
            for entry in &first.data {
                nodes.push(node_from_row(&entry.row, 0)?);
            }
        }
        Ok(nodes)
    }

    async fn neighborhood(
        &self,
        center_id: &str,
        depth: Depth,
        per_hop_limit: u32,
    ) -> Result<Vec<NeighborRecord>> {
        self.counters.record_traversal();

        // Both hop statements ship in one request and share one parameter
        // map. Anything else a statement needs must be derivable from the
        // statement text plus these bindings.
        let limit = per_hop_limit as i64;
        let mut statements =
            vec![StagedQuery::new(HOP1_STATEMENT).bind("center", center_id).bind("limit", limit)];
        if depth == Depth::Two {
            statements
                .push(StagedQuery::new(HOP2_STATEMENT).bind("center", center_id).bind("limit", limit));
        }

        let results = self.commit(statements).await?;

        let mut records = Vec::new();
        for (idx, result) in results.iter().enumerate() {
            let hop = (idx + 1) as u8;
            for entry in &result.data {
                let edge = edge_from_row(&entry.row)?;
                let node = node_from_row(&entry.row, 5)?;
                records.push(NeighborRecord { node, edge, hop });
            }
        }
        Ok(records)
    }

    fn stats(&self) -> StoreStats {
        self.counters.snapshot()
    }
}

/// Map a node projection starting at `offset` into a record. Only the
/// identity column is required.
fn node_from_row(row: &[Value], offset: usize) -> Result<NodeRecord> {
    let id = row
        .get(offset)
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::Malformed("node identity column".to_string()))?;
    Ok(NodeRecord {
        id: id.to_string(),
        primary_form: Some(id.to_string()),
        phonetic_reading: opt_string(row, offset + 1),
        transliteration: opt_string(row, offset + 2),
        translation: opt_string(row, offset + 3),
        difficulty_level: opt_string(row, offset + 4),
        domain: opt_string(row, offset + 5),
        part_of_speech: opt_string(row, offset + 6),
    })
}

/// Map the leading edge projection (source, target, strength, relation,
/// mutual_sense) into a record.
fn edge_from_row(row: &[Value]) -> Result<EdgeRecord> {
    let source = row
        .get(0)
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::Malformed("edge source column".to_string()))?;
    let target = row
        .get(1)
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::Malformed("edge target column".to_string()))?;
    let weight = row.get(2).and_then(Value::as_f64).unwrap_or(0.0) as f32;

    let mut edge = EdgeRecord::new(source, target, weight);
    if let Some(relation) = opt_string(row, 3) {
        edge = edge.with_relation(relation);
    }
    if let Some(sense) = opt_string(row, 4) {
        edge = edge.with_mutual_sense(sense);
    }
    Ok(edge)
}

/// Read a column as text. Numeric store properties (jlpt_level kept as an
/// integer in some deployments) are rendered to their decimal form.
fn opt_string(row: &[Value], idx: usize) -> Option<String> {
    match row.get(idx)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
