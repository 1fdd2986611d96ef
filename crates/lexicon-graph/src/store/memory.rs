//! In-process graph store backed by concurrent maps.

use std::collections::HashMap;
use std::path::Path;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::model::{Depth, EdgeRecord, NeighborRecord, NodeRecord, SearchField};
use crate::store::{GraphStore, Result, StoreCounters, StoreError, StoreStats};

/// On-disk fixture shape for seeding a [`MemoryGraphStore`].
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GraphFixture {
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub edges: Vec<EdgeRecord>,
}

/// Thread-safe in-memory lexicon.
///
/// The mutation API exists for fixture loading and tests; the service only
/// reads through [`GraphStore`].
#[derive(Debug)]
pub struct MemoryGraphStore {
    /// Nodes by canonical id.
    nodes: DashMap<String, NodeRecord>,
    /// Phonetic reading -> ids (exact).
    phonetic_index: DashMap<String, Vec<String>>,
    /// Lowercased transliteration -> ids.
    transliteration_index: DashMap<String, Vec<String>>,
    /// Lowercased translation -> ids.
    translation_index: DashMap<String, Vec<String>>,
    /// Outgoing edges by source id.
    outgoing: DashMap<String, Vec<EdgeRecord>>,
    /// Incoming edges by target id.
    incoming: DashMap<String, Vec<EdgeRecord>>,
    counters: StoreCounters,
}

impl MemoryGraphStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            nodes: DashMap::new(),
            phonetic_index: DashMap::new(),
            transliteration_index: DashMap::new(),
            translation_index: DashMap::new(),
            outgoing: DashMap::new(),
            incoming: DashMap::new(),
            counters: StoreCounters::default(),
        }
    }

    /// Load a JSON fixture file into a fresh store.
    pub fn from_fixture_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Fixture(format!("read {}: {}", path.display(), e)))?;
        let fixture: GraphFixture = serde_json::from_str(&raw)
            .map_err(|e| StoreError::Fixture(format!("parse {}: {}", path.display(), e)))?;
        Self::from_fixture(fixture)
    }

    /// Build a store from an in-memory fixture.
    pub fn from_fixture(fixture: GraphFixture) -> Result<Self> {
        let store = Self::new();
        for node in fixture.nodes {
            store.add_node(node);
        }
        for edge in fixture.edges {
            store.add_edge(edge)?;
        }
        Ok(store)
    }

    /// Add a node, indexing its searchable attributes.
    pub fn add_node(&self, node: NodeRecord) {
        let id = node.id.clone();
        if let Some(kana) = &node.phonetic_reading {
            self.phonetic_index
                .entry(kana.clone())
                .or_insert_with(Vec::new)
                .push(id.clone());
        }
        if let Some(romaji) = &node.transliteration {
            self.transliteration_index
                .entry(romaji.to_lowercase())
                .or_insert_with(Vec::new)
                .push(id.clone());
        }
        if let Some(gloss) = &node.translation {
            self.translation_index
                .entry(gloss.to_lowercase())
                .or_insert_with(Vec::new)
                .push(id.clone());
        }
        self.nodes.insert(id, node);
    }

    /// Add a directed edge between two existing nodes.
    pub fn add_edge(&self, edge: EdgeRecord) -> Result<()> {
        if !self.nodes.contains_key(&edge.source_id) {
            return Err(StoreError::UnknownNode(edge.source_id.clone()));
        }
        if !self.nodes.contains_key(&edge.target_id) {
            return Err(StoreError::UnknownNode(edge.target_id.clone()));
        }

        self.outgoing
            .entry(edge.source_id.clone())
            .or_insert_with(Vec::new)
            .push(edge.clone());
        self.incoming
            .entry(edge.target_id.clone())
            .or_insert_with(Vec::new)
            .push(edge);

        Ok(())
    }

    /// Get a node by id.
    pub fn get_node(&self, id: &str) -> Option<NodeRecord> {
        self.nodes.get(id).map(|n| n.clone())
    }

    /// Number of nodes in the store.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of stored edges.
    pub fn edge_count(&self) -> usize {
        self.outgoing.iter().map(|e| e.len()).sum()
    }

    /// Every stored edge with `id` as either endpoint, in stored direction.
    fn edges_touching(&self, id: &str) -> Vec<EdgeRecord> {
        let mut edges = self.outgoing.get(id).map(|v| v.clone()).unwrap_or_default();
        if let Some(inbound) = self.incoming.get(id) {
            edges.extend(inbound.iter().cloned());
        }
        edges
    }

    fn records_for_ids(&self, ids: &[String]) -> Vec<NodeRecord> {
        ids.iter()
            .filter_map(|id| self.nodes.get(id).map(|n| n.clone()))
            .collect()
    }
}

impl Default for MemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Sort candidates by weight descending, ties broken by ascending
/// (source, target) so truncation is stable, then truncate.
fn order_candidates(mut rows: Vec<NeighborRecord>, limit: usize) -> Vec<NeighborRecord> {
    rows.sort_by(|a, b| {
        b.edge
            .weight
            .partial_cmp(&a.edge.weight)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.edge.source_id.cmp(&b.edge.source_id))
            .then_with(|| a.edge.target_id.cmp(&b.edge.target_id))
    });
    rows.truncate(limit);
    rows
}

#[async_trait::async_trait]
impl GraphStore for MemoryGraphStore {
    async fn lookup(&self, field: SearchField, term: &str) -> Result<Vec<NodeRecord>> {
        self.counters.record_lookup();

        let nodes = match field {
            SearchField::Orthographic => self.get_node(term).into_iter().collect(),
            SearchField::Phonetic => self
                .phonetic_index
                .get(term)
                .map(|ids| self.records_for_ids(ids.value()))
                .unwrap_or_default(),
            SearchField::Transliteration => self
                .transliteration_index
                .get(&term.to_lowercase())
                .map(|ids| self.records_for_ids(ids.value()))
                .unwrap_or_default(),
            SearchField::Translation => self
                .translation_index
                .get(&term.to_lowercase())
                .map(|ids| self.records_for_ids(ids.value()))
                .unwrap_or_default(),
        };
        Ok(nodes)
    }

    async fn neighborhood(
        &self,
        center_id: &str,
        depth: Depth,
        per_hop_limit: u32,
    ) -> Result<Vec<NeighborRecord>> {
        self.counters.record_traversal();
        let limit = per_hop_limit as usize;

        let mut hop1 = Vec::new();
        for edge in self.edges_touching(center_id) {
            let Some(far_id) = edge.other_endpoint(center_id) else {
                continue;
            };
            let Some(node) = self.nodes.get(far_id).map(|n| n.clone()) else {
                continue;
            };
            hop1.push(NeighborRecord { node, edge, hop: 1 });
        }
        let hop1 = order_candidates(hop1, limit);

        let mut records = hop1.clone();

        if depth == Depth::Two {
            let frontier: Vec<String> = hop1.iter().map(|r| r.node.id.clone()).collect();
            // One row per ordered pair, max weight kept, like DISTINCT
            // projection on the query side.
            let mut pool: HashMap<(String, String), NeighborRecord> = HashMap::new();
            for near in &frontier {
                for edge in self.edges_touching(near) {
                    let Some(far_id) = edge.other_endpoint(near) else {
                        continue;
                    };
                    if far_id == center_id {
                        continue;
                    }
                    let Some(node) = self.nodes.get(far_id).map(|n| n.clone()) else {
                        continue;
                    };
                    let key = (edge.source_id.clone(), edge.target_id.clone());
                    match pool.get(&key) {
                        Some(existing) if existing.edge.weight >= edge.weight => {}
                        _ => {
                            pool.insert(key, NeighborRecord { node, edge, hop: 2 });
                        }
                    }
                }
            }
            let hop2 = order_candidates(pool.into_values().collect(), limit);
            records.extend(hop2);
        }

        Ok(records)
    }

    fn stats(&self) -> StoreStats {
        self.counters.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_store() -> MemoryGraphStore {
        let store = MemoryGraphStore::new();
        store.add_node(
            NodeRecord::new("日本")
                .with_phonetic("にほん")
                .with_transliteration("nihon")
                .with_translation("Japan")
                .with_difficulty("N5")
                .with_pos("noun"),
        );
        store.add_node(
            NodeRecord::new("日の丸")
                .with_phonetic("ひのまる")
                .with_transliteration("hinomaru")
                .with_translation("national flag"),
        );
        store.add_node(
            NodeRecord::new("国旗")
                .with_phonetic("こっき")
                .with_transliteration("kokki")
                .with_translation("national flag"),
        );
        store
            .add_edge(EdgeRecord::new("日本", "日の丸", 0.7).with_mutual_sense("national symbol"))
            .unwrap();
        store.add_edge(EdgeRecord::new("日の丸", "国旗", 0.9)).unwrap();
        store
    }

    #[tokio::test]
    async fn test_lookup_by_each_field() {
        let store = sample_store();

        let hit = store.lookup(SearchField::Orthographic, "日本").await.unwrap();
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].id, "日本");

        let hit = store.lookup(SearchField::Phonetic, "にほん").await.unwrap();
        assert_eq!(hit[0].id, "日本");

        let hit = store.lookup(SearchField::Transliteration, "NIHON").await.unwrap();
        assert_eq!(hit[0].id, "日本");

        let hit = store.lookup(SearchField::Translation, "japan").await.unwrap();
        assert_eq!(hit[0].id, "日本");
    }

    #[tokio::test]
    async fn test_lookup_misses_are_empty() {
        let store = sample_store();
        let hit = store.lookup(SearchField::Orthographic, "火山").await.unwrap();
        assert!(hit.is_empty());
        // Phonetic is an exact index; romaji does not match it.
        let hit = store.lookup(SearchField::Phonetic, "nihon").await.unwrap();
        assert!(hit.is_empty());
    }

    #[tokio::test]
    async fn test_translation_lookup_can_return_homophones() {
        let store = sample_store();
        let hits = store
            .lookup(SearchField::Translation, "National Flag")
            .await
            .unwrap();
        let mut ids: Vec<_> = hits.iter().map(|n| n.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["国旗", "日の丸"]);
    }

    #[tokio::test]
    async fn test_neighborhood_depth_one() {
        let store = sample_store();
        let rows = store.neighborhood("日本", Depth::One, 50).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].node.id, "日の丸");
        assert_eq!(rows[0].edge.weight, 0.7);
        assert_eq!(rows[0].hop, 1);
    }

    #[tokio::test]
    async fn test_neighborhood_depth_two_skips_back_edges() {
        let store = sample_store();
        let rows = store.neighborhood("日本", Depth::Two, 50).await.unwrap();

        let hop2: Vec<_> = rows.iter().filter(|r| r.hop == 2).collect();
        assert_eq!(hop2.len(), 1);
        assert_eq!(hop2[0].node.id, "国旗");
        // The 日本-日の丸 edge is reachable again from 日の丸 but lands on
        // the center, so it must not reappear at hop 2.
        assert!(!hop2.iter().any(|r| r.node.id == "日本"));
    }

    #[tokio::test]
    async fn test_per_hop_truncation_keeps_strongest() {
        let store = MemoryGraphStore::new();
        store.add_node(NodeRecord::new("c"));
        for (id, weight) in [("w1", 0.9), ("w2", 0.5), ("w3", 0.7)] {
            store.add_node(NodeRecord::new(id));
            store.add_edge(EdgeRecord::new("c", id, weight)).unwrap();
        }

        let rows = store.neighborhood("c", Depth::One, 2).await.unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.node.id.as_str()).collect();
        assert_eq!(ids, vec!["w1", "w3"]);
    }

    #[tokio::test]
    async fn test_truncation_tie_break_is_stable() {
        let store = MemoryGraphStore::new();
        store.add_node(NodeRecord::new("c"));
        for id in ["b", "a", "d"] {
            store.add_node(NodeRecord::new(id));
            store.add_edge(EdgeRecord::new("c", id, 0.5)).unwrap();
        }

        let rows = store.neighborhood("c", Depth::One, 2).await.unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.node.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_add_edge_requires_endpoints() {
        let store = MemoryGraphStore::new();
        store.add_node(NodeRecord::new("a"));
        let err = store.add_edge(EdgeRecord::new("a", "missing", 0.5)).unwrap_err();
        assert!(matches!(err, StoreError::UnknownNode(id) if id == "missing"));
    }

    #[tokio::test]
    async fn test_fixture_file_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "nodes": [
                    {{"id": "犬", "phonetic_reading": "いぬ", "translation": "dog"}},
                    {{"id": "狗", "translation": "dog"}}
                ],
                "edges": [
                    {{"source_id": "犬", "target_id": "狗", "weight": 0.8}}
                ]
            }}"#
        )
        .unwrap();

        let store = MemoryGraphStore::from_fixture_file(file.path()).unwrap();
        assert_eq!(store.node_count(), 2);
        assert_eq!(store.edge_count(), 1);

        let rows = store.neighborhood("犬", Depth::One, 10).await.unwrap();
        assert_eq!(rows[0].node.id, "狗");
        assert_eq!(rows[0].edge.relation_type, "synonym");
    }

    #[test]
    fn test_fixture_parse_error_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = MemoryGraphStore::from_fixture_file(file.path()).unwrap_err();
        assert!(matches!(err, StoreError::Fixture(_)));
    }
}
