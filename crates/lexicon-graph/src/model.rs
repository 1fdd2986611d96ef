//! Core types for the lexical graph.

use serde::{Deserialize, Serialize};

/// Which indexed attribute a center query resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchField {
    /// Exact match on the canonical written form.
    Orthographic,
    /// Exact match on the phonetic reading.
    Phonetic,
    /// Case-insensitive match on the romanized form.
    Transliteration,
    /// Case-insensitive match on the gloss.
    Translation,
}

impl SearchField {
    /// Parse a query-string value, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "orthographic" => Some(Self::Orthographic),
            "phonetic" => Some(Self::Phonetic),
            "transliteration" => Some(Self::Transliteration),
            "translation" => Some(Self::Translation),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Orthographic => "orthographic",
            Self::Phonetic => "phonetic",
            Self::Transliteration => "transliteration",
            Self::Translation => "translation",
        }
    }
}

impl std::fmt::Display for SearchField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Traversal depth. Only one and two hops are supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Depth {
    One,
    Two,
}

impl Depth {
    /// Parse the numeric `depth` query parameter.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::One),
            2 => Some(Self::Two),
            _ => None,
        }
    }
}

/// A vocabulary entry as it appears in API responses.
///
/// Every attribute except `id` is optional and serializes as explicit
/// `null` when absent, so center and neighbor nodes share one shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LexicalNode {
    /// Canonical written form; doubles as the graph identity.
    pub id: String,
    /// Primary display form.
    pub primary_form: Option<String>,
    /// Phonetic reading.
    pub phonetic_reading: Option<String>,
    /// Romanized form.
    pub transliteration: Option<String>,
    /// Gloss in the learner's language.
    pub translation: Option<String>,
    /// Proficiency band the entry is taught at.
    pub difficulty_level: Option<String>,
    /// Thematic domain.
    pub domain: Option<String>,
    /// Part of speech.
    pub part_of_speech: Option<String>,
}

impl From<NodeRecord> for LexicalNode {
    fn from(r: NodeRecord) -> Self {
        Self {
            id: r.id,
            primary_form: r.primary_form,
            phonetic_reading: r.phonetic_reading,
            transliteration: r.transliteration,
            translation: r.translation,
            difficulty_level: r.difficulty_level,
            domain: r.domain,
            part_of_speech: r.part_of_speech,
        }
    }
}

/// A directed synonym association between two entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynonymEdge {
    /// Source entry id.
    pub source_id: String,
    /// Target entry id.
    pub target_id: String,
    /// Association strength [0, 1].
    pub weight: f32,
    /// Relationship label.
    pub relation_type: String,
    /// Shared sense both entries express, when recorded.
    pub mutual_sense: Option<String>,
}

impl From<EdgeRecord> for SynonymEdge {
    fn from(r: EdgeRecord) -> Self {
        Self {
            source_id: r.source_id,
            target_id: r.target_id,
            weight: r.weight,
            relation_type: r.relation_type,
            mutual_sense: r.mutual_sense,
        }
    }
}

/// Assembled query result: deduplicated nodes and links plus the resolved
/// center. `nodes` is sorted by id and `links` by (source, target), so two
/// queries over the same graph serialize identically.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphResult {
    pub nodes: Vec<LexicalNode>,
    pub links: Vec<SynonymEdge>,
    /// The resolved center. Also present in `nodes`.
    pub center: LexicalNode,
}

/// A node row as read from the backing store.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    pub primary_form: Option<String>,
    pub phonetic_reading: Option<String>,
    pub transliteration: Option<String>,
    pub translation: Option<String>,
    pub difficulty_level: Option<String>,
    pub domain: Option<String>,
    pub part_of_speech: Option<String>,
}

impl NodeRecord {
    /// Create a record with the given identity and no attributes.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            primary_form: Some(id.clone()),
            id,
            ..Default::default()
        }
    }

    /// Set the phonetic reading.
    pub fn with_phonetic(mut self, kana: impl Into<String>) -> Self {
        self.phonetic_reading = Some(kana.into());
        self
    }

    /// Set the romanized form.
    pub fn with_transliteration(mut self, romaji: impl Into<String>) -> Self {
        self.transliteration = Some(romaji.into());
        self
    }

    /// Set the gloss.
    pub fn with_translation(mut self, gloss: impl Into<String>) -> Self {
        self.translation = Some(gloss.into());
        self
    }

    /// Set the proficiency band.
    pub fn with_difficulty(mut self, level: impl Into<String>) -> Self {
        self.difficulty_level = Some(level.into());
        self
    }

    /// Set the thematic domain.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Set the part of speech.
    pub fn with_pos(mut self, pos: impl Into<String>) -> Self {
        self.part_of_speech = Some(pos.into());
        self
    }
}

/// An edge row as read from the backing store. Direction is the stored
/// direction; no reverse edge is ever synthesized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub source_id: String,
    pub target_id: String,
    pub weight: f32,
    #[serde(default = "default_relation")]
    pub relation_type: String,
    #[serde(default)]
    pub mutual_sense: Option<String>,
}

fn default_relation() -> String {
    "synonym".to_string()
}

impl EdgeRecord {
    /// Create a synonym edge. Weight is clamped to [0, 1].
    pub fn new(source: impl Into<String>, target: impl Into<String>, weight: f32) -> Self {
        Self {
            source_id: source.into(),
            target_id: target.into(),
            weight: weight.clamp(0.0, 1.0),
            relation_type: default_relation(),
            mutual_sense: None,
        }
    }

    /// Set the relationship label.
    pub fn with_relation(mut self, relation: impl Into<String>) -> Self {
        self.relation_type = relation.into();
        self
    }

    /// Set the shared sense annotation.
    pub fn with_mutual_sense(mut self, sense: impl Into<String>) -> Self {
        self.mutual_sense = Some(sense.into());
        self
    }

    /// The endpoint opposite `id`, if `id` is one of the endpoints.
    pub fn other_endpoint(&self, id: &str) -> Option<&str> {
        if self.source_id == id {
            Some(&self.target_id)
        } else if self.target_id == id {
            Some(&self.source_id)
        } else {
            None
        }
    }
}

/// One candidate row from a neighborhood fetch: the far node, the edge that
/// reached it, and which hop produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborRecord {
    pub node: NodeRecord,
    pub edge: EdgeRecord,
    pub hop: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_field_parse() {
        assert_eq!(SearchField::parse("phonetic"), Some(SearchField::Phonetic));
        assert_eq!(SearchField::parse("TRANSLATION"), Some(SearchField::Translation));
        assert_eq!(SearchField::parse("fuzzy"), None);
        assert_eq!(SearchField::parse(""), None);
    }

    #[test]
    fn test_depth_parse() {
        assert_eq!(Depth::from_u8(1), Some(Depth::One));
        assert_eq!(Depth::from_u8(2), Some(Depth::Two));
        assert_eq!(Depth::from_u8(0), None);
        assert_eq!(Depth::from_u8(3), None);
    }

    #[test]
    fn test_edge_weight_clamped() {
        assert_eq!(EdgeRecord::new("a", "b", 1.7).weight, 1.0);
        assert_eq!(EdgeRecord::new("a", "b", -0.2).weight, 0.0);
        assert_eq!(EdgeRecord::new("a", "b", 0.7).weight, 0.7);
    }

    #[test]
    fn test_other_endpoint() {
        let edge = EdgeRecord::new("a", "b", 0.5);
        assert_eq!(edge.other_endpoint("a"), Some("b"));
        assert_eq!(edge.other_endpoint("b"), Some("a"));
        assert_eq!(edge.other_endpoint("c"), None);
    }

    #[test]
    fn test_node_serializes_absent_fields_as_null() {
        let node = LexicalNode::from(NodeRecord::new("水"));
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["id"], "水");
        assert_eq!(json["primaryForm"], "水");
        assert!(json["phoneticReading"].is_null());
        assert!(json["partOfSpeech"].is_null());
        // All eight fields are present even when unset.
        assert_eq!(json.as_object().unwrap().len(), 8);
    }

    #[test]
    fn test_edge_record_deserialize_defaults() {
        let edge: EdgeRecord =
            serde_json::from_str(r#"{"source_id":"a","target_id":"b","weight":0.4}"#).unwrap();
        assert_eq!(edge.relation_type, "synonym");
        assert_eq!(edge.mutual_sense, None);
    }
}
