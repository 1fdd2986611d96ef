//! Persisted augmented content.

use chrono::{DateTime, Utc};
use generation_client::{GeneratedPayload, GeneratedSections};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One generated content version for one lexicon entry.
///
/// Versions are per node and monotonically increasing. Regeneration never
/// overwrites a row; it appends the next version, so history stays intact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AugmentedContent {
    pub id: Uuid,
    /// Lexicon entry this content belongs to.
    pub node_id: String,
    /// Per-node version, starting at 1.
    pub content_version: i64,
    pub sections: GeneratedSections,
    pub generated_at: DateTime<Utc>,
    pub model_used: String,
    /// Generator-reported confidence in [0, 1].
    pub confidence_score: f32,
}

impl AugmentedContent {
    /// Materialize a validated generator payload as `version` for a node.
    pub fn from_payload(
        node_id: impl Into<String>,
        version: i64,
        payload: GeneratedPayload,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            node_id: node_id.into(),
            content_version: version,
            sections: payload.sections,
            generated_at: Utc::now(),
            model_used: payload.model,
            confidence_score: payload.confidence.clamp(0.0, 1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> GeneratedPayload {
        GeneratedPayload {
            sections: GeneratedSections {
                definitions: vec!["a hot spring".to_string()],
                examples: Vec::new(),
                cultural_notes: None,
                study_tips: None,
            },
            model: "lexigen-small".to_string(),
            confidence: 0.9,
        }
    }

    #[test]
    fn test_from_payload_carries_fields() {
        let content = AugmentedContent::from_payload("温泉", 3, payload());
        assert_eq!(content.node_id, "温泉");
        assert_eq!(content.content_version, 3);
        assert_eq!(content.model_used, "lexigen-small");
        assert_eq!(content.sections.definitions.len(), 1);
        assert!((content.confidence_score - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn test_from_payload_clamps_confidence() {
        let mut over = payload();
        over.confidence = 1.7;
        let content = AugmentedContent::from_payload("温泉", 1, over);
        assert_eq!(content.confidence_score, 1.0);
    }

    #[test]
    fn test_wire_fields_are_camel_case() {
        let content = AugmentedContent::from_payload("温泉", 1, payload());
        let value = serde_json::to_value(&content).unwrap();
        assert!(value.get("nodeId").is_some());
        assert!(value.get("contentVersion").is_some());
        assert!(value.get("generatedAt").is_some());
        assert!(value.get("modelUsed").is_some());
        assert!(value.get("confidenceScore").is_some());
        assert!(value.get("node_id").is_none());
    }
}
