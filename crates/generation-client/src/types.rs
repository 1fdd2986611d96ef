//! Request and output types for the content generator API.

use serde::{Deserialize, Serialize};

/// Content sections the generator can be asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SectionKind {
    Definitions,
    Examples,
    CulturalNotes,
    StudyTips,
}

impl SectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Definitions => "definitions",
            Self::Examples => "examples",
            Self::CulturalNotes => "culturalNotes",
            Self::StudyTips => "studyTips",
        }
    }

    /// Every section, in response order.
    pub fn all() -> [SectionKind; 4] {
        [
            Self::Definitions,
            Self::Examples,
            Self::CulturalNotes,
            Self::StudyTips,
        ]
    }
}

/// Output contract for one generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSchema {
    /// Sections that must be present in the output.
    pub sections: Vec<SectionKind>,
    /// Language the learner reads explanations in.
    pub target_language: String,
}

impl Default for ContentSchema {
    fn default() -> Self {
        Self {
            sections: SectionKind::all().to_vec(),
            target_language: "en".to_string(),
        }
    }
}

/// A generation request for one lexicon entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// Entry the content is about.
    pub node_id: String,
    pub schema: ContentSchema,
}

impl GenerationRequest {
    /// Request the full default schema for an entry.
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            schema: ContentSchema::default(),
        }
    }
}

/// A worked example sentence with its translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageExample {
    pub sentence: String,
    pub translation: String,
}

/// Study content produced for one entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedSections {
    #[serde(default)]
    pub definitions: Vec<String>,
    #[serde(default)]
    pub examples: Vec<UsageExample>,
    #[serde(default)]
    pub cultural_notes: Option<String>,
    #[serde(default)]
    pub study_tips: Option<String>,
}

/// Raw generator output, prior to validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedPayload {
    pub sections: GeneratedSections,
    /// Model identifier reported by the generator.
    pub model: String,
    /// Self-reported confidence [0, 1].
    pub confidence: f32,
}
