//! Generator output validation.
//!
//! Generator output is untrusted. Before anything is persisted, every
//! requested section must be present and non-empty, the confidence must be
//! in range, and every text field is scanned for leftover template
//! artifacts (brace placeholders, printf-style specifiers) that have shown
//! up in malformed generations.

use std::sync::OnceLock;

use regex::Regex;

use crate::client::GenerationError;
use crate::types::{GeneratedPayload, GeneratedSections, SectionKind};

/// Check a payload against the requested sections.
pub fn validate_payload(
    payload: &GeneratedPayload,
    sections: &[SectionKind],
) -> Result<(), GenerationError> {
    if !(0.0..=1.0).contains(&payload.confidence) {
        return Err(GenerationError::SchemaViolation(format!(
            "confidence {} out of range",
            payload.confidence
        )));
    }

    for kind in sections {
        check_section(&payload.sections, *kind)?;
    }

    for (field, text) in text_fields(&payload.sections) {
        if let Some(artifact) = template_artifact(text) {
            return Err(GenerationError::SchemaViolation(format!(
                "{} contains template artifact {:?}",
                field, artifact
            )));
        }
    }

    Ok(())
}

fn check_section(sections: &GeneratedSections, kind: SectionKind) -> Result<(), GenerationError> {
    let present = match kind {
        SectionKind::Definitions => {
            !sections.definitions.is_empty()
                && sections.definitions.iter().all(|d| !d.trim().is_empty())
        }
        SectionKind::Examples => {
            !sections.examples.is_empty()
                && sections
                    .examples
                    .iter()
                    .all(|e| !e.sentence.trim().is_empty() && !e.translation.trim().is_empty())
        }
        SectionKind::CulturalNotes => sections
            .cultural_notes
            .as_deref()
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false),
        SectionKind::StudyTips => sections
            .study_tips
            .as_deref()
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false),
    };

    if present {
        Ok(())
    } else {
        Err(GenerationError::SchemaViolation(format!(
            "section {} missing or empty",
            kind.as_str()
        )))
    }
}

/// All text fields paired with a path for error reporting.
fn text_fields(sections: &GeneratedSections) -> Vec<(String, &str)> {
    let mut fields = Vec::new();
    for (i, d) in sections.definitions.iter().enumerate() {
        fields.push((format!("definitions[{}]", i), d.as_str()));
    }
    for (i, e) in sections.examples.iter().enumerate() {
        fields.push((format!("examples[{}].sentence", i), e.sentence.as_str()));
        fields.push((format!("examples[{}].translation", i), e.translation.as_str()));
    }
    if let Some(notes) = &sections.cultural_notes {
        fields.push(("culturalNotes".to_string(), notes.as_str()));
    }
    if let Some(tips) = &sections.study_tips {
        fields.push(("studyTips".to_string(), tips.as_str()));
    }
    fields
}

/// First unexpanded template artifact in `text`, if any.
fn template_artifact(text: &str) -> Option<&str> {
    static ARTIFACT_RE: OnceLock<Regex> = OnceLock::new();
    let re = ARTIFACT_RE.get_or_init(|| {
        Regex::new(r"\{[A-Za-z_][A-Za-z0-9_]*\}|\{\}|%[sdif]").expect("valid literal regex")
    });
    re.find(text).map(|m| m.as_str())
}
