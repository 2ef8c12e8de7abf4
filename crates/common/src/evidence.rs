//! Evidence types shared between sources, graders and the orchestrator

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where evidence for a run comes from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Similarity search over the persistent document index
    DocumentIndex,
    /// Live web search
    WebSearch,
}

impl SourceKind {
    /// Stable label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::DocumentIndex => "document_index",
            SourceKind::WebSearch => "web_search",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate text passage returned by an evidence source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Passage {
    /// Passage text handed to graders and the synthesizer
    pub text: String,

    /// Source that produced the passage
    pub source: SourceKind,

    /// Document path or URL, when the source reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,

    /// Similarity score or inverse distance, when the source reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl Passage {
    /// Create a passage with no origin or score
    pub fn new(text: impl Into<String>, source: SourceKind) -> Self {
        Self {
            text: text.into(),
            source,
            origin: None,
            score: None,
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }
}

/// Join passage texts the way they are presented to judgment calls
pub fn format_passages(passages: &[Passage]) -> String {
    passages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_serde() {
        let json = serde_json::to_string(&SourceKind::WebSearch).unwrap();
        assert_eq!(json, "\"web_search\"");
        assert_eq!(SourceKind::DocumentIndex.to_string(), "document_index");
    }

    #[test]
    fn test_format_passages() {
        let passages = vec![
            Passage::new("first", SourceKind::DocumentIndex),
            Passage::new("second", SourceKind::DocumentIndex).with_score(0.4),
        ];
        assert_eq!(format_passages(&passages), "first\n\nsecond");
        assert_eq!(format_passages(&[]), "");
    }
}
