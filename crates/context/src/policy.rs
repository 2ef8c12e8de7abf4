//! Transition table for the orchestrator
//!
//! Every decision the state machine makes lives here as a pure function
//! of counters and verdicts, so the retry and escalation rules can be read
//! and tested without running any collaborator.

use marag_common::config::OrchestratorConfig;
use marag_common::evidence::SourceKind;
use serde::Serialize;
use std::fmt;

/// Orchestrator phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Routing,
    Retrieving,
    WebSearching,
    Filtering,
    Rewriting,
    Generating,
    Validating,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Routing => "routing",
            Phase::Retrieving => "retrieving",
            Phase::WebSearching => "web_searching",
            Phase::Filtering => "filtering",
            Phase::Rewriting => "rewriting",
            Phase::Generating => "generating",
            Phase::Validating => "validating",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Continue in the given phase
    Next(Phase),
    /// Switch the run to web search and continue in WebSearching
    Escalate,
    /// Terminal: the current answer is grounded and adequate
    Accepted,
    /// Terminal: no retrieval, web-search or regeneration budget remains
    Exhausted(String),
}

/// Outcome of the two answer checks. Adequacy is only graded once
/// grounding passed, so `Ungrounded` carries no adequacy verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    Ungrounded,
    Inadequate,
    Accepted,
}

/// Per-run limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budgets {
    pub max_retrievals: u32,
    pub max_web_searches: u32,
    pub max_regenerations: u32,
}

impl From<&OrchestratorConfig> for Budgets {
    fn from(config: &OrchestratorConfig) -> Self {
        Self {
            max_retrievals: config.max_retrievals,
            max_web_searches: config.max_web_searches,
            max_regenerations: config.max_regenerations,
        }
    }
}

impl Default for Budgets {
    fn default() -> Self {
        Self::from(&OrchestratorConfig::default())
    }
}

/// Entry edge chosen by the router
pub fn after_routing(mode: SourceKind) -> Transition {
    match mode {
        SourceKind::DocumentIndex => Transition::Next(Phase::Retrieving),
        SourceKind::WebSearch => Transition::Next(Phase::WebSearching),
    }
}

/// Generate when anything relevant survived filtering, otherwise rewrite
pub fn after_filtering(evidence_is_empty: bool) -> Transition {
    if evidence_is_empty {
        Transition::Next(Phase::Rewriting)
    } else {
        Transition::Next(Phase::Generating)
    }
}

/// Where a rewritten question goes next.
///
/// In document-index mode another retrieval is allowed while
/// `retrieval_count` is below its bound; once the bound is reached the
/// run escalates to web search. In web-search mode the run searches again
/// while web budget remains. With nothing left the run is exhausted.
pub fn after_rewriting(
    mode: SourceKind,
    retrieval_count: u32,
    web_search_count: u32,
    budgets: &Budgets,
) -> Transition {
    let web_left = web_search_count < budgets.max_web_searches;
    match mode {
        SourceKind::DocumentIndex if retrieval_count < budgets.max_retrievals => {
            Transition::Next(Phase::Retrieving)
        }
        SourceKind::DocumentIndex if web_left => Transition::Escalate,
        SourceKind::WebSearch if web_left => Transition::Next(Phase::WebSearching),
        _ => Transition::Exhausted(format!(
            "retrieval budget ({}) and web search budget ({}) spent",
            budgets.max_retrievals, budgets.max_web_searches
        )),
    }
}

/// Accept, regenerate from the same evidence, or rewrite.
///
/// An ungrounded answer is regenerated while `regenerations` (consecutive
/// regenerations on the current evidence) is below its bound; past it the
/// evidence itself is treated as the problem and the question is rewritten.
pub fn after_validation(validation: Validation, regenerations: u32, budgets: &Budgets) -> Transition {
    match validation {
        Validation::Accepted => Transition::Accepted,
        Validation::Inadequate => Transition::Next(Phase::Rewriting),
        Validation::Ungrounded if regenerations < budgets.max_regenerations => {
            Transition::Next(Phase::Generating)
        }
        Validation::Ungrounded => Transition::Next(Phase::Rewriting),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn budgets() -> Budgets {
        Budgets {
            max_retrievals: 2,
            max_web_searches: 2,
            max_regenerations: 2,
        }
    }

    #[test]
    fn test_routing_edges() {
        assert_eq!(
            after_routing(SourceKind::DocumentIndex),
            Transition::Next(Phase::Retrieving)
        );
        assert_eq!(
            after_routing(SourceKind::WebSearch),
            Transition::Next(Phase::WebSearching)
        );
    }

    #[test]
    fn test_filtering_edges() {
        assert_eq!(after_filtering(true), Transition::Next(Phase::Rewriting));
        assert_eq!(after_filtering(false), Transition::Next(Phase::Generating));
    }

    #[test]
    fn test_rewrite_retries_below_bound() {
        assert_eq!(
            after_rewriting(SourceKind::DocumentIndex, 1, 0, &budgets()),
            Transition::Next(Phase::Retrieving)
        );
    }

    #[test]
    fn test_rewrite_escalates_at_bound() {
        assert_eq!(
            after_rewriting(SourceKind::DocumentIndex, 2, 0, &budgets()),
            Transition::Escalate
        );
    }

    #[test]
    fn test_never_retrieves_past_bound() {
        for retrievals in 2..6 {
            for web in 0..4 {
                let next = after_rewriting(SourceKind::DocumentIndex, retrievals, web, &budgets());
                assert_ne!(next, Transition::Next(Phase::Retrieving));
            }
        }
    }

    #[test]
    fn test_web_mode_never_retrieves() {
        for retrievals in 0..3 {
            let next = after_rewriting(SourceKind::WebSearch, retrievals, 1, &budgets());
            assert_eq!(next, Transition::Next(Phase::WebSearching));
        }
    }

    #[test]
    fn test_exhausted_when_everything_spent() {
        assert!(matches!(
            after_rewriting(SourceKind::DocumentIndex, 2, 2, &budgets()),
            Transition::Exhausted(_)
        ));
        assert!(matches!(
            after_rewriting(SourceKind::WebSearch, 0, 2, &budgets()),
            Transition::Exhausted(_)
        ));
    }

    #[test]
    fn test_validation_edges() {
        let b = budgets();
        assert_eq!(after_validation(Validation::Accepted, 0, &b), Transition::Accepted);
        assert_eq!(
            after_validation(Validation::Inadequate, 0, &b),
            Transition::Next(Phase::Rewriting)
        );
        assert_eq!(
            after_validation(Validation::Ungrounded, 0, &b),
            Transition::Next(Phase::Generating)
        );
        assert_eq!(
            after_validation(Validation::Ungrounded, 1, &b),
            Transition::Next(Phase::Generating)
        );
        assert_eq!(
            after_validation(Validation::Ungrounded, 2, &b),
            Transition::Next(Phase::Rewriting)
        );
    }

    #[test]
    fn test_budgets_from_config() {
        let config = OrchestratorConfig {
            max_retrievals: 5,
            ..OrchestratorConfig::default()
        };
        let b = Budgets::from(&config);
        assert_eq!(b.max_retrievals, 5);
        assert_eq!(b.max_web_searches, 2);
    }
}
