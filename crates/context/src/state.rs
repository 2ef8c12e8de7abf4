//! Per-run mutable state

use crate::policy::Phase;
use marag_common::evidence::{Passage, SourceKind};
use uuid::Uuid;

/// State of one orchestrator invocation. Created per question, mutated
/// only between steps, dropped when the run terminates.
#[derive(Debug, Clone)]
pub struct RunState {
    pub run_id: Uuid,

    /// Active query text, replaced by rewrites
    pub question: String,

    /// The question as asked
    pub original_question: String,

    /// Passages currently considered relevant
    pub evidence: Vec<Passage>,

    /// Passages fetched but not yet graded
    pub candidates: Vec<Passage>,

    /// Source that produced `candidates`
    pub candidates_from: SourceKind,

    /// Latest synthesized answer; `None` until the first generation
    pub answer: Option<String>,

    /// Document-index invocations
    pub retrieval_count: u32,

    /// Web-search invocations
    pub web_search_count: u32,

    /// Synthesizer invocations
    pub generation_count: u32,

    /// Regenerations on the current evidence set
    pub regeneration_count: u32,

    /// Set by routing; changed afterwards only by escalation
    pub source_mode: SourceKind,

    /// Phases entered, in order
    pub trace: Vec<Phase>,
}

impl RunState {
    pub fn new(question: impl Into<String>) -> Self {
        let question = question.into();
        Self {
            run_id: Uuid::new_v4(),
            original_question: question.clone(),
            question,
            evidence: Vec::new(),
            candidates: Vec::new(),
            candidates_from: SourceKind::DocumentIndex,
            answer: None,
            retrieval_count: 0,
            web_search_count: 0,
            generation_count: 0,
            regeneration_count: 0,
            source_mode: SourceKind::DocumentIndex,
            trace: Vec::new(),
        }
    }

    /// Apply the router's decision
    pub fn enter_mode(&mut self, mode: SourceKind) {
        self.source_mode = mode;
        self.retrieval_count = 0;
    }

    /// Switch a document-index run to web search
    pub fn escalate(&mut self) {
        self.source_mode = SourceKind::WebSearch;
    }

    /// Stage freshly fetched passages for grading
    pub fn stage_candidates(&mut self, passages: Vec<Passage>, from: SourceKind) {
        match from {
            SourceKind::DocumentIndex => self.retrieval_count += 1,
            SourceKind::WebSearch => self.web_search_count += 1,
        }
        self.candidates = passages;
        self.candidates_from = from;
    }

    /// Fold graded passages into the evidence. Index results replace the
    /// evidence set; web results are appended to it.
    pub fn accept_graded(&mut self, relevant: Vec<Passage>) {
        match self.candidates_from {
            SourceKind::DocumentIndex => self.evidence = relevant,
            SourceKind::WebSearch => self.evidence.extend(relevant),
        }
        self.candidates.clear();
        self.regeneration_count = 0;
    }

    pub fn record_answer(&mut self, answer: String) {
        self.answer = Some(answer);
        self.generation_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(text: &str, source: SourceKind) -> Passage {
        Passage::new(text, source)
    }

    #[test]
    fn test_new_state() {
        let state = RunState::new("What is agent memory?");
        assert_eq!(state.question, state.original_question);
        assert!(state.evidence.is_empty());
        assert!(state.answer.is_none());
        assert_eq!(state.retrieval_count, 0);
    }

    #[test]
    fn test_index_results_replace_evidence() {
        let mut state = RunState::new("q");
        state.evidence = vec![passage("old", SourceKind::DocumentIndex)];
        state.stage_candidates(vec![passage("new", SourceKind::DocumentIndex)], SourceKind::DocumentIndex);
        let graded = state.candidates.clone();
        state.accept_graded(graded);

        assert_eq!(state.retrieval_count, 1);
        assert_eq!(state.evidence.len(), 1);
        assert_eq!(state.evidence[0].text, "new");
        assert!(state.candidates.is_empty());
    }

    #[test]
    fn test_web_results_append_and_leave_retrieval_count() {
        let mut state = RunState::new("q");
        state.retrieval_count = 2;
        state.evidence = vec![passage("kept", SourceKind::DocumentIndex)];
        state.regeneration_count = 2;
        state.stage_candidates(vec![passage("web", SourceKind::WebSearch)], SourceKind::WebSearch);
        let graded = state.candidates.clone();
        state.accept_graded(graded);

        assert_eq!(state.retrieval_count, 2);
        assert_eq!(state.web_search_count, 1);
        assert_eq!(state.evidence.len(), 2);
        assert_eq!(state.regeneration_count, 0);
    }

    #[test]
    fn test_record_answer_counts_generations() {
        let mut state = RunState::new("q");
        state.record_answer("first".into());
        state.record_answer("second".into());
        assert_eq!(state.answer.as_deref(), Some("second"));
        assert_eq!(state.generation_count, 2);
    }
}
