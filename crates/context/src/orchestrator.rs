//! Adaptive retrieval-and-generation state machine
//!
//! One run is a loop over [`Phase`]s. Each step performs a single
//! collaborator call, updates the [`RunState`] and returns a
//! [`Transition`] chosen by the pure functions in [`crate::policy`].
//! Cancellation and the run deadline are checked before every step and
//! raced against every in-flight call.

use crate::grading::{AdequacyGrader, GroundingGrader, RelevanceGrader};
use crate::judgment::{Adequacy, Grounding, Judge, LlmJudge};
use crate::policy::{self, Budgets, Phase, Transition, Validation};
use crate::rewriter::QueryRewriter;
use crate::router::Router;
use crate::state::RunState;
use crate::synthesizer::AnswerSynthesizer;
use marag_common::config::{AppConfig, OrchestratorConfig};
use marag_common::errors::{AppError, Result};
use marag_common::evidence::{Passage, SourceKind};
use marag_common::llm::LlmClient;
use marag_common::metrics;
use marag_search::{build_document_source, build_web_source, EvidenceSource};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// What callers of [`Orchestrator::run`] receive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
}

/// Accepted run with its counters and the phases it went through
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub answer: String,
    /// Question in effect when the answer was accepted
    pub final_question: String,
    pub retrieval_count: u32,
    pub web_search_count: u32,
    pub generation_count: u32,
    pub trace: Vec<Phase>,
}

pub struct Orchestrator {
    router: Router,
    documents: Arc<dyn EvidenceSource>,
    web: Arc<dyn EvidenceSource>,
    relevance: RelevanceGrader,
    rewriter: QueryRewriter,
    synthesizer: AnswerSynthesizer,
    grounding: GroundingGrader,
    adequacy: AdequacyGrader,
    budgets: Budgets,
    run_timeout: Option<Duration>,
}

impl Orchestrator {
    pub fn new(
        judge: Arc<dyn Judge>,
        documents: Arc<dyn EvidenceSource>,
        web: Arc<dyn EvidenceSource>,
        config: &OrchestratorConfig,
    ) -> Self {
        Self {
            router: Router::new(judge.clone()),
            documents,
            web,
            relevance: RelevanceGrader::new(judge.clone(), config.grading_concurrency),
            rewriter: QueryRewriter::new(judge.clone()),
            synthesizer: AnswerSynthesizer::new(judge.clone()),
            grounding: GroundingGrader::new(judge.clone()),
            adequacy: AdequacyGrader::new(judge),
            budgets: Budgets::from(config),
            run_timeout: config.run_timeout(),
        }
    }

    /// Wire the LLM judge and the configured sources
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        config.validate()?;
        let client = Arc::new(LlmClient::new(config.llm.clone())?);
        let judge: Arc<dyn Judge> = Arc::new(LlmJudge::new(
            client,
            config.orchestrator.corpus_description.clone(),
        ));
        let documents = build_document_source(config).await?;
        let web = build_web_source(config)?;
        Ok(Self::new(judge, documents, web, &config.orchestrator))
    }

    /// Answer a question
    pub async fn run(&self, question: &str) -> Result<Answer> {
        let outcome = self.run_detailed(question).await?;
        Ok(Answer {
            answer: outcome.answer,
        })
    }

    /// Answer a question and report counters and trace
    pub async fn run_detailed(&self, question: &str) -> Result<RunOutcome> {
        self.run_with_cancel(question, CancellationToken::new()).await
    }

    /// Answer a question, stopping early when `cancel` fires
    pub async fn run_with_cancel(
        &self,
        question: &str,
        cancel: CancellationToken,
    ) -> Result<RunOutcome> {
        let started = Instant::now();
        let mut state = RunState::new(question);
        let span = info_span!("run", run_id = %state.run_id);

        let result = self.drive(&mut state, &cancel).instrument(span).await;

        let outcome = match &result {
            Ok(_) => "accepted",
            Err(AppError::BudgetExhausted { .. }) => "exhausted",
            Err(AppError::Cancelled) => "cancelled",
            Err(AppError::Timeout { .. }) => "timeout",
            Err(_) => "failed",
        };
        metrics::record_run(started.elapsed().as_secs_f64(), outcome);
        result
    }

    async fn drive(&self, state: &mut RunState, cancel: &CancellationToken) -> Result<RunOutcome> {
        let deadline = self.run_timeout.map(|timeout| Instant::now() + timeout);
        let mut phase = Phase::Routing;
        info!(question = %state.question, "Run started");

        loop {
            self.check_interrupt(cancel, deadline)?;
            state.trace.push(phase);

            let transition = self.step(phase, state, cancel, deadline).await?;
            debug!(
                phase = %phase,
                transition = ?transition,
                source_mode = %state.source_mode,
                retrieval_count = state.retrieval_count,
                web_search_count = state.web_search_count,
                evidence = state.evidence.len(),
                "Step complete"
            );

            match transition {
                Transition::Next(next) => {
                    metrics::record_transition(phase.as_str(), next.as_str());
                    phase = next;
                }
                Transition::Escalate => {
                    info!(
                        retrieval_count = state.retrieval_count,
                        "Document index exhausted, escalating to web search"
                    );
                    state.escalate();
                    metrics::record_escalation();
                    metrics::record_transition(phase.as_str(), Phase::WebSearching.as_str());
                    phase = Phase::WebSearching;
                }
                Transition::Accepted => {
                    let answer = state.answer.clone().ok_or_else(|| AppError::Internal {
                        message: "run accepted without an answer".to_string(),
                    })?;
                    info!(
                        generations = state.generation_count,
                        retrieval_count = state.retrieval_count,
                        web_search_count = state.web_search_count,
                        "Answer accepted"
                    );
                    return Ok(RunOutcome {
                        run_id: state.run_id,
                        answer,
                        final_question: state.question.clone(),
                        retrieval_count: state.retrieval_count,
                        web_search_count: state.web_search_count,
                        generation_count: state.generation_count,
                        trace: state.trace.clone(),
                    });
                }
                Transition::Exhausted(reason) => {
                    warn!(reason = %reason, "Run exhausted its budgets");
                    return Err(AppError::BudgetExhausted {
                        reason,
                        retrievals: state.retrieval_count,
                        web_searches: state.web_search_count,
                        generations: state.generation_count,
                    });
                }
            }
        }
    }

    async fn step(
        &self,
        phase: Phase,
        state: &mut RunState,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<Transition> {
        match phase {
            Phase::Routing => {
                let mode = self
                    .guarded(cancel, deadline, self.router.route(&state.question))
                    .await??;
                state.enter_mode(mode);
                info!(source_mode = %mode, "Question routed");
                Ok(policy::after_routing(mode))
            }
            Phase::Retrieving => {
                let passages = self
                    .fetch(self.documents.as_ref(), &state.question, cancel, deadline)
                    .await?;
                state.stage_candidates(passages, SourceKind::DocumentIndex);
                Ok(Transition::Next(Phase::Filtering))
            }
            Phase::WebSearching => {
                let passages = self
                    .fetch(self.web.as_ref(), &state.question, cancel, deadline)
                    .await?;
                state.stage_candidates(passages, SourceKind::WebSearch);
                Ok(Transition::Next(Phase::Filtering))
            }
            Phase::Filtering => {
                let candidates = std::mem::take(&mut state.candidates);
                let relevant = self
                    .guarded(
                        cancel,
                        deadline,
                        self.relevance.filter(&state.question, candidates),
                    )
                    .await?;
                state.accept_graded(relevant);
                Ok(policy::after_filtering(state.evidence.is_empty()))
            }
            Phase::Rewriting => {
                state.question = self
                    .guarded(cancel, deadline, self.rewriter.rewrite(&state.question))
                    .await?;
                Ok(policy::after_rewriting(
                    state.source_mode,
                    state.retrieval_count,
                    state.web_search_count,
                    &self.budgets,
                ))
            }
            Phase::Generating => {
                let answer = self
                    .guarded(
                        cancel,
                        deadline,
                        self.synthesizer.synthesize(&state.question, &state.evidence),
                    )
                    .await??;
                state.record_answer(answer);
                Ok(Transition::Next(Phase::Validating))
            }
            Phase::Validating => {
                let answer = state.answer.as_deref().ok_or_else(|| AppError::Internal {
                    message: "validation reached before any answer was generated".to_string(),
                })?;

                let grounding = self
                    .guarded(cancel, deadline, self.grounding.grade(&state.evidence, answer))
                    .await?;
                let validation = match grounding {
                    Grounding::Unsupported => Validation::Ungrounded,
                    Grounding::Supported => {
                        let adequacy = self
                            .guarded(
                                cancel,
                                deadline,
                                self.adequacy.grade(&state.original_question, answer),
                            )
                            .await?;
                        match adequacy {
                            Adequacy::Addresses => Validation::Accepted,
                            Adequacy::DoesNotAddress => Validation::Inadequate,
                        }
                    }
                };
                debug!(validation = ?validation, "Answer validated");

                let transition =
                    policy::after_validation(validation, state.regeneration_count, &self.budgets);
                if transition == Transition::Next(Phase::Generating) {
                    state.regeneration_count += 1;
                }
                Ok(transition)
            }
        }
    }

    /// Query a source. Recoverable failures count as zero passages.
    async fn fetch(
        &self,
        source: &dyn EvidenceSource,
        query: &str,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<Vec<Passage>> {
        let started = Instant::now();
        let result = self.guarded(cancel, deadline, source.retrieve(query)).await?;
        metrics::record_source(
            started.elapsed().as_secs_f64(),
            source.kind().as_str(),
            result.is_ok(),
        );

        match result {
            Ok(passages) => {
                debug!(source = %source.kind(), count = passages.len(), "Passages retrieved");
                Ok(passages)
            }
            Err(e) if e.is_recoverable() => {
                warn!(source = %source.kind(), error = %e, "Retrieval failed, continuing with no passages");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    fn check_interrupt(&self, cancel: &CancellationToken, deadline: Option<Instant>) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        if deadline.is_some_and(|at| Instant::now() >= at) {
            return Err(self.timeout_error());
        }
        Ok(())
    }

    /// Race a collaborator call against cancellation and the deadline
    async fn guarded<F: Future>(
        &self,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
        call: F,
    ) -> Result<F::Output> {
        let expiry = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            output = call => Ok(output),
            _ = cancel.cancelled() => Err(AppError::Cancelled),
            _ = expiry => Err(self.timeout_error()),
        }
    }

    fn timeout_error(&self) -> AppError {
        AppError::Timeout {
            timeout_ms: self
                .run_timeout
                .map(|timeout| timeout.as_millis() as u64)
                .unwrap_or_default(),
        }
    }
}
