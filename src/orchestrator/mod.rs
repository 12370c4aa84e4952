//! Orchestrator (spec.md §4.5): composes the Search Dispatcher, Evidence
//! Store, Judge, and Synthesizer into a bounded loop that emits a strictly
//! ordered, single-consumer, cancellable `Event` stream.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::chat::ChatClient;
use crate::config::OrchestratorConfig;
use crate::embedding::Embedder;
use crate::judge::Judge;
use crate::model::{Event, EventKind, Recommendation};
use crate::search::{SearchDispatcher, SearchProvider};
use crate::store::EvidenceStore;
use crate::synthesis::Synthesizer;

/// Why the loop stopped iterating and moved to synthesis. Priority 0
/// (`Forced`) always wins even over a zero-scored assessment — this is the
/// one anti-regression rule this crate cannot silently drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Termination {
    Forced,
    Sufficient,
    BudgetExhausted,
    Cancelled,
}

pub struct Orchestrator {
    config: OrchestratorConfig,
    providers: Vec<Arc<dyn SearchProvider>>,
    chat: Arc<dyn ChatClient>,
    embedder: Option<Arc<dyn Embedder>>,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        providers: Vec<Arc<dyn SearchProvider>>,
        chat: Arc<dyn ChatClient>,
        embedder: Option<Arc<dyn Embedder>>,
    ) -> Self {
        Self {
            config,
            providers,
            chat,
            embedder,
        }
    }

    /// Runs one research request. Returns the Event stream and a
    /// `CancellationToken` the caller can trigger to request early
    /// termination (honored within the 2s cancellation budget from §5).
    pub fn run(self: Arc<Self>, question: String) -> (ReceiverStream<Event>, CancellationToken) {
        let (tx, rx) = mpsc::channel(32);
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();

        tokio::spawn(async move {
            self.drive(question, tx, task_cancel).await;
        });

        (ReceiverStream::new(rx), cancel)
    }

    #[instrument(skip(self, tx, cancel))]
    async fn drive(&self, question: String, tx: mpsc::Sender<Event>, cancel: CancellationToken) {
        let emit = |event: Event| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(event).await;
            }
        };

        emit(Event::new(EventKind::Started, "starting research", 0)).await;

        let store = Arc::new(EvidenceStore::new(
            question.clone(),
            self.embedder.clone(),
            self.config.dedup_similarity_threshold,
        ));
        let dispatcher = SearchDispatcher::new(
            self.providers.clone(),
            Duration::from_secs(self.config.search_timeout_seconds),
        );
        let judge = Judge::new(Arc::clone(&self.chat));
        let synthesizer = Synthesizer::new(Arc::clone(&self.chat));

        let overall_deadline = tokio::time::sleep(Duration::from_secs(self.config.overall_timeout_seconds));
        tokio::pin!(overall_deadline);

        let mut current_query = question.clone();
        let mut termination = Termination::BudgetExhausted;
        let mut last_assessment = None;

        'loop_: for _ in 0..self.config.max_iterations {
            let iteration = store.begin_iteration().await;

            if cancel.is_cancelled() {
                termination = Termination::Cancelled;
                break 'loop_;
            }

            emit(Event::new(EventKind::Searching, format!("searching for: {current_query}"), iteration)).await;

            let batch = tokio::select! {
                batch = dispatcher.dispatch(&current_query, self.config.max_results_per_provider) => batch,
                _ = &mut overall_deadline => {
                    termination = Termination::BudgetExhausted;
                    break 'loop_;
                }
                _ = cancel.cancelled() => {
                    termination = Termination::Cancelled;
                    break 'loop_;
                }
                _ = tx.closed() => {
                    termination = Termination::Cancelled;
                    break 'loop_;
                }
            };

            for (provider, kind, message) in &batch.errors {
                warn!(provider, ?kind, message, "provider failed during iteration");
            }

            let added = store.ingest(batch.evidence).await;
            emit(Event::new(
                EventKind::SearchComplete,
                format!("ingested {added} new evidence records"),
                iteration,
            ))
            .await;

            emit(Event::new(EventKind::Judging, "assessing evidence sufficiency", iteration)).await;
            let evidence = store.top_relevant(self.config.max_evidence_sent_to_judge).await;
            let assessment = tokio::select! {
                assessment = judge.assess(&question, &evidence, &self.config) => assessment,
                _ = &mut overall_deadline => {
                    termination = Termination::BudgetExhausted;
                    break 'loop_;
                }
                _ = cancel.cancelled() => {
                    termination = Termination::Cancelled;
                    break 'loop_;
                }
                _ = tx.closed() => {
                    termination = Termination::Cancelled;
                    break 'loop_;
                }
            };

            emit(
                Event::new(EventKind::JudgeComplete, "judge assessment complete", iteration)
                    .with_data(serde_json::json!({
                        "mechanism_score": assessment.mechanism_score,
                        "clinical_score": assessment.clinical_score,
                        "confidence": assessment.confidence,
                        "forced": assessment.forced,
                    })),
            )
            .await;

            // Priority 0: forced synthesis always wins, regardless of scores.
            if assessment.forced {
                termination = Termination::Forced;
                last_assessment = Some(assessment);
                break 'loop_;
            }

            if assessment.sufficient && assessment.recommendation == Recommendation::Synthesize {
                termination = Termination::Sufficient;
                last_assessment = Some(assessment);
                break 'loop_;
            }

            if assessment.next_queries.is_empty() {
                // Nothing new to search for; stop iterating rather than
                // repeat the same query against the same providers.
                termination = Termination::BudgetExhausted;
                last_assessment = Some(assessment);
                break 'loop_;
            }
            current_query = assessment.next_queries[0].clone();
            last_assessment = Some(assessment);

            emit(Event::new(EventKind::Looping, format!("continuing with refined query: {current_query}"), iteration)).await;
        }

        if cancel.is_cancelled() {
            termination = Termination::Cancelled;
        }

        if termination == Termination::Cancelled {
            emit(Event::new(EventKind::Error, "research cancelled", store.iteration_count().await)).await;
            return;
        }

        emit(Event::new(EventKind::Synthesizing, "writing final report", store.iteration_count().await)).await;

        let report = match termination {
            Termination::Sufficient | Termination::Forced => {
                let assessment = last_assessment.expect("a terminating assessment was recorded");
                match synthesizer.synthesize(&store, &assessment).await {
                    Ok(report) => report,
                    Err(err) => {
                        warn!(error = %err, "normal synthesis failed, falling back to templated report");
                        synthesizer.synthesize_fallback(&store, &err.to_string()).await
                    }
                }
            }
            Termination::BudgetExhausted => {
                synthesizer
                    .synthesize_fallback(&store, "search/judge budget was exhausted before a sufficiency threshold was reached")
                    .await
            }
            Termination::Cancelled => unreachable!("handled above"),
        };

        info!(iterations = report.search_iterations, references = report.references.len(), "research complete");

        emit(Event::new(EventKind::Complete, "report ready", report.search_iterations).with_data(
            serde_json::to_value(&report).unwrap_or(serde_json::Value::Null),
        ))
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{AssistantMessage, CompletionOptions, Message, TokenUsage};
    use crate::error::CoreError;
    use crate::model::{Citation, Evidence, SourceKind};
    use async_trait::async_trait;
    use tokio_stream::StreamExt;

    struct FakeProvider {
        evidence: Vec<Evidence>,
    }

    #[async_trait]
    impl SearchProvider for FakeProvider {
        fn name(&self) -> &str {
            "fake"
        }

        async fn search(&self, _query: &str, _max_results: u32) -> Result<Vec<Evidence>, CoreError> {
            Ok(self.evidence.clone())
        }
    }

    struct ScriptedChat {
        responses: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatClient for ScriptedChat {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _messages: &[Message], _options: &CompletionOptions) -> Result<AssistantMessage, CoreError> {
            let mut responses = self.responses.lock().unwrap();
            let content = if responses.is_empty() {
                String::new()
            } else {
                responses.remove(0)
            };
            Ok(AssistantMessage {
                content,
                tool_calls: vec![],
                usage: TokenUsage::default(),
            })
        }
    }

    fn sufficient_assessment_json() -> String {
        serde_json::json!({
            "mechanism_score": 9,
            "clinical_score": 8,
            "mechanism_reasoning": "clear and well-supported mechanistic pathway",
            "clinical_reasoning": "multiple concordant clinical results",
            "confidence": 0.9,
            "recommendation": "synthesize",
            "reasoning": "the gathered evidence converges strongly on an answer"
        })
        .to_string()
    }

    fn report_json() -> String {
        serde_json::json!({
            "title": "Report",
            "executive_summary": "A reasonably long executive summary describing the findings of this research in sufficient detail to pass validation easily.",
            "methodology": "m",
            "mechanistic_findings": "mf",
            "clinical_findings": "cf",
            "conclusion": "c"
        })
        .to_string()
    }

    #[tokio::test]
    async fn happy_path_terminates_with_sufficient_evidence_and_synthesizes() {
        let citation = Citation::new(SourceKind::Pubmed, "Title", "https://a", None, vec![]);
        let provider = Arc::new(FakeProvider {
            evidence: vec![Evidence::new("content", citation, 0.8)],
        });
        let chat: Arc<dyn ChatClient> = Arc::new(ScriptedChat {
            responses: std::sync::Mutex::new(vec![sufficient_assessment_json(), report_json()]),
        });

        let orchestrator = Arc::new(Orchestrator::new(
            OrchestratorConfig::default(),
            vec![provider],
            chat,
            None,
        ));
        let (mut stream, _cancel) = orchestrator.run("does X help Y".to_string());

        let mut kinds = Vec::new();
        while let Some(event) = stream.next().await {
            kinds.push(event.kind);
        }
        assert!(kinds.contains(&EventKind::Complete));
        assert!(!kinds.contains(&EventKind::Error));
    }

    #[tokio::test]
    async fn budget_exhaustion_falls_back_to_templated_report() {
        let citation = Citation::new(SourceKind::Pubmed, "Title", "https://a", None, vec![]);
        let provider = Arc::new(FakeProvider {
            evidence: vec![Evidence::new("content", citation, 0.3)],
        });
        // Always returns malformed JSON -> judge is forced every iteration,
        // so this really exercises the forced path; to exercise budget
        // exhaustion specifically we instead return a well-formed but
        // insufficient assessment every time, with no next_queries.
        let insufficient = serde_json::json!({
            "mechanism_score": 2,
            "clinical_score": 2,
            "mechanism_reasoning": "weak and inconclusive mechanistic signal",
            "clinical_reasoning": "no clinical trials located yet",
            "confidence": 0.2,
            "recommendation": "continue",
            "next_queries": [],
            "reasoning": "evidence so far is too sparse to draw a conclusion"
        })
        .to_string();
        let mut config = OrchestratorConfig::default();
        config.max_iterations = 2;
        let chat: Arc<dyn ChatClient> = Arc::new(ScriptedChat {
            responses: std::sync::Mutex::new(vec![insufficient]),
        });
        let orchestrator = Arc::new(Orchestrator::new(config, vec![provider], chat, None));
        let (mut stream, _cancel) = orchestrator.run("does X help Y".to_string());

        let mut saw_complete = false;
        let mut low_confidence = true;
        while let Some(event) = stream.next().await {
            if event.kind == EventKind::Complete {
                saw_complete = true;
                if let Some(data) = event.data {
                    low_confidence = data["confidence_score"].as_f64().unwrap_or(1.0) < 0.3;
                }
            }
        }
        assert!(saw_complete);
        assert!(low_confidence);
    }
}
