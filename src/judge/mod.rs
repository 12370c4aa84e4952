//! Judge (spec.md §4.3): an LLM-driven sufficiency evaluator over the
//! current Evidence Store contents, with a forced-synthesis escape hatch
//! when the backend cannot be used at all.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::warn;

use crate::chat::{ChatClient, CompletionOptions, Message};
use crate::config::OrchestratorConfig;
use crate::error::CoreError;
use crate::model::{Evidence, JudgeAssessment};

const SCHEMA_RETRIES: u32 = 3;

fn assessment_schema() -> Value {
    json!({
        "type": "object",
        "required": [
            "mechanism_score", "clinical_score", "mechanism_reasoning",
            "clinical_reasoning", "confidence", "recommendation", "reasoning"
        ],
        "properties": {
            "mechanism_score": {"type": "integer", "minimum": 0, "maximum": 10},
            "clinical_score": {"type": "integer", "minimum": 0, "maximum": 10},
            "drug_candidates": {"type": "array", "items": {"type": "string"}},
            "key_findings": {"type": "array", "items": {"type": "string"}},
            "mechanism_reasoning": {"type": "string"},
            "clinical_reasoning": {"type": "string"},
            "confidence": {"type": "number", "minimum": 0.0, "maximum": 1.0},
            "recommendation": {"type": "string", "enum": ["continue", "synthesize"]},
            "next_queries": {"type": "array", "items": {"type": "string"}, "maxItems": 5},
            "reasoning": {"type": "string"}
        }
    })
}

/// Wraps a `ChatClient` to produce sufficiency assessments. Independent
/// per-call state only (spec.md §4.3): nothing here is retained across
/// calls except what the Orchestrator passes back in as evidence.
pub struct Judge {
    chat: Arc<dyn ChatClient>,
}

impl Judge {
    pub fn new(chat: Arc<dyn ChatClient>) -> Self {
        Self { chat }
    }

    pub async fn assess(&self, question: &str, evidence: &[Evidence], config: &OrchestratorConfig) -> JudgeAssessment {
        let capped: Vec<&Evidence> = evidence.iter().take(config.max_evidence_sent_to_judge).collect();

        let mut last_error = String::new();
        for attempt in 0..SCHEMA_RETRIES {
            match self.assess_once(question, &capped).await {
                Ok(mut assessment) => {
                    assessment.evaluate_sufficiency(
                        config.judge_mechanism_min,
                        config.judge_clinical_min,
                        config.judge_confidence_min,
                    );
                    return assessment;
                }
                Err(err) if err.is_retryable() && attempt + 1 < SCHEMA_RETRIES => {
                    warn!(attempt, error = %err, "judge assessment malformed, retrying");
                    last_error = err.to_string();
                    continue;
                }
                Err(err) => {
                    last_error = err.to_string();
                    break;
                }
            }
        }

        let titles: Vec<String> = capped.iter().map(|e| e.citation.title.clone()).collect();
        JudgeAssessment::forced(&last_error, &titles)
    }

    async fn assess_once(&self, question: &str, evidence: &[&Evidence]) -> Result<JudgeAssessment, CoreError> {
        let evidence_digest: Vec<Value> = evidence
            .iter()
            .map(|e| {
                json!({
                    "title": e.citation.title,
                    "source": e.citation.source.as_str(),
                    "content": e.content,
                })
            })
            .collect();

        let messages = vec![
            Message::system(
                "You are a biomedical research judge. Score the evidence gathered so far on a \
                 0-10 mechanism_score and 0-10 clinical_score, and decide whether there is enough \
                 evidence to write a cited report or whether more searching is needed.",
            ),
            Message::user(format!(
                "Research question: {question}\n\nEvidence gathered so far:\n{}",
                serde_json::to_string_pretty(&evidence_digest).unwrap_or_default()
            )),
        ];

        let options = CompletionOptions {
            json_schema: Some(assessment_schema()),
            temperature: Some(0.0),
            ..Default::default()
        };

        let response = self.chat.complete(&messages, &options).await?;
        serde_json::from_str(&response.content)
            .map_err(|e| CoreError::Judge(format!("could not parse judge response as JSON: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{AssistantMessage, TokenUsage};
    use crate::model::{Citation, SourceKind};
    use async_trait::async_trait;

    struct ScriptedChat {
        response: String,
    }

    #[async_trait]
    impl ChatClient for ScriptedChat {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _messages: &[Message], _options: &CompletionOptions) -> Result<AssistantMessage, CoreError> {
            Ok(AssistantMessage {
                content: self.response.clone(),
                tool_calls: vec![],
                usage: TokenUsage::default(),
            })
        }
    }

    fn sample_evidence() -> Vec<Evidence> {
        vec![Evidence::new(
            "content",
            Citation::new(SourceKind::Pubmed, "Title", "https://a", None, vec![]),
            0.5,
        )]
    }

    #[tokio::test]
    async fn well_formed_response_is_parsed_and_scored() {
        let response = serde_json::json!({
            "mechanism_score": 8,
            "clinical_score": 7,
            "mechanism_reasoning": "strong mechanistic signal across studies",
            "clinical_reasoning": "multiple trials corroborate efficacy",
            "confidence": 0.9,
            "recommendation": "synthesize",
            "reasoning": "evidence converges on a consistent mechanism and outcome"
        })
        .to_string();
        let judge = Judge::new(Arc::new(ScriptedChat { response }));
        let config = OrchestratorConfig::default();
        let assessment = judge.assess("does X help Y", &sample_evidence(), &config).await;
        assert!(assessment.sufficient);
        assert!(!assessment.forced);
    }

    #[tokio::test]
    async fn malformed_response_triggers_forced_synthesis() {
        let judge = Judge::new(Arc::new(ScriptedChat {
            response: "not json at all".into(),
        }));
        let config = OrchestratorConfig::default();
        let assessment = judge.assess("does X help Y", &sample_evidence(), &config).await;
        assert!(assessment.forced);
        assert!(assessment.sufficient);
        assert_eq!(assessment.recommendation, crate::model::Recommendation::Synthesize);
    }
}
