//! Synthesizer / Reporter (spec.md §4.4): turns the Evidence Store's
//! contents into a cited `Report`, either via an LLM (normal path) or via a
//! minijinja template driven purely by the Store's own summary (fallback
//! path, used when the chat backend is unusable).

use std::collections::HashSet;
use std::sync::Arc;

use minijinja::{context, Environment};
use serde_json::json;

use crate::chat::{ChatClient, CompletionOptions, Message};
use crate::error::CoreError;
use crate::model::{Evidence, JudgeAssessment, Reference, Report};
use crate::store::EvidenceStore;

const FALLBACK_TEMPLATE: &str = "\
{{ question }} — fallback summary

This report was generated from the evidence gathered so far because the research \
assistant's language model backend was unavailable. It has not been reviewed by an \
LLM and should be treated as a low-confidence starting point rather than a complete \
answer.

{{ evidence_summary }}
";

fn report_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "required": [
            "title", "executive_summary", "methodology", "mechanistic_findings",
            "clinical_findings", "conclusion"
        ],
        "properties": {
            "title": {"type": "string"},
            "executive_summary": {"type": "string"},
            "methodology": {"type": "string"},
            "mechanistic_findings": {"type": "string"},
            "clinical_findings": {"type": "string"},
            "drug_candidates": {"type": "array", "items": {"type": "string"}},
            "limitations": {"type": "array", "items": {"type": "string"}},
            "conclusion": {"type": "string"}
        }
    })
}

#[derive(serde::Deserialize)]
struct LlmReportBody {
    title: String,
    executive_summary: String,
    methodology: String,
    mechanistic_findings: String,
    clinical_findings: String,
    #[serde(default)]
    drug_candidates: Vec<String>,
    #[serde(default)]
    limitations: Vec<String>,
    conclusion: String,
}

pub struct Synthesizer {
    chat: Arc<dyn ChatClient>,
}

impl Synthesizer {
    pub fn new(chat: Arc<dyn ChatClient>) -> Self {
        Self { chat }
    }

    /// Normal synthesis: asks the chat backend for a narrative report. The
    /// report schema never asks the model for its own reference list, so
    /// `references` is always built directly from the Evidence Store
    /// (spec.md §4.4) — there is no model-supplied citation list to
    /// validate or strip, which rules out a fabricated URL by construction.
    pub async fn synthesize(
        &self,
        store: &EvidenceStore,
        assessment: &JudgeAssessment,
    ) -> Result<Report, CoreError> {
        let all_evidence = store.all().await;
        let evidence_digest: Vec<_> = all_evidence
            .iter()
            .map(|e| {
                json!({
                    "title": e.citation.title,
                    "url": e.citation.url,
                    "source": e.citation.source.as_str(),
                    "date": e.citation.date,
                    "content": e.content,
                })
            })
            .collect();

        let messages = vec![
            Message::system(
                "You are a biomedical research report writer. Write a cited report using ONLY \
                 the evidence provided; never invent a URL, author, or finding not present in it.",
            ),
            Message::user(format!(
                "Research question: {}\n\nEvidence:\n{}",
                store.question(),
                serde_json::to_string_pretty(&evidence_digest).unwrap_or_default()
            )),
        ];

        let options = CompletionOptions {
            json_schema: Some(report_schema()),
            temperature: Some(0.2),
            ..Default::default()
        };

        let response = self.chat.complete(&messages, &options).await?;
        let body: LlmReportBody = serde_json::from_str(&response.content)
            .map_err(|e| CoreError::Synthesis(format!("could not parse report response as JSON: {e}")))?;

        let references: Vec<Reference> = all_evidence
            .iter()
            .map(|e| Reference {
                title: e.citation.title.clone(),
                authors: e.citation.authors.clone(),
                source: e.citation.source,
                date: e.citation.date.clone(),
                url: e.citation.url.clone(),
            })
            .collect();

        let report = Report {
            title: body.title,
            research_question: store.question().to_string(),
            executive_summary: body.executive_summary,
            methodology: body.methodology,
            mechanistic_findings: body.mechanistic_findings,
            clinical_findings: body.clinical_findings,
            drug_candidates: body.drug_candidates,
            limitations: body.limitations,
            conclusion: body.conclusion,
            references,
            sources_searched: distinct_sources(&all_evidence),
            total_papers_reviewed: all_evidence.len(),
            search_iterations: store.iteration_count().await,
            confidence_score: assessment.confidence,
        };
        Ok(report.normalize_executive_summary())
    }

    /// Fallback synthesis: no LLM call, purely templated from the Store's
    /// own summary. Always low confidence, always carries an explicit
    /// budget-exhausted limitation note (spec.md §4.4).
    pub async fn synthesize_fallback(&self, store: &EvidenceStore, reason: &str) -> Report {
        let all_evidence = store.all().await;
        let mut env = Environment::new();
        env.add_template("fallback", FALLBACK_TEMPLATE).expect("static template is valid");
        let template = env.get_template("fallback").expect("template was just registered");
        let evidence_summary = store.summary().await;
        let rendered = template
            .render(context! { question => store.question(), evidence_summary => evidence_summary })
            .unwrap_or_else(|_| evidence_summary.clone());

        let references: Vec<Reference> = all_evidence
            .iter()
            .map(|e| Reference {
                title: e.citation.title.clone(),
                authors: e.citation.authors.clone(),
                source: e.citation.source,
                date: e.citation.date.clone(),
                url: e.citation.url.clone(),
            })
            .collect();

        let report = Report {
            title: format!("Preliminary findings: {}", store.question()),
            research_question: store.question().to_string(),
            executive_summary: rendered,
            methodology: "Automated search across configured providers; no LLM synthesis was \
                available for this report."
                .to_string(),
            mechanistic_findings: "Not assessed: LLM synthesis was unavailable.".to_string(),
            clinical_findings: "Not assessed: LLM synthesis was unavailable.".to_string(),
            drug_candidates: Vec::new(),
            limitations: vec![format!(
                "This report was generated without LLM synthesis ({reason}); findings below are \
                 an unreviewed list of gathered evidence only."
            )],
            conclusion: "Budget exhausted before a full synthesis could be produced.".to_string(),
            references,
            sources_searched: distinct_sources(&all_evidence),
            total_papers_reviewed: all_evidence.len(),
            search_iterations: store.iteration_count().await,
            confidence_score: 0.1,
        };
        report.normalize_executive_summary()
    }
}

fn distinct_sources(evidence: &[Evidence]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut sources = Vec::new();
    for e in evidence {
        let name = e.citation.source.as_str().to_string();
        if seen.insert(name.clone()) {
            sources.push(name);
        }
    }
    sources
}
