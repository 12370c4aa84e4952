use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Continue,
    Synthesize,
}

/// Output of one Judge call (spec.md §3, §4.3). Ephemeral per iteration; the
/// Orchestrator retains only the most recent one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeAssessment {
    pub mechanism_score: u8,
    pub clinical_score: u8,
    #[serde(default)]
    pub drug_candidates: Vec<String>,
    #[serde(default)]
    pub key_findings: Vec<String>,
    pub mechanism_reasoning: String,
    pub clinical_reasoning: String,
    pub sufficient: bool,
    pub confidence: f32,
    pub recommendation: Recommendation,
    #[serde(default)]
    pub next_queries: Vec<String>,
    pub reasoning: String,
    #[serde(default)]
    pub forced: bool,
}

impl JudgeAssessment {
    /// Builds the special forced-synthesis assessment spec.md §4.3 mandates
    /// when the Judge backend is unusable: `forced = true`,
    /// `recommendation = synthesize`, `sufficient = true` regardless of
    /// scores, low confidence, `key_findings` seeded from evidence titles.
    pub fn forced(reason: &str, seed_titles: &[String]) -> Self {
        let key_findings = seed_titles.iter().take(5).cloned().collect();
        Self {
            mechanism_score: 0,
            clinical_score: 0,
            drug_candidates: Vec::new(),
            key_findings,
            mechanism_reasoning: format!("Unavailable: {reason}. Mechanism not assessed."),
            clinical_reasoning: format!("Unavailable: {reason}. Clinical evidence not assessed."),
            sufficient: true,
            confidence: 0.1,
            recommendation: Recommendation::Synthesize,
            next_queries: Vec::new(),
            reasoning: format!(
                "Forced synthesis: the judge backend could not produce an assessment ({reason})."
            ),
            forced: true,
        }
    }

    /// Applies the sufficiency rubric from spec.md §4.3:
    /// `sufficient` iff `mechanism_score >= mech_min && clinical_score >=
    /// clin_min && confidence >= conf_min`.
    pub fn evaluate_sufficiency(&mut self, mech_min: u8, clin_min: u8, conf_min: f32) {
        self.sufficient = self.mechanism_score >= mech_min
            && self.clinical_score >= clin_min
            && self.confidence >= conf_min;
        self.recommendation = if self.sufficient {
            Recommendation::Synthesize
        } else {
            Recommendation::Continue
        };
    }
}
