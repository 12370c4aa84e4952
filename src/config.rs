//! Orchestrator configuration (spec.md §6). Every knob is validated eagerly
//! at construction; a bad value is a startup-time `CoreError::Configuration`,
//! never a mid-request surprise (§7).

use crate::error::CoreError;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub max_iterations: u32,
    pub max_results_per_provider: u32,
    pub search_timeout_seconds: u64,
    pub overall_timeout_seconds: u64,
    pub dedup_similarity_threshold: f32,
    pub judge_mechanism_min: u8,
    pub judge_clinical_min: u8,
    pub judge_confidence_min: f32,
    pub max_evidence_sent_to_judge: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            max_results_per_provider: 10,
            search_timeout_seconds: 30,
            overall_timeout_seconds: 600,
            dedup_similarity_threshold: 0.90,
            judge_mechanism_min: 6,
            judge_clinical_min: 6,
            judge_confidence_min: 0.7,
            max_evidence_sent_to_judge: 30,
        }
    }
}

impl OrchestratorConfig {
    /// Validates range invariants from spec.md §6. Called once at startup by
    /// whoever builds the Orchestrator, never per-request.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(1..=50).contains(&self.max_iterations) {
            return Err(CoreError::Configuration(
                "max_iterations must be within 1..=50".into(),
            ));
        }
        if !(1..=50).contains(&self.max_results_per_provider) {
            return Err(CoreError::Configuration(
                "max_results_per_provider must be within 1..=50".into(),
            ));
        }
        if !(5..=120).contains(&self.search_timeout_seconds) {
            return Err(CoreError::Configuration(
                "search_timeout_seconds must be within 5..=120".into(),
            ));
        }
        if !(60..=900).contains(&self.overall_timeout_seconds) {
            return Err(CoreError::Configuration(
                "overall_timeout_seconds must be within 60..=900".into(),
            ));
        }
        if self.overall_timeout_seconds < self.search_timeout_seconds {
            return Err(CoreError::Configuration(
                "overall_timeout_seconds must be >= search_timeout_seconds".into(),
            ));
        }
        if !(0.5..=0.99).contains(&self.dedup_similarity_threshold) {
            return Err(CoreError::Configuration(
                "dedup_similarity_threshold must be within 0.5..=0.99".into(),
            ));
        }
        if self.judge_mechanism_min > 10 || self.judge_clinical_min > 10 {
            return Err(CoreError::Configuration(
                "judge score thresholds must be within 0..=10".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.judge_confidence_min) {
            return Err(CoreError::Configuration(
                "judge_confidence_min must be within 0.0..=1.0".into(),
            ));
        }
        if !(1..=100).contains(&self.max_evidence_sent_to_judge) {
            return Err(CoreError::Configuration(
                "max_evidence_sent_to_judge must be within 1..=100".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(OrchestratorConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_max_iterations_is_rejected() {
        let mut c = OrchestratorConfig::default();
        c.max_iterations = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn overall_timeout_below_search_timeout_is_rejected() {
        let mut c = OrchestratorConfig::default();
        c.overall_timeout_seconds = 60;
        c.search_timeout_seconds = 100;
        assert!(c.validate().is_err());
    }

    #[test]
    fn out_of_range_confidence_threshold_is_rejected() {
        let mut c = OrchestratorConfig::default();
        c.judge_confidence_min = 1.5;
        assert!(c.validate().is_err());
    }

    #[test]
    fn max_iterations_above_fifty_is_rejected() {
        let mut c = OrchestratorConfig::default();
        c.max_iterations = 51;
        assert!(c.validate().is_err());
    }

    #[test]
    fn overall_timeout_above_nine_hundred_is_rejected() {
        let mut c = OrchestratorConfig::default();
        c.overall_timeout_seconds = 901;
        assert!(c.validate().is_err());
    }

    #[test]
    fn dedup_similarity_threshold_below_half_is_rejected() {
        let mut c = OrchestratorConfig::default();
        c.dedup_similarity_threshold = 0.3;
        assert!(c.validate().is_err());
    }

    #[test]
    fn search_timeout_below_five_seconds_is_rejected() {
        let mut c = OrchestratorConfig::default();
        c.search_timeout_seconds = 4;
        assert!(c.validate().is_err());
    }

    #[test]
    fn max_evidence_sent_to_judge_above_one_hundred_is_rejected() {
        let mut c = OrchestratorConfig::default();
        c.max_evidence_sent_to_judge = 101;
        assert!(c.validate().is_err());
    }
}
