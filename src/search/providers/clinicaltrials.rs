use std::borrow::Cow;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::support::{env_base, get_json};
use super::pubmed::urlencoding_simple;
use crate::error::CoreError;
use crate::model::{Citation, Evidence, SourceKind};
use crate::search::SearchProvider;

const DEFAULT_BASE: &str = "https://clinicaltrials.gov/api/v2";
const BASE_ENV: &str = "LITLOOP_CTGOV_BASE_URL";

#[derive(Debug, Deserialize)]
struct CtGovResponse {
    studies: Vec<CtGovStudy>,
}

#[derive(Debug, Deserialize)]
struct CtGovStudy {
    #[serde(rename = "protocolSection")]
    protocol_section: Value,
}

/// Trial registry search against ClinicalTrials.gov v2, following the
/// teacher's `ClinicalTrialsClient` shape: a `Cow<'static, str>` base URL
/// overridable via an env var, and the shared `get_json` helper for
/// bounded-body JSON GETs.
pub struct ClinicalTrialsProvider {
    base_url: Cow<'static, str>,
}

impl ClinicalTrialsProvider {
    pub fn new() -> Self {
        Self {
            base_url: env_base(BASE_ENV, DEFAULT_BASE),
        }
    }

    #[cfg(test)]
    fn new_for_test(base_url: String) -> Self {
        Self {
            base_url: Cow::Owned(base_url),
        }
    }
}

impl Default for ClinicalTrialsProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchProvider for ClinicalTrialsProvider {
    fn name(&self) -> &str {
        "clinicaltrials"
    }

    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<Evidence>, CoreError> {
        let url = format!(
            "{}/studies?query.term={}&pageSize={}",
            self.base_url,
            urlencoding_simple(query),
            max_results
        );
        let response: CtGovResponse = get_json(self.name(), &url).await?;

        let mut evidence = Vec::new();
        for study in response.studies {
            let ident = &study.protocol_section["identificationModule"];
            let nct_id = ident.get("nctId").and_then(Value::as_str).unwrap_or("").to_string();
            if nct_id.is_empty() {
                continue;
            }
            let title = ident
                .get("briefTitle")
                .and_then(Value::as_str)
                .unwrap_or("Untitled trial")
                .to_string();
            let date = study.protocol_section["statusModule"]
                .get("startDateStruct")
                .and_then(|d| d.get("date"))
                .and_then(Value::as_str)
                .map(str::to_string);
            let summary = study.protocol_section["descriptionModule"]
                .get("briefSummary")
                .and_then(Value::as_str)
                .unwrap_or(&title)
                .to_string();

            let citation = Citation::new(
                SourceKind::Clinicaltrials,
                title,
                format!("https://clinicaltrials.gov/study/{nct_id}"),
                date,
                Vec::new(),
            );
            let mut item = Evidence::new(summary, citation, 0.5);
            item.metadata.insert("nct_id".into(), Value::String(nct_id));
            evidence.push(item);
        }
        Ok(evidence)
    }
}
