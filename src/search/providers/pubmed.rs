use std::borrow::Cow;
use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::support::{env_base, get_json};
use crate::error::CoreError;
use crate::model::{Citation, Evidence, SourceKind};
use crate::search::SearchProvider;

const DEFAULT_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
const BASE_ENV: &str = "LITLOOP_PUBMED_BASE_URL";

#[derive(Debug, Deserialize)]
struct ESearchResponse {
    esearchresult: ESearchResult,
}

#[derive(Debug, Deserialize)]
struct ESearchResult {
    idlist: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ESummaryResponse {
    result: HashMap<String, Value>,
}

/// Literature search against PubMed via NCBI's E-utilities (esearch then
/// esummary), grounded in the teacher's PMID parsing conventions
/// (`parse_pmid`-equivalent canonical metadata tagging).
pub struct PubMedProvider {
    base_url: Cow<'static, str>,
}

impl PubMedProvider {
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

impl Default for PubMedProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchProvider for PubMedProvider {
    fn name(&self) -> &str {
        "pubmed"
    }

    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<Evidence>, CoreError> {
        let search_url = format!(
            "{}/esearch.fcgi?db=pubmed&retmode=json&retmax={}&term={}",
            self.base_url,
            max_results,
            urlencoding_simple(query)
        );
        let search: ESearchResponse = get_json(self.name(), &search_url).await?;
        if search.esearchresult.idlist.is_empty() {
            return Ok(Vec::new());
        }

        let ids = search.esearchresult.idlist.join(",");
        let summary_url = format!("{}/esummary.fcgi?db=pubmed&retmode=json&id={}", self.base_url, ids);
        let summary: ESummaryResponse = get_json(self.name(), &summary_url).await?;

        let mut evidence = Vec::new();
        for pmid in &search.esearchresult.idlist {
            let Some(record) = summary.result.get(pmid) else {
                continue;
            };
            let title = record.get("title").and_then(Value::as_str).unwrap_or("Untitled").to_string();
            let date = record.get("pubdate").and_then(Value::as_str).map(str::to_string);
            let authors = record
                .get("authors")
                .and_then(Value::as_array)
                .map(|list| {
                    list.iter()
                        .filter_map(|a| a.get("name").and_then(Value::as_str).map(str::to_string))
                        .collect()
                })
                .unwrap_or_default();

            let citation = Citation::new(
                SourceKind::Pubmed,
                title.clone(),
                format!("https://pubmed.ncbi.nlm.nih.gov/{pmid}/"),
                date,
                authors,
            );
            let mut item = Evidence::new(title, citation, 0.5);
            item.metadata.insert("pmid".into(), Value::String(pmid.clone()));
            evidence.push(item);
        }
        Ok(evidence)
    }
}

/// Minimal percent-encoding for query terms; avoids pulling in a dedicated
/// URL-encoding crate the teacher's stack doesn't already carry.
pub(crate) fn urlencoding_simple(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(byte as char),
            b' ' => out.push_str("%20"),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
