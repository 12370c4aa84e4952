use std::borrow::Cow;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::pubmed::urlencoding_simple;
use super::support::{env_base, get_json};
use crate::error::CoreError;
use crate::model::{Citation, Evidence, SourceKind};
use crate::search::SearchProvider;

const DEFAULT_BASE: &str = "https://www.ebi.ac.uk/europepmc/webservices/rest";
const BASE_ENV: &str = "LITLOOP_EUROPEPMC_BASE_URL";

#[derive(Debug, Deserialize)]
struct EuropePmcResponse {
    #[serde(rename = "resultList")]
    result_list: ResultList,
}

#[derive(Debug, Deserialize)]
struct ResultList {
    result: Vec<EuropePmcResult>,
}

#[derive(Debug, Deserialize)]
struct EuropePmcResult {
    pmid: Option<String>,
    doi: Option<String>,
    title: Option<String>,
    #[serde(rename = "authorString")]
    author_string: Option<String>,
    #[serde(rename = "firstPublicationDate")]
    first_publication_date: Option<String>,
    #[serde(rename = "abstractText")]
    abstract_text: Option<String>,
}

/// Literature search against Europe PMC's REST API, which conveniently
/// exposes both a PMID and a DOI per record — a good match for the
/// canonical-ID priority rule in the Evidence Store.
pub struct EuropePmcProvider {
    base_url: Cow<'static, str>,
}

impl EuropePmcProvider {
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

impl Default for EuropePmcProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchProvider for EuropePmcProvider {
    fn name(&self) -> &str {
        "europepmc"
    }

    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<Evidence>, CoreError> {
        let url = format!(
            "{}/search?query={}&format=json&pageSize={}",
            self.base_url,
            urlencoding_simple(query),
            max_results
        );
        let response: EuropePmcResponse = get_json(self.name(), &url).await?;

        let evidence = response
            .result_list
            .result
            .into_iter()
            .map(|record| {
                let title = record.title.clone().unwrap_or_else(|| "Untitled".to_string());
                let authors = record
                    .author_string
                    .as_deref()
                    .map(|s| s.split(", ").map(str::to_string).collect())
                    .unwrap_or_default();
                let url = record
                    .doi
                    .as_ref()
                    .map(|doi| format!("https://doi.org/{doi}"))
                    .or_else(|| record.pmid.as_ref().map(|pmid| format!("https://pubmed.ncbi.nlm.nih.gov/{pmid}/")))
                    .unwrap_or_else(|| format!("https://europepmc.org/search?query={}", urlencoding_simple(&title)));

                let citation = Citation::new(
                    SourceKind::Europepmc,
                    title.clone(),
                    url,
                    record.first_publication_date,
                    authors,
                );
                let mut item = Evidence::new(record.abstract_text.unwrap_or(title), citation, 0.5);
                if let Some(pmid) = record.pmid {
                    item.metadata.insert("pmid".into(), Value::String(pmid));
                }
                if let Some(doi) = record.doi {
                    item.metadata.insert("doi".into(), Value::String(doi));
                }
                item
            })
            .collect();
        Ok(evidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn search_prefers_doi_over_pmid_for_the_citation_url() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "resultList": {
                    "result": [{
                        "pmid": "999",
                        "doi": "10.1000/xyz",
                        "title": "Metformin review",
                        "authorString": "Smith J, Doe A",
                        "firstPublicationDate": "2021-05-01",
                        "abstractText": "A review of metformin pharmacology."
                    }]
                }
            })))
            .mount(&server)
            .await;

        let provider = EuropePmcProvider::new_for_test(server.uri());
        let evidence = provider.search("metformin", 10).await.unwrap();
        assert_eq!(evidence.len(), 1);
        assert_eq!(evidence[0].citation.url, "https://doi.org/10.1000/xyz");
        assert_eq!(evidence[0].citation.authors, vec!["Smith J", "Doe A"]);
        assert_eq!(evidence[0].metadata.get("pmid").and_then(Value::as_str), Some("999"));
    }

    #[tokio::test]
    async fn search_falls_back_to_pmid_url_when_doi_is_absent() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "resultList": {
                    "result": [{
                        "pmid": "111",
                        "doi": null,
                        "title": "No DOI study",
                        "authorString": null,
                        "firstPublicationDate": null,
                        "abstractText": null
                    }]
                }
            })))
            .mount(&server)
            .await;

        let provider = EuropePmcProvider::new_for_test(server.uri());
        let evidence = provider.search("query", 10).await.unwrap();
        assert_eq!(evidence[0].citation.url, "https://pubmed.ncbi.nlm.nih.gov/111/");
    }
}
