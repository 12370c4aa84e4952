use std::borrow::Cow;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::pubmed::urlencoding_simple;
use super::support::{env_base, get_json};
use crate::error::CoreError;
use crate::model::{Citation, Evidence, SourceKind};
use crate::search::SearchProvider;

const DEFAULT_BASE: &str = "https://api.openalex.org";
const BASE_ENV: &str = "LITLOOP_OPENALEX_BASE_URL";

#[derive(Debug, Deserialize)]
struct OpenAlexResponse {
    results: Vec<OpenAlexWork>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexWork {
    id: String,
    doi: Option<String>,
    title: Option<String>,
    #[serde(default)]
    authorships: Vec<OpenAlexAuthorship>,
    publication_date: Option<String>,
    cited_by_count: Option<u64>,
    #[serde(default)]
    open_access: Option<OpenAlexOpenAccess>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexAuthorship {
    author: OpenAlexAuthor,
}

#[derive(Debug, Deserialize)]
struct OpenAlexAuthor {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexOpenAccess {
    is_oa: Option<bool>,
}

/// Citation-graph-aware literature search against OpenAlex, grounded in the
/// teacher's citation-count and open-access metadata fields
/// (`Article::citation_count`, `Article::open_access`).
pub struct OpenAlexProvider {
    base_url: Cow<'static, str>,
}

impl OpenAlexProvider {
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

impl Default for OpenAlexProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchProvider for OpenAlexProvider {
    fn name(&self) -> &str {
        "openalex"
    }

    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<Evidence>, CoreError> {
        let url = format!(
            "{}/works?search={}&per_page={}",
            self.base_url,
            urlencoding_simple(query),
            max_results
        );
        let response: OpenAlexResponse = get_json(self.name(), &url).await?;

        let evidence = response
            .results
            .into_iter()
            .map(|work| {
                let title = work.title.clone().unwrap_or_else(|| "Untitled".to_string());
                let authors = work
                    .authorships
                    .iter()
                    .filter_map(|a| a.author.display_name.clone())
                    .collect();
                let citation = Citation::new(
                    SourceKind::Openalex,
                    title.clone(),
                    work.doi.clone().unwrap_or(work.id),
                    work.publication_date,
                    authors,
                );
                let mut item = Evidence::new(title, citation, 0.5);
                if let Some(doi) = work.doi {
                    item.metadata.insert("doi".into(), Value::String(doi));
                }
                if let Some(count) = work.cited_by_count {
                    item.metadata.insert("cited_by_count".into(), Value::from(count));
                }
                if let Some(oa) = work.open_access.and_then(|o| o.is_oa) {
                    item.metadata.insert("is_open_access".into(), Value::from(oa));
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
    async fn search_flattens_nested_authorships_and_open_access() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/works"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{
                    "id": "https://openalex.org/W123",
                    "doi": "10.2000/abc",
                    "title": "Metformin mechanisms of action",
                    "authorships": [
                        {"author": {"display_name": "Jane Researcher"}},
                        {"author": {"display_name": "John Scientist"}}
                    ],
                    "publication_date": "2022-01-15",
                    "cited_by_count": 42,
                    "open_access": {"is_oa": true}
                }]
            })))
            .mount(&server)
            .await;

        let provider = OpenAlexProvider::new_for_test(server.uri());
        let evidence = provider.search("metformin", 10).await.unwrap();
        assert_eq!(evidence.len(), 1);
        assert_eq!(evidence[0].citation.authors, vec!["Jane Researcher", "John Scientist"]);
        assert_eq!(evidence[0].citation.url, "10.2000/abc");
        assert_eq!(evidence[0].metadata.get("cited_by_count").and_then(Value::as_u64), Some(42));
        assert_eq!(evidence[0].metadata.get("is_open_access").and_then(Value::as_bool), Some(true));
    }
}
