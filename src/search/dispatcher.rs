use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::{SearchBatch, SearchProvider};
use crate::error::{CoreError, SearchErrorKind};

/// Fans a query out to every configured provider concurrently and fans the
/// results back in. Preserves provider-declaration order in
/// `SearchBatch::sources_searched` and in the relative ordering of
/// `evidence` (spec.md §4.2, Open Question #2). One provider timing out or
/// erroring never aborts the batch.
pub struct SearchDispatcher {
    providers: Vec<Arc<dyn SearchProvider>>,
    per_provider_timeout: Duration,
}

impl SearchDispatcher {
    pub fn new(providers: Vec<Arc<dyn SearchProvider>>, per_provider_timeout: Duration) -> Self {
        Self {
            providers,
            per_provider_timeout,
        }
    }

    pub async fn dispatch(&self, query: &str, max_results: u32) -> SearchBatch {
        let calls = self.providers.iter().map(|provider| {
            let provider = Arc::clone(provider);
            let query = query.to_string();
            let timeout = self.per_provider_timeout;
            async move {
                let name = provider.name().to_string();
                let result = tokio::time::timeout(timeout, provider.search(&query, max_results)).await;
                (name, result)
            }
        });

        let outcomes = futures::future::join_all(calls).await;

        let mut batch = SearchBatch {
            query: query.to_string(),
            ..SearchBatch::default()
        };
        for (name, outcome) in outcomes {
            batch.sources_searched.push(name.clone());
            match outcome {
                Ok(Ok(evidence)) => {
                    debug!(provider = %name, count = evidence.len(), "search provider returned results");
                    batch.evidence.extend(evidence);
                }
                Ok(Err(err)) => {
                    warn!(provider = %name, error = %err, "search provider failed");
                    let (kind, message) = to_error_kind_and_message(err);
                    batch.errors.push((name, kind, message));
                }
                Err(_) => {
                    warn!(provider = %name, "search provider timed out");
                    batch.errors.push((
                        name,
                        SearchErrorKind::Timeout,
                        "provider did not respond within the per-provider timeout".into(),
                    ));
                }
            }
        }
        batch.total_found = batch.evidence.len();
        batch
    }
}

/// Unwraps the `(kind, message)` pair from a provider's `CoreError`. A
/// well-behaved `SearchProvider` always returns `CoreError::Search`; any
/// other variant is treated as an upstream failure rather than panicking.
fn to_error_kind_and_message(err: CoreError) -> (SearchErrorKind, String) {
    match err {
        CoreError::Search { kind, message, .. } => (kind, message),
        other => (SearchErrorKind::UpstreamUnavailable, other.to_string()),
    }
}
