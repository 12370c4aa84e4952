//! Search Provider capability and the Dispatcher that fans queries out
//! across all configured providers (spec.md §4.2).

pub mod dispatcher;
pub mod providers;

use async_trait::async_trait;

use crate::error::{CoreError, SearchErrorKind};
use crate::model::Evidence;

#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Stable identifier used in `SearchBatch::errors` and `sources_searched`.
    fn name(&self) -> &str;

    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<Evidence>, CoreError>;
}

/// Result of one Dispatcher fan-out round (spec.md §4.2). `errors` never
/// causes the whole batch to fail; a provider failing is recorded here and
/// the other providers' results still flow to the Evidence Store. Carries
/// `(provider_name, error_kind, message)` triples rather than a `CoreError`
/// directly, since a provider failure is always a `CoreError::Search` and
/// callers only need the kind/message pair to log or report it.
#[derive(Debug, Default)]
pub struct SearchBatch {
    pub query: String,
    pub evidence: Vec<Evidence>,
    pub errors: Vec<(String, SearchErrorKind, String)>,
    pub sources_searched: Vec<String>,
    pub total_found: usize,
}

pub use dispatcher::SearchDispatcher;
