//! Evidence Store (spec.md §4.1): the per-request, in-memory accumulation
//! point for everything the Search Dispatcher ingests. Owns its own mutex
//! the way the teacher's shared HTTP clients are `OnceLock`-guarded
//! singletons; here the guarded state is per-request rather than
//! process-wide, so a plain `tokio::sync::Mutex` (not a singleton) is used,
//! since `ingest` may call an async embedder.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::embedding::{cosine_similarity, Embedder};
use crate::model::Evidence;

struct Inner {
    /// Canonical IDs in first-seen order; defines iteration order for
    /// `all()`/`top_relevant()` and `sources_searched` bookkeeping.
    ordered_ids: Vec<String>,
    cache: HashMap<String, Evidence>,
    embeddings: HashMap<String, Vec<f32>>,
    /// Embedding of `question`, computed lazily on first `top_relevant`
    /// call and cached for the life of the request.
    question_embedding: Option<Vec<f32>>,
    iteration_count: u32,
}

pub struct EvidenceStore {
    question: String,
    embedder: Option<Arc<dyn Embedder>>,
    /// Set after the first `EmbeddingError`; once true the store stops
    /// calling the embedder for the rest of the request rather than
    /// retrying a backend that has already failed (spec.md §4.5 degrade
    /// rule). The `Arc` itself stays valid — we just stop invoking it.
    embedder_disabled: AtomicBool,
    similarity_threshold: f32,
    inner: Mutex<Inner>,
}

impl EvidenceStore {
    pub fn new(question: impl Into<String>, embedder: Option<Arc<dyn Embedder>>, similarity_threshold: f32) -> Self {
        Self {
            question: question.into(),
            embedder,
            embedder_disabled: AtomicBool::new(false),
            similarity_threshold,
            inner: Mutex::new(Inner {
                ordered_ids: Vec::new(),
                cache: HashMap::new(),
                embeddings: HashMap::new(),
                question_embedding: None,
                iteration_count: 0,
            }),
        }
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub async fn iteration_count(&self) -> u32 {
        self.inner.lock().await.iteration_count
    }

    pub async fn begin_iteration(&self) -> u32 {
        let mut inner = self.inner.lock().await;
        inner.iteration_count += 1;
        inner.iteration_count
    }

    /// Ingests a batch of newly-found evidence: canonical-ID dedup always
    /// runs; semantic near-duplicate collapse runs in addition when an
    /// embedder is configured and still enabled. Returns the number of
    /// genuinely new records added. Order of `batch` is preserved for
    /// ties within this call, matching the Dispatcher's provider order.
    pub async fn ingest(&self, batch: Vec<Evidence>) -> usize {
        let mut added = 0;
        for evidence in batch {
            if self.ingest_one(evidence).await {
                added += 1;
            }
        }
        added
    }

    async fn ingest_one(&self, mut evidence: Evidence) -> bool {
        let canonical_id = evidence.canonical_id();
        let embedding = self.maybe_embed(&evidence).await;

        let mut inner = self.inner.lock().await;

        if let Some(existing) = inner.cache.get_mut(&canonical_id) {
            existing.merge_metadata_from(&evidence);
            debug!(canonical_id, "evidence merged: canonical id collision");
            return false;
        }

        if let Some(ref new_embedding) = embedding {
            let duplicate_id = inner.embeddings.iter().find_map(|(id, existing)| {
                if cosine_similarity(existing, new_embedding) >= self.similarity_threshold {
                    Some(id.clone())
                } else {
                    None
                }
            });
            if let Some(duplicate_id) = duplicate_id {
                if let Some(existing) = inner.cache.get_mut(&duplicate_id) {
                    existing.merge_metadata_from(&evidence);
                }
                debug!(canonical_id, duplicate_id, "evidence merged: semantic near-duplicate");
                return false;
            }
        }

        evidence.metadata.entry("canonical_id".into()).or_insert_with(|| canonical_id.clone().into());
        inner.ordered_ids.push(canonical_id.clone());
        if let Some(embedding) = embedding {
            inner.embeddings.insert(canonical_id.clone(), embedding);
        }
        inner.cache.insert(canonical_id, evidence);
        true
    }

    async fn maybe_embed(&self, evidence: &Evidence) -> Option<Vec<f32>> {
        let embedder = self.embedder.as_ref()?;
        if self.embedder_disabled.load(Ordering::Relaxed) {
            return None;
        }
        match embedder.embed(&evidence.content).await {
            Ok(vector) => Some(vector),
            Err(err) => {
                warn!(error = %err, "embedder failed, disabling semantic dedup for this request");
                self.embedder_disabled.store(true, Ordering::Relaxed);
                None
            }
        }
    }

    /// The question's own embedding, computed once and cached in `Inner`.
    /// Shares the same degrade-on-first-failure behavior as `maybe_embed`.
    async fn question_embedding(&self) -> Option<Vec<f32>> {
        let embedder = self.embedder.as_ref()?;
        if self.embedder_disabled.load(Ordering::Relaxed) {
            return None;
        }

        {
            let inner = self.inner.lock().await;
            if let Some(ref cached) = inner.question_embedding {
                return Some(cached.clone());
            }
        }

        match embedder.embed(&self.question).await {
            Ok(vector) => {
                let mut inner = self.inner.lock().await;
                inner.question_embedding = Some(vector.clone());
                Some(vector)
            }
            Err(err) => {
                warn!(error = %err, "embedder failed while embedding the question, disabling semantic ranking for this request");
                self.embedder_disabled.store(true, Ordering::Relaxed);
                None
            }
        }
    }

    pub async fn all(&self) -> Vec<Evidence> {
        let inner = self.inner.lock().await;
        inner
            .ordered_ids
            .iter()
            .filter_map(|id| inner.cache.get(id).cloned())
            .collect()
    }

    /// The top `n` records most relevant to the question. Ranked by cosine
    /// similarity between each evidence's cached embedding and the
    /// question's own embedding when an embedder is configured and still
    /// enabled; falls back to the stored `relevance` score (as reported by
    /// the search provider) when no embedder is available or it has
    /// degraded after a failure (spec.md §4.1, §4.5).
    pub async fn top_relevant(&self, n: usize) -> Vec<Evidence> {
        if let Some(question_embedding) = self.question_embedding().await {
            return self.top_relevant_by_similarity(&question_embedding, n).await;
        }
        self.top_relevant_by_relevance(n).await
    }

    async fn top_relevant_by_similarity(&self, question_embedding: &[f32], n: usize) -> Vec<Evidence> {
        let inner = self.inner.lock().await;
        let mut scored: Vec<(f32, &Evidence)> = inner
            .ordered_ids
            .iter()
            .filter_map(|id| inner.cache.get(id).map(|evidence| (id, evidence)))
            .map(|(id, evidence)| {
                let score = inner
                    .embeddings
                    .get(id)
                    .map(|embedding| cosine_similarity(embedding, question_embedding))
                    .unwrap_or(0.0);
                (score, evidence)
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(n);
        scored.into_iter().map(|(_, evidence)| evidence.clone()).collect()
    }

    /// Ties broken by insertion order.
    async fn top_relevant_by_relevance(&self, n: usize) -> Vec<Evidence> {
        let mut all = self.all().await;
        all.sort_by(|a, b| b.relevance.partial_cmp(&a.relevance).unwrap_or(std::cmp::Ordering::Equal));
        all.truncate(n);
        all
    }

    /// A short textual digest used by the fallback synthesis path when the
    /// chat backend is unavailable (spec.md §4.4): count plus the leading
    /// titles, no LLM involved.
    pub async fn summary(&self) -> String {
        let all = self.all().await;
        if all.is_empty() {
            return format!("No evidence was gathered for: {}", self.question);
        }
        let mut out = format!("{} evidence records gathered for: {}\n", all.len(), self.question);
        for evidence in all.iter().take(10) {
            out.push_str(&format!("- {} ({})\n", evidence.citation.title, evidence.citation.source.as_str()));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Citation, SourceKind};
    use serde_json::Value;

    fn evidence(url: &str, pmid: Option<&str>, relevance: f32) -> Evidence {
        let citation = Citation::new(SourceKind::Pubmed, "Title", url, None, vec![]);
        let mut e = Evidence::new("some content body", citation, relevance);
        if let Some(pmid) = pmid {
            e.metadata.insert("pmid".into(), Value::String(pmid.into()));
        }
        e
    }

    #[tokio::test]
    async fn canonical_dedup_collapses_same_pmid() {
        let store = EvidenceStore::new("q", None, 0.9);
        let added = store
            .ingest(vec![evidence("https://a", Some("1"), 0.5), evidence("https://b", Some("1"), 0.9)])
            .await;
        assert_eq!(added, 1);
        assert_eq!(store.all().await.len(), 1);
    }

    #[tokio::test]
    async fn distinct_ids_are_both_kept() {
        let store = EvidenceStore::new("q", None, 0.9);
        let added = store
            .ingest(vec![evidence("https://a", Some("1"), 0.5), evidence("https://b", Some("2"), 0.9)])
            .await;
        assert_eq!(added, 2);
    }

    #[tokio::test]
    async fn top_relevant_orders_by_relevance_descending() {
        let store = EvidenceStore::new("q", None, 0.9);
        store
            .ingest(vec![
                evidence("https://a", Some("1"), 0.3),
                evidence("https://b", Some("2"), 0.9),
                evidence("https://c", Some("3"), 0.6),
            ])
            .await;
        let top = store.top_relevant(2).await;
        assert_eq!(top.len(), 2);
        assert!(top[0].relevance >= top[1].relevance);
        assert_eq!(top[0].citation.url, "https://b");
    }

    #[tokio::test]
    async fn top_relevant_ranks_by_similarity_to_question_when_embedder_available() {
        let store = EvidenceStore::new(
            "metformin lowers blood glucose",
            Some(Arc::new(crate::embedding::HashEmbedder::new())),
            0.999,
        );
        // `relevance` is set backwards on purpose: the record sharing no
        // vocabulary with the question has the higher stored relevance, so
        // a relevance-sorted result would rank it first. If `top_relevant`
        // instead ranks by embedding similarity, the on-topic record wins.
        let on_topic = Evidence::new(
            "metformin lowers blood glucose in adults",
            Citation::new(SourceKind::Pubmed, "On topic", "https://on-topic", None, vec![]),
            0.1,
        );
        let off_topic = Evidence::new(
            "quantum chromodynamics and gluon confinement",
            Citation::new(SourceKind::Web, "Off topic", "https://off-topic", None, vec![]),
            0.9,
        );
        store.ingest(vec![off_topic, on_topic]).await;

        let top = store.top_relevant(1).await;
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].citation.url, "https://on-topic");
    }

    #[tokio::test]
    async fn semantic_dedup_collapses_near_duplicate_content() {
        let store = EvidenceStore::new("q", Some(Arc::new(crate::embedding::HashEmbedder::new())), 0.90);
        let a = Evidence::new(
            "metformin lowers blood glucose in type 2 diabetes",
            Citation::new(SourceKind::Pubmed, "A", "https://a", None, vec![]),
            0.5,
        );
        let b = Evidence::new(
            "metformin lowers blood glucose in type 2 diabetes",
            Citation::new(SourceKind::Web, "B", "https://b", None, vec![]),
            0.5,
        );
        let added = store.ingest(vec![a, b]).await;
        assert_eq!(added, 1);
    }

    #[tokio::test]
    async fn summary_lists_gathered_titles() {
        let store = EvidenceStore::new("does X cause Y", None, 0.9);
        store.ingest(vec![evidence("https://a", Some("1"), 0.5)]).await;
        let summary = store.summary().await;
        assert!(summary.contains("does X cause Y"));
        assert!(summary.contains("Title"));
    }
}
