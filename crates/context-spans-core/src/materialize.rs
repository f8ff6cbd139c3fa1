//! Get-or-insert materialization of candidate contexts.
//!
//! [`load_or_insert`] turns a [`TemporaryContext`] into a persisted row at
//! most once per stable id:
//!
//! 1. A candidate that already carries a surrogate id is left alone.
//! 2. Its stable id is derived and looked up in the store.
//! 3. An existing row's id is adopted.
//! 4. Otherwise the base and subtype rows are inserted together.
//!
//! The lookup and insert are separate store calls, so two writers can both
//! miss and both insert. Stores reject the loser with
//! [`StoreError::Conflict`]; the loser re-reads and adopts the winner's id.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::error::{ContextError, Result};
use crate::registry::{schema_for, Field};
use crate::span::TemporarySpan;
use crate::store::{ContextStore, StoreError};
use crate::temporary::TemporaryContext;

/// Default number of insert attempts lost to conflicts before giving up.
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;

/// Whether a materialization found an existing row or created one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    AlreadySet(i64),
    Loaded(i64),
    Inserted(i64),
}

impl Outcome {
    pub fn id(self) -> i64 {
        match self {
            Outcome::AlreadySet(id) | Outcome::Loaded(id) | Outcome::Inserted(id) => id,
        }
    }
}

/// Load the surrogate id of `candidate`'s stable id, inserting it if absent.
///
/// Sets the candidate's id and returns it.
pub async fn load_or_insert<S>(store: &S, candidate: &mut dyn TemporaryContext) -> Result<i64>
where
    S: ContextStore + ?Sized,
{
    Ok(materialize(store, candidate, DEFAULT_MAX_CONFLICT_RETRIES)
        .await?
        .id())
}

/// [`load_or_insert`] with an explicit retry budget, reporting the outcome.
pub async fn materialize<S>(
    store: &S,
    candidate: &mut dyn TemporaryContext,
    max_conflict_retries: u32,
) -> Result<Outcome>
where
    S: ContextStore + ?Sized,
{
    if let Some(id) = candidate.id() {
        return Ok(Outcome::AlreadySet(id));
    }

    let kind = candidate.kind();
    let stable_id = candidate.stable_id()?;

    // Adopting needs only the stable id; owners may still be unmaterialized.
    let mut fields: Option<Vec<Field>> = None;
    let attempts = max_conflict_retries.max(1);
    for attempt in 1..=attempts {
        if let Some(id) = store.lookup_by_stable_id(&stable_id).await? {
            debug!(stable_id = %stable_id, id, "adopted existing context");
            candidate.set_id(id);
            return Ok(Outcome::Loaded(id));
        }

        if fields.is_none() {
            let row = candidate.insert_fields()?;
            schema_for(kind).check_fields(&row)?;
            fields = Some(row);
        }
        let row = fields.as_deref().unwrap_or_default();
        match store.insert_row(kind, &stable_id, row).await {
            Ok(id) => {
                debug!(stable_id = %stable_id, id, kind = %kind, "inserted context");
                candidate.set_id(id);
                return Ok(Outcome::Inserted(id));
            }
            Err(StoreError::Conflict(_)) => {
                warn!(stable_id = %stable_id, attempt, "stable_id inserted concurrently, re-reading");
            }
            Err(e) => return Err(e.into()),
        }
    }

    // A conflict means the row exists; one last read settles it.
    if let Some(id) = store.lookup_by_stable_id(&stable_id).await? {
        candidate.set_id(id);
        return Ok(Outcome::Loaded(id));
    }
    Err(ContextError::ConflictRetriesExhausted {
        stable_id,
        attempts,
    })
}

/// Counts from materializing a batch of candidate spans.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub candidates: usize,
    pub distinct: usize,
    pub inserted: usize,
    pub loaded: usize,
}

/// Deduplicate `candidates` by value and materialize each distinct span.
///
/// Returns the materialized spans in first-seen order.
pub async fn materialize_spans<S>(
    store: &S,
    candidates: impl IntoIterator<Item = TemporarySpan>,
    max_conflict_retries: u32,
) -> Result<(Vec<TemporarySpan>, BatchSummary)>
where
    S: ContextStore + ?Sized,
{
    let mut summary = BatchSummary::default();
    let mut seen = HashSet::new();
    let mut distinct = Vec::new();
    for span in candidates {
        summary.candidates += 1;
        if seen.insert(span.clone()) {
            distinct.push(span);
        }
    }
    summary.distinct = distinct.len();

    for span in distinct.iter_mut() {
        match materialize(store, span, max_conflict_retries).await? {
            Outcome::Inserted(_) => summary.inserted += 1,
            Outcome::Loaded(_) | Outcome::AlreadySet(_) => summary.loaded += 1,
        }
    }
    Ok((distinct, summary))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::models::{Context, ContextKind, Document, Sentence};
    use crate::registry::Field;
    use crate::store::memory::InMemoryStore;
    use crate::tokens::TokenAttrs;

    async fn seeded_sentence(store: &InMemoryStore) -> Arc<Context> {
        let mut doc = Document::new("doc", None).unwrap();
        load_or_insert(store, &mut doc).await.unwrap();
        let tokens = TokenAttrs::new(vec!["a".into(), "b".into()], vec![0, 2]);
        let mut s = Sentence::new(&doc, 0, 0, "a b", tokens).unwrap();
        load_or_insert(store, &mut s).await.unwrap();
        Arc::new(s.into())
    }

    #[tokio::test]
    async fn test_idempotent_for_same_stable_id() {
        let store = InMemoryStore::new();
        let parent = seeded_sentence(&store).await;
        let before = store.len();

        let mut first = TemporarySpan::new(Arc::clone(&parent), 0, 2);
        let mut second = TemporarySpan::new(Arc::clone(&parent), 0, 2);
        let a = load_or_insert(&store, &mut first).await.unwrap();
        let b = load_or_insert(&store, &mut second).await.unwrap();

        assert_eq!(a, b);
        assert_eq!(store.len(), before + 1);
        assert_eq!(second.id, Some(a));
    }

    #[tokio::test]
    async fn test_adopts_existing_span_over_rebuilt_parent() {
        let store = InMemoryStore::new();
        let parent = seeded_sentence(&store).await;
        let mut original = TemporarySpan::new(parent, 0, 2);
        let first = load_or_insert(&store, &mut original).await.unwrap();
        let before = store.len();

        // Same sentence rebuilt from source, never materialized itself.
        let mut doc = Document::new("doc", None).unwrap();
        load_or_insert(&store, &mut doc).await.unwrap();
        let tokens = TokenAttrs::new(vec!["a".into(), "b".into()], vec![0, 2]);
        let rebuilt = Sentence::new(&doc, 0, 0, "a b", tokens).unwrap();
        assert_eq!(rebuilt.base.id, None);

        let mut again = TemporarySpan::new(Arc::new(rebuilt.into()), 0, 2);
        let outcome = materialize(&store, &mut again, 3).await.unwrap();
        assert_eq!(outcome, Outcome::Loaded(first));
        assert_eq!(again.id, Some(first));
        assert_eq!(store.len(), before);
    }

    #[tokio::test]
    async fn test_unmaterialized_parent_fails_only_on_insert() {
        let store = InMemoryStore::new();
        let mut doc = Document::new("doc", None).unwrap();
        load_or_insert(&store, &mut doc).await.unwrap();
        let tokens = TokenAttrs::new(vec!["a".into(), "b".into()], vec![0, 2]);
        let sentence = Sentence::new(&doc, 0, 0, "a b", tokens).unwrap();

        let mut span = TemporarySpan::new(Arc::new(sentence.into()), 0, 2);
        let err = load_or_insert(&store, &mut span).await.unwrap_err();
        assert!(matches!(err, ContextError::Unmaterialized { .. }));
        assert_eq!(span.id, None);
    }

    #[tokio::test]
    async fn test_already_materialized_is_noop() {
        let store = InMemoryStore::new();
        let parent = seeded_sentence(&store).await;
        let mut span = TemporarySpan::new(parent, 0, 0);
        span.id = Some(77);
        let outcome = materialize(&store, &mut span, 3).await.unwrap();
        assert_eq!(outcome, Outcome::AlreadySet(77));
        assert_eq!(store.lookup_by_stable_id("doc::span:0:0").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_outcomes() {
        let store = InMemoryStore::new();
        let mut doc = Document::new("doc", None).unwrap();
        let first = materialize(&store, &mut doc, 3).await.unwrap();
        assert!(matches!(first, Outcome::Inserted(_)));

        let mut again = Document::new("doc", None).unwrap();
        let second = materialize(&store, &mut again, 3).await.unwrap();
        assert_eq!(second, Outcome::Loaded(first.id()));
    }

    #[tokio::test]
    async fn test_materialize_spans_dedups_by_value() {
        let store = InMemoryStore::new();
        let parent = seeded_sentence(&store).await;
        let candidates = vec![
            TemporarySpan::new(Arc::clone(&parent), 0, 0),
            TemporarySpan::new(Arc::clone(&parent), 2, 2),
            TemporarySpan::new(Arc::clone(&parent), 0, 0),
            TemporarySpan::new(Arc::clone(&parent), 0, 2),
        ];
        let (spans, summary) = materialize_spans(&store, candidates, 3).await.unwrap();
        assert_eq!(
            summary,
            BatchSummary {
                candidates: 4,
                distinct: 3,
                inserted: 3,
                loaded: 0,
            }
        );
        assert!(spans.iter().all(|s| s.id.is_some()));

        let again = vec![TemporarySpan::new(parent, 2, 2)];
        let (_, summary) = materialize_spans(&store, again, 3).await.unwrap();
        assert_eq!(summary.loaded, 1);
        assert_eq!(summary.inserted, 0);
    }

    /// Hides the first `misses` lookups, simulating a writer that loses the
    /// race between its lookup and its insert.
    struct RacingStore {
        inner: InMemoryStore,
        misses: AtomicUsize,
    }

    #[async_trait]
    impl ContextStore for RacingStore {
        async fn lookup_by_stable_id(&self, stable_id: &str) -> std::result::Result<Option<i64>, StoreError> {
            if self.misses.load(Ordering::SeqCst) > 0 {
                self.misses.fetch_sub(1, Ordering::SeqCst);
                return Ok(None);
            }
            self.inner.lookup_by_stable_id(stable_id).await
        }

        async fn insert_row(
            &self,
            kind: ContextKind,
            stable_id: &str,
            fields: &[Field],
        ) -> std::result::Result<i64, StoreError> {
            self.inner.insert_row(kind, stable_id, fields).await
        }

        async fn owned_by(&self, owner_id: i64) -> std::result::Result<Vec<i64>, StoreError> {
            self.inner.owned_by(owner_id).await
        }

        async fn delete_contexts(&self, ids: &[i64]) -> std::result::Result<(), StoreError> {
            self.inner.delete_contexts(ids).await
        }

        async fn count_by_kind(&self) -> std::result::Result<Vec<(ContextKind, i64)>, StoreError> {
            self.inner.count_by_kind().await
        }
    }

    #[tokio::test]
    async fn test_conflict_rereads_existing_row() {
        let store = RacingStore {
            inner: InMemoryStore::new(),
            misses: AtomicUsize::new(0),
        };
        let mut winner = Document::new("doc", None).unwrap();
        let id = load_or_insert(&store, &mut winner).await.unwrap();

        store.misses.store(1, Ordering::SeqCst);
        let mut loser = Document::new("doc", None).unwrap();
        let outcome = materialize(&store, &mut loser, 3).await.unwrap();
        assert_eq!(outcome, Outcome::Loaded(id));
        assert_eq!(store.inner.len(), 1);
    }

    #[tokio::test]
    async fn test_conflict_retries_exhausted() {
        let store = RacingStore {
            inner: InMemoryStore::new(),
            misses: AtomicUsize::new(0),
        };
        let mut winner = Document::new("doc", None).unwrap();
        load_or_insert(&store, &mut winner).await.unwrap();

        store.misses.store(10, Ordering::SeqCst);
        let mut loser = Document::new("doc", None).unwrap();
        let err = materialize(&store, &mut loser, 2).await.unwrap_err();
        assert!(matches!(
            err,
            ContextError::ConflictRetriesExhausted { attempts: 2, .. }
        ));
        assert_eq!(loser.base.id, None);
    }

    #[tokio::test]
    async fn test_field_mismatch_fails_fast() {
        struct Broken;
        impl TemporaryContext for Broken {
            fn kind(&self) -> ContextKind {
                ContextKind::Table
            }
            fn id(&self) -> Option<i64> {
                None
            }
            fn set_id(&mut self, _id: i64) {}
            fn stable_id(&self) -> Result<String> {
                Ok("doc::table:0:0".to_string())
            }
            fn insert_fields(&self) -> Result<Vec<Field>> {
                Ok(vec![("text", "t".into())])
            }
        }

        let store = InMemoryStore::new();
        let err = load_or_insert(&store, &mut Broken).await.unwrap_err();
        assert!(matches!(err, ContextError::FieldMismatch { kind: "table", .. }));
        assert!(store.is_empty());
    }
}
