//! Storage abstraction for materialized contexts.
//!
//! The [`ContextStore`] trait is the only view the core has of persistence:
//! look a context up by stable id, insert a new one, and walk or remove the
//! ownership table for cascading deletes. Backends (SQLite, in-memory) live
//! behind it.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::ContextKind;
use crate::registry::Field;

/// Errors surfaced by a [`ContextStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// Another writer already inserted a context with this stable id.
    /// Retryable: re-read and adopt the existing row.
    #[error("a context with stable_id {0:?} already exists")]
    Conflict(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Abstract storage backend for contexts.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`lookup_by_stable_id`](ContextStore::lookup_by_stable_id) | Find the surrogate id of a stable id |
/// | [`insert_row`](ContextStore::insert_row) | Insert base row, subtype row and ownership edges |
/// | [`owned_by`](ContextStore::owned_by) | Direct children of an owner |
/// | [`delete_contexts`](ContextStore::delete_contexts) | Remove contexts and their edges |
/// | [`count_by_kind`](ContextStore::count_by_kind) | Row counts per kind |
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Surrogate id of the context with `stable_id`, if any.
    async fn lookup_by_stable_id(&self, stable_id: &str) -> Result<Option<i64>, StoreError>;

    /// Insert a new context and return its surrogate id.
    ///
    /// Writes the base `(kind, stable_id)` row, the subtype row keyed by
    /// the same id with `fields` (already checked against the kind's
    /// registry entry), and one ownership edge per non-null owner column,
    /// all or nothing. A duplicate stable id fails with
    /// [`StoreError::Conflict`].
    async fn insert_row(
        &self,
        kind: ContextKind,
        stable_id: &str,
        fields: &[Field],
    ) -> Result<i64, StoreError>;

    /// Ids of the contexts directly owned by `owner_id`.
    async fn owned_by(&self, owner_id: i64) -> Result<Vec<i64>, StoreError>;

    /// Delete the given contexts (base, subtype, and ownership rows).
    async fn delete_contexts(&self, ids: &[i64]) -> Result<(), StoreError>;

    /// Number of stored contexts of each kind that has any.
    async fn count_by_kind(&self) -> Result<Vec<(ContextKind, i64)>, StoreError>;
}
