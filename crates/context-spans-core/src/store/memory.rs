//! In-memory [`ContextStore`] implementation for testing and WASM targets.
//!
//! All state sits behind one `std::sync::RwLock`, so lookup-then-insert
//! sequences from concurrent callers are serialized; a duplicate stable id
//! still reports [`StoreError::Conflict`] like a unique index would.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::models::ContextKind;
use crate::registry::{Field, FieldValue};

use super::{ContextStore, StoreError};

/// One stored context: base columns plus its subtype row.
#[derive(Debug, Clone)]
pub struct StoredContext {
    pub kind: ContextKind,
    pub stable_id: String,
    pub fields: Vec<Field>,
}

#[derive(Default)]
struct State {
    next_id: i64,
    by_stable_id: HashMap<String, i64>,
    rows: BTreeMap<i64, StoredContext>,
    /// owner id -> child ids
    owners: HashMap<i64, Vec<i64>>,
}

/// In-memory store for tests and WASM environments.
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                next_id: 1,
                ..Default::default()
            }),
        }
    }

    /// Snapshot of a stored context.
    pub fn get(&self, id: i64) -> Option<StoredContext> {
        self.state.read().unwrap().rows.get(&id).cloned()
    }

    /// Value of one subtype column of a stored context.
    pub fn field(&self, id: i64, column: &str) -> Option<FieldValue> {
        let state = self.state.read().unwrap();
        let row = state.rows.get(&id)?;
        row.fields
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, v)| v.clone())
    }

    pub fn len(&self) -> usize {
        self.state.read().unwrap().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContextStore for InMemoryStore {
    async fn lookup_by_stable_id(&self, stable_id: &str) -> Result<Option<i64>, StoreError> {
        Ok(self.state.read().unwrap().by_stable_id.get(stable_id).copied())
    }

    async fn insert_row(
        &self,
        kind: ContextKind,
        stable_id: &str,
        fields: &[Field],
    ) -> Result<i64, StoreError> {
        let schema = crate::registry::schema_for(kind);
        let mut state = self.state.write().unwrap();
        if state.by_stable_id.contains_key(stable_id) {
            return Err(StoreError::Conflict(stable_id.to_string()));
        }
        let id = state.next_id;
        state.next_id += 1;
        state.by_stable_id.insert(stable_id.to_string(), id);
        state.rows.insert(
            id,
            StoredContext {
                kind,
                stable_id: stable_id.to_string(),
                fields: fields.to_vec(),
            },
        );
        for owner in schema.owner_ids(fields) {
            state.owners.entry(owner).or_default().push(id);
        }
        Ok(id)
    }

    async fn owned_by(&self, owner_id: i64) -> Result<Vec<i64>, StoreError> {
        let state = self.state.read().unwrap();
        Ok(state.owners.get(&owner_id).cloned().unwrap_or_default())
    }

    async fn delete_contexts(&self, ids: &[i64]) -> Result<(), StoreError> {
        let mut state = self.state.write().unwrap();
        for id in ids {
            if let Some(row) = state.rows.remove(id) {
                state.by_stable_id.remove(&row.stable_id);
            }
            state.owners.remove(id);
        }
        for children in state.owners.values_mut() {
            children.retain(|c| !ids.contains(c));
        }
        Ok(())
    }

    async fn count_by_kind(&self) -> Result<Vec<(ContextKind, i64)>, StoreError> {
        let state = self.state.read().unwrap();
        let mut counts: BTreeMap<ContextKind, i64> = BTreeMap::new();
        for row in state.rows.values() {
            *counts.entry(row.kind).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }
}
