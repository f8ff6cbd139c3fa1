//! Kind registry: which subtype table and columns each context kind writes.
//!
//! Stores build one generic parameterized insert from a [`KindSchema`]
//! instead of holding a hand-written statement per kind. Adding a context
//! kind means adding one entry to [`REGISTRY`].

use serde::Serialize;

use crate::error::{ContextError, Result};
use crate::models::ContextKind;

/// A single column value for a subtype insert.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Text(String),
    /// Arrays and opaque blobs, stored as JSON text.
    Json(serde_json::Value),
}

impl FieldValue {
    /// Serialize an optional value as JSON, or `Null` when absent.
    pub fn json<T: Serialize>(value: Option<&T>) -> FieldValue {
        match value.map(serde_json::to_value) {
            Some(Ok(v)) => FieldValue::Json(v),
            _ => FieldValue::Null,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<Option<i64>> for FieldValue {
    fn from(v: Option<i64>) -> Self {
        v.map_or(FieldValue::Null, FieldValue::Integer)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<Option<&str>> for FieldValue {
    fn from(v: Option<&str>) -> Self {
        v.map_or(FieldValue::Null, FieldValue::from)
    }
}

/// A named column value, in registry order.
pub type Field = (&'static str, FieldValue);

/// Storage layout of one context kind.
#[derive(Debug)]
pub struct KindSchema {
    pub kind: ContextKind,
    /// Subtype table; its `id` column references `context.id`.
    pub table: &'static str,
    /// Subtype columns other than `id`, in insert order.
    pub columns: &'static [&'static str],
    /// Columns holding the surrogate ids of owning contexts. Deleting an
    /// owner cascades to every row that names it here.
    pub owner_columns: &'static [&'static str],
}

const TOKEN_COLUMNS: [&str; 6] = [
    "words",
    "char_offsets",
    "lemmas",
    "poses",
    "dep_parents",
    "dep_labels",
];

pub static REGISTRY: [KindSchema; 6] = [
    KindSchema {
        kind: ContextKind::Document,
        table: "document",
        columns: &["name", "meta"],
        owner_columns: &[],
    },
    KindSchema {
        kind: ContextKind::Sentence,
        table: "sentence",
        columns: &[
            "document_id",
            "position",
            "text",
            TOKEN_COLUMNS[0],
            TOKEN_COLUMNS[1],
            TOKEN_COLUMNS[2],
            TOKEN_COLUMNS[3],
            TOKEN_COLUMNS[4],
            TOKEN_COLUMNS[5],
        ],
        owner_columns: &["document_id"],
    },
    KindSchema {
        kind: ContextKind::Table,
        table: "table",
        columns: &["document_id", "position", "text"],
        owner_columns: &["document_id"],
    },
    KindSchema {
        kind: ContextKind::Cell,
        table: "cell",
        columns: &[
            "document_id",
            "table_id",
            "position",
            "text",
            "row_num",
            "col_num",
            "html_tag",
            "html_attrs",
            "html_anc_tags",
            "html_anc_attrs",
        ],
        owner_columns: &["document_id", "table_id"],
    },
    KindSchema {
        kind: ContextKind::Phrase,
        table: "phrase",
        columns: &[
            "document_id",
            "table_id",
            "cell_id",
            "position",
            "text",
            "row_num",
            "col_num",
            "html_tag",
            "html_attrs",
            "html_anc_tags",
            "html_anc_attrs",
            TOKEN_COLUMNS[0],
            TOKEN_COLUMNS[1],
            TOKEN_COLUMNS[2],
            TOKEN_COLUMNS[3],
            TOKEN_COLUMNS[4],
            TOKEN_COLUMNS[5],
        ],
        owner_columns: &["document_id", "table_id", "cell_id"],
    },
    KindSchema {
        kind: ContextKind::Span,
        table: "span",
        columns: &["parent_id", "char_start", "char_end", "meta"],
        owner_columns: &["parent_id"],
    },
];

/// Look up the storage layout of `kind`.
pub fn schema_for(kind: ContextKind) -> &'static KindSchema {
    match kind {
        ContextKind::Document => &REGISTRY[0],
        ContextKind::Sentence => &REGISTRY[1],
        ContextKind::Table => &REGISTRY[2],
        ContextKind::Cell => &REGISTRY[3],
        ContextKind::Phrase => &REGISTRY[4],
        ContextKind::Span => &REGISTRY[5],
    }
}

impl KindSchema {
    /// Verify that `fields` names exactly this kind's columns, in order.
    pub fn check_fields(&self, fields: &[Field]) -> Result<()> {
        let names: Vec<&str> = fields.iter().map(|(name, _)| *name).collect();
        if names != self.columns {
            return Err(ContextError::FieldMismatch {
                kind: self.kind.as_str(),
                detail: format!("expected {:?}, got {:?}", self.columns, names),
            });
        }
        Ok(())
    }

    /// Surrogate ids of the owners named in `fields`.
    pub fn owner_ids(&self, fields: &[Field]) -> Vec<i64> {
        fields
            .iter()
            .filter(|(name, _)| self.owner_columns.contains(name))
            .filter_map(|(_, value)| value.as_integer())
            .collect()
    }
}
