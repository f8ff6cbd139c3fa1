//! The staging contract every materializable context implements.
//!
//! A [`TemporaryContext`] knows its kind, derives its stable id, and
//! produces the column values of its subtype row. That is everything
//! [`load_or_insert`](crate::materialize::load_or_insert) needs to persist
//! it exactly once.

use crate::error::{ContextError, Result};
use crate::models::{Cell, CellLayout, Context, ContextKind, Document, Phrase, Sentence, Table};
use crate::registry::{Field, FieldValue};
use crate::span::TemporarySpan;
use crate::tokens::TokenAttrs;

/// A candidate context that can be looked up or inserted by stable id.
pub trait TemporaryContext: Send + Sync {
    fn kind(&self) -> ContextKind;

    /// Surrogate id, once materialized.
    fn id(&self) -> Option<i64>;

    fn set_id(&mut self, id: i64);

    fn stable_id(&self) -> Result<String>;

    /// Subtype column values, in the order of the kind's registry entry.
    fn insert_fields(&self) -> Result<Vec<Field>>;

    /// Convert a materialized candidate into its [`Context`] variant.
    fn promote(self: Box<Self>) -> Result<Context> {
        Err(ContextError::NotImplemented {
            kind: self.kind().as_str(),
            operation: "promote",
        })
    }
}

fn token_fields(tokens: &TokenAttrs) -> [Field; 6] {
    [
        ("words", FieldValue::json(Some(&tokens.words))),
        ("char_offsets", FieldValue::json(Some(&tokens.char_offsets))),
        ("lemmas", FieldValue::json(tokens.lemmas.as_ref())),
        ("poses", FieldValue::json(tokens.poses.as_ref())),
        ("dep_parents", FieldValue::json(tokens.dep_parents.as_ref())),
        ("dep_labels", FieldValue::json(tokens.dep_labels.as_ref())),
    ]
}

fn layout_fields(layout: &CellLayout) -> [Field; 6] {
    [
        ("row_num", layout.row_num.into()),
        ("col_num", layout.col_num.into()),
        ("html_tag", layout.html_tag.as_deref().into()),
        ("html_attrs", FieldValue::json(layout.html_attrs.as_ref())),
        ("html_anc_tags", FieldValue::json(layout.html_anc_tags.as_ref())),
        ("html_anc_attrs", FieldValue::json(layout.html_anc_attrs.as_ref())),
    ]
}

/// Fails with `Unmaterialized` until a surrogate id has been assigned.
fn require_promotable(id: Option<i64>, stable_id: &str) -> Result<()> {
    match id {
        Some(_) => Ok(()),
        None => Err(ContextError::Unmaterialized {
            stable_id: stable_id.to_string(),
        }),
    }
}

macro_rules! hierarchy_context {
    ($ty:ident, $variant:ident, |$this:ident| $fields:expr) => {
        impl TemporaryContext for $ty {
            fn kind(&self) -> ContextKind {
                self.base.kind
            }

            fn id(&self) -> Option<i64> {
                self.base.id
            }

            fn set_id(&mut self, id: i64) {
                self.base.id = Some(id);
            }

            fn stable_id(&self) -> Result<String> {
                Ok(self.base.stable_id.clone())
            }

            fn insert_fields(&self) -> Result<Vec<Field>> {
                let $this = self;
                Ok($fields)
            }

            fn promote(self: Box<Self>) -> Result<Context> {
                require_promotable(self.base.id, &self.base.stable_id)?;
                Ok(Context::$variant(*self))
            }
        }
    };
}

hierarchy_context!(Document, Document, |d| vec![
    ("name", d.name.as_str().into()),
    ("meta", FieldValue::json(d.meta.as_ref())),
]);

hierarchy_context!(Sentence, Sentence, |s| {
    let mut fields: Vec<Field> = vec![
        ("document_id", s.document_id.into()),
        ("position", s.position.into()),
        ("text", s.text.as_str().into()),
    ];
    fields.extend(token_fields(&s.tokens));
    fields
});

hierarchy_context!(Table, Table, |t| vec![
    ("document_id", t.document_id.into()),
    ("position", t.position.into()),
    ("text", t.text.as_str().into()),
]);

hierarchy_context!(Cell, Cell, |c| {
    let mut fields: Vec<Field> = vec![
        ("document_id", c.document_id.into()),
        ("table_id", c.table_id.into()),
        ("position", c.position.into()),
        ("text", c.text.as_str().into()),
    ];
    fields.extend(layout_fields(&c.layout));
    fields
});

hierarchy_context!(Phrase, Phrase, |p| {
    let mut fields: Vec<Field> = vec![
        ("document_id", p.document_id.into()),
        ("table_id", p.table_id.into()),
        ("cell_id", p.cell_id.into()),
        ("position", p.position.into()),
        ("text", p.text.as_str().into()),
    ];
    fields.extend(layout_fields(&p.layout));
    fields.extend(token_fields(&p.tokens));
    fields
});

impl TemporaryContext for TemporarySpan {
    fn kind(&self) -> ContextKind {
        ContextKind::Span
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn stable_id(&self) -> Result<String> {
        TemporarySpan::stable_id(self)
    }

    fn insert_fields(&self) -> Result<Vec<Field>> {
        Ok(vec![
            ("parent_id", self.parent.base().require_id()?.into()),
            ("char_start", self.char_start.into()),
            ("char_end", self.char_end.into()),
            ("meta", FieldValue::json(self.meta.as_ref())),
        ])
    }

    fn promote(self: Box<Self>) -> Result<Context> {
        TemporarySpan::promote(*self).map(Context::Span)
    }
}
