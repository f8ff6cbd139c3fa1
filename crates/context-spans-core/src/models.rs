//! The persisted context hierarchy.
//!
//! ```text
//! Document
//! ├── Sentence
//! ├── Table
//! │   └── Cell
//! │       └── Phrase
//! └── Phrase            (phrases may hang off a document, table, or cell)
//!
//! any text-bearing context ── Span
//! ```
//!
//! Each kind is a plain struct with a shared [`ContextBase`] and explicit
//! owner-id fields; [`Context`] is the tagged union over all of them.
//! Owners are referenced by surrogate id, never by pointer, so a child can
//! only be constructed once its owner has been materialized.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ContextError, MalformedIdError, Result};
use crate::span::Span;
use crate::stable_id::{construct_stable_id, document_stable_id};
use crate::tokens::TokenAttrs;

/// The closed set of context kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContextKind {
    Document,
    Sentence,
    Table,
    Cell,
    Phrase,
    Span,
}

impl ContextKind {
    pub const ALL: [ContextKind; 6] = [
        ContextKind::Document,
        ContextKind::Sentence,
        ContextKind::Table,
        ContextKind::Cell,
        ContextKind::Phrase,
        ContextKind::Span,
    ];

    /// The polymorphic tag stored in `context.type` and in stable ids.
    pub fn as_str(self) -> &'static str {
        match self {
            ContextKind::Document => "document",
            ContextKind::Sentence => "sentence",
            ContextKind::Table => "table",
            ContextKind::Cell => "cell",
            ContextKind::Phrase => "phrase",
            ContextKind::Span => "span",
        }
    }
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContextKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ContextKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown context kind: '{}'", s))
    }
}

/// Fields shared by every context kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextBase {
    /// Surrogate key; `None` until materialized.
    pub id: Option<i64>,
    pub kind: ContextKind,
    pub stable_id: String,
}

impl ContextBase {
    fn new(kind: ContextKind, stable_id: String) -> Self {
        Self {
            id: None,
            kind,
            stable_id,
        }
    }

    /// The surrogate id, or `Unmaterialized` if there is none yet.
    pub fn require_id(&self) -> Result<i64> {
        self.id.ok_or_else(|| ContextError::Unmaterialized {
            stable_id: self.stable_id.clone(),
        })
    }
}

/// Inclusive end offset of `text` placed at `char_start`.
pub(crate) fn text_end(char_start: i64, text: &str) -> Result<i64> {
    let len = text.chars().count();
    i64::try_from(len)
        .ok()
        .and_then(|n| char_start.checked_add(n - 1))
        .ok_or_else(|| MalformedIdError(format!("{len} chars at offset {char_start}")).into())
}

/// A root context.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub base: ContextBase,
    pub name: String,
    pub meta: Option<serde_json::Value>,
}

impl Document {
    pub fn new(name: impl Into<String>, meta: Option<serde_json::Value>) -> Result<Self> {
        let name = name.into();
        let stable_id = document_stable_id(&name)?;
        Ok(Self {
            base: ContextBase::new(ContextKind::Document, stable_id),
            name,
            meta,
        })
    }
}

/// A tokenized sentence of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Sentence {
    pub base: ContextBase,
    pub document_id: i64,
    pub position: i64,
    pub text: String,
    pub tokens: TokenAttrs,
}

impl Sentence {
    /// `char_start` is the sentence's offset within the document.
    pub fn new(
        document: &Document,
        position: i64,
        char_start: i64,
        text: impl Into<String>,
        tokens: TokenAttrs,
    ) -> Result<Self> {
        let document_id = document.base.require_id()?;
        tokens.validate()?;
        let text = text.into();
        let stable_id = construct_stable_id(
            &document.base.stable_id,
            ContextKind::Sentence.as_str(),
            char_start,
            text_end(char_start, &text)?,
        )?;
        Ok(Self {
            base: ContextBase::new(ContextKind::Sentence, stable_id),
            document_id,
            position,
            text,
            tokens,
        })
    }
}

/// A table within a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub base: ContextBase,
    pub document_id: i64,
    pub position: i64,
    pub text: String,
}

impl Table {
    /// `char_start` is the table's offset within the document.
    pub fn new(
        document: &Document,
        position: i64,
        char_start: i64,
        text: impl Into<String>,
    ) -> Result<Self> {
        let document_id = document.base.require_id()?;
        let text = text.into();
        let stable_id = construct_stable_id(
            &document.base.stable_id,
            ContextKind::Table.as_str(),
            char_start,
            text_end(char_start, &text)?,
        )?;
        Ok(Self {
            base: ContextBase::new(ContextKind::Table, stable_id),
            document_id,
            position,
            text,
        })
    }
}

/// Grid position and raw HTML metadata of a cell or phrase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellLayout {
    #[serde(default)]
    pub row_num: Option<i64>,
    #[serde(default)]
    pub col_num: Option<i64>,
    #[serde(default)]
    pub html_tag: Option<String>,
    #[serde(default)]
    pub html_attrs: Option<Vec<String>>,
    #[serde(default)]
    pub html_anc_tags: Option<Vec<String>>,
    #[serde(default)]
    pub html_anc_attrs: Option<Vec<String>>,
}

/// A table cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub base: ContextBase,
    pub document_id: i64,
    pub table_id: i64,
    pub position: i64,
    pub text: String,
    pub layout: CellLayout,
}

impl Cell {
    /// `char_start` is the cell's offset within its table.
    pub fn new(
        table: &Table,
        position: i64,
        char_start: i64,
        text: impl Into<String>,
        layout: CellLayout,
    ) -> Result<Self> {
        let table_id = table.base.require_id()?;
        let text = text.into();
        let stable_id = construct_stable_id(
            &table.base.stable_id,
            ContextKind::Cell.as_str(),
            char_start,
            text_end(char_start, &text)?,
        )?;
        Ok(Self {
            base: ContextBase::new(ContextKind::Cell, stable_id),
            document_id: table.document_id,
            table_id,
            position,
            text,
            layout,
        })
    }
}

/// The innermost owner a phrase is positioned against.
#[derive(Debug, Clone, Copy)]
pub enum PhraseOwner<'a> {
    Document(&'a Document),
    Table(&'a Table),
    Cell(&'a Cell),
}

impl PhraseOwner<'_> {
    fn base(&self) -> &ContextBase {
        match self {
            PhraseOwner::Document(d) => &d.base,
            PhraseOwner::Table(t) => &t.base,
            PhraseOwner::Cell(c) => &c.base,
        }
    }
}

/// A tokenized phrase, optionally inside a table cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Phrase {
    pub base: ContextBase,
    pub document_id: i64,
    pub table_id: Option<i64>,
    pub cell_id: Option<i64>,
    pub position: i64,
    pub text: String,
    pub tokens: TokenAttrs,
    pub layout: CellLayout,
}

impl Phrase {
    /// `char_start` is the phrase's offset within `owner`.
    pub fn new(
        owner: PhraseOwner<'_>,
        position: i64,
        char_start: i64,
        text: impl Into<String>,
        tokens: TokenAttrs,
        layout: CellLayout,
    ) -> Result<Self> {
        let owner_id = owner.base().require_id()?;
        let (document_id, table_id, cell_id) = match owner {
            PhraseOwner::Document(_) => (owner_id, None, None),
            PhraseOwner::Table(t) => (t.document_id, Some(owner_id), None),
            PhraseOwner::Cell(c) => (c.document_id, Some(c.table_id), Some(owner_id)),
        };
        tokens.validate()?;
        let text = text.into();
        let stable_id = construct_stable_id(
            &owner.base().stable_id,
            ContextKind::Phrase.as_str(),
            char_start,
            text_end(char_start, &text)?,
        )?;
        Ok(Self {
            base: ContextBase::new(ContextKind::Phrase, stable_id),
            document_id,
            table_id,
            cell_id,
            position,
            text,
            tokens,
            layout,
        })
    }
}

/// Tagged union over every persisted context kind.
#[derive(Debug, Clone)]
pub enum Context {
    Document(Document),
    Sentence(Sentence),
    Table(Table),
    Cell(Cell),
    Phrase(Phrase),
    Span(Span),
}

impl Context {
    pub fn base(&self) -> &ContextBase {
        match self {
            Context::Document(c) => &c.base,
            Context::Sentence(c) => &c.base,
            Context::Table(c) => &c.base,
            Context::Cell(c) => &c.base,
            Context::Phrase(c) => &c.base,
            Context::Span(c) => c.base(),
        }
    }

    pub fn id(&self) -> Option<i64> {
        self.base().id
    }

    pub fn kind(&self) -> ContextKind {
        self.base().kind
    }

    pub fn stable_id(&self) -> &str {
        &self.base().stable_id
    }

    /// Own text of the context; documents and spans carry none.
    pub fn text(&self) -> Option<&str> {
        match self {
            Context::Sentence(c) => Some(&c.text),
            Context::Table(c) => Some(&c.text),
            Context::Cell(c) => Some(&c.text),
            Context::Phrase(c) => Some(&c.text),
            Context::Document(_) | Context::Span(_) => None,
        }
    }

    /// Per-token arrays; only sentences and phrases are tokenized.
    pub fn tokens(&self) -> Option<&TokenAttrs> {
        match self {
            Context::Sentence(c) => Some(&c.tokens),
            Context::Phrase(c) => Some(&c.tokens),
            _ => None,
        }
    }
}

impl From<Document> for Context {
    fn from(c: Document) -> Self {
        Context::Document(c)
    }
}

impl From<Sentence> for Context {
    fn from(c: Sentence) -> Self {
        Context::Sentence(c)
    }
}

impl From<Table> for Context {
    fn from(c: Table) -> Self {
        Context::Table(c)
    }
}

impl From<Cell> for Context {
    fn from(c: Cell) -> Self {
        Context::Cell(c)
    }
}

impl From<Phrase> for Context {
    fn from(c: Phrase) -> Self {
        Context::Phrase(c)
    }
}

impl From<Span> for Context {
    fn from(c: Span) -> Self {
        Context::Span(c)
    }
}
