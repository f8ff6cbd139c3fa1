//! # Context Spans Core
//!
//! Shared, WASM-safe logic for Context Spans: the stable id codec, the
//! context hierarchy, candidate spans, the kind registry, the store
//! abstraction, and get-or-insert materialization.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! native-only dependencies.
//!
//! ## Data Flow
//!
//! 1. Annotated document content is wrapped in [`models`] hierarchy types,
//!    each addressed by a stable id ([`stable_id`]).
//! 2. Candidate regions are generated in bulk as [`span::TemporarySpan`]s
//!    (e.g. by [`candidates::ngram_spans`]) and deduplicated by value.
//! 3. [`materialize`] persists each distinct candidate exactly once through
//!    a [`store::ContextStore`], keyed by stable id.
//! 4. [`cascade`] removes a document and everything it owns.

pub mod candidates;
pub mod cascade;
pub mod error;
pub mod materialize;
pub mod models;
pub mod registry;
pub mod span;
pub mod stable_id;
pub mod store;
pub mod temporary;
pub mod tokens;

pub use error::{ContextError, MalformedIdError, Result};
pub use models::{Context, ContextKind};
pub use span::{Span, TemporarySpan};
pub use temporary::TemporaryContext;
