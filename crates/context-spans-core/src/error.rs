//! Error types for context-spans-core.

use thiserror::Error;

use crate::store::StoreError;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, ContextError>;

/// A stable id that does not follow the `<root>::<kind>:<start>:<end>` grammar.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed stable_id: {0:?}")]
pub struct MalformedIdError(pub String);

/// Error type for core operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ContextError {
    /// A stable id failed to parse.
    #[error(transparent)]
    MalformedId(#[from] MalformedIdError),

    /// A kind-specific capability was requested from a variant that lacks it.
    #[error("{operation} is not implemented for {kind}")]
    NotImplemented {
        kind: &'static str,
        operation: &'static str,
    },

    /// Per-token arrays violate the attribute contract.
    #[error("invalid token attributes: {0}")]
    InvalidTokens(String),

    /// An optional per-token attribute was requested but never supplied.
    #[error("attribute '{attribute}' is not present on {stable_id}")]
    MissingAttribute {
        attribute: &'static str,
        stable_id: String,
    },

    /// The parent context carries no text.
    #[error("{stable_id} has no {what}")]
    MissingText {
        stable_id: String,
        what: &'static str,
    },

    /// The parent context is not tokenized, or has an empty token list.
    #[error("{stable_id} has no token offsets")]
    MissingTokens { stable_id: String },

    /// A span boundary resolved to a position before the first token.
    #[error("char offset {char_offset} precedes the first token of {stable_id}")]
    BeforeFirstToken { char_offset: i64, stable_id: String },

    /// An owner (or the candidate itself) has no surrogate id yet.
    #[error("{stable_id} has not been materialized")]
    Unmaterialized { stable_id: String },

    /// Insert fields do not match the registry's column list for the kind.
    #[error("insert fields for {kind} do not match its column list: {detail}")]
    FieldMismatch { kind: &'static str, detail: String },

    /// Every insert attempt lost a uniqueness race and no row could be re-read.
    #[error("gave up on {stable_id} after {attempts} conflicting inserts")]
    ConflictRetriesExhausted { stable_id: String, attempts: u32 },

    /// The backing store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
