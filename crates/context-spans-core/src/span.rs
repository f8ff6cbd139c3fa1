//! Character spans: the candidate [`TemporarySpan`] and the persisted [`Span`].
//!
//! A `TemporarySpan` is a cheap value type used while generating
//! candidates. Two candidates over the same parent and the same inclusive
//! `[char_start, char_end]` range are equal and hash alike, so duplicates
//! collapse in a `HashSet` before any store round-trip.
//!
//! Once materialized and promoted, a [`Span`] is an entity: equality and
//! hashing switch to its surrogate id, so two distinct rows are never
//! conflated even if they share coordinates. The span capabilities
//! (containment, slicing, attribute access) are reached by delegation via
//! [`Span::candidate`].

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Bound, RangeBounds};
use std::sync::Arc;

use crate::error::{ContextError, Result};
use crate::models::{Context, ContextBase, ContextKind};
use crate::tokens::{char_to_word_index, TokenAttr, TokenAttrs};

/// A not-yet-persisted span of characters within a parent context.
///
/// Offsets are inclusive and relative to the parent's own text.
#[derive(Debug, Clone)]
pub struct TemporarySpan {
    /// Surrogate id adopted during materialization.
    pub id: Option<i64>,
    pub parent: Arc<Context>,
    pub char_start: i64,
    pub char_end: i64,
    pub meta: Option<serde_json::Value>,
}

impl TemporarySpan {
    pub fn new(parent: Arc<Context>, char_start: i64, char_end: i64) -> Self {
        Self {
            id: None,
            parent,
            char_start,
            char_end,
            meta: None,
        }
    }

    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Number of characters covered (inclusive range).
    pub fn len(&self) -> i64 {
        self.char_end - self.char_start + 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 0
    }

    fn parent_tokens(&self) -> Result<&TokenAttrs> {
        match self.parent.tokens() {
            Some(t) if !t.is_empty() => Ok(t),
            _ => Err(ContextError::MissingTokens {
                stable_id: self.parent.stable_id().to_string(),
            }),
        }
    }

    /// Index of the parent token containing `char_offset`.
    ///
    /// Yields `-1` when the offset precedes the first token; see
    /// [`char_to_word_index`].
    pub fn char_to_word_index(&self, char_offset: i64) -> Result<i64> {
        let tokens = self.parent_tokens()?;
        // non-empty offsets always produce an index
        Ok(char_to_word_index(&tokens.char_offsets, char_offset).unwrap_or(-1))
    }

    /// Start offset of the parent's `word_index`-th token.
    pub fn word_to_char_index(&self, word_index: usize) -> Result<i64> {
        let tokens = self.parent_tokens()?;
        tokens
            .char_offsets
            .get(word_index)
            .copied()
            .ok_or_else(|| {
                ContextError::InvalidTokens(format!(
                    "word index {} out of range for {} tokens",
                    word_index,
                    tokens.len()
                ))
            })
    }

    pub fn get_word_start(&self) -> Result<i64> {
        self.char_to_word_index(self.char_start)
    }

    pub fn get_word_end(&self) -> Result<i64> {
        self.char_to_word_index(self.char_end)
    }

    /// Number of tokens touched by the span.
    pub fn get_n(&self) -> Result<i64> {
        Ok(self.get_word_end()? - self.get_word_start()? + 1)
    }

    /// Token range `[word_start, word_end]` as slice bounds.
    fn word_bounds(&self) -> Result<(usize, usize)> {
        let start = self.get_word_start()?;
        if start < 0 {
            return Err(ContextError::BeforeFirstToken {
                char_offset: self.char_start,
                stable_id: self.parent.stable_id().to_string(),
            });
        }
        let end = self.get_word_end()?;
        Ok((start as usize, (end + 1).max(start) as usize))
    }

    /// The tokens of `attr` over `[word_start, word_end]`.
    pub fn get_attrib_tokens(&self, attr: TokenAttr) -> Result<Vec<String>> {
        let tokens = self.parent_tokens()?;
        let values = tokens
            .get(attr)
            .ok_or_else(|| ContextError::MissingAttribute {
                attribute: attr.name(),
                stable_id: self.parent.stable_id().to_string(),
            })?;
        let (start, end) = self.word_bounds()?;
        Ok(values.range(start, end).to_strings())
    }

    /// Text of `attr` over the span.
    ///
    /// For [`TokenAttr::Words`] this is the verbatim parent text between
    /// `char_start` and `char_end`, spacing and punctuation included. Other
    /// attributes have no source spacing and are joined with `sep`.
    pub fn get_attrib_span(&self, attr: TokenAttr, sep: &str) -> Result<String> {
        if attr == TokenAttr::Words {
            let text = self.parent.text().ok_or_else(|| ContextError::MissingText {
                stable_id: self.parent.stable_id().to_string(),
                what: "text",
            })?;
            return Ok(char_slice(text, self.char_start, self.char_end));
        }
        Ok(self.get_attrib_tokens(attr)?.join(sep))
    }

    /// The covered parent text.
    pub fn get_span(&self) -> Result<String> {
        self.get_attrib_span(TokenAttr::Words, " ")
    }

    /// Whether `other` lies within this span. Both must share a parent; that
    /// is not checked.
    pub fn contains(&self, other: &TemporarySpan) -> bool {
        other.char_start >= self.char_start && other.char_end <= self.char_end
    }

    /// A sub-span addressed relative to this span's start.
    ///
    /// Follows stop-exclusive slice semantics translated to inclusive ends:
    /// an unbounded start keeps `char_start`; an unbounded end keeps
    /// `char_end`; an exclusive stop `k >= 0` ends at `char_start + k - 1`;
    /// a negative stop `k` ends at `char_end + k`.
    ///
    /// ```rust
    /// # use std::sync::Arc;
    /// # use context_spans_core::models::{Context, Document, Sentence};
    /// # use context_spans_core::span::TemporarySpan;
    /// # use context_spans_core::tokens::TokenAttrs;
    /// # let mut doc = Document::new("d", None).unwrap();
    /// # doc.base.id = Some(1);
    /// # let tokens = TokenAttrs::new(vec!["hello".into(), "world".into()], vec![0, 6]);
    /// # let sentence = Sentence::new(&doc, 0, 0, "hello world", tokens).unwrap();
    /// let span = TemporarySpan::new(Arc::new(Context::from(sentence)), 0, 10);
    /// assert_eq!(span.slice(..5).get_span().unwrap(), "hello");
    /// assert_eq!(span.slice(6..).get_span().unwrap(), "world");
    /// assert_eq!(span.slice(..-6).get_span().unwrap(), "hello");
    /// ```
    pub fn slice<R: RangeBounds<i64>>(&self, range: R) -> TemporarySpan {
        let start = match range.start_bound() {
            Bound::Unbounded => None,
            Bound::Included(&s) => Some(s),
            Bound::Excluded(&s) => Some(s + 1),
        };
        let (char_start, char_end) = match range.end_bound() {
            Bound::Unbounded => slice_bounds(self.char_start, self.char_end, start, None),
            Bound::Excluded(&k) => slice_bounds(self.char_start, self.char_end, start, Some(k)),
            Bound::Included(&k) if k >= 0 => {
                slice_bounds(self.char_start, self.char_end, start, Some(k + 1))
            }
            Bound::Included(&k) => {
                let (s, _) = slice_bounds(self.char_start, self.char_end, start, None);
                (s, self.char_end + k + 1)
            }
        };
        TemporarySpan::new(Arc::clone(&self.parent), char_start, char_end)
    }

    /// Promote a materialized candidate into a persisted [`Span`].
    pub fn promote(self) -> Result<Span> {
        let parent_id = self.parent.base().require_id()?;
        let stable_id = self.stable_id()?;
        let id = self
            .id
            .ok_or_else(|| ContextError::Unmaterialized {
                stable_id: stable_id.clone(),
            })?;
        Ok(Span {
            base: ContextBase {
                id: Some(id),
                kind: ContextKind::Span,
                stable_id,
            },
            parent_id,
            candidate: self,
        })
    }

    /// Stable id of the span, derived from the parent's.
    pub fn stable_id(&self) -> Result<String> {
        Ok(crate::stable_id::construct_stable_id(
            self.parent.stable_id(),
            ContextKind::Span.as_str(),
            self.char_start,
            self.char_end,
        )?)
    }
}

/// Inclusive `(char_start, char_end)` of a slice of `[base_start, base_end]`.
pub fn slice_bounds(
    base_start: i64,
    base_end: i64,
    start: Option<i64>,
    stop: Option<i64>,
) -> (i64, i64) {
    let char_start = start.map_or(base_start, |s| base_start + s);
    let char_end = match stop {
        None => base_end,
        Some(k) if k >= 0 => base_start + k - 1,
        Some(k) => base_end + k,
    };
    (char_start, char_end)
}

/// Characters `[start, end]` (inclusive) of `text`, clamped to its bounds.
fn char_slice(text: &str, start: i64, end: i64) -> String {
    let start = start.max(0) as usize;
    let take = (end + 1).max(0) as usize;
    text.chars()
        .take(take)
        .skip(start)
        .collect()
}

impl PartialEq for TemporarySpan {
    fn eq(&self, other: &Self) -> bool {
        self.parent.stable_id() == other.parent.stable_id()
            && self.char_start == other.char_start
            && self.char_end == other.char_end
    }
}

impl Eq for TemporarySpan {}

impl Hash for TemporarySpan {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.parent.stable_id().hash(state);
        self.char_start.hash(state);
        self.char_end.hash(state);
    }
}

impl fmt::Display for TemporarySpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_span("TemporarySpan", self, f)
    }
}

fn fmt_span(name: &str, span: &TemporarySpan, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let word = |r: Result<i64>| r.map_or_else(|_| "?".to_string(), |i| i.to_string());
    let parent = span
        .parent
        .id()
        .map_or_else(|| span.parent.stable_id().to_string(), |id| id.to_string());
    write!(
        f,
        "{}({:?}, parent={}, chars=[{},{}], words=[{},{}])",
        name,
        span.get_span().unwrap_or_default(),
        parent,
        span.char_start,
        span.char_end,
        word(span.get_word_start()),
        word(span.get_word_end()),
    )
}

/// A persisted span with its own identity.
#[derive(Debug, Clone)]
pub struct Span {
    base: ContextBase,
    pub parent_id: i64,
    candidate: TemporarySpan,
}

impl Span {
    pub fn base(&self) -> &ContextBase {
        &self.base
    }

    /// Surrogate id; always present on a promoted span.
    pub fn id(&self) -> i64 {
        self.candidate.id.unwrap_or_default()
    }

    pub fn char_start(&self) -> i64 {
        self.candidate.char_start
    }

    pub fn char_end(&self) -> i64 {
        self.candidate.char_end
    }

    /// The span capabilities (containment, slicing, attribute access).
    pub fn candidate(&self) -> &TemporarySpan {
        &self.candidate
    }

    /// Sub-span over the same parent, as an unpersisted [`TemporarySpan`]
    /// candidate rather than a [`Span`]. It carries no surrogate id and must
    /// go through [`load_or_insert`](crate::materialize::load_or_insert) to be stored; see
    /// [`TemporarySpan::slice`] for the range semantics.
    pub fn slice<R: RangeBounds<i64>>(&self, range: R) -> TemporarySpan {
        self.candidate.slice(range)
    }

    pub fn contains(&self, other: &TemporarySpan) -> bool {
        self.candidate.contains(other)
    }
}

impl PartialEq for Span {
    fn eq(&self, other: &Self) -> bool {
        self.base.id == other.base.id
    }
}

impl Eq for Span {}

impl Hash for Span {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.base.id.hash(state);
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_span("Span", &self.candidate, f)
    }
}
