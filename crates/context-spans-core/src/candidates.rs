//! N-gram candidate generation over tokenized contexts.
//!
//! Produces every window of 1..=`max_n` consecutive tokens of a Sentence
//! or Phrase as a [`TemporarySpan`]. Generation is pure and touches no
//! shared state, so callers may run it per parent in parallel.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{ContextError, Result};
use crate::models::Context;
use crate::span::TemporarySpan;

/// Inclusive end offset of the token at `word_index`.
fn word_char_end(words: &[String], char_offsets: &[i64], word_index: usize) -> Result<i64> {
    let start = char_offsets[word_index];
    i64::try_from(words[word_index].chars().count())
        .ok()
        .and_then(|n| start.checked_add(n - 1))
        .ok_or_else(|| {
            ContextError::InvalidTokens(format!("token {word_index} at {start} overflows"))
        })
}

/// All distinct n-gram spans of `parent` with `1 <= n <= max_n`, longest
/// first at each start position, in document order.
pub fn ngram_spans(parent: &Arc<Context>, max_n: usize) -> Result<Vec<TemporarySpan>> {
    let tokens = parent.tokens().ok_or_else(|| ContextError::MissingTokens {
        stable_id: parent.stable_id().to_string(),
    })?;
    tokens.validate()?;

    let len = tokens.len();
    let mut seen = HashSet::new();
    let mut spans = Vec::new();
    for start in 0..len {
        for n in (1..=max_n.min(len - start)).rev() {
            let end = start + n - 1;
            let span = TemporarySpan::new(
                Arc::clone(parent),
                tokens.char_offsets[start],
                word_char_end(&tokens.words, &tokens.char_offsets, end)?,
            );
            if seen.insert(span.clone()) {
                spans.push(span);
            }
        }
    }
    Ok(spans)
}
