//! Per-token annotation arrays shared by sentences and phrases.
//!
//! The arrays are produced by an external annotation pipeline and are only
//! read here. `words` and `char_offsets` are required; the rest are
//! optional but, when present, run parallel to `words`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ContextError, Result};

/// Parallel per-token arrays of a Sentence or Phrase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAttrs {
    pub words: Vec<String>,
    /// Start offset of each word, relative to the owning context's text.
    pub char_offsets: Vec<i64>,
    #[serde(default)]
    pub lemmas: Option<Vec<String>>,
    #[serde(default, alias = "parts_of_speech")]
    pub poses: Option<Vec<String>>,
    #[serde(default, alias = "dependency_parents")]
    pub dep_parents: Option<Vec<i64>>,
    #[serde(default, alias = "dependency_labels")]
    pub dep_labels: Option<Vec<String>>,
}

impl TokenAttrs {
    pub fn new(words: Vec<String>, char_offsets: Vec<i64>) -> Self {
        Self {
            words,
            char_offsets,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Check the attribute contract: equal lengths, strictly increasing offsets.
    pub fn validate(&self) -> Result<()> {
        let n = self.words.len();
        if self.char_offsets.len() != n {
            return Err(ContextError::InvalidTokens(format!(
                "char_offsets has {} entries but words has {}",
                self.char_offsets.len(),
                n
            )));
        }
        if let Some(pair) = self.char_offsets.windows(2).find(|w| w[0] >= w[1]) {
            return Err(ContextError::InvalidTokens(format!(
                "char_offsets must be strictly increasing, found {} then {}",
                pair[0], pair[1]
            )));
        }
        let optional = [
            (TokenAttr::Lemmas, self.lemmas.as_ref().map(Vec::len)),
            (TokenAttr::Poses, self.poses.as_ref().map(Vec::len)),
            (TokenAttr::DepParents, self.dep_parents.as_ref().map(Vec::len)),
            (TokenAttr::DepLabels, self.dep_labels.as_ref().map(Vec::len)),
        ];
        for (attr, len) in optional {
            if let Some(len) = len {
                if len != n {
                    return Err(ContextError::InvalidTokens(format!(
                        "{} has {} entries but words has {}",
                        attr, len, n
                    )));
                }
            }
        }
        Ok(())
    }

    /// Borrow the named attribute, or `None` if it was not supplied.
    pub fn get(&self, attr: TokenAttr) -> Option<TokenSlice<'_>> {
        match attr {
            TokenAttr::Words => Some(TokenSlice::Text(&self.words)),
            TokenAttr::CharOffsets => Some(TokenSlice::Int(&self.char_offsets)),
            TokenAttr::Lemmas => self.lemmas.as_deref().map(TokenSlice::Text),
            TokenAttr::Poses => self.poses.as_deref().map(TokenSlice::Text),
            TokenAttr::DepParents => self.dep_parents.as_deref().map(TokenSlice::Int),
            TokenAttr::DepLabels => self.dep_labels.as_deref().map(TokenSlice::Text),
        }
    }
}

/// Names of the per-token arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenAttr {
    Words,
    CharOffsets,
    Lemmas,
    Poses,
    DepParents,
    DepLabels,
}

impl TokenAttr {
    pub fn name(self) -> &'static str {
        match self {
            TokenAttr::Words => "words",
            TokenAttr::CharOffsets => "char_offsets",
            TokenAttr::Lemmas => "lemmas",
            TokenAttr::Poses => "poses",
            TokenAttr::DepParents => "dep_parents",
            TokenAttr::DepLabels => "dep_labels",
        }
    }
}

impl fmt::Display for TokenAttr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TokenAttr {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "words" => Ok(TokenAttr::Words),
            "char_offsets" => Ok(TokenAttr::CharOffsets),
            "lemmas" => Ok(TokenAttr::Lemmas),
            "poses" | "parts_of_speech" => Ok(TokenAttr::Poses),
            "dep_parents" | "dependency_parents" => Ok(TokenAttr::DepParents),
            "dep_labels" | "dependency_labels" => Ok(TokenAttr::DepLabels),
            other => Err(format!("unknown token attribute: '{}'", other)),
        }
    }
}

/// A borrowed run of one per-token attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSlice<'a> {
    Text(&'a [String]),
    Int(&'a [i64]),
}

impl<'a> TokenSlice<'a> {
    pub fn len(&self) -> usize {
        match self {
            TokenSlice::Text(v) => v.len(),
            TokenSlice::Int(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sub-slice `[start, end)`, clamped to the available tokens.
    pub fn range(&self, start: usize, end: usize) -> TokenSlice<'a> {
        let end = end.min(self.len());
        let start = start.min(end);
        match *self {
            TokenSlice::Text(v) => TokenSlice::Text(&v[start..end]),
            TokenSlice::Int(v) => TokenSlice::Int(&v[start..end]),
        }
    }

    pub fn to_strings(&self) -> Vec<String> {
        match self {
            TokenSlice::Text(v) => v.to_vec(),
            TokenSlice::Int(v) => v.iter().map(|i| i.to_string()).collect(),
        }
    }

    pub fn join(&self, sep: &str) -> String {
        self.to_strings().join(sep)
    }
}

/// Map a character offset to the index of the token containing it.
///
/// Returns the index whose offset equals `char_offset`, otherwise the last
/// index whose offset is smaller. A `char_offset` before the first token
/// yields `-1`; callers using the result as a span boundary must treat that
/// as an error. Returns `None` when there are no tokens.
pub fn char_to_word_index(char_offsets: &[i64], char_offset: i64) -> Option<i64> {
    let mut last = None;
    for (i, &co) in char_offsets.iter().enumerate() {
        let i = i as i64;
        if char_offset == co {
            return Some(i);
        } else if char_offset < co {
            return Some(i - 1);
        }
        last = Some(i);
    }
    last
}
