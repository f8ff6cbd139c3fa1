//! Stable id codec.
//!
//! A stable id names a region of a document independently of any
//! surrogate key the store assigns:
//!
//! ```text
//! <root-id>::<kind>:<start>:<end>
//! ```
//!
//! `<root-id>` is the root (document) identifier, `<kind>` the polymorphic
//! tag of the addressed context, and `<start>`/`<end>` are inclusive
//! character offsets relative to the root's own start. Because offsets are
//! absolute, ids compose additively across nesting depth: a span inside a
//! phrase inside a cell can be located with a single [`split_stable_id`],
//! without walking the ownership chain.
//!
//! # Example
//!
//! ```rust
//! use context_spans_core::stable_id::{construct_stable_id, split_stable_id};
//!
//! let sentence = "report-7::sentence:120:168";
//! let span = construct_stable_id(sentence, "span", 4, 9).unwrap();
//! assert_eq!(span, "report-7::span:124:129");
//!
//! let parts = split_stable_id(&span).unwrap();
//! assert_eq!(parts.root_id, "report-7");
//! assert_eq!((parts.start, parts.end), (124, 129));
//! ```

use std::fmt;

use crate::error::MalformedIdError;

const ROOT_SEPARATOR: &str = "::";
const FIELD_SEPARATOR: char = ':';

/// The four components of a parsed stable id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StableIdParts {
    pub root_id: String,
    pub kind: String,
    pub start: i64,
    pub end: i64,
}

impl fmt::Display for StableIdParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}{}{}{}",
            self.root_id,
            ROOT_SEPARATOR,
            self.kind,
            FIELD_SEPARATOR,
            self.start,
            FIELD_SEPARATOR,
            self.end
        )
    }
}

/// Split a stable id into root id, kind, and absolute start/end offsets.
///
/// The id must contain exactly one `"::"` and the remainder exactly three
/// `':'`-delimited fields, the last two integers.
pub fn split_stable_id(stable_id: &str) -> Result<StableIdParts, MalformedIdError> {
    let malformed = || MalformedIdError(stable_id.to_string());

    let outer: Vec<&str> = stable_id.split(ROOT_SEPARATOR).collect();
    if outer.len() != 2 {
        return Err(malformed());
    }
    let fields: Vec<&str> = outer[1].split(FIELD_SEPARATOR).collect();
    if fields.len() != 3 {
        return Err(malformed());
    }
    let start = fields[1].parse::<i64>().map_err(|_| malformed())?;
    let end = fields[2].parse::<i64>().map_err(|_| malformed())?;

    Ok(StableIdParts {
        root_id: outer[0].to_string(),
        kind: fields[0].to_string(),
        start,
        end,
    })
}

/// Build the stable id of a child context from its parent's stable id and
/// its offsets relative to the parent's start.
///
/// The parent id must itself be well-formed; the child inherits its root id
/// and has the parent's absolute start added to both offsets.
pub fn construct_stable_id(
    parent_stable_id: &str,
    kind: &str,
    relative_start: i64,
    relative_end: i64,
) -> Result<String, MalformedIdError> {
    let parent = split_stable_id(parent_stable_id)?;
    let absolute = |relative: i64| {
        parent.start.checked_add(relative).ok_or_else(|| {
            MalformedIdError(format!("{parent_stable_id} + {kind}:{relative}"))
        })
    };
    let start = absolute(relative_start)?;
    let end = absolute(relative_end)?;
    Ok(StableIdParts {
        root_id: parent.root_id.clone(),
        kind: kind.to_string(),
        start,
        end,
    }
    .to_string())
}

/// The stable id of a root document: `"<name>::document:0:0"`.
///
/// Rejects names that would not split back to themselves (empty, containing
/// `"::"`, or ending in `':'`).
pub fn document_stable_id(name: &str) -> Result<String, MalformedIdError> {
    let id = StableIdParts {
        root_id: name.to_string(),
        kind: "document".to_string(),
        start: 0,
        end: 0,
    }
    .to_string();
    match split_stable_id(&id) {
        Ok(parts) if !name.is_empty() && parts.root_id == name => Ok(id),
        _ => Err(MalformedIdError(id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_well_formed() {
        let parts = split_stable_id("root::span:3:7").unwrap();
        assert_eq!(parts.root_id, "root");
        assert_eq!(parts.kind, "span");
        assert_eq!(parts.start, 3);
        assert_eq!(parts.end, 7);
    }

    #[test]
    fn test_split_rejects_malformed() {
        for bad in [
            "noseparator",
            "a::b",
            "a::b:c",
            "a::b:1",
            "a::b:1:x",
            "a::b::c:1:2",
            "a::span:1:2:3",
        ] {
            let err = split_stable_id(bad).unwrap_err();
            assert_eq!(err.0, bad);
        }
    }

    #[test]
    fn test_construct_adds_parent_start() {
        let id = construct_stable_id("doc::sentence:100:150", "span", 5, 9).unwrap();
        assert_eq!(id, "doc::span:105:109");
    }

    #[test]
    fn test_construct_composes_across_depth() {
        let table = construct_stable_id("doc::document:0:0", "table", 40, 90).unwrap();
        let cell = construct_stable_id(&table, "cell", 10, 19).unwrap();
        let phrase = construct_stable_id(&cell, "phrase", 2, 8).unwrap();
        let span = construct_stable_id(&phrase, "span", 1, 3).unwrap();
        assert_eq!(table, "doc::table:40:90");
        assert_eq!(cell, "doc::cell:50:59");
        assert_eq!(phrase, "doc::phrase:52:58");
        assert_eq!(span, "doc::span:53:55");
    }

    #[test]
    fn test_round_trip() {
        for root in ["doc", "a:b", "report 2021.pdf"] {
            let parent = document_stable_id(root).unwrap();
            for (s, e) in [(0, 0), (0, 4), (17, 230)] {
                let id = construct_stable_id(&parent, "phrase", s, e).unwrap();
                let parts = split_stable_id(&id).unwrap();
                assert_eq!(
                    parts,
                    StableIdParts {
                        root_id: root.to_string(),
                        kind: "phrase".to_string(),
                        start: s,
                        end: e,
                    }
                );
            }
        }
    }

    #[test]
    fn test_construct_requires_well_formed_parent() {
        let err = construct_stable_id("orphan", "span", 0, 1).unwrap_err();
        assert_eq!(err, MalformedIdError("orphan".to_string()));
    }

    #[test]
    fn test_construct_rejects_offset_overflow() {
        let parent = format!("doc::sentence:{}:{}", i64::MAX - 1, i64::MAX);
        assert!(construct_stable_id(&parent, "span", 0, 1).is_ok());
        assert!(construct_stable_id(&parent, "span", 0, 2).is_err());
        assert!(construct_stable_id("doc::sentence:-5:0", "span", i64::MIN, 0).is_err());
    }

    #[test]
    fn test_document_stable_id_validation() {
        assert_eq!(document_stable_id("doc").unwrap(), "doc::document:0:0");
        assert!(document_stable_id("").is_err());
        assert!(document_stable_id("a::b").is_err());
        assert!(document_stable_id("trailing:").is_err());
    }
}
