//! # Context Spans
//!
//! Persistent, stably addressed document hierarchies and candidate spans.
//!
//! Annotated documents (sentences, tables, cells, phrases, each already
//! tokenized) are loaded into SQLite. Every context gets a stable id of the
//! form `<document>::<kind>:<start>:<end>` with document-absolute character
//! offsets, so n-gram candidate spans can be generated in bulk, compared by
//! value, and persisted exactly once.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────┐   ┌────────────┐
//! │ JSON input  │──▶│ context-spans-   │──▶│   SQLite   │
//! │ (annotated) │   │ core: ids, spans │   │ context +  │
//! └─────────────┘   │ get-or-insert    │   │ subtypes   │
//!                   └──────────────────┘   └─────┬──────┘
//!                                                ▼
//!                                          ┌──────────┐
//!                                          │   CLI    │
//!                                          │ (cspan)  │
//!                                          └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`sqlite_store`] | SQLite implementation of the core store trait |
//! | [`ingest`] | Annotated document loading and n-gram materialization |
//! | [`get`] | Lookup by stable id |
//! | [`delete`] | Cascading document deletion |
//! | [`stats`] | Row counts and database size |
//! | [`logging`] | Tracing subscriber setup |

pub mod config;
pub mod db;
pub mod delete;
pub mod get;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod sqlite_store;
pub mod stats;
