//! Database schema creation (idempotent).
//!
//! One base `context` table holds the kind tag and the unique stable id;
//! each kind has a subtype table keyed by the same id, with the column set
//! its registry entry names. `context_owner` records every owner → child
//! edge and drives cascading deletes.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

const SCHEMA: &[&str] = &[
    // Base rows: one per context of any kind
    r#"
    CREATE TABLE IF NOT EXISTS context (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        type TEXT NOT NULL,
        stable_id TEXT NOT NULL UNIQUE,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS document (
        id INTEGER PRIMARY KEY REFERENCES context(id),
        name TEXT NOT NULL UNIQUE,
        meta TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sentence (
        id INTEGER PRIMARY KEY REFERENCES context(id),
        document_id INTEGER NOT NULL REFERENCES document(id),
        position INTEGER NOT NULL,
        text TEXT NOT NULL,
        words TEXT NOT NULL,
        char_offsets TEXT NOT NULL,
        lemmas TEXT,
        poses TEXT,
        dep_parents TEXT,
        dep_labels TEXT,
        UNIQUE(document_id, position)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS "table" (
        id INTEGER PRIMARY KEY REFERENCES context(id),
        document_id INTEGER NOT NULL REFERENCES document(id),
        position INTEGER NOT NULL,
        text TEXT NOT NULL,
        UNIQUE(document_id, position)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cell (
        id INTEGER PRIMARY KEY REFERENCES context(id),
        document_id INTEGER NOT NULL REFERENCES document(id),
        table_id INTEGER NOT NULL REFERENCES "table"(id),
        position INTEGER NOT NULL,
        text TEXT NOT NULL,
        row_num INTEGER,
        col_num INTEGER,
        html_tag TEXT,
        html_attrs TEXT,
        html_anc_tags TEXT,
        html_anc_attrs TEXT,
        UNIQUE(document_id, table_id, position)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS phrase (
        id INTEGER PRIMARY KEY REFERENCES context(id),
        document_id INTEGER NOT NULL REFERENCES document(id),
        table_id INTEGER REFERENCES "table"(id),
        cell_id INTEGER REFERENCES cell(id),
        position INTEGER NOT NULL,
        text TEXT NOT NULL,
        row_num INTEGER,
        col_num INTEGER,
        html_tag TEXT,
        html_attrs TEXT,
        html_anc_tags TEXT,
        html_anc_attrs TEXT,
        words TEXT NOT NULL,
        char_offsets TEXT NOT NULL,
        lemmas TEXT,
        poses TEXT,
        dep_parents TEXT,
        dep_labels TEXT,
        UNIQUE(document_id, table_id, cell_id, position)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS span (
        id INTEGER PRIMARY KEY REFERENCES context(id),
        parent_id INTEGER NOT NULL REFERENCES context(id),
        char_start INTEGER NOT NULL,
        char_end INTEGER NOT NULL,
        meta TEXT,
        UNIQUE(parent_id, char_start, char_end)
    )
    "#,
    // Ownership edges for cascading deletes
    r#"
    CREATE TABLE IF NOT EXISTS context_owner (
        owner_id INTEGER NOT NULL REFERENCES context(id),
        child_id INTEGER NOT NULL REFERENCES context(id),
        PRIMARY KEY (owner_id, child_id)
    )
    "#,
    // SQLite treats NULLs as distinct in UNIQUE, so phrases placed directly
    // in a document or table need their own position constraints.
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_phrase_document_position
        ON phrase(document_id, position)
        WHERE table_id IS NULL AND cell_id IS NULL
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_phrase_table_position
        ON phrase(document_id, table_id, position)
        WHERE table_id IS NOT NULL AND cell_id IS NULL
    "#,
    "CREATE INDEX IF NOT EXISTS idx_context_owner_child ON context_owner(child_id)",
    "CREATE INDEX IF NOT EXISTS idx_context_type ON context(type)",
];

/// Create all tables and indexes on `pool`.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}
