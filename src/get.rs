//! Context retrieval by stable id.
//!
//! Splits the stable id (so malformed ids fail before touching the
//! database), resolves the surrogate id, and reports what the id addresses.

use anyhow::{bail, Result};
use serde::Serialize;
use sqlx::SqlitePool;

use context_spans_core::models::ContextKind;
use context_spans_core::registry::schema_for;
use context_spans_core::stable_id::split_stable_id;
use context_spans_core::store::ContextStore;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// What a stable id resolves to.
#[derive(Debug, Clone, Serialize)]
pub struct ContextResponse {
    pub id: i64,
    pub stable_id: String,
    pub root_id: String,
    pub kind: String,
    pub start: i64,
    pub end: i64,
    pub created_at: String, // ISO8601
    pub text: Option<String>,
    pub children: usize,
}

/// Look up one context; fails if the id is malformed or unknown.
pub async fn get_context(store: &SqliteStore, stable_id: &str) -> Result<ContextResponse> {
    let parts = split_stable_id(stable_id)?;

    let id = match store.lookup_by_stable_id(stable_id).await? {
        Some(id) => id,
        None => bail!("context not found: {}", stable_id),
    };

    let created_at: i64 = sqlx::query_scalar("SELECT created_at FROM context WHERE id = ?")
        .bind(id)
        .fetch_one(store.pool())
        .await?;

    let text = match parts.kind.parse::<ContextKind>() {
        Ok(kind) => fetch_text(store.pool(), kind, id).await?,
        Err(_) => None,
    };
    let children = store.owned_by(id).await?.len();

    Ok(ContextResponse {
        id,
        stable_id: stable_id.to_string(),
        root_id: parts.root_id,
        kind: parts.kind,
        start: parts.start,
        end: parts.end,
        created_at: format_ts_iso(created_at),
        text,
        children,
    })
}

/// The subtype row's `text` column, for kinds that have one.
async fn fetch_text(pool: &SqlitePool, kind: ContextKind, id: i64) -> Result<Option<String>> {
    let schema = schema_for(kind);
    if !schema.columns.contains(&"text") {
        return Ok(None);
    }
    let sql = format!("SELECT text FROM \"{}\" WHERE id = ?", schema.table);
    let text = sqlx::query_scalar(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(text)
}

/// CLI entry point — calls get_context and prints to stdout.
pub async fn run_get(config: &Config, stable_id: &str) -> Result<()> {
    let store = db::open_store(config).await?;
    let result = get_context(&store, stable_id).await;
    store.pool().close().await;
    let ctx = result?;

    println!("--- Context ---");
    println!("id:         {}", ctx.id);
    println!("stable_id:  {}", ctx.stable_id);
    println!("kind:       {}", ctx.kind);
    println!("root:       {}", ctx.root_id);
    println!("chars:      [{}, {}]", ctx.start, ctx.end);
    println!("created_at: {}", ctx.created_at);
    println!("owns:       {}", ctx.children);
    if let Some(ref text) = ctx.text {
        println!();
        println!("--- Text ---");
        println!("{}", text);
    }

    Ok(())
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
