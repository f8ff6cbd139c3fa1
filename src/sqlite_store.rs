//! SQLite-backed [`ContextStore`] implementation.
//!
//! Every subtype insert is generated from the kind registry: the table
//! name and column list come from [`schema_for`], and values are bound in
//! registry order. JSON-shaped values (token arrays, HTML attribute lists,
//! meta blobs) are stored as JSON text.

use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteArguments, SqlitePool};
use sqlx::query::Query;
use sqlx::{Row, Sqlite};

use context_spans_core::models::ContextKind;
use context_spans_core::registry::{schema_for, Field, FieldValue, REGISTRY};
use context_spans_core::store::{ContextStore, StoreError};

/// SQLite implementation of the [`ContextStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.into())
}

/// Whether `err` is the unique index on `context.stable_id` firing.
fn is_stable_id_conflict(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            db.is_unique_violation() && db.message().contains("context.stable_id")
        }
        _ => false,
    }
}

/// `INSERT INTO "<table>" (id, <columns>) VALUES (?, ...)` for one kind.
fn insert_sql(kind: ContextKind) -> String {
    let schema = schema_for(kind);
    let columns = std::iter::once("id")
        .chain(schema.columns.iter().copied())
        .collect::<Vec<_>>();
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
        "INSERT INTO \"{}\" ({}) VALUES ({})",
        schema.table,
        columns.join(", "),
        placeholders
    )
}

fn bind_field<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &FieldValue,
) -> Result<Query<'q, Sqlite, SqliteArguments<'q>>, StoreError> {
    Ok(match value {
        FieldValue::Null => query.bind(Option::<i64>::None),
        FieldValue::Integer(i) => query.bind(*i),
        FieldValue::Text(s) => query.bind(s.clone()),
        FieldValue::Json(v) => query.bind(serde_json::to_string(v).map_err(|e| anyhow!(e))?),
    })
}

#[async_trait]
impl ContextStore for SqliteStore {
    async fn lookup_by_stable_id(&self, stable_id: &str) -> Result<Option<i64>, StoreError> {
        sqlx::query_scalar("SELECT id FROM context WHERE stable_id = ?")
            .bind(stable_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)
    }

    async fn insert_row(
        &self,
        kind: ContextKind,
        stable_id: &str,
        fields: &[Field],
    ) -> Result<i64, StoreError> {
        let schema = schema_for(kind);
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let inserted = sqlx::query("INSERT INTO context (type, stable_id, created_at) VALUES (?, ?, ?)")
            .bind(kind.as_str())
            .bind(stable_id)
            .bind(now)
            .execute(&mut *tx)
            .await;
        let id = match inserted {
            Ok(result) => result.last_insert_rowid(),
            Err(e) if is_stable_id_conflict(&e) => {
                tx.rollback().await.map_err(backend)?;
                return Err(StoreError::Conflict(stable_id.to_string()));
            }
            Err(e) => return Err(backend(e)),
        };

        let sql = insert_sql(kind);
        let mut query = sqlx::query(&sql).bind(id);
        for (_, value) in fields {
            query = bind_field(query, value)?;
        }
        query.execute(&mut *tx).await.map_err(backend)?;

        for owner in schema.owner_ids(fields) {
            sqlx::query(
                "INSERT INTO context_owner (owner_id, child_id) VALUES (?, ?) ON CONFLICT DO NOTHING",
            )
            .bind(owner)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }

        tx.commit().await.map_err(backend)?;
        Ok(id)
    }

    async fn owned_by(&self, owner_id: i64) -> Result<Vec<i64>, StoreError> {
        sqlx::query_scalar("SELECT child_id FROM context_owner WHERE owner_id = ? ORDER BY child_id")
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)
    }

    async fn delete_contexts(&self, ids: &[i64]) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }
        let id_list = serde_json::to_string(ids).map_err(|e| anyhow!(e))?;
        let mut tx = self.pool.begin().await.map_err(backend)?;

        // Rows reference each other across kinds; check once at commit.
        sqlx::query("PRAGMA defer_foreign_keys = ON")
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        sqlx::query(
            "DELETE FROM context_owner
             WHERE owner_id IN (SELECT value FROM json_each(?))
                OR child_id IN (SELECT value FROM json_each(?))",
        )
        .bind(&id_list)
        .bind(&id_list)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        for schema in &REGISTRY {
            let sql = format!(
                "DELETE FROM \"{}\" WHERE id IN (SELECT value FROM json_each(?))",
                schema.table
            );
            sqlx::query(&sql)
                .bind(&id_list)
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
        }

        sqlx::query("DELETE FROM context WHERE id IN (SELECT value FROM json_each(?))")
            .bind(&id_list)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        tx.commit().await.map_err(backend)?;
        Ok(())
    }

    async fn count_by_kind(&self) -> Result<Vec<(ContextKind, i64)>, StoreError> {
        let rows = sqlx::query("SELECT type, COUNT(*) AS n FROM context GROUP BY type")
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        let mut counts = Vec::with_capacity(rows.len());
        for row in rows {
            let tag: String = row.get("type");
            let kind = tag
                .parse::<ContextKind>()
                .map_err(|e| StoreError::Backend(anyhow!(e)))?;
            counts.push((kind, row.get::<i64, _>("n")));
        }
        counts.sort();
        Ok(counts)
    }
}
