//! Cascading document deletion.

use anyhow::{bail, Result};
use tracing::info;

use context_spans_core::cascade::delete_cascade;
use context_spans_core::stable_id::document_stable_id;
use context_spans_core::store::ContextStore;

use crate::config::Config;
use crate::db;

/// Delete the document called `name` and everything it owns.
///
/// Returns the number of contexts removed.
pub async fn delete_document<S>(store: &S, name: &str) -> Result<usize>
where
    S: ContextStore + ?Sized,
{
    let stable_id = document_stable_id(name)?;
    let Some(id) = store.lookup_by_stable_id(&stable_id).await? else {
        bail!("document not found: {}", name);
    };
    let removed = delete_cascade(store, id).await?;
    info!(name, id, removed, "document deleted");
    Ok(removed)
}

pub async fn run_delete(config: &Config, name: &str) -> Result<()> {
    let store = db::open_store(config).await?;
    let result = delete_document(&store, name).await;
    store.pool().close().await;

    let removed = result?;
    println!("delete {}", name);
    println!("  contexts removed: {}", removed);
    println!("ok");
    Ok(())
}
