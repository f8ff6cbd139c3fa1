//! Cascading deletion over the ownership table.
//!
//! Every child row records an edge to each of its owners (see
//! [`KindSchema::owner_columns`](crate::registry::KindSchema::owner_columns)).
//! Deleting a root walks those edges breadth-first and removes everything
//! reachable, and nothing else.

use std::collections::{HashSet, VecDeque};

use tracing::info;

use crate::error::Result;
use crate::store::ContextStore;

/// Ids transitively owned by `root_id`, including the root, in visit order.
pub async fn collect_owned<S>(store: &S, root_id: i64) -> Result<Vec<i64>>
where
    S: ContextStore + ?Sized,
{
    let mut visited = HashSet::from([root_id]);
    let mut order = vec![root_id];
    let mut queue = VecDeque::from([root_id]);
    while let Some(owner) = queue.pop_front() {
        for child in store.owned_by(owner).await? {
            if visited.insert(child) {
                order.push(child);
                queue.push_back(child);
            }
        }
    }
    Ok(order)
}

/// Delete `root_id` and everything it transitively owns.
///
/// Returns the number of contexts removed.
pub async fn delete_cascade<S>(store: &S, root_id: i64) -> Result<usize>
where
    S: ContextStore + ?Sized,
{
    let ids = collect_owned(store, root_id).await?;
    store.delete_contexts(&ids).await?;
    info!(root_id, removed = ids.len(), "cascade delete");
    Ok(ids.len())
}
