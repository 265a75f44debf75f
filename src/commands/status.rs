//! Status command: catalog health and counts

use crate::error::Result;
use crate::store::CatalogStore;
use serde::Serialize;

/// Per-collection status line
#[derive(Debug, Clone, Serialize)]
pub struct CollectionStatus {
    pub id: String,
    pub items: i64,
}

/// Catalog status snapshot
#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub initialized: bool,
    pub collections: Vec<CollectionStatus>,
    pub total_items: i64,
}

pub async fn cmd_status(store: &CatalogStore) -> Result<StatusInfo> {
    let initialized = store.is_initialized().await?;
    if !initialized {
        return Ok(StatusInfo {
            initialized,
            collections: Vec::new(),
            total_items: 0,
        });
    }

    let stats = store.collection_stats().await?;
    let total_items = stats.iter().map(|s| s.item_count).sum();
    Ok(StatusInfo {
        initialized,
        collections: stats
            .into_iter()
            .map(|s| CollectionStatus {
                id: s.collection_id,
                items: s.item_count,
            })
            .collect(),
        total_items,
    })
}

pub fn print_status(status: &StatusInfo) {
    if !status.initialized {
        println!("Catalog schema not initialized");
        return;
    }
    println!("Catalog status");
    println!("  Collections: {}", status.collections.len());
    for c in &status.collections {
        println!("    {} ({} items)", c.id, c.items);
    }
    println!("  Total items: {}", status.total_items);
}
