//! Ingest command: crawl a directory tree into the catalog

use crate::config::Config;
use crate::crawl::{batched, Crawler};
use crate::error::{Error, Result};
use crate::geom::extract::{extract_footprint, ExtractOutcome, FileKind, SpatialMeta};
use crate::ident;
use crate::model::{Asset, Collection, Item, FILE_EXTENSION, PROJ_EXTENSION, STAC_VERSION};
use crate::store::CatalogStore;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// A file that produced no catalog record, and why
#[derive(Debug, Clone, Serialize)]
pub struct SkipRecord {
    pub path: String,
    pub reason: String,
}

/// Ingestion statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestStats {
    /// Recognized candidate files found by the crawl
    pub scanned: usize,
    /// New items written (or, in dry-run, that would be written)
    pub inserted: u64,
    /// Candidates whose source path was already cataloged
    pub already_indexed: usize,
    /// Candidates that yielded no footprint
    pub skipped: Vec<SkipRecord>,
}

/// Ingest options beyond the config
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Collection id (defaults to the root directory name)
    pub collection: Option<String>,
    /// Override the configured existence-check batch size
    pub check_batch_size: Option<usize>,
    /// Override the configured insert batch size
    pub insert_batch_size: Option<usize>,
    /// Report what would happen without writing
    pub dry_run: bool,
}

/// Crawl `root` and catalog every new asset found under it.
///
/// Candidates flow through in existence-check batches; extracted items
/// queue up and flush as one write transaction whenever the insert batch
/// fills, with a final partial flush at end of run.
pub async fn cmd_ingest(
    config: &Config,
    store: &CatalogStore,
    root: &Path,
    options: IngestOptions,
) -> Result<IngestStats> {
    let root = root
        .canonicalize()
        .map_err(|e| Error::InvalidPath(format!("{}: {}", root.display(), e)))?;
    if !root.is_dir() {
        return Err(Error::InvalidPath(format!(
            "{} is not a directory",
            root.display()
        )));
    }

    let check_batch_size = options
        .check_batch_size
        .unwrap_or(config.ingest.check_batch_size)
        .max(1);
    let insert_batch_size = options
        .insert_batch_size
        .unwrap_or(config.ingest.insert_batch_size)
        .max(1);

    let collection_id = match options.collection {
        Some(id) => id,
        None => collection_id_from_root(&root)?,
    };
    info!(
        "Ingesting {:?} into collection '{}'{}",
        root,
        collection_id,
        if options.dry_run { " (dry run)" } else { "" }
    );

    if !options.dry_run {
        let collection = Collection::new(
            &collection_id,
            &collection_id,
            &format!("Assets indexed from {}", root.display()),
            &root.to_string_lossy(),
        );
        store.ensure_collection(&collection).await?;
    }

    let candidates = Crawler::new(&root, &config.ingest.exclude_dir).collect_candidates();
    let mut stats = IngestStats {
        scanned: candidates.len(),
        ..Default::default()
    };

    let mut pending: Vec<Item> = Vec::new();
    for batch in batched(candidates, check_batch_size) {
        let paths: Vec<String> = batch
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        let existing = store.existing_source_paths(&paths).await?;
        stats.already_indexed += existing.len();

        for path in batch
            .iter()
            .filter(|p| !existing.contains(p.to_string_lossy().as_ref()))
        {
            match extract_footprint(path).await? {
                Some((kind, ExtractOutcome::Extracted(meta))) => {
                    match build_item(path, &root, &collection_id, kind, &meta) {
                        Ok(item) => pending.push(item),
                        Err(e) => {
                            warn!("Failed to build item for {:?}: {}", path, e);
                            stats.skipped.push(SkipRecord {
                                path: path.to_string_lossy().into_owned(),
                                reason: e.to_string(),
                            });
                        }
                    }
                }
                Some((_, ExtractOutcome::Skipped(reason))) => {
                    warn!("Skipping {:?}: {}", path, reason);
                    stats.skipped.push(SkipRecord {
                        path: path.to_string_lossy().into_owned(),
                        reason: reason.to_string(),
                    });
                }
                None => {} // not a recognized kind; the crawler should not yield these
            }
        }

        while pending.len() >= insert_batch_size {
            let batch: Vec<Item> = pending.drain(..insert_batch_size).collect();
            flush_batch(store, &batch, options.dry_run, &mut stats).await?;
        }
    }

    // Final partial flush
    if !pending.is_empty() {
        flush_batch(store, &pending, options.dry_run, &mut stats).await?;
    }

    info!(
        "Ingest complete: {} new, {} already indexed, {} skipped",
        stats.inserted,
        stats.already_indexed,
        stats.skipped.len()
    );
    Ok(stats)
}

/// Write one batch, mapping a mid-run database failure to the count
/// committed before it.
async fn flush_batch(
    store: &CatalogStore,
    batch: &[Item],
    dry_run: bool,
    stats: &mut IngestStats,
) -> Result<()> {
    if dry_run {
        stats.inserted += batch.len() as u64;
        return Ok(());
    }
    match store.insert_items(batch).await {
        Ok(n) => {
            debug!("Flushed batch of {} items ({} new)", batch.len(), n);
            stats.inserted += n;
            Ok(())
        }
        Err(Error::Database(source)) => Err(Error::PartialBatch {
            committed: stats.inserted,
            source,
        }),
        Err(e) => Err(e),
    }
}

/// Build the catalog record for one extracted file.
fn build_item(
    path: &Path,
    root: &Path,
    collection_id: &str,
    kind: FileKind,
    meta: &SpatialMeta,
) -> Result<Item> {
    let canonical = path
        .canonicalize()
        .map_err(|e| Error::InvalidPath(format!("{}: {}", path.display(), e)))?;
    let source_path = canonical.to_string_lossy().into_owned();
    let relative = canonical
        .strip_prefix(root)
        .unwrap_or(&canonical)
        .to_string_lossy()
        .into_owned();

    let file_meta = std::fs::metadata(&canonical)?;
    let datetime: DateTime<Utc> = file_meta.modified()?.into();

    let mut properties = serde_json::Map::new();
    let mut extensions = vec![FILE_EXTENSION.to_string()];
    properties.insert("file:size".into(), file_meta.len().into());
    if let Some(epsg) = meta.native_epsg {
        properties.insert("proj:epsg".into(), epsg.into());
        extensions.insert(0, PROJ_EXTENSION.to_string());
        if let Some(zone) = utm_zone(epsg) {
            properties.insert("zone".into(), zone.into());
        }
    }
    if let Some(year) = year_from_path(&relative) {
        properties.insert("year".into(), year.into());
    }

    let title = canonical
        .file_name()
        .map(|n| n.to_string_lossy().into_owned());

    // Asset href is relative to the collection root
    let mut assets = BTreeMap::new();
    assets.insert(
        "data".to_string(),
        Asset::data(relative.clone(), kind.media_type()),
    );

    Ok(Item {
        id: ident::id_for_canonical(&source_path),
        collection_id: collection_id.to_string(),
        title,
        description: Some(format!("Indexed asset at {relative}")),
        stac_version: STAC_VERSION.to_string(),
        stac_extensions: extensions,
        datetime,
        geometry: meta.bbox.to_geojson(),
        bbox: meta.bbox.to_array(),
        properties: serde_json::Value::Object(properties),
        assets,
        links: Vec::new(),
        source_path,
    })
}

/// Collection id from the root directory name.
fn collection_id_from_root(root: &Path) -> Result<String> {
    root.file_name()
        .map(|n| n.to_string_lossy().to_lowercase().replace(' ', "-"))
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            Error::InvalidPath(format!(
                "cannot derive a collection id from {}",
                root.display()
            ))
        })
}

/// First plausible acquisition year appearing in the relative path.
///
/// The year must not touch another digit on either side, so `2021` in
/// `survey_2021_coast` matches while the `2034` inside `tile_12034` does
/// not. A plain word boundary would miss underscore-delimited years.
fn year_from_path(relative: &str) -> Option<String> {
    static YEAR_RE: OnceLock<Regex> = OnceLock::new();
    let re = YEAR_RE.get_or_init(|| {
        Regex::new(r"(?:^|[^0-9])(19[5-9]\d|20\d{2})(?:[^0-9]|$)")
            .unwrap_or_else(|e| panic!("year regex: {e}"))
    });
    re.captures(relative).map(|c| c[1].to_string())
}

/// UTM zone designator for WGS84 UTM EPSG codes.
fn utm_zone(epsg: u32) -> Option<String> {
    match epsg {
        32601..=32660 => Some(format!("{}N", epsg - 32600)),
        32701..=32760 => Some(format!("{}S", epsg - 32700)),
        _ => None,
    }
}

pub fn print_ingest_stats(stats: &IngestStats, dry_run: bool) {
    if dry_run {
        println!("\n✓ Dry run complete");
    } else {
        println!("\n✓ Ingestion complete");
    }
    println!("  Candidates found: {}", stats.scanned);
    println!("  Items inserted: {}", stats.inserted);
    println!("  Already indexed: {}", stats.already_indexed);
    println!("  Skipped: {}", stats.skipped.len());
    for skip in &stats.skipped {
        println!("    {} ({})", skip.path, skip.reason);
    }
}
