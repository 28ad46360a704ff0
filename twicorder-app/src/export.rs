//! Raw-to-relational export (spec.md §1): flattening the NDJSON this
//! process writes under `output_dir` into a relational sink is explicitly
//! an out-of-scope collaborator — the acquisition core's job ends at
//! "durable NDJSON on disk, optionally mirrored into a document store"
//! (spec.md §4.5). This documents the contract a real exporter would
//! fulfil without implementing one.

use std::path::PathBuf;

use anyhow::Result;
use tracing::info;

/// Walk `output_dir` and report what an exporter would have to consume.
/// Intentionally does not transform anything: the shape of a relational
/// sink is a downstream decision this core doesn't make (spec.md §9).
pub async fn run(output_dir: PathBuf) -> Result<()> {
    if !output_dir.exists() {
        info!(dir = %output_dir.display(), "export.nothing_to_export");
        return Ok(());
    }

    let mut buckets = 0usize;
    let mut files = 0usize;
    let mut entries = tokio::fs::read_dir(&output_dir).await?;
    while let Some(bucket) = entries.next_entry().await? {
        if !bucket.file_type().await?.is_dir() {
            continue;
        }
        buckets += 1;
        let mut bucket_entries = tokio::fs::read_dir(bucket.path()).await?;
        while let Some(file) = bucket_entries.next_entry().await? {
            if file.file_type().await?.is_file() {
                files += 1;
            }
        }
    }

    info!(
        dir = %output_dir.display(),
        buckets,
        files,
        "export.summary: hand these NDJSON files to a relational exporter",
    );
    Ok(())
}
