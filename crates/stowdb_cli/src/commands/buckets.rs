//! Buckets command implementation.

use serde::Serialize;
use stowdb_storage::{Engine, StorageError, StorageResult};

/// Entry count of one bucket.
#[derive(Debug, Serialize)]
pub struct BucketStats {
    /// Bucket name.
    pub name: String,
    /// Number of entries.
    pub entries: usize,
}

/// Runs the buckets command.
pub fn run(engine: &Engine) -> Result<(), Box<dyn std::error::Error>> {
    let stats = collect(engine)?;
    if stats.is_empty() {
        println!("No buckets");
        return Ok(());
    }

    let width = stats.iter().map(|s| s.name.len()).max().unwrap_or(0);
    for bucket in &stats {
        println!("{:<width$}  {:>8}", bucket.name, bucket.entries);
    }
    println!();
    println!("{} buckets, {} bytes of log", stats.len(), engine.log_len());
    Ok(())
}

/// Lists every bucket in name order.
pub fn collect(engine: &Engine) -> StorageResult<Vec<BucketStats>> {
    engine.view(|tx| {
        Ok::<_, StorageError>(
            tx.bucket_names()
                .map(|name| BucketStats {
                    name: String::from_utf8_lossy(name).into_owned(),
                    entries: tx.bucket(name).map_or(0, |b| b.len()),
                })
                .collect(),
        )
    })
}


