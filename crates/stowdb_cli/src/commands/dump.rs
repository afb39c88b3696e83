//! Dump command implementation.

use stowdb_storage::{Engine, StorageError, StorageResult};

/// Runs the dump command.
pub fn run(engine: &Engine, bucket: &str, limit: Option<usize>) -> Result<(), Box<dyn std::error::Error>> {
    let entries = collect(engine, bucket, limit)?;
    for (key, value) in &entries {
        println!("{key}  =>  {value}");
    }
    println!();
    println!("{} entries", entries.len());
    Ok(())
}

/// Reads up to `limit` entries of `bucket` in key order, rendered with
/// non-printable bytes escaped.
///
/// # Errors
///
/// Returns [`StorageError::BucketNotFound`] if the bucket does not exist.
pub fn collect(engine: &Engine, bucket: &str, limit: Option<usize>) -> StorageResult<Vec<(String, String)>> {
    engine.view(|tx| {
        let b = tx
            .bucket(bucket.as_bytes())
            .ok_or_else(|| StorageError::bucket_not_found(bucket.as_bytes()))?;
        Ok(b
            .cursor()
            .take(limit.unwrap_or(usize::MAX))
            .map(|(key, value)| (render(key), render(value)))
            .collect())
    })
}

fn render(bytes: &[u8]) -> String {
    bytes.escape_ascii().to_string()
}


