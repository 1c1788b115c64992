//! Whole-file JSON replacement

use moments_host_api::{HostError, HostResult};
use serde::Serialize;
use std::path::Path;

/// Write `value` as pretty JSON to `path` via a sibling temp file and a
/// rename, so readers never observe a partial document
pub(crate) async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> HostResult<()> {
    let json =
        serde_json::to_vec_pretty(value).map_err(|e| HostError::Serialization(e.to_string()))?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
