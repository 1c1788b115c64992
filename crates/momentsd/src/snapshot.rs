//! Moment snapshot file loading
//!
//! The daemon's change feed is a JSON file holding either a bare array of
//! moments or a versioned document `{ "version": 1, "moments": [...] }`.

use moments_api::{Moment, SNAPSHOT_VERSION};
use moments_util::{MomentsError, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotFile {
    Versioned { version: u32, moments: Vec<Moment> },
    Bare(Vec<Moment>),
}

/// Load the current moment snapshot. A missing file is an empty snapshot.
pub fn load_snapshot(path: &Path) -> Result<Vec<Moment>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No moments file, using empty snapshot");
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(MomentsError::snapshot(format!(
                "failed to read {}: {}",
                path.display(),
                e
            )));
        }
    };

    let moments = parse_snapshot(&content)?;
    info!(path = %path.display(), count = moments.len(), "Moments loaded");
    Ok(moments)
}

pub fn parse_snapshot(content: &str) -> Result<Vec<Moment>> {
    let file: SnapshotFile = serde_json::from_str(content)
        .map_err(|e| MomentsError::snapshot(format!("invalid moments JSON: {}", e)))?;

    let moments = match file {
        SnapshotFile::Versioned { version, moments } => {
            if version != SNAPSHOT_VERSION {
                return Err(MomentsError::snapshot(format!(
                    "unsupported snapshot version {} (expected {})",
                    version, SNAPSHOT_VERSION
                )));
            }
            moments
        }
        SnapshotFile::Bare(moments) => moments,
    };

    let mut seen = HashSet::new();
    for moment in &moments {
        if !seen.insert(&moment.id) {
            return Err(MomentsError::invalid(&moment.id, "duplicate moment id"));
        }
    }

    Ok(moments)
}
