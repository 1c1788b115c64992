//! Widget feed written to a JSON file

use async_trait::async_trait;
use chrono::{DateTime, Local};
use moments_api::{SNAPSHOT_VERSION, WidgetMoment};
use moments_host_api::{HostResult, WidgetPublisher};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::write_json_atomic;

#[derive(Serialize)]
struct WidgetDocument<'a> {
    version: u32,
    updated_at: DateTime<Local>,
    moments: &'a [WidgetMoment],
}

/// Mirrors the moment collection into a file that widgets and bars read
pub struct WidgetFileWriter {
    path: PathBuf,
}

impl WidgetFileWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl WidgetPublisher for WidgetFileWriter {
    async fn publish(&self, moments: &[WidgetMoment]) -> HostResult<()> {
        let document = WidgetDocument {
            version: SNAPSHOT_VERSION,
            updated_at: moments_util::now(),
            moments,
        };
        write_json_atomic(&self.path, &document).await?;

        debug!(
            path = %self.path.display(),
            count = moments.len(),
            "Widget moments published"
        );
        Ok(())
    }
}
