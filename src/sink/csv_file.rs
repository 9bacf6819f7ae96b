use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::task;
use tracing::info;

use super::OutputSink;
use crate::models::ResultTable;
use crate::{AirsheetError, Result};

/// Writes the snapshot to a local CSV file, replacing it atomically
#[derive(Debug, Clone)]
pub struct CsvFileSink {
    path: PathBuf,
}

impl CsvFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot.csv".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn write_table(table: &ResultTable, staging: &Path, target: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(staging)?;
    for record in table.records() {
        writer.serialize(record)?;
    }
    writer.flush()?;
    drop(writer);

    std::fs::rename(staging, target)?;
    Ok(())
}

#[async_trait]
impl OutputSink for CsvFileSink {
    async fn publish(&self, table: &ResultTable) -> Result<()> {
        let rows = table.len();
        let table = table.clone();
        let staging = self.staging_path();
        let target = self.path.clone();

        task::spawn_blocking(move || write_table(&table, &staging, &target))
            .await
            .map_err(|e| AirsheetError::sink(format!("CSV writer task failed: {e}")))??;

        info!(path = %self.path.display(), rows, "Wrote snapshot file");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("csv file {}", self.path.display())
    }
}
