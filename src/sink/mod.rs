//! Output sinks for the published snapshot
//!
//! A sink receives the complete table of one run and replaces whatever it
//! published before. It is never handed an empty table.

use async_trait::async_trait;

use crate::Result;
use crate::models::ResultTable;

pub mod csv_file;
pub mod google_sheet;

pub use csv_file::CsvFileSink;
pub use google_sheet::GoogleSheetSink;

#[async_trait]
pub trait OutputSink: Send + Sync {
    /// Replace the published content with `table`
    async fn publish(&self, table: &ResultTable) -> Result<()>;

    /// Where the snapshot goes, for logs
    fn describe(&self) -> String;
}
