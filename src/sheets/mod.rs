use anyhow::Result;

use crate::models::Cell;

pub mod auth;
pub mod csv_workbook;
pub mod google_client;
pub mod writer;

pub use csv_workbook::CsvWorkbook;
pub use google_client::GoogleSheetsClient;
pub use writer::SheetWriter;

/// Outcome of opening a sheet by title
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetStatus {
    Existing,
    Created,
}

/// Spreadsheet destination: a set of sheets addressed by title.
///
/// Rows are plain text cells; row 1 is the header by convention.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Workbook: Send + Sync {
    /// Open the sheet, creating an empty one sized for `columns` if needed
    async fn open_or_create(&self, title: &str, columns: usize) -> Result<SheetStatus>;

    /// Every row of the sheet, header included
    async fn read_all(&self, title: &str) -> Result<Vec<Vec<String>>>;

    async fn delete_first_row(&self, title: &str) -> Result<()>;

    async fn insert_first_row(&self, title: &str, row: &[String]) -> Result<()>;

    /// Append rows after the last non-empty row, in order; numeric cells
    /// are stored as numbers
    async fn append_rows(&self, title: &str, rows: &[Vec<Cell>]) -> Result<()>;
}
