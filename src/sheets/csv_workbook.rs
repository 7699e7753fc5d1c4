use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use super::{SheetStatus, Workbook};
use crate::models::Cell;

/// Workbook backed by a local directory, one `<title>.csv` file per sheet
pub struct CsvWorkbook {
    dir: PathBuf,
}

impl CsvWorkbook {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create output directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    /// File backing a sheet title; path separators become `_`
    pub fn sheet_path(&self, title: &str) -> PathBuf {
        let file_name: String = title
            .chars()
            .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
            .collect();
        self.dir.join(format!("{}.csv", file_name))
    }

    fn read_rows(path: &Path) -> Result<Vec<Vec<String>>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("failed to open {}", path.display()))?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(rows)
    }

    fn write_rows(path: &Path, rows: &[Vec<String>], append: bool) -> Result<()> {
        let file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)
            .with_context(|| format!("failed to write {}", path.display()))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_writer(file);
        for row in rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Workbook for CsvWorkbook {
    async fn open_or_create(&self, title: &str, _columns: usize) -> Result<SheetStatus> {
        let path = self.sheet_path(title);
        if path.exists() {
            return Ok(SheetStatus::Existing);
        }
        fs::File::create(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        info!("📄 Created sheet file {}", path.display());
        Ok(SheetStatus::Created)
    }

    async fn read_all(&self, title: &str) -> Result<Vec<Vec<String>>> {
        Self::read_rows(&self.sheet_path(title))
    }

    async fn delete_first_row(&self, title: &str) -> Result<()> {
        let path = self.sheet_path(title);
        let mut rows = Self::read_rows(&path)?;
        if !rows.is_empty() {
            rows.remove(0);
        }
        Self::write_rows(&path, &rows, false)
    }

    async fn insert_first_row(&self, title: &str, row: &[String]) -> Result<()> {
        let path = self.sheet_path(title);
        let mut rows = Self::read_rows(&path)?;
        rows.insert(0, row.to_vec());
        Self::write_rows(&path, &rows, false)
    }

    async fn append_rows(&self, title: &str, rows: &[Vec<Cell>]) -> Result<()> {
        let rows: Vec<Vec<String>> = rows
            .iter()
            .map(|row| row.iter().map(Cell::to_string).collect())
            .collect();
        Self::write_rows(&self.sheet_path(title), &rows, true)
    }
}
