use anyhow::{Context, Result};
use std::collections::HashSet;
use tracing::{debug, info};

use super::{SheetStatus, Workbook};
use crate::models::{Cell, KeyMode, TradingRecord};

/// Appends records to a sheet, skipping keys that are already persisted
pub struct SheetWriter<'a> {
    workbook: &'a dyn Workbook,
    key_mode: KeyMode,
}

impl<'a> SheetWriter<'a> {
    pub fn new(workbook: &'a dyn Workbook, key_mode: KeyMode) -> Self {
        Self { workbook, key_mode }
    }

    /// Append `records` to sheet `title` under `header`, returning how many
    /// rows were written.
    ///
    /// A first row that differs from `header` is replaced; body rows are left
    /// as they are even if they were written under an older column order.
    pub async fn append(
        &self,
        title: &str,
        header: &[String],
        records: &[TradingRecord],
    ) -> Result<usize> {
        let status = self
            .workbook
            .open_or_create(title, header.len())
            .await
            .with_context(|| format!("failed to open sheet {:?}", title))?;
        if status == SheetStatus::Created {
            self.workbook
                .append_rows(title, &[Cell::text_row(header)])
                .await?;
        }

        let rows = self.workbook.read_all(title).await?;
        match rows.first() {
            Some(first) if first.as_slice() == header => {}
            Some(first) => {
                info!("🔧 Rewriting header of {:?}", title);
                if first.iter().any(|cell| !cell.is_empty()) {
                    self.workbook.delete_first_row(title).await?;
                }
                self.workbook.insert_first_row(title, header).await?;
            }
            None => {
                self.workbook.insert_first_row(title, header).await?;
            }
        }

        let mut seen: HashSet<String> = rows
            .iter()
            .skip(1)
            .filter_map(|row| self.key_mode.row_key(row))
            .collect();
        debug!("{:?}: {} existing keys", title, seen.len());

        let mut pending = Vec::new();
        for record in records {
            let key = self.key_mode.record_key(record);
            if !seen.insert(key.clone()) {
                info!("⏭️ Skip duplicate {} in {:?}", key, title);
                continue;
            }
            pending.push(record.to_row(header));
        }

        if !pending.is_empty() {
            self.workbook
                .append_rows(title, &pending)
                .await
                .with_context(|| format!("failed to append to {:?}", title))?;
        }
        Ok(pending.len())
    }
}
