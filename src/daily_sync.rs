//! Daily sync run
//!
//! Locates the trading day, assembles one record per configured ticker and
//! appends the new ones to the destination workbook. Tickers are processed
//! one at a time; a failure on one ticker or one sheet never drops the work
//! already done for another.

use anyhow::Result;
use chrono::NaiveDate;
use tracing::{error, info, warn};

use crate::api::MarketDataProvider;
use crate::data_collector::{DataCollector, Enrichment};
use crate::models::{Config, TradingRecord};
use crate::sheets::{SheetWriter, Workbook};
use crate::utils::MarketCalendar;

/// Result of one daily run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub trading_day: Option<NaiveDate>,
    pub total_tickers: usize,
    pub assembled: usize,
    pub skipped: usize,
    pub failed: usize,
    pub appended: usize,
    pub failed_sheets: usize,
}

/// Run one daily snapshot against `provider` and `workbook`
pub async fn run_daily_sync(
    config: &Config,
    provider: &dyn MarketDataProvider,
    workbook: &dyn Workbook,
) -> Result<SyncSummary> {
    let mut summary = SyncSummary {
        total_tickers: config.tickers.len(),
        ..Default::default()
    };

    let calendar = MarketCalendar::new(provider, config.reference_index.as_str());
    let trading_day = calendar.locate(config.base_date()).await;
    summary.trading_day = Some(trading_day);
    info!("🚀 Daily sync for {} ({} tickers)", trading_day, config.tickers.len());

    let collector = DataCollector::new(
        provider,
        Enrichment {
            investor_net: config.include_investor,
            short_selling: config.include_short,
        },
    );

    let mut records = Vec::new();
    for ticker in &config.tickers {
        match collector.assemble(trading_day, ticker).await {
            Ok(Some(record)) => {
                summary.assembled += 1;
                records.push(record);
            }
            Ok(None) => summary.skipped += 1,
            Err(e) => {
                summary.failed += 1;
                warn!("❌ {}: fetch failed: {:#}", ticker, e);
            }
        }
    }

    if records.is_empty() {
        info!("No records to write.");
        return Ok(summary);
    }

    let layout = &config.layout;
    let header = layout.header();
    let writer = SheetWriter::new(workbook, layout.key_mode());

    for (title, group) in group_by_title(records, |r| layout.sheet_title(&r.ticker, &r.name)) {
        match writer.append(&title, &header, &group).await {
            Ok(count) => summary.appended += count,
            Err(e) => {
                summary.failed_sheets += 1;
                error!("❌ Failed to write {:?}: {:#}", title, e);
            }
        }
    }

    info!("✅ Appended {} rows for {}", summary.appended, trading_day);
    Ok(summary)
}

/// Group records by destination title, keeping first-seen order for both
/// the groups and the records inside them
fn group_by_title<F>(records: Vec<TradingRecord>, title_of: F) -> Vec<(String, Vec<TradingRecord>)>
where
    F: Fn(&TradingRecord) -> String,
{
    let mut groups: Vec<(String, Vec<TradingRecord>)> = Vec::new();
    for record in records {
        let title = title_of(&record);
        match groups.iter_mut().find(|(t, _)| *t == title) {
            Some((_, group)) => group.push(record),
            None => groups.push((title, vec![record])),
        }
    }
    groups
}
