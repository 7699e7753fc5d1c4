use anyhow::Result;
use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::MarketDataProvider;
use crate::columns::{self, ColumnSpec};
use crate::models::{InvestorNet, ShortInterest, Table, TradingRecord};

/// Which enrichment queries to attempt on top of OHLCV
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enrichment {
    pub investor_net: bool,
    pub short_selling: bool,
}

/// Why a ticker produced no record
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SkipReason {
    #[error("no data for {0}")]
    NoData(NaiveDate),
    #[error("missing required columns {missing:?} | observed={observed:?}")]
    MissingColumns {
        missing: Vec<&'static str>,
        observed: Vec<String>,
    },
}

/// Assembles one normalized record per ticker from the provider's tables
pub struct DataCollector<'a> {
    provider: &'a dyn MarketDataProvider,
    enrichment: Enrichment,
}

impl<'a> DataCollector<'a> {
    /// Create a new data collector
    pub fn new(provider: &'a dyn MarketDataProvider, enrichment: Enrichment) -> Self {
        Self {
            provider,
            enrichment,
        }
    }

    /// Build the record for `ticker` on `date`.
    ///
    /// `Ok(None)` means the ticker is skipped (no data, or a required column
    /// could not be resolved). Only a failure of the primary OHLCV query is
    /// returned as an error; enrichment failures leave their fields empty.
    pub async fn assemble(&self, date: NaiveDate, ticker: &str) -> Result<Option<TradingRecord>> {
        let table = self.provider.ohlcv(date, ticker).await?;

        let mut record = match build_record(date, ticker, &table) {
            Ok(record) => record,
            Err(reason @ SkipReason::NoData(_)) => {
                info!("⏭️ {}: {}", ticker, reason);
                return Ok(None);
            }
            Err(reason) => {
                warn!("⚠️ {}: {}", ticker, reason);
                return Ok(None);
            }
        };

        record.name = self.display_name(ticker).await;

        if self.enrichment.investor_net {
            record.investor_net = self.investor_net(date, ticker).await;
        }
        if self.enrichment.short_selling {
            record.short_interest = self.short_interest(date, ticker).await;
        }

        debug!("Assembled {} @ {}: close {}", ticker, date, record.close);
        Ok(Some(record))
    }

    async fn display_name(&self, ticker: &str) -> String {
        match self.provider.ticker_name(ticker).await {
            Ok(name) => name.trim().to_string(),
            Err(e) => {
                debug!("{}: name lookup failed: {:#}", ticker, e);
                String::new()
            }
        }
    }

    async fn investor_net(&self, date: NaiveDate, ticker: &str) -> Option<InvestorNet> {
        match self.provider.investor_net(date, ticker).await {
            Ok(table) => investor_from_table(&table),
            Err(e) => {
                debug!("{}: investor breakdown unavailable: {:#}", ticker, e);
                None
            }
        }
    }

    async fn short_interest(&self, date: NaiveDate, ticker: &str) -> Option<ShortInterest> {
        match self.provider.short_selling(date, ticker).await {
            Ok(table) => short_from_table(&table),
            Err(e) => {
                debug!("{}: short selling unavailable: {:#}", ticker, e);
                None
            }
        }
    }
}

/// Map the primary OHLCV table onto a record (display name left empty).
pub fn build_record(
    date: NaiveDate,
    ticker: &str,
    table: &Table,
) -> Result<TradingRecord, SkipReason> {
    if table.is_empty() {
        return Err(SkipReason::NoData(date));
    }

    let mut values = [0i64; 5];
    let mut missing = Vec::new();
    for (slot, spec) in values.iter_mut().zip(columns::REQUIRED.iter()) {
        match int_field(table, spec) {
            Some(value) => *slot = value,
            None => missing.push(spec.field),
        }
    }
    if !missing.is_empty() {
        return Err(SkipReason::MissingColumns {
            missing,
            observed: table.columns.clone(),
        });
    }
    let [open, high, low, close, volume] = values;

    Ok(TradingRecord {
        date,
        ticker: ticker.to_string(),
        name: String::new(),
        open,
        high,
        low,
        close,
        volume,
        change_percent: percent_field(table, &columns::CHANGE_PERCENT),
        turnover_value: int_field(table, &columns::TURNOVER_VALUE),
        investor_net: None,
        short_interest: None,
    })
}

/// Investor-class breakdown; `None` when the table has nothing usable
pub fn investor_from_table(table: &Table) -> Option<InvestorNet> {
    if table.is_empty() {
        return None;
    }
    let net = InvestorNet {
        individual: int_field(table, &columns::INDIVIDUAL_NET),
        foreign: int_field(table, &columns::FOREIGN_NET),
        institution: int_field(table, &columns::INSTITUTION_NET),
    };
    (net != InvestorNet::default()).then_some(net)
}

/// Short selling figures; each one degrades on its own
pub fn short_from_table(table: &Table) -> Option<ShortInterest> {
    if table.is_empty() {
        return None;
    }
    let short = ShortInterest {
        quantity: int_field(table, &columns::SHORT_QTY),
        value: int_field(table, &columns::SHORT_VALUE),
        ratio: percent_field(table, &columns::SHORT_RATIO),
    };
    (short != ShortInterest::default()).then_some(short)
}

fn raw_field<'t>(table: &'t Table, spec: &ColumnSpec) -> Option<&'t str> {
    let column = spec.resolve(table)?;
    table.first_value(column)
}

fn int_field(table: &Table, spec: &ColumnSpec) -> Option<i64> {
    raw_field(table, spec).and_then(coerce_int)
}

fn percent_field(table: &Table, spec: &ColumnSpec) -> Option<f64> {
    raw_field(table, spec).and_then(round_percent)
}

/// Parse a provider cell as an integer.
///
/// Thousands separators are ignored; decimal text is truncated toward zero.
/// Blank, `-` and non-finite values fail.
pub fn coerce_int(text: &str) -> Option<i64> {
    let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    if let Ok(value) = cleaned.parse::<i64>() {
        return Some(value);
    }
    let value = cleaned.parse::<f64>().ok().filter(|v| v.is_finite())?.trunc();
    if value < i64::MIN as f64 || value > i64::MAX as f64 {
        return None;
    }
    Some(value as i64)
}

/// Parse a percentage cell and round it to 2 decimals, half away from zero.
///
/// Rounding happens on the decimal text, so `12.345` becomes `12.35` even
/// though the nearest binary float sits just below the midpoint.
pub fn round_percent(text: &str) -> Option<f64> {
    let cleaned = text.trim().trim_end_matches('%').replace(',', "");
    if cleaned.is_empty() {
        return None;
    }
    let decimal = Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()?;
    let rounded = decimal
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()?;
    // avoid rendering "-0"
    Some(if rounded == 0.0 { 0.0 } else { rounded })
}
