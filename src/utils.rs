use chrono::{Duration, NaiveDate};
use tracing::{debug, info, warn};

use crate::api::MarketDataProvider;

/// Days inspected before giving up on finding a trading day
pub const MAX_LOOKBACK_DAYS: u32 = 20;

/// Market calendar backed by a reference index: a day is a trading day when
/// the index has at least one price row for it.
pub struct MarketCalendar<'a> {
    provider: &'a dyn MarketDataProvider,
    reference_index: String,
}

impl<'a> MarketCalendar<'a> {
    pub fn new(provider: &'a dyn MarketDataProvider, reference_index: impl Into<String>) -> Self {
        Self {
            provider,
            reference_index: reference_index.into(),
        }
    }

    /// Check whether the reference index traded on `date`; query errors count as "no"
    pub async fn is_trading_day(&self, date: NaiveDate) -> bool {
        match self.provider.index_ohlcv(date, &self.reference_index).await {
            Ok(table) => !table.is_empty(),
            Err(e) => {
                debug!("Index query for {} failed, treating as closed: {:#}", date, e);
                false
            }
        }
    }

    /// Get the most recent trading day on or before `base`.
    ///
    /// Walks back one calendar day at a time for at most
    /// [`MAX_LOOKBACK_DAYS`] days. If none of them traded, the last date tried
    /// is returned so the run can continue; per-ticker fetches will then find
    /// nothing and skip.
    pub async fn locate(&self, base: NaiveDate) -> NaiveDate {
        let mut current_date = base;

        for attempt in 0..MAX_LOOKBACK_DAYS {
            if self.is_trading_day(current_date).await {
                if current_date != base {
                    info!("📅 {} is not a trading day, using {}", base, current_date);
                }
                return current_date;
            }
            if attempt + 1 < MAX_LOOKBACK_DAYS {
                current_date = current_date - Duration::days(1);
            }
        }

        warn!(
            "No trading day found within {} days of {}, falling back to {}",
            MAX_LOOKBACK_DAYS, base, current_date
        );
        current_date
    }
}
