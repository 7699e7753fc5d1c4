use anyhow::Result;
use chrono::NaiveDate;
use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use thiserror::Error;

use crate::models::Table;

pub mod krx_client;
pub use krx_client::KrxClient;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Request budget shared by every call a client makes
#[derive(Clone)]
pub struct ApiRateLimiter {
    limiter: Arc<DirectRateLimiter>,
}

impl ApiRateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: Arc::new(RateLimiter::direct(Quota::per_minute(per_minute))),
        }
    }

    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }
}

/// Provider-side failures worth telling apart from transport errors
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected payload: {0}")]
    Payload(String),
    #[error("unknown ticker {0}")]
    UnknownTicker(String),
}

/// Source of daily market tables.
///
/// Every table comes back with human-readable column labels; which labels
/// exactly is up to the provider and may change between releases.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Daily OHLCV of a market index for a single day
    async fn index_ohlcv(&self, date: NaiveDate, index_code: &str) -> Result<Table>;

    /// Daily OHLCV of one security for a single day
    async fn ohlcv(&self, date: NaiveDate, ticker: &str) -> Result<Table>;

    /// Net buy value per investor class for a single day
    async fn investor_net(&self, date: NaiveDate, ticker: &str) -> Result<Table>;

    /// Short selling volume/value for a single day
    async fn short_selling(&self, date: NaiveDate, ticker: &str) -> Result<Table>;

    /// Display name of a security
    async fn ticker_name(&self, ticker: &str) -> Result<String>;
}
