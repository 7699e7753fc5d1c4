use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::Client;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

use crate::models::{Config, Table};
use super::{ApiRateLimiter, MarketDataProvider, ProviderError};

const JSON_ENDPOINT: &str = "/comm/bldAttendant/getJsonData.cmd";

const BLD_INDEX_OHLCV: &str = "dbms/MDC/STAT/standard/MDCSTAT00301";
const BLD_STOCK_OHLCV: &str = "dbms/MDC/STAT/standard/MDCSTAT01701";
const BLD_INVESTOR_NET: &str = "dbms/MDC/STAT/standard/MDCSTAT02303";
const BLD_SHORT_SELLING: &str = "dbms/MDC/STAT/srt/MDCSTAT30102";
const BLD_STOCK_FINDER: &str = "dbms/comm/finder/finder_stkisu";

/// Keys the portal uses for the row array, depending on the screen
const ROW_BLOCK_KEYS: &[&str] = &["output", "OutBlock_1", "block1"];

const INDEX_LABELS: &[(&str, &str)] = &[
    ("TRD_DD", "날짜"),
    ("OPNPRC_IDX", "시가"),
    ("HGPRC_IDX", "고가"),
    ("LWPRC_IDX", "저가"),
    ("CLSPRC_IDX", "종가"),
    ("ACC_TRDVOL", "거래량"),
    ("ACC_TRDVAL", "거래대금"),
    ("UPDN_RATE", "등락률"),
    ("MKTCAP", "상장시가총액"),
];

const STOCK_LABELS: &[(&str, &str)] = &[
    ("TRD_DD", "날짜"),
    ("TDD_OPNPRC", "시가"),
    ("TDD_HGPRC", "고가"),
    ("TDD_LWPRC", "저가"),
    ("TDD_CLSPRC", "종가"),
    ("ACC_TRDVOL", "거래량"),
    ("ACC_TRDVAL", "거래대금"),
    ("FLUC_RT", "등락률"),
    ("CMPPREVDD_PRC", "대비"),
    ("MKTCAP", "시가총액"),
    ("LIST_SHRS", "상장주식수"),
];

const INVESTOR_LABELS: &[(&str, &str)] = &[
    ("TRD_DD", "날짜"),
    ("TRDVAL1", "기관합계"),
    ("TRDVAL2", "기타법인"),
    ("TRDVAL3", "개인"),
    ("TRDVAL4", "외국인합계"),
    ("TRDVAL_TOT", "전체"),
];

const SHORT_LABELS: &[(&str, &str)] = &[
    ("TRD_DD", "날짜"),
    ("CVSRTSELL_TRDVOL", "공매도거래량"),
    ("ACC_TRDVOL", "거래량"),
    ("TRDVOL_WT", "비중"),
    ("CVSRTSELL_TRDVAL", "공매도거래대금"),
    ("ACC_TRDVAL", "거래대금"),
    ("TRDVAL_WT", "거래대금비중"),
];

/// Listed security as reported by the stock finder
#[derive(Debug, Clone, PartialEq, Eq)]
struct Listing {
    isin: String,
    name: String,
}

/// KRX data portal client
pub struct KrxClient {
    client: Client,
    base_url: String,
    rate_limiter: ApiRateLimiter,
    listings: Mutex<HashMap<String, Listing>>,
}

impl KrxClient {
    /// Create a new KRX client
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_base_url(&config.krx_base_url, config.rate_limit_per_minute)
    }

    pub fn with_base_url(base_url: &str, rate_limit_per_minute: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (krx-daily-sheets)")
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            rate_limiter: ApiRateLimiter::new(rate_limit_per_minute),
            listings: Mutex::new(HashMap::new()),
        })
    }

    /// POST one portal screen and return its JSON body
    async fn fetch_json(&self, bld: &str, params: &[(&str, String)]) -> Result<Value> {
        let mut form: Vec<(&str, &str)> = vec![("bld", bld)];
        form.extend(params.iter().map(|(k, v)| (*k, v.as_str())));

        self.rate_limiter.wait().await;
        debug!("KRX request {} {:?}", bld, params);

        let response = self
            .client
            .post(format!("{}{}", self.base_url, JSON_ENDPOINT))
            .header(
                "Referer",
                format!("{}/contents/MDC/MDI/mdiLoader", self.base_url),
            )
            .form(&form)
            .send()
            .await
            .with_context(|| format!("KRX request {} failed", bld))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Payload(e.to_string()))?;
        Ok(json)
    }

    /// Fetch one screen and relabel it into a table
    async fn fetch_table(
        &self,
        bld: &str,
        params: &[(&str, String)],
        labels: &[(&str, &str)],
    ) -> Result<Table> {
        let json = self.fetch_json(bld, params).await?;
        let table = table_from_payload(&json, labels)?;
        debug!("KRX {} returned {} rows, columns {:?}", bld, table.rows.len(), table.columns);
        Ok(table)
    }

    /// Resolve a short code (e.g. `005930`) to its listing, cached per client
    async fn listing(&self, ticker: &str) -> Result<Listing> {
        if let Some(listing) = self.listings.lock().await.get(ticker) {
            return Ok(listing.clone());
        }

        let json = self
            .fetch_json(
                BLD_STOCK_FINDER,
                &[
                    ("mktsel", "ALL".to_string()),
                    ("typeNo", "0".to_string()),
                    ("searchText", ticker.to_string()),
                ],
            )
            .await?;

        let listing = row_block(&json)?
            .iter()
            .filter_map(Value::as_object)
            .find(|row| row.get("short_code").map(cell_text).as_deref() == Some(ticker))
            .and_then(|row| {
                Some(Listing {
                    isin: row.get("full_code").map(cell_text)?,
                    name: row.get("codeName").map(cell_text).unwrap_or_default(),
                })
            })
            .ok_or_else(|| ProviderError::UnknownTicker(ticker.to_string()))?;

        self.listings
            .lock()
            .await
            .insert(ticker.to_string(), listing.clone());
        Ok(listing)
    }

    fn day_params(date: NaiveDate) -> Vec<(&'static str, String)> {
        let day = date.format("%Y%m%d").to_string();
        vec![("strtDd", day.clone()), ("endDd", day)]
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for KrxClient {
    async fn index_ohlcv(&self, date: NaiveDate, index_code: &str) -> Result<Table> {
        // "1001" -> group "1", index "001"
        if index_code.len() < 2 || !index_code.is_ascii() {
            return Err(ProviderError::UnknownTicker(index_code.to_string()).into());
        }
        let (group, index) = index_code.split_at(1);
        let mut params = vec![("indIdx", group.to_string()), ("indIdx2", index.to_string())];
        params.extend(Self::day_params(date));
        self.fetch_table(BLD_INDEX_OHLCV, &params, INDEX_LABELS).await
    }

    async fn ohlcv(&self, date: NaiveDate, ticker: &str) -> Result<Table> {
        let listing = self.listing(ticker).await?;
        let mut params = vec![("isuCd", listing.isin), ("adjStkPrc", "2".to_string())];
        params.extend(Self::day_params(date));
        self.fetch_table(BLD_STOCK_OHLCV, &params, STOCK_LABELS).await
    }

    async fn investor_net(&self, date: NaiveDate, ticker: &str) -> Result<Table> {
        let listing = self.listing(ticker).await?;
        let mut params = vec![
            ("isuCd", listing.isin),
            ("inqTpCd", "2".to_string()),
            ("trdVolVal", "2".to_string()),
            ("askBid", "3".to_string()),
        ];
        params.extend(Self::day_params(date));
        self.fetch_table(BLD_INVESTOR_NET, &params, INVESTOR_LABELS).await
    }

    async fn short_selling(&self, date: NaiveDate, ticker: &str) -> Result<Table> {
        let listing = self.listing(ticker).await?;
        let mut params = vec![("isuCd", listing.isin)];
        params.extend(Self::day_params(date));
        self.fetch_table(BLD_SHORT_SELLING, &params, SHORT_LABELS).await
    }

    async fn ticker_name(&self, ticker: &str) -> Result<String> {
        Ok(self.listing(ticker).await?.name)
    }
}

fn row_block(json: &Value) -> Result<&Vec<Value>> {
    ROW_BLOCK_KEYS
        .iter()
        .find_map(|key| json.get(*key).and_then(Value::as_array))
        .ok_or_else(|| ProviderError::Payload("no row block in response".to_string()).into())
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

/// Turn a portal payload into a table with readable labels.
///
/// Known fields come first in label-map order; unrecognised fields follow
/// under their raw code so that new provider columns stay visible.
fn table_from_payload(json: &Value, labels: &[(&str, &str)]) -> Result<Table> {
    let rows: Vec<&Map<String, Value>> = row_block(json)?
        .iter()
        .filter_map(Value::as_object)
        .collect();
    let Some(first) = rows.first() else {
        return Ok(Table::default());
    };

    let mut fields: Vec<(&str, String)> = labels
        .iter()
        .filter(|(code, _)| first.contains_key(*code))
        .map(|(code, label)| (*code, label.to_string()))
        .collect();
    for code in first.keys() {
        if !labels.iter().any(|(known, _)| *known == code.as_str()) {
            fields.push((code.as_str(), code.clone()));
        }
    }

    let columns = fields.iter().map(|(_, label)| label.clone()).collect();
    let rows = rows
        .iter()
        .map(|row| {
            fields
                .iter()
                .map(|(code, _)| row.get(*code).map(cell_text).unwrap_or_default())
                .collect()
        })
        .collect();
    Ok(Table::new(columns, rows))
}
