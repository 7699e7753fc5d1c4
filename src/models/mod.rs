use chrono::{Local, NaiveDate};
use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// One ticker's end-of-day snapshot for one trading day
#[derive(Debug, Clone, PartialEq)]
pub struct TradingRecord {
    pub date: NaiveDate,
    pub ticker: String,
    pub name: String,
    pub open: i64,
    pub high: i64,
    pub low: i64,
    pub close: i64,
    pub volume: i64,
    pub change_percent: Option<f64>,
    pub turnover_value: Option<i64>,
    pub investor_net: Option<InvestorNet>,
    pub short_interest: Option<ShortInterest>,
}

/// Net buy amount per investor class (signed, KRW)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvestorNet {
    pub individual: Option<i64>,
    pub foreign: Option<i64>,
    pub institution: Option<i64>,
}

/// Short selling activity for the day
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShortInterest {
    pub quantity: Option<i64>,
    pub value: Option<i64>,
    pub ratio: Option<f64>,
}

impl TradingRecord {
    /// ISO date string, also the per-ticker dedup key
    pub fn date_key(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    /// Typed cell for one canonical header label.
    ///
    /// Absent values are [`Cell::Empty`] so they can never be confused with
    /// a real zero.
    pub fn cell(&self, label: &str) -> Cell {
        let investor = self.investor_net.as_ref();
        let short = self.short_interest.as_ref();
        match label {
            "date" => Cell::Text(self.date_key()),
            "ticker" => Cell::Text(self.ticker.clone()),
            "name" => Cell::Text(self.name.clone()),
            "open" => Cell::Int(self.open),
            "high" => Cell::Int(self.high),
            "low" => Cell::Int(self.low),
            "close" => Cell::Int(self.close),
            "volume" => Cell::Int(self.volume),
            "changePercent" => self.change_percent.into(),
            "turnoverValue" | "value" => self.turnover_value.into(),
            "individualNet" | "net_individual" => investor.and_then(|i| i.individual).into(),
            "foreignNet" | "net_foreign" => investor.and_then(|i| i.foreign).into(),
            "institutionNet" | "net_institution" => investor.and_then(|i| i.institution).into(),
            "shortQty" | "short_qty" => short.and_then(|s| s.quantity).into(),
            "shortValue" | "short_value" => short.and_then(|s| s.value).into(),
            "shortRatio" | "short_ratio" => short.and_then(|s| s.ratio).into(),
            _ => Cell::Empty,
        }
    }

    /// Serialize into the given header order
    pub fn to_row(&self, header: &[String]) -> Vec<Cell> {
        header.iter().map(|label| self.cell(label)).collect()
    }
}

/// One written cell. Numbers stay numbers so spreadsheet destinations store
/// them as number cells rather than text.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
}

impl Cell {
    /// Row of text cells, e.g. a header
    pub fn text_row(values: &[String]) -> Vec<Cell> {
        values.iter().map(|v| Cell::Text(v.clone())).collect()
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<Option<i64>> for Cell {
    fn from(value: Option<i64>) -> Self {
        value.map_or(Cell::Empty, Cell::Int)
    }
}

impl From<Option<f64>> for Cell {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Cell::Empty, Cell::Float)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => f.write_str(s),
            Cell::Int(v) => write!(f, "{}", v),
            Cell::Float(v) => write!(f, "{}", v),
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Empty => serializer.serialize_str(""),
            Cell::Text(s) => serializer.serialize_str(s),
            Cell::Int(v) => serializer.serialize_i64(*v),
            Cell::Float(v) => serializer.serialize_f64(*v),
        }
    }
}

/// Provider result table: ordered column labels plus text cells
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }

    /// Build a one-row table from `(label, value)` pairs
    pub fn single_row(pairs: &[(&str, &str)]) -> Self {
        Self {
            columns: pairs.iter().map(|(label, _)| label.to_string()).collect(),
            rows: vec![pairs.iter().map(|(_, value)| value.to_string()).collect()],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell of the first row under `column`
    pub fn first_value(&self, column: &str) -> Option<&str> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.rows.first()?.get(index).map(String::as_str)
    }
}

/// Per-ticker sheet column set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetVariant {
    Minimal,
    Full,
}

/// How records are laid out across sheets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetLayout {
    /// One sheet per ticker titled `"<ticker> <name>"`, keyed by date
    PerTicker(SheetVariant),
    /// One shared sheet, keyed by date and ticker
    SingleLog { title: String },
}

const MINIMAL_HEADER: &[&str] = &[
    "date", "ticker", "name", "open", "high", "low", "close", "volume", "changePercent",
];

const FULL_EXTRA_HEADER: &[&str] = &[
    "turnoverValue",
    "individualNet",
    "foreignNet",
    "institutionNet",
    "shortQty",
    "shortValue",
    "shortRatio",
];

const LOG_HEADER: &[&str] = &[
    "date",
    "ticker",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "value",
    "net_individual",
    "net_foreign",
    "net_institution",
    "short_qty",
    "short_value",
    "short_ratio",
];

impl SheetLayout {
    /// Canonical header row for this layout
    pub fn header(&self) -> Vec<String> {
        let labels: Vec<&str> = match self {
            SheetLayout::PerTicker(SheetVariant::Minimal) => MINIMAL_HEADER.to_vec(),
            SheetLayout::PerTicker(SheetVariant::Full) => {
                MINIMAL_HEADER.iter().chain(FULL_EXTRA_HEADER).copied().collect()
            }
            SheetLayout::SingleLog { .. } => LOG_HEADER.to_vec(),
        };
        labels.into_iter().map(str::to_string).collect()
    }

    /// Destination sheet title for a record
    pub fn sheet_title(&self, ticker: &str, name: &str) -> String {
        match self {
            SheetLayout::PerTicker(_) => {
                if name.trim().is_empty() {
                    ticker.to_string()
                } else {
                    format!("{} {}", ticker, name).trim().to_string()
                }
            }
            SheetLayout::SingleLog { title } => title.clone(),
        }
    }

    pub fn key_mode(&self) -> KeyMode {
        match self {
            SheetLayout::PerTicker(_) => KeyMode::Date,
            SheetLayout::SingleLog { .. } => KeyMode::DateTicker,
        }
    }
}

/// Which leading columns make up the dedup key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMode {
    Date,
    DateTicker,
}

impl KeyMode {
    pub const SEPARATOR: char = '|';

    /// Key of an already persisted body row; `None` for rows too short or blank
    pub fn row_key(&self, row: &[String]) -> Option<String> {
        match self {
            KeyMode::Date => row.first().filter(|d| !d.is_empty()).cloned(),
            KeyMode::DateTicker => {
                let date = row.first().filter(|d| !d.is_empty())?;
                let ticker = row.get(1)?;
                Some(format!("{}{}{}", date, Self::SEPARATOR, ticker))
            }
        }
    }

    pub fn record_key(&self, record: &TradingRecord) -> String {
        match self {
            KeyMode::Date => record.date_key(),
            KeyMode::DateTicker => {
                format!("{}{}{}", record.date_key(), Self::SEPARATOR, record.ticker)
            }
        }
    }
}

/// Where rows end up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    GoogleSheets {
        service_account_json: String,
        spreadsheet_id: String,
    },
    /// Local directory with one CSV file per sheet
    Csv { dir: String },
}

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable required")]
    Missing(&'static str),
    #[error("invalid {key} value: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("no tickers configured")]
    NoTickers,
}

const DEFAULT_TICKERS: &str = "082270,358570,000250";

/// Configuration for the application
#[derive(Debug, Clone)]
pub struct Config {
    pub destination: Destination,
    pub tickers: Vec<String>,
    pub run_date: Option<NaiveDate>,
    pub layout: SheetLayout,
    pub include_investor: bool,
    pub include_short: bool,
    pub reference_index: String,
    pub krx_base_url: String,
    pub rate_limit_per_minute: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if it exists
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup; blank values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let destination = match get("DESTINATION").as_deref().unwrap_or("google") {
            "google" => Destination::GoogleSheets {
                service_account_json: get("GOOGLE_SERVICE_ACCOUNT_JSON")
                    .ok_or(ConfigError::Missing("GOOGLE_SERVICE_ACCOUNT_JSON"))?,
                spreadsheet_id: get("SPREADSHEET_ID")
                    .ok_or(ConfigError::Missing("SPREADSHEET_ID"))?,
            },
            "csv" => Destination::Csv {
                dir: get("CSV_OUTPUT_DIR").unwrap_or_else(|| "sheets".to_string()),
            },
            other => {
                return Err(ConfigError::Invalid {
                    key: "DESTINATION",
                    value: other.to_string(),
                })
            }
        };

        let tickers: Vec<String> = get("TICKERS")
            .unwrap_or_else(|| DEFAULT_TICKERS.to_string())
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if tickers.is_empty() {
            return Err(ConfigError::NoTickers);
        }

        let run_date = match get("RUN_DATE") {
            Some(value) => Some(NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(|_| {
                ConfigError::Invalid {
                    key: "RUN_DATE",
                    value,
                }
            })?),
            None => None,
        };

        let layout = match get("LOG_SHEET_NAME") {
            Some(title) => SheetLayout::SingleLog { title },
            None => match get("SHEET_VARIANT").as_deref().unwrap_or("minimal") {
                "minimal" => SheetLayout::PerTicker(SheetVariant::Minimal),
                "full" => SheetLayout::PerTicker(SheetVariant::Full),
                other => {
                    return Err(ConfigError::Invalid {
                        key: "SHEET_VARIANT",
                        value: other.to_string(),
                    })
                }
            },
        };

        let rate_limit_per_minute = match get("RATE_LIMIT_PER_MINUTE") {
            Some(value) => value
                .parse::<u32>()
                .ok()
                .filter(|v| *v > 0)
                .ok_or(ConfigError::Invalid {
                    key: "RATE_LIMIT_PER_MINUTE",
                    value,
                })?,
            None => 120,
        };

        Ok(Config {
            destination,
            tickers,
            run_date,
            layout,
            include_investor: parse_flag("INCLUDE_INVESTOR", get("INCLUDE_INVESTOR"), true)?,
            include_short: parse_flag("INCLUDE_SHORT", get("INCLUDE_SHORT"), true)?,
            reference_index: get("REFERENCE_INDEX").unwrap_or_else(|| "1001".to_string()),
            krx_base_url: get("KRX_BASE_URL")
                .unwrap_or_else(|| "http://data.krx.co.kr".to_string()),
            rate_limit_per_minute,
        })
    }

    /// Explicit run date, or today in local time
    pub fn base_date(&self) -> NaiveDate {
        self.run_date.unwrap_or_else(|| Local::now().date_naive())
    }
}

fn parse_flag(
    key: &'static str,
    value: Option<String>,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid { key, value }),
    }
}
