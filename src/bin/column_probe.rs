use anyhow::Result;
use krx_daily_sheets::api::{KrxClient, MarketDataProvider};
use krx_daily_sheets::columns::{self, ColumnSpec};
use krx_daily_sheets::models::{Config, Table};
use krx_daily_sheets::utils::MarketCalendar;
use tracing::{info, warn, Level};

const OHLCV_SPECS: &[ColumnSpec] = &[
    columns::OPEN,
    columns::HIGH,
    columns::LOW,
    columns::CLOSE,
    columns::VOLUME,
    columns::TURNOVER_VALUE,
    columns::CHANGE_PERCENT,
];
const INVESTOR_SPECS: &[ColumnSpec] = &[
    columns::INDIVIDUAL_NET,
    columns::FOREIGN_NET,
    columns::INSTITUTION_NET,
];
const SHORT_SPECS: &[ColumnSpec] = &[columns::SHORT_QTY, columns::SHORT_VALUE, columns::SHORT_RATIO];

fn report(ticker: &str, screen: &str, table: Result<Table>, specs: &[ColumnSpec]) {
    let table = match table {
        Ok(table) => table,
        Err(e) => {
            warn!("❌ {} {}: query failed: {:#}", ticker, screen, e);
            return;
        }
    };
    info!("📊 {} {}: {} rows, observed={:?}", ticker, screen, table.rows.len(), table.columns);
    for spec in specs {
        match spec.resolve(&table) {
            Some(label) => info!("   {:<15} -> {}", spec.field, label),
            None => info!("   {:<15} -> unresolved", spec.field),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    info!("🧪 Probing KRX column labels");

    let config = Config::from_env()?;
    let client = KrxClient::new(&config)?;

    let calendar = MarketCalendar::new(&client, config.reference_index.as_str());
    let day = calendar.locate(config.base_date()).await;
    info!("📅 Trading day: {}", day);

    for ticker in &config.tickers {
        report(ticker, "ohlcv", client.ohlcv(day, ticker).await, OHLCV_SPECS);
        report(ticker, "investor", client.investor_net(day, ticker).await, INVESTOR_SPECS);
        report(ticker, "short", client.short_selling(day, ticker).await, SHORT_SPECS);
    }

    info!("🎉 Probe completed");
    Ok(())
}
