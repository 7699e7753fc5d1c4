use anyhow::Result;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use krx_daily_sheets::api::KrxClient;
use krx_daily_sheets::daily_sync::run_daily_sync;
use krx_daily_sheets::models::{Config, Destination};
use krx_daily_sheets::sheets::{CsvWorkbook, GoogleSheetsClient, Workbook};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize logging; RUST_LOG overrides the default filter
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("krx_daily_sheets=info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("tracing subscriber already set");
    }

    // The scheduler only ever sees success; problems end up in the log
    if let Err(e) = run().await {
        error!("❌ Daily sync aborted: {:#}", e);
    }
}

async fn run() -> Result<()> {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("❌ Configuration error: {}", e);
            return Ok(());
        }
    };
    info!("📋 Configuration loaded ({} tickers)", config.tickers.len());

    let provider = KrxClient::new(&config)?;
    let workbook: Box<dyn Workbook> = match &config.destination {
        Destination::GoogleSheets {
            service_account_json,
            spreadsheet_id,
        } => Box::new(GoogleSheetsClient::from_service_account_json(
            service_account_json,
            spreadsheet_id,
        )?),
        Destination::Csv { dir } => {
            info!("📁 Writing CSV sheets under {}", dir);
            Box::new(CsvWorkbook::new(dir)?)
        }
    };

    let summary = run_daily_sync(&config, &provider, workbook.as_ref()).await?;
    info!(
        "🎉 Done: {} assembled, {} skipped, {} failed, {} appended",
        summary.assembled, summary.skipped, summary.failed, summary.appended
    );
    Ok(())
}
