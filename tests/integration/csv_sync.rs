//! Full daily runs into a CSV workbook

use krx_daily_sheets::api::KrxClient;
use krx_daily_sheets::daily_sync::run_daily_sync;
use krx_daily_sheets::models::{Cell, SheetLayout, SheetVariant};
use krx_daily_sheets::sheets::{CsvWorkbook, Workbook};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::krx_client::{mount_finder, mount_stock_ohlcv};
use crate::common::api_mock::ScriptedProvider;
use crate::common::fixtures::{self, csv_config, date};
use crate::common::logging::{init_test_logging, log_test_data, log_test_step};

fn dir_str(dir: &TempDir) -> String {
    dir.path().to_string_lossy().to_string()
}

#[tokio::test]
async fn test_weekend_run_writes_friday_row() {
    init_test_logging();
    log_test_step("Weekend base date against the mocked portal");

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/comm/bldAttendant/getJsonData.cmd"))
        .and(body_string_contains("MDCSTAT00301"))
        .and(body_string_contains("strtDd=20250926"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "output": [{ "TRD_DD": "2025/09/26", "CLSPRC_IDX": "3,386.05" }]
        })))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/comm/bldAttendant/getJsonData.cmd"))
        .and(body_string_contains("MDCSTAT00301"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "output": [] })))
        .mount(&server)
        .await;
    mount_finder(&server, 1).await;
    mount_stock_ohlcv(&server).await;
    // enrichment screens are down; the row must still be written
    Mock::given(method("POST"))
        .and(path("/comm/bldAttendant/getJsonData.cmd"))
        .and(body_string_contains("MDCSTAT02303"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/comm/bldAttendant/getJsonData.cmd"))
        .and(body_string_contains("MDCSTAT30102"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "OutBlock_1": [] })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = csv_config(
        &dir_str(&dir),
        &["082270"],
        date(2025, 9, 28), // Sunday
        SheetLayout::PerTicker(SheetVariant::Full),
    );
    config.krx_base_url = server.uri();

    let provider = KrxClient::new(&config).unwrap();
    let workbook = CsvWorkbook::new(dir.path()).unwrap();
    let summary = run_daily_sync(&config, &provider, &workbook).await.unwrap();
    log_test_data("Summary", &summary);

    assert_eq!(summary.trading_day, Some(date(2025, 9, 26)));
    assert_eq!(summary.appended, 1);

    let rows = workbook.read_all("082270 젬백스").await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0], config.layout.header());
    assert_eq!(
        rows[1],
        vec![
            "2025-09-26", "082270", "젬백스", "10000", "10800", "9900", "10500", "123456", "5",
            "1290000000", "", "", "", "", "", "",
        ]
    );
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    init_test_logging();
    let friday = date(2025, 9, 26);
    let provider = ScriptedProvider::new()
        .trading_day(friday)
        .ticker("082270", "젬백스", fixtures::ohlcv_table("10,500"))
        .ticker("358570", "지아이이노베이션", fixtures::ohlcv_table("20,000"));

    let dir = TempDir::new().unwrap();
    let config = csv_config(
        &dir_str(&dir),
        &["082270", "358570"],
        friday,
        SheetLayout::SingleLog {
            title: "daily_log".to_string(),
        },
    );
    let workbook = CsvWorkbook::new(dir.path()).unwrap();

    let first = run_daily_sync(&config, &provider, &workbook).await.unwrap();
    assert_eq!(first.appended, 2);

    let second = run_daily_sync(&config, &provider, &workbook).await.unwrap();
    assert_eq!(second.assembled, 2);
    assert_eq!(second.appended, 0);

    let rows = workbook.read_all("daily_log").await.unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1][1], "082270");
    assert_eq!(rows[2][1], "358570");
    assert_eq!(rows[2][5], "20000");
}

#[tokio::test]
async fn test_header_drift_is_repaired_and_body_kept() {
    let friday = date(2025, 9, 26);
    let provider = ScriptedProvider::new()
        .trading_day(friday)
        .ticker("082270", "젬백스", fixtures::ohlcv_table("10,500"));

    let dir = TempDir::new().unwrap();
    let config = csv_config(
        &dir_str(&dir),
        &["082270"],
        friday,
        SheetLayout::PerTicker(SheetVariant::Minimal),
    );
    let workbook = CsvWorkbook::new(dir.path()).unwrap();

    let stale_header: Vec<String> = ["Date", "Close"].iter().map(|s| s.to_string()).collect();
    let old_row: Vec<String> = ["2025-09-25", "10000"].iter().map(|s| s.to_string()).collect();
    workbook.open_or_create("082270 젬백스", 2).await.unwrap();
    workbook
        .append_rows(
            "082270 젬백스",
            &[Cell::text_row(&stale_header), Cell::text_row(&old_row)],
        )
        .await
        .unwrap();

    let summary = run_daily_sync(&config, &provider, &workbook).await.unwrap();
    assert_eq!(summary.appended, 1);

    let rows = workbook.read_all("082270 젬백스").await.unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0], config.layout.header());
    assert_eq!(rows[1], old_row);
    assert_eq!(rows[2][0], "2025-09-26");
    assert_eq!(rows[2][8], "12.35");
}

#[tokio::test]
async fn test_failed_ticker_does_not_block_others() {
    let friday = date(2025, 9, 26);
    let provider = ScriptedProvider::new()
        .trading_day(friday)
        .failing_ticker("000250")
        .ticker("082270", "젬백스", fixtures::ohlcv_table("10,500"));

    let dir = TempDir::new().unwrap();
    let config = csv_config(
        &dir_str(&dir),
        &["082270", "000250", "358570"],
        friday,
        SheetLayout::PerTicker(SheetVariant::Minimal),
    );
    let workbook = CsvWorkbook::new(dir.path()).unwrap();

    let summary = run_daily_sync(&config, &provider, &workbook).await.unwrap();

    assert_eq!(summary.assembled, 1);
    assert_eq!(summary.failed, 1);
    // 358570 has no scripted table, so it is a no-data skip
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.appended, 1);
    assert!(workbook.sheet_path("082270 젬백스").exists());
    assert!(!workbook.sheet_path("000250").exists());
}
