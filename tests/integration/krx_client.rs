//! KRX data portal client against a mocked portal

use krx_daily_sheets::api::{KrxClient, MarketDataProvider, ProviderError};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::fixtures::date;
use crate::common::logging::{init_test_logging, log_test_step};

const ENDPOINT: &str = "/comm/bldAttendant/getJsonData.cmd";

/// Stock finder answering for 082270
pub async fn mount_finder(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(body_string_contains("finder_stkisu"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "block1": [
                { "full_code": "KR7082271005", "short_code": "082271", "codeName": "다른종목" },
                { "full_code": "KR7082270007", "short_code": "082270", "codeName": "젬백스" }
            ]
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

pub async fn mount_stock_ohlcv(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(body_string_contains("MDCSTAT01701"))
        .and(body_string_contains("isuCd=KR7082270007"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "output": [{
                "TRD_DD": "2025/09/26",
                "TDD_CLSPRC": "10,500",
                "CMPPREVDD_PRC": "500",
                "FLUC_RT": "5.00",
                "TDD_OPNPRC": "10,000",
                "TDD_HGPRC": "10,800",
                "TDD_LWPRC": "9,900",
                "ACC_TRDVOL": "123,456",
                "ACC_TRDVAL": "1,290,000,000",
                "FLUC_TP_CD": "1"
            }],
            "CURRENT_DATETIME": "2025.09.27 AM 10:00:00"
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_ohlcv_is_relabelled_and_listing_cached() {
    init_test_logging();
    log_test_step("Fetching OHLCV twice through the portal client");

    let server = MockServer::start().await;
    mount_finder(&server, 1).await;
    mount_stock_ohlcv(&server).await;

    let client = KrxClient::with_base_url(&server.uri(), 6000).unwrap();
    let day = date(2025, 9, 26);

    let table = client.ohlcv(day, "082270").await.unwrap();
    assert_eq!(
        table.columns,
        vec!["날짜", "시가", "고가", "저가", "종가", "거래량", "거래대금", "등락률", "대비", "FLUC_TP_CD"]
    );
    assert_eq!(table.first_value("종가"), Some("10,500"));

    // second call reuses the cached listing; the finder mock expects one hit
    client.ohlcv(day, "082270").await.unwrap();
    assert_eq!(client.ticker_name("082270").await.unwrap(), "젬백스");
}

#[tokio::test]
async fn test_index_query_splits_code_and_sends_day() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(header_exists("referer"))
        .and(body_string_contains("MDCSTAT00301"))
        .and(body_string_contains("indIdx=1"))
        .and(body_string_contains("indIdx2=001"))
        .and(body_string_contains("strtDd=20250926"))
        .and(body_string_contains("endDd=20250926"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "output": [{ "TRD_DD": "2025/09/26", "CLSPRC_IDX": "3,386.05" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = KrxClient::with_base_url(&server.uri(), 6000).unwrap();
    let table = client.index_ohlcv(date(2025, 9, 26), "1001").await.unwrap();

    assert_eq!(table.columns, vec!["날짜", "종가"]);
    assert!(!table.is_empty());
}

#[tokio::test]
async fn test_unknown_ticker_is_reported() {
    let server = MockServer::start().await;
    mount_finder(&server, 1).await;

    let client = KrxClient::with_base_url(&server.uri(), 6000).unwrap();
    let err = client.ohlcv(date(2025, 9, 26), "999999").await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ProviderError>(),
        Some(ProviderError::UnknownTicker(t)) if t == "999999"
    ));
}

#[tokio::test]
async fn test_http_error_status_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let client = KrxClient::with_base_url(&server.uri(), 6000).unwrap();
    let err = client
        .index_ohlcv(date(2025, 9, 26), "1001")
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ProviderError>(),
        Some(ProviderError::Status { status: 503, .. })
    ));
}
