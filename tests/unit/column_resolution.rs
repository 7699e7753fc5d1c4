//! Column label normalization and resolution

use krx_daily_sheets::columns::{self, normalize, resolve};
use krx_daily_sheets::models::Table;
use pretty_assertions::assert_eq;
use test_log::test;

fn table(columns: &[&str]) -> Table {
    Table::new(columns.iter().map(|c| c.to_string()).collect(), Vec::new())
}

#[test]
fn test_normalize_ignores_units_and_punctuation() {
    assert_eq!(normalize(Some("거래대금(원)")), normalize(Some("거래대금")));
    assert_eq!(normalize(Some("등락률 (%)")), normalize(Some("등락률")));
    assert_eq!(normalize(Some("외국인_합계")), "외국인합계");
    assert_ne!(normalize(Some("종가")), normalize(Some("시가")));
}

#[test]
fn test_exact_match_beats_earlier_normalized_candidate() {
    // "bar" appears first in the table, but "foo" is an exact member
    let t = table(&["bar", "foo"]);
    assert_eq!(resolve(&t, &["foo", "bar"]), Some("foo"));

    // normalized tier only kicks in when nothing matches exactly
    let t = table(&["bar", "foo(원)"]);
    assert_eq!(resolve(&t, &["baz", "foo"]), Some("foo(원)"));
}

#[test]
fn test_resolution_is_order_stable() {
    let t = table(&["거래대금(원)", "거래대금 합계", "거래량"]);
    let first = resolve(&t, &["거래대금"]);
    for _ in 0..10 {
        assert_eq!(resolve(&t, &["거래대금"]), first);
    }
    assert_eq!(first, Some("거래대금(원)"));
}

#[test]
fn test_substring_tier_uses_candidate_then_table_order() {
    let t = table(&["순매수 개인", "개인 순매수(원)"]);
    assert_eq!(resolve(&t, &["개인"]), Some("순매수 개인"));

    let t = table(&["공매도거래대금 합계", "공매도거래량 합계"]);
    assert_eq!(columns::SHORT_QTY.resolve(&t), Some("공매도거래량 합계"));
    assert_eq!(columns::SHORT_VALUE.resolve(&t), Some("공매도거래대금 합계"));
}

#[test]
fn test_unmatched_field_is_absent() {
    let t = table(&["날짜", "시가", "고가"]);
    assert_eq!(columns::VOLUME.resolve(&t), None);
    assert_eq!(resolve(&t, &[]), None);
}

#[test]
fn test_investor_labels_fall_back_to_short_forms() {
    let t = table(&["기관", "개인", "외국인"]);
    assert_eq!(columns::FOREIGN_NET.resolve(&t), Some("외국인"));
    assert_eq!(columns::INSTITUTION_NET.resolve(&t), Some("기관"));

    let t = table(&["외국인", "외국인합계"]);
    assert_eq!(columns::FOREIGN_NET.resolve(&t), Some("외국인합계"));
}
