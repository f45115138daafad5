//! End-to-end reconciliation through the public API: scrape, discover the
//! expanded position, match it, fold the history, then scan the result.

use chrono::{DateTime, Duration, TimeZone, Utc};

use clm_reconciler::analysis::{scan_anomalies, summarize, AnomalyThresholds};
use clm_reconciler::matching::{match_position, PositionMatch};
use clm_reconciler::models::{Observation, PositionKey, ScrapedPosition, VisionExtraction};
use clm_reconciler::reconcile::reconcile_all;
use clm_reconciler::vision::parse_response;

fn t(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 3, 7, 0, 0).unwrap() + Duration::minutes(minutes)
}

fn scrape(pair: &str, balance: f64, at: DateTime<Utc>) -> ScrapedPosition {
    ScrapedPosition {
        protocol: "aerodrome".to_string(),
        pair: pair.to_string(),
        token0: None,
        token1: None,
        balance: Some(balance),
        pending_yield: Some(0.8),
        apy: Some(42.0),
        range_min: Some(98_000.0),
        range_max: Some(112_000.0),
        current_price: Some(104_500.0),
        in_range: Some(true),
        captured_at: at,
    }
}

#[test]
fn test_breakdown_survives_later_plain_scrapes() {
    let t1 = t(0);
    let t2 = t(10);
    let t2_5 = t(15);
    let t3 = t(20);

    let second_capture = vec![scrape("SOL/USDC", 120.0, t2), scrape("cbBTC/USDC0", 9810.0, t2)];

    // the model reports the expanded row with its own spelling
    let answer = r#"{"expanded": true, "pair": "WBTC/USDC", "token0Amount": 0.035,
        "token1Amount": "6,409", "token0Percentage": 36.4, "token1Percentage": 63.6}"#;
    let extraction = parse_response(answer, t2_5).unwrap();
    let breakdown = extraction.breakdown().unwrap().clone();

    let matched = match_position(&breakdown, &second_capture);
    assert_eq!(matched, PositionMatch::Exact(&second_capture[1]));
    let matched_position = matched.position().unwrap().clone();

    let history = vec![
        Observation::scrape(scrape("cbBTC/USDC0", 9700.0, t1)),
        Observation::scrape(second_capture[1].clone()),
        Observation::enriched(matched_position, matched.aligned(&breakdown).unwrap()),
        Observation::scrape(scrape("cbBTC/USDC0", 9925.0, t3)),
        Observation::scrape(second_capture[0].clone()),
    ];

    let canonical = reconcile_all(&history);
    let btc = &canonical[&PositionKey::new("aerodrome", "BTC/USDC")];

    assert_eq!(btc.captured_at, t3);
    assert_eq!(btc.balance, Some(9925.0));
    assert_eq!(btc.token0_amount, Some(0.035));
    assert_eq!(btc.token1_amount, Some(6409.0));
    assert_eq!(btc.breakdown_at, Some(t2_5));
    assert!(btc.has_breakdown);

    let sol = &canonical[&PositionKey::new("aerodrome", "SOL/USDC")];
    assert!(!sol.has_breakdown);

    // replaying the same history yields the same state
    assert_eq!(reconcile_all(&history), canonical);

    let positions: Vec<_> = canonical.values().cloned().collect();
    let summary = summarize(&positions, 1);
    assert_eq!(summary.position_count, 2);
    assert_eq!(summary.missing_breakdown, 1);
    assert_eq!(summary.top_positions[0].pair, "BTC/USDC");
    assert!(scan_anomalies(&positions, &AnomalyThresholds::default()).is_empty());
}

#[test]
fn test_unexpanded_screenshot_never_lands_on_a_position() {
    let capture = vec![scrape("SOL/USDC", 120.0, t(0))];

    let extraction = parse_response(r#"{"expanded": false}"#, t(1)).unwrap();
    assert_eq!(extraction, VisionExtraction::NothingExpanded);
    assert!(!clm_reconciler::match_extraction(&extraction, &capture).is_matched());

    let foreign = parse_response(r#"{"pair": "ETH/BTC", "token0Amount": 1, "token1Amount": 2}"#, t(1)).unwrap();
    assert!(!clm_reconciler::match_extraction(&foreign, &capture).is_matched());

    let history = vec![Observation::scrape(capture[0].clone())];
    let canonical = reconcile_all(&history);
    assert!(canonical.values().all(|p| !p.has_breakdown));
}
