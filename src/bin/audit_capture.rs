use anyhow::{Context, Result};
use std::env;
use std::fs;

use clm_reconciler::analysis::{scan_anomalies, summarize};
use clm_reconciler::config;
use clm_reconciler::models::Capture;
use clm_reconciler::utils::{format_optional, format_usd};

/// Offline summary and anomaly scan of a capture file, no database involved
fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let path = env::args()
        .nth(1)
        .context("Usage: audit_capture <capture.json>")?;
    let text = fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path))?;
    let capture: Capture = serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path))?;
    let config = config::load_config()?;

    let positions = capture.positions();

    println!("Capture: {} at {}", capture.protocol, capture.captured_at);
    for position in &positions {
        println!(
            "  {:<16} {:>14}  apy {:>8}  range {} .. {}",
            position.pair,
            position.balance.map(format_usd).unwrap_or_else(|| "-".to_string()),
            format_optional(position.apy, 2),
            format_optional(position.range_min, 4),
            format_optional(position.range_max, 4),
        );
    }

    println!();
    println!("{}", summarize(&positions, config.report_top_n).render());

    let findings = scan_anomalies(&positions, &config.anomaly_thresholds());
    println!();
    if findings.is_empty() {
        println!("No anomalies found");
    } else {
        println!("Anomalies:");
        for finding in &findings {
            println!("  - {}", finding);
        }
    }

    Ok(())
}
