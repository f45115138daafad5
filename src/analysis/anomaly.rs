use crate::analysis::PositionView;
use crate::reconcile::DEFAULT_PERCENTAGE_TOLERANCE;

/// Limits above which a value is reported as suspicious
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnomalyThresholds {
    /// APY in percent
    pub max_apy: f64,
    /// Percentage points a token split may exceed 100 by
    pub percentage_tolerance: f64,
}

impl Default for AnomalyThresholds {
    fn default() -> Self {
        Self {
            max_apy: 1000.0,
            percentage_tolerance: DEFAULT_PERCENTAGE_TOLERANCE,
        }
    }
}

/// Human-readable findings for values that look like scrape or OCR errors
pub fn scan_anomalies<P: PositionView>(positions: &[P], thresholds: &AnomalyThresholds) -> Vec<String> {
    let mut findings = Vec::new();

    for position in positions {
        let pair = position.pair();

        if let Some(apy) = position.apy() {
            if apy > thresholds.max_apy {
                findings.push(format!(
                    "{}: APY {:.2}% exceeds {:.2}% threshold",
                    pair, apy, thresholds.max_apy
                ));
            }
        }

        if let Some(balance) = position.balance() {
            if balance < 0.0 {
                findings.push(format!("{}: negative balance {:.2}", pair, balance));
            }
        }

        match position.range() {
            (Some(min), Some(max)) if min > max => {
                findings.push(format!("{}: range min {} is above range max {}", pair, min, max));
            }
            (Some(min), Some(max)) => {
                if let (Some(true), Some(price)) = (position.in_range(), position.current_price()) {
                    if price < min || price > max {
                        findings.push(format!(
                            "{}: marked in range but price {} is outside {}..{}",
                            pair, price, min, max
                        ));
                    }
                }
            }
            _ => {}
        }

        if let (Some(p0), Some(p1)) = position.percentages() {
            let total = p0 + p1;
            if total > 100.0 + thresholds.percentage_tolerance || p0 < 0.0 || p1 < 0.0 {
                findings.push(format!("{}: token split {:.2}% + {:.2}% is invalid", pair, p0, p1));
            }
        }
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScrapedPosition;
    use chrono::{TimeZone, Utc};

    fn healthy(pair: &str) -> ScrapedPosition {
        ScrapedPosition {
            protocol: "uniswap".to_string(),
            pair: pair.to_string(),
            token0: None,
            token1: None,
            balance: Some(2500.0),
            pending_yield: Some(3.1),
            apy: Some(8.0),
            range_min: Some(95.0),
            range_max: Some(105.0),
            current_price: Some(100.0),
            in_range: Some(true),
            captured_at: Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_healthy_position_is_not_flagged() {
        let findings = scan_anomalies(&[healthy("ETH/USDC")], &AnomalyThresholds::default());

        assert!(findings.is_empty(), "{:?}", findings);
    }

    #[test]
    fn test_inverted_range_and_negative_balance_are_flagged() {
        let mut inverted = healthy("SOL/USDC");
        inverted.range_min = Some(105.0);
        inverted.range_max = Some(95.0);
        let mut negative = healthy("JUP/SOL");
        negative.balance = Some(-10.0);
        let positions = vec![inverted, healthy("ETH/USDC"), negative];

        let findings = scan_anomalies(&positions, &AnomalyThresholds::default());

        assert_eq!(findings.len(), 2, "{:?}", findings);
        assert!(findings[0].starts_with("SOL/USDC: range min 105"));
        assert!(findings[1].starts_with("JUP/SOL: negative balance"));
    }

    #[test]
    fn test_apy_threshold_is_configurable() {
        let mut hot = healthy("PUMP/SOL");
        hot.apy = Some(450.0);
        let positions = vec![hot];

        assert!(scan_anomalies(&positions, &AnomalyThresholds::default()).is_empty());

        let strict = AnomalyThresholds {
            max_apy: 200.0,
            ..AnomalyThresholds::default()
        };
        let findings = scan_anomalies(&positions, &strict);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].contains("APY 450.00%"));
    }

    #[test]
    fn test_in_range_flag_contradicting_price_is_flagged() {
        let mut drifted = healthy("BTC/USDC");
        drifted.current_price = Some(120.0);

        let findings = scan_anomalies(&[drifted], &AnomalyThresholds::default());

        assert_eq!(findings.len(), 1);
        assert!(findings[0].contains("outside 95..105"));
    }
}
