mod anomaly;
mod summary;

pub use anomaly::scan_anomalies;
pub use anomaly::AnomalyThresholds;
pub use summary::summarize;
pub use summary::Summary;
pub use summary::TopPosition;

use crate::models::{CanonicalPosition, ScrapedPosition};

/// Read-only view the scanner needs, shared by raw captures and canonical rows
pub trait PositionView {
    fn pair(&self) -> &str;
    fn balance(&self) -> Option<f64>;
    fn apy(&self) -> Option<f64>;
    fn range(&self) -> (Option<f64>, Option<f64>);
    fn current_price(&self) -> Option<f64>;
    fn in_range(&self) -> Option<bool>;
    fn has_breakdown(&self) -> bool;
    fn percentages(&self) -> (Option<f64>, Option<f64>);
}

impl PositionView for ScrapedPosition {
    fn pair(&self) -> &str {
        &self.pair
    }

    fn balance(&self) -> Option<f64> {
        self.balance
    }

    fn apy(&self) -> Option<f64> {
        self.apy
    }

    fn range(&self) -> (Option<f64>, Option<f64>) {
        (self.range_min, self.range_max)
    }

    fn current_price(&self) -> Option<f64> {
        self.current_price
    }

    fn in_range(&self) -> Option<bool> {
        self.in_range
    }

    // A bare scrape never carries a breakdown
    fn has_breakdown(&self) -> bool {
        false
    }

    fn percentages(&self) -> (Option<f64>, Option<f64>) {
        (None, None)
    }
}

impl PositionView for CanonicalPosition {
    fn pair(&self) -> &str {
        &self.pair
    }

    fn balance(&self) -> Option<f64> {
        self.balance
    }

    fn apy(&self) -> Option<f64> {
        self.apy
    }

    fn range(&self) -> (Option<f64>, Option<f64>) {
        (self.range_min, self.range_max)
    }

    fn current_price(&self) -> Option<f64> {
        self.current_price
    }

    fn in_range(&self) -> Option<bool> {
        self.in_range
    }

    fn has_breakdown(&self) -> bool {
        self.has_breakdown
    }

    fn percentages(&self) -> (Option<f64>, Option<f64>) {
        (self.token0_percentage, self.token1_percentage)
    }
}
