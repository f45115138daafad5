use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use std::fmt;

use crate::models::ExtractedBreakdown;
use crate::normalize::normalize_pair;

/// One concentrated-liquidity position as read off a page at capture time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedPosition {
    pub protocol: String,
    pub pair: String,
    #[serde(default)]
    pub token0: Option<String>,
    #[serde(default)]
    pub token1: Option<String>,
    /// Position value in USD
    #[serde(default)]
    pub balance: Option<f64>,
    #[serde(default)]
    pub pending_yield: Option<f64>,
    #[serde(default)]
    pub apy: Option<f64>,
    #[serde(default)]
    pub range_min: Option<f64>,
    #[serde(default)]
    pub range_max: Option<f64>,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub in_range: Option<bool>,
    pub captured_at: DateTime<Utc>,
}

impl ScrapedPosition {
    /// Canonical key this position reconciles under
    pub fn key(&self) -> PositionKey {
        PositionKey::new(&self.protocol, &self.pair)
    }
}

/// Key of a canonical record: protocol plus normalized pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionKey {
    pub protocol: String,
    pub pair: String,
}

impl PositionKey {
    pub fn new(protocol: &str, raw_pair: &str) -> Self {
        Self {
            protocol: protocol.trim().to_string(),
            pair: normalize_pair(raw_pair),
        }
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.protocol, self.pair)
    }
}

/// A scrape, optionally enriched with the breakdown matched to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub position: ScrapedPosition,
    pub breakdown: Option<ExtractedBreakdown>,
}

impl Observation {
    /// Plain scrape without a breakdown
    pub fn scrape(position: ScrapedPosition) -> Self {
        Self { position, breakdown: None }
    }

    /// Scrape carrying the breakdown the matcher placed on it
    pub fn enriched(position: ScrapedPosition, breakdown: ExtractedBreakdown) -> Self {
        Self { position, breakdown: Some(breakdown) }
    }

    pub fn key(&self) -> PositionKey {
        self.position.key()
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.position.captured_at
    }
}

/// The durable record kept per `(protocol, normalized pair)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalPosition {
    pub protocol: String,
    /// Normalized pair, e.g. `BTC/USDC`
    pub pair: String,
    /// Pair as spelled by the most recent scrape
    pub raw_pair: String,
    pub token0: Option<String>,
    pub token1: Option<String>,
    pub balance: Option<f64>,
    pub pending_yield: Option<f64>,
    pub apy: Option<f64>,
    pub range_min: Option<f64>,
    pub range_max: Option<f64>,
    pub current_price: Option<f64>,
    pub in_range: Option<bool>,
    pub captured_at: DateTime<Utc>,
    pub token0_amount: Option<f64>,
    pub token1_amount: Option<f64>,
    pub token0_percentage: Option<f64>,
    pub token1_percentage: Option<f64>,
    /// Extraction time of the stored breakdown
    pub breakdown_at: Option<DateTime<Utc>>,
    pub has_breakdown: bool,
}

impl CanonicalPosition {
    pub fn key(&self) -> PositionKey {
        PositionKey {
            protocol: self.protocol.clone(),
            pair: self.pair.clone(),
        }
    }
}
