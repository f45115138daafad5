use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::models::ScrapedPosition;

/// One timestamped scrape of a protocol's position table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capture {
    pub protocol: String,
    pub captured_at: DateTime<Utc>,
    #[serde(default)]
    pub rows: Vec<CaptureRow>,
    /// Raw text answer of the vision model for this capture's screenshot
    #[serde(default)]
    pub vision_response: Option<String>,
    /// When the vision answer was produced, if recorded separately
    #[serde(default)]
    pub vision_extracted_at: Option<DateTime<Utc>>,
}

/// A scraped table row before it is stamped with protocol and capture time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRow {
    pub pair: String,
    #[serde(default)]
    pub token0: Option<String>,
    #[serde(default)]
    pub token1: Option<String>,
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
}

impl Capture {
    /// Materialize the rows as positions stamped with this capture's protocol and time
    pub fn positions(&self) -> Vec<ScrapedPosition> {
        self.rows
            .iter()
            .map(|row| ScrapedPosition {
                protocol: self.protocol.clone(),
                pair: row.pair.clone(),
                token0: row.token0.clone(),
                token1: row.token1.clone(),
                balance: row.balance,
                pending_yield: row.pending_yield,
                apy: row.apy,
                range_min: row.range_min,
                range_max: row.range_max,
                current_price: row.current_price,
                in_range: row.in_range,
                captured_at: self.captured_at,
            })
            .collect()
    }

    /// Timestamp to stamp the vision answer with
    pub fn extraction_time(&self) -> DateTime<Utc> {
        self.vision_extracted_at.unwrap_or(self.captured_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_file_deserializes_with_missing_fields() {
        let json = r#"{
            "protocol": "aerodrome",
            "capturedAt": "2025-01-10T12:00:00Z",
            "rows": [
                { "pair": "cbBTC/USDC0", "balance": 1520.5, "inRange": true },
                { "pair": "WETH/USDC", "apy": null }
            ]
        }"#;

        let capture: Capture = serde_json::from_str(json).unwrap();
        let positions = capture.positions();

        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0].protocol, "aerodrome");
        assert_eq!(positions[0].balance, Some(1520.5));
        assert_eq!(positions[1].balance, None);
        assert_eq!(positions[1].captured_at, capture.captured_at);
        assert!(capture.vision_response.is_none());
    }
}
