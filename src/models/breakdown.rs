use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// Token split of the expanded position, as read by the vision model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedBreakdown {
    /// Pair exactly as the model reported it
    pub pair: String,
    pub token0_amount: Option<f64>,
    pub token1_amount: Option<f64>,
    pub token0_percentage: Option<f64>,
    pub token1_percentage: Option<f64>,
    pub extracted_at: DateTime<Utc>,
}

impl ExtractedBreakdown {
    /// Both token amounts were read
    pub fn is_complete(&self) -> bool {
        self.token0_amount.is_some() && self.token1_amount.is_some()
    }

    /// Same breakdown with the token sides exchanged
    pub fn swapped(&self) -> Self {
        let pair = match self.pair.split_once('/') {
            Some((left, right)) => format!("{}/{}", right.trim(), left.trim()),
            None => self.pair.clone(),
        };

        Self {
            pair,
            token0_amount: self.token1_amount,
            token1_amount: self.token0_amount,
            token0_percentage: self.token1_percentage,
            token1_percentage: self.token0_percentage,
            extracted_at: self.extracted_at,
        }
    }
}

/// Outcome of one vision call
#[derive(Debug, Clone, PartialEq)]
pub enum VisionExtraction {
    /// The model found an expanded position and read its breakdown
    Breakdown(ExtractedBreakdown),
    /// No position was expanded in the screenshot
    NothingExpanded,
}

impl VisionExtraction {
    pub fn breakdown(&self) -> Option<&ExtractedBreakdown> {
        match self {
            VisionExtraction::Breakdown(breakdown) => Some(breakdown),
            VisionExtraction::NothingExpanded => None,
        }
    }
}
