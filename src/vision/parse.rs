use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::{ExtractedBreakdown, VisionExtraction};
use crate::utils::parse_number_text;

static FENCED_JSON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("fenced JSON pattern is valid")
});

#[derive(Debug, Error)]
pub enum VisionParseError {
    #[error("no JSON object found in vision response")]
    NoJson,
    #[error("invalid JSON in vision response: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("vision response is not a JSON object")]
    NotAnObject,
    #[error("vision response has no pair field")]
    MissingPair,
}

/// Interpret the vision model's text answer.
///
/// `{"expanded": false}` and a null or blank pair both mean no position was
/// expanded. Numbers may be JSON numbers or display strings like `"$1,204.50"`.
pub fn parse_response(text: &str, extracted_at: DateTime<Utc>) -> Result<VisionExtraction, VisionParseError> {
    let json = extract_json(text).ok_or(VisionParseError::NoJson)?;
    let value: Value = serde_json::from_str(json)?;
    let object = value.as_object().ok_or(VisionParseError::NotAnObject)?;

    if object.get("expanded").and_then(Value::as_bool) == Some(false) {
        return Ok(VisionExtraction::NothingExpanded);
    }

    let pair = match object.get("pair") {
        None => return Err(VisionParseError::MissingPair),
        Some(Value::String(pair)) if !pair.trim().is_empty() => pair.trim().to_string(),
        Some(_) => return Ok(VisionExtraction::NothingExpanded),
    };

    Ok(VisionExtraction::Breakdown(ExtractedBreakdown {
        pair,
        token0_amount: number_field(object, &["token0Amount", "token0_amount"]),
        token1_amount: number_field(object, &["token1Amount", "token1_amount"]),
        token0_percentage: number_field(object, &["token0Percentage", "token0_percentage"]),
        token1_percentage: number_field(object, &["token1Percentage", "token1_percentage"]),
        extracted_at,
    }))
}

/// JSON inside a fenced block, else the outermost braces of the text
fn extract_json(text: &str) -> Option<&str> {
    if let Some(captures) = FENCED_JSON.captures(text) {
        return captures.get(1).map(|m| m.as_str());
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

fn number_field(object: &Map<String, Value>, names: &[&str]) -> Option<f64> {
    names
        .iter()
        .filter_map(|name| object.get(*name))
        .find_map(|value| match value {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => parse_number_text(text),
            _ => None,
        })
}
