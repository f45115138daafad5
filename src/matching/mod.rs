use log::debug;

use crate::models::{ExtractedBreakdown, ScrapedPosition, VisionExtraction};
use crate::normalize::{normalizer, TokenNormalizer};

/// Where an extracted breakdown belongs among the scraped positions
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PositionMatch<'a> {
    /// Same token order as the extraction
    Exact(&'a ScrapedPosition),
    /// Tokens match with sides exchanged
    Reversed(&'a ScrapedPosition),
    /// No candidate carries the extracted tokens; the breakdown must be discarded
    Unmatched,
}

impl<'a> PositionMatch<'a> {
    pub fn position(&self) -> Option<&'a ScrapedPosition> {
        match self {
            PositionMatch::Exact(position) | PositionMatch::Reversed(position) => Some(position),
            PositionMatch::Unmatched => None,
        }
    }

    pub fn is_matched(&self) -> bool {
        !matches!(self, PositionMatch::Unmatched)
    }

    /// The breakdown expressed in the matched position's token order
    pub fn aligned(&self, breakdown: &ExtractedBreakdown) -> Option<ExtractedBreakdown> {
        match self {
            PositionMatch::Exact(_) => Some(breakdown.clone()),
            PositionMatch::Reversed(_) => Some(breakdown.swapped()),
            PositionMatch::Unmatched => None,
        }
    }
}

/// Normalized sides of a candidate. A malformed pair string falls back to
/// the scraped token columns when both are present.
fn candidate_tokens(
    normalizer: &TokenNormalizer,
    candidate: &ScrapedPosition,
) -> Option<(String, String)> {
    if let Some(tokens) = normalizer.split_pair(&candidate.pair) {
        return Some(tokens);
    }

    let token0 = normalizer.normalize(candidate.token0.as_deref()?);
    let token1 = normalizer.normalize(candidate.token1.as_deref()?);
    if token0.is_empty() || token1.is_empty() {
        return None;
    }
    Some((token0, token1))
}

/// Find the scraped position an extracted breakdown describes.
///
/// All candidates are scanned for an exact token-order match first, then for
/// a reversed one. The first hit in input order wins. There is no partial
/// or nearest-candidate fallback.
pub fn match_position<'a>(
    extracted: &ExtractedBreakdown,
    candidates: &'a [ScrapedPosition],
) -> PositionMatch<'a> {
    let normalizer = normalizer();

    let (token0, token1) = match normalizer.split_pair(&extracted.pair) {
        Some(tokens) => tokens,
        None => {
            debug!("Extracted pair {:?} is malformed, leaving unmatched", extracted.pair);
            return PositionMatch::Unmatched;
        }
    };

    let normalized: Vec<Option<(String, String)>> = candidates
        .iter()
        .map(|candidate| candidate_tokens(normalizer, candidate))
        .collect();

    for (candidate, tokens) in candidates.iter().zip(&normalized) {
        if let Some((c0, c1)) = tokens {
            if *c0 == token0 && *c1 == token1 {
                return PositionMatch::Exact(candidate);
            }
        }
    }

    for (candidate, tokens) in candidates.iter().zip(&normalized) {
        if let Some((c0, c1)) = tokens {
            if *c0 == token1 && *c1 == token0 {
                debug!("Matched {} to {} in reversed order", extracted.pair, candidate.pair);
                return PositionMatch::Reversed(candidate);
            }
        }
    }

    debug!(
        "No candidate among {} positions matches extracted pair {}/{}",
        candidates.len(),
        token0,
        token1
    );
    PositionMatch::Unmatched
}

/// Match a whole vision answer. "Nothing expanded" never matches.
pub fn match_extraction<'a>(
    extraction: &VisionExtraction,
    candidates: &'a [ScrapedPosition],
) -> PositionMatch<'a> {
    match extraction {
        VisionExtraction::Breakdown(breakdown) => match_position(breakdown, candidates),
        VisionExtraction::NothingExpanded => PositionMatch::Unmatched,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn scraped(pair: &str) -> ScrapedPosition {
        ScrapedPosition {
            protocol: "orca".to_string(),
            pair: pair.to_string(),
            token0: None,
            token1: None,
            balance: Some(100.0),
            pending_yield: None,
            apy: Some(12.0),
            range_min: None,
            range_max: None,
            current_price: None,
            in_range: Some(true),
            captured_at: Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap(),
        }
    }

    fn extracted(pair: &str) -> ExtractedBreakdown {
        ExtractedBreakdown {
            pair: pair.to_string(),
            token0_amount: Some(12.5),
            token1_amount: Some(3400.0),
            token0_percentage: Some(40.0),
            token1_percentage: Some(60.0),
            extracted_at: Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 30).unwrap(),
        }
    }

    #[test]
    fn test_exact_match_after_normalization() {
        let candidates = vec![scraped("SOL/USDC"), scraped("cbBTC/USDC0")];

        let result = match_position(&extracted("WBTC/USDC"), &candidates);

        assert_eq!(result, PositionMatch::Exact(&candidates[1]));
    }

    #[test]
    fn test_reversed_order_match() {
        let candidates = vec![scraped("SOL/PUMP")];

        let result = match_position(&extracted("PUMP/SOL"), &candidates);

        assert_eq!(result, PositionMatch::Reversed(&candidates[0]));
        assert!(result.is_matched());
    }

    #[test]
    fn test_exact_match_wins_over_earlier_reversed_candidate() {
        let candidates = vec![scraped("USDC/SOL"), scraped("SOL/USDC")];

        let result = match_position(&extracted("SOL/USDC"), &candidates);

        assert_eq!(result.position(), Some(&candidates[1]));
        assert!(matches!(result, PositionMatch::Exact(_)));
    }

    #[test]
    fn test_first_candidate_in_input_order_wins() {
        let mut second = scraped("SOL0/USDC");
        second.balance = Some(5.0);
        let candidates = vec![scraped("SOL/USDC"), second];

        let result = match_position(&extracted("sol/usdc"), &candidates);

        assert_eq!(result.position().and_then(|p| p.balance), Some(100.0));
    }

    #[test]
    fn test_unrelated_pair_is_unmatched() {
        let candidates = vec![scraped("SOL/USDC")];

        let result = match_position(&extracted("ETH/BTC"), &candidates);

        assert_eq!(result, PositionMatch::Unmatched);
        assert!(result.position().is_none());
    }

    #[test]
    fn test_partial_token_overlap_never_matches() {
        let candidates = vec![scraped("SOL/USDC"), scraped("SOL/JUP")];

        assert_eq!(
            match_position(&extracted("SOL/PUMP"), &candidates),
            PositionMatch::Unmatched
        );
    }

    #[test]
    fn test_malformed_pairs_are_unmatched() {
        let candidates = vec![scraped("SOLUSDC"), scraped("SOL/USDC/JUP")];

        assert_eq!(
            match_position(&extracted("SOLUSDC"), &candidates),
            PositionMatch::Unmatched
        );
        assert_eq!(
            match_position(&extracted("SOL/USDC"), &candidates),
            PositionMatch::Unmatched
        );
    }

    #[test]
    fn test_malformed_candidate_pair_uses_token_columns() {
        let mut candidate = scraped("SOL-USDC");
        candidate.token0 = Some("SOL0".to_string());
        candidate.token1 = Some("USDC".to_string());
        let candidates = vec![candidate];

        let result = match_position(&extracted("SOL/USDC"), &candidates);

        assert!(matches!(result, PositionMatch::Exact(_)));
    }

    #[test]
    fn test_nothing_expanded_is_unmatched() {
        let candidates = vec![scraped("SOL/USDC")];

        assert_eq!(
            match_extraction(&VisionExtraction::NothingExpanded, &candidates),
            PositionMatch::Unmatched
        );
        assert!(match_extraction(
            &VisionExtraction::Breakdown(extracted("USDC/SOL")),
            &candidates
        )
        .is_matched());
    }

    #[test]
    fn test_reversed_match_aligns_breakdown_to_candidate_order() {
        let candidates = vec![scraped("SOL/PUMP")];
        let breakdown = ExtractedBreakdown {
            pair: "PUMP/SOL".to_string(),
            token0_amount: Some(250_000.0),
            token1_amount: Some(3.2),
            token0_percentage: Some(45.0),
            token1_percentage: Some(55.0),
            extracted_at: Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 30).unwrap(),
        };

        let result = match_position(&breakdown, &candidates);
        let aligned = result.aligned(&breakdown).unwrap();

        assert_eq!(aligned.pair, "SOL/PUMP");
        assert_eq!(aligned.token0_amount, Some(3.2));
        assert_eq!(aligned.token1_amount, Some(250_000.0));
        assert_eq!(aligned.token0_percentage, Some(55.0));
        assert!(PositionMatch::Unmatched.aligned(&breakdown).is_none());
    }
}
