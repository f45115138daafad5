//! Capture merge resolver
//!
//! Folds repeated observations of the same position into one canonical
//! record. Scraped columns follow plain recency. Breakdown columns only
//! move when a newer complete breakdown arrives, so a later plain scrape
//! never erases a breakdown recovered earlier.

use std::collections::BTreeMap;
use log::debug;

use crate::models::{CanonicalPosition, ExtractedBreakdown, Observation, PositionKey, ScrapedPosition};

/// Default slack allowed on `token0% + token1%` above 100
pub const DEFAULT_PERCENTAGE_TOLERANCE: f64 = 0.5;

/// Tunables of the merge policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergePolicy {
    /// Percentage points a breakdown's split may exceed 100 by (rounding)
    pub percentage_tolerance: f64,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self {
            percentage_tolerance: DEFAULT_PERCENTAGE_TOLERANCE,
        }
    }
}

impl MergePolicy {
    pub fn new(percentage_tolerance: f64) -> Self {
        Self { percentage_tolerance }
    }

    /// Whether a breakdown may be merged: both amounts present and
    /// non-negative, and the percentage split within `0..=100 + tolerance`.
    pub fn accepts(&self, breakdown: &ExtractedBreakdown) -> bool {
        let (amount0, amount1) = match (breakdown.token0_amount, breakdown.token1_amount) {
            (Some(a0), Some(a1)) => (a0, a1),
            _ => return false,
        };
        if !is_non_negative(amount0) || !is_non_negative(amount1) {
            return false;
        }

        let limit = 100.0 + self.percentage_tolerance;
        let percentages = [breakdown.token0_percentage, breakdown.token1_percentage];
        if percentages.iter().flatten().any(|p| !is_non_negative(*p) || *p > limit) {
            return false;
        }

        percentages.iter().flatten().sum::<f64>() <= limit
    }

    /// Fold one observation into the canonical record for its key
    pub fn reconcile(
        &self,
        existing: Option<CanonicalPosition>,
        incoming: &ScrapedPosition,
        breakdown: Option<&ExtractedBreakdown>,
    ) -> CanonicalPosition {
        let mut position = match existing {
            None => new_canonical(incoming),
            Some(mut current) => {
                if incoming.captured_at >= current.captured_at {
                    refresh_scraped_fields(&mut current, incoming);
                }
                current
            }
        };

        if let Some(breakdown) = breakdown {
            if !self.accepts(breakdown) {
                debug!(
                    "Dropping incomplete or invalid breakdown for {}::{} extracted at {}",
                    position.protocol, position.pair, breakdown.extracted_at
                );
            } else if should_replace_breakdown(&position, breakdown) {
                apply_breakdown(&mut position, breakdown);
            } else {
                debug!(
                    "Keeping breakdown from {:?} over older one from {} for {}::{}",
                    position.breakdown_at, breakdown.extracted_at, position.protocol, position.pair
                );
            }
        }

        position.has_breakdown = position.token0_amount.is_some() && position.token1_amount.is_some();
        position
    }

    /// Fold a whole history, ordered by capture time, into one record per key.
    ///
    /// Observations sharing a capture time keep their input order. The result
    /// depends only on `history`, so re-running on the same input is a no-op.
    pub fn reconcile_all(&self, history: &[Observation]) -> BTreeMap<PositionKey, CanonicalPosition> {
        let mut ordered: Vec<&Observation> = history.iter().collect();
        ordered.sort_by_key(|observation| observation.captured_at());

        let mut canonical = BTreeMap::new();
        for observation in ordered {
            let key = observation.key();
            let existing = canonical.remove(&key);
            let updated = self.reconcile(existing, &observation.position, observation.breakdown.as_ref());
            canonical.insert(key, updated);
        }

        canonical
    }
}

/// [`MergePolicy::reconcile`] with the default policy
pub fn reconcile(
    existing: Option<CanonicalPosition>,
    incoming: &ScrapedPosition,
    breakdown: Option<&ExtractedBreakdown>,
) -> CanonicalPosition {
    MergePolicy::default().reconcile(existing, incoming, breakdown)
}

/// [`MergePolicy::reconcile_all`] with the default policy
pub fn reconcile_all(history: &[Observation]) -> BTreeMap<PositionKey, CanonicalPosition> {
    MergePolicy::default().reconcile_all(history)
}

fn is_non_negative(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

fn should_replace_breakdown(position: &CanonicalPosition, breakdown: &ExtractedBreakdown) -> bool {
    let stored = position.token0_amount.is_some() && position.token1_amount.is_some();
    if !stored {
        return true;
    }
    match position.breakdown_at {
        Some(stored_at) => breakdown.extracted_at >= stored_at,
        None => true,
    }
}

fn apply_breakdown(position: &mut CanonicalPosition, breakdown: &ExtractedBreakdown) {
    position.token0_amount = breakdown.token0_amount;
    position.token1_amount = breakdown.token1_amount;
    position.token0_percentage = breakdown.token0_percentage;
    position.token1_percentage = breakdown.token1_percentage;
    position.breakdown_at = Some(breakdown.extracted_at);
}

fn new_canonical(incoming: &ScrapedPosition) -> CanonicalPosition {
    let key = incoming.key();
    let mut position = CanonicalPosition {
        protocol: key.protocol,
        pair: key.pair,
        raw_pair: incoming.pair.clone(),
        token0: None,
        token1: None,
        balance: None,
        pending_yield: None,
        apy: None,
        range_min: None,
        range_max: None,
        current_price: None,
        in_range: None,
        captured_at: incoming.captured_at,
        token0_amount: None,
        token1_amount: None,
        token0_percentage: None,
        token1_percentage: None,
        breakdown_at: None,
        has_breakdown: false,
    };
    refresh_scraped_fields(&mut position, incoming);
    position
}

/// Copy every scraped column, keeping the canonical invariants: no negative
/// balance and no inverted range survive into the record.
fn refresh_scraped_fields(position: &mut CanonicalPosition, incoming: &ScrapedPosition) {
    position.raw_pair = incoming.pair.clone();
    position.token0 = incoming.token0.clone();
    position.token1 = incoming.token1.clone();
    position.balance = incoming.balance.filter(|balance| is_non_negative(*balance));
    position.pending_yield = incoming.pending_yield;
    position.apy = incoming.apy;
    position.current_price = incoming.current_price;
    position.in_range = incoming.in_range;
    position.captured_at = incoming.captured_at;

    match (incoming.range_min, incoming.range_max) {
        (Some(min), Some(max)) if min > max => {
            debug!("Inverted range {}..{} on {}, clearing bounds", min, max, incoming.pair);
            position.range_min = None;
            position.range_max = None;
        }
        (min, max) => {
            position.range_min = min;
            position.range_max = max;
        }
    }

    if incoming.balance.is_some() && position.balance.is_none() {
        debug!("Discarding invalid balance {:?} on {}", incoming.balance, incoming.pair);
    }
}
