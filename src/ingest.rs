use anyhow::Result;
use log::{debug, info, warn};
use std::collections::BTreeSet;

use crate::db::{refresh_key, Database};
use crate::matching::match_extraction;
use crate::models::{Capture, ExtractedBreakdown, PositionKey, ScrapedPosition, VisionExtraction};
use crate::reconcile::MergePolicy;
use crate::vision::{parse_response, VisionParseError};

/// What became of a capture's vision answer
#[derive(Debug)]
pub enum VisionOutcome {
    /// The capture carried no vision answer
    NoResponse,
    /// The answer could not be read; treated as no breakdown
    Unparseable(VisionParseError),
    /// The model reported that no position was expanded
    NothingExpanded,
    /// No scraped position carries the reported pair; the breakdown is discarded
    Unmatched { pair: String },
    /// Breakdown placed on a scraped position, aligned to its token order
    Matched {
        position: ScrapedPosition,
        breakdown: ExtractedBreakdown,
    },
}

/// Parse and place a capture's vision answer among its scraped positions
pub fn resolve_vision(capture: &Capture, positions: &[ScrapedPosition]) -> VisionOutcome {
    let response = match &capture.vision_response {
        Some(response) if !response.trim().is_empty() => response,
        _ => return VisionOutcome::NoResponse,
    };

    let extraction = match parse_response(response, capture.extraction_time()) {
        Ok(extraction) => extraction,
        Err(err) => return VisionOutcome::Unparseable(err),
    };

    let breakdown = match &extraction {
        VisionExtraction::Breakdown(breakdown) => breakdown,
        VisionExtraction::NothingExpanded => return VisionOutcome::NothingExpanded,
    };

    let matched = match_extraction(&extraction, positions);
    match (matched.position(), matched.aligned(breakdown)) {
        (Some(position), Some(aligned)) => VisionOutcome::Matched {
            position: position.clone(),
            breakdown: aligned,
        },
        _ => VisionOutcome::Unmatched {
            pair: breakdown.pair.clone(),
        },
    }
}

/// Result of ingesting one capture
#[derive(Debug)]
pub struct IngestReport {
    pub capture_id: i64,
    pub vision: VisionOutcome,
    pub refreshed: usize,
}

/// Store a capture, place its breakdown if any, and refresh the canonical
/// rows of every key the capture touched. The scraped rows and the matched
/// breakdown are stored together or not at all.
pub async fn ingest_capture(db: &Database, capture: &Capture, policy: &MergePolicy) -> Result<IngestReport> {
    let positions = capture.positions();
    let vision = resolve_vision(capture, &positions);

    let matched = match &vision {
        VisionOutcome::Matched { position, breakdown } => Some((position, breakdown)),
        _ => None,
    };
    let capture_id = db.insert_capture(capture, matched).await?;
    info!(
        "Stored capture {} ({} positions on {})",
        capture_id,
        positions.len(),
        capture.protocol
    );

    match &vision {
        VisionOutcome::NoResponse => debug!("Capture {} has no vision answer", capture_id),
        VisionOutcome::Unparseable(err) => warn!("Ignoring vision answer for capture {}: {}", capture_id, err),
        VisionOutcome::NothingExpanded => info!("No expanded position in capture {}", capture_id),
        VisionOutcome::Unmatched { pair } => warn!(
            "Vision reported {} but no scraped position in capture {} matches it; breakdown discarded",
            pair, capture_id
        ),
        VisionOutcome::Matched { position, breakdown } => {
            info!("Breakdown for {} placed on {}", breakdown.pair, position.key());
        }
    }

    let touched: BTreeSet<PositionKey> = positions.iter().map(ScrapedPosition::key).collect();
    let mut refreshed = 0;
    for key in &touched {
        if refresh_key(db, key, policy).await?.is_some() {
            refreshed += 1;
        }
    }

    Ok(IngestReport {
        capture_id,
        vision,
        refreshed,
    })
}
