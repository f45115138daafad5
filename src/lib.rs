pub mod analysis;
pub mod config;
pub mod db;
pub mod ingest;
pub mod matching;
pub mod models;
pub mod normalize;
pub mod reconcile;
pub mod utils;
pub mod vision;

pub use analysis::{scan_anomalies, summarize, AnomalyThresholds, PositionView, Summary};
pub use matching::{match_extraction, match_position, PositionMatch};
pub use normalize::{normalize_pair, normalize_token};
pub use reconcile::{reconcile, reconcile_all, MergePolicy};
