mod breakdown;
mod capture;
mod position;

pub use breakdown::ExtractedBreakdown;
pub use breakdown::VisionExtraction;
pub use capture::Capture;
pub use capture::CaptureRow;
pub use position::CanonicalPosition;
pub use position::Observation;
pub use position::PositionKey;
pub use position::ScrapedPosition;
