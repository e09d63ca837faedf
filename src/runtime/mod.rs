//! Tick-side runtime: ingestion hub, frame driver and whale history

pub mod frame;
pub mod ingestion;
pub mod whale_history;

pub use frame::{FrameDriver, FrameStats};
pub use ingestion::{IngestStats, IngestionHub};
pub use whale_history::{WhaleHistory, WhaleRecord};
