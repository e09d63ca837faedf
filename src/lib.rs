//! # chainflow
//!
//! Turns live multi-chain transaction streams into a bounded population of
//! animated particles.
//!
//! ```text
//! FeedSource (synthetic / replay / live)
//!     ↓ FeedEvent over mpsc
//! IngestionHub → Classifier (+ WhaleDetector, ActivityEstimator)
//!     ↓
//! FairQueue (per-chain round-robin, whale-preserving trim)
//!     ↓
//! FrameDriver → ParticlePool::spawn / update / write_buffers
//!     ↓
//! FrameBuffers + TrailBuffers (read by the renderer)
//! ```

pub mod chains;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod feed;
pub mod queue;
pub mod runtime;
pub mod tokens;
pub mod types;

pub use chains::{ChainId, ChainProfile, Personality, Rgb};
pub use classifier::{ActivityEstimator, Classifier, PriceCache, WhaleDetector};
pub use config::RuntimeConfig;
pub use engine::{FrameBuffers, LifecycleConfig, ParticlePool, SpawnParams, TrailBuffers};
pub use feed::{ConnectionStatus, FeedEvent, FeedSink, FeedSource};
pub use queue::FairQueue;
pub use runtime::{FrameDriver, FrameStats, IngestionHub};
pub use types::{ClassifiedTransaction, RawTransactionEvent, TokenTransfer, VisualDescriptor};
