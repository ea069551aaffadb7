//! Concurrent scan pipeline.
//!
//! Trigger → capture queue → recognition workers → record queue →
//! persistence worker → SQLite.

pub mod coordinator;
pub mod persistence_worker;
pub mod queue;
pub mod recognition_worker;
pub mod state;

pub use coordinator::{Pipeline, PipelineSettings};
pub use queue::{CapturedImage, Submitted};
