//! Feature icon recognition.
//!
//! This module provides:
//! - The reference icon catalog (`IconCatalog`)
//! - Structural similarity scoring (`structural_similarity`)
//! - Best-match classification of icon crops (`IconClassifier`)

pub mod catalog;
pub mod classifier;
pub mod ssim;

pub use catalog::IconCatalog;
pub use classifier::IconClassifier;
