//! Record extraction from a detected overlay.
//!
//! This module provides:
//! - The record types (`ScanRecord`, `ScanPatch`)
//! - Field parsers for names, numbers and feature columns
//! - The field table and `RecordExtractor`

pub mod fields;
pub mod parsers;
pub mod record;

pub use fields::RecordExtractor;
pub use record::{format_timestamp, ScanRecord};
