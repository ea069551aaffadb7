//! Error taxonomy for the scan pipeline.
//!
//! Every stage returns `Result<T, ScanError>`. Workers log and continue on
//! any of them; only `CatalogLoad` at startup ends the process.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    /// A region spec resolved to an empty or inverted rectangle.
    #[error("Invalid crop box computed: x({x_min},{x_max}) y({y_min},{y_max})")]
    InvalidCrop {
        x_min: u32,
        x_max: u32,
        y_min: u32,
        y_max: u32,
    },

    #[error("No bright box found (marker value {marker})")]
    Detection { marker: u8 },

    #[error("Text recognition failed: {0}")]
    Recognition(String),

    #[error("No record field named '{0}'")]
    UnknownField(String),

    #[error("Failed to persist record: {0}")]
    Persistence(String),

    #[error("Failed to load icon catalog: {0}")]
    CatalogLoad(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type ScanResult<T> = std::result::Result<T, ScanError>;
