//! Region geometry: edge-anchored crop specs and marker box detection.

pub mod bright_box;
pub mod region;

pub use bright_box::{crop_bright_box, detect_bright_box, ICON_MARKER, OVERLAY_MARKER};
pub use region::{crop_by_spec, crop_rect, HAnchor, Rect, RegionSpec, VAnchor};
