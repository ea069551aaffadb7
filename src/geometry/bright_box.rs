//! Marker-colored box detection.
//!
//! The overlay border and the feature icons are drawn with a fixed gray value.
//! Pixels that match that value exactly are kept, small gaps in the drawn
//! border are closed, and the largest connected shape wins.

use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology::close;
use imageproc::region_labelling::{connected_components, Connectivity};

use super::region::{crop_rect, Rect};

/// Gray value of the overlay border.
pub const OVERLAY_MARKER: u8 = 153;

/// Gray value of the bright icon strokes.
pub const ICON_MARKER: u8 = 255;

/// Closing radius. Two passes of a 3x3 cross equal one pass of an L1 ball of
/// radius 2, for dilation and erosion alike.
const CLOSE_ITERATIONS: u8 = 2;

/// Returns a 0/255 mask of the pixels equal to `match_value`.
pub fn binarize_exact(img: &GrayImage, match_value: u8) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut mask = GrayImage::new(width, height);
    for (x, y, pixel) in img.enumerate_pixels() {
        if pixel[0] == match_value {
            mask.put_pixel(x, y, Luma([255u8]));
        }
    }
    mask
}

/// Bounding boxes of all 8-connected shapes in a 0/255 mask, indexed by label
/// order.
pub fn component_boxes(mask: &GrayImage) -> Vec<Rect> {
    let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));

    // (min_x, min_y, max_x, max_y) per label, label 0 is background
    let mut extents: Vec<Option<(u32, u32, u32, u32)>> = Vec::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label[0] as usize;
        if label == 0 {
            continue;
        }
        if extents.len() < label {
            extents.resize(label, None);
        }
        let slot = &mut extents[label - 1];
        *slot = Some(match *slot {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }

    extents
        .into_iter()
        .flatten()
        .map(|(x0, y0, x1, y1)| Rect {
            x: x0,
            y: y0,
            width: x1 - x0 + 1,
            height: y1 - y0 + 1,
        })
        .collect()
}

/// Picks the box with the largest area. Equal areas go to the box whose
/// top-left corner comes first in row-major order.
pub fn largest_box(boxes: &[Rect]) -> Option<Rect> {
    boxes.iter().copied().max_by(|a, b| {
        a.area()
            .cmp(&b.area())
            .then_with(|| (b.y, b.x).cmp(&(a.y, a.x)))
    })
}

/// Finds the bounding box of the largest shape drawn in `match_value`.
///
/// Returns `None` when no pixel matches.
pub fn detect_bright_box(img: &GrayImage, match_value: u8) -> Option<Rect> {
    let mask = binarize_exact(img, match_value);
    let closed = close(&mask, Norm::L1, CLOSE_ITERATIONS);
    largest_box(&component_boxes(&closed))
}

/// Detects the bright box and returns that part of `img`.
pub fn crop_bright_box(img: &GrayImage, match_value: u8) -> Option<GrayImage> {
    detect_bright_box(img, match_value).map(|rect| crop_rect(img, &rect))
}
