//! Edge-anchored region specs and their resolution to pixel rectangles.
//!
//! Offsets are measured from one edge of the overlay image, so a single spec
//! keeps working for every overlay size the game renders at one UI scale.

use image::{ImageBuffer, Pixel};

use crate::error::{ScanError, ScanResult};

/// Vertical anchor: pixels down from the top edge or up from the bottom edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VAnchor {
    Top(u32),
    Bottom(u32),
}

/// Horizontal anchor: pixels in from the left edge or in from the right edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HAnchor {
    Left(u32),
    Right(u32),
}

impl VAnchor {
    fn resolve(self, height: u32) -> i64 {
        match self {
            VAnchor::Top(v) => v as i64,
            VAnchor::Bottom(v) => height as i64 - v as i64,
        }
    }
}

impl HAnchor {
    fn resolve(self, width: u32) -> i64 {
        match self {
            HAnchor::Left(v) => v as i64,
            HAnchor::Right(v) => width as i64 - v as i64,
        }
    }
}

/// A crop rectangle described by two vertical and two horizontal anchors.
///
/// The anchors of a pair may come in either order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegionSpec {
    pub y: (VAnchor, VAnchor),
    pub x: (HAnchor, HAnchor),
}

impl RegionSpec {
    pub const fn new(y: (VAnchor, VAnchor), x: (HAnchor, HAnchor)) -> Self {
        Self { y, x }
    }
}

/// Axis-aligned rectangle in pixel coordinates, origin at the top-left.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

#[cfg(test)]
impl Rect {
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "x={}, y={}, w={}, h={}",
            self.x, self.y, self.width, self.height
        )
    }
}

fn clamp_pair(a: i64, b: i64, dimension: u32) -> (u32, u32) {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let max = dimension as i64 - 1;
    (lo.clamp(0, max) as u32, hi.clamp(0, max) as u32)
}

/// Resolves a region spec against an image of `width` x `height` pixels.
///
/// Each anchor resolves on its own, the pair is sorted, and both ends are
/// clamped to `[0, dimension - 1]`. An empty result on either axis is an
/// `InvalidCrop` error.
pub fn resolve_region(spec: &RegionSpec, width: u32, height: u32) -> ScanResult<Rect> {
    if width == 0 || height == 0 {
        return Err(ScanError::InvalidCrop {
            x_min: 0,
            x_max: 0,
            y_min: 0,
            y_max: 0,
        });
    }

    let (y_min, y_max) = clamp_pair(spec.y.0.resolve(height), spec.y.1.resolve(height), height);
    let (x_min, x_max) = clamp_pair(spec.x.0.resolve(width), spec.x.1.resolve(width), width);

    if x_max <= x_min || y_max <= y_min {
        return Err(ScanError::InvalidCrop {
            x_min,
            x_max,
            y_min,
            y_max,
        });
    }

    Ok(Rect {
        x: x_min,
        y: y_min,
        width: x_max - x_min,
        height: y_max - y_min,
    })
}

/// Copies `rect` out of `img`. The rectangle is clipped to the image.
pub fn crop_rect<P>(img: &ImageBuffer<P, Vec<P::Subpixel>>, rect: &Rect) -> ImageBuffer<P, Vec<P::Subpixel>>
where
    P: Pixel + 'static,
{
    let (w, h) = img.dimensions();
    let x0 = rect.x.min(w);
    let y0 = rect.y.min(h);
    let rw = rect.width.min(w - x0);
    let rh = rect.height.min(h - y0);
    image::imageops::crop_imm(img, x0, y0, rw, rh).to_image()
}

/// Resolves `spec` against `img` and returns the cropped sub-image.
pub fn crop_by_spec<P>(
    img: &ImageBuffer<P, Vec<P::Subpixel>>,
    spec: &RegionSpec,
) -> ScanResult<ImageBuffer<P, Vec<P::Subpixel>>>
where
    P: Pixel + 'static,
{
    let rect = resolve_region(spec, img.width(), img.height())?;
    Ok(crop_rect(img, &rect))
}
