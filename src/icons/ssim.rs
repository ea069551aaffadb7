//! Structural similarity between two gray images of equal size.
//!
//! Mean SSIM over every 7x7 window that lies fully inside the image, with
//! uniform weights, sample covariance and an 8-bit data range.

use image::GrayImage;

pub const WINDOW: u32 = 7;

const K1: f64 = 0.01;
const K2: f64 = 0.03;
const DATA_RANGE: f64 = 255.0;

/// Summed-area table with a zero row and column in front.
struct Integral {
    width: usize,
    sums: Vec<f64>,
}

impl Integral {
    fn build(width: u32, height: u32, value: impl Fn(u32, u32) -> f64) -> Self {
        let w = width as usize + 1;
        let h = height as usize + 1;
        let mut sums = vec![0.0; w * h];
        for y in 0..height {
            let mut row = 0.0;
            for x in 0..width {
                row += value(x, y);
                let idx = (y as usize + 1) * w + x as usize + 1;
                sums[idx] = sums[idx - w] + row;
            }
        }
        Self { width: w, sums }
    }

    /// Sum over the window with top-left (x, y).
    fn window(&self, x: u32, y: u32, size: u32) -> f64 {
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = (x0 + size as usize, y0 + size as usize);
        let w = self.width;
        self.sums[y1 * w + x1] - self.sums[y0 * w + x1] - self.sums[y1 * w + x0]
            + self.sums[y0 * w + x0]
    }
}

/// Returns the mean SSIM in `[-1, 1]`, or `None` if the images differ in size
/// or are smaller than one window.
pub fn structural_similarity(a: &GrayImage, b: &GrayImage) -> Option<f64> {
    if a.dimensions() != b.dimensions() {
        return None;
    }
    let (width, height) = a.dimensions();
    if width < WINDOW || height < WINDOW {
        return None;
    }

    let pa = |x: u32, y: u32| a.get_pixel(x, y)[0] as f64;
    let pb = |x: u32, y: u32| b.get_pixel(x, y)[0] as f64;

    let sum_a = Integral::build(width, height, pa);
    let sum_b = Integral::build(width, height, pb);
    let sum_aa = Integral::build(width, height, |x, y| pa(x, y) * pa(x, y));
    let sum_bb = Integral::build(width, height, |x, y| pb(x, y) * pb(x, y));
    let sum_ab = Integral::build(width, height, |x, y| pa(x, y) * pb(x, y));

    let n = (WINDOW * WINDOW) as f64;
    let cov_norm = n / (n - 1.0);
    let c1 = (K1 * DATA_RANGE).powi(2);
    let c2 = (K2 * DATA_RANGE).powi(2);

    let mut total = 0.0;
    let mut count = 0u64;
    for y in 0..=(height - WINDOW) {
        for x in 0..=(width - WINDOW) {
            let ux = sum_a.window(x, y, WINDOW) / n;
            let uy = sum_b.window(x, y, WINDOW) / n;
            let uxx = sum_aa.window(x, y, WINDOW) / n;
            let uyy = sum_bb.window(x, y, WINDOW) / n;
            let uxy = sum_ab.window(x, y, WINDOW) / n;

            let vx = cov_norm * (uxx - ux * ux);
            let vy = cov_norm * (uyy - uy * uy);
            let vxy = cov_norm * (uxy - ux * uy);

            let numerator = (2.0 * ux * uy + c1) * (2.0 * vxy + c2);
            let denominator = (ux * ux + uy * uy + c1) * (vx + vy + c2);
            total += numerator / denominator;
            count += 1;
        }
    }

    Some((total / count as f64).clamp(-1.0, 1.0))
}
