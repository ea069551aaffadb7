use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbImage};
use imageproc::contrast::otsu_level;

/// Crops below this size on their longest side are upscaled before OCR.
const UPSCALE_BELOW: u32 = 600;
const UPSCALE_FACTOR: u32 = 2;

/// Converts RGB to 8-bit gray with the ITU-R BT.601 luma weights.
///
/// Uses the same fixed-point rounding as common screenshot tools, so a pure
/// gray marker pixel keeps its exact value (153 stays 153).
pub fn to_gray(img: &RgbImage) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut output = GrayImage::new(width, height);

    for (x, y, pixel) in img.enumerate_pixels() {
        let r = pixel[0] as u32;
        let g = pixel[1] as u32;
        let b = pixel[2] as u32;
        let luma = (r * 19595 + g * 38470 + b * 7471 + 0x8000) >> 16;
        output.put_pixel(x, y, Luma([luma as u8]));
    }

    output
}

/// Binarizes at `level`: pixels above it become white (255), the rest black.
pub fn threshold_binary(img: &GrayImage, level: u8) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut output = GrayImage::new(width, height);

    for (x, y, pixel) in img.enumerate_pixels() {
        let value = if pixel[0] > level { 255u8 } else { 0u8 };
        output.put_pixel(x, y, Luma([value]));
    }

    output
}

/// Prepares a crop for Tesseract.
///
/// Small crops are upscaled 2x with linear filtering, then binarized at the
/// Otsu level of the (upscaled) image.
pub fn prepare_for_ocr(gray: &GrayImage) -> GrayImage {
    let (w, h) = gray.dimensions();
    let scaled = if w.max(h) < UPSCALE_BELOW {
        imageops::resize(
            gray,
            w * UPSCALE_FACTOR,
            h * UPSCALE_FACTOR,
            FilterType::Triangle,
        )
    } else {
        gray.clone()
    };

    let level = otsu_level(&scaled);
    threshold_binary(&scaled, level)
}
