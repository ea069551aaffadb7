//! Field parsers.
//!
//! Each parser turns the text recognized for one field (plus the field's crop)
//! into a partial record. They never default a value: text that does not
//! parse leaves the field absent.

use image::RgbImage;
use log::{debug, warn};
use regex::Regex;

use super::record::{NumericField, ScanPatch};
use crate::error::{ScanError, ScanResult};
use crate::geometry::{crop_rect, Rect};
use crate::icons::IconClassifier;
use crate::ocr::{to_gray, RecognitionMode, TextRecognizer};

/// Width of one feature column in the overlay, in pixels.
pub const FEATURE_COLUMN_WIDTH: u32 = 205;

/// Width of the icon at the left of each feature column, in pixels.
pub const FEATURE_ICON_WIDTH: u32 = 68;

/// Leading digits and non-word characters (OCR noise before the name).
const NAME_NOISE_PATTERN: &str = r"^[0-9\W_]+";

/// Leading non-alphanumeric characters before the category.
const CATEGORY_NOISE_PATTERN: &str = r"^[^A-Za-z0-9]+";

const NUMBER_PATTERN: &str = r"[0-9]+";

const VEHICLE_DURABILITY_PATTERN: &str = r"(?i)vehicle\s+durability\s+by\s+([0-9]+)";

/// Collaborators available to parsers.
pub struct ParseContext<'a> {
    pub recognizer: &'a dyn TextRecognizer,
    pub classifier: &'a IconClassifier,
    pub icon_threshold: f64,
}

/// Signature shared by all field parsers: `(context, key, text, crop)`.
pub type FieldParser = fn(&ParseContext<'_>, &str, &str, &RgbImage) -> ScanResult<ScanPatch>;

fn strip_prefix(pattern: &str, text: &str) -> ScanResult<Option<String>> {
    let re = Regex::new(pattern)?;
    let cleaned = re.replace(text, "").trim().to_string();
    Ok(if cleaned.is_empty() { None } else { Some(cleaned) })
}

/// First run of decimal digits in `text`. Runs too long for a u64 count as
/// absent.
pub fn parse_number(text: &str) -> ScanResult<Option<u64>> {
    let re = Regex::new(NUMBER_PATTERN)?;
    Ok(re.find(text).and_then(|m| m.as_str().parse::<u64>().ok()))
}

/// Two non-empty lines: name, then category.
pub fn parse_name_category(
    _ctx: &ParseContext<'_>,
    _key: &str,
    text: &str,
    _img: &RgbImage,
) -> ScanResult<ScanPatch> {
    let mut lines = text.lines().map(str::trim).filter(|line| !line.is_empty());

    let name = match lines.next() {
        Some(line) => strip_prefix(NAME_NOISE_PATTERN, line)?,
        None => None,
    };
    let category = match lines.next() {
        Some(line) => strip_prefix(CATEGORY_NOISE_PATTERN, line)?,
        None => None,
    };

    Ok(ScanPatch {
        name,
        category,
        ..Default::default()
    })
}

/// Number stored under the numeric field named by `key`.
pub fn parse_number_field(
    _ctx: &ParseContext<'_>,
    key: &str,
    text: &str,
    _img: &RgbImage,
) -> ScanResult<ScanPatch> {
    let field = NumericField::from_key(key).ok_or_else(|| ScanError::UnknownField(key.to_string()))?;
    Ok(ScanPatch::number(field, parse_number(text)?))
}

/// "... vehicle durability by <n> ..." anywhere in the text.
pub fn parse_vehicle_durability(
    _ctx: &ParseContext<'_>,
    key: &str,
    text: &str,
    _img: &RgbImage,
) -> ScanResult<ScanPatch> {
    let field = NumericField::from_key(key).ok_or_else(|| ScanError::UnknownField(key.to_string()))?;
    let re = Regex::new(VEHICLE_DURABILITY_PATTERN)?;
    let value = re
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok());
    Ok(ScanPatch::number(field, value))
}

/// Column rectangles of a feature strip `width` x `height` pixels wide.
///
/// The last column may be narrower; columns too narrow to hold more than the
/// icon are left out.
pub fn feature_columns(width: u32, height: u32) -> Vec<(Rect, Rect)> {
    let mut columns = Vec::new();
    let mut x = 0;
    while x < width {
        let column_width = FEATURE_COLUMN_WIDTH.min(width - x);
        if FEATURE_ICON_WIDTH < column_width {
            let icon = Rect {
                x,
                y: 0,
                width: FEATURE_ICON_WIDTH,
                height,
            };
            let text = Rect {
                x: x + FEATURE_ICON_WIDTH,
                y: 0,
                width: column_width - FEATURE_ICON_WIDTH,
                height,
            };
            columns.push((icon, text));
        }
        x += FEATURE_COLUMN_WIDTH;
    }
    columns
}

/// Icon + value pairs laid out in fixed-width columns.
///
/// Each recognized icon contributes one `features[<icon name>]` entry.
/// Unmatched icons and unreadable values contribute nothing.
pub fn parse_features(
    ctx: &ParseContext<'_>,
    _key: &str,
    _text: &str,
    img: &RgbImage,
) -> ScanResult<ScanPatch> {
    let gray = to_gray(img);
    let mut patch = ScanPatch::default();
    if gray.height() == 0 {
        return Ok(patch);
    }

    for (index, (icon_rect, text_rect)) in feature_columns(gray.width(), gray.height())
        .into_iter()
        .enumerate()
    {
        let icon = crop_rect(&gray, &icon_rect);
        let Some(best) = ctx.classifier.classify(&icon) else {
            continue;
        };
        debug!(
            "Feature column {}: best icon '{}' (score {:.3})",
            index, best.name, best.score
        );
        if best.score < ctx.icon_threshold {
            continue;
        }

        let content = crop_rect(&gray, &text_rect);
        let text = match ctx.recognizer.recognize(&content, RecognitionMode::SingleWord) {
            Ok(text) => text,
            Err(e) => {
                warn!("Feature column {} ('{}'): {}", index, best.name, e);
                continue;
            }
        };
        if let Some(value) = parse_number(&text)? {
            patch.features.insert(best.name, value);
        }
    }

    Ok(patch)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::icons::classifier::tests::{checker, ring_icon, stripes};
    use crate::icons::catalog::IconTemplate;
    use crate::icons::IconCatalog;
    use image::{GrayImage, Rgb};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Recognizer answering by crop size, recording each request.
    #[derive(Default)]
    pub(crate) struct FakeRecognizer {
        pub answers: HashMap<(u32, u32), String>,
        pub calls: Mutex<Vec<((u32, u32), RecognitionMode)>>,
    }

    impl FakeRecognizer {
        pub(crate) fn with(answers: &[((u32, u32), &str)]) -> Self {
            Self {
                answers: answers
                    .iter()
                    .map(|(size, text)| (*size, text.to_string()))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl TextRecognizer for FakeRecognizer {
        fn recognize(&self, img: &GrayImage, mode: RecognitionMode) -> ScanResult<String> {
            self.calls.lock().unwrap().push((img.dimensions(), mode));
            Ok(self.answers.get(&img.dimensions()).cloned().unwrap_or_default())
        }
    }

    pub(crate) fn test_classifier() -> IconClassifier {
        IconClassifier::new(
            Arc::new(IconCatalog::from_templates(vec![
                IconTemplate::new("fire", ring_icon(68, 90, stripes), 255),
                IconTemplate::new("cold", ring_icon(68, 90, checker), 255),
            ])),
            255,
        )
    }

    fn run(parser: FieldParser, key: &str, text: &str) -> ScanPatch {
        let recognizer = FakeRecognizer::default();
        let classifier = test_classifier();
        let ctx = ParseContext {
            recognizer: &recognizer,
            classifier: &classifier,
            icon_threshold: 0.3,
        };
        parser(&ctx, key, text, &RgbImage::new(1, 1)).unwrap()
    }

    #[test]
    fn test_name_category_strips_noise() {
        let patch = run(parse_name_category, "name_category", "\n 12) Thruster Mk2 \n\n» Engine\n");
        assert_eq!(patch.name.as_deref(), Some("Thruster Mk2"));
        assert_eq!(patch.category.as_deref(), Some("Engine"));
    }

    #[test]
    fn test_name_category_single_line() {
        let patch = run(parse_name_category, "name_category", "Thruster Mk2");
        assert_eq!(patch.name.as_deref(), Some("Thruster Mk2"));
        assert_eq!(patch.category, None);

        let empty = run(parse_name_category, "name_category", "  \n ");
        assert_eq!(empty, ScanPatch::default());
    }

    #[test]
    fn test_name_keeps_inner_digits() {
        let patch = run(parse_name_category, "name_category", "-- 3 Cannon 88\nWeapon");
        assert_eq!(patch.name.as_deref(), Some("Cannon 88"));
    }

    #[test]
    fn test_number_takes_first_digit_run() {
        assert_eq!(parse_number("PS: 1234 / 9").unwrap(), Some(1234));
        assert_eq!(parse_number("no digits").unwrap(), None);
        assert_eq!(parse_number("99999999999999999999999").unwrap(), None);

        let patch = run(parse_number_field, "mass", "Mass 512 kg");
        assert_eq!(patch.mass, Some(512));
        assert_eq!(patch.powerscore, None);
    }

    #[test]
    fn test_number_field_rejects_unknown_key() {
        let recognizer = FakeRecognizer::default();
        let classifier = test_classifier();
        let ctx = ParseContext {
            recognizer: &recognizer,
            classifier: &classifier,
            icon_threshold: 0.3,
        };
        let err = parse_number_field(&ctx, "colour", "12", &RgbImage::new(1, 1)).unwrap_err();
        assert!(matches!(err, ScanError::UnknownField(_)));
    }

    #[test]
    fn test_vehicle_durability_phrase() {
        let patch = run(
            parse_vehicle_durability,
            "vehicle_durability",
            "Increases Vehicle  Durability by 45 points.\nPowerscore 300",
        );
        assert_eq!(patch.vehicle_durability, Some(45));

        let absent = run(parse_vehicle_durability, "vehicle_durability", "Durability 45");
        assert_eq!(absent.vehicle_durability, None);
    }

    #[test]
    fn test_feature_columns_layout() {
        let cols = feature_columns(748, 90);
        assert_eq!(cols.len(), 4);
        assert_eq!(cols[3].0.x, 615);
        assert_eq!(cols[3].1.width, 133 - 68);

        // 3 full columns plus a 50 px remainder narrower than the icon.
        let cols = feature_columns(3 * 205 + 50, 90);
        assert_eq!(cols.len(), 3);
    }

    fn paste(target: &mut RgbImage, icon: &GrayImage, x0: u32) {
        for (x, y, p) in icon.enumerate_pixels() {
            target.put_pixel(x0 + x, y, Rgb([p[0], p[0], p[0]]));
        }
    }

    #[test]
    fn test_only_matching_column_contributes() {
        let mut strip = RgbImage::from_pixel(3 * FEATURE_COLUMN_WIDTH, 90, Rgb([0, 0, 0]));
        paste(&mut strip, &ring_icon(68, 90, stripes), FEATURE_COLUMN_WIDTH);

        let text_size = (FEATURE_COLUMN_WIDTH - FEATURE_ICON_WIDTH, 90);
        let recognizer = FakeRecognizer::with(&[(text_size, "42%")]);
        let classifier = test_classifier();
        let ctx = ParseContext {
            recognizer: &recognizer,
            classifier: &classifier,
            icon_threshold: 0.3,
        };

        let patch = parse_features(&ctx, "features", "", &strip).unwrap();
        assert_eq!(patch.features.len(), 1);
        assert_eq!(patch.features.get("fire"), Some(&42));

        // Only the matching column's value was read.
        let calls = recognizer.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], (text_size, RecognitionMode::SingleWord));
    }

    /// Stripes down to `rows`, flat gray below: a partial match for "fire".
    fn striped_down_to(rows: u32, x: u32, y: u32) -> u8 {
        if y < rows { stripes(x, y) } else { 110 }
    }

    fn mostly_flat(x: u32, y: u32) -> u8 {
        striped_down_to(8, x, y)
    }

    fn mostly_striped(x: u32, y: u32) -> u8 {
        striped_down_to(50, x, y)
    }

    #[test]
    fn test_icon_threshold_boundary() {
        let classifier = test_classifier();
        let weak_icon = ring_icon(68, 90, mostly_flat);
        let strong_icon = ring_icon(68, 90, mostly_striped);
        let weak = classifier.classify(&weak_icon).unwrap();
        let strong = classifier.classify(&strong_icon).unwrap();
        assert_eq!(weak.name, "fire");
        assert_eq!(strong.name, "fire");
        assert!(weak.score > 0.0 && weak.score < 0.3, "weak = {}", weak.score);
        assert!(strong.score > 0.3 && strong.score < 1.0, "strong = {}", strong.score);

        // Full first column, narrower second column, so answers differ by size.
        let mut strip = RgbImage::from_pixel(FEATURE_COLUMN_WIDTH + 150, 90, Rgb([0, 0, 0]));
        paste(&mut strip, &weak_icon, 0);
        paste(&mut strip, &strong_icon, FEATURE_COLUMN_WIDTH);
        let weak_text = (FEATURE_COLUMN_WIDTH - FEATURE_ICON_WIDTH, 90);
        let strong_text = (150 - FEATURE_ICON_WIDTH, 90);

        let parse_at = |threshold: f64| {
            let recognizer = FakeRecognizer::with(&[(weak_text, "17"), (strong_text, "42")]);
            let ctx = ParseContext {
                recognizer: &recognizer,
                classifier: &classifier,
                icon_threshold: threshold,
            };
            let patch = parse_features(&ctx, "features", "", &strip).unwrap();
            let read: Vec<(u32, u32)> = recognizer
                .calls
                .lock()
                .unwrap()
                .iter()
                .map(|(size, _)| *size)
                .collect();
            (patch.features.get("fire").copied(), read)
        };

        // The partial match below the threshold is never read.
        assert_eq!(parse_at(0.3), (Some(42), vec![strong_text]));
        // A score equal to the threshold is kept; just above it is not.
        assert_eq!(parse_at(strong.score), (Some(42), vec![strong_text]));
        assert_eq!(parse_at(strong.score + 1e-9), (None, vec![]));
        // Lowering the threshold under the weak score reads both columns.
        assert_eq!(
            parse_at(weak.score / 2.0),
            (Some(42), vec![weak_text, strong_text])
        );
    }

    #[test]
    fn test_unreadable_feature_value_is_skipped() {
        let mut strip = RgbImage::from_pixel(FEATURE_COLUMN_WIDTH, 90, Rgb([0, 0, 0]));
        paste(&mut strip, &ring_icon(68, 90, checker), 0);
        let recognizer = FakeRecognizer::default();
        let classifier = test_classifier();
        let ctx = ParseContext {
            recognizer: &recognizer,
            classifier: &classifier,
            icon_threshold: 0.3,
        };
        let patch = parse_features(&ctx, "features", "", &strip).unwrap();
        assert!(patch.features.is_empty());
    }

    #[test]
    fn test_blank_strip_has_no_features() {
        let strip = RgbImage::from_pixel(400, 90, Rgb([40, 40, 40]));
        let recognizer = FakeRecognizer::default();
        let classifier = test_classifier();
        let ctx = ParseContext {
            recognizer: &recognizer,
            classifier: &classifier,
            icon_threshold: 0.3,
        };
        assert!(parse_features(&ctx, "features", "", &strip).unwrap().features.is_empty());
        assert!(recognizer.calls.lock().unwrap().is_empty());
    }
}
