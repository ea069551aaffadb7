//! The field table of the item inspection overlay and the extractor that
//! walks it.

use chrono::Utc;
use image::RgbImage;
use log::{debug, warn};
use std::sync::Arc;

use super::parsers::{
    parse_features, parse_name_category, parse_number_field, parse_vehicle_durability,
    FieldParser, ParseContext,
};
use super::record::{ScanPatch, ScanRecord};
use crate::error::{ScanError, ScanResult};
use crate::geometry::{crop_by_spec, HAnchor, RegionSpec, VAnchor};
use crate::icons::IconClassifier;
use crate::ocr::{to_gray, RecognitionMode, TextRecognizer};

/// One named field: where it sits in the overlay and how to read it.
///
/// Fields without a region are parsed from the text of the whole overlay.
#[derive(Clone, Copy)]
pub struct FieldSpec {
    pub key: &'static str,
    pub region: Option<RegionSpec>,
    pub parser: FieldParser,
}

/// Overlay layout at the reference resolution, processed in order.
pub static FIELD_SPECS: [FieldSpec; 6] = [
    FieldSpec {
        key: "name_category",
        region: Some(RegionSpec::new(
            (VAnchor::Top(5), VAnchor::Top(192)),
            (HAnchor::Left(150), HAnchor::Right(5)),
        )),
        parser: parse_name_category,
    },
    FieldSpec {
        key: "powerscore",
        region: Some(RegionSpec::new(
            (VAnchor::Bottom(328), VAnchor::Bottom(448)),
            (HAnchor::Left(26), HAnchor::Right(0)),
        )),
        parser: parse_number_field,
    },
    FieldSpec {
        key: "features",
        region: Some(RegionSpec::new(
            (VAnchor::Bottom(178), VAnchor::Bottom(268)),
            (HAnchor::Left(26), HAnchor::Right(26)),
        )),
        parser: parse_features,
    },
    FieldSpec {
        key: "durability",
        region: Some(RegionSpec::new(
            (VAnchor::Bottom(95), VAnchor::Bottom(178)),
            (HAnchor::Right(170), HAnchor::Right(320)),
        )),
        parser: parse_number_field,
    },
    FieldSpec {
        key: "mass",
        region: Some(RegionSpec::new(
            (VAnchor::Bottom(28), VAnchor::Bottom(100)),
            (HAnchor::Right(170), HAnchor::Right(326)),
        )),
        parser: parse_number_field,
    },
    FieldSpec {
        key: "vehicle_durability",
        region: None,
        parser: parse_vehicle_durability,
    },
];

/// Reads a `ScanRecord` out of a cropped overlay image.
#[derive(Clone)]
pub struct RecordExtractor {
    recognizer: Arc<dyn TextRecognizer>,
    classifier: IconClassifier,
    icon_threshold: f64,
    specs: &'static [FieldSpec],
}

impl RecordExtractor {
    pub fn new(
        recognizer: Arc<dyn TextRecognizer>,
        classifier: IconClassifier,
        icon_threshold: f64,
    ) -> Self {
        Self {
            recognizer,
            classifier,
            icon_threshold,
            specs: &FIELD_SPECS,
        }
    }

    fn context(&self) -> ParseContext<'_> {
        ParseContext {
            recognizer: self.recognizer.as_ref(),
            classifier: &self.classifier,
            icon_threshold: self.icon_threshold,
        }
    }

    /// Extracts every field of the table. A field that fails is logged and
    /// left out; it never stops the remaining fields.
    pub fn extract_record(&self, overlay: &RgbImage) -> ScanRecord {
        let mut record = ScanRecord::new(Utc::now());

        let full_text = match self
            .recognizer
            .recognize(&to_gray(overlay), RecognitionMode::Block)
        {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("Full overlay OCR failed: {}", e);
                None
            }
        };

        for spec in self.specs {
            match self.extract_field(spec, overlay, full_text.as_deref()) {
                Ok(patch) => {
                    debug!("Field {}: {:?}", spec.key, patch);
                    record.merge(patch);
                }
                Err(e) => warn!("Error during OCR specification {}: {}", spec.key, e),
            }
        }

        record
    }

    fn extract_field(
        &self,
        spec: &FieldSpec,
        overlay: &RgbImage,
        full_text: Option<&str>,
    ) -> ScanResult<ScanPatch> {
        let ctx = self.context();
        match &spec.region {
            Some(region) => {
                let crop = crop_by_spec(overlay, region)?;
                let text = self
                    .recognizer
                    .recognize(&to_gray(&crop), RecognitionMode::Block)?;
                (spec.parser)(&ctx, spec.key, &text, &crop)
            }
            None => {
                let text = full_text.ok_or_else(|| {
                    ScanError::Recognition("full overlay text unavailable".to_string())
                })?;
                (spec.parser)(&ctx, spec.key, text, overlay)
            }
        }
    }
}
