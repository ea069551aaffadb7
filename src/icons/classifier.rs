use image::imageops::{self, FilterType};
use image::GrayImage;
use std::sync::Arc;

use super::catalog::{IconCatalog, IconTemplate};
use super::ssim::structural_similarity;
use crate::geometry::crop_bright_box;

/// Best catalog match for a candidate icon.
#[derive(Clone, Debug, PartialEq)]
pub struct IconMatch {
    pub name: String,
    pub score: f64,
}

/// Identifies feature icons by structural similarity against the catalog.
#[derive(Clone, Debug)]
pub struct IconClassifier {
    catalog: Arc<IconCatalog>,
    marker: u8,
}

impl IconClassifier {
    pub fn new(catalog: Arc<IconCatalog>, marker: u8) -> Self {
        Self { catalog, marker }
    }

    /// Scores a bright-box crop against one template. The template is resized
    /// to the candidate; anything that cannot be compared scores 0.
    fn score_normalized(&self, candidate: &GrayImage, template: &IconTemplate) -> f64 {
        let Some(reference) = template.normalized.as_ref() else {
            return 0.0;
        };
        let resized;
        let reference = if reference.dimensions() != candidate.dimensions() {
            let (w, h) = candidate.dimensions();
            resized = imageops::resize(reference, w, h, FilterType::Triangle);
            &resized
        } else {
            reference
        };
        structural_similarity(candidate, reference).unwrap_or(0.0)
    }

    /// Returns the highest scoring template, or `None` for an empty catalog.
    ///
    /// The candidate is cropped to its bright box first. No threshold is
    /// applied here.
    pub fn classify(&self, candidate: &GrayImage) -> Option<IconMatch> {
        let normalized = crop_bright_box(candidate, self.marker);

        self.catalog
            .templates()
            .iter()
            .map(|template| {
                let score = normalized
                    .as_ref()
                    .map(|c| self.score_normalized(c, template))
                    .unwrap_or(0.0);
                IconMatch {
                    name: template.name.clone(),
                    score,
                }
            })
            .fold(None, |best: Option<IconMatch>, m| match best {
                Some(b) if b.score >= m.score => Some(b),
                _ => Some(m),
            })
    }
}
