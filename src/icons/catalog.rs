//! Reference icon catalog.
//!
//! One `<feature>.png` per known feature icon. The file stem is the feature
//! name. Loaded once before any worker starts and shared read-only.

use image::GrayImage;
use log::{info, warn};
use std::fs;
use std::path::Path;

use crate::error::{ScanError, ScanResult};
use crate::geometry::crop_bright_box;
use crate::ocr::to_gray;
use crate::storage::FEATURE_NAMES;

/// A named reference icon, kept only in its bright-box normalized form.
#[derive(Clone, Debug)]
pub struct IconTemplate {
    pub name: String,
    /// Reference cropped to its bright box; `None` when it has none
    pub normalized: Option<GrayImage>,
}

impl IconTemplate {
    pub fn new(name: impl Into<String>, reference: GrayImage, marker: u8) -> Self {
        Self {
            name: name.into(),
            normalized: crop_bright_box(&reference, marker),
        }
    }
}

/// Immutable set of reference icons.
#[derive(Clone, Debug, Default)]
pub struct IconCatalog {
    templates: Vec<IconTemplate>,
}

impl IconCatalog {
    pub fn from_templates(templates: Vec<IconTemplate>) -> Self {
        Self { templates }
    }

    /// Loads every `.png` in `dir`, sorted by file name.
    ///
    /// Fails when the directory cannot be read, an icon cannot be decoded, or
    /// no icon is found at all.
    pub fn load_dir(dir: &Path, marker: u8) -> ScanResult<Self> {
        let entries = fs::read_dir(dir).map_err(|e| {
            ScanError::CatalogLoad(format!("cannot read {}: {}", dir.display(), e))
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| ScanError::CatalogLoad(format!("{}: {}", dir.display(), e)))?
                .path();
            let is_png = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
            if path.is_file() && is_png {
                paths.push(path);
            }
        }
        paths.sort();

        let mut templates = Vec::with_capacity(paths.len());
        for path in paths {
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
            else {
                warn!("Skipping icon with non UTF-8 name: {}", path.display());
                continue;
            };
            let img = image::open(&path).map_err(|e| {
                ScanError::CatalogLoad(format!("cannot decode {}: {}", path.display(), e))
            })?;

            if !FEATURE_NAMES.contains(&name.as_str()) {
                warn!(
                    "Icon '{}' has no matching feature column and will never be stored",
                    name
                );
            }

            let template = IconTemplate::new(name, to_gray(&img.to_rgb8()), marker);
            if template.normalized.is_none() {
                warn!(
                    "Icon '{}' has no pixels of value {} and can never match",
                    template.name, marker
                );
            }
            templates.push(template);
        }

        if templates.is_empty() {
            return Err(ScanError::CatalogLoad(format!(
                "no .png icons in {}",
                dir.display()
            )));
        }

        info!(
            "Loaded {} icons: {}",
            templates.len(),
            templates
                .iter()
                .map(|t| t.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self::from_templates(templates))
    }

    pub fn templates(&self) -> &[IconTemplate] {
        &self.templates
    }
}
