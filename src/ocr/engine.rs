use image::GrayImage;
use log::warn;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use tempfile::NamedTempFile;

use super::preprocess::prepare_for_ocr;
use super::setup::{find_tessdata_dir, find_tesseract_executable};
use crate::config::ScannerConfig;
use crate::error::{ScanError, ScanResult};

/// Layout hint passed to the recognizer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecognitionMode {
    /// A uniform block of text (Tesseract `--psm 6`).
    Block,
    /// A single word or number (Tesseract `--psm 8`).
    SingleWord,
}

impl RecognitionMode {
    pub fn page_segmentation_mode(self) -> u8 {
        match self {
            RecognitionMode::Block => 6,
            RecognitionMode::SingleWord => 8,
        }
    }
}

/// Turns an image into text.
///
/// Implementations must be shareable across recognition workers.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, img: &GrayImage, mode: RecognitionMode) -> ScanResult<String>;
}

/// Recognizer backed by the Tesseract command line tool.
#[derive(Clone, Debug)]
pub struct TesseractRecognizer {
    executable: PathBuf,
    tessdata: Option<PathBuf>,
}

impl TesseractRecognizer {
    pub fn new(executable: PathBuf, tessdata: Option<PathBuf>) -> Self {
        Self {
            executable,
            tessdata,
        }
    }

    /// Locates Tesseract using the configured paths first, then the system.
    pub fn from_config(config: &ScannerConfig) -> anyhow::Result<Self> {
        let executable = find_tesseract_executable(config.tesseract_path.as_deref())?;
        let tessdata = match find_tessdata_dir(config.tessdata_dir.as_deref()) {
            Ok(dir) => Some(dir),
            Err(e) => {
                warn!("{}; relying on Tesseract's built-in tessdata lookup", e);
                None
            }
        };
        Ok(Self::new(executable, tessdata))
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&self, img: &GrayImage, mode: RecognitionMode) -> ScanResult<String> {
        let prepared = prepare_for_ocr(img);

        // Save image to temporary file
        let temp_input = NamedTempFile::with_suffix(".png")?;
        prepared.save(temp_input.path())?;

        let mut command = Command::new(&self.executable);
        command
            .arg(temp_input.path())
            .arg("stdout")
            .arg("-l")
            .arg("eng")
            .arg("--oem")
            .arg("3")
            .arg("--psm")
            .arg(mode.page_segmentation_mode().to_string());
        if let Some(tessdata) = &self.tessdata {
            command.arg("--tessdata-dir").arg(tessdata);
        }

        let output = command
            .output()
            .map_err(|e| ScanError::Recognition(format!("failed to run Tesseract: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ScanError::Recognition(format!(
                "Tesseract failed: {}",
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Stands in when Tesseract cannot be found. Every call fails, so each field
/// is logged and left empty.
#[derive(Clone, Debug)]
pub struct UnavailableRecognizer {
    reason: String,
}

impl UnavailableRecognizer {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl TextRecognizer for UnavailableRecognizer {
    fn recognize(&self, _img: &GrayImage, _mode: RecognitionMode) -> ScanResult<String> {
        Err(ScanError::Recognition(self.reason.clone()))
    }
}

/// Builds the recognizer for the pipeline. A missing Tesseract install is
/// not fatal: scanning continues with text fields left empty.
pub fn recognizer_from_config(config: &ScannerConfig) -> Arc<dyn TextRecognizer> {
    match TesseractRecognizer::from_config(config) {
        Ok(recognizer) => Arc::new(recognizer),
        Err(e) => {
            warn!("Tesseract not available: {:#}", e);
            warn!("Text fields will be empty until Tesseract is installed.");
            Arc::new(UnavailableRecognizer::new(format!(
                "Tesseract not available: {:#}",
                e
            )))
        }
    }
}
