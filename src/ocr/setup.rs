use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

const TESSDATA_REPO: &str = "https://github.com/tesseract-ocr/tessdata/raw/main";
const ENG_TRAINEDDATA: &str = "eng.traineddata";

const COMMON_EXECUTABLES: [&str; 4] = [
    "/usr/bin/tesseract",
    "/usr/local/bin/tesseract",
    r"C:\Program Files\Tesseract-OCR\tesseract.exe",
    r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
];

const SYSTEM_TESSDATA_DIRS: [&str; 6] = [
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4.00/tessdata",
    "/usr/share/tessdata",
    "/usr/local/share/tessdata",
    r"C:\Program Files\Tesseract-OCR\tessdata",
    r"C:\Program Files (x86)\Tesseract-OCR\tessdata",
];

/// Returns the directory for locally downloaded tessdata.
pub fn get_local_tessdata_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("xo-parts-scanner")
        .join("tessdata")
}

fn has_eng(dir: &Path) -> bool {
    dir.join(ENG_TRAINEDDATA).exists()
}

fn runs_from_path(program: &str) -> bool {
    Command::new(program)
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Finds the Tesseract executable: configured path, then PATH, then common
/// install locations.
pub fn find_tesseract_executable(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        warn!(
            "Configured Tesseract executable not found: {}",
            path.display()
        );
    }

    if runs_from_path("tesseract") {
        return Ok(PathBuf::from("tesseract"));
    }

    COMMON_EXECUTABLES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .ok_or_else(|| anyhow!("Tesseract not found. Please install Tesseract-OCR."))
}

/// Finds a tessdata directory containing `eng.traineddata`.
pub fn find_tessdata_dir(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = configured {
        if has_eng(dir) {
            return Ok(dir.to_path_buf());
        }
        warn!(
            "Configured tessdata dir has no {}: {}",
            ENG_TRAINEDDATA,
            dir.display()
        );
    }

    let local = get_local_tessdata_dir();
    if has_eng(&local) {
        return Ok(local);
    }

    if let Some(dir) = SYSTEM_TESSDATA_DIRS
        .iter()
        .map(PathBuf::from)
        .find(|p| has_eng(p))
    {
        return Ok(dir);
    }

    // Check TESSDATA_PREFIX environment variable
    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        let p = PathBuf::from(&prefix);
        if has_eng(&p) {
            return Ok(p);
        }
        let p = p.join("tessdata");
        if has_eng(&p) {
            return Ok(p);
        }
    }

    Err(anyhow!(
        "tessdata directory not found. Please ensure {} is available.",
        ENG_TRAINEDDATA
    ))
}

/// Makes sure English trained data is available, downloading it into the
/// local data dir when allowed.
pub fn ensure_tessdata(configured: Option<&Path>, allow_download: bool) -> Result<PathBuf> {
    if let Ok(dir) = find_tessdata_dir(configured) {
        info!("Using tessdata at: {}", dir.display());
        return Ok(dir);
    }

    if !allow_download {
        return Err(anyhow!(
            "{} not found and downloading is disabled",
            ENG_TRAINEDDATA
        ));
    }

    let dir = get_local_tessdata_dir();
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    download_tessdata(&dir)?;
    Ok(dir)
}

/// Downloads English trained data
fn download_tessdata(tessdata_dir: &Path) -> Result<()> {
    let eng_url = format!("{}/{}", TESSDATA_REPO, ENG_TRAINEDDATA);
    let eng_path = tessdata_dir.join(ENG_TRAINEDDATA);

    info!("Downloading {}...", ENG_TRAINEDDATA);

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()?;

    let response = client
        .get(&eng_url)
        .header("User-Agent", "xo-parts-scanner")
        .send()?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "Failed to download {}: HTTP {}",
            ENG_TRAINEDDATA,
            response.status()
        ));
    }

    let bytes = response.bytes()?;
    let mut file = fs::File::create(&eng_path)?;
    file.write_all(&bytes)?;

    info!("Downloaded {} ({} bytes)", ENG_TRAINEDDATA, bytes.len());

    Ok(())
}
