//! Line-driven capture trigger.
//!
//! Each input line names a screenshot file. The file is loaded and handed to
//! the pipeline without waiting for it to be processed. `quit` or end of
//! input stops the trigger.

use log::{error, info, warn};
use std::io::BufRead;
use std::path::Path;

use crate::error::ScanResult;
use crate::pipeline::{CapturedImage, Submitted};

const QUIT_COMMAND: &str = "quit";

#[derive(Debug, Default, PartialEq, Eq)]
pub struct TriggerStats {
    pub queued: usize,
    pub dropped: usize,
    pub unreadable: usize,
}

/// Loads a screenshot from disk as the capture for one trigger.
pub fn capture_from_file(path: &Path) -> ScanResult<CapturedImage> {
    let image = image::open(path)?.to_rgb8();
    Ok(CapturedImage::new(image, path.display().to_string()))
}

/// Reads trigger lines until `quit` or end of input.
pub fn run_trigger<R, F>(input: R, mut submit: F) -> TriggerStats
where
    R: BufRead,
    F: FnMut(CapturedImage) -> Submitted,
{
    let mut stats = TriggerStats::default();

    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to read trigger input: {}", e);
                break;
            }
        };
        let entry = line.trim();
        if entry.is_empty() {
            continue;
        }
        if entry.eq_ignore_ascii_case(QUIT_COMMAND) {
            info!("Quit requested");
            break;
        }

        info!("Taking screenshot from {}...", entry);
        let captured = match capture_from_file(Path::new(entry)) {
            Ok(captured) => captured,
            Err(e) => {
                warn!("Error during capture of {}: {}", entry, e);
                stats.unreadable += 1;
                continue;
            }
        };

        match submit(captured) {
            Submitted::Queued => stats.queued += 1,
            Submitted::Full | Submitted::Closed => stats.dropped += 1,
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use std::io::Cursor;
    use tempfile::tempdir;

    #[test]
    fn test_lines_become_captures_until_quit() {
        let dir = tempdir().unwrap();
        let shot = dir.path().join("shot.png");
        RgbImage::new(12, 8).save(&shot).unwrap();

        let input = format!(
            "{0}\n\n{1}\nquit\n{0}\n",
            shot.display(),
            dir.path().join("missing.png").display()
        );
        let mut seen = Vec::new();
        let stats = run_trigger(Cursor::new(input), |captured| {
            seen.push((captured.image.width(), captured.image.height()));
            Submitted::Queued
        });

        assert_eq!(seen, vec![(12, 8)]);
        assert_eq!(
            stats,
            TriggerStats {
                queued: 1,
                dropped: 0,
                unreadable: 1
            }
        );
    }

    #[test]
    fn test_full_queue_counts_as_dropped() {
        let dir = tempdir().unwrap();
        let shot = dir.path().join("shot.png");
        RgbImage::new(4, 4).save(&shot).unwrap();

        let input = format!("{0}\n{0}\n", shot.display());
        let stats = run_trigger(Cursor::new(input), |_| Submitted::Full);
        assert_eq!(stats.dropped, 2);
        assert_eq!(stats.queued, 0);
    }

    #[test]
    fn test_end_of_input_stops() {
        let stats = run_trigger(Cursor::new(""), |_| Submitted::Queued);
        assert_eq!(stats, TriggerStats::default());
    }
}
