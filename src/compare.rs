use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use serde::Serialize;

use crate::error::{CompareError, Result};
use crate::fast_match;
use crate::index::{self, IndexMode};
use crate::progress::{FileProgress, ProgressSink};
use crate::range_match;
use crate::report::CompareReport;
use crate::window::{MAX_SIG_SIZE, MIN_SIG_SIZE};

/// Comparison algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Sequential range stitching: exact maximal matched byte ranges.
    Precise,
    /// Concurrent per-file signature sets: shared-signature count only.
    Fast,
}

impl Mode {
    /// Parse a mode name; anything but the two defined modes is rejected.
    pub fn parse(s: &str) -> Result<Mode> {
        match s {
            "precise" => Ok(Mode::Precise),
            "fast" => Ok(Mode::Fast),
            other => Err(CompareError::UnsupportedMode(other.to_string())),
        }
    }
}

/// Per-run settings, validated up front by [`compare`].
#[derive(Debug, Clone, Copy)]
pub struct CompareConfig {
    pub sig_size: usize,
    pub mode: Mode,
}

/// Compare two files and produce a unified report.
///
/// The larger file becomes the reference (ties keep file order) and is the
/// side that gets indexed; the other file is streamed against it, so
/// precise-mode ranges carry the non-reference file's offsets. Either a
/// complete report is produced or the run fails without partial output.
pub async fn compare(
    files: [PathBuf; 2],
    config: CompareConfig,
    progress: Arc<dyn ProgressSink>,
) -> Result<CompareReport> {
    if !(MIN_SIG_SIZE..=MAX_SIG_SIZE).contains(&config.sig_size) {
        return Err(CompareError::Config(format!(
            "signature size must be between {MIN_SIG_SIZE}-{MAX_SIG_SIZE} inclusive, got {}",
            config.sig_size
        )));
    }

    let len_a = file_len(&files[0])?;
    let len_b = file_len(&files[1])?;

    let reference = if len_b > len_a { 1 } else { 0 };

    // The scan direction must be able to fill at least one window on each
    // side, so the smaller file bounds the usable signature size.
    let smaller_len = len_a.min(len_b);
    if config.sig_size as u64 > smaller_len {
        return Err(CompareError::Config(format!(
            "signature size {} is bigger than the smaller file ({} bytes)",
            config.sig_size, smaller_len
        )));
    }

    debug!(
        "comparing {} against reference {} ({:?}, signature size {})",
        files[1 - reference].display(),
        files[reference].display(),
        config.mode,
        config.sig_size
    );

    match config.mode {
        Mode::Precise => {
            let sig_size = config.sig_size;
            let reference_path = files[reference].clone();
            let other_path = files[1 - reference].clone();
            let other = 1 - reference;
            let sink = Arc::clone(&progress);

            // One task, fully sequential: the reference index is complete
            // before the second file is streamed against it.
            let (matches, total) = tokio::task::spawn_blocking(move || {
                let ref_index = index::build_from_file(
                    &reference_path,
                    sig_size,
                    IndexMode::Exhaustive,
                    &FileProgress::new(sink.as_ref(), reference),
                )?;
                let matches = range_match::scan_file(
                    &other_path,
                    &ref_index,
                    &FileProgress::new(sink.as_ref(), other),
                )?;
                Ok::<_, CompareError>((matches, ref_index.bytes_scanned()))
            })
            .await??;

            Ok(CompareReport {
                reference,
                mode: config.mode,
                sig_size: config.sig_size,
                matched: matches.matched_bytes,
                total,
                ranges: Some(matches.ranges),
            })
        }
        Mode::Fast => {
            let matches =
                fast_match::compare_files(files, reference, config.sig_size, progress).await?;

            Ok(CompareReport {
                reference,
                mode: config.mode,
                sig_size: config.sig_size,
                matched: matches.matched_sigs,
                total: matches.total_sigs,
                ranges: None,
            })
        }
    }
}

fn file_len(path: &Path) -> Result<u64> {
    let meta = fs::metadata(path).map_err(|e| CompareError::file_access(path, e))?;
    Ok(meta.len())
}
