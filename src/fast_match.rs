use std::path::PathBuf;
use std::sync::Arc;

use log::debug;

use crate::error::Result;
use crate::index::{self, FileIndex, IndexMode};
use crate::progress::{FileProgress, ProgressSink};

/// Count of deduplicated window signatures shared by both files, reported
/// against the reference file's distinct signature count.
///
/// Positions and adjacency are deliberately dropped here: this answers "how
/// many signature-sized content blocks are shared", not "which byte ranges".
pub struct FastMatches {
    pub matched_sigs: u64,
    pub total_sigs: u64,
}

/// Index both files concurrently and intersect their signature sets.
///
/// Each scan owns its own stream and index; the tasks never communicate
/// until both complete at the join.
pub async fn compare_files(
    files: [PathBuf; 2],
    reference: usize,
    sig_size: usize,
    progress: Arc<dyn ProgressSink>,
) -> Result<FastMatches> {
    let [path_a, path_b] = files;
    let progress_a = Arc::clone(&progress);
    let progress_b = Arc::clone(&progress);

    let (index_a, index_b) = tokio::try_join!(
        tokio::task::spawn_blocking(move || {
            index::build_from_file(
                &path_a,
                sig_size,
                IndexMode::Deduplicated,
                &FileProgress::new(progress_a.as_ref(), 0),
            )
        }),
        tokio::task::spawn_blocking(move || {
            index::build_from_file(
                &path_b,
                sig_size,
                IndexMode::Deduplicated,
                &FileProgress::new(progress_b.as_ref(), 1),
            )
        }),
    )?;
    let index_a = index_a?;
    let index_b = index_b?;

    if reference == 0 {
        Ok(intersect(&index_a, &index_b))
    } else {
        Ok(intersect(&index_b, &index_a))
    }
}

/// Count signatures of `reference` that are also present in `other`.
fn intersect(reference: &FileIndex, other: &FileIndex) -> FastMatches {
    let matched_sigs = reference.sigs().filter(|&sig| other.contains(sig)).count() as u64;
    let total_sigs = reference.distinct_sigs() as u64;

    debug!("{matched_sigs} of {total_sigs} reference signatures shared");

    FastMatches {
        matched_sigs,
        total_sigs,
    }
}
