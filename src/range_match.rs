use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use log::debug;

use crate::error::CompareError;
use crate::index::{FileIndex, READ_BUF_SIZE};
use crate::progress::FileProgress;
use crate::report::MatchRange;
use crate::window::SigWindow;

/// Byte ranges of the scanned file proven to occur contiguously in the
/// reference file, plus the total byte count they cover.
pub struct RangeMatches {
    /// In emission order, i.e. ascending offset. Non-overlapping, maximal,
    /// each at least one window long.
    pub ranges: Vec<MatchRange>,
    pub matched_bytes: u64,
}

/// An in-progress sequence of consecutive matching windows.
///
/// Consecutive windows start one byte apart, so window k of the run must
/// match the reference at `candidate + k` for the alignment to hold.
struct Run {
    /// Offset in the scanned file where the first matched window starts.
    start: u64,
    /// Matched windows so far.
    windows: u64,
    /// Reference offsets still consistent with every window of the run.
    candidates: Vec<u64>,
}

/// State machine turning per-window match results into maximal ranges.
struct RangeMatcher<'a> {
    reference: &'a FileIndex,
    sig_size: usize,
    run: Option<Run>,
    /// Window starts left to pass over without match evaluation because they
    /// fall inside the tail of a range that was just emitted.
    skip: usize,
    ranges: Vec<MatchRange>,
    matched_bytes: u64,
}

impl<'a> RangeMatcher<'a> {
    fn new(reference: &'a FileIndex) -> Self {
        Self {
            reference,
            sig_size: reference.sig_size(),
            run: None,
            skip: 0,
            ranges: Vec::new(),
            matched_bytes: 0,
        }
    }

    /// Evaluate the full window starting at `start` with signature `sig`.
    fn step(&mut self, start: u64, sig: u32) {
        if self.skip > 0 {
            self.skip -= 1;
            return;
        }

        let reference = self.reference;
        let offsets = reference.offsets(sig);

        let Some(mut run) = self.run.take() else {
            if !offsets.is_empty() {
                self.run = Some(Run {
                    start,
                    windows: 1,
                    candidates: offsets.to_vec(),
                });
            }
            return;
        };

        if offsets.is_empty() {
            self.emit(run);
            return;
        }

        // A candidate survives only if the reference also matches at the
        // position extending the alignment established so far; matching
        // "somewhere" is not enough to continue the run.
        let extend = run.windows;
        run.candidates
            .retain(|&c| offsets.binary_search(&(c + extend)).is_ok());

        if run.candidates.is_empty() {
            // No consistent alignment runs through this window. It starts
            // inside the emitted tail, so it seeds no new run either.
            self.emit(run);
        } else {
            run.windows += 1;
            self.run = Some(run);
        }
    }

    /// Emit a terminated run as a maximal range and arm the skip counter
    /// over the remaining window starts inside the emitted tail.
    fn emit(&mut self, run: Run) {
        let length = run.windows + self.sig_size as u64 - 1;
        self.matched_bytes += length;
        self.ranges.push(MatchRange {
            offset: run.start,
            length,
        });
        self.skip = self.sig_size.saturating_sub(2);
    }

    /// Flush the final run, if the stream ended while one was active.
    fn finish(mut self) -> RangeMatches {
        if let Some(run) = self.run.take() {
            self.emit(run);
        }
        RangeMatches {
            ranges: self.ranges,
            matched_bytes: self.matched_bytes,
        }
    }
}

/// Stream `reader` against an exhaustive reference index, stitching adjacent
/// window matches into maximal contiguous ranges.
///
/// Skipped byte positions still feed the window so that window contents stay
/// aligned with the stream; only the match evaluation is suppressed for them.
pub fn scan_from_reader<R: Read>(
    mut reader: R,
    total_len: u64,
    reference: &FileIndex,
    progress: &FileProgress,
) -> io::Result<RangeMatches> {
    let sig_size = reference.sig_size();
    let mut window = SigWindow::new(sig_size);
    let mut matcher = RangeMatcher::new(reference);
    let mut pos: u64 = 0;
    let mut buf = vec![0u8; READ_BUF_SIZE];

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        for &byte in &buf[..n] {
            window.push(byte);
            pos += 1;
            if total_len > 0 {
                progress.report(pos as f64 / total_len as f64);
            }
            if window.is_full() {
                matcher.step(pos - sig_size as u64, window.digest());
            }
        }
    }

    Ok(matcher.finish())
}

/// Open `path` and scan it against `reference`.
pub fn scan_file(
    path: &Path,
    reference: &FileIndex,
    progress: &FileProgress,
) -> Result<RangeMatches, CompareError> {
    let file = File::open(path).map_err(|e| CompareError::file_access(path, e))?;
    let total_len = file
        .metadata()
        .map_err(|e| CompareError::file_access(path, e))?
        .len();

    if reference.sig_size() as u64 > total_len {
        return Err(CompareError::Config(format!(
            "signature size {} is bigger than {} ({} bytes)",
            reference.sig_size(),
            path.display(),
            total_len
        )));
    }

    let matches = scan_from_reader(file, total_len, reference, progress)
        .map_err(|e| CompareError::file_access(path, e))?;

    debug!(
        "{}: {} matched bytes across {} ranges",
        path.display(),
        matches.matched_bytes,
        matches.ranges.len()
    );

    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{build_from_reader, IndexMode};
    use crate::progress::NoProgress;
    use std::io::Cursor;

    fn matches_of(reference: &[u8], scanned: &[u8], sig_size: usize) -> RangeMatches {
        let sink = NoProgress;
        let progress = FileProgress::new(&sink, 0);
        let index = build_from_reader(
            Cursor::new(reference),
            reference.len() as u64,
            sig_size,
            IndexMode::Exhaustive,
            &progress,
        )
        .unwrap();
        scan_from_reader(
            Cursor::new(scanned),
            scanned.len() as u64,
            &index,
            &progress,
        )
        .unwrap()
    }

    fn as_pairs(matches: &RangeMatches) -> Vec<(u64, u64)> {
        matches.ranges.iter().map(|r| (r.offset, r.length)).collect()
    }

    #[test]
    fn test_identical_inputs_yield_one_full_range() {
        let data: Vec<u8> = (0u16..300).map(|i| (i % 251) as u8).collect();
        let matches = matches_of(&data, &data, 16);
        assert_eq!(as_pairs(&matches), vec![(0, data.len() as u64)]);
        assert_eq!(matches.matched_bytes, data.len() as u64);
    }

    #[test]
    fn test_identical_repetitive_inputs_yield_one_full_range() {
        // Every window has many candidate offsets; the run must still cover
        // the whole input as a single range.
        let data = vec![0x5Au8; 128];
        let matches = matches_of(&data, &data, 8);
        assert_eq!(as_pairs(&matches), vec![(0, 128)]);
    }

    #[test]
    fn test_disjoint_inputs_yield_nothing() {
        let a = vec![0x00u8; 64];
        let b = vec![0xFFu8; 64];
        let matches = matches_of(&a, &b, 8);
        assert!(matches.ranges.is_empty());
        assert_eq!(matches.matched_bytes, 0);
    }

    #[test]
    fn test_shared_prefix_emits_single_window_range() {
        let matches = matches_of(b"AAAABBBB", b"AAAACCCC", 4);
        assert_eq!(as_pairs(&matches), vec![(0, 4)]);
        assert_eq!(matches.matched_bytes, 4);
    }

    #[test]
    fn test_misaligned_shared_blocks_split_into_two_ranges() {
        // Both halves occur in the reference, but swapped, so no 4-byte
        // contiguous alignment exists.
        let matches = matches_of(&[1, 2, 3, 4], &[3, 4, 1, 2], 2);
        assert_eq!(as_pairs(&matches), vec![(0, 2), (2, 2)]);
        assert_eq!(matches.matched_bytes, 4);
    }

    #[test]
    fn test_candidate_filter_keeps_consistent_alignment() {
        // "ab" occurs at reference offsets 0 and 3; only offset 0 can be
        // extended by "bc", so the run continues through it.
        let matches = matches_of(b"abcab", b"abc", 2);
        assert_eq!(as_pairs(&matches), vec![(0, 3)]);
        assert_eq!(matches.matched_bytes, 3);
    }

    #[test]
    fn test_known_signature_without_alignment_ends_run() {
        // "bc" exists in the reference but not right after "ab"; the run
        // must end instead of chaining unrelated positions.
        let matches = matches_of(b"abxbc", b"abc", 2);
        assert_eq!(as_pairs(&matches), vec![(0, 2)]);
        assert_eq!(matches.matched_bytes, 2);
    }

    #[test]
    fn test_run_active_at_end_of_stream_is_emitted() {
        let matches = matches_of(b"XXXXabcd", b"ZZZZabcd", 4);
        assert_eq!(as_pairs(&matches), vec![(4, 4)]);
    }

    #[test]
    fn test_two_separated_shared_blocks() {
        let reference = b"....aaaabbbbcccc....";
        let scanned = b"aaaabbbbZZZZZZcccc";
        let matches = matches_of(reference, scanned, 4);
        assert_eq!(as_pairs(&matches), vec![(0, 8), (14, 4)]);
        assert_eq!(matches.matched_bytes, 12);
    }

    #[test]
    fn test_ranges_are_non_overlapping_and_at_least_one_window() {
        let reference: Vec<u8> = (0u16..400).map(|i| (i * 7 % 256) as u8).collect();
        let mut scanned = reference.clone();
        // Corrupt a few scattered bytes to force several distinct runs.
        for &i in &[50usize, 151, 152, 260] {
            scanned[i] ^= 0xA5;
        }
        let matches = matches_of(&reference, &scanned, 8);
        assert!(!matches.ranges.is_empty());
        let mut prev_end = 0u64;
        for range in &matches.ranges {
            assert!(range.length >= 8);
            assert!(range.offset >= prev_end);
            prev_end = range.offset + range.length;
        }
    }

    #[test]
    fn test_single_byte_windows() {
        let matches = matches_of(b"ab", b"bx", 1);
        assert_eq!(as_pairs(&matches), vec![(0, 1)]);
    }
}
