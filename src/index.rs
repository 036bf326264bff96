use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use log::debug;

use crate::error::CompareError;
use crate::progress::FileProgress;
use crate::window::SigWindow;

/// 256 KB reads keep syscall overhead low when scanning large files.
pub(crate) const READ_BUF_SIZE: usize = 256 * 1024;

/// How window-start offsets are recorded during an index build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMode {
    /// Record every offset a signature occurs at.
    Exhaustive,
    /// Record only the first occurrence of each signature.
    Deduplicated,
}

/// Per-file mapping from window signature to the offsets that produced it.
///
/// Read-only once built. Offsets under each signature are in ascending order
/// because the scan visits window starts in order.
pub struct FileIndex {
    sig_size: usize,
    sigs: HashMap<u32, Vec<u64>>,
    bytes_scanned: u64,
}

impl FileIndex {
    /// All offsets recorded for `sig`; empty if the signature never occurred.
    pub fn offsets(&self, sig: u32) -> &[u64] {
        self.sigs.get(&sig).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, sig: u32) -> bool {
        self.sigs.contains_key(&sig)
    }

    pub fn distinct_sigs(&self) -> usize {
        self.sigs.len()
    }

    pub fn sigs(&self) -> impl Iterator<Item = u32> + '_ {
        self.sigs.keys().copied()
    }

    pub fn bytes_scanned(&self) -> u64 {
        self.bytes_scanned
    }

    pub fn sig_size(&self) -> usize {
        self.sig_size
    }
}

/// Build an index by scanning `reader` once, byte by byte.
///
/// After each byte that leaves the window full, the window-start offset
/// (current position − sig_size) is recorded under the current signature.
pub fn build_from_reader<R: Read>(
    mut reader: R,
    total_len: u64,
    sig_size: usize,
    mode: IndexMode,
    progress: &FileProgress,
) -> io::Result<FileIndex> {
    let mut window = SigWindow::new(sig_size);
    let mut sigs: HashMap<u32, Vec<u64>> = HashMap::new();
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
            if !window.is_full() {
                continue;
            }
            let start = pos - sig_size as u64;
            match mode {
                IndexMode::Exhaustive => {
                    sigs.entry(window.digest()).or_default().push(start);
                }
                IndexMode::Deduplicated => {
                    sigs.entry(window.digest()).or_insert_with(|| vec![start]);
                }
            }
        }
    }

    Ok(FileIndex {
        sig_size,
        sigs,
        bytes_scanned: pos,
    })
}

/// Open `path` and index it with windows of `sig_size` bytes.
pub fn build_from_file(
    path: &Path,
    sig_size: usize,
    mode: IndexMode,
    progress: &FileProgress,
) -> Result<FileIndex, CompareError> {
    let file = File::open(path).map_err(|e| CompareError::file_access(path, e))?;
    let total_len = file
        .metadata()
        .map_err(|e| CompareError::file_access(path, e))?
        .len();

    // A window can never fill against a file shorter than the window itself.
    if sig_size as u64 > total_len {
        return Err(CompareError::Config(format!(
            "signature size {} is bigger than {} ({} bytes)",
            sig_size,
            path.display(),
            total_len
        )));
    }

    let index = build_from_reader(file, total_len, sig_size, mode, progress)
        .map_err(|e| CompareError::file_access(path, e))?;

    debug!(
        "{}: {} distinct signatures over {} bytes",
        path.display(),
        index.distinct_sigs(),
        index.bytes_scanned()
    );

    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use std::io::Cursor;

    fn index_of(data: &[u8], sig_size: usize, mode: IndexMode) -> FileIndex {
        let sink = NoProgress;
        build_from_reader(
            Cursor::new(data),
            data.len() as u64,
            sig_size,
            mode,
            &FileProgress::new(&sink, 0),
        )
        .unwrap()
    }

    fn sig_of(data: &[u8]) -> u32 {
        let mut window = SigWindow::new(data.len());
        for &byte in data {
            window.push(byte);
        }
        window.digest()
    }

    #[test]
    fn test_exhaustive_records_every_offset() {
        let index = index_of(b"ababab", 2, IndexMode::Exhaustive);
        assert_eq!(index.offsets(sig_of(b"ab")), &[0, 2, 4]);
        assert_eq!(index.offsets(sig_of(b"ba")), &[1, 3]);
        assert_eq!(index.distinct_sigs(), 2);
        assert_eq!(index.bytes_scanned(), 6);
    }

    #[test]
    fn test_deduplicated_records_first_occurrence_only() {
        let index = index_of(b"ababab", 2, IndexMode::Deduplicated);
        assert_eq!(index.offsets(sig_of(b"ab")), &[0]);
        assert_eq!(index.offsets(sig_of(b"ba")), &[1]);
        assert_eq!(index.distinct_sigs(), 2);
    }

    #[test]
    fn test_unknown_signature_has_no_offsets() {
        let index = index_of(b"aaaa", 2, IndexMode::Exhaustive);
        assert!(index.offsets(sig_of(b"zz")).is_empty());
        assert!(!index.contains(sig_of(b"zz")));
        assert!(index.contains(sig_of(b"aa")));
    }

    #[test]
    fn test_window_spanning_whole_input() {
        let index = index_of(b"abcd", 4, IndexMode::Exhaustive);
        assert_eq!(index.offsets(sig_of(b"abcd")), &[0]);
        assert_eq!(index.distinct_sigs(), 1);
    }
}
