use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::compare::Mode;

/// A maximal contiguous byte span of the scanned file proven to occur in the
/// reference file. Offsets are relative to the scanned (non-reference) file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MatchRange {
    pub offset: u64,
    pub length: u64,
}

/// Final result of one comparison run.
#[derive(Debug, PartialEq, Serialize)]
pub struct CompareReport {
    /// Which of the two input files served as the reference (0 or 1).
    pub reference: usize,
    pub mode: Mode,
    pub sig_size: usize,
    /// Matched bytes (precise) or shared signatures (fast).
    pub matched: u64,
    /// Reference bytes (precise) or reference distinct signatures (fast).
    pub total: u64,
    /// Match ranges, precise mode only, in emission order (ascending offset).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ranges: Option<Vec<MatchRange>>,
}

impl CompareReport {
    pub fn similarity_percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.matched as f64 / self.total as f64 * 100.0
    }
}

/// Reorder ranges longest-first for display; ties keep ascending offsets.
pub fn sort_ranges_longest_first(ranges: &mut [MatchRange]) {
    ranges.sort_by(|x, y| y.length.cmp(&x.length).then(x.offset.cmp(&y.offset)));
}

/// Write the report as pretty-printed JSON.
pub fn write_json(report: &CompareReport, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), report)
        .with_context(|| format!("Failed to write report: {}", path.display()))?;
    Ok(())
}
