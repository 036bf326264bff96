use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use sigcmp::compare::{compare, CompareConfig, Mode};
use sigcmp::progress::ProgressSink;
use sigcmp::report;

#[derive(Parser)]
#[command(
    name = "sigcmp",
    about = "Byte-level file similarity via sliding-window signatures"
)]
struct Cli {
    /// First file to compare
    file_a: PathBuf,
    /// Second file to compare
    file_b: PathBuf,
    /// Scan size of each signature, in bytes (1-64)
    #[arg(long, short = 's', default_value_t = 16)]
    size: usize,
    /// Comparison mode: "precise" (matched byte ranges) or "fast" (shared signature count)
    #[arg(long, short = 'm', default_value = "fast", value_parser = Mode::parse)]
    mode: Mode,
    /// Write the report as JSON to this path
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
    /// Sort match ranges by descending length instead of file order
    #[arg(long)]
    sort: bool,
}

/// Progress bars run on a fixed scale; per-byte fractions are deduplicated
/// down to that resolution before the bar is touched.
const BAR_SCALE: u64 = 1000;

struct ScanBars {
    bars: [ProgressBar; 2],
    last: [AtomicU64; 2],
}

impl ScanBars {
    fn new(multi: &MultiProgress, names: [&str; 2]) -> Self {
        let style = ProgressStyle::default_bar()
            .template("  {prefix} [{bar:40.cyan/dim}] {percent}%")
            .unwrap()
            .progress_chars("=> ");
        let bar = |name: &str| {
            let bar = multi.add(ProgressBar::new(BAR_SCALE));
            bar.set_style(style.clone());
            bar.set_prefix(name.to_string());
            bar
        };
        Self {
            bars: [bar(names[0]), bar(names[1])],
            last: [AtomicU64::new(0), AtomicU64::new(0)],
        }
    }

    fn finish(&self) {
        for bar in &self.bars {
            bar.finish_and_clear();
        }
    }
}

impl ProgressSink for ScanBars {
    fn report(&self, file: usize, fraction: f64) {
        let pos = (fraction * BAR_SCALE as f64) as u64;
        if self.last[file].swap(pos, Ordering::Relaxed) != pos {
            self.bars[file].set_position(pos);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = CompareConfig {
        sig_size: cli.size,
        mode: cli.mode,
    };

    let multi = MultiProgress::new();
    let name_a = cli.file_a.display().to_string();
    let name_b = cli.file_b.display().to_string();
    let bars = Arc::new(ScanBars::new(&multi, [&name_a, &name_b]));

    let start = Instant::now();
    let result = compare(
        [cli.file_a, cli.file_b],
        config,
        Arc::clone(&bars) as Arc<dyn ProgressSink>,
    )
    .await;
    bars.finish();
    let mut report = result?;
    let elapsed = start.elapsed();

    if cli.sort {
        if let Some(ranges) = report.ranges.as_mut() {
            report::sort_ranges_longest_first(ranges);
        }
    }

    match report.mode {
        Mode::Precise => {
            let count = report.ranges.as_ref().map(Vec::len).unwrap_or(0);
            println!(
                "The two files are {:.2}% similar. {} matched bytes out of {} reference bytes across {} ranges.",
                report.similarity_percent(),
                report.matched,
                report.total,
                count
            );
        }
        Mode::Fast => {
            println!(
                "The two files are {:.2}% similar. {} sigs found out of {} sigs between the two files.",
                report.similarity_percent(),
                report.matched,
                report.total
            );
        }
    }
    println!("  Time elapsed: {:.3}s", elapsed.as_secs_f64());

    if let Some(path) = &cli.output {
        report::write_json(&report, path)?;
        println!("  Report written to {}", path.display());
    }

    Ok(())
}
