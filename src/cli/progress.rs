//! Progress bar rendering and summary printing for CLI downloads.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::progress::{ProgressEvent, ProgressSink};
use crate::{AlbumResult, ProgressSnapshot, format_bytes, format_duration};

const SEPARATOR: &str = "────────────────────────────────────────────────────────────";

/// Renders the event stream as live progress bars: one spinner per
/// in-flight asset above a batch-wide total bar.
pub struct BarSink {
    multi: MultiProgress,
    total: ProgressBar,
    bars: Mutex<HashMap<(String, usize), ProgressBar>>,
}

impl BarSink {
    /// Creates the renderer with an empty total bar; album events grow it.
    #[must_use]
    pub fn new() -> Self {
        let multi = MultiProgress::new();
        let total = multi.add(make_total_bar());
        total.enable_steady_tick(Duration::from_millis(250));
        Self {
            multi,
            total,
            bars: Mutex::new(HashMap::new()),
        }
    }

    /// Clears all bars; call once the batch is done.
    pub fn finish(&self) {
        self.total.finish_and_clear();
        let _ = self.multi.clear();
    }

    fn take_bar(&self, key: &(String, usize)) -> Option<ProgressBar> {
        self.bars.lock().expect("bar map poisoned").remove(key)
    }
}

impl Default for BarSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for BarSink {
    fn on_event(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::AlbumStarted { total, .. } => {
                self.total.inc_length(*total as u64);
            }
            ProgressEvent::Started { album, index } => {
                let bar = self
                    .multi
                    .insert_before(&self.total, make_asset_bar(&format!("{album} #{index}")));
                self.bars
                    .lock()
                    .expect("bar map poisoned")
                    .insert((album.to_string(), *index), bar);
            }
            ProgressEvent::Transferred { album, index, bytes } => {
                let bars = self.bars.lock().expect("bar map poisoned");
                if let Some(bar) = bars.get(&(album.to_string(), *index)) {
                    bar.inc(*bytes);
                }
            }
            ProgressEvent::Finished { album, index } => {
                if let Some(bar) = self.take_bar(&(album.to_string(), *index)) {
                    bar.finish_and_clear();
                }
                self.total.inc(1);
            }
            ProgressEvent::Failed { album, index, .. } => {
                if let Some(bar) = self.take_bar(&(album.to_string(), *index)) {
                    bar.abandon();
                }
                self.total.inc(1);
            }
            ProgressEvent::Skipped { .. } => {
                self.total.inc(1);
            }
        }
    }
}

/// Spinner for one in-flight asset; asset sizes are not known up front, so
/// it counts bytes rather than percent.
fn make_asset_bar(name: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {bytes} @ {bytes_per_sec} - {msg}")
            .expect("progress template is valid"),
    );
    bar.set_message(name.to_string());
    bar
}

/// Batch-wide bar counting terminal assets.
fn make_total_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("Total [{bar:40.green/white}] {pos}/{len} asset(s)")
            .expect("template valid")
            .progress_chars("━━╌"),
    );
    bar
}

/// Prints the one-line result of a single album.
pub fn print_album_summary(result: &AlbumResult) {
    if result.already_complete {
        println!(
            "{} album {} already downloaded",
            style("•").cyan(),
            result.id
        );
    } else if result.failed.is_empty() && result.cancelled == 0 {
        println!(
            "{} album {}: {} downloaded, {} already on disk",
            style("✓").green(),
            result.id,
            result.succeeded,
            result.skipped_assets
        );
    } else if result.cancelled > 0 {
        println!(
            "{} album {}: interrupted with {} asset(s) pending, will retry next run",
            style("!").yellow(),
            result.id,
            result.cancelled
        );
    } else {
        println!(
            "{} album {}: {} of {} asset(s) failed, will retry next run",
            style("✗").red(),
            result.id,
            result.failed.len(),
            result.total
        );
    }
}

/// Prints aggregate statistics once the whole batch is done.
pub fn print_batch_summary(snapshot: &ProgressSnapshot, elapsed: Duration) {
    if snapshot.done() == 0 {
        return;
    }

    println!("\n{SEPARATOR}");
    println!("Batch Summary");
    println!("{SEPARATOR}");
    println!("  Assets downloaded: {}", snapshot.finished);
    if snapshot.failed > 0 {
        println!("  Assets failed:     {}", snapshot.failed);
    }
    if snapshot.skipped > 0 {
        println!("  Assets skipped:    {}", snapshot.skipped);
    }
    println!("  Total size:        {}", format_bytes(snapshot.bytes));
    println!("  Total time:        {}", format_duration(elapsed));
    println!("{SEPARATOR}");
}
