//! Text histogram of item statuses for terminals

use async_trait::async_trait;
use std::fmt::Write as _;
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::traits::ProgressSink;
use super::{ProgressSummary, summarize};
use crate::config::ProgressConfig;
use crate::item::Item;
use crate::types::{Clock, Status};

/// Default output width in columns
pub const DEFAULT_WIDTH: usize = 80;

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

struct MonitorState<W> {
    items: Vec<Arc<Item>>,
    title: String,
    writer: W,
}

/// Renders one bar per status plus the most recent failures
///
/// ```text
/// (step 1/2) Downloading documents
/// T=12.034 total tasks (120)
/// Waiting:20 (16%)==========|
/// Downloading:50 (41%)===========================|
/// ...
/// ##Most recent errors##############################
/// 35 ms ago A017:download error: HTTP 404 from http://...
/// ```
///
/// The working copy, title and writer share one mutex. Item snapshots are taken
/// before that mutex is acquired.
pub struct ConsoleMonitor<W: Write + Send> {
    state: Mutex<MonitorState<W>>,
    refresh_interval: Duration,
    max_recent_errors: usize,
    width: usize,
    clear_screen: bool,
    cancel: CancellationToken,
}

impl ConsoleMonitor<std::io::Stdout> {
    /// Monitor writing to stdout, clearing the screen before every frame
    pub fn stdout(config: &ProgressConfig) -> Self {
        Self::new(std::io::stdout(), config).with_clear_screen(true)
    }
}

impl<W: Write + Send> ConsoleMonitor<W> {
    /// Monitor writing plain frames to `writer`
    pub fn new(writer: W, config: &ProgressConfig) -> Self {
        Self {
            state: Mutex::new(MonitorState {
                items: Vec::new(),
                title: String::new(),
                writer,
            }),
            refresh_interval: config.refresh_interval,
            max_recent_errors: config.max_recent_errors,
            width: DEFAULT_WIDTH,
            clear_screen: false,
            cancel: CancellationToken::new(),
        }
    }

    /// Set the output width
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width.max(1);
        self
    }

    /// Emit an ANSI clear before each frame
    pub fn with_clear_screen(mut self, clear: bool) -> Self {
        self.clear_screen = clear;
        self
    }

    /// Take back the writer
    pub fn into_writer(self) -> W {
        self.state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .writer
    }

    fn lock(&self) -> MutexGuard<'_, MonitorState<W>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn working_copy(&self) -> Vec<Arc<Item>> {
        self.lock().items.clone()
    }

    fn render_frame(&self, title: &str, summary: &ProgressSummary) -> String {
        let mut frame = String::new();
        let _ = writeln!(frame, "{title}");
        let _ = writeln!(
            frame,
            "T={}.{:03} total tasks ({})",
            summary.elapsed_millis / 1000,
            summary.elapsed_millis % 1000,
            summary.total
        );
        for status in Status::ALL {
            frame.push_str(&bar_line(
                status.label(),
                summary.count(status),
                summary.total,
                self.width,
            ));
            frame.push('\n');
        }

        let heading = "##Most recent errors";
        frame.push_str(heading);
        frame.push_str(&"#".repeat(self.width.saturating_sub(heading.len())));
        frame.push('\n');

        for failure in &summary.recent_failures {
            let when = match failure.age_millis {
                Some(age) => format!("{age} ms ago"),
                None => "now".to_string(),
            };
            let line = format!("{when} {}:{}", failure.name, failure.error);
            frame.push_str(&truncate_to_width(&line, self.width));
            frame.push('\n');
        }
        if summary.omitted_failures > 0 {
            let _ = writeln!(
                frame,
                "... {} more, see the report for the rest ...",
                summary.omitted_failures
            );
        }
        frame
    }
}

/// `label:count (pct)` followed by a bar proportional to `count / total`
fn bar_line(label: &str, count: usize, total: usize, width: usize) -> String {
    let share = if count == 0 || total == 0 {
        "0%".to_string()
    } else if 100 * count < total {
        "<1%".to_string()
    } else {
        format!("{}%", 100 * count / total)
    };
    let mut line = format!("{label}:{count} ({share})");
    let used = line.chars().count();
    if used + 1 < width && total > 0 {
        let bar = count * (width - used - 1) / total;
        line.push_str(&"=".repeat(bar));
        line.push('|');
    }
    line
}

fn truncate_to_width(line: &str, width: usize) -> String {
    if line.chars().count() <= width {
        return line.to_string();
    }
    let keep = width.saturating_sub(3);
    let mut out: String = line.chars().take(keep).collect();
    out.push_str("...");
    out
}

#[async_trait]
impl<W: Write + Send> ProgressSink for ConsoleMonitor<W> {
    fn set_report(&self, items: &[Arc<Item>]) {
        self.lock().items = items.to_vec();
    }

    fn set_title(&self, title: &str) {
        self.lock().title = title.to_string();
    }

    fn render_once(&self, clock: &Clock, items: &[Arc<Item>]) {
        let summary = summarize(clock, items, self.max_recent_errors);

        let mut state = self.lock();
        let frame = self.render_frame(&state.title, &summary);
        let result = (|| {
            if self.clear_screen {
                state.writer.write_all(CLEAR_SCREEN.as_bytes())?;
            }
            state.writer.write_all(frame.as_bytes())?;
            state.writer.flush()
        })();
        if let Err(e) = result {
            tracing::debug!(error = %e, "failed to write progress frame");
        }
    }

    async fn run_loop(&self, clock: Clock) {
        let mut interval = tokio::time::interval(self.refresh_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let items = self.working_copy();
                    self.render_once(&clock, &items);
                }
                _ = self.cancel.cancelled() => {
                    break;
                }
            }
        }
    }

    fn stop(&self) {
        self.cancel.cancel();
    }
}
