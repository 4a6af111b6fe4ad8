//! Display collaborators: human-readable lines or JSON lines on stdout.

use poise_core::{Display, FrameMetrics, FrameReport, Overlay, RenderError, RgbFrame};
use serde::Serialize;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Quit when the shared flag is raised (Ctrl-C) or after `max_frames`.
#[derive(Debug, Clone)]
pub struct QuitSignal {
    flag: Arc<AtomicBool>,
    max_frames: Option<u64>,
}

impl QuitSignal {
    pub fn new(flag: Arc<AtomicBool>, max_frames: Option<u64>) -> Self {
        Self { flag, max_frames }
    }

    fn should_quit(&self, rendered: u64) -> bool {
        self.flag.load(Ordering::Relaxed) || self.max_frames.is_some_and(|max| rendered >= max)
    }
}

#[derive(Serialize)]
struct JsonLine<'a> {
    sequence: u32,
    width: u32,
    height: u32,
    metrics: &'a FrameMetrics,
    overlay: &'a Overlay,
}

/// Writes one record per frame to `out`.
pub struct StreamDisplay<W: Write> {
    out: W,
    format: OutputFormat,
    quit: QuitSignal,
    rendered: u64,
}

impl<W: Write> StreamDisplay<W> {
    pub fn new(out: W, format: OutputFormat, quit: QuitSignal) -> Self {
        Self {
            out,
            format,
            quit,
            rendered: 0,
        }
    }

    fn write_record(&mut self, frame: &RgbFrame, report: &FrameReport) -> std::io::Result<()> {
        match self.format {
            OutputFormat::Text => {
                let lines: Vec<&str> = report.overlay.text_lines().collect();
                let body = if lines.is_empty() {
                    "no detection".to_string()
                } else {
                    lines.join("  ")
                };
                writeln!(self.out, "[{:>6}] {body}", report.sequence)
            }
            OutputFormat::Json => {
                let line = JsonLine {
                    sequence: report.sequence,
                    width: frame.width,
                    height: frame.height,
                    metrics: &report.metrics,
                    overlay: &report.overlay,
                };
                serde_json::to_writer(&mut self.out, &line)?;
                writeln!(self.out)
            }
        }
    }
}

impl<W: Write> Display for StreamDisplay<W> {
    fn render(&mut self, frame: &RgbFrame, report: &FrameReport) -> Result<(), RenderError> {
        self.write_record(frame, report)
            .and_then(|_| self.out.flush())
            .map_err(|e| RenderError(e.to_string()))?;
        self.rendered += 1;
        Ok(())
    }

    fn poll_quit(&mut self) -> bool {
        self.quit.should_quit(self.rendered)
    }
}

impl<W: Write> Drop for StreamDisplay<W> {
    fn drop(&mut self) {
        let _ = self.out.flush();
        tracing::debug!(frames = self.rendered, "display closed");
    }
}
