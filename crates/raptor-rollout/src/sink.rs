//! Destinations for service status lines.
//!
//! Sinks are shared between the control task and every drain task, so they
//! take `&self` and must be safe for concurrent writers. Lines from
//! different services may interleave; a single line is never split.

use std::io::Write;
use std::sync::Mutex;

use chrono::{DateTime, Local};
use raptor_cluster::StatusLine;
use tracing::info;

pub trait LogSink: Send + Sync {
    fn write(&self, line: &StatusLine);
}

/// `[MM/DD HH:MM:SS] alias::service > contents`, local time.
pub fn format_line(line: &StatusLine) -> String {
    let secs = line.timestamp_ns.div_euclid(1_000_000_000);
    let nanos = line.timestamp_ns.rem_euclid(1_000_000_000) as u32;
    let stamp = DateTime::from_timestamp(secs, nanos)
        .map(|t| t.with_timezone(&Local).format("%m/%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "??/?? ??:??:??".to_string());

    format!(
        "[{stamp}] {}::{} > {}",
        line.node_alias,
        line.service,
        line.contents.trim_matches('\n')
    )
}

/// Writes each line to stdout under the stdout lock.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl LogSink for ConsoleSink {
    fn write(&self, line: &StatusLine) {
        let mut rendered = format_line(line);
        rendered.push('\n');
        let mut out = std::io::stdout().lock();
        // A closed stdout is not worth failing a rollout over.
        let _ = out.write_all(rendered.as_bytes());
        let _ = out.flush();
    }
}

/// Emits each line as a `tracing` event.
#[derive(Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write(&self, line: &StatusLine) {
        info!(
            target: "raptor::status",
            node = %line.node_alias,
            service = %line.service,
            "{}",
            line.contents.trim_matches('\n')
        );
    }
}

/// Keeps every line in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    lines: Mutex<Vec<StatusLine>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<StatusLine> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Contents of every line, in arrival order.
    pub fn contents(&self) -> Vec<String> {
        self.lines().into_iter().map(|l| l.contents).collect()
    }

    /// Contents of the lines a single service produced.
    pub fn contents_for(&self, service: &str) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|l| l.service == service)
            .map(|l| l.contents)
            .collect()
    }
}

impl LogSink for CollectingSink {
    fn write(&self, line: &StatusLine) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.clone());
        }
    }
}
