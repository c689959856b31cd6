//! Analysis console: the timestamped progress log shown during an analysis.

use chrono::Local;
use serde::{Deserialize, Serialize};

pub const CLEARED_MESSAGE: &str = "Console cleared. Ready for new analysis.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    System,
    Info,
    Success,
    Warning,
    Error,
}

impl LineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineKind::System => "system",
            LineKind::Info => "info",
            LineKind::Success => "success",
            LineKind::Warning => "warning",
            LineKind::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleLine {
    pub timestamp: String,
    pub kind: LineKind,
    pub message: String,
}

impl ConsoleLine {
    pub fn new(timestamp: impl Into<String>, kind: LineKind, message: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            kind,
            message: message.into(),
        }
    }

    /// Line stamped with the local wall-clock time (`HH:MM:SS`).
    pub fn now(kind: LineKind, message: impl Into<String>) -> Self {
        Self::new(Local::now().format("%H:%M:%S").to_string(), kind, message)
    }

    pub fn render(&self) -> String {
        format!("[{}] {:<7} {}", self.timestamp, self.kind.as_str(), self.message)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConsoleLog {
    lines: Vec<ConsoleLine>,
}

impl ConsoleLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line. Anything mentioning an algal bloom is raised to a warning.
    pub fn push(&mut self, mut line: ConsoleLine) -> &ConsoleLine {
        if line.kind != LineKind::Error && line.message.to_lowercase().contains("algal bloom") {
            line.kind = LineKind::Warning;
        }
        self.lines.push(line);
        &self.lines[self.lines.len() - 1]
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.lines.push(ConsoleLine::now(LineKind::System, CLEARED_MESSAGE));
    }

    pub fn lines(&self) -> &[ConsoleLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
