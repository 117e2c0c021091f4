//! Batch update reports.

use serde::Serialize;
use std::fmt;

/// Returned instead of a report when there is nothing to update.
pub const NOTHING_TO_UPDATE: &str = "没有可更新的插件~";

/// Fallback text when a batch pass fails without a usable error message.
pub const UPDATE_FAILED_CHECK_LOGS: &str = "更新失败，请查看日志";

/// Outcome of one item in a batch pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportLine {
    pub name: String,
    pub success: bool,
    pub message: String,
}

impl ReportLine {
    pub fn succeeded(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            success: false,
            message: message.into(),
        }
    }
}

impl fmt::Display for ReportLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.success { "✅" } else { "❌" };
        write!(f, "{mark} {}: {}", self.name, self.message)
    }
}

/// Per-item lines plus an aggregate summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub lines: Vec<ReportLine>,
    pub summary: String,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A report with no lines, only a message (sentinels and fatal errors).
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            lines: Vec::new(),
            summary: text.into(),
        }
    }

    pub fn nothing_to_update() -> Self {
        Self::message(NOTHING_TO_UPDATE)
    }

    pub fn push(&mut self, line: ReportLine) {
        self.lines.push(line);
    }

    /// Move successes ahead of failures, keeping relative order in each group.
    pub fn successes_first(&mut self) {
        self.lines.sort_by_key(|line| !line.success);
    }

    pub fn succeeded(&self) -> usize {
        self.lines.iter().filter(|l| l.success).count()
    }

    pub fn failed(&self) -> usize {
        self.lines.len() - self.succeeded()
    }

    /// Fill in the summary line from the current counts.
    pub fn finish(mut self) -> Self {
        self.summary = format!(
            "共 {} 个插件，成功 {} 个，失败 {} 个",
            self.lines.len(),
            self.succeeded(),
            self.failed()
        );
        self
    }

    pub fn text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        f.write_str(&self.summary)
    }
}
