use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage marker carried by every status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Success,
    Skip,
    Delete,
    Keep,
    Warning,
    Error,
    Conflict,
    Info,
}

impl Stage {
    pub fn marker(&self) -> &'static str {
        match self {
            Stage::Success => "OK",
            Stage::Skip => "SKIP",
            Stage::Delete => "DELETE",
            Stage::Keep => "KEEP",
            Stage::Warning => "WARN",
            Stage::Error => "ERROR",
            Stage::Conflict => "CONFLICT",
            Stage::Info => "INFO",
        }
    }

    /// Stages that make a run finish with a non-zero exit code.
    pub fn is_failure(&self) -> bool {
        matches!(self, Stage::Error | Stage::Conflict)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

/// One line of job output: what happened to which item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusLine {
    pub stage: Stage,
    pub item: String,
    pub detail: String,
}

impl StatusLine {
    pub fn new<I: Into<String>, D: Into<String>>(stage: Stage, item: I, detail: D) -> Self {
        Self {
            stage,
            item: item.into(),
            detail: detail.into(),
        }
    }

    pub fn success<I: Into<String>, D: Into<String>>(item: I, detail: D) -> Self {
        Self::new(Stage::Success, item, detail)
    }

    pub fn skip<I: Into<String>, D: Into<String>>(item: I, detail: D) -> Self {
        Self::new(Stage::Skip, item, detail)
    }

    pub fn delete<I: Into<String>, D: Into<String>>(item: I, detail: D) -> Self {
        Self::new(Stage::Delete, item, detail)
    }

    pub fn keep<I: Into<String>, D: Into<String>>(item: I, detail: D) -> Self {
        Self::new(Stage::Keep, item, detail)
    }

    pub fn warning<I: Into<String>, D: Into<String>>(item: I, detail: D) -> Self {
        Self::new(Stage::Warning, item, detail)
    }

    pub fn error<I: Into<String>, D: Into<String>>(item: I, detail: D) -> Self {
        Self::new(Stage::Error, item, detail)
    }

    pub fn conflict<I: Into<String>, D: Into<String>>(item: I, detail: D) -> Self {
        Self::new(Stage::Conflict, item, detail)
    }

    pub fn info<I: Into<String>, D: Into<String>>(item: I, detail: D) -> Self {
        Self::new(Stage::Info, item, detail)
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.detail.is_empty() {
            write!(f, "[{}] {}", self.stage, self.item)
        } else {
            write!(f, "[{}] {}: {}", self.stage, self.item, self.detail)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_line_display() {
        let line = StatusLine::delete("old.docx", "source removed after conversion");
        assert_eq!(line.to_string(), "[DELETE] old.docx: source removed after conversion");
        assert_eq!(StatusLine::keep("a", "").to_string(), "[KEEP] a");
    }

    #[test]
    fn test_failure_stages() {
        assert!(Stage::Error.is_failure());
        assert!(Stage::Conflict.is_failure());
        assert!(!Stage::Warning.is_failure());
        assert!(!Stage::Skip.is_failure());
    }

    #[test]
    fn test_stage_serializes_lowercase() {
        let json = serde_json::to_string(&StatusLine::conflict("a.pdf", "exists")).unwrap();
        assert!(json.contains("\"stage\":\"conflict\""));
    }
}
