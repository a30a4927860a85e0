use crate::error::Result;
use crate::report::status::{Stage, StatusLine};
use crate::template::JobKind;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

/// Live observer of status lines as a job emits them.
pub type StatusCallback<'a> = Option<&'a dyn Fn(&StatusLine)>;

/// Everything one job pass produced, in emission order.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    /// Job name; `run` and `check` reports use their command name.
    pub job: String,
    pub template: String,
    pub started_at: DateTime<Utc>,
    pub lines: Vec<StatusLine>,
    #[serde(skip)]
    start_time: Instant,
    duration: Option<Duration>,
}

impl JobReport {
    pub fn new<S: Into<String>>(job: JobKind, template: S) -> Self {
        Self::named(job.as_str(), template)
    }

    /// A report for a command that is not a single template-driven job.
    pub fn named<J: Into<String>, S: Into<String>>(job: J, template: S) -> Self {
        Self {
            job: job.into(),
            template: template.into(),
            started_at: Utc::now(),
            lines: Vec::new(),
            start_time: Instant::now(),
            duration: None,
        }
    }

    /// Records a line and forwards it to the live observer, if any.
    pub fn push(&mut self, line: StatusLine, callback: StatusCallback<'_>) {
        if let Some(callback) = callback {
            callback(&line);
        }
        self.lines.push(line);
    }

    /// Folds another report's lines into this one, e.g. one report per pipeline step.
    pub fn absorb(&mut self, other: JobReport) {
        self.lines.extend(other.lines);
    }

    pub fn finish(mut self) -> Self {
        self.duration = Some(self.start_time.elapsed());
        self
    }

    pub fn elapsed(&self) -> Duration {
        self.duration.unwrap_or_else(|| self.start_time.elapsed())
    }

    pub fn count(&self, stage: Stage) -> usize {
        self.lines.iter().filter(|line| line.stage == stage).count()
    }

    pub fn counts(&self) -> BTreeMap<Stage, usize> {
        let mut counts = BTreeMap::new();
        for line in &self.lines {
            *counts.entry(line.stage).or_insert(0) += 1;
        }
        counts
    }

    pub fn has_failures(&self) -> bool {
        self.lines.iter().any(|line| line.stage.is_failure())
    }

    pub fn items_with(&self, stage: Stage) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|line| line.stage == stage)
            .map(|line| line.item.as_str())
            .collect()
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            job: self.job.clone(),
            template: self.template.clone(),
            started_at: self.started_at,
            duration_ms: self.elapsed().as_millis() as u64,
            lines: self.lines.len(),
            counts: self
                .counts()
                .into_iter()
                .map(|(stage, count)| (stage.marker().to_lowercase(), count))
                .collect(),
        }
    }

    /// Writes the report as pretty JSON, creating parent directories. The
    /// summary fields sit at the top level next to `lines`.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let summary = self.summary();
        let document = serde_json::json!({
            "job": summary.job,
            "template": summary.template,
            "started_at": summary.started_at,
            "duration_ms": summary.duration_ms,
            "counts": summary.counts,
            "lines": self.lines,
            "generated_at": Utc::now().to_rfc3339(),
        });
        fs::write(path, serde_json::to_string_pretty(&document)?)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub job: String,
    pub template: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub lines: usize,
    pub counts: BTreeMap<String, usize>,
}
