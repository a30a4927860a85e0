use crate::error::{DossierError, Result};
use crate::jobs::check_shutdown;
use crate::matcher::Classifier;
use crate::report::{JobReport, StatusCallback, StatusLine};
use crate::scanner::{WorkItem, WorkScanner};
use crate::template::{JobKind, Template};
use crate::ui::GracefulShutdown;
use log::{debug, info};
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Which kinds of children a pattern is allowed to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchKind {
    #[default]
    Any,
    File,
    Folder,
}

impl MatchKind {
    pub fn admits(&self, item: &WorkItem) -> bool {
        match self {
            MatchKind::Any => true,
            MatchKind::File => !item.is_dir(),
            MatchKind::Folder => item.is_dir(),
        }
    }
}

impl FromStr for MatchKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "any" => Ok(MatchKind::Any),
            "file" => Ok(MatchKind::File),
            "folder" => Ok(MatchKind::Folder),
            other => Err(format!(
                "invalid match_kind '{}' (expected any, file or folder)",
                other
            )),
        }
    }
}

/// How the children of one directory split into kept and removed.
#[derive(Debug, Default)]
pub struct PrunePlan {
    pub keep: Vec<(WorkItem, String)>,
    pub remove: Vec<WorkItem>,
}

/// Deletes every immediate child of a directory that matches no category.
pub struct FolderPruner {
    template_name: String,
    classifier: Classifier,
    match_kind: MatchKind,
    require_match: bool,
    dry_run: bool,
    shutdown: Option<GracefulShutdown>,
}

impl FolderPruner {
    pub fn new(template: &Template) -> Result<Self> {
        let match_kind = template
            .string_option("match_kind", "any")?
            .parse::<MatchKind>()
            .map_err(|message| DossierError::TemplateValidation { message })?;

        Ok(Self {
            template_name: template.name.clone(),
            classifier: Classifier::for_template(template)?,
            match_kind,
            require_match: template.bool_option("require_match", false)?,
            dry_run: false,
            shutdown: None,
        })
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_shutdown(mut self, shutdown: GracefulShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Classifies every immediate child exactly once.
    pub fn plan(&self, directory: &Path) -> Result<(PrunePlan, Vec<String>)> {
        let scan = WorkScanner::new(directory)?.children();
        let mut plan = PrunePlan::default();

        for item in scan.items {
            let category = if self.match_kind.admits(&item) {
                self.classifier.classify(&item.name).map(str::to_string)
            } else {
                None
            };

            match category {
                Some(label) => plan.keep.push((item, label)),
                None => plan.remove.push(item),
            }
        }

        Ok((plan, scan.errors))
    }

    pub fn prune(&self, directory: &Path, callback: StatusCallback<'_>) -> Result<JobReport> {
        let mut report = JobReport::new(JobKind::Prune, self.template_name.clone());
        self.prune_into(directory, &mut report, callback)?;
        Ok(report.finish())
    }

    /// Prunes each immediate subdirectory of `directory` as its own package.
    pub fn prune_each(&self, directory: &Path, callback: StatusCallback<'_>) -> Result<JobReport> {
        let scan = WorkScanner::new(directory)?.children();
        let mut report = JobReport::new(JobKind::Prune, self.template_name.clone());

        for error in scan.errors {
            report.push(StatusLine::warning(directory.display().to_string(), error), callback);
        }

        for package in scan.items.into_iter().filter(WorkItem::is_dir) {
            check_shutdown(&self.shutdown)?;
            report.push(StatusLine::info(&package.name, "pruning package"), callback);
            if let Err(e) = self.prune_into(&package.path, &mut report, callback) {
                report.push(StatusLine::error(&package.name, e.to_string()), callback);
            }
        }

        Ok(report.finish())
    }

    fn prune_into(
        &self,
        directory: &Path,
        report: &mut JobReport,
        callback: StatusCallback<'_>,
    ) -> Result<()> {
        let (plan, errors) = self.plan(directory)?;
        info!(
            "Pruning {}: keeping {}, removing {}",
            directory.display(),
            plan.keep.len(),
            plan.remove.len()
        );

        for error in errors {
            report.push(StatusLine::warning(directory.display().to_string(), error), callback);
        }

        if self.require_match && plan.keep.is_empty() {
            report.push(
                StatusLine::warning(
                    directory.display().to_string(),
                    "no entry matches any category; nothing deleted",
                ),
                callback,
            );
            return Ok(());
        }

        for (item, label) in &plan.keep {
            report.push(StatusLine::keep(&item.name, format!("matches '{}'", label)), callback);
        }

        for item in &plan.remove {
            check_shutdown(&self.shutdown)?;

            if self.dry_run {
                report.push(StatusLine::delete(&item.name, "would delete"), callback);
                continue;
            }

            let removed = if item.is_dir() {
                fs::remove_dir_all(&item.path)
            } else {
                fs::remove_file(&item.path)
            };

            match removed {
                Ok(()) => {
                    debug!("Removed {}", item.path.display());
                    let what = if item.is_dir() { "folder" } else { "file" };
                    report.push(StatusLine::delete(&item.name, format!("{} deleted", what)), callback);
                }
                Err(e) => report.push(
                    StatusLine::error(&item.name, format!("could not delete: {}", e)),
                    callback,
                ),
            }
        }

        Ok(())
    }
}
