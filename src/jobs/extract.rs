use crate::error::{DossierError, Result};
use crate::jobs::check_shutdown;
use crate::jobs::copy::{is_within, TreeCopier};
use crate::matcher::Classifier;
use crate::report::{JobReport, StatusCallback, StatusLine};
use crate::scanner::WorkScanner;
use crate::template::{JobKind, Template};
use crate::ui::GracefulShutdown;
use log::info;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Copies matching folders out of a source tree. The source is never modified.
pub struct FolderExtractor {
    template_name: String,
    classifier: Classifier,
    flatten: bool,
    replace_existing: bool,
    dry_run: bool,
    copier: TreeCopier,
    shutdown: Option<GracefulShutdown>,
}

impl FolderExtractor {
    pub fn new(template: &Template) -> Result<Self> {
        Ok(Self {
            template_name: template.name.clone(),
            classifier: Classifier::for_template(template)?,
            flatten: template.bool_option("flatten", false)?,
            replace_existing: template.bool_option("replace_existing", true)?,
            dry_run: false,
            copier: TreeCopier::new(),
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

    pub fn extract(
        &self,
        source: &Path,
        output: &Path,
        callback: StatusCallback<'_>,
    ) -> Result<JobReport> {
        let scanner = WorkScanner::new(source)?;
        if is_within(output, source) {
            return Err(DossierError::InvalidPath {
                path: format!(
                    "Output {} must not be inside source {}",
                    output.display(),
                    source.display()
                ),
            });
        }

        let scan = scanner.matching_directories(|item| self.classifier.classify(&item.name).is_some());
        let mut report = JobReport::new(JobKind::Extract, self.template_name.clone());
        info!(
            "Extracting {} folder(s) from {} to {}",
            scan.items.len(),
            source.display(),
            output.display()
        );

        for error in scan.errors {
            report.push(StatusLine::warning(source.display().to_string(), error), callback);
        }

        if scan.items.is_empty() {
            report.push(
                StatusLine::warning(source.display().to_string(), "no folder matches any category"),
                callback,
            );
        }

        let mut used_names = HashSet::new();

        for item in scan.items {
            check_shutdown(&self.shutdown)?;

            let label = self.classifier.classify(&item.name).unwrap_or_default().to_string();
            let destination = if self.flatten {
                if !used_names.insert(item.name.clone()) {
                    report.push(
                        StatusLine::warning(
                            item.display_path(),
                            format!("'{}' already extracted in this run; skipped", item.name),
                        ),
                        callback,
                    );
                    continue;
                }
                output.join(&item.name)
            } else {
                output.join(&item.relative_path)
            };

            if self.dry_run {
                report.push(
                    StatusLine::info(
                        item.display_path(),
                        format!("would copy to {}", destination.display()),
                    ),
                    callback,
                );
                continue;
            }

            if destination.exists() && self.replace_existing {
                if let Err(e) = fs::remove_dir_all(&destination) {
                    report.push(
                        StatusLine::error(
                            item.display_path(),
                            format!("could not clear {}: {}", destination.display(), e),
                        ),
                        callback,
                    );
                    continue;
                }
            }

            match self.copier.copy_tree(&item.path, &destination) {
                Ok(stats) => report.push(
                    StatusLine::success(
                        item.display_path(),
                        format!(
                            "copied {} file(s) to {} (matches '{}')",
                            stats.files,
                            destination.display(),
                            label
                        ),
                    ),
                    callback,
                ),
                Err(e) => report.push(StatusLine::error(item.display_path(), e.to_string()), callback),
            }
        }

        Ok(report.finish())
    }
}
