use crate::config::PathsConfig;
use crate::error::Result;
use crate::jobs::check_shutdown;
use crate::jobs::prune::FolderPruner;
use crate::matcher::Classifier;
use crate::report::{JobReport, StatusCallback, StatusLine};
use crate::scanner::{WorkItem, WorkScanner};
use crate::template::{JobKind, Template, TemplateStore};
use crate::ui::GracefulShutdown;
use log::{debug, info};
use std::path::Path;

/// Read-only inspection of what a run depends on. Every finding becomes a
/// status line; only errors count as failures.
pub struct PreflightCheck<'a> {
    paths: &'a PathsConfig,
    store: &'a TemplateStore,
    office_command: String,
    pruner: FolderPruner,
    prune_name: String,
    extract_classifier: Classifier,
    extract_name: String,
    shutdown: Option<GracefulShutdown>,
}

impl<'a> PreflightCheck<'a> {
    pub fn new(
        paths: &'a PathsConfig,
        store: &'a TemplateStore,
        prune: &Template,
        extract: &Template,
    ) -> Result<Self> {
        Ok(Self {
            paths,
            store,
            office_command: "soffice".to_string(),
            pruner: FolderPruner::new(prune)?,
            prune_name: prune.name.clone(),
            extract_classifier: Classifier::for_template(extract)?,
            extract_name: extract.name.clone(),
            shutdown: None,
        })
    }

    pub fn with_office_command<S: Into<String>>(mut self, command: S) -> Self {
        self.office_command = command.into();
        self
    }

    pub fn with_shutdown(mut self, shutdown: GracefulShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Runs every check, inspecting the packages under `packages`.
    pub fn check(&self, packages: &Path, callback: StatusCallback<'_>) -> Result<JobReport> {
        let mut report = JobReport::named(
            "check",
            format!("{}+{}", self.prune_name, self.extract_name),
        );

        self.check_directories(&mut report, callback);
        self.check_templates(&mut report, callback)?;
        self.check_office_command(&mut report, callback);
        self.check_packages(packages, &mut report, callback)?;

        Ok(report.finish())
    }

    fn check_directories(&self, report: &mut JobReport, callback: StatusCallback<'_>) {
        let data = self.paths.data_dir.display().to_string();
        if self.paths.data_dir.is_dir() {
            report.push(StatusLine::success(data, "data directory exists"), callback);
        } else {
            report.push(StatusLine::error(data, "data directory is missing"), callback);
        }

        let output = self.paths.output_dir.display().to_string();
        if self.paths.output_dir.is_dir() {
            report.push(StatusLine::success(output, "output directory exists"), callback);
        } else {
            report.push(
                StatusLine::warning(output, "output directory is missing; convert and rename need it"),
                callback,
            );
        }

        let templates = self.paths.template_dir.display().to_string();
        if self.paths.template_dir.is_dir() {
            report.push(StatusLine::success(templates, "template directory exists"), callback);
        } else {
            report.push(
                StatusLine::warning(
                    templates,
                    "template directory is missing; only built-in templates are available",
                ),
                callback,
            );
        }
    }

    fn check_templates(&self, report: &mut JobReport, callback: StatusCallback<'_>) -> Result<()> {
        let mut stored = 0;

        for kind in JobKind::ALL {
            for (path, loaded) in self.store.load_all(kind)? {
                stored += 1;
                let item = template_item(kind, &path);

                let template = match loaded {
                    Ok(template) => template,
                    Err(e) => {
                        report.push(StatusLine::error(item, e.to_string()), callback);
                        continue;
                    }
                };

                let validation = self.store.validate(kind, &template);
                let line = if !validation.is_valid() {
                    StatusLine::error(item, validation.errors.join("; "))
                } else if !validation.warnings.is_empty() {
                    StatusLine::warning(item, validation.warnings.join("; "))
                } else {
                    StatusLine::success(item, format!("template '{}' is valid", template.name))
                };
                report.push(line, callback);
            }
        }

        if stored == 0 {
            report.push(
                StatusLine::info(
                    self.store.root().display().to_string(),
                    "no stored templates; jobs use the built-in ones",
                ),
                callback,
            );
        }
        Ok(())
    }

    fn check_office_command(&self, report: &mut JobReport, callback: StatusCallback<'_>) {
        let line = match which::which(&self.office_command) {
            Ok(path) => StatusLine::success(
                &self.office_command,
                format!("office converter found at {}", path.display()),
            ),
            Err(e) => {
                debug!("Lookup of '{}' failed: {}", self.office_command, e);
                StatusLine::warning(
                    &self.office_command,
                    "office converter not found on PATH; only images can be converted",
                )
            }
        };
        report.push(line, callback);
    }

    fn check_packages(
        &self,
        packages: &Path,
        report: &mut JobReport,
        callback: StatusCallback<'_>,
    ) -> Result<()> {
        if !packages.is_dir() {
            report.push(
                StatusLine::info(packages.display().to_string(), "no packages inspected"),
                callback,
            );
            return Ok(());
        }

        let (plan, errors) = self.pruner.plan(packages)?;
        info!(
            "Checking {} package(s) under {}",
            plan.keep.len() + plan.remove.len(),
            packages.display()
        );

        for error in errors {
            report.push(StatusLine::warning(packages.display().to_string(), error), callback);
        }

        if plan.keep.is_empty() {
            report.push(
                StatusLine::warning(
                    packages.display().to_string(),
                    format!("no entry matches prune template '{}'", self.prune_name),
                ),
                callback,
            );
        }

        for (item, label) in &plan.keep {
            check_shutdown(&self.shutdown)?;
            report.push(
                StatusLine::success(
                    &item.name,
                    format!("matches '{}' of prune template '{}'", label, self.prune_name),
                ),
                callback,
            );
            self.check_extractable(item, report, callback);
        }

        for item in &plan.remove {
            report.push(
                StatusLine::warning(
                    &item.name,
                    format!(
                        "matches no category of prune template '{}'; prune would delete it",
                        self.prune_name
                    ),
                ),
                callback,
            );
        }

        Ok(())
    }

    /// Whether extract would copy the package itself or folders inside it.
    fn check_extractable(&self, package: &WorkItem, report: &mut JobReport, callback: StatusCallback<'_>) {
        if !package.is_dir() {
            return;
        }

        if let Some(label) = self.extract_classifier.classify(&package.name) {
            report.push(
                StatusLine::success(
                    &package.name,
                    format!("matches '{}' of extract template '{}'", label, self.extract_name),
                ),
                callback,
            );
            return;
        }

        let scan = match WorkScanner::new(&package.path) {
            Ok(scanner) => scanner
                .matching_directories(|item| self.extract_classifier.classify(&item.name).is_some()),
            Err(e) => {
                report.push(StatusLine::error(&package.name, e.to_string()), callback);
                return;
            }
        };

        let line = if scan.items.is_empty() {
            StatusLine::warning(
                &package.name,
                format!("no folder matches extract template '{}'", self.extract_name),
            )
        } else {
            StatusLine::success(
                &package.name,
                format!(
                    "{} folder(s) inside match extract template '{}'",
                    scan.items.len(),
                    self.extract_name
                ),
            )
        };
        report.push(line, callback);
    }
}

fn template_item(kind: JobKind, path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    format!("{}/{}", kind, file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Stage;
    use crate::template::defaults;
    use std::fs;
    use tempfile::TempDir;

    fn paths(root: &Path) -> PathsConfig {
        PathsConfig {
            data_dir: root.join("data"),
            output_dir: root.join("output"),
            template_dir: root.join("templates"),
        }
    }

    fn checker<'a>(paths: &'a PathsConfig, store: &'a TemplateStore) -> PreflightCheck<'a> {
        PreflightCheck::new(
            paths,
            store,
            &defaults::builtin(JobKind::Prune),
            &defaults::builtin(JobKind::Extract),
        )
        .unwrap()
        .with_office_command("dossier-no-such-office-binary")
    }

    #[test]
    fn test_missing_data_directory_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let paths = paths(temp_dir.path());
        let store = TemplateStore::new(&paths.template_dir);

        let report = checker(&paths, &store).check(&paths.data_dir, None).unwrap();

        assert_eq!(report.job, "check");
        assert_eq!(report.items_with(Stage::Error), vec![paths.data_dir.display().to_string()]);
        assert!(report.has_failures());
        assert!(report
            .lines
            .iter()
            .any(|l| l.item == "dossier-no-such-office-binary" && l.stage == Stage::Warning));
    }

    #[test]
    fn test_packages_against_prune_and_extract() {
        let temp_dir = TempDir::new().unwrap();
        let paths = paths(temp_dir.path());
        let store = TemplateStore::new(&paths.template_dir);
        fs::create_dir_all(paths.data_dir.join("注册申报材料包")).unwrap();
        fs::create_dir_all(paths.data_dir.join("scratch")).unwrap();
        fs::create_dir_all(&paths.output_dir).unwrap();

        let report = checker(&paths, &store).check(&paths.data_dir, None).unwrap();

        let package_lines: Vec<_> = report
            .lines
            .iter()
            .filter(|l| l.item == "注册申报材料包")
            .collect();
        assert_eq!(package_lines.len(), 2);
        assert!(package_lines.iter().all(|l| l.stage == Stage::Success));
        assert!(package_lines[1].detail.contains("extract template"));

        let scratch = report.lines.iter().find(|l| l.item == "scratch").unwrap();
        assert_eq!(scratch.stage, Stage::Warning);
        assert!(scratch.detail.contains("prune would delete it"));
        assert!(!report.has_failures());
        assert!(paths.data_dir.join("scratch").is_dir());
    }

    #[test]
    fn test_stored_templates_are_validated() {
        let temp_dir = TempDir::new().unwrap();
        let paths = paths(temp_dir.path());
        fs::create_dir_all(&paths.data_dir).unwrap();
        let store = TemplateStore::new(&paths.template_dir);
        store.save(JobKind::Prune, &defaults::builtin(JobKind::Prune)).unwrap();
        let broken_dir = store.kind_directory(JobKind::Rename);
        fs::create_dir_all(&broken_dir).unwrap();
        fs::write(broken_dir.join("broken.json"), "{").unwrap();

        let report = checker(&paths, &store).check(&paths.data_dir, None).unwrap();

        let prune = report.lines.iter().find(|l| l.item == "prune/default.json").unwrap();
        assert_eq!(prune.stage, Stage::Success);
        let broken = report.lines.iter().find(|l| l.item == "rename/broken.json").unwrap();
        assert_eq!(broken.stage, Stage::Error);
    }
}
