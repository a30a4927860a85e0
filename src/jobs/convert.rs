use crate::converter::DocumentConverter;
use crate::error::Result;
use crate::jobs::check_shutdown;
use crate::matcher::Classifier;
use crate::report::{JobReport, StatusCallback, StatusLine};
use crate::scanner::{dotted_extension, ExtensionFilter, WorkItem, WorkScanner};
use crate::template::{JobKind, Template};
use crate::ui::GracefulShutdown;
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

/// Converts documents to PDF through a pluggable backend, then keeps or
/// deletes each original.
pub struct DocumentConverterJob<'c> {
    template_name: String,
    classifier: Classifier,
    filter: ExtensionFilter,
    keep_original: bool,
    output_dir: Option<PathBuf>,
    dry_run: bool,
    converter: &'c dyn DocumentConverter,
    shutdown: Option<GracefulShutdown>,
}

impl<'c> DocumentConverterJob<'c> {
    pub fn new(template: &Template, converter: &'c dyn DocumentConverter) -> Result<Self> {
        let extensions = template.string_list_option("supported_extensions", &[".doc", ".docx"])?;

        Ok(Self {
            template_name: template.name.clone(),
            classifier: Classifier::for_template(template)?,
            filter: ExtensionFilter::new(&extensions),
            keep_original: template.bool_option("keep_original_files", true)?,
            output_dir: None,
            dry_run: false,
            converter,
            shutdown: None,
        })
    }

    /// Overrides the template's `keep_original_files` when set.
    pub fn with_keep_original(mut self, keep: Option<bool>) -> Self {
        if let Some(keep) = keep {
            self.keep_original = keep;
        }
        self
    }

    /// Writes PDFs under `output_dir`, mirroring the source layout.
    pub fn with_output_dir(mut self, output_dir: Option<PathBuf>) -> Self {
        self.output_dir = output_dir;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_shutdown(mut self, shutdown: GracefulShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn keeps_originals(&self) -> bool {
        self.keep_original
    }

    /// Files the job would consider, in file name order.
    pub fn candidates(&self, source_dir: &Path) -> Result<(Vec<WorkItem>, Vec<String>)> {
        let scan = WorkScanner::new(source_dir)?
            .with_filter(self.filter.clone())
            .files();

        let items = scan
            .items
            .into_iter()
            .filter(|item| {
                self.classifier.is_empty() || self.classifier.classify(&item.display_path()).is_some()
            })
            .collect();

        Ok((items, scan.errors))
    }

    pub fn target_for(&self, item: &WorkItem) -> PathBuf {
        match &self.output_dir {
            Some(output_dir) => output_dir.join(&item.relative_path).with_extension("pdf"),
            None => item.path.with_extension("pdf"),
        }
    }

    pub fn convert(&self, source_dir: &Path, callback: StatusCallback<'_>) -> Result<JobReport> {
        let (items, errors) = self.candidates(source_dir)?;
        let mut report = JobReport::new(JobKind::Convert, self.template_name.clone());
        info!(
            "Converting {} file(s) under {} (keep originals: {})",
            items.len(),
            source_dir.display(),
            self.keep_original
        );

        for error in errors {
            report.push(StatusLine::warning(source_dir.display().to_string(), error), callback);
        }

        for item in items {
            check_shutdown(&self.shutdown)?;
            self.convert_item(&item, &mut report, callback);
        }

        Ok(report.finish())
    }

    fn convert_item(&self, item: &WorkItem, report: &mut JobReport, callback: StatusCallback<'_>) {
        let name = item.display_path();
        let target = self.target_for(item);

        if target.exists() {
            report.push(
                StatusLine::skip(&name, format!("{} already exists", target.display())),
                callback,
            );
            return;
        }

        let supported = dotted_extension(&item.path).is_some_and(|ext| self.converter.supports(&ext));
        if !supported {
            report.push(
                StatusLine::warning(&name, format!("{} cannot convert this file type", self.converter.name())),
                callback,
            );
            return;
        }

        if self.dry_run {
            report.push(
                StatusLine::info(&name, format!("would convert to {}", target.display())),
                callback,
            );
            return;
        }

        debug!("Converting {} -> {}", item.path.display(), target.display());
        if let Err(e) = self.converter.convert(&item.path, &target) {
            report.push(StatusLine::error(&name, e.to_string()), callback);
            return;
        }

        report.push(
            StatusLine::success(&name, format!("converted to {}", target.display())),
            callback,
        );

        if self.keep_original {
            report.push(StatusLine::keep(&name, "original kept"), callback);
            return;
        }

        match fs::remove_file(&item.path) {
            Ok(()) => report.push(StatusLine::delete(&name, "original deleted"), callback),
            Err(e) => report.push(
                StatusLine::warning(&name, format!("converted, but the original could not be deleted: {}", e)),
                callback,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DossierError;
    use crate::report::Stage;
    use crate::template::defaults;
    use std::cell::Cell;
    use tempfile::TempDir;

    /// Writes a fake PDF, or fails for file names containing `fail_on`.
    struct FakeConverter {
        fail_on: &'static str,
        calls: Cell<usize>,
    }

    impl FakeConverter {
        fn new(fail_on: &'static str) -> Self {
            Self {
                fail_on,
                calls: Cell::new(0),
            }
        }
    }

    impl DocumentConverter for FakeConverter {
        fn name(&self) -> &str {
            "fake"
        }

        fn supports(&self, extension: &str) -> bool {
            extension == ".doc" || extension == ".docx"
        }

        fn convert(&self, source: &Path, target: &Path) -> Result<()> {
            self.calls.set(self.calls.get() + 1);
            let name = source.file_name().unwrap().to_string_lossy();
            if !self.fail_on.is_empty() && name.contains(self.fail_on) {
                return Err(DossierError::ConversionFailure {
                    path: source.display().to_string(),
                    message: "simulated failure".to_string(),
                });
            }
            fs::create_dir_all(target.parent().unwrap())?;
            let body = fs::read(source)?;
            fs::write(target, [b"%PDF-fake\n".as_slice(), &body].concat())?;
            Ok(())
        }
    }

    fn documents() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("sub")).unwrap();
        fs::write(temp_dir.path().join("a.docx"), "alpha").unwrap();
        fs::write(temp_dir.path().join("sub/b.DOC"), "beta").unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "ignored").unwrap();
        temp_dir
    }

    #[test]
    fn test_keep_originals_is_idempotent() {
        let temp_dir = documents();
        let converter = FakeConverter::new("");
        let job = DocumentConverterJob::new(&defaults::builtin(JobKind::Convert), &converter).unwrap();

        let first = job.convert(temp_dir.path(), None).unwrap();
        assert_eq!(first.count(Stage::Success), 2);
        assert_eq!(first.count(Stage::Keep), 2);
        assert!(temp_dir.path().join("a.docx").exists());
        let pdf_before = fs::read(temp_dir.path().join("sub/b.pdf")).unwrap();

        let second = job.convert(temp_dir.path(), None).unwrap();
        assert_eq!(second.count(Stage::Skip), 2);
        assert_eq!(second.lines.len(), 2);
        assert_eq!(converter.calls.get(), 2);
        assert_eq!(fs::read(temp_dir.path().join("sub/b.pdf")).unwrap(), pdf_before);
    }

    #[test]
    fn test_delete_originals_after_success() {
        let temp_dir = documents();
        let converter = FakeConverter::new("");
        let job = DocumentConverterJob::new(&defaults::builtin(JobKind::Convert), &converter)
            .unwrap()
            .with_keep_original(Some(false));

        let report = job.convert(temp_dir.path(), None).unwrap();

        assert!(!temp_dir.path().join("a.docx").exists());
        assert!(temp_dir.path().join("a.pdf").exists());
        assert!(temp_dir.path().join("notes.txt").exists());
        assert_eq!(report.count(Stage::Delete), 2);
    }

    #[test]
    fn test_failure_leaves_source_untouched_and_continues() {
        let temp_dir = documents();
        let converter = FakeConverter::new("a.docx");
        let job = DocumentConverterJob::new(&defaults::builtin(JobKind::Convert), &converter)
            .unwrap()
            .with_keep_original(Some(false));

        let report = job.convert(temp_dir.path(), None).unwrap();

        assert_eq!(fs::read_to_string(temp_dir.path().join("a.docx")).unwrap(), "alpha");
        assert!(!temp_dir.path().join("a.pdf").exists());
        assert!(!temp_dir.path().join("sub/b.DOC").exists());
        assert!(temp_dir.path().join("sub/b.pdf").exists());
        assert_eq!(report.items_with(Stage::Error), vec!["a.docx"]);
        assert!(report.has_failures());
    }

    #[test]
    fn test_output_dir_mirrors_layout() {
        let temp_dir = documents();
        let output = temp_dir.path().join("pdf");
        let converter = FakeConverter::new("");
        let job = DocumentConverterJob::new(&defaults::builtin(JobKind::Convert), &converter)
            .unwrap()
            .with_output_dir(Some(output.clone()));

        job.convert(temp_dir.path(), None).unwrap();

        assert!(output.join("a.pdf").exists());
        assert!(output.join("sub/b.pdf").exists());
        assert!(!temp_dir.path().join("a.pdf").exists());
    }

    #[test]
    fn test_categories_narrow_candidates() {
        let temp_dir = documents();
        let converter = FakeConverter::new("");
        let template = defaults::builtin(JobKind::Convert).with_category("nested", &["sub/"]);
        let job = DocumentConverterJob::new(&template, &converter).unwrap();

        let (items, _) = job.candidates(temp_dir.path()).unwrap();
        let names: Vec<_> = items.iter().map(|i| i.display_path()).collect();
        assert_eq!(names, vec!["sub/b.DOC"]);
    }

    #[test]
    fn test_dry_run_converts_nothing() {
        let temp_dir = documents();
        let converter = FakeConverter::new("");
        let job = DocumentConverterJob::new(&defaults::builtin(JobKind::Convert), &converter)
            .unwrap()
            .with_dry_run(true);

        let report = job.convert(temp_dir.path(), None).unwrap();
        assert_eq!(converter.calls.get(), 0);
        assert_eq!(report.count(Stage::Info), 2);
    }

    #[test]
    fn test_live_callback_sees_every_line() {
        let temp_dir = documents();
        let converter = FakeConverter::new("");
        let job = DocumentConverterJob::new(&defaults::builtin(JobKind::Convert), &converter).unwrap();
        let seen = Cell::new(0);
        let callback = |_: &StatusLine| seen.set(seen.get() + 1);

        let report = job.convert(temp_dir.path(), Some(&callback)).unwrap();
        assert_eq!(seen.get(), report.lines.len());
    }
}
