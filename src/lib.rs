pub mod cli;
pub mod config;
pub mod converter;
pub mod error;
pub mod jobs;
pub mod matcher;
pub mod report;
pub mod scanner;
pub mod template;
pub mod ui;

// Public API re-exports
pub use cli::{Cli, Command, OutputFormat};
pub use config::{CliOverrides, Config};
pub use error::{DossierError, Result, UserFriendlyError};

// Core functionality re-exports
pub use converter::{CompositeConverter, DocumentConverter, ImageConverter, OfficeConverter};
pub use jobs::{
    ArchiveUnpacker, DocumentConverterJob, FileRenamer, FolderExtractor, FolderPruner, PdfMerger,
    PreflightCheck,
};
pub use matcher::{matches, Classifier, Dialect};
pub use report::{JobReport, Stage, StatusLine};
pub use template::{JobKind, Template, TemplateStore};
pub use ui::{GracefulShutdown, OutputFormatter, OutputMode, ProgressManager};

use cli::{
    CheckArgs, ConvertArgs, ExtractArgs, MergeArgs, PruneArgs, RenameArgs, RunArgs, TemplateArg,
    TemplatesCommand, UnpackArgs,
};
use log::{debug, warn};
use report::StatusCallback;
use std::path::{Path, PathBuf};
use ui::ProgressAwareOutput;

/// A failure in one of these stops `run` unless `--keep-going` is given.
const CRITICAL_STEPS: [JobKind; 2] = [JobKind::Unpack, JobKind::Prune];

/// Main library interface: one configured session running batch jobs.
pub struct Dossier {
    config: Config,
    store: TemplateStore,
    output_formatter: OutputFormatter,
    progress_manager: ProgressManager,
    shutdown: GracefulShutdown,
    dry_run: bool,
}

impl Dossier {
    pub fn new(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Result<Self> {
        let shutdown = GracefulShutdown::new()?;
        Ok(Self::with_parts(config, output_mode, verbose, quiet, shutdown))
    }

    /// Create an instance without installing the Ctrl+C handler.
    #[cfg(test)]
    pub fn new_for_test(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        Self::with_parts(config, output_mode, verbose, quiet, GracefulShutdown::new_for_test())
    }

    fn with_parts(
        config: Config,
        output_mode: OutputMode,
        verbose: u8,
        quiet: bool,
        shutdown: GracefulShutdown,
    ) -> Self {
        let output_formatter = OutputFormatter::new(output_mode, verbose, quiet);
        let show_progress = config.output.progress && output_mode == OutputMode::Human && !quiet;
        let progress_manager = ProgressManager::new(show_progress);
        let store = TemplateStore::new(config.paths.template_dir.clone());

        Self {
            config,
            store,
            output_formatter,
            progress_manager,
            shutdown,
            dry_run: false,
        }
    }

    pub fn from_cli(cli_args: &Cli) -> Result<Self> {
        let config = cli_args.load_config()?;
        let output_mode = OutputMode::from(cli_args.output_format);

        Ok(Self::new(config, output_mode, cli_args.verbosity_level(), cli_args.quiet)?
            .with_dry_run(cli_args.dry_run))
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Resolves the template a job runs with. No name, or a `default` that
    /// is not stored, selects the built-in template for the kind.
    pub fn load_template(&self, kind: JobKind, name: Option<&str>) -> Result<Template> {
        let name = match name {
            Some(name) => name,
            None => return Ok(template::defaults::builtin(kind)),
        };

        let template = match self.store.load(kind, name) {
            Ok(template) => template,
            Err(DossierError::TemplateNotFound { .. }) if name == "default" => {
                return Ok(template::defaults::builtin(kind));
            }
            Err(e) => return Err(e),
        };

        for warning in self.store.validate(kind, &template).into_result()? {
            warn!("{} template '{}': {}", kind, template.name, warning);
        }
        Ok(template)
    }

    pub fn run_unpack(&self, args: &UnpackArgs) -> Result<JobReport> {
        let template = self.load_template(JobKind::Unpack, args.template.template.as_deref())?;
        let mut unpacker = ArchiveUnpacker::new(&template)?
            .with_dry_run(self.dry_run)
            .with_shutdown(self.shutdown.clone());

        // The configured list (which already carries --encodings) applies
        // unless the template names its own and no flag was given.
        if args.encodings.is_some() || !template.options.contains_key("fallback_encodings") {
            unpacker = unpacker.with_fallback_encodings(&self.config.unpack.fallback_encodings)?;
        }
        debug!("Fallback encodings: {:?}", unpacker.fallback_names());

        match &args.archive {
            Some(archive) => {
                let destination = args
                    .dest
                    .clone()
                    .unwrap_or_else(|| archive.with_extension(""));
                self.run_job(JobKind::Unpack, &template, |callback| {
                    unpacker.unpack(archive, &destination, callback)
                })
            }
            None => {
                let directory = self.dir_or(&args.all, &self.config.paths.data_dir);
                self.run_job(JobKind::Unpack, &template, |callback| {
                    unpacker.unpack_all(&directory, callback)
                })
            }
        }
    }

    pub fn run_prune(&self, args: &PruneArgs) -> Result<JobReport> {
        let template = self.load_template(JobKind::Prune, args.template.template.as_deref())?;
        let pruner = FolderPruner::new(&template)?
            .with_dry_run(self.dry_run)
            .with_shutdown(self.shutdown.clone());
        let directory = self.dir_or(&args.directory, &self.config.paths.data_dir);

        self.run_job(JobKind::Prune, &template, |callback| {
            if args.each {
                pruner.prune_each(&directory, callback)
            } else {
                pruner.prune(&directory, callback)
            }
        })
    }

    pub fn run_extract(&self, args: &ExtractArgs) -> Result<JobReport> {
        let template = self.load_template(JobKind::Extract, args.template.template.as_deref())?;
        let extractor = FolderExtractor::new(&template)?
            .with_dry_run(self.dry_run)
            .with_shutdown(self.shutdown.clone());
        let source = self.dir_or(&args.source, &self.config.paths.data_dir);
        let output = self.dir_or(&args.output, &self.config.paths.output_dir);

        self.run_job(JobKind::Extract, &template, |callback| {
            extractor.extract(&source, &output, callback)
        })
    }

    pub fn run_convert(&self, args: &ConvertArgs) -> Result<JobReport> {
        let template = self.load_template(JobKind::Convert, args.template.template.as_deref())?;
        let converter = self.document_converter();
        let job = DocumentConverterJob::new(&template, &converter)?
            .with_keep_original(self.config.convert.keep_original_files)
            .with_output_dir(args.output.clone())
            .with_dry_run(self.dry_run)
            .with_shutdown(self.shutdown.clone());
        let directory = self.dir_or(&args.directory, &self.config.paths.output_dir);

        debug!(
            "Converting with '{}', originals {}",
            self.config.convert.office_command,
            if job.keeps_originals() { "kept" } else { "deleted" }
        );
        self.run_job(JobKind::Convert, &template, |callback| {
            job.convert(&directory, callback)
        })
    }

    pub fn run_rename(&self, args: &RenameArgs) -> Result<JobReport> {
        let template = self.load_template(JobKind::Rename, args.template.template.as_deref())?;
        let renamer = FileRenamer::new(&template)?
            .with_dry_run(self.dry_run)
            .with_shutdown(self.shutdown.clone());
        let directory = self.dir_or(&args.directory, &self.config.paths.output_dir);

        self.run_job(JobKind::Rename, &template, |callback| {
            renamer.rename(&directory, callback)
        })
    }

    /// Merges the given PDFs, or the ones collected from `--dir`. With
    /// `--list` or `--dry-run` only page counts are reported.
    pub fn run_merge(&self, args: &MergeArgs) -> Result<JobReport> {
        let template = self.load_template(JobKind::Merge, args.template.template.as_deref())?;
        let merger = PdfMerger::new(&template)?.with_shutdown(self.shutdown.clone());

        let (inputs, output_dir) = if args.inputs.is_empty() {
            let directory = self.dir_or(&args.dir, &self.config.paths.output_dir);
            (merger.collect_inputs(&directory)?, directory)
        } else {
            (args.inputs.clone(), self.config.paths.output_dir.clone())
        };
        let output = args
            .output
            .clone()
            .unwrap_or_else(|| output_dir.join(merger.output_name()));

        if args.list || self.dry_run {
            return self.list_merge(&merger, &template, &inputs, &output);
        }

        self.run_job(JobKind::Merge, &template, |callback| {
            merger.merge(&inputs, &output, callback)
        })
    }

    fn list_merge(
        &self,
        merger: &PdfMerger,
        template: &Template,
        inputs: &[PathBuf],
        output: &Path,
    ) -> Result<JobReport> {
        self.run_job(JobKind::Merge, template, |callback| {
            let mut report = JobReport::new(JobKind::Merge, template.name.clone());
            let mut total = 0;

            for (path, pages) in merger.page_counts(inputs) {
                let item = path.display().to_string();
                match pages {
                    Ok(pages) => {
                        total += pages;
                        report.push(StatusLine::info(item, format!("{} page(s)", pages)), callback);
                    }
                    Err(e) => report.push(StatusLine::error(item, e.to_string()), callback),
                }
            }

            report.push(
                StatusLine::info(
                    output.display().to_string(),
                    format!("would merge {} file(s), {} page(s)", inputs.len(), total),
                ),
                callback,
            );
            Ok(report.finish())
        })
    }

    /// Runs `args.steps` in order, each with its default arguments and
    /// built-in template, and folds their lines into one report.
    ///
    /// A step that fails outright is recorded as an error line. After a
    /// critical step fails the remaining steps are skipped; other failures
    /// let the chain continue. Cancellation always ends the run.
    pub fn run_pipeline(&self, args: &RunArgs) -> Result<JobReport> {
        let total = args.steps.len();
        let mut combined = JobReport::named("run", "default");
        let output = ProgressAwareOutput::new(&self.output_formatter, Some(&self.progress_manager));
        let on_status = |line: &StatusLine| output.status(line);
        let callback: &dyn Fn(&StatusLine) = &on_status;

        for (index, &step) in args.steps.iter().enumerate() {
            self.shutdown.check_shutdown()?;
            combined.push(
                StatusLine::info(step.as_str(), format!("step {}/{}", index + 1, total)),
                Some(callback),
            );

            match self.run_step(step) {
                Ok(report) => combined.absorb(report),
                Err(DossierError::Cancelled) => return Err(DossierError::Cancelled),
                Err(e) => {
                    warn!("Step {} failed: {}", step, e);
                    combined.push(StatusLine::error(step.as_str(), e.user_message()), Some(callback));

                    if CRITICAL_STEPS.contains(&step) && !args.keep_going {
                        for skipped in &args.steps[index + 1..] {
                            combined.push(
                                StatusLine::skip(skipped.as_str(), format!("not run after {} failed", step)),
                                Some(callback),
                            );
                        }
                        break;
                    }
                }
            }
        }

        let combined = combined.finish();
        self.record_report(&combined)?;
        Ok(combined)
    }

    fn run_step(&self, step: JobKind) -> Result<JobReport> {
        match step {
            JobKind::Unpack => self.run_unpack(&UnpackArgs {
                archive: None,
                all: None,
                dest: None,
                encodings: None,
                template: TemplateArg::default(),
            }),
            JobKind::Prune => self.run_prune(&PruneArgs {
                directory: None,
                each: false,
                template: TemplateArg::default(),
            }),
            JobKind::Extract => self.run_extract(&ExtractArgs {
                source: None,
                output: None,
                template: TemplateArg::default(),
            }),
            JobKind::Convert => self.run_convert(&ConvertArgs {
                directory: None,
                keep: false,
                delete: false,
                output: None,
                template: TemplateArg::default(),
            }),
            JobKind::Rename => self.run_rename(&RenameArgs {
                directory: None,
                template: TemplateArg::default(),
            }),
            JobKind::Merge => self.run_merge(&MergeArgs {
                inputs: Vec::new(),
                dir: None,
                output: None,
                list: false,
                template: TemplateArg::default(),
            }),
        }
    }

    /// Inspects directories, stored templates, the office converter and the
    /// staged packages without changing anything.
    pub fn run_check(&self, args: &CheckArgs) -> Result<JobReport> {
        self.shutdown.check_shutdown()?;
        let prune = self.load_template(JobKind::Prune, args.prune_template.as_deref())?;
        let extract = self.load_template(JobKind::Extract, args.extract_template.as_deref())?;
        let checker = PreflightCheck::new(&self.config.paths, &self.store, &prune, &extract)?
            .with_office_command(self.config.convert.office_command.clone())
            .with_shutdown(self.shutdown.clone());
        let packages = self.dir_or(&args.directory, &self.config.paths.data_dir);

        self.output_formatter.start_operation(&format!(
            "Checking the environment and packages under {}",
            packages.display()
        ));
        let output = ProgressAwareOutput::new(&self.output_formatter, Some(&self.progress_manager));
        let on_status = |line: &StatusLine| output.status(line);
        let callback: &dyn Fn(&StatusLine) = &on_status;

        let report = checker.check(&packages, Some(callback))?;
        self.record_report(&report)?;
        Ok(report)
    }

    /// Runs one job with live status output, then records and summarizes it.
    fn run_job<F>(&self, kind: JobKind, template: &Template, job: F) -> Result<JobReport>
    where
        F: FnOnce(StatusCallback<'_>) -> Result<JobReport>,
    {
        self.shutdown.check_shutdown()?;
        self.output_formatter.start_operation(&format!(
            "Running {} with template '{}'{}",
            kind,
            template.name,
            if self.dry_run { " (dry run)" } else { "" }
        ));

        let spinner = self.progress_manager.create_job_spinner(kind.as_str());
        let output = ProgressAwareOutput::new(&self.output_formatter, Some(&self.progress_manager));
        let on_status = |line: &StatusLine| {
            ui::progress::update_item_progress(&spinner, line);
            output.status(line);
        };
        let callback: &dyn Fn(&StatusLine) = &on_status;

        let report = match job(Some(callback)) {
            Ok(report) => report,
            Err(e) => {
                spinner.abandon();
                return Err(e);
            }
        };

        ui::progress::finish_progress_with_summary(
            &spinner,
            &format!("{} finished", kind),
            report.elapsed(),
        );

        self.record_report(&report)?;
        Ok(report)
    }

    /// Saves the report when a report file is configured, then prints its summary.
    fn record_report(&self, report: &JobReport) -> Result<()> {
        if let Some(path) = &self.config.output.report_file {
            report.save_json(path)?;
            debug!("Report written to {}", path.display());
        }

        self.output_formatter.print_job_summary(report);
        Ok(())
    }

    fn document_converter(&self) -> CompositeConverter {
        let office = OfficeConverter::new(self.config.convert.office_command.clone())
            .with_args(self.config.convert.office_args.clone());
        CompositeConverter::standard(office)
    }

    fn dir_or(&self, explicit: &Option<PathBuf>, fallback: &Path) -> PathBuf {
        explicit.clone().unwrap_or_else(|| fallback.to_path_buf())
    }

    pub fn run_templates(&self, command: &TemplatesCommand) -> Result<()> {
        match command {
            TemplatesCommand::List { kind } => self.list_templates(*kind),
            TemplatesCommand::Show { kind, name } => {
                let template = self.load_template(*kind, Some(name.as_str()))?;
                self.output_formatter.print_document(&serde_json::to_value(&template)?);
                Ok(())
            }
            TemplatesCommand::Validate { kind, target } => self.validate_template(*kind, target),
            TemplatesCommand::Init { force } => self.init_templates(*force).map(|_| ()),
        }
    }

    pub fn list_templates(&self, kind: Option<JobKind>) -> Result<()> {
        let kinds: Vec<JobKind> = match kind {
            Some(kind) => vec![kind],
            None => JobKind::ALL.to_vec(),
        };

        let mut listing = Vec::new();
        for kind in kinds {
            for summary in self.store.list_available(kind)? {
                listing.push((kind.to_string(), summary));
            }
        }

        self.output_formatter.print_template_list(&listing);
        if listing.is_empty() {
            self.output_formatter.info(&format!(
                "Template directory {} is empty; run `dossier templates init` to install the built-in templates",
                self.store.root().display()
            ));
        }
        Ok(())
    }

    /// Validates a stored template, or a template file when `target` is a
    /// path to one.
    pub fn validate_template(&self, kind: JobKind, target: &str) -> Result<()> {
        let path = Path::new(target);
        let template = if path.is_file() {
            TemplateStore::load_file(path)?
        } else {
            self.store.load(kind, target)?
        };

        self.output_formatter
            .print_header(&format!("Validating {} template '{}'", kind, template.name));
        let report = self.store.validate(kind, &template);
        for warning in &report.warnings {
            self.output_formatter.warning(warning);
        }
        for error in &report.errors {
            self.output_formatter.error(error);
        }

        if report.is_valid() {
            self.output_formatter
                .success(&format!("{} template '{}' is valid", kind, template.name));
        }
        report.into_result().map(|_| ())
    }

    /// Writes the built-in template of every kind into the store. Existing
    /// files are left alone unless `force` is set. Returns how many were written.
    pub fn init_templates(&self, force: bool) -> Result<usize> {
        let mut written = 0;

        for kind in JobKind::ALL {
            let template = template::defaults::builtin(kind);
            let path = self
                .store
                .kind_directory(kind)
                .join(format!("{}.json", template.name));

            if path.exists() && !force {
                self.output_formatter
                    .info(&format!("Keeping existing {}", path.display()));
                continue;
            }

            self.store.save(kind, &template)?;
            self.output_formatter
                .success(&format!("Wrote {}", path.display()));
            written += 1;
        }

        Ok(written)
    }

    pub fn generate_sample_config<P: AsRef<Path>>(output_path: P) -> Result<()> {
        let sample_config = Config::create_sample_config();
        std::fs::write(output_path.as_ref(), sample_config)?;
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &TemplateStore {
        &self.store
    }

    pub fn output_formatter(&self) -> &OutputFormatter {
        &self.output_formatter
    }

    pub fn progress_manager(&self) -> &ProgressManager {
        &self.progress_manager
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn is_running(&self) -> bool {
        self.shutdown.is_running()
    }

    pub fn request_shutdown(&self) {
        self.shutdown.request_shutdown();
    }

    pub fn handle_error(&self, error: &DossierError) {
        self.output_formatter.print_user_friendly_error(error);
    }
}

pub fn version_info() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown"),
        build_date: option_env!("BUILD_DATE").unwrap_or("unknown"),
        target: std::env::consts::ARCH.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub build_date: &'static str,
    pub target: String,
}

impl std::fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Dossier {} ({}) built on {} for {}",
            self.version, self.git_hash, self.build_date, self.target
        )
    }
}
