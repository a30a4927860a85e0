use crate::config::{CliOverrides, Config};
use crate::error::Result;
use crate::template::JobKind;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dossier")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Prepare regulatory submission packages in batch")]
#[command(
    long_about = "Dossier unpacks, prunes, extracts, converts, tags and merges the files of \
                  submission packages, driven by reusable JSON rule templates."
)]
#[command(before_help = "📦 Dossier - Submission Package Preparation")]
#[command(after_help = "EXAMPLES:\n  \
    dossier unpack --all data\n  \
    dossier prune data/申报资料 --template strict\n  \
    dossier extract data --output output\n  \
    dossier convert output --delete\n  \
    dossier rename output\n  \
    dossier merge --dir output/报告 --output output/全部报告.pdf\n  \
    dossier run --steps unpack,prune,rename\n  \
    dossier check\n  \
    dossier templates list prune\n  \
    dossier --generate-config")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Configuration file path
    #[arg(short, long, global = true, help = "Path to TOML configuration file")]
    pub config: Option<PathBuf>,

    /// Template root directory
    #[arg(long, global = true, help = "Directory holding <kind>/<name>.json templates")]
    pub template_dir: Option<PathBuf>,

    /// Staging directory for incoming packages
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Output directory for extracted and converted files
    #[arg(long, global = true, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format for status lines
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Human)]
    pub output_format: OutputFormat,

    /// Verbose output level (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (only errors and the summary)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Report what would change without touching any file
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Also write the job report as JSON to this file
    #[arg(long, global = true, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Disable progress spinners
    #[arg(long, global = true)]
    pub no_progress: bool,

    /// Generate sample configuration file
    #[arg(long, help = "Write a sample dossier.toml to the current directory")]
    pub generate_config: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract zip archives, repairing garbled (e.g. GBK) file names
    Unpack(UnpackArgs),
    /// Delete every entry of a package folder that matches no category
    Prune(PruneArgs),
    /// Copy matching folders into the output directory
    Extract(ExtractArgs),
    /// Convert documents to PDF
    Convert(ConvertArgs),
    /// Append category tags to matching file names
    Rename(RenameArgs),
    /// Merge PDFs into one file
    Merge(MergeArgs),
    /// Run several jobs in sequence with their default settings
    Run(RunArgs),
    /// Check the environment and the staged packages before a run
    Check(CheckArgs),
    /// Manage rule templates
    #[command(subcommand)]
    Templates(TemplatesCommand),
}

#[derive(Args, Debug, Default)]
pub struct TemplateArg {
    /// Template name (defaults to the built-in template)
    #[arg(short, long)]
    pub template: Option<String>,
}

#[derive(Args, Debug)]
pub struct UnpackArgs {
    /// Archive to extract
    #[arg(conflicts_with = "all")]
    pub archive: Option<PathBuf>,

    /// Extract every zip under DIR into a sibling folder named after it
    #[arg(long, value_name = "DIR")]
    pub all: Option<PathBuf>,

    /// Destination for a single archive (defaults to a folder next to it)
    #[arg(short, long, value_name = "DIR")]
    pub dest: Option<PathBuf>,

    /// Fallback encodings for non-UTF-8 names, in priority order (comma-separated)
    #[arg(long, value_name = "LABELS")]
    pub encodings: Option<String>,

    #[command(flatten)]
    pub template: TemplateArg,
}

#[derive(Args, Debug)]
pub struct PruneArgs {
    /// Package directory (defaults to the configured data directory)
    pub directory: Option<PathBuf>,

    /// Treat every subdirectory of DIRECTORY as its own package
    #[arg(long)]
    pub each: bool,

    #[command(flatten)]
    pub template: TemplateArg,
}

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Source tree (defaults to the configured data directory)
    pub source: Option<PathBuf>,

    /// Destination (defaults to the configured output directory)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub template: TemplateArg,
}

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Directory to convert (defaults to the configured output directory)
    pub directory: Option<PathBuf>,

    /// Keep the original documents after conversion
    #[arg(long, conflicts_with = "delete")]
    pub keep: bool,

    /// Delete the original documents after a successful conversion
    #[arg(long)]
    pub delete: bool,

    /// Write PDFs under this directory instead of next to the sources
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub template: TemplateArg,
}

impl ConvertArgs {
    pub fn keep_original(&self) -> Option<bool> {
        match (self.keep, self.delete) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

#[derive(Args, Debug)]
pub struct RenameArgs {
    /// Directory to tag (defaults to the configured output directory)
    pub directory: Option<PathBuf>,

    #[command(flatten)]
    pub template: TemplateArg,
}

#[derive(Args, Debug)]
pub struct MergeArgs {
    /// PDFs to merge, in order
    pub inputs: Vec<PathBuf>,

    /// Merge the PDFs in DIR, ordered by category then file name
    #[arg(long, value_name = "DIR", conflicts_with = "inputs")]
    pub dir: Option<PathBuf>,

    /// Output file (defaults to the template's output_name in the output directory)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// List the inputs with their page counts instead of merging
    #[arg(long)]
    pub list: bool,

    #[command(flatten)]
    pub template: TemplateArg,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Jobs to run, in this order (comma-separated)
    #[arg(
        long,
        value_name = "STEPS",
        value_delimiter = ',',
        default_values_t = RunArgs::FULL_FLOW
    )]
    pub steps: Vec<JobKind>,

    /// Continue with the next step after a failed unpack or prune
    #[arg(long)]
    pub keep_going: bool,
}

impl RunArgs {
    pub const FULL_FLOW: [JobKind; 5] = [
        JobKind::Unpack,
        JobKind::Prune,
        JobKind::Convert,
        JobKind::Rename,
        JobKind::Extract,
    ];
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            steps: Self::FULL_FLOW.to_vec(),
            keep_going: false,
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct CheckArgs {
    /// Package directory to inspect (defaults to the configured data directory)
    pub directory: Option<PathBuf>,

    /// Prune template the packages are checked against
    #[arg(long, value_name = "NAME")]
    pub prune_template: Option<String>,

    /// Extract template the packages are checked against
    #[arg(long, value_name = "NAME")]
    pub extract_template: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum TemplatesCommand {
    /// List templates, for one job kind or all of them
    List {
        kind: Option<JobKind>,
    },
    /// Print a template as JSON
    Show {
        kind: JobKind,
        name: String,
    },
    /// Validate a stored template or a JSON file
    Validate {
        kind: JobKind,
        /// Template name or path to a .json file
        target: String,
    },
    /// Write the built-in templates into the template directory
    Init {
        /// Overwrite templates that already exist
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// One JSON object per line
    Json,
    /// Plain text output
    Plain,
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_with_defaults(self.config.as_ref())?;

        let overrides = self.create_cli_overrides();
        config.merge_with_cli_args(&overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn create_cli_overrides(&self) -> CliOverrides {
        let (keep_original, encodings) = match &self.command {
            Some(Command::Convert(args)) => (args.keep_original(), None),
            Some(Command::Unpack(args)) => (None, args.encodings.clone()),
            _ => (None, None),
        };

        CliOverrides::new()
            .with_template_dir(self.template_dir.clone())
            .with_data_dir(self.data_dir.clone())
            .with_output_dir(self.output_dir.clone())
            .with_keep_original(keep_original)
            .with_fallback_encodings(encodings)
            .with_report_file(self.report.clone())
            .with_no_progress(self.no_progress || self.quiet)
    }

    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_prune_with_globals() {
        let cli = parse(&["dossier", "prune", "pkg", "--each", "-t", "strict", "--dry-run", "-vv"]);
        match cli.command {
            Some(Command::Prune(ref args)) => {
                assert_eq!(args.directory, Some(PathBuf::from("pkg")));
                assert!(args.each);
                assert_eq!(args.template.template.as_deref(), Some("strict"));
            }
            ref other => panic!("unexpected command: {:?}", other),
        }
        assert!(cli.dry_run);
        assert_eq!(cli.verbosity_level(), 2);

        let cli = parse(&["dossier", "--data-dir", "inbox", "prune"]);
        assert_eq!(
            cli.create_cli_overrides().data_dir,
            Some(PathBuf::from("inbox"))
        );
    }

    #[test]
    fn test_convert_keep_flags() {
        let cli = parse(&["dossier", "convert", "--delete"]);
        let overrides = cli.create_cli_overrides();
        assert_eq!(overrides.keep_original, Some(false));

        let cli = parse(&["dossier", "convert"]);
        assert_eq!(cli.create_cli_overrides().keep_original, None);

        assert!(Cli::try_parse_from(["dossier", "convert", "--keep", "--delete"]).is_err());
    }

    #[test]
    fn test_unpack_archive_and_all_conflict() {
        assert!(Cli::try_parse_from(["dossier", "unpack", "a.zip", "--all", "data"]).is_err());

        let cli = parse(&["dossier", "unpack", "--all", "data", "--encodings", "gbk,big5"]);
        assert_eq!(
            cli.create_cli_overrides().fallback_encodings.as_deref(),
            Some("gbk,big5")
        );
    }

    #[test]
    fn test_merge_inputs_and_dir_conflict() {
        let cli = parse(&["dossier", "merge", "a.pdf", "b.pdf", "-o", "all.pdf"]);
        match cli.command {
            Some(Command::Merge(args)) => {
                assert_eq!(args.inputs.len(), 2);
                assert_eq!(args.output, Some(PathBuf::from("all.pdf")));
            }
            other => panic!("unexpected command: {:?}", other),
        }

        assert!(Cli::try_parse_from(["dossier", "merge", "a.pdf", "--dir", "x"]).is_err());
    }

    #[test]
    fn test_templates_subcommands() {
        let cli = parse(&["dossier", "templates", "show", "Rename", "default"]);
        match cli.command {
            Some(Command::Templates(TemplatesCommand::Show { kind, name })) => {
                assert_eq!(kind, JobKind::Rename);
                assert_eq!(name, "default");
            }
            other => panic!("unexpected command: {:?}", other),
        }

        assert!(Cli::try_parse_from(["dossier", "templates", "list", "bogus"]).is_err());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["dossier", "-q", "-v", "rename"]).is_err());
        let cli = parse(&["dossier", "--output-format", "json", "rename"]);
        assert_eq!(cli.output_format, OutputFormat::Json);
    }

    #[test]
    fn test_run_steps() {
        let cli = parse(&["dossier", "run"]);
        match cli.command {
            Some(Command::Run(ref args)) => {
                assert_eq!(args.steps, RunArgs::FULL_FLOW.to_vec());
                assert!(!args.keep_going);
            }
            ref other => panic!("unexpected command: {:?}", other),
        }

        let cli = parse(&["dossier", "run", "--steps", "rename,Prune", "--keep-going"]);
        match cli.command {
            Some(Command::Run(args)) => {
                assert_eq!(args.steps, vec![JobKind::Rename, JobKind::Prune]);
                assert!(args.keep_going);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        assert!(Cli::try_parse_from(["dossier", "run", "--steps", "unpack,bogus"]).is_err());
    }

    #[test]
    fn test_check_arguments() {
        let cli = parse(&["dossier", "check", "inbox", "--prune-template", "strict"]);
        match cli.command {
            Some(Command::Check(args)) => {
                assert_eq!(args.directory, Some(PathBuf::from("inbox")));
                assert_eq!(args.prune_template.as_deref(), Some("strict"));
                assert_eq!(args.extract_template, None);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_generate_config_needs_no_command() {
        let cli = parse(&["dossier", "--generate-config"]);
        assert!(cli.generate_config);
        assert!(cli.command.is_none());
    }
}
