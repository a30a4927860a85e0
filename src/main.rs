use clap::Parser;
use dossier::{
    Cli, Command, Dossier, DossierError, JobReport, OutputFormatter, OutputMode, UserFriendlyError,
};
use std::path::PathBuf;
use std::process;

fn main() {
    let exit_code = run();
    process::exit(exit_code);
}

fn run() -> i32 {
    let cli = Cli::parse();
    setup_logging(&cli);

    if cli.generate_config {
        return handle_generate_config(&cli);
    }

    let command = match cli.command {
        Some(ref command) => command,
        None => {
            eprintln!("No command given. Run `dossier --help` for usage.");
            return 1;
        }
    };

    let dossier = match Dossier::from_cli(&cli) {
        Ok(dossier) => dossier,
        Err(e) => {
            print_startup_error(&e);
            return exit_code_for(&e);
        }
    };

    let outcome = match command {
        Command::Unpack(args) => dossier.run_unpack(args).map(Some),
        Command::Prune(args) => dossier.run_prune(args).map(Some),
        Command::Extract(args) => dossier.run_extract(args).map(Some),
        Command::Convert(args) => dossier.run_convert(args).map(Some),
        Command::Rename(args) => dossier.run_rename(args).map(Some),
        Command::Merge(args) => dossier.run_merge(args).map(Some),
        Command::Run(args) => dossier.run_pipeline(args).map(Some),
        Command::Check(args) => dossier.run_check(args).map(Some),
        Command::Templates(command) => dossier.run_templates(command).map(|_| None),
    };

    match outcome {
        Ok(Some(report)) => report_exit_code(&report),
        Ok(None) => 0,
        Err(e) => {
            dossier.handle_error(&e);
            exit_code_for(&e)
        }
    }
}

/// Finished jobs exit 2 when any item failed or conflicted. For `run` this
/// includes a step that failed outright; for `check` any error finding.
fn report_exit_code(report: &JobReport) -> i32 {
    if report.has_failures() {
        2
    } else {
        0
    }
}

fn exit_code_for(error: &DossierError) -> i32 {
    match error {
        DossierError::Cancelled => 130, // Interrupted (SIGINT)
        DossierError::TemplateNotFound { .. } => 3,
        DossierError::TemplateValidation { .. } => 4,
        DossierError::MergeInputMissing { .. } | DossierError::MergeInputUnreadable { .. } => 5,
        DossierError::InvalidPath { .. } => 6,
        _ => 1,
    }
}

fn handle_generate_config(cli: &Cli) -> i32 {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("dossier.toml"));

    match Dossier::generate_sample_config(&config_path) {
        Ok(()) => {
            println!("Generated sample configuration file: {}", config_path.display());
            println!("\nTo use this configuration:");
            println!("  dossier --config {} <command>", config_path.display());
            println!("\nEdit the file to customize settings for your needs.");
            0
        }
        Err(e) => {
            eprintln!("Failed to generate configuration file: {}", e.user_message());
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            1
        }
    }
}

fn print_startup_error(error: &DossierError) {
    let formatter = OutputFormatter::new(OutputMode::Human, 0, false);
    formatter.print_user_friendly_error(error);
}

fn setup_logging(cli: &Cli) {
    let default_filter = match cli.verbosity_level() {
        0 => "dossier=info",
        1 => "dossier=debug",
        _ => "dossier=trace",
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_secs()
        .init();
}
