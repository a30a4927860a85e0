use crate::cli::OutputFormat;
use crate::error::{DossierError, UserFriendlyError};
use crate::report::{JobReport, Stage, StatusLine};
use crate::template::TemplateSummary;
use console::{style, Emoji, Term};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputMode {
    Human,
    Json,
    Plain,
}

impl From<OutputFormat> for OutputMode {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Human => OutputMode::Human,
            OutputFormat::Json => OutputMode::Json,
            OutputFormat::Plain => OutputMode::Plain,
        }
    }
}

// Emojis with text fallbacks
static CHECKMARK: Emoji = Emoji("✅ ", "✓ ");
static CROSS: Emoji = Emoji("❌ ", "✗ ");
static INFO: Emoji = Emoji("ℹ️  ", "i ");
static WARNING: Emoji = Emoji("⚠️  ", "! ");
static ROCKET: Emoji = Emoji("🚀 ", "> ");
static SPARKLES: Emoji = Emoji("✨ ", "* ");
static SKIP: Emoji = Emoji("⏭️  ", "- ");
static TRASH: Emoji = Emoji("🗑️  ", "x ");
static PIN: Emoji = Emoji("📌 ", "= ");
static CLASH: Emoji = Emoji("⚡ ", "~ ");

pub struct OutputFormatter {
    mode: OutputMode,
    use_colors: bool,
    verbose_level: u8,
    quiet: bool,
}

impl OutputFormatter {
    pub fn new(mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        let use_colors = match mode {
            OutputMode::Human => Term::stdout().features().colors_supported() && !quiet,
            _ => false,
        };

        Self {
            mode,
            use_colors,
            verbose_level: if quiet { 0 } else { verbose },
            quiet,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    // Core messaging methods
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Success, message),
            OutputMode::Json => self.print_json_message("success", message),
            OutputMode::Plain => println!("SUCCESS: {}", message),
        }
    }

    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Error, message),
            OutputMode::Json => self.print_json_message("error", message),
            OutputMode::Plain => eprintln!("ERROR: {}", message),
        }
    }

    pub fn warning(&self, message: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Warning, message),
                OutputMode::Json => self.print_json_message("warning", message),
                OutputMode::Plain => println!("WARNING: {}", message),
            }
        }
    }

    pub fn info(&self, message: &str) {
        if self.should_show_message(1) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Info, message),
                OutputMode::Json => self.print_json_message("info", message),
                OutputMode::Plain => println!("INFO: {}", message),
            }
        }
    }

    pub fn start_operation(&self, operation: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        println!("{}{}", ROCKET, style(operation).bold());
                    } else {
                        println!("> {}", operation);
                    }
                }
                OutputMode::Json => self.print_json_message("operation_start", operation),
                OutputMode::Plain => println!("STARTING: {}", operation),
            }
        }
    }

    /// One line of the status protocol. Quiet mode only shows failures.
    pub fn status(&self, line: &StatusLine) {
        if self.quiet && !line.stage.is_failure() {
            return;
        }

        match self.mode {
            OutputMode::Human => self.print_human_status(line),
            OutputMode::Json => self.print_json_object(&serde_json::json!({
                "type": "status",
                "stage": line.stage,
                "item": line.item,
                "detail": line.detail,
                "timestamp": chrono::Utc::now().to_rfc3339()
            })),
            OutputMode::Plain => println!("{}", plain_status(line)),
        }
    }

    // User-friendly error handling
    pub fn print_user_friendly_error(&self, error: &DossierError) {
        let user_message = error.user_message();
        self.error(&user_message);

        if let Some(suggestion) = error.suggestion() {
            match self.mode {
                OutputMode::Human => {
                    eprintln!();
                    if self.use_colors {
                        eprintln!(
                            "{}{}",
                            INFO,
                            style(&format!("Suggestion: {}", suggestion)).cyan()
                        );
                    } else {
                        eprintln!("Suggestion: {}", suggestion);
                    }
                }
                OutputMode::Json => {
                    self.print_json_object(&serde_json::json!({
                        "type": "suggestion",
                        "message": suggestion
                    }));
                }
                OutputMode::Plain => {
                    eprintln!("SUGGESTION: {}", suggestion);
                }
            }
        }
    }

    // Summary and reporting
    pub fn print_job_summary(&self, report: &JobReport) {
        match self.mode {
            OutputMode::Human if !self.quiet => self.print_human_summary(report),
            OutputMode::Human => println!("{}", summary_counts(report)),
            OutputMode::Json => {
                let mut summary = serde_json::to_value(report.summary())
                    .unwrap_or_else(|_| serde_json::json!({}));
                if let Some(object) = summary.as_object_mut() {
                    object.insert("type".to_string(), "summary".into());
                    object.insert(
                        "timestamp".to_string(),
                        chrono::Utc::now().to_rfc3339().into(),
                    );
                }
                self.print_json_object(&summary);
            }
            OutputMode::Plain => {
                println!("COMPLETED: {} ({})", report.job, report.template);
                println!("{}", summary_counts(report));
                println!("Duration: {}", format_duration(report.elapsed()));
            }
        }
    }

    pub fn print_template_list(&self, templates: &[(String, TemplateSummary)]) {
        match self.mode {
            OutputMode::Json => {
                for (kind, summary) in templates {
                    let mut value =
                        serde_json::to_value(summary).unwrap_or_else(|_| serde_json::json!({}));
                    if let Some(object) = value.as_object_mut() {
                        object.insert("type".to_string(), "template".into());
                        object.insert("kind".to_string(), kind.clone().into());
                    }
                    self.print_json_object(&value);
                }
            }
            OutputMode::Human | OutputMode::Plain => {
                if templates.is_empty() {
                    println!("No templates found.");
                    return;
                }
                for (kind, summary) in templates {
                    let name = format!("{}/{}", kind, summary.name);
                    let name = if self.use_colors {
                        style(name).bold().to_string()
                    } else {
                        name
                    };
                    println!(
                        "{}  v{}  {} categor{}  {}",
                        name,
                        summary.version,
                        summary.categories,
                        if summary.categories == 1 { "y" } else { "ies" },
                        summary.description
                    );
                }
            }
        }
    }

    /// Pretty JSON in every mode; used for `templates show`.
    pub fn print_document(&self, value: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
        );
    }

    // Specialized output methods
    pub fn print_header(&self, title: &str) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                println!();
                if self.use_colors {
                    println!("{} {}", SPARKLES, style(title).bold().cyan());
                } else {
                    println!("=== {} ===", title);
                }
                println!();
            }
            OutputMode::Json => {
                self.print_json_object(&serde_json::json!({
                    "type": "header",
                    "title": title
                }));
            }
            OutputMode::Plain => {
                println!("=== {} ===", title);
            }
        }
    }

    pub fn print_separator(&self) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                if self.use_colors {
                    println!("{}", style("─".repeat(60)).dim());
                } else {
                    println!("{}", "-".repeat(60));
                }
            }
            OutputMode::Plain => {
                println!("{}", "-".repeat(60));
            }
            OutputMode::Json => {}
        }
    }

    // Private helper methods
    fn should_show_message(&self, min_verbose_level: u8) -> bool {
        !self.quiet && self.verbose_level >= min_verbose_level
    }

    fn print_human_status(&self, line: &StatusLine) {
        let rest = if line.detail.is_empty() {
            line.item.clone()
        } else {
            format!("{}: {}", line.item, line.detail)
        };

        if !self.use_colors {
            println!("{}", plain_status(line));
            return;
        }

        let emoji = match line.stage {
            Stage::Success => CHECKMARK,
            Stage::Skip => SKIP,
            Stage::Delete => TRASH,
            Stage::Keep => PIN,
            Stage::Warning => WARNING,
            Stage::Error => CROSS,
            Stage::Conflict => CLASH,
            Stage::Info => INFO,
        };
        let marker = style(format!("{:<8}", line.stage.marker()));
        let marker = match line.stage {
            Stage::Success | Stage::Keep => marker.green(),
            Stage::Skip | Stage::Info => marker.dim(),
            Stage::Delete => marker.magenta(),
            Stage::Warning | Stage::Conflict => marker.yellow().bold(),
            Stage::Error => marker.red().bold(),
        };

        println!("{}{} {}", emoji, marker, rest);
    }

    fn print_human_summary(&self, report: &JobReport) {
        println!();
        self.print_separator();

        let title = format!("{} finished with template '{}'", report.job, report.template);
        if self.use_colors {
            let title = if report.has_failures() {
                style(title).yellow().bold()
            } else {
                style(title).green().bold()
            };
            println!("{}", title);
        } else {
            println!("{}", title);
        }

        println!();
        for (stage, count) in report.counts() {
            let count = if self.use_colors {
                style(count).cyan().bold().to_string()
            } else {
                count.to_string()
            };
            println!("  {:<10} {}", stage.marker().to_lowercase(), count);
        }
        println!("  {:<10} {}", "time", format_duration(report.elapsed()));

        self.print_separator();
    }

    fn print_human_message(&self, msg_type: MessageType, message: &str) {
        #[allow(clippy::type_complexity)]
        let (emoji, color_fn): (Emoji, Box<dyn Fn(&str) -> console::StyledObject<&str>>) =
            match msg_type {
                MessageType::Success => (CHECKMARK, Box::new(|msg| style(msg).green().bold())),
                MessageType::Error => (CROSS, Box::new(|msg| style(msg).red().bold())),
                MessageType::Warning => (WARNING, Box::new(|msg| style(msg).yellow().bold())),
                MessageType::Info => (INFO, Box::new(|msg| style(msg).cyan())),
            };

        if self.use_colors {
            match msg_type {
                MessageType::Error => eprintln!("{}{}", emoji, color_fn(message)),
                _ => println!("{}{}", emoji, color_fn(message)),
            }
        } else {
            let prefix = match msg_type {
                MessageType::Success => "✓",
                MessageType::Error => "✗",
                MessageType::Warning => "!",
                MessageType::Info => "i",
            };

            match msg_type {
                MessageType::Error => eprintln!("{} {}", prefix, message),
                _ => println!("{} {}", prefix, message),
            }
        }
    }

    fn print_json_message(&self, level: &str, message: &str) {
        self.print_json_object(&serde_json::json!({
            "type": "message",
            "level": level,
            "message": message,
            "timestamp": chrono::Utc::now().to_rfc3339()
        }));
    }

    fn print_json_object(&self, obj: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string(obj).unwrap_or_else(|_| "{}".to_string())
        );
    }
}

#[derive(Debug, Clone, Copy)]
enum MessageType {
    Success,
    Error,
    Warning,
    Info,
}

/// `STAGE item: detail`
pub fn plain_status(line: &StatusLine) -> String {
    if line.detail.is_empty() {
        format!("{} {}", line.stage.marker(), line.item)
    } else {
        format!("{} {}: {}", line.stage.marker(), line.item, line.detail)
    }
}

fn summary_counts(report: &JobReport) -> String {
    let parts: Vec<String> = report
        .counts()
        .into_iter()
        .map(|(stage, count)| format!("{}={}", stage.marker().to_lowercase(), count))
        .collect();
    if parts.is_empty() {
        "nothing to do".to_string()
    } else {
        parts.join(" ")
    }
}

pub(crate) fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}s", secs)
    } else {
        format!("{}ms", duration.as_millis())
    }
}

// Progress-aware output wrapper
pub struct ProgressAwareOutput<'a> {
    formatter: &'a OutputFormatter,
    progress_manager: Option<&'a crate::ui::ProgressManager>,
}

impl<'a> ProgressAwareOutput<'a> {
    pub fn new(
        formatter: &'a OutputFormatter,
        progress_manager: Option<&'a crate::ui::ProgressManager>,
    ) -> Self {
        Self {
            formatter,
            progress_manager,
        }
    }

    pub fn suspend_and_print<F>(&self, f: F)
    where
        F: FnOnce(&OutputFormatter),
    {
        if let Some(pm) = self.progress_manager {
            pm.suspend(|| f(self.formatter));
        } else {
            f(self.formatter);
        }
    }

    pub fn status(&self, line: &StatusLine) {
        self.suspend_and_print(|f| f.status(line));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::JobKind;

    #[test]
    fn test_output_mode_parsing() {
        assert_eq!(OutputMode::from(OutputFormat::Human), OutputMode::Human);
        assert_eq!(OutputMode::from(OutputFormat::Json), OutputMode::Json);
        assert_eq!(OutputMode::from(OutputFormat::Plain), OutputMode::Plain);
    }

    #[test]
    fn test_formatter_creation() {
        let formatter = OutputFormatter::new(OutputMode::Json, 1, false);
        assert_eq!(formatter.mode(), OutputMode::Json);
        assert_eq!(formatter.verbose_level, 1);
        assert!(!formatter.use_colors);
    }

    #[test]
    fn test_quiet_mode() {
        let formatter = OutputFormatter::new(OutputMode::Human, 2, true);
        assert_eq!(formatter.verbose_level, 0);
        assert!(formatter.quiet);
        assert!(!formatter.use_colors);
    }

    #[test]
    fn test_plain_status_format() {
        assert_eq!(
            plain_status(&StatusLine::delete("scratch", "folder deleted")),
            "DELETE scratch: folder deleted"
        );
        assert_eq!(plain_status(&StatusLine::keep("pkg", "")), "KEEP pkg");
    }

    #[test]
    fn test_summary_counts() {
        let mut report = JobReport::new(JobKind::Prune, "default");
        assert_eq!(summary_counts(&report), "nothing to do");

        report.push(StatusLine::keep("a", ""), None);
        report.push(StatusLine::delete("b", ""), None);
        report.push(StatusLine::delete("c", ""), None);
        assert_eq!(summary_counts(&report), "delete=2 keep=1");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
    }

    #[test]
    fn test_should_show_message() {
        let formatter = OutputFormatter::new(OutputMode::Human, 1, false);
        assert!(formatter.should_show_message(0));
        assert!(formatter.should_show_message(1));
        assert!(!formatter.should_show_message(2));

        let quiet_formatter = OutputFormatter::new(OutputMode::Human, 2, true);
        assert!(!quiet_formatter.should_show_message(0));
    }
}
