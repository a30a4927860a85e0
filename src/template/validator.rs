use crate::error::{DossierError, Result};
use crate::matcher::Classifier;
use crate::template::{JobKind, Template};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OptionType {
    Bool,
    String,
    StringList,
    StringMap,
    StringListMap,
}

impl OptionType {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            OptionType::Bool => value.is_boolean(),
            OptionType::String => value.is_string(),
            OptionType::StringList => is_string_list(value),
            OptionType::StringMap => value
                .as_object()
                .is_some_and(|map| map.values().all(Value::is_string)),
            OptionType::StringListMap => value
                .as_object()
                .is_some_and(|map| map.values().all(is_string_list)),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            OptionType::Bool => "a boolean",
            OptionType::String => "a string",
            OptionType::StringList => "an array of strings",
            OptionType::StringMap => "an object of strings",
            OptionType::StringListMap => "an object of string arrays",
        }
    }
}

fn is_string_list(value: &Value) -> bool {
    value.is_string() || value.as_array().is_some_and(|items| items.iter().all(Value::is_string))
}

const COMMON_OPTIONS: &[(&str, OptionType)] = &[("pattern_dialect", OptionType::String)];

/// Keys written by older template editors; accepted without a warning.
const DESCRIPTIVE_KEYS: &[&str] = &["created_date", "author"];

const RESERVED_KEYS: &[&str] = &["name", "description", "version", "metadata", "rules"];

fn recognized_options(kind: JobKind) -> &'static [(&'static str, OptionType)] {
    match kind {
        JobKind::Unpack => &[
            ("fallback_encodings", OptionType::StringList),
            ("replace_existing", OptionType::Bool),
        ],
        JobKind::Prune => &[
            ("match_kind", OptionType::String),
            ("require_match", OptionType::Bool),
        ],
        JobKind::Extract => &[
            ("flatten", OptionType::Bool),
            ("replace_existing", OptionType::Bool),
        ],
        JobKind::Convert => &[
            ("keep_original_files", OptionType::Bool),
            ("supported_extensions", OptionType::StringList),
        ],
        JobKind::Rename => &[
            ("supported_extensions", OptionType::StringList),
            ("tags", OptionType::StringMap),
            ("folders", OptionType::StringListMap),
            ("tag_marker", OptionType::String),
        ],
        JobKind::Merge => &[("output_name", OptionType::String)],
    }
}

/// Outcome of checking a template against the rules for its job kind.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Collapses the report into the error a failed save returns.
    pub fn into_result(self) -> Result<Vec<String>> {
        if self.errors.is_empty() {
            Ok(self.warnings)
        } else {
            Err(DossierError::TemplateValidation {
                message: self.errors.join("; "),
            })
        }
    }
}

pub fn validate(kind: JobKind, template: &Template) -> ValidationReport {
    let mut report = ValidationReport::default();

    if template.name.trim().is_empty() {
        report.errors.push("template name must not be empty".to_string());
    }

    let version_format = Regex::new(r"^\d+\.\d+(\.\d+)?$").ok();
    if version_format.is_some_and(|re| !re.is_match(&template.version)) {
        report.warnings.push(format!(
            "version '{}' is not in MAJOR.MINOR[.PATCH] form",
            template.version
        ));
    }

    let mut seen = std::collections::HashSet::new();
    for category in &template.rules {
        if !seen.insert(category.label.as_str()) {
            report
                .errors
                .push(format!("duplicate category label '{}'", category.label));
        }
        if category.label.trim().is_empty() {
            report.errors.push("category labels must not be empty".to_string());
        }
        if category.patterns.is_empty() {
            report
                .errors
                .push(format!("category '{}' has no patterns", category.label));
        }
        if category.patterns.iter().any(|p| p.is_empty()) {
            report
                .errors
                .push(format!("category '{}' contains an empty pattern", category.label));
        }
    }

    if let Err(e) = Classifier::for_template(template) {
        report.errors.push(error_message(e));
    }

    let recognized = recognized_options(kind);
    for (key, value) in &template.options {
        if RESERVED_KEYS.contains(&key.as_str()) {
            report
                .errors
                .push(format!("option '{}' shadows a reserved template key", key));
            continue;
        }

        let expected = recognized
            .iter()
            .chain(COMMON_OPTIONS)
            .find(|(name, _)| name == key)
            .map(|(_, option_type)| *option_type);

        match expected {
            Some(option_type) if !value.is_null() && !option_type.accepts(value) => {
                report.errors.push(format!(
                    "option '{}' must be {}",
                    key,
                    option_type.describe()
                ));
            }
            Some(_) => {}
            None if DESCRIPTIVE_KEYS.contains(&key.as_str()) => {}
            None => report.warnings.push(format!(
                "option '{}' is not used by {} templates and will be ignored",
                key, kind
            )),
        }
    }

    if let Ok(extensions) = template.string_list_option("supported_extensions", &[]) {
        for extension in extensions.iter().filter(|e| !e.starts_with('.')) {
            report.errors.push(format!(
                "supported extension '{}' must start with '.'",
                extension
            ));
        }
    }

    if kind == JobKind::Prune {
        if let Ok(match_kind) = template.string_option("match_kind", "any") {
            if !matches!(match_kind.as_str(), "any" | "file" | "folder") {
                report.errors.push(format!(
                    "match_kind '{}' must be one of any, file, folder",
                    match_kind
                ));
            }
        }
    }

    if kind == JobKind::Rename {
        if let Ok(tags) = template.string_map_option("tags") {
            for label in tags.keys().filter(|label| template.rules.get(label).is_none()) {
                report
                    .warnings
                    .push(format!("tag for unknown category '{}' is never used", label));
            }
        }
    }

    report
}

fn error_message(error: DossierError) -> String {
    match error {
        DossierError::TemplateValidation { message } => message,
        other => other.to_string(),
    }
}
