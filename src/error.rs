use thiserror::Error;

#[derive(Error, Debug)]
pub enum DossierError {
    #[error("Template not found: {kind}/{name}")]
    TemplateNotFound { kind: String, name: String },

    #[error("Template validation failed: {message}")]
    TemplateValidation { message: String },

    #[error("Failed to extract entry {entry}: {message}")]
    ExtractionEntry { entry: String, message: String },

    #[error("Conversion failed for {path}: {message}")]
    ConversionFailure { path: String, message: String },

    #[error("Rename target already exists: {target}")]
    RenameConflict { source_name: String, target: String },

    #[error("Merge input not found: {path}")]
    MergeInputMissing { path: String },

    #[error("Merge input could not be read: {path}")]
    MergeInputUnreadable { path: String, message: String },

    #[error("Archive error: {message}")]
    Archive {
        message: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Path validation failed: {path}")]
    InvalidPath { path: String },

    #[error("Operation was cancelled by user")]
    Cancelled,
}

pub trait UserFriendlyError {
    fn user_message(&self) -> String;
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for DossierError {
    fn user_message(&self) -> String {
        match self {
            DossierError::TemplateNotFound { kind, name } => {
                format!("No {} template named '{}'", kind, name)
            }
            DossierError::TemplateValidation { message } => {
                format!("Invalid template: {}", message)
            }
            DossierError::ConversionFailure { path, message } => {
                format!("Could not convert {}: {}", path, message)
            }
            DossierError::RenameConflict { source_name, target } => {
                format!("Cannot rename {}: {} already exists", source_name, target)
            }
            DossierError::MergeInputMissing { path } => {
                format!("Merge input does not exist: {}", path)
            }
            DossierError::MergeInputUnreadable { path, message } => {
                format!("Merge input is not a readable PDF: {} ({})", path, message)
            }
            DossierError::Archive { message, .. } => {
                format!("Archive could not be read: {}", message)
            }
            DossierError::Config { message } => {
                format!("Configuration error: {}", message)
            }
            DossierError::InvalidPath { path } => {
                format!("Invalid path: {}", path)
            }
            DossierError::Cancelled => "Operation was cancelled by user".to_string(),
            _ => self.to_string(),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            DossierError::TemplateNotFound { kind, .. } => Some(format!(
                "Run `dossier templates list {}` to see available templates, or `dossier templates init` to install the built-in ones.",
                kind
            )),
            DossierError::TemplateValidation { .. } => Some(
                "Check that category labels are unique, every category has at least one pattern, and option values have the expected types.".to_string()
            ),
            DossierError::ConversionFailure { .. } => Some(
                "Make sure LibreOffice is installed, or point [convert].office_command at the soffice executable.".to_string()
            ),
            DossierError::MergeInputMissing { .. } | DossierError::MergeInputUnreadable { .. } => Some(
                "No output was written. Fix the listed input and run the merge again.".to_string()
            ),
            DossierError::Config { .. } => Some(
                "Check your configuration file syntax, or regenerate one with --generate-config.".to_string()
            ),
            DossierError::InvalidPath { .. } => Some(
                "Verify the directory exists and that you have read/write permissions for it.".to_string()
            ),
            _ => None,
        }
    }
}

impl From<zip::result::ZipError> for DossierError {
    fn from(error: zip::result::ZipError) -> Self {
        DossierError::Archive {
            message: error.to_string(),
            source: error,
        }
    }
}

impl From<toml::de::Error> for DossierError {
    fn from(error: toml::de::Error) -> Self {
        DossierError::Config {
            message: error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DossierError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_friendly_messages() {
        let error = DossierError::TemplateNotFound {
            kind: "prune".to_string(),
            name: "missing".to_string(),
        };
        assert!(error.user_message().contains("missing"));
        assert!(error.suggestion().unwrap().contains("templates list prune"));
    }

    #[test]
    fn test_merge_errors_mention_no_output() {
        let error = DossierError::MergeInputMissing {
            path: "a.pdf".to_string(),
        };
        assert!(error.to_string().contains("a.pdf"));
        assert!(error.suggestion().unwrap().contains("No output"));
    }

    #[test]
    fn test_zip_error_conversion() {
        let error = DossierError::from(zip::result::ZipError::FileNotFound);
        assert!(matches!(error, DossierError::Archive { .. }));
    }

    #[test]
    fn test_toml_error_conversion() {
        let parse_error = toml::from_str::<toml::Value>("= broken").unwrap_err();
        let error = DossierError::from(parse_error);
        assert!(matches!(error, DossierError::Config { .. }));
    }
}
