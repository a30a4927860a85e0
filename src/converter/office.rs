use crate::converter::DocumentConverter;
use crate::error::{DossierError, Result};
use crate::jobs::copy::TreeCopier;
use log::debug;
use std::path::Path;
use std::process::Command;

const OFFICE_EXTENSIONS: &[&str] = &[
    ".doc", ".docx", ".odt", ".rtf", ".xls", ".xlsx", ".ods", ".ppt", ".pptx", ".odp",
];

/// Converts office documents by running an office suite headless.
///
/// The suite writes into a scratch directory next to the target and the
/// result is moved into place, so a failed run leaves nothing behind.
#[derive(Debug, Clone)]
pub struct OfficeConverter {
    command: String,
    extra_args: Vec<String>,
}

impl OfficeConverter {
    pub fn new<S: Into<String>>(command: S) -> Self {
        Self {
            command: command.into(),
            extra_args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    fn failure(source: &Path, message: String) -> DossierError {
        DossierError::ConversionFailure {
            path: source.display().to_string(),
            message,
        }
    }
}

impl DocumentConverter for OfficeConverter {
    fn name(&self) -> &str {
        "office"
    }

    fn supports(&self, extension: &str) -> bool {
        OFFICE_EXTENSIONS.contains(&extension)
    }

    fn convert(&self, source: &Path, target: &Path) -> Result<()> {
        let target_dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => std::env::current_dir()?,
        };
        std::fs::create_dir_all(&target_dir)?;

        let scratch = tempfile::Builder::new()
            .prefix(".dossier-convert")
            .tempdir_in(&target_dir)?;

        debug!("Running {} on {}", self.command, source.display());
        let output = Command::new(&self.command)
            .args(&self.extra_args)
            .arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(scratch.path())
            .arg(source)
            .output()
            .map_err(|e| Self::failure(source, format!("could not run '{}': {}", self.command, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Self::failure(
                source,
                format!("'{}' exited with {}: {}", self.command, output.status, stderr.trim()),
            ));
        }

        let stem = source
            .file_stem()
            .ok_or_else(|| Self::failure(source, "file has no name".to_string()))?;
        let mut produced_name = stem.to_os_string();
        produced_name.push(".pdf");
        let produced = scratch.path().join(produced_name);

        if !produced.is_file() {
            return Err(Self::failure(
                source,
                format!("'{}' reported success but produced no PDF", self.command),
            ));
        }

        TreeCopier::new().move_file(&produced, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_command_is_conversion_failure() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("a.docx");
        fs::write(&source, "doc").unwrap();
        let target = temp_dir.path().join("a.pdf");

        let converter = OfficeConverter::new("dossier-no-such-office-suite");
        let err = converter.convert(&source, &target).unwrap_err();

        assert!(matches!(err, DossierError::ConversionFailure { .. }));
        assert!(!target.exists());
        assert_eq!(fs::read_to_string(&source).unwrap(), "doc");
    }

    #[cfg(unix)]
    #[test]
    fn test_success_without_output_is_failure() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("a.doc");
        fs::write(&source, "doc").unwrap();
        let target = temp_dir.path().join("out/a.pdf");

        let err = OfficeConverter::new("true")
            .convert(&source, &target)
            .unwrap_err();

        assert!(err.to_string().contains("produced no PDF"));
        assert!(!target.exists());
        // The scratch directory is cleaned up.
        assert_eq!(fs::read_dir(temp_dir.path().join("out")).unwrap().count(), 0);
    }

    #[test]
    fn test_supported_extensions() {
        let converter = OfficeConverter::new("soffice").with_args(vec!["--norestore".into()]);
        assert!(converter.supports(".docx"));
        assert!(converter.supports(".xlsx"));
        assert!(!converter.supports(".png"));
        assert_eq!(converter.command(), "soffice");
    }
}
