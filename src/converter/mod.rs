pub mod image;
pub mod office;

pub use self::image::ImageConverter;
pub use office::OfficeConverter;

use crate::error::{DossierError, Result};
use crate::scanner::dotted_extension;
use std::path::Path;

/// A backend that turns one document into a PDF at `target`.
///
/// Implementations must leave `source` untouched and must not leave a
/// partial file at `target` when they fail.
pub trait DocumentConverter {
    fn name(&self) -> &str;

    /// `extension` is lower-cased and includes the dot.
    fn supports(&self, extension: &str) -> bool;

    fn convert(&self, source: &Path, target: &Path) -> Result<()>;
}

/// Routes each file to the first backend that supports its extension.
#[derive(Default)]
pub struct CompositeConverter {
    converters: Vec<Box<dyn DocumentConverter>>,
}

impl CompositeConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Office documents through an external suite, images natively.
    pub fn standard(office: OfficeConverter) -> Self {
        Self::new()
            .with(Box::new(office))
            .with(Box::new(ImageConverter::new()))
    }

    pub fn with(mut self, converter: Box<dyn DocumentConverter>) -> Self {
        self.converters.push(converter);
        self
    }

    pub fn backend_for(&self, path: &Path) -> Option<&dyn DocumentConverter> {
        let extension = dotted_extension(path)?;
        self.converters
            .iter()
            .find(|c| c.supports(&extension))
            .map(|c| c.as_ref())
    }
}

impl DocumentConverter for CompositeConverter {
    fn name(&self) -> &str {
        "composite"
    }

    fn supports(&self, extension: &str) -> bool {
        self.converters.iter().any(|c| c.supports(extension))
    }

    fn convert(&self, source: &Path, target: &Path) -> Result<()> {
        let backend = self
            .backend_for(source)
            .ok_or_else(|| DossierError::ConversionFailure {
                path: source.display().to_string(),
                message: "no converter handles this file type".to_string(),
            })?;
        log::debug!("Converting {} with {}", source.display(), backend.name());
        backend.convert(source, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_by_extension() {
        let composite = CompositeConverter::standard(OfficeConverter::new("soffice"));

        assert_eq!(
            composite.backend_for(Path::new("a/Report.DOCX")).map(|c| c.name()),
            Some("office")
        );
        assert_eq!(
            composite.backend_for(Path::new("scan.jpeg")).map(|c| c.name()),
            Some("image")
        );
        assert!(composite.backend_for(Path::new("notes.txt")).is_none());
        assert!(composite.supports(".png"));
        assert!(!composite.supports(".pdf"));
    }

    #[test]
    fn test_unsupported_file_fails() {
        let composite = CompositeConverter::new();
        let err = composite
            .convert(Path::new("a.txt"), Path::new("a.pdf"))
            .unwrap_err();
        assert!(matches!(err, DossierError::ConversionFailure { .. }));
    }
}
