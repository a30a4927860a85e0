use std::path::Path;

/// Accepts files whose extension is in a fixed set, compared case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct ExtensionFilter {
    extensions: Vec<String>,
}

impl ExtensionFilter {
    /// Extensions may be given with or without the leading dot.
    pub fn new<S: AsRef<str>>(extensions: &[S]) -> Self {
        let extensions = extensions
            .iter()
            .map(|e| normalize_extension(e.as_ref()))
            .filter(|e| e.len() > 1)
            .collect();
        Self { extensions }
    }

    /// A filter that accepts every file.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn accepts(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        dotted_extension(path).is_some_and(|ext| self.extensions.contains(&ext))
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }
}

/// Lower-cased extension including the dot, e.g. `.docx`.
pub fn dotted_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
}

fn normalize_extension(extension: &str) -> String {
    let trimmed = extension.trim().to_lowercase();
    if trimmed.starts_with('.') {
        trimmed
    } else {
        format!(".{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_matching_is_case_insensitive() {
        let filter = ExtensionFilter::new(&[".doc", "DOCX"]);
        assert!(filter.accepts(Path::new("a/report.DOC")));
        assert!(filter.accepts(Path::new("b.docx")));
        assert!(!filter.accepts(Path::new("c.pdf")));
        assert!(!filter.accepts(Path::new("README")));
        assert_eq!(filter.extensions(), &[".doc".to_string(), ".docx".to_string()]);
    }

    #[test]
    fn test_empty_filter_accepts_all() {
        assert!(ExtensionFilter::any().accepts(Path::new("anything.bin")));
        assert!(ExtensionFilter::new::<&str>(&[]).accepts(Path::new("noext")));
    }

    #[test]
    fn test_dotted_extension() {
        assert_eq!(dotted_extension(Path::new("x.PDF")), Some(".pdf".to_string()));
        assert_eq!(dotted_extension(Path::new("x")), None);
    }
}
