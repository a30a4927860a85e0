use crate::error::{DossierError, Result};
use crate::template::validator::{self, ValidationReport};
use crate::template::{JobKind, Template, TemplateSummary};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};

const TEMPLATE_EXTENSION: &str = "json";

/// File-backed template storage, one directory per job kind.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    root: PathBuf,
}

impl TemplateStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn kind_directory(&self, kind: JobKind) -> PathBuf {
        self.root.join(kind.as_str())
    }

    /// Loads a template by file stem, falling back to the `name` field of
    /// every template in the kind's directory.
    pub fn load(&self, kind: JobKind, name: &str) -> Result<Template> {
        let direct = self.template_path(kind, name);
        if direct.is_file() {
            return Self::load_file(&direct);
        }

        for path in self.template_files(kind)? {
            match Self::load_file(&path) {
                Ok(template) if template.name == name => return Ok(template),
                Ok(_) => {}
                Err(e) => debug!("Skipping unreadable template {}: {}", path.display(), e),
            }
        }

        Err(DossierError::TemplateNotFound {
            kind: kind.to_string(),
            name: name.to_string(),
        })
    }

    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Template> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| DossierError::TemplateValidation {
            message: format!("{}: {}", path.display(), e),
        })
    }

    /// Validates and writes a template, returning any non-fatal warnings.
    pub fn save(&self, kind: JobKind, template: &Template) -> Result<Vec<String>> {
        let warnings = validator::validate(kind, template).into_result()?;

        let directory = self.kind_directory(kind);
        fs::create_dir_all(&directory)?;

        let path = self.template_path(kind, &template.name);
        let content = serde_json::to_string_pretty(template)?;
        fs::write(&path, content)?;

        debug!("Saved {} template to {}", kind, path.display());
        Ok(warnings)
    }

    pub fn validate(&self, kind: JobKind, template: &Template) -> ValidationReport {
        validator::validate(kind, template)
    }

    pub fn list_available(&self, kind: JobKind) -> Result<Vec<TemplateSummary>> {
        let mut summaries = Vec::new();

        for (path, loaded) in self.load_all(kind)? {
            match loaded {
                Ok(template) => summaries.push(template.summary(path)),
                Err(e) => warn!("Ignoring template {}: {}", path.display(), e),
            }
        }

        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(summaries)
    }

    /// Every template file of a kind with its parse outcome, in file name order.
    pub fn load_all(&self, kind: JobKind) -> Result<Vec<(PathBuf, Result<Template>)>> {
        Ok(self
            .template_files(kind)?
            .into_iter()
            .map(|path| {
                let loaded = Self::load_file(&path);
                (path, loaded)
            })
            .collect())
    }

    fn template_files(&self, kind: JobKind) -> Result<Vec<PathBuf>> {
        let directory = self.kind_directory(kind);
        if !directory.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(&directory)? {
            let path = entry?.path();
            let is_template = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(TEMPLATE_EXTENSION));
            if path.is_file() && is_template {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn template_path(&self, kind: JobKind, name: &str) -> PathBuf {
        self.kind_directory(kind)
            .join(format!("{}.{}", sanitize_file_stem(name), TEMPLATE_EXTENSION))
    }
}

fn sanitize_file_stem(name: &str) -> String {
    let stem: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if stem.is_empty() || stem.chars().all(|c| c == '.') {
        "template".to_string()
    } else {
        stem
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample_template() -> Template {
        Template::new("通用模板")
            .with_description("Keeps the submission folders")
            .with_version("1.2.0")
            .with_metadata("owner", "regulatory")
            .with_category("材料包", &["*材料包"])
            .with_category("编号", &["*0010600*", "re:^\\d{7}"])
            .with_option("require_match", true)
            .with_option("author", "qa")
    }

    #[test]
    fn test_save_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = TemplateStore::new(temp_dir.path());
        let template = sample_template();

        store.save(JobKind::Prune, &template).unwrap();
        let loaded = store.load(JobKind::Prune, "通用模板").unwrap();

        assert_eq!(loaded, template);
        assert_eq!(loaded.rules.labels(), vec!["材料包", "编号"]);
    }

    #[test]
    fn test_round_trip_through_file_name_fallback() {
        let temp_dir = TempDir::new().unwrap();
        let store = TemplateStore::new(temp_dir.path());
        let template = Template::new("a/b").with_category("x", &["y"]);

        store.save(JobKind::Rename, &template).unwrap();
        assert!(store.kind_directory(JobKind::Rename).join("a_b.json").exists());
        assert_eq!(store.load(JobKind::Rename, "a/b").unwrap(), template);
    }

    #[test]
    fn test_load_by_name_field() {
        let temp_dir = TempDir::new().unwrap();
        let store = TemplateStore::new(temp_dir.path());
        let dir = store.kind_directory(JobKind::Convert);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("word.json"),
            json!({ "name": "Word documents", "rules": { "all": ["."] } }).to_string(),
        )
        .unwrap();

        let loaded = store.load(JobKind::Convert, "Word documents").unwrap();
        assert_eq!(loaded.rules.len(), 1);
    }

    #[test]
    fn test_missing_template() {
        let temp_dir = TempDir::new().unwrap();
        let store = TemplateStore::new(temp_dir.path());
        let err = store.load(JobKind::Merge, "nope").unwrap_err();
        assert!(matches!(err, DossierError::TemplateNotFound { .. }));
    }

    #[test]
    fn test_save_rejects_invalid_template() {
        let temp_dir = TempDir::new().unwrap();
        let store = TemplateStore::new(temp_dir.path());
        let mut template = Template::new("broken");
        template.rules.push("empty", vec![]);

        let err = store.save(JobKind::Prune, &template).unwrap_err();
        assert!(matches!(err, DossierError::TemplateValidation { .. }));
        assert!(!store.kind_directory(JobKind::Prune).join("broken.json").exists());
    }

    #[test]
    fn test_save_returns_warnings_for_unknown_options() {
        let temp_dir = TempDir::new().unwrap();
        let store = TemplateStore::new(temp_dir.path());
        let template = Template::new("t").with_option("future_flag", true);

        let warnings = store.save(JobKind::Extract, &template).unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(store.load(JobKind::Extract, "t").unwrap(), template);
    }

    #[test]
    fn test_list_available_skips_broken_files() {
        let temp_dir = TempDir::new().unwrap();
        let store = TemplateStore::new(temp_dir.path());
        store
            .save(JobKind::Rename, &Template::new("beta").with_category("a", &["a"]))
            .unwrap();
        store
            .save(JobKind::Rename, &Template::new("alpha").with_category("b", &["b"]))
            .unwrap();
        fs::write(store.kind_directory(JobKind::Rename).join("junk.json"), "{not json").unwrap();
        fs::write(store.kind_directory(JobKind::Rename).join("notes.txt"), "x").unwrap();

        let summaries = store.list_available(JobKind::Rename).unwrap();
        let names: Vec<_> = summaries.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
        assert_eq!(summaries[0].categories, 1);

        assert!(store.list_available(JobKind::Unpack).unwrap().is_empty());
    }

    #[test]
    fn test_load_all_reports_broken_files() {
        let temp_dir = TempDir::new().unwrap();
        let store = TemplateStore::new(temp_dir.path());
        store
            .save(JobKind::Prune, &Template::new("ok").with_category("a", &["a"]))
            .unwrap();
        fs::write(store.kind_directory(JobKind::Prune).join("broken.json"), "[1, 2").unwrap();

        let loaded = store.load_all(JobKind::Prune).unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded[0].0.ends_with("broken.json"));
        assert!(loaded[0].1.is_err());
        assert_eq!(loaded[1].1.as_ref().unwrap().name, "ok");
    }
}
