use crate::error::{DossierError, Result};
use crate::jobs::check_shutdown;
use crate::matcher::Classifier;
use crate::report::{JobReport, StatusCallback, StatusLine};
use crate::scanner::{ExtensionFilter, WorkItem, WorkScanner};
use crate::template::{JobKind, Template};
use crate::ui::GracefulShutdown;
use log::{debug, info};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

const DEFAULT_EXTENSIONS: &[&str] = &[".pdf", ".doc", ".docx", ".xlsx", ".png", ".jpg", ".jpeg"];

/// Appends a category tag to matching file names: `report.pdf` becomes
/// `report#检验报告.pdf`. Never overwrites an existing file.
pub struct FileRenamer {
    template_name: String,
    labels: Vec<String>,
    classifier: Classifier,
    filter: ExtensionFilter,
    tags: BTreeMap<String, String>,
    folders: BTreeMap<String, Vec<String>>,
    tag_marker: String,
    dry_run: bool,
    shutdown: Option<GracefulShutdown>,
}

impl FileRenamer {
    pub fn new(template: &Template) -> Result<Self> {
        let tag_marker = template.string_option("tag_marker", "#")?;
        if tag_marker.is_empty() {
            return Err(DossierError::TemplateValidation {
                message: "tag_marker must not be empty".to_string(),
            });
        }

        let extensions = template.string_list_option("supported_extensions", DEFAULT_EXTENSIONS)?;

        Ok(Self {
            template_name: template.name.clone(),
            labels: template.rules.labels().into_iter().map(String::from).collect(),
            classifier: Classifier::for_template(template)?,
            filter: ExtensionFilter::new(&extensions),
            tags: template.string_map_option("tags")?,
            folders: template.string_list_map_option("folders")?,
            tag_marker,
            dry_run: false,
            shutdown: None,
        })
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_shutdown(mut self, shutdown: GracefulShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn tag_for(&self, label: &str) -> String {
        self.tags
            .get(label)
            .cloned()
            .unwrap_or_else(|| format!("{}{}", self.tag_marker, label))
    }

    /// First category, in declared order, whose folder constraint and
    /// patterns both accept the item. A folder entry of `""` or `"."` stands
    /// for the files directly under the scanned root.
    pub fn category_for(&self, item: &WorkItem) -> Option<&str> {
        let parent = item.parent_name().unwrap_or_default();
        let at_root = item
            .relative_path
            .parent()
            .map_or(true, |p| p.as_os_str().is_empty());

        self.labels
            .iter()
            .find(|label| {
                let folder_ok = match self.folders.get(label.as_str()) {
                    Some(fragments) if !fragments.is_empty() => {
                        fragments.iter().any(|f| match f.trim() {
                            "" | "." => at_root,
                            fragment => parent.contains(fragment),
                        })
                    }
                    _ => true,
                };
                folder_ok && self.classifier.matches_category(label, &item.name)
            })
            .map(String::as_str)
    }

    /// `{stem}{tag}{extension}`, keeping the extension's original case.
    pub fn tagged_name(item: &WorkItem, tag: &str) -> String {
        let path = Path::new(&item.name);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| item.name.clone());
        match path.extension() {
            Some(ext) => format!("{}{}.{}", stem, tag, ext.to_string_lossy()),
            None => format!("{}{}", stem, tag),
        }
    }

    pub fn rename(&self, directory: &Path, callback: StatusCallback<'_>) -> Result<JobReport> {
        let scan = WorkScanner::new(directory)?
            .with_filter(self.filter.clone())
            .files();
        let mut report = JobReport::new(JobKind::Rename, self.template_name.clone());
        info!("Tagging file names under {} ({} candidates)", directory.display(), scan.items.len());

        for error in scan.errors {
            report.push(StatusLine::warning(directory.display().to_string(), error), callback);
        }

        for item in scan.items {
            check_shutdown(&self.shutdown)?;

            let name = item.display_path();
            if item.name.contains(&self.tag_marker) {
                report.push(StatusLine::skip(&name, "already tagged"), callback);
                continue;
            }

            let Some(label) = self.category_for(&item) else {
                debug!("{} matches no category", name);
                continue;
            };

            let new_name = Self::tagged_name(&item, &self.tag_for(label));
            let target = item.path.with_file_name(&new_name);

            if target.exists() {
                let conflict = DossierError::RenameConflict {
                    source_name: item.name.clone(),
                    target: new_name,
                };
                report.push(StatusLine::conflict(&name, conflict.to_string()), callback);
                continue;
            }

            if self.dry_run {
                report.push(StatusLine::info(&name, format!("would rename to {}", new_name)), callback);
                continue;
            }

            match fs::rename(&item.path, &target) {
                Ok(()) => report.push(StatusLine::success(&name, format!("renamed to {}", new_name)), callback),
                Err(e) => report.push(StatusLine::error(&name, format!("rename failed: {}", e)), callback),
            }
        }

        Ok(report.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Stage;
    use crate::template::defaults;
    use serde_json::json;
    use tempfile::TempDir;

    fn renamer(template: &Template) -> FileRenamer {
        FileRenamer::new(template).unwrap()
    }

    #[test]
    fn test_tags_matching_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("pkg")).unwrap();
        fs::write(root.join("pkg/产品检验报告.PDF"), "r").unwrap();
        fs::write(root.join("pkg/使用说明书.docx"), "m").unwrap();
        fs::write(root.join("pkg/other.pdf"), "o").unwrap();
        fs::write(root.join("pkg/检验报告.txt"), "t").unwrap();

        let report = renamer(&defaults::builtin(JobKind::Rename)).rename(root, None).unwrap();

        assert!(root.join("pkg/产品检验报告#检验报告.PDF").exists());
        assert!(root.join("pkg/使用说明书#说明书.docx").exists());
        assert!(root.join("pkg/other.pdf").exists());
        assert!(root.join("pkg/检验报告.txt").exists());
        assert_eq!(report.count(Stage::Success), 2);
        assert_eq!(report.lines.len(), 2);
    }

    #[test]
    fn test_second_run_skips_tagged_files() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a 检验报告.pdf"), "r").unwrap();
        let job = renamer(&defaults::builtin(JobKind::Rename));

        job.rename(temp_dir.path(), None).unwrap();
        let second = job.rename(temp_dir.path(), None).unwrap();

        assert_eq!(second.count(Stage::Skip), 1);
        assert_eq!(second.count(Stage::Success), 0);
        assert!(temp_dir.path().join("a 检验报告#检验报告.pdf").exists());
    }

    #[test]
    fn test_conflict_never_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let template = Template::new("plain")
            .with_category("report", &["report"])
            .with_option("tag_marker", "_")
            .with_option("tags", json!({ "report": "_final" }));
        fs::write(temp_dir.path().join("report.pdf"), "new").unwrap();
        fs::write(temp_dir.path().join("report_final.pdf"), "existing").unwrap();

        let report = renamer(&template).rename(temp_dir.path(), None).unwrap();

        assert_eq!(fs::read_to_string(temp_dir.path().join("report.pdf")).unwrap(), "new");
        assert_eq!(
            fs::read_to_string(temp_dir.path().join("report_final.pdf")).unwrap(),
            "existing"
        );
        assert_eq!(report.items_with(Stage::Conflict), vec!["report.pdf"]);
        assert!(report.has_failures());
    }

    #[test]
    fn test_folder_constraint_and_default_tag() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("01 注册检验")).unwrap();
        fs::create_dir_all(root.join("02 其他")).unwrap();
        fs::write(root.join("01 注册检验/报告.pdf"), "a").unwrap();
        fs::write(root.join("02 其他/报告.pdf"), "b").unwrap();

        let template = Template::new("folders")
            .with_category("检验", &["报告"])
            .with_option("folders", json!({ "检验": ["注册检验"] }));
        let report = renamer(&template).rename(root, None).unwrap();

        assert!(root.join("01 注册检验/报告#检验.pdf").exists());
        assert!(root.join("02 其他/报告.pdf").exists());
        assert_eq!(report.count(Stage::Success), 1);
    }

    #[test]
    fn test_root_folder_entry_limits_to_top_level_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("附件")).unwrap();
        fs::write(root.join("报告.pdf"), "a").unwrap();
        fs::write(root.join("附件/报告.pdf"), "b").unwrap();

        for entry in ["", "."] {
            let template = Template::new("root")
                .with_category("检验", &["报告"])
                .with_option("folders", json!({ "检验": [entry] }));
            let job = renamer(&template).with_dry_run(true);
            let report = job.rename(root, None).unwrap();

            assert_eq!(report.lines.len(), 1, "folders entry {:?}", entry);
            assert_eq!(report.lines[0].item, "报告.pdf");
        }
    }

    #[test]
    fn test_dry_run_renames_nothing() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("manual.pdf"), "m").unwrap();

        let report = renamer(&defaults::builtin(JobKind::Rename))
            .with_dry_run(true)
            .rename(temp_dir.path(), None)
            .unwrap();

        assert!(temp_dir.path().join("manual.pdf").exists());
        assert_eq!(report.lines[0].detail, "would rename to manual#说明书.pdf");
    }

    #[test]
    fn test_empty_tag_marker_is_rejected() {
        let template = Template::new("bad").with_option("tag_marker", "");
        assert!(FileRenamer::new(&template).is_err());
    }
}
