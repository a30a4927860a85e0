use crate::template::{JobKind, Template};
use serde_json::json;

/// Package folder naming used by the submission packages this tool was built around.
const PACKAGE_PATTERNS: &[&str] = &["*材料包", "*_*_*", "*0010600*"];

/// The template a job runs with when no named template is selected.
pub fn builtin(kind: JobKind) -> Template {
    let base = Template::new("default")
        .with_version("1.0.0")
        .with_metadata("builtin", true);

    match kind {
        JobKind::Unpack => base
            .with_description("Unpack every archive, repairing GBK-encoded entry names")
            .with_option("fallback_encodings", json!(["gbk"]))
            .with_option("replace_existing", true),
        JobKind::Prune => base
            .with_description("Keep submission package folders, delete everything else")
            .with_category("package", PACKAGE_PATTERNS)
            .with_option("match_kind", "folder")
            .with_option("require_match", true),
        JobKind::Extract => base
            .with_description("Copy submission package folders into the output area")
            .with_category("package", PACKAGE_PATTERNS)
            .with_option("flatten", false)
            .with_option("replace_existing", true),
        JobKind::Convert => base
            .with_description("Convert every Word document to PDF, keeping the originals")
            .with_option("keep_original_files", true)
            .with_option("supported_extensions", json!([".doc", ".docx"])),
        JobKind::Rename => base
            .with_description("Tag reports and certificates by file name")
            .with_category("检验报告", &["检验报告", "test report"])
            .with_category("说明书", &["说明书", "manual"])
            .with_option("tags", json!({ "检验报告": "#检验报告", "说明书": "#说明书" }))
            .with_option(
                "supported_extensions",
                json!([".pdf", ".doc", ".docx", ".xlsx", ".png", ".jpg", ".jpeg"]),
            ),
        JobKind::Merge => base
            .with_description("Merge PDFs in file name order")
            .with_option("output_name", "merged.pdf"),
    }
}
