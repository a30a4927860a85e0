use crate::error::{DossierError, Result};
use crate::jobs::check_shutdown;
use crate::matcher::Classifier;
use crate::report::{JobReport, StatusCallback, StatusLine};
use crate::scanner::{ExtensionFilter, WorkScanner};
use crate::template::{JobKind, Template};
use crate::ui::GracefulShutdown;
use log::{debug, info};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use std::path::{Path, PathBuf};

/// Page attributes a page may inherit from its `Pages` ancestors.
const INHERITABLE: &[&[u8]] = &[b"MediaBox", b"CropBox", b"Resources", b"Rotate"];
const MAX_TREE_DEPTH: usize = 32;

/// Concatenates PDFs into one file. Either every input is merged or no
/// output is written.
pub struct PdfMerger {
    template_name: String,
    classifier: Classifier,
    output_name: String,
    shutdown: Option<GracefulShutdown>,
}

impl PdfMerger {
    pub fn new(template: &Template) -> Result<Self> {
        Ok(Self {
            template_name: template.name.clone(),
            classifier: Classifier::for_template(template)?,
            output_name: template.string_option("output_name", "merged.pdf")?,
            shutdown: None,
        })
    }

    pub fn with_shutdown(mut self, shutdown: GracefulShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    /// PDFs directly inside `directory`, ordered by category then file name.
    /// With categories, unmatched files are left out. The output file itself
    /// is never an input.
    pub fn collect_inputs(&self, directory: &Path) -> Result<Vec<PathBuf>> {
        let scan = WorkScanner::new(directory)?.children();
        let pdf = ExtensionFilter::new(&[".pdf"]);

        let mut ranked: Vec<(usize, PathBuf)> = scan
            .items
            .into_iter()
            .filter(|item| !item.is_dir() && pdf.accepts(&item.path) && item.name != self.output_name)
            .filter_map(|item| {
                if self.classifier.is_empty() {
                    return Some((0, item.path));
                }
                let label = self.classifier.classify(&item.name)?;
                let rank = self.classifier.position(label)?;
                Some((rank, item.path))
            })
            .collect();

        // Scan order is already by file name; a stable sort keeps it within a category.
        ranked.sort_by_key(|(rank, _)| *rank);
        Ok(ranked.into_iter().map(|(_, path)| path).collect())
    }

    /// Page count per input, for listings.
    pub fn page_counts(&self, inputs: &[PathBuf]) -> Vec<(PathBuf, Result<usize>)> {
        inputs
            .iter()
            .map(|path| (path.clone(), load_input(path).map(|doc| doc.get_pages().len())))
            .collect()
    }

    pub fn merge(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        callback: StatusCallback<'_>,
    ) -> Result<JobReport> {
        if inputs.is_empty() {
            return Err(DossierError::InvalidPath {
                path: "no PDF files to merge".to_string(),
            });
        }

        let mut report = JobReport::new(JobKind::Merge, self.template_name.clone());
        let mut documents = Vec::with_capacity(inputs.len());

        for path in inputs {
            check_shutdown(&self.shutdown)?;
            let document = load_input(path)?;
            let pages = document.get_pages().len();
            report.push(
                StatusLine::info(display_name(path), format!("{} page(s)", pages)),
                callback,
            );
            documents.push(document);
        }

        check_shutdown(&self.shutdown)?;
        let mut merged = concatenate(documents)?;
        let total = merged.get_pages().len();
        info!("Writing {} pages from {} file(s) to {}", total, inputs.len(), output.display());

        let output_dir = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => std::env::current_dir()?,
        };
        std::fs::create_dir_all(&output_dir)?;

        let mut staged = tempfile::NamedTempFile::new_in(&output_dir)?;
        merged.save_to(staged.as_file_mut())?;
        staged.persist(output).map_err(|e| DossierError::Io(e.error))?;

        report.push(
            StatusLine::success(
                display_name(output),
                format!("merged {} file(s), {} page(s)", inputs.len(), total),
            ),
            callback,
        );

        Ok(report.finish())
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn load_input(path: &Path) -> Result<Document> {
    if !path.is_file() {
        return Err(DossierError::MergeInputMissing {
            path: path.display().to_string(),
        });
    }

    let document = Document::load(path).map_err(|e| DossierError::MergeInputUnreadable {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    if document.get_pages().is_empty() {
        return Err(DossierError::MergeInputUnreadable {
            path: path.display().to_string(),
            message: "document has no pages".to_string(),
        });
    }

    Ok(document)
}

/// Builds one document holding every page of `documents`, in order.
fn concatenate(documents: Vec<Document>) -> Result<Document> {
    let mut next_id = 1;
    let mut pages: Vec<(ObjectId, Dictionary)> = Vec::new();
    let mut merged = Document::with_version("1.5");

    for mut document in documents {
        document.renumber_objects_with(next_id);
        next_id = document.max_id + 1;

        for page_id in document.get_pages().into_values() {
            pages.push((page_id, page_with_inherited(&document, page_id)?));
        }

        for (id, object) in document.objects {
            let skip = matches!(
                object.type_name(),
                Ok(b"Catalog") | Ok(b"Pages") | Ok(b"Page") | Ok(b"Outlines") | Ok(b"Outline")
            );
            if !skip {
                merged.objects.insert(id, object);
            }
        }
    }

    merged.max_id = next_id;
    let pages_id = merged.new_object_id();
    let kids: Vec<Object> = pages.iter().map(|(id, _)| Object::Reference(*id)).collect();
    let count = pages.len() as i64;

    for (id, mut page) in pages {
        page.set("Parent", pages_id);
        merged.objects.insert(id, Object::Dictionary(page));
    }

    merged.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = merged.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    merged.trailer.set("Root", catalog_id);

    let pruned = merged.prune_objects();
    debug!("Dropped {} unreferenced objects", pruned.len());
    merged.renumber_objects();

    Ok(merged)
}

/// The page dictionary with inheritable attributes copied down from its
/// ancestors, since the original page tree is discarded.
fn page_with_inherited(document: &Document, page_id: ObjectId) -> Result<Dictionary> {
    let mut page = document.get_dictionary(page_id)?.clone();
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;

    while let Some(parent_id) = parent {
        if depth >= MAX_TREE_DEPTH {
            break;
        }
        let Ok(node) = document.get_dictionary(parent_id) else {
            break;
        };
        for key in INHERITABLE {
            if !page.has(key) {
                if let Ok(value) = node.get(key) {
                    page.set(key.to_vec(), value.clone());
                }
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
    }

    Ok(page)
}
