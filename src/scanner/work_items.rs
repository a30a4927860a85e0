use crate::error::{DossierError, Result};
use crate::scanner::file_filter::ExtensionFilter;
use std::path::{Component, Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    File,
    Directory,
}

/// A filesystem entry discovered during one job pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub path: PathBuf,
    pub relative_path: PathBuf,
    pub name: String,
    pub kind: ItemKind,
}

impl WorkItem {
    fn from_entry(entry: &DirEntry, root: &Path) -> Result<Self> {
        let path = entry.path().to_path_buf();
        let relative_path = relative_to(&path, root)?;
        let name = entry.file_name().to_string_lossy().to_string();
        let kind = if entry.file_type().is_dir() {
            ItemKind::Directory
        } else {
            ItemKind::File
        };

        Ok(Self {
            path,
            relative_path,
            name,
            kind,
        })
    }

    pub fn is_dir(&self) -> bool {
        self.kind == ItemKind::Directory
    }

    /// Relative path with forward slashes on every platform.
    pub fn display_path(&self) -> String {
        self.relative_path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Name of the directory that directly contains this item.
    pub fn parent_name(&self) -> Option<String> {
        self.path
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
    }
}

/// Items found plus the entries that could not be read.
#[derive(Debug, Default)]
pub struct Scan {
    pub items: Vec<WorkItem>,
    pub errors: Vec<String>,
}

/// Enumerates work items below a root directory in file name order.
pub struct WorkScanner {
    root: PathBuf,
    filter: ExtensionFilter,
}

impl WorkScanner {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();

        if !root.exists() {
            return Err(DossierError::InvalidPath {
                path: format!("{} does not exist", root.display()),
            });
        }

        if !root.is_dir() {
            return Err(DossierError::InvalidPath {
                path: format!("{} is not a directory", root.display()),
            });
        }

        Ok(Self {
            root: root.to_path_buf(),
            filter: ExtensionFilter::any(),
        })
    }

    pub fn with_filter(mut self, filter: ExtensionFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Immediate children, files and directories alike.
    pub fn children(&self) -> Scan {
        self.walk(1, |_| true)
    }

    /// Descendant files accepted by the extension filter.
    pub fn files(&self) -> Scan {
        self.walk(MAX_DEPTH, |entry| {
            entry.file_type().is_file() && self.filter.accepts(entry.path())
        })
    }

    /// Descendant directories accepted by `predicate`. The walk does not
    /// descend into an accepted directory.
    pub fn matching_directories<F>(&self, predicate: F) -> Scan
    where
        F: Fn(&WorkItem) -> bool,
    {
        let mut scan = Scan::default();
        let mut walker = self.walker(MAX_DEPTH).into_iter();

        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    scan.errors.push(describe_walk_error(&err));
                    continue;
                }
            };

            if !entry.file_type().is_dir() {
                continue;
            }

            match WorkItem::from_entry(&entry, &self.root) {
                Ok(item) if predicate(&item) => {
                    walker.skip_current_dir();
                    scan.items.push(item);
                }
                Ok(_) => {}
                Err(e) => scan.errors.push(e.to_string()),
            }
        }

        scan
    }

    fn walk<F>(&self, max_depth: usize, keep: F) -> Scan
    where
        F: Fn(&DirEntry) -> bool,
    {
        let mut scan = Scan::default();

        for entry in self.walker(max_depth) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    scan.errors.push(describe_walk_error(&err));
                    continue;
                }
            };

            if !keep(&entry) {
                continue;
            }

            match WorkItem::from_entry(&entry, &self.root) {
                Ok(item) => scan.items.push(item),
                Err(e) => scan.errors.push(e.to_string()),
            }
        }

        scan
    }

    fn walker(&self, max_depth: usize) -> WalkDir {
        WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(max_depth)
            .follow_links(false)
            .sort_by_file_name()
    }
}

fn describe_walk_error(err: &walkdir::Error) -> String {
    if err
        .io_error()
        .is_some_and(|e| e.kind() == std::io::ErrorKind::PermissionDenied)
    {
        format!("Permission denied: {}", err)
    } else {
        format!("Scan error: {}", err)
    }
}

fn relative_to(path: &Path, root: &Path) -> Result<PathBuf> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| DossierError::InvalidPath {
            path: format!(
                "Cannot calculate relative path for {} from root {}",
                path.display(),
                root.display()
            ),
        })?;

    if relative
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(DossierError::InvalidPath {
            path: format!(
                "Path contains parent directory references: {}",
                relative.display()
            ),
        });
    }

    Ok(relative.to_path_buf())
}
