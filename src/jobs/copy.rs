use crate::error::{DossierError, Result};
use std::fs;
use std::ffi::OsString;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

const BUFFER_SIZE: usize = 64 * 1024;

/// Totals for one copy operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyStats {
    pub files: usize,
    pub directories: usize,
    pub bytes: u64,
}

/// Buffered file and directory-tree copying that carries modification times over.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeCopier;

impl TreeCopier {
    pub fn new() -> Self {
        Self
    }

    /// Copies `source` and everything below it to `dest`, creating `dest`.
    /// Symlinks are not followed.
    pub fn copy_tree(&self, source: &Path, dest: &Path) -> Result<CopyStats> {
        if !source.is_dir() {
            return Err(DossierError::InvalidPath {
                path: format!("Source is not a directory: {}", source.display()),
            });
        }

        if is_within(dest, source) {
            return Err(DossierError::InvalidPath {
                path: format!(
                    "Destination {} is inside source {}",
                    dest.display(),
                    source.display()
                ),
            });
        }

        let mut stats = CopyStats::default();
        fs::create_dir_all(dest)?;

        for entry in WalkDir::new(source).min_depth(1).follow_links(false) {
            let entry = entry.map_err(|e| {
                DossierError::Io(
                    e.into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("directory walk failed")),
                )
            })?;
            let relative = entry
                .path()
                .strip_prefix(source)
                .map_err(|_| DossierError::InvalidPath {
                    path: entry.path().display().to_string(),
                })?;
            let target = dest.join(relative);

            if entry.file_type().is_dir() {
                fs::create_dir_all(&target)?;
                stats.directories += 1;
            } else if entry.file_type().is_file() {
                stats.bytes += self.copy_file(entry.path(), &target)?;
                stats.files += 1;
            }
        }

        Ok(stats)
    }

    /// Copies one file, overwriting `dest`. Returns the number of bytes written.
    pub fn copy_file(&self, source: &Path, dest: &Path) -> Result<u64> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        let source_file = fs::File::open(source)?;
        let dest_file = fs::File::create(dest)?;

        let mut reader = BufReader::with_capacity(BUFFER_SIZE, source_file);
        let mut writer = BufWriter::with_capacity(BUFFER_SIZE, dest_file);

        let mut total_bytes = 0u64;
        let mut buffer = vec![0u8; 8192];

        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            writer.write_all(&buffer[..bytes_read])?;
            total_bytes += bytes_read as u64;
        }

        writer.flush()?;
        drop(writer);

        if let Ok(modified) = fs::metadata(source).and_then(|m| m.modified()) {
            let _ = filetime::set_file_mtime(dest, filetime::FileTime::from_system_time(modified));
        }

        Ok(total_bytes)
    }

    /// Moves a file, falling back to copy-and-delete across filesystems.
    pub fn move_file(&self, source: &Path, dest: &Path) -> Result<()> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        if fs::rename(source, dest).is_ok() {
            return Ok(());
        }

        self.copy_file(source, dest)?;
        fs::remove_file(source)?;
        Ok(())
    }
}

/// True when `path` is `base` or lies below it once both are resolved, so
/// `./data/out` counts as inside `data`.
pub fn is_within(path: &Path, base: &Path) -> bool {
    resolve_path(path).starts_with(resolve_path(base))
}

/// Absolute form of `path`. The longest existing prefix is canonicalized and
/// the rest is appended with `.` and `..` folded away.
pub fn resolve_path(path: &Path) -> PathBuf {
    let lexical = lexical_absolute(path);
    let mut existing = lexical.as_path();
    let mut rest: Vec<OsString> = Vec::new();

    loop {
        if let Ok(canonical) = fs::canonicalize(existing) {
            return rest.iter().rev().fold(canonical, |acc, part| acc.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name.to_os_string());
                existing = parent;
            }
            _ => return lexical,
        }
    }
}

fn lexical_absolute(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
