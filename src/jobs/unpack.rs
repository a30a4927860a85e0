use crate::error::{DossierError, Result};
use crate::jobs::check_shutdown;
use crate::matcher::Classifier;
use crate::report::{JobReport, StatusCallback, StatusLine};
use crate::scanner::{ExtensionFilter, WorkScanner};
use crate::template::{JobKind, Template};
use crate::ui::GracefulShutdown;
use encoding_rs::Encoding;
use log::{debug, info};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Resolves encoding labels such as `gbk` or `shift_jis`, keeping their order.
pub fn resolve_encodings<S: AsRef<str>>(labels: &[S]) -> Result<Vec<&'static Encoding>> {
    labels
        .iter()
        .map(|label| {
            let label = label.as_ref();
            Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| {
                DossierError::TemplateValidation {
                    message: format!("unknown fallback encoding '{}'", label),
                }
            })
        })
        .collect()
}

/// Upper half of code page 437; the lower half is ASCII.
const CP437_HIGH: [char; 128] = [
    'Ç', 'ü', 'é', 'â', 'ä', 'à', 'å', 'ç', 'ê', 'ë', 'è', 'ï', 'î', 'ì', 'Ä', 'Å',
    'É', 'æ', 'Æ', 'ô', 'ö', 'ò', 'û', 'ù', 'ÿ', 'Ö', 'Ü', '¢', '£', '¥', '₧', 'ƒ',
    'á', 'í', 'ó', 'ú', 'ñ', 'Ñ', 'ª', 'º', '¿', '⌐', '¬', '½', '¼', '¡', '«', '»',
    '░', '▒', '▓', '│', '┤', '╡', '╢', '╖', '╕', '╣', '║', '╗', '╝', '╜', '╛', '┐',
    '└', '┴', '┬', '├', '─', '┼', '╞', '╟', '╚', '╔', '╩', '╦', '╠', '═', '╬', '╧',
    '╨', '╤', '╥', '╙', '╘', '╒', '╓', '╫', '╪', '┘', '┌', '█', '▄', '▌', '▐', '▀',
    'α', 'ß', 'Γ', 'π', 'Σ', 'σ', 'µ', 'τ', 'Φ', 'Θ', 'Ω', 'δ', '∞', 'φ', 'ε', '∩',
    '≡', '±', '≥', '≤', '⌠', '⌡', '÷', '≈', '°', '∙', '·', '√', 'ⁿ', '²', '■', '\u{a0}',
];

/// Decodes raw entry-name bytes the way the zip reader does without the
/// UTF-8 flag.
pub fn decode_cp437(raw: &[u8]) -> String {
    raw.iter()
        .map(|&byte| {
            if byte < 0x80 {
                char::from(byte)
            } else {
                CP437_HIGH[usize::from(byte - 0x80)]
            }
        })
        .collect()
}

/// Picks the human-readable name for a zip entry.
///
/// Valid UTF-8 wins. A declared name that differs from the CP437 reading of
/// the raw bytes came from a Unicode Path extra field and is used as is.
/// Otherwise each fallback encoding is tried in order and the first lossless
/// decode is used, and failing that the CP437 name stands. The second element
/// names the fallback that was used.
pub fn decode_entry_name(
    raw: &[u8],
    declared: &str,
    fallbacks: &[&'static Encoding],
) -> (String, Option<&'static str>) {
    if let Ok(name) = std::str::from_utf8(raw) {
        return (name.to_string(), None);
    }

    if declared != decode_cp437(raw) {
        return (declared.to_string(), None);
    }

    for encoding in fallbacks {
        if let Some(decoded) = encoding.decode_without_bom_handling_and_without_replacement(raw) {
            return (decoded.into_owned(), Some(encoding.name()));
        }
    }

    (declared.to_string(), None)
}

/// Turns an entry name into a relative path, or `None` if it would escape
/// the destination.
pub fn sanitize_entry_path(name: &str) -> Option<PathBuf> {
    let normalized = name.replace('\\', "/");
    let mut path = PathBuf::new();

    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if path.as_os_str().is_empty() {
        None
    } else {
        Some(path)
    }
}

/// Extracts zip archives, repairing legacy-encoded entry names.
pub struct ArchiveUnpacker {
    template_name: String,
    classifier: Classifier,
    fallbacks: Vec<&'static Encoding>,
    replace_existing: bool,
    dry_run: bool,
    shutdown: Option<GracefulShutdown>,
}

impl ArchiveUnpacker {
    pub fn new(template: &Template) -> Result<Self> {
        let labels = template.string_list_option("fallback_encodings", &["gbk"])?;

        Ok(Self {
            template_name: template.name.clone(),
            classifier: Classifier::for_template(template)?,
            fallbacks: resolve_encodings(&labels)?,
            replace_existing: template.bool_option("replace_existing", true)?,
            dry_run: false,
            shutdown: None,
        })
    }

    /// Replaces the fallback list, e.g. with the configured default.
    pub fn with_fallback_encodings<S: AsRef<str>>(mut self, labels: &[S]) -> Result<Self> {
        self.fallbacks = resolve_encodings(labels)?;
        Ok(self)
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_shutdown(mut self, shutdown: GracefulShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn fallback_names(&self) -> Vec<&'static str> {
        self.fallbacks.iter().map(|e| e.name()).collect()
    }

    /// Extracts every entry of `archive` below `destination`.
    ///
    /// Failing to open the archive is fatal; a bad entry only produces an
    /// error line.
    pub fn unpack(
        &self,
        archive: &Path,
        destination: &Path,
        callback: StatusCallback<'_>,
    ) -> Result<JobReport> {
        let mut report = JobReport::new(JobKind::Unpack, self.template_name.clone());
        self.unpack_into(archive, destination, &mut report, callback)?;
        Ok(report.finish())
    }

    /// Unpacks every `*.zip` under `directory` into a sibling folder named
    /// after the archive.
    pub fn unpack_all(&self, directory: &Path, callback: StatusCallback<'_>) -> Result<JobReport> {
        debug!("Scanning {} for archives", directory.display());
        let scanner = WorkScanner::new(directory)?.with_filter(ExtensionFilter::new(&[".zip"]));
        let scan = scanner.files();

        let mut report = JobReport::new(JobKind::Unpack, self.template_name.clone());
        for error in scan.errors {
            report.push(StatusLine::warning(directory.display().to_string(), error), callback);
        }

        if scan.items.is_empty() {
            report.push(
                StatusLine::info(directory.display().to_string(), "no archives found"),
                callback,
            );
        }

        for item in scan.items {
            check_shutdown(&self.shutdown)?;

            if !self.classifier.is_empty() && self.classifier.classify(&item.name).is_none() {
                report.push(
                    StatusLine::skip(item.display_path(), "archive matches no category"),
                    callback,
                );
                continue;
            }

            let stem = item
                .path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| item.name.clone());
            let destination = item
                .path
                .parent()
                .unwrap_or(directory)
                .join(stem);

            if self.replace_existing && destination.exists() && !self.dry_run {
                if let Err(e) = fs::remove_dir_all(&destination) {
                    report.push(
                        StatusLine::error(
                            item.display_path(),
                            format!("could not clear {}: {}", destination.display(), e),
                        ),
                        callback,
                    );
                    continue;
                }
            }

            report.push(
                StatusLine::info(
                    item.display_path(),
                    format!("extracting into {}", destination.display()),
                ),
                callback,
            );

            if let Err(e) = self.unpack_into(&item.path, &destination, &mut report, callback) {
                report.push(StatusLine::error(item.display_path(), e.to_string()), callback);
            }
        }

        Ok(report.finish())
    }

    fn unpack_into(
        &self,
        archive_path: &Path,
        destination: &Path,
        report: &mut JobReport,
        callback: StatusCallback<'_>,
    ) -> Result<()> {
        let file = fs::File::open(archive_path)?;
        let mut archive = zip::ZipArchive::new(io::BufReader::new(file))?;
        info!(
            "Unpacking {} ({} entries) into {}",
            archive_path.display(),
            archive.len(),
            destination.display()
        );

        if !self.dry_run {
            fs::create_dir_all(destination)?;
        }

        for index in 0..archive.len() {
            check_shutdown(&self.shutdown)?;

            let mut entry = match archive.by_index(index) {
                Ok(entry) => entry,
                Err(e) => {
                    report.push(
                        StatusLine::error(format!("entry #{}", index), e.to_string()),
                        callback,
                    );
                    continue;
                }
            };

            let (name, repaired_with) =
                decode_entry_name(entry.name_raw(), entry.name(), &self.fallbacks);

            let Some(relative) = sanitize_entry_path(&name) else {
                report.push(
                    StatusLine::error(&name, "entry path escapes the destination; not extracted"),
                    callback,
                );
                continue;
            };

            let target = destination.join(&relative);

            if self.dry_run {
                report.push(StatusLine::info(&name, "would extract"), callback);
                continue;
            }

            if entry.is_dir() {
                if let Err(e) = fs::create_dir_all(&target) {
                    report.push(StatusLine::error(&name, e.to_string()), callback);
                }
                continue;
            }

            let written = write_entry(&mut entry, &target).map_err(|e| DossierError::ExtractionEntry {
                entry: name.clone(),
                message: e.to_string(),
            });

            if let Some(encoding) = repaired_with {
                debug!("Decoded entry name {:?} as {}", entry.name(), encoding);
                report.push(
                    StatusLine::info(&name, format!("name decoded as {}", encoding)),
                    callback,
                );
            }

            match written {
                Ok(bytes) => report.push(
                    StatusLine::success(&name, format!("extracted {} bytes", bytes)),
                    callback,
                ),
                Err(e) => report.push(StatusLine::error(&name, e.to_string()), callback),
            }
        }

        Ok(())
    }
}

fn write_entry<R: io::Read>(entry: &mut R, target: &Path) -> io::Result<u64> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(target)?;
    io::copy(entry, &mut file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Stage;
    use crate::template::defaults;
    use std::io::{Cursor, Write};
    use tempfile::TempDir;

    fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for (name, data) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, options).unwrap();
            } else {
                writer.start_file(*name, options).unwrap();
                writer.write_all(data).unwrap();
            }
        }
        writer.finish().unwrap().into_inner()
    }

    fn replace_bytes(buffer: &mut [u8], from: &[u8], to: &[u8]) -> usize {
        assert_eq!(from.len(), to.len());
        let mut replaced = 0;
        let mut i = 0;
        while i + from.len() <= buffer.len() {
            if &buffer[i..i + from.len()] == from {
                buffer[i..i + from.len()].copy_from_slice(to);
                replaced += 1;
                i += from.len();
            } else {
                i += 1;
            }
        }
        replaced
    }

    fn unpacker() -> ArchiveUnpacker {
        ArchiveUnpacker::new(&defaults::builtin(JobKind::Unpack)).unwrap()
    }

    #[test]
    fn test_gbk_entry_name_is_repaired() {
        let (gbk, _, _) = encoding_rs::GBK.encode("资料");
        assert_eq!(gbk.len(), 4);

        let mut bytes = zip_bytes(&[("QZXW.txt", b"content")]);
        assert!(replace_bytes(&mut bytes, b"QZXW", &gbk) >= 2);

        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("package.zip");
        fs::write(&archive, bytes).unwrap();
        let dest = temp_dir.path().join("out");

        let report = unpacker().unpack(&archive, &dest, None).unwrap();

        assert_eq!(fs::read_to_string(dest.join("资料.txt")).unwrap(), "content");
        assert_eq!(report.count(Stage::Success), 1);
        assert_eq!(report.lines[0].stage, Stage::Info);
        assert!(report.lines[0].detail.contains("GBK"));
    }

    #[test]
    fn test_utf8_names_and_directories() {
        let bytes = zip_bytes(&[
            ("docs/", b""),
            ("docs/说明书.txt", b"manual"),
            ("top.txt", b"top"),
        ]);
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("a.zip");
        fs::write(&archive, bytes).unwrap();
        let dest = temp_dir.path().join("out");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("top.txt"), "stale").unwrap();

        let report = unpacker().unpack(&archive, &dest, None).unwrap();

        assert_eq!(fs::read_to_string(dest.join("docs/说明书.txt")).unwrap(), "manual");
        assert_eq!(fs::read_to_string(dest.join("top.txt")).unwrap(), "top");
        assert_eq!(report.count(Stage::Success), 2);
        assert!(!report.has_failures());
    }

    #[test]
    fn test_unsafe_entry_is_reported_not_written() {
        let bytes = zip_bytes(&[("../evil.txt", b"x"), ("ok.txt", b"ok")]);
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("a.zip");
        fs::write(&archive, bytes).unwrap();
        let dest = temp_dir.path().join("out");

        let report = unpacker().unpack(&archive, &dest, None).unwrap();

        assert!(!temp_dir.path().join("evil.txt").exists());
        assert!(dest.join("ok.txt").exists());
        assert_eq!(report.count(Stage::Error), 1);
        assert_eq!(report.count(Stage::Success), 1);
    }

    #[test]
    fn test_corrupt_archive_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("broken.zip");
        fs::write(&archive, b"not a zip").unwrap();
        let err = unpacker()
            .unpack(&archive, &temp_dir.path().join("out"), None)
            .unwrap_err();
        assert!(matches!(err, DossierError::Archive { .. }));
    }

    #[test]
    fn test_unpack_all_uses_sibling_folders() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("batch");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("one.zip"), zip_bytes(&[("a.txt", b"1")])).unwrap();
        fs::write(temp_dir.path().join("two.zip"), zip_bytes(&[("b.txt", b"2")])).unwrap();
        fs::create_dir_all(temp_dir.path().join("two")).unwrap();
        fs::write(temp_dir.path().join("two/stale.txt"), "old").unwrap();

        let report = unpacker().unpack_all(temp_dir.path(), None).unwrap();

        assert_eq!(fs::read_to_string(nested.join("one/a.txt")).unwrap(), "1");
        assert_eq!(fs::read_to_string(temp_dir.path().join("two/b.txt")).unwrap(), "2");
        assert!(!temp_dir.path().join("two/stale.txt").exists());
        assert_eq!(report.count(Stage::Success), 2);
    }

    #[test]
    fn test_unpack_all_filters_by_category() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("keep_材料包.zip"), zip_bytes(&[("a.txt", b"1")])).unwrap();
        fs::write(temp_dir.path().join("other.zip"), zip_bytes(&[("b.txt", b"2")])).unwrap();

        let template = Template::new("packages").with_category("package", &["*材料包.zip"]);
        let report = ArchiveUnpacker::new(&template)
            .unwrap()
            .unpack_all(temp_dir.path(), None)
            .unwrap();

        assert!(temp_dir.path().join("keep_材料包/a.txt").exists());
        assert!(!temp_dir.path().join("other").exists());
        assert_eq!(report.items_with(Stage::Skip), vec!["other.zip"]);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("a.zip");
        fs::write(&archive, zip_bytes(&[("a.txt", b"1")])).unwrap();
        let dest = temp_dir.path().join("out");

        let report = unpacker().with_dry_run(true).unpack(&archive, &dest, None).unwrap();
        assert!(!dest.exists());
        assert_eq!(report.count(Stage::Info), 1);
    }

    #[test]
    fn test_decode_and_sanitize_helpers() {
        let fallbacks = resolve_encodings(&["gbk"]).unwrap();
        assert_eq!(decode_entry_name(b"plain.txt", "plain.txt", &fallbacks).0, "plain.txt");
        assert_eq!(
            decode_entry_name(&[0xff, 0xfe], "\u{a0}\u{25a0}", &[]).0,
            "\u{a0}\u{25a0}"
        );
        assert!(resolve_encodings(&["no-such-encoding"]).is_err());

        let (gbk_raw, _, _) = encoding_rs::GBK.encode("检验报告.pdf");
        assert_eq!(
            decode_entry_name(&gbk_raw, &decode_cp437(&gbk_raw), &fallbacks),
            ("检验报告.pdf".to_string(), Some("GBK"))
        );

        assert_eq!(sanitize_entry_path("a\\b.txt"), Some(PathBuf::from("a/b.txt")));
        assert_eq!(sanitize_entry_path("./a.txt"), Some(PathBuf::from("a.txt")));
        assert_eq!(sanitize_entry_path("/etc/passwd"), None);
        assert_eq!(sanitize_entry_path("a/../../b"), None);
        assert_eq!(sanitize_entry_path(""), None);
    }

    #[test]
    fn test_unicode_path_name_beats_fallbacks() {
        let fallbacks = resolve_encodings(&["gbk"]).unwrap();
        let (raw, _, _) = encoding_rs::SHIFT_JIS.encode("説明書.pdf");

        let (name, repaired) = decode_entry_name(&raw, "说明书.pdf", &fallbacks);
        assert_eq!(name, "说明书.pdf");
        assert_eq!(repaired, None);
    }

    #[test]
    fn test_cp437_matches_reader_decoding() {
        assert_eq!(decode_cp437(b"a.txt"), "a.txt");
        assert_eq!(decode_cp437(&[0x80, 0xe1, 0xfe, 0xff]), "Çß■\u{a0}");
    }

    #[test]
    fn test_fallback_override() {
        let unpacker = unpacker()
            .with_fallback_encodings(&["shift_jis", "big5"])
            .unwrap();
        assert_eq!(unpacker.fallback_names(), vec!["Shift_JIS", "Big5"]);
    }
}
