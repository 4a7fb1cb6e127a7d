//! File level merge of device-definition XML.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::log::{self, LogSink};
use crate::xml::{merge_registry, Document, MergeAction, MergeReport, UpdatePlacement};
use crate::PatchError;

const BACKUP_SUFFIX: &str = ".bak";
const TEMP_SUFFIX: &str = ".tmp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOptions {
    /// Keep a pristine copy of the target as `<target>.bak` before the first
    /// change. An existing backup is never replaced.
    pub backup: bool,
    pub placement: UpdatePlacement,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            backup: true,
            placement: UpdatePlacement::Append,
        }
    }
}

/// What [`merge_xml`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlMergeOutcome {
    /// Nothing to merge; the target was left untouched.
    SourceMissing,
    /// The target did not exist and is now a byte copy of the source.
    Created,
    Merged(MergeReport),
    /// One of the documents is not well-formed; nothing was written.
    ParseFailed { path: PathBuf, detail: String },
}

impl XmlMergeOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, XmlMergeOutcome::ParseFailed { .. })
    }
}

/// `<target>.bak`, next to the target.
pub fn backup_path(target: &Path) -> PathBuf {
    with_suffix(target, BACKUP_SUFFIX)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Merge the devices of `source` into `target` and write `target` back.
///
/// A missing source or a malformed document is reported through `sink` and
/// the returned outcome; filesystem failures are returned as errors.
pub fn merge_xml(
    target: &Path,
    source: &Path,
    options: &MergeOptions,
    sink: &mut dyn LogSink,
) -> Result<XmlMergeOutcome, PatchError> {
    if !source.exists() {
        log::warning(
            sink,
            format_args!("source file {} does not exist, skipping", source.display()),
        );
        return Ok(XmlMergeOutcome::SourceMissing);
    }

    if options.backup && target.exists() {
        let backup = backup_path(target);
        if !backup.exists() {
            fs::copy(target, &backup).map_err(PatchError::io("back up", target))?;
            log::info(
                sink,
                format_args!("backed up original file to {}", backup.display()),
            );
        }
    }

    if !target.exists() {
        fs::copy(source, target).map_err(PatchError::io("copy", source))?;
        log::info(sink, format_args!("created {}", target.display()));
        return Ok(XmlMergeOutcome::Created);
    }

    let documents = load_document(target).and_then(|t| Ok((t, load_document(source)?)));
    let (mut merged, incoming) = match documents {
        Ok(documents) => documents,
        Err(PatchError::Parse { path, source }) => {
            log::error(
                sink,
                format_args!("XML parse failed for {}: {source}", path.display()),
            );
            return Ok(XmlMergeOutcome::ParseFailed {
                path,
                detail: source.to_string(),
            });
        }
        Err(err) => return Err(err),
    };

    let report = merge_registry(&mut merged.root, incoming.root, options.placement);
    for action in &report.actions {
        match action {
            MergeAction::AddedUnnamed { .. } => log::warning(sink, action),
            _ => log::info(sink, action),
        }
    }

    let xml = merged.to_xml_string()?;
    write_replacing(target, xml.as_bytes())?;
    info!(
        path = %target.display(),
        added = report.added(),
        updated = report.updated(),
        "device registry merged"
    );
    log::info(
        sink,
        format_args!(
            "XML merge complete: {} added, {} updated",
            report.added(),
            report.updated()
        ),
    );
    Ok(XmlMergeOutcome::Merged(report))
}

fn load_document(path: &Path) -> Result<Document, PatchError> {
    let bytes = fs::read(path).map_err(PatchError::io("read", path))?;
    Document::parse_bytes(&bytes).map_err(|source| PatchError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Write through a sibling temp file so a failed write leaves the old
/// document in place.
///
/// A symlinked target is resolved first so the link survives, and the
/// replaced file keeps its permissions.
fn write_replacing(path: &Path, contents: &[u8]) -> Result<(), PatchError> {
    let is_link = fs::symlink_metadata(path).map_or(false, |meta| meta.file_type().is_symlink());
    let path = if is_link {
        fs::canonicalize(path).map_err(PatchError::io("resolve", path))?
    } else {
        path.to_path_buf()
    };
    let temp = with_suffix(&path, TEMP_SUFFIX);
    fs::write(&temp, contents).map_err(PatchError::io("write", &temp))?;
    if let Err(err) = replace_with(&temp, &path) {
        let _ = fs::remove_file(&temp);
        return Err(err);
    }
    debug!(path = %path.display(), bytes = contents.len(), "wrote document");
    Ok(())
}

fn replace_with(temp: &Path, path: &Path) -> Result<(), PatchError> {
    if let Ok(meta) = fs::metadata(path) {
        fs::set_permissions(temp, meta.permissions())
            .map_err(PatchError::io("set permissions", temp))?;
    }
    fs::rename(temp, path).map_err(PatchError::io("replace", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{Lines, ERROR_PREFIX, WARNING_PREFIX};
    use crate::xml::registry_names;

    struct Fixture {
        _dir: tempfile::TempDir,
        target: PathBuf,
        source: PathBuf,
    }

    fn fixture(target: Option<&str>, source: Option<&str>) -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let target_path = dir.path().join("JLinkDevices.xml");
        let source_path = dir.path().join("bundle.xml");
        if let Some(xml) = target {
            fs::write(&target_path, xml).expect("target");
        }
        if let Some(xml) = source {
            fs::write(&source_path, xml).expect("source");
        }
        Fixture {
            _dir: dir,
            target: target_path,
            source: source_path,
        }
    }

    fn names_in(path: &Path) -> Vec<String> {
        let doc = Document::parse(&fs::read_to_string(path).expect("read")).expect("parse");
        registry_names(&doc.root)
            .into_iter()
            .map(|name| name.unwrap_or("-").to_string())
            .collect()
    }

    const TARGET: &str = r#"<DataBase><Device Name="STM32F1"/></DataBase>"#;
    const SOURCE: &str =
        r#"<DataBase><Device Name="STM32F1" Rev="2"/><Device Name="STM32F4"/></DataBase>"#;

    #[test]
    fn merges_and_backs_up_once() {
        let fx = fixture(Some(TARGET), Some(SOURCE));
        let mut lines = Lines::default();
        let outcome = merge_xml(&fx.target, &fx.source, &MergeOptions::default(), &mut lines)
            .expect("merge");

        let report = match outcome {
            XmlMergeOutcome::Merged(report) => report,
            other => panic!("unexpected outcome {other:?}"),
        };
        assert_eq!((report.added(), report.updated()), (1, 1));
        assert_eq!(names_in(&fx.target), ["STM32F1", "STM32F4"]);
        let backup = backup_path(&fx.target);
        assert_eq!(fs::read_to_string(&backup).expect("backup"), TARGET);
        assert!(lines.contains("added device: STM32F4"));
        assert!(lines.contains("updated device: STM32F1"));
        assert!(lines.contains("1 added, 1 updated"));

        let written = fs::read_to_string(&fx.target).expect("target");
        assert!(written.starts_with(r#"<?xml version="1.0" encoding="utf-8"?>"#));

        // A second run must not refresh the backup.
        merge_xml(&fx.target, &fx.source, &MergeOptions::default(), &mut lines).expect("rerun");
        assert_eq!(fs::read_to_string(&backup).expect("backup"), TARGET);
        assert_eq!(names_in(&fx.target), ["STM32F1", "STM32F4"]);
    }

    #[test]
    fn backup_can_be_disabled() {
        let fx = fixture(Some(TARGET), Some(SOURCE));
        let options = MergeOptions {
            backup: false,
            ..MergeOptions::default()
        };
        merge_xml(&fx.target, &fx.source, &options, &mut Lines::default()).expect("merge");
        assert!(!backup_path(&fx.target).exists());
    }

    #[test]
    fn missing_target_becomes_copy_of_source() {
        let fx = fixture(None, Some(SOURCE));
        let outcome = merge_xml(&fx.target, &fx.source, &MergeOptions::default(), &mut Lines::default())
            .expect("merge");
        assert_eq!(outcome, XmlMergeOutcome::Created);
        assert_eq!(fs::read(&fx.target).expect("target"), SOURCE.as_bytes());
        assert!(!backup_path(&fx.target).exists());
    }

    #[test]
    fn missing_source_is_a_warning() {
        let fx = fixture(Some(TARGET), None);
        let mut lines = Lines::default();
        let outcome =
            merge_xml(&fx.target, &fx.source, &MergeOptions::default(), &mut lines).expect("merge");
        assert_eq!(outcome, XmlMergeOutcome::SourceMissing);
        assert_eq!(lines.count_prefixed(WARNING_PREFIX), 1);
        assert_eq!(fs::read_to_string(&fx.target).expect("target"), TARGET);
        assert!(!backup_path(&fx.target).exists());
    }

    #[test]
    fn malformed_documents_leave_target_untouched() {
        for (target, source, bad) in [
            ("<DataBase><Device Name=\"A\"></DataBase>", SOURCE, "JLinkDevices.xml"),
            (TARGET, "<DataBase><Device", "bundle.xml"),
        ] {
            let fx = fixture(Some(target), Some(source));
            let mut lines = Lines::default();
            let outcome = merge_xml(&fx.target, &fx.source, &MergeOptions::default(), &mut lines)
                .expect("merge");
            match outcome {
                XmlMergeOutcome::ParseFailed { path, .. } => {
                    assert!(path.ends_with(bad), "{path:?}");
                }
                other => panic!("unexpected outcome {other:?}"),
            }
            assert_eq!(fs::read_to_string(&fx.target).expect("target"), target);
            assert_eq!(lines.count_prefixed(ERROR_PREFIX), 1);
            assert!(!fx.target.with_file_name("JLinkDevices.xml.tmp").exists());
        }
    }

    #[test]
    fn in_place_placement_keeps_order() {
        let fx = fixture(
            Some(r#"<DataBase><Device Name="A"/><Device Name="B"/></DataBase>"#),
            Some(r#"<DataBase><Device Name="A" Rev="2"/></DataBase>"#),
        );
        let options = MergeOptions {
            placement: UpdatePlacement::InPlace,
            ..MergeOptions::default()
        };
        merge_xml(&fx.target, &fx.source, &options, &mut Lines::default()).expect("merge");
        assert_eq!(names_in(&fx.target), ["A", "B"]);
    }

    #[test]
    fn legacy_encodings_are_merged() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("JLinkDevices.xml");
        let source = dir.path().join("bundle.xml");
        let mut latin1 =
            b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n<DataBase><Device Name=\"STM32F1\" Note=\"".to_vec();
        latin1.push(0xB5);
        latin1.extend_from_slice(b"C\"/></DataBase>\n");
        fs::write(&target, &latin1).expect("target");
        let utf16 = "<?xml version=\"1.0\" encoding=\"UTF-16\"?><DataBase><Device Name=\"GD32F303\"/></DataBase>";
        let mut bytes = vec![0xFF, 0xFE];
        bytes.extend(utf16.encode_utf16().flat_map(u16::to_le_bytes));
        fs::write(&source, &bytes).expect("source");

        let mut lines = Lines::default();
        let outcome =
            merge_xml(&target, &source, &MergeOptions::default(), &mut lines).expect("merge");

        assert!(matches!(outcome, XmlMergeOutcome::Merged(_)), "{outcome:?} {lines:?}");
        assert_eq!(names_in(&target), ["STM32F1", "GD32F303"]);
        let written = fs::read_to_string(&target).expect("utf-8 output");
        assert!(written.contains("Note=\"\u{b5}C\""));
        assert_eq!(fs::read(backup_path(&target)).expect("backup"), latin1);
    }

    #[cfg(unix)]
    #[test]
    fn rewrite_keeps_permissions_and_symlinks() {
        use std::os::unix::fs::{symlink, PermissionsExt};

        let dir = tempfile::tempdir().expect("tempdir");
        let real = dir.path().join("real.xml");
        let link = dir.path().join("JLinkDevices.xml");
        let source = dir.path().join("bundle.xml");
        fs::write(&real, TARGET).expect("target");
        fs::set_permissions(&real, fs::Permissions::from_mode(0o640)).expect("chmod");
        symlink(&real, &link).expect("symlink");
        fs::write(&source, SOURCE).expect("source");

        let options = MergeOptions {
            backup: false,
            ..MergeOptions::default()
        };
        merge_xml(&link, &source, &options, &mut Lines::default()).expect("merge");

        assert!(fs::symlink_metadata(&link).expect("link").file_type().is_symlink());
        assert_eq!(names_in(&real), ["STM32F1", "STM32F4"]);
        let mode = fs::metadata(&real).expect("meta").permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
        assert!(!dir.path().join("real.xml.tmp").exists());
    }

    #[test]
    fn unnamed_entries_are_warned_about() {
        let fx = fixture(Some(TARGET), Some("<DataBase><Flash/></DataBase>"));
        let mut lines = Lines::default();
        merge_xml(&fx.target, &fx.source, &MergeOptions::default(), &mut lines).expect("merge");
        assert_eq!(lines.count_prefixed(WARNING_PREFIX), 1);
        assert_eq!(names_in(&fx.target), ["STM32F1", "-"]);
    }
}
