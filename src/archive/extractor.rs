//! ZIP extraction with path containment checks.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};
use zip::ZipArchive;
use zip::result::ZipError;

use crate::archive::config::ArchiveConfig;
use crate::archive::error::{ArchiveError, ArchiveResult};

/// Chunk size used when streaming an entry to disk.
const COPY_BUFFER_BYTES: usize = 64 * 1024;

/// Outcome of a successful extraction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Path of the transcript file, if the archive contained one.
    ///
    /// When several `.txt` entries exist, the last one in archive order wins.
    pub transcript: Option<PathBuf>,
    /// Number of file entries written.
    pub files: usize,
    /// Number of directory entries created.
    pub directories: usize,
    /// Total bytes written across all file entries.
    pub bytes_written: u64,
}

/// Bytes an entry may still produce, and the cap reported if it overruns.
#[derive(Clone, Copy, Debug)]
struct Budget {
    remaining: u64,
    limit: u64,
}

impl Budget {
    fn for_entry(config: &ArchiveConfig, written_so_far: u64) -> Self {
        let archive_left = config.max_extracted_bytes.saturating_sub(written_so_far);
        if config.max_entry_bytes <= archive_left {
            Self {
                remaining: config.max_entry_bytes,
                limit: config.max_entry_bytes,
            }
        } else {
            Self {
                remaining: archive_left,
                limit: config.max_extracted_bytes,
            }
        }
    }
}

/// Unpack `archive_path` into `destination`.
///
/// Every entry is checked before anything is written for it: names that are
/// absolute, empty, or contain a `..` segment are rejected with
/// [`ArchiveError::IllegalEntryPath`]. Decompressed output is capped per entry
/// and per archive by `config`.
///
/// # Errors
/// Returns [`ArchiveError::CorruptArchive`] if the container or an entry cannot
/// be read, [`ArchiveError::IllegalEntryPath`] for escaping entry names,
/// [`ArchiveError::TooLarge`] when a size cap is exceeded, and
/// [`ArchiveError::WriteFailure`] on local I/O errors.
pub fn extract_archive(
    archive_path: &Path,
    destination: &Path,
    config: &ArchiveConfig,
) -> ArchiveResult<Extraction> {
    debug!(
        source = %archive_path.display(),
        destination = %destination.display(),
        "Extracting archive"
    );

    let file = File::open(archive_path).map_err(|err| {
        warn!(%err, source = %archive_path.display(), "Failed to open archive");
        ArchiveError::CorruptArchive(ZipError::Io(err))
    })?;
    let mut archive = ZipArchive::new(file)?;
    let mut extraction = Extraction::default();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let name = entry.name().to_string();
        let target = resolve_entry_path(destination, &name)?;

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(|err| ArchiveError::write_failure(&target, err))?;
            extraction.directories += 1;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|err| ArchiveError::write_failure(parent, err))?;
        }

        let budget = Budget::for_entry(config, extraction.bytes_written);
        if entry.size() > budget.remaining {
            warn!(
                entry = %name,
                declared = entry.size(),
                limit = budget.limit,
                "Archive entry too large"
            );
            return Err(ArchiveError::TooLarge {
                entry: name,
                limit: budget.limit,
            });
        }

        let mut out = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&target)
            .map_err(|err| ArchiveError::write_failure(&target, err))?;
        extraction.bytes_written += copy_entry(&mut entry, &mut out, &target, &name, budget)?;
        drop(out);
        apply_mode(&target, entry.unix_mode())?;
        extraction.files += 1;

        if name.to_ascii_lowercase().ends_with(".txt") {
            extraction.transcript = Some(target);
        }
    }

    debug!(
        transcript = ?extraction.transcript,
        files = extraction.files,
        bytes = extraction.bytes_written,
        "Archive extraction completed"
    );
    Ok(extraction)
}

/// Join `name` onto `root`, refusing anything that could leave `root`.
fn resolve_entry_path(root: &Path, name: &str) -> ArchiveResult<PathBuf> {
    let mut relative = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ArchiveError::IllegalEntryPath(name.to_string()));
            }
        }
    }

    if relative.as_os_str().is_empty() {
        return Err(ArchiveError::IllegalEntryPath(name.to_string()));
    }

    Ok(root.join(relative))
}

/// Stream an entry into `writer`, separating read faults from write faults.
///
/// The declared size in the archive header is not trusted: the byte count is
/// checked against `budget` after every read.
fn copy_entry(
    reader: &mut impl Read,
    writer: &mut impl Write,
    target: &Path,
    name: &str,
    budget: Budget,
) -> ArchiveResult<u64> {
    let mut buf = vec![0_u8; COPY_BUFFER_BYTES];
    let mut total: u64 = 0;

    loop {
        let read = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(ArchiveError::CorruptArchive(ZipError::Io(err))),
        };
        total += read as u64;
        if total > budget.remaining {
            warn!(entry = %name, limit = budget.limit, "Archive entry inflated past limit");
            return Err(ArchiveError::TooLarge {
                entry: name.to_string(),
                limit: budget.limit,
            });
        }
        writer
            .write_all(&buf[..read])
            .map_err(|err| ArchiveError::write_failure(target, err))?;
    }

    writer
        .flush()
        .map_err(|err| ArchiveError::write_failure(target, err))?;
    Ok(total)
}

#[cfg(unix)]
fn apply_mode(target: &Path, mode: Option<u32>) -> ArchiveResult<()> {
    use std::os::unix::fs::PermissionsExt;

    let Some(bits) = mode.map(|m| m & 0o777).filter(|bits| *bits != 0) else {
        return Ok(());
    };
    fs::set_permissions(target, fs::Permissions::from_mode(bits))
        .map_err(|err| ArchiveError::write_failure(target, err))
}

#[cfg(not(unix))]
fn apply_mode(_target: &Path, _mode: Option<u32>) -> ArchiveResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use zip::write::SimpleFileOptions;

    enum Entry<'a> {
        File(&'a str, &'a [u8]),
        Dir(&'a str),
    }

    fn write_archive(dir: &Path, entries: &[Entry<'_>]) -> PathBuf {
        let path = dir.join("upload.zip");
        let file = File::create(&path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for entry in entries {
            match entry {
                Entry::File(name, data) => {
                    writer.start_file(*name, SimpleFileOptions::default()).unwrap();
                    writer.write_all(data).unwrap();
                }
                Entry::Dir(name) => writer
                    .add_directory(*name, SimpleFileOptions::default())
                    .unwrap(),
            }
        }
        writer.finish().unwrap();
        path
    }

    #[test]
    fn test_extracts_files_and_finds_transcript() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = write_archive(
            tmp.path(),
            &[
                Entry::File("WhatsApp Chat.txt", b"12/01/2023, 10:00 - Alice: hi\n"),
                Entry::File("IMG-0001.jpg", &[0xFF, 0xD8, 0xFF]),
            ],
        );
        let dest = tmp.path().join("out");

        let extraction = extract_archive(&archive, &dest, &ArchiveConfig::default()).unwrap();

        assert_eq!(extraction.transcript, Some(dest.join("WhatsApp Chat.txt")));
        assert_eq!(extraction.files, 2);
        assert_eq!(extraction.bytes_written, 33);
        assert_eq!(fs::read(dest.join("IMG-0001.jpg")).unwrap(), vec![0xFF, 0xD8, 0xFF]);
    }

    #[test]
    fn test_last_transcript_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = write_archive(
            tmp.path(),
            &[
                Entry::File("first.txt", b"one"),
                Entry::File("nested/SECOND.TXT", b"two"),
            ],
        );
        let dest = tmp.path().join("out");

        let extraction = extract_archive(&archive, &dest, &ArchiveConfig::default()).unwrap();

        assert_eq!(extraction.transcript, Some(dest.join("nested").join("SECOND.TXT")));
    }

    #[test]
    fn test_no_transcript_is_not_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = write_archive(tmp.path(), &[Entry::File("photo.png", b"png")]);

        let extraction =
            extract_archive(&archive, &tmp.path().join("out"), &ArchiveConfig::default()).unwrap();

        assert!(extraction.transcript.is_none());
        assert_eq!(extraction.files, 1);
    }

    #[test]
    fn test_directory_entries_are_created() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = write_archive(
            tmp.path(),
            &[Entry::Dir("media/"), Entry::File("media/a.webp", b"w")],
        );
        let dest = tmp.path().join("out");

        let extraction = extract_archive(&archive, &dest, &ArchiveConfig::default()).unwrap();

        assert!(dest.join("media").is_dir());
        assert_eq!(extraction.directories, 1);
        assert_eq!(extraction.files, 1);
    }

    #[test]
    fn test_rejects_parent_traversal() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = write_archive(tmp.path(), &[Entry::File("../evil.txt", b"owned")]);
        let dest = tmp.path().join("out");

        let err = extract_archive(&archive, &dest, &ArchiveConfig::default()).unwrap_err();

        assert!(matches!(err, ArchiveError::IllegalEntryPath(ref name) if name == "../evil.txt"));
        assert!(!tmp.path().join("evil.txt").exists());
    }

    #[test]
    fn test_rejects_traversal_after_valid_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = write_archive(
            tmp.path(),
            &[
                Entry::File("chat.txt", b"ok"),
                Entry::File("media/../../escape.jpg", b"x"),
            ],
        );
        let dest = tmp.path().join("out");

        let err = extract_archive(&archive, &dest, &ArchiveConfig::default()).unwrap_err();

        assert!(matches!(err, ArchiveError::IllegalEntryPath(_)));
        assert!(!tmp.path().join("escape.jpg").exists());
    }

    #[test]
    fn test_resolve_entry_path_rules() {
        let root = Path::new("/srv/upload");
        assert_eq!(
            resolve_entry_path(root, "./media/a.png").unwrap(),
            root.join("media").join("a.png")
        );
        assert!(resolve_entry_path(root, "/etc/passwd").is_err());
        assert!(resolve_entry_path(root, "a/../b.txt").is_err());
        assert!(resolve_entry_path(root, "./").is_err());
        assert!(resolve_entry_path(root, "").is_err());
    }

    #[test]
    fn test_corrupt_archive() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("broken.zip");
        fs::write(&path, b"definitely not a zip file").unwrap();

        let err =
            extract_archive(&path, &tmp.path().join("out"), &ArchiveConfig::default()).unwrap_err();

        assert!(matches!(err, ArchiveError::CorruptArchive(_)));
        assert!(err.is_input_error());
    }

    #[test]
    fn test_missing_archive_is_corrupt() {
        let tmp = tempfile::tempdir().unwrap();

        let err = extract_archive(&tmp.path().join("nope.zip"), tmp.path(), &ArchiveConfig::default())
            .unwrap_err();

        assert!(matches!(err, ArchiveError::CorruptArchive(_)));
    }

    #[test]
    fn test_entry_over_limit_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = write_archive(
            tmp.path(),
            &[
                Entry::File("chat.txt", b"small"),
                Entry::File("IMG-1.jpg", &[0_u8; 4096]),
            ],
        );
        let dest = tmp.path().join("out");
        let config = ArchiveConfig::default().with_max_entry_bytes(1024);

        let err = extract_archive(&archive, &dest, &config).unwrap_err();

        assert!(
            matches!(err, ArchiveError::TooLarge { ref entry, limit: 1024 } if entry == "IMG-1.jpg")
        );
        assert!(err.is_input_error());
    }

    #[test]
    fn test_archive_total_over_limit_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = write_archive(
            tmp.path(),
            &[
                Entry::File("a.jpg", &[1_u8; 600]),
                Entry::File("b.jpg", &[2_u8; 600]),
            ],
        );
        let dest = tmp.path().join("out");
        let config = ArchiveConfig::default()
            .with_max_entry_bytes(1000)
            .with_max_extracted_bytes(1000);

        let err = extract_archive(&archive, &dest, &config).unwrap_err();

        assert!(matches!(err, ArchiveError::TooLarge { ref entry, limit: 1000 } if entry == "b.jpg"));
        assert_eq!(fs::read(dest.join("a.jpg")).unwrap().len(), 600);
    }

    #[test]
    fn test_copy_entry_stops_at_budget() {
        let data = vec![7_u8; 3 * COPY_BUFFER_BYTES];
        let mut sink = Vec::new();
        let budget = Budget {
            remaining: 100,
            limit: 100,
        };

        let err =
            copy_entry(&mut data.as_slice(), &mut sink, Path::new("x"), "x", budget).unwrap_err();

        assert!(matches!(err, ArchiveError::TooLarge { limit: 100, .. }));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_exactly_at_limit_is_accepted() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = write_archive(tmp.path(), &[Entry::File("chat.txt", &[b'x'; 256])]);
        let config = ArchiveConfig::default()
            .with_max_entry_bytes(256)
            .with_max_extracted_bytes(256);

        let extraction = extract_archive(&archive, &tmp.path().join("out"), &config).unwrap();

        assert_eq!(extraction.bytes_written, 256);
    }

    #[test]
    fn test_destination_is_a_file_is_write_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = write_archive(tmp.path(), &[Entry::File("chat.txt", b"t1 - A: hi\n")]);
        let dest = tmp.path().join("occupied");
        fs::write(&dest, b"not a directory").unwrap();

        let err = extract_archive(&archive, &dest, &ArchiveConfig::default()).unwrap_err();

        assert!(matches!(err, ArchiveError::WriteFailure { ref path, .. } if path.starts_with(&dest)));
        assert!(!err.is_input_error());
    }

    #[test]
    fn test_file_entry_blocking_directory_is_write_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = write_archive(
            tmp.path(),
            &[Entry::File("media", b"plain file"), Entry::File("media/a.jpg", b"jpeg")],
        );
        let dest = tmp.path().join("out");

        let err = extract_archive(&archive, &dest, &ArchiveConfig::default()).unwrap_err();

        assert!(matches!(err, ArchiveError::WriteFailure { .. }));
        assert!(!err.is_input_error());
    }

    #[cfg(unix)]
    #[test]
    fn test_preserves_unix_mode() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("modes.zip");
        let mut writer = zip::ZipWriter::new(File::create(&path).unwrap());
        writer
            .start_file("chat.txt", SimpleFileOptions::default().unix_permissions(0o640))
            .unwrap();
        writer.write_all(b"x").unwrap();
        writer.finish().unwrap();
        let dest = tmp.path().join("out");

        extract_archive(&path, &dest, &ArchiveConfig::default()).unwrap();

        let mode = fs::metadata(dest.join("chat.txt")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }
}
