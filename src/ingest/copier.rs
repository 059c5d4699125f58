use crate::error::{KioskError, Result};
use std::fs::{self, File, FileTimes};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Outcome of one copy task
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CopyReport {
    pub files_copied: u64,
    pub dirs_created: u64,
    /// Destination paths left untouched because they already existed
    pub skipped: Vec<PathBuf>,
}

/// Copy every direct entry of `source` into `dest` unless an entry of the same
/// name already exists there. Existence is the only check; contents are never
/// compared and existing entries are never overwritten.
pub fn copy_entries(source: &Path, dest: &Path) -> Result<CopyReport> {
    let mut report = CopyReport::default();

    let entries = fs::read_dir(source).map_err(|e| KioskError::copy(source, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| KioskError::copy(source, e))?;
        let src_path = entry.path();
        let dst_path = dest.join(entry.file_name());

        if dst_path.exists() {
            info!("Skipping {} - already exists", dst_path.display());
            report.skipped.push(dst_path);
            continue;
        }

        let mut metadata =
            fs::symlink_metadata(&src_path).map_err(|e| KioskError::copy(&src_path, e))?;
        if metadata.file_type().is_symlink() {
            match fs::metadata(&src_path) {
                Ok(target) => metadata = target,
                Err(e) => {
                    debug!("Ignoring dangling symlink {}: {}", src_path.display(), e);
                    continue;
                }
            }
        }

        if metadata.is_file() {
            info!("Copying file: {} to {}", src_path.display(), dst_path.display());
            copy_file(&src_path, &dst_path)?;
            report.files_copied += 1;
        } else if metadata.is_dir() {
            info!("Copying directory: {} to {}", src_path.display(), dst_path.display());
            copy_dir_tree(&src_path, &dst_path, &mut report)?;
        } else {
            debug!("Ignoring special file {}", src_path.display());
        }
    }

    Ok(report)
}

/// Recursively copy `source` into `dest`, merging into whatever already exists
/// there. Existing files are skipped, existing directories are descended into.
pub fn copy_dir_tree(source: &Path, dest: &Path, report: &mut CopyReport) -> Result<()> {
    if !dest.is_dir() {
        fs::create_dir_all(dest).map_err(|e| KioskError::copy(dest, e))?;
        report.dirs_created += 1;
    }

    let mut walker = WalkDir::new(source).min_depth(1).into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|e| walk_error(e, source))?;
        let rel = match entry.path().strip_prefix(source) {
            Ok(rel) => rel,
            Err(_) => continue,
        };
        let target = dest.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            if target.is_dir() {
                continue;
            }
            if target.exists() {
                info!("Skipping {} - already exists", target.display());
                report.skipped.push(target);
                walker.skip_current_dir();
                continue;
            }
            fs::create_dir(&target).map_err(|e| KioskError::copy(&target, e))?;
            report.dirs_created += 1;
            continue;
        }

        if target.exists() {
            info!("Skipping {} - already exists", target.display());
            report.skipped.push(target);
            continue;
        }

        // Regular files, or symlinks to one; FIFOs and sockets would block or fail
        let copyable = file_type.is_file() || (file_type.is_symlink() && entry.path().is_file());
        if !copyable {
            debug!("Ignoring special file {}", entry.path().display());
            continue;
        }

        debug!("Copying file: {} to {}", entry.path().display(), target.display());
        copy_file(entry.path(), &target)?;
        report.files_copied += 1;
    }

    Ok(())
}

/// Byte copy plus permissions and access/modification times
fn copy_file(source: &Path, dest: &Path) -> Result<()> {
    let metadata = fs::metadata(source).map_err(|e| KioskError::copy(source, e))?;
    fs::copy(source, dest).map_err(|e| KioskError::copy(source, e))?;

    let mut times = FileTimes::new();
    if let Ok(modified) = metadata.modified() {
        times = times.set_modified(modified);
    }
    if let Ok(accessed) = metadata.accessed() {
        times = times.set_accessed(accessed);
    }

    // Setting explicit times needs ownership, not write access
    File::open(dest)
        .and_then(|f| f.set_times(times))
        .map_err(|e| KioskError::copy(dest, e))?;

    Ok(())
}

fn walk_error(err: walkdir::Error, root: &Path) -> KioskError {
    let path = err
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.to_path_buf());
    let source = err
        .into_io_error()
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "filesystem loop detected"));
    KioskError::copy(path, source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;
    use std::time::{Duration, SystemTime};

    fn snapshot(root: &Path) -> BTreeMap<PathBuf, Option<Vec<u8>>> {
        WalkDir::new(root)
            .min_depth(1)
            .into_iter()
            .map(|e| e.unwrap())
            .map(|e| {
                let rel = e.path().strip_prefix(root).unwrap().to_path_buf();
                let bytes = e.file_type().is_file().then(|| fs::read(e.path()).unwrap());
                (rel, bytes)
            })
            .collect()
    }

    #[test]
    fn test_new_file_copied_and_existing_file_skipped() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        fs::write(src.path().join("report.txt"), b"quarterly numbers").unwrap();
        fs::write(src.path().join("notes.txt"), b"new notes from usb").unwrap();
        fs::write(dst.path().join("notes.txt"), b"notes already ingested").unwrap();

        let report = copy_entries(src.path(), dst.path()).unwrap();

        assert_eq!(fs::read(dst.path().join("report.txt")).unwrap(), b"quarterly numbers");
        assert_eq!(fs::read(dst.path().join("notes.txt")).unwrap(), b"notes already ingested");
        assert_eq!(report.files_copied, 1);
        assert_eq!(report.skipped, vec![dst.path().join("notes.txt")]);
    }

    #[test]
    fn test_directory_copied_recursively() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        fs::create_dir_all(src.path().join("photos/2024/summer")).unwrap();
        fs::write(src.path().join("photos/a.jpg"), b"a").unwrap();
        fs::write(src.path().join("photos/2024/summer/b.jpg"), b"b").unwrap();

        let report = copy_entries(src.path(), dst.path()).unwrap();

        assert_eq!(fs::read(dst.path().join("photos/a.jpg")).unwrap(), b"a");
        assert_eq!(fs::read(dst.path().join("photos/2024/summer/b.jpg")).unwrap(), b"b");
        assert_eq!(report.files_copied, 2);
        assert_eq!(report.dirs_created, 3);
    }

    #[test]
    fn test_existing_top_level_directory_is_skipped_whole() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        fs::create_dir(src.path().join("docs")).unwrap();
        fs::write(src.path().join("docs/new.txt"), b"new").unwrap();
        fs::create_dir(dst.path().join("docs")).unwrap();

        let report = copy_entries(src.path(), dst.path()).unwrap();

        assert!(!dst.path().join("docs/new.txt").exists());
        assert_eq!(report.skipped, vec![dst.path().join("docs")]);
    }

    #[test]
    fn test_tree_merge_keeps_existing_files() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        fs::create_dir_all(src.path().join("sub")).unwrap();
        fs::write(src.path().join("keep.txt"), b"from source").unwrap();
        fs::write(src.path().join("sub/fresh.txt"), b"fresh").unwrap();
        fs::create_dir_all(dst.path().join("sub")).unwrap();
        fs::write(dst.path().join("keep.txt"), b"already here").unwrap();

        let mut report = CopyReport::default();
        copy_dir_tree(src.path(), dst.path(), &mut report).unwrap();

        assert_eq!(fs::read(dst.path().join("keep.txt")).unwrap(), b"already here");
        assert_eq!(fs::read(dst.path().join("sub/fresh.txt")).unwrap(), b"fresh");
        assert_eq!(report.files_copied, 1);
        assert_eq!(report.dirs_created, 0);
        assert_eq!(report.skipped, vec![dst.path().join("keep.txt")]);
    }

    #[test]
    fn test_modification_time_preserved() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let file = src.path().join("clip.mp4");
        fs::write(&file, b"video").unwrap();
        let stamp = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
        File::options()
            .write(true)
            .open(&file)
            .unwrap()
            .set_modified(stamp)
            .unwrap();

        copy_entries(src.path(), dst.path()).unwrap();

        let copied = fs::metadata(dst.path().join("clip.mp4")).unwrap();
        assert_eq!(copied.modified().unwrap(), stamp);
    }

    #[test]
    fn test_missing_source_reports_path() {
        let dst = tempfile::tempdir().unwrap();
        let missing = Path::new("/nonexistent/usb/mount");
        match copy_entries(missing, dst.path()) {
            Err(KioskError::Copy { path, .. }) => assert_eq!(path, missing),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_second_run_is_near_noop() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        fs::create_dir(src.path().join("dir")).unwrap();
        fs::write(src.path().join("dir/x"), b"x").unwrap();
        fs::write(src.path().join("y"), b"y").unwrap();

        copy_entries(src.path(), dst.path()).unwrap();
        let second = copy_entries(src.path(), dst.path()).unwrap();

        assert_eq!(second.files_copied, 0);
        assert_eq!(second.dirs_created, 0);
        assert_eq!(second.skipped.len(), 2);
    }

    #[test]
    fn test_dangling_symlink_skipped() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink("/nonexistent/target", src.path().join("broken")).unwrap();
        fs::write(src.path().join("video.mp4"), b"clip").unwrap();

        let report = copy_entries(src.path(), dst.path()).unwrap();

        assert_eq!(report.files_copied, 1);
        assert!(report.skipped.is_empty());
        assert!(dst.path().join("broken").symlink_metadata().is_err());
        assert_eq!(fs::read(dst.path().join("video.mp4")).unwrap(), b"clip");
    }

    #[test]
    fn test_nested_fifo_skipped_without_blocking() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        fs::create_dir(src.path().join("sub")).unwrap();
        fs::write(src.path().join("sub/data.bin"), b"data").unwrap();
        let status = std::process::Command::new("mkfifo")
            .arg(src.path().join("sub/pipe"))
            .status()
            .unwrap();
        assert!(status.success());

        let (tx, rx) = std::sync::mpsc::channel();
        let (from, to) = (src.path().to_path_buf(), dst.path().to_path_buf());
        std::thread::spawn(move || {
            let _ = tx.send(copy_entries(&from, &to).map(|r| r.files_copied));
        });

        let copied = rx
            .recv_timeout(Duration::from_secs(3))
            .expect("copy blocked on a FIFO")
            .unwrap();
        assert_eq!(copied, 1);
        assert!(!dst.path().join("sub/pipe").exists());
        assert_eq!(fs::read(dst.path().join("sub/data.bin")).unwrap(), b"data");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_copy_twice_equals_copy_once(
            files in prop::collection::btree_map("[a-z]{1,6}", prop::collection::vec(any::<u8>(), 0..64), 1..6),
            nested in prop::collection::btree_map("[a-z]{1,6}", prop::collection::vec(any::<u8>(), 0..64), 0..4),
            preexisting in prop::collection::btree_map("[a-z]{1,6}", prop::collection::vec(any::<u8>(), 0..64), 0..4),
        ) {
            let src = tempfile::tempdir().unwrap();
            let once = tempfile::tempdir().unwrap();
            let twice = tempfile::tempdir().unwrap();

            for (name, bytes) in &files {
                fs::write(src.path().join(name), bytes).unwrap();
            }
            fs::create_dir(src.path().join("NESTED")).unwrap();
            for (name, bytes) in &nested {
                fs::write(src.path().join("NESTED").join(name), bytes).unwrap();
            }
            for (name, bytes) in &preexisting {
                fs::write(once.path().join(name), bytes).unwrap();
                fs::write(twice.path().join(name), bytes).unwrap();
            }

            copy_entries(src.path(), once.path()).unwrap();
            copy_entries(src.path(), twice.path()).unwrap();
            copy_entries(src.path(), twice.path()).unwrap();

            prop_assert_eq!(snapshot(once.path()), snapshot(twice.path()));
            for (name, bytes) in &preexisting {
                prop_assert_eq!(&fs::read(once.path().join(name)).unwrap(), bytes);
            }
        }
    }
}
