//! Writing rewritten files back to disk, or not.
//!
//! All file access goes through a [`FileStore`], so the pipeline can be run
//! against the real filesystem ([`DiskStore`]) or against a store that
//! injects failures. The [`PersistenceGate`] decides per file whether a write
//! happens: in dry-run mode it never calls [`FileStore::write`], and the
//! content it reports is the same rewritten text a live run would write.

use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Read/write access to source files.
pub trait FileStore {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Replaces the whole content of `path`.
    fn write(&self, path: &Path, contents: &str) -> io::Result<()>;
}

/// The local filesystem. Writes go to a sibling temp file that is renamed
/// over the target, so readers never observe a partial file.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskStore;

impl FileStore for DiskStore {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let file_name = path.file_name().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid path: {}", path.display()),
            )
        })?;
        let tmp = parent.join(format!(
            ".{}.{}.casefix.tmp",
            file_name.to_string_lossy(),
            std::process::id()
        ));

        replace_with(path, &tmp, |file| file.write_all(contents.as_bytes()))
    }
}

/// Fills `tmp` and renames it over `path`. On any error `tmp` is removed
/// and `path` is left as it was.
fn replace_with<F>(path: &Path, tmp: &Path, fill: F) -> io::Result<()>
where
    F: FnOnce(&mut fs::File) -> io::Result<()>,
{
    let result = fs::File::create(tmp)
        .and_then(|mut file| {
            fill(&mut file)?;
            file.sync_all()
        })
        .and_then(|()| {
            if let Ok(meta) = fs::metadata(path) {
                // Keep the original mode bits; the temp file was created with defaults.
                let _ = fs::set_permissions(tmp, meta.permissions());
            }
            fs::rename(tmp, path)
        });
    if result.is_err() {
        let _ = fs::remove_file(tmp);
    }
    result
}

/// Per-file approval for live writes.
pub trait Confirm {
    fn confirm(&self, path: &Path, modifications: usize) -> bool;
}

/// Approves every write.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoApprove;

impl Confirm for AutoApprove {
    fn confirm(&self, _path: &Path, _modifications: usize) -> bool {
        true
    }
}

/// What happened to one file at the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum WriteOutcome {
    /// Rewritten text equals the original; nothing to write.
    Unchanged,
    /// Dry-run: the file would have been written.
    WouldWrite,
    Written,
    /// Interactive mode: the user declined the write.
    Declined,
    Failed(String),
}

impl WriteOutcome {
    pub fn was_written(&self) -> bool {
        matches!(self, WriteOutcome::Written)
    }
}

/// Dry-run aware writer.
pub struct PersistenceGate<'a> {
    store: &'a dyn FileStore,
    confirm: &'a dyn Confirm,
    dry_run: bool,
}

impl<'a> PersistenceGate<'a> {
    pub fn new(store: &'a dyn FileStore, dry_run: bool) -> Self {
        Self {
            store,
            confirm: &AutoApprove,
            dry_run,
        }
    }

    pub fn with_confirm(mut self, confirm: &'a dyn Confirm) -> Self {
        self.confirm = confirm;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn store(&self) -> &'a dyn FileStore {
        self.store
    }

    /// Writes `rewritten` to `path` when it differs from `original` and the
    /// gate is live. Errors are returned as [`WriteOutcome::Failed`].
    pub fn write(
        &self,
        path: &Path,
        original: &str,
        rewritten: &str,
        modifications: usize,
    ) -> WriteOutcome {
        if original == rewritten {
            return WriteOutcome::Unchanged;
        }
        if self.dry_run {
            return WriteOutcome::WouldWrite;
        }
        if !self.confirm.confirm(path, modifications) {
            return WriteOutcome::Declined;
        }
        match self.store.write(path, rewritten) {
            Ok(()) => WriteOutcome::Written,
            Err(err) => WriteOutcome::Failed(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Records writes instead of performing them.
    #[derive(Default)]
    struct Recorder {
        writes: RefCell<Vec<(PathBuf, String)>>,
    }

    impl FileStore for Recorder {
        fn read(&self, _path: &Path) -> io::Result<Vec<u8>> {
            Ok(Vec::new())
        }

        fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
            self.writes
                .borrow_mut()
                .push((path.to_path_buf(), contents.to_string()));
            Ok(())
        }
    }

    struct Refuse;

    impl Confirm for Refuse {
        fn confirm(&self, _path: &Path, _modifications: usize) -> bool {
            false
        }
    }

    #[test]
    fn dry_run_never_writes() {
        let store = Recorder::default();
        let gate = PersistenceGate::new(&store, true);
        let outcome = gate.write(Path::new("a.ts"), "fire", "Fire", 1);
        assert_eq!(outcome, WriteOutcome::WouldWrite);
        assert!(store.writes.borrow().is_empty());
    }

    #[test]
    fn live_writes_changed_content() {
        let store = Recorder::default();
        let gate = PersistenceGate::new(&store, false);
        let outcome = gate.write(Path::new("a.ts"), "fire", "Fire", 1);
        assert!(outcome.was_written());
        assert_eq!(
            *store.writes.borrow(),
            vec![(PathBuf::from("a.ts"), "Fire".to_string())]
        );
    }

    #[test]
    fn unchanged_content_is_not_written() {
        let store = Recorder::default();
        let gate = PersistenceGate::new(&store, false);
        assert_eq!(gate.write(Path::new("a.ts"), "x", "x", 0), WriteOutcome::Unchanged);
        assert!(store.writes.borrow().is_empty());
    }

    #[test]
    fn declined_writes_leave_the_store_alone() {
        let store = Recorder::default();
        let gate = PersistenceGate::new(&store, false).with_confirm(&Refuse);
        assert_eq!(gate.write(Path::new("a.ts"), "a", "b", 1), WriteOutcome::Declined);
        assert!(store.writes.borrow().is_empty());
    }

    #[test]
    fn disk_store_replaces_content_without_leftovers() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("chart.ts");
        fs::write(&path, "old").unwrap();
        DiskStore.write(&path, "new").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        let entries: Vec<_> = fs::read_dir(tmp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn disk_store_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("run.js");
        fs::write(&path, "old").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        DiskStore.write(&path, "new").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o755);
    }

    #[test]
    fn failed_fill_removes_partial_temp_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("chart.ts");
        let partial = tmp.path().join(".chart.ts.tmp");
        fs::write(&path, "old").unwrap();

        let err = replace_with(&path, &partial, |file| {
            file.write_all(b"half of the new")?;
            Err(io::Error::other("disk full"))
        })
        .unwrap_err();

        assert_eq!(err.to_string(), "disk full");
        assert!(!partial.exists());
        assert_eq!(fs::read_to_string(&path).unwrap(), "old");
    }

    #[test]
    fn disk_store_write_failure_is_reported() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("missing-dir").join("a.ts");
        let gate = PersistenceGate::new(&DiskStore, false);
        assert!(matches!(gate.write(&path, "a", "b", 1), WriteOutcome::Failed(_)));
    }
}
