//! Flushing dirty data and evicting the page cache between phases.

use crate::error::CacheDropError;
use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
};

#[cfg(target_os = "linux")]
use crate::linux as platform;
#[cfg(not(target_os = "linux"))]
use crate::other_os as platform;

/// The usual location of the kernel's cache-invalidation knob.
pub(crate) const DROP_CACHES_PATH: &str = "/proc/sys/vm/drop_caches";

/// How much of the page cache a successful drop covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scope {
    /// Clean pages were discarded system-wide.
    System,
    /// Only the pages belonging to the files under test were discarded.
    Files,
}

/// The seam between the runner and the operating system's cache.
pub(crate) trait CacheControl {
    /// Hands every buffered write for `files` (and the process) to the device.
    fn flush(&self, files: &[&Path]) -> io::Result<()>;

    /// Asks the OS to forget cached pages. Allowed to fail; no retries.
    fn drop_caches(&self, files: &[&Path]) -> Result<Scope, CacheDropError>;
}

/// The real thing.
#[derive(Debug, Clone)]
pub(crate) struct OsCacheControl {
    control: PathBuf,
}

impl OsCacheControl {
    pub(crate) fn new(control: impl Into<PathBuf>) -> Self {
        Self {
            control: control.into(),
        }
    }
}

impl CacheControl for OsCacheControl {
    fn flush(&self, files: &[&Path]) -> io::Result<()> {
        for path in files {
            File::open(path)?.sync_all()?;
        }
        sync_filesystems();
        Ok(())
    }

    fn drop_caches(&self, files: &[&Path]) -> Result<Scope, CacheDropError> {
        platform::drop_caches(&self.control, files)
    }
}

#[cfg(unix)]
fn sync_filesystems() {
    // SAFETY: sync(2) takes no arguments and cannot fail.
    unsafe { libc::sync() }
}

#[cfg(not(unix))]
fn sync_filesystems() {}

#[cfg(test)]
mod test {
    use super::{CacheControl, OsCacheControl};

    #[test]
    fn flushes_existing_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("flushed");
        std::fs::write(&path, b"hello").expect("writing");
        OsCacheControl::new(dir.path().join("control"))
            .flush(&[&path])
            .expect("flush succeeds");
    }

    #[test]
    fn flush_reports_missing_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("never-created");
        let err = OsCacheControl::new(dir.path().join("control"))
            .flush(&[&path])
            .expect_err("file does not exist");
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
