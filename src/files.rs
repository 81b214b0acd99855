//! The files a benchmark run creates, and their cleanup.

use crate::error::BenchError;
use std::{
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

/// Paths of the four files a run works with. Removed on drop unless kept.
#[derive(Debug)]
pub(crate) struct TestFiles {
    dir: PathBuf,
    pub zero: PathBuf,
    pub random: PathBuf,
    pub zero_read: PathBuf,
    pub random_read: PathBuf,
    size: u64,
    keep: bool,
}

impl TestFiles {
    pub(crate) fn in_dir(dir: &Path, size: u64, keep: bool) -> Self {
        Self {
            dir: dir.to_owned(),
            zero: dir.join("zero.dat"),
            random: dir.join("random.dat"),
            zero_read: dir.join("zero.read.dat"),
            random_read: dir.join("random.read.dat"),
            size,
            keep,
        }
    }

    pub(crate) fn size(&self) -> u64 {
        self.size
    }

    pub(crate) fn all(&self) -> [&Path; 4] {
        [&self.zero, &self.random, &self.zero_read, &self.random_read]
    }

    /// Bytes the whole run puts on disk, or `None` if that overflows.
    pub(crate) fn required_space(&self) -> Option<u64> {
        self.size.checked_mul(self.all().len() as u64)
    }

    /// Checks that the directory has room for every file, then creates each
    /// one and sizes it to the test size.
    pub(crate) fn allocate(&self) -> Result<(), BenchError> {
        let no_space = |detail: String| BenchError::Allocation {
            path: self.dir.clone(),
            source: io::Error::new(io::ErrorKind::Other, detail),
        };
        let required = self.required_space().ok_or_else(|| {
            no_space(format!("{} x {} bytes overflows", self.all().len(), self.size))
        })?;
        let available = available_space(&self.dir).map_err(|source| BenchError::Allocation {
            path: self.dir.clone(),
            source,
        })?;
        if available < required {
            return Err(no_space(format!(
                "need {} bytes for the test files, only {} available",
                required, available
            )));
        }
        for path in self.all() {
            create_sized(path, self.size).map_err(|source| BenchError::Allocation {
                path: path.to_owned(),
                source,
            })?;
        }
        debug!(size = self.size, "allocated test files");
        Ok(())
    }
}

/// Space an unprivileged user may still fill on the filesystem holding `dir`.
#[cfg(unix)]
fn available_space(dir: &Path) -> io::Result<u64> {
    use std::{ffi::CString, mem::MaybeUninit, os::unix::ffi::OsStrExt};

    let c_path = CString::new(dir.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let mut stat = MaybeUninit::<libc::statvfs>::uninit();
    // SAFETY: `c_path` is NUL-terminated and `stat` is valid for writes.
    if unsafe { libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: statvfs returned 0, so it filled in `stat`.
    let stat = unsafe { stat.assume_init() };
    #[allow(clippy::unnecessary_cast)]
    Ok((stat.f_bavail as u64).saturating_mul(stat.f_frsize as u64))
}

#[cfg(not(unix))]
fn available_space(_dir: &Path) -> io::Result<u64> {
    Ok(u64::MAX)
}

fn create_sized(path: &Path, size: u64) -> io::Result<()> {
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.set_len(size)
}

/// Opens an allocated file for writing from offset 0, keeping its length.
pub(crate) fn open_for_write(path: &Path) -> io::Result<File> {
    OpenOptions::new().write(true).open(path)
}

impl Drop for TestFiles {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        for path in self.all() {
            if let Err(error) = fs::remove_file(path) {
                if error.kind() != io::ErrorKind::NotFound {
                    warn!(?path, %error, "Could not remove test file");
                }
            }
        }
    }
}
