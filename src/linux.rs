use crate::{cache::Scope, error::CacheDropError};
use std::{
    fs::{File, OpenOptions},
    io::{self, Write},
    os::unix::io::AsRawFd,
    path::Path,
};
use tracing::{debug, info};

/// Writes "3" (page cache, dentries and inodes) to the drop_caches control
/// file. Without the privilege to do that, falls back to advising the
/// kernel that the pages of `files` are no longer needed.
pub(crate) fn drop_caches(control: &Path, files: &[&Path]) -> Result<Scope, CacheDropError> {
    drop_caches_with(|| write_control(control), files)
}

/// The control file must already exist; it is never created.
fn write_control(control: &Path) -> io::Result<()> {
    OpenOptions::new().write(true).open(control)?.write_all(b"3")
}

fn drop_caches_with(
    system_wide: impl FnOnce() -> io::Result<()>,
    files: &[&Path],
) -> Result<Scope, CacheDropError> {
    let error = match system_wide() {
        Ok(()) => return Ok(Scope::System),
        Err(error) => CacheDropError::from(error),
    };
    if !matches!(error, CacheDropError::PermissionDenied(_)) {
        return Err(error);
    }
    info!(
        %error,
        "Not allowed to drop caches system-wide; evicting the test files only"
    );
    match advise_dontneed(files) {
        Ok(()) => Ok(Scope::Files),
        Err(advice_error) => {
            debug!(%advice_error, "posix_fadvise fallback failed too");
            Err(error)
        }
    }
}

/// Evicts the clean cached pages of each file. Needs no privilege, but only
/// works on pages that have already been written back.
pub(crate) fn advise_dontneed(files: &[&Path]) -> io::Result<()> {
    for path in files {
        let file = File::open(path)?;
        // SAFETY: the descriptor is owned by `file` and open for the whole call.
        let ret =
            unsafe { libc::posix_fadvise(file.as_raw_fd(), 0, 0, libc::POSIX_FADV_DONTNEED) };
        if ret != 0 {
            return Err(io::Error::from_raw_os_error(ret));
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::{advise_dontneed, drop_caches, drop_caches_with};
    use crate::{cache::Scope, error::CacheDropError};
    use std::io;
    use tracing_test::traced_test;

    fn denied() -> io::Result<()> {
        Err(io::Error::from_raw_os_error(libc::EACCES))
    }

    #[test]
    fn writable_control_file_means_system_wide() {
        let dir = tempfile::tempdir().expect("tempdir");
        let control = dir.path().join("drop_caches");
        std::fs::write(&control, "").expect("creating control file");
        let scope = drop_caches(&control, &[]).expect("drop succeeds");
        assert_eq!(scope, Scope::System);
        assert_eq!(std::fs::read_to_string(&control).unwrap(), "3");
    }

    #[test]
    fn missing_control_file_is_not_a_permission_problem() {
        let dir = tempfile::tempdir().expect("tempdir");
        let control = dir.path().join("no").join("such").join("knob");
        let err = drop_caches(&control, &[]).expect_err("control file is missing");
        assert!(matches!(err, CacheDropError::Other(_)));
    }

    #[test]
    fn missing_control_file_is_not_created() {
        let dir = tempfile::tempdir().expect("tempdir");
        let control = dir.path().join("drop_caches");
        let err = drop_caches(&control, &[]).expect_err("control file is missing");
        assert!(matches!(err, CacheDropError::Other(_)));
        assert!(!control.exists());
    }

    #[traced_test]
    #[test]
    fn denied_system_wide_falls_back_to_the_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data");
        std::fs::write(&path, vec![0u8; 8192]).expect("writing");
        let scope = drop_caches_with(denied, &[&path]).expect("fallback succeeds");
        assert_eq!(scope, Scope::Files);
        assert!(logs_contain("evicting the test files only"));
    }

    #[test]
    fn denied_everywhere_reports_the_permission_problem() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("never-written");
        let err = drop_caches_with(denied, &[&missing]).expect_err("fallback fails too");
        assert!(matches!(err, CacheDropError::PermissionDenied(_)));
    }

    #[test]
    fn other_failures_skip_the_fallback() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data");
        std::fs::write(&path, b"data").expect("writing");
        let err = drop_caches_with(|| Err(io::Error::from(io::ErrorKind::InvalidInput)), &[&path])
            .expect_err("not a permission problem");
        assert!(matches!(err, CacheDropError::Other(_)));
    }

    #[test]
    fn advice_works_on_ordinary_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data");
        std::fs::write(&path, vec![0u8; 8192]).expect("writing");
        advise_dontneed(&[&path]).expect("fadvise succeeds");
    }
}
