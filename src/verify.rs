//! Checking that what was read back is what was written.

use anyhow::Context as _;
use std::{fs::File, io, path::Path};
use tracing::{error, info};

/// BLAKE3 digest of a file's whole contents.
pub(crate) fn digest(path: &Path) -> io::Result<blake3::Hash> {
    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize())
}

/// Fails unless `written` and `read_back` have identical contents.
pub(crate) fn same_contents(written: &Path, read_back: &Path) -> anyhow::Result<()> {
    let expected = digest(written).with_context(|| format!("Hashing {:?}", written))?;
    let actual = digest(read_back).with_context(|| format!("Hashing {:?}", read_back))?;
    if expected != actual {
        error!(
            ?written,
            ?read_back,
            %expected,
            %actual,
            "Read-back data does not match what was written"
        );
        anyhow::bail!("{:?} and {:?} differ", written, read_back);
    }
    info!(?written, ?read_back, digest = %expected, "Contents match");
    Ok(())
}

#[cfg(test)]
mod test {
    use super::same_contents;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn detects_issues() {
        let dir = tempfile::tempdir().expect("tempdir");
        let written = dir.path().join("written");
        let read_back = dir.path().join("read_back");
        let data = vec![1u8; 1024 * 1024];
        std::fs::write(&written, &data).unwrap();
        let mut corrupt = data.clone();
        corrupt[1024 * 512] = 255; // corrupt our read-back data
        std::fs::write(&read_back, &corrupt).unwrap();

        assert!(same_contents(&written, &read_back).is_err());
        assert!(logs_contain("does not match"));
    }

    #[traced_test]
    #[test]
    fn succeeds() {
        let dir = tempfile::tempdir().expect("tempdir");
        let written = dir.path().join("written");
        let read_back = dir.path().join("read_back");
        std::fs::write(&written, vec![1u8; 4096]).unwrap();
        std::fs::write(&read_back, vec![1u8; 4096]).unwrap();
        same_contents(&written, &read_back).expect("identical files");
    }
}
