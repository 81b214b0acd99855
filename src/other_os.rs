use crate::{cache::Scope, error::CacheDropError};
use std::path::Path;

/// There is no portable way to evict the page cache outside Linux.
pub(crate) fn drop_caches(_control: &Path, _files: &[&Path]) -> Result<Scope, CacheDropError> {
    Err(CacheDropError::Unsupported)
}
