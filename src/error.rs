use crate::runner::Stage;
use std::{io, path::PathBuf};
use thiserror::Error;

/// Fatal failures: the run stops at the stage that produced one.
#[derive(Error, Debug)]
pub(crate) enum BenchError {
    #[error("could not allocate test files at {path:?}")]
    Allocation {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{stage} failed")]
    Transfer {
        stage: Stage,
        #[source]
        source: io::Error,
    },
}

/// Why the page cache could not be invalidated. Never fatal by itself.
#[derive(Error, Debug)]
pub(crate) enum CacheDropError {
    #[error("insufficient privilege to drop caches: {0}")]
    PermissionDenied(#[source] io::Error),

    #[error("dropping caches is not supported on this platform")]
    Unsupported,

    #[error("dropping caches failed: {0}")]
    Other(#[source] io::Error),
}

impl From<io::Error> for CacheDropError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => CacheDropError::PermissionDenied(err),
            io::ErrorKind::Unsupported => CacheDropError::Unsupported,
            _ => match err.raw_os_error() {
                // EPERM surfaces as PermissionDenied on most platforms, but
                // not on every libc.
                Some(1) => CacheDropError::PermissionDenied(err),
                _ => CacheDropError::Other(err),
            },
        }
    }
}
