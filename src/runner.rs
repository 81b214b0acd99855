//! Sequencing the write, cache-drop and read phases of a run.

use crate::{
    cache::{CacheControl, Scope},
    copier::{ChunkCopier, Transfer},
    error::{BenchError, CacheDropError},
    files::{open_for_write, TestFiles},
    report::Report,
    source::DataSource,
    PROGRESS_STYLE,
};
use std::{fmt, fs::File, io, path::Path, time::Duration};
use tracing::{info, warn, Span};
use tracing_indicatif::span_ext::IndicatifSpanExt;

/// Where a run is. Stages only ever move forward, one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    Init,
    WriteZero,
    WriteRandom,
    DropCaches,
    ReadZero,
    ReadRandom,
    Done,
}

impl Stage {
    fn next(self) -> Self {
        match self {
            Stage::Init => Stage::WriteZero,
            Stage::WriteZero => Stage::WriteRandom,
            Stage::WriteRandom => Stage::DropCaches,
            Stage::DropCaches => Stage::ReadZero,
            Stage::ReadZero => Stage::ReadRandom,
            Stage::ReadRandom | Stage::Done => Stage::Done,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Init => "allocate test files",
            Stage::WriteZero => "write zero file",
            Stage::WriteRandom => "write random file",
            Stage::DropCaches => "drop caches",
            Stage::ReadZero => "read zero file",
            Stage::ReadRandom => "read random file",
            Stage::Done => "done",
        })
    }
}

/// One timed copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PhaseResult {
    pub stage: Stage,
    pub bytes: u64,
    pub elapsed: Duration,
    /// Set on reads that ran after a failed cache drop: their timing may
    /// include page cache hits.
    pub cache_unverified: bool,
}

pub(crate) struct Runner<C: CacheControl> {
    files: TestFiles,
    copier: ChunkCopier,
    cache: C,
    stage: Stage,
    results: Vec<PhaseResult>,
    cache_drop: Option<Result<Scope, CacheDropError>>,
}

impl<C: CacheControl> Runner<C> {
    pub(crate) fn new(files: TestFiles, copier: ChunkCopier, cache: C) -> Self {
        Self {
            files,
            copier,
            cache,
            stage: Stage::Init,
            results: Vec::with_capacity(4),
            cache_drop: None,
        }
    }

    pub(crate) fn stage(&self) -> Stage {
        self.stage
    }

    /// Executes the current stage and moves on to the next one.
    ///
    /// On error the runner stays at the failed stage.
    pub(crate) fn step(&mut self) -> Result<Stage, BenchError> {
        let size = self.files.size();
        match self.stage {
            Stage::Init => self.files.allocate()?,
            Stage::WriteZero => {
                let result = self.write(Stage::WriteZero, DataSource::Zero, &self.files.zero)?;
                self.results.push(result);
            }
            Stage::WriteRandom => {
                let result =
                    self.write(Stage::WriteRandom, DataSource::Random, &self.files.random)?;
                self.results.push(result);
            }
            Stage::DropCaches => {
                let outcome = self.drop_caches()?;
                self.cache_drop = Some(outcome);
            }
            Stage::ReadZero => {
                let result = self.read(Stage::ReadZero, &self.files.zero, &self.files.zero_read)?;
                self.results.push(result);
            }
            Stage::ReadRandom => {
                let result =
                    self.read(Stage::ReadRandom, &self.files.random, &self.files.random_read)?;
                self.results.push(result);
            }
            Stage::Done => return Ok(Stage::Done),
        }
        info!(stage = %self.stage, size, "stage complete");
        self.stage = self.stage.next();
        Ok(self.stage)
    }

    /// Steps until [Stage::Done] or the first fatal error.
    pub(crate) fn run(mut self) -> Report {
        let mut failure = None;
        while self.stage() != Stage::Done {
            if let Err(error) = self.step() {
                warn!(stage = %self.stage, %error, "Aborting the remaining stages");
                failure = Some(error);
                break;
            }
        }
        Report {
            results: self.results,
            cache_drop: self.cache_drop,
            failure,
            files: self.files,
        }
    }

    #[tracing::instrument(name = "write", skip(self, stage), fields(%stage))]
    fn write(
        &self,
        stage: Stage,
        source: DataSource,
        dst: &Path,
    ) -> Result<PhaseResult, BenchError> {
        let size = self.files.size();
        self.start_progress(size);
        let transfer = (|| -> io::Result<Transfer> {
            let mut out = open_for_write(dst)?;
            self.copier.copy(&mut source.reader(size), &mut out, size)
        })()
        .map_err(|source| BenchError::Transfer { stage, source })?;
        Ok(self.finish(stage, transfer))
    }

    #[tracing::instrument(name = "read", skip(self, stage), fields(%stage))]
    fn read(&self, stage: Stage, src: &Path, dst: &Path) -> Result<PhaseResult, BenchError> {
        let size = self.files.size();
        self.start_progress(size);
        let transfer = (|| -> io::Result<Transfer> {
            let mut input = File::open(src)?;
            let mut out = open_for_write(dst)?;
            self.copier.copy(&mut input, &mut out, size)
        })()
        .map_err(|source| BenchError::Transfer { stage, source })?;
        Ok(self.finish(stage, transfer))
    }

    fn drop_caches(&self) -> Result<Result<Scope, CacheDropError>, BenchError> {
        let files = self.files.all();
        self.cache
            .flush(&files)
            .map_err(|source| BenchError::Transfer {
                stage: Stage::DropCaches,
                source,
            })?;
        let outcome = self.cache.drop_caches(&files);
        match &outcome {
            Ok(scope) => info!(?scope, "Dropped the page cache"),
            Err(error) => warn!(
                %error,
                "Could not drop the page cache; read timings may include cache hits"
            ),
        }
        Ok(outcome)
    }

    fn start_progress(&self, size: u64) {
        info!(size, chunk_size = self.copier.chunk_size(), "starting");
        Span::current().pb_set_style(&PROGRESS_STYLE);
        Span::current().pb_set_length(size);
    }

    fn finish(&self, stage: Stage, transfer: Transfer) -> PhaseResult {
        let is_read = matches!(stage, Stage::ReadZero | Stage::ReadRandom);
        let cache_unverified = is_read && !matches!(self.cache_drop, Some(Ok(_)));
        info!(bytes = transfer.bytes, elapsed = ?transfer.elapsed, "finished");
        PhaseResult {
            stage,
            bytes: transfer.bytes,
            elapsed: transfer.elapsed,
            cache_unverified,
        }
    }
}
