//! Printing the timings a run collected.

use crate::{
    cache::Scope,
    error::{BenchError, CacheDropError},
    files::TestFiles,
    runner::{PhaseResult, Stage},
};
use indicatif::HumanBytes;
use std::io;

/// Everything a run produced, whether or not it reached [Stage::Done].
#[derive(Debug)]
pub(crate) struct Report {
    pub results: Vec<PhaseResult>,
    pub cache_drop: Option<Result<Scope, CacheDropError>>,
    pub failure: Option<BenchError>,
    pub files: TestFiles,
}

impl Report {
    /// Whether the read timings were taken with a cold page cache.
    pub(crate) fn cache_verified(&self) -> bool {
        matches!(self.cache_drop, Some(Ok(_)))
    }

    /// One line per completed stage, in the order they ran.
    pub(crate) fn write_to(&self, out: &mut impl io::Write) -> io::Result<()> {
        let (writes, reads): (Vec<_>, Vec<_>) = self
            .results
            .iter()
            .partition(|r| matches!(r.stage, Stage::WriteZero | Stage::WriteRandom));
        for result in writes {
            write_phase(out, result)?;
        }
        match &self.cache_drop {
            None => {}
            Some(Ok(Scope::System)) => writeln!(out, "{}: dropped system-wide", Stage::DropCaches)?,
            Some(Ok(Scope::Files)) => {
                writeln!(out, "{}: dropped for the test files only", Stage::DropCaches)?
            }
            Some(Err(error)) => writeln!(out, "{}: FAILED ({})", Stage::DropCaches, error)?,
        }
        for result in reads {
            write_phase(out, result)?;
        }
        Ok(())
    }
}

fn write_phase(out: &mut impl io::Write, result: &PhaseResult) -> io::Result<()> {
    let secs = result.elapsed.as_secs_f64();
    let throughput = if secs > 0.0 {
        format!("{}/s", HumanBytes((result.bytes as f64 / secs) as u64))
    } else {
        "too fast to measure".to_string()
    };
    write!(
        out,
        "{}: {} in {:?} ({})",
        result.stage,
        HumanBytes(result.bytes),
        result.elapsed,
        throughput
    )?;
    if result.cache_unverified {
        write!(out, " [cache state unverified]")?;
    }
    writeln!(out)
}
