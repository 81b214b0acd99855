use anyhow::Context;
use clap::Parser;
use indicatif::ProgressStyle;
use std::{io::Write, num::NonZeroUsize, path::PathBuf};
use tracing::{info, warn};
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[macro_use]
extern crate lazy_static;

mod cache;
mod copier;
mod error;
mod files;
#[cfg(target_os = "linux")]
mod linux;
#[cfg(not(target_os = "linux"))]
mod other_os;
mod report;
mod runner;
mod size;
mod source;
mod verify;

use cache::{OsCacheControl, DROP_CACHES_PATH};
use copier::{ChunkCopier, DEFAULT_CHUNK_SIZE};
use files::TestFiles;
use runner::Runner;
use size::ByteSize;

/// Times sequential writes and reads of zero-filled and random files,
/// with the page cache dropped in between.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Size of each test file, in bytes or with a suffix (4K, 64KiB, 1M, 2G).
    size: ByteSize,

    /// Number of bytes moved per read/write call.
    #[clap(long, default_value_t = ByteSize(DEFAULT_CHUNK_SIZE))]
    chunk_size: ByteSize,

    /// Directory to create the test files in.
    #[clap(long, default_value = ".")]
    dir: PathBuf,

    /// Leave the test files on disk after the run.
    #[clap(long)]
    keep: bool,

    /// Hash each file and its read-back copy and fail if they differ.
    #[clap(long)]
    verify: bool,

    /// Exit with an error if the page cache could not be dropped.
    ///
    /// Without this, read timings are reported anyway and marked as
    /// unverified.
    #[clap(long)]
    require_cache_drop: bool,

    /// Kernel control file used to drop the page cache.
    #[clap(long, hide = true, default_value = DROP_CACHES_PATH)]
    drop_caches_path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let indicatif_layer = IndicatifLayer::new();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(indicatif_layer.get_stderr_writer()))
        .with(indicatif_layer)
        .init();
    let args = Args::parse();

    let chunk_size = usize::try_from(args.chunk_size.0)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| anyhow::anyhow!("Chunk size {} is not addressable", args.chunk_size))?;
    if args.chunk_size.0 > args.size.0 {
        warn!(
            chunk_size = %args.chunk_size,
            size = %args.size,
            "Chunk size exceeds the file size; every phase is a single transfer"
        );
    }

    info!(size = %args.size, chunk_size = %args.chunk_size, dir = ?args.dir, "Starting benchmark");
    let files = TestFiles::in_dir(&args.dir, args.size.0, args.keep);
    let runner = Runner::new(
        files,
        ChunkCopier::new(chunk_size),
        OsCacheControl::new(&args.drop_caches_path),
    );
    let report = runner.run();

    {
        let mut stdout = std::io::stdout().lock();
        report.write_to(&mut stdout).context("Printing the report")?;
        stdout.flush().context("Printing the report")?;
    }

    let verified = report.cache_verified();
    if let Some(failure) = report.failure {
        return Err(failure).context("Benchmark aborted");
    }
    if args.verify {
        let files = &report.files;
        verify::same_contents(&files.zero, &files.zero_read).context("Verifying the zero file")?;
        verify::same_contents(&files.random, &files.random_read)
            .context("Verifying the random file")?;
    }
    if args.require_cache_drop && !verified {
        anyhow::bail!("The page cache could not be dropped; read timings are unverified");
    }
    Ok(())
}

lazy_static! {
    pub(crate) static ref PROGRESS_STYLE: ProgressStyle = ProgressStyle::with_template(
        "[{elapsed_precise}] {bar:40.white/grey} {bytes}/{total_bytes} ({bytes_per_sec}, ETA {eta_precise}) {msg}",
    ).expect("Internal error in indicatif progress bar template syntax");
}
