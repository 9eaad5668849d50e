//! Runs the demo kernel table over a SEQ vector set, or generates one.
//!
//! ```sh
//! testeng --brief --vectors /tmp/vectors --generate
//! testeng --brief --vectors /tmp/vectors --verbose vec_add fft
//! ```

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use testeng::{EngineConfig, TestEngine};
use testeng_seq::{VectorDirs, VectorSet};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod catalog;
mod kernels;

#[derive(Parser, Debug)]
#[command(name = "testeng", about = "Run DSP kernel tests from SEQ test-vector files")]
struct Args {
    /// Use the brief vector set.
    #[arg(long, group = "set")]
    brief: bool,

    /// Use the full vector set.
    #[arg(long, group = "set")]
    full: bool,

    /// Use the sanity vector set (default).
    #[arg(long, group = "set")]
    sanity: bool,

    /// Print a line per test case and keep going after failed cases.
    #[arg(short, long)]
    verbose: bool,

    /// Stop after the first failing file.
    #[arg(long)]
    break_on_error: bool,

    /// Directory holding the vec_brief, vec_full and vec_sanity roots.
    #[arg(long, default_value = ".")]
    vectors: PathBuf,

    /// Suffix appended to the brief and full root names.
    #[arg(long)]
    package_suffix: Option<String>,

    /// Write the demo vector set instead of running it.
    #[arg(long)]
    generate: bool,

    /// Seed for generated vectors.
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Run only files or functions whose name contains one of these.
    filters: Vec<String>,
}

impl Args {
    fn vector_set(&self) -> VectorSet {
        if self.brief {
            VectorSet::Brief
        } else if self.full {
            VectorSet::Full
        } else {
            VectorSet::Sanity
        }
    }

    fn dirs(&self) -> VectorDirs {
        let dirs = VectorDirs::under(&self.vectors);
        match &self.package_suffix {
            Some(suffix) => dirs.with_package_suffix(suffix.clone()),
            None => dirs,
        }
    }
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();
    let args = Args::parse();
    let set = args.vector_set();

    if args.generate {
        let dirs = args.dirs();
        let written = catalog::generate(&dirs, set, args.seed)?;
        println!("wrote {written} SEQ files to {}", dirs.root(set).display());
        return Ok(ExitCode::SUCCESS);
    }

    let config = EngineConfig {
        vector_set: set,
        dirs: args.dirs(),
        verbose: args.verbose,
        break_on_error: args.break_on_error,
        ..Default::default()
    };
    info!(set = %set, root = %config.dirs.root(set).display(), "running demo table");
    let mut engine = TestEngine::new(config);
    let report = catalog::suite().run(&mut engine, &args.filters);
    println!("{report}");

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
