//! Command-line interface (spec.md §6).

use clap::Parser;
use std::path::PathBuf;

/// Calibrates an external simulator's parameters against one or more
/// weighted experiments, via Monte Carlo, grid sweep, or genetic search.
#[derive(Debug, Parser)]
#[command(name = "calibrator", version, about)]
pub struct Cli {
    /// XML calibration document describing the simulator, experiments,
    /// and variables to search over.
    pub input_document: PathBuf,

    /// Number of worker threads to evaluate trials with. Defaults to the
    /// number of available CPUs.
    #[arg(long, short = 'n')]
    pub nthreads: Option<usize>,

    /// Path to append search results to. Defaults to `<input>.result` in
    /// the input document's directory.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Keep scratch input/output/result files after each trial instead of
    /// deleting them.
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    pub fn n_threads(&self) -> usize {
        self.nthreads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(1)
        })
    }

    pub fn result_path(&self) -> PathBuf {
        match &self.output {
            Some(path) => path.clone(),
            None => {
                let mut path = self.input_document.clone();
                let file_name = path
                    .file_name()
                    .map(|s| format!("{}.result", s.to_string_lossy()))
                    .unwrap_or_else(|| "calibrate.result".to_string());
                path.set_file_name(file_name);
                path
            }
        }
    }
}
