//! Trial Runner (spec.md §4.2): materializes a trial's input files,
//! invokes the external simulator (and, optionally, evaluator), and
//! reads back the scalar error.

use crate::config::{CalibrationSpec, Experiment};
use crate::consts::MAX_N_INPUTS;
use crate::error::{Error, ErrorKind, Result};
use crate::matrix::TrialMatrix;
use crate::template::MappedTemplate;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Templates for every experiment, loaded once and held for the life of
/// the search (spec.md §3's `MappedTemplate` lifecycle).
pub struct LoadedTemplates {
    /// `per_experiment[e][k]` is the template for experiment `e`'s `k`-th
    /// input, or `None` if that template file did not exist at load time
    /// (spec.md §4.1: silently skipped, not an error).
    per_experiment: Vec<Vec<Option<MappedTemplate>>>,
}

impl LoadedTemplates {
    pub fn load(experiments: &[Experiment]) -> Result<Self> {
        let mut per_experiment = Vec::with_capacity(experiments.len());
        for experiment in experiments {
            let mut templates = Vec::with_capacity(experiment.templates.len());
            for path in &experiment.templates {
                templates.push(MappedTemplate::load(path)?);
            }
            per_experiment.push(templates);
        }
        Ok(Self { per_experiment })
    }
}

/// Removes scratch files on every exit path from [`TrialRunner::run`],
/// unless the runner is in debug mode (spec.md §4.2 step 5, §9's
/// "scoped cleanup guard" design note).
struct ScratchGuard<'a> {
    paths: Vec<PathBuf>,
    keep: bool,
    _marker: std::marker::PhantomData<&'a ()>,
}

impl<'a> ScratchGuard<'a> {
    fn new(keep: bool) -> Self {
        Self {
            paths: Vec::new(),
            keep,
            _marker: std::marker::PhantomData,
        }
    }
    fn track(&mut self, path: PathBuf) {
        self.paths.push(path);
    }
}

impl Drop for ScratchGuard<'_> {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        for path in &self.paths {
            let _ = fs::remove_file(path);
        }
    }
}

/// Evaluates the objective for one `(trial, experiment)` pair (spec.md
/// §4.2). Read-only over the `CalibrationSpec` and the loaded templates;
/// safe to share across worker threads.
pub struct TrialRunner<'a> {
    spec: &'a CalibrationSpec,
    templates: &'a LoadedTemplates,
    /// When true, scratch files are left on disk for post-mortem
    /// inspection instead of being removed after each trial.
    debug: bool,
}

impl<'a> TrialRunner<'a> {
    pub fn new(spec: &'a CalibrationSpec, templates: &'a LoadedTemplates, debug: bool) -> Self {
        Self {
            spec,
            templates,
            debug,
        }
    }

    /// Run trial `s`, experiment `e`, returning `weight * raw_error`.
    pub fn run(&self, s: usize, e: usize, matrix: &TrialMatrix) -> Result<f64> {
        let experiment = &self.spec.experiments[e];
        let templates = &self.templates.per_experiment[e];
        let mut guard = ScratchGuard::new(self.debug);

        let mut input_paths: Vec<Option<PathBuf>> = Vec::with_capacity(templates.len());
        for (k, template) in templates.iter().enumerate() {
            match template {
                Some(template) => {
                    let path = self.scratch_path("in", Some(k), s, e);
                    template.render_to(&path, matrix.row(s), &self.spec.variables)?;
                    guard.track(path.clone());
                    input_paths.push(Some(path));
                }
                None => input_paths.push(None),
            }
        }

        let output_path = self.scratch_path("out", None, s, e);
        guard.track(output_path.clone());

        self.invoke_simulator(&input_paths, &output_path)?;

        let raw_error = if let Some(evaluator) = &self.spec.evaluator {
            let result_path = self.scratch_path("result", None, s, e);
            guard.track(result_path.clone());
            self.invoke_evaluator(evaluator, &output_path, &experiment.data_path, &result_path)?;
            read_first_number(&result_path, ErrorKind::Parse)?
        } else {
            read_first_number(&output_path, ErrorKind::Parse)?
        };

        Ok(raw_error * experiment.weight)
    }

    /// Compose a scratch path unique to `(role, input_index, trial, experiment)`
    /// (spec.md §4.2's uniqueness rule).
    fn scratch_path(&self, role: &str, k: Option<usize>, s: usize, e: usize) -> PathBuf {
        let name = match k {
            Some(k) => format!("calib_{role}{k}_s{s}_e{e}.tmp"),
            None => format!("calib_{role}_s{s}_e{e}.tmp"),
        };
        self.spec.working_dir.join(name)
    }

    fn invoke_simulator(&self, inputs: &[Option<PathBuf>], output: &Path) -> Result<()> {
        let mut args: Vec<OsString> = Vec::with_capacity(MAX_N_INPUTS + 1);
        for i in 0..MAX_N_INPUTS {
            let arg = match inputs.get(i) {
                Some(Some(path)) => path.clone().into_os_string(),
                _ => OsString::new(),
            };
            args.push(arg);
        }
        args.push(output.as_os_str().to_os_string());

        let status_output = Command::new(&self.spec.simulator)
            .args(&args)
            .output()
            .map_err(|e| Error::io(ErrorKind::Simulator, e))?;
        if !status_output.status.success() {
            return Err(Error::process(ErrorKind::Simulator, status_output));
        }
        Ok(())
    }

    fn invoke_evaluator(
        &self,
        evaluator: &Path,
        output: &Path,
        data_path: &Path,
        result: &Path,
    ) -> Result<()> {
        let status_output = Command::new(evaluator)
            .arg(output)
            .arg(data_path)
            .arg(result)
            .output()
            .map_err(|e| Error::io(ErrorKind::Evaluator, e))?;
        if !status_output.status.success() {
            return Err(Error::process(ErrorKind::Evaluator, status_output));
        }
        Ok(())
    }
}

fn read_first_number(path: &Path, kind: ErrorKind) -> Result<f64> {
    let contents = fs::read_to_string(path).map_err(|e| Error::io(kind, e))?;
    let first_line = contents.lines().next().unwrap_or("").trim();
    first_line.parse::<f64>().map_err(|_| {
        Error::message(
            kind,
            format!("could not parse {path:?} first line as f64: {first_line:?}"),
        )
    })
}
