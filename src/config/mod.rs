//! Typed representation of the calibration document (spec.md §3) and the
//! invariants it must satisfy before a search can start.

pub mod reader;

use crate::consts::{DEFAULT_FORMAT, DEFAULT_WEIGHT, MAX_N_INPUTS};
use crate::error::{Error, Result};
use crate::format::NumberFormat;
use std::path::PathBuf;

/// The parsed calibration document: the root of everything the search
/// driver needs.
#[derive(Debug, Clone)]
pub struct CalibrationSpec {
    pub simulator: PathBuf,
    pub evaluator: Option<PathBuf>,
    pub algorithm: Algorithm,
    pub experiments: Vec<Experiment>,
    pub variables: Vec<Variable>,
    pub working_dir: PathBuf,
    pub document_name: String,
}

/// Per-algorithm-family options, tagged per spec.md §3 and §9's design
/// note (matched once before the refinement loop rather than dispatched
/// through a function pointer).
#[derive(Debug, Clone)]
pub enum Algorithm {
    MonteCarlo(MonteCarloOptions),
    Sweep(SweepOptions),
    Genetic(GeneticOptions),
}

#[derive(Debug, Clone)]
pub struct MonteCarloOptions {
    pub n_simulations: usize,
    pub n_iterations: usize,
    pub n_best: usize,
    pub tolerance: f64,
}

#[derive(Debug, Clone)]
pub struct SweepOptions {
    pub n_iterations: usize,
    pub n_best: usize,
    pub tolerance: f64,
}

#[derive(Debug, Clone)]
pub struct GeneticOptions {
    pub n_population: usize,
    pub n_generations: usize,
    pub p_mutation: f64,
    pub p_reproduction: f64,
    pub p_adaptation: f64,
}

impl Algorithm {
    /// `true` for the two families the Iterative Refiner drives
    /// (spec.md §4.7: "the genetic path does NOT participate").
    pub fn refines(&self) -> bool {
        !matches!(self, Algorithm::Genetic(_))
    }
}

/// A single ground-truth case; contributes one weighted error term to the
/// trial's total (spec.md §3, GLOSSARY).
#[derive(Debug, Clone)]
pub struct Experiment {
    pub data_path: PathBuf,
    pub weight: f64,
    pub templates: Vec<PathBuf>,
}

impl Experiment {
    pub fn n_inputs(&self) -> usize {
        self.templates.len()
    }
}

/// One calibrated parameter and the bounds/format it is searched and
/// rendered with.
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub range_min: f64,
    pub range_max: f64,
    pub abs_min: f64,
    pub abs_max: f64,
    pub format: String,
    /// Sweep only: number of grid points along this axis.
    pub n_sweeps: Option<usize>,
    /// Genetic only: width of this variable's bitstring encoding.
    pub n_bits: Option<u8>,
}

impl Variable {
    pub(crate) fn number_format(&self) -> Result<NumberFormat> {
        NumberFormat::parse(&self.format)
    }

    pub fn render(&self, value: f64) -> Result<String> {
        Ok(self.number_format()?.render(value))
    }
}

impl CalibrationSpec {
    /// Check every invariant named in spec.md §3. Called once, immediately
    /// after parsing, before any trial runs.
    pub fn validate(&self) -> Result<()> {
        if self.experiments.is_empty() {
            return Err(Error::config("at least one experiment is required"));
        }
        if self.variables.is_empty() {
            return Err(Error::config("at least one variable is required"));
        }

        let n_inputs = self.experiments[0].n_inputs();
        if n_inputs == 0 || n_inputs > MAX_N_INPUTS {
            return Err(Error::config(format!(
                "experiment template count must be in 1..={MAX_N_INPUTS}, got {n_inputs}"
            )));
        }
        for (i, experiment) in self.experiments.iter().enumerate() {
            if experiment.n_inputs() != n_inputs {
                return Err(Error::config(format!(
                    "experiment {i} has {} templates, expected {n_inputs} (must match the first experiment)",
                    experiment.n_inputs()
                )));
            }
        }

        for variable in &self.variables {
            if variable.range_min < variable.abs_min {
                return Err(Error::config(format!(
                    "variable {:?}: range_min {} is below abs_min {}",
                    variable.name, variable.range_min, variable.abs_min
                )));
            }
            if variable.range_max > variable.abs_max {
                return Err(Error::config(format!(
                    "variable {:?}: range_max {} is above abs_max {}",
                    variable.name, variable.range_max, variable.abs_max
                )));
            }
            if variable.range_min > variable.range_max {
                return Err(Error::config(format!(
                    "variable {:?}: range_min {} exceeds range_max {}",
                    variable.name, variable.range_min, variable.range_max
                )));
            }
            variable.number_format()?;
        }

        match &self.algorithm {
            Algorithm::MonteCarlo(opts) => {
                if opts.n_simulations < 1 {
                    return Err(Error::config("n_simulations must be >= 1"));
                }
                validate_refined_common(opts.n_iterations, opts.n_best, opts.tolerance)?;
            }
            Algorithm::Sweep(opts) => {
                for variable in &self.variables {
                    match variable.n_sweeps {
                        Some(n) if n >= 1 => (),
                        _ => {
                            return Err(Error::config(format!(
                                "variable {:?}: sweep requires n_sweeps >= 1",
                                variable.name
                            )))
                        }
                    }
                }
                validate_refined_common(opts.n_iterations, opts.n_best, opts.tolerance)?;
            }
            Algorithm::Genetic(opts) => {
                if opts.n_population < 3 {
                    return Err(Error::config("n_population must be >= 3"));
                }
                if opts.n_generations < 1 {
                    return Err(Error::config("n_generations must be >= 1"));
                }
                for (label, p) in [
                    ("p_mutation", opts.p_mutation),
                    ("p_reproduction", opts.p_reproduction),
                    ("p_adaptation", opts.p_adaptation),
                ] {
                    if !(0.0..1.0).contains(&p) {
                        return Err(Error::config(format!("{label} must be in [0, 1)")));
                    }
                }
                let n = opts.n_population as f64;
                let used = (opts.p_mutation * n).floor() as usize
                    + (opts.p_reproduction * n).floor() as usize
                    + (opts.p_adaptation * n).floor() as usize;
                if used > opts.n_population.saturating_sub(2) {
                    return Err(Error::config(
                        "floor(p_mutation*N)+floor(p_reproduction*N)+floor(p_adaptation*N) must be <= N-2",
                    ));
                }
                for variable in &self.variables {
                    match variable.n_bits {
                        Some(b) if (1..=64).contains(&b) => (),
                        _ => {
                            return Err(Error::config(format!(
                                "variable {:?}: genetic requires n_bits in 1..=64",
                                variable.name
                            )))
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Total trial count for one pass of the inner algorithm: the product
    /// of per-variable grid sizes for sweep, `n_simulations` for
    /// Monte-Carlo, `n_population` for genetic (spec.md §3).
    pub fn n_simulations(&self) -> usize {
        match &self.algorithm {
            Algorithm::MonteCarlo(opts) => opts.n_simulations,
            Algorithm::Sweep(_) => self
                .variables
                .iter()
                .map(|v| v.n_sweeps.unwrap_or(1))
                .product(),
            Algorithm::Genetic(opts) => opts.n_population,
        }
    }
}

fn validate_refined_common(n_iterations: usize, n_best: usize, tolerance: f64) -> Result<()> {
    if n_iterations < 1 {
        return Err(Error::config("n_iterations must be >= 1"));
    }
    if n_best < 1 {
        return Err(Error::config("n_best must be >= 1"));
    }
    if tolerance < 0.0 {
        return Err(Error::config("tolerance must be >= 0"));
    }
    Ok(())
}

impl Default for Variable {
    fn default() -> Self {
        Self {
            name: String::new(),
            range_min: 0.0,
            range_max: 0.0,
            abs_min: f64::NEG_INFINITY,
            abs_max: f64::INFINITY,
            format: DEFAULT_FORMAT.to_string(),
            n_sweeps: None,
            n_bits: None,
        }
    }
}

impl Experiment {
    pub(crate) fn with_weight_default(data_path: PathBuf, templates: Vec<PathBuf>) -> Self {
        Self {
            data_path,
            weight: DEFAULT_WEIGHT,
            templates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variable(name: &str, min: f64, max: f64) -> Variable {
        Variable {
            name: name.to_string(),
            range_min: min,
            range_max: max,
            ..Variable::default()
        }
    }

    fn spec_with(algorithm: Algorithm, variables: Vec<Variable>) -> CalibrationSpec {
        CalibrationSpec {
            simulator: PathBuf::from("sim"),
            evaluator: None,
            algorithm,
            experiments: vec![Experiment::with_weight_default(
                PathBuf::from("data"),
                vec![PathBuf::from("template1")],
            )],
            variables,
            working_dir: PathBuf::from("."),
            document_name: "doc".to_string(),
        }
    }

    #[test]
    fn rejects_range_outside_absolute_bounds() {
        let mut v = variable("x", -1.0, 5.0);
        v.abs_min = 0.0;
        v.abs_max = 10.0;
        let spec = spec_with(
            Algorithm::MonteCarlo(MonteCarloOptions {
                n_simulations: 10,
                n_iterations: 1,
                n_best: 1,
                tolerance: 0.0,
            }),
            vec![v],
        );
        assert!(spec.validate().is_err());
    }

    #[test]
    fn rejects_mismatched_template_counts() {
        let mut spec = spec_with(
            Algorithm::MonteCarlo(MonteCarloOptions {
                n_simulations: 10,
                n_iterations: 1,
                n_best: 1,
                tolerance: 0.0,
            }),
            vec![variable("x", 0.0, 1.0)],
        );
        spec.experiments.push(Experiment::with_weight_default(
            PathBuf::from("data2"),
            vec![PathBuf::from("t1"), PathBuf::from("t2")],
        ));
        assert!(spec.validate().is_err());
    }

    #[test]
    fn genetic_population_invariant() {
        let spec = spec_with(
            Algorithm::Genetic(GeneticOptions {
                n_population: 10,
                n_generations: 5,
                p_mutation: 0.5,
                p_reproduction: 0.4,
                p_adaptation: 0.2,
            }),
            vec![Variable {
                n_bits: Some(8),
                ..variable("x", 0.0, 1.0)
            }],
        );
        // floor(5)+floor(4)+floor(2) = 11 > 10-2
        assert!(spec.validate().is_err());
    }

    #[test]
    fn sweep_trial_count_is_product() {
        let spec = spec_with(
            Algorithm::Sweep(SweepOptions {
                n_iterations: 1,
                n_best: 1,
                tolerance: 0.0,
            }),
            vec![
                Variable {
                    n_sweeps: Some(2),
                    ..variable("x", 0.0, 1.0)
                },
                Variable {
                    n_sweeps: Some(3),
                    ..variable("y", 0.0, 1.0)
                },
            ],
        );
        assert_eq!(spec.n_simulations(), 6);
    }
}
