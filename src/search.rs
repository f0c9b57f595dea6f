//! Search context (spec.md §9 design note): owns everything one
//! calibration run needs so the CLI driver holds a single value instead
//! of threading config, RNG, and file handles through free functions.

use crate::best_n::{BestNRegister, SharedBestN};
use crate::config::{Algorithm, CalibrationSpec};
use crate::error::Result;
use crate::genetic::{BitstringKernel, GeneticKernel, VariableBits};
use crate::matrix::new_trial_matrix;
use crate::orchestrator::build_initial_matrix;
use crate::pool;
use crate::refine::contract_ranges;
use crate::result::ResultWriter;
use crate::transport::{LocalTransport, Transport};
use crate::trial::{LoadedTemplates, TrialRunner};
use log::info;
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Mutex;

/// Ties a [`CalibrationSpec`] together with the mutable state a search
/// accumulates across iterations: the RNG, the loaded templates, and the
/// result file handle.
pub struct Search {
    spec: CalibrationSpec,
    templates: LoadedTemplates,
    rng: StdRng,
    n_threads: usize,
    debug: bool,
}

impl Search {
    pub fn new(spec: CalibrationSpec, n_threads: usize, debug: bool) -> Result<Self> {
        let templates = LoadedTemplates::load(&spec.experiments)?;
        Ok(Self {
            spec,
            templates,
            rng: StdRng::from_entropy(),
            n_threads: n_threads.max(1),
            debug,
        })
    }

    /// Run the configured algorithm to completion and append every
    /// iteration's best candidate to `result_path`.
    pub fn run(&mut self, result_path: &std::path::Path) -> Result<BestNRegister> {
        let mut writer = ResultWriter::create(result_path)?;
        let transport = LocalTransport;

        if matches!(self.spec.algorithm, Algorithm::Genetic(_)) {
            self.run_genetic(&mut writer)
        } else {
            self.run_refined(&mut writer, &transport)
        }
    }

    fn run_refined(
        &mut self,
        writer: &mut ResultWriter,
        transport: &impl Transport,
    ) -> Result<BestNRegister> {
        let (n_iterations, n_best, tolerance) = match &self.spec.algorithm {
            Algorithm::MonteCarlo(opts) => (opts.n_iterations, opts.n_best, opts.tolerance),
            Algorithm::Sweep(opts) => (opts.n_iterations, opts.n_best, opts.tolerance),
            Algorithm::Genetic(_) => unreachable!(),
        };

        let mut register = BestNRegister::new(n_best);
        for iteration in 0..n_iterations {
            let matrix = build_initial_matrix(&self.spec, &mut self.rng);
            let shared = SharedBestN::new(n_best);
            pool::evaluate_iteration(
                &self.spec,
                &self.templates,
                &matrix,
                &shared,
                self.n_threads,
                self.debug,
            )?;
            let iteration_best = shared.into_inner();
            register.merge(&iteration_best);
            register = transport.exchange(register)?;

            let best = register
                .best()
                .expect("at least one trial must have completed this iteration")
                .clone();
            writer.write_iteration(iteration, &best, &self.spec.variables)?;
            info!(
                "iteration {iteration}: best error {:e}",
                best.error
            );

            contract_ranges(&mut self.spec.variables, register.entries(), tolerance);
        }
        Ok(register)
    }

    fn run_genetic(&mut self, writer: &mut ResultWriter) -> Result<BestNRegister> {
        let opts = match &self.spec.algorithm {
            Algorithm::Genetic(opts) => opts.clone(),
            _ => unreachable!(),
        };

        let descriptors: Vec<VariableBits> = self
            .spec
            .variables
            .iter()
            .map(|v| VariableBits {
                min: v.range_min,
                max: v.range_max,
                n_bits: v.n_bits.unwrap_or(0),
            })
            .collect();

        let runner = TrialRunner::new(&self.spec, &self.templates, self.debug);
        let n_experiments = self.spec.experiments.len();
        let first_error: Mutex<Option<crate::error::Error>> = Mutex::new(None);

        let objective = |id: u32, values: &[f64]| -> f64 {
            let id = id as usize;
            let mut matrix = new_trial_matrix(id + 1, values.len());
            for (j, &value) in values.iter().enumerate() {
                matrix[[id, j]] = value;
            }
            let mut total = 0.0;
            for e in 0..n_experiments {
                match runner.run(id, e, &matrix) {
                    Ok(value) => total += value,
                    Err(err) => {
                        let mut slot = first_error
                            .lock()
                            .expect("genetic objective error mutex poisoned");
                        if slot.is_none() {
                            *slot = Some(err);
                        }
                        return f64::INFINITY;
                    }
                }
            }
            total
        };

        let outcome = BitstringKernel.run(
            &descriptors,
            opts.n_population,
            opts.n_generations,
            opts.p_mutation,
            opts.p_reproduction,
            opts.p_adaptation,
            self.n_threads,
            &mut self.rng,
            objective,
        );

        if let Some(err) = first_error
            .into_inner()
            .expect("genetic objective error mutex poisoned")
        {
            return Err(err);
        }

        let mut register = BestNRegister::new(1);
        register.offer(outcome.error, Array1::from(outcome.values));
        let best = register
            .best()
            .expect("the genetic kernel always evaluates at least one generation")
            .clone();
        writer.write_iteration(0, &best, &self.spec.variables)?;
        info!("genetic search: best error {:e}", best.error);

        Ok(register)
    }
}
