//! Genetic algorithm kernel (spec.md §4.6, §6): a binary-encoded, single
//! objective genetic search, exposed through the pluggable `objective`
//! callback interface spec.md §6 names — the orchestrator never reaches
//! into genome internals, only into [`VariableBits`] descriptors and
//! [`GeneticOutcome`]s.
//!
//! Kept as a self-contained module rather than built on a Pareto-front
//! crate: the search here is single-objective (minimize total weighted
//! error), so the multi-objective machinery those crates provide would
//! be pure overhead. Selection/crossover/mutation are still split into
//! distinct operations the way such a crate's traits are shaped.

use crate::config::GeneticOptions;
use crate::pool;
use rand::Rng;

/// Per-variable `(min, max, n_bits)` triple handed to the genetic kernel
/// (spec.md GLOSSARY, "Genetic descriptor"). Deliberately decoupled from
/// [`crate::config::Variable`]: the kernel only ever needs the numeric
/// encoding, never a variable's name or display format.
#[derive(Debug, Clone, Copy)]
pub struct VariableBits {
    pub min: f64,
    pub max: f64,
    pub n_bits: u8,
}

/// What [`GeneticKernel::run`] returns: the best genome found across all
/// generations, its decoded parameter vector, and its error (spec.md §6).
#[derive(Debug, Clone)]
pub struct GeneticOutcome {
    pub genome: Vec<bool>,
    pub values: Vec<f64>,
    pub error: f64,
}

/// The boundary spec.md §6 draws around the genetic search: callers
/// supply per-variable descriptors, population/generation counts, and an
/// `objective` callback; the kernel owns everything about selection,
/// crossover, and mutation on the other side of that boundary.
pub trait GeneticKernel {
    /// Run the search to completion. `objective` is invoked once per
    /// candidate per generation with that candidate's population id and
    /// decoded parameter vector, and must return its (lower-is-better)
    /// scalar error; since it may be called concurrently across a
    /// generation's population, it must be `Sync`.
    fn run<R: Rng>(
        &self,
        descriptors: &[VariableBits],
        n_population: usize,
        n_generations: usize,
        p_mutation: f64,
        p_reproduction: f64,
        p_adaptation: f64,
        n_threads: usize,
        rng: &mut R,
        objective: impl Fn(u32, &[f64]) -> f64 + Sync,
    ) -> GeneticOutcome;
}

/// A single candidate solution: one contiguous bitstring, the
/// concatenation of each variable's fixed-width encoding in variable
/// order.
#[derive(Debug, Clone)]
struct Genome {
    bits: Vec<bool>,
}

impl Genome {
    fn random(layout: &Layout, rng: &mut impl Rng) -> Self {
        let bits = (0..layout.total_bits).map(|_| rng.gen_bool(0.5)).collect();
        Self { bits }
    }

    /// Decode into one row of real-valued parameters, linearly mapping
    /// each variable's unsigned bitstring value onto `[min, max]`.
    fn decode(&self, layout: &Layout, descriptors: &[VariableBits]) -> Vec<f64> {
        let mut out = Vec::with_capacity(descriptors.len());
        let mut offset = 0;
        for (descriptor, &n_bits) in descriptors.iter().zip(&layout.bits_per_variable) {
            let slice = &self.bits[offset..offset + n_bits];
            out.push(decode_slice(slice, descriptor));
            offset += n_bits;
        }
        out
    }
}

fn decode_slice(bits: &[bool], descriptor: &VariableBits) -> f64 {
    let mut value: u64 = 0;
    for &bit in bits {
        value = (value << 1) | u64::from(bit);
    }
    let max_value = if bits.len() >= 64 {
        u64::MAX
    } else {
        (1u64 << bits.len()) - 1
    };
    let fraction = if max_value == 0 {
        0.0
    } else {
        value as f64 / max_value as f64
    };
    descriptor.min + fraction * (descriptor.max - descriptor.min)
}

/// Per-variable bit widths and their cumulative layout within a
/// [`Genome`], computed once per search.
struct Layout {
    bits_per_variable: Vec<usize>,
    total_bits: usize,
}

impl Layout {
    fn new(descriptors: &[VariableBits]) -> Self {
        let bits_per_variable: Vec<usize> = descriptors.iter().map(|d| d.n_bits as usize).collect();
        let total_bits = bits_per_variable.iter().sum();
        Self {
            bits_per_variable,
            total_bits,
        }
    }
}

/// A generation: one genome per individual.
struct Population {
    genomes: Vec<Genome>,
}

impl Population {
    fn random(layout: &Layout, n: usize, rng: &mut impl Rng) -> Self {
        Self {
            genomes: (0..n).map(|_| Genome::random(layout, rng)).collect(),
        }
    }
}

/// Counts derived from [`GeneticOptions`] per spec.md §3's population
/// invariant: `n_mutation + n_reproduction + n_adaptation <= n - 2`, the
/// remainder surviving as unmodified elites.
struct Quotas {
    n_mutation: usize,
    n_reproduction: usize,
    n_adaptation: usize,
    n_elite: usize,
}

impl Quotas {
    fn from_options(options: &GeneticOptions) -> Self {
        let n = options.n_population as f64;
        let n_mutation = (options.p_mutation * n).floor() as usize;
        let n_reproduction = (options.p_reproduction * n).floor() as usize;
        let n_adaptation = (options.p_adaptation * n).floor() as usize;
        let n_elite = options
            .n_population
            .saturating_sub(n_mutation + n_reproduction + n_adaptation);
        Self {
            n_mutation,
            n_reproduction,
            n_adaptation,
            n_elite,
        }
    }
}

/// Advance one generation. `ranked` must already be sorted ascending by
/// fitness (best first).
fn next_generation(
    ranked: &[Genome],
    options: &GeneticOptions,
    layout: &Layout,
    rng: &mut impl Rng,
) -> Population {
    let quotas = Quotas::from_options(options);
    let mut genomes = Vec::with_capacity(options.n_population);

    genomes.extend(ranked.iter().take(quotas.n_elite).cloned());

    for _ in 0..quotas.n_mutation {
        let parent = tournament_select(ranked, rng);
        genomes.push(mutate(parent, rng));
    }

    while genomes.len() < quotas.n_elite + quotas.n_mutation + quotas.n_reproduction {
        let a = tournament_select(ranked, rng);
        let b = tournament_select(ranked, rng);
        let (c1, c2) = crossover(a, b, rng);
        genomes.push(c1);
        if genomes.len() < quotas.n_elite + quotas.n_mutation + quotas.n_reproduction {
            genomes.push(c2);
        }
    }

    let best = ranked.first();
    for _ in 0..quotas.n_adaptation {
        if let Some(best) = best {
            genomes.push(mutate(best, rng));
        }
    }

    while genomes.len() < options.n_population {
        genomes.push(Genome::random(layout, rng));
    }
    genomes.truncate(options.n_population);

    Population { genomes }
}

/// Binary tournament selection: draw two individuals uniformly and keep
/// the better-ranked one.
fn tournament_select<'a>(ranked: &'a [Genome], rng: &mut impl Rng) -> &'a Genome {
    let i = rng.gen_range(0..ranked.len());
    let j = rng.gen_range(0..ranked.len());
    if i <= j {
        &ranked[i]
    } else {
        &ranked[j]
    }
}

fn crossover(a: &Genome, b: &Genome, rng: &mut impl Rng) -> (Genome, Genome) {
    let n = a.bits.len();
    if n < 2 {
        return (a.clone(), b.clone());
    }
    let point = rng.gen_range(1..n);
    let mut c1 = a.bits[..point].to_vec();
    c1.extend_from_slice(&b.bits[point..]);
    let mut c2 = b.bits[..point].to_vec();
    c2.extend_from_slice(&a.bits[point..]);
    (Genome { bits: c1 }, Genome { bits: c2 })
}

fn mutate(genome: &Genome, rng: &mut impl Rng) -> Genome {
    let mut bits = genome.bits.clone();
    if !bits.is_empty() {
        let i = rng.gen_range(0..bits.len());
        bits[i] = !bits[i];
    }
    Genome { bits }
}

/// The kernel implementation this crate ships: fixed-width bitstrings,
/// binary tournament selection, single-point crossover, single-bit-flip
/// mutation (spec.md §4.6.3).
pub struct BitstringKernel;

impl GeneticKernel for BitstringKernel {
    fn run<R: Rng>(
        &self,
        descriptors: &[VariableBits],
        n_population: usize,
        n_generations: usize,
        p_mutation: f64,
        p_reproduction: f64,
        p_adaptation: f64,
        n_threads: usize,
        rng: &mut R,
        objective: impl Fn(u32, &[f64]) -> f64 + Sync,
    ) -> GeneticOutcome {
        let options = GeneticOptions {
            n_population,
            n_generations,
            p_mutation,
            p_reproduction,
            p_adaptation,
        };
        let layout = Layout::new(descriptors);
        let mut population = Population::random(&layout, n_population, rng);
        let mut best: Option<GeneticOutcome> = None;

        for _ in 0..n_generations {
            let decoded: Vec<Vec<f64>> = population
                .genomes
                .iter()
                .map(|g| g.decode(&layout, descriptors))
                .collect();
            let fitnesses = pool::parallel_map(decoded.len(), n_threads, |id| {
                objective(id as u32, &decoded[id])
            });

            let mut order: Vec<usize> = (0..fitnesses.len()).collect();
            order.sort_by(|&a, &b| fitnesses[a].partial_cmp(&fitnesses[b]).unwrap());

            let top = order[0];
            if best.as_ref().map_or(true, |b| fitnesses[top] < b.error) {
                best = Some(GeneticOutcome {
                    genome: population.genomes[top].bits.clone(),
                    values: decoded[top].clone(),
                    error: fitnesses[top],
                });
            }

            let ranked: Vec<Genome> = order
                .iter()
                .map(|&i| population.genomes[i].clone())
                .collect();
            population = next_generation(&ranked, &options, &layout, rng);
        }

        best.expect("n_generations >= 1 guarantees at least one evaluated generation")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn descriptor(min: f64, max: f64, n_bits: u8) -> VariableBits {
        VariableBits { min, max, n_bits }
    }

    #[test]
    fn decode_extremes() {
        let descriptors = vec![descriptor(0.0, 10.0, 4)];
        let layout = Layout::new(&descriptors);
        let low = Genome {
            bits: vec![false; 4],
        };
        let high = Genome {
            bits: vec![true; 4],
        };
        assert_eq!(low.decode(&layout, &descriptors), vec![0.0]);
        assert_eq!(high.decode(&layout, &descriptors), vec![10.0]);
    }

    #[test]
    fn next_generation_has_correct_size() {
        let descriptors = vec![descriptor(0.0, 1.0, 8)];
        let layout = Layout::new(&descriptors);
        let options = GeneticOptions {
            n_population: 10,
            n_generations: 5,
            p_mutation: 0.2,
            p_reproduction: 0.5,
            p_adaptation: 0.1,
        };
        let mut rng = StdRng::seed_from_u64(42);
        let population = Population::random(&layout, options.n_population, &mut rng);
        let next = next_generation(&population.genomes, &options, &layout, &mut rng);
        assert_eq!(next.genomes.len(), options.n_population);
    }

    #[test]
    fn crossover_preserves_length() {
        let mut rng = StdRng::seed_from_u64(1);
        let a = Genome {
            bits: vec![true, true, false, false],
        };
        let b = Genome {
            bits: vec![false, false, true, true],
        };
        let (c1, c2) = crossover(&a, &b, &mut rng);
        assert_eq!(c1.bits.len(), 4);
        assert_eq!(c2.bits.len(), 4);
    }

    #[test]
    fn kernel_minimizes_a_simple_quadratic() {
        let descriptors = vec![descriptor(-1.0, 1.0, 10)];
        let mut rng = StdRng::seed_from_u64(7);
        let outcome = BitstringKernel.run(
            &descriptors,
            24,
            30,
            0.2,
            0.4,
            0.1,
            1,
            &mut rng,
            |_, values| (values[0] - 0.5).powi(2),
        );
        assert!((outcome.values[0] - 0.5).abs() < 0.1, "{:?}", outcome.values);
        assert!(outcome.error < 0.01, "{}", outcome.error);
    }
}
