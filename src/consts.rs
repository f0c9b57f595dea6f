//! Magic numbers and fixed strings shared across the crate.

/// Hard ceiling on the number of per-experiment input templates, per
/// spec.md §3. The simulator is always invoked with exactly this many
/// positional input arguments; unused slots pass the empty string.
pub const MAX_N_INPUTS: usize = 8;

/// Default `Variable::format` when the configuration document omits one.
pub const DEFAULT_FORMAT: &str = "%.14lg";

/// Default experiment weight when the configuration document omits one.
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// First line of the result file (spec.md §6).
pub const RESULT_HEADER: &str = "THE BEST IS";
