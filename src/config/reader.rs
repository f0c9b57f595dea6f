//! Configuration Reader (spec.md §4.8): parses the XML-flavored
//! calibration document into a [`CalibrationSpec`].
//!
//! The schema is walked by hand, as the teacher's `parser/` module walks
//! `pest` pairs by hand, rather than derived via `serde`: the "experiments
//! then variables, first non-experiment child ends the experiment list"
//! rule (spec.md §4.8) is a positional grammar a plain `#[derive]` cannot
//! express.

use super::{Algorithm, CalibrationSpec, Experiment, GeneticOptions, MonteCarloOptions, Variable};
use crate::consts::{DEFAULT_FORMAT, DEFAULT_WEIGHT, MAX_N_INPUTS};
use crate::error::{Error, Result};
use roxmltree::{Document, Node};
use std::path::{Path, PathBuf};

/// Parse the document at `path` into a validated [`CalibrationSpec`].
pub fn read(path: &Path) -> Result<CalibrationSpec> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::io(crate::error::ErrorKind::Config, e))?;
    let spec = parse_str(&text, path)?;
    spec.validate()?;
    Ok(spec)
}

/// Parse an already-read document. Split out from [`read`] so tests can
/// exercise the parser without touching the filesystem.
pub fn parse_str(text: &str, path: &Path) -> Result<CalibrationSpec> {
    let doc = Document::parse(text).map_err(|e| Error::config(format!("malformed document: {e}")))?;
    let root = doc.root_element();
    if root.tag_name().name() != "calibrate" {
        return Err(Error::config(format!(
            "root element must be <calibrate>, found <{}>",
            root.tag_name().name()
        )));
    }

    let simulator = PathBuf::from(required_attr(&root, "simulator")?);
    let evaluator = root.attribute("evaluator").map(PathBuf::from);

    let mut experiments = Vec::new();
    let mut variables = Vec::new();
    let mut n_inputs: Option<usize> = None;
    let mut reading_experiments = true;

    for child in root.children().filter(Node::is_element) {
        if reading_experiments && child.tag_name().name() == "experiment" {
            let experiment = parse_experiment(&child, n_inputs)?;
            n_inputs = Some(experiment.n_inputs());
            experiments.push(experiment);
        } else {
            reading_experiments = false;
            if child.tag_name().name() != "variable" {
                return Err(Error::config(format!(
                    "unexpected element <{}> after experiments",
                    child.tag_name().name()
                )));
            }
            variables.push(parse_variable(&child)?);
        }
    }

    let algorithm = parse_algorithm(&root)?;

    let working_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let document_name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "calibrate.xml".to_string());

    Ok(CalibrationSpec {
        simulator,
        evaluator,
        algorithm,
        experiments,
        variables,
        working_dir,
        document_name,
    })
}

fn parse_algorithm(root: &Node) -> Result<Algorithm> {
    let name = root.attribute("algorithm").unwrap_or("MonteCarlo");
    match name {
        "MonteCarlo" => Ok(Algorithm::MonteCarlo(MonteCarloOptions {
            n_simulations: attr_usize(root, "nsimulations")?,
            n_iterations: attr_usize(root, "niterations")?,
            n_best: attr_usize(root, "nbest")?,
            tolerance: attr_f64(root, "tolerance")?,
        })),
        "sweep" => Ok(Algorithm::Sweep(super::SweepOptions {
            n_iterations: attr_usize(root, "niterations")?,
            n_best: attr_usize(root, "nbest")?,
            tolerance: attr_f64(root, "tolerance")?,
        })),
        "genetic" => Ok(Algorithm::Genetic(GeneticOptions {
            n_population: attr_usize(root, "npopulation")?,
            n_generations: attr_usize(root, "ngenerations")?,
            p_mutation: attr_f64(root, "mutation")?,
            p_reproduction: attr_f64(root, "reproduction")?,
            p_adaptation: attr_f64(root, "adaptation")?,
        })),
        other => Err(Error::config(format!(
            "unknown algorithm {other:?}; expected MonteCarlo, sweep, or genetic"
        ))),
    }
}

fn parse_experiment(node: &Node, expected_n_inputs: Option<usize>) -> Result<Experiment> {
    let data_path = PathBuf::from(required_attr(node, "name")?);
    let weight = node
        .attribute("weight")
        .map(|s| parse_f64(s, "weight"))
        .transpose()?
        .unwrap_or(DEFAULT_WEIGHT);

    let mut templates = Vec::new();
    for i in 1..=MAX_N_INPUTS {
        let key = format!("template{i}");
        match node.attribute(key.as_str()) {
            Some(value) => templates.push(PathBuf::from(value)),
            None => break,
        }
    }
    if templates.is_empty() {
        return Err(Error::config("experiment requires at least template1"));
    }
    if let Some(expected) = expected_n_inputs {
        if templates.len() != expected {
            return Err(Error::config(format!(
                "experiment has {} templates, expected {expected} (must match the first experiment)",
                templates.len()
            )));
        }
    }

    Ok(Experiment {
        data_path,
        weight,
        templates,
    })
}

fn parse_variable(node: &Node) -> Result<Variable> {
    let name = required_attr(node, "name")?.to_string();
    let range_min = attr_f64(node, "minimum")?;
    let range_max = attr_f64(node, "maximum")?;
    let abs_min = node
        .attribute("minimum_absolute")
        .map(|s| parse_f64(s, "minimum_absolute"))
        .transpose()?
        .unwrap_or(f64::NEG_INFINITY);
    let abs_max = node
        .attribute("maximum_absolute")
        .map(|s| parse_f64(s, "maximum_absolute"))
        .transpose()?
        .unwrap_or(f64::INFINITY);
    let format = node
        .attribute("format")
        .unwrap_or(DEFAULT_FORMAT)
        .to_string();
    let n_sweeps = node
        .attribute("nsweeps")
        .map(|s| parse_usize(s, "nsweeps"))
        .transpose()?;
    let n_bits = node
        .attribute("nbits")
        .map(|s| parse_usize(s, "nbits").map(|n| n as u8))
        .transpose()?;

    Ok(Variable {
        name,
        range_min,
        range_max,
        abs_min,
        abs_max,
        format,
        n_sweeps,
        n_bits,
    })
}

fn required_attr<'a>(node: &'a Node, key: &str) -> Result<&'a str> {
    node.attribute(key)
        .ok_or_else(|| Error::config(format!("<{}> is missing required attribute {key:?}", node.tag_name().name())))
}

fn attr_f64(node: &Node, key: &str) -> Result<f64> {
    parse_f64(required_attr(node, key)?, key)
}

fn attr_usize(node: &Node, key: &str) -> Result<usize> {
    parse_usize(required_attr(node, key)?, key)
}

fn parse_f64(s: &str, key: &str) -> Result<f64> {
    s.parse()
        .map_err(|_| Error::config(format!("attribute {key:?} is not a number: {s:?}")))
}

fn parse_usize(s: &str, key: &str) -> Result<usize> {
    s.parse()
        .map_err(|_| Error::config(format!("attribute {key:?} is not a non-negative integer: {s:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
        <calibrate simulator="./sim" algorithm="MonteCarlo" nsimulations="200" niterations="3" nbest="5" tolerance="0.5">
          <experiment name="exp1.dat" weight="2.0" template1="a.tmpl" template2="b.tmpl"/>
          <variable name="a" minimum="-10" maximum="10" minimum_absolute="-100" maximum_absolute="100"/>
          <variable name="b" minimum="-10" maximum="10"/>
        </calibrate>
    "#;

    #[test]
    fn parses_basic_document() {
        let spec = parse_str(DOC, Path::new("/tmp/doc.xml")).unwrap();
        assert_eq!(spec.experiments.len(), 1);
        assert_eq!(spec.experiments[0].templates.len(), 2);
        assert_eq!(spec.experiments[0].weight, 2.0);
        assert_eq!(spec.variables.len(), 2);
        assert_eq!(spec.variables[0].abs_min, -100.0);
        assert_eq!(spec.variables[0].abs_max, 100.0);
        // second variable omits absolute bounds: must default to +-inf,
        // independently of the first variable's values (regression test
        // for the source's ABSOLUTE_MINIMUM/ABSOLUTE_MAXIMUM copy/paste bug).
        assert_eq!(spec.variables[1].abs_min, f64::NEG_INFINITY);
        assert_eq!(spec.variables[1].abs_max, f64::INFINITY);
        match spec.algorithm {
            Algorithm::MonteCarlo(ref opts) => assert_eq!(opts.n_simulations, 200),
            _ => panic!("expected MonteCarlo"),
        }
    }

    #[test]
    fn defaults_algorithm_to_montecarlo() {
        let doc = r#"<calibrate simulator="./sim" nsimulations="1" niterations="1" nbest="1" tolerance="0">
          <experiment name="e" template1="t"/>
          <variable name="x" minimum="0" maximum="1"/>
        </calibrate>"#;
        let spec = parse_str(doc, Path::new("doc.xml")).unwrap();
        assert!(matches!(spec.algorithm, Algorithm::MonteCarlo(_)));
    }

    #[test]
    fn rejects_variable_before_experiment_end_mismatch() {
        let doc = r#"<calibrate simulator="./sim" nsimulations="1" niterations="1" nbest="1" tolerance="0">
          <experiment name="e1" template1="t1" template2="t2"/>
          <experiment name="e2" template1="t1"/>
          <variable name="x" minimum="0" maximum="1"/>
        </calibrate>"#;
        assert!(parse_str(doc, Path::new("doc.xml")).is_err());
    }

    #[test]
    fn rejects_missing_simulator() {
        let doc = r#"<calibrate><experiment name="e" template1="t"/><variable name="x" minimum="0" maximum="1"/></calibrate>"#;
        assert!(parse_str(doc, Path::new("doc.xml")).is_err());
    }
}
