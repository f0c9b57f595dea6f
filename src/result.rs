//! Result writer (spec.md §4.7, §6): appends one block per refinement
//! iteration to the result file, matching the original's behavior of
//! opening the file once and appending for the life of the run rather
//! than truncating it on every iteration.

use crate::best_n::Candidate;
use crate::config::Variable;
use crate::consts::RESULT_HEADER;
use crate::error::{Error, ErrorKind, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Holds the result file open for the life of the search.
pub struct ResultWriter {
    file: File,
}

impl ResultWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| Error::io(ErrorKind::Config, e))?;
        Ok(Self { file })
    }

    /// Append one iteration's best candidate, formatted per-variable
    /// using each [`Variable`]'s own display format.
    pub fn write_iteration(
        &mut self,
        iteration: usize,
        best: &Candidate,
        variables: &[Variable],
    ) -> Result<()> {
        writeln!(self.file, "=== iteration {iteration} ===")
            .map_err(|e| Error::io(ErrorKind::Config, e))?;
        writeln!(self.file, "{RESULT_HEADER}").map_err(|e| Error::io(ErrorKind::Config, e))?;
        writeln!(self.file, "error={:e}", best.error).map_err(|e| Error::io(ErrorKind::Config, e))?;
        for (variable, &value) in variables.iter().zip(best.values.iter()) {
            let rendered = variable.render(value)?;
            writeln!(self.file, "{}={}", variable.name, rendered)
                .map_err(|e| Error::io(ErrorKind::Config, e))?;
        }
        self.file.flush().map_err(|e| Error::io(ErrorKind::Config, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    #[test]
    fn appends_rather_than_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.txt");
        let variables = vec![Variable {
            name: "x".to_string(),
            ..Variable::default()
        }];
        let best = Candidate {
            error: 0.25,
            values: arr1(&[1.5]),
        };

        {
            let mut writer = ResultWriter::create(&path).unwrap();
            writer.write_iteration(0, &best, &variables).unwrap();
        }
        {
            let mut writer = ResultWriter::create(&path).unwrap();
            writer.write_iteration(1, &best, &variables).unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.matches(RESULT_HEADER).count(), 2);
        assert!(contents.contains("=== iteration 0 ==="));
        assert!(contents.contains("=== iteration 1 ==="));
    }
}
