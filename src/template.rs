//! Template Engine (spec.md §4.1): literal `@variable<i>@` / `@value<i>@`
//! substitution over a template file held in memory for the life of the
//! search.

use crate::config::Variable;
use crate::error::{Error, ErrorKind, Result};
use ndarray::ArrayView1;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// The contents of one template file, read once and held for the
/// duration of a search (spec.md §3, "MappedTemplate").
#[derive(Debug, Clone)]
pub struct MappedTemplate {
    source: PathBuf,
    contents: String,
}

impl MappedTemplate {
    /// Load `path`. A missing file is not an error here: spec.md §4.1
    /// documents it as an intentional no-op, so the caller gets `Ok(None)`
    /// and is expected to silently skip writing that input slot.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(Some(Self {
                source: path.to_path_buf(),
                contents,
            })),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(ErrorKind::Template, e)),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Render this template for trial row `s` of `matrix` and write the
    /// result to `out_path`. Substitution is strictly literal (no regex
    /// metacharacters are honored) and follows variable index order.
    pub fn render_to(
        &self,
        out_path: &Path,
        row: ArrayView1<f64>,
        variables: &[Variable],
    ) -> Result<()> {
        let rendered = self.substitute(row, variables)?;
        fs::write(out_path, rendered).map_err(|e| Error::io(ErrorKind::Template, e))
    }

    fn substitute(&self, row: ArrayView1<f64>, variables: &[Variable]) -> Result<String> {
        let mut out = self.contents.clone();
        for (i, variable) in variables.iter().enumerate() {
            let idx = i + 1;
            out = out.replace(&format!("@variable{idx}@"), &variable.name);
            let rendered = variable.render(row[i])?;
            out = out.replace(&format!("@value{idx}@"), &rendered);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Variable;
    use ndarray::arr1;

    fn var(name: &str) -> Variable {
        Variable {
            name: name.to_string(),
            ..Variable::default()
        }
    }

    #[test]
    fn idempotent_when_no_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.tmpl");
        fs::write(&path, b"no placeholders here\n").unwrap();
        let template = MappedTemplate::load(&path).unwrap().unwrap();
        let row = arr1(&[1.0]);
        let rendered = template.substitute(row.view(), &[var("x")]).unwrap();
        assert_eq!(rendered, "no placeholders here\n");
    }

    #[test]
    fn substitutes_name_and_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.tmpl");
        fs::write(&path, b"param @variable1@ = @value1@\n").unwrap();
        let template = MappedTemplate::load(&path).unwrap().unwrap();
        let mut x = var("x");
        x.format = "%.0lf".to_string();
        let row = arr1(&[2.0]);
        let rendered = template.substitute(row.view(), &[x]).unwrap();
        assert_eq!(rendered, "param x = 2\n");
    }

    #[test]
    fn missing_template_is_silently_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.tmpl");
        assert!(MappedTemplate::load(&path).unwrap().is_none());
    }
}
