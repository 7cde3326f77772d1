//! Forward-model collaborators.
//!
//! Nodes never format simulator input themselves. On the write path they
//! hand transformed values to a [`ForwardModelWriter`]; dynamic kinds read
//! simulator output back through a [`ForwardModelReader`]. [`RunPathIo`]
//! implements both against a plain run directory.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use ensnode_error::{EnsError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::keyword::{EclKeyword, read_keyword_file, write_keyword_file};

/// One template to instantiate: `template` is read as-is, the filled-in
/// copy lands at `target` relative to the run path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateTarget {
    pub template: PathBuf,
    pub target: PathBuf,
}

/// Sink for values on their way into simulator input.
pub trait ForwardModelWriter {
    /// Write named scalar values for `parameter`, then instantiate each
    /// template with `<NAME>` replaced by the value of `NAME`.
    fn write_scalars(
        &mut self,
        run_path: &Path,
        parameter: &str,
        values: &[(&str, f64)],
        templates: &[TemplateTarget],
    ) -> Result<()>;

    /// Write a single keyword to `file_name` under the run path.
    fn write_keyword(&mut self, run_path: &Path, file_name: &str, keyword: &EclKeyword)
    -> Result<()>;
}

/// Source of simulator output for dynamic kinds.
pub trait ForwardModelReader {
    /// Look up `key` in the result file `file_name`.
    fn read_scalar(&self, run_path: &Path, file_name: &str, key: &str) -> Result<f64>;

    /// Find keyword `name` in the keyword file `file_name`.
    fn read_keyword(&self, run_path: &Path, file_name: &str, name: &str) -> Result<EclKeyword>;
}

/// File-system implementation of both collaborators.
///
/// - scalars: `<run_path>/<parameter>.txt`, one `NAME value` line each
/// - templates: `<NAME>` substitution into `<run_path>/<target>`
/// - keywords: keyword file format, one keyword per written file
/// - results: `KEY value` lines, `--` starts a comment
#[derive(Debug, Default, Clone, Copy)]
pub struct RunPathIo;

impl RunPathIo {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ForwardModelWriter for RunPathIo {
    fn write_scalars(
        &mut self,
        run_path: &Path,
        parameter: &str,
        values: &[(&str, f64)],
        templates: &[TemplateTarget],
    ) -> Result<()> {
        ensure_dir(run_path)?;
        let mut listing = String::new();
        for (name, value) in values {
            let _ = writeln!(listing, "{name} {value}");
        }
        let parameter_file = run_path.join(format!("{parameter}.txt"));
        write_text(&parameter_file, &listing)?;

        for template in templates {
            let text = fs::read_to_string(&template.template).map_err(|err| {
                EnsError::external(format!(
                    "reading template {}: {err}",
                    template.template.display()
                ))
            })?;
            let target = run_path.join(&template.target);
            if let Some(parent) = target.parent() {
                ensure_dir(parent)?;
            }
            write_text(&target, &substitute(&text, values))?;
            debug!(
                parameter,
                template = %template.template.display(),
                target = %target.display(),
                "template instantiated"
            );
        }
        Ok(())
    }

    fn write_keyword(
        &mut self,
        run_path: &Path,
        file_name: &str,
        keyword: &EclKeyword,
    ) -> Result<()> {
        ensure_dir(run_path)?;
        write_keyword_file(&run_path.join(file_name), std::slice::from_ref(keyword))
    }
}

impl ForwardModelReader for RunPathIo {
    fn read_scalar(&self, run_path: &Path, file_name: &str, key: &str) -> Result<f64> {
        let path = run_path.join(file_name);
        let text = fs::read_to_string(&path).map_err(|err| {
            EnsError::external(format!("reading result file {}: {err}", path.display()))
        })?;
        for line in text.lines() {
            let line = line.split("--").next().unwrap_or_default();
            let mut fields = line.split_whitespace();
            let (Some(name), Some(raw)) = (fields.next(), fields.next()) else {
                continue;
            };
            if name == key {
                return raw.parse::<f64>().map_err(|err| {
                    EnsError::external(format!(
                        "result {key} in {} is not a number ({raw:?}): {err}",
                        path.display()
                    ))
                });
            }
        }
        Err(EnsError::external(format!(
            "result {key} not found in {}",
            path.display()
        )))
    }

    fn read_keyword(&self, run_path: &Path, file_name: &str, name: &str) -> Result<EclKeyword> {
        let path = run_path.join(file_name);
        read_keyword_file(&path)?
            .into_iter()
            .find(|kw| kw.name() == name)
            .ok_or_else(|| {
                EnsError::external(format!("keyword {name} not found in {}", path.display()))
            })
    }
}

/// Replace every `<NAME>` in `text` with its value. Unknown tags are kept.
#[must_use]
pub fn substitute(text: &str, values: &[(&str, f64)]) -> String {
    let mut out = text.to_owned();
    for (name, value) in values {
        let tag = format!("<{name}>");
        if out.contains(&tag) {
            out = out.replace(&tag, &value.to_string());
        }
    }
    out
}

fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .map_err(|err| EnsError::external(format!("creating {}: {err}", path.display())))
}

fn write_text(path: &Path, text: &str) -> Result<()> {
    fs::write(path, text)
        .map_err(|err| EnsError::external(format!("writing {}: {err}", path.display())))
}
