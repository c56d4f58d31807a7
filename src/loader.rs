//! Loading of CST "Export Parametric" directory trees
//!
//! Layout expected under the export root:
//!
//! ```text
//! Export_Parametric/
//!   1/
//!     Parameters.txt          name=value per line
//!     Particle vs. Time.txt   two numeric columns, '#' headers
//!   2/
//!     ...
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::sweep::{Run, RunId, Sweep, TimeSeries};

/// Configuration for reading an export tree
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Sidecar file with scalar parameters
    pub parameters_file: String,
    /// Two-column particle count export
    pub series_file: String,
    /// Parameters rounded to the nearest integer after loading
    pub round_parameters: Vec<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            parameters_file: "Parameters.txt".to_string(),
            series_file: "Particle vs. Time.txt".to_string(),
            round_parameters: vec!["N_0".to_string()],
        }
    }
}

/// Read every run directory under `root` into a sweep, in sorted order.
///
/// Run directories missing one of the two files, or whose series is not a
/// valid time series, are skipped with a warning.
pub fn load_sweep(root: &Path, config: &LoaderConfig) -> Result<Sweep> {
    let mut dirs = fs::read_dir(root)
        .with_context(|| format!("Failed to read export directory: {:?}", root))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect::<Vec<_>>();
    dirs.sort();

    let mut sweep = Sweep::default();
    for dir in dirs {
        let Some(id) = dir.file_name().and_then(|name| name.to_str()) else {
            continue;
        };

        let parameters_path = dir.join(&config.parameters_file);
        let series_path = dir.join(&config.series_file);
        if !parameters_path.is_file() || !series_path.is_file() {
            tracing::warn!(
                run = id,
                "skipping run directory without parameter or series file"
            );
            continue;
        }

        let mut parameters = parse_parameters(
            &fs::read_to_string(&parameters_path)
                .with_context(|| format!("Failed to read {:?}", parameters_path))?,
        );
        for name in &config.round_parameters {
            if let Some(value) = parameters.get_mut(name) {
                *value = value.round();
            }
        }

        let text = fs::read_to_string(&series_path)
            .with_context(|| format!("Failed to read {:?}", series_path))?;
        let series = match parse_series(&text) {
            Ok(series) => series,
            Err(error) => {
                tracing::warn!(run = id, %error, "skipping run with invalid time series");
                continue;
            }
        };

        tracing::debug!(
            run = id,
            samples = series.len(),
            parameters = parameters.len(),
            "loaded run"
        );
        sweep.push(Run {
            id: RunId::new(id),
            series,
            parameters,
        });
    }

    if sweep.is_empty() {
        bail!("No runs found under {:?}", root);
    }
    tracing::info!(runs = sweep.len(), root = ?root, "loaded sweep");
    Ok(sweep)
}

/// Parse `name=value` lines. Comments and non-numeric values are skipped.
pub fn parse_parameters(text: &str) -> BTreeMap<String, f64> {
    let mut parameters = BTreeMap::new();
    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
            continue;
        }
        let Some((name, value)) = line.split_once('=') else {
            tracing::debug!(line, "ignoring parameter line without '='");
            continue;
        };
        match value.trim().parse::<f64>() {
            Ok(value) => {
                parameters.insert(name.trim().to_string(), value);
            }
            Err(_) => tracing::debug!(
                name = name.trim(),
                value = value.trim(),
                "ignoring non-numeric parameter"
            ),
        }
    }
    parameters
}

/// Parse a two-column time series. Lines that are not two numbers are
/// treated as headers.
pub fn parse_series(text: &str) -> Result<TimeSeries> {
    let mut pairs = Vec::new();
    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line
            .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
            .filter(|field| !field.is_empty());
        let (Some(time), Some(count)) = (fields.next(), fields.next()) else {
            continue;
        };
        match (time.parse::<f64>(), count.parse::<f64>()) {
            (Ok(time), Ok(count)) => pairs.push((time, count)),
            _ => continue,
        }
    }
    Ok(TimeSeries::from_pairs(pairs)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_parameters() {
        let text =
            "// CST parameters\nE_acc=2500000\n size_cell = 0.5\nmaterial=baked\n\nf=1.3e9\n";
        let parameters = parse_parameters(text);

        assert_eq!(
            parameters,
            BTreeMap::from([
                ("E_acc".to_string(), 2.5e6),
                ("f".to_string(), 1.3e9),
                ("size_cell".to_string(), 0.5),
            ])
        );
    }

    #[test]
    fn test_parse_series_skips_headers() {
        let text = "#\"Time / ns\"\t\"Particle vs. Time\"\n#-----------------\n\
                    0\t100\n0.5\t120\n1.0\t150\n";
        let series = parse_series(text).unwrap();

        assert_eq!(series.time(), &[0.0, 0.5, 1.0]);
        assert_eq!(series.count(), &[100.0, 120.0, 150.0]);
    }

    #[test]
    fn test_parse_series_rejects_unordered_time() {
        assert!(parse_series("0 1\n2 1\n1 1\n").is_err());
    }
}
