//! Parameter sweep indexing
//!
//! Maps every run to the tuple of values it takes for a chosen list of
//! parameters, and collects the distinct values each parameter takes
//! across the sweep.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{AnalysisError, Result};
use crate::sweep::{RunId, Sweep};

/// Read-only view of a sweep over a chosen parameter subset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterIndex {
    /// Indexed parameter names, in tuple order
    pub parameter_names: Vec<String>,
    /// Run id -> values of `parameter_names`, in the same order
    pub run_to_values: BTreeMap<RunId, Vec<f64>>,
    /// Parameter name -> distinct values, sorted ascending
    pub values_by_parameter: BTreeMap<String, Vec<f64>>,
}

/// What to do when a parameter expected to be constant over the sweep
/// takes several values.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SingularPolicy {
    /// Use the smallest observed value and warn
    #[default]
    First,
    /// Fail with `AmbiguousParameter`
    Error,
    /// Use this value, which must have been observed
    Select(f64),
}

/// Index `sweep` on `parameter_names`.
///
/// Fails with `MissingParameter` on the first run lacking one of the names,
/// and with `DuplicateRun` if two runs share an id.
pub fn build_index<S: AsRef<str>>(
    sweep: &Sweep,
    parameter_names: &[S],
) -> Result<ParameterIndex> {
    let parameter_names: Vec<String> = parameter_names
        .iter()
        .map(|p| p.as_ref().to_string())
        .collect();

    let mut run_to_values = BTreeMap::new();
    let mut values_by_parameter: BTreeMap<String, Vec<f64>> = parameter_names
        .iter()
        .map(|name| (name.clone(), Vec::new()))
        .collect();

    for run in sweep {
        if run_to_values.contains_key(&run.id) {
            return Err(AnalysisError::DuplicateRun(run.id.clone()));
        }
        let values = parameter_names
            .iter()
            .map(|name| {
                run.parameter(name).ok_or_else(|| AnalysisError::MissingParameter {
                    run: run.id.clone(),
                    parameter: name.clone(),
                })
            })
            .collect::<Result<Vec<f64>>>()?;

        for (name, value) in parameter_names.iter().zip(&values) {
            if let Some(seen) = values_by_parameter.get_mut(name) {
                seen.push(*value);
            }
        }
        run_to_values.insert(run.id.clone(), values);
    }

    for values in values_by_parameter.values_mut() {
        values.sort_by(f64::total_cmp);
        values.dedup_by(|a, b| a.total_cmp(b).is_eq());
    }

    tracing::debug!(
        runs = run_to_values.len(),
        parameters = ?parameter_names,
        "built parameter index"
    );

    Ok(ParameterIndex {
        parameter_names,
        run_to_values,
        values_by_parameter,
    })
}

impl ParameterIndex {
    /// Position of `parameter` in the value tuples
    pub fn position(&self, parameter: &str) -> Option<usize> {
        self.parameter_names.iter().position(|p| p == parameter)
    }

    /// Distinct values of `parameter`, sorted
    pub fn distinct(&self, parameter: &str) -> Option<&[f64]> {
        self.values_by_parameter.get(parameter).map(Vec::as_slice)
    }

    /// Value of `parameter` for one run
    pub fn value(&self, run: &RunId, parameter: &str) -> Option<f64> {
        let position = self.position(parameter)?;
        self.run_to_values.get(run).map(|values| values[position])
    }

    /// Ids of the runs whose `parameter` equals `value`, in id order.
    pub fn runs_matching(&self, parameter: &str, value: f64) -> Vec<RunId> {
        let Some(position) = self.position(parameter) else {
            return Vec::new();
        };
        self.run_to_values
            .iter()
            .filter(|(_, values)| values[position].total_cmp(&value).is_eq())
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Resolve a parameter that should be constant across the sweep.
    pub fn singular_value(&self, parameter: &str, policy: SingularPolicy) -> Result<f64> {
        let values = self
            .distinct(parameter)
            .ok_or_else(|| AnalysisError::NotIndexed(parameter.to_string()))?;

        match policy {
            SingularPolicy::Select(value) => {
                if values.iter().any(|v| v.total_cmp(&value).is_eq()) {
                    Ok(value)
                } else {
                    Err(AnalysisError::ValueNotObserved {
                        parameter: parameter.to_string(),
                        value,
                    })
                }
            }
            SingularPolicy::Error if values.len() != 1 => {
                Err(AnalysisError::AmbiguousParameter {
                    parameter: parameter.to_string(),
                    count: values.len(),
                })
            }
            SingularPolicy::Error | SingularPolicy::First => {
                let first = *values
                    .first()
                    .ok_or_else(|| AnalysisError::AmbiguousParameter {
                        parameter: parameter.to_string(),
                        count: 0,
                    })?;
                if values.len() > 1 {
                    tracing::warn!(
                        parameter,
                        count = values.len(),
                        chosen = first,
                        "parameter is not constant, using the smallest value"
                    );
                }
                Ok(first)
            }
        }
    }
}
