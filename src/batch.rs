//! Growth fits over a whole sweep

use std::collections::{BTreeMap, BTreeSet};

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::Serialize;

use crate::error::FitError;
use crate::growth::{fit_growth, GrowthFit, GrowthModel};
use crate::sweep::{Run, RunId, Sweep};

/// A run that could not be fitted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitFailure {
    pub run: RunId,
    #[serde(serialize_with = "serialize_error")]
    pub error: FitError,
}

fn serialize_error<S: serde::Serializer>(
    error: &FitError,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// Successful fits plus the runs that failed
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FitReport {
    pub fits: BTreeMap<RunId, GrowthFit>,
    /// Sorted by run id
    pub failures: Vec<FitFailure>,
}

impl FitReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn alpha(&self, run: &RunId) -> Option<f64> {
        self.fits.get(run).map(|fit| fit.alpha)
    }
}

/// Fit every run of `sweep` independently.
///
/// A run that fails is recorded in [`FitReport::failures`] and does not stop
/// the others. A run whose id already appeared earlier in the sweep is
/// reported as `DuplicateRun` and the first occurrence is kept. Runs are
/// fitted on the rayon pool when the `parallel` feature is enabled.
pub fn fit_all(sweep: &Sweep, model: GrowthModel, fitting_range: f64) -> FitReport {
    let fit_one = |run: &Run| {
        let result = fit_growth(&run.series, fitting_range, model);
        (run.id.clone(), result)
    };

    #[cfg(feature = "parallel")]
    let results: Vec<(RunId, Result<GrowthFit, FitError>)> =
        sweep.runs.par_iter().map(fit_one).collect();
    #[cfg(not(feature = "parallel"))]
    let results: Vec<(RunId, Result<GrowthFit, FitError>)> =
        sweep.runs.iter().map(fit_one).collect();

    let mut report = FitReport::default();
    let mut seen = BTreeSet::new();
    for (run, result) in results {
        // Results keep sweep order, so the first occurrence wins
        let result = if seen.insert(run.clone()) {
            result
        } else {
            Err(FitError::DuplicateRun(run.clone()))
        };
        match result {
            Ok(fit) => {
                tracing::debug!(
                    %run,
                    alpha = fit.alpha,
                    samples = fit.window.samples_used,
                    "fitted run"
                );
                report.fits.insert(run, fit);
            }
            Err(error) => {
                tracing::warn!(%run, %error, "fit failed");
                report.failures.push(FitFailure { run, error });
            }
        }
    }
    report.failures.sort_by(|a, b| a.run.cmp(&b.run));

    tracing::info!(
        fitted = report.fits.len(),
        failed = report.failures.len(),
        model = %model,
        fitting_range,
        "sweep fit complete"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sweep::TimeSeries;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;

    fn growing(id: u32, alpha: f64) -> Run {
        let series = TimeSeries::from_pairs((0..20).map(|t| {
            let t = t as f64;
            (t, 10.0 * (alpha * t).exp())
        }))
        .unwrap();
        Run::new(id, series)
    }

    #[test]
    fn test_failures_do_not_abort_batch() {
        let zeros = TimeSeries::new(vec![0.0, 1.0, 2.0], vec![0.0, 0.0, 0.0]).unwrap();
        let dead = Run::new(2u32, zeros);
        let sweep = Sweep::new(vec![growing(1, 0.1), dead, growing(3, 0.3)]);

        let report = fit_all(&sweep, GrowthModel::Classic, 10.0);

        assert_eq!(report.fits.len(), 2);
        let alpha = |id: u32| report.alpha(&RunId::from(id)).unwrap();
        assert_relative_eq!(alpha(1), 0.1, epsilon = 1e-9);
        assert_relative_eq!(alpha(3), 0.3, epsilon = 1e-9);
        assert_eq!(
            report.failures,
            vec![FitFailure {
                run: RunId::from(2u32),
                error: FitError::InsufficientData { usable: 0 },
            }]
        );
        assert!(!report.is_complete());
    }

    #[test]
    fn test_duplicate_run_is_reported() {
        let sweep = Sweep::new(vec![growing(1, 0.1), growing(1, 0.3), growing(2, 0.2)]);

        let report = fit_all(&sweep, GrowthModel::Classic, 10.0);

        assert_eq!(report.fits.len(), 2);
        assert_relative_eq!(report.alpha(&RunId::from(1u32)).unwrap(), 0.1, epsilon = 1e-9);
        assert_eq!(
            report.failures,
            vec![FitFailure {
                run: RunId::from(1u32),
                error: FitError::DuplicateRun(RunId::from(1u32)),
            }]
        );
    }

    #[test]
    fn test_empty_sweep() {
        let report = fit_all(&Sweep::default(), GrowthModel::Classic, 1.0);
        assert!(report.fits.is_empty());
        assert!(report.is_complete());
    }

    #[test]
    fn test_failure_serializes_as_message() {
        let failure = FitFailure {
            run: RunId::from(4u32),
            error: FitError::InsufficientData { usable: 1 },
        };
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["run"], "4");
        assert!(json["error"].as_str().unwrap().contains("1 usable sample"));
    }
}
