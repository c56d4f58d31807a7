//! Exponential growth fitting of particle populations
//!
//! The classic multipactor model is `N(t) = N_0 * exp(alpha * t)`. `alpha`
//! is obtained by ordinary least squares on `ln N` against `t` over the
//! fitting window, which avoids the instability of a non-linear solve.

use std::fmt;
use std::str::FromStr;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::FitError;
use crate::sweep::TimeSeries;

/// Singular values below this are treated as zero by the solver
const SVD_EPS: f64 = 1e-12;

/// Functional form of the growth model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrowthModel {
    #[default]
    Classic,
}

impl GrowthModel {
    pub fn name(&self) -> &'static str {
        match self {
            GrowthModel::Classic => "classic",
        }
    }

    /// Evaluate the model `elapsed` time units after the first sample
    pub fn evaluate(&self, n0: f64, alpha: f64, elapsed: f64) -> f64 {
        match self {
            GrowthModel::Classic => n0 * (alpha * elapsed).exp(),
        }
    }
}

impl FromStr for GrowthModel {
    type Err = FitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "classic" => Ok(GrowthModel::Classic),
            _ => Err(FitError::UnsupportedModel(s.to_string())),
        }
    }
}

impl fmt::Display for GrowthModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Time window a fit was computed over
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitWindow {
    /// First sample time
    pub start: f64,
    /// `start + fitting_range`
    pub end: f64,
    /// Samples that entered the regression (positive counts only)
    pub samples_used: usize,
}

/// Result of fitting one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthFit {
    /// Exponential growth factor, in inverse time units of the series
    pub alpha: f64,
    /// Regression intercept, `ln N` at the first sample
    pub log_n0: f64,
    /// Model evaluated at every sample time of the original series
    pub model_curve: Vec<f64>,
    pub window: FitWindow,
    pub model: GrowthModel,
}

/// Fit `model` to `series` over `[t0, t0 + fitting_range]`.
///
/// Non-positive counts in the window are left out of the regression. The
/// model curve spans the whole series and starts from the first sample's
/// count.
pub fn fit_growth(
    series: &TimeSeries,
    fitting_range: f64,
    model: GrowthModel,
) -> Result<GrowthFit, FitError> {
    if !(fitting_range.is_finite() && fitting_range > 0.0) {
        return Err(FitError::InvalidFittingRange(fitting_range));
    }

    let (Some(&t0), Some(&n0)) = (series.time().first(), series.count().first()) else {
        return Err(FitError::InsufficientData { usable: 0 });
    };
    let end = t0 + fitting_range;

    let in_window: Vec<(f64, f64)> = series.iter().take_while(|(t, _)| *t <= end).collect();
    if in_window.len() < 2 {
        return Err(FitError::InsufficientData {
            usable: in_window.len(),
        });
    }

    let usable: Vec<(f64, f64)> = in_window.into_iter().filter(|(_, n)| *n > 0.0).collect();
    if usable.len() < 2 {
        return Err(FitError::InsufficientData { usable: usable.len() });
    }

    let (alpha, log_n0) = match model {
        GrowthModel::Classic => log_linear_fit(&usable, t0)?,
    };

    let model_curve = series
        .time()
        .iter()
        .map(|t| model.evaluate(n0, alpha, t - t0))
        .collect();

    Ok(GrowthFit {
        alpha,
        log_n0,
        model_curve,
        window: FitWindow {
            start: t0,
            end,
            samples_used: usable.len(),
        },
        model,
    })
}

/// Least-squares `ln n = c + alpha * (t - t0)`; returns `(alpha, c)`.
fn log_linear_fit(samples: &[(f64, f64)], t0: f64) -> Result<(f64, f64), FitError> {
    let design = DMatrix::from_fn(samples.len(), 2, |row, col| match col {
        0 => 1.0,
        _ => samples[row].0 - t0,
    });
    let rhs = DVector::from_iterator(samples.len(), samples.iter().map(|(_, n)| n.ln()));

    let solution = design
        .svd(true, true)
        .solve(&rhs, SVD_EPS)
        .map_err(|e| FitError::Solver(e.to_string()))?;

    let (intercept, alpha) = (solution[0], solution[1]);
    if !(alpha.is_finite() && intercept.is_finite()) {
        return Err(FitError::Solver(format!("non-finite coefficients ({intercept}, {alpha})")));
    }
    Ok((alpha, intercept))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn synthetic(n0: f64, alpha: f64, t_max: usize) -> TimeSeries {
        TimeSeries::from_pairs((0..=t_max).map(|t| {
            let t = t as f64;
            (t, n0 * (alpha * t).exp())
        }))
        .unwrap()
    }

    #[test]
    fn test_recovers_alpha_on_noiseless_data() {
        let series = synthetic(100.0, 0.05, 50);
        let fit = fit_growth(&series, 20.0, GrowthModel::Classic).unwrap();

        assert!((fit.alpha - 0.05).abs() < 1e-6, "alpha = {}", fit.alpha);
        assert_relative_eq!(fit.log_n0, 100f64.ln(), epsilon = 1e-6);
        assert_eq!(fit.window.samples_used, 21);
        assert_eq!(fit.window.start, 0.0);
        assert_eq!(fit.window.end, 20.0);
    }

    #[test]
    fn test_model_curve_spans_whole_series() {
        let series = synthetic(100.0, 0.05, 50);
        let fit = fit_growth(&series, 20.0, GrowthModel::Classic).unwrap();

        assert_eq!(fit.model_curve.len(), series.len());
        assert_relative_eq!(fit.model_curve[0], 100.0);
        assert_relative_eq!(fit.model_curve[50], 100.0 * 2.5f64.exp(), max_relative = 1e-5);
    }

    #[test]
    fn test_time_offset_does_not_change_alpha() {
        let series = TimeSeries::from_pairs((0..30).map(|i| {
            let t = 1000.0 + 0.5 * i as f64;
            (t, 3.0 * (-0.2 * (t - 1000.0)).exp())
        }))
        .unwrap();
        let fit = fit_growth(&series, 10.0, GrowthModel::Classic).unwrap();

        assert_relative_eq!(fit.alpha, -0.2, epsilon = 1e-6);
        assert_relative_eq!(fit.model_curve[0], 3.0);
    }

    #[test]
    fn test_single_sample_window_is_insufficient() {
        let series = synthetic(100.0, 0.05, 10);
        let err = fit_growth(&series, 0.5, GrowthModel::Classic).unwrap_err();
        assert_eq!(err, FitError::InsufficientData { usable: 1 });
    }

    #[test]
    fn test_non_positive_counts_are_excluded() {
        let series = TimeSeries::new(
            vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
            vec![10.0, 0.0, 10.0 * 0.2f64.exp(), 0.0, 10.0 * 0.4f64.exp(), 10.0 * 0.5f64.exp()],
        )
        .unwrap();
        let fit = fit_growth(&series, 4.0, GrowthModel::Classic).unwrap();

        assert_relative_eq!(fit.alpha, 0.1, epsilon = 1e-9);
        assert_eq!(fit.window.samples_used, 3);
    }

    #[test]
    fn test_negative_counts_are_excluded() {
        let series = TimeSeries::new(
            vec![0.0, 1.0, 2.0, 3.0, 4.0],
            vec![10.0, -1.0, 10.0 * 0.4f64.exp(), -3.0, 10.0 * 0.8f64.exp()],
        )
        .unwrap();
        let fit = fit_growth(&series, 4.0, GrowthModel::Classic).unwrap();

        assert_relative_eq!(fit.alpha, 0.2, epsilon = 1e-9);
        assert_eq!(fit.window.samples_used, 3);
        assert_eq!(fit.model_curve.len(), 5);
    }

    #[test]
    fn test_all_zero_window_is_insufficient() {
        let series = TimeSeries::new(vec![0.0, 1.0, 2.0, 3.0], vec![0.0, 0.0, 5.0, 0.0]).unwrap();
        let err = fit_growth(&series, 3.0, GrowthModel::Classic).unwrap_err();
        assert_eq!(err, FitError::InsufficientData { usable: 1 });
    }

    #[test]
    fn test_empty_series_is_insufficient() {
        let series = TimeSeries::new(vec![], vec![]).unwrap();
        assert!(matches!(
            fit_growth(&series, 1.0, GrowthModel::Classic),
            Err(FitError::InsufficientData { usable: 0 })
        ));
    }

    #[test]
    fn test_invalid_fitting_range() {
        let series = synthetic(1.0, 0.1, 5);
        for range in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                fit_growth(&series, range, GrowthModel::Classic),
                Err(FitError::InvalidFittingRange(_))
            ));
        }
    }

    #[test]
    fn test_model_names() {
        assert_eq!("classic".parse::<GrowthModel>().unwrap(), GrowthModel::Classic);
        assert_eq!(" Classic ".parse::<GrowthModel>().unwrap(), GrowthModel::Classic);
        assert_eq!(
            "quadratic".parse::<GrowthModel>().unwrap_err(),
            FitError::UnsupportedModel("quadratic".to_string())
        );
        assert_eq!(GrowthModel::Classic.to_string(), "classic");
    }
}
