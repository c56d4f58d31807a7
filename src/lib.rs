//! multipactor-fit: Exponential growth analysis of CST multipactor sweeps
//!
//! This crate provides:
//! - Loading of CST "Export Parametric" trees into a typed [`Sweep`]
//! - Indexing of runs by parameter combination
//! - Log-linear fitting of the growth factor `alpha` for every run
//! - CSV tables and matplotlib script generation for the results
//!
//! CST exports particle-vs-time curves in ns while the frequency parameter
//! is in Hz. The fitting window is a number of RF periods, so the period
//! is converted into the time unit of the series before fitting.

pub mod batch;
pub mod color;
pub mod error;
pub mod growth;
pub mod index;
pub mod loader;
pub mod render;
pub mod sweep;

pub use batch::{fit_all, FitFailure, FitReport};
pub use color::{colorize, printc, Color};
pub use error::{AnalysisError, FitError};
pub use growth::{fit_growth, FitWindow, GrowthFit, GrowthModel};
pub use index::{build_index, ParameterIndex, SingularPolicy};
pub use loader::{load_sweep, LoaderConfig};
pub use render::{generate_plot_script, write_alpha_csv, write_population_csv, PlotConfig};
pub use sweep::{Run, RunId, Sweep, TimeSeries};

use serde::Serialize;

/// Indexes `sweep`, resolves the RF period and fits every run.
pub fn analyze(sweep: &Sweep, config: &AnalysisConfig) -> error::Result<Analysis> {
    let mut keys = config.index_keys.clone();
    if !keys.contains(&config.frequency_key) {
        keys.push(config.frequency_key.clone());
    }
    let index = build_index(sweep, keys.as_slice())?;

    let frequency = index.singular_value(&config.frequency_key, config.frequency_policy)?;
    let period = config.period(frequency)?;
    let fitting_range = config.fitting_range.unwrap_or(config.periods * period);

    tracing::info!(
        runs = sweep.len(),
        frequency,
        period,
        fitting_range,
        time_unit = ?config.time_unit,
        "fitting sweep"
    );

    let report = fit_all(sweep, config.model, fitting_range);

    Ok(Analysis {
        index,
        frequency,
        period,
        fitting_range,
        report,
    })
}

/// Configuration for the analysis
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Growth model to fit (default: classic)
    pub model: GrowthModel,
    /// Parameters the runs are indexed on
    pub index_keys: Vec<String>,
    /// Name of the RF frequency parameter (default: f)
    pub frequency_key: String,
    /// Unit of the frequency parameter (default: Hz)
    pub frequency_unit: FrequencyUnit,
    /// What to do if the sweep has several frequencies
    pub frequency_policy: SingularPolicy,
    /// Unit of the time axis of the series (default: ns)
    pub time_unit: TimeUnit,
    /// Fitting window length in RF periods
    pub periods: f64,
    /// Explicit fitting window in time units, overrides `periods`
    pub fitting_range: Option<f64>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            model: GrowthModel::Classic,
            index_keys: vec!["E_acc".to_string(), "size_cell".to_string(), "f".to_string()],
            frequency_key: "f".to_string(),
            frequency_unit: FrequencyUnit::Hertz,
            frequency_policy: SingularPolicy::First,
            time_unit: TimeUnit::Nanosecond,
            periods: 5.0,
            fitting_range: None,
        }
    }
}

impl AnalysisConfig {
    /// RF period in `time_unit` for a frequency given in `frequency_unit`
    pub fn period(&self, frequency: f64) -> error::Result<f64> {
        let hz = self.frequency_unit.to_hertz(frequency);
        if !(hz.is_finite() && hz > 0.0) {
            return Err(AnalysisError::InvalidFrequency(frequency));
        }
        Ok(self.time_unit.from_seconds(1.0 / hz))
    }
}

/// Output of [`analyze`]
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub index: ParameterIndex,
    /// RF frequency, in the unit of the frequency parameter
    pub frequency: f64,
    /// RF period, in time units
    pub period: f64,
    /// Fitting window actually used, in time units
    pub fitting_range: f64,
    pub report: FitReport,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeUnit {
    Second,
    Millisecond,
    Microsecond,
    Nanosecond,
    Picosecond,
}

impl TimeUnit {
    /// Convert from this unit to seconds
    pub fn to_seconds(&self, value: f64) -> f64 {
        match self {
            TimeUnit::Second => value,
            TimeUnit::Millisecond => value * 1e-3,
            TimeUnit::Microsecond => value * 1e-6,
            TimeUnit::Nanosecond => value * 1e-9,
            TimeUnit::Picosecond => value * 1e-12,
        }
    }

    /// Convert from seconds to this unit
    pub fn from_seconds(&self, value: f64) -> f64 {
        match self {
            TimeUnit::Second => value,
            TimeUnit::Millisecond => value * 1e3,
            TimeUnit::Microsecond => value * 1e6,
            TimeUnit::Nanosecond => value * 1e9,
            TimeUnit::Picosecond => value * 1e12,
        }
    }

    /// Short label for axis titles
    pub fn symbol(&self) -> &'static str {
        match self {
            TimeUnit::Second => "s",
            TimeUnit::Millisecond => "ms",
            TimeUnit::Microsecond => "us",
            TimeUnit::Nanosecond => "ns",
            TimeUnit::Picosecond => "ps",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrequencyUnit {
    Hertz,
    Megahertz,
    Gigahertz,
}

impl FrequencyUnit {
    pub fn to_hertz(&self, value: f64) -> f64 {
        match self {
            FrequencyUnit::Hertz => value,
            FrequencyUnit::Megahertz => value * 1e6,
            FrequencyUnit::Gigahertz => value * 1e9,
        }
    }
}
