//! Sweep data model: runs, their parameters and particle-count time series

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FitError;

/// Opaque run identifier (CST names run directories with integers, but
/// any string is accepted).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RunId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<u32> for RunId {
    fn from(id: u32) -> Self {
        Self(id.to_string())
    }
}

/// Particle count vs. time.
///
/// Times are strictly increasing and all values are finite; both are
/// checked on construction. Non-positive counts are kept and left for the
/// fitter to exclude.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSeries", into = "RawSeries")]
pub struct TimeSeries {
    time: Vec<f64>,
    count: Vec<f64>,
}

#[derive(Serialize, Deserialize)]
struct RawSeries {
    time: Vec<f64>,
    count: Vec<f64>,
}

impl TryFrom<RawSeries> for TimeSeries {
    type Error = FitError;

    fn try_from(raw: RawSeries) -> Result<Self, Self::Error> {
        TimeSeries::new(raw.time, raw.count)
    }
}

impl From<TimeSeries> for RawSeries {
    fn from(series: TimeSeries) -> Self {
        RawSeries {
            time: series.time,
            count: series.count,
        }
    }
}

impl TimeSeries {
    pub fn new(time: Vec<f64>, count: Vec<f64>) -> Result<Self, FitError> {
        if time.len() != count.len() {
            return Err(FitError::InvalidSeries(format!(
                "{} time samples but {} counts",
                time.len(),
                count.len()
            )));
        }
        if let Some(t) = time.iter().find(|t| !t.is_finite()) {
            return Err(FitError::InvalidSeries(format!("non-finite time {t}")));
        }
        if let Some(w) = time.windows(2).find(|w| w[1] <= w[0]) {
            return Err(FitError::InvalidSeries(format!(
                "time is not strictly increasing ({} then {})",
                w[0], w[1]
            )));
        }
        if let Some(c) = count.iter().find(|c| !c.is_finite()) {
            return Err(FitError::InvalidSeries(format!("invalid particle count {c}")));
        }
        Ok(Self { time, count })
    }

    /// Build from `(time, count)` pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (f64, f64)>) -> Result<Self, FitError> {
        let (time, count) = pairs.into_iter().unzip();
        Self::new(time, count)
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn count(&self) -> &[f64] {
        &self.count
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.time.iter().copied().zip(self.count.iter().copied())
    }
}

/// One simulation instance of a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub series: TimeSeries,
    #[serde(default)]
    pub parameters: BTreeMap<String, f64>,
}

impl Run {
    pub fn new(id: impl Into<RunId>, series: TimeSeries) -> Self {
        Self {
            id: id.into(),
            series,
            parameters: BTreeMap::new(),
        }
    }

    /// Builder-style parameter assignment
    pub fn with_parameter(mut self, name: &str, value: f64) -> Self {
        self.parameters.insert(name.to_string(), value);
        self
    }

    pub fn parameter(&self, name: &str) -> Option<f64> {
        self.parameters.get(name).copied()
    }
}

/// Ordered collection of runs sharing a parameter schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sweep {
    pub runs: Vec<Run>,
}

impl Sweep {
    pub fn new(runs: Vec<Run>) -> Self {
        Self { runs }
    }

    pub fn push(&mut self, run: Run) {
        self.runs.push(run);
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Run> {
        self.runs.iter()
    }

    pub fn get(&self, id: &RunId) -> Option<&Run> {
        self.runs.iter().find(|run| &run.id == id)
    }
}

impl FromIterator<Run> for Sweep {
    fn from_iter<I: IntoIterator<Item = Run>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Sweep {
    type Item = &'a Run;
    type IntoIter = std::slice::Iter<'a, Run>;

    fn into_iter(self) -> Self::IntoIter {
        self.runs.iter()
    }
}
