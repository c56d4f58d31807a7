//! CSV tables and matplotlib script generation for fit results

use std::io::Write;

use anyhow::Result;
use minijinja::{context, Environment};

use crate::sweep::{RunId, Sweep};
use crate::{Analysis, FitReport, TimeUnit};

const PLOT_TEMPLATE: &str = r##"#!/usr/bin/env python3
"""
Multipactor growth analysis - Auto-generated by mp-growth
{{ header_comment }}

Generated: {{ timestamp }}
Fitting range: {{ fitting_range }} {{ time_unit }}
Frequency: {{ frequency }}
"""

import argparse
import json

import matplotlib.pyplot as plt

DATA = json.loads(r"""{{ data_json }}""")


def plot_population_evolutions(ax):
    """Particle count vs time, with the fitted model dashed in the same colour."""
    for run in DATA["populations"]:
        (line,) = ax.plot(run["time"], run["count"], label=run["label"])
        ax.plot(run["time"], run["model"], ls="--", lw=4, c=line.get_color())
    ax.set_xlabel("Time [{{ time_unit }}]")
    ax.set_ylabel("Electrons")
    ax.set_yscale("log")
    ax.set_title("Labels correspond to: {{ population_labels }}")
    ax.grid(True, alpha=0.3)
    ax.legend()


def plot_growth_factors(ax):
    """alpha vs {{ x_key }}, one series per {{ group_key }}."""
    for group in DATA["alpha"]:
        ax.plot(group["x"], group["alpha"], marker="o", label=group["label"])
    ax.set_xlabel("{{ x_label }}")
    ax.set_ylabel(r"$\alpha$ [1/{{ time_unit }}]")
    ax.grid(True, alpha=0.3)
    ax.legend(title="{{ group_label }}")


if __name__ == "__main__":
    parser = argparse.ArgumentParser(description="Plot multipactor growth fits")
    parser.add_argument("--save", type=str, default=None, help="Save figures with this prefix")
    args = parser.parse_args()

    fig_pop, ax_pop = plt.subplots(figsize=(10, 6))
    plot_population_evolutions(ax_pop)
    fig_alpha, ax_alpha = plt.subplots(figsize=(10, 6))
    plot_growth_factors(ax_alpha)

    for fig in (fig_pop, fig_alpha):
        fig.tight_layout()

    if args.save:
        fig_pop.savefig(f"{args.save}_populations.png", dpi=150)
        fig_alpha.savefig(f"{args.save}_alpha.png", dpi=150)
    else:
        plt.show()
"##;

/// Configuration for the generated plots
#[derive(Debug, Clone)]
pub struct PlotConfig {
    /// Maximum number of population curves drawn
    pub max_population_plots: usize,
    /// Parameter on the x axis of the alpha plot
    pub x_key: String,
    pub x_label: String,
    /// Parameter grouping the alpha plot into series
    pub group_key: String,
    pub group_label: String,
    pub time_unit: TimeUnit,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            max_population_plots: 5,
            x_key: "E_acc".to_string(),
            x_label: "$E_{acc}$ [V/m]".to_string(),
            group_key: "N_0".to_string(),
            group_label: "Init. number of electrons".to_string(),
            time_unit: TimeUnit::Nanosecond,
        }
    }
}

/// Write one row per fitted run: run id, indexed parameters, alpha.
pub fn write_alpha_csv<W: Write>(analysis: &Analysis, writer: &mut W) -> Result<()> {
    write!(writer, "run")?;
    for name in &analysis.index.parameter_names {
        write!(writer, ",{}", name)?;
    }
    writeln!(writer, ",alpha")?;

    for (run, fit) in &analysis.report.fits {
        write!(writer, "{}", run)?;
        if let Some(values) = analysis.index.run_to_values.get(run) {
            for value in values {
                write!(writer, ",{}", value)?;
            }
        }
        writeln!(writer, ",{}", fit.alpha)?;
    }
    Ok(())
}

/// Write every sample of every run in long format.
///
/// Format:
/// ```csv
/// run,time,count,model
/// 1,0,100,100
/// 1,0.5,121,120.8
/// ```
///
/// The model column is empty for runs that could not be fitted.
pub fn write_population_csv<W: Write>(
    sweep: &Sweep,
    report: &FitReport,
    writer: &mut W,
) -> Result<()> {
    writeln!(writer, "run,time,count,model")?;
    for run in sweep {
        let model = report.fits.get(&run.id).map(|fit| fit.model_curve.as_slice());
        for (i, (time, count)) in run.series.iter().enumerate() {
            match model.and_then(|curve| curve.get(i)) {
                Some(value) => writeln!(writer, "{},{},{},{}", run.id, time, count, value)?,
                None => writeln!(writer, "{},{},{},", run.id, time, count)?,
            }
        }
    }
    Ok(())
}

/// Evenly spaced selection of at most `max` fitted runs, in id order
fn sample_runs(report: &FitReport, max: usize) -> Vec<&RunId> {
    let ids: Vec<&RunId> = report.fits.keys().collect();
    let n = max.min(ids.len());
    (0..n).map(|i| ids[i * ids.len() / n]).collect()
}

/// Generate a matplotlib script plotting populations and growth factors.
pub fn generate_plot_script(
    sweep: &Sweep,
    analysis: &Analysis,
    config: &PlotConfig,
) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("plot", PLOT_TEMPLATE)?;

    let template = env.get_template("plot")?;

    let populations: Vec<_> = sample_runs(&analysis.report, config.max_population_plots)
        .into_iter()
        .filter_map(|id| {
            let run = sweep.get(id)?;
            let fit = analysis.report.fits.get(id)?;
            let label = analysis
                .index
                .run_to_values
                .get(id)
                .map(|values| format!("{:?}", values))
                .unwrap_or_else(|| id.to_string());
            Some(serde_json::json!({
                "label": label,
                "time": run.series.time(),
                "count": run.series.count(),
                "model": fit.model_curve,
            }))
        })
        .collect();

    // alpha vs x_key, grouped by group_key
    let mut groups: Vec<(f64, Vec<(f64, f64)>)> = Vec::new();
    for run in sweep {
        let Some(alpha) = analysis.report.alpha(&run.id) else {
            continue;
        };
        let x = run.parameter(&config.x_key);
        let group = run.parameter(&config.group_key);
        let (Some(x), Some(group)) = (x, group) else {
            tracing::debug!(run = %run.id, "run lacks plot parameters, not plotted");
            continue;
        };
        match groups.iter_mut().find(|(g, _)| g.total_cmp(&group).is_eq()) {
            Some((_, points)) => points.push((x, alpha)),
            None => groups.push((group, vec![(x, alpha)])),
        }
    }
    groups.sort_by(|a, b| a.0.total_cmp(&b.0));

    let alpha: Vec<_> = groups
        .into_iter()
        .map(|(group, mut points)| {
            points.sort_by(|a, b| a.0.total_cmp(&b.0));
            let (x, alpha): (Vec<f64>, Vec<f64>) = points.into_iter().unzip();
            serde_json::json!({
                "label": format!("{} = {}", config.group_key, group),
                "x": x,
                "alpha": alpha,
            })
        })
        .collect();

    let data = serde_json::json!({
        "populations": populations,
        "alpha": alpha,
    });

    let output = template.render(context! {
        header_comment => "Exponential growth fits of a CST parametric sweep",
        timestamp => chrono::Utc::now().to_rfc3339(),
        fitting_range => analysis.fitting_range.to_string(),
        frequency => analysis.frequency.to_string(),
        time_unit => config.time_unit.symbol(),
        population_labels => analysis.index.parameter_names.join(", "),
        x_key => config.x_key.as_str(),
        x_label => config.x_label.as_str(),
        group_key => config.group_key.as_str(),
        group_label => config.group_label.as_str(),
        data_json => serde_json::to_string(&data)?,
    })?;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sweep::{Run, TimeSeries};
    use crate::{analyze, AnalysisConfig};
    use pretty_assertions::assert_eq;

    fn sweep() -> Sweep {
        let run = |id: u32, e_acc: f64, n0: f64, alpha: f64| {
            let samples = (0..4).map(|t| (t as f64, n0 * (alpha * t as f64).exp()));
            let series = TimeSeries::from_pairs(samples).unwrap();
            Run::new(id, series)
                .with_parameter("E_acc", e_acc)
                .with_parameter("size_cell", 0.5)
                .with_parameter("f", 1.0e9)
                .with_parameter("N_0", n0)
        };
        let dead = Run::new(4u32, TimeSeries::new(vec![0.0, 1.0], vec![0.0, 0.0]).unwrap())
            .with_parameter("E_acc", 3.0)
            .with_parameter("size_cell", 0.5)
            .with_parameter("f", 1.0e9)
            .with_parameter("N_0", 10.0);
        Sweep::new(vec![
            run(1, 2.0, 10.0, 0.5),
            run(2, 1.0, 10.0, 0.25),
            run(3, 1.0, 20.0, 0.0),
            dead,
        ])
    }

    #[test]
    fn test_alpha_csv() {
        let sweep = sweep();
        let analysis = analyze(&sweep, &AnalysisConfig::default()).unwrap();

        let mut out = Vec::new();
        write_alpha_csv(&analysis, &mut out).unwrap();
        let csv = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "run,E_acc,size_cell,f,alpha");
        assert_eq!(lines.len(), 4);
        let alpha = |line: &str| line.rsplit(',').next().unwrap().parse::<f64>().unwrap();
        assert!(lines[1].starts_with("1,2,0.5,1000000000,"));
        assert!((alpha(lines[1]) - 0.5).abs() < 1e-9);
        assert!(lines[3].starts_with("3,1,0.5,1000000000,"));
        assert!(alpha(lines[3]).abs() < 1e-9);
    }

    #[test]
    fn test_population_csv_leaves_failed_model_empty() {
        let sweep = sweep();
        let analysis = analyze(&sweep, &AnalysisConfig::default()).unwrap();

        let mut out = Vec::new();
        write_population_csv(&sweep, &analysis.report, &mut out).unwrap();
        let csv = String::from_utf8(out).unwrap();

        assert!(csv.starts_with("run,time,count,model\n1,0,10,10\n"));
        assert!(csv.ends_with("4,0,0,\n4,1,0,\n"));
    }

    #[test]
    fn test_sample_runs_is_evenly_spaced() {
        let mut report = FitReport::default();
        let sweep = sweep();
        let analysis = analyze(&sweep, &AnalysisConfig::default()).unwrap();
        let fit = analysis.report.fits[&RunId::from(1u32)].clone();
        for id in 0..10u32 {
            report.fits.insert(RunId::from(id), fit.clone());
        }
        let ids: Vec<String> = sample_runs(&report, 5)
            .into_iter()
            .map(|id| id.to_string())
            .collect();
        assert_eq!(ids, vec!["0", "2", "4", "6", "8"]);
        assert_eq!(sample_runs(&report, 0).len(), 0);
    }

    #[test]
    fn test_plot_script_renders() {
        let sweep = sweep();
        let analysis = analyze(&sweep, &AnalysisConfig::default()).unwrap();
        let script = generate_plot_script(&sweep, &analysis, &PlotConfig::default()).unwrap();

        assert!(script.contains("import matplotlib.pyplot as plt"));
        assert!(script.contains("ax.set_yscale(\"log\")"));
        assert!(script.contains("Fitting range: 5"));
        assert!(script.contains("Time [ns]"));
        assert!(script.contains("N_0 = 10"));
        assert!(script.contains("N_0 = 20"));
    }
}
