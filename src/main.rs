//! mp-growth: CLI tool for fitting multipactor growth factors from CST exports

use anyhow::{Context, Result};
use clap::Parser;
use multipactor_fit::{
    analyze, generate_plot_script, load_sweep, printc, write_alpha_csv, write_population_csv,
    AnalysisConfig, Color, FrequencyUnit, GrowthModel, LoaderConfig, PlotConfig, SingularPolicy,
    TimeUnit,
};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mp-growth")]
#[command(about = "Fit exponential growth factors of multipactor sweeps exported by CST")]
#[command(version)]
struct Args {
    /// CST "Export Parametric" directory
    #[arg(short, long)]
    input: PathBuf,

    /// Growth model
    #[arg(long, default_value = "classic")]
    model: String,

    /// Fitting window in RF periods
    #[arg(long, default_value = "5")]
    periods: f64,

    /// Fitting window in time units (overrides --periods)
    #[arg(long)]
    fitting_range: Option<f64>,

    /// Time unit of the exported series (s, ms, us, ns, ps)
    #[arg(long, default_value = "ns")]
    time_unit: String,

    /// Unit of the frequency parameter (hz, mhz, ghz)
    #[arg(long, default_value = "hz")]
    frequency_unit: String,

    /// Name of the frequency parameter
    #[arg(long, default_value = "f")]
    frequency_key: String,

    /// Several frequencies in the sweep: first, error, or a value to select
    #[arg(long, default_value = "first")]
    frequency_policy: String,

    /// Parameters to index runs on
    #[arg(long, value_delimiter = ',', default_value = "E_acc,size_cell,f")]
    index_keys: Vec<String>,

    /// Write alpha per run as CSV
    #[arg(long)]
    alpha_csv: Option<PathBuf>,

    /// Write particle counts and model curves as CSV
    #[arg(long)]
    population_csv: Option<PathBuf>,

    /// Write a matplotlib script plotting the results
    #[arg(long)]
    script: Option<PathBuf>,

    /// Write the full fit report as JSON
    #[arg(long)]
    json: Option<PathBuf>,

    /// Print alpha for every run
    #[arg(long)]
    print_fits: bool,
}

fn parse_time_unit(s: &str) -> Result<TimeUnit> {
    match s.to_lowercase().as_str() {
        "s" | "second" | "seconds" => Ok(TimeUnit::Second),
        "ms" | "millisecond" | "milliseconds" => Ok(TimeUnit::Millisecond),
        "us" | "µs" | "microsecond" | "microseconds" => Ok(TimeUnit::Microsecond),
        "ns" | "nanosecond" | "nanoseconds" => Ok(TimeUnit::Nanosecond),
        "ps" | "picosecond" | "picoseconds" => Ok(TimeUnit::Picosecond),
        _ => anyhow::bail!("Unknown time unit: {}. Use: s, ms, us, ns, or ps", s),
    }
}

fn parse_frequency_unit(s: &str) -> Result<FrequencyUnit> {
    match s.to_lowercase().as_str() {
        "hz" => Ok(FrequencyUnit::Hertz),
        "mhz" => Ok(FrequencyUnit::Megahertz),
        "ghz" => Ok(FrequencyUnit::Gigahertz),
        _ => anyhow::bail!("Unknown frequency unit: {}. Use: hz, mhz, or ghz", s),
    }
}

fn parse_policy(s: &str) -> Result<SingularPolicy> {
    match s.to_lowercase().as_str() {
        "first" => Ok(SingularPolicy::First),
        "error" => Ok(SingularPolicy::Error),
        value => value
            .parse::<f64>()
            .map(SingularPolicy::Select)
            .with_context(|| {
                format!("Unknown frequency policy: {}. Use: first, error, or a value", s)
            }),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let args = Args::parse();

    let time_unit = parse_time_unit(&args.time_unit)?;
    let config = AnalysisConfig {
        model: args.model.parse::<GrowthModel>()?,
        index_keys: args.index_keys.clone(),
        frequency_key: args.frequency_key.clone(),
        frequency_unit: parse_frequency_unit(&args.frequency_unit)?,
        frequency_policy: parse_policy(&args.frequency_policy)?,
        time_unit,
        periods: args.periods,
        fitting_range: args.fitting_range,
    };

    // Load
    let sweep = load_sweep(&args.input, &LoaderConfig::default())
        .with_context(|| format!("Failed to load sweep: {:?}", args.input))?;

    // Fit
    let analysis = analyze(&sweep, &config).context("Analysis failed")?;

    let frequencies = analysis.index.distinct(&config.frequency_key).unwrap_or_default();
    if frequencies.len() > 1 {
        printc(
            Color::Red,
            "warning: more than one frequency in the sweep, only considering",
            &[&analysis.frequency],
        );
    }

    for failure in &analysis.report.failures {
        printc(Color::Red, "fit failed for run", &[&failure.run, &failure.error]);
    }
    if args.print_fits {
        for (run, fit) in &analysis.report.fits {
            let values = analysis.index.run_to_values.get(run).cloned().unwrap_or_default();
            let label = format!("run {}", run);
            printc(Color::Cyan, &label, &[&format!("{:?}", values), &fit.alpha]);
        }
    }
    printc(
        Color::Green,
        "fitted",
        &[
            &analysis.report.fits.len(),
            &"of",
            &sweep.len(),
            &"runs over",
            &analysis.fitting_range,
            &time_unit.symbol(),
        ],
    );

    // Output
    if let Some(path) = &args.alpha_csv {
        let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
        let mut writer = BufWriter::new(file);
        write_alpha_csv(&analysis, &mut writer)?;
        writer.flush()?;
        eprintln!("Wrote growth factors: {:?}", path);
    }
    if let Some(path) = &args.population_csv {
        let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
        let mut writer = BufWriter::new(file);
        write_population_csv(&sweep, &analysis.report, &mut writer)?;
        writer.flush()?;
        eprintln!("Wrote populations: {:?}", path);
    }
    if let Some(path) = &args.script {
        let plot_config = PlotConfig {
            time_unit,
            ..PlotConfig::default()
        };
        let script = generate_plot_script(&sweep, &analysis, &plot_config)
            .context("Plot script generation failed")?;
        fs::write(path, &script)
            .with_context(|| format!("Failed to write output file: {:?}", path))?;
        eprintln!("Generated plot script: {:?}", path);
    }
    if let Some(path) = &args.json {
        let json = serde_json::to_string_pretty(&analysis)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write output file: {:?}", path))?;
        eprintln!("Wrote fit report: {:?}", path);
    }

    Ok(())
}
