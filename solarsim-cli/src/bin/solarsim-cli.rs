use clap::{ArgGroup, Parser};
use rand::distributions::{Distribution, Uniform};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use std::fs::File;
use std::path::Path;

use anyhow::{bail, ensure, Context};
extern crate solarsim_core;
use solarsim_core::params::M_PER_KM;
use solarsim_core::prelude::*;

/// Solar vehicle energy budget simulation.
/// After running `cargo build --release`, run with
/// ```bash
/// ./target/release/solarsim-cli --stage 1B --hours 8 --disc 60 --constant-speed 22
/// ```
/// or, with a measured profile holding one speed per reporting step,
/// ```bash
/// ./target/release/solarsim-cli --velocity-file profile.csv --trace-out trace.csv
/// ```
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(group(
    ArgGroup::new("velocity")
    .required(true)
    .args(&["velocity-file", "constant-speed", "random-speed"])
))]
struct SolarSimApi {
    /// Reporting steps per hour
    #[clap(long, value_parser, default_value_t = 3600)]
    disc: u32,
    /// Simulated horizon (h)
    #[clap(long, value_parser, default_value_t = 8.0)]
    hours: f64,
    /// Stage id to look up in the stage table
    #[clap(long, value_parser, default_value = "1B")]
    stage: String,
    /// Route distance already covered at the start of the run (m)
    #[clap(long, value_parser, default_value_t = 0.0)]
    start_distance: f64,
    /// Path to velocity profile: csv with a `velocity_mps` column, or one value (m/s) per line
    #[clap(long, value_parser)]
    velocity_file: Option<String>,
    /// Drive every step at this speed (m/s)
    #[clap(long, value_parser)]
    constant_speed: Option<f64>,
    /// Draw every step's speed uniformly from MIN..=MAX (m/s)
    #[clap(long, value_parser, number_of_values = 2, value_names = &["MIN", "MAX"])]
    random_speed: Option<Vec<f64>>,
    /// Seed for `--random-speed`
    #[clap(long, value_parser, requires = "random-speed")]
    seed: Option<u64>,
    /// Path to stage table file (yaml or json), replacing the built-in stages
    #[clap(long, value_parser)]
    stage_file: Option<String>,
    /// How to return results: `capacity`, `json`, `yaml` or `summary`
    #[clap(long, value_parser, default_value = "capacity")]
    res_fmt: String,
    /// Write the per-step trace as csv
    #[clap(long, value_parser)]
    trace_out: Option<String>,
    /// Write chart series (json, yaml or csv)
    #[clap(long, value_parser)]
    chart_out: Option<String>,
    /// Power series to include in chart output, comma separated
    #[clap(long, value_parser, default_value = "all")]
    series: String,
    /// Measured capacity points (csv `distance_km,capacity_wh`) to overlay on charts
    #[clap(long, value_parser, requires = "chart-out")]
    reference_file: Option<String>,
}

#[derive(Debug, Serialize)]
struct RunSummary<'a> {
    stage_id: &'a str,
    steps: usize,
    init_capacity_wh: f64,
    final_capacity_wh: f64,
    first_depletion_step: Option<usize>,
    energy: &'a EnergySummary,
}

pub fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let api = SolarSimApi::parse();
    let params = SimParams::new(api.disc, api.hours, api.stage.as_str(), api.start_distance);

    let owned_table;
    let table: &StageTable = if let Some(stage_file) = &api.stage_file {
        owned_table = StageTable::from_file(stage_file)
            .with_context(|| format!("Could not load stage table {stage_file:?}"))?;
        &owned_table
    } else {
        StageTable::builtin()?
    };

    let velocities = if let Some(velocity_file) = &api.velocity_file {
        read_velocity_file(velocity_file)?
    } else if let Some(speed) = api.constant_speed {
        vec![speed; params.n_steps()?]
    } else if let Some(bounds) = &api.random_speed {
        random_profile(bounds, params.n_steps()?, api.seed)?
    } else {
        bail!("no velocity source given")
    };

    let out = simulate(&velocities, &params, table)?;

    if let Some(trace_out) = &api.trace_out {
        out.trace.to_csv_file(trace_out)?;
    }

    if let Some(chart_out) = &api.chart_out {
        let reference = match &api.reference_file {
            Some(reference_file) => Some(ReferenceCapacity::from_csv_file(reference_file)?),
            None => ReferenceCapacity::builtin(&api.stage)?,
        };
        let stage_km = table.get(&api.stage)?.stage_dist_m / M_PER_KM;
        let selection = SeriesSelection::parse(&api.series)?;
        ChartData::build(&out, stage_km, reference.as_ref(), selection).write_file(chart_out)?;
    }

    match api.res_fmt.as_str() {
        "capacity" => println!("{}", out.final_capacity_wh),
        "json" => println!("{}", out.to_json()?),
        "yaml" => println!("{}", out.to_yaml()?),
        "summary" => {
            let summary = RunSummary {
                stage_id: &out.params.stage_id,
                steps: out.len(),
                init_capacity_wh: out.init_capacity_wh,
                final_capacity_wh: out.final_capacity_wh,
                first_depletion_step: out.first_depletion_step(),
                energy: &out.summary,
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        other => bail!(
            "Invalid option `{other}` for `--res-fmt`, expected `capacity`, `json`, `yaml` or `summary`"
        ),
    }
    Ok(())
}

/// One row of a velocity csv with a header; other columns are ignored
#[derive(Debug, Deserialize)]
struct VelocityElement {
    velocity_mps: f64,
}

/// Reads a csv with a `velocity_mps` column, or a bare list with one value per line
fn read_velocity_file<P: AsRef<Path>>(filepath: P) -> anyhow::Result<Vec<f64>> {
    let filepath = filepath.as_ref();
    let file = File::open(filepath)
        .with_context(|| format!("Could not read velocity file {filepath:?}"))?;
    parse_velocities(file).with_context(|| format!("Could not parse {filepath:?}"))
}

/// A first record whose leading field is a number starts a bare list,
/// anything else is a header naming the columns.
fn parse_velocities<R: std::io::Read>(rdr: R) -> anyhow::Result<Vec<f64>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_reader(rdr);
    let mut records = reader.records();
    let first = match records.next() {
        Some(first) => first?,
        None => return Ok(vec![]),
    };
    let line_of = |record: &csv::StringRecord| record.position().map_or(0, csv::Position::line);

    if first.get(0).map_or(false, |field| field.parse::<f64>().is_ok()) {
        return std::iter::once(Ok(first))
            .chain(records)
            .map(|record| {
                let record = record?;
                let speed: f64 = record.deserialize(None).with_context(|| {
                    format!("line {}: {record:?} is not a number", line_of(&record))
                })?;
                Ok(speed)
            })
            .collect();
    }

    ensure!(
        first.iter().any(|name| name == "velocity_mps"),
        "no `velocity_mps` column in header {first:?}"
    );
    records
        .map(|record| {
            let record = record?;
            let row: VelocityElement = record.deserialize(Some(&first)).with_context(|| {
                format!("line {}: bad `velocity_mps` in {record:?}", line_of(&record))
            })?;
            Ok(row.velocity_mps)
        })
        .collect()
}

fn random_profile(bounds: &[f64], n: usize, seed: Option<u64>) -> anyhow::Result<Vec<f64>> {
    ensure!(bounds.len() == 2, "`--random-speed` takes MIN and MAX");
    let (min, max) = (bounds[0], bounds[1]);
    ensure!(
        min.is_finite() && max.is_finite() && 0.0 <= min && min <= max,
        "`--random-speed` bounds must satisfy 0 <= MIN <= MAX, got {min} and {max}"
    );
    let mut rng = match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };
    let dist = Uniform::new_inclusive(min, max);
    Ok((0..n).map(|_| dist.sample(&mut rng)).collect())
}
