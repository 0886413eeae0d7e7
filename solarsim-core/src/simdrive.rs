//! Module containing the simulation parameters, the per-step trace and the
//! energy integrator that produces them.
//!
//! `discretization` counts reporting steps per hour: a step lasts
//! `3600 / discretization` seconds, the trace holds
//! `round(duration_hours * discretization)` steps and the velocity profile
//! must supply one sample per step.

use crate::imports::*;
use crate::params::{PhysicalProperties, SECS_PER_HOUR};
use crate::stage::StageTable;

pub mod simdrive_impl;
pub mod simdrive_iter;

pub use simdrive_impl::{simulate, SolarSim};
pub use simdrive_iter::simulate_batch;

/// Largest step count a run may have, a week at one step per second
pub const MAX_STEPS: usize = 7 * 24 * 3600;

/// Scalar inputs for one simulation run
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ApproxEq)]
pub struct SimParams {
    /// reporting steps per hour
    pub discretization: u32,
    /// total simulated horizon [h]
    pub duration_hours: f64,
    /// key into the stage table
    pub stage_id: String,
    /// route distance already covered when the run starts [m]
    #[serde(default)]
    pub start_distance_m: f64,
    #[serde(default)]
    pub props: PhysicalProperties,
}

impl SerdeAPI for SimParams {
    fn init(&mut self) -> anyhow::Result<()> {
        self.n_steps()?;
        Ok(())
    }
}

impl SimParams {
    pub fn new<S: Into<String>>(
        discretization: u32,
        duration_hours: f64,
        stage_id: S,
        start_distance_m: f64,
    ) -> Self {
        Self {
            discretization,
            duration_hours,
            stage_id: stage_id.into(),
            start_distance_m,
            props: PhysicalProperties::default(),
        }
    }

    /// Number of reporting steps, after checking the scalar parameters
    pub fn n_steps(&self) -> anyhow::Result<usize> {
        if self.discretization == 0 {
            bail_configuration!("`discretization` must be positive");
        }
        if !(self.duration_hours.is_finite() && self.duration_hours > 0.0) {
            bail_configuration!(
                "`duration_hours` must be positive, got {}",
                self.duration_hours
            );
        }
        if !(self.start_distance_m.is_finite() && self.start_distance_m >= 0.0) {
            bail_configuration!(
                "`start_distance_m` must be non-negative, got {}",
                self.start_distance_m
            );
        }
        let n = (self.duration_hours * self.discretization as f64).round();
        if n > MAX_STEPS as f64 {
            bail_configuration!(
                "{} h at {} steps per hour yields {n} reporting steps, more than {MAX_STEPS}",
                self.duration_hours,
                self.discretization
            );
        }
        if n < 1.0 {
            bail_configuration!(
                "{} h at {} steps per hour yields no reporting step",
                self.duration_hours,
                self.discretization
            );
        }
        Ok(n as usize)
    }

    /// Reporting step duration [s]
    pub fn dt_s(&self) -> f64 {
        SECS_PER_HOUR / self.discretization as f64
    }

    /// Reporting step duration [h]
    pub fn dt_h(&self) -> f64 {
        1.0 / self.discretization as f64
    }

    /// Runs the simulation for `velocities` against the built-in stage table
    pub fn simulate(&self, velocities: &[f64]) -> anyhow::Result<SimOutput> {
        simulate(velocities, self, StageTable::builtin()?)
    }
}

/// Power breakdown and capacity at the end of one reporting step
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default, ApproxEq)]
pub struct PowerSample {
    /// solar array output [W], a gain
    pub solar_w: f64,
    /// rolling resistance [W], a loss
    pub rolling_w: f64,
    /// aerodynamic drag [W], a loss
    pub drag_w: f64,
    /// gradient resistance [W], a loss, negative when descending
    pub gradient_w: f64,
    /// battery capacity [Wh]
    pub capacity_wh: f64,
}

/// Column-wise trace with one entry per reporting step
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default, ApproxEq)]
pub struct SimTrace {
    /// elapsed time at step end [s]
    pub time_s: Array1<f64>,
    /// speed used for the step [m/s]
    pub mps: Array1<f64>,
    /// route distance at step end [m]
    pub dist_m: Array1<f64>,
    pub solar_w: Array1<f64>,
    pub rr_w: Array1<f64>,
    pub drag_w: Array1<f64>,
    pub ascent_w: Array1<f64>,
    pub capacity_wh: Array1<f64>,
}

/// One row of [SimTrace] for CSV output
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
struct SimTraceElement {
    time_s: f64,
    mps: f64,
    dist_m: f64,
    solar_w: f64,
    rolling_w: f64,
    drag_w: f64,
    gradient_w: f64,
    capacity_wh: f64,
}

impl SimTrace {
    pub fn zeros(n: usize) -> Self {
        Self {
            time_s: Array::zeros(n),
            mps: Array::zeros(n),
            dist_m: Array::zeros(n),
            solar_w: Array::zeros(n),
            rr_w: Array::zeros(n),
            drag_w: Array::zeros(n),
            ascent_w: Array::zeros(n),
            capacity_wh: Array::zeros(n),
        }
    }

    pub fn len(&self) -> usize {
        self.time_s.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fails unless every column holds [SimTrace::len] entries
    pub fn check_lengths(&self) -> anyhow::Result<()> {
        let n = self.len();
        for (name, col) in [
            ("mps", &self.mps),
            ("dist_m", &self.dist_m),
            ("solar_w", &self.solar_w),
            ("rr_w", &self.rr_w),
            ("drag_w", &self.drag_w),
            ("ascent_w", &self.ascent_w),
            ("capacity_wh", &self.capacity_wh),
        ] {
            if col.len() != n {
                bail_validation!(
                    "trace column `{name}` has {} entries, `time_s` has {n}",
                    col.len()
                );
            }
        }
        Ok(())
    }

    pub fn sample(&self, i: usize) -> PowerSample {
        PowerSample {
            solar_w: self.solar_w[i],
            rolling_w: self.rr_w[i],
            drag_w: self.drag_w[i],
            gradient_w: self.ascent_w[i],
            capacity_wh: self.capacity_wh[i],
        }
    }

    pub fn samples(&self) -> Vec<PowerSample> {
        (0..self.len()).map(|i| self.sample(i)).collect()
    }

    /// `N x 5` matrix with columns solar, rolling, drag, gradient, capacity
    pub fn to_matrix(&self) -> anyhow::Result<Array2<f64>> {
        Ok(ndarray::stack(
            Axis(1),
            &[
                self.solar_w.view(),
                self.rr_w.view(),
                self.drag_w.view(),
                self.ascent_w.view(),
                self.capacity_wh.view(),
            ],
        )?)
    }

    pub fn to_csv_writer<W: std::io::Write>(&self, wtr: W) -> anyhow::Result<()> {
        let mut wtr = csv::Writer::from_writer(wtr);
        for i in 0..self.len() {
            wtr.serialize(SimTraceElement {
                time_s: self.time_s[i],
                mps: self.mps[i],
                dist_m: self.dist_m[i],
                solar_w: self.solar_w[i],
                rolling_w: self.rr_w[i],
                drag_w: self.drag_w[i],
                gradient_w: self.ascent_w[i],
                capacity_wh: self.capacity_wh[i],
            })?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Write (serialize) the trace to a CSV string
    pub fn to_csv(&self) -> anyhow::Result<String> {
        let mut buf = Vec::with_capacity(self.len());
        self.to_csv_writer(&mut buf)?;
        Ok(String::from_utf8(buf)?)
    }

    /// Write the trace as CSV to `filepath`
    pub fn to_csv_file<P: AsRef<Path>>(&self, filepath: P) -> anyhow::Result<()> {
        let filepath = filepath.as_ref();
        let file = File::create(filepath)
            .with_context(|| format!("Could not create file: {filepath:?}"))?;
        self.to_csv_writer(file)
    }
}

/// Stage-level energy totals computed after the run
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default, ApproxEq)]
pub struct EnergySummary {
    pub solar_wh: f64,
    pub rr_wh: f64,
    pub drag_wh: f64,
    pub ascent_wh: f64,
    /// solar minus all losses [Wh]
    pub net_wh: f64,
    /// distance driven during the run [m]
    pub dist_m: f64,
    /// capacity change not explained by `net_wh` [Wh]
    pub energy_audit_error_wh: f64,
}

/// Result of one simulation run
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ApproxEq)]
pub struct SimOutput {
    pub params: SimParams,
    pub init_capacity_wh: f64,
    pub final_capacity_wh: f64,
    pub trace: SimTrace,
    pub summary: EnergySummary,
}

impl SerdeAPI for SimOutput {
    fn init(&mut self) -> anyhow::Result<()> {
        let n = self.params.n_steps()?;
        self.trace.check_lengths()?;
        if self.trace.len() != n {
            bail_validation!(
                "trace holds {} steps but params call for {n}",
                self.trace.len()
            );
        }
        Ok(())
    }
}

impl SimOutput {
    pub fn len(&self) -> usize {
        self.trace.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trace.is_empty()
    }

    pub fn samples(&self) -> Vec<PowerSample> {
        self.trace.samples()
    }

    pub fn to_matrix(&self) -> anyhow::Result<Array2<f64>> {
        self.trace.to_matrix()
    }

    /// Capacity trace limited to `[min_wh, max_wh]`.
    /// The engine never clamps; this is a presentation policy for callers.
    pub fn clamped_capacity(&self, min_wh: f64, max_wh: f64) -> anyhow::Result<Array1<f64>> {
        ensure!(
            min_wh <= max_wh,
            "{}",
            format_dbg!((min_wh, max_wh))
        );
        Ok(self.trace.capacity_wh.mapv(|c| c.clamp(min_wh, max_wh)))
    }

    /// First step whose capacity is below zero
    pub fn first_depletion_step(&self) -> Option<usize> {
        self.trace.capacity_wh.iter().position(|&c| c < 0.0)
    }
}
