//! Module for turning a simulation trace into chart-ready series.
//!
//! Nothing here draws; the output is plain data for whatever renderer sits
//! downstream. Step `i` on the x-axis spans `[i, i + 1)`, so per-step series
//! have `N` entries and boundary series (distance, time) have `N + 1`.

use crate::imports::*;
use crate::params::{M_PER_KM, SECS_PER_HOUR};
use crate::simdrive::SimOutput;
use crate::utils::{arrmax, arrmin, first_geq, interpolate};

/// Route distance [km] at every step boundary, starting at 0
pub fn cumulative_distance_km(velocities: &[f64], dt_s: f64) -> Vec<f64> {
    std::iter::once(0.0)
        .chain(velocities.iter().scan(0.0, |dist_m, &v| {
            *dist_m += v * dt_s;
            Some(*dist_m / M_PER_KM)
        }))
        .collect()
}

/// First boundary index at which `cum_km` reaches `stage_km`
pub fn stage_completion_step(cum_km: &[f64], stage_km: f64) -> Option<usize> {
    first_geq(cum_km, stage_km)
}

/// Velocities rescaled to `[0, 1]` by min and max; a flat profile maps to zeros
pub fn velocity_intensity(velocities: &[f64]) -> Vec<f64> {
    let (lo, hi) = (arrmin(velocities), arrmax(velocities));
    let span = hi - lo;
    if !(span.is_finite() && span > 0.0) {
        return vec![0.0; velocities.len()];
    }
    velocities.iter().map(|v| (v - lo) / span).collect()
}

/// Fractional step index at which each reference point's distance is reached
pub fn overlay_steps(reference: &ReferenceCapacity, cum_km: &[f64]) -> Vec<f64> {
    let steps: Vec<f64> = (0..cum_km.len()).map(|i| i as f64).collect();
    reference
        .points
        .iter()
        .map(|p| interpolate(p.distance_km, cum_km, &steps, false))
        .collect()
}

/// Elapsed hours at every step boundary
pub fn time_axis_hours(n: usize, dt_s: f64) -> Vec<f64> {
    (0..=n).map(|i| i as f64 * dt_s / SECS_PER_HOUR).collect()
}

/// Which power series to carry into [ChartData]
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesSelection {
    pub solar: bool,
    pub rolling: bool,
    pub drag: bool,
    pub gradient: bool,
    pub capacity: bool,
}

impl Default for SeriesSelection {
    fn default() -> Self {
        Self::all()
    }
}

impl SeriesSelection {
    pub fn all() -> Self {
        Self {
            solar: true,
            rolling: true,
            drag: true,
            gradient: true,
            capacity: true,
        }
    }

    pub fn none() -> Self {
        Self {
            solar: false,
            rolling: false,
            drag: false,
            gradient: false,
            capacity: false,
        }
    }

    /// Parses a comma separated list such as `"solar,capacity"`
    pub fn parse(list: &str) -> anyhow::Result<Self> {
        let mut sel = Self::none();
        for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match name {
                "solar" => sel.solar = true,
                "rolling" => sel.rolling = true,
                "drag" => sel.drag = true,
                "gradient" => sel.gradient = true,
                "capacity" => sel.capacity = true,
                "all" => sel = Self::all(),
                _ => bail!(
                    "unknown series {name:?}, expected any of solar, rolling, drag, gradient, capacity, all"
                ),
            }
        }
        Ok(sel)
    }
}

/// Measured capacity at one route distance
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default, ApproxEq)]
pub struct ReferencePoint {
    pub distance_km: f64,
    pub capacity_wh: f64,
}

/// Measured capacity points to overlay on a simulated trace
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default, ApproxEq)]
pub struct ReferenceCapacity {
    pub points: Vec<ReferencePoint>,
}

impl SerdeAPI for ReferenceCapacity {
    fn init(&mut self) -> anyhow::Result<()> {
        if let Some(p) = self
            .points
            .iter()
            .find(|p| !(p.distance_km.is_finite() && p.capacity_wh.is_finite()))
        {
            bail_validation!("non-finite reference point {p:?}");
        }
        Ok(())
    }
}

impl ReferenceCapacity {
    /// Reads `distance_km,capacity_wh` rows
    pub fn from_csv_reader<R: std::io::Read>(rdr: R) -> anyhow::Result<Self> {
        let mut rdr = csv::Reader::from_reader(rdr);
        let mut reference = Self {
            points: rdr
                .deserialize()
                .collect::<Result<Vec<ReferencePoint>, _>>()?,
        };
        reference.init()?;
        Ok(reference)
    }

    pub fn from_csv_str<S: AsRef<str>>(csv_str: S) -> anyhow::Result<Self> {
        Self::from_csv_reader(csv_str.as_ref().as_bytes())
    }

    pub fn from_csv_file<P: AsRef<Path>>(filepath: P) -> anyhow::Result<Self> {
        let filepath = filepath.as_ref();
        let file = File::open(filepath)
            .with_context(|| format!("Could not open file: {filepath:?}"))?;
        Self::from_csv_reader(file).with_context(|| format!("Could not parse {filepath:?}"))
    }

    /// Reference data packaged for `stage_id`, if any
    #[cfg(feature = "resources")]
    pub fn builtin(stage_id: &str) -> anyhow::Result<Option<Self>> {
        crate::resources::stage_reference(stage_id)
            .map(|file| Self::from_csv_reader(file.contents()))
            .transpose()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Reference point placed on the step axis
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, ApproxEq)]
pub struct OverlayPoint {
    pub step: f64,
    pub capacity_wh: f64,
}

/// Everything a renderer needs for the power and capacity charts
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ApproxEq)]
pub struct ChartData {
    pub stage_id: String,
    /// boundary times [h]
    pub time_hours: Vec<f64>,
    /// boundary route distances [km]
    pub distance_km: Vec<f64>,
    pub stage_completion_step: Option<usize>,
    pub velocity_intensity: Vec<f64>,
    pub solar_w: Option<Vec<f64>>,
    pub rolling_w: Option<Vec<f64>>,
    pub drag_w: Option<Vec<f64>>,
    pub gradient_w: Option<Vec<f64>>,
    pub capacity_wh: Option<Vec<f64>>,
    pub overlay: Vec<OverlayPoint>,
}

impl SerdeAPI for ChartData {
    fn init(&mut self) -> anyhow::Result<()> {
        let n = self.len();
        if self.time_hours.len() != n + 1 || self.distance_km.len() != n + 1 {
            bail_validation!(
                "{n} steps need {} boundary times and distances, got {} and {}",
                n + 1,
                self.time_hours.len(),
                self.distance_km.len()
            );
        }
        for (name, col) in self.selected_columns() {
            if col.len() != n {
                bail_validation!("series `{name}` has {} entries, expected {n}", col.len());
            }
        }
        if let Some(step) = self.stage_completion_step {
            if step > n {
                bail_validation!("stage completion step {step} is past the last boundary {n}");
            }
        }
        if let Some(p) = self
            .overlay
            .iter()
            .find(|p| !(0.0..=n as f64).contains(&p.step))
        {
            bail_validation!("overlay step {} is off the axis [0, {n}]", p.step);
        }
        Ok(())
    }
}

impl ChartData {
    /// Bundles chart series for `output`.
    /// Distances are route distances, offset by the run's start distance, so
    /// that `stage_km` and reference points share the route's frame.
    pub fn build(
        output: &SimOutput,
        stage_km: f64,
        reference: Option<&ReferenceCapacity>,
        selection: SeriesSelection,
    ) -> Self {
        let dt_s = output.params.dt_s();
        let velocities = output.trace.mps.to_vec();
        let start_km = output.params.start_distance_m / M_PER_KM;
        let distance_km: Vec<f64> = cumulative_distance_km(&velocities, dt_s)
            .into_iter()
            .map(|d| d + start_km)
            .collect();
        let pick = |on: bool, arr: &Array1<f64>| on.then(|| arr.to_vec());
        let overlay: Vec<OverlayPoint> = reference
            .map(|r| {
                overlay_steps(r, &distance_km)
                    .into_iter()
                    .zip(&r.points)
                    .map(|(step, p)| OverlayPoint {
                        step,
                        capacity_wh: p.capacity_wh,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            stage_id: output.params.stage_id.clone(),
            time_hours: time_axis_hours(velocities.len(), dt_s),
            stage_completion_step: stage_completion_step(&distance_km, stage_km),
            distance_km,
            velocity_intensity: velocity_intensity(&velocities),
            solar_w: pick(selection.solar, &output.trace.solar_w),
            rolling_w: pick(selection.rolling, &output.trace.rr_w),
            drag_w: pick(selection.drag, &output.trace.drag_w),
            gradient_w: pick(selection.gradient, &output.trace.ascent_w),
            capacity_wh: pick(selection.capacity, &output.trace.capacity_wh),
            overlay,
        }
    }

    /// Number of steps on the x-axis
    pub fn len(&self) -> usize {
        self.velocity_intensity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn selected_columns(&self) -> Vec<(&'static str, &Vec<f64>)> {
        [
            ("solar_w", &self.solar_w),
            ("rolling_w", &self.rolling_w),
            ("drag_w", &self.drag_w),
            ("gradient_w", &self.gradient_w),
            ("capacity_wh", &self.capacity_wh),
        ]
        .into_iter()
        .filter_map(|(name, col)| col.as_ref().map(|c| (name, c)))
        .collect()
    }

    /// One row per step; time and distance are taken at the step start.
    /// Overlay points are not part of the CSV layout.
    pub fn to_csv_writer<W: std::io::Write>(&self, wtr: W) -> anyhow::Result<()> {
        let mut wtr = csv::Writer::from_writer(wtr);
        let columns = self.selected_columns();
        let mut header = vec!["step", "time_h", "distance_km", "velocity_intensity"];
        header.extend(columns.iter().map(|(name, _)| *name));
        wtr.write_record(&header)?;
        for i in 0..self.len() {
            let mut record = vec![
                i.to_string(),
                self.time_hours[i].to_string(),
                self.distance_km[i].to_string(),
                self.velocity_intensity[i].to_string(),
            ];
            record.extend(columns.iter().map(|(_, col)| col[i].to_string()));
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn to_csv(&self) -> anyhow::Result<String> {
        let mut buf = Vec::new();
        self.to_csv_writer(&mut buf)?;
        Ok(String::from_utf8(buf)?)
    }

    /// Writes CSV for a `.csv` path, otherwise any [SerdeAPI] format
    pub fn write_file<P: AsRef<Path>>(&self, filepath: P) -> anyhow::Result<()> {
        let filepath = filepath.as_ref();
        match filepath.extension().and_then(OsStr::to_str) {
            Some("csv") => {
                let file = File::create(filepath)
                    .with_context(|| format!("Could not create file: {filepath:?}"))?;
                self.to_csv_writer(file)
            }
            _ => self.to_file(filepath),
        }
    }
}
