//! Module containing the per-stage vehicle and route constants and the table
//! they are looked up in.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use crate::imports::*;
use crate::params::SECS_PER_HOUR;
use crate::utils::{interpolate, is_strictly_increasing};

const BUILTIN_STAGES_YAML: &str = include_str!("../resources/stages.yaml");

lazy_static::lazy_static! {
    static ref BUILTIN_STAGES: anyhow::Result<StageTable> = StageTable::from_yaml(BUILTIN_STAGES_YAML);
}

/// Road grade as a function of route distance.
///
/// `grade[i]` applies from `dist_m[i]` up to `dist_m[i + 1]`; the last entry
/// applies to the end of the route and the first entry also covers any
/// distance before `dist_m[0]`. An empty profile is a flat route.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default, ApproxEq)]
pub struct GradeProfile {
    /// segment start distances [m]
    pub dist_m: Vec<f64>,
    /// grade [rise/run]
    pub grade: Vec<f64>,
}

impl GradeProfile {
    pub fn flat() -> Self {
        Self::default()
    }

    /// Constant grade over the whole route
    pub fn uniform(grade: f64) -> Self {
        Self {
            dist_m: vec![0.0],
            grade: vec![grade],
        }
    }

    /// Returns grade [rise/run] at route distance `dist_m`
    pub fn grade_at(&self, dist_m: f64) -> f64 {
        if self.grade.is_empty() {
            return 0.0;
        }
        let idx = self
            .dist_m
            .iter()
            .rposition(|&d| d <= dist_m)
            .unwrap_or(0);
        self.grade[idx]
    }

    /// Returns road inclination angle [rad] at route distance `dist_m`
    pub fn angle_at(&self, dist_m: f64) -> f64 {
        self.grade_at(dist_m).atan()
    }

    fn init_checks(&self) -> anyhow::Result<()> {
        if self.dist_m.len() != self.grade.len() {
            bail_configuration!(
                "grade profile has unequal field lengths\ndist_m: {}\ngrade: {}",
                self.dist_m.len(),
                self.grade.len()
            );
        }
        if !is_strictly_increasing(&self.dist_m) {
            bail_configuration!("grade profile distances are not strictly increasing");
        }
        if self.grade.iter().chain(&self.dist_m).any(|x| !x.is_finite()) {
            bail_configuration!("grade profile contains non-finite values");
        }
        Ok(())
    }
}

/// Incident solar power per unit panel area.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum InsolationModel {
    /// Same irradiance everywhere and at all times
    Constant { w_per_m2: f64 },
    /// Piecewise-linear in route distance, clamped beyond the table ends
    ByDistance { dist_m: Vec<f64>, w_per_m2: Vec<f64> },
    /// Half-sine over daylight hours on the wall clock, zero at night.
    /// The clock reads `start_hour` when the simulation begins.
    DailyCycle {
        peak_w_per_m2: f64,
        sunrise_hour: f64,
        sunset_hour: f64,
        start_hour: f64,
    },
}

impl Default for InsolationModel {
    fn default() -> Self {
        Self::Constant { w_per_m2: 0.0 }
    }
}

impl InsolationModel {
    /// Returns irradiance [W/m^2] at route distance `dist_m`, `elapsed_s`
    /// seconds after the simulation started
    pub fn w_per_m2(&self, dist_m: f64, elapsed_s: f64) -> f64 {
        match self {
            Self::Constant { w_per_m2 } => *w_per_m2,
            Self::ByDistance {
                dist_m: ds,
                w_per_m2,
            } => interpolate(dist_m, ds, w_per_m2, false),
            Self::DailyCycle {
                peak_w_per_m2,
                sunrise_hour,
                sunset_hour,
                start_hour,
            } => {
                let hour = (start_hour + elapsed_s / SECS_PER_HOUR).rem_euclid(24.0);
                if hour <= *sunrise_hour || hour >= *sunset_hour {
                    0.0
                } else {
                    peak_w_per_m2
                        * (PI * (hour - sunrise_hour) / (sunset_hour - sunrise_hour)).sin()
                }
            }
        }
    }

    fn init_checks(&self) -> anyhow::Result<()> {
        match self {
            Self::Constant { w_per_m2 } => {
                if !(w_per_m2.is_finite() && *w_per_m2 >= 0.0) {
                    bail_configuration!("constant insolation must be finite and non-negative");
                }
            }
            Self::ByDistance { dist_m, w_per_m2 } => {
                if dist_m.is_empty() || dist_m.len() != w_per_m2.len() {
                    bail_configuration!(
                        "insolation table needs equal, non-zero field lengths\ndist_m: {}\nw_per_m2: {}",
                        dist_m.len(),
                        w_per_m2.len()
                    );
                }
                if !is_strictly_increasing(dist_m) {
                    bail_configuration!("insolation table distances are not strictly increasing");
                }
                if w_per_m2.iter().any(|w| !(w.is_finite() && *w >= 0.0)) {
                    bail_configuration!("insolation table values must be finite and non-negative");
                }
            }
            Self::DailyCycle {
                peak_w_per_m2,
                sunrise_hour,
                sunset_hour,
                start_hour,
            } => {
                if !(peak_w_per_m2.is_finite() && *peak_w_per_m2 >= 0.0) {
                    bail_configuration!("peak insolation must be finite and non-negative");
                }
                if !(0.0..24.0).contains(sunrise_hour)
                    || !(0.0..=24.0).contains(sunset_hour)
                    || sunrise_hour >= sunset_hour
                {
                    bail_configuration!(
                        "daylight window [{sunrise_hour}, {sunset_hour}] must lie within one day"
                    );
                }
                if !start_hour.is_finite() {
                    bail_configuration!("start hour must be finite");
                }
            }
        }
        Ok(())
    }
}

impl ApproxEq for InsolationModel {
    fn approx_eq(&self, other: &Self, tol: f64) -> bool {
        match (self, other) {
            (Self::Constant { w_per_m2: a }, Self::Constant { w_per_m2: b }) => a.approx_eq(b, tol),
            (
                Self::ByDistance {
                    dist_m: da,
                    w_per_m2: wa,
                },
                Self::ByDistance {
                    dist_m: db,
                    w_per_m2: wb,
                },
            ) => da.approx_eq(db, tol) && wa.approx_eq(wb, tol),
            (
                Self::DailyCycle {
                    peak_w_per_m2: pa,
                    sunrise_hour: ra,
                    sunset_hour: sa,
                    start_hour: ta,
                },
                Self::DailyCycle {
                    peak_w_per_m2: pb,
                    sunrise_hour: rb,
                    sunset_hour: sb,
                    start_hour: tb,
                },
            ) => {
                pa.approx_eq(pb, tol)
                    && ra.approx_eq(rb, tol)
                    && sa.approx_eq(sb, tol)
                    && ta.approx_eq(tb, tol)
            }
            _ => false,
        }
    }
}

/// Immutable vehicle and route constants for one race stage
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ApproxEq)]
pub struct StageParams {
    /// vehicle mass including driver [kg]
    pub veh_kg: f64,
    /// aerodynamic drag coefficient
    pub drag_coef: f64,
    /// frontal area [m^2]
    pub frontal_area_m2: f64,
    /// tire rolling resistance coefficient
    pub wheel_rr_coef: f64,
    /// solar array area [m^2]
    pub panel_area_m2: f64,
    /// solar array efficiency, fraction
    pub panel_eff: f64,
    /// battery capacity at stage start [Wh]
    pub init_capacity_wh: f64,
    /// nominal battery capacity [Wh], reported but never enforced by the engine
    pub max_capacity_wh: f64,
    /// stage length measured from route distance zero [m]
    pub stage_dist_m: f64,
    #[serde(default)]
    pub grade: GradeProfile,
    #[serde(default)]
    pub insolation: InsolationModel,
}

impl SerdeAPI for StageParams {
    fn init(&mut self) -> anyhow::Result<()> {
        self.init_checks()
    }
}

impl StageParams {
    /// Synthetic stage on flat ground in the dark; useful as a baseline
    pub fn test_stage() -> Self {
        Self {
            veh_kg: 300.0,
            drag_coef: 0.12,
            frontal_area_m2: 1.0,
            wheel_rr_coef: 0.006,
            panel_area_m2: 4.0,
            panel_eff: 0.24,
            init_capacity_wh: 5000.0,
            max_capacity_wh: 5000.0,
            stage_dist_m: 100_000.0,
            grade: GradeProfile::flat(),
            insolation: InsolationModel::Constant { w_per_m2: 0.0 },
        }
    }

    /// Electrical power [W] delivered by the array at irradiance `w_per_m2`
    pub fn solar_w(&self, w_per_m2: f64) -> f64 {
        w_per_m2 * self.panel_area_m2 * self.panel_eff
    }

    fn init_checks(&self) -> anyhow::Result<()> {
        let non_negative = [
            ("veh_kg", self.veh_kg),
            ("drag_coef", self.drag_coef),
            ("frontal_area_m2", self.frontal_area_m2),
            ("wheel_rr_coef", self.wheel_rr_coef),
            ("panel_area_m2", self.panel_area_m2),
            ("max_capacity_wh", self.max_capacity_wh),
            ("stage_dist_m", self.stage_dist_m),
        ];
        for (name, val) in non_negative {
            if !(val.is_finite() && val >= 0.0) {
                bail_configuration!("`{name}` must be finite and non-negative, got {val}");
            }
        }
        if !(0.0..=1.0).contains(&self.panel_eff) {
            bail_configuration!("`panel_eff` must be within [0, 1], got {}", self.panel_eff);
        }
        if !self.init_capacity_wh.is_finite() {
            bail_configuration!("`init_capacity_wh` must be finite");
        }
        self.grade.init_checks()?;
        self.insolation.init_checks()?;
        Ok(())
    }
}

/// Stage constants keyed by stage id
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default, ApproxEq)]
#[serde(transparent)]
pub struct StageTable {
    pub stages: BTreeMap<String, StageParams>,
}

impl SerdeAPI for StageTable {
    fn init(&mut self) -> anyhow::Result<()> {
        for (id, stage) in self.stages.iter() {
            stage
                .init_checks()
                .with_context(|| format!("stage {id:?}"))?;
        }
        Ok(())
    }
}

impl StageTable {
    /// The stage table shipped with the crate, parsed once per process
    pub fn builtin() -> anyhow::Result<&'static StageTable> {
        BUILTIN_STAGES
            .as_ref()
            .map_err(|err| anyhow!("built-in stage table failed to load: {err:?}"))
    }

    /// Looks up the constants for `stage_id`
    pub fn get(&self, stage_id: &str) -> anyhow::Result<&StageParams> {
        match self.stages.get(stage_id) {
            Some(stage) => Ok(stage),
            None => bail_configuration!(
                "unknown stage id {stage_id:?}, expected one of {:?}",
                self.ids()
            ),
        }
    }

    /// Adds or replaces a stage after checking its constants
    pub fn insert<S: Into<String>>(&mut self, stage_id: S, stage: StageParams) -> anyhow::Result<()> {
        let stage_id = stage_id.into();
        stage
            .init_checks()
            .with_context(|| format!("stage {stage_id:?}"))?;
        self.stages.insert(stage_id, stage);
        Ok(())
    }

    pub fn ids(&self) -> Vec<&str> {
        self.stages.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table_has_race_stages() {
        let table = StageTable::builtin().unwrap();
        assert_eq!(table.ids(), vec!["1A", "1B"]);
        let stage = table.get("1B").unwrap();
        assert_eq!(stage.stage_dist_m, 236_800.0);
        assert!(stage.init_capacity_wh <= stage.max_capacity_wh);
    }

    #[test]
    fn test_unknown_stage_is_configuration_error() {
        let table = StageTable::builtin().unwrap();
        let err = table.get("NONEXISTENT").unwrap_err();
        assert!(SimError::find(&err).unwrap().is_configuration());
    }

    #[test]
    fn test_grade_lookup_is_stepwise() {
        let grade = GradeProfile {
            dist_m: vec![0.0, 100.0, 250.0],
            grade: vec![0.0, 0.05, -0.02],
        };
        assert_eq!(grade.grade_at(-5.0), 0.0);
        assert_eq!(grade.grade_at(99.9), 0.0);
        assert_eq!(grade.grade_at(100.0), 0.05);
        assert_eq!(grade.grade_at(249.0), 0.05);
        assert_eq!(grade.grade_at(1e9), -0.02);
        assert_eq!(GradeProfile::flat().grade_at(10.0), 0.0);
        assert!((GradeProfile::uniform(1.0).angle_at(3.0) - PI / 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_daily_cycle_insolation() {
        let model = InsolationModel::DailyCycle {
            peak_w_per_m2: 1000.0,
            sunrise_hour: 6.0,
            sunset_hour: 18.0,
            start_hour: 12.0,
        };
        // solar noon
        assert!((model.w_per_m2(0.0, 0.0) - 1000.0).abs() < 1e-9);
        // 3 h later is a quarter of the window from sunset
        let three_pm = model.w_per_m2(0.0, 3.0 * SECS_PER_HOUR);
        assert!((three_pm - 1000.0 * (0.75 * PI).sin()).abs() < 1e-9);
        // night, and the next morning wraps around midnight
        assert_eq!(model.w_per_m2(0.0, 8.0 * SECS_PER_HOUR), 0.0);
        assert!(model.w_per_m2(0.0, 22.0 * SECS_PER_HOUR) > 0.0);
    }

    #[test]
    fn test_by_distance_insolation_clamps() {
        let model = InsolationModel::ByDistance {
            dist_m: vec![0.0, 1000.0],
            w_per_m2: vec![200.0, 600.0],
        };
        assert_eq!(model.w_per_m2(500.0, 0.0), 400.0);
        assert_eq!(model.w_per_m2(5000.0, 0.0), 600.0);
        assert_eq!(model.w_per_m2(-1.0, 1e6), 200.0);
    }

    #[test]
    fn test_stage_yaml_validation() {
        let mut stage = StageParams::test_stage();
        stage.panel_eff = 1.5;
        let yaml = stage.to_yaml().unwrap();
        let err = StageParams::from_yaml(yaml).unwrap_err();
        assert!(SimError::find(&err).unwrap().is_configuration());

        let mut stage = StageParams::test_stage();
        stage.grade = GradeProfile {
            dist_m: vec![0.0, 0.0],
            grade: vec![0.01, 0.02],
        };
        assert!(StageTable::default().insert("bad", stage).is_err());
    }

    #[test]
    fn test_stage_table_str_serde() {
        let table = StageTable::builtin().unwrap();
        for format in ["yaml", "json"] {
            let s = table.to_str(format).unwrap();
            let table_de = StageTable::from_str(&s, format).unwrap();
            assert!(table.approx_eq(&table_de, 1e-12));
        }
    }
}
