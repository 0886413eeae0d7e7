//! Module containing implementations for [simdrive](crate::simdrive).

use crate::imports::*;
use crate::params::PhysicalProperties;
use crate::simdrive::{EnergySummary, SimOutput, SimParams, SimTrace};
use crate::stage::{StageParams, StageTable};

/// Runs one simulation: checks the inputs, walks every reporting step and
/// returns the final capacity together with the full trace.
///
/// # Arguments
/// - `velocities`: one speed [m/s] per reporting step; samples beyond the
///   horizon are ignored
/// - `params`: discretization, horizon, stage id and start distance
/// - `table`: stage constants, usually [StageTable::builtin]
///
/// # Errors
/// - [SimError::Configuration] for an unknown stage or out-of-domain parameters
/// - [SimError::Validation] for a short profile, or a negative or NaN speed
pub fn simulate(
    velocities: &[f64],
    params: &SimParams,
    table: &StageTable,
) -> anyhow::Result<SimOutput> {
    let n = params.n_steps()?;
    let stage = table.get(&params.stage_id)?;
    check_velocities(velocities, n)?;
    let mut sim = SolarSim::new(stage, params, n);
    sim.walk(&velocities[..n])?;
    sim.into_output()
}

fn check_velocities(velocities: &[f64], n: usize) -> anyhow::Result<()> {
    if velocities.len() < n {
        bail_validation!(
            "insufficient velocity samples: {} provided, {} reporting steps required",
            velocities.len(),
            n
        );
    }
    if let Some((i, v)) = velocities[..n]
        .iter()
        .enumerate()
        .find(|(_, v)| v.is_nan() || **v < 0.0)
    {
        bail_validation!("velocity sample {i} is {v}, expected a non-negative number");
    }
    #[cfg(feature = "logging")]
    if velocities.len() > n {
        log::debug!(
            "ignoring {} velocity samples beyond the {} step horizon",
            velocities.len() - n,
            n
        );
    }
    Ok(())
}

/// Forward integrator over one stage
pub struct SolarSim<'a> {
    pub stage: &'a StageParams,
    pub props: PhysicalProperties,
    pub params: SimParams,
    /// step counter
    pub i: usize,
    pub trace: SimTrace,
}

impl<'a> SolarSim<'a> {
    pub fn new(stage: &'a StageParams, params: &SimParams, n: usize) -> Self {
        Self {
            stage,
            props: params.props.clone(),
            params: params.clone(),
            i: 0,
            trace: SimTrace::zeros(n),
        }
    }

    pub fn len(&self) -> usize {
        self.trace.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trace.is_empty()
    }

    /// Steps through every reporting interval in order
    pub fn walk(&mut self, velocities: &[f64]) -> anyhow::Result<()> {
        ensure!(
            velocities.len() == self.len(),
            format_dbg!((velocities.len(), self.len()))
        );
        self.i = 0;
        while self.i < self.len() {
            self.solve_step(self.i, velocities[self.i]);
            self.i += 1;
        }
        Ok(())
    }

    /// Perform all the calculations to solve 1 time step.
    pub fn solve_step(&mut self, i: usize, mps: f64) {
        self.set_kinematics(i, mps);
        self.set_power_calcs(i);
        self.set_capacity(i);
    }

    /// Sets speed, elapsed time and route distance at the end of step `i`
    pub fn set_kinematics(&mut self, i: usize, mps: f64) {
        let dt_s = self.params.dt_s();
        let dist_prev = if i == 0 {
            self.params.start_distance_m
        } else {
            self.trace.dist_m[i - 1]
        };
        self.trace.mps[i] = mps;
        self.trace.time_s[i] = (i + 1) as f64 * dt_s;
        self.trace.dist_m[i] = dist_prev + mps * dt_s;
    }

    /// Sets solar gain and road load for step `i`.
    /// Grade and insolation are evaluated at the route distance reached at
    /// the end of the step.
    pub fn set_power_calcs(&mut self, i: usize) {
        let mps = self.trace.mps[i];
        let dist_m = self.trace.dist_m[i];
        let stage = self.stage;

        self.trace.rr_w[i] = stage.wheel_rr_coef * stage.veh_kg * self.props.a_grav_mps2 * mps;
        self.trace.drag_w[i] = 0.5
            * self.props.air_density_kg_per_m3
            * stage.drag_coef
            * stage.frontal_area_m2
            * mps.powi(3);
        self.trace.ascent_w[i] =
            stage.veh_kg * self.props.a_grav_mps2 * mps * stage.grade.angle_at(dist_m).sin();
        self.trace.solar_w[i] = stage.solar_w(stage.insolation.w_per_m2(dist_m, self.trace.time_s[i]));
    }

    /// Integrates the net power of step `i` into battery capacity
    pub fn set_capacity(&mut self, i: usize) {
        let cap_prev = if i == 0 {
            self.stage.init_capacity_wh
        } else {
            self.trace.capacity_wh[i - 1]
        };
        let net_w = self.trace.solar_w[i]
            - self.trace.rr_w[i]
            - self.trace.drag_w[i]
            - self.trace.ascent_w[i];
        self.trace.capacity_wh[i] = cap_prev + self.params.dt_h() * net_w;
    }

    /// Sets scalar variables that can be calculated after a run.
    pub fn set_post_scalars(&self) -> EnergySummary {
        let dt_h = self.params.dt_h();
        let solar_wh = self.trace.solar_w.sum() * dt_h;
        let rr_wh = self.trace.rr_w.sum() * dt_h;
        let drag_wh = self.trace.drag_w.sum() * dt_h;
        let ascent_wh = self.trace.ascent_w.sum() * dt_h;
        let net_wh = solar_wh - rr_wh - drag_wh - ascent_wh;
        let final_capacity_wh = self
            .trace
            .capacity_wh
            .iter()
            .next_back()
            .copied()
            .unwrap_or(self.stage.init_capacity_wh);
        let dist_m = self
            .trace
            .dist_m
            .iter()
            .next_back()
            .map_or(0.0, |d| d - self.params.start_distance_m);
        let energy_audit_error_wh = (final_capacity_wh - self.stage.init_capacity_wh) - net_wh;

        #[cfg(feature = "logging")]
        if !final_capacity_wh.is_finite() {
            log::warn!(
                "non-finite final capacity {final_capacity_wh} for stage {:?}; \
                    check stage constants and velocity magnitudes",
                self.params.stage_id
            );
        } else if energy_audit_error_wh.abs() > 1e-6 * final_capacity_wh.abs().max(1.0) {
            log::warn!(
                "problem detected with conservation of energy; \
                    energy audit error: {energy_audit_error_wh:.5} Wh"
            );
        }

        EnergySummary {
            solar_wh,
            rr_wh,
            drag_wh,
            ascent_wh,
            net_wh,
            dist_m,
            energy_audit_error_wh,
        }
    }

    pub fn into_output(self) -> anyhow::Result<SimOutput> {
        ensure!(
            self.i == self.len(),
            "simulation stopped at step {} of {}",
            self.i,
            self.len()
        );
        let summary = self.set_post_scalars();
        let final_capacity_wh = self
            .trace
            .capacity_wh
            .iter()
            .next_back()
            .copied()
            .with_context(|| format_dbg!(self.len()))?;
        Ok(SimOutput {
            params: self.params,
            init_capacity_wh: self.stage.init_capacity_wh,
            final_capacity_wh,
            trace: self.trace,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::SECS_PER_HOUR;
    use crate::simdrive::MAX_STEPS;
    use crate::stage::{GradeProfile, InsolationModel};

    fn table_with(stage: StageParams) -> StageTable {
        let mut table = StageTable::default();
        table.insert("T", stage).unwrap();
        table
    }

    #[test]
    fn test_single_step_power_calcs() {
        let mut stage = StageParams::test_stage();
        stage.grade = GradeProfile::uniform(0.02);
        stage.insolation = InsolationModel::Constant { w_per_m2: 1000.0 };
        let table = table_with(stage.clone());
        let params = SimParams::new(1, 1.0, "T", 0.0);
        let out = simulate(&[10.0], &params, &table).unwrap();

        let props = PhysicalProperties::default();
        let rr_w = 0.006 * 300.0 * props.a_grav_mps2 * 10.0;
        let drag_w = 0.5 * props.air_density_kg_per_m3 * 0.12 * 1.0 * 1000.0;
        let ascent_w = 300.0 * props.a_grav_mps2 * 10.0 * 0.02_f64.atan().sin();
        let solar_w = 1000.0 * 4.0 * 0.24;
        let sample = out.trace.sample(0);
        assert!(sample.rolling_w.approx_eq(&rr_w, 1e-12));
        assert!(sample.drag_w.approx_eq(&drag_w, 1e-12));
        assert!(sample.gradient_w.approx_eq(&ascent_w, 1e-12));
        assert!(sample.solar_w.approx_eq(&solar_w, 1e-12));
        let expected_cap = 5000.0 + (solar_w - rr_w - drag_w - ascent_w);
        assert!(out.final_capacity_wh.approx_eq(&expected_cap, 1e-12));
        assert_eq!(out.trace.dist_m[0], 36_000.0);
        assert_eq!(out.trace.time_s[0], SECS_PER_HOUR);
    }

    #[test]
    fn test_descent_is_a_gain() {
        let mut stage = StageParams::test_stage();
        stage.grade = GradeProfile::uniform(-0.03);
        let table = table_with(stage);
        let params = SimParams::new(60, 1.0, "T", 0.0);
        let out = simulate(&vec![8.0; 60], &params, &table).unwrap();
        assert!(out.trace.ascent_w.iter().all(|&w| w < 0.0));
    }

    #[test]
    fn test_grade_uses_distance_after_step() {
        // the grade changes at 100 m; the first step ends exactly there
        let mut stage = StageParams::test_stage();
        stage.grade = GradeProfile {
            dist_m: vec![0.0, 100.0],
            grade: vec![0.0, 0.1],
        };
        let table = table_with(stage);
        // 3600 steps per hour -> 1 s steps
        let params = SimParams::new(3600, 1.0 / 3600.0 * 2.0, "T", 0.0);
        let out = simulate(&[100.0, 0.0], &params, &table).unwrap();
        assert!(out.trace.ascent_w[0] > 0.0);
        assert_eq!(out.trace.ascent_w[1], 0.0);
    }

    #[test]
    fn test_start_distance_offsets_route_lookup() {
        let mut stage = StageParams::test_stage();
        stage.grade = GradeProfile {
            dist_m: vec![0.0, 50_000.0],
            grade: vec![0.0, 0.05],
        };
        let table = table_with(stage);
        let from_start = simulate(&[1.0; 4], &SimParams::new(4, 1.0, "T", 0.0), &table).unwrap();
        let mid_route =
            simulate(&[1.0; 4], &SimParams::new(4, 1.0, "T", 60_000.0), &table).unwrap();
        assert!(from_start.trace.ascent_w.iter().all(|&w| w == 0.0));
        assert!(mid_route.trace.ascent_w.iter().all(|&w| w > 0.0));
        assert_eq!(mid_route.trace.dist_m[0], 60_900.0);
        assert!(mid_route.summary.dist_m.approx_eq(&3600.0, 1e-9));
    }

    #[test]
    fn test_energy_summary_balances() {
        let table = StageTable::builtin().unwrap();
        let params = SimParams::new(60, 4.0, "1B", 0.0);
        let velocities: Vec<f64> = (0..240).map(|i| 12.0 + (i % 7) as f64).collect();
        let out = simulate(&velocities, &params, table).unwrap();
        assert!(out.summary.energy_audit_error_wh.abs() < 1e-6);
        assert!(out.summary.solar_wh > 0.0);
        assert!(out.summary.drag_wh > 0.0);
        assert!(
            (out.init_capacity_wh + out.summary.net_wh).approx_eq(&out.final_capacity_wh, 1e-9)
        );
    }

    #[test]
    fn test_negative_and_nan_speeds_rejected() {
        let table = StageTable::builtin().unwrap();
        let params = SimParams::new(2, 1.0, "1B", 0.0);
        for bad in [vec![1.0, -0.5], vec![f64::NAN, 1.0]] {
            let err = simulate(&bad, &params, table).unwrap_err();
            assert!(SimError::find(&err).unwrap().is_validation());
        }
    }

    #[test]
    fn test_bad_params_rejected() {
        let table = StageTable::builtin().unwrap();
        let cases = [
            SimParams::new(0, 8.0, "1B", 0.0),
            SimParams::new(3600, 0.0, "1B", 0.0),
            SimParams::new(3600, -1.0, "1B", 0.0),
            SimParams::new(3600, 8.0, "1B", -10.0),
            SimParams::new(1, 0.2, "1B", 0.0),
            SimParams::new(3600, 1e12, "1B", 0.0),
            SimParams::new(u32::MAX, 1.0, "1B", 0.0),
        ];
        for params in cases {
            let err = simulate(&[1.0; 10], &params, table).unwrap_err();
            assert!(
                SimError::find(&err).unwrap().is_configuration(),
                "{params:?}"
            );
        }
    }

    #[test]
    fn test_huge_speed_propagates_as_data() {
        let table = table_with(StageParams::test_stage());
        let out = simulate(&[1e200], &SimParams::new(1, 1.0, "T", 0.0), &table).unwrap();
        assert!(out.final_capacity_wh.is_infinite() || out.final_capacity_wh.is_nan());
    }

    #[test]
    fn test_clamping_and_depletion() {
        let mut stage = StageParams::test_stage();
        stage.init_capacity_wh = 100.0;
        let table = table_with(stage);
        let out = simulate(&[30.0; 4], &SimParams::new(4, 1.0, "T", 0.0), &table).unwrap();
        assert!(out.final_capacity_wh < 0.0);
        let step = out.first_depletion_step().unwrap();
        assert!(out.trace.capacity_wh[step] < 0.0);
        assert!(step == 0 || out.trace.capacity_wh[step - 1] >= 0.0);
        let clamped = out.clamped_capacity(0.0, 5000.0).unwrap();
        assert!(clamped.iter().all(|&c| (0.0..=5000.0).contains(&c)));
        assert!(out.clamped_capacity(10.0, 0.0).is_err());
    }

    #[test]
    fn test_matrix_layout() {
        let out = SimParams::new(4, 2.0, "1A", 0.0)
            .simulate(&[15.0; 8])
            .unwrap();
        let matrix = out.to_matrix().unwrap();
        assert_eq!(matrix.shape(), &[8, 5]);
        for (i, sample) in out.samples().iter().enumerate() {
            assert_eq!(matrix[[i, 0]], sample.solar_w);
            assert_eq!(matrix[[i, 1]], sample.rolling_w);
            assert_eq!(matrix[[i, 2]], sample.drag_w);
            assert_eq!(matrix[[i, 3]], sample.gradient_w);
            assert_eq!(matrix[[i, 4]], sample.capacity_wh);
        }
    }

    #[test]
    fn test_output_file_round_trip() {
        let out = SimParams::new(6, 1.0, "1B", 0.0)
            .simulate(&[11.0; 6])
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("out.json");
        out.to_file(&json_path).unwrap();
        assert_eq!(SimOutput::from_file(&json_path).unwrap(), out);

        let csv_path = dir.path().join("trace.csv");
        out.trace.to_csv_file(&csv_path).unwrap();
        let csv_str = std::fs::read_to_string(csv_path).unwrap();
        assert_eq!(csv_str, out.trace.to_csv().unwrap());
    }

    #[test]
    fn test_step_count_limit() {
        let week = SimParams::new(1, MAX_STEPS as f64, "1B", 0.0);
        assert_eq!(week.n_steps().unwrap(), MAX_STEPS);
        let longer = SimParams::new(1, MAX_STEPS as f64 + 1.0, "1B", 0.0);
        let err = longer.n_steps().unwrap_err();
        assert!(SimError::find(&err).unwrap().is_configuration());
    }

    #[test]
    fn test_ragged_output_rejected() {
        let out = SimParams::new(2, 1.0, "1B", 0.0)
            .simulate(&[10.0, 12.0])
            .unwrap();
        assert_eq!(SimOutput::from_json(out.to_json().unwrap()).unwrap(), out);

        let mut ragged = out.clone();
        ragged.trace.rr_w = array![1.0];
        let err = SimOutput::from_json(ragged.to_json().unwrap()).unwrap_err();
        assert!(SimError::find(&err).unwrap().is_validation());
        assert!(err.to_string().contains("rr_w"), "{err}");

        let mut short = out.clone();
        short.trace = SimTrace::zeros(1);
        assert!(SimOutput::from_yaml(short.to_yaml().unwrap()).is_err());

        let mut bad_params = out;
        bad_params.params.discretization = 0;
        assert!(SimOutput::from_json(bad_params.to_json().unwrap()).is_err());
    }

    #[test]
    fn test_trace_csv() {
        let out = SimParams::new(2, 1.0, "1B", 0.0)
            .simulate(&[10.0, 12.0])
            .unwrap();
        let csv_str = out.trace.to_csv().unwrap();
        let mut lines = csv_str.lines();
        assert_eq!(
            lines.next().unwrap(),
            "time_s,mps,dist_m,solar_w,rolling_w,drag_w,gradient_w,capacity_wh"
        );
        assert_eq!(lines.count(), 2);
    }
}
