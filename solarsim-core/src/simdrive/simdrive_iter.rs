//! Module containing parallel and serial batch running of [simulate]
use super::{simulate, SimOutput, SimParams};
use crate::imports::*;
use crate::stage::StageTable;
use rayon::prelude::*;

/// Calls [simulate] once per velocity profile, sharing `params` and `table`.
/// Outputs keep the order of `profiles`.
/// # Arguments:
/// * parallelize: whether to parallelize `simulate` calls, defaults to `true`
pub fn simulate_batch(
    profiles: &[Vec<f64>],
    params: &SimParams,
    table: &StageTable,
    parallelize: Option<bool>,
) -> anyhow::Result<Vec<SimOutput>> {
    let parallelize = parallelize.unwrap_or(true);
    if parallelize {
        profiles
            .par_iter()
            .enumerate()
            .map(|(i, velocities)| {
                simulate(velocities, params, table)
                    .with_context(|| format!("profile idx: {}", i))
            })
            .collect()
    } else {
        profiles
            .iter()
            .enumerate()
            .map(|(i, velocities)| {
                simulate(velocities, params, table)
                    .with_context(|| format!("profile idx: {}", i))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_matches_single_runs() {
        let table = StageTable::builtin().unwrap();
        let params = SimParams::new(12, 2.0, "1B", 0.0);
        let profiles: Vec<Vec<f64>> = [0.0, 10.0, 20.0]
            .iter()
            .map(|&v| vec![v; 24])
            .collect();
        let par = simulate_batch(&profiles, &params, table, None).unwrap();
        let ser = simulate_batch(&profiles, &params, table, Some(false)).unwrap();
        assert_eq!(par.len(), 3);
        for ((p, s), velocities) in par.iter().zip(&ser).zip(&profiles) {
            assert_eq!(p, s);
            assert_eq!(p, &simulate(velocities, &params, table).unwrap());
        }
        assert!(par[0].final_capacity_wh > par[2].final_capacity_wh);
    }

    #[test]
    fn test_batch_reports_failing_profile() {
        let table = StageTable::builtin().unwrap();
        let params = SimParams::new(12, 1.0, "1B", 0.0);
        let profiles = vec![vec![5.0; 12], vec![5.0; 3]];
        let err = simulate_batch(&profiles, &params, table, Some(false)).unwrap_err();
        assert!(format!("{err:#}").contains("profile idx: 1"));
        assert!(SimError::find(&err).unwrap().is_validation());
    }
}
