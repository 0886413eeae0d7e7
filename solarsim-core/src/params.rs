//! Module containing physical constants and unit conversions.

use crate::imports::*;

/// Unit conversions that should NEVER change
pub const SECS_PER_HOUR: f64 = 3600.0;
pub const M_PER_KM: f64 = 1000.0;

/// Physical properties shared by every stage
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ApproxEq)]
pub struct PhysicalProperties {
    pub air_density_kg_per_m3: f64, // = 1.2, Sea level air density at approximately 20C
    pub a_grav_mps2: f64,           // = 9.81
}

impl Default for PhysicalProperties {
    fn default() -> Self {
        Self {
            air_density_kg_per_m3: 1.2,
            a_grav_mps2: 9.81,
        }
    }
}

impl SerdeAPI for PhysicalProperties {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_props_yaml() {
        let props = PhysicalProperties::from_yaml("air_density_kg_per_m3: 1.1\na_grav_mps2: 9.81\n")
            .unwrap();
        assert!(props.approx_eq(
            &PhysicalProperties {
                air_density_kg_per_m3: 1.1,
                ..Default::default()
            },
            1e-12
        ));
    }
}
