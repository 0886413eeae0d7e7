#![allow(clippy::field_reassign_with_default)]

//! Crate containing the energy budget model for a solar-powered vehicle driving
//! a race stage at a prescribed velocity profile.
//!
//! For every reporting step the engine derives the solar, rolling, drag and
//! gradient power and integrates the net into a battery capacity trace.
//! # Features:
//! - logging: emit diagnostics through the `log` facade
//! - resources: embed the `resources` folder (built-in reference overlays)
//! - bincode: enable the `bin` format in [traits::SerdeAPI]

#[macro_use]
pub mod macros;

pub mod chart;
pub mod error;
pub mod imports;
pub mod params;
pub mod prelude;
#[cfg(feature = "resources")]
pub mod resources;
pub mod simdrive;
pub mod stage;
pub mod traits;
pub mod utils;
