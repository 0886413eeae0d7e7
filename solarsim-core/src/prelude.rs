pub use crate::chart::{ChartData, ReferenceCapacity, ReferencePoint, SeriesSelection};
pub use crate::error::SimError;
pub use crate::params::PhysicalProperties;
pub use crate::simdrive::{
    simulate, simulate_batch, EnergySummary, PowerSample, SimOutput, SimParams, SimTrace,
};
pub use crate::stage::{GradeProfile, InsolationModel, StageParams, StageTable};
pub use crate::traits::{ApproxEq, SerdeAPI};
