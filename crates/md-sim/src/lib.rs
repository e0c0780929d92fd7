//! md-sim: molecular dynamics engine for mdflow.
//!
//! Provides:
//! - Host configurations with lattice builders and velocity initialization
//! - Device state in shared atomic buffers
//! - Verlet neighbor lists with displacement-triggered rebuilds
//! - A force kernel specialized at setup for the requested compute flags
//! - NVE, NVT (Nosé-Hoover) and NVU integrators
//! - Runtime actions: scalar saver, trajectory saver, momentum reset
//! - The `Simulation` driver running the step pipeline in timeblocks
//!
//! # Execution model
//!
//! Particles are partitioned into blocks of `pb` particles with `tp` lanes
//! each. A step is a sequence of phases (pre-step actions, neighbor check,
//! neighbor rebuild, pair forces, integrator phases, post-step actions)
//! separated by barriers. With `gridsync` the whole step runs in one launch
//! with one thread per block; otherwise every phase is its own parallel
//! launch. Both modes produce the same trajectory up to the order of
//! floating-point reductions across blocks.
//!
//! Output goes to an [`md_results::OutputStore`] once per timeblock.

pub mod actions;
pub mod configuration;
pub mod device;
pub mod error;
pub mod flags;
pub mod integrators;
pub mod neighbor;
pub mod pair;
pub mod pipeline;
pub mod plan;
pub mod sim_box;
pub mod simulation;

pub use actions::{
    ExtractOptions, MomentumReset, RuntimeAction, ScalarSaver, TrajectorySaver,
    TrajectorySchedule, extract_scalars,
};
pub use configuration::{Configuration, UnitCell};
pub use error::{SimError, SimResult};
pub use flags::{ComputeFlags, ScalarLayout};
pub use integrators::{
    Integrator, Nve, Nvt, Nvu, NvuOptions, TemperatureSchedule, make_function_ramp,
};
pub use pair::{DEFAULT_SKIN, PairPotential};
pub use pipeline::{RunContext, StepInfo};
pub use plan::{DeviceSpec, ExecutionPlan, Lane};
pub use sim_box::{MAX_DIM, SimBox};
pub use simulation::{BlockProgress, Simulation, SimulationOptions};
