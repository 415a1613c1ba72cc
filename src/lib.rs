//! # Crowd Solver
//!
//! A position-based crowd-motion solver with optional Python bindings.
//!
//! ## Step pipeline
//!
//! - **Blend**: steer each agent toward its goal and predict its next position.
//! - **Short-range**: push overlapping predicted disks apart (Jacobi averaged).
//! - **Long-range**: find the time to first contact along each pair's
//!   trajectory and separate them at that moment.
//! - **Finalize**: rebuild velocity, apply XSPH cohesion within goal groups,
//!   clamp speed and integrate.
//!
//! Every pass reads an immutable snapshot and writes a second buffer, so
//! sequential and parallel execution give identical results.
//!
//! ## Usage
//!
//! ```no_run
//! use crowd_solver::{SceneKind, SimParams, Simulation};
//!
//! let mut sim = Simulation::new(SceneKind::Square, 1024, SimParams::for_population(1024), Some(7))?;
//! for _ in 0..100 {
//!     sim.step();
//! }
//! let floats: &[f32] = sim.agent_floats();
//! # let _ = floats;
//! # Ok::<(), crowd_solver::ConfigError>(())
//! ```

pub mod blend;
pub mod buffer;
pub mod finalize;
pub mod long_range;
pub mod scene;
pub mod short_range;
pub mod solver;
pub mod structs;

#[cfg(feature = "python")]
mod python;

pub use buffer::AgentBuffer;
pub use solver::{Simulation, StepOutcome, StepStats};
pub use structs::{
    Agent, ConfigError, Execution, SceneKind, SimParams, SolverConstants, Vector2D, BASELINE_POPULATION,
};
