//! # Simulation
//!
//! Owns the agent set and runs one solver step at a time:
//!
//! ```text
//! blend ─► short-range × stability_iterations ─► long-range × constraint_iterations ─► finalize ─► commit
//! ```
//!
//! Every arrow is a full barrier: a pass reads the snapshot left by the
//! previous pass and writes the other buffer. Readers only ever see the
//! committed state, so a cancelled step leaves no trace.

use crate::buffer::AgentBuffer;
use crate::structs::{Agent, ConfigError, SceneKind, SimParams, SolverConstants};
use crate::{blend, finalize, long_range, scene, short_range};
use log::{debug, info, trace, warn};
use rand::rngs::SmallRng;
use std::sync::atomic::{AtomicBool, Ordering};

/// Contact counts gathered during one step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepStats {
    /// Overlapping neighbour pairs seen by the short-range stage, summed over iterations.
    pub short_range_contacts: usize,
    /// Predicted contacts corrected by the long-range stage, summed over iterations.
    pub long_range_contacts: usize,
    /// Same-goal neighbours contributing to cohesion.
    pub cohesion_neighbors: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Committed(StepStats),
    /// The step was cancelled; the committed state is unchanged.
    Aborted,
}

pub struct Simulation {
    params: SimParams,
    constants: SolverConstants,
    scene: SceneKind,
    buffer: AgentBuffer,
    rng: SmallRng,
    step_count: u64,
    last_stats: StepStats,
}

impl Simulation {
    /// Builds a simulation with a freshly generated scene. `params` is used
    /// as given; see [`SimParams::for_population`] to derive the scale from
    /// the population size. `seed` makes the scene reproducible.
    pub fn new(
        scene: SceneKind,
        num_agents: usize,
        params: SimParams,
        seed: Option<u64>,
    ) -> Result<Self, ConfigError> {
        params.validate()?;
        let mut rng = scene::seeded_rng(seed);
        let agents = scene::generate(scene, num_agents, params.agent_scale, &mut rng);
        info!(
            "created {} scene with {} agents (agent_scale={})",
            scene, num_agents, params.agent_scale
        );
        Ok(Simulation {
            params,
            constants: SolverConstants::from_scale(params.agent_scale),
            scene,
            buffer: AgentBuffer::new(agents),
            rng,
            step_count: 0,
            last_stats: StepStats::default(),
        })
    }

    /// Builds a simulation from explicit agents. A later [`reset`](Self::reset)
    /// generates the default scene.
    pub fn from_agents(agents: Vec<Agent>, params: SimParams) -> Result<Self, ConfigError> {
        params.validate()?;
        Ok(Simulation {
            params,
            constants: SolverConstants::from_scale(params.agent_scale),
            scene: SceneKind::default(),
            buffer: AgentBuffer::new(agents),
            rng: scene::seeded_rng(None),
            step_count: 0,
            last_stats: StepStats::default(),
        })
    }

    /// Advances one step and commits it.
    pub fn step(&mut self) -> StepStats {
        match self.run_step(None) {
            StepOutcome::Committed(stats) => stats,
            // no cancel flag, so the step always commits
            StepOutcome::Aborted => self.last_stats,
        }
    }

    /// Advances one step unless `cancel` is raised before a stage starts.
    pub fn step_cancellable(&mut self, cancel: &AtomicBool) -> StepOutcome {
        self.run_step(Some(cancel))
    }

    fn run_step(&mut self, cancel: Option<&AtomicBool>) -> StepOutcome {
        let cancelled = || cancel.is_some_and(|flag| flag.load(Ordering::Acquire));
        let params = self.params;
        let mut stats = StepStats::default();

        if cancelled() {
            return self.abort();
        }
        blend::pass(&mut self.buffer, &params, &self.constants);

        if cancelled() {
            return self.abort();
        }
        stats.short_range_contacts = short_range::pass(&mut self.buffer, &params, &self.constants);

        if cancelled() {
            return self.abort();
        }
        stats.long_range_contacts = long_range::pass(&mut self.buffer, &params, &self.constants);

        if cancelled() {
            return self.abort();
        }
        stats.cohesion_neighbors = finalize::pass(&mut self.buffer, &params, &self.constants);

        self.buffer.commit();
        self.step_count += 1;
        self.last_stats = stats;

        if !self.buffer.all_finite() {
            warn!("step {} committed non-finite agent state", self.step_count);
        }
        debug!(
            "step {}: {} short-range contacts, {} long-range contacts",
            self.step_count, stats.short_range_contacts, stats.long_range_contacts
        );
        trace!("step {}: {} cohesion neighbours", self.step_count, stats.cohesion_neighbors);
        StepOutcome::Committed(stats)
    }

    fn abort(&mut self) -> StepOutcome {
        self.buffer.rollback();
        debug!("step {} aborted", self.step_count + 1);
        StepOutcome::Aborted
    }

    /// Replaces the parameters used from the next step on.
    pub fn set_params(&mut self, params: SimParams) -> Result<(), ConfigError> {
        params.validate()?;
        self.params = params;
        self.constants = SolverConstants::from_scale(params.agent_scale);
        Ok(())
    }

    /// Regenerates the current scene with `num_agents` agents and the
    /// density-derived scale for that count.
    pub fn reset(&mut self, num_agents: usize) {
        self.params.agent_scale = SimParams::agent_scale_for(num_agents);
        self.constants = SolverConstants::from_scale(self.params.agent_scale);
        let agents = scene::generate(self.scene, num_agents, self.params.agent_scale, &mut self.rng);
        self.buffer = AgentBuffer::new(agents);
        self.step_count = 0;
        self.last_stats = StepStats::default();
        info!(
            "reset {} scene to {} agents (agent_scale={})",
            self.scene, num_agents, self.params.agent_scale
        );
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    pub fn constants(&self) -> &SolverConstants {
        &self.constants
    }

    pub fn scene(&self) -> SceneKind {
        self.scene
    }

    /// Committed agents.
    pub fn agents(&self) -> &[Agent] {
        self.buffer.committed()
    }

    /// Committed agents as flat 8-float records.
    pub fn agent_floats(&self) -> &[f32] {
        self.buffer.as_floats()
    }

    pub fn agent_bytes(&self) -> &[u8] {
        self.buffer.as_bytes()
    }

    pub fn snapshot(&self) -> Vec<Agent> {
        self.buffer.committed().to_vec()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn last_stats(&self) -> StepStats {
        self.last_stats
    }
}
