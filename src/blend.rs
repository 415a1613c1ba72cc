//! # Velocity Blending
//!
//! First stage of a step. Each agent steers slowly toward its goal: the
//! desired velocity is the goal direction at `agent_speed`, blended into the
//! current velocity by `blend_factor`. The predicted position is then one
//! step ahead along the blended velocity.
//!
//! Agents only read their own record, so this stage has no neighbour scan.

use crate::buffer::AgentBuffer;
use crate::structs::{Agent, SimParams, SolverConstants};

/// Blends `agent`'s velocity toward its goal heading and predicts its next position.
pub fn blend_velocity(agent: &Agent, constants: &SolverConstants, delta_t: f32) -> Agent {
    let mut next = *agent;

    // zero when already at the goal
    let direction = (agent.goal - agent.position).normalize();
    let desired = direction * constants.agent_speed;
    next.velocity = desired * constants.blend_factor + agent.velocity * (1.0 - constants.blend_factor);
    next.predicted_position = agent.position + next.velocity * delta_t;
    next
}

pub fn pass(buffer: &mut AgentBuffer, params: &SimParams, constants: &SolverConstants) {
    let delta_t = params.delta_t;
    buffer.run_pass(params.execution, |i, snapshot| {
        (blend_velocity(&snapshot[i], constants, delta_t), 0)
    });
}
