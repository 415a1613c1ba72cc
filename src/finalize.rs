//! # Finalize
//!
//! Last stage of a step:
//!
//! 1. Velocity is rebuilt from the corrected prediction,
//!    `(predicted_position - position) / Δt`.
//! 2. XSPH cohesion: neighbours sharing exactly the same goal and within
//!    `cohesion_radius` of our prediction contribute
//!    `poly6(d²) · (v_i - v_j)`, scaled by `xsph_h`.
//! 3. Speed is clamped to `max_speed`, keeping direction.
//! 4. Position is integrated with the final velocity.

use crate::buffer::AgentBuffer;
use crate::structs::{Agent, SimParams, SolverConstants, Vector2D};
use std::f32::consts::PI;

/// SPH poly6 kernel with support `constants.kernel_support`. Zero outside
/// `[epsilon, support]`.
pub fn poly6(r: f32, constants: &SolverConstants) -> f32 {
    let h = constants.kernel_support;
    if r < constants.epsilon || r > h {
        return 0.0;
    }
    let hmr = h * h - r * r;
    315.0 / (64.0 * PI * h.powi(9)) * hmr * hmr * hmr
}

pub fn finalize_agent(i: usize, snapshot: &[Agent], constants: &SolverConstants, delta_t: f32) -> (Agent, usize) {
    let mut agent = snapshot[i];
    agent.velocity = agent.implied_velocity(delta_t);

    let mut viscosity = Vector2D::ZERO;
    let mut neighbor_count = 0;
    for (j, other) in snapshot.iter().enumerate() {
        // groups are exact goal matches
        if i == j || other.goal != agent.goal {
            continue;
        }
        let d = agent.predicted_position.distance(&other.predicted_position);
        if d > constants.cohesion_radius {
            continue;
        }
        let weight = poly6(d * d, constants);
        if weight == 0.0 {
            continue;
        }
        viscosity += (agent.velocity - other.velocity) * weight;
        neighbor_count += 1;
    }
    agent.velocity += viscosity * constants.xsph_h;

    if agent.velocity.magnitude() > constants.max_speed {
        agent.velocity = agent.velocity.normalize() * constants.max_speed;
    }

    agent.position += agent.velocity * delta_t;
    (agent, neighbor_count)
}

/// Returns the number of cohesion neighbours summed over agents.
pub fn pass(buffer: &mut AgentBuffer, params: &SimParams, constants: &SolverConstants) -> usize {
    let delta_t = params.delta_t;
    buffer.run_pass(params.execution, |i, snapshot| {
        finalize_agent(i, snapshot, constants, delta_t)
    })
}
