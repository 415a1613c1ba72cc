//! # Short-Range Collision
//!
//! Resolves overlap between predicted positions. For every neighbour within
//! `near_radius` whose predicted disk overlaps ours, push half the
//! penetration along the separating normal. The pushes are summed and then
//! scaled by `avg_coeff / contacts` (Jacobi averaging), so a crowded agent
//! does not overshoot when many neighbours press at once.
//!
//! The correction moves both `position` and `predicted_position`, keeping
//! the implied velocity of the step unchanged.

use crate::buffer::AgentBuffer;
use crate::structs::{Agent, SimParams, SolverConstants, Vector2D};

/// One agent's short-range correction against the snapshot. Returns the
/// corrected record and the number of overlapping neighbours.
pub fn resolve_short_range(i: usize, snapshot: &[Agent], constants: &SolverConstants) -> (Agent, usize) {
    let mut agent = snapshot[i];
    let contact = constants.contact_distance();
    let mut total_dx = Vector2D::ZERO;
    let mut neighbor_count = 0;

    for (j, other) in snapshot.iter().enumerate() {
        if i == j {
            continue;
        }
        let n = agent.predicted_position - other.predicted_position;
        let d = n.magnitude();
        if d > constants.near_radius {
            continue;
        }

        let penetration = d - contact;
        if penetration < 0.0 {
            // equal weights, so each side takes half
            total_dx += n.normalize() * (-0.5 * constants.k_short_range * penetration);
            neighbor_count += 1;
        }
    }

    if neighbor_count > 0 {
        let dx = total_dx * (constants.avg_coeff / neighbor_count as f32);
        agent.position += dx;
        agent.predicted_position += dx;
    }
    (agent, neighbor_count)
}

/// Runs `stability_iterations` short-range passes. Returns total contacts.
pub fn pass(buffer: &mut AgentBuffer, params: &SimParams, constants: &SolverConstants) -> usize {
    let mut contacts = 0;
    for _ in 0..params.stability_iterations {
        contacts += buffer.run_pass(params.execution, |i, snapshot| {
            resolve_short_range(i, snapshot, constants)
        });
    }
    contacts
}
