//! # Long-Range Collision
//!
//! Predictive collision avoidance on swept trajectories. For each neighbour
//! within `far_radius`, the relative motion implied by the two predicted
//! positions is solved in closed form for the earliest time the disks touch:
//!
//! ```text
//! a·t² + 2b·t + c = 0,   a = v·v,  b = -x·v,  c = x·x - r²
//! t = (b - sqrt(b² - a·c)) / a
//! ```
//!
//! Contacts that are degenerate (`|a| < ε`, negative discriminant), already
//! past (`t < ε`), or beyond the horizon `t0` are ignored. The contact time
//! is snapped to the step grid, both agents are projected to the first step
//! boundary after contact with their current velocities, and any remaining
//! overlap there is pushed apart along the projected normal.
//!
//! The push is weighted by `k_long_range · exp(-t_nc² / t0)` so far-off
//! contacts matter less, then adjusted per iteration as
//! `1 - (1 - k)^(1 / (itr + 1))`. Corrections are Jacobi-averaged like the
//! short-range stage and only move `predicted_position`.

use crate::buffer::AgentBuffer;
use crate::structs::{Agent, SimParams, SolverConstants, Vector2D};

/// Earliest time at which two disks with relative displacement `x` and
/// relative velocity `v` are `sqrt(radius_sq)` apart, or `None` when there is
/// no usable contact.
pub fn time_to_contact(x: Vector2D, v: Vector2D, radius_sq: f32, constants: &SolverConstants) -> Option<f32> {
    let a = v.dot(&v);
    let b = -x.dot(&v);
    let c = x.dot(&x) - radius_sq;
    let discriminant = b * b - a * c;
    if discriminant < 0.0 || a.abs() < constants.epsilon {
        return None;
    }

    let t = (b - discriminant.sqrt()) / a;
    if t < constants.epsilon || t > constants.time_horizon {
        return None;
    }
    Some(t)
}

/// Stiffness used on iteration `iteration` for a contact whose last
/// collision-free step boundary is `t_nocollision`.
pub fn adjusted_stiffness(t_nocollision: f32, iteration: u32, constants: &SolverConstants) -> f32 {
    let k = constants.k_long_range * (-t_nocollision * t_nocollision / constants.time_horizon).exp();
    1.0 - (1.0 - k).powf(1.0 / (iteration as f32 + 1.0))
}

/// One agent's long-range correction against the snapshot. Returns the
/// corrected record and the number of predicted contacts.
pub fn resolve_long_range(
    i: usize,
    snapshot: &[Agent],
    constants: &SolverConstants,
    delta_t: f32,
    iteration: u32,
) -> (Agent, usize) {
    let mut agent = snapshot[i];
    let r = constants.contact_distance();
    let implied = agent.implied_velocity(delta_t);
    let mut total_dx = Vector2D::ZERO;
    let mut neighbor_count = 0;

    for (j, other) in snapshot.iter().enumerate() {
        if i == j {
            continue;
        }
        let x = agent.position - other.position;
        let dist = x.magnitude();
        if dist > constants.far_radius {
            continue;
        }

        // already overlapping: only ask for the remaining gap
        let radius_sq = if dist < r { (r - dist) * (r - dist) } else { r * r };
        let v = implied - other.implied_velocity(delta_t);
        let Some(t) = time_to_contact(x, v, radius_sq, constants) else {
            continue;
        };

        let t_nocollision = delta_t * (t / delta_t).floor();
        let t_collision = delta_t + t_nocollision;

        let xi_collision = agent.position + agent.velocity * t_collision;
        let xj_collision = other.position + other.velocity * t_collision;
        let n = xi_collision - xj_collision;
        let f_collision = n.magnitude() - r;
        if f_collision < 0.0 {
            let k = adjusted_stiffness(t_nocollision, iteration, constants);
            total_dx += n.normalize() * (-0.5 * f_collision * k);
            neighbor_count += 1;
        }
    }

    if neighbor_count > 0 {
        agent.predicted_position += total_dx * (constants.avg_coeff / neighbor_count as f32);
    }
    (agent, neighbor_count)
}

/// Runs `constraint_iterations` long-range passes, or nothing when avoidance
/// is disabled. Returns total contacts.
pub fn pass(buffer: &mut AgentBuffer, params: &SimParams, constants: &SolverConstants) -> usize {
    if !params.avoidance_enabled {
        return 0;
    }
    let delta_t = params.delta_t;
    let mut contacts = 0;
    for iteration in 0..params.constraint_iterations {
        contacts += buffer.run_pass(params.execution, |i, snapshot| {
            resolve_long_range(i, snapshot, constants, delta_t, iteration)
        });
    }
    contacts
}
