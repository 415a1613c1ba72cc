//! # Scene Generation
//!
//! Builds the initial agent population for a [`SceneKind`]. Randomness comes
//! from the caller's RNG so seeded runs are reproducible.
//!
//! - **Random**: positions uniform in `[-1, 1]²`, velocities uniform in
//!   `[-0.1, 0.1]²`, goals alternating between `(1, 1)` and `(-1, -1)`.
//! - **Square**: even slots fill the top strip and head down, odd slots fill
//!   the bottom strip and head up. Each cohort sits on a
//!   `x_count × y_count` grid with a little jitter.
//! - **Circle**: agents on a ring, each heading for the opposite side.

use crate::structs::{Agent, ConfigError, SceneKind, Vector2D};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::PI;

const STRIP_MARGIN: f32 = 0.2;
const CIRCLE_RADIUS: f32 = 0.8;
const JITTER_FRACTION: f32 = 0.2;
const RANDOM_SPEED: f32 = 0.1;
const BASE_SPEED: f32 = 0.1;

/// Generates `num_agents` agents laid out per `scene`.
pub fn generate<R: Rng + ?Sized>(
    scene: SceneKind,
    num_agents: usize,
    agent_scale: f32,
    rng: &mut R,
) -> Vec<Agent> {
    match scene {
        SceneKind::Random => random_scene(num_agents, rng),
        SceneKind::Square => square_scene(num_agents, agent_scale, rng),
        SceneKind::Circle => circle_scene(num_agents, agent_scale, rng),
    }
}

/// Seeded generator, or one drawn from OS entropy when `seed` is `None`.
pub fn seeded_rng(seed: Option<u64>) -> SmallRng {
    match seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_entropy(),
    }
}

/// Agent count from a signed request; negative counts give an empty scene.
pub fn population(count: i64) -> usize {
    usize::try_from(count).unwrap_or(0)
}

/// Parses `scene`, generates it and flattens the agents into 8-float records.
pub fn generate_records(
    scene: &str,
    num_agents: usize,
    agent_scale: f32,
    seed: Option<u64>,
) -> Result<Vec<f32>, ConfigError> {
    let kind: SceneKind = scene.parse()?;
    if !(agent_scale.is_finite() && agent_scale > 0.0) {
        return Err(ConfigError::InvalidAgentScale(agent_scale));
    }
    let agents = generate(kind, num_agents, agent_scale, &mut seeded_rng(seed));
    Ok(agents.iter().flat_map(|agent| agent.to_record()).collect())
}

/// Columns and rows of the per-cohort grid used by the square scene.
///
/// With `p = log2(num_agents / 2)` the grid is `2^ceil(p/2)` by
/// `2^floor(p/2)`. Both counts are at least 1, so tiny or
/// non-power-of-two populations only degrade the layout.
pub fn grid_dims(num_agents: usize) -> (usize, usize) {
    if num_agents < 2 {
        return (1, 1);
    }
    let power = (num_agents as f64 / 2.0).log2();
    let x_count = 2.0_f64.powi((power / 2.0).ceil() as i32) as usize;
    let y_count = 2.0_f64.powi((power / 2.0).floor() as i32) as usize;
    (x_count.max(1), y_count.max(1))
}

fn random_scene<R: Rng + ?Sized>(num_agents: usize, rng: &mut R) -> Vec<Agent> {
    let goals = [Vector2D::new(1.0, 1.0), Vector2D::new(-1.0, -1.0)];
    (0..num_agents)
        .map(|i| {
            let position = Vector2D::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
            let velocity = Vector2D::new(
                rng.gen_range(-RANDOM_SPEED..RANDOM_SPEED),
                rng.gen_range(-RANDOM_SPEED..RANDOM_SPEED),
            );
            Agent::new(position, velocity, goals[i % 2])
        })
        .collect()
}

/// Axis-aligned box given by its min and max corners.
#[derive(Debug, Clone, Copy)]
struct Strip {
    min: Vector2D,
    max: Vector2D,
}

fn square_scene<R: Rng + ?Sized>(num_agents: usize, agent_scale: f32, rng: &mut R) -> Vec<Agent> {
    let top = Strip {
        min: Vector2D::new(STRIP_MARGIN - 1.0, STRIP_MARGIN),
        max: Vector2D::new(1.0 - STRIP_MARGIN, 1.0 - STRIP_MARGIN),
    };
    let bottom = Strip {
        min: Vector2D::new(STRIP_MARGIN - 1.0, STRIP_MARGIN - 1.0),
        max: Vector2D::new(1.0 - STRIP_MARGIN, -STRIP_MARGIN),
    };
    let (x_count, y_count) = grid_dims(num_agents);

    (0..num_agents)
        .map(|i| {
            let heading_down = i % 2 == 0;
            let (strip, direction) = if heading_down { (top, -1.0) } else { (bottom, 1.0) };

            let cell = i / 2;
            let x_idx = cell % x_count;
            let y_idx = cell / x_count;
            let x_offset = (strip.max.x - strip.min.x) / x_count as f32;
            let y_offset = (strip.max.y - strip.min.y) / y_count as f32;

            // One draw shared by both axes.
            let jitter: f32 = rng.gen_range(-1.0..1.0) * JITTER_FRACTION;
            let position = Vector2D::new(
                strip.min.x + x_idx as f32 * x_offset + x_offset * jitter,
                strip.min.y + y_idx as f32 * y_offset + y_offset * jitter,
            );
            let velocity = Vector2D::new(0.0, direction * BASE_SPEED) * agent_scale;
            let goal = Vector2D::new(0.0, direction);
            Agent::new(position, velocity, goal)
        })
        .collect()
}

fn circle_scene<R: Rng + ?Sized>(num_agents: usize, agent_scale: f32, rng: &mut R) -> Vec<Agent> {
    if num_agents == 0 {
        return Vec::new();
    }
    let spacing = 2.0 * PI / num_agents as f32;
    (0..num_agents)
        .map(|i| {
            let slot_angle = i as f32 * spacing;
            let slot = Vector2D::new(slot_angle.cos(), slot_angle.sin()) * CIRCLE_RADIUS;
            let angle = slot_angle + rng.gen_range(-1.0..1.0) * JITTER_FRACTION * spacing;
            let position = Vector2D::new(angle.cos(), angle.sin()) * CIRCLE_RADIUS;
            let velocity = (-position).normalize() * (BASE_SPEED * agent_scale);
            Agent::new(position, velocity, -slot)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(42)
    }

    // --- grid_dims ---

    #[test]
    fn test_grid_dims_powers_of_two() {
        assert_eq!(grid_dims(16), (4, 2));
        assert_eq!(grid_dims(32), (4, 4));
        assert_eq!(grid_dims(1024), (32, 16));
        assert_eq!(grid_dims(2), (1, 1));
        assert_eq!(grid_dims(4), (2, 1));
    }

    #[test]
    fn test_grid_dims_degenerate_counts_are_at_least_one() {
        assert_eq!(grid_dims(0), (1, 1));
        assert_eq!(grid_dims(1), (1, 1));
        assert_eq!(grid_dims(3), (2, 1));
        let (x, y) = grid_dims(24);
        assert!(x >= 1 && y >= 1);
        assert_eq!((x, y), (4, 2));
    }

    // --- empty populations ---

    #[test]
    fn test_zero_agents_is_empty() {
        for kind in [SceneKind::Random, SceneKind::Square, SceneKind::Circle] {
            assert!(generate(kind, 0, 1.0, &mut rng()).is_empty(), "{kind} with 0 agents");
        }
    }

    // --- random scene ---

    #[test]
    fn test_random_scene_bounds_and_goals() {
        let agents = generate(SceneKind::Random, 200, 1.0, &mut rng());
        assert_eq!(agents.len(), 200);
        for (i, agent) in agents.iter().enumerate() {
            assert!(agent.position.x >= -1.0 && agent.position.x <= 1.0);
            assert!(agent.position.y >= -1.0 && agent.position.y <= 1.0);
            assert!(agent.velocity.x.abs() <= 0.1 && agent.velocity.y.abs() <= 0.1);
            assert_eq!(agent.predicted_position, agent.position);
            let expected_goal = if i % 2 == 0 {
                Vector2D::new(1.0, 1.0)
            } else {
                Vector2D::new(-1.0, -1.0)
            };
            assert_eq!(agent.goal, expected_goal, "Goal should alternate by parity");
        }
    }

    #[test]
    fn test_random_scene_is_reproducible_with_seed() {
        let a = generate(SceneKind::Random, 64, 1.0, &mut SmallRng::seed_from_u64(7));
        let b = generate(SceneKind::Random, 64, 1.0, &mut SmallRng::seed_from_u64(7));
        assert_eq!(a, b, "Same seed should produce the same scene");
    }

    // --- square scene ---

    #[test]
    fn test_square_scene_splits_cohorts_evenly() {
        let agents = generate(SceneKind::Square, 16, 1.0, &mut rng());
        let top = agents.iter().filter(|a| a.position.y > 0.0).count();
        let bottom = agents.iter().filter(|a| a.position.y < 0.0).count();
        assert_eq!(top, 8, "Exactly half the agents in the top strip");
        assert_eq!(bottom, 8, "Exactly half the agents in the bottom strip");
    }

    #[test]
    fn test_square_scene_fills_grid_without_duplicates() {
        let num_agents = 16;
        let agents = generate(SceneKind::Square, num_agents, 1.0, &mut rng());
        let (x_count, y_count) = grid_dims(num_agents);
        let x_offset = 1.6 / x_count as f32;
        let y_offset = 0.6 / y_count as f32;

        for parity in 0..2 {
            let min_y = if parity == 0 { 0.2 } else { -0.8 };
            let cells: HashSet<(i32, i32)> = agents
                .iter()
                .skip(parity)
                .step_by(2)
                .map(|a| {
                    // jitter is at most a fifth of a cell, so rounding recovers the slot
                    let x_idx = ((a.position.x + 0.8) / x_offset).round() as i32;
                    let y_idx = ((a.position.y - min_y) / y_offset).round() as i32;
                    (x_idx, y_idx)
                })
                .collect();
            assert_eq!(cells.len(), x_count * y_count, "Each cell used exactly once");
            for x in 0..x_count as i32 {
                for y in 0..y_count as i32 {
                    assert!(cells.contains(&(x, y)), "Cell ({x}, {y}) missing for cohort {parity}");
                }
            }
        }
    }

    #[test]
    fn test_square_scene_velocity_and_goal() {
        let agents = generate(SceneKind::Square, 32, 0.5, &mut rng());
        for (i, agent) in agents.iter().enumerate() {
            if i % 2 == 0 {
                assert_eq!(agent.velocity, Vector2D::new(0.0, -0.05));
                assert_eq!(agent.goal, Vector2D::new(0.0, -1.0));
            } else {
                assert_eq!(agent.velocity, Vector2D::new(0.0, 0.05));
                assert_eq!(agent.goal, Vector2D::new(0.0, 1.0));
            }
            assert_eq!(agent.predicted_position, agent.position);
        }
    }

    #[test]
    fn test_square_scene_non_power_of_two_is_finite() {
        for n in [1, 3, 7, 25, 1000] {
            let agents = generate(SceneKind::Square, n, 1.0, &mut rng());
            assert_eq!(agents.len(), n);
            assert!(agents.iter().all(Agent::is_finite), "n={n} produced non-finite agents");
        }
    }

    // --- circle scene ---

    #[test]
    fn test_circle_scene_ring_and_antipodal_goals() {
        let agents = generate(SceneKind::Circle, 12, 1.0, &mut rng());
        for agent in &agents {
            assert!((agent.position.magnitude() - 0.8).abs() < 1e-5, "Agent off the ring");
            assert!((agent.goal.magnitude() - 0.8).abs() < 1e-5, "Goal off the ring");
            // goal is roughly opposite the start
            assert!(agent.position.dot(&agent.goal) < 0.0);
            // heading inward at base speed
            assert!((agent.velocity.magnitude() - 0.1).abs() < 1e-6);
            assert!(agent.velocity.dot(&agent.position) < 0.0);
        }
    }

    // --- flat records ---

    #[test]
    fn test_population_clamps_negative_counts() {
        assert_eq!(population(-5), 0);
        assert_eq!(population(0), 0);
        assert_eq!(population(1024), 1024);
    }

    #[test]
    fn test_generate_records_flattens_in_agent_order() {
        let records = generate_records("square", 16, 1.0, Some(42)).expect("valid scene");
        let agents = generate(SceneKind::Square, 16, 1.0, &mut rng());
        assert_eq!(records.len(), 16 * Agent::FLOATS);
        for (i, agent) in agents.iter().enumerate() {
            assert_eq!(&records[i * Agent::FLOATS..(i + 1) * Agent::FLOATS], &agent.to_record()[..]);
        }
    }

    #[test]
    fn test_generate_records_rejects_bad_input() {
        assert_eq!(
            generate_records("RANDOM", 4, 0.0, Some(1)),
            Err(ConfigError::InvalidAgentScale(0.0))
        );
        assert!(matches!(
            generate_records("RANDOM", 4, f32::NAN, Some(1)),
            Err(ConfigError::InvalidAgentScale(_))
        ));
        assert_eq!(
            generate_records("hexagon", 4, 1.0, Some(1)),
            Err(ConfigError::UnknownScene("hexagon".to_string()))
        );
        assert_eq!(generate_records("circle", population(-3), 1.0, None), Ok(Vec::new()));
    }
}
