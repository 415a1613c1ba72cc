//! # Core Data Structures
//!
//! This module defines the fundamental data types used throughout the solver:
//!
//! - **Vector2D**: 2D position/velocity vector with arithmetic operations
//! - **Agent**: one crowd member, laid out as the 8-float record the renderer reads
//! - **SceneKind**: named initial layouts
//! - **SimParams**: per-step parameters supplied by the controller
//! - **SolverConstants**: physical constants derived from `agent_scale`
//! - **ConfigError**: rejected parameters and malformed buffers

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;
use thiserror::Error;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable, Serialize, Deserialize)]
pub struct Vector2D {
    pub x: f32,
    pub y: f32,
}

impl Vector2D {
    pub const ZERO: Vector2D = Vector2D { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Vector2D { x, y }
    }

    pub fn magnitude(&self) -> f32 {
        self.magnitude_squared().sqrt()
    }

    pub fn magnitude_squared(&self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    /// Unit vector in the same direction, or the zero vector when the
    /// length is zero or not representable.
    pub fn normalize(&self) -> Vector2D {
        let mag = self.magnitude();
        if mag > 0.0 && mag.is_finite() {
            let inv = 1.0 / mag;
            Vector2D {
                x: self.x * inv,
                y: self.y * inv,
            }
        } else {
            Vector2D::ZERO
        }
    }

    pub fn dot(&self, other: &Vector2D) -> f32 {
        self.x * other.x + self.y * other.y
    }

    pub fn distance(&self, other: &Vector2D) -> f32 {
        (*self - *other).magnitude()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl fmt::Display for Vector2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vector2D({:.4}, {:.4})", self.x, self.y)
    }
}

impl Add for Vector2D {
    type Output = Vector2D;

    fn add(self, other: Vector2D) -> Vector2D {
        Vector2D {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }
}

impl AddAssign for Vector2D {
    fn add_assign(&mut self, other: Vector2D) {
        self.x += other.x;
        self.y += other.y;
    }
}

impl Sub for Vector2D {
    type Output = Vector2D;

    fn sub(self, other: Vector2D) -> Vector2D {
        Vector2D {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }
}

impl SubAssign for Vector2D {
    fn sub_assign(&mut self, other: Vector2D) {
        self.x -= other.x;
        self.y -= other.y;
    }
}

impl Mul<f32> for Vector2D {
    type Output = Vector2D;

    fn mul(self, scalar: f32) -> Vector2D {
        Vector2D {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }
}

impl Neg for Vector2D {
    type Output = Vector2D;

    fn neg(self) -> Vector2D {
        Vector2D {
            x: -self.x,
            y: -self.y,
        }
    }
}

/// One simulated crowd member.
///
/// The field order is the renderer contract: `[posX, posY, velX, velY,
/// predPosX, predPosY, goalX, goalY]` as consecutive `f32`s. Agents have no
/// identity beyond their slot index.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Agent {
    pub position: Vector2D,
    pub velocity: Vector2D,
    /// Tentative end-of-step position used while solving constraints.
    pub predicted_position: Vector2D,
    pub goal: Vector2D,
}

impl Agent {
    /// Number of `f32` values in one agent record.
    pub const FLOATS: usize = 8;

    pub fn new(position: Vector2D, velocity: Vector2D, goal: Vector2D) -> Self {
        Agent {
            position,
            velocity,
            predicted_position: position,
            goal,
        }
    }

    pub fn to_record(&self) -> [f32; Agent::FLOATS] {
        bytemuck::cast(*self)
    }

    pub fn from_record(record: [f32; Agent::FLOATS]) -> Self {
        bytemuck::cast(record)
    }

    /// Implied velocity over one step, from the predicted displacement.
    pub fn implied_velocity(&self, delta_t: f32) -> Vector2D {
        (self.predicted_position - self.position) * (1.0 / delta_t)
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite()
            && self.velocity.is_finite()
            && self.predicted_position.is_finite()
            && self.goal.is_finite()
    }
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Agent(pos={}, vel={}, ppos={}, goal={})",
            self.position, self.velocity, self.predicted_position, self.goal
        )
    }
}

/// Initial population layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SceneKind {
    /// Uniform positions, two diagonal corner goals.
    Random,
    /// Two facing grid formations that swap strips.
    #[default]
    Square,
    /// Ring of agents heading to their antipodes.
    Circle,
}

impl fmt::Display for SceneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SceneKind::Random => "RANDOM",
            SceneKind::Square => "SQUARE",
            SceneKind::Circle => "CIRCLE",
        };
        f.write_str(name)
    }
}

impl FromStr for SceneKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RANDOM" => Ok(SceneKind::Random),
            "SQUARE" => Ok(SceneKind::Square),
            "CIRCLE" => Ok(SceneKind::Circle),
            _ => Err(ConfigError::UnknownScene(s.to_string())),
        }
    }
}

/// How a pass distributes its per-agent work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Execution {
    Sequential,
    #[default]
    Parallel,
}

/// Errors raised when parameters or buffers are rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("time step must be finite and positive, got {0}")]
    InvalidTimeStep(f32),
    #[error("agent scale must be finite and positive, got {0}")]
    InvalidAgentScale(f32),
    #[error("flat agent buffer of length {len} is not a multiple of {stride}", stride = Agent::FLOATS)]
    MisalignedBuffer { len: usize },
    #[error("unknown scene kind {0:?}")]
    UnknownScene(String),
}

/// Parameters read once per step. The controller may replace them between steps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimParams {
    pub delta_t: f32,
    /// Short-range collision passes per step.
    pub stability_iterations: u32,
    /// Long-range collision passes per step.
    pub constraint_iterations: u32,
    /// Density-derived scale applied to every radius and speed.
    pub agent_scale: f32,
    /// When false the long-range stage is skipped.
    pub avoidance_enabled: bool,
    pub execution: Execution,
}

impl Default for SimParams {
    fn default() -> Self {
        SimParams {
            delta_t: 0.02,
            stability_iterations: 1,
            constraint_iterations: 6,
            agent_scale: 1.0,
            avoidance_enabled: true,
            execution: Execution::Parallel,
        }
    }
}

/// Population at which `agent_scale` is still 1.0.
pub const BASELINE_POPULATION: usize = 512;

impl SimParams {
    /// Scale that halves for every 4x growth in population beyond
    /// [`BASELINE_POPULATION`]; never exceeds 1.0.
    pub fn agent_scale_for(num_agents: usize) -> f32 {
        // floor(log4(n / baseline)) in integers, so exact powers of four
        // never round down.
        let mut halvings = 0;
        let mut threshold = BASELINE_POPULATION.saturating_mul(4);
        while num_agents >= threshold {
            halvings += 1;
            threshold = match threshold.checked_mul(4) {
                Some(next) => next,
                None => break,
            };
        }
        0.5_f32.powi(halvings)
    }

    pub fn for_population(num_agents: usize) -> Self {
        SimParams {
            agent_scale: Self::agent_scale_for(num_agents),
            ..SimParams::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.delta_t.is_finite() && self.delta_t > 0.0) {
            return Err(ConfigError::InvalidTimeStep(self.delta_t));
        }
        if !(self.agent_scale.is_finite() && self.agent_scale > 0.0) {
            return Err(ConfigError::InvalidAgentScale(self.agent_scale));
        }
        Ok(())
    }
}

/// Physical constants of the solver. Only the scaled ones change with
/// `agent_scale`; the rest are fixed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverConstants {
    pub agent_speed: f32,
    pub max_speed: f32,
    /// Short-range neighbour threshold.
    pub near_radius: f32,
    /// Long-range neighbour threshold.
    pub far_radius: f32,
    pub cohesion_radius: f32,
    pub agent_radius: f32,
    pub blend_factor: f32,
    pub k_short_range: f32,
    pub k_long_range: f32,
    pub avg_coeff: f32,
    pub epsilon: f32,
    /// Contacts predicted beyond this time are ignored.
    pub time_horizon: f32,
    pub kernel_support: f32,
    pub xsph_h: f32,
}

impl SolverConstants {
    pub fn from_scale(agent_scale: f32) -> Self {
        let agent_speed = 0.1 * agent_scale;
        SolverConstants {
            agent_speed,
            max_speed: 1.2 * agent_speed,
            near_radius: 0.2 * agent_scale,
            far_radius: 0.5 * agent_scale,
            cohesion_radius: 1.0 * agent_scale,
            agent_radius: 0.03 * agent_scale,
            blend_factor: 0.0385,
            k_short_range: 1.0,
            k_long_range: 0.15,
            avg_coeff: 1.2,
            epsilon: 0.0001,
            time_horizon: 20.0,
            kernel_support: 217.0,
            xsph_h: 7.0,
        }
    }

    /// Distance between centres at which two agents touch.
    pub fn contact_distance(&self) -> f32 {
        2.0 * self.agent_radius
    }
}

impl Default for SolverConstants {
    fn default() -> Self {
        SolverConstants::from_scale(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Vector2D Tests ====================

    #[test]
    fn test_vector2d_magnitude_345() {
        let v = Vector2D::new(3.0, 4.0);
        assert_eq!(v.magnitude(), 5.0);
        assert_eq!(v.magnitude_squared(), 25.0);
    }

    #[test]
    fn test_vector2d_normalize_zero_is_zero() {
        let n = Vector2D::ZERO.normalize();
        assert_eq!(n, Vector2D::ZERO, "Zero vector must normalize to zero, not NaN");
    }

    #[test]
    fn test_vector2d_normalize_infinite_is_zero() {
        let n = Vector2D::new(f32::INFINITY, 1.0).normalize();
        assert!(n.is_finite(), "Non-finite input must not leak into the result");
        assert_eq!(n, Vector2D::ZERO);
    }

    #[test]
    fn test_vector2d_normalize_345() {
        let n = Vector2D::new(-3.0, 4.0).normalize();
        assert!((n.x + 0.6).abs() < 1e-6);
        assert!((n.y - 0.8).abs() < 1e-6);
        assert!((n.magnitude() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_vector2d_dot_and_distance() {
        let a = Vector2D::new(1.0, 2.0);
        let b = Vector2D::new(3.0, 4.0);
        assert_eq!(a.dot(&b), 11.0);
        assert_eq!(Vector2D::new(0.0, 0.0).distance(&Vector2D::new(3.0, 4.0)), 5.0);
        assert_eq!(a.distance(&b), b.distance(&a));
    }

    #[test]
    fn test_vector2d_operators() {
        let mut v = Vector2D::new(1.0, 2.0) + Vector2D::new(3.0, 4.0);
        assert_eq!(v, Vector2D::new(4.0, 6.0));
        v -= Vector2D::new(1.0, 1.0);
        assert_eq!(v, Vector2D::new(3.0, 5.0));
        v += Vector2D::new(1.0, 1.0) * 2.0;
        assert_eq!(v, Vector2D::new(5.0, 7.0));
        assert_eq!(-v, Vector2D::new(-5.0, -7.0));
        assert_eq!(v - v, Vector2D::ZERO);
    }

    #[test]
    fn test_vector2d_display() {
        assert_eq!(Vector2D::new(1.5, 2.5).to_string(), "Vector2D(1.5000, 2.5000)");
    }

    // ==================== Agent Tests ====================

    #[test]
    fn test_agent_new_syncs_predicted_position() {
        let agent = Agent::new(
            Vector2D::new(0.5, -0.5),
            Vector2D::new(0.1, 0.0),
            Vector2D::new(1.0, 1.0),
        );
        assert_eq!(agent.predicted_position, agent.position);
    }

    #[test]
    fn test_agent_record_order() {
        let agent = Agent {
            position: Vector2D::new(1.0, 2.0),
            velocity: Vector2D::new(3.0, 4.0),
            predicted_position: Vector2D::new(5.0, 6.0),
            goal: Vector2D::new(7.0, 8.0),
        };
        assert_eq!(agent.to_record(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        assert_eq!(Agent::from_record(agent.to_record()), agent);
        assert_eq!(std::mem::size_of::<Agent>(), Agent::FLOATS * 4, "Record stride must be 32 bytes");
    }

    #[test]
    fn test_agent_implied_velocity() {
        let mut agent = Agent::new(Vector2D::ZERO, Vector2D::ZERO, Vector2D::ZERO);
        agent.predicted_position = Vector2D::new(0.02, -0.04);
        let v = agent.implied_velocity(0.02);
        assert!((v.x - 1.0).abs() < 1e-6);
        assert!((v.y + 2.0).abs() < 1e-6);
    }

    // ==================== SceneKind Tests ====================

    #[test]
    fn test_scene_kind_parse() {
        assert_eq!("RANDOM".parse::<SceneKind>(), Ok(SceneKind::Random));
        assert_eq!("square".parse::<SceneKind>(), Ok(SceneKind::Square));
        assert_eq!(" Circle ".parse::<SceneKind>(), Ok(SceneKind::Circle));
        assert_eq!(
            "spiral".parse::<SceneKind>(),
            Err(ConfigError::UnknownScene("spiral".to_string()))
        );
    }

    #[test]
    fn test_scene_kind_display_round_trip() {
        for kind in [SceneKind::Random, SceneKind::Square, SceneKind::Circle] {
            assert_eq!(kind.to_string().parse::<SceneKind>(), Ok(kind));
        }
    }

    // ==================== SimParams Tests ====================

    #[test]
    fn test_agent_scale_for_population() {
        assert_eq!(SimParams::agent_scale_for(0), 1.0);
        assert_eq!(SimParams::agent_scale_for(16), 1.0);
        assert_eq!(SimParams::agent_scale_for(1024), 1.0);
        assert_eq!(SimParams::agent_scale_for(2048), 0.5);
        assert_eq!(SimParams::agent_scale_for(4096), 0.5);
        assert_eq!(SimParams::agent_scale_for(8192), 0.25);
        assert_eq!(SimParams::agent_scale_for(32768), 0.125);
    }

    #[test]
    fn test_validate_rejects_bad_time_step() {
        let mut params = SimParams::default();
        assert!(params.validate().is_ok());
        params.delta_t = 0.0;
        assert_eq!(params.validate(), Err(ConfigError::InvalidTimeStep(0.0)));
        params.delta_t = f32::NAN;
        assert!(matches!(params.validate(), Err(ConfigError::InvalidTimeStep(_))));
    }

    #[test]
    fn test_validate_rejects_bad_scale() {
        let params = SimParams {
            agent_scale: -1.0,
            ..SimParams::default()
        };
        assert_eq!(params.validate(), Err(ConfigError::InvalidAgentScale(-1.0)));
    }

    #[test]
    fn test_params_deserialize_with_defaults() {
        let params: SimParams =
            serde_json::from_str(r#"{"delta_t": 0.01, "execution": "sequential"}"#)
                .expect("partial params should deserialize");
        assert_eq!(params.delta_t, 0.01);
        assert_eq!(params.constraint_iterations, 6);
        assert_eq!(params.execution, Execution::Sequential);
        assert!(params.avoidance_enabled);
    }

    #[test]
    fn test_scene_kind_serde_names() {
        let json = serde_json::to_string(&SceneKind::Circle).expect("serialize");
        assert_eq!(json, "\"CIRCLE\"");
    }

    // ==================== SolverConstants Tests ====================

    #[test]
    fn test_constants_scale_with_agent_scale() {
        let full = SolverConstants::from_scale(1.0);
        let half = SolverConstants::from_scale(0.5);
        assert!((full.agent_speed - 0.1).abs() < 1e-7);
        assert!((full.max_speed - 0.12).abs() < 1e-7);
        assert!((half.near_radius - 0.1).abs() < 1e-7);
        assert!((half.far_radius - 0.25).abs() < 1e-7);
        assert!((half.contact_distance() - 0.03).abs() < 1e-7);
        assert_eq!(full.blend_factor, half.blend_factor, "Unscaled constants must not change");
        assert_eq!(full.kernel_support, half.kernel_support);
    }
}
