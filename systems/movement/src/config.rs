use std::f64::consts::PI;

use floorsim_core::BarrierType;
use serde::{Deserialize, Serialize};

/// Numeric scheme used to advance an agent by one timestep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Integration {
    /// One evaluation of the physics update per tick.
    #[default]
    Euler,
    /// Classical fourth order Runge-Kutta over full state snapshots.
    RungeKutta4,
}

/// Smooth falloff of the barrier repulsion force.
///
/// The force is a cubic Bezier with control values `1, c1, c2, 0` evaluated at
/// the clearance between the body and the barrier divided by `range`, scaled by
/// `magnitude`. It is zero at or beyond `range`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepulsionCurve {
    /// Clearance, in metres, beyond which no force is applied.
    pub range: f64,
    /// Acceleration applied when the body touches the barrier.
    pub magnitude: f64,
    /// Second Bezier control value.
    pub c1: f64,
    /// Third Bezier control value.
    pub c2: f64,
}

impl RepulsionCurve {
    /// Repulsive acceleration at the given clearance.
    #[must_use]
    pub fn value(&self, clearance: f64) -> f64 {
        if self.range <= 0.0 || clearance >= self.range {
            return 0.0;
        }
        let s = (clearance / self.range).clamp(0.0, 1.0);
        let r = 1.0 - s;
        let bezier = r * r * r + 3.0 * r * r * s * self.c1 + 3.0 * r * s * s * self.c2;
        self.magnitude * bezier
    }
}

impl Default for RepulsionCurve {
    fn default() -> Self {
        Self {
            range: 0.8,
            magnitude: 5.0,
            c1: 0.35,
            c2: 0.0,
        }
    }
}

/// Tunables of the agent physics.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Radius of the circular body, also the collision buffer.
    pub body_radius: f64,
    /// Speed cap in metres per second.
    pub max_speed: f64,
    /// Acceleration along the goal direction while moving.
    pub acceleration: f64,
    /// Braking deceleration while stopping.
    pub deceleration: f64,
    /// Maximum turning rate in radians per second.
    pub angular_velocity: f64,
    /// Barrier repulsion falloff.
    pub repulsion: RepulsionCurve,
    /// Fraction of the normal speed kept when bouncing off a barrier.
    pub elasticity: f64,
    /// Coulomb-like friction coefficient applied to the tangential speed on impact.
    pub friction: f64,
    /// Distance the body is pushed away from a barrier after a contact.
    pub penetration_correction: f64,
    /// Nominal timestep in seconds.
    pub time_step: f64,
    /// Largest observed timestep accepted as is.
    pub max_time_step: f64,
    /// Integration scheme.
    pub integration: Integration,
    /// Collision sub-steps allowed within one timestep.
    pub max_collision_substeps: u32,
    /// Barrier class the body collides with.
    pub barrier: BarrierType,
}

impl MotionConfig {
    /// Returns the timestep to simulate for an observed delta.
    ///
    /// Deltas that are not finite, not positive or larger than
    /// [`MotionConfig::max_time_step`] are replaced by the nominal step.
    #[must_use]
    pub fn applied_time_step(&self, observed: f64) -> f64 {
        if observed.is_finite() && observed > 0.0 && observed <= self.max_time_step {
            observed
        } else {
            self.time_step
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            body_radius: 0.3,
            max_speed: 1.4,
            acceleration: 3.0,
            deceleration: 3.0,
            angular_velocity: PI,
            repulsion: RepulsionCurve::default(),
            elasticity: 0.1,
            friction: 0.1,
            penetration_correction: 0.01,
            time_step: 0.02,
            max_time_step: 0.05,
            integration: Integration::Euler,
            max_collision_substeps: 8,
            barrier: BarrierType::Field,
        }
    }
}
