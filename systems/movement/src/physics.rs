//! One physics update of a single agent: steering, braking, collision
//! sub-steps and turning.

use std::ops::{Add, Mul};

use floorsim_core::{ActivityField, MovementMode, StateBase, Uv};
use floorsim_floor::CellularFloor;
use floorsim_system_collision::{Collision, CollisionAnalyzer};
use tracing::{debug, warn};

use crate::{Integration, MotionConfig, MotionError};

/// Upper bound on the passes spent pushing a body out of overlapping edges.
const SEPARATION_PASSES: usize = 8;

/// Overlapping edges whose normals are closer to parallel than this are
/// cleared one after the other instead of solving for their common corner.
const MIN_CORNER_SINE: f64 = 0.05;

/// Result of advancing a state by one timestep.
#[derive(Clone, Debug)]
pub(crate) struct Stage {
    pub(crate) state: StateBase,
    pub(crate) collisions: Vec<Collision>,
}

/// Read-only inputs shared by every evaluation within one tick.
pub(crate) struct StepContext<'a> {
    pub(crate) floor: &'a CellularFloor,
    pub(crate) config: &'a MotionConfig,
    pub(crate) mode: MovementMode,
    pub(crate) activity: &'a dyn ActivityField,
}

impl StepContext<'_> {
    /// Advances `start` by `dt` with the configured integration scheme.
    pub(crate) fn integrate(&self, start: StateBase, dt: f64) -> Result<Stage, MotionError> {
        let euler = self.advance(start, dt)?;
        if self.config.integration == Integration::Euler {
            return Ok(euler);
        }

        match self.runge_kutta(start, &euler, dt) {
            Ok(state) if !self.penetrates(state.location) => Ok(Stage {
                state,
                collisions: euler.collisions,
            }),
            Ok(_) => {
                debug!("runge-kutta result penetrates a barrier, keeping euler step");
                Ok(euler)
            }
            Err(error) => {
                debug!(%error, "runge-kutta stage failed, keeping euler step");
                Ok(euler)
            }
        }
    }

    fn runge_kutta(
        &self,
        start: StateBase,
        euler: &Stage,
        dt: f64,
    ) -> Result<StateBase, MotionError> {
        let k1 = Delta::between(&start, &euler.state);
        let s2 = k1.apply(&start, 0.5);
        let k2 = Delta::between(&s2, &self.advance(s2, dt)?.state);
        let s3 = k2.apply(&start, 0.5);
        let k3 = Delta::between(&s3, &self.advance(s3, dt)?.state);
        let s4 = k3.apply(&start, 1.0);
        let k4 = Delta::between(&s4, &self.advance(s4, dt)?.state);

        let combined = (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (1.0 / 6.0);
        let mut state = combined.apply(&start, 1.0);
        state.direction = state
            .direction
            .try_normalize()
            .unwrap_or(euler.state.direction);
        Ok(state)
    }

    fn penetrates(&self, location: Uv) -> bool {
        let geometry = self.floor.geometry();
        if geometry.cell_at(location).is_none() {
            return true;
        }
        let limit = self.config.body_radius - geometry.tolerance().get();
        CollisionAnalyzer::get(geometry, location, self.config.barrier)
            .is_some_and(|analyzer| analyzer.distance() < limit)
    }

    /// Runs the full per-tick physics update once, starting from `start`.
    pub(crate) fn advance(&self, start: StateBase, dt: f64) -> Result<Stage, MotionError> {
        let goal = self.activity.direction(start.location);
        let target = self.activity.default_state();

        let velocity = match self.mode {
            MovementMode::Move => {
                let drive = goal.unwrap_or(Uv::ZERO) * self.config.acceleration;
                let velocity = start.velocity + (drive + self.repulsion(&start)) * dt;
                clamp_length(velocity, self.config.max_speed)
            }
            MovementMode::StopAndOrient => self.brake(&start, target.location, dt),
        };

        let (location, velocity, collisions) = self.sweep(start.location, velocity, dt)?;

        let facing = match self.mode {
            MovementMode::Move => goal.unwrap_or(start.direction),
            MovementMode::StopAndOrient => target.direction,
        };
        let direction = rotate_towards(
            start.direction,
            facing,
            self.config.angular_velocity * dt,
        );

        Ok(Stage {
            state: StateBase::new(location, direction, velocity),
            collisions,
        })
    }

    /// Repulsive acceleration from the nearest barrier in front of the agent.
    fn repulsion(&self, state: &StateBase) -> Uv {
        let config = self.config;
        let geometry = self.floor.geometry();
        let reach = config.body_radius + config.repulsion.range;
        if let Some(distance) = self.floor.distance_at(config.barrier, state.location) {
            if distance > reach + geometry.frame().diagonal() {
                return Uv::ZERO;
            }
        }
        let Some(analyzer) = CollisionAnalyzer::get(geometry, state.location, config.barrier) else {
            return Uv::ZERO;
        };
        if analyzer.normal().dot(state.direction) >= 0.0 {
            return Uv::ZERO;
        }
        let clearance = analyzer.distance() - config.body_radius;
        analyzer.normal() * config.repulsion.value(clearance)
    }

    /// Removes the velocity component across the line to `target` first, then
    /// the component along it, spending at most one timestep of deceleration.
    fn brake(&self, state: &StateBase, target: Uv, dt: f64) -> Uv {
        let mut budget = self.config.deceleration * dt;
        let speed = state.velocity.length();
        let to_target = target - state.location;
        if speed <= budget && to_target.length() <= self.floor.geometry().cell_size() {
            return Uv::ZERO;
        }

        let axis = to_target
            .try_normalize()
            .or_else(|| state.velocity.try_normalize())
            .unwrap_or(Uv::X);
        let parallel = axis * state.velocity.dot(axis);
        let perpendicular = state.velocity - parallel;

        let perpendicular = spend(perpendicular, &mut budget);
        let parallel = spend(parallel, &mut budget);
        perpendicular + parallel
    }

    /// Moves the body along `velocity` for `dt`, resolving every barrier
    /// contact on the way.
    ///
    /// Each contact consumes the part of the step before the hit; the loop
    /// ends once the rest of the step is free of contacts or after
    /// `max_collision_substeps` contacts, discarding what is left.
    fn sweep(
        &self,
        start: Uv,
        velocity: Uv,
        dt: f64,
    ) -> Result<(Uv, Uv, Vec<Collision>), MotionError> {
        let config = self.config;
        let geometry = self.floor.geometry();
        let radius = config.body_radius;
        let tolerance = geometry.tolerance().get();

        let mut location = start;
        let mut velocity = velocity;
        let mut remaining = dt;
        let mut collisions = Vec::new();
        let mut previous = CollisionAnalyzer::get(geometry, location, config.barrier);

        while remaining > 0.0 {
            // Movement below the tolerance cannot be swept; it counts as consumed.
            if (velocity * remaining).length() <= tolerance {
                break;
            }
            let tentative = location + velocity * remaining;
            if geometry.cell_at(tentative).is_none() {
                return Err(MotionError::LeftFloor {
                    location: tentative,
                });
            }
            let current = match CollisionAnalyzer::get(geometry, tentative, config.barrier) {
                Some(current) if current.distance() <= radius => current,
                _ => {
                    location = tentative;
                    break;
                }
            };

            let Some(hit) =
                Collision::detect(geometry, location, previous.as_ref(), &current, radius)
            else {
                let receding = previous
                    .as_ref()
                    .is_some_and(|previous| current.distance() >= previous.distance());
                if receding {
                    location = tentative;
                    break;
                }
                return Err(MotionError::MissingCollision {
                    location,
                    velocity,
                    edge: current.edge(),
                });
            };

            let bounced = clamp_length(self.respond(velocity, hit.normal), config.max_speed);
            (location, velocity) =
                self.separate(hit.point + hit.normal * config.penetration_correction, bounced);
            remaining *= hit.time_step_remainder_proportion.clamp(0.0, 1.0);
            collisions.push(hit);
            previous = CollisionAnalyzer::get(geometry, location, config.barrier);

            if collisions.len() >= config.max_collision_substeps as usize && remaining > 0.0 {
                warn!(
                    substeps = collisions.len(),
                    remaining,
                    x = location.x,
                    y = location.y,
                    "collision sub-step cap reached, discarding the rest of the step"
                );
                break;
            }
        }

        Ok((location, velocity, collisions))
    }

    /// Pushes the body clear of every edge it still overlaps and drops the
    /// velocity component pointing into those edges.
    ///
    /// Resolving a contact with one side of a sharp corner can leave the body
    /// inside the buffer of the other side. Each pass moves the body by the
    /// shortest offset that clears the deepest overlap and, when that is not
    /// enough, the next deepest one as well.
    fn separate(&self, location: Uv, velocity: Uv) -> (Uv, Uv) {
        let mut location = location;
        let mut velocity = velocity;
        for _ in 0..SEPARATION_PASSES {
            let overlaps = self.overlaps(location);
            let Some(&(normal, depth)) = overlaps
                .iter()
                .max_by(|a, b| a.1.total_cmp(&b.1))
            else {
                break;
            };

            let single = normal * depth;
            let remaining = overlaps
                .iter()
                .map(|&(other, other_depth)| (other, other_depth - other.dot(single)))
                .filter(|&(other, _)| other != normal)
                .max_by(|a, b| a.1.total_cmp(&b.1));
            location += match remaining {
                Some((other, other_depth)) if other_depth > 0.0 => {
                    let determinant = normal.perp_dot(other);
                    if determinant.abs() <= MIN_CORNER_SINE {
                        single + other * other_depth
                    } else {
                        let other_total = other_depth + other.dot(single);
                        Uv::new(
                            (depth * other.y - other_total * normal.y) / determinant,
                            (normal.x * other_total - other.x * depth) / determinant,
                        )
                    }
                }
                _ => single,
            };

            velocity = shed_inward(velocity, overlaps.iter().map(|&(normal, _)| normal));
        }

        (location, velocity)
    }

    /// Outward normal and depth below the corrected clearance of every edge
    /// whose buffer contains `location`.
    fn overlaps(&self, location: Uv) -> Vec<(Uv, f64)> {
        let config = self.config;
        let geometry = self.floor.geometry();
        let tolerance = geometry.tolerance();
        let Some(cell) = geometry.cell_at(location) else {
            return Vec::new();
        };
        let lines = geometry.edges(config.barrier);
        let clearance = config.body_radius + config.penetration_correction;

        cell.buffer_edges(config.barrier)
            .iter()
            .filter_map(|&edge| lines.get(edge))
            .filter_map(|line| {
                let offset = location - line.closest_point(location, tolerance).point;
                let distance = offset.length();
                if distance >= config.body_radius - tolerance.get() {
                    return None;
                }
                let normal = if distance > tolerance.get() {
                    offset / distance
                } else {
                    line.left_normal()?
                };
                Some((normal, clearance - distance))
            })
            .collect()
    }

    /// Reflects the normal component with elasticity and slows the tangential
    /// component by friction.
    fn respond(&self, velocity: Uv, normal: Uv) -> Uv {
        let normal_speed = velocity.dot(normal);
        if normal_speed >= 0.0 {
            return velocity;
        }
        let tangential = velocity - normal * normal_speed;
        let tangential_speed = tangential.length();
        let slowdown = (self.config.friction * -normal_speed).min(tangential_speed);
        let tangential = if tangential_speed > 0.0 {
            tangential * ((tangential_speed - slowdown) / tangential_speed)
        } else {
            Uv::ZERO
        };
        tangential - normal * (normal_speed * self.config.elasticity)
    }
}

/// Removes the velocity components pointing against the normals. Inside a
/// sharp corner no sliding direction is left and the body stops.
fn shed_inward(velocity: Uv, normals: impl Iterator<Item = Uv> + Clone) -> Uv {
    let mut velocity = velocity;
    for normal in normals.clone() {
        let inward = velocity.dot(normal);
        if inward < 0.0 {
            velocity -= normal * inward;
        }
    }
    let mut normals = normals;
    if normals.any(|normal| velocity.dot(normal) < -1e-12) {
        Uv::ZERO
    } else {
        velocity
    }
}

fn spend(component: Uv, budget: &mut f64) -> Uv {
    let speed = component.length();
    if speed <= *budget {
        *budget -= speed;
        Uv::ZERO
    } else {
        let kept = component * ((speed - *budget) / speed);
        *budget = 0.0;
        kept
    }
}

fn clamp_length(vector: Uv, max: f64) -> Uv {
    let length = vector.length();
    if length > max && length > 0.0 {
        vector * (max / length)
    } else {
        vector
    }
}

/// Turns the unit vector `from` towards `to` by at most `max_angle` radians.
pub(crate) fn rotate_towards(from: Uv, to: Uv, max_angle: f64) -> Uv {
    let Some(to) = to.try_normalize() else {
        return from;
    };
    let Some(from) = from.try_normalize() else {
        return to;
    };
    let angle = turn_angle(from, to);
    if angle.abs() <= max_angle {
        return to;
    }
    let step = max_angle.copysign(angle);
    let (sin, cos) = step.sin_cos();
    Uv::new(from.x * cos - from.y * sin, from.x * sin + from.y * cos)
}

/// Signed angle from `from` to `to`.
pub(crate) fn turn_angle(from: Uv, to: Uv) -> f64 {
    from.perp_dot(to).atan2(from.dot(to))
}

#[derive(Clone, Copy, Debug)]
struct Delta {
    location: Uv,
    velocity: Uv,
    direction: Uv,
}

impl Delta {
    fn between(from: &StateBase, to: &StateBase) -> Self {
        Self {
            location: to.location - from.location,
            velocity: to.velocity - from.velocity,
            direction: to.direction - from.direction,
        }
    }

    fn apply(self, base: &StateBase, weight: f64) -> StateBase {
        StateBase::new(
            base.location + self.location * weight,
            base.direction + self.direction * weight,
            base.velocity + self.velocity * weight,
        )
    }
}

impl Add for Delta {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            location: self.location + other.location,
            velocity: self.velocity + other.velocity,
            direction: self.direction + other.direction,
        }
    }
}

impl Mul<f64> for Delta {
    type Output = Self;

    fn mul(self, weight: f64) -> Self {
        Self {
            location: self.location * weight,
            velocity: self.velocity * weight,
            direction: self.direction * weight,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use floorsim_core::{BarrierPolygon, Barriers, EngagementBounds, Tolerance};
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn rotation_is_capped_by_the_angular_step() {
        let turned = rotate_towards(Uv::X, Uv::Y, 0.1);
        assert!((turn_angle(Uv::X, turned) - 0.1).abs() < 1e-12);
        assert!((turned.length() - 1.0).abs() < 1e-12);

        let turned = rotate_towards(Uv::X, Uv::NEG_Y, 0.1);
        assert!((turn_angle(Uv::X, turned) + 0.1).abs() < 1e-12);

        assert_eq!(rotate_towards(Uv::X, Uv::Y, FRAC_PI_2 + 0.1), Uv::Y);
        assert_eq!(rotate_towards(Uv::X, Uv::ZERO, 0.1), Uv::X);
    }

    #[test]
    fn braking_budget_goes_to_the_perpendicular_component_first() {
        let mut budget = 1.0;
        let perpendicular = spend(Uv::new(0.0, 0.6), &mut budget);
        let parallel = spend(Uv::new(2.0, 0.0), &mut budget);
        assert_eq!(perpendicular, Uv::ZERO);
        assert!((parallel.x - 1.6).abs() < 1e-12);
        assert_eq!(budget, 0.0);
    }

    struct Still;

    impl ActivityField for Still {
        fn name(&self) -> &str {
            "still"
        }

        fn direction(&self, _location: Uv) -> Option<Uv> {
            None
        }

        fn potential(&self, _location: Uv) -> Option<f64> {
            Some(0.0)
        }

        fn default_state(&self) -> StateBase {
            StateBase::at_rest(Uv::new(9.0, 3.0), Uv::X)
        }

        fn engagement_bounds(&self) -> EngagementBounds {
            EngagementBounds::new(0.0, 0.0)
        }
    }

    const APEX: Uv = Uv::new(10.0, 12.0);

    /// Triangle with an apex of about 52 degrees.
    fn wedge() -> CellularFloor {
        let triangle = BarrierPolygon::closed(vec![Uv::new(2.0, 0.0), Uv::new(14.0, 0.0), APEX]);
        let barriers = Barriers {
            visual: vec![triangle.clone()],
            physical: vec![triangle.clone()],
            field: vec![triangle],
        };
        CellularFloor::build(0.5, &barriers, Uv::new(9.0, 3.0), Tolerance::DEFAULT)
            .expect("valid floor")
    }

    fn near_apex(distance: f64) -> Uv {
        let bisector = ((Uv::new(2.0, 0.0) - APEX).normalize()
            + (Uv::new(14.0, 0.0) - APEX).normalize())
        .normalize();
        APEX + bisector * distance
    }

    #[test]
    fn separation_clears_both_sides_of_a_sharp_corner() {
        let floor = wedge();
        let config = MotionConfig::default();
        let context = StepContext {
            floor: &floor,
            config: &config,
            mode: MovementMode::Move,
            activity: &Still,
        };
        let walls = floor.geometry().edges(config.barrier);
        let start = near_apex(0.5);
        assert!(walls.iter().filter(|wall| wall.distance_to(start) < 0.3).count() >= 2);

        let (location, velocity) = context.separate(start, Uv::new(0.0, 1.0));

        for wall in walls {
            let clearance = wall.distance_to(location);
            assert!(clearance >= config.body_radius, "{clearance} at {location:?}");
            assert!(wall.distance_to(location + velocity * 0.01) >= clearance - 1e-9);
        }
    }

    #[test]
    fn movement_below_the_tolerance_is_consumed_inside_a_corner() {
        let floor = wedge();
        let config = MotionConfig::default();
        let context = StepContext {
            floor: &floor,
            config: &config,
            mode: MovementMode::Move,
            activity: &Still,
        };
        let start = near_apex(0.66);
        let velocity = Uv::new(0.0, 2e-5);

        let (location, kept, collisions) = context
            .sweep(start, velocity, 0.02)
            .expect("leftover movement is not a fault");
        assert_eq!(location, start);
        assert_eq!(kept, velocity);
        assert!(collisions.is_empty());
    }

    #[test]
    fn speed_is_clamped_without_changing_heading() {
        let clamped = clamp_length(Uv::new(3.0, 4.0), 1.0);
        assert!((clamped - Uv::new(0.6, 0.8)).length() < 1e-12);
        assert_eq!(clamp_length(Uv::new(0.3, 0.4), 1.0), Uv::new(0.3, 0.4));
    }
}
