use std::{fmt, sync::Arc};

use floorsim_core::{
    ActivityField, AgentId, EngagementStatus, Event, MovementMode, StateBase, Uv,
};
use floorsim_floor::CellularFloor;
use floorsim_system_scenario::{Scenario, Task};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::{
    physics::{turn_angle, StepContext},
    MotionConfig, MotionError,
};

/// Sequence an agent is currently working through.
#[derive(Clone, Debug, PartialEq)]
struct ActiveSequence {
    name: String,
    position: usize,
}

/// Serializable view of an agent after a tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    /// Agent identifier.
    pub agent: AgentId,
    /// Simulated seconds since the agent was created.
    pub time: f64,
    /// Kinematic state.
    pub state: StateBase,
    /// Schedule status.
    pub engagement: EngagementStatus,
    /// Physical movement mode.
    pub mode: MovementMode,
    /// Activity the agent is heading to or performing.
    pub activity: String,
    /// Sequence being worked through, if any.
    pub sequence: Option<String>,
    /// Total distance walked.
    pub walked_distance: f64,
}

/// A pedestrian steered by activity potential fields.
///
/// Each tick evaluates the task state machine once and then integrates the
/// physics update, so every agent only mutates its own state and reads the
/// shared floor.
pub struct Agent {
    id: AgentId,
    config: MotionConfig,
    state: StateBase,
    engagement: EngagementStatus,
    mode: MovementMode,
    activity: Arc<dyn ActivityField>,
    sequence: Option<ActiveSequence>,
    scenario: Scenario,
    rng: ChaCha8Rng,
    engagement_end: f64,
    walked_time: f64,
    walked_distance: f64,
    idle_rotation: f64,
    halted: bool,
}

impl Agent {
    /// Creates a free agent heading to the best main station for `state`.
    pub fn new(
        id: AgentId,
        config: MotionConfig,
        scenario: Scenario,
        state: StateBase,
        seed: u64,
    ) -> Result<Self, MotionError> {
        let activity = scenario
            .catalog()
            .best_station(state.location)
            .ok_or(MotionError::NoStation)?;
        let state = StateBase {
            direction: state.direction.try_normalize().unwrap_or(Uv::X),
            ..state
        };
        Ok(Self {
            id,
            config,
            state,
            engagement: EngagementStatus::Free,
            mode: MovementMode::Move,
            activity,
            sequence: None,
            scenario,
            rng: ChaCha8Rng::seed_from_u64(seed),
            engagement_end: 0.0,
            walked_time: 0.0,
            walked_distance: 0.0,
            idle_rotation: 0.0,
            halted: false,
        })
    }

    /// Fills the expected task queue for `duration` seconds using the agent's
    /// own random stream.
    pub fn load_queues(&mut self, duration: f64) {
        self.scenario.load_queues(duration, &mut self.rng);
    }

    /// Agent identifier.
    #[must_use]
    pub const fn id(&self) -> AgentId {
        self.id
    }

    /// Physics configuration.
    #[must_use]
    pub const fn config(&self) -> &MotionConfig {
        &self.config
    }

    /// Current kinematic state.
    #[must_use]
    pub const fn state(&self) -> &StateBase {
        &self.state
    }

    /// Current schedule status.
    #[must_use]
    pub const fn engagement(&self) -> EngagementStatus {
        self.engagement
    }

    /// Current physical movement mode.
    #[must_use]
    pub const fn mode(&self) -> MovementMode {
        self.mode
    }

    /// Activity the agent is heading to or performing.
    #[must_use]
    pub fn activity(&self) -> &Arc<dyn ActivityField> {
        &self.activity
    }

    /// Name of the sequence being worked through.
    #[must_use]
    pub fn sequence(&self) -> Option<&str> {
        self.sequence.as_ref().map(|sequence| sequence.name.as_str())
    }

    /// Task queues of the agent.
    #[must_use]
    pub const fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// Simulated time at which the current engagement ends.
    #[must_use]
    pub const fn engagement_end(&self) -> f64 {
        self.engagement_end
    }

    /// Simulated seconds since the agent was created.
    #[must_use]
    pub const fn walked_time(&self) -> f64 {
        self.walked_time
    }

    /// Total distance walked.
    #[must_use]
    pub const fn walked_distance(&self) -> f64 {
        self.walked_distance
    }

    /// Accumulated turning while standing still, in radians.
    #[must_use]
    pub const fn idle_rotation(&self) -> f64 {
        self.idle_rotation
    }

    /// Reports whether a fatal fault stopped the agent.
    #[must_use]
    pub const fn is_halted(&self) -> bool {
        self.halted
    }

    /// Serializable view of the agent.
    #[must_use]
    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            agent: self.id,
            time: self.walked_time,
            state: self.state,
            engagement: self.engagement,
            mode: self.mode,
            activity: self.activity.name().to_owned(),
            sequence: self.sequence().map(str::to_owned),
            walked_distance: self.walked_distance,
        }
    }

    /// Reports whether the agent should start braking towards the rest pose of
    /// its activity.
    ///
    /// True when the agent already stands on the rest location, when it is
    /// heading towards the rest location and its braking distance reaches it,
    /// or when it came to rest in the stopping mode within one cell of it.
    #[must_use]
    pub fn stop_and_orient_check(&self, floor: &CellularFloor) -> bool {
        let target = self.activity.default_state().location;
        let distance = self.state.location.distance(target);
        let geometry = floor.geometry();
        if distance <= geometry.tolerance().get() {
            return true;
        }
        let speed = self.state.velocity.length();
        if self.mode == MovementMode::StopAndOrient
            && speed <= geometry.tolerance().get()
            && distance <= geometry.cell_size()
        {
            return true;
        }
        let approaching = self.state.velocity.dot(target - self.state.location) > 0.0;
        let braking_distance = speed * speed / (2.0 * self.config.deceleration);
        approaching && braking_distance >= distance
    }

    /// Advances the agent by one timestep.
    ///
    /// Out-of-range observed deltas are replaced by the nominal step. A fatal
    /// physics fault halts the agent; every later call returns
    /// [`MotionError::Halted`].
    pub fn tick(
        &mut self,
        floor: &CellularFloor,
        observed_dt: f64,
        out_events: &mut Vec<Event>,
    ) -> Result<(), MotionError> {
        if self.halted {
            return Err(MotionError::Halted { agent: self.id });
        }

        let dt = self.config.applied_time_step(observed_dt);
        if dt != observed_dt {
            warn!(
                agent = self.id.get(),
                observed = observed_dt,
                applied = dt,
                "observed timestep out of range, using nominal step"
            );
            out_events.push(Event::TimeStepClamped {
                agent: self.id,
                observed: observed_dt,
                applied: dt,
            });
        }

        match self.step(floor, dt, out_events) {
            Ok(()) => Ok(()),
            Err(fault) => {
                error!(
                    agent = self.id.get(),
                    %fault,
                    x = self.state.location.x,
                    y = self.state.location.y,
                    vx = self.state.velocity.x,
                    vy = self.state.velocity.y,
                    activity = self.activity.name(),
                    "agent halted"
                );
                self.halted = true;
                self.state.velocity = Uv::ZERO;
                Err(fault)
            }
        }
    }

    fn step(
        &mut self,
        floor: &CellularFloor,
        dt: f64,
        out_events: &mut Vec<Event>,
    ) -> Result<(), MotionError> {
        self.update_task(floor, out_events)?;

        let previous = self.state;
        let stage = StepContext {
            floor,
            config: &self.config,
            mode: self.mode,
            activity: self.activity.as_ref(),
        }
        .integrate(previous, dt)?;

        out_events.extend(stage.collisions.iter().map(|hit| Event::Collided {
            agent: self.id,
            point: hit.point,
            normal: hit.normal,
            edge: hit.edge,
        }));
        self.state = stage.state;

        let moved = previous.location.distance(self.state.location);
        self.walked_time += dt;
        if moved > floor.geometry().tolerance().get() {
            self.walked_distance += moved;
        } else {
            self.idle_rotation += turn_angle(previous.direction, self.state.direction).abs();
        }

        let fired =
            self.scenario
                .fire_visual_triggers(&self.state, floor.geometry(), self.walked_time);
        out_events.extend(
            fired
                .into_iter()
                .map(|(sequence, target)| Event::VisualTriggerFired {
                    agent: self.id,
                    sequence,
                    target,
                }),
        );
        Ok(())
    }

    /// Evaluates the task state machine once.
    fn update_task(
        &mut self,
        floor: &CellularFloor,
        out_events: &mut Vec<Event>,
    ) -> Result<(), MotionError> {
        let now = self.walked_time;
        match self.engagement {
            EngagementStatus::Free => {
                if let Some(task) = self.scenario.pop_due(now) {
                    self.start_sequence(task, out_events)?;
                } else {
                    let mode = if self.stop_and_orient_check(floor) {
                        MovementMode::StopAndOrient
                    } else {
                        MovementMode::Move
                    };
                    self.set_mode(mode, out_events);
                }
            }
            EngagementStatus::Engaged => {
                if now < self.engagement_end {
                    self.set_mode(MovementMode::StopAndOrient, out_events);
                    return Ok(());
                }
                self.set_mode(MovementMode::Move, out_events);
                self.finish_activity(out_events)?;
            }
            EngagementStatus::WalkingInSequence => {
                if self.stop_and_orient_check(floor) {
                    self.engagement_end = now + self.sample_engagement();
                    self.set_engagement(EngagementStatus::Engaged, out_events);
                    self.set_mode(MovementMode::StopAndOrient, out_events);
                } else {
                    self.set_mode(MovementMode::Move, out_events);
                }
            }
        }
        Ok(())
    }

    /// Moves on after an engagement ended.
    fn finish_activity(&mut self, out_events: &mut Vec<Event>) -> Result<(), MotionError> {
        let now = self.walked_time;
        let Some(active) = self.sequence.take() else {
            return self.become_free(out_events);
        };
        let catalog = Arc::clone(self.scenario.catalog());
        let next = catalog
            .sequence(&active.name)
            .filter(|sequence| !sequence.is_last(active.position))
            .and_then(|sequence| sequence.activity(active.position + 1));

        if let Some(next) = next {
            let position = active.position + 1;
            let name = next.to_owned();
            self.sequence = Some(ActiveSequence {
                name: active.name,
                position,
            });
            self.switch_activity(&name, out_events)?;
            self.set_engagement(EngagementStatus::WalkingInSequence, out_events);
            return Ok(());
        }

        self.scenario.reactivate(&active.name, now, &mut self.rng);
        debug!(agent = self.id.get(), sequence = %active.name, now, "sequence completed");
        out_events.push(Event::SequenceCompleted {
            agent: self.id,
            sequence: active.name,
        });
        match self.scenario.pop_due(now) {
            Some(task) => self.start_sequence(task, out_events),
            None => self.become_free(out_events),
        }
    }

    fn start_sequence(&mut self, task: Task, out_events: &mut Vec<Event>) -> Result<(), MotionError> {
        let first = self
            .scenario
            .catalog()
            .sequence(&task.sequence)
            .and_then(|sequence| sequence.activity(0))
            .map(str::to_owned)
            .ok_or_else(|| MotionError::MissingActivity {
                name: task.sequence.clone(),
            })?;

        debug!(
            agent = self.id.get(),
            sequence = %task.sequence,
            activation_time = task.activation_time,
            now = self.walked_time,
            "sequence started"
        );
        out_events.push(Event::SequenceStarted {
            agent: self.id,
            sequence: task.sequence.clone(),
            activation_time: task.activation_time,
        });
        self.sequence = Some(ActiveSequence {
            name: task.sequence,
            position: 0,
        });
        self.switch_activity(&first, out_events)?;
        self.set_engagement(EngagementStatus::WalkingInSequence, out_events);
        self.set_mode(MovementMode::Move, out_events);
        Ok(())
    }

    fn become_free(&mut self, out_events: &mut Vec<Event>) -> Result<(), MotionError> {
        let station = self
            .scenario
            .catalog()
            .best_station(self.state.location)
            .ok_or(MotionError::NoStation)?;
        if station.name() != self.activity.name() {
            out_events.push(Event::ActivityStarted {
                agent: self.id,
                activity: station.name().to_owned(),
            });
        }
        self.activity = station;
        self.set_engagement(EngagementStatus::Free, out_events);
        Ok(())
    }

    fn switch_activity(&mut self, name: &str, out_events: &mut Vec<Event>) -> Result<(), MotionError> {
        self.activity = self
            .scenario
            .catalog()
            .activity(name)
            .ok_or_else(|| MotionError::MissingActivity {
                name: name.to_owned(),
            })?;
        out_events.push(Event::ActivityStarted {
            agent: self.id,
            activity: name.to_owned(),
        });
        Ok(())
    }

    fn sample_engagement(&mut self) -> f64 {
        let bounds = self.activity.engagement_bounds();
        if bounds.max() > bounds.min() {
            self.rng.gen_range(bounds.min()..=bounds.max())
        } else {
            bounds.min()
        }
    }

    fn set_engagement(&mut self, to: EngagementStatus, out_events: &mut Vec<Event>) {
        if self.engagement != to {
            out_events.push(Event::EngagementChanged {
                agent: self.id,
                from: self.engagement,
                to,
            });
            self.engagement = to;
        }
    }

    fn set_mode(&mut self, mode: MovementMode, out_events: &mut Vec<Event>) {
        if self.mode != mode {
            out_events.push(Event::MovementModeChanged {
                agent: self.id,
                mode,
            });
            self.mode = mode;
        }
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("engagement", &self.engagement)
            .field("mode", &self.mode)
            .field("activity", &self.activity.name())
            .field("sequence", &self.sequence)
            .field("walked_time", &self.walked_time)
            .field("halted", &self.halted)
            .finish_non_exhaustive()
    }
}
