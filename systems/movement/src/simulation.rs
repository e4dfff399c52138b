use std::sync::Arc;

use floorsim_core::{AgentId, Event};
use floorsim_floor::CellularFloor;
use rayon::prelude::*;

use crate::{Agent, AgentSnapshot, MotionError};

/// Outcome of advancing every agent by one tick.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepReport {
    /// Events emitted by the agents, grouped by agent in insertion order.
    pub events: Vec<Event>,
    /// Agents halted by a fatal fault during the tick.
    pub faults: Vec<(AgentId, MotionError)>,
}

/// Agents sharing one immutable floor.
#[derive(Debug)]
pub struct Simulation {
    floor: Arc<CellularFloor>,
    agents: Vec<Agent>,
    time: f64,
}

impl Simulation {
    /// Creates a simulation without agents.
    #[must_use]
    pub fn new(floor: Arc<CellularFloor>) -> Self {
        Self {
            floor,
            agents: Vec::new(),
            time: 0.0,
        }
    }

    /// Adds an agent.
    pub fn add_agent(&mut self, agent: Agent) {
        self.agents.push(agent);
    }

    /// Shared floor.
    #[must_use]
    pub fn floor(&self) -> &Arc<CellularFloor> {
        &self.floor
    }

    /// Agents in insertion order.
    #[must_use]
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Sum of the observed deltas passed to [`Simulation::advance`].
    #[must_use]
    pub const fn time(&self) -> f64 {
        self.time
    }

    /// Steps every agent that is not halted, in parallel.
    ///
    /// Agents only mutate their own state, so the report is identical to the
    /// one a sequential loop would produce.
    pub fn advance(&mut self, dt: f64) -> StepReport {
        let floor = self.floor.as_ref();
        let outcomes: Vec<(Vec<Event>, Option<(AgentId, MotionError)>)> = self
            .agents
            .par_iter_mut()
            .filter(|agent| !agent.is_halted())
            .map(|agent| {
                let mut events = Vec::new();
                let fault = agent
                    .tick(floor, dt, &mut events)
                    .err()
                    .map(|fault| (agent.id(), fault));
                (events, fault)
            })
            .collect();
        self.time += dt;

        let mut report = StepReport::default();
        for (events, fault) in outcomes {
            report.events.extend(events);
            report.faults.extend(fault);
        }
        report
    }

    /// Snapshots of every agent.
    #[must_use]
    pub fn snapshots(&self) -> Vec<AgentSnapshot> {
        self.agents.iter().map(Agent::snapshot).collect()
    }
}
