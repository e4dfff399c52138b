//! TOML description of a simulation run.

use std::{fs, path::Path, sync::Arc};

use anyhow::{ensure, Context, Result};
use floorsim_core::{
    ActivityField, AgentId, BarrierPolygon, Barriers, EngagementBounds, StateBase, Tolerance, Uv,
};
use floorsim_floor::CellularFloor;
use floorsim_system_movement::{Agent, MotionConfig, Simulation};
use floorsim_system_scenario::{
    Activity, Catalog, PotentialField, Scenario, Sequence, VisualTrigger,
};
use floorsim_system_visibility::PointTargets;
use serde::Deserialize;
use tracing::{debug, info};

/// Complete scenario file.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ScenarioFile {
    /// Desired cell size of the floor grid.
    pub(crate) cell_size: f64,
    /// Interior point used to classify the floor.
    pub(crate) seed: Uv,
    /// Absolute geometric tolerance.
    #[serde(default = "default_tolerance")]
    pub(crate) tolerance: f64,
    /// Simulated seconds.
    #[serde(default = "default_duration")]
    pub(crate) duration: f64,
    /// Seconds between two recorded snapshots.
    #[serde(default = "default_sample_interval")]
    pub(crate) sample_interval: f64,
    /// Activity names agents idle at.
    pub(crate) main_stations: Vec<String>,
    #[serde(default)]
    barriers: BarrierFile,
    activities: Vec<ActivityFile>,
    #[serde(default)]
    sequences: Vec<SequenceFile>,
    #[serde(default)]
    triggers: Vec<TriggerFile>,
    /// Physics tunables shared by every agent.
    #[serde(default)]
    pub(crate) motion: MotionConfig,
    agents: Vec<AgentFile>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct BarrierFile {
    #[serde(default)]
    visual: Vec<PolygonFile>,
    #[serde(default)]
    physical: Vec<PolygonFile>,
    #[serde(default)]
    field: Vec<PolygonFile>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PolygonFile {
    points: Vec<Uv>,
    #[serde(default = "default_closed")]
    closed: bool,
}

impl PolygonFile {
    fn to_polygon(&self) -> BarrierPolygon {
        if self.closed {
            BarrierPolygon::closed(self.points.clone())
        } else {
            BarrierPolygon::open(self.points.clone())
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ActivityFile {
    name: String,
    destination: Uv,
    #[serde(default = "default_direction")]
    direction: Uv,
    engagement: [f64; 2],
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SequenceFile {
    name: String,
    activities: Vec<String>,
    lambda: f64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TriggerFile {
    sequence: String,
    points: Vec<Uv>,
    #[serde(default)]
    cosine_factor: f64,
    max_distance: Option<f64>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AgentFile {
    location: Uv,
    #[serde(default = "default_direction")]
    direction: Uv,
    #[serde(default)]
    seed: u64,
}

fn default_tolerance() -> f64 {
    Tolerance::DEFAULT.get()
}

fn default_duration() -> f64 {
    60.0
}

fn default_sample_interval() -> f64 {
    0.5
}

fn default_closed() -> bool {
    true
}

fn default_direction() -> Uv {
    Uv::X
}

impl ScenarioFile {
    /// Reads and parses a scenario file.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario file {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("failed to load scenario file {}", path.display()))
    }

    /// Parses scenario TOML.
    pub(crate) fn parse(contents: &str) -> Result<Self> {
        let scenario: Self =
            toml::from_str(contents).context("failed to parse scenario toml contents")?;
        ensure!(
            scenario.sample_interval > 0.0,
            "sample interval must be positive, got {}",
            scenario.sample_interval
        );
        ensure!(
            scenario.duration >= 0.0,
            "duration must not be negative, got {}",
            scenario.duration
        );
        ensure!(!scenario.agents.is_empty(), "scenario declares no agents");
        Ok(scenario)
    }

    /// Builds the floor, registers the activity fields and spawns the agents
    /// with task queues covering `duration` seconds.
    pub(crate) fn build(&self, duration: f64) -> Result<Simulation> {
        let barriers = Barriers {
            visual: self.barriers.visual.iter().map(PolygonFile::to_polygon).collect(),
            physical: self.barriers.physical.iter().map(PolygonFile::to_polygon).collect(),
            field: self.barriers.field.iter().map(PolygonFile::to_polygon).collect(),
        };
        let floor = CellularFloor::build(
            self.cell_size,
            &barriers,
            self.seed,
            Tolerance::new(self.tolerance),
        )
        .context("failed to build the cellular floor")?;
        let geometry = floor.geometry();
        info!(
            width = geometry.width(),
            height = geometry.height(),
            cell_size = geometry.cell_size(),
            "floor ready"
        );

        let mut activities: Vec<Arc<dyn ActivityField>> = Vec::with_capacity(self.activities.len());
        for activity in &self.activities {
            let field = PotentialField::from_destination(&activity.name, geometry, activity.destination)
                .with_context(|| format!("failed to build the field of activity `{}`", activity.name))?;
            let _ = floor.spatial_data().add(Arc::clone(field.data()));
            let [a, b] = activity.engagement;
            activities.push(Arc::new(Activity::new(
                field,
                activity.direction,
                EngagementBounds::new(a, b),
            )));
        }
        debug!(fields = ?floor.spatial_data().names(), "spatial data registered");

        let sequences = self
            .sequences
            .iter()
            .map(|sequence| {
                Sequence::new(&sequence.name, sequence.activities.clone(), sequence.lambda)
                    .with_context(|| format!("invalid sequence `{}`", sequence.name))
            })
            .collect::<Result<Vec<_>>>()?;

        let triggers = self
            .triggers
            .iter()
            .map(|trigger| {
                let targets = PointTargets::new(trigger.points.clone())
                    .with_max_distance(trigger.max_distance.unwrap_or(f64::INFINITY));
                VisualTrigger::new(&trigger.sequence, trigger.cosine_factor, Arc::new(targets))
            })
            .collect();

        let catalog = Arc::new(
            Catalog::new(activities, sequences, self.main_stations.clone(), triggers)
                .context("inconsistent scenario definitions")?,
        );

        let mut simulation = Simulation::new(Arc::new(floor));
        for (index, agent) in self.agents.iter().enumerate() {
            let id = u32::try_from(index).context("too many agents")?;
            let mut spawned = Agent::new(
                AgentId::new(id),
                self.motion,
                Scenario::new(Arc::clone(&catalog)),
                StateBase::at_rest(agent.location, agent.direction),
                agent.seed,
            )
            .with_context(|| format!("failed to spawn agent {id}"))?;
            spawned.load_queues(duration);
            simulation.add_agent(spawned);
        }
        info!(agents = self.agents.len(), "agents spawned");
        Ok(simulation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OFFICE: &str = include_str!("../scenarios/office.toml");

    #[test]
    fn bundled_scenario_builds() {
        let scenario = ScenarioFile::parse(OFFICE).expect("scenario parses");
        let simulation = scenario.build(scenario.duration).expect("scenario builds");

        assert_eq!(simulation.agents().len(), 3);
        let names = simulation.floor().spatial_data().names();
        for field in ["desk", "printer", "coffee", "edge_distance"] {
            assert!(names.iter().any(|name| name == field), "missing field {field}");
        }
    }

    #[test]
    fn bundled_scenario_advances_without_faults() {
        let scenario = ScenarioFile::parse(OFFICE).expect("scenario parses");
        let mut simulation = scenario.build(10.0).expect("scenario builds");
        for _ in 0..250 {
            let report = simulation.advance(scenario.motion.time_step);
            assert!(report.faults.is_empty(), "{:?}", report.faults);
        }
        assert!(simulation
            .snapshots()
            .iter()
            .all(|snapshot| (snapshot.time - 5.0).abs() < 1e-9));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let error = ScenarioFile::parse("cell_size = 0.5\nseed = [1.0, 1.0]\nspeed = 3\n")
            .expect_err("unknown key");
        assert!(format!("{error:#}").contains("speed"));
    }

    #[test]
    fn unknown_station_is_reported() {
        let contents = r#"
cell_size = 0.5
seed = [1.0, 1.0]
main_stations = ["nowhere"]

[[barriers.field]]
points = [[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0]]

[[barriers.physical]]
points = [[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0]]

[[activities]]
name = "desk"
destination = [2.0, 2.0]
engagement = [1.0, 2.0]

[[agents]]
location = [1.0, 1.0]
"#;
        let scenario = ScenarioFile::parse(contents).expect("scenario parses");
        let error = scenario.build(10.0).expect_err("station is unknown");
        assert!(format!("{error:#}").contains("nowhere"));
    }
}
