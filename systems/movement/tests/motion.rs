use std::sync::Arc;

use floorsim_core::{
    ActivityField, AgentId, BarrierPolygon, BarrierType, Barriers, EngagementBounds,
    EngagementStatus, Event, MovementMode, StateBase, Tolerance, Uv,
};
use floorsim_floor::CellularFloor;
use floorsim_system_movement::{
    Agent, Integration, MotionConfig, MotionError, RepulsionCurve, Simulation,
};
use floorsim_system_scenario::{Activity, Catalog, PotentialField, Scenario, Sequence};

const ROOM: Uv = Uv::new(10.0, 6.0);

fn room() -> CellularFloor {
    let outer = BarrierPolygon::rectangle(Uv::ZERO, ROOM);
    let barriers = Barriers {
        visual: vec![outer.clone()],
        physical: vec![outer.clone()],
        field: vec![outer],
    };
    CellularFloor::build(0.5, &barriers, Uv::new(5.0, 3.0), Tolerance::DEFAULT)
        .expect("valid floor")
}

fn activity(floor: &CellularFloor, name: &str, at: Uv, facing: Uv) -> Arc<dyn ActivityField> {
    let field =
        PotentialField::from_destination(name, floor.geometry(), at).expect("reachable");
    Arc::new(Activity::new(field, facing, EngagementBounds::new(1.0, 2.0)))
}

fn office(floor: &CellularFloor) -> Scenario {
    let activities = vec![
        activity(floor, "desk", Uv::new(2.0, 3.0), Uv::Y),
        activity(floor, "window", Uv::new(8.0, 3.0), Uv::X),
    ];
    let visit = Sequence::new("visit", vec!["window".into(), "desk".into()], 2.0)
        .expect("valid sequence");
    let catalog = Catalog::new(activities, vec![visit], vec!["desk".into()], Vec::new())
        .expect("consistent catalog");
    Scenario::new(Arc::new(catalog))
}

/// Activity pulling in one fixed direction towards a far away rest point.
struct Heading {
    direction: Uv,
}

impl ActivityField for Heading {
    fn name(&self) -> &str {
        "heading"
    }

    fn direction(&self, _location: Uv) -> Option<Uv> {
        Some(self.direction)
    }

    fn potential(&self, _location: Uv) -> Option<f64> {
        Some(0.0)
    }

    fn default_state(&self) -> StateBase {
        StateBase::at_rest(Uv::new(1000.0, 3.0), self.direction)
    }

    fn engagement_bounds(&self) -> EngagementBounds {
        EngagementBounds::new(0.0, 0.0)
    }
}

fn heading(direction: Uv) -> Scenario {
    let activities: Vec<Arc<dyn ActivityField>> = vec![Arc::new(Heading { direction })];
    let catalog = Catalog::new(activities, Vec::new(), vec!["heading".into()], Vec::new())
        .expect("consistent catalog");
    Scenario::new(Arc::new(catalog))
}

fn run(agent: &mut Agent, floor: &CellularFloor, seconds: f64, dt: f64) -> Vec<Event> {
    let mut events = Vec::new();
    let ticks = (seconds / dt).round() as usize;
    for _ in 0..ticks {
        agent.tick(floor, dt, &mut events).expect("agent keeps moving");
    }
    events
}

#[test]
fn agent_resting_on_its_station_stops_immediately() {
    let floor = room();
    let rest = StateBase::at_rest(Uv::new(2.0, 3.0), Uv::Y);
    let mut agent = Agent::new(AgentId::new(0), MotionConfig::default(), office(&floor), rest, 1)
        .expect("station available");

    assert!(agent.stop_and_orient_check(&floor));

    let events = run(&mut agent, &floor, 0.02, 0.02);
    assert_eq!(agent.mode(), MovementMode::StopAndOrient);
    assert_eq!(agent.state().velocity, Uv::ZERO);
    assert_eq!(agent.state().location, Uv::new(2.0, 3.0));
    assert_eq!(agent.walked_distance(), 0.0);
    assert_eq!(
        events,
        vec![Event::MovementModeChanged {
            agent: AgentId::new(0),
            mode: MovementMode::StopAndOrient,
        }]
    );
}

#[test]
fn free_agent_walks_to_its_station_and_faces_it() {
    let floor = room();
    let start = StateBase::at_rest(Uv::new(8.0, 3.0), Uv::X);
    let mut agent = Agent::new(AgentId::new(1), MotionConfig::default(), office(&floor), start, 2)
        .expect("station available");
    assert_eq!(agent.activity().name(), "desk");

    let _ = run(&mut agent, &floor, 12.0, 0.02);

    let state = agent.state();
    assert_eq!(agent.engagement(), EngagementStatus::Free);
    assert_eq!(agent.mode(), MovementMode::StopAndOrient);
    assert!(state.location.distance(Uv::new(2.0, 3.0)) < 0.5, "{state:?}");
    assert_eq!(state.velocity, Uv::ZERO);
    assert!(state.direction.distance(Uv::Y) < 1e-6, "{state:?}");
    assert!(agent.walked_distance() > 5.5);
}

#[test]
fn stop_check_requires_heading_towards_the_station() {
    let floor = room();
    let agent_at = |velocity: Uv| {
        let state = StateBase::new(Uv::new(2.2, 3.0), Uv::X, velocity);
        Agent::new(AgentId::new(10), MotionConfig::default(), office(&floor), state, 11)
            .expect("station available")
    };

    // 1.2 m/s brakes over 0.24 m, beyond the 0.2 m left to the desk.
    assert!(agent_at(Uv::new(-1.2, 0.0)).stop_and_orient_check(&floor));
    assert!(!agent_at(Uv::new(1.2, 0.0)).stop_and_orient_check(&floor));
    assert!(!agent_at(Uv::new(0.0, 1.2)).stop_and_orient_check(&floor));
}

#[test]
fn turning_on_the_spot_counts_as_idle_rotation() {
    let floor = room();
    let rest = StateBase::at_rest(Uv::new(2.0, 3.0), Uv::X);
    let mut agent = Agent::new(AgentId::new(9), MotionConfig::default(), office(&floor), rest, 10)
        .expect("station available");

    let _ = run(&mut agent, &floor, 0.1, 0.02);
    assert_eq!(agent.walked_distance(), 0.0);
    let expected = MotionConfig::default().angular_velocity * 0.1;
    assert!((agent.idle_rotation() - expected).abs() < 1e-9);
}

#[test]
fn activated_sequence_visits_every_activity_and_completes() {
    let floor = room();
    let start = StateBase::at_rest(Uv::new(2.0, 3.0), Uv::Y);
    let mut agent = Agent::new(AgentId::new(2), MotionConfig::default(), office(&floor), start, 3)
        .expect("station available");
    agent.load_queues(4.0);
    assert_eq!(agent.scenario().expected().len(), 2);

    let events = run(&mut agent, &floor, 40.0, 0.02);

    let started: Vec<&str> = events
        .iter()
        .filter_map(|event| match event {
            Event::ActivityStarted { activity, .. } => Some(activity.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(&started[..2], ["window", "desk"]);

    let engaged = events
        .iter()
        .filter(|event| {
            matches!(
                event,
                Event::EngagementChanged {
                    to: EngagementStatus::Engaged,
                    ..
                }
            )
        })
        .count();
    assert!(engaged >= 2);

    assert!(events.iter().any(|event| matches!(
        event,
        Event::SequenceCompleted { sequence, .. } if sequence == "visit"
    )));
    // The finished sequence is re-armed for a future activation.
    assert!(agent.scenario().expected().len() <= 1);
}

#[test]
fn wall_contacts_consume_the_step_and_respect_the_speed_cap() {
    let floor = room();
    let config = MotionConfig {
        repulsion: RepulsionCurve {
            magnitude: 0.0,
            ..RepulsionCurve::default()
        },
        ..MotionConfig::default()
    };
    let start = StateBase::at_rest(Uv::new(7.0, 3.0), Uv::X);
    let mut agent = Agent::new(AgentId::new(3), config, heading(Uv::X), start, 4)
        .expect("station available");

    let mut events = Vec::new();
    for _ in 0..250 {
        agent
            .tick(&floor, 0.02, &mut events)
            .expect("collisions are resolved");
        let state = agent.state();
        assert!(state.velocity.length() <= config.max_speed + 1e-12);
        assert!(
            state.location.x <= ROOM.x - config.body_radius + 1e-6,
            "body penetrated the wall: {state:?}"
        );
    }

    assert!(events
        .iter()
        .any(|event| matches!(event, Event::Collided { normal, .. } if normal.x < -0.99)));
    assert!((agent.walked_time() - 5.0).abs() < 1e-9);
    assert!(agent.state().location.x > ROOM.x - config.body_radius - 0.05);
}

#[test]
fn repulsion_keeps_the_body_off_the_wall() {
    let floor = room();
    let config = MotionConfig {
        repulsion: RepulsionCurve {
            magnitude: 30.0,
            ..RepulsionCurve::default()
        },
        ..MotionConfig::default()
    };
    let start = StateBase::at_rest(Uv::new(7.0, 3.0), Uv::X);
    let mut agent = Agent::new(AgentId::new(4), config, heading(Uv::X), start, 5)
        .expect("station available");

    let events = run(&mut agent, &floor, 6.0, 0.02);
    assert!(agent.state().location.x < ROOM.x - config.body_radius);
    assert!(!events
        .iter()
        .any(|event| matches!(event, Event::Collided { .. })));
}

#[test]
fn runge_kutta_and_euler_agree_for_small_steps() {
    let floor = room();
    let start = StateBase::at_rest(Uv::new(2.0, 3.0), Uv::X);
    let trajectory = |integration: Integration, dt: f64| {
        let config = MotionConfig {
            integration,
            ..MotionConfig::default()
        };
        let mut agent = Agent::new(AgentId::new(5), config, heading(Uv::X), start, 6)
            .expect("station available");
        let _ = run(&mut agent, &floor, 1.0, dt);
        agent.state().location
    };

    // Accelerate at 3 m/s² up to 1.4 m/s, then cruise.
    let cruise_start = 1.4 / 3.0;
    let expected = 2.0 + 1.4 * 1.0 - 1.4 * cruise_start / 2.0;

    let euler = trajectory(Integration::Euler, 0.001);
    let runge_kutta = trajectory(Integration::RungeKutta4, 0.001);
    assert!((euler.x - expected).abs() < 5e-3, "{euler:?}");
    assert!((runge_kutta.x - expected).abs() < 5e-3, "{runge_kutta:?}");
    assert!(euler.distance(runge_kutta) < 5e-3);
    assert!((euler.y - 3.0).abs() < 1e-12);
}

#[test]
fn out_of_range_timestep_is_clamped_and_reported() {
    let floor = room();
    let start = StateBase::at_rest(Uv::new(2.0, 3.0), Uv::Y);
    let mut agent = Agent::new(AgentId::new(6), MotionConfig::default(), office(&floor), start, 7)
        .expect("station available");

    let mut events = Vec::new();
    agent.tick(&floor, 3.0, &mut events).expect("tick succeeds");
    assert!((agent.walked_time() - 0.02).abs() < 1e-12);
    assert!(events.contains(&Event::TimeStepClamped {
        agent: AgentId::new(6),
        observed: 3.0,
        applied: 0.02,
    }));
}

#[test]
fn leaving_the_floor_halts_the_agent() {
    // Field barriers that do not enclose the room let the body walk off the grid.
    let barriers = Barriers {
        physical: vec![BarrierPolygon::rectangle(Uv::ZERO, ROOM)],
        field: vec![BarrierPolygon::open(vec![Uv::new(1.0, 1.0), Uv::new(1.0, 2.0)])],
        ..Barriers::default()
    };
    let floor = Arc::new(
        CellularFloor::build(0.5, &barriers, Uv::new(5.0, 3.0), Tolerance::DEFAULT)
            .expect("valid floor"),
    );
    let start = StateBase::at_rest(Uv::new(8.0, 3.0), Uv::X);
    let agent = Agent::new(AgentId::new(7), MotionConfig::default(), heading(Uv::X), start, 8)
        .expect("station available");

    let mut simulation = Simulation::new(Arc::clone(&floor));
    simulation.add_agent(agent);

    let mut faults = Vec::new();
    for _ in 0..500 {
        let report = simulation.advance(0.02);
        faults.extend(report.faults);
    }

    assert_eq!(faults.len(), 1);
    assert!(matches!(faults[0], (id, MotionError::LeftFloor { .. }) if id == AgentId::new(7)));
    let agent = &simulation.agents()[0];
    assert!(agent.is_halted());
    assert_eq!(agent.state().velocity, Uv::ZERO);

    let mut direct = Agent::new(AgentId::new(8), MotionConfig::default(), heading(Uv::X), start, 9)
        .expect("station available");
    let mut events = Vec::new();
    let first_error = (0..500)
        .find_map(|_| direct.tick(&floor, 0.02, &mut events).err())
        .expect("agent leaves the floor");
    assert!(matches!(first_error, MotionError::LeftFloor { .. }));
    assert_eq!(
        direct.tick(&floor, 0.02, &mut events),
        Err(MotionError::Halted {
            agent: AgentId::new(8)
        })
    );
}

#[test]
fn bodies_pushed_into_a_sharp_corner_keep_moving_without_penetrating() {
    // Triangular room whose apex at (10, 12) is about 52 degrees wide.
    let wedge = BarrierPolygon::closed(vec![
        Uv::new(2.0, 0.0),
        Uv::new(14.0, 0.0),
        Uv::new(10.0, 12.0),
    ]);
    let barriers = Barriers {
        visual: vec![wedge.clone()],
        physical: vec![wedge.clone()],
        field: vec![wedge],
    };
    let floor = CellularFloor::build(0.5, &barriers, Uv::new(9.0, 3.0), Tolerance::DEFAULT)
        .expect("valid floor");
    let walls = floor.geometry().edges(BarrierType::Field).to_vec();
    let apex = Uv::new(10.0, 12.0);

    let mut contacts = 0;
    for integration in [Integration::Euler, Integration::RungeKutta4] {
        for magnitude in [0.0, 5.0] {
            for start in [Uv::new(9.0, 3.0), Uv::new(7.0, 4.0), Uv::new(11.0, 6.0)] {
                for offset in [-0.6, -0.3, 0.0, 0.3, 0.6] {
                    let aim = (apex - start).normalize();
                    let (sin, cos) = f64::sin_cos(offset);
                    let direction = Uv::new(aim.x * cos - aim.y * sin, aim.x * sin + aim.y * cos);
                    let config = MotionConfig {
                        integration,
                        repulsion: RepulsionCurve {
                            magnitude,
                            ..RepulsionCurve::default()
                        },
                        ..MotionConfig::default()
                    };
                    let state = StateBase::at_rest(start, direction);
                    let mut agent =
                        Agent::new(AgentId::new(11), config, heading(direction), state, 12)
                            .expect("station available");

                    let mut events = Vec::new();
                    for tick in 0..500 {
                        if let Err(fault) = agent.tick(&floor, 0.02, &mut events) {
                            panic!(
                                "{integration:?} from {start:?} towards {direction:?} \
                                 faulted at tick {tick}: {fault}"
                            );
                        }
                        let location = agent.state().location;
                        for wall in &walls {
                            assert!(
                                wall.distance_to(location) >= config.body_radius - 1e-5,
                                "{integration:?} from {start:?} penetrated at {location:?}"
                            );
                        }
                    }
                    assert!(!agent.is_halted());
                    contacts += events
                        .iter()
                        .filter(|event| matches!(event, Event::Collided { .. }))
                        .count();
                }
            }
        }
    }

    assert!(contacts > 0);
}
