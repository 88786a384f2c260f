//! End-to-end behaviour of the tick pipeline.

use flocksim::prelude::*;
use flocksim::{forces, Agent, FlockBuilder};

fn zero_forces() -> SimulationParameters {
    SimulationParameters {
        cohesion_weight: 0.0,
        separation_weight: 0.0,
        alignment_weight: 0.0,
        containment_strength: 0.0,
        ..Default::default()
    }
}

fn without_obstacles(builder: FlockBuilder) -> FlockBuilder {
    builder.with_obstacles(ObstacleSet::new())
}

fn assert_speeds_in_band(sim: &FlockSimulation) {
    let (min, max) = sim.parameters().speed_limits();
    for (i, agent) in sim.agents().iter().enumerate() {
        let speed = agent.speed();
        assert!(
            speed >= min - 1e-3 && speed <= max + 1e-3,
            "agent {} speed {} outside [{}, {}]",
            i,
            speed,
            min,
            max
        );
    }
}

#[test]
fn test_zero_weights_move_in_straight_lines() {
    let mut sim = FlockSimulation::builder()
        .with_seed(1)
        .with_parameters(zero_forces())
        .build()
        .unwrap();
    let id = sim.obstacles().first_id().unwrap();
    sim.obstacles_mut().set_enabled(id, false).unwrap();

    sim.reset(200);
    let before: Vec<Agent> = sim.agents().to_vec();
    sim.step(0.016).unwrap();

    for (a, b) in before.iter().zip(sim.agents()) {
        assert_eq!(b.velocity, a.velocity);
        assert!((b.position - (a.position + a.velocity * 0.016)).length() < 1e-4);
    }
}

#[test]
fn test_speed_bounds_hold_every_tick() {
    for method in [ForceMethod::Modern, ForceMethod::Legacy] {
        let mut sim = FlockSimulation::builder()
            .with_seed(5)
            .with_density(400)
            .with_method(method)
            .build()
            .unwrap();
        for _ in 0..120 {
            sim.step(1.0 / 60.0).unwrap();
            assert_speeds_in_band(&sim);
        }
    }
}

#[test]
fn test_speed_bounds_follow_speed_scale() {
    let mut sim = FlockSimulation::builder().with_seed(2).build().unwrap();
    sim.apply_parameters(SimulationParameters {
        speed_scale: 2.5,
        ..Default::default()
    })
    .unwrap();
    for _ in 0..30 {
        sim.step(1.0 / 60.0).unwrap();
    }
    assert_speeds_in_band(&sim);
    assert_eq!(sim.parameters().speed_limits(), (45.0, 135.0));
}

#[test]
fn test_count_invariant_across_ticks() {
    let mut sim = FlockSimulation::builder().with_seed(3).with_density(150).build().unwrap();
    for _ in 0..50 {
        sim.step(1.0 / 60.0).unwrap();
        assert_eq!(sim.len(), 150);
        assert_eq!(sim.frame().agents.len(), 150);
    }
    sim.grow();
    sim.step(1.0 / 60.0).unwrap();
    assert_eq!(sim.len(), 160);
}

#[test]
fn test_deterministic_for_same_seed() {
    let build = || {
        FlockSimulation::builder()
            .with_seed(77)
            .with_density(300)
            .build()
            .unwrap()
    };
    let mut a = build();
    let mut b = build();
    for _ in 0..60 {
        a.step(1.0 / 60.0).unwrap();
        b.step(1.0 / 60.0).unwrap();
    }
    assert_eq!(a.agents(), b.agents());
    assert_eq!(a.frame().agent_bytes(), b.frame().agent_bytes());
}

#[test]
fn test_apply_parameters_is_idempotent() {
    let params = SimulationParameters {
        cohesion_weight: 5.0,
        neighbourhood_distance: 15.0,
        ..Default::default()
    };
    let build = || FlockSimulation::builder().with_seed(8).build().unwrap();

    let mut once = build();
    once.apply_parameters(params).unwrap();
    once.step(1.0 / 60.0).unwrap();

    let mut twice = build();
    twice.apply_parameters(params).unwrap();
    twice.apply_parameters(params).unwrap();
    twice.step(1.0 / 60.0).unwrap();

    assert_eq!(once.agents(), twice.agents());
}

#[test]
fn test_containment_boundary() {
    let params = SimulationParameters::default();
    let threshold = params.half_extent - params.containment_margin;

    let at_margin = Vec3::new(threshold, -threshold, threshold);
    assert_eq!(forces::containment(at_margin, &params), Vec3::ZERO);

    let beyond = Vec3::new(threshold + 0.5, 0.0, 0.0);
    let push = forces::containment(beyond, &params);
    assert!(push.x < 0.0);
    assert_eq!(push.y, 0.0);
}

#[test]
fn test_agents_stay_in_box() {
    let mut sim = without_obstacles(FlockSimulation::builder().with_seed(4).with_density(300))
        .build()
        .unwrap();
    let half = sim.parameters().half_extent;
    for _ in 0..600 {
        sim.step(1.0 / 60.0).unwrap();
        for agent in sim.agents() {
            assert!(agent.position.abs().max_element() <= half + 1e-3);
        }
    }
}

#[test]
fn test_close_pair_separation_dominates() {
    let mut sim = without_obstacles(
        FlockSimulation::builder()
            .with_density_bounds(2, 2)
            .with_density(2),
    )
    .build()
    .unwrap();
    {
        let agents = sim.agents_mut();
        agents[0] = Agent::new(Vec3::ZERO, Vec3::new(0.0, 0.0, 30.0), 1.0);
        agents[1] = Agent::new(Vec3::new(0.01, 0.0, 0.0), Vec3::new(0.0, 0.0, 30.0), 1.0);
    }

    let params = *sim.parameters();
    assert_eq!(params.flock_distance, 4.0);
    assert_eq!(params.separation_weight, 9.0);

    let grid = {
        let mut grid = flocksim::SpatialIndex::new(flocksim::SpatialConfig::for_radius(
            params.query_radius(),
            params.half_extent,
        ));
        let positions: Vec<Vec3> = sim.agents().iter().map(|a| a.position).collect();
        grid.rebuild(&positions);
        grid
    };
    let steering = sim
        .force_model()
        .steering(0, sim.agents(), &grid, sim.obstacles(), &params);

    assert!(steering.separation.x < 0.0);
    assert!(steering.separation.length() > steering.cohesion.length());
    assert!(steering.separation.length() > steering.alignment.length());

    // After a tick the pair has moved apart along x
    sim.step(1.0 / 60.0).unwrap();
    let gap = sim.agents()[1].position.x - sim.agents()[0].position.x;
    assert!(gap > 0.01);
}

#[test]
fn test_obstacle_collision_corrected() {
    let mut sim = FlockSimulation::builder()
        .with_density_bounds(1, 1)
        .with_density(1)
        .build()
        .unwrap();
    let id = sim.obstacles().first_id().unwrap();
    let obstacle = *sim.obstacles().get(id).unwrap();
    assert_eq!(obstacle.position, Vec3::ZERO);
    assert_eq!(obstacle.radius, 4.0);
    assert!((obstacle.collision_radius() - 5.2).abs() < 1e-5);

    // Heading straight into the obstacle from inside its collision zone
    sim.agents_mut()[0] = Agent::new(Vec3::new(3.0, 0.0, 0.0), Vec3::new(-40.0, 0.0, 0.0), 1.0);

    let report = sim.step(1.0 / 60.0).unwrap();
    assert_eq!(report.colliding, 1);
    assert_eq!(report.corrected, 1);

    let agent = sim.agents()[0];
    assert!(agent.position.length() >= obstacle.collision_radius() - 1e-3);
    assert!(agent.velocity.x >= 0.0);

    for _ in 0..120 {
        sim.step(1.0 / 60.0).unwrap();
        assert!(sim.agents()[0].position.length() >= obstacle.collision_radius() - 1e-3);
    }
}

#[test]
fn test_disabled_obstacle_ignored() {
    let mut sim = FlockSimulation::builder()
        .with_density_bounds(1, 1)
        .with_density(1)
        .with_parameters(zero_forces())
        .build()
        .unwrap();
    let id = sim.obstacles().first_id().unwrap();
    sim.obstacles_mut().set_enabled(id, false).unwrap();
    sim.agents_mut()[0] = Agent::new(Vec3::new(3.0, 0.0, 0.0), Vec3::new(-30.0, 0.0, 0.0), 1.0);

    let report = sim.step(0.1).unwrap();
    assert_eq!(report.colliding, 0);
    assert!((sim.agents()[0].position - Vec3::ZERO).length() < 1e-4);
}

#[test]
fn test_panel_json_drives_simulation() {
    let panel = PanelSettings::from_json_str(
        r#"{
            "flock_density": 120,
            "speed_percent": 50,
            "obstacle_enabled": false,
            "method": "legacy"
        }"#,
    )
    .unwrap();
    let mut sim = FlockSimulation::builder().with_seed(12).build().unwrap();
    sim.apply_panel(&panel).unwrap();

    assert_eq!(sim.len(), 120);
    assert_eq!(sim.method(), ForceMethod::Legacy);
    for _ in 0..30 {
        sim.step(1.0 / 60.0).unwrap();
    }
    assert_speeds_in_band(&sim);
    assert_eq!(sim.parameters().speed_limits(), (9.0, 27.0));
}

#[test]
fn test_render_frame_layout() {
    let mut sim = FlockSimulation::builder().with_seed(6).with_density(50).build().unwrap();
    sim.step(1.0 / 60.0).unwrap();
    let frame = sim.frame();
    assert_eq!(frame.tick, 1);
    assert_eq!(frame.agent_bytes().len(), 50 * 32);
    assert_eq!(frame.obstacle_bytes().len(), 48);
    assert_eq!(frame.flock_material, Material::FLOCK);
    for (t, a) in frame.agents.iter().zip(sim.agents()) {
        assert_eq!(t.position(), a.position);
        let forward = t.orientation() * Vec3::Z;
        assert!(forward.abs_diff_eq(a.velocity.normalize(), 1e-4));
    }
}
