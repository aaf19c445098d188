use tank_arena_core::{ArenaLayout, CombatantId, Command, Obstacle, Pose, Vec3};
use tank_arena_system_agent::{
    AgentVariant, CombatantAgent, OBS_BEARING, OBS_COOLDOWN, OBS_DISTANCE, OBS_HEALTH,
    OBS_LINE_OF_SIGHT, OBS_OPPONENT_BEARING, OBS_OPPONENT_HEALTH,
};
use tank_arena_world::{self as world, query, World};

fn arena(obstacles: Vec<Obstacle>, blue: Pose, red: Pose) -> World {
    let mut world = World::with_layout(ArenaLayout {
        half_extent: 40.0,
        obstacles,
    });
    let mut events = Vec::new();
    for (id, pose) in [(1, blue), (2, red)] {
        world::apply(
            &mut world,
            Command::SpawnCombatant {
                combatant: CombatantId::new(id),
                pose,
            },
            &mut events,
        );
    }
    world
}

fn agent(variant: AgentVariant) -> CombatantAgent {
    let mut agent = CombatantAgent::with_variant(CombatantId::new(1), variant);
    agent.set_opponent(Some(CombatantId::new(2)));
    agent
}

#[test]
fn observation_encodes_relative_geometry() {
    let mut world = arena(
        Vec::new(),
        Pose::new(Vec3::ZERO, 0.0),
        Pose::new(Vec3::new(35.0, 0.0, 0.0), 0.0),
    );
    let mut events = Vec::new();
    world::apply(
        &mut world,
        Command::ApplyDamage {
            combatant: CombatantId::new(2),
            amount: 40.0,
        },
        &mut events,
    );

    let mut agent = agent(AgentVariant::DiscreteMasked);
    let observation = agent.observe(&query::combatant_view(&world), true, &query::probe(&world));

    assert_eq!(observation.len(), 6);
    let value = |index| observation.get(index).expect("field");
    assert!((value(OBS_BEARING) - 0.5).abs() < 1e-4, "opponent due right");
    assert!((value(OBS_DISTANCE) - 0.5).abs() < 1e-4);
    assert!((value(OBS_OPPONENT_BEARING) + 0.5).abs() < 1e-4, "we sit to its left");
    assert_eq!(value(OBS_HEALTH), 1.0);
    assert!((value(OBS_OPPONENT_HEALTH) - 0.6).abs() < 1e-5);
    assert_eq!(value(OBS_COOLDOWN), 1.0);
}

#[test]
fn line_of_sight_requires_an_unobstructed_first_hit() {
    let blue = Pose::new(Vec3::ZERO, 0.0);
    let red = Pose::new(Vec3::new(0.0, 0.0, 20.0), 180.0);

    let open = arena(Vec::new(), blue, red);
    let mut zero_sum = agent(AgentVariant::ZeroSum);
    let observation = zero_sum.observe(&query::combatant_view(&open), false, &query::probe(&open));
    assert_eq!(observation.len(), 7);
    assert_eq!(observation.get(OBS_LINE_OF_SIGHT), Some(1.0));

    let blocked = arena(
        vec![Obstacle {
            center: Vec3::new(0.0, 0.0, 10.0),
            radius: 2.0,
        }],
        blue,
        red,
    );
    let observation =
        zero_sum.observe(&query::combatant_view(&blocked), false, &query::probe(&blocked));
    assert_eq!(observation.get(OBS_LINE_OF_SIGHT), Some(0.0));
}

#[test]
fn status_line_reflects_latest_observation() {
    let world = arena(
        Vec::new(),
        Pose::new(Vec3::ZERO, 0.0),
        Pose::new(Vec3::new(0.0, 0.0, 14.0), 180.0),
    );
    let mut agent = agent(AgentVariant::ZeroSum);
    let _ = agent.observe(&query::combatant_view(&world), false, &query::probe(&world));

    let line = agent.status_line();
    assert!(line.starts_with("tank 1"));
    assert!(line.contains("range 0.20"));
    assert!(line.contains("sight yes"));
}
