use std::time::Duration;

use tank_arena_core::{CombatantId, Command, Event, FireDecision, Pose, Vec3};
use tank_arena_system_weapon::{ExplosionListeners, Weapon, WeaponTuning};
use tank_arena_world::{self as world, query, World};

fn arena() -> World {
    let mut world = World::new();
    let mut events = Vec::new();
    for (id, z, yaw) in [(1, 0.0, 0.0), (2, 12.0, 180.0)] {
        world::apply(
            &mut world,
            Command::SpawnCombatant {
                combatant: CombatantId::new(id),
                pose: Pose::new(Vec3::new(0.0, 0.0, z), yaw),
            },
            &mut events,
        );
    }
    world
}

fn execute(world: &mut World, commands: Vec<Command>) -> Vec<Event> {
    let mut events = Vec::new();
    for command in commands {
        world::apply(world, command, &mut events);
    }
    events
}

#[test]
fn shooter_hears_its_own_explosion_once() {
    let mut world = arena();
    let mut weapon = Weapon::new(CombatantId::new(1), WeaponTuning::default());
    let mut listeners = ExplosionListeners::new();

    let mut commands = Vec::new();
    weapon.handle(&[], FireDecision::Normal, &mut commands);
    let events = execute(&mut world, commands);
    weapon.track_launches(&events, &mut listeners);
    assert_eq!(listeners.len(), 1);

    let mut delivered = Vec::new();
    for _ in 0..200 {
        let events = execute(
            &mut world,
            vec![Command::Tick {
                dt: Duration::from_millis(20),
            }],
        );
        for event in &events {
            match event {
                Event::ShellExploded { report } => {
                    delivered.extend(listeners.take(report.shell));
                }
                Event::ShellDestroyed { shell } => {
                    let _ = listeners.release(*shell);
                }
                _ => {}
            }
        }
        if !delivered.is_empty() {
            break;
        }
    }

    assert_eq!(delivered, vec![CombatantId::new(1)]);
    assert!(listeners.is_empty());
}

#[test]
fn cooldown_limits_the_number_of_launched_shells() {
    let mut world = arena();
    let mut weapon = Weapon::new(CombatantId::new(1), WeaponTuning::default());
    let mut listeners = ExplosionListeners::new();
    let mut launched = 0;

    let mut pending = Vec::new();
    for _ in 0..50 {
        let mut commands = Vec::new();
        weapon.handle(&pending, FireDecision::Normal, &mut commands);
        let mut events = execute(&mut world, commands);
        weapon.track_launches(&events, &mut listeners);
        launched += events
            .iter()
            .filter(|event| matches!(event, Event::ShellLaunched { .. }))
            .count();

        events.clear();
        world::apply(
            &mut world,
            Command::Tick {
                dt: Duration::from_millis(20),
            },
            &mut events,
        );
        pending = events;
    }

    // One second of simulated time at a 0.4 s cooldown.
    assert_eq!(launched, 3);
    assert!(query::shells(&world).len() <= launched);
}

#[test]
fn clearing_projectiles_releases_pending_listeners() {
    let mut world = arena();
    let mut weapon = Weapon::new(CombatantId::new(2), WeaponTuning::default());
    let mut listeners = ExplosionListeners::new();

    let mut commands = Vec::new();
    weapon.handle(&[], FireDecision::Strong, &mut commands);
    let events = execute(&mut world, commands);
    weapon.track_launches(&events, &mut listeners);

    let events = execute(&mut world, vec![Command::ClearProjectiles]);
    for event in &events {
        if let Event::ShellDestroyed { shell } = event {
            assert!(listeners.release(*shell));
        }
    }
    assert!(listeners.is_empty());
}
