//! Shell flight, detonation and explosion bookkeeping.

use std::{collections::BTreeMap, time::Duration};

use tank_arena_core::{
    ArenaLayout, CombatantId, DamageReport, DamageSource, Event, Pose, ShellId, Vec3,
};

use crate::{probe::sweep_sphere, Combatant, World, BODY_RADIUS};

/// Downward acceleration applied to shells.
const GRAVITY: f32 = 9.81;
/// Collision radius of a shell.
const SHELL_RADIUS: f32 = 0.2;
/// Muzzle offset along the tank's forward axis.
const MUZZLE_FORWARD: f32 = 1.35;
/// Muzzle height above the tank's position.
const MUZZLE_HEIGHT: f32 = 1.7;
/// Upward pitch of the barrel in degrees.
const MUZZLE_PITCH_DEGREES: f32 = 10.0;
/// Blast radius within which tanks take damage.
const EXPLOSION_RADIUS: f32 = 5.0;
/// Damage dealt at the centre of the blast.
const MAX_EXPLOSION_DAMAGE: f32 = 100.0;
/// How long an explosion effect lingers after detonation.
const EXPLOSION_LIFETIME: Duration = Duration::from_millis(1_500);

#[derive(Clone, Debug)]
pub(crate) struct Shell {
    pub(crate) id: ShellId,
    pub(crate) shooter: CombatantId,
    pub(crate) position: Vec3,
    pub(crate) velocity: Vec3,
}

impl Shell {
    pub(crate) fn launched(id: ShellId, shooter: CombatantId, muzzle: &Pose, speed: f32) -> Self {
        let pitch = MUZZLE_PITCH_DEGREES.to_radians();
        let direction = muzzle.forward() * pitch.cos() + Vec3::Y * pitch.sin();
        Self {
            id,
            shooter,
            position: muzzle.position,
            velocity: direction * speed,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Explosion {
    pub(crate) position: Vec3,
    remaining: Duration,
}

/// Pose of the barrel tip for a tank standing at `pose`.
pub(crate) fn muzzle_pose(pose: &Pose) -> Pose {
    Pose::new(
        pose.position + pose.forward() * MUZZLE_FORWARD + Vec3::Y * MUZZLE_HEIGHT,
        pose.yaw_degrees,
    )
}

/// Moves every shell along its trajectory and detonates those that made contact.
pub(crate) fn advance(world: &mut World, dt: f32, out_events: &mut Vec<Event>) {
    if world.shells.is_empty() || dt <= 0.0 {
        return;
    }

    let mut detonations: Vec<(ShellId, CombatantId, Vec3)> = Vec::new();
    for shell in &mut world.shells {
        let start = shell.position;
        shell.velocity.y -= GRAVITY * dt;
        let end = start + shell.velocity * dt;
        shell.position = end;

        if let Some(point) = first_contact(start, end, &world.layout, &world.combatants) {
            detonations.push((shell.id, shell.shooter, point));
        }
    }

    if detonations.is_empty() {
        return;
    }

    world
        .shells
        .retain(|shell| !detonations.iter().any(|(id, _, _)| *id == shell.id));

    for (shell, shooter, point) in detonations {
        explode(world, shell, shooter, point, out_events);
    }
}

/// Counts down explosion effects and drops those that expired.
pub(crate) fn age_explosions(explosions: &mut Vec<Explosion>, dt: Duration) {
    for explosion in explosions.iter_mut() {
        explosion.remaining = explosion.remaining.saturating_sub(dt);
    }
    explosions.retain(|explosion| !explosion.remaining.is_zero());
}

fn explode(
    world: &mut World,
    shell: ShellId,
    shooter: CombatantId,
    point: Vec3,
    out_events: &mut Vec<Event>,
) {
    let hits: Vec<(CombatantId, f32)> = world
        .combatants
        .iter()
        .filter(|combatant| combatant.is_alive())
        .filter_map(|combatant| {
            let distance = (combatant.body_center() - point).length();
            if distance > EXPLOSION_RADIUS {
                return None;
            }
            let falloff = (EXPLOSION_RADIUS - distance) / EXPLOSION_RADIUS;
            Some((combatant.id, (falloff * MAX_EXPLOSION_DAMAGE).max(0.0)))
        })
        .collect();

    let mut damages = BTreeMap::new();
    for (combatant, amount) in hits {
        let _ = damages.insert(combatant, amount);
        world.damage(combatant, amount, DamageSource::Shell(shell), out_events);
    }

    out_events.push(Event::ShellExploded {
        report: DamageReport {
            shell,
            shooter,
            position: point,
            damages,
        },
    });
    out_events.push(Event::ShellDestroyed { shell });
    world.explosions.push(Explosion {
        position: point,
        remaining: EXPLOSION_LIFETIME,
    });
}

/// Earliest point along `start..end` where a shell touches the floor, a wall,
/// an obstacle or a live tank.
fn first_contact(
    start: Vec3,
    end: Vec3,
    layout: &ArenaLayout,
    combatants: &[Combatant],
) -> Option<Vec3> {
    let delta = end - start;
    let length = delta.length();
    if length <= f32::EPSILON {
        return (end.y <= 0.0).then_some(end);
    }
    let direction = delta / length;

    let mut nearest: Option<f32> = None;
    let mut consider = |distance: f32| {
        if nearest.map_or(true, |current| distance < current) {
            nearest = Some(distance);
        }
    };

    if end.y <= 0.0 {
        let span = start.y - end.y;
        let fraction = if span > f32::EPSILON { start.y / span } else { 0.0 };
        consider(fraction.clamp(0.0, 1.0) * length);
    }

    let half = layout.half_extent;
    for (from, to) in [(start.x, end.x), (start.z, end.z)] {
        if to.abs() > half {
            let wall = half.copysign(to);
            let span = to - from;
            let fraction = if span.abs() > f32::EPSILON {
                (wall - from) / span
            } else {
                0.0
            };
            consider(fraction.clamp(0.0, 1.0) * length);
        }
    }

    for obstacle in &layout.obstacles {
        if let Some(distance) =
            sweep_sphere(start, direction, length, obstacle.center, obstacle.radius + SHELL_RADIUS)
        {
            consider(distance);
        }
    }

    for combatant in combatants.iter().filter(|combatant| combatant.is_alive()) {
        if let Some(distance) = sweep_sphere(
            start,
            direction,
            length,
            combatant.body_center(),
            BODY_RADIUS + SHELL_RADIUS,
        ) {
            consider(distance);
        }
    }

    nearest.map(|distance| start + direction * distance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{apply, query, World};
    use tank_arena_core::{Command, MAX_HEALTH};

    fn spawn(world: &mut World, id: u32, position: Vec3, yaw: f32) {
        let mut events = Vec::new();
        apply(
            world,
            Command::SpawnCombatant {
                combatant: CombatantId::new(id),
                pose: Pose::new(position, yaw),
            },
            &mut events,
        );
    }

    fn run_until_detonation(world: &mut World, max_ticks: usize) -> Vec<Event> {
        let mut events = Vec::new();
        for _ in 0..max_ticks {
            apply(
                world,
                Command::Tick {
                    dt: Duration::from_millis(20),
                },
                &mut events,
            );
            if events
                .iter()
                .any(|event| matches!(event, Event::ShellExploded { .. }))
            {
                break;
            }
        }
        events
    }

    #[test]
    fn launched_shell_is_tagged_and_flies_forward() {
        let mut world = World::new();
        spawn(&mut world, 1, Vec3::ZERO, 0.0);
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::LaunchShell {
                shooter: CombatantId::new(1),
                speed: 18.0,
            },
            &mut events,
        );

        let shells = query::shells(&world);
        assert_eq!(shells.len(), 1);
        assert_eq!(shells[0].shooter, CombatantId::new(1));
        assert!(shells[0].velocity.z > 17.0);
        assert!(matches!(events[0], Event::ShellLaunched { .. }));
    }

    #[test]
    fn shell_lands_and_reports_area_damage() {
        let mut world = World::new();
        spawn(&mut world, 1, Vec3::ZERO, 0.0);
        spawn(&mut world, 2, Vec3::new(0.0, 0.0, 12.0), 180.0);
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::LaunchShell {
                shooter: CombatantId::new(1),
                speed: 18.0,
            },
            &mut events,
        );

        let events = run_until_detonation(&mut world, 200);
        let report = events
            .iter()
            .find_map(|event| match event {
                Event::ShellExploded { report } => Some(report.clone()),
                _ => None,
            })
            .expect("shell detonates");

        assert_eq!(report.shooter, CombatantId::new(1));
        let target_damage = report.damage_to(CombatantId::new(2));
        assert!(target_damage > 0.0, "target inside the blast radius");
        let target = query::combatant(&world, CombatantId::new(2)).expect("target");
        assert!((target.health - (MAX_HEALTH - target_damage)).abs() < 1e-3);
        assert!(query::shells(&world).is_empty());
        assert_eq!(query::explosions(&world).len(), 1);
        assert!(events
            .iter()
            .any(|event| matches!(event, Event::ShellDestroyed { .. })));
    }

    #[test]
    fn obstacles_absorb_shells() {
        let mut world = World::with_layout(ArenaLayout {
            half_extent: 40.0,
            obstacles: vec![tank_arena_core::Obstacle {
                center: Vec3::new(0.0, 0.0, 5.0),
                radius: 2.5,
            }],
        });
        spawn(&mut world, 1, Vec3::ZERO, 0.0);
        spawn(&mut world, 2, Vec3::new(0.0, 0.0, 14.0), 180.0);
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::LaunchShell {
                shooter: CombatantId::new(1),
                speed: 18.0,
            },
            &mut events,
        );

        let _ = run_until_detonation(&mut world, 200);
        let target = query::combatant(&world, CombatantId::new(2)).expect("target");
        assert_eq!(target.health, MAX_HEALTH);
    }

    #[test]
    fn explosions_expire_after_their_lifetime() {
        let mut explosions = vec![Explosion {
            position: Vec3::ZERO,
            remaining: EXPLOSION_LIFETIME,
        }];
        age_explosions(&mut explosions, Duration::from_millis(1_000));
        assert_eq!(explosions.len(), 1);
        age_explosions(&mut explosions, Duration::from_millis(500));
        assert!(explosions.is_empty());
    }

    #[test]
    fn clearing_projectiles_destroys_shells_and_effects() {
        let mut world = World::new();
        spawn(&mut world, 1, Vec3::ZERO, 0.0);
        let mut events = Vec::new();
        let id = CombatantId::new(1);
        apply(
            &mut world,
            Command::LaunchShell {
                shooter: id,
                speed: 18.0,
            },
            &mut events,
        );
        apply(
            &mut world,
            Command::LaunchShell {
                shooter: id,
                speed: 23.0,
            },
            &mut events,
        );
        world.explosions.push(Explosion {
            position: Vec3::ZERO,
            remaining: EXPLOSION_LIFETIME,
        });
        events.clear();

        apply(&mut world, Command::ClearProjectiles, &mut events);

        assert!(query::shells(&world).is_empty());
        assert!(query::explosions(&world).is_empty());
        let destroyed = events
            .iter()
            .filter(|event| matches!(event, Event::ShellDestroyed { .. }))
            .count();
        assert_eq!(destroyed, 2);
        assert_eq!(
            events.last(),
            Some(&Event::ProjectilesCleared {
                shells: 2,
                explosions: 1
            })
        );
    }
}
