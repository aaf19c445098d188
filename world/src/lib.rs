#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative arena state management for Tank Arena.
//!
//! The world stands in for the physics, collision and prefab collaborators of
//! the training loop: tanks drive kinematically, shells fly ballistically and
//! detonate with area damage, and [`query::probe`] answers first-hit sphere
//! casts. All mutation flows through [`apply`].

mod ballistics;
mod probe;

use tank_arena_core::{
    ArenaLayout, CombatantId, Command, DamageSource, Event, Pose, ShellId, Vec3, MAX_HEALTH,
};
use tracing::debug;

use crate::ballistics::{Explosion, Shell};

/// Forward speed of a tank at full throttle, in world units per second.
pub const MOVE_SPEED: f32 = 12.0;

/// Turn rate of a tank at full deflection, in degrees per second.
pub const TURN_SPEED: f32 = 180.0;

/// Radius of the sphere approximating a tank's body.
pub const BODY_RADIUS: f32 = 1.2;

/// Height of the body sphere's centre above the tank's position.
pub const BODY_HEIGHT: f32 = 0.8;

/// Represents the authoritative Tank Arena world state.
#[derive(Debug)]
pub struct World {
    layout: ArenaLayout,
    combatants: Vec<Combatant>,
    shells: Vec<Shell>,
    explosions: Vec<Explosion>,
    next_shell_id: u32,
    tick_index: u64,
}

impl World {
    /// Creates an empty arena using the default layout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_layout(ArenaLayout::default())
    }

    /// Creates an empty arena using the provided layout.
    #[must_use]
    pub fn with_layout(layout: ArenaLayout) -> Self {
        Self {
            layout,
            combatants: Vec::new(),
            shells: Vec::new(),
            explosions: Vec::new(),
            next_shell_id: 0,
            tick_index: 0,
        }
    }

    fn combatant_mut(&mut self, combatant: CombatantId) -> Option<&mut Combatant> {
        self.combatants
            .binary_search_by_key(&combatant, |entry| entry.id)
            .ok()
            .map(|index| &mut self.combatants[index])
    }

    fn allocate_shell_id(&mut self) -> ShellId {
        let shell = ShellId::new(self.next_shell_id);
        self.next_shell_id = self.next_shell_id.wrapping_add(1);
        shell
    }

    fn drive_combatants(&mut self, dt: f32) {
        let bound = (self.layout.half_extent - BODY_RADIUS).max(0.0);
        for combatant in &mut self.combatants {
            if !combatant.control_enabled || !combatant.is_alive() {
                continue;
            }

            combatant.pose.yaw_degrees =
                wrap_degrees(combatant.pose.yaw_degrees + combatant.turn * TURN_SPEED * dt);
            let forward = combatant.pose.forward();
            let mut position =
                combatant.pose.position + forward * combatant.movement * MOVE_SPEED * dt;
            position.x = position.x.clamp(-bound, bound);
            position.z = position.z.clamp(-bound, bound);

            for obstacle in &self.layout.obstacles {
                let mut offset = position - obstacle.center;
                offset.y = 0.0;
                let minimum = obstacle.radius + BODY_RADIUS;
                let distance = offset.length();
                if distance < minimum && distance > f32::EPSILON {
                    position += offset / distance * (minimum - distance);
                }
            }

            combatant.pose.position = position;
        }
    }

    fn damage(
        &mut self,
        combatant: CombatantId,
        amount: f32,
        source: DamageSource,
        out_events: &mut Vec<Event>,
    ) {
        let Some(entry) = self.combatant_mut(combatant) else {
            out_events.push(Event::CombatantMissing { combatant });
            return;
        };
        if !entry.is_alive() || amount <= 0.0 {
            return;
        }

        entry.health = (entry.health - amount).max(0.0);
        out_events.push(Event::DamageTaken {
            combatant,
            amount,
            source,
        });
        if !entry.is_alive() {
            entry.movement = 0.0;
            entry.turn = 0.0;
            out_events.push(Event::CombatantDestroyed { combatant });
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::ConfigureArena { layout } => {
            world.layout = layout;
            world.combatants.clear();
            world.shells.clear();
            world.explosions.clear();
        }
        Command::Tick { dt } => {
            world.tick_index = world.tick_index.saturating_add(1);
            out_events.push(Event::TimeAdvanced { dt });

            let seconds = dt.as_secs_f32();
            world.drive_combatants(seconds);
            ballistics::advance(world, seconds, out_events);
            ballistics::age_explosions(&mut world.explosions, dt);
        }
        Command::SpawnCombatant { combatant, pose } => {
            let fresh = Combatant::spawned(combatant, pose);
            match world
                .combatants
                .binary_search_by_key(&combatant, |entry| entry.id)
            {
                Ok(index) => world.combatants[index] = fresh,
                Err(index) => world.combatants.insert(index, fresh),
            }
            out_events.push(Event::CombatantSpawned { combatant, pose });
        }
        Command::ResetCombatant { combatant, pose } => {
            let Some(entry) = world.combatant_mut(combatant) else {
                out_events.push(Event::CombatantMissing { combatant });
                return;
            };
            entry.pose = pose;
            entry.health = MAX_HEALTH;
            entry.movement = 0.0;
            entry.turn = 0.0;
            out_events.push(Event::CombatantReset { combatant, pose });
        }
        Command::SetControl { combatant, enabled } => {
            let Some(entry) = world.combatant_mut(combatant) else {
                out_events.push(Event::CombatantMissing { combatant });
                return;
            };
            entry.control_enabled = enabled;
            if !enabled {
                entry.movement = 0.0;
                entry.turn = 0.0;
            }
            out_events.push(Event::ControlChanged { combatant, enabled });
        }
        Command::DriveCombatant {
            combatant,
            movement,
            turn,
        } => {
            let Some(entry) = world.combatant_mut(combatant) else {
                out_events.push(Event::CombatantMissing { combatant });
                return;
            };
            if !entry.control_enabled || !entry.is_alive() {
                return;
            }
            entry.movement = sanitize_axis(movement);
            entry.turn = sanitize_axis(turn);
        }
        Command::LaunchShell { shooter, speed } => {
            let Some(entry) = world.combatant_mut(shooter) else {
                out_events.push(Event::CombatantMissing { combatant: shooter });
                return;
            };
            if !entry.control_enabled || !entry.is_alive() {
                debug!(shooter = shooter.get(), "launch refused");
                out_events.push(Event::LaunchRejected { shooter });
                return;
            }
            let muzzle = ballistics::muzzle_pose(&entry.pose);
            let shell = world.allocate_shell_id();
            world
                .shells
                .push(Shell::launched(shell, shooter, &muzzle, speed));
            out_events.push(Event::ShellLaunched {
                shell,
                shooter,
                muzzle,
                speed,
            });
        }
        Command::ApplyDamage { combatant, amount } => {
            world.damage(combatant, amount, DamageSource::Environment, out_events);
        }
        Command::ClearProjectiles => {
            let shells = world.shells.len();
            let explosions = world.explosions.len();
            for shell in world.shells.drain(..) {
                out_events.push(Event::ShellDestroyed { shell: shell.id });
            }
            world.explosions.clear();
            out_events.push(Event::ProjectilesCleared { shells, explosions });
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use tank_arena_core::{
        ArenaLayout, CombatantId, CombatantSnapshot, CombatantView, ShellId, Vec3,
    };

    use super::World;
    pub use crate::probe::ArenaProbe;

    /// Captures a read-only view of every combatant in the arena.
    #[must_use]
    pub fn combatant_view(world: &World) -> CombatantView {
        CombatantView::from_snapshots(
            world
                .combatants
                .iter()
                .map(|entry| entry.snapshot())
                .collect(),
        )
    }

    /// Captures the snapshot of a single combatant, if present.
    #[must_use]
    pub fn combatant(world: &World, combatant: CombatantId) -> Option<CombatantSnapshot> {
        world
            .combatants
            .binary_search_by_key(&combatant, |entry| entry.id)
            .ok()
            .map(|index| world.combatants[index].snapshot())
    }

    /// Provides read-only access to the arena layout.
    #[must_use]
    pub fn layout(world: &World) -> &ArenaLayout {
        &world.layout
    }

    /// Number of ticks processed since the world was created.
    #[must_use]
    pub fn tick_index(world: &World) -> u64 {
        world.tick_index
    }

    /// Captures every in-flight shell in launch order.
    #[must_use]
    pub fn shells(world: &World) -> Vec<ShellSnapshot> {
        world
            .shells
            .iter()
            .map(|shell| ShellSnapshot {
                id: shell.id,
                shooter: shell.shooter,
                position: shell.position,
                velocity: shell.velocity,
            })
            .collect()
    }

    /// Positions of the explosion effects still lingering in the arena.
    #[must_use]
    pub fn explosions(world: &World) -> Vec<Vec3> {
        world
            .explosions
            .iter()
            .map(|explosion| explosion.position)
            .collect()
    }

    /// Exposes the first-hit probe service for the current state.
    #[must_use]
    pub fn probe(world: &World) -> ArenaProbe<'_> {
        ArenaProbe::new(world)
    }

    /// Immutable representation of an in-flight shell.
    #[derive(Clone, Copy, Debug, PartialEq)]
    pub struct ShellSnapshot {
        /// Identifier allocated by the world.
        pub id: ShellId,
        /// Combatant that fired the shell.
        pub shooter: CombatantId,
        /// Current position.
        pub position: Vec3,
        /// Current velocity.
        pub velocity: Vec3,
    }
}

#[derive(Clone, Debug)]
struct Combatant {
    id: CombatantId,
    pose: Pose,
    health: f32,
    control_enabled: bool,
    movement: f32,
    turn: f32,
}

impl Combatant {
    fn spawned(id: CombatantId, pose: Pose) -> Self {
        Self {
            id,
            pose,
            health: MAX_HEALTH,
            control_enabled: true,
            movement: 0.0,
            turn: 0.0,
        }
    }

    fn is_alive(&self) -> bool {
        self.health > 0.0
    }

    fn body_center(&self) -> Vec3 {
        self.pose.position + Vec3::Y * BODY_HEIGHT
    }

    fn snapshot(&self) -> tank_arena_core::CombatantSnapshot {
        tank_arena_core::CombatantSnapshot {
            id: self.id,
            pose: self.pose,
            health: self.health,
            control_enabled: self.control_enabled,
        }
    }
}

fn sanitize_axis(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

fn wrap_degrees(value: f32) -> f32 {
    let wrapped = value.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn spawn(world: &mut World, id: u32, position: Vec3, yaw: f32) -> Vec<Event> {
        let mut events = Vec::new();
        apply(
            world,
            Command::SpawnCombatant {
                combatant: CombatantId::new(id),
                pose: Pose::new(position, yaw),
            },
            &mut events,
        );
        events
    }

    #[test]
    fn spawned_combatants_start_with_full_health() {
        let mut world = World::new();
        let events = spawn(&mut world, 2, Vec3::new(3.0, 0.0, 1.0), 90.0);
        let _ = spawn(&mut world, 1, Vec3::ZERO, 0.0);

        assert!(matches!(events[0], Event::CombatantSpawned { .. }));
        let view = query::combatant_view(&world);
        let ids: Vec<_> = view.iter().map(|snapshot| snapshot.id.get()).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(view.iter().all(|snapshot| snapshot.health == MAX_HEALTH));
    }

    #[test]
    fn drive_integrates_along_heading() {
        let mut world = World::new();
        let _ = spawn(&mut world, 1, Vec3::ZERO, 90.0);
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::DriveCombatant {
                combatant: CombatantId::new(1),
                movement: 1.0,
                turn: 0.0,
            },
            &mut events,
        );
        apply(
            &mut world,
            Command::Tick {
                dt: Duration::from_millis(500),
            },
            &mut events,
        );

        let snapshot = query::combatant(&world, CombatantId::new(1)).expect("combatant");
        assert!((snapshot.pose.position.x - MOVE_SPEED * 0.5).abs() < 1e-3);
        assert!(snapshot.pose.position.z.abs() < 1e-3);
    }

    #[test]
    fn disabled_control_freezes_combatant() {
        let mut world = World::new();
        let _ = spawn(&mut world, 1, Vec3::ZERO, 0.0);
        let mut events = Vec::new();
        let id = CombatantId::new(1);
        apply(
            &mut world,
            Command::DriveCombatant {
                combatant: id,
                movement: 1.0,
                turn: 1.0,
            },
            &mut events,
        );
        apply(
            &mut world,
            Command::SetControl {
                combatant: id,
                enabled: false,
            },
            &mut events,
        );
        apply(
            &mut world,
            Command::Tick {
                dt: Duration::from_secs(1),
            },
            &mut events,
        );

        let snapshot = query::combatant(&world, id).expect("combatant");
        assert_eq!(snapshot.pose.position, Vec3::ZERO);
        assert_eq!(snapshot.pose.yaw_degrees, 0.0);
    }

    #[test]
    fn positions_stay_inside_arena_bounds() {
        let mut world = World::with_layout(ArenaLayout {
            half_extent: 5.0,
            obstacles: Vec::new(),
        });
        let _ = spawn(&mut world, 1, Vec3::ZERO, 0.0);
        let mut events = Vec::new();
        let id = CombatantId::new(1);
        apply(
            &mut world,
            Command::DriveCombatant {
                combatant: id,
                movement: 1.0,
                turn: 0.0,
            },
            &mut events,
        );
        for _ in 0..20 {
            apply(
                &mut world,
                Command::Tick {
                    dt: Duration::from_millis(100),
                },
                &mut events,
            );
        }

        let snapshot = query::combatant(&world, id).expect("combatant");
        assert!(snapshot.pose.position.z <= 5.0 - BODY_RADIUS + 1e-4);
    }

    #[test]
    fn health_clamps_at_zero_and_reports_destruction() {
        let mut world = World::new();
        let _ = spawn(&mut world, 1, Vec3::ZERO, 0.0);
        let mut events = Vec::new();
        let id = CombatantId::new(1);
        apply(
            &mut world,
            Command::ApplyDamage {
                combatant: id,
                amount: 150.0,
            },
            &mut events,
        );
        apply(
            &mut world,
            Command::ApplyDamage {
                combatant: id,
                amount: 10.0,
            },
            &mut events,
        );

        let snapshot = query::combatant(&world, id).expect("combatant");
        assert_eq!(snapshot.health, 0.0);
        let destroyed = events
            .iter()
            .filter(|event| matches!(event, Event::CombatantDestroyed { .. }))
            .count();
        assert_eq!(destroyed, 1, "destruction is announced once");
    }

    #[test]
    fn reset_restores_health_and_pose() {
        let mut world = World::new();
        let _ = spawn(&mut world, 1, Vec3::ZERO, 0.0);
        let mut events = Vec::new();
        let id = CombatantId::new(1);
        apply(
            &mut world,
            Command::ApplyDamage {
                combatant: id,
                amount: 100.0,
            },
            &mut events,
        );
        let pose = Pose::new(Vec3::new(4.0, 0.0, -2.0), 45.0);
        apply(
            &mut world,
            Command::ResetCombatant {
                combatant: id,
                pose,
            },
            &mut events,
        );

        let snapshot = query::combatant(&world, id).expect("combatant");
        assert_eq!(snapshot.health, MAX_HEALTH);
        assert_eq!(snapshot.pose, pose);
    }

    #[test]
    fn unknown_combatants_are_reported() {
        let mut world = World::new();
        let mut events = Vec::new();
        let id = CombatantId::new(7);
        apply(
            &mut world,
            Command::ResetCombatant {
                combatant: id,
                pose: Pose::new(Vec3::ZERO, 0.0),
            },
            &mut events,
        );
        assert_eq!(events, vec![Event::CombatantMissing { combatant: id }]);
    }

    #[test]
    fn launch_is_refused_while_control_disabled() {
        let mut world = World::new();
        let _ = spawn(&mut world, 1, Vec3::ZERO, 0.0);
        let mut events = Vec::new();
        let id = CombatantId::new(1);
        apply(
            &mut world,
            Command::SetControl {
                combatant: id,
                enabled: false,
            },
            &mut events,
        );
        events.clear();
        apply(
            &mut world,
            Command::LaunchShell {
                shooter: id,
                speed: 18.0,
            },
            &mut events,
        );

        assert_eq!(events, vec![Event::LaunchRejected { shooter: id }]);
        assert!(query::shells(&world).is_empty());
    }

    #[test]
    fn wrap_degrees_stays_in_range() {
        assert_eq!(wrap_degrees(370.0), 10.0);
        assert!((wrap_degrees(-10.0) - 350.0).abs() < 1e-4);
        let tiny = wrap_degrees(-1e-7);
        assert!((0.0..360.0).contains(&tiny));
    }
}
