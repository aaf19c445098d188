#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure per-combatant weapon system.
//!
//! A [`Weapon`] turns one [`FireDecision`] per tick into at most one
//! `Command::LaunchShell`, then refuses further shots until its cooldown
//! expires. Launches confirmed by the world are tracked in
//! [`ExplosionListeners`] so the shooter receives the damage report of its own
//! shell exactly once.

use std::{
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tank_arena_core::{CombatantId, Command, Event, FireDecision, ShellId};
use tracing::debug;

/// Launch speeds and cooldowns applied by every weapon.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaponTuning {
    /// Cooldown after a normal shot, in seconds.
    pub normal_cooldown_secs: f32,
    /// Cooldown after a strong shot, in seconds.
    pub strong_cooldown_secs: f32,
    /// Launch force of a normal shot.
    pub normal_force: f32,
    /// Launch force of a strong shot.
    pub strong_force: f32,
    /// Baseline launch force the weapon returns to after every shot.
    pub min_launch_force: f32,
}

impl WeaponTuning {
    /// Cooldown and launch force associated with a fire decision.
    #[must_use]
    pub fn shot(&self, decision: FireDecision) -> Option<(Duration, f32)> {
        match decision {
            FireDecision::Hold => None,
            FireDecision::Normal => Some((
                seconds(self.normal_cooldown_secs),
                self.normal_force,
            )),
            FireDecision::Strong => Some((
                seconds(self.strong_cooldown_secs),
                self.strong_force,
            )),
        }
    }
}

impl Default for WeaponTuning {
    fn default() -> Self {
        Self {
            normal_cooldown_secs: 0.4,
            strong_cooldown_secs: 0.7,
            normal_force: 18.0,
            strong_force: 23.0,
            min_launch_force: 15.0,
        }
    }
}

/// Firing state of a weapon.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WeaponState {
    /// The next fire decision launches a shell.
    Ready,
    /// Fire decisions are dropped until `remaining` reaches zero.
    Cooldown {
        /// Time left before the weapon is ready again.
        remaining: Duration,
    },
}

/// Cooldown state machine owned by a single combatant.
#[derive(Debug)]
pub struct Weapon {
    owner: CombatantId,
    tuning: WeaponTuning,
    state: WeaponState,
    launch_force: f32,
}

impl Weapon {
    /// Creates a ready weapon for `owner`.
    #[must_use]
    pub fn new(owner: CombatantId, tuning: WeaponTuning) -> Self {
        Self {
            owner,
            tuning,
            state: WeaponState::Ready,
            launch_force: tuning.min_launch_force,
        }
    }

    /// Combatant that owns the weapon.
    #[must_use]
    pub const fn owner(&self) -> CombatantId {
        self.owner
    }

    /// Current firing state.
    #[must_use]
    pub const fn state(&self) -> WeaponState {
        self.state
    }

    /// Reports whether the next fire decision would launch a shell.
    #[must_use]
    pub fn can_fire(&self) -> bool {
        matches!(self.state, WeaponState::Ready)
    }

    /// Reports whether the weapon is cooling down.
    #[must_use]
    pub fn is_cooling_down(&self) -> bool {
        !self.can_fire()
    }

    /// Launch force the next charge starts from.
    #[must_use]
    pub const fn launch_force(&self) -> f32 {
        self.launch_force
    }

    /// Returns the weapon to its ready state with the baseline launch force.
    pub fn reset(&mut self) {
        self.state = WeaponState::Ready;
        self.launch_force = self.tuning.min_launch_force;
    }

    /// Advances the cooldown timer from this tick's events, then applies the
    /// fire decision.
    pub fn handle(&mut self, events: &[Event], decision: FireDecision, out: &mut Vec<Command>) {
        self.advance_clock(events);
        self.fire(decision, out);
    }

    /// Counts down the cooldown by the time advanced in `events`.
    pub fn advance_clock(&mut self, events: &[Event]) {
        let elapsed = events
            .iter()
            .filter_map(|event| match event {
                Event::TimeAdvanced { dt } => Some(*dt),
                _ => None,
            })
            .fold(Duration::ZERO, Duration::saturating_add);

        if let WeaponState::Cooldown { remaining } = self.state {
            let remaining = remaining.saturating_sub(elapsed);
            self.state = if remaining.is_zero() {
                WeaponState::Ready
            } else {
                WeaponState::Cooldown { remaining }
            };
        }
    }

    /// Launches a shell for a non-hold decision when the weapon is ready.
    ///
    /// Decisions issued during a cooldown are dropped and leave the timer
    /// untouched.
    pub fn fire(&mut self, decision: FireDecision, out: &mut Vec<Command>) {
        let Some((cooldown, force)) = self.tuning.shot(decision) else {
            return;
        };

        if let WeaponState::Cooldown { remaining } = self.state {
            debug!(
                combatant = self.owner.get(),
                ?decision,
                remaining_ms = remaining.as_millis() as u64,
                "fire decision dropped during cooldown"
            );
            return;
        }

        self.launch_force = force;
        out.push(Command::LaunchShell {
            shooter: self.owner,
            speed: self.launch_force,
        });
        self.launch_force = self.tuning.min_launch_force;
        self.state = if cooldown.is_zero() {
            WeaponState::Ready
        } else {
            WeaponState::Cooldown {
                remaining: cooldown,
            }
        };
    }

    /// Subscribes the owner to the explosion of every shell it launched.
    pub fn track_launches(&self, events: &[Event], listeners: &mut ExplosionListeners) {
        for event in events {
            if let Event::ShellLaunched { shell, shooter, .. } = event {
                if *shooter == self.owner {
                    listeners.subscribe(*shell, self.owner);
                }
            }
        }
    }
}

/// Registry of combatants waiting for the damage report of a shell.
#[derive(Clone, Debug, Default)]
pub struct ExplosionListeners {
    entries: BTreeMap<ShellId, BTreeSet<CombatantId>>,
}

impl ExplosionListeners {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` for the explosion of `shell`.
    pub fn subscribe(&mut self, shell: ShellId, listener: CombatantId) {
        let _ = self.entries.entry(shell).or_default().insert(listener);
    }

    /// Removes and returns the listeners of `shell` in ascending identity
    /// order. Unknown shells yield nothing.
    pub fn take(&mut self, shell: ShellId) -> Vec<CombatantId> {
        self.entries
            .remove(&shell)
            .map(|listeners| listeners.into_iter().collect())
            .unwrap_or_default()
    }

    /// Drops the registration of a destroyed shell, reporting whether one
    /// was still present.
    pub fn release(&mut self, shell: ShellId) -> bool {
        self.entries.remove(&shell).is_some()
    }

    /// Reports whether anyone is waiting on `shell`.
    #[must_use]
    pub fn contains(&self, shell: ShellId) -> bool {
        self.entries.contains_key(&shell)
    }

    /// Number of shells with registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Reports whether no shell has registered listeners.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forgets every registration.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

fn seconds(value: f32) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f32(value)
    } else {
        Duration::ZERO
    }
}
