//! Policies mapping observations to actions.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tank_arena_core::{
    Action, ActionMask, Observation, Outcome, ACTION_BRANCHES, FIRE_BRANCH, MOVE_BRANCH,
    TURN_BRANCH,
};

use crate::{ActionKind, OBS_BEARING, OBS_COOLDOWN, OBS_DISTANCE};

/// Opaque decision maker driving one combatant.
///
/// The learning process behind a policy only ever sees observations, legal
/// action masks, rewards and episode boundaries.
pub trait Policy {
    /// Short name used in logs and command-line selection.
    fn name(&self) -> &str;

    /// Chooses the action for the current tick.
    fn act(&mut self, observation: &Observation, mask: &ActionMask) -> Action;

    /// Receives the reward accumulated since the previous call.
    fn on_reward(&mut self, _reward: f32) {}

    /// Marks the end of an episode; `None` means the episode was cut short.
    fn on_episode_end(&mut self, _outcome: Option<Outcome>) {}
}

/// Policy that never moves or fires.
#[derive(Clone, Copy, Debug)]
pub struct IdlePolicy {
    kind: ActionKind,
}

impl IdlePolicy {
    /// Creates an idle policy emitting actions of the given shape.
    #[must_use]
    pub const fn new(kind: ActionKind) -> Self {
        Self { kind }
    }
}

impl Policy for IdlePolicy {
    fn name(&self) -> &str {
        "idle"
    }

    fn act(&mut self, _observation: &Observation, _mask: &ActionMask) -> Action {
        match self.kind {
            ActionKind::Continuous => Action::idle_continuous(),
            ActionKind::Discrete => Action::idle_discrete(),
        }
    }
}

/// Uniformly random policy that respects the legal action mask.
#[derive(Clone, Debug)]
pub struct RandomPolicy {
    kind: ActionKind,
    rng: ChaCha8Rng,
}

impl RandomPolicy {
    /// Creates a random policy seeded for reproducible runs.
    #[must_use]
    pub fn new(kind: ActionKind, seed: u64) -> Self {
        Self {
            kind,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl Policy for RandomPolicy {
    fn name(&self) -> &str {
        "random"
    }

    fn act(&mut self, _observation: &Observation, mask: &ActionMask) -> Action {
        match self.kind {
            ActionKind::Continuous => Action::Continuous([
                self.rng.gen_range(-1.0..=1.0),
                self.rng.gen_range(-1.0..=1.0),
                if self.rng.gen_bool(0.5) { 1.0 } else { 0.0 },
            ]),
            ActionKind::Discrete => {
                let mut indices = [0; ACTION_BRANCHES];
                for (branch, slot) in indices.iter_mut().enumerate() {
                    let legal: Vec<usize> = (0..3)
                        .filter(|index| mask.is_allowed(branch, *index))
                        .collect();
                    if !legal.is_empty() {
                        *slot = legal[self.rng.gen_range(0..legal.len())];
                    }
                }
                Action::Discrete(indices)
            }
        }
    }
}

/// Scripted pursuer: turns toward the opponent, closes in, and fires when
/// roughly aligned with a ready weapon.
#[derive(Clone, Copy, Debug)]
pub struct ChaserPolicy {
    kind: ActionKind,
    engage_range: f32,
    aim_tolerance: f32,
}

impl ChaserPolicy {
    /// Creates a chaser emitting actions of the given shape.
    #[must_use]
    pub const fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            engage_range: 0.2,
            aim_tolerance: 0.03,
        }
    }
}

impl Policy for ChaserPolicy {
    fn name(&self) -> &str {
        "chaser"
    }

    fn act(&mut self, observation: &Observation, mask: &ActionMask) -> Action {
        let bearing = observation.get(OBS_BEARING).unwrap_or(0.0);
        let distance = observation.get(OBS_DISTANCE).unwrap_or(0.0);
        let ready = observation.get(OBS_COOLDOWN).unwrap_or(0.0) < 0.5;

        let turn = (bearing * 8.0).clamp(-1.0, 1.0);
        let movement = if distance > self.engage_range && bearing.abs() < 0.25 {
            1.0
        } else {
            0.0
        };
        let aimed = bearing.abs() < self.aim_tolerance && distance > 0.0;
        let fire = ready && aimed;

        match self.kind {
            ActionKind::Continuous => {
                Action::Continuous([movement, turn, if fire { 1.0 } else { 0.0 }])
            }
            ActionKind::Discrete => {
                let mut indices = [0; ACTION_BRANCHES];
                indices[MOVE_BRANCH] = axis_index(movement);
                indices[TURN_BRANCH] = axis_index(turn);
                let shot = if distance > 0.3 { 2 } else { 1 };
                if fire && mask.is_allowed(FIRE_BRANCH, shot) {
                    indices[FIRE_BRANCH] = shot;
                }
                Action::Discrete(indices)
            }
        }
    }
}

fn axis_index(value: f32) -> usize {
    if value < -0.1 {
        1
    } else if value > 0.1 {
        2
    } else {
        0
    }
}
