//! Manual control fallback driven by sampled input devices.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tank_arena_core::{
    Action, ActionMask, CombatantId, Observation, ACTION_BRANCHES, FIRE_BRANCH, MOVE_BRANCH,
    TURN_BRANCH,
};

use crate::{policy::Policy, ActionKind};

/// Source of axis and button state, typically a keyboard or gamepad poller.
pub trait InputSampler {
    /// Current value of the named axis in `[-1, 1]`.
    fn axis(&mut self, name: &str) -> f32;

    /// Reports whether the named button is held.
    fn button(&mut self, name: &str) -> bool;
}

/// Device bindings of one combatant, resolved once at construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputBindings {
    /// Axis driving forward and reverse motion.
    pub vertical_axis: String,
    /// Axis driving left and right turns.
    pub horizontal_axis: String,
    /// Button triggering a normal shot.
    pub fire_button: String,
    /// Button triggering a strong shot.
    pub strong_fire_button: String,
}

impl InputBindings {
    /// Conventional bindings of the given combatant's controller slot.
    #[must_use]
    pub fn for_combatant(combatant: CombatantId) -> Self {
        let slot = combatant.get();
        Self {
            vertical_axis: format!("Vertical{slot}"),
            horizontal_axis: format!("Horizontal{slot}"),
            fire_button: format!("Fire{slot}"),
            strong_fire_button: format!("StrongFire{slot}"),
        }
    }
}

/// Input sampler fed from a script instead of a device.
#[derive(Clone, Debug, Default)]
pub struct ScriptedInput {
    axes: BTreeMap<String, f32>,
    pressed: BTreeSet<String>,
}

impl ScriptedInput {
    /// Creates a sampler with every axis centred and every button released.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value returned for an axis.
    pub fn set_axis(&mut self, name: &str, value: f32) {
        let _ = self.axes.insert(name.to_owned(), value);
    }

    /// Presses or releases a button.
    pub fn set_button(&mut self, name: &str, held: bool) {
        if held {
            let _ = self.pressed.insert(name.to_owned());
        } else {
            let _ = self.pressed.remove(name);
        }
    }
}

impl InputSampler for ScriptedInput {
    fn axis(&mut self, name: &str) -> f32 {
        self.axes.get(name).copied().unwrap_or(0.0)
    }

    fn button(&mut self, name: &str) -> bool {
        self.pressed.contains(name)
    }
}

/// Policy translating sampled device input into actions.
pub struct HeuristicPolicy {
    kind: ActionKind,
    bindings: InputBindings,
    sampler: Box<dyn InputSampler>,
}

impl HeuristicPolicy {
    /// Creates a manual policy reading `sampler` through `bindings`.
    #[must_use]
    pub fn new(kind: ActionKind, bindings: InputBindings, sampler: Box<dyn InputSampler>) -> Self {
        Self {
            kind,
            bindings,
            sampler,
        }
    }
}

impl std::fmt::Debug for HeuristicPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeuristicPolicy")
            .field("kind", &self.kind)
            .field("bindings", &self.bindings)
            .finish_non_exhaustive()
    }
}

impl Policy for HeuristicPolicy {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn act(&mut self, _observation: &Observation, _mask: &ActionMask) -> Action {
        let movement = self.sampler.axis(&self.bindings.vertical_axis);
        let turn = self.sampler.axis(&self.bindings.horizontal_axis);
        let fire = self.sampler.button(&self.bindings.fire_button);

        match self.kind {
            ActionKind::Continuous => {
                Action::Continuous([movement, turn, if fire { 1.0 } else { 0.0 }])
            }
            ActionKind::Discrete => {
                let strong = self.sampler.button(&self.bindings.strong_fire_button);
                let mut indices = [0; ACTION_BRANCHES];
                indices[MOVE_BRANCH] = axis_index(movement);
                indices[TURN_BRANCH] = axis_index(turn);
                indices[FIRE_BRANCH] = if strong {
                    2
                } else if fire {
                    1
                } else {
                    0
                };
                Action::Discrete(indices)
            }
        }
    }
}

fn axis_index(value: f32) -> usize {
    if value < 0.0 {
        1
    } else if value > 0.0 {
        2
    } else {
        0
    }
}
