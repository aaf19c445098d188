#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Per-combatant decision contract for the Tank Arena training loop.
//!
//! A [`CombatantAgent`] encodes what its combatant can see into an
//! [`Observation`], decodes the [`Action`] chosen by its [`Policy`] into an
//! [`Intent`], shapes the reward signal from damage and per-tick terms, and
//! reports the legal action set for masked variants.

mod input;
mod policy;

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use tank_arena_core::{
    signed_bearing_degrees, Action, ActionMask, CombatantId, CombatantView, DamageReport,
    FireDecision, Observation, Outcome, Probe, ProbeHit, FIRE_BRANCH, MOVE_BRANCH, TURN_BRANCH,
};
use tracing::debug;

pub use crate::input::{HeuristicPolicy, InputBindings, InputSampler, ScriptedInput};
pub use crate::policy::{ChaserPolicy, IdlePolicy, Policy, RandomPolicy};

/// Number of fields every observation carries.
pub const BASE_OBSERVATION_LEN: usize = 6;

/// Distance used to normalise the range observation.
pub const MAX_RANGE: f32 = 70.0;

/// Radius of the sphere swept for line-of-sight checks.
pub const LINE_OF_SIGHT_RADIUS: f32 = 0.75;

/// Extra reach added beyond the opponent's distance for line-of-sight checks.
pub const LINE_OF_SIGHT_MARGIN: f32 = 10.0;

/// Observation index of the bearing from the combatant's heading to its opponent.
pub const OBS_BEARING: usize = 0;
/// Observation index of the normalised distance to the opponent.
pub const OBS_DISTANCE: usize = 1;
/// Observation index of the bearing from the opponent's heading back to the combatant.
pub const OBS_OPPONENT_BEARING: usize = 2;
/// Observation index of the combatant's own normalised health.
pub const OBS_HEALTH: usize = 3;
/// Observation index of the opponent's normalised health.
pub const OBS_OPPONENT_HEALTH: usize = 4;
/// Observation index of the weapon cooldown flag.
pub const OBS_COOLDOWN: usize = 5;
/// Observation index of the line-of-sight flag, present for variants that use it.
pub const OBS_LINE_OF_SIGHT: usize = 6;

/// Shape of the actions a variant consumes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Three continuous values in `[-1, 1]`.
    Continuous,
    /// Three discrete branch indices.
    Discrete,
}

/// Behavioural flavour of an agent, fixed when the combatant is spawned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentVariant {
    /// Continuous control with the default reward shaping.
    BasicContinuous,
    /// Discrete control whose fire branch is masked while the weapon cools down.
    #[default]
    DiscreteMasked,
    /// Continuous control, line of sight in the observation, and rewards
    /// only for damage dealt to or taken from opponents.
    ZeroSum,
}

impl AgentVariant {
    /// Action shape consumed by the variant.
    #[must_use]
    pub const fn action_kind(self) -> ActionKind {
        match self {
            Self::DiscreteMasked => ActionKind::Discrete,
            Self::BasicContinuous | Self::ZeroSum => ActionKind::Continuous,
        }
    }

    /// Reports whether observations carry the line-of-sight flag.
    #[must_use]
    pub const fn uses_line_of_sight(self) -> bool {
        matches!(self, Self::ZeroSum)
    }

    /// Reports whether the variant publishes an action mask.
    #[must_use]
    pub const fn masks_actions(self) -> bool {
        matches!(self, Self::DiscreteMasked)
    }

    /// Number of fields in the variant's observations.
    #[must_use]
    pub const fn observation_len(self) -> usize {
        if self.uses_line_of_sight() {
            BASE_OBSERVATION_LEN + 1
        } else {
            BASE_OBSERVATION_LEN
        }
    }

    /// Reward shaping the variant uses unless configured otherwise.
    #[must_use]
    pub fn default_tuning(self) -> RewardTuning {
        match self {
            Self::ZeroSum => RewardTuning::zero_sum(),
            Self::BasicContinuous | Self::DiscreteMasked => RewardTuning::default(),
        }
    }
}

/// Coefficients of the shaped reward.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardTuning {
    /// Penalty applied on every tick.
    pub time_penalty: f32,
    /// Penalty applied when the opponent lies outside the forward arc.
    pub off_axis_penalty: f32,
    /// Absolute bearing observation above which the off-axis penalty applies.
    pub off_axis_threshold: f32,
    /// Reward per point of damage dealt, and penalty per point taken.
    pub reward_per_damage: f32,
    /// Multiplier applied to damage a combatant's own shell dealt to itself.
    pub self_damage_factor: f32,
    /// Terminal reward for winning.
    pub win_reward: f32,
    /// Terminal reward for losing.
    pub loss_reward: f32,
    /// Terminal reward for a draw.
    pub draw_reward: f32,
}

impl RewardTuning {
    /// Shaping that only scores damage exchanged with opponents.
    #[must_use]
    pub fn zero_sum() -> Self {
        Self {
            time_penalty: 0.0,
            off_axis_penalty: 0.0,
            self_damage_factor: 0.0,
            ..Self::default()
        }
    }

    fn terminal_reward(&self, outcome: Outcome) -> f32 {
        match outcome {
            Outcome::Win => self.win_reward,
            Outcome::Loss => self.loss_reward,
            Outcome::Draw => self.draw_reward,
        }
    }
}

impl Default for RewardTuning {
    fn default() -> Self {
        Self {
            time_penalty: 0.0001,
            off_axis_penalty: 0.001,
            off_axis_threshold: 0.5,
            reward_per_damage: 0.005,
            self_damage_factor: -1.5,
            win_reward: 1.0,
            loss_reward: -1.0,
            draw_reward: 0.0,
        }
    }
}

/// Decoded control intent for one tick.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Intent {
    /// Forward (+) or reverse (-) throttle in `[-1, 1]`.
    pub movement: f32,
    /// Right (+) or left (-) turn rate in `[-1, 1]`.
    pub turn: f32,
    /// Fire decision handed to the weapon.
    pub fire: FireDecision,
}

/// Decision contract of a single combatant.
#[derive(Debug)]
pub struct CombatantAgent {
    id: CombatantId,
    variant: AgentVariant,
    tuning: RewardTuning,
    opponent: Option<CombatantId>,
    cumulative_reward: f32,
    pending_reward: f32,
    steps: u64,
    closed: bool,
    last_observation: Observation,
}

impl CombatantAgent {
    /// Creates an agent for `id` with explicit reward shaping.
    #[must_use]
    pub fn new(id: CombatantId, variant: AgentVariant, tuning: RewardTuning) -> Self {
        Self {
            id,
            variant,
            tuning,
            opponent: None,
            cumulative_reward: 0.0,
            pending_reward: 0.0,
            steps: 0,
            closed: false,
            last_observation: Observation::zeroed(variant.observation_len()),
        }
    }

    /// Creates an agent using the variant's default reward shaping.
    #[must_use]
    pub fn with_variant(id: CombatantId, variant: AgentVariant) -> Self {
        Self::new(id, variant, variant.default_tuning())
    }

    /// Combatant controlled by the agent.
    #[must_use]
    pub const fn id(&self) -> CombatantId {
        self.id
    }

    /// Variant chosen at spawn time.
    #[must_use]
    pub const fn variant(&self) -> AgentVariant {
        self.variant
    }

    /// Opponent currently targeted, if any.
    #[must_use]
    pub const fn opponent(&self) -> Option<CombatantId> {
        self.opponent
    }

    /// Binds or clears the targeted opponent.
    pub fn set_opponent(&mut self, opponent: Option<CombatantId>) {
        self.opponent = opponent.filter(|candidate| *candidate != self.id);
    }

    /// Reward accumulated since the episode began.
    #[must_use]
    pub const fn cumulative_reward(&self) -> f32 {
        self.cumulative_reward
    }

    /// Number of decisions taken since the episode began.
    #[must_use]
    pub const fn steps(&self) -> u64 {
        self.steps
    }

    /// Reports whether the terminal callback already ran this episode.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Most recent observation produced by [`CombatantAgent::observe`].
    #[must_use]
    pub fn last_observation(&self) -> &Observation {
        &self.last_observation
    }

    /// Starts a fresh episode: zero reward, zero steps, terminal callback armed.
    pub fn begin_episode(&mut self) {
        self.cumulative_reward = 0.0;
        self.pending_reward = 0.0;
        self.steps = 0;
        self.closed = false;
        self.last_observation = Observation::zeroed(self.variant.observation_len());
    }

    /// Encodes the current arena state from this combatant's perspective.
    ///
    /// Every field is zero while no opponent is bound or either combatant is
    /// absent from the view.
    pub fn observe(
        &mut self,
        view: &CombatantView,
        weapon_cooling: bool,
        probe: &dyn Probe,
    ) -> Observation {
        let observation = self.encode(view, weapon_cooling, probe);
        self.last_observation = observation.clone();
        observation
    }

    fn encode(&self, view: &CombatantView, weapon_cooling: bool, probe: &dyn Probe) -> Observation {
        let len = self.variant.observation_len();
        let Some(opponent) = self.opponent else {
            debug!(combatant = self.id.get(), "no opponent bound, observation zeroed");
            return Observation::zeroed(len);
        };
        let (Some(me), Some(target)) = (view.get(self.id), view.get(opponent)) else {
            debug!(
                combatant = self.id.get(),
                opponent = opponent.get(),
                "combatant missing from view, observation zeroed"
            );
            return Observation::zeroed(len);
        };

        let to_target = target.pose.position - me.pose.position;
        let distance = to_target.length();
        let bearing = signed_bearing_degrees(me.pose.forward(), to_target);
        let opponent_bearing = signed_bearing_degrees(target.pose.forward(), -to_target);

        let mut values = Vec::with_capacity(len);
        values.push((bearing / 180.0).clamp(-1.0, 1.0));
        values.push((distance / MAX_RANGE).clamp(0.0, 1.0));
        values.push((opponent_bearing / 180.0).clamp(-1.0, 1.0));
        values.push(me.normalized_health());
        values.push(target.normalized_health());
        values.push(if weapon_cooling { 1.0 } else { 0.0 });

        if self.variant.uses_line_of_sight() {
            let hit = probe.cast(
                me.pose.position,
                to_target,
                LINE_OF_SIGHT_RADIUS,
                distance + LINE_OF_SIGHT_MARGIN,
            );
            let visible = hit == Some(ProbeHit::Combatant(opponent));
            values.push(if visible { 1.0 } else { 0.0 });
        }

        Observation::from_values(values)
    }

    /// Legal actions for this tick; only masked variants exclude anything.
    #[must_use]
    pub fn legal_action_mask(&self, weapon_cooling: bool) -> ActionMask {
        let mut mask = ActionMask::allow_all();
        if self.variant.masks_actions() && weapon_cooling {
            mask.exclude(FIRE_BRANCH, 1);
            mask.exclude(FIRE_BRANCH, 2);
        }
        mask
    }

    /// Decodes an action into a control intent.
    ///
    /// Decoding never looks at the weapon; fire decisions issued during a
    /// cooldown are dropped by the weapon itself.
    #[must_use]
    pub fn decide(&self, action: &Action) -> Intent {
        let kind = match action {
            Action::Continuous(_) => ActionKind::Continuous,
            Action::Discrete(_) => ActionKind::Discrete,
        };
        if kind != self.variant.action_kind() {
            debug!(
                combatant = self.id.get(),
                expected = ?self.variant.action_kind(),
                received = ?kind,
                "action kind differs from variant"
            );
        }
        decode(action)
    }

    /// Applies the per-tick shaping terms and counts the step.
    pub fn shape_tick(&mut self) {
        self.steps = self.steps.saturating_add(1);
        let bearing = self.last_observation.get(OBS_BEARING).unwrap_or(0.0);
        let mut reward = -self.tuning.time_penalty;
        if bearing.abs() > self.tuning.off_axis_threshold {
            reward -= self.tuning.off_axis_penalty;
        }
        self.add_reward(reward);
    }

    /// Scores the damage report of a shell this combatant fired.
    pub fn on_shell_hit(&mut self, report: &DamageReport) {
        let per_damage = self.tuning.reward_per_damage;
        let reward: f32 = report
            .damages
            .iter()
            .map(|(victim, damage)| {
                if *victim == self.id {
                    damage * per_damage * self.tuning.self_damage_factor
                } else {
                    damage * per_damage
                }
            })
            .sum();
        self.add_reward(reward);
    }

    /// Penalises damage taken from any source.
    pub fn on_take_damage(&mut self, amount: f32) {
        self.add_reward(-amount * self.tuning.reward_per_damage);
    }

    /// Delivers the terminal outcome; `None` marks a forced reset.
    ///
    /// Returns `false` when the episode was already closed, in which case
    /// nothing changes.
    pub fn on_episode_end(&mut self, outcome: Option<Outcome>) -> bool {
        if self.closed {
            debug!(combatant = self.id.get(), ?outcome, "episode already closed");
            return false;
        }
        if let Some(outcome) = outcome {
            self.add_reward(self.tuning.terminal_reward(outcome));
        }
        self.closed = true;
        true
    }

    /// Drains the reward accumulated since the previous call.
    pub fn take_pending_reward(&mut self) -> f32 {
        std::mem::take(&mut self.pending_reward)
    }

    /// Human-readable read-out of the latest observation and reward.
    #[must_use]
    pub fn status_line(&self) -> String {
        let value = |index| self.last_observation.get(index).unwrap_or(0.0);
        let mut line = format!(
            "tank {} | bearing {:+.2} | range {:.2} | exposure {:+.2} | health {:.2}/{:.2} | cooldown {}",
            self.id.get(),
            value(OBS_BEARING),
            value(OBS_DISTANCE),
            value(OBS_OPPONENT_BEARING),
            value(OBS_HEALTH),
            value(OBS_OPPONENT_HEALTH),
            if value(OBS_COOLDOWN) > 0.5 { "yes" } else { "no" },
        );
        if self.variant.uses_line_of_sight() {
            let sight = if value(OBS_LINE_OF_SIGHT) > 0.5 { "yes" } else { "no" };
            let _ = write!(line, " | sight {sight}");
        }
        let _ = write!(line, " | reward {:+.4}", self.cumulative_reward);
        line
    }

    fn add_reward(&mut self, amount: f32) {
        if self.closed {
            debug!(combatant = self.id.get(), amount, "reward after episode end ignored");
            return;
        }
        if !amount.is_finite() {
            return;
        }
        self.cumulative_reward += amount;
        self.pending_reward += amount;
    }
}

/// Decodes an action without reference to any agent state.
#[must_use]
pub fn decode(action: &Action) -> Intent {
    match action {
        Action::Continuous(values) => Intent {
            movement: clamp_axis(values[MOVE_BRANCH]),
            turn: clamp_axis(values[TURN_BRANCH]),
            fire: if clamp_axis(values[FIRE_BRANCH]) >= 0.5 {
                FireDecision::Normal
            } else {
                FireDecision::Hold
            },
        },
        Action::Discrete(indices) => Intent {
            movement: discrete_axis(indices[MOVE_BRANCH]),
            turn: discrete_axis(indices[TURN_BRANCH]),
            fire: match indices[FIRE_BRANCH] {
                1 => FireDecision::Normal,
                2 => FireDecision::Strong,
                _ => FireDecision::Hold,
            },
        },
    }
}

fn discrete_axis(index: usize) -> f32 {
    match index {
        1 => -1.0,
        2 => 1.0,
        _ => 0.0,
    }
}

fn clamp_axis(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use tank_arena_core::{ShellId, Vec3};

    struct Blind;

    impl Probe for Blind {
        fn cast(&self, _: Vec3, _: Vec3, _: f32, _: f32) -> Option<ProbeHit> {
            None
        }
    }

    fn report(entries: &[(u32, f32)]) -> DamageReport {
        let mut damages = BTreeMap::new();
        for (id, damage) in entries {
            let _ = damages.insert(CombatantId::new(*id), *damage);
        }
        DamageReport {
            shell: ShellId::new(0),
            shooter: CombatantId::new(1),
            position: Vec3::ZERO,
            damages,
        }
    }

    #[test]
    fn discrete_decoding_maps_indices_to_axes() {
        let intent = decode(&Action::Discrete([1, 2, 2]));
        assert_eq!(intent.movement, -1.0);
        assert_eq!(intent.turn, 1.0);
        assert_eq!(intent.fire, FireDecision::Strong);

        let idle = decode(&Action::Discrete([0, 0, 0]));
        assert_eq!(idle, Intent::default());

        let unknown = decode(&Action::Discrete([7, 3, 9]));
        assert_eq!(unknown, Intent::default());
    }

    #[test]
    fn continuous_decoding_clamps_and_thresholds_fire() {
        let intent = decode(&Action::Continuous([2.0, -0.25, 1.0]));
        assert_eq!(intent.movement, 1.0);
        assert_eq!(intent.turn, -0.25);
        assert_eq!(intent.fire, FireDecision::Normal);

        let held = decode(&Action::Continuous([f32::NAN, 0.0, 0.2]));
        assert_eq!(held.movement, 0.0);
        assert_eq!(held.fire, FireDecision::Hold);
    }

    #[test]
    fn observation_is_zero_without_an_opponent() {
        let mut agent = CombatantAgent::with_variant(CombatantId::new(1), AgentVariant::ZeroSum);
        let observation = agent.observe(&CombatantView::default(), true, &Blind);
        assert_eq!(observation, Observation::zeroed(7));
    }

    #[test]
    fn own_shell_hitting_self_is_penalised() {
        let mut agent =
            CombatantAgent::with_variant(CombatantId::new(1), AgentVariant::DiscreteMasked);
        agent.on_shell_hit(&report(&[(1, 20.0), (2, 0.0)]));
        assert!(agent.cumulative_reward() < 0.0);
        assert!((agent.cumulative_reward() + 0.15).abs() < 1e-6);
    }

    #[test]
    fn zero_sum_ignores_self_damage_in_reports() {
        let mut agent = CombatantAgent::with_variant(CombatantId::new(1), AgentVariant::ZeroSum);
        agent.on_shell_hit(&report(&[(1, 20.0), (2, 40.0)]));
        assert!((agent.cumulative_reward() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn terminal_bonus_applies_once_and_closes_the_episode() {
        let mut agent =
            CombatantAgent::with_variant(CombatantId::new(2), AgentVariant::DiscreteMasked);
        assert!(agent.on_episode_end(Some(Outcome::Win)));
        assert!(!agent.on_episode_end(Some(Outcome::Win)));
        agent.on_take_damage(50.0);
        agent.shape_tick();
        assert_eq!(agent.cumulative_reward(), 1.0);

        agent.begin_episode();
        assert_eq!(agent.cumulative_reward(), 0.0);
        assert_eq!(agent.steps(), 0);
        assert!(!agent.is_closed());
    }

    #[test]
    fn tick_shaping_adds_time_and_off_axis_penalties() {
        let mut agent =
            CombatantAgent::with_variant(CombatantId::new(1), AgentVariant::DiscreteMasked);
        agent.last_observation = Observation::from_values(vec![0.75, 0.0, 0.0, 1.0, 1.0, 0.0]);
        agent.shape_tick();
        assert!((agent.cumulative_reward() + 0.0011).abs() < 1e-7);
        assert_eq!(agent.steps(), 1);
        assert!((agent.take_pending_reward() + 0.0011).abs() < 1e-7);
        assert_eq!(agent.take_pending_reward(), 0.0);
    }

    #[test]
    fn mask_excludes_fire_only_while_cooling_for_masked_variant() {
        let masked =
            CombatantAgent::with_variant(CombatantId::new(1), AgentVariant::DiscreteMasked);
        let mask = masked.legal_action_mask(true);
        assert_eq!(mask.excluded(FIRE_BRANCH).collect::<Vec<_>>(), vec![1, 2]);
        assert!(masked.legal_action_mask(false).is_empty());

        let basic =
            CombatantAgent::with_variant(CombatantId::new(1), AgentVariant::BasicContinuous);
        assert_eq!(basic.variant(), AgentVariant::BasicContinuous);
        assert!(basic.legal_action_mask(true).is_empty());
    }

    #[test]
    fn opponent_cannot_be_self() {
        let mut agent = CombatantAgent::with_variant(CombatantId::new(1), AgentVariant::ZeroSum);
        agent.set_opponent(Some(CombatantId::new(1)));
        assert_eq!(agent.opponent(), None);
        agent.set_opponent(Some(CombatantId::new(2)));
        assert_eq!(agent.opponent(), Some(CombatantId::new(2)));
    }
}
