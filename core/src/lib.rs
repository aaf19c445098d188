#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Tank Arena training loop.
//!
//! This crate defines the message surface that connects the episode
//! orchestrator, the authoritative arena, and the pure per-combatant systems.
//! Systems submit [`Command`] values describing desired mutations, the world
//! executes those commands via its `apply` entry point, and then broadcasts
//! [`Event`] values for systems to react to deterministically. Policies only
//! ever see [`Observation`], [`ActionMask`] and [`Action`] values.

use std::{collections::BTreeMap, collections::BTreeSet, time::Duration};

pub use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Health assigned to every combatant at spawn and after each reset.
pub const MAX_HEALTH: f32 = 100.0;

/// Number of branches carried by every [`Action`].
pub const ACTION_BRANCHES: usize = 3;

/// Branch index holding the movement decision.
pub const MOVE_BRANCH: usize = 0;

/// Branch index holding the turn decision.
pub const TURN_BRANCH: usize = 1;

/// Branch index holding the fire decision.
pub const FIRE_BRANCH: usize = 2;

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Replaces the arena layout and removes every entity from the world.
    ConfigureArena {
        /// Bounds and static obstacles of the new arena.
        layout: ArenaLayout,
    },
    /// Advances the simulation clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Instantiates a combatant at the provided pose with full health.
    SpawnCombatant {
        /// Identity assigned to the new combatant.
        combatant: CombatantId,
        /// Initial pose of the combatant.
        pose: Pose,
    },
    /// Re-initialises an existing combatant's pose and health.
    ResetCombatant {
        /// Combatant being reset.
        combatant: CombatantId,
        /// Freshly sampled pose.
        pose: Pose,
    },
    /// Enables or disables a combatant's control inputs.
    SetControl {
        /// Combatant whose control changes.
        combatant: CombatantId,
        /// Whether drive and launch requests are honoured.
        enabled: bool,
    },
    /// Sets the movement intents integrated on subsequent ticks.
    DriveCombatant {
        /// Combatant being driven.
        combatant: CombatantId,
        /// Forward (+) or reverse (-) throttle in `[-1, 1]`.
        movement: f32,
        /// Right (+) or left (-) turn rate in `[-1, 1]`.
        turn: f32,
    },
    /// Requests a shell launched from the combatant's muzzle.
    LaunchShell {
        /// Combatant firing the shell; the shell is tagged with this identity.
        shooter: CombatantId,
        /// Launch speed imparted along the muzzle's forward axis.
        speed: f32,
    },
    /// Applies damage that did not originate from a shell.
    ApplyDamage {
        /// Combatant receiving the damage.
        combatant: CombatantId,
        /// Amount of health removed.
        amount: f32,
    },
    /// Destroys every in-flight shell and every active explosion effect.
    ClearProjectiles,
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Confirms that a combatant was instantiated.
    CombatantSpawned {
        /// Identity of the new combatant.
        combatant: CombatantId,
        /// Pose the combatant occupies.
        pose: Pose,
    },
    /// Confirms that a combatant was re-initialised.
    CombatantReset {
        /// Identity of the reset combatant.
        combatant: CombatantId,
        /// Pose the combatant occupies after the reset.
        pose: Pose,
    },
    /// Reports that a command referenced a combatant the world does not hold.
    CombatantMissing {
        /// Identity that could not be resolved.
        combatant: CombatantId,
    },
    /// Announces that a combatant's control inputs were toggled.
    ControlChanged {
        /// Combatant whose control changed.
        combatant: CombatantId,
        /// New control state.
        enabled: bool,
    },
    /// Confirms that a shell left a combatant's muzzle.
    ShellLaunched {
        /// Identifier allocated to the shell.
        shell: ShellId,
        /// Combatant that fired the shell.
        shooter: CombatantId,
        /// Muzzle pose at the moment of launch.
        muzzle: Pose,
        /// Launch speed along the muzzle's forward axis.
        speed: f32,
    },
    /// Reports that a launch request was refused because the shooter cannot act.
    LaunchRejected {
        /// Combatant whose launch was refused.
        shooter: CombatantId,
    },
    /// Broadcasts the damage dealt by a detonating shell.
    ShellExploded {
        /// Immutable damage report consumed by registered listeners.
        report: DamageReport,
    },
    /// Confirms that a shell entity no longer exists.
    ShellDestroyed {
        /// Identifier of the removed shell.
        shell: ShellId,
    },
    /// Reports that a combatant lost health.
    DamageTaken {
        /// Combatant that lost health.
        combatant: CombatantId,
        /// Damage dealt; health itself never drops below zero.
        amount: f32,
        /// Origin of the damage.
        source: DamageSource,
    },
    /// Announces that a combatant's health reached zero.
    CombatantDestroyed {
        /// Combatant that was destroyed.
        combatant: CombatantId,
    },
    /// Confirms a category-wide projectile sweep.
    ProjectilesCleared {
        /// Number of in-flight shells removed.
        shells: usize,
        /// Number of explosion effects removed.
        explosions: usize,
    },
}

/// Stable identity of a combatant, numbered from one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CombatantId(u32);

impl CombatantId {
    /// Creates a new combatant identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier allocated to a shell by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShellId(u32);

impl ShellId {
    /// Creates a new shell identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Position on the arena floor plus a heading around the vertical axis.
///
/// Yaw is measured in degrees clockwise when viewed from above, with zero
/// facing `+Z`; the forward vector of yaw `90` is therefore `+X`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// World-space position.
    pub position: Vec3,
    /// Heading in degrees.
    pub yaw_degrees: f32,
}

impl Pose {
    /// Creates a pose from a position and heading.
    #[must_use]
    pub const fn new(position: Vec3, yaw_degrees: f32) -> Self {
        Self {
            position,
            yaw_degrees,
        }
    }

    /// Unit vector pointing along the pose's heading.
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        let radians = self.yaw_degrees.to_radians();
        Vec3::new(radians.sin(), 0.0, radians.cos())
    }

    /// Rotates a vector expressed in the pose's local frame into world space.
    #[must_use]
    pub fn rotate(&self, local: Vec3) -> Vec3 {
        let (sin, cos) = self.yaw_degrees.to_radians().sin_cos();
        Vec3::new(
            local.x * cos + local.z * sin,
            local.y,
            -local.x * sin + local.z * cos,
        )
    }
}

/// Signed angle in degrees between two directions projected on the floor.
///
/// Positive values mean `to` lies clockwise (to the right) of `from`. Either
/// vector being degenerate yields zero.
#[must_use]
pub fn signed_bearing_degrees(from: Vec3, to: Vec3) -> f32 {
    let cross = from.z * to.x - from.x * to.z;
    let dot = from.x * to.x + from.z * to.z;
    if cross == 0.0 && dot == 0.0 {
        return 0.0;
    }
    cross.atan2(dot).to_degrees()
}

/// Named rectangular area in which a combatant may spawn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnRegion {
    /// Human-readable label used in logs and configuration errors.
    pub name: String,
    /// Centre and orientation of the region.
    pub pose: Pose,
    /// Half width along the region's local X axis.
    pub half_x: f32,
    /// Half depth along the region's local Z axis.
    pub half_z: f32,
}

/// Static sphere that blocks shells and line-of-sight probes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    /// Centre of the obstacle.
    pub center: Vec3,
    /// Radius of the obstacle.
    pub radius: f32,
}

/// Bounds and static geometry of the arena.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArenaLayout {
    /// Half size of the square arena floor centred on the origin.
    pub half_extent: f32,
    /// Obstacles placed on the floor.
    #[serde(default)]
    pub obstacles: Vec<Obstacle>,
}

impl Default for ArenaLayout {
    fn default() -> Self {
        Self {
            half_extent: 40.0,
            obstacles: Vec::new(),
        }
    }
}

/// Origin of a [`Event::DamageTaken`] notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageSource {
    /// Damage dealt by the explosion of the given shell.
    Shell(ShellId),
    /// Damage applied directly through [`Command::ApplyDamage`].
    Environment,
}

/// Immutable record of the damage dealt by one explosion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DamageReport {
    /// Shell that detonated.
    pub shell: ShellId,
    /// Combatant that fired the shell.
    pub shooter: CombatantId,
    /// Detonation point.
    pub position: Vec3,
    /// Damage dealt to each combatant caught in the blast, keyed by identity.
    pub damages: BTreeMap<CombatantId, f32>,
}

impl DamageReport {
    /// Damage dealt to the provided combatant, zero when absent.
    #[must_use]
    pub fn damage_to(&self, combatant: CombatantId) -> f32 {
        self.damages.get(&combatant).copied().unwrap_or(0.0)
    }
}

/// Discrete fire decision decoded from an action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FireDecision {
    /// Do not fire.
    #[default]
    Hold,
    /// Fire with the normal launch force.
    Normal,
    /// Fire with the strong launch force.
    Strong,
}

/// Terminal outcome delivered to a combatant when its episode ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// The combatant is the sole survivor.
    Win,
    /// The combatant was destroyed while another survived.
    Loss,
    /// Every combatant was destroyed in the same tick.
    Draw,
}

/// Reason an episode ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Termination {
    /// Exactly one combatant survived.
    Decisive {
        /// Sole survivor.
        winner: CombatantId,
    },
    /// No combatant survived.
    Draw,
    /// A combatant exhausted its step budget before health decided the episode.
    StepBudget {
        /// Combatant whose budget ran out first.
        combatant: CombatantId,
    },
}

impl Termination {
    /// Terminal outcome delivered to `combatant`; forced resets carry none.
    #[must_use]
    pub fn outcome_for(&self, combatant: CombatantId) -> Option<Outcome> {
        match self {
            Self::Decisive { winner } if *winner == combatant => Some(Outcome::Win),
            Self::Decisive { .. } => Some(Outcome::Loss),
            Self::Draw => Some(Outcome::Draw),
            Self::StepBudget { .. } => None,
        }
    }
}

/// Per-combatant line of an [`EpisodeSummary`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CombatantResult {
    /// Combatant the line describes.
    pub combatant: CombatantId,
    /// Terminal outcome, absent after a forced reset.
    pub outcome: Option<Outcome>,
    /// Reward accumulated over the episode, terminal bonus included.
    pub reward: f32,
    /// Health left when the episode ended.
    pub health: f32,
}

/// Record of one finished episode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpisodeSummary {
    /// One-based episode number.
    pub episode: u64,
    /// Reason the episode ended.
    pub termination: Termination,
    /// Decisions taken by the longest-running combatant.
    pub steps: u64,
    /// Results in ascending identity order.
    pub results: Vec<CombatantResult>,
}

impl EpisodeSummary {
    /// Result line of a single combatant.
    #[must_use]
    pub fn result(&self, combatant: CombatantId) -> Option<&CombatantResult> {
        self.results
            .iter()
            .find(|result| result.combatant == combatant)
    }
}

/// Immutable representation of a single combatant used for queries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CombatantSnapshot {
    /// Identity of the combatant.
    pub id: CombatantId,
    /// Current pose.
    pub pose: Pose,
    /// Remaining health, never negative.
    pub health: f32,
    /// Whether drive and launch requests are honoured.
    pub control_enabled: bool,
}

impl CombatantSnapshot {
    /// Health normalised into `[0, 1]`.
    #[must_use]
    pub fn normalized_health(&self) -> f32 {
        (self.health / MAX_HEALTH).clamp(0.0, 1.0)
    }

    /// Reports whether the combatant still has health left.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }
}

/// Read-only snapshot describing every combatant in the arena.
#[derive(Clone, Debug, Default)]
pub struct CombatantView {
    snapshots: Vec<CombatantSnapshot>,
}

impl CombatantView {
    /// Creates a new view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<CombatantSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured snapshots in ascending identity order.
    pub fn iter(&self) -> impl Iterator<Item = &CombatantSnapshot> {
        self.snapshots.iter()
    }

    /// Looks up the snapshot of a single combatant.
    #[must_use]
    pub fn get(&self, combatant: CombatantId) -> Option<&CombatantSnapshot> {
        self.snapshots
            .binary_search_by_key(&combatant, |snapshot| snapshot.id)
            .ok()
            .map(|index| &self.snapshots[index])
    }

    /// Number of combatants captured by the view.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Reports whether the view captured no combatants.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

/// Fixed-length encoded snapshot consumed by a policy.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Observation {
    values: Vec<f32>,
}

impl Observation {
    /// Wraps the provided values.
    #[must_use]
    pub fn from_values(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Creates an observation of the given length filled with zeros.
    #[must_use]
    pub fn zeroed(len: usize) -> Self {
        Self {
            values: vec![0.0; len],
        }
    }

    /// Encoded values in layout order.
    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Value at the given layout index, if present.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<f32> {
        self.values.get(index).copied()
    }

    /// Number of encoded values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Reports whether the observation carries no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Action vector produced by a policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Action {
    /// Continuous control: movement, turn and fire flag, each nominally in `[-1, 1]`.
    Continuous([f32; ACTION_BRANCHES]),
    /// Discrete control: one index per branch.
    Discrete([usize; ACTION_BRANCHES]),
}

impl Action {
    /// Neutral discrete action.
    #[must_use]
    pub const fn idle_discrete() -> Self {
        Self::Discrete([0; ACTION_BRANCHES])
    }

    /// Neutral continuous action.
    #[must_use]
    pub const fn idle_continuous() -> Self {
        Self::Continuous([0.0; ACTION_BRANCHES])
    }
}

/// Discrete actions excluded from the legal set for one tick.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ActionMask {
    excluded: BTreeSet<(usize, usize)>,
}

impl ActionMask {
    /// Creates a mask that allows every action.
    #[must_use]
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Excludes the action `index` on `branch`.
    pub fn exclude(&mut self, branch: usize, index: usize) {
        let _ = self.excluded.insert((branch, index));
    }

    /// Reports whether the action `index` on `branch` is legal.
    #[must_use]
    pub fn is_allowed(&self, branch: usize, index: usize) -> bool {
        !self.excluded.contains(&(branch, index))
    }

    /// Excluded indices on the given branch in ascending order.
    pub fn excluded(&self, branch: usize) -> impl Iterator<Item = usize> + '_ {
        self.excluded
            .iter()
            .filter(move |(candidate, _)| *candidate == branch)
            .map(|(_, index)| *index)
    }

    /// Reports whether no action is excluded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.excluded.is_empty()
    }
}

/// Entity struck first by a probe.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ProbeHit {
    /// The probe struck a combatant's body.
    Combatant(CombatantId),
    /// The probe struck the static obstacle at the given layout index.
    Obstacle(usize),
}

/// Collision service answering swept-sphere queries with first-hit semantics.
pub trait Probe {
    /// Sweeps a sphere of `radius` from `origin` along `direction` for at most
    /// `max_distance` and reports the nearest entity struck.
    ///
    /// Bodies already overlapping the sphere at `origin` are ignored, which
    /// keeps the caster from hitting itself.
    fn cast(&self, origin: Vec3, direction: Vec3, radius: f32, max_distance: f32)
        -> Option<ProbeHit>;
}
