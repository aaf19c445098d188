//! Load-time configuration of an arena, its roster and its tuning.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tank_arena_core::{ArenaLayout, CombatantId, Obstacle, Pose, SpawnRegion, Vec3};
use tank_arena_system_agent::{AgentVariant, InputBindings, RewardTuning};
use tank_arena_system_weapon::WeaponTuning;
use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML document could not be parsed.
    #[error("failed to parse arena configuration: {0}")]
    Parse(#[from] toml::de::Error),
    /// The tick duration is not a positive number of seconds up to one.
    #[error("tick duration must lie in (0, 1] seconds, got {seconds}")]
    InvalidTick {
        /// Configured tick duration.
        seconds: f32,
    },
    /// The arena half extent is not positive.
    #[error("arena half extent must be positive, got {half_extent}")]
    InvalidArena {
        /// Configured half extent.
        half_extent: f32,
    },
    /// Fewer than two combatants were configured.
    #[error("at least two combatants are required, got {count}")]
    TooFewCombatants {
        /// Number of configured combatants.
        count: usize,
    },
    /// A combatant was configured with the reserved identity zero.
    #[error("combatant identities start at one")]
    ZeroCombatantId,
    /// Two roster entries share an identity.
    #[error("combatant {id} is configured more than once")]
    DuplicateCombatant {
        /// Repeated identity.
        id: u32,
    },
    /// Two spawn regions share a name.
    #[error("spawn region `{name}` is defined more than once")]
    DuplicateSpawnRegion {
        /// Repeated name.
        name: String,
    },
    /// A spawn region has negative or non-finite extents.
    #[error("spawn region `{name}` has invalid extents")]
    InvalidSpawnRegion {
        /// Offending region.
        name: String,
    },
    /// A roster entry references a spawn region that does not exist.
    #[error("combatant {id} references unknown spawn region `{region}`")]
    UnknownSpawnRegion {
        /// Combatant whose entry is broken.
        id: u32,
        /// Region name that could not be resolved.
        region: String,
    },
    /// Weapon tuning contains negative or non-finite values.
    #[error("weapon tuning values must be finite and non-negative")]
    InvalidWeaponTuning,
    /// No policy was supplied for a roster entry.
    #[error("no policy supplied for combatant {id}")]
    MissingPolicy {
        /// Combatant without a policy.
        id: u32,
    },
    /// A policy was supplied for a combatant absent from the roster.
    #[error("policy supplied for combatant {id}, which is not in the roster")]
    UnexpectedPolicy {
        /// Identity without a roster entry.
        id: u32,
    },
    /// The world did not hold a combatant right after spawning it.
    #[error("combatant {id} was not found in the arena after spawning")]
    CombatantNotSpawned {
        /// Combatant that could not be found.
        id: u32,
    },
}

/// One combatant of the roster.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    /// Identity of the combatant, starting at one.
    pub id: u32,
    /// Agent flavour chosen at spawn time.
    #[serde(default)]
    pub variant: AgentVariant,
    /// Name of the spawn region the combatant is placed in.
    pub spawn_region: String,
    /// Decisions per episode before a forced reset; zero disables the budget.
    #[serde(default)]
    pub step_budget: u64,
    /// Reward shaping override; the variant's default applies when absent.
    #[serde(default)]
    pub reward: Option<RewardTuning>,
    /// Manual control bindings; conventional per-slot bindings apply when absent.
    #[serde(default)]
    pub bindings: Option<InputBindings>,
}

impl RosterEntry {
    /// Identity as a typed identifier.
    #[must_use]
    pub const fn combatant(&self) -> CombatantId {
        CombatantId::new(self.id)
    }

    /// Reward shaping in effect for the entry.
    #[must_use]
    pub fn reward_tuning(&self) -> RewardTuning {
        self.reward.unwrap_or_else(|| self.variant.default_tuning())
    }

    /// Manual control bindings in effect for the entry.
    #[must_use]
    pub fn input_bindings(&self) -> InputBindings {
        self.bindings
            .clone()
            .unwrap_or_else(|| InputBindings::for_combatant(self.combatant()))
    }
}

/// Complete description of a training arena.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Simulated seconds per tick.
    pub tick_seconds: f32,
    /// Seed of the generator driving spawn placement.
    pub seed: u64,
    /// Bounds and obstacles of the arena.
    pub arena: ArenaLayout,
    /// Weapon tuning shared by every combatant.
    pub weapon: WeaponTuning,
    /// Named spawn regions.
    pub spawn_regions: Vec<SpawnRegion>,
    /// Combatants taking part in every episode.
    pub combatants: Vec<RosterEntry>,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            tick_seconds: 0.02,
            seed: 0x7a2c_51e9,
            arena: ArenaLayout {
                half_extent: 40.0,
                obstacles: vec![
                    Obstacle {
                        center: Vec3::new(-8.0, 0.0, 10.0),
                        radius: 2.5,
                    },
                    Obstacle {
                        center: Vec3::new(8.0, 0.0, -10.0),
                        radius: 2.5,
                    },
                ],
            },
            weapon: WeaponTuning::default(),
            spawn_regions: vec![
                SpawnRegion {
                    name: "south-west".to_owned(),
                    pose: Pose::new(Vec3::new(-15.0, 0.0, -10.0), 56.0),
                    half_x: 6.0,
                    half_z: 4.0,
                },
                SpawnRegion {
                    name: "north-east".to_owned(),
                    pose: Pose::new(Vec3::new(15.0, 0.0, 10.0), 236.0),
                    half_x: 6.0,
                    half_z: 4.0,
                },
            ],
            combatants: vec![
                RosterEntry {
                    id: 1,
                    variant: AgentVariant::DiscreteMasked,
                    spawn_region: "south-west".to_owned(),
                    step_budget: 3_000,
                    reward: None,
                    bindings: None,
                },
                RosterEntry {
                    id: 2,
                    variant: AgentVariant::DiscreteMasked,
                    spawn_region: "north-east".to_owned(),
                    step_budget: 3_000,
                    reward: None,
                    bindings: None,
                },
            ],
        }
    }
}

impl ArenaConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Looks up a spawn region by name.
    #[must_use]
    pub fn spawn_region(&self, name: &str) -> Option<&SpawnRegion> {
        self.spawn_regions.iter().find(|region| region.name == name)
    }

    /// Checks every structural constraint the orchestrator relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.tick_seconds.is_finite() && self.tick_seconds > 0.0 && self.tick_seconds <= 1.0)
        {
            return Err(ConfigError::InvalidTick {
                seconds: self.tick_seconds,
            });
        }
        if !(self.arena.half_extent.is_finite() && self.arena.half_extent > 0.0) {
            return Err(ConfigError::InvalidArena {
                half_extent: self.arena.half_extent,
            });
        }
        if !weapon_tuning_is_valid(&self.weapon) {
            return Err(ConfigError::InvalidWeaponTuning);
        }

        let mut names = BTreeSet::new();
        for region in &self.spawn_regions {
            if !names.insert(region.name.as_str()) {
                return Err(ConfigError::DuplicateSpawnRegion {
                    name: region.name.clone(),
                });
            }
            let extents_valid = [region.half_x, region.half_z]
                .iter()
                .all(|extent| extent.is_finite() && *extent >= 0.0);
            if !extents_valid || !region.pose.position.is_finite() {
                return Err(ConfigError::InvalidSpawnRegion {
                    name: region.name.clone(),
                });
            }
        }

        if self.combatants.len() < 2 {
            return Err(ConfigError::TooFewCombatants {
                count: self.combatants.len(),
            });
        }
        let mut ids = BTreeSet::new();
        for entry in &self.combatants {
            if entry.id == 0 {
                return Err(ConfigError::ZeroCombatantId);
            }
            if !ids.insert(entry.id) {
                return Err(ConfigError::DuplicateCombatant { id: entry.id });
            }
            if !names.contains(entry.spawn_region.as_str()) {
                return Err(ConfigError::UnknownSpawnRegion {
                    id: entry.id,
                    region: entry.spawn_region.clone(),
                });
            }
        }

        Ok(())
    }
}

fn weapon_tuning_is_valid(tuning: &WeaponTuning) -> bool {
    [
        tuning.normal_cooldown_secs,
        tuning.strong_cooldown_secs,
        tuning.normal_force,
        tuning.strong_force,
        tuning.min_launch_force,
    ]
    .iter()
    .all(|value| value.is_finite() && *value >= 0.0 && *value <= 1_000.0)
}
