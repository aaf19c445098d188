#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Episode orchestration for the Tank Arena training loop.
//!
//! The [`EpisodeOrchestrator`] owns the world and a fixed roster of
//! combatants. Every tick it advances the simulation, lets each combatant
//! observe, decide and act in ascending identity order, then checks whether
//! the episode ended. A finished episode is closed out (control disabled,
//! projectiles cleared, terminal outcomes delivered) and the arena is reset
//! within the same tick.

mod config;

use std::{collections::BTreeMap, time::Duration};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tank_arena_core::{
    CombatantId, CombatantResult, CombatantSnapshot, Command, EpisodeSummary, Event, Pose,
    SpawnRegion, Termination,
};
use tank_arena_system_agent::{CombatantAgent, Policy};
use tank_arena_system_spawning::sample_pose;
use tank_arena_system_weapon::{ExplosionListeners, Weapon};
use tank_arena_world::{self as world, query, World};
use tracing::{debug, error, info};

pub use crate::config::{ArenaConfig, ConfigError, RosterEntry};

/// Camera collaborator notified with every pose after spawns and resets.
pub trait Framing {
    /// Frames the provided poses, listed in ascending identity order.
    fn frame(&mut self, poses: &[(CombatantId, Pose)]);
}

/// Verdict reached from the health of every combatant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HealthVerdict {
    /// At least two combatants are still alive.
    Undecided,
    /// Exactly one combatant is alive.
    Decisive {
        /// Sole survivor.
        winner: CombatantId,
    },
    /// No combatant is alive.
    Draw,
}

/// Classifies the arena purely from combatant health.
#[must_use]
pub fn classify(healths: &[(CombatantId, f32)]) -> HealthVerdict {
    let mut alive = healths.iter().filter(|(_, health)| *health > 0.0);
    match (alive.next(), alive.next()) {
        (None, _) => HealthVerdict::Draw,
        (Some((winner, _)), None) => HealthVerdict::Decisive { winner: *winner },
        (Some(_), Some(_)) => HealthVerdict::Undecided,
    }
}

/// Outcome of a single orchestrator tick.
#[derive(Clone, Debug, PartialEq)]
pub struct TickReport {
    /// Episode the tick was simulated in.
    pub episode: u64,
    /// Summary of the episode that ended during the tick, if any.
    pub summary: Option<EpisodeSummary>,
}

struct Seat {
    id: CombatantId,
    region: SpawnRegion,
    step_budget: u64,
    agent: CombatantAgent,
    weapon: Weapon,
    policy: Box<dyn Policy>,
}

impl Seat {
    fn budget_exhausted(&self) -> bool {
        self.step_budget > 0 && self.agent.steps().saturating_add(1) >= self.step_budget
    }
}

/// Runs episodes for a fixed roster of combatants.
pub struct EpisodeOrchestrator {
    config: ArenaConfig,
    world: World,
    rng: ChaCha8Rng,
    seats: Vec<Seat>,
    listeners: ExplosionListeners,
    framing: Option<Box<dyn Framing>>,
    episode: u64,
    tick: Duration,
}

impl std::fmt::Debug for EpisodeOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpisodeOrchestrator")
            .field("episode", &self.episode)
            .field("combatants", &self.combatant_ids())
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl EpisodeOrchestrator {
    /// Validates the configuration, spawns every combatant once and starts
    /// the first episode.
    ///
    /// Every roster entry needs exactly one policy in `policies`.
    pub fn new(
        config: ArenaConfig,
        policies: BTreeMap<CombatantId, Box<dyn Policy>>,
    ) -> Result<Self, ConfigError> {
        Self::build(config, policies).map_err(|error| {
            error!(%error, "arena configuration rejected");
            error
        })
    }

    fn build(
        config: ArenaConfig,
        mut policies: BTreeMap<CombatantId, Box<dyn Policy>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut world = World::new();
        let mut events = Vec::new();
        world::apply(
            &mut world,
            Command::ConfigureArena {
                layout: config.arena.clone(),
            },
            &mut events,
        );

        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let mut roster: Vec<&RosterEntry> = config.combatants.iter().collect();
        roster.sort_by_key(|entry| entry.id);

        let mut seats = Vec::with_capacity(roster.len());
        for entry in roster {
            let id = entry.combatant();
            let region = config
                .spawn_region(&entry.spawn_region)
                .cloned()
                .ok_or_else(|| ConfigError::UnknownSpawnRegion {
                    id: entry.id,
                    region: entry.spawn_region.clone(),
                })?;
            let policy = policies
                .remove(&id)
                .ok_or(ConfigError::MissingPolicy { id: entry.id })?;

            let pose = sample_pose(&region, &mut rng);
            world::apply(
                &mut world,
                Command::SpawnCombatant {
                    combatant: id,
                    pose,
                },
                &mut events,
            );
            if query::combatant(&world, id).is_none() {
                return Err(ConfigError::CombatantNotSpawned { id: entry.id });
            }
            debug!(
                combatant = entry.id,
                variant = ?entry.variant,
                policy = policy.name(),
                region = %region.name,
                "combatant spawned"
            );

            seats.push(Seat {
                id,
                region,
                step_budget: entry.step_budget,
                agent: CombatantAgent::new(id, entry.variant, entry.reward_tuning()),
                weapon: Weapon::new(id, config.weapon),
                policy,
            });
        }

        if let Some(unexpected) = policies.keys().next() {
            return Err(ConfigError::UnexpectedPolicy {
                id: unexpected.get(),
            });
        }

        let tick = Duration::from_secs_f32(config.tick_seconds);
        let mut orchestrator = Self {
            config,
            world,
            rng,
            seats,
            listeners: ExplosionListeners::new(),
            framing: None,
            episode: 1,
            tick,
        };
        for seat in &mut orchestrator.seats {
            seat.agent.begin_episode();
        }
        orchestrator.bind_opponents();

        info!(
            combatants = orchestrator.seats.len(),
            seed = orchestrator.config.seed,
            "arena ready"
        );
        Ok(orchestrator)
    }

    /// Installs a camera collaborator and frames the current poses.
    #[must_use]
    pub fn with_framing(mut self, framing: Box<dyn Framing>) -> Self {
        self.framing = Some(framing);
        self.frame();
        self
    }

    /// Configuration the orchestrator was built from.
    #[must_use]
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Read-only access to the arena.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// One-based number of the running episode.
    #[must_use]
    pub const fn episode(&self) -> u64 {
        self.episode
    }

    /// Identities of every combatant in ascending order.
    #[must_use]
    pub fn combatant_ids(&self) -> Vec<CombatantId> {
        self.seats.iter().map(|seat| seat.id).collect()
    }

    /// Decision contract of a combatant.
    #[must_use]
    pub fn agent(&self, combatant: CombatantId) -> Option<&CombatantAgent> {
        self.seat(combatant).map(|seat| &seat.agent)
    }

    /// Weapon of a combatant.
    #[must_use]
    pub fn weapon(&self, combatant: CombatantId) -> Option<&Weapon> {
        self.seat(combatant).map(|seat| &seat.weapon)
    }

    /// Shells whose explosion is still awaited by a listener.
    #[must_use]
    pub fn listeners(&self) -> &ExplosionListeners {
        &self.listeners
    }

    /// Runs ticks until the current episode ends or `max_ticks` elapse.
    pub fn run_episode(&mut self, max_ticks: u64) -> Option<EpisodeSummary> {
        for _ in 0..max_ticks {
            if let Some(summary) = self.tick().summary {
                return Some(summary);
            }
        }
        None
    }

    /// Simulates one tick: physics, then every living combatant in identity
    /// order, then the termination check.
    ///
    /// Destroyed combatants neither decide nor accrue shaping penalties.
    pub fn tick(&mut self) -> TickReport {
        let episode = self.episode;

        let mut events = Vec::new();
        world::apply(&mut self.world, Command::Tick { dt: self.tick }, &mut events);
        for seat in &mut self.seats {
            seat.weapon.advance_clock(&events);
        }
        self.dispatch(&events);

        for index in 0..self.seats.len() {
            self.act(index);
        }

        let summary = self.termination().map(|termination| {
            let summary = self.close_episode(termination);
            self.reset();
            summary
        });

        if summary.is_none() {
            for seat in &mut self.seats {
                let reward = seat.agent.take_pending_reward();
                seat.policy.on_reward(reward);
            }
        }

        TickReport { episode, summary }
    }

    /// Applies environmental damage to a combatant outside the tick loop.
    ///
    /// The damaged agent is penalised immediately; termination is evaluated
    /// on the next tick.
    pub fn apply_damage(&mut self, combatant: CombatantId, amount: f32) {
        let mut events = Vec::new();
        world::apply(
            &mut self.world,
            Command::ApplyDamage { combatant, amount },
            &mut events,
        );
        self.dispatch(&events);
    }

    /// Forces the running episode to end without a terminal outcome and
    /// starts the next one.
    pub fn abort_episode(&mut self, combatant: CombatantId) -> EpisodeSummary {
        let summary = self.close_episode(Termination::StepBudget { combatant });
        self.reset();
        summary
    }

    fn act(&mut self, index: usize) {
        let view = query::combatant_view(&self.world);
        let probe = query::probe(&self.world);
        let seat = &mut self.seats[index];
        if !view.get(seat.id).map_or(false, CombatantSnapshot::is_alive) {
            return;
        }

        let cooling = seat.weapon.is_cooling_down();
        let observation = seat.agent.observe(&view, cooling, &probe);
        let mask = seat.agent.legal_action_mask(cooling);
        let action = seat.policy.act(&observation, &mask);
        let intent = seat.agent.decide(&action);
        seat.agent.shape_tick();

        let mut commands = vec![Command::DriveCombatant {
            combatant: seat.id,
            movement: intent.movement,
            turn: intent.turn,
        }];
        seat.weapon.fire(intent.fire, &mut commands);

        let mut events = Vec::new();
        for command in commands {
            world::apply(&mut self.world, command, &mut events);
        }
        seat.weapon.track_launches(&events, &mut self.listeners);
        self.dispatch(&events);
    }

    fn dispatch(&mut self, events: &[Event]) {
        for event in events {
            match event {
                Event::DamageTaken {
                    combatant, amount, ..
                } => {
                    if let Some(seat) = self.seat_mut(*combatant) {
                        seat.agent.on_take_damage(*amount);
                    }
                }
                Event::ShellExploded { report } => {
                    for listener in self.listeners.take(report.shell) {
                        if let Some(seat) = self.seat_mut(listener) {
                            seat.agent.on_shell_hit(report);
                        }
                    }
                }
                Event::ShellDestroyed { shell } => {
                    let _ = self.listeners.release(*shell);
                }
                Event::CombatantMissing { combatant } => {
                    debug!(combatant = combatant.get(), "command referenced a missing combatant");
                }
                _ => {}
            }
        }
    }

    fn termination(&self) -> Option<Termination> {
        let healths: Vec<(CombatantId, f32)> = query::combatant_view(&self.world)
            .iter()
            .map(|snapshot| (snapshot.id, snapshot.health))
            .collect();

        match classify(&healths) {
            HealthVerdict::Decisive { winner } => Some(Termination::Decisive { winner }),
            HealthVerdict::Draw => Some(Termination::Draw),
            HealthVerdict::Undecided => self
                .seats
                .iter()
                .find(|seat| seat.budget_exhausted())
                .map(|seat| Termination::StepBudget { combatant: seat.id }),
        }
    }

    fn close_episode(&mut self, termination: Termination) -> EpisodeSummary {
        let mut events = Vec::new();
        for seat in &self.seats {
            world::apply(
                &mut self.world,
                Command::SetControl {
                    combatant: seat.id,
                    enabled: false,
                },
                &mut events,
            );
        }
        world::apply(&mut self.world, Command::ClearProjectiles, &mut events);
        self.dispatch(&events);
        self.listeners.clear();

        let view = query::combatant_view(&self.world);
        let mut results = Vec::with_capacity(self.seats.len());
        let mut steps = 0;
        for seat in &mut self.seats {
            let outcome = termination.outcome_for(seat.id);
            let _ = seat.agent.on_episode_end(outcome);
            let reward = seat.agent.take_pending_reward();
            seat.policy.on_reward(reward);
            seat.policy.on_episode_end(outcome);

            steps = steps.max(seat.agent.steps());
            results.push(CombatantResult {
                combatant: seat.id,
                outcome,
                reward: seat.agent.cumulative_reward(),
                health: view.get(seat.id).map_or(0.0, |snapshot| snapshot.health),
            });
        }

        let summary = EpisodeSummary {
            episode: self.episode,
            termination,
            steps,
            results,
        };
        info!(
            episode = summary.episode,
            termination = ?summary.termination,
            steps = summary.steps,
            rewards = ?summary
                .results
                .iter()
                .map(|result| (result.combatant.get(), result.reward))
                .collect::<Vec<_>>(),
            "episode finished"
        );
        summary
    }

    fn reset(&mut self) {
        let mut events = Vec::new();
        for seat in &mut self.seats {
            let pose = sample_pose(&seat.region, &mut self.rng);
            world::apply(
                &mut self.world,
                Command::ResetCombatant {
                    combatant: seat.id,
                    pose,
                },
                &mut events,
            );
            seat.weapon.reset();
            seat.agent.begin_episode();
        }
        self.bind_opponents();
        for seat in &self.seats {
            world::apply(
                &mut self.world,
                Command::SetControl {
                    combatant: seat.id,
                    enabled: true,
                },
                &mut events,
            );
        }
        self.dispatch(&events);

        self.episode = self.episode.saturating_add(1);
        self.frame();
        debug!(episode = self.episode, "arena reset");
    }

    fn bind_opponents(&mut self) {
        let alive: Vec<CombatantId> = query::combatant_view(&self.world)
            .iter()
            .filter(|snapshot| snapshot.is_alive())
            .map(|snapshot| snapshot.id)
            .collect();
        if alive.len() < 2 {
            debug!(alive = alive.len(), "too few combatants to bind opponents");
            return;
        }

        for seat in &mut self.seats {
            let opponent = alive
                .iter()
                .copied()
                .find(|candidate| *candidate > seat.id)
                .or_else(|| alive.first().copied());
            seat.agent.set_opponent(opponent);
        }
    }

    fn frame(&mut self) {
        let Some(framing) = self.framing.as_mut() else {
            return;
        };
        let poses: Vec<(CombatantId, Pose)> = query::combatant_view(&self.world)
            .iter()
            .map(|snapshot| (snapshot.id, snapshot.pose))
            .collect();
        framing.frame(&poses);
    }

    fn seat(&self, combatant: CombatantId) -> Option<&Seat> {
        self.seats
            .binary_search_by_key(&combatant, |seat| seat.id)
            .ok()
            .map(|index| &self.seats[index])
    }

    fn seat_mut(&mut self, combatant: CombatantId) -> Option<&mut Seat> {
        self.seats
            .binary_search_by_key(&combatant, |seat| seat.id)
            .ok()
            .map(|index| &mut self.seats[index])
    }
}
