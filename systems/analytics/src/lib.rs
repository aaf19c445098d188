#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Running tallies over finished training episodes.

pub mod metrics;

use std::{collections::BTreeMap, fmt};

use tank_arena_core::{CombatantId, EpisodeSummary, Outcome, Termination};

/// Totals accumulated for a single combatant.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CombatantTally {
    /// Episodes the combatant won.
    pub wins: u64,
    /// Episodes the combatant lost.
    pub losses: u64,
    /// Episodes that ended in a draw.
    pub draws: u64,
    /// Episodes cut short without an outcome.
    pub unresolved: u64,
    /// Sum of the final episode rewards.
    pub total_reward: f64,
}

impl CombatantTally {
    /// Number of episodes the tally covers.
    #[must_use]
    pub const fn episodes(&self) -> u64 {
        self.wins + self.losses + self.draws + self.unresolved
    }

    /// Mean final reward per episode.
    #[must_use]
    pub fn mean_reward(&self) -> Option<f64> {
        metrics::mean(self.total_reward, self.episodes())
    }

    /// Share of decided episodes the combatant won.
    #[must_use]
    pub fn win_rate(&self) -> Option<f64> {
        metrics::win_rate(self.wins, self.wins + self.losses + self.draws)
    }
}

/// Aggregates [`EpisodeSummary`] records as they are produced.
#[derive(Clone, Debug, Default)]
pub struct EpisodeAnalytics {
    episodes: u64,
    decisive: u64,
    draws: u64,
    forced_resets: u64,
    total_steps: u64,
    tallies: BTreeMap<CombatantId, CombatantTally>,
}

impl EpisodeAnalytics {
    /// Creates empty analytics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds a finished episode into the tallies.
    pub fn record(&mut self, summary: &EpisodeSummary) {
        self.episodes += 1;
        self.total_steps = self.total_steps.saturating_add(summary.steps);
        match summary.termination {
            Termination::Decisive { .. } => self.decisive += 1,
            Termination::Draw => self.draws += 1,
            Termination::StepBudget { .. } => self.forced_resets += 1,
        }

        for result in &summary.results {
            let tally = self.tallies.entry(result.combatant).or_default();
            match result.outcome {
                Some(Outcome::Win) => tally.wins += 1,
                Some(Outcome::Loss) => tally.losses += 1,
                Some(Outcome::Draw) => tally.draws += 1,
                None => tally.unresolved += 1,
            }
            tally.total_reward += f64::from(result.reward);
        }
    }

    /// Number of recorded episodes.
    #[must_use]
    pub const fn episodes(&self) -> u64 {
        self.episodes
    }

    /// Episodes decided by a sole survivor.
    #[must_use]
    pub const fn decisive(&self) -> u64 {
        self.decisive
    }

    /// Episodes in which nobody survived.
    #[must_use]
    pub const fn draws(&self) -> u64 {
        self.draws
    }

    /// Episodes ended by a step budget.
    #[must_use]
    pub const fn forced_resets(&self) -> u64 {
        self.forced_resets
    }

    /// Mean number of decisions per episode.
    #[must_use]
    pub fn mean_episode_length(&self) -> Option<f64> {
        metrics::mean(self.total_steps as f64, self.episodes)
    }

    /// Tally of a single combatant.
    #[must_use]
    pub fn tally(&self, combatant: CombatantId) -> Option<&CombatantTally> {
        self.tallies.get(&combatant)
    }

    /// Tallies in ascending identity order.
    pub fn tallies(&self) -> impl Iterator<Item = (CombatantId, &CombatantTally)> {
        self.tallies.iter().map(|(id, tally)| (*id, tally))
    }
}

impl fmt::Display for EpisodeAnalytics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "episodes {} | decisive {} | draws {} | forced resets {} | mean length {}",
            self.episodes,
            self.decisive,
            self.draws,
            self.forced_resets,
            self.mean_episode_length()
                .map_or_else(|| "-".to_owned(), |mean| format!("{mean:.1}")),
        )?;
        for (id, tally) in self.tallies() {
            writeln!(
                f,
                "  tank {}: {}W {}L {}D {}U | win rate {} | mean reward {}",
                id.get(),
                tally.wins,
                tally.losses,
                tally.draws,
                tally.unresolved,
                tally
                    .win_rate()
                    .map_or_else(|| "-".to_owned(), |rate| format!("{:.0}%", rate * 100.0)),
                tally
                    .mean_reward()
                    .map_or_else(|| "-".to_owned(), |reward| format!("{reward:+.3}")),
            )?;
        }
        Ok(())
    }
}
