use tank_arena_core::{CombatantId, CombatantResult, EpisodeSummary, Termination};
use tank_arena_system_analytics::EpisodeAnalytics;

fn summary(
    episode: u64,
    termination: Termination,
    steps: u64,
    rewards: [f32; 2],
) -> EpisodeSummary {
    let results = [1, 2]
        .into_iter()
        .zip(rewards)
        .map(|(id, reward)| {
            let combatant = CombatantId::new(id);
            CombatantResult {
                combatant,
                outcome: termination.outcome_for(combatant),
                reward,
                health: 0.0,
            }
        })
        .collect();
    EpisodeSummary {
        episode,
        termination,
        steps,
        results,
    }
}

#[test]
fn tallies_follow_terminations() {
    let mut analytics = EpisodeAnalytics::new();
    let blue = CombatantId::new(1);
    let red = CombatantId::new(2);

    analytics.record(&summary(1, Termination::Decisive { winner: blue }, 100, [0.9, -1.2]));
    analytics.record(&summary(2, Termination::Draw, 300, [-0.4, -0.4]));
    analytics.record(&summary(3, Termination::StepBudget { combatant: blue }, 200, [-0.3, 0.1]));

    assert_eq!(analytics.episodes(), 3);
    assert_eq!(analytics.decisive(), 1);
    assert_eq!(analytics.draws(), 1);
    assert_eq!(analytics.forced_resets(), 1);
    assert_eq!(analytics.mean_episode_length(), Some(200.0));

    let blue_tally = analytics.tally(blue).expect("blue tallied");
    assert_eq!(blue_tally.wins, 1);
    assert_eq!(blue_tally.draws, 1);
    assert_eq!(blue_tally.unresolved, 1);
    assert_eq!(blue_tally.win_rate(), Some(0.5));

    let red_tally = analytics.tally(red).expect("red tallied");
    assert_eq!(red_tally.losses, 1);
    assert_eq!(red_tally.episodes(), 3);
    let mean = red_tally.mean_reward().expect("mean reward");
    assert!((mean - (-1.5 / 3.0)).abs() < 1e-6);
}

#[test]
fn forced_resets_do_not_count_towards_win_rate() {
    let mut analytics = EpisodeAnalytics::new();
    let red = CombatantId::new(2);
    analytics.record(&summary(1, Termination::Decisive { winner: red }, 10, [0.0, 0.0]));
    analytics.record(&summary(2, Termination::StepBudget { combatant: red }, 3000, [0.0, 0.0]));

    let tally = analytics.tally(red).expect("red tallied");
    assert_eq!(tally.episodes(), 2);
    assert_eq!(tally.win_rate(), Some(1.0));
    assert!(analytics
        .tallies()
        .all(|(_, tally)| tally.unresolved == 1));
}

#[test]
fn display_lists_every_combatant() {
    let mut analytics = EpisodeAnalytics::new();
    analytics.record(&summary(
        1,
        Termination::Decisive {
            winner: CombatantId::new(2),
        },
        42,
        [-1.0, 1.0],
    ));

    let rendered = analytics.to_string();
    assert!(rendered.starts_with("episodes 1 | decisive 1"));
    assert!(rendered.contains("tank 1: 0W 1L"));
    assert!(rendered.contains("tank 2: 1W 0L"));
    assert!(rendered.contains("mean length 42.0"));
}
