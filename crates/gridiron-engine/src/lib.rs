#![deny(warnings)]

//! Play-by-play football game engine.
//!
//! [`GameSim`] turns two rated rosters into a box score, a play-by-play
//! stream and a scoring summary. The engine is single threaded and all of
//! its randomness comes from the RNG it is built with.

pub mod game;
pub mod penalty;
pub mod play;
pub mod play_by_play;
pub mod result;
pub mod roster;
pub mod stats;

pub use game::GameSim;
pub use play_by_play::{replay_team_totals, PenaltyDecision, PlayByPlayEvent, ScoreKind, ScoringPlay};
pub use result::{GameResult, PlayerBoxScore, ShootoutScore, TeamBoxScore};
pub use stats::{Stat, StatLine};

use gridiron_core::{seeded_rng, GameConfig, Position, TeamInput, ValidationError};
use thiserror::Error;

/// Errors raised while setting up or running a game.
#[derive(Debug, Error, PartialEq)]
pub enum SimError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Nobody, not even an injured player, could fill a formation slot.
    #[error("{team} has nobody to play {position}")]
    NoEligiblePlayer { team: String, position: Position },
    #[error("{team} has no players on the field")]
    NoPlayersOnField { team: String },
}

/// Simulate one game with a ChaCha RNG seeded from `seed`. `teams` is
/// `[home, away]`.
///
/// Example:
/// let home = synthetic_team(1, "Home", 0.6);
/// let away = synthetic_team(2, "Away", 0.5);
/// let result = simulate_game(1, [home, away], false, GameConfig::default(), 42)?;
/// println!("{:?}", result.winner());
pub fn simulate_game(
    gid: u32,
    teams: [TeamInput; 2],
    neutral_site: bool,
    cfg: GameConfig,
    seed: u64,
) -> Result<GameResult, SimError> {
    GameSim::new(gid, teams, neutral_site, cfg, seeded_rng(seed))?.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridiron_core::synthetic::synthetic_team;

    #[test]
    fn simulate_game_is_reproducible() {
        let teams = || [synthetic_team(1, "Home", 0.6), synthetic_team(2, "Away", 0.5)];
        let a = simulate_game(1, teams(), false, GameConfig::default(), 42).unwrap();
        let b = simulate_game(1, teams(), false, GameConfig::default(), 42).unwrap();
        assert_eq!(a, b);
        assert!(a.winner().is_some() || a.tied);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let cfg = GameConfig {
            pace: 0.0,
            ..GameConfig::default()
        };
        let teams = [synthetic_team(1, "Home", 0.6), synthetic_team(2, "Away", 0.5)];
        let err = simulate_game(1, teams, false, cfg, 1).unwrap_err();
        assert!(matches!(err, SimError::Validation(ValidationError::InvalidConfig(_))));
    }

    #[test]
    fn duplicate_player_ids_are_rejected() {
        let teams = [synthetic_team(1, "Home", 0.6), synthetic_team(1, "Away", 0.5)];
        let err = simulate_game(1, teams, false, GameConfig::default(), 1).unwrap_err();
        assert!(matches!(err, SimError::Validation(ValidationError::DuplicatePlayer(_))));
    }
}
