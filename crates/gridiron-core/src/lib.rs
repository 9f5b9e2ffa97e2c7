#![deny(warnings)]

//! Core domain models and invariants for the gridiron game engine.
//!
//! This crate defines the serializable inputs consumed by a single game
//! simulation (players, depth charts, configuration) together with
//! validation helpers and the injectable randomness seam.

pub mod config;
pub mod rng;
pub mod synthetic;

pub use config::{ConfigError, Formation, FormationBook, FormationKind, GameConfig};
pub use rng::{seeded_rng, GameRng};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

/// Field position of the kickoff spot.
pub const SCRIMMAGE_KICKOFF: i32 = 35;
/// Field position of a free kick after a safety.
pub const SCRIMMAGE_KICKOFF_SAFETY: i32 = 20;
/// Field position an extra point is snapped from.
pub const SCRIMMAGE_EXTRA_POINT: i32 = 85;
/// Field position a two-point try is snapped from.
pub const SCRIMMAGE_TWO_POINT_CONVERSION: i32 = 98;
/// Receiving team's field position after a kickoff touchback.
pub const SCRIMMAGE_TOUCHBACK_KICKOFF: i32 = 25;
/// Field position after any other touchback.
pub const SCRIMMAGE_TOUCHBACK: i32 = 20;

/// One of the two sides in a game. `Home` is team 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TeamNum {
    /// Home side (index 0).
    Home,
    /// Away side (index 1).
    Away,
}

impl TeamNum {
    /// Both sides in index order.
    pub const BOTH: [TeamNum; 2] = [TeamNum::Home, TeamNum::Away];

    /// The opposing side.
    pub fn other(self) -> TeamNum {
        match self {
            TeamNum::Home => TeamNum::Away,
            TeamNum::Away => TeamNum::Home,
        }
    }

    /// Array index of this side.
    pub fn idx(self) -> usize {
        match self {
            TeamNum::Home => 0,
            TeamNum::Away => 1,
        }
    }
}

/// Roster positions, including the depth-chart-only return roles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Position {
    QB,
    RB,
    WR,
    TE,
    OL,
    DL,
    LB,
    CB,
    S,
    K,
    P,
    /// Kick returner.
    KR,
    /// Punt returner.
    PR,
}

impl Position {
    /// Every position in depth-chart order.
    pub const ALL: [Position; 13] = [
        Position::QB,
        Position::RB,
        Position::WR,
        Position::TE,
        Position::OL,
        Position::DL,
        Position::LB,
        Position::CB,
        Position::S,
        Position::K,
        Position::P,
        Position::KR,
        Position::PR,
    ];

    /// Positions whose players rotate based on energy.
    pub fn is_fatigue_sensitive(self) -> bool {
        matches!(
            self,
            Position::RB
                | Position::WR
                | Position::TE
                | Position::DL
                | Position::LB
                | Position::CB
                | Position::S
        )
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The kinds of play the engine can run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlayType {
    Kickoff,
    OnsideKick,
    ExtraPoint,
    TwoPointConversion,
    Kneel,
    FieldGoal,
    /// Field goal attempted as time expires.
    FieldGoalLate,
    Punt,
    Pass,
    Run,
}

/// Overtime sub-phases. Regulation is represented by the absence of a state.
///
/// Example:
/// InitialKickoff -> FirstPossession (kick received)
///   -> SecondPossession -> BothTeamsPossessed -> Over
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OvertimeState {
    InitialKickoff,
    FirstPossession,
    SecondPossession,
    BothTeamsPossessed,
    Over,
}

impl OvertimeState {
    /// Phase after the ball changes hands.
    pub fn after_possession_change(self) -> OvertimeState {
        match self {
            OvertimeState::InitialKickoff => OvertimeState::FirstPossession,
            OvertimeState::FirstPossession => OvertimeState::SecondPossession,
            OvertimeState::SecondPossession => OvertimeState::BothTeamsPossessed,
            OvertimeState::BothTeamsPossessed => OvertimeState::BothTeamsPossessed,
            OvertimeState::Over => OvertimeState::Over,
        }
    }
}

/// Named composite ratings a player carries into a game.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CompositeRating {
    PassingAccuracy,
    PassingDeep,
    PassingVision,
    Athleticism,
    Rushing,
    Catching,
    GettingOpen,
    PassBlocking,
    RunBlocking,
    PassRushing,
    RunStopping,
    PassCoverage,
    Tackling,
    AvoidingSacks,
    BallSecurity,
    Endurance,
    KickingPower,
    KickingAccuracy,
    Punting,
    Speed,
}

/// Precomputed composite ratings, each on a 0-1 scale.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompositeRatings {
    pub passing_accuracy: f64,
    pub passing_deep: f64,
    pub passing_vision: f64,
    pub athleticism: f64,
    pub rushing: f64,
    pub catching: f64,
    pub getting_open: f64,
    pub pass_blocking: f64,
    pub run_blocking: f64,
    pub pass_rushing: f64,
    pub run_stopping: f64,
    pub pass_coverage: f64,
    pub tackling: f64,
    pub avoiding_sacks: f64,
    pub ball_security: f64,
    pub endurance: f64,
    pub kicking_power: f64,
    pub kicking_accuracy: f64,
    pub punting: f64,
    pub speed: f64,
}

impl Default for CompositeRatings {
    fn default() -> Self {
        Self::uniform(0.5)
    }
}

impl CompositeRatings {
    /// Every rating set to the same value.
    pub fn uniform(v: f64) -> Self {
        CompositeRatings {
            passing_accuracy: v,
            passing_deep: v,
            passing_vision: v,
            athleticism: v,
            rushing: v,
            catching: v,
            getting_open: v,
            pass_blocking: v,
            run_blocking: v,
            pass_rushing: v,
            run_stopping: v,
            pass_coverage: v,
            tackling: v,
            avoiding_sacks: v,
            ball_security: v,
            endurance: v,
            kicking_power: v,
            kicking_accuracy: v,
            punting: v,
            speed: v,
        }
    }

    /// Read one rating by name.
    pub fn get(&self, rating: CompositeRating) -> f64 {
        match rating {
            CompositeRating::PassingAccuracy => self.passing_accuracy,
            CompositeRating::PassingDeep => self.passing_deep,
            CompositeRating::PassingVision => self.passing_vision,
            CompositeRating::Athleticism => self.athleticism,
            CompositeRating::Rushing => self.rushing,
            CompositeRating::Catching => self.catching,
            CompositeRating::GettingOpen => self.getting_open,
            CompositeRating::PassBlocking => self.pass_blocking,
            CompositeRating::RunBlocking => self.run_blocking,
            CompositeRating::PassRushing => self.pass_rushing,
            CompositeRating::RunStopping => self.run_stopping,
            CompositeRating::PassCoverage => self.pass_coverage,
            CompositeRating::Tackling => self.tackling,
            CompositeRating::AvoidingSacks => self.avoiding_sacks,
            CompositeRating::BallSecurity => self.ball_security,
            CompositeRating::Endurance => self.endurance,
            CompositeRating::KickingPower => self.kicking_power,
            CompositeRating::KickingAccuracy => self.kicking_accuracy,
            CompositeRating::Punting => self.punting,
            CompositeRating::Speed => self.speed,
        }
    }

    fn values_mut(&mut self) -> [&mut f64; 20] {
        [
            &mut self.passing_accuracy,
            &mut self.passing_deep,
            &mut self.passing_vision,
            &mut self.athleticism,
            &mut self.rushing,
            &mut self.catching,
            &mut self.getting_open,
            &mut self.pass_blocking,
            &mut self.run_blocking,
            &mut self.pass_rushing,
            &mut self.run_stopping,
            &mut self.pass_coverage,
            &mut self.tackling,
            &mut self.avoiding_sacks,
            &mut self.ball_security,
            &mut self.endurance,
            &mut self.kicking_power,
            &mut self.kicking_accuracy,
            &mut self.punting,
            &mut self.speed,
        ]
    }

    /// Multiply every rating except endurance by `factor`.
    pub fn scale_except_endurance(&mut self, factor: f64) {
        let endurance = self.endurance;
        for v in self.values_mut() {
            *v *= factor;
        }
        self.endurance = endurance;
    }

    fn all(&self) -> [f64; 20] {
        let mut copy = self.clone();
        copy.values_mut().map(|v| *v)
    }
}

/// Unique player identifier supplied by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u32);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A rated player entering a game.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlayerInput {
    /// Caller-assigned identifier, unique within the game.
    pub id: PlayerId,
    /// Display name used in the play-by-play.
    pub name: String,
    /// Primary roster position.
    pub pos: Position,
    /// Age in years; drives the injury rate.
    #[serde(default = "default_age")]
    pub age: u8,
    /// Composite ratings on a 0-1 scale.
    #[serde(default)]
    pub ratings: CompositeRatings,
    /// Position overalls on a 0-100 scale. Missing positions read as 0.
    #[serde(default)]
    pub ovrs: BTreeMap<Position, f64>,
    /// Player starts the game already hurt.
    #[serde(default)]
    pub injured: bool,
}

fn default_age() -> u8 {
    26
}

impl PlayerInput {
    /// Overall at a position on a 0-100 scale.
    pub fn ovr(&self, pos: Position) -> f64 {
        self.ovrs.get(&pos).copied().unwrap_or(0.0)
    }
}

/// A team roster with position-keyed depth charts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TeamInput {
    /// Caller-assigned team identifier.
    pub id: u32,
    /// Display name.
    pub name: String,
    /// Ordered roster.
    pub players: Vec<PlayerInput>,
    /// Depth chart per position, best first. A player may appear under
    /// several positions.
    #[serde(default)]
    pub depth: BTreeMap<Position, Vec<PlayerId>>,
}

impl TeamInput {
    /// Parse a roster from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let team: TeamInput = serde_json::from_str(json)?;
        validate_team(&team)?;
        Ok(team)
    }
}

/// Validation errors for domain invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// A roster must contain at least one player.
    #[error("team {0} has an empty roster")]
    EmptyRoster(String),
    /// Player identifiers must be unique within a game.
    #[error("duplicate player id {0}")]
    DuplicatePlayer(PlayerId),
    /// Depth chart entries must reference rostered players.
    #[error("depth chart for {team} at {position} references unknown player {player}")]
    UnknownDepthPlayer {
        /// Team name.
        team: String,
        /// Depth chart position.
        position: Position,
        /// Offending id.
        player: PlayerId,
    },
    /// Composite ratings must be finite and within [0, 1.5].
    #[error("player {player} has out-of-range rating {rating:?} = {value}")]
    RatingOutOfRange {
        /// Player id.
        player: PlayerId,
        /// Rating name.
        rating: CompositeRating,
        /// Offending value.
        value: f64,
    },
    /// A configuration value is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A formation set used by the engine is empty.
    #[error("no formations defined for {0:?}")]
    EmptyFormationSet(FormationKind),
}

const RATING_NAMES: [CompositeRating; 20] = [
    CompositeRating::PassingAccuracy,
    CompositeRating::PassingDeep,
    CompositeRating::PassingVision,
    CompositeRating::Athleticism,
    CompositeRating::Rushing,
    CompositeRating::Catching,
    CompositeRating::GettingOpen,
    CompositeRating::PassBlocking,
    CompositeRating::RunBlocking,
    CompositeRating::PassRushing,
    CompositeRating::RunStopping,
    CompositeRating::PassCoverage,
    CompositeRating::Tackling,
    CompositeRating::AvoidingSacks,
    CompositeRating::BallSecurity,
    CompositeRating::Endurance,
    CompositeRating::KickingPower,
    CompositeRating::KickingAccuracy,
    CompositeRating::Punting,
    CompositeRating::Speed,
];

/// Validate one player's ratings.
pub fn validate_player(p: &PlayerInput) -> Result<(), ValidationError> {
    for (rating, value) in RATING_NAMES.iter().zip(p.ratings.all()) {
        if !value.is_finite() || !(0.0..=1.5).contains(&value) {
            return Err(ValidationError::RatingOutOfRange {
                player: p.id,
                rating: *rating,
                value,
            });
        }
    }
    Ok(())
}

/// Validate a roster, including depth chart cross-references.
pub fn validate_team(team: &TeamInput) -> Result<(), ValidationError> {
    if team.players.is_empty() {
        return Err(ValidationError::EmptyRoster(team.name.clone()));
    }
    let mut ids: BTreeSet<PlayerId> = BTreeSet::new();
    for p in &team.players {
        validate_player(p)?;
        if !ids.insert(p.id) {
            return Err(ValidationError::DuplicatePlayer(p.id));
        }
    }
    for (pos, list) in &team.depth {
        for id in list {
            if !ids.contains(id) {
                return Err(ValidationError::UnknownDepthPlayer {
                    team: team.name.clone(),
                    position: *pos,
                    player: *id,
                });
            }
        }
    }
    Ok(())
}

/// Validate both rosters of a game; player ids must be unique across them.
pub fn validate_matchup(teams: &[TeamInput; 2]) -> Result<(), ValidationError> {
    let mut ids: BTreeSet<PlayerId> = BTreeSet::new();
    for team in teams {
        validate_team(team)?;
        for p in &team.players {
            if !ids.insert(p.id) {
                return Err(ValidationError::DuplicatePlayer(p.id));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn player(id: u32, pos: Position) -> PlayerInput {
        PlayerInput {
            id: PlayerId(id),
            name: format!("Player {id}"),
            pos,
            age: 25,
            ratings: CompositeRatings::default(),
            ovrs: BTreeMap::from([(pos, 60.0)]),
            injured: false,
        }
    }

    #[test]
    fn team_num_other_and_index() {
        assert_eq!(TeamNum::Home.other(), TeamNum::Away);
        assert_eq!(TeamNum::Away.other(), TeamNum::Home);
        assert_eq!(TeamNum::Home.idx(), 0);
        assert_eq!(TeamNum::Away.idx(), 1);
    }

    #[test]
    fn overtime_phases_advance_on_possession_change() {
        let mut s = OvertimeState::InitialKickoff;
        let mut seen = vec![s];
        for _ in 0..4 {
            s = s.after_possession_change();
            seen.push(s);
        }
        assert_eq!(
            seen,
            vec![
                OvertimeState::InitialKickoff,
                OvertimeState::FirstPossession,
                OvertimeState::SecondPossession,
                OvertimeState::BothTeamsPossessed,
                OvertimeState::BothTeamsPossessed,
            ]
        );
        assert_eq!(OvertimeState::Over.after_possession_change(), OvertimeState::Over);
    }

    #[test]
    fn scale_keeps_endurance() {
        let mut r = CompositeRatings::uniform(0.5);
        r.scale_except_endurance(1.1);
        assert!((r.rushing - 0.55).abs() < 1e-12);
        assert!((r.kicking_power - 0.55).abs() < 1e-12);
        assert_eq!(r.endurance, 0.5);
    }

    #[test]
    fn ovr_defaults_to_zero() {
        let p = player(1, Position::QB);
        assert_eq!(p.ovr(Position::QB), 60.0);
        assert_eq!(p.ovr(Position::K), 0.0);
    }

    #[test]
    fn depth_must_reference_roster() {
        let team = TeamInput {
            id: 1,
            name: "Test".to_string(),
            players: vec![player(1, Position::QB)],
            depth: BTreeMap::from([(Position::QB, vec![PlayerId(1), PlayerId(9)])]),
        };
        assert_eq!(
            validate_team(&team),
            Err(ValidationError::UnknownDepthPlayer {
                team: "Test".to_string(),
                position: Position::QB,
                player: PlayerId(9),
            })
        );
    }

    #[test]
    fn duplicate_ids_rejected_across_teams() {
        let a = TeamInput {
            id: 1,
            name: "A".to_string(),
            players: vec![player(1, Position::QB)],
            depth: BTreeMap::new(),
        };
        let mut b = a.clone();
        b.name = "B".to_string();
        assert_eq!(
            validate_matchup(&[a, b]),
            Err(ValidationError::DuplicatePlayer(PlayerId(1)))
        );
    }

    #[test]
    fn empty_roster_rejected() {
        let team = TeamInput {
            id: 1,
            name: "Empty".to_string(),
            players: vec![],
            depth: BTreeMap::new(),
        };
        assert!(matches!(validate_team(&team), Err(ValidationError::EmptyRoster(_))));
    }

    #[test]
    fn roster_json_roundtrip() {
        let team = synthetic::synthetic_team(3, "Roundtrip", 0.6);
        let s = serde_json::to_string(&team).unwrap();
        let back = TeamInput::from_json(&s).unwrap();
        assert_eq!(back.players.len(), team.players.len());
        assert_eq!(back.depth, team.depth);
    }

    #[test]
    fn partial_player_json_uses_defaults() {
        let json = r#"{"id":7,"name":"Kicker","pos":"K"}"#;
        let p: PlayerInput = serde_json::from_str(json).unwrap();
        assert_eq!(p.age, 26);
        assert_eq!(p.ratings, CompositeRatings::default());
        assert!(!p.injured);
    }

    proptest! {
        #[test]
        fn ratings_in_range_validate(v in 0.0f64..=1.5) {
            let mut p = player(1, Position::RB);
            p.ratings = CompositeRatings::uniform(v);
            prop_assert!(validate_player(&p).is_ok());
        }

        #[test]
        fn ratings_out_of_range_rejected(v in 1.5001f64..100.0) {
            let mut p = player(1, Position::RB);
            p.ratings.speed = v;
            prop_assert!(validate_player(&p).is_err());
        }
    }
}
