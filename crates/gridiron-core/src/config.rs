//! League tuning knobs and formation templates.
//!
//! Every value has a default matching a standard professional league, so a
//! YAML file only needs to list what it overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Position, ValidationError};

/// Errors that can occur when loading configuration or rosters.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        #[from]
        source: serde_yaml::Error,
    },

    /// Failed to parse JSON content.
    #[error("failed to parse roster JSON: {source}")]
    Json {
        /// The underlying JSON parse error.
        #[from]
        source: serde_json::Error,
    },

    /// Parsed content violates a domain invariant.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Per-game simulation configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Length of a regulation period in minutes.
    pub quarter_length: f64,
    /// Number of regulation periods.
    pub num_periods: u32,
    /// Length of an overtime period in minutes.
    pub overtime_length: f64,
    /// Maximum overtime periods before a shootout or a tie.
    pub max_overtimes: u32,
    /// Shootout rounds once overtime is exhausted; 0 disables shootouts.
    pub shootout_rounds: u32,
    /// Sudden-death shootout rounds before the game is declared tied.
    pub max_sudden_death_rounds: u32,
    /// Timeouts per team per half.
    pub timeouts_per_half: u8,
    /// Timeouts per team per overtime period.
    pub timeouts_per_overtime: u8,
    /// Divides the time between plays.
    pub pace: f64,
    /// Home-field advantage in percent applied to composite ratings.
    pub home_field_advantage: f64,
    /// Per-play, per-player injury rate at age 26.
    pub base_injury_rate: f64,
    /// Snaps after which a period is force-ended.
    pub max_plays_per_period: u32,
    pub pass_factor: f64,
    pub onside_factor: f64,
    pub onside_recovery_factor: f64,
    pub fourth_down_factor: f64,
    pub fg_accuracy_factor: f64,
    pub fumble_factor: f64,
    pub int_factor: f64,
    pub sack_factor: f64,
    pub completion_factor: f64,
    pub scramble_factor: f64,
    pub pass_yds_factor: f64,
    pub rush_yds_factor: f64,
    pub foul_rate_factor: f64,
    /// Personnel templates per play family.
    pub formations: FormationBook,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            quarter_length: 15.0,
            num_periods: 4,
            overtime_length: 10.0,
            max_overtimes: 1,
            shootout_rounds: 0,
            max_sudden_death_rounds: 20,
            timeouts_per_half: 3,
            timeouts_per_overtime: 2,
            pace: 1.0,
            home_field_advantage: 1.0,
            base_injury_rate: 0.0001,
            max_plays_per_period: 400,
            pass_factor: 1.0,
            onside_factor: 1.0,
            onside_recovery_factor: 1.0,
            fourth_down_factor: 1.0,
            fg_accuracy_factor: 1.0,
            fumble_factor: 1.0,
            int_factor: 1.0,
            sack_factor: 1.0,
            completion_factor: 1.0,
            scramble_factor: 1.0,
            pass_yds_factor: 1.0,
            rush_yds_factor: 1.0,
            foul_rate_factor: 1.0,
            formations: FormationBook::default(),
        }
    }
}

impl GameConfig {
    /// Load and validate configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check lengths, counts and factors.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let positive = [
            ("quarter_length", self.quarter_length),
            ("overtime_length", self.overtime_length),
            ("pace", self.pace),
        ];
        for (name, v) in positive {
            if !v.is_finite() || v <= 0.0 {
                return Err(ValidationError::InvalidConfig(format!("{name} must be > 0")));
            }
        }
        if self.num_periods == 0 {
            return Err(ValidationError::InvalidConfig(
                "num_periods must be >= 1".to_string(),
            ));
        }
        if self.max_plays_per_period == 0 {
            return Err(ValidationError::InvalidConfig(
                "max_plays_per_period must be >= 1".to_string(),
            ));
        }
        let factors = [
            ("base_injury_rate", self.base_injury_rate),
            ("pass_factor", self.pass_factor),
            ("onside_factor", self.onside_factor),
            ("onside_recovery_factor", self.onside_recovery_factor),
            ("fourth_down_factor", self.fourth_down_factor),
            ("fg_accuracy_factor", self.fg_accuracy_factor),
            ("fumble_factor", self.fumble_factor),
            ("int_factor", self.int_factor),
            ("sack_factor", self.sack_factor),
            ("completion_factor", self.completion_factor),
            ("scramble_factor", self.scramble_factor),
            ("pass_yds_factor", self.pass_yds_factor),
            ("rush_yds_factor", self.rush_yds_factor),
            ("foul_rate_factor", self.foul_rate_factor),
        ];
        for (name, v) in factors {
            if !v.is_finite() || v < 0.0 {
                return Err(ValidationError::InvalidConfig(format!("{name} must be >= 0")));
            }
        }
        if !self.home_field_advantage.is_finite() {
            return Err(ValidationError::InvalidConfig(
                "home_field_advantage must be finite".to_string(),
            ));
        }
        self.formations.validate()
    }

    /// True when `quarter` (1-based, counting overtimes) is the first period
    /// of the second half.
    pub fn is_first_period_after_halftime(&self, quarter: u32) -> bool {
        self.num_periods % 2 == 0 && quarter == self.num_periods / 2 + 1
    }

    /// True when the end of `quarter` is followed by a kickoff: halftime,
    /// the end of regulation, or the end of an overtime period.
    pub fn kickoff_after_end_of_period(&self, quarter: u32) -> bool {
        self.is_first_period_after_halftime(quarter + 1) || quarter >= self.num_periods
    }
}

/// Play families that have their own personnel templates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FormationKind {
    Normal,
    FieldGoal,
    Punt,
    Kickoff,
}

/// A number of players drawn from one depth chart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FormationSlot {
    pub pos: Position,
    pub count: usize,
}

/// Personnel for both sides of the ball, filled in listed order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Formation {
    pub name: String,
    pub off: Vec<FormationSlot>,
    pub def: Vec<FormationSlot>,
}

impl Formation {
    fn new(name: &str, off: &[(Position, usize)], def: &[(Position, usize)]) -> Self {
        let slots = |side: &[(Position, usize)]| -> Vec<FormationSlot> {
            side.iter()
                .map(|&(pos, count)| FormationSlot { pos, count })
                .collect()
        };
        Formation {
            name: name.to_string(),
            off: slots(off),
            def: slots(def),
        }
    }
}

/// Formation templates per play family. The first normal formation is the
/// starting lineup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FormationBook {
    pub normal: Vec<Formation>,
    pub field_goal: Vec<Formation>,
    pub punt: Vec<Formation>,
    pub kickoff: Vec<Formation>,
}

impl FormationBook {
    /// Templates for one play family.
    pub fn get(&self, kind: FormationKind) -> &[Formation] {
        match kind {
            FormationKind::Normal => &self.normal,
            FormationKind::FieldGoal => &self.field_goal,
            FormationKind::Punt => &self.punt,
            FormationKind::Kickoff => &self.kickoff,
        }
    }

    /// Every family needs at least one template.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for kind in [
            FormationKind::Normal,
            FormationKind::FieldGoal,
            FormationKind::Punt,
            FormationKind::Kickoff,
        ] {
            if self.get(kind).is_empty() {
                return Err(ValidationError::EmptyFormationSet(kind));
            }
        }
        Ok(())
    }
}

impl Default for FormationBook {
    fn default() -> Self {
        use Position::*;

        let base_def = [(DL, 4), (LB, 3), (CB, 2), (S, 2)];
        FormationBook {
            normal: vec![
                Formation::new(
                    "11 personnel",
                    &[(QB, 1), (RB, 1), (TE, 1), (WR, 3), (OL, 5)],
                    &base_def,
                ),
                Formation::new(
                    "12 personnel",
                    &[(QB, 1), (RB, 1), (TE, 2), (WR, 2), (OL, 5)],
                    &base_def,
                ),
                Formation::new(
                    "11 personnel vs nickel",
                    &[(QB, 1), (RB, 1), (TE, 1), (WR, 3), (OL, 5)],
                    &[(DL, 4), (LB, 2), (CB, 3), (S, 2)],
                ),
                Formation::new(
                    "10 personnel vs dime",
                    &[(QB, 1), (RB, 1), (WR, 4), (OL, 5)],
                    &[(DL, 4), (LB, 1), (CB, 4), (S, 2)],
                ),
                Formation::new(
                    "21 personnel",
                    &[(QB, 1), (RB, 2), (TE, 1), (WR, 2), (OL, 5)],
                    &[(DL, 4), (LB, 4), (CB, 2), (S, 1)],
                ),
            ],
            field_goal: vec![Formation::new(
                "field goal",
                &[(K, 1), (P, 1), (OL, 7), (TE, 2)],
                &[(DL, 6), (LB, 3), (CB, 2)],
            )],
            punt: vec![Formation::new(
                "punt",
                &[(P, 1), (OL, 5), (TE, 1), (LB, 2), (S, 2)],
                &[(PR, 1), (DL, 4), (LB, 3), (CB, 2), (S, 1)],
            )],
            kickoff: vec![Formation::new(
                "kickoff",
                &[(K, 1), (LB, 4), (S, 2), (CB, 2), (WR, 2)],
                &[(KR, 1), (WR, 2), (RB, 1), (TE, 2), (LB, 3), (S, 2)],
            )],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        GameConfig::default().validate().unwrap();
    }

    #[test]
    fn default_formations_field_eleven() {
        let book = FormationBook::default();
        for kind in [
            FormationKind::Normal,
            FormationKind::FieldGoal,
            FormationKind::Punt,
            FormationKind::Kickoff,
        ] {
            for f in book.get(kind) {
                let off: usize = f.off.iter().map(|s| s.count).sum();
                let def: usize = f.def.iter().map(|s| s.count).sum();
                assert_eq!(off, 11, "{} offense", f.name);
                assert_eq!(def, 11, "{} defense", f.name);
            }
        }
    }

    #[test]
    fn partial_yaml_overrides_defaults() {
        let cfg = GameConfig::parse("quarter_length: 12.0\nshootout_rounds: 5\n").unwrap();
        assert_eq!(cfg.quarter_length, 12.0);
        assert_eq!(cfg.shootout_rounds, 5);
        assert_eq!(cfg.num_periods, 4);
        assert_eq!(cfg.formations, FormationBook::default());
    }

    #[test]
    fn invalid_yaml_values_rejected() {
        assert!(matches!(
            GameConfig::parse("pace: 0.0\n"),
            Err(ConfigError::Invalid(ValidationError::InvalidConfig(_)))
        ));
        assert!(matches!(
            GameConfig::parse("sack_factor: -1.0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            GameConfig::parse("num_periods: [1, 2]\n"),
            Err(ConfigError::Yaml { .. })
        ));
    }

    #[test]
    fn empty_formation_set_rejected() {
        let mut cfg = GameConfig::default();
        cfg.formations.punt.clear();
        assert_eq!(
            cfg.validate(),
            Err(ValidationError::EmptyFormationSet(FormationKind::Punt))
        );
    }

    #[test]
    fn period_boundaries() {
        let cfg = GameConfig::default();
        assert!(cfg.is_first_period_after_halftime(3));
        assert!(!cfg.is_first_period_after_halftime(2));
        assert!(!cfg.kickoff_after_end_of_period(1));
        assert!(cfg.kickoff_after_end_of_period(2));
        assert!(!cfg.kickoff_after_end_of_period(3));
        assert!(cfg.kickoff_after_end_of_period(4));
        assert!(cfg.kickoff_after_end_of_period(5));

        let odd = GameConfig {
            num_periods: 3,
            ..GameConfig::default()
        };
        assert!(!odd.is_first_period_after_halftime(2));
        assert!(!odd.kickoff_after_end_of_period(1));
        assert!(odd.kickoff_after_end_of_period(3));
    }
}
