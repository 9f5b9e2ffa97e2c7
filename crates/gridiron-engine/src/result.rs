//! What a finished game hands back to the caller.

use gridiron_core::{PlayerId, Position, TeamNum};
use serde::Serialize;

use crate::play_by_play::{PlayByPlayEvent, ScoringPlay};
use crate::stats::StatLine;

/// Kicks taken and made in a shootout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ShootoutScore {
    pub att: u32,
    pub made: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerBoxScore {
    pub id: PlayerId,
    pub name: String,
    pub pos: Position,
    pub injured: bool,
    /// Hurt during this game.
    pub new_injury: bool,
    pub stats: StatLine,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamBoxScore {
    pub id: u32,
    pub name: String,
    pub pts: u32,
    /// Points per period, overtimes included.
    pub pts_qtrs: Vec<u32>,
    pub shootout: Option<ShootoutScore>,
    pub stats: StatLine,
    pub players: Vec<PlayerBoxScore>,
}

/// Box score, play-by-play and scoring summary of one game. `teams` is
/// `[home, away]`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameResult {
    pub gid: u32,
    pub overtimes: u32,
    pub shootout: bool,
    pub tied: bool,
    pub neutral_site: bool,
    pub teams: [TeamBoxScore; 2],
    pub play_by_play: Vec<PlayByPlayEvent>,
    pub scoring_summary: Vec<ScoringPlay>,
}

impl GameResult {
    /// Winning side, by points and then by shootout kicks.
    ///
    /// Example:
    /// 24-24 with a 3-2 shootout for the home side -> Some(TeamNum::Home)
    pub fn winner(&self) -> Option<TeamNum> {
        let [home, away] = &self.teams;
        let by = |h: u32, a: u32| match h.cmp(&a) {
            std::cmp::Ordering::Greater => Some(TeamNum::Home),
            std::cmp::Ordering::Less => Some(TeamNum::Away),
            std::cmp::Ordering::Equal => None,
        };
        by(home.pts, away.pts).or_else(|| match (home.shootout, away.shootout) {
            (Some(h), Some(a)) => by(h.made, a.made),
            _ => None,
        })
    }

    pub fn team(&self, t: TeamNum) -> &TeamBoxScore {
        &self.teams[t.idx()]
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn team(id: u32, pts: u32, shootout: Option<ShootoutScore>) -> TeamBoxScore {
        TeamBoxScore {
            id,
            name: format!("Team {id}"),
            pts,
            pts_qtrs: vec![pts, 0, 0, 0],
            shootout,
            stats: StatLine::default(),
            players: Vec::new(),
        }
    }

    fn result(home: TeamBoxScore, away: TeamBoxScore) -> GameResult {
        GameResult {
            gid: 1,
            overtimes: 0,
            shootout: home.shootout.is_some(),
            tied: false,
            neutral_site: false,
            teams: [home, away],
            play_by_play: Vec::new(),
            scoring_summary: Vec::new(),
        }
    }

    #[test]
    fn winner_by_points() {
        let r = result(team(1, 17, None), team(2, 20, None));
        assert_eq!(r.winner(), Some(TeamNum::Away));
        assert_eq!(r.team(TeamNum::Home).pts, 17);
    }

    #[test]
    fn shootout_breaks_a_tie() {
        let r = result(
            team(1, 24, Some(ShootoutScore { att: 3, made: 3 })),
            team(2, 24, Some(ShootoutScore { att: 3, made: 2 })),
        );
        assert_eq!(r.winner(), Some(TeamNum::Home));
    }

    #[test]
    fn tie_has_no_winner() {
        let r = result(team(1, 10, None), team(2, 10, None));
        assert_eq!(r.winner(), None);
    }

    #[test]
    fn json_uses_camel_case() {
        let json = result(team(1, 3, None), team(2, 0, None)).to_json().unwrap();
        assert!(json.contains("\"ptsQtrs\""));
        assert!(json.contains("\"scoringSummary\""));
        assert!(!json.contains("energy"));
    }
}
