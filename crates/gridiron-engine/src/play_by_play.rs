//! Append-only play-by-play stream and the scoring summary built from it.

use gridiron_core::{PlayerId, TeamNum};
use serde::Serialize;

use crate::stats::{Stat, StatLine};

/// How the non-offending side handled a flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PenaltyDecision {
    Accepted,
    Declined,
    Offsetting,
}

/// One entry of the play-by-play. Clocks are minutes left in the period.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PlayByPlayEvent {
    Clock {
        t: TeamNum,
        clock: f64,
        down: u8,
        to_go: i32,
        scrimmage: i32,
        awaiting_kickoff: bool,
        awaiting_after_touchdown: bool,
    },
    Quarter {
        clock: f64,
        quarter: u32,
        starts_with_kickoff: bool,
    },
    Overtime {
        clock: f64,
        overtimes: u32,
        starts_with_kickoff: bool,
    },
    Timeouts {
        timeouts: [u8; 2],
    },
    Timeout {
        clock: f64,
        t: TeamNum,
        offense: bool,
        num_left: u8,
    },
    TwoMinuteWarning {
        clock: f64,
    },
    Kickoff {
        clock: f64,
        t: TeamNum,
        names: Vec<String>,
        touchback: bool,
        yds: i32,
    },
    KickoffReturn {
        clock: f64,
        t: TeamNum,
        names: Vec<String>,
        td: bool,
        yds: i32,
    },
    OnsideKick {
        clock: f64,
        t: TeamNum,
        names: Vec<String>,
    },
    OnsideKickRecovery {
        clock: f64,
        t: TeamNum,
        names: Vec<String>,
        success: bool,
        td: bool,
    },
    PuntTeam {
        clock: f64,
        t: TeamNum,
    },
    Punt {
        clock: f64,
        t: TeamNum,
        names: Vec<String>,
        touchback: bool,
        yds: i32,
    },
    PuntReturn {
        clock: f64,
        t: TeamNum,
        names: Vec<String>,
        td: bool,
        yds: i32,
    },
    FieldGoalAttempt {
        clock: f64,
        t: TeamNum,
        names: Vec<String>,
        yds: i32,
    },
    ExtraPointAttempt {
        clock: f64,
        t: TeamNum,
        names: Vec<String>,
        yds: i32,
    },
    FieldGoal {
        clock: f64,
        t: TeamNum,
        names: Vec<String>,
        made: bool,
        yds: i32,
    },
    ExtraPoint {
        clock: f64,
        t: TeamNum,
        names: Vec<String>,
        made: bool,
        yds: i32,
    },
    TwoPointConversion {
        clock: f64,
        t: TeamNum,
    },
    TwoPointConversionFailed {
        clock: f64,
        t: TeamNum,
    },
    Dropback {
        clock: f64,
        t: TeamNum,
        names: Vec<String>,
    },
    Sack {
        clock: f64,
        t: TeamNum,
        names: Vec<String>,
        safety: bool,
        yds: i32,
    },
    PassComplete {
        clock: f64,
        t: TeamNum,
        names: Vec<String>,
        safety: bool,
        td: bool,
        yds: i32,
        two_point_conversion_team: Option<TeamNum>,
    },
    PassIncomplete {
        clock: f64,
        t: TeamNum,
        names: Vec<String>,
        yds: i32,
    },
    Interception {
        clock: f64,
        t: TeamNum,
        names: Vec<String>,
        yds: i32,
        two_point_conversion_team: Option<TeamNum>,
    },
    InterceptionReturn {
        clock: f64,
        t: TeamNum,
        names: Vec<String>,
        td: bool,
        touchback: bool,
        yds: i32,
        two_point_conversion_team: Option<TeamNum>,
    },
    Handoff {
        clock: f64,
        t: TeamNum,
        names: Vec<String>,
    },
    Run {
        clock: f64,
        t: TeamNum,
        names: Vec<String>,
        safety: bool,
        td: bool,
        yds: i32,
        two_point_conversion_team: Option<TeamNum>,
    },
    Kneel {
        clock: f64,
        t: TeamNum,
        names: Vec<String>,
        yds: i32,
    },
    Fumble {
        clock: f64,
        t: TeamNum,
        names: Vec<String>,
    },
    FumbleRecovery {
        clock: f64,
        t: TeamNum,
        names: Vec<String>,
        lost: bool,
        safety: bool,
        td: bool,
        touchback: bool,
        yds: i32,
        yds_before: i32,
        two_point_conversion_team: Option<TeamNum>,
    },
    Flag {
        clock: f64,
    },
    Penalty {
        clock: f64,
        t: TeamNum,
        names: Vec<String>,
        name: String,
        yds: i32,
        decision: PenaltyDecision,
        spot_foul: bool,
        tack_on: bool,
        automatic_first_down: bool,
    },
    GoingForItOn4th {
        clock: f64,
        t: TeamNum,
    },
    Injury {
        clock: f64,
        t: TeamNum,
        names: Vec<String>,
        injured_pid: PlayerId,
    },
    TurnoverOnDowns {
        clock: f64,
        t: TeamNum,
    },
    RemoveLastScore {
        clock: f64,
    },
    ShootoutStart {
        clock: f64,
        rounds: u32,
    },
    ShootoutShot {
        clock: f64,
        t: TeamNum,
        names: Vec<String>,
        made: bool,
        att: u32,
        yds: i32,
    },
    ShootoutTie {
        clock: f64,
    },
    GameOver {
        clock: f64,
    },
    /// A stat change. Longest-play entries carry the new longest instead of
    /// a delta; team-only entries have no `pid`.
    Stat {
        t: TeamNum,
        pid: Option<PlayerId>,
        s: Stat,
        amt: f64,
    },
}

impl PlayByPlayEvent {
    /// One line of commentary, or `None` for bookkeeping entries.
    pub fn describe(&self, team_names: &[String; 2]) -> Option<String> {
        use PlayByPlayEvent as E;
        let team = |t: &TeamNum| team_names[t.idx()].as_str();
        let first = |names: &[String]| names.first().cloned().unwrap_or_default();
        let td = |td: bool| if td { " for a touchdown!" } else { "" };
        let line = match self {
            E::Quarter { quarter, .. } => format!("Start of period {quarter}"),
            E::Overtime { overtimes, .. } => format!("Start of overtime {overtimes}"),
            E::Timeout { t, num_left, .. } => format!("Timeout {} ({num_left} left)", team(t)),
            E::TwoMinuteWarning { .. } => "Two minute warning".to_string(),
            E::Kickoff { names, touchback, yds, .. } => {
                if *touchback {
                    format!("{} kicks off for a touchback", first(names))
                } else {
                    format!("{} kicks off to the {yds} yard line", first(names))
                }
            }
            E::KickoffReturn { names, td: t, yds, .. } => {
                format!("{} returns the kickoff {yds} yards{}", first(names), td(*t))
            }
            E::OnsideKick { names, .. } => format!("{} attempts an onside kick", first(names)),
            E::OnsideKickRecovery { t, success, td: scored, .. } => {
                let who = team(t);
                if *success {
                    format!("{who} recovers the onside kick")
                } else {
                    format!("{who} recovers the onside kick attempt{}", td(*scored))
                }
            }
            E::Punt { names, touchback, yds, .. } => {
                let tb = if *touchback { " for a touchback" } else { "" };
                format!("{} punts {yds} yards{tb}", first(names))
            }
            E::PuntReturn { names, td: t, yds, .. } => {
                format!("{} returns the punt {yds} yards{}", first(names), td(*t))
            }
            E::FieldGoal { names, made, yds, .. } => {
                let result = if *made { "made" } else { "missed" };
                format!("{} {result} a {yds} yard field goal", first(names))
            }
            E::ExtraPoint { names, made, .. } => {
                let result = if *made { "made" } else { "missed" };
                format!("{} {result} the extra point", first(names))
            }
            E::TwoPointConversion { t, .. } => format!("{} goes for two", team(t)),
            E::TwoPointConversionFailed { .. } => "Two point conversion failed".to_string(),
            E::Sack { names, yds, safety, .. } => {
                let sft = if *safety { ", safety!" } else { "" };
                format!(
                    "{} sacked by {} for {yds} yards{sft}",
                    first(names),
                    names.get(1).cloned().unwrap_or_default()
                )
            }
            E::PassComplete { names, yds, td: t, .. } => format!(
                "{} completes a pass to {} for {yds} yards{}",
                first(names),
                names.get(1).cloned().unwrap_or_default(),
                td(*t)
            ),
            E::PassIncomplete { names, .. } => format!(
                "Incomplete pass from {} intended for {}",
                first(names),
                names.get(1).cloned().unwrap_or_default()
            ),
            E::Interception { names, .. } => format!("Intercepted by {}", first(names)),
            E::InterceptionReturn { names, yds, td: t, touchback, .. } => {
                if *touchback {
                    format!("{} downs it for a touchback", first(names))
                } else {
                    format!("{} returns it {yds} yards{}", first(names), td(*t))
                }
            }
            E::Run { names, yds, td: t, safety, .. } => {
                let sft = if *safety { ", safety!" } else { "" };
                format!("{} rushes for {yds} yards{}{sft}", first(names), td(*t))
            }
            E::Kneel { names, .. } => format!("{} kneels", first(names)),
            E::Fumble { names, .. } => format!(
                "{} fumbles, forced by {}",
                first(names),
                names.get(1).cloned().unwrap_or_default()
            ),
            E::FumbleRecovery { names, t, yds, td: scored, .. } => format!(
                "{} ({}) recovers and returns it {yds} yards{}",
                first(names),
                team(t),
                td(*scored)
            ),
            E::Penalty { t, name, yds, decision, names, .. } => {
                let who = names.first().map(|n| format!(" on {n}")).unwrap_or_default();
                format!("Penalty, {}: {name}{who}, {yds} yards, {decision:?}", team(t))
            }
            E::GoingForItOn4th { t, .. } => format!("{} goes for it on 4th down", team(t)),
            E::Injury { names, .. } => format!("{} is injured", first(names)),
            E::TurnoverOnDowns { t, .. } => format!("Turnover on downs, {} ball", team(&t.other())),
            E::ShootoutStart { rounds, .. } => format!("Shootout, best of {rounds}"),
            E::ShootoutShot { names, made, .. } => {
                let result = if *made { "makes" } else { "misses" };
                format!("{} {result} the shootout kick", first(names))
            }
            E::ShootoutTie { .. } => "Shootout tied, sudden death".to_string(),
            E::GameOver { .. } => "End of game".to_string(),
            E::Clock { .. }
            | E::Timeouts { .. }
            | E::PuntTeam { .. }
            | E::FieldGoalAttempt { .. }
            | E::ExtraPointAttempt { .. }
            | E::Dropback { .. }
            | E::Handoff { .. }
            | E::Flag { .. }
            | E::RemoveLastScore { .. }
            | E::Stat { .. } => return None,
        };
        Some(line)
    }
}

/// Kinds of scoring play.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ScoreKind {
    Touchdown,
    FieldGoal,
    ExtraPoint,
    TwoPointConversion,
    Safety,
}

impl ScoreKind {
    pub fn points(self) -> u32 {
        match self {
            ScoreKind::Touchdown => 6,
            ScoreKind::FieldGoal => 3,
            ScoreKind::ExtraPoint => 1,
            ScoreKind::TwoPointConversion | ScoreKind::Safety => 2,
        }
    }
}

/// A play that put points on the board, with the score after it.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringPlay {
    pub kind: ScoreKind,
    pub t: TeamNum,
    pub quarter: u32,
    pub clock: f64,
    pub names: Vec<String>,
    pub yds: i32,
    pub pts: u32,
    pub score: [u32; 2],
}

#[derive(Clone, Debug)]
enum ScoreEntry {
    Score(ScoringPlay),
    Removed,
}

/// The play-by-play stream plus the raw scoring log.
#[derive(Clone, Debug, Default)]
pub struct PlayByPlayLog {
    events: Vec<PlayByPlayEvent>,
    scoring: Vec<ScoreEntry>,
    quarter: u32,
}

impl PlayByPlayLog {
    pub fn new() -> Self {
        PlayByPlayLog {
            events: Vec::new(),
            scoring: Vec::new(),
            quarter: 1,
        }
    }

    /// Append an event. Scoring plays are also noted for the summary.
    pub fn log_event(&mut self, event: PlayByPlayEvent) {
        match &event {
            PlayByPlayEvent::Quarter { .. } | PlayByPlayEvent::Overtime { .. } => self.quarter += 1,
            PlayByPlayEvent::RemoveLastScore { .. } => self.scoring.push(ScoreEntry::Removed),
            _ => {
                if let Some(score) = self.scoring_play(&event) {
                    self.scoring.push(ScoreEntry::Score(score));
                }
            }
        }
        self.events.push(event);
    }

    pub fn log_stat(&mut self, t: TeamNum, pid: Option<PlayerId>, s: Stat, amt: f64) {
        self.events.push(PlayByPlayEvent::Stat { t, pid, s, amt });
    }

    /// True if the most recent scoring entry is a score that still stands.
    pub fn last_score_stands(&self) -> bool {
        matches!(self.scoring.last(), Some(ScoreEntry::Score(_)))
    }

    pub fn events(&self) -> &[PlayByPlayEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<PlayByPlayEvent> {
        self.events
    }

    fn scoring_play(&self, event: &PlayByPlayEvent) -> Option<ScoringPlay> {
        use PlayByPlayEvent as E;
        let try_kind = |conversion: &Option<TeamNum>| {
            if conversion.is_some() {
                ScoreKind::TwoPointConversion
            } else {
                ScoreKind::Touchdown
            }
        };
        let (kind, t, clock, names, yds) = match event {
            E::KickoffReturn { td: true, t, clock, names, yds }
            | E::PuntReturn { td: true, t, clock, names, yds } => (ScoreKind::Touchdown, *t, *clock, names, *yds),
            E::OnsideKickRecovery { td: true, t, clock, names, .. } => (ScoreKind::Touchdown, *t, *clock, names, 0),
            E::PassComplete { td: true, t, clock, names, yds, two_point_conversion_team, .. }
            | E::Run { td: true, t, clock, names, yds, two_point_conversion_team, .. }
            | E::InterceptionReturn { td: true, t, clock, names, yds, two_point_conversion_team, .. }
            | E::FumbleRecovery { td: true, t, clock, names, yds, two_point_conversion_team, .. } => {
                (try_kind(two_point_conversion_team), *t, *clock, names, *yds)
            }
            E::FieldGoal { made: true, t, clock, names, yds } => (ScoreKind::FieldGoal, *t, *clock, names, *yds),
            E::ExtraPoint { made: true, t, clock, names, yds } => (ScoreKind::ExtraPoint, *t, *clock, names, *yds),
            E::Sack { safety: true, t, clock, names, yds }
            | E::Run { safety: true, t, clock, names, yds, two_point_conversion_team: None, .. }
            | E::PassComplete { safety: true, t, clock, names, yds, two_point_conversion_team: None, .. }
            | E::FumbleRecovery { safety: true, t, clock, names, yds, two_point_conversion_team: None, .. } => {
                (ScoreKind::Safety, t.other(), *clock, names, *yds)
            }
            _ => return None,
        };
        Some(ScoringPlay {
            kind,
            t,
            quarter: self.quarter,
            clock,
            names: names.clone(),
            yds,
            pts: kind.points(),
            score: [0, 0],
        })
    }

    /// Scoring plays that stood, each with the running score after it.
    pub fn scoring_summary(&self) -> Vec<ScoringPlay> {
        let mut out = Vec::new();
        let mut score = [0u32; 2];
        for (i, entry) in self.scoring.iter().enumerate() {
            let ScoreEntry::Score(play) = entry else {
                continue;
            };
            if matches!(self.scoring.get(i + 1), Some(ScoreEntry::Removed)) {
                continue;
            }
            score[play.t.idx()] += play.pts;
            out.push(ScoringPlay {
                score,
                ..play.clone()
            });
        }
        out
    }
}

/// Rebuild both team stat lines from the stream alone. Minutes and
/// appearance flags are not streamed.
pub fn replay_team_totals(events: &[PlayByPlayEvent]) -> [StatLine; 2] {
    let mut totals = [StatLine::default(), StatLine::default()];
    for event in events {
        if let PlayByPlayEvent::Stat { t, pid, s, amt } = event {
            let line = &mut totals[t.idx()];
            if s.is_lng() {
                if pid.is_none() {
                    line.set(*s, *amt);
                }
            } else {
                line.add(*s, *amt);
            }
        }
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_td(t: TeamNum, clock: f64) -> PlayByPlayEvent {
        PlayByPlayEvent::Run {
            clock,
            t,
            names: vec!["Back".to_string()],
            safety: false,
            td: true,
            yds: 5,
            two_point_conversion_team: None,
        }
    }

    #[test]
    fn removed_scores_drop_out_of_summary() {
        let mut log = PlayByPlayLog::new();
        log.log_event(run_td(TeamNum::Home, 10.0));
        log.log_event(PlayByPlayEvent::ExtraPoint {
            clock: 10.0,
            t: TeamNum::Home,
            names: vec!["Kicker".to_string()],
            made: true,
            yds: 33,
        });
        log.log_event(run_td(TeamNum::Away, 4.0));
        log.log_event(PlayByPlayEvent::RemoveLastScore { clock: 4.0 });
        log.log_event(PlayByPlayEvent::Quarter {
            clock: 15.0,
            quarter: 2,
            starts_with_kickoff: false,
        });
        log.log_event(PlayByPlayEvent::Sack {
            clock: 3.0,
            t: TeamNum::Home,
            names: vec!["QB".to_string(), "End".to_string()],
            safety: true,
            yds: -4,
        });

        let summary = log.scoring_summary();
        let kinds: Vec<ScoreKind> = summary.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![ScoreKind::Touchdown, ScoreKind::ExtraPoint, ScoreKind::Safety]);
        assert_eq!(summary[2].t, TeamNum::Away);
        assert_eq!(summary[2].quarter, 2);
        assert_eq!(summary[2].score, [7, 2]);
    }

    #[test]
    fn defensive_return_on_try_is_two_points() {
        let mut log = PlayByPlayLog::new();
        log.log_event(PlayByPlayEvent::InterceptionReturn {
            clock: 1.0,
            t: TeamNum::Away,
            names: vec!["Corner".to_string()],
            td: true,
            touchback: false,
            yds: 98,
            two_point_conversion_team: Some(TeamNum::Home),
        });
        let summary = log.scoring_summary();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].kind, ScoreKind::TwoPointConversion);
        assert_eq!(summary[0].score, [0, 2]);
    }

    #[test]
    fn safety_on_try_is_not_a_score() {
        let mut log = PlayByPlayLog::new();
        log.log_event(PlayByPlayEvent::Run {
            clock: 1.0,
            t: TeamNum::Home,
            names: vec![],
            safety: true,
            td: false,
            yds: -98,
            two_point_conversion_team: Some(TeamNum::Away),
        });
        assert!(log.scoring_summary().is_empty());
        assert!(!log.last_score_stands());
    }

    #[test]
    fn replay_rebuilds_team_lines() {
        let mut log = PlayByPlayLog::new();
        let pid = Some(PlayerId(3));
        log.log_stat(TeamNum::Home, pid, Stat::RusYds, 12.0);
        log.log_stat(TeamNum::Home, pid, Stat::RusLng, 12.0);
        log.log_stat(TeamNum::Home, None, Stat::RusLng, 12.0);
        log.log_stat(TeamNum::Home, pid, Stat::RusYds, -12.0);
        log.log_stat(TeamNum::Home, None, Stat::RusLng, 0.0);
        log.log_stat(TeamNum::Away, None, Stat::Pts, 3.0);
        let [home, away] = replay_team_totals(log.events());
        assert_eq!(home.get(Stat::RusYds), 0.0);
        assert_eq!(home.get(Stat::RusLng), 0.0);
        assert_eq!(away.get(Stat::Pts), 3.0);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_string(&PlayByPlayEvent::TwoMinuteWarning { clock: 2.0 }).unwrap();
        assert_eq!(json, r#"{"type":"twoMinuteWarning","clock":2.0}"#);
        let json = serde_json::to_string(&PlayByPlayEvent::Timeout {
            clock: 1.5,
            t: TeamNum::Away,
            offense: true,
            num_left: 2,
        })
        .unwrap();
        assert_eq!(
            json,
            r#"{"type":"timeout","clock":1.5,"t":"away","offense":true,"numLeft":2}"#
        );
    }
}
