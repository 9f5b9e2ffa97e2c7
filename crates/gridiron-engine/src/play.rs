//! One play as a sequence of events over two state snapshots.
//!
//! `initial` is the situation at the snap and never changes. `current` is
//! advanced by every [`PlayEvent`] the game adds. Each event also yields the
//! stat changes it implies; they are kept per event so that an accepted
//! penalty can take back exactly the part of the play it wipes out.

use gridiron_core::{
    OvertimeState, TeamNum, SCRIMMAGE_KICKOFF, SCRIMMAGE_TOUCHBACK, SCRIMMAGE_TOUCHBACK_KICKOFF,
};

use crate::penalty::{enforce, value_for, PenaltyCall};
use crate::play_by_play::PenaltyDecision;
use crate::roster::PlayerRef;
use crate::stats::Stat;

/// Most fumbles resolved on one play. Further ones are not rolled.
pub const MAX_FUMBLES_PER_PLAY: u32 = 3;

/// Down, distance, possession and score between plays.
#[derive(Clone, Debug, PartialEq)]
pub struct PlayState {
    pub down: u8,
    pub to_go: i32,
    /// Ball position from the offense's point of view.
    pub scrimmage: i32,
    pub o: TeamNum,
    pub d: TeamNum,
    pub pts: [u32; 2],
    /// Team that will receive the next kickoff.
    pub awaiting_kickoff: Option<TeamNum>,
    pub awaiting_after_safety: bool,
    pub awaiting_after_touchdown: bool,
    pub overtime_state: Option<OvertimeState>,
    /// Set while a two-point try is being run.
    pub two_point_conversion_team: Option<TeamNum>,
}

impl PlayState {
    /// Opening kickoff to `receiving`.
    pub fn kickoff(receiving: TeamNum) -> Self {
        PlayState {
            down: 1,
            to_go: 10,
            scrimmage: SCRIMMAGE_KICKOFF,
            o: receiving.other(),
            d: receiving,
            pts: [0, 0],
            awaiting_kickoff: Some(receiving),
            awaiting_after_safety: false,
            awaiting_after_touchdown: false,
            overtime_state: None,
            two_point_conversion_team: None,
        }
    }

    /// Same situation with `o` in possession and no kickoff pending.
    pub fn with_ball(mut self, o: TeamNum) -> Self {
        self.o = o;
        self.d = o.other();
        self.awaiting_kickoff = None;
        self
    }

    fn first_and_ten(&mut self) {
        self.down = 1;
        self.to_go = 10.min(100 - self.scrimmage);
    }

    fn change_possession(&mut self) {
        std::mem::swap(&mut self.o, &mut self.d);
        self.scrimmage = 100 - self.scrimmage;
        self.first_and_ten();
        if self.two_point_conversion_team.is_none() {
            self.overtime_state = self.overtime_state.map(OvertimeState::after_possession_change);
        }
    }

    fn in_try(&self) -> bool {
        self.two_point_conversion_team.is_some()
    }

    /// Overtime ends on a touchdown or safety during the first possession,
    /// or on any score that puts the second team ahead.
    fn settle_overtime(&mut self, scorer: TeamNum, touchdown_or_safety: bool) {
        let leads = self.pts[scorer.idx()] > self.pts[scorer.other().idx()];
        match self.overtime_state {
            Some(OvertimeState::InitialKickoff | OvertimeState::FirstPossession) if touchdown_or_safety => {
                self.overtime_state = Some(OvertimeState::Over);
            }
            Some(OvertimeState::SecondPossession) if leads => {
                self.overtime_state = Some(OvertimeState::Over);
            }
            _ => {}
        }
    }

    fn score(&mut self, scorer: TeamNum, pts: u32, touchdown_or_safety: bool) {
        self.pts[scorer.idx()] += pts;
        self.settle_overtime(scorer, touchdown_or_safety);
    }
}

/// Something that happens during a play.
#[derive(Clone, Debug, PartialEq)]
pub enum PlayEvent {
    Kickoff { kicker: PlayerRef, kick_to: i32 },
    TouchbackKick { kicker: PlayerRef },
    KickReturn { p: PlayerRef, yds: i32 },
    KrTd { p: PlayerRef },
    OnsideKick { kicker: PlayerRef, kick_to: i32 },
    OnsideKickRecovery { success: bool, p: PlayerRef, yds: i32 },
    Punt { p: PlayerRef, yds: i32 },
    TouchbackPunt { p: PlayerRef },
    PuntReturn { p: PlayerRef, yds: i32 },
    PrTd { p: PlayerRef },
    Rush { p: PlayerRef, yds: i32, out_of_bounds: bool },
    RushTd { p: PlayerRef },
    Kneel { p: PlayerRef, yds: i32 },
    Dropback,
    Pass { qb: PlayerRef, target: PlayerRef },
    Completion { qb: PlayerRef, target: PlayerRef, yds: i32, out_of_bounds: bool },
    Incomplete { defender: Option<PlayerRef> },
    PassTd { qb: PlayerRef, target: PlayerRef },
    Sack { qb: PlayerRef, p: PlayerRef, yds: i32 },
    Interception { qb: PlayerRef, defender: PlayerRef, yds_return: i32 },
    TouchbackInt,
    IntTd { p: PlayerRef },
    Fumble { fumbled: PlayerRef, forced: PlayerRef, yds: i32 },
    FumbleRecovery { fumbled: PlayerRef, recovered: PlayerRef, yds: i32, lost: bool },
    FumbleTd { p: PlayerRef, lost: bool },
    /// A miss turns the ball over at the spot of the kick.
    FieldGoal { p: PlayerRef, made: bool, distance: i32 },
    ExtraPoint { p: PlayerRef, made: bool, distance: i32 },
    Safety { p: PlayerRef },
    /// The ball changes hands `yds` past the current spot.
    PossessionChange { yds: i32 },
    TwoPointConversion { t: TeamNum },
    TwoPointConversionDone { t: TeamNum },
    Tackle { tacklers: Vec<PlayerRef>, loss: bool },
}

/// What the caller needs to know to keep resolving the play.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EventOutcome {
    pub td: bool,
    pub safety: bool,
    pub touchback: bool,
}

/// A stat change implied by an event. `p: None` is a team-only stat.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StatDelta {
    pub t: TeamNum,
    pub p: Option<PlayerRef>,
    pub stat: Stat,
    pub amt: f64,
}

#[derive(Clone, Debug)]
struct Step {
    event: PlayEvent,
    deltas: Vec<StatDelta>,
}

#[derive(Clone, Debug)]
struct Flag {
    call: PenaltyCall,
    /// State when the flag was thrown.
    base: PlayState,
    /// Events added before the flag.
    step_index: usize,
}

/// How a play ended once penalties were sorted out.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    pub state: PlayState,
    /// Stat changes to take back, in the order they were made.
    pub undone: Vec<StatDelta>,
    pub penalties: Vec<(PenaltyCall, PenaltyDecision)>,
    pub accepted: Option<PenaltyCall>,
    pub clock_running: bool,
    pub turnover_on_downs: bool,
    /// Another snap is owed even though time ran out.
    pub untimed_down: bool,
    /// A score made during the play was wiped out.
    pub score_negated: bool,
}

/// A play being resolved.
#[derive(Clone, Debug)]
pub struct Play {
    pub initial: PlayState,
    pub current: PlayState,
    steps: Vec<Step>,
    flags: Vec<Flag>,
    snapped: bool,
    clock_stopped: bool,
    fumbles: u32,
}

impl Play {
    pub fn new(state: PlayState) -> Self {
        Play {
            initial: state.clone(),
            current: state,
            steps: Vec::new(),
            flags: Vec::new(),
            snapped: false,
            clock_stopped: false,
            fumbles: 0,
        }
    }

    /// Clamp a gain so the ball stays between the goal lines.
    pub fn bounded_yds(&self, raw: i32) -> i32 {
        raw.clamp(-self.current.scrimmage, 100 - self.current.scrimmage)
    }

    pub fn num_penalties(&self) -> usize {
        self.flags.len()
    }

    /// False once the per-play fumble limit is reached.
    pub fn can_fumble(&self) -> bool {
        self.fumbles < MAX_FUMBLES_PER_PLAY
    }

    pub fn events(&self) -> impl Iterator<Item = &PlayEvent> + '_ {
        self.steps.iter().map(|s| &s.event)
    }

    pub fn add_penalty(&mut self, call: PenaltyCall) {
        self.flags.push(Flag {
            call,
            base: self.current.clone(),
            step_index: self.steps.len(),
        });
    }

    /// Apply `event` to the current state. Returns the branch flags and the
    /// stat changes to record.
    pub fn add_event(&mut self, event: PlayEvent) -> (EventOutcome, Vec<StatDelta>) {
        let before = self.current.clone();
        let outcome = self.apply(&event);
        let deltas = stat_deltas(&event, &before);
        self.steps.push(Step {
            event,
            deltas: deltas.clone(),
        });
        (outcome, deltas)
    }

    fn apply(&mut self, event: &PlayEvent) -> EventOutcome {
        use PlayEvent as E;
        let mut out = EventOutcome::default();
        let s = &mut self.current;

        match event {
            E::Kickoff { kick_to, .. } | E::OnsideKick { kick_to, .. } => {
                s.scrimmage = 100 - kick_to;
                s.awaiting_kickoff = None;
                s.awaiting_after_safety = false;
            }
            E::PossessionChange { yds } => {
                s.scrimmage += yds;
                s.change_possession();
            }
            E::TouchbackKick { .. } => {
                s.scrimmage = SCRIMMAGE_TOUCHBACK_KICKOFF;
                s.first_and_ten();
            }
            E::TouchbackPunt { .. } | E::TouchbackInt => {
                s.scrimmage = SCRIMMAGE_TOUCHBACK;
                s.first_and_ten();
            }
            E::KickReturn { yds, .. } | E::PuntReturn { yds, .. } | E::OnsideKickRecovery { yds, .. } => {
                s.scrimmage += yds;
                if s.scrimmage >= 100 {
                    out.td = true;
                } else if s.scrimmage <= 0 {
                    out.touchback = true;
                    s.scrimmage = SCRIMMAGE_TOUCHBACK;
                }
                s.first_and_ten();
            }
            E::Punt { yds, .. } => {
                s.scrimmage += yds;
                out.touchback = s.scrimmage >= 100;
            }
            E::Rush { yds, out_of_bounds, .. } | E::Completion { yds, out_of_bounds, .. } => {
                if *out_of_bounds {
                    self.clock_stopped = true;
                }
                if matches!(event, E::Rush { .. }) {
                    self.snapped = true;
                }
                out = advance(s, *yds);
            }
            E::Sack { yds, .. } => out = advance(s, *yds),
            E::Kneel { yds, .. } => {
                self.snapped = true;
                out = advance(s, *yds);
            }
            E::Dropback => self.snapped = true,
            E::Incomplete { .. } => self.clock_stopped = true,
            E::Interception { yds_return, .. } => {
                s.scrimmage += yds_return;
                if s.scrimmage >= 100 {
                    out.td = true;
                } else if s.scrimmage <= 0 {
                    out.touchback = true;
                }
            }
            E::Fumble { yds, .. } => {
                self.fumbles += 1;
                s.scrimmage += yds;
            }
            E::FumbleRecovery { yds, lost, .. } => {
                s.scrimmage += yds;
                if s.scrimmage >= 100 {
                    out.td = true;
                } else if s.scrimmage <= 0 {
                    if *lost {
                        out.touchback = true;
                        s.scrimmage = SCRIMMAGE_TOUCHBACK;
                        s.first_and_ten();
                    } else {
                        out.safety = true;
                    }
                }
            }
            E::KrTd { .. } | E::PrTd { .. } | E::RushTd { .. } | E::PassTd { .. } | E::IntTd { .. } | E::FumbleTd { .. } => {
                let scorer = s.o;
                if s.in_try() {
                    s.score(scorer, 2, false);
                } else {
                    s.score(scorer, 6, true);
                    s.awaiting_after_touchdown = true;
                }
            }
            E::FieldGoal { made, .. } => {
                if *made {
                    let scorer = s.o;
                    s.awaiting_kickoff = Some(s.d);
                    s.score(scorer, 3, false);
                } else {
                    s.scrimmage -= 7;
                    s.change_possession();
                    s.scrimmage = s.scrimmage.max(SCRIMMAGE_TOUCHBACK);
                    s.first_and_ten();
                }
            }
            E::ExtraPoint { made, .. } => {
                s.awaiting_after_touchdown = false;
                s.awaiting_kickoff = Some(s.d);
                if *made {
                    let scorer = s.o;
                    s.score(scorer, 1, false);
                }
            }
            E::Safety { .. } => {
                if !s.in_try() {
                    let scorer = s.d;
                    s.awaiting_kickoff = Some(scorer);
                    s.awaiting_after_safety = true;
                    s.score(scorer, 2, true);
                }
            }
            E::TwoPointConversion { t } => {
                s.two_point_conversion_team = Some(*t);
                s.awaiting_after_touchdown = false;
            }
            E::TwoPointConversionDone { t } => {
                s.two_point_conversion_team = None;
                s.awaiting_kickoff = Some(t.other());
            }
            E::Pass { .. } | E::Tackle { .. } => {}
        }
        out
    }

    /// Current state with the down and distance moved on, when the play was
    /// a snap that kept the ball with the same team and scored nothing.
    fn progressed(&self) -> (PlayState, bool) {
        let mut s = self.current.clone();
        let i = &self.initial;
        let keeps_downs = self.snapped
            && s.o == i.o
            && s.pts == i.pts
            && s.awaiting_kickoff.is_none()
            && !s.awaiting_after_touchdown
            && !s.in_try()
            && i.two_point_conversion_team.is_none();
        if !keeps_downs {
            return (s, false);
        }

        let line_to_gain = i.scrimmage + i.to_go;
        if s.scrimmage >= line_to_gain {
            s.first_and_ten();
            (s, false)
        } else if i.down >= 4 {
            s.change_possession();
            (s, true)
        } else {
            s.down = i.down + 1;
            s.to_go = line_to_gain - s.scrimmage;
            (s, false)
        }
    }

    fn deltas_from(&self, step_index: usize) -> Vec<StatDelta> {
        self.steps[step_index..].iter().flat_map(|s| s.deltas.iter().copied()).collect()
    }

    /// Settle penalties and the down, and say what the game must undo.
    pub fn commit(self, time_expired: bool) -> Resolution {
        let (declined, declined_turnover) = self.progressed();
        let offsetting = self.flags.iter().any(|f| f.call.t == self.initial.o)
            && self.flags.iter().any(|f| f.call.t == self.initial.d);

        let mut penalties = Vec::with_capacity(self.flags.len());
        let mut accepted = None;
        let mut turnover_on_downs = declined_turnover;
        let mut undone = Vec::new();
        let state;

        if offsetting {
            state = self.initial.clone();
            undone = self.deltas_from(0);
            turnover_on_downs = false;
            for f in &self.flags {
                penalties.push((f.call.clone(), PenaltyDecision::Offsetting));
            }
        } else if let Some(first) = self.flags.first() {
            let offended = first.call.t.other();
            let mut best: Option<(usize, PlayState, usize)> = None;
            let mut best_value = value_for(&declined, offended);
            for (i, f) in self.flags.iter().enumerate() {
                let (enforced, undo_from) = if f.call.tack_on {
                    // Enforced from the end of the play, which stands.
                    let call = PenaltyCall {
                        spot_yds: None,
                        ..f.call.clone()
                    };
                    (enforce(&declined, &call, &self.initial), self.steps.len())
                } else {
                    (enforce(&f.base, &f.call, &self.initial), f.step_index)
                };
                let v = value_for(&enforced, offended);
                if v > best_value {
                    best_value = v;
                    best = Some((i, enforced, undo_from));
                }
            }

            match best {
                Some((i, enforced, undo_from)) => {
                    state = enforced;
                    undone = self.deltas_from(undo_from);
                    if undo_from < self.steps.len() {
                        turnover_on_downs = false;
                    }
                    for (j, f) in self.flags.iter().enumerate() {
                        let decision = if j == i {
                            PenaltyDecision::Accepted
                        } else {
                            PenaltyDecision::Declined
                        };
                        penalties.push((f.call.clone(), decision));
                    }
                    accepted = Some(self.flags[i].call.clone());
                }
                None => {
                    state = declined;
                    for f in &self.flags {
                        penalties.push((f.call.clone(), PenaltyDecision::Declined));
                    }
                }
            }
        } else {
            state = declined;
        }

        let clock_running = !(self.clock_stopped
            || offsetting
            || accepted.is_some()
            || state.o != self.initial.o
            || state.pts != self.initial.pts
            || state.awaiting_kickoff.is_some()
            || state.awaiting_after_touchdown
            || self.initial.awaiting_kickoff.is_some());
        let untimed_down = time_expired
            && (offsetting || accepted.as_ref().is_some_and(|c| c.t == self.initial.d));
        let score_negated = state.pts != self.current.pts;

        Resolution {
            state,
            undone,
            penalties,
            accepted,
            clock_running,
            turnover_on_downs,
            untimed_down,
            score_negated,
        }
    }
}

/// Move the ball for a scrimmage play and flag a touchdown or safety.
fn advance(s: &mut PlayState, yds: i32) -> EventOutcome {
    s.scrimmage += yds;
    EventOutcome {
        td: s.scrimmage >= 100,
        safety: s.scrimmage <= 0,
        touchback: false,
    }
}

fn stat_deltas(event: &PlayEvent, before: &PlayState) -> Vec<StatDelta> {
    use PlayEvent as E;

    if let Some(try_team) = before.two_point_conversion_team {
        // Only points count on a try.
        let scorer = match event {
            E::RushTd { p }
            | E::PassTd { target: p, .. }
            | E::IntTd { p }
            | E::FumbleTd { p, .. }
            | E::KrTd { p }
            | E::PrTd { p } => p.t,
            _ => return Vec::new(),
        };
        let mut out = Vec::new();
        if scorer == try_team {
            out.push(team_stat(scorer, Stat::TwoPt, 1.0));
        }
        out.push(team_stat(scorer, Stat::Pts, 2.0));
        return out;
    }
    if let E::TwoPointConversion { t } = event {
        return vec![team_stat(*t, Stat::TwoPta, 1.0)];
    }

    let mut out = Vec::new();
    let mut player = |p: PlayerRef, stat: Stat, amt: f64| {
        out.push(StatDelta {
            t: p.t,
            p: Some(p),
            stat,
            amt,
        })
    };

    let mut pts = None;
    match event {
        E::Kickoff { kicker, kick_to } | E::OnsideKick { kicker, kick_to } => {
            player(*kicker, Stat::Ko, 1.0);
            player(*kicker, Stat::KoYds, f64::from(100 - before.scrimmage - kick_to));
        }
        E::TouchbackKick { kicker } => player(*kicker, Stat::KoTb, 1.0),
        E::KickReturn { p, yds } => {
            player(*p, Stat::Kr, 1.0);
            player(*p, Stat::KrYds, f64::from(*yds));
            player(*p, Stat::KrLng, f64::from(*yds));
        }
        E::OnsideKickRecovery { success: false, p, yds } => {
            player(*p, Stat::Kr, 1.0);
            player(*p, Stat::KrYds, f64::from(*yds));
            player(*p, Stat::KrLng, f64::from(*yds));
        }
        E::Punt { p, yds } => {
            player(*p, Stat::Pnt, 1.0);
            player(*p, Stat::PntYds, f64::from(*yds));
            player(*p, Stat::PntLng, f64::from(*yds));
        }
        E::TouchbackPunt { p } => player(*p, Stat::PntTb, 1.0),
        E::PuntReturn { p, yds } => {
            player(*p, Stat::Pr, 1.0);
            player(*p, Stat::PrYds, f64::from(*yds));
            player(*p, Stat::PrLng, f64::from(*yds));
        }
        E::Rush { p, yds, .. } | E::Kneel { p, yds } => {
            player(*p, Stat::Rus, 1.0);
            player(*p, Stat::RusYds, f64::from(*yds));
            player(*p, Stat::RusLng, f64::from(*yds));
        }
        E::Pass { qb, target } => {
            player(*qb, Stat::Pss, 1.0);
            player(*target, Stat::Tgt, 1.0);
        }
        E::Completion { qb, target, yds, .. } => {
            player(*qb, Stat::PssCmp, 1.0);
            player(*qb, Stat::PssYds, f64::from(*yds));
            player(*qb, Stat::PssLng, f64::from(*yds));
            player(*target, Stat::Rec, 1.0);
            player(*target, Stat::RecYds, f64::from(*yds));
            player(*target, Stat::RecLng, f64::from(*yds));
        }
        E::Incomplete { defender: Some(p) } => player(*p, Stat::DefPssDef, 1.0),
        E::Sack { qb, p, yds } => {
            player(*qb, Stat::PssSk, 1.0);
            player(*qb, Stat::PssSkYds, f64::from(-yds));
            player(*p, Stat::DefSk, 1.0);
        }
        E::Interception { qb, defender, yds_return } => {
            player(*qb, Stat::PssInt, 1.0);
            player(*defender, Stat::DefInt, 1.0);
            player(*defender, Stat::DefIntYds, f64::from(*yds_return));
            player(*defender, Stat::DefIntLng, f64::from(*yds_return));
        }
        E::Fumble { fumbled, forced, .. } => {
            player(*fumbled, Stat::Fmb, 1.0);
            player(*forced, Stat::DefFmbFrc, 1.0);
        }
        E::FumbleRecovery { fumbled, recovered, yds, lost } => {
            if *lost {
                player(*fumbled, Stat::FmbLost, 1.0);
                player(*recovered, Stat::DefFmbRec, 1.0);
                player(*recovered, Stat::DefFmbYds, f64::from(*yds));
            } else {
                player(*recovered, Stat::FmbRec, 1.0);
            }
        }
        E::KrTd { p } => {
            player(*p, Stat::KrTd, 1.0);
            pts = Some((p.t, 6.0));
        }
        E::PrTd { p } => {
            player(*p, Stat::PrTd, 1.0);
            pts = Some((p.t, 6.0));
        }
        E::RushTd { p } => {
            player(*p, Stat::RusTd, 1.0);
            pts = Some((p.t, 6.0));
        }
        E::PassTd { qb, target } => {
            player(*qb, Stat::PssTd, 1.0);
            player(*target, Stat::RecTd, 1.0);
            pts = Some((qb.t, 6.0));
        }
        E::IntTd { p } => {
            player(*p, Stat::DefIntTd, 1.0);
            pts = Some((p.t, 6.0));
        }
        E::FumbleTd { p, lost } => {
            player(*p, if *lost { Stat::DefFmbTd } else { Stat::FmbTd }, 1.0);
            pts = Some((p.t, 6.0));
        }
        E::FieldGoal { p, made, distance } => {
            player(*p, Stat::Fga, 1.0);
            if *made {
                player(*p, Stat::Fg, 1.0);
                player(*p, Stat::FgLng, f64::from(*distance));
                pts = Some((p.t, 3.0));
            }
        }
        E::ExtraPoint { p, made, .. } => {
            player(*p, Stat::Xpa, 1.0);
            if *made {
                player(*p, Stat::Xp, 1.0);
                pts = Some((p.t, 1.0));
            }
        }
        E::Safety { p } => {
            player(*p, Stat::DefSft, 1.0);
            pts = Some((p.t, 2.0));
        }
        E::Tackle { tacklers, loss } => {
            let stat = if tacklers.len() > 1 {
                Stat::DefTckAst
            } else {
                Stat::DefTckSolo
            };
            for p in tacklers {
                player(*p, stat, 1.0);
                if *loss {
                    player(*p, Stat::DefTckLoss, 1.0);
                }
            }
        }
        E::OnsideKickRecovery { success: true, .. }
        | E::TwoPointConversion { .. }
        | E::Incomplete { defender: None }
        | E::Dropback
        | E::TouchbackInt
        | E::PossessionChange { .. }
        | E::TwoPointConversionDone { .. } => {}
    }
    if let Some((t, amt)) = pts {
        out.push(team_stat(t, Stat::Pts, amt));
    }
    out
}

fn team_stat(t: TeamNum, stat: Stat, amt: f64) -> StatDelta {
    StatDelta { t, p: None, stat, amt }
}
