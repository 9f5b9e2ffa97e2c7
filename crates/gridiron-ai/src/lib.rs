#![deny(warnings)]

//! Play-calling policies.
//!
//! Coaches here only see a [`Situation`]: down and distance, field position,
//! the score from the offense's point of view, the clock and a couple of
//! rating-derived numbers the engine precomputes. Everything is a plain
//! function of that snapshot plus an injected RNG, so each rule can be
//! tested without building a game.

use gridiron_core::{GameConfig, GameRng, OvertimeState, PlayType};
use gridiron_ratings::bound;
use serde::Serialize;
use tracing::debug;

/// What the offense knows when it picks a play.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Situation {
    pub down: u8,
    pub to_go: i32,
    /// Ball position, 0 = own goal line, 100 = opponent's.
    pub scrimmage: i32,
    /// Defense points minus offense points.
    pub pts_down: i32,
    /// 1-based period, overtimes continue the count.
    pub quarter: u32,
    /// Minutes left in the period.
    pub clock: f64,
    pub overtime_state: Option<OvertimeState>,
    pub awaiting_kickoff: bool,
    pub awaiting_after_touchdown: bool,
    pub awaiting_after_safety: bool,
    pub defense_timeouts: u8,
    /// Make probability of a field goal from the current spot.
    pub prob_made_field_goal: f64,
    /// Pass share suggested by the starters' ratings.
    pub pass_tendency: f64,
}

impl Situation {
    fn in_final_period(&self, cfg: &GameConfig) -> bool {
        self.quarter == cfg.num_periods
    }

    fn late(&self, cfg: &GameConfig) -> bool {
        self.quarter >= cfg.num_periods
    }

    fn in_overtime(&self, cfg: &GameConfig) -> bool {
        self.quarter > cfg.num_periods
    }
}

/// Who calls a timeout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TimeoutCaller {
    Offense,
    Defense,
}

/// Try-after-touchdown choice late in a game, keyed on the score margin
/// before the try. `None` means no fixed call; the caller falls back to the
/// usual mix.
pub fn late_game_try(pts_down: i32) -> Option<PlayType> {
    use PlayType::{ExtraPoint, TwoPointConversion};
    match pts_down {
        0 | 1 | 4 | 7 | 8 | 11 | 14 | 15 => Some(ExtraPoint),
        2 | 5 | 10 | 13 | 18 => Some(TwoPointConversion),
        -1 | -5 | -12 => Some(TwoPointConversion),
        -2 | -3 | -6 | -7 | -8 | -9 | -10 | -13 | -14 => Some(ExtraPoint),
        _ => None,
    }
}

/// Chance a kickoff is an onside kick.
pub fn prob_onside(s: &Situation, cfg: &GameConfig) -> f64 {
    if s.awaiting_after_safety {
        return 0.0;
    }
    if s.quarter < cfg.num_periods {
        return 0.001 * cfg.onside_factor;
    }
    if !s.in_final_period(cfg) {
        return 0.0;
    }

    let scores_down = (f64::from(s.pts_down) / 8.0).ceil() as i32;
    if scores_down <= 0 || scores_down >= 4 {
        return 0.0;
    }
    if s.clock < 2.0 {
        1.0
    } else if scores_down >= 2 && s.clock < 2.5 {
        0.9
    } else if scores_down >= 3 && s.clock < 3.5 {
        0.8
    } else if scores_down >= 2 && s.clock < 5.0 {
        f64::from(scores_down) / 20.0
    } else {
        0.0
    }
}

/// True when the offense is trailing late enough that it has to throw.
pub fn is_desperate(s: &Situation, cfg: &GameConfig) -> bool {
    let d = s.pts_down;
    s.scrimmage < 97
        && s.late(cfg)
        && ((s.in_overtime(cfg) && d > 0)
            || (d > 0 && s.clock <= 2.0)
            || (d > 8 && s.clock <= 3.0)
            || (d > 16 && s.clock <= 4.0)
            || (d > 24 && s.clock <= 6.0))
}

/// Chance a scrimmage down is a pass.
pub fn prob_pass(s: &Situation, cfg: &GameConfig) -> f64 {
    if is_desperate(s, cfg) {
        return 0.98 * cfg.pass_factor;
    }
    let mut odds = s.pass_tendency;
    if s.scrimmage >= 95 {
        // Running gets more attractive the closer the goal line is.
        odds /= f64::from(s.scrimmage - 94);
    }
    odds * cfg.pass_factor
}

/// True when kneeling out the remaining downs runs out the clock.
pub fn should_kneel(s: &Situation, cfg: &GameConfig) -> bool {
    if !(s.late(cfg) && s.pts_down < 0 && s.scrimmage > 10) {
        return false;
    }
    let downs_remaining = 4 - i32::from(s.down);
    let timeout_downs = (i32::from(s.defense_timeouts) + i32::from(s.clock > 2.0)).min(downs_remaining);
    let running_downs = downs_remaining - timeout_downs;
    let time_after = s.clock - f64::from(timeout_downs * 2 + running_downs * 42) / 60.0;
    time_after < 0.0
}

/// A field goal would not be enough.
pub fn needs_touchdown(s: &Situation, cfg: &GameConfig) -> bool {
    s.late(cfg)
        && s.pts_down > 3
        && (s.clock <= 2.0 || s.overtime_state == Some(OvertimeState::SecondPossession))
}

/// Punting would concede the game.
pub fn never_punt(s: &Situation, cfg: &GameConfig) -> bool {
    (s.in_final_period(cfg) && s.pts_down > 0 && s.clock <= 2.0)
        || (s.in_overtime(cfg) && s.pts_down > 0)
}

/// Chance of going for it on fourth down, before any kick is considered.
pub fn go_for_it_probability(s: &Situation, cfg: &GameConfig) -> f64 {
    let tied_and_in_range = s.overtime_state != Some(OvertimeState::FirstPossession)
        && s.pts_down == 0
        && s.prob_made_field_goal >= 0.7;
    let base = if tied_and_in_range || s.scrimmage < 40 {
        0.0
    } else {
        match s.to_go {
            i32::MIN..=1 => 0.75,
            2 => 0.5,
            3 => 0.35,
            4 => 0.2,
            5 => 0.05,
            6..=7 => 0.01,
            8..=10 => 0.001,
            _ => 0.0,
        }
    };
    (base * cfg.fourth_down_factor).min(0.99)
}

/// Offense saves clock between plays.
pub fn hurry_up(s: &Situation, cfg: &GameConfig) -> bool {
    ((cfg.kickoff_after_end_of_period(s.quarter) && s.scrimmage >= 50)
        || (s.in_final_period(cfg) && s.pts_down >= 0))
        && s.clock <= 2.0
}

/// Late-game timeout with the clock running. `clock` is read before the
/// play's time comes off.
pub fn late_timeout(s: &Situation, cfg: &GameConfig, clock_running: bool) -> Option<TimeoutCaller> {
    if !cfg.kickoff_after_end_of_period(s.quarter) || !clock_running {
        return None;
    }
    let lead = -s.pts_down;
    // No point in the last period of a blowout.
    if lead >= 24 && s.quarter >= cfg.num_periods {
        return None;
    }
    if lead > 0 {
        (s.clock < 2.5).then_some(TimeoutCaller::Defense)
    } else {
        (s.clock < 1.5).then_some(TimeoutCaller::Offense)
    }
}

fn choose_try<R: GameRng + ?Sized>(s: &Situation, cfg: &GameConfig, rng: &mut R) -> PlayType {
    if s.pts_down == 2 && rng.chance(0.7) {
        return PlayType::TwoPointConversion;
    }
    if s.quarter + 1 >= cfg.num_periods {
        if let Some(call) = late_game_try(s.pts_down) {
            return call;
        }
    }
    if rng.chance(0.95) {
        PlayType::ExtraPoint
    } else {
        PlayType::TwoPointConversion
    }
}

fn choose_fourth_down<R: GameRng + ?Sized>(
    s: &Situation,
    cfg: &GameConfig,
    rng: &mut R,
) -> Option<PlayType> {
    let p_fg = s.prob_made_field_goal;
    let d = s.pts_down;
    if p_fg >= 0.5
        && s.in_final_period(cfg)
        && s.clock <= 6.0
        && ((0..=2).contains(&d) || (-8..=-4).contains(&d))
    {
        return Some(PlayType::FieldGoal);
    }

    let go = go_for_it_probability(s, cfg);
    if rng.uniform() <= go {
        return None;
    }
    if p_fg >= 0.7 {
        return Some(PlayType::FieldGoal);
    }
    if rng.chance(bound((p_fg - 0.3) / 0.5, 0.0, 1.0)) {
        return Some(PlayType::FieldGoal);
    }
    (!never_punt(s, cfg)).then_some(PlayType::Punt)
}

/// Pick the next play.
pub fn choose_play_type<R: GameRng + ?Sized>(s: &Situation, cfg: &GameConfig, rng: &mut R) -> PlayType {
    let call = if s.awaiting_kickoff {
        if rng.chance(prob_onside(s, cfg)) {
            PlayType::OnsideKick
        } else {
            PlayType::Kickoff
        }
    } else if s.awaiting_after_touchdown {
        choose_try(s, cfg, rng)
    } else if should_kneel(s, cfg) {
        PlayType::Kneel
    } else {
        scrimmage_call(s, cfg, rng)
    };
    debug!(?call, down = s.down, to_go = s.to_go, scrimmage = s.scrimmage, "play call");
    call
}

fn scrimmage_call<R: GameRng + ?Sized>(s: &Situation, cfg: &GameConfig, rng: &mut R) -> PlayType {
    let need_td = needs_touchdown(s, cfg);
    let p_fg = s.prob_made_field_goal;

    if s.clock <= 10.0 / 60.0 && cfg.kickoff_after_end_of_period(s.quarter) && !need_td && p_fg >= 0.02 {
        return PlayType::FieldGoalLate;
    }

    if matches!(
        s.overtime_state,
        Some(OvertimeState::SecondPossession) | Some(OvertimeState::BothTeamsPossessed)
    ) && s.pts_down < 3
        && p_fg >= 0.9
    {
        return PlayType::FieldGoal;
    }

    if s.down == 4 && !need_td {
        if let Some(kick) = choose_fourth_down(s, cfg, rng) {
            return kick;
        }
    }

    if rng.chance(prob_pass(s, cfg)) {
        PlayType::Pass
    } else {
        PlayType::Run
    }
}
