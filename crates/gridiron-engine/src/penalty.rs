//! Penalty catalogue, flag draws and enforcement.
//!
//! Flags are drawn while a play is being resolved, before the events they
//! could wipe out are added. Enforcement and the accept/decline choice
//! happen when the play is committed (see [`crate::play::Play::commit`]).

use gridiron_core::{GameRng, Position, TeamNum};
use serde::Serialize;

use crate::play::PlayState;
use crate::roster::PlayerRef;

/// Most flags adjudicated on a single play.
pub const MAX_PENALTIES_PER_PLAY: usize = 2;

/// Moments in a play at which flags can be thrown.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PenaltyPlayType {
    BeforeSnap,
    KickoffReturn,
    Punt,
    PuntReturn,
    FieldGoal,
    Run,
    Pass,
}

impl PenaltyPlayType {
    fn is_return(self) -> bool {
        matches!(self, PenaltyPlayType::KickoffReturn | PenaltyPlayType::PuntReturn)
    }
}

/// Which unit commits a foul, relative to the team with the ball.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Side {
    Offense,
    Defense,
}

/// One entry of the penalty catalogue.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PenaltyDef {
    pub name: &'static str,
    pub side: Side,
    pub play_types: &'static [PenaltyPlayType],
    /// Chance per eligible play, before the league foul rate.
    pub prob: f64,
    pub yds: i32,
    pub spot_foul: bool,
    pub tack_on: bool,
    pub auto_first_down: bool,
    /// Relative odds of the foul being on a player at each position. Empty
    /// for team fouls.
    pub pos_odds: &'static [(Position, f64)],
}

const fn foul(
    name: &'static str,
    side: Side,
    play_types: &'static [PenaltyPlayType],
    prob: f64,
    yds: i32,
    pos_odds: &'static [(Position, f64)],
) -> PenaltyDef {
    PenaltyDef {
        name,
        side,
        play_types,
        prob,
        yds,
        spot_foul: false,
        tack_on: false,
        auto_first_down: false,
        pos_odds,
    }
}

const fn spot(def: PenaltyDef) -> PenaltyDef {
    PenaltyDef {
        spot_foul: true,
        ..def
    }
}

const fn first_down(def: PenaltyDef) -> PenaltyDef {
    PenaltyDef {
        auto_first_down: true,
        ..def
    }
}

const fn tack_on(def: PenaltyDef) -> PenaltyDef {
    PenaltyDef { tack_on: true, ..def }
}

use PenaltyPlayType as Pt;
use Position::{CB, DL, LB, OL, RB, S, TE, WR};

const SCRIMMAGE: &[PenaltyPlayType] = &[Pt::Run, Pt::Pass];
const RETURNS: &[PenaltyPlayType] = &[Pt::KickoffReturn, Pt::PuntReturn];
const FRONT: &[(Position, f64)] = &[(DL, 0.7), (LB, 0.3)];
const SECONDARY: &[(Position, f64)] = &[(CB, 0.6), (S, 0.3), (LB, 0.1)];
const DEFENDERS: &[(Position, f64)] = &[(DL, 0.4), (LB, 0.3), (CB, 0.15), (S, 0.15)];
const BLOCKERS: &[(Position, f64)] = &[(OL, 0.8), (TE, 0.15), (RB, 0.05)];
const COVERAGE_UNIT: &[(Position, f64)] = &[(LB, 0.4), (S, 0.3), (CB, 0.2), (WR, 0.1)];
const RETURN_UNIT: &[(Position, f64)] = &[(WR, 0.3), (TE, 0.3), (LB, 0.2), (RB, 0.1), (S, 0.1)];

/// Every foul the engine can call.
pub const PENALTIES: [PenaltyDef; 19] = [
    foul("False start", Side::Offense, &[Pt::BeforeSnap], 0.006, 5, &[(OL, 0.8), (TE, 0.1), (WR, 0.1)]),
    foul("Delay of game", Side::Offense, &[Pt::BeforeSnap], 0.002, 5, &[]),
    foul("Illegal formation", Side::Offense, &[Pt::BeforeSnap], 0.001, 5, &[(OL, 0.5), (WR, 0.3), (TE, 0.2)]),
    foul("Encroachment", Side::Defense, &[Pt::BeforeSnap], 0.001, 5, FRONT),
    foul("Neutral zone infraction", Side::Defense, &[Pt::BeforeSnap], 0.001, 5, FRONT),
    foul("Offside", Side::Defense, SCRIMMAGE, 0.004, 5, FRONT),
    spot(foul("Holding", Side::Offense, SCRIMMAGE, 0.01, 10, BLOCKERS)),
    foul("Offensive pass interference", Side::Offense, &[Pt::Pass], 0.002, 10, &[(WR, 0.7), (TE, 0.2), (RB, 0.1)]),
    first_down(spot(foul("Pass interference", Side::Defense, &[Pt::Pass], 0.004, 0, SECONDARY))),
    first_down(foul("Defensive holding", Side::Defense, &[Pt::Pass], 0.004, 5, SECONDARY)),
    first_down(foul("Illegal use of hands", Side::Defense, SCRIMMAGE, 0.002, 5, &[(DL, 0.6), (LB, 0.2), (CB, 0.2)])),
    first_down(tack_on(foul("Roughing the passer", Side::Defense, &[Pt::Pass], 0.001, 15, FRONT))),
    first_down(tack_on(foul("Face mask", Side::Defense, SCRIMMAGE, 0.001, 15, DEFENDERS))),
    first_down(tack_on(foul("Unnecessary roughness", Side::Defense, SCRIMMAGE, 0.001, 15, DEFENDERS))),
    spot(foul("Illegal block in the back", Side::Offense, RETURNS, 0.01, 10, RETURN_UNIT)),
    spot(foul("Holding", Side::Offense, RETURNS, 0.01, 10, RETURN_UNIT)),
    tack_on(foul("Face mask", Side::Defense, RETURNS, 0.001, 15, COVERAGE_UNIT)),
    first_down(foul("Roughing the kicker", Side::Defense, &[Pt::Punt, Pt::FieldGoal], 0.0005, 15, FRONT)),
    foul("Running into the kicker", Side::Defense, &[Pt::Punt], 0.001, 5, FRONT),
];

/// A flag thrown on the current play.
#[derive(Clone, Debug, PartialEq)]
pub struct PenaltyCall {
    pub name: &'static str,
    /// Offending team.
    pub t: TeamNum,
    pub p: Option<PlayerRef>,
    pub yds: i32,
    /// Where the foul happened, relative to the spot the flag was thrown at.
    pub spot_yds: Option<i32>,
    pub tack_on: bool,
    pub spot_foul: bool,
    pub auto_first_down: bool,
    pub pos_odds: &'static [(Position, f64)],
}

/// What a flag draw needs to know about the play.
#[derive(Clone, Copy, Debug)]
pub struct FlagContext {
    pub play_type: PenaltyPlayType,
    pub o: TeamNum,
    pub d: TeamNum,
    pub scrimmage: i32,
    pub play_yds: i32,
    pub incomplete_pass: bool,
    /// Flags already thrown on this play.
    pub already_called: usize,
}

/// Draw flags for one moment of a play. Every eligible foul fires
/// independently; extras beyond the per-play cap are dropped at random.
pub fn draw_flags<R: GameRng + ?Sized>(ctx: &FlagContext, foul_rate_factor: f64, rng: &mut R) -> Vec<PenaltyCall> {
    let max_allowed = MAX_PENALTIES_PER_PLAY.saturating_sub(ctx.already_called);
    if max_allowed == 0 {
        return Vec::new();
    }

    let mut called: Vec<&PenaltyDef> = PENALTIES
        .iter()
        .filter(|pen| pen.play_types.contains(&ctx.play_type))
        .filter(|pen| rng.chance(pen.prob * foul_rate_factor))
        .collect();
    if called.len() > max_allowed {
        rng.shuffle_slice(&mut called);
        called.truncate(max_allowed);
    }

    called.into_iter().map(|pen| call_for(pen, ctx, rng)).collect()
}

fn call_for<R: GameRng + ?Sized>(pen: &PenaltyDef, ctx: &FlagContext, rng: &mut R) -> PenaltyCall {
    let t = match pen.side {
        Side::Offense => ctx.o,
        Side::Defense => ctx.d,
    };
    let is_return = ctx.play_type.is_return();
    let play_yds = ctx.play_yds;
    let tack_on = (pen.tack_on && play_yds > 0 && !ctx.incomplete_pass) || (is_return && pen.side == Side::Defense);

    let mut spot_yds = None;
    if (pen.spot_foul || (is_return && pen.side == Side::Offense)) && !tack_on {
        if pen.side == Side::Offense && play_yds > 0 {
            // Keep offensive spot fouls out of the end zone.
            spot_yds = Some(rng.rand_int(1, play_yds).max(1 - ctx.scrimmage));
        } else if pen.side == Side::Defense && !is_return {
            spot_yds = Some(rng.rand_int(0, play_yds));
        }
        if let Some(s) = spot_yds.as_mut() {
            if ctx.play_type == PenaltyPlayType::KickoffReturn && *s + ctx.scrimmage <= 10 {
                *s += rng.rand_int(10, play_yds);
            }
        }
    } else if tack_on {
        spot_yds = Some(play_yds);
    }
    let spot_yds = spot_yds.map(|s| s.min(99 - ctx.scrimmage));

    PenaltyCall {
        name: pen.name,
        t,
        p: None,
        yds: pen.yds,
        spot_yds,
        tack_on,
        spot_foul: pen.spot_foul,
        auto_first_down: pen.auto_first_down,
        pos_odds: pen.pos_odds,
    }
}

/// Position a foul is charged to, among those currently on the field.
pub fn charged_position<R: GameRng + ?Sized>(
    pos_odds: &[(Position, f64)],
    on_field: &[Position],
    rng: &mut R,
) -> Option<Position> {
    let candidates: Vec<(Position, f64)> = pos_odds
        .iter()
        .filter(|(pos, _)| on_field.contains(pos))
        .copied()
        .collect();
    let weights: Vec<f64> = candidates.iter().map(|(_, w)| *w).collect();
    rng.choose_weighted_index(&weights).map(|i| candidates[i].0)
}

fn first_and_ten(s: &mut PlayState) {
    s.down = 1;
    s.to_go = 10.min(100 - s.scrimmage);
}

/// State after accepting `call`, enforced against the state the flag was
/// thrown in. Yardage is halved when it would cover more than half the
/// distance to the goal.
pub fn enforce(base: &PlayState, call: &PenaltyCall, initial: &PlayState) -> PlayState {
    let mut s = base.clone();
    let spot = base.scrimmage + call.spot_yds.unwrap_or(0);
    let line_to_gain = base.scrimmage + base.to_go;

    if call.t == base.o {
        let moved = call.yds.min(spot / 2);
        s.scrimmage = spot - moved;
        s.to_go = line_to_gain - s.scrimmage;
        if s.to_go <= 0 {
            first_and_ten(&mut s);
        }
    } else {
        let moved = call.yds.min((100 - spot) / 2);
        s.scrimmage = spot + moved;
        if call.auto_first_down || s.scrimmage >= line_to_gain {
            first_and_ten(&mut s);
        } else {
            s.to_go = line_to_gain - s.scrimmage;
        }
    }

    s.scrimmage = s.scrimmage.clamp(1, 99);
    if base.o != initial.o {
        first_and_ten(&mut s);
    }
    s.to_go = s.to_go.clamp(1, 100 - s.scrimmage);
    s
}

/// How good `state` is for `team`: the score margin plus a rough expected
/// points value of having the ball.
pub fn value_for(state: &PlayState, team: TeamNum) -> f64 {
    let margin = f64::from(state.pts[team.idx()]) - f64::from(state.pts[team.other().idx()]);
    let ep = if state.awaiting_kickoff.is_some() {
        0.0
    } else if state.awaiting_after_touchdown || state.two_point_conversion_team.is_some() {
        0.95
    } else {
        -1.0 + 0.065 * f64::from(state.scrimmage) - 0.4 * f64::from(state.down.saturating_sub(1)) - 0.03 * f64::from(state.to_go)
    };
    if state.o == team {
        margin + ep
    } else {
        margin - ep
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridiron_core::seeded_rng;
    use rand::rngs::mock::StepRng;

    fn state(scrimmage: i32, down: u8, to_go: i32) -> PlayState {
        PlayState {
            scrimmage,
            down,
            to_go,
            ..PlayState::kickoff(TeamNum::Away)
        }
        .with_ball(TeamNum::Home)
    }

    fn call(def: &PenaltyDef, t: TeamNum, spot_yds: Option<i32>) -> PenaltyCall {
        PenaltyCall {
            name: def.name,
            t,
            p: None,
            yds: def.yds,
            spot_yds,
            tack_on: false,
            spot_foul: def.spot_foul,
            auto_first_down: def.auto_first_down,
            pos_odds: def.pos_odds,
        }
    }

    fn def_named(name: &str) -> &'static PenaltyDef {
        PENALTIES.iter().find(|p| p.name == name).unwrap()
    }

    fn ctx(play_type: PenaltyPlayType, play_yds: i32) -> FlagContext {
        FlagContext {
            play_type,
            o: TeamNum::Home,
            d: TeamNum::Away,
            scrimmage: 30,
            play_yds,
            incomplete_pass: false,
            already_called: 0,
        }
    }

    #[test]
    fn catalogue_is_sane() {
        for pen in &PENALTIES {
            assert!(!pen.play_types.is_empty(), "{}", pen.name);
            assert!(pen.prob > 0.0 && pen.prob < 0.05, "{}", pen.name);
            assert!(pen.pos_odds.iter().all(|(_, w)| *w > 0.0), "{}", pen.name);
        }
    }

    #[test]
    fn always_penalize_stub_is_capped() {
        let mut rng = StepRng::new(0, 0);
        for pt in [PenaltyPlayType::BeforeSnap, PenaltyPlayType::Pass, PenaltyPlayType::PuntReturn] {
            assert_eq!(draw_flags(&ctx(pt, 12), 1.0, &mut rng).len(), 2);
        }
        let mut c = ctx(PenaltyPlayType::Run, 4);
        c.already_called = 1;
        assert_eq!(draw_flags(&c, 1.0, &mut rng).len(), 1);
        c.already_called = 2;
        assert!(draw_flags(&c, 1.0, &mut rng).is_empty());
    }

    #[test]
    fn zero_foul_rate_never_flags() {
        let mut rng = seeded_rng(4);
        for _ in 0..1000 {
            assert!(draw_flags(&ctx(PenaltyPlayType::Pass, 8), 0.0, &mut rng).is_empty());
        }
    }

    #[test]
    fn offensive_spot_fouls_stay_past_the_line() {
        let holding = def_named("Holding");
        let mut rng = seeded_rng(9);
        for _ in 0..200 {
            let c = call_for(holding, &ctx(PenaltyPlayType::Run, 8), &mut rng);
            let s = c.spot_yds.unwrap();
            assert!((1..=8).contains(&s));
        }
        // No gain: enforced from the previous spot.
        let c = call_for(holding, &ctx(PenaltyPlayType::Run, -2), &mut rng);
        assert_eq!(c.spot_yds, None);
    }

    #[test]
    fn tack_on_only_after_a_gain() {
        let roughness = def_named("Unnecessary roughness");
        let mut rng = seeded_rng(1);
        let c = call_for(roughness, &ctx(PenaltyPlayType::Run, 7), &mut rng);
        assert!(c.tack_on);
        assert_eq!(c.spot_yds, Some(7));
        let mut inc = ctx(PenaltyPlayType::Pass, 20);
        inc.incomplete_pass = true;
        let c = call_for(roughness, &inc, &mut rng);
        assert!(!c.tack_on);
        assert_eq!(c.spot_yds, None);
    }

    #[test]
    fn offensive_foul_repeats_down_and_halves_near_goal() {
        let initial = state(30, 2, 7);
        let holding = def_named("Holding");
        let s = enforce(&initial, &call(holding, TeamNum::Home, None), &initial);
        assert_eq!((s.scrimmage, s.down, s.to_go), (20, 2, 17));

        let deep = state(8, 1, 10);
        let s = enforce(&deep, &call(holding, TeamNum::Home, None), &deep);
        assert_eq!((s.scrimmage, s.down, s.to_go), (4, 1, 14));
    }

    #[test]
    fn defensive_foul_moves_chains() {
        let initial = state(30, 3, 8);
        let offside = def_named("Offside");
        let s = enforce(&initial, &call(offside, TeamNum::Away, None), &initial);
        assert_eq!((s.scrimmage, s.down, s.to_go), (35, 3, 3));

        let short = state(30, 3, 4);
        let s = enforce(&short, &call(offside, TeamNum::Away, None), &short);
        assert_eq!((s.scrimmage, s.down, s.to_go), (35, 1, 10));

        let dpi = def_named("Pass interference");
        let s = enforce(&initial, &call(dpi, TeamNum::Away, Some(40)), &initial);
        assert_eq!((s.scrimmage, s.down, s.to_go), (70, 1, 10));

        // Half the distance to the goal, goal to go.
        let goal_line = state(96, 2, 4);
        let facemask = def_named("Face mask");
        let s = enforce(&goal_line, &call(facemask, TeamNum::Away, None), &goal_line);
        assert_eq!((s.scrimmage, s.down, s.to_go), (98, 1, 2));
    }

    #[test]
    fn return_fouls_give_new_offense_first_down() {
        let initial = state(35, 1, 10).with_ball(TeamNum::Away);
        let after_kick = state(5, 1, 10);
        let block = def_named("Illegal block in the back");
        let s = enforce(&after_kick, &call(block, TeamNum::Home, Some(20)), &initial);
        assert_eq!((s.scrimmage, s.down, s.to_go), (15, 1, 10));
    }

    #[test]
    fn value_prefers_field_position_and_points() {
        let a = state(30, 1, 10);
        let b = state(60, 1, 10);
        assert!(value_for(&b, TeamNum::Home) > value_for(&a, TeamNum::Home));
        assert!(value_for(&b, TeamNum::Away) < value_for(&a, TeamNum::Away));
        let mut scored = a.clone();
        scored.pts = [7, 0];
        assert!(value_for(&scored, TeamNum::Home) > value_for(&b, TeamNum::Home));
    }

    #[test]
    fn charged_position_only_from_field() {
        let mut rng = seeded_rng(2);
        let on = [CB, S];
        for _ in 0..50 {
            let pos = charged_position(SECONDARY, &on, &mut rng).unwrap();
            assert!(matches!(pos, CB | S));
        }
        assert_eq!(charged_position(&[], &on, &mut rng), None);
        assert_eq!(charged_position(FRONT, &on, &mut rng), None);
    }
}
