#![deny(warnings)]

//! Rating model: probabilities and yardage means for play resolution.
//!
//! Every function here is pure in the player and team ratings it is given,
//! plus one multiplicative league knob per phenomenon. Probabilities are
//! bounded so that an outcome which must stay possible never becomes
//! certain or impossible.

use gridiron_core::{CompositeRating, GameRng, Position};

/// Lowest probability handed out for an outcome that must remain possible.
pub const PROB_FLOOR: f64 = 0.0001;
/// Highest probability handed out for an outcome that must remain avoidable.
pub const PROB_CEILING: f64 = 0.99;
/// Energy lost per play on the field by a player with zero endurance.
pub const ENERGY_DRAIN: f64 = 0.08;
/// Energy regained per play on the bench.
pub const ENERGY_RECOVERY: f64 = 0.05;

const MIN_DENOMINATOR: f64 = 0.05;

/// Clamp `x` into `[lo, hi]`, mapping NaN to `lo`.
pub fn bound(x: f64, lo: f64, hi: f64) -> f64 {
    if x.is_nan() {
        lo
    } else {
        x.max(lo).min(hi)
    }
}

/// Clamp into the non-degenerate probability range.
pub fn bound_probability(p: f64) -> f64 {
    bound(p, PROB_FLOOR, PROB_CEILING)
}

fn denom(x: f64) -> f64 {
    bound(x, MIN_DENOMINATOR, f64::INFINITY)
}

/// Effective rating multiplier for a player's current energy.
///
/// Example:
/// assert_eq!(fatigue(1.0, false), 1.0);
/// assert_eq!(fatigue(0.5, true), 0.0);
pub fn fatigue(energy: f64, injured: bool) -> f64 {
    if injured {
        return 0.0;
    }
    (energy + 0.05).min(1.0)
}

/// Energy after one play, clamped to [0, 1].
pub fn energy_after_play(energy: f64, endurance: f64, on_field: bool) -> f64 {
    let next = if on_field {
        energy - ENERGY_DRAIN * (1.0 - endurance)
    } else {
        energy + ENERGY_RECOVERY
    };
    bound(next, 0.0, 1.0)
}

/// Per-play injury probability for an on-field player.
pub fn injury_rate(base_rate: f64, age: u8) -> f64 {
    let age = f64::from(age.clamp(18, 50));
    base_rate * 1.03f64.powf(age - 26.0)
}

/// Kick distance in yards for a field goal snapped from `scrimmage`.
pub fn field_goal_distance(scrimmage: i32) -> i32 {
    100 - scrimmage + 17
}

const FIELD_GOAL_CURVE: [(f64, f64); 35] = [
    (20.0, 0.99),
    (30.0, 0.98),
    (35.0, 0.95),
    (37.0, 0.94),
    (38.0, 0.93),
    (39.0, 0.92),
    (40.0, 0.91),
    (41.0, 0.89),
    (42.0, 0.87),
    (43.0, 0.85),
    (44.0, 0.83),
    (45.0, 0.81),
    (46.0, 0.79),
    (47.0, 0.77),
    (48.0, 0.75),
    (49.0, 0.73),
    (50.0, 0.71),
    (51.0, 0.69),
    (52.0, 0.65),
    (53.0, 0.61),
    (54.0, 0.59),
    (55.0, 0.55),
    (56.0, 0.51),
    (57.0, 0.47),
    (58.0, 0.43),
    (59.0, 0.39),
    (60.0, 0.35),
    (61.0, 0.3),
    (62.0, 0.25),
    (63.0, 0.2),
    (64.0, 0.1),
    (65.0, 0.05),
    (70.0, 0.005),
    (75.0, 0.0001),
    (80.0, 0.000001),
];

/// League-average make probability by effective distance.
pub fn field_goal_base_prob(distance: f64) -> f64 {
    FIELD_GOAL_CURVE
        .iter()
        .find(|(limit, _)| distance < *limit)
        .map_or(0.0, |&(_, p)| p)
}

/// Make probability for a kick of `distance` yards.
///
/// Kicking power shifts the effective distance; kicking accuracy adds a
/// boost that is capped at half the room left to 0 and to 1.
///
/// Example:
/// let p = prob_made_field_goal(20.0, 0.75, 1.0, 1.0);
/// assert!((p - 0.99).abs() < 1e-12);
pub fn prob_made_field_goal(
    distance: f64,
    kicking_power: f64,
    kicking_accuracy: f64,
    fg_accuracy_factor: f64,
) -> f64 {
    let effective = distance - (kicking_power - 0.75) * 20.0;
    let base = bound(field_goal_base_prob(effective) * fg_accuracy_factor, 0.0, 0.99);
    let cap = ((1.0 - base) / 2.0).min(base / 2.0);
    let boost = bound((kicking_accuracy - 0.7) / 3.0, -base / 2.0, cap);
    bound(base + boost, 0.0, 0.99)
}

/// Chance the quarterback is sacked on a drop back.
pub fn prob_sack(
    team_pass_rushing: f64,
    qb_avoiding_sacks: f64,
    team_pass_blocking: f64,
    sack_factor: f64,
) -> f64 {
    let p = 0.06 * team_pass_rushing / denom(0.5 * (qb_avoiding_sacks + team_pass_blocking));
    bound_probability(p * sack_factor)
}

/// Ratings that feed the interception and completion formulas.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PassMatchup {
    pub qb_accuracy: f64,
    pub qb_deep: f64,
    pub qb_vision: f64,
    pub target_catching: f64,
    pub target_getting_open: f64,
    pub defender_coverage: f64,
    pub team_pass_coverage: f64,
    pub team_pass_rushing: f64,
    pub team_pass_blocking: f64,
}

/// Chance a thrown ball is intercepted.
pub fn prob_int(m: &PassMatchup, int_factor: f64) -> f64 {
    let coverage = 0.004 * m.team_pass_coverage + 0.022 * m.defender_coverage;
    let p = coverage / denom(0.5 * (m.qb_vision + m.qb_accuracy)) * m.team_pass_rushing
        / denom(m.team_pass_blocking);
    bound_probability(p * int_factor)
}

/// Chance a thrown ball is caught.
pub fn prob_complete(m: &PassMatchup, completion_factor: f64) -> f64 {
    let offense = 0.2
        * (m.target_catching
            + m.target_getting_open
            + m.qb_accuracy
            + m.qb_deep
            + m.qb_vision);
    let factor = offense / denom(0.5 * (m.defender_coverage + m.team_pass_coverage))
        * (m.team_pass_blocking / denom(m.team_pass_rushing)).sqrt();
    let p = (0.24 + 0.4 * factor.powf(1.25)) * completion_factor;
    bound(p, 0.01, 0.95)
}

/// Chance a quarterback who was not sacked tucks and runs.
pub fn prob_scramble(qb_rb_ovr: f64, scramble_factor: f64) -> f64 {
    let p = 0.01 + (0.35 * (qb_rb_ovr - 30.0) / 100.0).max(0.0);
    bound_probability(p * scramble_factor)
}

/// Chance the ball carrier fumbles.
pub fn prob_fumble(ball_security: f64, fumble_factor: f64) -> f64 {
    bound_probability(0.0125 * (1.5 - ball_security) * fumble_factor)
}

/// Chance an onside kick is recovered by the kicking team.
pub fn prob_onside_recovery(onside_recovery_factor: f64) -> f64 {
    bound_probability(0.1 * onside_recovery_factor)
}

/// Team-level ratings for the players currently on the field.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TeamComposite {
    pub receiving: f64,
    pub rushing: f64,
    pub pass_blocking: f64,
    pub run_blocking: f64,
    pub pass_rushing: f64,
    pub run_stopping: f64,
    pub pass_coverage: f64,
}

/// Which team composite a [`CompositeSpec`] fills in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TeamRating {
    Receiving,
    Rushing,
    PassBlocking,
    RunBlocking,
    PassRushing,
    RunStopping,
    PassCoverage,
}

impl TeamComposite {
    /// Set one component.
    pub fn set(&mut self, rating: TeamRating, value: f64) {
        match rating {
            TeamRating::Receiving => self.receiving = value,
            TeamRating::Rushing => self.rushing = value,
            TeamRating::PassBlocking => self.pass_blocking = value,
            TeamRating::RunBlocking => self.run_blocking = value,
            TeamRating::PassRushing => self.pass_rushing = value,
            TeamRating::RunStopping => self.run_stopping = value,
            TeamRating::PassCoverage => self.pass_coverage = value,
        }
    }
}

/// How a team composite is aggregated from on-field players.
#[derive(Clone, Copy, Debug)]
pub struct CompositeSpec {
    /// Team composite this entry produces.
    pub target: TeamRating,
    /// On-field positions that contribute.
    pub positions: &'static [Position],
    /// Position overall used to rank contributors and as half their value.
    pub order_by: Position,
    /// Player composite that forms the other half of each value.
    pub rating: CompositeRating,
    /// Weights for the best-ranked contributors.
    pub weights_main: &'static [f64],
    /// Extra weights for the next contributors in rank order.
    pub weights_bonus: &'static [f64],
}

/// Aggregation recipes for every team composite.
pub const COMPOSITE_SPECS: [CompositeSpec; 7] = [
    CompositeSpec {
        target: TeamRating::Receiving,
        positions: &[Position::WR, Position::TE, Position::RB],
        order_by: Position::WR,
        rating: CompositeRating::Catching,
        weights_main: &[5.0, 3.0, 2.0],
        weights_bonus: &[0.5, 0.25],
    },
    CompositeSpec {
        target: TeamRating::Rushing,
        positions: &[Position::RB, Position::WR, Position::QB],
        order_by: Position::RB,
        rating: CompositeRating::Rushing,
        weights_main: &[1.0],
        weights_bonus: &[0.1],
    },
    CompositeSpec {
        target: TeamRating::PassBlocking,
        positions: &[Position::OL, Position::TE, Position::RB],
        order_by: Position::OL,
        rating: CompositeRating::PassBlocking,
        weights_main: &[5.0, 4.0, 3.0, 3.0, 3.0],
        weights_bonus: &[1.0, 0.5],
    },
    CompositeSpec {
        target: TeamRating::RunBlocking,
        positions: &[Position::OL, Position::TE, Position::RB],
        order_by: Position::OL,
        rating: CompositeRating::RunBlocking,
        weights_main: &[5.0, 4.0, 3.0, 3.0, 3.0],
        weights_bonus: &[1.0, 0.5],
    },
    CompositeSpec {
        target: TeamRating::PassRushing,
        positions: &[Position::DL, Position::LB],
        order_by: Position::DL,
        rating: CompositeRating::PassRushing,
        weights_main: &[5.0, 4.0, 3.0, 2.0, 1.0],
        weights_bonus: &[],
    },
    CompositeSpec {
        target: TeamRating::RunStopping,
        positions: &[Position::DL, Position::LB, Position::S],
        order_by: Position::DL,
        rating: CompositeRating::RunStopping,
        weights_main: &[5.0, 4.0, 3.0, 2.0, 2.0, 1.0, 1.0],
        weights_bonus: &[0.5, 0.5],
    },
    CompositeSpec {
        target: TeamRating::PassCoverage,
        positions: &[Position::CB, Position::S, Position::LB],
        order_by: Position::CB,
        rating: CompositeRating::PassCoverage,
        weights_main: &[5.0, 4.0, 3.0, 2.0],
        weights_bonus: &[1.0, 0.5],
    },
];

/// One player's input to a team composite.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Contribution {
    /// Ranking key (higher is better).
    pub order: f64,
    /// Fatigue-adjusted value on a 0-1 scale.
    pub value: f64,
}

/// Weighted average of contributors ranked by `order`.
///
/// Main weights always count toward the denominator so a missing starter
/// drags the composite down; bonus weights only add.
pub fn composite_factor(contributions: &[Contribution], weights_main: &[f64], weights_bonus: &[f64]) -> f64 {
    let mut ranked: Vec<Contribution> = contributions.to_vec();
    ranked.sort_by(|a, b| b.order.total_cmp(&a.order));

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (i, w) in weights_main.iter().enumerate() {
        if let Some(c) = ranked.get(i) {
            numerator += w * c.value;
        }
        denominator += w;
    }
    for (j, w) in weights_bonus.iter().enumerate() {
        if let Some(c) = ranked.get(weights_main.len() + j) {
            numerator += w * c.value;
        }
    }
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Share of plays the offense would pass on ratings alone.
pub fn pass_tendency(off: &TeamComposite, def: &TeamComposite, qb_ovr: f64) -> f64 {
    let rescale = |x: f64, center: f64, slope: f64| bound((x - center) * slope + 0.25, 0.0, 1.0);

    let off_passing = rescale(
        (5.0 * qb_ovr / 100.0 + off.receiving + off.pass_blocking) / 7.0,
        0.45,
        2.0,
    );
    let off_rushing = rescale((off.rushing + off.run_blocking) / 2.0, 0.5, 2.5);
    let def_passing = rescale((def.pass_rushing + def.pass_coverage) / 2.0, 0.4, 2.0);
    let def_rushing = rescale(def.run_stopping, 0.4, 2.5);

    let pass_tend = 1.075 * bound(off_passing - 0.25 * def_passing, 0.0, 1.0);
    let rush_tend = 0.925 * bound(off_rushing - 0.25 * def_rushing, 0.0, 1.0);

    if pass_tend > 0.0 || rush_tend > 0.0 {
        bound(1.5 * pass_tend / (1.5 * pass_tend + rush_tend), 0.45, 0.65)
    } else {
        0.57
    }
}

/// Mean rushing gain for a carrier against the defense.
pub fn rush_mean_yds(carrier_rushing: f64, team_run_blocking: f64, def_run_stopping: f64, scramble: bool) -> f64 {
    let modifier = if scramble { 3.0 } else { 1.0 };
    bound(
        modifier * 3.5 * 0.5 * (carrier_rushing + team_run_blocking) / denom(def_run_stopping),
        -5.0,
        15.0,
    )
}

/// Mean air-plus-run yardage of a pass; `rb_factor` shortens dump-offs.
pub fn pass_mean_yds(team_pass_blocking: f64, def_pass_rushing: f64, rb_factor: f64) -> f64 {
    bound(
        rb_factor * 8.3 * team_pass_blocking / denom(def_pass_rushing),
        -5.0,
        100.0,
    )
}

/// Mean gross punt distance.
pub fn punt_mean_distance(punting: f64) -> f64 {
    44.0 + (punting - 0.6) * 20.0
}

/// A yardage distribution: a truncated normal bulk plus a rare uniform
/// breakaway bonus.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct YardageModel {
    pub mean: f64,
    pub sd: f64,
    pub lo: f64,
    pub hi: f64,
    pub breakaway_prob: f64,
    pub breakaway_max: i32,
}

impl YardageModel {
    /// Kickoff return.
    pub const KICK_RETURN: YardageModel = YardageModel {
        mean: 20.0,
        sd: 5.0,
        lo: -10.0,
        hi: 109.0,
        breakaway_prob: 0.02,
        breakaway_max: 109,
    };
    /// Punt return.
    pub const PUNT_RETURN: YardageModel = YardageModel {
        mean: 10.0,
        sd: 10.0,
        lo: -10.0,
        hi: 109.0,
        breakaway_prob: 0.03,
        breakaway_max: 100,
    };
    /// Interception return.
    pub const INT_RETURN: YardageModel = YardageModel {
        mean: 4.0,
        sd: 6.0,
        lo: -5.0,
        hi: 15.0,
        breakaway_prob: 0.075,
        breakaway_max: 100,
    };

    /// Fumble return; lost fumbles break away more often.
    pub fn fumble_return(lost: bool) -> YardageModel {
        YardageModel {
            mean: 2.0,
            sd: 6.0,
            lo: -5.0,
            hi: 15.0,
            breakaway_prob: if lost { 0.01 } else { 0.0001 },
            breakaway_max: 100,
        }
    }

    /// Designed run or scramble.
    pub fn run(mean: f64) -> YardageModel {
        YardageModel {
            mean,
            sd: 6.0,
            lo: -5.0,
            hi: 15.0,
            breakaway_prob: 0.01,
            breakaway_max: 100,
        }
    }

    /// Draw whole yards.
    pub fn draw<R: GameRng + ?Sized>(&self, rng: &mut R) -> i32 {
        let mut yds = rng.trunc_gauss(self.mean, self.sd, self.lo, self.hi).round() as i32;
        if rng.chance(self.breakaway_prob) {
            yds += rng.rand_int(0, self.breakaway_max);
        }
        yds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridiron_core::seeded_rng;
    use proptest::prelude::*;

    #[test]
    fn fatigue_rules() {
        assert_eq!(fatigue(1.0, false), 1.0);
        assert_eq!(fatigue(0.97, false), 1.0);
        assert!((fatigue(0.5, false) - 0.55).abs() < 1e-12);
        assert_eq!(fatigue(1.0, true), 0.0);
    }

    #[test]
    fn rare_outcomes_keep_a_small_chance() {
        assert_eq!(bound_probability(-1.0), 0.0001);
        assert_eq!(prob_fumble(1.5, 1.0), PROB_FLOOR);
        assert_eq!(prob_onside_recovery(0.0), PROB_FLOOR);
        assert_eq!(prob_onside_recovery(100.0), PROB_CEILING);
    }

    #[test]
    fn field_goal_golden_buckets() {
        assert_eq!(field_goal_base_prob(19.9), 0.99);
        assert_eq!(field_goal_base_prob(20.0), 0.98);
        assert_eq!(field_goal_base_prob(34.0), 0.95);
        assert_eq!(field_goal_base_prob(40.0), 0.89);
        assert_eq!(field_goal_base_prob(50.5), 0.69);
        assert_eq!(field_goal_base_prob(64.0), 0.05);
        assert_eq!(field_goal_base_prob(72.0), 0.0001);
        assert_eq!(field_goal_base_prob(80.0), 0.0);
    }

    #[test]
    fn accurate_kicker_hits_ceiling_at_20() {
        let p = prob_made_field_goal(20.0, 0.75, 1.0, 1.0);
        assert!((p - 0.99).abs() < 1e-12);
    }

    #[test]
    fn ten_thousand_chip_shots() {
        let p = prob_made_field_goal(20.0, 0.75, 1.0, 1.0);
        let mut rng = seeded_rng(2024);
        let makes = (0..10_000).filter(|_| rng.chance(p)).count();
        assert!((9850..=9950).contains(&makes), "makes = {makes}");
    }

    #[test]
    fn accuracy_factor_scales_and_caps() {
        let easy = prob_made_field_goal(45.0, 0.75, 0.7, 2.0);
        assert!(easy <= 0.99);
        let off = prob_made_field_goal(45.0, 0.75, 0.7, 0.0);
        assert_eq!(off, 0.0);
    }

    #[test]
    fn energy_stays_bounded() {
        assert_eq!(energy_after_play(0.01, 0.0, true), 0.0);
        assert_eq!(energy_after_play(0.99, 0.5, false), 1.0);
        // Endurance above 1 would otherwise push energy past 1 on the field.
        assert_eq!(energy_after_play(1.0, 1.5, true), 1.0);
    }

    #[test]
    fn injury_rate_grows_with_age() {
        assert!(injury_rate(0.001, 34) > injury_rate(0.001, 26));
        assert!((injury_rate(0.001, 26) - 0.001).abs() < 1e-15);
    }

    #[test]
    fn composite_factor_weights() {
        let c = |order: f64, value: f64| Contribution { order, value };
        // Ranking is by order, not by value.
        let v = composite_factor(&[c(10.0, 0.2), c(90.0, 0.8)], &[3.0, 1.0], &[]);
        assert!((v - (3.0 * 0.8 + 0.2) / 4.0).abs() < 1e-12);
        // Missing contributors still count in the denominator.
        let v = composite_factor(&[c(50.0, 1.0)], &[1.0, 1.0], &[]);
        assert!((v - 0.5).abs() < 1e-12);
        // Bonus weights only add.
        let v = composite_factor(&[c(2.0, 1.0), c(1.0, 1.0)], &[1.0], &[0.5]);
        assert!((v - 1.5).abs() < 1e-12);
        assert_eq!(composite_factor(&[], &[], &[]), 0.0);
    }

    #[test]
    fn average_teams_pass_about_57_percent() {
        let t = TeamComposite {
            receiving: 0.5,
            rushing: 0.5,
            pass_blocking: 0.5,
            run_blocking: 0.5,
            pass_rushing: 0.5,
            run_stopping: 0.5,
            pass_coverage: 0.5,
        };
        let p = pass_tendency(&t, &t, 50.0);
        assert!((0.45..=0.65).contains(&p));
        let empty = TeamComposite::default();
        assert_eq!(pass_tendency(&empty, &t, 0.0), 0.57);
    }

    #[test]
    fn yardage_model_respects_bulk_bounds_without_breakaway() {
        let mut rng = seeded_rng(5);
        let model = YardageModel {
            breakaway_prob: 0.0,
            ..YardageModel::run(3.5)
        };
        for _ in 0..1000 {
            let y = model.draw(&mut rng);
            assert!((-5..=15).contains(&y));
        }
    }

    fn matchup(v: f64) -> PassMatchup {
        PassMatchup {
            qb_accuracy: v,
            qb_deep: v,
            qb_vision: v,
            target_catching: v,
            target_getting_open: v,
            defender_coverage: v,
            team_pass_coverage: v,
            team_pass_rushing: v,
            team_pass_blocking: v,
        }
    }

    #[test]
    fn average_matchup_completion_rate() {
        let p = prob_complete(&matchup(0.5), 1.0);
        assert!((p - 0.64).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn field_goal_curve_is_monotonic(
            power in 0.0f64..1.5,
            accuracy in 0.0f64..1.5,
            factor in 0.0f64..2.0,
        ) {
            let mut prev = f64::INFINITY;
            for d in 20..=80 {
                let p = prob_made_field_goal(d as f64, power, accuracy, factor);
                prop_assert!(p <= prev + 1e-12, "distance {} gave {} after {}", d, p, prev);
                prop_assert!((0.0..=0.99).contains(&p));
                prev = p;
            }
        }

        #[test]
        fn probabilities_are_bounded(
            a in 0.0f64..1.5,
            b in 0.0f64..1.5,
            c in 0.0f64..1.5,
            factor in 0.0f64..5.0,
        ) {
            let m = PassMatchup {
                qb_accuracy: a,
                qb_deep: b,
                qb_vision: c,
                target_catching: a,
                target_getting_open: b,
                defender_coverage: c,
                team_pass_coverage: a,
                team_pass_rushing: b,
                team_pass_blocking: c,
            };
            for p in [
                prob_sack(a, b, c, factor),
                prob_int(&m, factor),
                prob_complete(&m, factor),
                prob_scramble(a * 100.0, factor),
                prob_fumble(a, factor),
            ] {
                prop_assert!(p > 0.0 && p < 1.0);
            }
        }

        #[test]
        fn energy_bounded_after_any_play(energy in 0.0f64..=1.0, endurance in 0.0f64..1.5, on in any::<bool>()) {
            let e = energy_after_play(energy, endurance, on);
            prop_assert!((0.0..=1.0).contains(&e));
        }
    }
}
