//! In-game rosters, personnel selection and team composites.

use std::collections::BTreeMap;

use gridiron_core::config::FormationSlot;
use gridiron_core::{CompositeRating, CompositeRatings, GameRng, PlayerId, PlayerInput, Position, TeamInput, TeamNum};
use gridiron_ratings::{composite_factor, fatigue, Contribution, TeamComposite, COMPOSITE_SPECS};

use crate::stats::StatLine;
use crate::SimError;

/// A player on a specific team, addressed by roster index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlayerRef {
    pub t: TeamNum,
    pub idx: usize,
}

/// Mutable per-game player state.
#[derive(Clone, Debug)]
pub struct PlayerSim {
    pub id: PlayerId,
    pub name: String,
    pub pos: Position,
    pub age: u8,
    pub ratings: CompositeRatings,
    pub ovrs: BTreeMap<Position, f64>,
    pub injured: bool,
    pub new_injury: bool,
    pub energy: f64,
    pub stats: StatLine,
}

impl PlayerSim {
    fn new(input: PlayerInput) -> Self {
        PlayerSim {
            id: input.id,
            name: input.name,
            pos: input.pos,
            age: input.age,
            ratings: input.ratings,
            ovrs: input.ovrs,
            injured: input.injured,
            new_injury: false,
            energy: 1.0,
            stats: StatLine::default(),
        }
    }

    pub fn ovr(&self, pos: Position) -> f64 {
        self.ovrs.get(&pos).copied().unwrap_or(0.0)
    }

    pub fn rating(&self, rating: CompositeRating) -> f64 {
        self.ratings.get(rating)
    }

    pub fn fatigue(&self) -> f64 {
        fatigue(self.energy, self.injured)
    }
}

/// Mutable per-game team state.
#[derive(Clone, Debug)]
pub struct TeamSim {
    pub id: u32,
    pub name: String,
    pub players: Vec<PlayerSim>,
    /// Roster indices per position, best first.
    pub depth: BTreeMap<Position, Vec<usize>>,
    pub stats: StatLine,
    pub pts_qtrs: Vec<u32>,
}

impl TeamSim {
    /// Resolve the depth chart to roster indices. A position with no list
    /// (or an empty one) is ordered by position overall.
    pub fn new(input: TeamInput) -> Self {
        let index: BTreeMap<PlayerId, usize> = input
            .players
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id, i))
            .collect();
        let players: Vec<PlayerSim> = input.players.into_iter().map(PlayerSim::new).collect();

        let mut depth = BTreeMap::new();
        for pos in Position::ALL {
            let listed: Vec<usize> = input
                .depth
                .get(&pos)
                .map(|ids| ids.iter().filter_map(|id| index.get(id).copied()).collect())
                .unwrap_or_default();
            let order = if listed.is_empty() {
                let mut all: Vec<usize> = (0..players.len()).collect();
                all.sort_by(|&a, &b| players[b].ovr(pos).total_cmp(&players[a].ovr(pos)));
                all
            } else {
                listed
            };
            depth.insert(pos, order);
        }

        TeamSim {
            id: input.id,
            name: input.name,
            players,
            depth,
            stats: StatLine::default(),
            pts_qtrs: vec![0],
        }
    }

    pub fn depth_at(&self, pos: Position) -> &[usize] {
        self.depth.get(&pos).map_or(&[], Vec::as_slice)
    }

    /// Multiply every player's ratings except endurance.
    pub fn scale_ratings(&mut self, factor: f64) {
        for p in &mut self.players {
            p.ratings.scale_except_endurance(factor);
        }
    }
}

/// Who is on the field for one side, keyed by the slot they fill.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OnField {
    slots: BTreeMap<Position, Vec<usize>>,
}

impl OnField {
    /// First player in a slot.
    pub fn top(&self, pos: Position) -> Option<usize> {
        self.at(pos).first().copied()
    }

    pub fn at(&self, pos: Position) -> &[usize] {
        self.slots.get(&pos).map_or(&[], Vec::as_slice)
    }

    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        self.slots.iter().filter(|(_, v)| !v.is_empty()).map(|(p, _)| *p)
    }

    /// Every player on the field; nobody fills two slots.
    pub fn players(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots.values().flatten().copied()
    }

    pub fn contains(&self, idx: usize) -> bool {
        self.players().any(|i| i == idx)
    }

    /// Players at any of `positions`, in the order the positions are given.
    /// An empty filter means everyone.
    pub fn among(&self, positions: &[Position]) -> Vec<usize> {
        if positions.is_empty() {
            return self.players().collect();
        }
        positions.iter().flat_map(|pos| self.at(*pos).iter().copied()).collect()
    }
}

/// Fill one side of a formation. `keep` is the first-pass filter; the
/// second pass drops it and the third also accepts injured players.
fn fill_side(
    team: &TeamSim,
    slots: &[FormationSlot],
    mut keep: impl FnMut(&PlayerSim, Position) -> bool,
) -> Result<OnField, SimError> {
    let mut used: Vec<usize> = Vec::new();
    let mut on_field = OnField::default();

    for slot in slots {
        let depth = team.depth_at(slot.pos);
        let mut chosen: Vec<usize> = Vec::with_capacity(slot.count);

        for &i in depth {
            if chosen.len() == slot.count {
                break;
            }
            let p = &team.players[i];
            if !p.injured && !used.contains(&i) && keep(p, slot.pos) {
                chosen.push(i);
                used.push(i);
            }
        }
        for allow_injured in [false, true] {
            for &i in depth {
                if chosen.len() == slot.count {
                    break;
                }
                if (allow_injured || !team.players[i].injured) && !used.contains(&i) {
                    chosen.push(i);
                    used.push(i);
                }
            }
        }

        if slot.count > 0 && chosen.is_empty() {
            return Err(SimError::NoEligiblePlayer {
                team: team.name.clone(),
                position: slot.pos,
            });
        }
        on_field.slots.entry(slot.pos).or_default().extend(chosen);
    }
    Ok(on_field)
}

/// Personnel for a snap. Tired players at rotating positions sit out with
/// probability `1 - fatigue`.
pub fn select_side<R: GameRng + ?Sized>(
    team: &TeamSim,
    slots: &[FormationSlot],
    rng: &mut R,
) -> Result<OnField, SimError> {
    fill_side(team, slots, |p, pos| !pos.is_fatigue_sensitive() || rng.chance(p.fatigue()))
}

/// The healthy starters, ignoring fatigue. Draws nothing from the RNG.
pub fn starters_side(team: &TeamSim, slots: &[FormationSlot]) -> Result<OnField, SimError> {
    fill_side(team, slots, |_, _| true)
}

/// Recompute every team composite for the players on the field.
pub fn team_composite(team: &TeamSim, on_field: &OnField) -> TeamComposite {
    let mut out = TeamComposite::default();
    for spec in &COMPOSITE_SPECS {
        let contributions: Vec<Contribution> = on_field
            .among(spec.positions)
            .into_iter()
            .map(|i| {
                let p = &team.players[i];
                let ovr = p.ovr(spec.order_by);
                Contribution {
                    order: ovr,
                    value: (ovr / 100.0 + p.rating(spec.rating)) / 2.0 * p.fatigue(),
                }
            })
            .collect();
        out.set(
            spec.target,
            composite_factor(&contributions, spec.weights_main, spec.weights_bonus),
        );
    }
    out
}

/// Random on-field player, weighted by `(rating * fatigue)^power` when a
/// rating is given. Positions missing from the field fall back to everyone.
pub fn pick_player<R: GameRng + ?Sized>(
    team: &TeamSim,
    on_field: &OnField,
    rating: Option<CompositeRating>,
    positions: &[Position],
    power: f64,
    rng: &mut R,
) -> Result<usize, SimError> {
    let mut candidates = on_field.among(positions);
    if candidates.is_empty() {
        candidates = on_field.among(&[]);
    }
    let no_players = || SimError::NoPlayersOnField {
        team: team.name.clone(),
    };
    let i = match rating {
        Some(r) => {
            let weights: Vec<f64> = candidates
                .iter()
                .map(|&i| {
                    let p = &team.players[i];
                    (p.rating(r) * p.fatigue()).max(0.0).powf(power)
                })
                .collect();
            rng.choose_weighted_index(&weights).ok_or_else(no_players)?
        }
        None => {
            if candidates.is_empty() {
                return Err(no_players());
            }
            rng.rand_int(0, candidates.len() as i32 - 1) as usize
        }
    };
    Ok(candidates[i])
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridiron_core::synthetic::synthetic_team;
    use gridiron_core::{seeded_rng, FormationBook, FormationKind};
    use rand::rngs::mock::StepRng;

    fn slots(list: &[(Position, usize)]) -> Vec<FormationSlot> {
        list.iter().map(|&(pos, count)| FormationSlot { pos, count }).collect()
    }

    #[test]
    fn starters_follow_depth_chart() {
        let team = TeamSim::new(synthetic_team(1, "Hawks", 0.6));
        let book = FormationBook::default();
        let off = starters_side(&team, &book.get(FormationKind::Normal)[0].off).unwrap();
        assert_eq!(off.top(Position::QB), Some(team.depth_at(Position::QB)[0]));
        assert_eq!(off.at(Position::OL), &team.depth_at(Position::OL)[..5]);
        assert_eq!(off.players().count(), 11);
    }

    #[test]
    fn nobody_fills_two_slots() {
        let team = TeamSim::new(synthetic_team(1, "Hawks", 0.6));
        let book = FormationBook::default();
        let mut rng = seeded_rng(3);
        for f in book.get(FormationKind::Kickoff).iter().chain(book.get(FormationKind::Punt)) {
            for side in [&f.off, &f.def] {
                let on = select_side(&team, side, &mut rng).unwrap();
                let mut ids: Vec<usize> = on.players().collect();
                let n = ids.len();
                ids.sort_unstable();
                ids.dedup();
                assert_eq!(ids.len(), n);
            }
        }
    }

    #[test]
    fn injured_and_tired_players_are_last_resort() {
        let mut team = TeamSim::new(synthetic_team(1, "Hawks", 0.6));
        let rbs = team.depth_at(Position::RB).to_vec();
        team.players[rbs[0]].injured = true;
        for &i in &rbs[1..] {
            team.players[i].energy = 0.0;
        }
        // A tired backup beats an injured starter once the fatigue pass fails.
        let mut rng = StepRng::new(u64::MAX / 2, 0);
        let on = select_side(&team, &slots(&[(Position::RB, 1)]), &mut rng).unwrap();
        assert_eq!(on.top(Position::RB), Some(rbs[1]));

        // Everyone hurt: the injured are used rather than leaving a hole.
        for &i in &rbs {
            team.players[i].injured = true;
        }
        let on = starters_side(&team, &slots(&[(Position::RB, 2)])).unwrap();
        assert_eq!(on.at(Position::RB), &rbs[..2]);
    }

    #[test]
    fn missing_depth_chart_orders_by_overall() {
        let mut input = synthetic_team(1, "Hawks", 0.6);
        input.depth.remove(&Position::QB);
        let team = TeamSim::new(input);
        let first = team.depth_at(Position::QB)[0];
        assert_eq!(team.players[first].pos, Position::QB);
        assert_eq!(team.players[first].name, "Hawks QB1");
    }

    #[test]
    fn empty_slot_is_an_error() {
        let mut input = synthetic_team(1, "Tiny", 0.6);
        input.players.truncate(1);
        input.depth.clear();
        let team = TeamSim::new(input);
        let err = starters_side(&team, &slots(&[(Position::QB, 1), (Position::OL, 5)])).unwrap_err();
        assert_eq!(
            err,
            SimError::NoEligiblePlayer {
                team: "Tiny".to_string(),
                position: Position::OL,
            }
        );
    }

    #[test]
    fn composites_drop_with_fatigue() {
        let mut team = TeamSim::new(synthetic_team(1, "Hawks", 0.6));
        let book = FormationBook::default();
        let on = starters_side(&team, &book.get(FormationKind::Normal)[0].def).unwrap();
        let fresh = team_composite(&team, &on);
        assert!(fresh.pass_rushing > 0.0);
        for p in &mut team.players {
            p.energy = 0.2;
        }
        let tired = team_composite(&team, &on);
        assert!(tired.pass_rushing < fresh.pass_rushing);
        assert!(tired.run_stopping < fresh.run_stopping);
    }

    #[test]
    fn pick_player_respects_positions_and_falls_back() {
        let team = TeamSim::new(synthetic_team(1, "Hawks", 0.6));
        let book = FormationBook::default();
        let on = starters_side(&team, &book.get(FormationKind::Normal)[0].off).unwrap();
        let mut rng = seeded_rng(8);
        for _ in 0..100 {
            let i = pick_player(&team, &on, Some(CompositeRating::Catching), &[Position::WR, Position::TE], 1.0, &mut rng)
                .unwrap();
            assert!(matches!(team.players[i].pos, Position::WR | Position::TE));
        }
        // No kickers on offense: anybody on the field will do.
        let i = pick_player(&team, &on, None, &[Position::K], 1.0, &mut rng).unwrap();
        assert!(on.contains(i));

        let empty = OnField::default();
        assert!(matches!(
            pick_player(&team, &empty, None, &[], 1.0, &mut rng),
            Err(SimError::NoPlayersOnField { .. })
        ));
    }
}
