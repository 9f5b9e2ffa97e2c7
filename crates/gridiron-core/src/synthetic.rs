//! Deterministic placeholder rosters for demos, benches and tests.

use std::collections::BTreeMap;

use crate::{CompositeRatings, PlayerId, PlayerInput, Position, TeamInput};

const ROSTER_SHAPE: [(Position, usize); 11] = [
    (Position::QB, 3),
    (Position::RB, 4),
    (Position::WR, 6),
    (Position::TE, 3),
    (Position::OL, 9),
    (Position::DL, 8),
    (Position::LB, 6),
    (Position::CB, 5),
    (Position::S, 4),
    (Position::K, 1),
    (Position::P, 1),
];

fn secondary_ovrs(pos: Position) -> &'static [(Position, f64)] {
    use Position::*;
    match pos {
        QB => &[(RB, 0.45)],
        RB => &[(WR, 0.6), (OL, 0.3)],
        WR => &[(RB, 0.5)],
        TE => &[(WR, 0.7), (OL, 0.6)],
        LB => &[(DL, 0.7), (CB, 0.5)],
        S => &[(CB, 0.8)],
        K => &[(P, 0.5)],
        P => &[(K, 0.5)],
        OL | DL | CB | KR | PR => &[],
    }
}

fn ratings_for(pos: Position, v: f64) -> CompositeRatings {
    let mut r = CompositeRatings::uniform(v);
    r.endurance = 0.6;
    match pos {
        Position::K | Position::P => {
            r = CompositeRatings::uniform(0.3);
            r.endurance = 0.6;
            r.kicking_power = (v + 0.1).min(1.0);
            r.kicking_accuracy = (v + 0.1).min(1.0);
            r.punting = v;
        }
        _ => {
            r.kicking_power = 0.2;
            r.kicking_accuracy = 0.2;
            r.punting = 0.2;
        }
    }
    r
}

/// Build a full 50-man roster whose starters are rated `quality` (0-1) and
/// whose backups get slightly worse down the depth chart. The same inputs
/// always produce the same roster.
pub fn synthetic_team(id: u32, name: &str, quality: f64) -> TeamInput {
    let mut players = Vec::new();
    let mut depth: BTreeMap<Position, Vec<PlayerId>> = BTreeMap::new();
    let mut next = 0u32;

    for (pos, count) in ROSTER_SHAPE {
        for rank in 0..count {
            next += 1;
            let pid = PlayerId(id * 1000 + next);
            let v = (quality - 0.05 * rank as f64).clamp(0.1, 1.0);
            let mut ovrs = BTreeMap::from([(pos, v * 100.0)]);
            for &(other, frac) in secondary_ovrs(pos) {
                ovrs.insert(other, v * 100.0 * frac);
            }
            players.push(PlayerInput {
                id: pid,
                name: format!("{name} {pos}{}", rank + 1),
                pos,
                age: 23 + (rank as u8 % 8),
                ratings: ratings_for(pos, v),
                ovrs,
                injured: false,
            });
            depth.entry(pos).or_default().push(pid);
        }
    }

    let at = |pos: Position, rank: usize| depth.get(&pos).and_then(|l| l.get(rank)).copied();
    let kr: Vec<PlayerId> = [at(Position::RB, 1), at(Position::WR, 3), at(Position::WR, 4)]
        .into_iter()
        .flatten()
        .collect();
    let pr: Vec<PlayerId> = [at(Position::WR, 2), at(Position::CB, 2)]
        .into_iter()
        .flatten()
        .collect();
    depth.insert(Position::KR, kr);
    depth.insert(Position::PR, pr);

    TeamInput {
        id,
        name: name.to_string(),
        players,
        depth,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate_team;

    #[test]
    fn synthetic_team_is_valid_and_complete() {
        let team = synthetic_team(1, "Hawks", 0.6);
        validate_team(&team).unwrap();
        assert_eq!(team.players.len(), 50);
        for pos in Position::ALL {
            assert!(
                team.depth.get(&pos).map_or(false, |l| !l.is_empty()),
                "missing depth at {pos}"
            );
        }
    }

    #[test]
    fn synthetic_team_is_deterministic() {
        let a = serde_json::to_string(&synthetic_team(2, "A", 0.55)).unwrap();
        let b = serde_json::to_string(&synthetic_team(2, "A", 0.55)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn starters_outrate_backups() {
        let team = synthetic_team(1, "Hawks", 0.6);
        let qbs: Vec<&PlayerInput> = team.players.iter().filter(|p| p.pos == Position::QB).collect();
        assert!(qbs[0].ovr(Position::QB) > qbs[1].ovr(Position::QB));
    }
}
