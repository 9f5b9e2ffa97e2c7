//! Counting stats and the longest-play tracker.

use std::collections::BTreeMap;

use gridiron_core::{PlayerId, TeamNum};
use serde::Serialize;

/// Every stat the engine records, for players and teams.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Stat {
    Gp,
    Gs,
    Min,
    Pss,
    PssCmp,
    PssYds,
    PssTd,
    PssInt,
    PssLng,
    PssSk,
    PssSkYds,
    Rus,
    RusYds,
    RusTd,
    RusLng,
    Tgt,
    Rec,
    RecYds,
    RecTd,
    RecLng,
    Fmb,
    FmbLost,
    FmbRec,
    FmbTd,
    DefInt,
    DefIntYds,
    DefIntTd,
    DefIntLng,
    DefPssDef,
    DefFmbFrc,
    DefFmbRec,
    DefFmbYds,
    DefFmbTd,
    DefSk,
    DefSft,
    DefTckSolo,
    DefTckAst,
    DefTckLoss,
    Kr,
    KrYds,
    KrTd,
    KrLng,
    Pr,
    PrYds,
    PrTd,
    PrLng,
    Ko,
    KoYds,
    KoTb,
    Fga,
    Fg,
    FgLng,
    Xpa,
    Xp,
    Pnt,
    PntYds,
    PntLng,
    PntTb,
    Pen,
    PenYds,
    TwoPta,
    TwoPt,
    Pts,
    Drives,
    TotStartYds,
    TimePos,
    SAtt,
    SPts,
}

impl Stat {
    /// Longest-play stats hold a maximum rather than a sum.
    pub fn is_lng(self) -> bool {
        matches!(
            self,
            Stat::PssLng
                | Stat::RusLng
                | Stat::RecLng
                | Stat::DefIntLng
                | Stat::KrLng
                | Stat::PrLng
                | Stat::FgLng
                | Stat::PntLng
        )
    }

    /// Appearance flags are set, never summed, and stay off team lines.
    pub fn is_appearance(self) -> bool {
        matches!(self, Stat::Gp | Stat::Gs)
    }
}

/// A sparse row of stats. Missing entries read as zero.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StatLine(BTreeMap<Stat, f64>);

impl StatLine {
    pub fn get(&self, stat: Stat) -> f64 {
        self.0.get(&stat).copied().unwrap_or(0.0)
    }

    pub fn add(&mut self, stat: Stat, amt: f64) {
        *self.0.entry(stat).or_insert(0.0) += amt;
    }

    pub fn set(&mut self, stat: Stat, value: f64) {
        self.0.insert(stat, value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Stat, f64)> + '_ {
        self.0.iter().map(|(s, v)| (*s, *v))
    }
}

/// Whose longest play is being tracked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Owner {
    Player(PlayerId),
    Team(TeamNum),
}

/// Keeps every value logged for a longest-play stat so that a value can be
/// taken back when the play it came from is wiped out by a penalty.
#[derive(Clone, Debug, Default)]
pub struct LngTracker {
    values: BTreeMap<(Owner, Stat), Vec<i32>>,
}

impl LngTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log (or with `remove`, take back one copy of) `value` and return the
    /// current longest. Zero when nothing is logged.
    pub fn log(&mut self, owner: Owner, stat: Stat, value: i32, remove: bool) -> i32 {
        let list = self.values.entry((owner, stat)).or_default();
        if remove {
            if let Some(i) = list.iter().position(|v| *v == value) {
                list.swap_remove(i);
            }
        } else {
            list.push(value);
        }
        list.iter().copied().max().unwrap_or(0)
    }
}
