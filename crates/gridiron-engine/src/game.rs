//! Whole-game driver.
//!
//! [`GameSim`] owns the clock, the rosters and the play-by-play. Each call to
//! `sim_play` asks the coach for a play, resolves it through a [`Play`] and
//! then runs the clock, timeouts, playing time and injuries. Every random
//! draw goes through the one injected RNG, so a seeded RNG replays a game
//! exactly.

use gridiron_ai::{choose_play_type, hurry_up, late_timeout, Situation, TimeoutCaller};
use gridiron_core::{
    validate_matchup, CompositeRating, FormationKind, GameConfig, GameRng, OvertimeState, PlayType,
    Position, TeamInput, TeamNum, SCRIMMAGE_EXTRA_POINT, SCRIMMAGE_KICKOFF, SCRIMMAGE_KICKOFF_SAFETY,
    SCRIMMAGE_TWO_POINT_CONVERSION,
};
use gridiron_ratings::{
    bound, energy_after_play, field_goal_distance, injury_rate, pass_mean_yds, pass_tendency,
    prob_complete, prob_fumble, prob_int, prob_made_field_goal, prob_onside_recovery,
    prob_scramble, prob_sack, punt_mean_distance, rush_mean_yds, PassMatchup, TeamComposite,
    YardageModel,
};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::penalty::{charged_position, draw_flags, FlagContext, PenaltyPlayType};
use crate::play::{EventOutcome, Play, PlayEvent, PlayState, StatDelta};
use crate::play_by_play::{PenaltyDecision, PlayByPlayEvent, PlayByPlayLog};
use crate::result::{GameResult, PlayerBoxScore, ShootoutScore, TeamBoxScore};
use crate::roster::{
    pick_player, select_side, starters_side, team_composite, OnField, PlayerRef, PlayerSim, TeamSim,
};
use crate::stats::{LngTracker, Owner, Stat};
use crate::SimError;

/// Distance of every shootout kick.
pub const SHOOTOUT_DISTANCE: i32 = 50;

/// A single game in progress.
pub struct GameSim<R: Rng> {
    gid: u32,
    cfg: GameConfig,
    rng: R,
    neutral_site: bool,
    teams: [TeamSim; 2],
    on_field: [OnField; 2],
    composite: [TeamComposite; 2],
    state: PlayState,
    play: Play,
    /// Minutes left in the period.
    clock: f64,
    overtimes: u32,
    timeouts: [u8; 2],
    two_minute_warning_happened: bool,
    clock_running: bool,
    untimed_down: bool,
    /// Receiver of the kickoff that opened the current half.
    last_half_receiving: TeamNum,
    shootout: bool,
    plays_this_period: u32,
    lng: LngTracker,
    pbp: PlayByPlayLog,
}

impl<R: Rng> GameSim<R> {
    /// Validate the inputs, mark the starters, apply home-field advantage and
    /// flip for the opening kickoff. `teams` is `[home, away]`.
    pub fn new(
        gid: u32,
        teams: [TeamInput; 2],
        neutral_site: bool,
        cfg: GameConfig,
        mut rng: R,
    ) -> Result<Self, SimError> {
        cfg.validate()?;
        validate_matchup(&teams)?;

        let [home, away] = teams;
        let mut teams = [TeamSim::new(home), TeamSim::new(away)];

        let starting = cfg
            .formations
            .get(FormationKind::Normal)
            .first()
            .cloned()
            .ok_or(gridiron_core::ValidationError::EmptyFormationSet(FormationKind::Normal))?;
        for team in &mut teams {
            for slots in [&starting.off, &starting.def] {
                let side = starters_side(team, slots)?;
                for idx in side.players() {
                    team.players[idx].stats.set(Stat::Gs, 1.0);
                    team.players[idx].stats.set(Stat::Gp, 1.0);
                }
            }
        }

        if !neutral_site {
            let factor = bound(1.0 + cfg.home_field_advantage / 100.0, 0.01, f64::INFINITY);
            teams[TeamNum::Home.idx()].scale_ratings(factor);
            teams[TeamNum::Away.idx()].scale_ratings(1.0 / factor);
        }

        let receiving = if rng.chance(0.5) { TeamNum::Home } else { TeamNum::Away };
        let state = PlayState::kickoff(receiving);
        let clock = cfg.quarter_length;
        let timeouts = [cfg.timeouts_per_half; 2];

        let mut game = GameSim {
            gid,
            cfg,
            rng,
            neutral_site,
            teams,
            on_field: [OnField::default(), OnField::default()],
            composite: [TeamComposite::default(); 2],
            play: Play::new(state.clone()),
            state,
            clock,
            overtimes: 0,
            timeouts,
            two_minute_warning_happened: false,
            clock_running: false,
            untimed_down: false,
            last_half_receiving: receiving,
            shootout: false,
            plays_this_period: 0,
            lng: LngTracker::new(),
            pbp: PlayByPlayLog::new(),
        };
        game.log_timeouts();
        Ok(game)
    }

    /// Play the game to the end and return the box score.
    pub fn run(mut self) -> Result<GameResult, SimError> {
        info!(
            gid = self.gid,
            home = %self.teams[0].name,
            away = %self.teams[1].name,
            "simulating game"
        );

        self.sim_regulation()?;
        while self.tied() && self.overtimes < self.cfg.max_overtimes {
            self.sim_overtime()?;
        }
        if self.tied() && self.cfg.shootout_rounds > 0 {
            self.sim_shootout()?;
        }
        self.pbp.log_event(PlayByPlayEvent::GameOver { clock: self.clock });

        info!(
            gid = self.gid,
            home = self.state.pts[0],
            away = self.state.pts[1],
            overtimes = self.overtimes,
            shootout = self.shootout,
            "final"
        );
        Ok(self.into_result())
    }

    fn tied(&self) -> bool {
        self.state.pts[0] == self.state.pts[1]
    }

    /// Scores differ by more than a pending try could change.
    fn overtime_decided(&self) -> bool {
        let [home, away] = self.state.pts;
        home != away && (!self.state.awaiting_after_touchdown || home.abs_diff(away) > 2)
    }

    /// 1-based period, overtimes continue the count.
    fn quarter(&self) -> u32 {
        self.teams[0].pts_qtrs.len() as u32
    }

    fn start_period(&mut self, length: f64) {
        for team in &mut self.teams {
            team.pts_qtrs.push(0);
        }
        self.clock = length;
        self.plays_this_period = 0;
    }

    fn sim_regulation(&mut self) -> Result<(), SimError> {
        loop {
            while self.clock > 0.0 || self.state.awaiting_after_touchdown || self.untimed_down {
                self.sim_play()?;
            }

            let quarter = self.quarter();
            if quarter >= self.cfg.num_periods {
                return Ok(());
            }
            if self.cfg.is_first_period_after_halftime(quarter + 1) {
                self.timeouts = [self.cfg.timeouts_per_half; 2];
                self.log_timeouts();
                self.two_minute_warning_happened = false;
                let receiving = self.last_half_receiving.other();
                self.set_kickoff(receiving);
            }

            self.start_period(self.cfg.quarter_length);
            debug!(gid = self.gid, quarter = quarter + 1, "period start");
            self.pbp.log_event(PlayByPlayEvent::Quarter {
                clock: self.clock,
                quarter: quarter + 1,
                starts_with_kickoff: self.cfg.kickoff_after_end_of_period(quarter),
            });
        }
    }

    /// A new half or overtime opens with a kickoff to `receiving`.
    fn set_kickoff(&mut self, receiving: TeamNum) {
        self.last_half_receiving = receiving;
        self.state.o = receiving.other();
        self.state.d = receiving;
        self.state.awaiting_kickoff = Some(receiving);
        self.state.awaiting_after_safety = false;
        self.state.scrimmage = SCRIMMAGE_KICKOFF;
        self.state.down = 1;
        self.state.to_go = 10;
    }

    fn sim_overtime(&mut self) -> Result<(), SimError> {
        let quarter = self.quarter();
        self.overtimes += 1;
        if self.state.overtime_state.is_none() {
            self.state.overtime_state = Some(OvertimeState::InitialKickoff);
            self.last_half_receiving = if self.rng.chance(0.5) { TeamNum::Home } else { TeamNum::Away };
        }
        self.start_period(self.cfg.overtime_length);
        self.timeouts = [self.cfg.timeouts_per_overtime; 2];
        self.log_timeouts();
        self.two_minute_warning_happened = false;
        self.pbp.log_event(PlayByPlayEvent::Overtime {
            clock: self.clock,
            overtimes: self.overtimes,
            starts_with_kickoff: self.cfg.kickoff_after_end_of_period(quarter),
        });
        let receiving = self.last_half_receiving.other();
        self.set_kickoff(receiving);
        debug!(gid = self.gid, overtimes = self.overtimes, ?receiving, "overtime");

        while (self.clock > 0.0 || self.untimed_down)
            && self.state.overtime_state != Some(OvertimeState::Over)
        {
            self.sim_play()?;
        }
        Ok(())
    }

    fn sim_shootout(&mut self) -> Result<(), SimError> {
        let rounds = self.cfg.shootout_rounds;
        self.shootout = true;
        self.clock = 1.0;
        self.pbp.log_event(PlayByPlayEvent::ShootoutStart {
            clock: self.clock,
            rounds,
        });

        'rounds: for round in 0..rounds {
            for t in [TeamNum::Away, TeamNum::Home] {
                self.shootout_shot(t)?;
                if self.shootout_decided(t, round) {
                    break 'rounds;
                }
            }
        }

        if self.shootout_tied() {
            self.pbp.log_event(PlayByPlayEvent::ShootoutTie { clock: self.clock });
            let mut sudden_death = 0;
            while self.shootout_tied() && sudden_death < self.cfg.max_sudden_death_rounds {
                for t in [TeamNum::Away, TeamNum::Home] {
                    self.shootout_shot(t)?;
                }
                sudden_death += 1;
            }
            if self.shootout_tied() {
                warn!(gid = self.gid, sudden_death, "shootout still tied, game ends tied");
            }
        }
        Ok(())
    }

    fn shootout_made(&self, t: TeamNum) -> f64 {
        self.teams[t.idx()].stats.get(Stat::SPts)
    }

    fn shootout_tied(&self) -> bool {
        self.shootout_made(TeamNum::Home) == self.shootout_made(TeamNum::Away)
    }

    /// True when the trailing side cannot catch up with the kicks it has left
    /// in regulation rounds. Away kicks first in every round.
    fn shootout_decided(&self, just_kicked: TeamNum, round: u32) -> bool {
        let rounds = self.cfg.shootout_rounds as f64;
        let done = round as f64 + 1.0;
        let left = |t: TeamNum| {
            if t == TeamNum::Home && just_kicked == TeamNum::Away {
                rounds - done + 1.0
            } else {
                rounds - done
            }
        };
        let home = self.shootout_made(TeamNum::Home);
        let away = self.shootout_made(TeamNum::Away);
        home + left(TeamNum::Home) < away || away + left(TeamNum::Away) < home
    }

    fn shootout_shot(&mut self, t: TeamNum) -> Result<(), SimError> {
        self.state.o = t;
        self.state.d = t.other();
        self.update_players_on_field(FormationKind::FieldGoal)?;
        let kicker = self.top(t, Position::K)?;
        let p = bound(self.prob_made_field_goal(self.player(kicker), SHOOTOUT_DISTANCE), 0.01, 0.99);
        let made = self.rng.chance(p);

        self.record_team(t, Stat::SAtt, 1.0);
        if made {
            self.record_team(t, Stat::SPts, 1.0);
        }
        self.pbp.log_event(PlayByPlayEvent::ShootoutShot {
            clock: self.clock,
            t,
            names: vec![self.player(kicker).name.clone()],
            made,
            att: self.teams[t.idx()].stats.get(Stat::SAtt) as u32,
            yds: SHOOTOUT_DISTANCE,
        });
        Ok(())
    }

    /// What the offense sees, without the rating-derived numbers.
    fn situation(&self) -> Situation {
        let s = &self.state;
        Situation {
            down: s.down,
            to_go: s.to_go,
            scrimmage: s.scrimmage,
            pts_down: s.pts[s.d.idx()] as i32 - s.pts[s.o.idx()] as i32,
            quarter: self.quarter(),
            clock: self.clock,
            overtime_state: s.overtime_state,
            awaiting_kickoff: s.awaiting_kickoff.is_some(),
            awaiting_after_touchdown: s.awaiting_after_touchdown,
            awaiting_after_safety: s.awaiting_after_safety,
            defense_timeouts: self.timeouts[s.d.idx()],
            prob_made_field_goal: 0.0,
            pass_tendency: 0.0,
        }
    }

    /// Field goal odds from the current spot and the pass share suggested by
    /// the two starting lineups.
    fn rating_outlook(&self) -> Result<(f64, f64), SimError> {
        let (o, d) = (self.state.o, self.state.d);
        let offense = &self.teams[o.idx()];
        let p_fg = offense
            .depth_at(Position::K)
            .iter()
            .map(|&i| &offense.players[i])
            .find(|p| !p.injured)
            .map_or(0.0, |k| {
                self.prob_made_field_goal(k, field_goal_distance(self.state.scrimmage))
            });

        let Some(starting) = self.cfg.formations.get(FormationKind::Normal).first() else {
            return Ok((p_fg, 0.0));
        };
        let off = starters_side(offense, &starting.off)?;
        let def = starters_side(&self.teams[d.idx()], &starting.def)?;
        let off_composite = team_composite(offense, &off);
        let def_composite = team_composite(&self.teams[d.idx()], &def);
        let qb_ovr = off
            .top(Position::QB)
            .map_or(0.0, |i| offense.players[i].ovr(Position::QB));
        Ok((p_fg, pass_tendency(&off_composite, &def_composite, qb_ovr)))
    }

    fn prob_made_field_goal(&self, kicker: &PlayerSim, distance: i32) -> f64 {
        prob_made_field_goal(
            distance as f64,
            kicker.rating(CompositeRating::KickingPower),
            kicker.rating(CompositeRating::KickingAccuracy),
            self.cfg.fg_accuracy_factor,
        )
    }

    fn sim_play(&mut self) -> Result<(), SimError> {
        self.untimed_down = false;
        if let Some(receiving) = self.state.awaiting_kickoff {
            self.state.o = receiving.other();
            self.state.d = receiving;
            self.state.scrimmage = if self.state.awaiting_after_safety {
                SCRIMMAGE_KICKOFF_SAFETY
            } else {
                SCRIMMAGE_KICKOFF
            };
        }

        let mut situation = self.situation();
        let (p_fg, tendency) = self.rating_outlook()?;
        situation.prob_made_field_goal = p_fg;
        situation.pass_tendency = tendency;
        let play_type = choose_play_type(&situation, &self.cfg, &mut self.rng);

        match play_type {
            PlayType::ExtraPoint => {
                self.state.scrimmage = SCRIMMAGE_EXTRA_POINT;
                self.state.down = 1;
                self.state.to_go = 100 - SCRIMMAGE_EXTRA_POINT;
            }
            PlayType::TwoPointConversion => {
                self.state.scrimmage = SCRIMMAGE_TWO_POINT_CONVERSION;
                self.state.down = 1;
                self.state.to_go = 100 - SCRIMMAGE_TWO_POINT_CONVERSION;
            }
            _ => {}
        }
        debug!(
            ?play_type,
            down = self.state.down,
            to_go = self.state.to_go,
            scrimmage = self.state.scrimmage,
            clock = self.clock,
            "play call"
        );

        self.play = Play::new(self.state.clone());
        self.pbp.log_event(PlayByPlayEvent::Clock {
            t: self.state.o,
            clock: self.clock,
            down: self.state.down,
            to_go: self.state.to_go,
            scrimmage: self.state.scrimmage,
            awaiting_kickoff: self.state.awaiting_kickoff.is_some(),
            awaiting_after_touchdown: self.state.awaiting_after_touchdown,
        });
        if matches!(play_type, PlayType::Pass | PlayType::Run) && self.state.down == 4 {
            self.pbp.log_event(PlayByPlayEvent::GoingForItOn4th {
                clock: self.clock,
                t: self.state.o,
            });
        }

        let seconds = match play_type {
            PlayType::Kickoff => self.do_kickoff(false)?,
            PlayType::OnsideKick => self.do_kickoff(true)?,
            PlayType::Punt => self.do_punt()?,
            PlayType::FieldGoal | PlayType::FieldGoalLate => self.do_field_goal(false)?,
            PlayType::ExtraPoint => self.do_field_goal(true)?,
            PlayType::TwoPointConversion => self.do_two_point_conversion()?,
            PlayType::Pass => self.do_pass()?,
            PlayType::Run => self.do_run(false)?,
            PlayType::Kneel => self.do_kneel()?,
        };
        let dt = seconds / 60.0;

        let quarter = self.quarter();
        let clock_at_end = self.clock - dt;
        let time_expired = clock_at_end <= 0.0 && self.cfg.kickoff_after_end_of_period(quarter);

        let play = std::mem::replace(&mut self.play, Play::new(self.state.clone()));
        let possession = play.initial.o;
        let resolution = play.commit(time_expired);
        for delta in resolution.undone.iter().rev() {
            self.record(*delta, true);
        }
        for (call, decision) in &resolution.penalties {
            let names = call.p.map(|p| vec![self.player(p).name.clone()]).unwrap_or_default();
            self.pbp.log_event(PlayByPlayEvent::Penalty {
                clock: self.clock,
                t: call.t,
                names,
                name: call.name.to_string(),
                yds: call.yds,
                decision: *decision,
                spot_foul: call.spot_foul,
                tack_on: call.tack_on,
                automatic_first_down: call.auto_first_down,
            });
            if *decision == PenaltyDecision::Accepted {
                self.record(
                    StatDelta { t: call.t, p: call.p, stat: Stat::Pen, amt: 1.0 },
                    false,
                );
                self.record(
                    StatDelta { t: call.t, p: call.p, stat: Stat::PenYds, amt: call.yds as f64 },
                    false,
                );
            }
        }
        if resolution.score_negated && self.pbp.last_score_stands() {
            self.pbp.log_event(PlayByPlayEvent::RemoveLastScore { clock: self.clock });
        }
        if resolution.turnover_on_downs {
            self.pbp.log_event(PlayByPlayEvent::TurnoverOnDowns {
                clock: self.clock,
                t: possession,
            });
        }
        self.state = resolution.state;
        self.clock_running = resolution.clock_running;
        self.untimed_down = resolution.untimed_down;

        let ends_half = self.cfg.kickoff_after_end_of_period(quarter);
        let mut warning_now = false;
        if !self.two_minute_warning_happened && ends_half && self.clock > 2.0 && clock_at_end <= 2.0 {
            self.two_minute_warning_happened = true;
            warning_now = true;
            self.clock_running = false;
            self.pbp.log_event(PlayByPlayEvent::TwoMinuteWarning {
                clock: clock_at_end.max(0.0),
            });
        }

        if clock_at_end > 0.0 && !warning_now {
            if self.rng.chance(0.01) {
                self.do_timeout(self.state.o);
            } else if self.rng.chance(0.003) {
                self.do_timeout(self.state.d);
            }
            match late_timeout(&self.situation(), &self.cfg, self.clock_running) {
                Some(TimeoutCaller::Offense) => self.do_timeout(self.state.o),
                Some(TimeoutCaller::Defense) => self.do_timeout(self.state.d),
                None => {}
            }
        }

        let mut dt_running = 0.0;
        if self.clock_running {
            let seconds = if hurry_up(&self.situation(), &self.cfg) {
                let quick = self.rng.rand_int(5, 13) as f64;
                if clock_at_end - quick / 60.0 < 0.0 {
                    self.rng.rand_int(0, 4) as f64
                } else {
                    quick
                }
            } else {
                self.rng.rand_int(37, 62) as f64
            };
            dt_running = seconds / 60.0 / self.cfg.pace;
        }
        if !self.two_minute_warning_happened
            && ends_half
            && clock_at_end > 2.0
            && clock_at_end - dt_running <= 2.0
        {
            self.two_minute_warning_happened = true;
            self.clock_running = false;
            dt_running = clock_at_end - 2.0;
            self.pbp.log_event(PlayByPlayEvent::TwoMinuteWarning { clock: 2.0 });
        }

        let elapsed = (dt + dt_running).min(self.clock).max(0.0);
        self.clock -= elapsed;
        self.update_playing_time(elapsed, possession);
        if play_type != PlayType::Kneel {
            self.injuries();
        }

        if self.state.overtime_state == Some(OvertimeState::BothTeamsPossessed) && self.overtime_decided() {
            self.state.overtime_state = Some(OvertimeState::Over);
        }

        self.plays_this_period += 1;
        if self.plays_this_period >= self.cfg.max_plays_per_period
            && (self.clock > 0.0 || self.untimed_down || self.state.awaiting_after_touchdown)
        {
            warn!(
                gid = self.gid,
                quarter,
                plays = self.plays_this_period,
                "play limit reached, ending period"
            );
            self.clock = 0.0;
            self.untimed_down = false;
            if self.state.awaiting_after_touchdown {
                self.state.awaiting_after_touchdown = false;
                self.state.awaiting_kickoff = Some(self.state.d);
            }
        }
        Ok(())
    }

    fn log_timeouts(&mut self) {
        self.pbp.log_event(PlayByPlayEvent::Timeouts {
            timeouts: self.timeouts,
        });
    }

    fn do_timeout(&mut self, t: TeamNum) {
        if self.timeouts[t.idx()] == 0 {
            return;
        }
        self.timeouts[t.idx()] -= 1;
        self.log_timeouts();
        self.clock_running = false;
        self.pbp.log_event(PlayByPlayEvent::Timeout {
            clock: self.clock,
            t,
            offense: t == self.state.o,
            num_left: self.timeouts[t.idx()],
        });
    }

    fn update_playing_time(&mut self, dt: f64, possession: TeamNum) {
        self.record_team(possession, Stat::TimePos, dt);
        for t in TeamNum::BOTH {
            let on_field: Vec<usize> = self.on_field[t.idx()].players().collect();
            let team = &mut self.teams[t.idx()];
            for (idx, p) in team.players.iter_mut().enumerate() {
                let playing = on_field.contains(&idx);
                if playing {
                    p.stats.add(Stat::Min, dt);
                }
                p.energy =
                    energy_after_play(p.energy, p.rating(CompositeRating::Endurance), playing);
            }
            team.stats.add(Stat::Min, dt * on_field.len() as f64);
        }
    }

    fn injuries(&mut self) {
        for t in TeamNum::BOTH {
            let on_field: Vec<usize> = self.on_field[t.idx()].players().collect();
            for idx in on_field {
                let p = &self.teams[t.idx()].players[idx];
                if p.injured {
                    continue;
                }
                let rate = injury_rate(self.cfg.base_injury_rate, p.age);
                if !self.rng.chance(rate) {
                    continue;
                }
                // Quarterbacks shake off half of their injuries.
                if p.pos == Position::QB && self.rng.chance(0.5) {
                    continue;
                }
                let p = &mut self.teams[t.idx()].players[idx];
                p.injured = true;
                p.new_injury = true;
                debug!(gid = self.gid, pid = ?p.id, name = %p.name, "injury");
                let event = PlayByPlayEvent::Injury {
                    clock: self.clock,
                    t,
                    names: vec![p.name.clone()],
                    injured_pid: p.id,
                };
                self.pbp.log_event(event);
            }
        }
    }

    /// Pick personnel for the next snap and refresh the team composites.
    fn update_players_on_field(&mut self, kind: FormationKind) -> Result<(), SimError> {
        let formations = self.cfg.formations.get(kind);
        if formations.is_empty() {
            return Err(gridiron_core::ValidationError::EmptyFormationSet(kind).into());
        }
        let i = self.rng.rand_int(0, formations.len() as i32 - 1) as usize;
        let formation = formations[i].clone();

        let (o, d) = (self.state.o, self.state.d);
        for (t, slots) in [(o, &formation.off), (d, &formation.def)] {
            let side = select_side(&self.teams[t.idx()], slots, &mut self.rng)?;
            for idx in side.players() {
                self.teams[t.idx()].players[idx].stats.set(Stat::Gp, 1.0);
            }
            self.composite[t.idx()] = team_composite(&self.teams[t.idx()], &side);
            self.on_field[t.idx()] = side;
        }
        Ok(())
    }

    fn player(&self, p: PlayerRef) -> &PlayerSim {
        &self.teams[p.t.idx()].players[p.idx]
    }

    fn rating(&self, p: PlayerRef, rating: CompositeRating) -> f64 {
        self.player(p).rating(rating)
    }

    fn names(&self, players: &[PlayerRef]) -> Vec<String> {
        players.iter().map(|&p| self.player(p).name.clone()).collect()
    }

    fn top(&self, t: TeamNum, pos: Position) -> Result<PlayerRef, SimError> {
        self.on_field[t.idx()]
            .top(pos)
            .map(|idx| PlayerRef { t, idx })
            .ok_or_else(|| SimError::NoEligiblePlayer {
                team: self.teams[t.idx()].name.clone(),
                position: pos,
            })
    }

    fn pick(
        &mut self,
        t: TeamNum,
        rating: Option<CompositeRating>,
        positions: &[Position],
        power: f64,
    ) -> Result<PlayerRef, SimError> {
        let idx = pick_player(
            &self.teams[t.idx()],
            &self.on_field[t.idx()],
            rating,
            positions,
            power,
            &mut self.rng,
        )?;
        Ok(PlayerRef { t, idx })
    }

    /// Add an event to the play and record the stats it implies.
    fn event(&mut self, event: PlayEvent) -> EventOutcome {
        let (outcome, deltas) = self.play.add_event(event);
        for delta in deltas {
            self.record(delta, false);
        }
        outcome
    }

    fn record_team(&mut self, t: TeamNum, stat: Stat, amt: f64) {
        self.record(StatDelta { t, p: None, stat, amt }, false);
    }

    /// Apply a stat change (or take one back) and stream it.
    fn record(&mut self, delta: StatDelta, remove: bool) {
        let StatDelta { t, p, stat, amt } = delta;
        let signed = if remove { -amt } else { amt };
        let team = &mut self.teams[t.idx()];

        let mut player_entry = None;
        if let Some(pr) = p {
            let player = &mut team.players[pr.idx];
            if stat.is_appearance() {
                player.stats.set(stat, 1.0);
                return;
            }
            if stat.is_lng() {
                let v = self.lng.log(Owner::Player(player.id), stat, amt as i32, remove);
                player.stats.set(stat, v as f64);
                player_entry = Some((player.id, v as f64));
            } else {
                player.stats.add(stat, signed);
                player_entry = Some((player.id, signed));
            }
        }

        let mut team_lng = None;
        if stat.is_lng() {
            let v = self.lng.log(Owner::Team(t), stat, amt as i32, remove) as f64;
            team.stats.set(stat, v);
            team_lng = Some(v);
        } else {
            team.stats.add(stat, signed);
        }
        if stat == Stat::Pts {
            if let Some(q) = team.pts_qtrs.last_mut() {
                *q = (*q as f64 + signed).max(0.0) as u32;
            }
        }

        match player_entry {
            Some((pid, v)) => {
                self.pbp.log_stat(t, Some(pid), stat, v);
                if let Some(v) = team_lng {
                    self.pbp.log_stat(t, None, stat, v);
                }
            }
            None => self.pbp.log_stat(t, None, stat, team_lng.unwrap_or(signed)),
        }
    }

    /// Roll for flags on the current phase of the play. Returns true if any
    /// were thrown. Tries are never flagged.
    fn check_penalties(
        &mut self,
        play_type: PenaltyPlayType,
        play_yds: i32,
        incomplete_pass: bool,
    ) -> Result<bool, SimError> {
        if self.play.current.two_point_conversion_team.is_some() {
            return Ok(false);
        }
        let ctx = FlagContext {
            play_type,
            o: self.play.current.o,
            d: self.play.current.d,
            scrimmage: self.play.current.scrimmage,
            play_yds,
            incomplete_pass,
            already_called: self.play.num_penalties(),
        };
        let calls = draw_flags(&ctx, self.cfg.foul_rate_factor, &mut self.rng);
        if calls.is_empty() {
            return Ok(false);
        }

        for mut call in calls {
            let t = call.t;
            if !call.pos_odds.is_empty() {
                let positions: Vec<Position> = self.on_field[t.idx()].positions().collect();
                let charged = charged_position(call.pos_odds, &positions, &mut self.rng);
                let at = charged.map_or(&[][..], |pos| self.on_field[t.idx()].at(pos));
                let idx = if at.is_empty() {
                    None
                } else {
                    Some(at[self.rng.rand_int(0, at.len() as i32 - 1) as usize])
                };
                call.p = Some(match idx {
                    Some(idx) => PlayerRef { t, idx },
                    None => self.pick(t, None, &[], 1.0)?,
                });
            }
            debug!(name = call.name, ?t, "flag");
            self.play.add_penalty(call);
            self.pbp.log_event(PlayByPlayEvent::Flag { clock: self.clock });
        }
        Ok(true)
    }

    fn record_drive_start(&mut self) {
        let o = self.play.current.o;
        let start = self.play.current.scrimmage as f64;
        self.record_team(o, Stat::Drives, 1.0);
        self.record_team(o, Stat::TotStartYds, start);
    }

    fn do_kickoff(&mut self, onside: bool) -> Result<f64, SimError> {
        self.update_players_on_field(FormationKind::Kickoff)?;
        let (o, d) = (self.play.current.o, self.play.current.d);
        let kicker = self.top(o, Position::K)?;
        let after_safety = self.play.current.awaiting_after_safety;
        let mut dt;

        if onside {
            dt = self.rng.rand_int(2, 5) as f64;
            let kick_to = self.rng.rand_int(40, 55);
            self.event(PlayEvent::OnsideKick { kicker, kick_to });
            self.pbp.log_event(PlayByPlayEvent::OnsideKick {
                clock: self.clock,
                t: o,
                names: self.names(&[kicker]),
            });

            let success = self.rng.chance(prob_onside_recovery(self.cfg.onside_recovery_factor));
            let p = self.pick(if success { o } else { d }, None, &[], 1.0)?;
            let mut yds = 0;
            if !success {
                self.event(PlayEvent::PossessionChange { yds: 0 });
                let raw = if self.rng.chance(0.003) { 100 } else { self.rng.rand_int(0, 5) };
                yds = self.play.bounded_yds(raw);
                dt += yds.abs() as f64 / 8.0;
            }
            let out = self.event(PlayEvent::OnsideKickRecovery { success, p, yds });
            if out.td {
                self.event(PlayEvent::KrTd { p });
            } else {
                self.do_tackle(None)?;
            }
            self.pbp.log_event(PlayByPlayEvent::OnsideKickRecovery {
                clock: self.clock,
                t: self.play.current.o,
                names: self.names(&[p]),
                success,
                td: out.td,
            });
        } else {
            let returner = self.top(d, Position::KR)?;
            let kick_to = if after_safety {
                self.rng.rand_int(15, 35)
            } else {
                self.rng.rand_int(-10, 10)
            };
            let touchback = kick_to <= -10 || (kick_to < 0 && self.rng.chance(0.8));
            self.event(PlayEvent::Kickoff { kicker, kick_to });
            self.pbp.log_event(PlayByPlayEvent::Kickoff {
                clock: self.clock,
                t: o,
                names: self.names(&[kicker]),
                touchback,
                yds: kick_to,
            });
            self.event(PlayEvent::PossessionChange { yds: 0 });

            dt = 0.0;
            if touchback {
                self.event(PlayEvent::TouchbackKick { kicker });
            } else {
                let raw = YardageModel::KICK_RETURN.draw(&mut self.rng);
                let yds = self.play.bounded_yds(raw);
                dt = yds.abs() as f64 / 8.0;
                self.check_penalties(PenaltyPlayType::KickoffReturn, yds, false)?;
                let out = self.event(PlayEvent::KickReturn { p: returner, yds });
                if out.td {
                    self.event(PlayEvent::KrTd { p: returner });
                } else {
                    self.do_tackle(None)?;
                }
                self.pbp.log_event(PlayByPlayEvent::KickoffReturn {
                    clock: self.clock,
                    t: self.play.current.o,
                    names: self.names(&[returner]),
                    td: out.td,
                    yds,
                });
            }
        }

        self.record_drive_start();
        Ok(dt)
    }

    fn do_punt(&mut self) -> Result<f64, SimError> {
        self.pbp.log_event(PlayByPlayEvent::PuntTeam {
            clock: self.clock,
            t: self.play.current.o,
        });
        self.update_players_on_field(FormationKind::Punt)?;
        if self.check_penalties(PenaltyPlayType::BeforeSnap, 0, false)? {
            return Ok(0.0);
        }

        let (o, d) = (self.play.current.o, self.play.current.d);
        let punter = self.top(o, Position::P)?;
        let returner = self.top(d, Position::PR)?;
        let max_distance = 109 - self.play.current.scrimmage;
        let mean = punt_mean_distance(self.rating(punter, CompositeRating::Punting));
        let distance = (self.rng.trunc_gauss(mean, 8.0, 25.0, 90.0).round() as i32).min(max_distance);
        let mut dt = self.rng.rand_int(5, 9) as f64;

        self.check_penalties(PenaltyPlayType::Punt, 0, false)?;
        let out = self.event(PlayEvent::Punt { p: punter, yds: distance });
        self.pbp.log_event(PlayByPlayEvent::Punt {
            clock: self.clock,
            t: o,
            names: self.names(&[punter]),
            touchback: out.touchback,
            yds: distance,
        });
        self.event(PlayEvent::PossessionChange { yds: 0 });

        if out.touchback {
            self.event(PlayEvent::TouchbackPunt { p: punter });
        } else {
            let max_return = 100 - self.play.current.scrimmage;
            let raw = YardageModel::PUNT_RETURN.draw(&mut self.rng);
            let yds = raw.clamp(0, max_return.max(0));
            dt += yds as f64 / 8.0;
            self.check_penalties(PenaltyPlayType::PuntReturn, yds, false)?;
            let ret = self.event(PlayEvent::PuntReturn { p: returner, yds });
            if ret.td {
                self.event(PlayEvent::PrTd { p: returner });
            } else {
                self.do_tackle(None)?;
            }
            self.pbp.log_event(PlayByPlayEvent::PuntReturn {
                clock: self.clock,
                t: self.play.current.o,
                names: self.names(&[returner]),
                td: ret.td,
                yds,
            });
        }

        self.record_drive_start();
        Ok(dt)
    }

    fn do_field_goal(&mut self, extra_point: bool) -> Result<f64, SimError> {
        self.update_players_on_field(FormationKind::FieldGoal)?;
        let o = self.play.current.o;
        let distance = field_goal_distance(self.play.current.scrimmage);
        let kicker = self.top(o, Position::K)?;
        let names = self.names(&[kicker]);

        let attempt = if extra_point {
            PlayByPlayEvent::ExtraPointAttempt { clock: self.clock, t: o, names: names.clone(), yds: distance }
        } else {
            PlayByPlayEvent::FieldGoalAttempt { clock: self.clock, t: o, names: names.clone(), yds: distance }
        };
        self.pbp.log_event(attempt);

        if !extra_point && self.check_penalties(PenaltyPlayType::BeforeSnap, 0, false)? {
            return Ok(0.0);
        }
        let p = self.prob_made_field_goal(self.player(kicker), distance);
        let made = self.rng.chance(p);

        let dt = if extra_point {
            self.event(PlayEvent::ExtraPoint { p: kicker, made, distance });
            0.0
        } else {
            let dt = self.rng.rand_int(4, 6) as f64;
            self.check_penalties(PenaltyPlayType::FieldGoal, 0, false)?;
            self.event(PlayEvent::FieldGoal { p: kicker, made, distance });
            dt
        };

        let result = if extra_point {
            PlayByPlayEvent::ExtraPoint { clock: self.clock, t: o, names, made, yds: distance }
        } else {
            PlayByPlayEvent::FieldGoal { clock: self.clock, t: o, names, made, yds: distance }
        };
        self.pbp.log_event(result);
        Ok(dt)
    }

    fn do_two_point_conversion(&mut self) -> Result<f64, SimError> {
        let t = self.play.current.o;
        self.event(PlayEvent::TwoPointConversion { t });
        self.pbp.log_event(PlayByPlayEvent::TwoPointConversion { clock: self.clock, t });

        let before = self.play.current.pts[t.idx()];
        if self.rng.chance(0.5 * self.cfg.pass_factor) {
            self.do_pass()?;
        } else {
            self.do_run(false)?;
        }
        let made = self.play.current.pts[t.idx()] > before;

        self.event(PlayEvent::TwoPointConversionDone { t });
        if !made {
            self.pbp.log_event(PlayByPlayEvent::TwoPointConversionFailed { clock: self.clock, t });
        }
        Ok(0.0)
    }

    fn do_tackle(&mut self, yds_from_scrimmage: Option<i32>) -> Result<(), SimError> {
        use Position::{CB, DL, LB, S};

        if !self.rng.chance(0.9) {
            return Ok(());
        }
        let positions: &[Position] = match yds_from_scrimmage {
            None => &[],
            Some(yds) => {
                let r = self.rng.uniform();
                if yds < 2 {
                    if r < 0.4 { &[DL, LB] } else { &[] }
                } else if yds < 7 {
                    if r < 0.2 {
                        &[LB]
                    } else if r < 0.4 {
                        &[LB, S]
                    } else {
                        &[]
                    }
                } else if yds < 15 {
                    if r < 0.3 {
                        &[LB, S]
                    } else if r < 0.95 {
                        &[LB, S, CB]
                    } else {
                        &[]
                    }
                } else if r < 0.3 {
                    &[S]
                } else if r < 0.9 {
                    &[S, CB]
                } else {
                    &[S, CB, LB]
                }
            }
        };

        let d = self.play.current.d;
        let count = if self.rng.chance(0.25) { 2 } else { 1 };
        let mut tacklers = Vec::with_capacity(count);
        for _ in 0..count {
            let p = self.pick(d, Some(CompositeRating::Tackling), positions, 1.5)?;
            if !tacklers.contains(&p) {
                tacklers.push(p);
            }
        }
        let loss = yds_from_scrimmage.is_some_and(|y| y < 0);
        self.event(PlayEvent::Tackle { tacklers, loss });
        Ok(())
    }

    fn do_safety(&mut self, p: Option<PlayerRef>) -> Result<(), SimError> {
        let p = match p {
            Some(p) => p,
            None => {
                let rating = if self.rng.chance(0.5) {
                    CompositeRating::PassRushing
                } else {
                    CompositeRating::RunStopping
                };
                self.pick(self.play.current.d, Some(rating), &[], 1.0)?
            }
        };
        self.event(PlayEvent::Safety { p });
        Ok(())
    }

    fn fumble_chance(&self, p: PlayerRef) -> f64 {
        prob_fumble(self.rating(p, CompositeRating::BallSecurity), self.cfg.fumble_factor)
    }

    /// `spot_yds` moves the ball to where it came out before the recovery.
    fn do_fumble(&mut self, fumbled: PlayerRef, spot_yds: i32) -> Result<f64, SimError> {
        let (o, d) = (self.play.current.o, self.play.current.d);
        let forced = self.pick(d, Some(CompositeRating::Tackling), &[], 1.0)?;
        self.event(PlayEvent::Fumble { fumbled, forced, yds: spot_yds });
        self.pbp.log_event(PlayByPlayEvent::Fumble {
            clock: self.clock,
            t: o,
            names: self.names(&[fumbled, forced]),
        });

        let lost = self.rng.uniform() > 0.5;
        let recovering_team = if lost { d } else { o };
        let recovered = self.pick(recovering_team, None, &[], 1.0)?;
        let raw = YardageModel::fumble_return(lost).draw(&mut self.rng);
        if lost {
            self.event(PlayEvent::PossessionChange { yds: 0 });
        }
        let yds = self.play.bounded_yds(raw);
        let out = self.event(PlayEvent::FumbleRecovery { fumbled, recovered, yds, lost });
        let mut dt = yds.abs() as f64 / 6.0;

        let mut fumbles_again = false;
        if !out.touchback {
            if out.td {
                self.event(PlayEvent::FumbleTd { p: recovered, lost });
            } else if out.safety {
                self.do_safety(None)?;
            } else if self.play.can_fumble() && self.rng.chance(self.fumble_chance(recovered)) {
                fumbles_again = true;
            } else {
                self.do_tackle(None)?;
            }
        }

        self.pbp.log_event(PlayByPlayEvent::FumbleRecovery {
            clock: self.clock,
            t: recovering_team,
            names: self.names(&[recovered]),
            lost,
            safety: out.safety,
            td: out.td,
            touchback: out.touchback,
            yds,
            yds_before: spot_yds,
            two_point_conversion_team: self.play.current.two_point_conversion_team,
        });

        if fumbles_again {
            dt += self.do_fumble(recovered, 0)?;
        }
        Ok(dt)
    }

    fn do_interception(&mut self, qb: PlayerRef, defender: PlayerRef, pass_yds: i32) -> Result<f64, SimError> {
        self.pbp.log_event(PlayByPlayEvent::Interception {
            clock: self.clock,
            t: self.play.current.d,
            names: self.names(&[defender]),
            yds: pass_yds,
            two_point_conversion_team: self.play.current.two_point_conversion_team,
        });
        self.event(PlayEvent::PossessionChange { yds: pass_yds });
        let raw = YardageModel::INT_RETURN.draw(&mut self.rng);
        let yds = self.play.bounded_yds(raw);
        let mut dt = yds.abs() as f64 / 8.0;
        let out = self.event(PlayEvent::Interception { qb, defender, yds_return: yds });

        let mut fumbles = false;
        if out.touchback {
            self.event(PlayEvent::TouchbackInt);
        } else if out.td {
            self.event(PlayEvent::IntTd { p: defender });
        } else if self.play.can_fumble() && self.rng.chance(self.fumble_chance(defender)) {
            fumbles = true;
        } else {
            self.do_tackle(None)?;
        }

        self.pbp.log_event(PlayByPlayEvent::InterceptionReturn {
            clock: self.clock,
            t: self.play.current.o,
            names: self.names(&[defender]),
            td: out.td,
            touchback: out.touchback,
            yds,
            two_point_conversion_team: self.play.current.two_point_conversion_team,
        });

        if fumbles {
            dt += self.do_fumble(defender, 0)?;
        }
        Ok(dt)
    }

    fn do_sack(&mut self, qb: PlayerRef) -> Result<f64, SimError> {
        let o = self.play.initial.o;
        let p = self.pick(self.play.initial.d, Some(CompositeRating::PassRushing), &[], 5.0)?;
        let raw = self.rng.rand_int(-1, -12);
        let yds = self.play.bounded_yds(raw);
        let out = self.event(PlayEvent::Sack { qb, p, yds });
        if out.safety {
            self.do_safety(Some(p))?;
        }
        self.pbp.log_event(PlayByPlayEvent::Sack {
            clock: self.clock,
            t: o,
            names: self.names(&[qb, p]),
            safety: out.safety,
            yds,
        });
        Ok(self.rng.rand_int(3, 8) as f64)
    }

    fn do_pass(&mut self) -> Result<f64, SimError> {
        self.update_players_on_field(FormationKind::Normal)?;
        if self.check_penalties(PenaltyPlayType::BeforeSnap, 0, false)? {
            return Ok(0.0);
        }
        let (o, d) = (self.play.current.o, self.play.current.d);
        let qb = self.top(o, Position::QB)?;

        self.event(PlayEvent::Dropback);
        self.pbp.log_event(PlayByPlayEvent::Dropback {
            clock: self.clock,
            t: o,
            names: self.names(&[qb]),
        });
        let mut dt = self.rng.rand_int(2, 6) as f64;

        if self.rng.chance(0.75) && self.rng.chance(self.fumble_chance(qb)) {
            let raw = self.rng.rand_int(-1, -10);
            let yds = self.play.bounded_yds(raw);
            return Ok(dt + self.do_fumble(qb, yds)?);
        }

        let (off, def) = (self.composite[o.idx()], self.composite[d.idx()]);
        let p_sack = prob_sack(
            def.pass_rushing,
            self.rating(qb, CompositeRating::AvoidingSacks),
            off.pass_blocking,
            self.cfg.sack_factor,
        );
        if self.rng.chance(p_sack) {
            return self.do_sack(qb);
        }
        let p_scramble = prob_scramble(self.player(qb).ovr(Position::RB), self.cfg.scramble_factor);
        if self.rng.chance(p_scramble) {
            return self.do_run(true);
        }

        let target_rating = if self.rng.chance(0.2) {
            CompositeRating::Catching
        } else {
            CompositeRating::GettingOpen
        };
        let target = self.pick(o, Some(target_rating), &[Position::WR, Position::TE, Position::RB], 1.0)?;
        let rb_factor = if self.on_field[o.idx()].at(Position::RB).contains(&target.idx)
            && self.rng.chance(0.75)
        {
            self.rating(target, CompositeRating::GettingOpen)
        } else {
            1.0
        };

        let mean = pass_mean_yds(off.pass_blocking, def.pass_rushing, rb_factor);
        let mut raw = self.rng.trunc_gauss(mean, rb_factor * 7.0, -5.0, 100.0).round() as i32;
        if self.rng.chance(self.rating(qb, CompositeRating::PassingDeep) * 0.05) {
            raw += self.rng.rand_int(0, 109);
        }
        let speed = self.rating(target, CompositeRating::Speed);
        raw += ((speed - 0.5) * 10.0).round() as i32;
        if self.rng.chance(speed * 0.03) {
            raw += self.rng.rand_int(0, 109);
        }
        if raw < 0 {
            raw += self.rng.rand_int(0, 5);
        }
        raw = (raw as f64 * self.cfg.pass_yds_factor).round() as i32;
        let yds = self.play.bounded_yds(raw);

        let defender = self.pick(d, Some(CompositeRating::PassCoverage), &[], 2.0)?;
        let matchup = PassMatchup {
            qb_accuracy: self.rating(qb, CompositeRating::PassingAccuracy),
            qb_deep: self.rating(qb, CompositeRating::PassingDeep),
            qb_vision: self.rating(qb, CompositeRating::PassingVision),
            target_catching: self.rating(target, CompositeRating::Catching),
            target_getting_open: self.rating(target, CompositeRating::GettingOpen),
            defender_coverage: self.rating(defender, CompositeRating::PassCoverage),
            team_pass_coverage: def.pass_coverage,
            team_pass_rushing: def.pass_rushing,
            team_pass_blocking: off.pass_blocking,
        };
        let complete = self.rng.chance(prob_complete(&matchup, self.cfg.completion_factor));
        let interception = self.rng.chance(prob_int(&matchup, self.cfg.int_factor));

        self.check_penalties(PenaltyPlayType::Pass, yds, !complete && !interception)?;
        self.event(PlayEvent::Pass { qb, target });

        if interception {
            return Ok(dt + self.do_interception(qb, defender, yds)?);
        }
        dt += yds.abs() as f64 / 20.0;

        if complete {
            let out_of_bounds = self.rng.chance(0.25);
            let out = self.event(PlayEvent::Completion { qb, target, yds, out_of_bounds });
            let logged = PlayByPlayEvent::PassComplete {
                clock: self.clock,
                t: o,
                names: self.names(&[qb, target]),
                safety: out.safety,
                td: out.td,
                yds,
                two_point_conversion_team: self.play.current.two_point_conversion_team,
            };
            if !out.td
                && !out.safety
                && self.play.can_fumble()
                && self.rng.chance(self.fumble_chance(target))
            {
                self.pbp.log_event(logged);
                return Ok(dt + self.do_fumble(target, 0)?);
            }
            if out.td {
                self.event(PlayEvent::PassTd { qb, target });
            } else if out.safety {
                self.do_safety(None)?;
            }
            self.pbp.log_event(logged);
            if !out.td && !out.safety {
                self.do_tackle(Some(yds))?;
            }
        } else {
            let defender = self.rng.chance(0.28).then_some(defender);
            self.event(PlayEvent::Incomplete { defender });
            self.pbp.log_event(PlayByPlayEvent::PassIncomplete {
                clock: self.clock,
                t: o,
                names: self.names(&[qb, target]),
                yds,
            });
        }
        Ok(dt)
    }

    fn do_run(&mut self, scramble: bool) -> Result<f64, SimError> {
        if !scramble {
            self.update_players_on_field(FormationKind::Normal)?;
            if self.check_penalties(PenaltyPlayType::BeforeSnap, 0, false)? {
                return Ok(0.0);
            }
        }
        let (o, d) = (self.play.current.o, self.play.current.d);

        let positions: &[Position] = if scramble {
            &[Position::QB]
        } else {
            let r = self.rng.uniform();
            if r < 0.5 || self.on_field[o.idx()].at(Position::RB).is_empty() {
                &[Position::RB, Position::QB]
            } else if r < 0.59 {
                &[Position::RB, Position::WR]
            } else {
                &[Position::RB]
            }
        };
        let p = self.pick(o, Some(CompositeRating::Rushing), positions, 1.0)?;
        let qb = self.top(o, Position::QB)?;
        let handoff = if p == qb { vec![qb] } else { vec![qb, p] };
        self.pbp.log_event(PlayByPlayEvent::Handoff {
            clock: self.clock,
            t: o,
            names: self.names(&handoff),
        });

        let mean = rush_mean_yds(
            self.rating(p, CompositeRating::Rushing),
            self.composite[o.idx()].run_blocking,
            self.composite[d.idx()].run_stopping,
            scramble,
        );
        let mut raw = YardageModel::run(mean).draw(&mut self.rng);
        if raw < 0 {
            raw += self.rng.rand_int(0, 5);
        }
        raw = (raw as f64 * self.cfg.rush_yds_factor).round() as i32;
        let yds = self.play.bounded_yds(raw);
        let dt = self.rng.rand_int(2, 4) as f64 + yds.abs() as f64 / 10.0;

        self.check_penalties(PenaltyPlayType::Run, yds, false)?;
        let out_of_bounds = self.rng.chance(0.1);
        let out = self.event(PlayEvent::Rush { p, yds, out_of_bounds });
        if out.td {
            self.event(PlayEvent::RushTd { p });
        } else if out.safety {
            self.do_safety(None)?;
        } else {
            self.do_tackle(Some(yds))?;
        }
        self.pbp.log_event(PlayByPlayEvent::Run {
            clock: self.clock,
            t: o,
            names: self.names(&[p]),
            safety: out.safety,
            td: out.td,
            yds,
            two_point_conversion_team: self.play.current.two_point_conversion_team,
        });

        if !out.td && !out.safety && self.play.can_fumble() && self.rng.chance(self.fumble_chance(p)) {
            return Ok(dt + self.do_fumble(p, 0)?);
        }
        Ok(dt)
    }

    fn do_kneel(&mut self) -> Result<f64, SimError> {
        self.update_players_on_field(FormationKind::Normal)?;
        let o = self.play.current.o;
        let qb = self.top(o, Position::QB)?;
        // Never kneels into the end zone.
        let yds = self.rng.rand_int(0, -3).max(1 - self.play.current.scrimmage).min(0);
        self.event(PlayEvent::Kneel { p: qb, yds });
        self.pbp.log_event(PlayByPlayEvent::Kneel {
            clock: self.clock,
            t: o,
            names: self.names(&[qb]),
            yds,
        });
        Ok(self.rng.rand_int(42, 44) as f64)
    }

    fn into_result(self) -> GameResult {
        let scoring_summary = self.pbp.scoring_summary();
        let shootout = self.shootout;
        let pts = self.state.pts;
        let teams = self.teams.map(|team| {
            let t_shootout = shootout.then(|| ShootoutScore {
                att: team.stats.get(Stat::SAtt) as u32,
                made: team.stats.get(Stat::SPts) as u32,
            });
            TeamBoxScore {
                id: team.id,
                name: team.name,
                pts: 0,
                pts_qtrs: team.pts_qtrs,
                shootout: t_shootout,
                stats: team.stats,
                players: team
                    .players
                    .into_iter()
                    .map(|p| PlayerBoxScore {
                        id: p.id,
                        name: p.name,
                        pos: p.pos,
                        injured: p.injured,
                        new_injury: p.new_injury,
                        stats: p.stats,
                    })
                    .collect(),
            }
        });
        let [mut home, mut away] = teams;
        home.pts = pts[TeamNum::Home.idx()];
        away.pts = pts[TeamNum::Away.idx()];

        let decided = pts[0] != pts[1]
            || (shootout && home.shootout.as_ref().map(|s| s.made) != away.shootout.as_ref().map(|s| s.made));
        GameResult {
            gid: self.gid,
            overtimes: self.overtimes,
            shootout,
            tied: !decided,
            neutral_site: self.neutral_site,
            teams: [home, away],
            play_by_play: self.pbp.into_events(),
            scoring_summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::play_by_play::replay_team_totals;
    use gridiron_core::seeded_rng;
    use gridiron_core::synthetic::synthetic_team;
    use proptest::prelude::*;
    use rand::rngs::mock::StepRng;

    fn matchup() -> [TeamInput; 2] {
        [synthetic_team(1, "Home", 0.6), synthetic_team(2, "Away", 0.55)]
    }

    fn run(seed: u64, cfg: GameConfig) -> GameResult {
        GameSim::new(7, matchup(), false, cfg, seeded_rng(seed))
            .and_then(GameSim::run)
            .expect("game runs")
    }

    #[test]
    fn same_seed_same_game() {
        let a = run(11, GameConfig::default()).to_json().unwrap();
        let b = run(11, GameConfig::default()).to_json().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn points_add_up_everywhere() {
        for seed in 0..8 {
            let r = run(seed, GameConfig::default());
            for team in &r.teams {
                assert_eq!(team.pts_qtrs.iter().sum::<u32>(), team.pts, "seed {seed}");
                assert_eq!(team.stats.get(Stat::Pts) as u32, team.pts, "seed {seed}");
            }
            let summary_final = r.scoring_summary.last().map_or([0, 0], |s| s.score);
            assert_eq!(summary_final, [r.teams[0].pts, r.teams[1].pts], "seed {seed}");
        }
    }

    #[test]
    fn stream_replays_team_totals() {
        let r = run(3, GameConfig::default());
        let replayed = replay_team_totals(&r.play_by_play);
        for (team, line) in r.teams.iter().zip(&replayed) {
            for stat in [Stat::Pts, Stat::PssYds, Stat::RusYds, Stat::Pen, Stat::Drives] {
                assert!(
                    (team.stats.get(stat) - line.get(stat)).abs() < 1e-9,
                    "{stat:?}: {} vs {}",
                    team.stats.get(stat),
                    line.get(stat)
                );
            }
        }
    }

    fn possession_minutes(teams: &[TeamSim; 2]) -> f64 {
        teams.iter().map(|t| t.stats.get(Stat::TimePos)).sum()
    }

    #[test]
    fn possession_time_covers_every_period() {
        for seed in 0..10 {
            let r = run(seed, GameConfig::default());
            let total: f64 = r.teams.iter().map(|t| t.stats.get(Stat::TimePos)).sum();
            assert_eq!(r.teams[0].pts_qtrs.len(), 4 + r.overtimes as usize, "seed {seed}");
            if r.overtimes == 0 {
                assert!((total - 60.0).abs() < 1e-6, "seed {seed}: total {total}");
            } else {
                let limit = 60.0 + 10.0 * r.overtimes as f64;
                assert!(total >= 60.0 - 1e-6 && total <= limit + 1e-6, "seed {seed}: total {total}");
            }
        }
    }

    #[test]
    fn overtime_adds_at_most_its_length_to_the_clock() {
        let cfg = GameConfig {
            max_overtimes: 2,
            ..GameConfig::default()
        };
        for seed in 0..6 {
            let mut game = GameSim::new(1, matchup(), false, cfg.clone(), seeded_rng(seed)).unwrap();
            game.sim_regulation().unwrap();
            assert!((possession_minutes(&game.teams) - 60.0).abs() < 1e-6, "seed {seed}");

            let level = game.state.pts[0].max(game.state.pts[1]);
            game.state.pts = [level; 2];
            while game.tied() && game.overtimes < game.cfg.max_overtimes {
                game.sim_overtime().unwrap();
            }
            assert!(game.overtimes >= 1);
            let total = possession_minutes(&game.teams);
            let limit = 60.0 + game.cfg.overtime_length * game.overtimes as f64;
            assert!(
                total >= 60.0 - 1e-6 && total <= limit + 1e-6,
                "seed {seed}: {total} minutes over {} overtimes",
                game.overtimes
            );
        }
    }

    #[test]
    fn overtime_waits_for_a_try_that_could_tie() {
        let mut game = GameSim::new(1, matchup(), true, GameConfig::default(), seeded_rng(1)).unwrap();
        game.state.awaiting_kickoff = None;
        game.state.awaiting_after_touchdown = true;
        game.state.pts = [21, 19];
        assert!(!game.overtime_decided());
        game.state.pts = [24, 17];
        assert!(game.overtime_decided());

        game.state.awaiting_after_touchdown = false;
        game.state.pts = [21, 20];
        assert!(game.overtime_decided());
        game.state.pts = [20, 20];
        assert!(!game.overtime_decided());
    }

    #[test]
    fn ten_thousand_chip_shots_by_the_roster_kicker() {
        let mut home = synthetic_team(1, "Home", 0.6);
        for p in home.players.iter_mut().filter(|p| p.pos == Position::K) {
            p.ratings.kicking_power = 0.75;
            p.ratings.kicking_accuracy = 1.0;
        }
        let cfg = GameConfig {
            foul_rate_factor: 0.0,
            ..GameConfig::default()
        };
        let teams = [home, synthetic_team(2, "Away", 0.55)];
        let mut game = GameSim::new(1, teams, true, cfg, seeded_rng(2024)).unwrap();

        let mut makes = 0;
        for _ in 0..10_000 {
            let mut state = PlayState::kickoff(TeamNum::Away).with_ball(TeamNum::Home);
            state.scrimmage = 97;
            state.down = 4;
            state.to_go = 3;
            game.state = state.clone();
            game.play = Play::new(state);
            game.do_field_goal(false).unwrap();

            let kick = game.play.events().find_map(|e| match e {
                PlayEvent::FieldGoal { p, made, distance } => Some((*p, *made, *distance)),
                _ => None,
            });
            let (kicker, made, distance) = kick.expect("field goal attempted");
            assert_eq!(distance, 20);
            assert_eq!(game.player(kicker).pos, Position::K);
            if made {
                makes += 1;
            }
        }
        assert!((9850..=9950).contains(&makes), "makes = {makes}");
    }

    #[test]
    fn clocks_stay_within_period() {
        let r = run(9, GameConfig::default());
        for event in &r.play_by_play {
            if let PlayByPlayEvent::Clock { clock, .. } = event {
                assert!((0.0..=15.0).contains(clock), "clock {clock}");
            }
        }
    }

    #[test]
    fn no_play_has_more_than_two_flags() {
        let cfg = GameConfig {
            foul_rate_factor: 20.0,
            ..GameConfig::default()
        };
        let r = run(13, cfg);
        let mut flags = 0;
        for event in &r.play_by_play {
            match event {
                PlayByPlayEvent::Clock { .. } => flags = 0,
                PlayByPlayEvent::Flag { .. } => {
                    flags += 1;
                    assert!(flags <= 2);
                }
                _ => {}
            }
        }
    }

    #[test]
    fn stub_rng_game_ends() {
        let r = GameSim::new(1, matchup(), true, GameConfig::default(), StepRng::new(0, 0))
            .and_then(GameSim::run)
            .expect("game runs");
        assert!(matches!(r.play_by_play.last(), Some(PlayByPlayEvent::GameOver { .. })));
    }

    #[test]
    fn shootout_with_every_kick_made_goes_to_sudden_death() {
        let cfg = GameConfig {
            shootout_rounds: 3,
            max_sudden_death_rounds: 5,
            ..GameConfig::default()
        };
        let mut game = GameSim::new(1, matchup(), true, cfg, StepRng::new(0, 0)).unwrap();
        game.sim_shootout().unwrap();
        for t in TeamNum::BOTH {
            assert_eq!(game.teams[t.idx()].stats.get(Stat::SAtt), 8.0);
            assert_eq!(game.teams[t.idx()].stats.get(Stat::SPts), 8.0);
        }
        let ties = game
            .pbp
            .events()
            .iter()
            .filter(|e| matches!(e, PlayByPlayEvent::ShootoutTie { .. }))
            .count();
        assert_eq!(ties, 1);
        let result = game.into_result();
        assert!(result.tied);
        assert_eq!(result.teams[0].shootout, Some(ShootoutScore { att: 8, made: 8 }));
    }

    #[test]
    fn shootout_stops_once_decided() {
        let cfg = GameConfig {
            shootout_rounds: 3,
            ..GameConfig::default()
        };
        let mut game = GameSim::new(1, matchup(), true, cfg, StepRng::new(0, 0)).unwrap();
        game.teams[TeamNum::Away.idx()].stats.set(Stat::SPts, 2.0);
        // Away two up with Home still to kick this round and two more left.
        assert!(!game.shootout_decided(TeamNum::Away, 0));
        // Away two up after the second round with one round left each.
        game.teams[TeamNum::Away.idx()].stats.set(Stat::SPts, 3.0);
        game.teams[TeamNum::Home.idx()].stats.set(Stat::SPts, 1.0);
        assert!(game.shootout_decided(TeamNum::Home, 1));
    }

    #[test]
    fn identical_rosters_on_neutral_site_start_even() {
        let teams = [synthetic_team(1, "A", 0.5), synthetic_team(2, "B", 0.5)];
        let game = GameSim::new(1, teams, true, GameConfig::default(), seeded_rng(1)).unwrap();
        assert_eq!(
            game.teams[0].players[0].ratings,
            game.teams[1].players[0].ratings
        );
        assert_eq!(game.state.pts, [0, 0]);
        assert!(game.state.awaiting_kickoff.is_some());
    }

    #[test]
    fn home_field_advantage_scales_ratings() {
        let teams = [synthetic_team(1, "A", 0.5), synthetic_team(2, "B", 0.5)];
        let game = GameSim::new(1, teams, false, GameConfig::default(), seeded_rng(1)).unwrap();
        let home = game.teams[0].players[0].rating(CompositeRating::Rushing);
        let away = game.teams[1].players[0].rating(CompositeRating::Rushing);
        assert!(home > away);
    }

    #[test]
    fn one_player_roster_cannot_field_a_lineup() {
        let mut home = synthetic_team(1, "Home", 0.5);
        home.players.truncate(1);
        home.depth.clear();
        let teams = [home, synthetic_team(2, "Away", 0.5)];
        let err = GameSim::new(1, teams, true, GameConfig::default(), seeded_rng(1))
            .and_then(GameSim::run)
            .err();
        assert!(matches!(err, Some(SimError::NoEligiblePlayer { .. })), "{err:?}");
    }

    #[test]
    fn starters_get_credit_for_a_start() {
        let r = run(2, GameConfig::default());
        for team in &r.teams {
            let starts = team.players.iter().filter(|p| p.stats.get(Stat::Gs) == 1.0).count();
            assert!((11..=22).contains(&starts), "{starts} starters");
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(6))]

        #[test]
        fn energy_stays_in_range(seed in any::<u64>()) {
            let mut game = GameSim::new(1, matchup(), false, GameConfig::default(), seeded_rng(seed)).unwrap();
            game.sim_regulation().unwrap();
            for team in &game.teams {
                for p in &team.players {
                    prop_assert!((0.0..=1.0).contains(&p.energy));
                }
            }
            prop_assert!(game.clock >= 0.0);
        }
    }
}
