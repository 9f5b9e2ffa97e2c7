#![deny(warnings)]

//! Headless CLI: simulate one game and print the box score.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use gridiron_core::synthetic::synthetic_team;
use gridiron_core::{GameConfig, TeamInput};
use gridiron_engine::{simulate_game, GameResult, Stat};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct Args {
    home: Option<PathBuf>,
    away: Option<PathBuf>,
    config: Option<PathBuf>,
    seed: Option<u64>,
    neutral: bool,
    pbp: bool,
    json: bool,
}

fn parse_args() -> Args {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--home" => args.home = it.next().map(PathBuf::from),
            "--away" => args.away = it.next().map(PathBuf::from),
            "--config" => args.config = it.next().map(PathBuf::from),
            "--seed" => args.seed = it.next().and_then(|s| s.parse().ok()),
            "--neutral" => args.neutral = true,
            "--pbp" => args.pbp = true,
            "--json" => args.json = true,
            other => warn!(arg = other, "ignoring unknown argument"),
        }
    }
    args
}

/// Roster from `path`, or a synthetic one when no file was given or it does
/// not exist.
fn load_team(path: Option<&Path>, id: u32, name: &str, quality: f64) -> Result<TeamInput> {
    match path {
        Some(path) if path.exists() => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading roster {}", path.display()))?;
            TeamInput::from_json(&json).with_context(|| format!("parsing roster {}", path.display()))
        }
        Some(path) => {
            warn!(path = %path.display(), "roster not found, using a synthetic team");
            Ok(synthetic_team(id, name, quality))
        }
        None => Ok(synthetic_team(id, name, quality)),
    }
}

fn load_config(path: Option<&Path>) -> Result<GameConfig> {
    match path {
        Some(path) if path.exists() => GameConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        Some(path) => {
            warn!(path = %path.display(), "config not found, using defaults");
            Ok(GameConfig::default())
        }
        None => Ok(GameConfig::default()),
    }
}

fn clock(minutes: f64) -> String {
    let secs = (minutes * 60.0).round() as i64;
    format!("{}:{:02}", secs / 60, secs % 60)
}

fn print_box_score(result: &GameResult) {
    let names = [result.teams[0].name.clone(), result.teams[1].name.clone()];
    let width = names.iter().map(String::len).max().unwrap_or(4).max(4);

    let periods = result.teams[0].pts_qtrs.len();
    let header: String = (1..=periods)
        .map(|q| if q > 4 { format!(" OT{:<2}", q - 4) } else { format!(" {q:>4}") })
        .collect();
    println!("{:width$}{header}    F", "");
    for team in &result.teams {
        let by_period: String = team.pts_qtrs.iter().map(|p| format!(" {p:>4}")).collect();
        let shootout = team
            .shootout
            .map(|s| format!("  (shootout {}/{})", s.made, s.att))
            .unwrap_or_default();
        println!("{:width$}{by_period} {:>4}{shootout}", team.name, team.pts);
    }
    if result.tied {
        println!("Final: tie");
    }

    println!("\nScoring summary");
    for play in &result.scoring_summary {
        println!(
            "  Q{} {:>5}  {:<width$} {:?} {} ({} yds)  {}-{}",
            play.quarter,
            clock(play.clock),
            names[play.t.idx()],
            play.kind,
            play.names.join(", "),
            play.yds,
            play.score[0],
            play.score[1],
        );
    }

    println!("\nTeam totals");
    let rows = [
        ("Passing yards", Stat::PssYds),
        ("Rushing yards", Stat::RusYds),
        ("Turnovers", Stat::FmbLost),
        ("Interceptions thrown", Stat::PssInt),
        ("Sacks allowed", Stat::PssSk),
        ("Penalties", Stat::Pen),
        ("Penalty yards", Stat::PenYds),
        ("Drives", Stat::Drives),
    ];
    println!("  {:<22}{:>width$}  {:>width$}", "", names[0], names[1]);
    for (label, stat) in rows {
        println!(
            "  {:<22}{:>width$}  {:>width$}",
            label,
            result.teams[0].stats.get(stat),
            result.teams[1].stats.get(stat)
        );
    }
    println!(
        "  {:<22}{:>width$}  {:>width$}",
        "Time of possession",
        clock(result.teams[0].stats.get(Stat::TimePos)),
        clock(result.teams[1].stats.get(Stat::TimePos))
    );
}

fn print_play_by_play(result: &GameResult) {
    let names = [result.teams[0].name.clone(), result.teams[1].name.clone()];
    for event in &result.play_by_play {
        if let Some(line) = event.describe(&names) {
            println!("{line}");
        }
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = parse_args();
    let seed = args.seed.unwrap_or(42);
    info!(?args, seed, "starting CLI");

    let cfg = load_config(args.config.as_deref())?;
    let home = load_team(args.home.as_deref(), 1, "Home", 0.6)?;
    let away = load_team(args.away.as_deref(), 2, "Away", 0.55)?;

    let result = simulate_game(1, [home, away], args.neutral, cfg, seed).context("simulating game")?;

    if args.json {
        println!("{}", result.to_json().context("serializing result")?);
        return Ok(());
    }
    if args.pbp {
        print_play_by_play(&result);
        println!();
    }
    print_box_score(&result);
    Ok(())
}
