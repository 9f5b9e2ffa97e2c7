use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gridiron_core::synthetic::synthetic_team;
use gridiron_core::GameConfig;
use gridiron_engine::simulate_game;

fn bench_full_game(c: &mut Criterion) {
    let cfg = GameConfig::default();
    let home = synthetic_team(1, "Home", 0.6);
    let away = synthetic_team(2, "Away", 0.55);
    let mut seed = 0u64;
    c.bench_function("simulate_game synthetic", |b| {
        b.iter(|| {
            seed += 1;
            let result = simulate_game(1, [home.clone(), away.clone()], false, cfg.clone(), seed);
            black_box(result.map(|r| r.teams[0].pts))
        })
    });
}

fn bench_full_game_with_shootout(c: &mut Criterion) {
    let cfg = GameConfig {
        max_overtimes: 0,
        shootout_rounds: 5,
        ..GameConfig::default()
    };
    let home = synthetic_team(1, "Home", 0.5);
    let away = synthetic_team(2, "Away", 0.5);
    c.bench_function("simulate_game evenly matched", |b| {
        b.iter(|| {
            let result = simulate_game(1, [home.clone(), away.clone()], true, cfg.clone(), black_box(7));
            black_box(result.map(|r| r.play_by_play.len()))
        })
    });
}

criterion_group!(benches, bench_full_game, bench_full_game_with_shootout);
criterion_main!(benches);
