use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gridiron_ai::{choose_play_type, Situation};
use gridiron_core::{seeded_rng, GameConfig};

fn situations() -> Vec<Situation> {
    let mut out = Vec::new();
    for quarter in 1..=5u32 {
        for down in 1..=4u8 {
            for pts_down in [-14, -3, 0, 4, 10] {
                for scrimmage in [20, 45, 70, 96] {
                    out.push(Situation {
                        down,
                        to_go: 1 + i32::from(down) * 2,
                        scrimmage,
                        pts_down,
                        quarter,
                        clock: 15.0 / f64::from(quarter),
                        overtime_state: None,
                        awaiting_kickoff: false,
                        awaiting_after_touchdown: false,
                        awaiting_after_safety: false,
                        defense_timeouts: 2,
                        prob_made_field_goal: f64::from(scrimmage) / 100.0,
                        pass_tendency: 0.57,
                    });
                }
            }
        }
    }
    out
}

fn bench_play_calls(c: &mut Criterion) {
    let cfg = GameConfig::default();
    let grid = situations();
    c.bench_function("choose_play_type x400 situations", |b| {
        let mut rng = seeded_rng(42);
        b.iter(|| {
            for s in &grid {
                black_box(choose_play_type(black_box(s), &cfg, &mut rng));
            }
        })
    });
}

criterion_group!(benches, bench_play_calls);
criterion_main!(benches);
