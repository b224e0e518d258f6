//! Kinship Benchmark Suite
//!
//! Per-command latency through the facade on an in-memory store:
//!   propose_and_accept ........ one full marriage handshake
//!   kidnap_attempt ............ guard chain + cooldown write + roll
//!   kidnap_info_lazy_expiry ... read that collects an expired row
//!   list_children_50 .......... positional listing of a large family

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use kinship_core::config::KinshipConfig;
use kinship_core::{Choice, FixedChance, Kinship, ManualClock, Person, Store, UserId};

fn engine(chance: FixedChance) -> (Kinship, Arc<ManualClock>) {
    let config = KinshipConfig::default();
    let start = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("valid date");
    let clock = Arc::new(ManualClock::new(start));
    let store = Store::open_in_memory(&config.persistence).expect("open");
    let k = Kinship::with_parts(store, config, clock.clone(), Box::new(chance)).expect("engine");
    (k, clock)
}

fn person(n: i64) -> Person {
    Person::new(UserId(n), format!("user{n}"))
}

fn marry(k: &Kinship, a: &Person, b: &Person) {
    let p = k.propose(a, b).expect("propose");
    k.respond_proposal(p.id, b.id, Choice::Accept).expect("accept");
}

/// Benchmark: propose + accept + divorce, so every iteration starts single.
fn bench_marriage_handshake(c: &mut Criterion) {
    let (k, _) = engine(FixedChance::NEVER);
    let (a, b) = (person(1), person(2));

    c.bench_function("propose_and_accept", |bench| {
        bench.iter(|| {
            marry(&k, black_box(&a), black_box(&b));
            let prompt = k.divorce(a.id).expect("prompt");
            k.confirm_divorce(a.id, prompt.marriage_id, Choice::Accept)
                .expect("divorce");
        });
    });
}

/// Benchmark: a kidnap attempt that passes every guard and misses.
fn bench_kidnap_attempt(c: &mut Criterion) {
    let (k, clock) = engine(FixedChance::NEVER);
    let (kidnapper, victim) = (person(1), person(3));
    marry(&k, &kidnapper, &person(2));
    marry(&k, &victim, &person(4));

    c.bench_function("kidnap_attempt", |bench| {
        bench.iter(|| {
            clock.advance(Duration::minutes(15));
            black_box(k.kidnap(&kidnapper, &victim).expect("attempt"));
        });
    });
}

/// Benchmark: kidnap_info on a kidnapping that has just lapsed.
fn bench_lazy_expiry(c: &mut Criterion) {
    let (k, clock) = engine(FixedChance::ALWAYS);
    let (kidnapper, victim) = (person(1), person(3));
    marry(&k, &kidnapper, &person(2));
    marry(&k, &victim, &person(4));

    c.bench_function("kidnap_info_lazy_expiry", |bench| {
        bench.iter(|| {
            clock.advance(Duration::hours(7));
            k.kidnap(&kidnapper, &victim).expect("capture");
            clock.advance(Duration::hours(7));
            black_box(k.kidnap_info(kidnapper.id).expect("info"));
        });
    });
}

/// Benchmark: listing 50 children.
fn bench_list_children(c: &mut Criterion) {
    let (k, clock) = engine(FixedChance::ALWAYS);
    marry(&k, &person(1), &person(2));
    for _ in 0..50 {
        k.make_love(UserId(1)).expect("born");
        clock.advance(Duration::seconds(1));
    }

    c.bench_function("list_children_50", |bench| {
        bench.iter(|| black_box(k.list_children(black_box(UserId(2))).expect("list")));
    });
}

criterion_group!(
    benches,
    bench_marriage_handshake,
    bench_kidnap_attempt,
    bench_lazy_expiry,
    bench_list_children,
);
criterion_main!(benches);
