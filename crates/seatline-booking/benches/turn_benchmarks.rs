//! Benchmarks for the per-turn work done before any store write.
//!
//! Every chat message is classified and scanned by the slot extractors, and
//! every reservation attempt runs a conflict check against the table's and
//! the customer's existing reservations.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use seatline_booking::intent::{Classifier, KeywordClassifier};
use seatline_booking::slots::{extract_capacity, extract_date, extract_time};
use seatline_booking::{ConflictResolver, Session};
use seatline_core::memory::MemoryTableStore;
use seatline_core::settings::StaticSettings;
use seatline_core::store::TableStore;
use seatline_core::types::{NewTable, TableId, TableType, UserId};

const MESSAGES: [&str; 8] = [
    "book a table for 4",
    "is a table available for 6 tonight?",
    "what's my queue position",
    "add me to the queue, party of 3",
    "cancel reservation",
    "show my reservations",
    "tomorrow at 7:30 pm please",
    "hello there",
];

fn evening(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 6, day)
        .and_then(|d| d.and_hms_opt(hour, 0, 0))
        .unwrap()
}

/// A floor of 40 tables with every other table reserved.
fn busy_floor() -> Arc<MemoryTableStore> {
    let defs = (1..=40).map(|n| NewTable {
        number: n,
        capacity: 2 + (n % 4) * 2,
        table_type: if n % 10 == 0 { TableType::Vip } else { TableType::Regular },
    });
    let store = MemoryTableStore::with_tables(defs).unwrap();
    for id in (1..=40).step_by(2) {
        store
            .set_reserved(TableId(id), UserId(id), evening(1 + (id as u32 % 5), 19), 90)
            .unwrap();
    }
    Arc::new(store)
}

fn bench_classify_and_extract(c: &mut Criterion) {
    let classifier = KeywordClassifier::new();
    let session = Session::default();
    let today = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();

    let mut group = c.benchmark_group("turn_parsing");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("classify", |b| {
        let mut idx = 0usize;
        b.iter(|| {
            let text = MESSAGES[idx % MESSAGES.len()];
            idx += 1;
            black_box(classifier.classify(black_box(text), &session))
        });
    });

    group.bench_function("extract_slots", |b| {
        let mut idx = 0usize;
        b.iter(|| {
            let text = MESSAGES[idx % MESSAGES.len()];
            idx += 1;
            black_box((
                extract_capacity(text),
                extract_date(text, today),
                extract_time(text),
            ))
        });
    });

    group.finish();
}

fn bench_conflict_check(c: &mut Criterion) {
    let resolver = ConflictResolver::new(busy_floor(), Arc::new(StaticSettings::new()));

    let mut group = c.benchmark_group("conflict");
    group.bench_function("free_table", |b| {
        b.iter(|| {
            resolver
                .has_conflict(TableId(2), UserId(99), black_box(evening(3, 20)), 60)
                .unwrap()
        });
    });
    group.bench_function("reserved_table", |b| {
        b.iter(|| {
            resolver
                .has_conflict(TableId(3), UserId(99), black_box(evening(4, 19)), 60)
                .unwrap()
        });
    });
    group.finish();
}

criterion_group!(benches, bench_classify_and_extract, bench_conflict_check);
criterion_main!(benches);
