use std::hint::black_box;
use std::sync::Arc;

use chrono::NaiveDate;
use criterion::{criterion_group, criterion_main, Criterion};

use filecabinet::construct::{Cabinet, CabinetConfig, Record, RecordStore};
use filecabinet::datatype::Decimal;
use filecabinet::engine::Engine;
use filecabinet::query::{parse_select, parse_where};
use filecabinet::validation::AcceptAll;

const FIRST_NAMES: [&str; 8] = ["Ann", "Bob", "Cid", "Dee", "Eve", "Fay", "Gus", "Hal"];
const LAST_NAMES: [&str; 5] = ["Lee", "Ray", "Fox", "Kim", "Moe"];

fn populated(n: usize) -> Cabinet {
    let mut cabinet = Cabinet::new(CabinetConfig::new(Arc::new(AcceptAll)));
    for i in 0..n {
        let record = Record {
            id: 0,
            first_name: FIRST_NAMES[i % FIRST_NAMES.len()].to_string(),
            last_name: LAST_NAMES[i % LAST_NAMES.len()].to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1950 + (i % 50) as i32, 1 + (i % 12) as u32, 1).unwrap(),
            identification_number: Decimal::from(i as i64 + 1),
            identification_letter: 'A',
            points: (i % 1000) as i16,
        };
        cabinet.create(record, true).unwrap();
    }
    cabinet
}

pub fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("compile where 1", |b| b.iter(|| parse_where(black_box("firstname = 'Ann'"))));
    c.bench_function("compile where 5", |b| {
        b.iter(|| {
            parse_where(black_box(
                "firstname = 'Ann' or firstname = 'Bob' and lastname = 'Lee' or points = 10 and letter = 'A'",
            ))
        })
    });

    let cabinet = populated(100_000);
    c.bench_function("find by first name 100k", |b| b.iter(|| cabinet.find_by_first_name(black_box("ann")).len()));
    let born = NaiveDate::from_ymd_opt(1975, 6, 1).unwrap();
    c.bench_function("find by date of birth 100k", |b| b.iter(|| cabinet.find_by_date_of_birth(black_box(born)).len()));

    let query = parse_where("lastname = 'Lee' and points = 10").unwrap();
    let projector = parse_select("id, firstname").unwrap();
    c.bench_function("select scan 100k", |b| b.iter(|| cabinet.select(&query.predicate, &projector).count()));

    let engine = Engine::new();
    let statement = engine.compile("select id where lastname = 'Lee' and points = 10").unwrap();
    c.bench_function("select memo 100k", |b| b.iter(|| engine.run_read(&cabinet, &statement).unwrap().rows.len()));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
