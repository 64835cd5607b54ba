// ============================================================================
// Bulk Pipeline Benchmarks
// ============================================================================
//
// Benchmark Categories:
// 1. Formula evaluation - one calculation plus precision narrowing
// 2. Campaign calculation - every derived field of one campaign
// 3. Bulk upsert - validate, calculate and persist through the in-memory store
// ============================================================================

use campaign_finance_engine::prelude::*;
use chrono::NaiveDate;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rust_decimal::Decimal;
use std::hint::black_box;
use std::sync::Arc;

fn campaign(i: usize) -> Campaign {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    Campaign::new(format!("CN-{}", i), format!("Campaign {}", i))
        .with_platform("meta")
        .with_unit_type("cpm")
        .with_flight(start, NaiveDate::from_ymd_opt(2024, 3, 31).unwrap())
        .with_as_of(NaiveDate::from_ymd_opt(2024, 2, 15).unwrap())
        .with_revenue(Decimal::new(2_500_000, 2), Some(Decimal::new(15, 0)))
        .with_target_margin(Decimal::new(20, 0))
        .with_media_cost(Decimal::new(1_800_000, 2))
        .with_budget(Decimal::new(2_000_000, 2))
        .with_actual_spend(Decimal::new(900_000 + i as i64, 2))
        .with_delivery(
            Some(Decimal::new(5_000_000, 0)),
            Some(Decimal::new(2_300_000, 0)),
            Some(Decimal::new(2_300_000, 0)),
        )
}

// ============================================================================
// Engine Benchmarks
// ============================================================================

fn benchmark_formula(c: &mut Criterion) {
    let engine = EngineBuilder::new().build().unwrap();
    let operands = [Decimal::new(400_000, 2), Decimal::new(1_000_000, 2)];

    c.bench_function("spend_percentage_storage", |b| {
        b.iter(|| {
            let result = engine
                .calculate(black_box("spendPercentage"), black_box(&operands))
                .unwrap()
                .unwrap();
            black_box(engine.with_precision(&result, PrecisionContext::Storage, None))
        });
    });
}

fn benchmark_campaign_calculation(c: &mut Criterion) {
    let engine = EngineBuilder::new().build().unwrap();
    let calculator = FieldCalculator::new(&engine, PrecisionContext::Storage);
    let template = campaign(0);

    c.bench_function("campaign_apply_calculations", |b| {
        b.iter(|| {
            let mut item = template.clone();
            item.apply_calculations(&calculator).unwrap();
            black_box(item)
        });
    });
}

// ============================================================================
// Bulk Benchmarks
// ============================================================================

fn benchmark_bulk_upsert(c: &mut Criterion) {
    let mut group = c.benchmark_group("bulk_upsert");
    group.sample_size(20);

    for size in [100usize, 1_000, 5_000].iter() {
        let items: Vec<Campaign> = (0..*size).map(campaign).collect();

        for workers in [1usize, 4].iter() {
            group.bench_with_input(
                BenchmarkId::new(format!("workers_{}", workers), size),
                &items,
                |b, items| {
                    b.iter(|| {
                        let engine = Arc::new(EngineBuilder::new().build().unwrap());
                        let store = Arc::new(InMemoryStore::<Campaign>::new());
                        let orchestrator =
                            BulkOrchestrator::<Campaign>::new(engine, store).with_workers(*workers);
                        black_box(
                            orchestrator
                                .bulk_upsert(items.clone(), &BulkOptions::default())
                                .unwrap(),
                        )
                    });
                },
            );
        }
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_formula,
    benchmark_campaign_calculation,
    benchmark_bulk_upsert
);
criterion_main!(benches);
