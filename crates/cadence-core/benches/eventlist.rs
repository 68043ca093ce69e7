//! Event-list micro-benchmarks: insert, pop, and cancel throughput.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

use cadence_core::{EventList, SimEvent, Ticks, NORMAL_PRIORITY};

fn filled_list(n: u64) -> EventList<Ticks> {
    let mut list = EventList::new();
    for i in 0..n {
        // Spread times so the tree has realistic shape; collide every
        // fourth event to exercise the seq tie-break.
        list.insert(SimEvent::new(Ticks(i / 4), NORMAL_PRIORITY, || Ok(())));
    }
    list
}

fn bench_insert(c: &mut Criterion) {
    c.bench_function("eventlist_insert_10k", |b| {
        b.iter_batched(
            EventList::<Ticks>::new,
            |mut list| {
                for i in 0..10_000u64 {
                    list.insert(SimEvent::new(Ticks(i % 512), NORMAL_PRIORITY, || Ok(())));
                }
                list
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_pop(c: &mut Criterion) {
    c.bench_function("eventlist_drain_10k", |b| {
        b.iter_batched(
            || filled_list(10_000),
            |mut list| {
                while list.pop_first().is_some() {}
                list
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_cancel(c: &mut Criterion) {
    c.bench_function("eventlist_cancel_10k", |b| {
        b.iter_batched(
            || {
                let mut list = EventList::new();
                let handles: Vec<_> = (0..10_000u64)
                    .map(|i| list.insert(SimEvent::new(Ticks(i / 4), NORMAL_PRIORITY, || Ok(()))))
                    .collect();
                (list, handles)
            },
            |(mut list, handles)| {
                for handle in &handles {
                    list.remove(handle);
                }
                list
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_insert, bench_pop, bench_cancel);
criterion_main!(benches);
