use beacon_sdk::{BatchQueue, Data, Event, Sanitizer, Value};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn event(i: u64) -> Event {
    let mut event = Event::new("bench.event", i);
    event.data.insert("i".into(), Value::from(i));
    event
}

/// Push into a queue that is already at capacity (drop-oldest path)
fn bench_push_at_capacity(c: &mut Criterion) {
    let mut queue = BatchQueue::new(1000);
    for i in 0..1000 {
        queue.push(event(i));
    }

    c.bench_function("push_at_capacity", |b| {
        let mut i = 1000;
        b.iter(|| {
            i += 1;
            black_box(queue.push(event(i)));
        });
    });
}

/// Drain and requeue a failed batch of varying size
fn bench_drain_and_requeue(c: &mut Criterion) {
    let mut group = c.benchmark_group("drain_and_requeue");

    for size in [10u64, 50, 500, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let mut queue = BatchQueue::new(1000);
            for i in 0..size {
                queue.push(event(i));
            }
            b.iter(|| {
                let batch = queue.drain_all();
                black_box(queue.requeue_front(batch.into_events()));
            });
        });
    }
    group.finish();
}

/// Sanitize detail maps of varying width
fn bench_sanitize(c: &mut Criterion) {
    let mut group = c.benchmark_group("sanitize");
    let sanitizer = Sanitizer::default();

    for keys in [1usize, 5, 20].iter() {
        let data: Data = (0..*keys)
            .map(|k| {
                let key = if k % 4 == 0 { format!("token{k}") } else { format!("field{k}") };
                (key, Value::from("v".repeat(300)))
            })
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(keys), &data, |b, data| {
            b.iter(|| black_box(sanitizer.sanitize(data.clone())));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_push_at_capacity,
    bench_drain_and_requeue,
    bench_sanitize,
);
criterion_main!(benches);
