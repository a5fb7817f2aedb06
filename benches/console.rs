//! Criterion benchmarks for the reference console and the daemon tick path.
//!
//! Run with:
//!   cargo bench
//!
//! Results are saved to target/criterion/

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use padlink::console::Console;
use padlink::input::InputEvent;
use padlink::machine::Machine;

fn make_console(rom_len: usize) -> Console {
    let rom: Vec<u8> = (0..rom_len).map(|i| (i * 7 + 3) as u8).collect();
    Console::from_rom("bench.rom", rom).expect("non-empty rom")
}

/// One frame advance, with and without input traffic.
fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");
    group.throughput(Throughput::Elements(1));

    group.bench_function("idle", |b| {
        let mut console = make_console(32 * 1024);
        b.iter(|| black_box(console.tick().expect("tick")));
    });

    group.bench_function("press_release", |b| {
        let mut console = make_console(32 * 1024);
        let mut press = true;
        b.iter(|| {
            let ev = if press {
                InputEvent::PRESS_BUTTON_A
            } else {
                InputEvent::RELEASE_BUTTON_A
            };
            press = !press;
            console.send_input(ev);
            black_box(console.tick().expect("tick"))
        });
    });

    group.finish();
}

/// Save-state encode cost after varying amounts of execution.
fn bench_save_state(c: &mut Criterion) {
    let mut group = c.benchmark_group("save_state");

    for frames in [0u64, 600, 36_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(frames), frames, |b, &frames| {
            let mut console = make_console(32 * 1024);
            for _ in 0..frames {
                console.tick().expect("tick");
            }
            let mut blob = Vec::with_capacity(16 * 1024);
            b.iter(|| {
                blob.clear();
                console.save_state(&mut blob).expect("save");
                black_box(blob.len())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_tick, bench_save_state);
criterion_main!(benches);
