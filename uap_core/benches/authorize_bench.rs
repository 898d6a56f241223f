//! Authorization and profile benchmarks.
//!
//! Measures the cached permission decision on the hot path and the cost of
//! building and applying the reference profile against the simulator.

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use uap_common::layout::{ConfigObjectKind, Operation};
use uap_common::slot::PairingKeySlot;
use uap_core::drivers::simulation::{SimulatedChip, factory_credentials};
use uap_core::{ChipHandle, reference_r_config};

fn admin_handle() -> ChipHandle<SimulatedChip> {
    let mut handle = ChipHandle::new(SimulatedChip::new());
    handle.init().unwrap();
    handle
        .start_session(&factory_credentials(), PairingKeySlot::SH0)
        .unwrap();
    handle
}

fn bench_authorize_cached(c: &mut Criterion) {
    let mut handle = admin_handle();
    // Warm the cache.
    handle.authorize(Operation::EccKeyGenerate(9)).unwrap();

    c.bench_function("authorize_cached_ecc_generate", |b| {
        b.iter(|| {
            black_box(handle.authorize(black_box(Operation::EccKeyGenerate(9))).unwrap());
        });
    });
}

fn bench_locate(c: &mut Criterion) {
    c.bench_function("locate_r_mem_data_read", |b| {
        b.iter(|| black_box(Operation::RMemDataRead(black_box(300)).locate().unwrap()));
    });
}

fn bench_build_reference_profile(c: &mut Criterion) {
    c.bench_function("build_reference_profile", |b| {
        b.iter(|| black_box(reference_r_config().unwrap()));
    });
}

fn bench_apply_profile(c: &mut Criterion) {
    let mut handle = admin_handle();
    let profile = reference_r_config().unwrap();

    c.bench_function("apply_reference_profile", |b| {
        b.iter(|| {
            let mut registry = handle.config();
            registry.erase(ConfigObjectKind::RConfig).unwrap();
            black_box(registry.apply_profile(&profile).unwrap());
        });
    });
}

criterion_group!(
    benches,
    bench_authorize_cached,
    bench_locate,
    bench_build_reference_profile,
    bench_apply_profile,
);
criterion_main!(benches);
