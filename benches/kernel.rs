// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

#[macro_use]
extern crate criterion;

use attractors::{accumulate, render, AttractorParameters, NeverCancel, PlaneMapper, RunState};
use criterion::Criterion;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn bench_accumulate(c: &mut Criterion) {
    let params = AttractorParameters::default();
    let plane = PlaneMapper::centered(512, 512, &params).unwrap();
    c.bench_function("accumulate 100k clifford points", move |b| {
        let mut density = vec![0u32; plane.len()];
        let mut rng = StdRng::seed_from_u64(1);
        b.iter(|| {
            accumulate(
                RunState::new(0.1, 0.1),
                &params,
                &plane,
                100_000,
                &mut density,
                &NeverCancel,
                &mut rng,
            )
            .unwrap()
        })
    });
}

fn bench_render(c: &mut Criterion) {
    let params = AttractorParameters::default();
    let plane = PlaneMapper::centered(512, 512, &params).unwrap();
    let mut density = vec![0u32; plane.len()];
    let acc = accumulate(
        RunState::new(0.1, 0.1),
        &params,
        &plane,
        1_000_000,
        &mut density,
        &NeverCancel,
        &mut StdRng::seed_from_u64(2),
    )
    .unwrap();
    let max_density = acc.state.max_density;
    c.bench_function("render 512x512 high quality", move |b| {
        let mut image = vec![0u32; plane.len()];
        b.iter(|| render(&density, max_density, &plane, true, &params, &mut image).unwrap())
    });
}

criterion_group!(benches, bench_accumulate, bench_render);
criterion_main!(benches);
