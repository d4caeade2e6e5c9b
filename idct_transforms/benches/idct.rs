// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use idct_transforms::{idct8x8, idct8x8_blocks, CoefficientTable, BLOCK_SIZE};
use std::hint::black_box;

fn bench_idct8x8(c: &mut Criterion) {
    let coeffs: CoefficientTable = std::array::from_fn(|i| i as u16);
    let mut group = c.benchmark_group("idct8x8");

    let block: [i16; BLOCK_SIZE] = std::array::from_fn(|i| i as i16);
    let mut out = [0i16; BLOCK_SIZE];
    group.throughput(Throughput::Bytes((BLOCK_SIZE * 2) as u64));
    group.bench_function("single", |b| {
        b.iter(|| idct8x8(black_box(&block), &coeffs, &mut out, true))
    });

    // Sparse rows take the DC shortcut in the row pass.
    let mut sparse = [0i16; BLOCK_SIZE];
    for row in 0..8 {
        sparse[row * 8] = row as i16 * 3 - 7;
    }
    group.bench_function("dc_only", |b| {
        b.iter(|| idct8x8(black_box(&sparse), &coeffs, &mut out, false))
    });

    for blocks in [64usize, 1024, 16384] {
        let input: Vec<i16> = (0..blocks * BLOCK_SIZE)
            .map(|i| (i % 64) as i16)
            .collect();
        let mut output = vec![0i16; input.len()];
        group.throughput(Throughput::Bytes((input.len() * 2) as u64));
        group.bench_with_input(BenchmarkId::new("blocks", blocks), &input, |b, input| {
            b.iter(|| {
                idct8x8_blocks(black_box(input), &coeffs, &mut output, true);
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_idct8x8);
criterion_main!(benches);
