// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use criterion::{BenchmarkId, Criterion, SamplingMode, criterion_group, criterion_main};
use idct_offload::BLOCK_SIZE;
use idct_offload::device::EmulatedDevice;
use idct_offload::memory::HostMemory;
use idct_offload::monitor::CompletionFlag;
use idct_offload::pipeline::SlotPipeline;
use idct_offload::planner::BatchPlan;

const BATCH_SIZE: usize = 256;
const NUM_BATCHES: usize = 32;
const NUM_BLOCKS: usize = BATCH_SIZE * NUM_BATCHES;

fn offload_benches(c: &mut Criterion) {
    let mut group = c.benchmark_group("offload");
    group.sampling_mode(SamplingMode::Flat);
    group.throughput(criterion::Throughput::Bytes(
        (NUM_BLOCKS * BLOCK_SIZE * size_of::<i16>()) as u64,
    ));

    let memory = HostMemory::ramp(NUM_BLOCKS).unwrap();
    for num_slots in [1, 2, 4, 8] {
        let plan = BatchPlan::new(NUM_BLOCKS, BATCH_SIZE, num_slots).unwrap();
        group.bench_with_input(BenchmarkId::new("slots", num_slots), &plan, |b, plan| {
            // The device and its queue threads are shared by all iterations.
            let mut device = EmulatedDevice::new("bench").unwrap();
            b.iter(|| {
                SlotPipeline::new(&mut device, *plan, &memory, true)
                    .unwrap()
                    .run(&CompletionFlag::new())
                    .unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(
    name = offload;
    config = Criterion::default().sample_size(20);
    targets = offload_benches
);
criterion_main!(offload);
