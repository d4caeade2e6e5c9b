// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Runs the accelerator and the reference side by side and compares them.

use std::thread;
use std::time::Instant;

use crate::device::AcceleratorDevice;
use crate::error::{Error, Result};
use crate::memory::HostMemory;
use crate::monitor::{
    CompletionFlag, CompletionLatch, ProgressMonitor, ProgressSink, Throughput, Timings,
};
use crate::pipeline::{PipelineStats, SlotPipeline};
use crate::planner::BatchPlan;
use crate::reference::run_reference;
use crate::util::tracing_wrappers::*;
use crate::validate::{Validation, validate};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BenchReport {
    pub validation: Validation,
    pub timings: Timings,
    /// Input bytes each side transformed.
    pub bytes_processed: u64,
    pub pipeline: PipelineStats,
}

impl BenchReport {
    pub fn passed(&self) -> bool {
        self.validation.passed()
    }

    pub fn accelerator_throughput(&self) -> Throughput {
        Throughput {
            bytes: self.bytes_processed,
            elapsed: self.timings.accelerator,
        }
    }

    pub fn reference_throughput(&self) -> Throughput {
        Throughput {
            bytes: self.bytes_processed,
            elapsed: self.timings.reference,
        }
    }

    /// How many times faster the accelerator was than the reference.
    pub fn speedup(&self) -> f64 {
        self.accelerator_throughput().mib_per_sec() / self.reference_throughput().mib_per_sec()
    }
}

/// Runs both workers concurrently while `monitor` reports progress to `sink`.
///
/// A device failure fails the whole run; no partial comparison is made.
pub fn run_benchmark<D>(
    device: D,
    memory: &HostMemory,
    plan: BatchPlan,
    ignore_dc: bool,
    monitor: &mut ProgressMonitor,
    sink: &mut dyn ProgressSink,
) -> Result<BenchReport>
where
    D: AcceleratorDevice + Send,
    D::Handle: Send,
{
    let mut pipeline = SlotPipeline::new(device, plan, memory, ignore_dc)?;
    let accelerator_done = CompletionFlag::new();
    let reference_done = CompletionFlag::new();

    let (pipeline_result, reference_result, timings) = thread::scope(|s| {
        let accelerator_start = Instant::now();
        let accelerator = thread::Builder::new()
            .name("idct-accelerator".into())
            .spawn_scoped(s, || pipeline.run(&accelerator_done));
        let reference_start = Instant::now();
        let reference = thread::Builder::new()
            .name("idct-reference".into())
            .spawn_scoped(s, || run_reference(memory, ignore_dc, &reference_done));

        // A worker that never started must not leave the monitor waiting.
        let accelerator = accelerator.inspect_err(|_| accelerator_done.abort());
        let reference = reference.inspect_err(|_| reference_done.abort());

        let timings = monitor.run(
            CompletionLatch::new(accelerator_done.clone(), accelerator_start),
            CompletionLatch::new(reference_done.clone(), reference_start),
            sink,
        );
        let pipeline_result = accelerator.map(|worker| worker.join());
        let reference_result = reference.map(|worker| worker.join());
        (pipeline_result, reference_result, timings)
    });

    let stats = pipeline_result
        .map_err(Error::WorkerSpawn)?
        .map_err(|_| Error::WorkerPanicked("accelerator"))??;
    let reference = reference_result
        .map_err(Error::WorkerSpawn)?
        .map_err(|_| Error::WorkerPanicked("reference"))?;

    let validation = validate(&memory.output.lock(), &reference);
    if validation.passed() {
        info!("outputs match");
    } else {
        warn!(?validation, "outputs differ");
    }
    Ok(BenchReport {
        validation,
        timings,
        bytes_processed: (plan.num_samples() * size_of::<i16>()) as u64,
        pipeline: stats,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::device::EmulatedDevice;
    use crate::monitor::{MIN_POLL_INTERVAL, NullSink};
    use crate::validate::Mismatch;
    use std::time::Duration;
    use test_log::test;

    #[test]
    fn emulated_run_passes() -> Result<()> {
        let memory = HostMemory::ramp(64)?;
        let plan = BatchPlan::new(64, 8, 4)?;
        let mut monitor = ProgressMonitor::new(MIN_POLL_INTERVAL);
        let report = run_benchmark(
            EmulatedDevice::new("test")?,
            &memory,
            plan,
            true,
            &mut monitor,
            &mut NullSink,
        )?;
        assert!(report.passed());
        assert_eq!(report.bytes_processed, 64 * 64 * 2);
        assert_eq!(report.pipeline.batches, 8);
        assert_eq!(report.pipeline.reuse_waits, 4);
        Ok(())
    }

    #[test]
    fn speedup() {
        let report = BenchReport {
            validation: Validation::Mismatch(Mismatch {
                index: 0,
                reference: 1,
                accelerator: 2,
            }),
            timings: Timings {
                accelerator: Duration::from_millis(250),
                reference: Duration::from_secs(1),
            },
            bytes_processed: 1 << 20,
            pipeline: PipelineStats::default(),
        };
        assert!(!report.passed());
        assert_eq!(report.accelerator_throughput().mib_per_sec(), 4.0);
        assert_eq!(report.reference_throughput().mib_per_sec(), 1.0);
        assert_eq!(report.speedup(), 4.0);
    }
}
