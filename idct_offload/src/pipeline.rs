// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Batch scheduler that overlaps transfer-in, compute and transfer-out of
//! consecutive batches over a fixed ring of device slots.
//!
//! Batch `b` always runs in slot `b % num_slots`. Before a slot is rebound, the
//! three stages of its previous batch are awaited, so at most `num_slots`
//! batches are in flight and no slot buffer is overwritten while still in use.
//! Submission itself never blocks; only slot reuse and the final drain wait.

use crate::device::{AcceleratorDevice, DeviceSetup, SlotBinding};
use crate::error::Result;
use crate::memory::HostMemory;
use crate::monitor::CompletionFlag;
use crate::planner::BatchPlan;
use crate::util::tracing_wrappers::*;

/// Stage handles of the batch currently occupying a slot.
#[derive(Debug)]
struct InFlight<H> {
    batch: usize,
    transfer_in: H,
    compute: H,
    transfer_out: H,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub batches: usize,
    pub blocks: usize,
    /// Cycles that had to wait for a slot's previous occupant.
    pub reuse_waits: usize,
}

pub struct SlotPipeline<D: AcceleratorDevice> {
    device: D,
    plan: BatchPlan,
    slots: Vec<Option<InFlight<D::Handle>>>,
    next_batch: usize,
    stats: PipelineStats,
}

impl<D: AcceleratorDevice> SlotPipeline<D> {
    /// Allocates the slot ring and hands the run-wide buffers to the device.
    pub fn new(
        mut device: D,
        plan: BatchPlan,
        memory: &HostMemory,
        ignore_dc: bool,
    ) -> Result<Self> {
        device.prepare(
            memory,
            &DeviceSetup {
                num_slots: plan.num_slots(),
                batch_blocks: plan.batch_size(),
                ignore_dc,
            },
        )?;
        let slots = (0..plan.num_slots()).map(|_| None).collect();
        Ok(SlotPipeline {
            device,
            plan,
            slots,
            next_batch: 0,
            stats: PipelineStats::default(),
        })
    }

    pub fn plan(&self) -> &BatchPlan {
        &self.plan
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Whether every batch of the plan has been issued.
    pub fn is_exhausted(&self) -> bool {
        self.next_batch == self.plan.num_batches()
    }

    /// Waits for all stages of the batch occupying `slot`, freeing the slot.
    /// Returns the retired batch.
    fn retire(&mut self, slot: usize) -> Result<Option<usize>> {
        let Some(in_flight) = self.slots[slot].take() else {
            return Ok(None);
        };
        self.device.wait(&in_flight.transfer_in)?;
        self.device.wait(&in_flight.compute)?;
        self.device.wait(&in_flight.transfer_out)?;
        trace!(slot, batch = in_flight.batch, "retired");
        Ok(Some(in_flight.batch))
    }

    /// Issues the next batch. Returns `false` once all batches have been issued.
    ///
    /// A caller that stops calling this only declines to start further
    /// batches; already issued ones still need [`SlotPipeline::drain`].
    pub fn issue_next(&mut self) -> Result<bool> {
        if self.is_exhausted() {
            return Ok(false);
        }
        let batch = self.next_batch;
        let slot = self.plan.slot_for(batch);

        if batch >= self.plan.num_slots() {
            debug!(slot, batch, "waiting for slot reuse");
            let retired = self.retire(slot)?;
            debug_assert_eq!(retired, Some(batch - self.plan.num_slots()));
            self.stats.reuse_waits += 1;
        }

        let region = self.plan.batch_region(batch);
        let binding = SlotBinding {
            slot,
            batch,
            input: region,
            output: region,
        };
        let transfer_in = self.device.enqueue_transfer_in(&binding, &[])?;
        let compute = self
            .device
            .enqueue_compute(&binding, std::slice::from_ref(&transfer_in))?;
        let transfer_out = self
            .device
            .enqueue_transfer_out(&binding, std::slice::from_ref(&compute))?;
        self.slots[slot] = Some(InFlight {
            batch,
            transfer_in,
            compute,
            transfer_out,
        });

        self.next_batch += 1;
        self.stats.batches += 1;
        self.stats.blocks += self.plan.batch_size();
        trace!(slot, batch, "issued");
        Ok(true)
    }

    /// Waits for every in-flight batch.
    pub fn drain(&mut self) -> Result<()> {
        debug!(in_flight = self.slots.iter().flatten().count(), "draining");
        for slot in 0..self.slots.len() {
            self.retire(slot)?;
        }
        Ok(())
    }

    /// Issues every batch, drains, then publishes `done`.
    ///
    /// Any device failure aborts the run at once; `done` is then aborted
    /// rather than published.
    pub fn run(&mut self, done: &CompletionFlag) -> Result<PipelineStats> {
        let guard = done.guard();
        info!(
            device = self.device.name(),
            batches = self.plan.num_batches(),
            slots = self.plan.num_slots(),
            "starting pipeline"
        );
        while self.issue_next()? {}
        self.drain()?;
        guard.publish();
        info!(batches = self.stats.batches, "pipeline finished");
        Ok(self.stats)
    }

    pub fn into_device(self) -> D {
        self.device
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::device::{EmulatedDevice, Stage};
    use crate::error::Error;
    use crate::memory::Region;
    use crate::{BLOCK_SIZE, CoefficientTable};
    use idct_transforms::idct8x8_blocks;
    use rand::{Rng, SeedableRng};
    use rand_xorshift::XorShiftRng;
    use std::cell::Cell;
    use test_log::test;

    /// Runs every operation synchronously and fails at a chosen operation.
    struct FlakyDevice {
        operations: Cell<usize>,
        fail_at: usize,
    }

    impl FlakyDevice {
        fn step(&self, stage: Stage, binding: &SlotBinding) -> Result<usize> {
            let n = self.operations.get();
            self.operations.set(n + 1);
            if n == self.fail_at {
                return Err(Error::EnqueueFailed(stage, binding.slot, "injected".into()));
            }
            Ok(n)
        }
    }

    impl AcceleratorDevice for FlakyDevice {
        type Handle = usize;

        fn name(&self) -> &str {
            "flaky"
        }

        fn prepare(&mut self, _memory: &HostMemory, _setup: &DeviceSetup) -> Result<()> {
            Ok(())
        }

        fn enqueue_transfer_in(&mut self, binding: &SlotBinding, _: &[usize]) -> Result<usize> {
            self.step(Stage::TransferIn, binding)
        }

        fn enqueue_compute(&mut self, binding: &SlotBinding, _: &[usize]) -> Result<usize> {
            self.step(Stage::Compute, binding)
        }

        fn enqueue_transfer_out(&mut self, binding: &SlotBinding, _: &[usize]) -> Result<usize> {
            self.step(Stage::TransferOut, binding)
        }

        fn wait(&mut self, _handle: &usize) -> Result<()> {
            Ok(())
        }
    }

    fn random_memory(num_blocks: usize, seed: u64) -> HostMemory {
        let mut rng = XorShiftRng::seed_from_u64(seed);
        let input = (0..num_blocks * BLOCK_SIZE).map(|_| rng.random()).collect();
        let coefficients: CoefficientTable = std::array::from_fn(|_| rng.random());
        HostMemory::new(input, coefficients).unwrap()
    }

    #[test]
    fn emulated_run_matches_reference() -> Result<()> {
        let memory = random_memory(96, 7);
        let plan = BatchPlan::new(96, 8, 3)?;
        let mut pipeline = SlotPipeline::new(EmulatedDevice::new("test")?, plan, &memory, true)?;
        let done = CompletionFlag::new();
        let stats = pipeline.run(&done)?;
        assert!(done.is_set() && !done.is_aborted());
        assert_eq!(stats.batches, 12);
        assert_eq!(stats.blocks, 96);
        assert_eq!(stats.reuse_waits, 9);

        let mut expected = vec![0; memory.num_samples()];
        idct8x8_blocks(&memory.input, &memory.coefficients, &mut expected, true);
        assert_eq!(*memory.output.lock(), expected);
        Ok(())
    }

    #[test]
    fn emulated_slot_counts() {
        arbtest::arbtest(|u| {
            let batch_size = u.int_in_range(1..=4usize)?;
            let num_batches = u.int_in_range(1..=12usize)?;
            let num_slots = u.int_in_range(1..=num_batches)?;
            let num_blocks = batch_size * num_batches;
            let memory = random_memory(num_blocks, u.arbitrary()?);
            let plan = BatchPlan::new(num_blocks, batch_size, num_slots).unwrap();
            let device = EmulatedDevice::new("arb").unwrap();
            let mut pipeline = SlotPipeline::new(device, plan, &memory, false).unwrap();
            let stats = pipeline.run(&CompletionFlag::new()).unwrap();
            assert_eq!(stats.batches, num_batches);
            assert_eq!(stats.blocks, num_blocks);

            let mut expected = vec![0; memory.num_samples()];
            idct8x8_blocks(&memory.input, &memory.coefficients, &mut expected, false);
            assert_eq!(*memory.output.lock(), expected);
            Ok(())
        });
    }

    #[test]
    fn device_failure_aborts() -> Result<()> {
        let memory = HostMemory::ramp(6)?;
        let plan = BatchPlan::new(6, 1, 2)?;
        // Operation 7 is the compute of batch 2.
        let device = FlakyDevice {
            operations: Cell::new(0),
            fail_at: 7,
        };
        let mut pipeline = SlotPipeline::new(device, plan, &memory, true)?;
        let done = CompletionFlag::new();
        let err = pipeline.run(&done).unwrap_err();
        assert!(matches!(err, Error::EnqueueFailed(Stage::Compute, 0, _)));
        assert!(done.is_aborted());
        assert_eq!(pipeline.stats().batches, 2);
        assert_eq!(pipeline.into_device().operations.get(), 8);
        Ok(())
    }

    #[test]
    fn declining_further_batches() -> Result<()> {
        let memory = HostMemory::ramp(4)?;
        let plan = BatchPlan::new(4, 1, 2)?;
        let mut pipeline = SlotPipeline::new(EmulatedDevice::new("test")?, plan, &memory, true)?;
        assert!(pipeline.issue_next()?);
        assert!(pipeline.issue_next()?);
        pipeline.drain()?;
        assert!(!pipeline.is_exhausted());

        let output = memory.output.lock();
        let first_two = Region::new(0, 2 * BLOCK_SIZE);
        let mut expected = vec![0; first_two.len()];
        idct8x8_blocks(
            &memory.input[first_two.range()],
            &memory.coefficients,
            &mut expected,
            true,
        );
        assert_eq!(output[first_two.range()], expected[..]);
        assert!(output[first_two.end()..].iter().all(|&s| s == 0));
        Ok(())
    }
}
