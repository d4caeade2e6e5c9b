// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::BLOCK_SIZE;
use crate::error::{Error, Result};
use crate::memory::Region;

/// Validated batch/slot layout of a run.
///
/// Invariants: `batch_size > 0`, `num_blocks` is a positive multiple of
/// `batch_size`, and `0 < num_slots <= num_batches`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchPlan {
    num_blocks: usize,
    batch_size: usize,
    num_slots: usize,
    num_batches: usize,
}

impl BatchPlan {
    pub fn new(num_blocks: usize, batch_size: usize, num_slots: usize) -> Result<BatchPlan> {
        if batch_size == 0 {
            return Err(Error::ZeroBatchSize);
        }
        if num_blocks == 0 {
            return Err(Error::ZeroBlocks);
        }
        if num_blocks % batch_size != 0 {
            return Err(Error::BlocksNotMultipleOfBatch(num_blocks, batch_size));
        }
        let num_batches = num_blocks / batch_size;
        if num_slots == 0 {
            return Err(Error::ZeroSlots);
        }
        if num_slots > num_batches {
            return Err(Error::TooManySlots(num_slots, num_batches));
        }
        // Every sample index of the run must be addressable.
        num_blocks
            .checked_mul(BLOCK_SIZE)
            .ok_or(Error::SizeOverflow(num_batches, batch_size))?;
        Ok(BatchPlan {
            num_blocks,
            batch_size,
            num_slots,
            num_batches,
        })
    }

    pub fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    pub fn num_batches(&self) -> usize {
        self.num_batches
    }

    pub fn num_samples(&self) -> usize {
        self.num_blocks * BLOCK_SIZE
    }

    pub fn batch_samples(&self) -> usize {
        self.batch_size * BLOCK_SIZE
    }

    /// Slot that carries `batch`. Always recomputed from the batch index.
    pub fn slot_for(&self, batch: usize) -> usize {
        batch % self.num_slots
    }

    /// Samples of `batch` within the run-wide input and output arrays.
    pub fn batch_region(&self, batch: usize) -> Region {
        debug_assert!(batch < self.num_batches);
        Region::new(batch * self.batch_samples(), self.batch_samples())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    #[test]
    fn valid_plan() {
        let plan = BatchPlan::new(1024, 32, 8).unwrap();
        assert_eq!(plan.num_batches(), 32);
        assert_eq!(plan.num_slots(), 8);
        assert_eq!(plan.batch_samples(), 32 * 64);
        assert_eq!(plan.num_samples(), 1024 * 64);
        assert_eq!(plan.batch_region(3), Region::new(3 * 32 * 64, 32 * 64));
    }

    #[test]
    fn not_divisible() {
        assert!(matches!(
            BatchPlan::new(100, 7, 1),
            Err(Error::BlocksNotMultipleOfBatch(100, 7))
        ));
    }

    #[test]
    fn bad_slots() {
        assert!(matches!(BatchPlan::new(100, 10, 0), Err(Error::ZeroSlots)));
        assert!(matches!(
            BatchPlan::new(100, 10, 11),
            Err(Error::TooManySlots(11, 10))
        ));
        assert!(BatchPlan::new(100, 10, 10).is_ok());
    }

    #[test]
    fn zero_sizes() {
        assert!(matches!(
            BatchPlan::new(100, 0, 1),
            Err(Error::ZeroBatchSize)
        ));
        assert!(matches!(BatchPlan::new(0, 10, 1), Err(Error::ZeroBlocks)));
    }

    #[test]
    fn slots_wrap_around() {
        let plan = BatchPlan::new(5, 1, 2).unwrap();
        let slots: Vec<_> = (0..plan.num_batches()).map(|b| plan.slot_for(b)).collect();
        assert_eq!(slots, [0, 1, 0, 1, 0]);
    }

    #[test]
    fn regions_tile_the_run() {
        arbtest::arbtest(|u| {
            let batch_size = u.int_in_range(1..=64usize)?;
            let num_batches = u.int_in_range(1..=64usize)?;
            let num_slots = u.int_in_range(1..=num_batches)?;
            let num_blocks = batch_size * num_batches;
            let plan = BatchPlan::new(num_blocks, batch_size, num_slots).unwrap();
            assert_eq!(plan.num_batches(), num_batches);
            let mut next = 0;
            for batch in 0..plan.num_batches() {
                let region = plan.batch_region(batch);
                assert_eq!(region.start(), next);
                assert!(plan.slot_for(batch) < num_slots);
                next = region.end();
            }
            assert_eq!(next, plan.num_samples());
            Ok(())
        });
    }
}
