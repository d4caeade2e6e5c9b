// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::ops::Range;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};
use crate::{BLOCK_SIZE, CoefficientTable};

/// Contiguous range of samples in a host buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    start: usize,
    len: usize,
}

impl Region {
    pub fn new(start: usize, len: usize) -> Region {
        Region { start, len }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.start + self.len
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }

    /// Returns the range if it fits in a buffer of `buffer_len` samples.
    pub fn checked_range(&self, buffer_len: usize) -> Result<Range<usize>> {
        match self.start.checked_add(self.len) {
            Some(end) if end <= buffer_len => Ok(self.start..end),
            _ => Err(Error::RegionOutOfBounds(
                self.start,
                self.start.saturating_add(self.len),
                buffer_len,
            )),
        }
    }
}

/// Host-side output array. Transfers write disjoint regions of it concurrently.
#[derive(Debug)]
pub struct OutputArena {
    data: Mutex<Vec<i16>>,
    len: usize,
}

impl OutputArena {
    pub fn new(len: usize) -> OutputArena {
        OutputArena {
            data: Mutex::new(vec![0; len]),
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn write(&self, region: Region, samples: &[i16]) -> Result<()> {
        let range = region.checked_range(self.len)?;
        if samples.len() != region.len() {
            return Err(Error::RegionSizeMismatch(samples.len(), region.len()));
        }
        self.lock()[range].copy_from_slice(samples);
        Ok(())
    }

    /// Locks the whole array, typically once all transfers have drained.
    pub fn lock(&self) -> MutexGuard<'_, Vec<i16>> {
        // Writers only copy slices, a poisoned lock still holds consistent data.
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Host buffers shared by the reference worker and the accelerator.
///
/// The input and coefficient table are read-only for the whole run.
#[derive(Clone, Debug)]
pub struct HostMemory {
    pub input: Arc<[i16]>,
    pub coefficients: Arc<CoefficientTable>,
    pub output: Arc<OutputArena>,
}

impl HostMemory {
    /// Fails if `input` is not a whole number of blocks.
    pub fn new(input: Vec<i16>, coefficients: CoefficientTable) -> Result<HostMemory> {
        if input.len() % BLOCK_SIZE != 0 {
            return Err(Error::PartialBlock(input.len(), BLOCK_SIZE));
        }
        let output = Arc::new(OutputArena::new(input.len()));
        Ok(HostMemory {
            input: input.into(),
            coefficients: Arc::new(coefficients),
            output,
        })
    }

    /// Benchmark data: every block holds `0..64`, and so does the table.
    pub fn ramp(num_blocks: usize) -> Result<HostMemory> {
        let input = (0..num_blocks * BLOCK_SIZE)
            .map(|i| (i % BLOCK_SIZE) as i16)
            .collect();
        let coefficients = std::array::from_fn(|i| i as u16);
        HostMemory::new(input, coefficients)
    }

    pub fn num_blocks(&self) -> usize {
        self.input.len() / BLOCK_SIZE
    }

    pub fn num_samples(&self) -> usize {
        self.input.len()
    }

    pub fn input_region(&self, region: Region) -> Result<&[i16]> {
        Ok(&self.input[region.checked_range(self.input.len())?])
    }
}
