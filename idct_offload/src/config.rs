// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::fmt;
use std::time::Duration;

use crate::BLOCK_SIZE;
use crate::error::{Error, Result};
use crate::planner::BatchPlan;

/// Environment variable selecting an emulation profile.
pub const EMULATION_MODE_VAR: &str = "IDCT_EMULATION_MODE";

pub const DEFAULT_BATCH_SIZE: usize = 16 * 1024;
pub const DEFAULT_NUM_BATCHES: usize = 256;
pub const DEFAULT_MAX_SLOTS: usize = 8;

/// Batch size used by reduced emulation runs.
pub const REDUCED_BATCH_SIZE: usize = 32;

/// Number of samples per transform. Only 8x8 blocks are supported.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransformSize(usize);

impl TransformSize {
    pub const SUPPORTED: TransformSize = TransformSize(BLOCK_SIZE);

    pub fn new(samples: usize) -> Result<TransformSize> {
        if samples != BLOCK_SIZE {
            return Err(Error::UnsupportedTransformSize(samples, BLOCK_SIZE));
        }
        Ok(TransformSize(samples))
    }

    pub fn samples(self) -> usize {
        self.0
    }
}

impl Default for TransformSize {
    fn default() -> Self {
        Self::SUPPORTED
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExecutionProfile {
    #[default]
    Hardware,
    SoftwareEmulation,
    HardwareEmulation,
}

impl ExecutionProfile {
    /// Parses the value of [`EMULATION_MODE_VAR`]; `None` means the variable is unset.
    pub fn from_mode(mode: Option<&str>) -> Result<ExecutionProfile> {
        match mode {
            None | Some("") => Ok(ExecutionProfile::Hardware),
            Some("sw_emu") => Ok(ExecutionProfile::SoftwareEmulation),
            Some("hw_emu") => Ok(ExecutionProfile::HardwareEmulation),
            Some(other) => Err(Error::UnknownEmulationMode(other.to_string())),
        }
    }

    pub fn from_env() -> Result<ExecutionProfile> {
        let mode = std::env::var(EMULATION_MODE_VAR).ok();
        Self::from_mode(mode.as_deref())
    }

    pub fn is_emulation(self) -> bool {
        self != ExecutionProfile::Hardware
    }

    /// Progress poll interval. Emulated devices are orders of magnitude slower.
    pub fn poll_interval(self) -> Duration {
        if self.is_emulation() {
            Duration::from_secs(1)
        } else {
            Duration::from_millis(1)
        }
    }
}

impl fmt::Display for ExecutionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExecutionProfile::Hardware => "System HW",
            ExecutionProfile::SoftwareEmulation => "sw_emu",
            ExecutionProfile::HardwareEmulation => "hw_emu",
        })
    }
}

/// Parameters of one benchmark run, before the reduced profile is applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunConfig {
    pub batch_size: usize,
    pub num_batches: usize,
    pub max_slots: usize,
    /// Disables the reduced profile in emulation modes.
    pub full_scale: bool,
    pub profile: ExecutionProfile,
    pub transform_size: TransformSize,
    pub ignore_dc: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            batch_size: DEFAULT_BATCH_SIZE,
            num_batches: DEFAULT_NUM_BATCHES,
            max_slots: DEFAULT_MAX_SLOTS,
            full_scale: false,
            profile: ExecutionProfile::Hardware,
            transform_size: TransformSize::SUPPORTED,
            ignore_dc: true,
        }
    }
}

impl RunConfig {
    /// Whether [`RunConfig::effective`] shrinks this run.
    pub fn is_reduced(&self) -> bool {
        self.profile.is_emulation() && !self.full_scale
    }

    /// Applies the reduced profile: one window of small batches.
    pub fn effective(&self) -> RunConfig {
        if !self.is_reduced() {
            return self.clone();
        }
        RunConfig {
            batch_size: REDUCED_BATCH_SIZE,
            num_batches: self.max_slots,
            ..self.clone()
        }
    }

    pub fn num_blocks(&self) -> Result<usize> {
        self.batch_size
            .checked_mul(self.num_batches)
            .ok_or(Error::SizeOverflow(self.num_batches, self.batch_size))
    }

    pub fn plan(&self) -> Result<BatchPlan> {
        BatchPlan::new(self.num_blocks()?, self.batch_size, self.max_slots)
    }
}
