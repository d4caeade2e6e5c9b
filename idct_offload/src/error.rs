// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::path::PathBuf;

use thiserror::Error;

use crate::device::Stage;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    // Configuration errors.
    #[error("Batch size must be positive")]
    ZeroBatchSize,
    #[error("Total block count must be positive")]
    ZeroBlocks,
    #[error("Total block count {0} is not a multiple of the batch size {1}")]
    BlocksNotMultipleOfBatch(usize, usize),
    #[error("Slot count must be positive")]
    ZeroSlots,
    #[error("Slot count {0} exceeds the batch count {1}")]
    TooManySlots(usize, usize),
    #[error("The only transform size supported is {1}, requested {0}")]
    UnsupportedTransformSize(usize, usize),
    #[error("Unknown emulation mode {0:?}, expected sw_emu or hw_emu")]
    UnknownEmulationMode(String),
    #[error("Overflow computing the size of {0} batches of {1} blocks")]
    SizeOverflow(usize, usize),
    #[error("Input of {0} samples is not a whole number of {1}-sample blocks")]
    PartialBlock(usize, usize),
    // Device errors.
    #[error("Cannot read accelerator image {0}: {1}")]
    ImageUnreadable(PathBuf, #[source] std::io::Error),
    #[error("Failed to program any device with accelerator image {0}")]
    NoDevice(PathBuf),
    #[error("Device used before it was prepared")]
    DeviceNotPrepared,
    #[error("Slot {0} out of range, device was prepared with {1} slots")]
    SlotOutOfRange(usize, usize),
    #[error("Region {0}..{1} out of bounds for host buffer of {2} samples")]
    RegionOutOfBounds(usize, usize, usize),
    #[error("Region of {0} samples does not match the prepared batch of {1} samples")]
    RegionSizeMismatch(usize, usize),
    #[error("Failed to enqueue {0} for slot {1}: {2}")]
    EnqueueFailed(Stage, usize, String),
    #[error("{0} for batch {1} failed: {2}")]
    StageFailed(Stage, usize, String),
    #[error("Failed to start a device queue worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),
    #[error("{0} worker panicked")]
    WorkerPanicked(&'static str),
}

/// Coarse classification of [`Error`], used to pick diagnostics at the top level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad run parameters. Reported before any device work begins.
    Configuration,
    /// No usable accelerator, or a failed enqueue/wait. Aborts the whole run.
    Device,
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::ZeroBatchSize
            | Error::ZeroBlocks
            | Error::BlocksNotMultipleOfBatch(..)
            | Error::ZeroSlots
            | Error::TooManySlots(..)
            | Error::UnsupportedTransformSize(..)
            | Error::UnknownEmulationMode(_)
            | Error::SizeOverflow(..)
            | Error::PartialBlock(..) => ErrorCategory::Configuration,
            Error::ImageUnreadable(..)
            | Error::NoDevice(_)
            | Error::DeviceNotPrepared
            | Error::SlotOutOfRange(..)
            | Error::RegionOutOfBounds(..)
            | Error::RegionSizeMismatch(..)
            | Error::EnqueueFailed(..)
            | Error::StageFailed(..)
            | Error::WorkerSpawn(_)
            | Error::WorkerPanicked(_) => ErrorCategory::Device,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
