// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::fmt;

use crate::error::Result;
use crate::memory::{HostMemory, Region};

mod emulated;
mod event;

pub use emulated::EmulatedDevice;
pub use event::Event;

/// One of the three dependent operations issued per batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    TransferIn,
    Compute,
    TransferOut,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::TransferIn => "transfer-in",
            Stage::Compute => "compute",
            Stage::TransferOut => "transfer-out",
        })
    }
}

/// Binds one batch to a slot: where its samples come from and go to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotBinding {
    pub slot: usize,
    pub batch: usize,
    pub input: Region,
    pub output: Region,
}

/// Arguments fixed for the whole run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceSetup {
    pub num_slots: usize,
    pub batch_blocks: usize,
    pub ignore_dc: bool,
}

/// An accelerator exposing asynchronous, dependency-ordered stage submission.
///
/// Enqueue operations never block on device progress; they return a handle
/// that is satisfied once the operation has completed. An operation starts
/// only after all of its dependencies are satisfied.
pub trait AcceleratorDevice {
    type Handle: Clone;

    fn name(&self) -> &str;

    /// Binds the host buffers, allocates `setup.num_slots` device slots and
    /// transfers the coefficient table once.
    fn prepare(&mut self, memory: &HostMemory, setup: &DeviceSetup) -> Result<()>;

    fn enqueue_transfer_in(
        &mut self,
        binding: &SlotBinding,
        deps: &[Self::Handle],
    ) -> Result<Self::Handle>;

    fn enqueue_compute(
        &mut self,
        binding: &SlotBinding,
        deps: &[Self::Handle],
    ) -> Result<Self::Handle>;

    fn enqueue_transfer_out(
        &mut self,
        binding: &SlotBinding,
        deps: &[Self::Handle],
    ) -> Result<Self::Handle>;

    /// Blocks until `handle` is satisfied, failing if its operation failed.
    fn wait(&mut self, handle: &Self::Handle) -> Result<()>;
}

impl<D: AcceleratorDevice + ?Sized> AcceleratorDevice for &mut D {
    type Handle = D::Handle;

    fn name(&self) -> &str {
        (**self).name()
    }

    fn prepare(&mut self, memory: &HostMemory, setup: &DeviceSetup) -> Result<()> {
        (**self).prepare(memory, setup)
    }

    fn enqueue_transfer_in(
        &mut self,
        binding: &SlotBinding,
        deps: &[Self::Handle],
    ) -> Result<Self::Handle> {
        (**self).enqueue_transfer_in(binding, deps)
    }

    fn enqueue_compute(
        &mut self,
        binding: &SlotBinding,
        deps: &[Self::Handle],
    ) -> Result<Self::Handle> {
        (**self).enqueue_compute(binding, deps)
    }

    fn enqueue_transfer_out(
        &mut self,
        binding: &SlotBinding,
        deps: &[Self::Handle],
    ) -> Result<Self::Handle> {
        (**self).enqueue_transfer_out(binding, deps)
    }

    fn wait(&mut self, handle: &Self::Handle) -> Result<()> {
        (**self).wait(handle)
    }
}
