// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::path::Path;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use byteorder::{ByteOrder, LittleEndian};
use idct_transforms::idct8x8_blocks;

use super::{AcceleratorDevice, DeviceSetup, Event, SlotBinding, Stage};
use crate::error::{Error, Result};
use crate::memory::{HostMemory, Region};
use crate::util::tracing_wrappers::*;
use crate::{BLOCK_SIZE, CoefficientTable};

const SAMPLE_BYTES: usize = std::mem::size_of::<i16>();

/// Blocks per rayon task when a batch is spread over the thread pool.
#[cfg(feature = "parallel")]
const PARALLEL_CHUNK_BLOCKS: usize = 64;

type Job = Box<dyn FnOnce() -> Result<(), String> + Send>;

struct Command {
    deps: Vec<Event>,
    done: Event,
    job: Job,
}

/// In-order command queue served by one worker thread.
struct Queue {
    sender: Option<Sender<Command>>,
    worker: Option<JoinHandle<()>>,
}

impl Queue {
    fn spawn(stage: Stage) -> std::io::Result<Queue> {
        let (sender, receiver) = mpsc::channel::<Command>();
        let worker = thread::Builder::new()
            .name(format!("idct-{stage}"))
            .spawn(move || {
                for command in receiver {
                    if let Some(reason) = command.deps.iter().find_map(|dep| {
                        dep.wait().err().map(|err| {
                            format!("{} of batch {} failed: {err}", dep.stage(), dep.batch())
                        })
                    }) {
                        command.done.fail(reason);
                        continue;
                    }
                    match (command.job)() {
                        Ok(()) => command.done.complete(),
                        Err(reason) => command.done.fail(reason),
                    }
                }
            })?;
        Ok(Queue {
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    fn submit(&self, command: Command) -> std::result::Result<(), String> {
        let sender = self.sender.as_ref().ok_or("queue closed")?;
        sender
            .send(command)
            .map_err(|_| "queue worker exited".to_string())
    }
}

impl Drop for Queue {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain and exit.
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Decoded samples of one batch, reused by every batch of a slot.
struct Scratch {
    samples: Vec<i16>,
    results: Vec<i16>,
}

/// Device-side memory of one slot, little-endian samples.
struct SlotBuffers {
    input: Mutex<Vec<u8>>,
    output: Mutex<Vec<u8>>,
    /// Owned by the compute queue.
    scratch: Mutex<Scratch>,
    /// Owned by the transfer-out queue.
    staging: Mutex<Vec<i16>>,
}

impl SlotBuffers {
    fn new(batch_samples: usize) -> SlotBuffers {
        SlotBuffers {
            input: Mutex::new(vec![0; batch_samples * SAMPLE_BYTES]),
            output: Mutex::new(vec![0; batch_samples * SAMPLE_BYTES]),
            scratch: Mutex::new(Scratch {
                samples: vec![0; batch_samples],
                results: vec![0; batch_samples],
            }),
            staging: Mutex::new(vec![0; batch_samples]),
        }
    }
}

struct Prepared {
    memory: HostMemory,
    coefficients: Arc<CoefficientTable>,
    slots: Vec<Arc<SlotBuffers>>,
    batch_samples: usize,
    ignore_dc: bool,
}

/// Software stand-in for the accelerator card.
///
/// Each stage has its own in-order queue, so transfers of one batch overlap
/// with the compute of another exactly as on the card. The kernel is the
/// same fixed-point transform as the reference.
pub struct EmulatedDevice {
    name: String,
    transfer_in: Queue,
    compute: Queue,
    transfer_out: Queue,
    prepared: Option<Prepared>,
}

impl EmulatedDevice {
    pub fn new(name: impl Into<String>) -> Result<EmulatedDevice> {
        let spawn = |stage| Queue::spawn(stage).map_err(Error::WorkerSpawn);
        Ok(EmulatedDevice {
            name: name.into(),
            transfer_in: spawn(Stage::TransferIn)?,
            compute: spawn(Stage::Compute)?,
            transfer_out: spawn(Stage::TransferOut)?,
            prepared: None,
        })
    }

    /// Programs an emulated device with the accelerator image at `image`.
    pub fn open(image: &Path) -> Result<EmulatedDevice> {
        let binary = std::fs::read(image)
            .map_err(|err| Error::ImageUnreadable(image.to_path_buf(), err))?;
        if binary.is_empty() {
            return Err(Error::NoDevice(image.to_path_buf()));
        }
        let name = format!(
            "emulated:{}",
            image.file_name().unwrap_or(image.as_os_str()).to_string_lossy()
        );
        info!(name = %name, bytes = binary.len(), "programmed device");
        EmulatedDevice::new(name)
    }

    fn prepared(&self) -> Result<&Prepared> {
        self.prepared.as_ref().ok_or(Error::DeviceNotPrepared)
    }

    fn slot(&self, binding: &SlotBinding) -> Result<Arc<SlotBuffers>> {
        let prepared = self.prepared()?;
        let slot = prepared
            .slots
            .get(binding.slot)
            .ok_or(Error::SlotOutOfRange(binding.slot, prepared.slots.len()))?;
        Ok(slot.clone())
    }

    fn check_region(&self, region: Region, buffer_len: usize) -> Result<()> {
        let prepared = self.prepared()?;
        region.checked_range(buffer_len)?;
        if region.len() != prepared.batch_samples {
            return Err(Error::RegionSizeMismatch(region.len(), prepared.batch_samples));
        }
        Ok(())
    }

    fn submit(
        &self,
        stage: Stage,
        binding: &SlotBinding,
        deps: &[Event],
        job: Job,
    ) -> Result<Event> {
        let done = Event::new(stage, binding.batch);
        let queue = match stage {
            Stage::TransferIn => &self.transfer_in,
            Stage::Compute => &self.compute,
            Stage::TransferOut => &self.transfer_out,
        };
        queue
            .submit(Command {
                deps: deps.to_vec(),
                done: done.clone(),
                job,
            })
            .map_err(|reason| Error::EnqueueFailed(stage, binding.slot, reason))?;
        trace!(%stage, slot = binding.slot, batch = binding.batch, "enqueued");
        Ok(done)
    }
}

fn lock<T>(buffer: &Mutex<T>) -> MutexGuard<'_, T> {
    buffer.lock().unwrap_or_else(PoisonError::into_inner)
}

fn run_kernel(input: &[i16], coeffs: &CoefficientTable, output: &mut [i16], ignore_dc: bool) {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        input
            .par_chunks(BLOCK_SIZE * PARALLEL_CHUNK_BLOCKS)
            .zip(output.par_chunks_mut(BLOCK_SIZE * PARALLEL_CHUNK_BLOCKS))
            .for_each(|(input, output)| {
                idct8x8_blocks(input, coeffs, output, ignore_dc);
            });
    }
    #[cfg(not(feature = "parallel"))]
    idct8x8_blocks(input, coeffs, output, ignore_dc);
}

impl AcceleratorDevice for EmulatedDevice {
    type Handle = Event;

    fn name(&self) -> &str {
        &self.name
    }

    fn prepare(&mut self, memory: &HostMemory, setup: &DeviceSetup) -> Result<()> {
        if setup.num_slots == 0 {
            return Err(Error::ZeroSlots);
        }
        let batch_samples = setup
            .batch_blocks
            .checked_mul(BLOCK_SIZE)
            .ok_or(Error::SizeOverflow(1, setup.batch_blocks))?;

        // The table crosses to the device once and is shared by every batch.
        let mut table_bytes = [0u8; BLOCK_SIZE * 2];
        LittleEndian::write_u16_into(&memory.coefficients[..], &mut table_bytes);
        let mut coefficients = [0u16; BLOCK_SIZE];
        LittleEndian::read_u16_into(&table_bytes, &mut coefficients);

        let slots = (0..setup.num_slots)
            .map(|_| Arc::new(SlotBuffers::new(batch_samples)))
            .collect();
        debug!(
            device = %self.name,
            slots = setup.num_slots,
            batch_samples,
            "prepared device"
        );
        self.prepared = Some(Prepared {
            memory: memory.clone(),
            coefficients: Arc::new(coefficients),
            slots,
            batch_samples,
            ignore_dc: setup.ignore_dc,
        });
        Ok(())
    }

    fn enqueue_transfer_in(&mut self, binding: &SlotBinding, deps: &[Event]) -> Result<Event> {
        let input = self.prepared()?.memory.input.clone();
        self.check_region(binding.input, input.len())?;
        let slot = self.slot(binding)?;
        let range = binding.input.range();
        self.submit(
            Stage::TransferIn,
            binding,
            deps,
            Box::new(move || {
                LittleEndian::write_i16_into(&input[range], &mut lock(&slot.input));
                Ok(())
            }),
        )
    }

    fn enqueue_compute(&mut self, binding: &SlotBinding, deps: &[Event]) -> Result<Event> {
        let prepared = self.prepared()?;
        let coefficients = prepared.coefficients.clone();
        let ignore_dc = prepared.ignore_dc;
        let slot = self.slot(binding)?;
        self.submit(
            Stage::Compute,
            binding,
            deps,
            Box::new(move || {
                let mut scratch = lock(&slot.scratch);
                let Scratch { samples, results } = &mut *scratch;
                LittleEndian::read_i16_into(&lock(&slot.input), samples);
                run_kernel(samples, &coefficients, results, ignore_dc);
                LittleEndian::write_i16_into(results, &mut lock(&slot.output));
                Ok(())
            }),
        )
    }

    fn enqueue_transfer_out(&mut self, binding: &SlotBinding, deps: &[Event]) -> Result<Event> {
        let output = self.prepared()?.memory.output.clone();
        self.check_region(binding.output, output.len())?;
        let slot = self.slot(binding)?;
        let region = binding.output;
        self.submit(
            Stage::TransferOut,
            binding,
            deps,
            Box::new(move || {
                let mut staging = lock(&slot.staging);
                LittleEndian::read_i16_into(&lock(&slot.output), &mut staging);
                output.write(region, &staging).map_err(|err| err.to_string())
            }),
        )
    }

    fn wait(&mut self, handle: &Event) -> Result<()> {
        handle
            .wait()
            .map_err(|reason| Error::StageFailed(handle.stage(), handle.batch(), reason))
    }
}
