// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Completion flags and the polling progress monitor.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::util::tracing_wrappers::*;

const PENDING: u8 = 0;
const DONE: u8 = 1;
const ABORTED: u8 = 2;

pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Polls per bar character at scale 1.
pub const TICKS_PER_CHAR: u64 = 50;
/// Combined bar width that triggers halving the bar resolution.
pub const MAX_BAR_WIDTH: usize = 120;

/// Atomically published, set-once completion flag of one worker.
#[derive(Clone, Debug, Default)]
pub struct CompletionFlag(Arc<AtomicU8>);

impl CompletionFlag {
    pub fn new() -> CompletionFlag {
        CompletionFlag::default()
    }

    /// Marks the worker as finished successfully. Only the first transition counts.
    pub fn publish(&self) {
        let _ = self
            .0
            .compare_exchange(PENDING, DONE, Ordering::Release, Ordering::Relaxed);
    }

    /// Marks the worker as stopped without a result.
    pub fn abort(&self) {
        let _ = self
            .0
            .compare_exchange(PENDING, ABORTED, Ordering::Release, Ordering::Relaxed);
    }

    /// Whether the worker stopped, successfully or not.
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire) != PENDING
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Acquire) == ABORTED
    }

    /// Returns a guard that aborts the flag if dropped before
    /// [`PublishGuard::publish`], e.g. on an error return or a panic.
    pub fn guard(&self) -> PublishGuard<'_> {
        PublishGuard { flag: self }
    }
}

pub struct PublishGuard<'a> {
    flag: &'a CompletionFlag,
}

impl PublishGuard<'_> {
    pub fn publish(self) {
        self.flag.publish();
    }
}

impl Drop for PublishGuard<'_> {
    fn drop(&mut self) {
        // No-op after a publish.
        self.flag.abort();
    }
}

/// Observes one flag and latches the first time it is seen set.
#[derive(Debug)]
pub struct CompletionLatch {
    flag: CompletionFlag,
    start: Instant,
    finished: Option<Instant>,
    ticks: u64,
}

impl CompletionLatch {
    pub fn new(flag: CompletionFlag, start: Instant) -> CompletionLatch {
        CompletionLatch {
            flag,
            start,
            finished: None,
            ticks: 0,
        }
    }

    /// Returns true exactly once, on the first observation of the set flag.
    pub fn observe(&mut self, now: Instant) -> bool {
        if self.finished.is_some() || !self.flag.is_set() {
            return false;
        }
        self.finished = Some(now);
        true
    }

    pub fn is_latched(&self) -> bool {
        self.finished.is_some()
    }

    pub fn is_aborted(&self) -> bool {
        self.flag.is_aborted()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    fn tick(&mut self) {
        if self.finished.is_none() {
            self.ticks += 1;
        }
    }

    /// Time from start to the latched completion.
    pub fn elapsed(&self) -> Option<Duration> {
        self.finished
            .map(|end| end.saturating_duration_since(self.start))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SideProgress {
    /// Poll intervals spent before completion was observed.
    pub elapsed: Duration,
    pub bar_len: usize,
    pub done: bool,
}

/// Snapshot handed to the renderer after every poll.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgressFrame {
    pub accelerator: SideProgress,
    pub reference: SideProgress,
    /// The bar resolution was just halved; previously drawn bars are stale.
    pub rescaled: bool,
}

pub trait ProgressSink {
    fn update(&mut self, frame: &ProgressFrame);

    fn finish(&mut self) {}
}

/// Discards all progress.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn update(&mut self, _frame: &ProgressFrame) {}
}

/// Latched completion times of both workers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timings {
    pub accelerator: Duration,
    pub reference: Duration,
}

pub struct ProgressMonitor {
    poll_interval: Duration,
    scale: u64,
}

impl ProgressMonitor {
    /// `poll_interval` is clamped to `[MIN_POLL_INTERVAL, MAX_POLL_INTERVAL]`.
    pub fn new(poll_interval: Duration) -> ProgressMonitor {
        ProgressMonitor {
            poll_interval: poll_interval.clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL),
            scale: 1,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    fn bar_len(&self, ticks: u64) -> usize {
        (ticks / (TICKS_PER_CHAR * self.scale)) as usize
    }

    fn frame(
        &mut self,
        accelerator: &CompletionLatch,
        reference: &CompletionLatch,
    ) -> ProgressFrame {
        let mut rescaled = false;
        if self.bar_len(accelerator.ticks()) + self.bar_len(reference.ticks()) > MAX_BAR_WIDTH {
            self.scale *= 2;
            rescaled = true;
        }
        let side = |latch: &CompletionLatch| SideProgress {
            elapsed: self
                .poll_interval
                .saturating_mul(u32::try_from(latch.ticks()).unwrap_or(u32::MAX)),
            bar_len: self.bar_len(latch.ticks()),
            done: latch.is_latched(),
        };
        ProgressFrame {
            accelerator: side(accelerator),
            reference: side(reference),
            rescaled,
        }
    }

    /// Polls both latches until both have completed. Never blocks either worker.
    pub fn run(
        &mut self,
        mut accelerator: CompletionLatch,
        mut reference: CompletionLatch,
        sink: &mut dyn ProgressSink,
    ) -> Timings {
        loop {
            let now = Instant::now();
            if accelerator.observe(now) {
                debug!(
                    ticks = accelerator.ticks(),
                    aborted = accelerator.is_aborted(),
                    "accelerator finished"
                );
            }
            if reference.observe(now) {
                debug!(
                    ticks = reference.ticks(),
                    aborted = reference.is_aborted(),
                    "reference finished"
                );
            }
            if accelerator.is_latched() && reference.is_latched() {
                break;
            }
            thread::sleep(self.poll_interval);
            accelerator.tick();
            reference.tick();
            let frame = self.frame(&accelerator, &reference);
            sink.update(&frame);
        }
        sink.finish();
        Timings {
            accelerator: accelerator.elapsed().unwrap_or_default(),
            reference: reference.elapsed().unwrap_or_default(),
        }
    }
}

/// Bytes moved per unit of time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Throughput {
    pub bytes: u64,
    pub elapsed: Duration,
}

impl Throughput {
    pub fn mib_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return f64::INFINITY;
        }
        self.bytes as f64 / secs / (1024.0 * 1024.0)
    }
}
