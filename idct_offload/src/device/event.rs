// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use super::Stage;

#[derive(Clone, Debug, PartialEq, Eq)]
enum EventState {
    Pending,
    Complete,
    Failed(String),
}

#[derive(Debug)]
struct Inner {
    state: Mutex<EventState>,
    signal: Condvar,
}

/// Completion handle of one enqueued operation.
///
/// Settles exactly once; later calls to [`Event::complete`] or
/// [`Event::fail`] are ignored.
#[derive(Clone, Debug)]
pub struct Event {
    inner: Arc<Inner>,
    stage: Stage,
    batch: usize,
}

impl Event {
    pub(crate) fn new(stage: Stage, batch: usize) -> Event {
        Event {
            inner: Arc::new(Inner {
                state: Mutex::new(EventState::Pending),
                signal: Condvar::new(),
            }),
            stage,
            batch,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn batch(&self) -> usize {
        self.batch
    }

    fn state(&self) -> MutexGuard<'_, EventState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn settle(&self, outcome: EventState) {
        let mut state = self.state();
        if *state == EventState::Pending {
            *state = outcome;
            self.inner.signal.notify_all();
        }
    }

    pub(crate) fn complete(&self) {
        self.settle(EventState::Complete);
    }

    pub(crate) fn fail(&self, reason: String) {
        self.settle(EventState::Failed(reason));
    }

    pub fn is_settled(&self) -> bool {
        *self.state() != EventState::Pending
    }

    /// Blocks until the event settles. There is no timeout.
    pub fn wait(&self) -> Result<(), String> {
        let guard = self.state();
        let state = self
            .inner
            .signal
            .wait_while(guard, |state| *state == EventState::Pending)
            .unwrap_or_else(PoisonError::into_inner);
        match &*state {
            EventState::Failed(reason) => Err(reason.clone()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::thread;

    #[test]
    fn wait_across_threads() {
        let event = Event::new(Stage::Compute, 4);
        assert!(!event.is_settled());
        let remote = event.clone();
        let worker = thread::spawn(move || remote.complete());
        assert_eq!(event.wait(), Ok(()));
        worker.join().unwrap();
        assert!(event.is_settled());
        assert_eq!(event.batch(), 4);
    }

    #[test]
    fn settles_once() {
        let event = Event::new(Stage::TransferIn, 0);
        event.fail("dma error".to_string());
        event.complete();
        assert_eq!(event.wait(), Err("dma error".to_string()));
    }
}
