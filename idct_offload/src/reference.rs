// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use idct_transforms::idct8x8_blocks;

use crate::memory::HostMemory;
use crate::monitor::CompletionFlag;
use crate::util::tracing_wrappers::*;

/// Transforms every block of `memory.input` in order on the calling thread,
/// then publishes `done`.
pub fn run_reference(memory: &HostMemory, ignore_dc: bool, done: &CompletionFlag) -> Vec<i16> {
    let guard = done.guard();
    info!(blocks = memory.num_blocks(), "starting reference transform");
    let mut output = vec![0; memory.num_samples()];
    idct8x8_blocks(&memory.input, &memory.coefficients, &mut output, ignore_dc);
    guard.publish();
    info!("reference transform finished");
    output
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::BLOCK_SIZE;
    use idct_transforms::idct8x8;
    use test_log::test;

    #[test]
    fn publishes_and_matches_per_block() {
        let memory = HostMemory::ramp(3).unwrap();
        let done = CompletionFlag::new();
        let output = run_reference(&memory, true, &done);
        assert!(done.is_set() && !done.is_aborted());
        assert_eq!(output.len(), 3 * BLOCK_SIZE);

        let block = std::array::from_fn(|i| i as i16);
        let mut expected = [0; BLOCK_SIZE];
        idct8x8(&block, &memory.coefficients, &mut expected, true);
        for chunk in output.chunks_exact(BLOCK_SIZE) {
            assert_eq!(chunk, expected);
        }
        // The host output arena belongs to the accelerator.
        assert!(memory.output.lock().iter().all(|&s| s == 0));
    }
}
