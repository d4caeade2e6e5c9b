// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Fixed-point separable 8x8 inverse DCT.
//!
//! All intermediate arithmetic is performed on 32-bit two's complement
//! integers with wrapping semantics, and every shift is an arithmetic shift.
//! The accelerator kernel performs exactly the same operations, so any change
//! here (constants, rounding biases, shift order) breaks bit-exact validation.

use std::num::Wrapping;

pub const BLOCK_DIM: usize = 8;
pub const BLOCK_SIZE: usize = BLOCK_DIM * BLOCK_DIM;

/// 64 signed fixed-point samples in row-major order.
pub type Block = [i16; BLOCK_SIZE];

/// 64 unsigned weights, shared by every block of a run.
pub type CoefficientTable = [u16; BLOCK_SIZE];

type Acc = Wrapping<i32>;

// 2048 * sqrt(2) * cos(k * pi / 16)
const W1: Acc = Wrapping(2841);
const W2: Acc = Wrapping(2676);
const W3: Acc = Wrapping(2408);
const W5: Acc = Wrapping(1609);
const W6: Acc = Wrapping(1108);
const W7: Acc = Wrapping(565);
// 256 / sqrt(2)
const R2: Acc = Wrapping(181);

const W1PW7: Acc = Wrapping(W1.0 + W7.0);
const W1MW7: Acc = Wrapping(W1.0 - W7.0);
const W2PW6: Acc = Wrapping(W2.0 + W6.0);
const W2MW6: Acc = Wrapping(W2.0 - W6.0);
const W3PW5: Acc = Wrapping(W3.0 + W5.0);
const W3MW5: Acc = Wrapping(W3.0 - W5.0);

/// Scaling and rounding parameters of one 1-D pass.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Pass {
    /// Left shift applied to the even inputs 0 and 4.
    prescale: usize,
    /// Rounding bias added to input 0 after prescaling.
    dc_bias: i32,
    /// Rounding bias and right shift of the odd rotations and of the 2/6 rotation.
    rotation_bias: i32,
    rotation_shift: usize,
    output_shift: usize,
}

pub(crate) const ROW_PASS: Pass = Pass {
    prescale: 11,
    dc_bias: 128,
    rotation_bias: 0,
    rotation_shift: 0,
    output_shift: 8,
};

pub(crate) const COLUMN_PASS: Pass = Pass {
    prescale: 8,
    dc_bias: 8192,
    rotation_bias: 4,
    rotation_shift: 3,
    output_shift: 11,
};

/// Four-stage 8-point butterfly. `v` is in natural frequency order.
#[inline(always)]
pub(crate) fn butterfly8(pass: Pass, v: [i32; BLOCK_DIM]) -> [i32; BLOCK_DIM] {
    let mut x0 = (Wrapping(v[0]) << pass.prescale) + Wrapping(pass.dc_bias);
    let mut x1 = Wrapping(v[4]) << pass.prescale;
    let mut x2 = Wrapping(v[6]);
    let mut x3 = Wrapping(v[2]);
    let mut x4 = Wrapping(v[1]);
    let mut x5 = Wrapping(v[7]);
    let mut x6 = Wrapping(v[5]);
    let mut x7 = Wrapping(v[3]);

    let bias = Wrapping(pass.rotation_bias);
    let shift = pass.rotation_shift;

    // Stage 1.
    let mut x8 = W7 * (x4 + x5) + bias;
    x4 = (x8 + W1MW7 * x4) >> shift;
    x5 = (x8 - W1PW7 * x5) >> shift;
    x8 = W3 * (x6 + x7) + bias;
    x6 = (x8 - W3MW5 * x6) >> shift;
    x7 = (x8 - W3PW5 * x7) >> shift;

    // Stage 2.
    x8 = x0 + x1;
    x0 -= x1;
    x1 = W6 * (x3 + x2) + bias;
    x2 = (x1 - W2PW6 * x2) >> shift;
    x3 = (x1 + W2MW6 * x3) >> shift;
    x1 = x4 + x6;
    x4 -= x6;
    x6 = x5 + x7;
    x5 -= x7;

    // Stage 3.
    x7 = x8 + x3;
    x8 -= x3;
    x3 = x0 + x2;
    x0 -= x2;
    x2 = (R2 * (x4 + x5) + Wrapping(128)) >> 8;
    x4 = (R2 * (x4 - x5) + Wrapping(128)) >> 8;

    // Stage 4.
    let out = pass.output_shift;
    [
        (x7 + x1) >> out,
        (x3 + x2) >> out,
        (x0 + x4) >> out,
        (x8 + x6) >> out,
        (x8 - x6) >> out,
        (x0 - x4) >> out,
        (x3 - x2) >> out,
        (x7 - x1) >> out,
    ]
    .map(|x| x.0)
}

/// Horizontal pass over one row of dequantized products.
///
/// Rows whose AC terms all vanish skip the butterfly; the result is identical
/// to running it.
#[inline(always)]
pub(crate) fn row_idct8(products: [i32; BLOCK_DIM]) -> [i32; BLOCK_DIM] {
    let prescaled_dc = Wrapping(products[0]) << ROW_PASS.prescale;
    // Input 4 is compared after prescaling, as the butterfly sees it.
    let ac_zero = (Wrapping(products[4]) << ROW_PASS.prescale).0 == 0
        && [1, 2, 3, 5, 6, 7].iter().all(|&i| products[i] == 0);
    if ac_zero {
        return [(prescaled_dc >> ROW_PASS.output_shift).0; BLOCK_DIM];
    }
    butterfly8(ROW_PASS, products)
}

fn idct8x8_impl(input: &[i16], coeffs: &[u16], output: &mut [i16], ignore_dc: bool) {
    debug_assert_eq!(input.len(), BLOCK_SIZE);
    debug_assert_eq!(coeffs.len(), BLOCK_SIZE);
    debug_assert_eq!(output.len(), BLOCK_SIZE);

    let mut intermediate = [0i32; BLOCK_SIZE];

    for (y, ((row_in, row_q), row_out)) in input
        .chunks_exact(BLOCK_DIM)
        .zip(coeffs.chunks_exact(BLOCK_DIM))
        .zip(intermediate.chunks_exact_mut(BLOCK_DIM))
        .enumerate()
    {
        // i16 * u16 always fits in i32.
        let mut products: [i32; BLOCK_DIM] =
            std::array::from_fn(|i| i32::from(row_in[i]) * i32::from(row_q[i]));
        if ignore_dc && y == 0 {
            products[0] = 0;
        }
        row_out.copy_from_slice(&row_idct8(products));
    }

    // AC terms are generically non-zero after the row pass, so the columns
    // always run the full butterfly.
    for x in 0..BLOCK_DIM {
        let column: [i32; BLOCK_DIM] = std::array::from_fn(|y| intermediate[y * BLOCK_DIM + x]);
        for (y, value) in butterfly8(COLUMN_PASS, column).into_iter().enumerate() {
            output[y * BLOCK_DIM + x] = value as i16;
        }
    }
}

/// Transforms one block. `ignore_dc` zeroes the DC product of the first row.
pub fn idct8x8(input: &Block, coeffs: &CoefficientTable, output: &mut Block, ignore_dc: bool) {
    idct8x8_impl(input, coeffs, output, ignore_dc);
}

/// Transforms a contiguous run of blocks sharing one coefficient table.
///
/// # Panics
///
/// If `input` and `output` differ in length or are not a whole number of blocks.
pub fn idct8x8_blocks(
    input: &[i16],
    coeffs: &CoefficientTable,
    output: &mut [i16],
    ignore_dc: bool,
) {
    assert_eq!(input.len(), output.len());
    assert_eq!(input.len() % BLOCK_SIZE, 0);
    for (block_in, block_out) in input
        .chunks_exact(BLOCK_SIZE)
        .zip(output.chunks_exact_mut(BLOCK_SIZE))
    {
        idct8x8_impl(block_in, coeffs, block_out, ignore_dc);
    }
}
