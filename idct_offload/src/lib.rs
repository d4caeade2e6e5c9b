// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

#![deny(unsafe_code)]
pub mod bench;
pub mod config;
pub mod device;
pub mod error;
pub mod memory;
pub mod monitor;
pub mod pipeline;
pub mod planner;
pub mod reference;
pub mod util;
pub mod validate;

pub use idct_transforms::{BLOCK_DIM, BLOCK_SIZE, Block, CoefficientTable};
