// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

#[cfg(feature = "tracing")]
pub use tracing::{debug, error, info, trace, warn};

#[cfg(not(feature = "tracing"))]
mod noop {
    macro_rules! noop_log {
        ($($args:tt)*) => {{}};
    }
    pub(crate) use noop_log as debug;
    pub(crate) use noop_log as error;
    pub(crate) use noop_log as info;
    pub(crate) use noop_log as trace;
    pub(crate) use noop_log as warn;
}

#[cfg(not(feature = "tracing"))]
#[allow(unused_imports)]
pub(crate) use noop::{debug, error, info, trace, warn};
