// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::io::Write;
use std::time::Duration;

use idct_offload::monitor::{ProgressFrame, ProgressSink, SideProgress};

/// Width of the blank-out written when the bars are rescaled.
const CLEAR_WIDTH: usize = 250;

/// Redraws both progress bars in place on a terminal line.
pub struct ConsoleProgress<W: Write> {
    out: W,
    /// Bars are only meaningful with a fast poll; emulation runs show times only.
    show_bars: bool,
}

impl<W: Write> ConsoleProgress<W> {
    pub fn new(out: W, show_bars: bool) -> Self {
        Self { out, show_bars }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn format_elapsed(&self, elapsed: Duration) -> String {
        if self.show_bars {
            format!("{:>5}ms", elapsed.as_millis())
        } else {
            format!("{:>5}s", elapsed.as_secs())
        }
    }

    fn side(&self, label: &str, side: &SideProgress) -> String {
        let mut line = format!("[{label} Time( {} ) :", self.format_elapsed(side.elapsed));
        if self.show_bars {
            line.push_str(&"#".repeat(side.bar_len));
        }
        if side.done {
            line.push_str(" Done.");
        }
        line.push_str(" ]  ");
        line
    }

    fn render(&mut self, frame: &ProgressFrame) -> std::io::Result<()> {
        if frame.rescaled {
            write!(self.out, "{}\r", " ".repeat(CLEAR_WIDTH))?;
        }
        let accelerator = self.side("Accelerator", &frame.accelerator);
        let reference = self.side("Reference", &frame.reference);
        write!(self.out, "{accelerator}{reference}\r")?;
        self.out.flush()
    }
}

impl<W: Write> ProgressSink for ConsoleProgress<W> {
    fn update(&mut self, frame: &ProgressFrame) {
        // Progress output is best effort.
        let _ = self.render(frame);
    }

    fn finish(&mut self) {
        let _ = writeln!(self.out, "\n\nExecution Finished")
            .and_then(|()| self.out.flush());
    }
}
