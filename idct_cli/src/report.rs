// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::io::{Result, Write};

use idct_offload::bench::BenchReport;
use idct_offload::config::RunConfig;
use idct_offload::planner::BatchPlan;
use idct_offload::validate::Validation;

pub fn format_size(bytes: u64) -> String {
    const UNITS: [(&str, u64); 3] = [("GiB", 1 << 30), ("MiB", 1 << 20), ("KiB", 1 << 10)];
    for (unit, scale) in UNITS {
        if bytes >= scale {
            return format!("{:.2} {unit}", bytes as f64 / scale as f64);
        }
    }
    format!("{bytes} B")
}

/// Echoes the effective run parameters.
pub fn write_config(out: &mut impl Write, config: &RunConfig, plan: &BatchPlan) -> Result<()> {
    let bytes = (plan.num_samples() * size_of::<i16>()) as u64;
    writeln!(
        out,
        "Total input data to be processed = {}",
        format_size(bytes)
    )?;
    writeln!(out, "IDCT block size = {}", config.transform_size.samples())?;
    writeln!(
        out,
        "Batch size (IDCT blocks processed per kernel call) = {}",
        plan.batch_size()
    )?;
    writeln!(
        out,
        "Total number of batches to be processed (total kernel calls) = {}",
        plan.num_batches()
    )?;
    writeln!(
        out,
        "Max. scheduled kernel calls (overlap compute and data transfers) = {}",
        plan.num_slots()
    )?;
    writeln!(
        out,
        "Total number of blocks to be processed = {}",
        plan.num_blocks()
    )
}

/// Prints the verdict, plus timings when the run was full size.
pub fn write_report(out: &mut impl Write, report: &BenchReport, with_timings: bool) -> Result<()> {
    writeln!(out, "------ Runs complete, validating results")?;
    if let Validation::Mismatch(mismatch) = &report.validation {
        writeln!(out, "------ {mismatch}")?;
    }
    if with_timings {
        for (label, elapsed, throughput) in [
            (
                "Reference",
                report.timings.reference,
                report.reference_throughput(),
            ),
            (
                "Accelerator",
                report.timings.accelerator,
                report.accelerator_throughput(),
            ),
        ] {
            writeln!(
                out,
                "{:<24}{:.6} s ( {:.3} ms )",
                format!("{label} Time:"),
                elapsed.as_secs_f64(),
                elapsed.as_secs_f64() * 1000.0
            )?;
            writeln!(
                out,
                "{:<24}{:.2} MiB/s",
                format!("{label} Throughput:"),
                throughput.mib_per_sec()
            )?;
        }
    }
    let verdict = if report.passed() { "PASSED" } else { "FAILED" };
    writeln!(out, "------ TEST {verdict} ------")?;
    if with_timings {
        writeln!(
            out,
            "Accelerator speedup (reference time / accelerator time): {:.2}",
            report.speedup()
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use idct_offload::monitor::Timings;
    use idct_offload::pipeline::PipelineStats;
    use idct_offload::validate::Mismatch;
    use std::time::Duration;

    fn report(validation: Validation) -> BenchReport {
        BenchReport {
            validation,
            timings: Timings {
                accelerator: Duration::from_millis(500),
                reference: Duration::from_secs(2),
            },
            bytes_processed: 4 << 20,
            pipeline: PipelineStats::default(),
        }
    }

    fn render(report: &BenchReport, with_timings: bool) -> String {
        let mut out = Vec::new();
        write_report(&mut out, report, with_timings).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn sizes() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.00 KiB");
        assert_eq!(format_size(512 << 20), "512.00 MiB");
        assert_eq!(format_size(3 << 30), "3.00 GiB");
    }

    #[test]
    fn config_echo() {
        let config = RunConfig::default();
        let plan = config.plan().unwrap();
        let mut out = Vec::new();
        write_config(&mut out, &config, &plan).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("= 512.00 MiB\n"));
        assert!(text.contains("IDCT block size = 64\n"));
        assert!(text.contains("Total number of blocks to be processed = 4194304\n"));
    }

    #[test]
    fn passed_with_timings() {
        let text = render(&report(Validation::Match), true);
        assert!(text.contains("Reference Throughput:   2.00 MiB/s\n"));
        assert!(text.contains("Accelerator Throughput: 8.00 MiB/s\n"));
        assert!(text.contains("------ TEST PASSED ------\n"));
        assert!(text.ends_with("accelerator time): 4.00\n"));
    }

    #[test]
    fn failed_without_timings() {
        let mismatch = Mismatch {
            index: 37,
            reference: 5,
            accelerator: 6,
        };
        let text = render(&report(Validation::Mismatch(mismatch)), false);
        assert_eq!(
            text,
            "------ Runs complete, validating results\n\
             ------ Error: Result mismatch at index 37: reference 5 != accelerator 6\n\
             ------ TEST FAILED ------\n"
        );
    }
}
