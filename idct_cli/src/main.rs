// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::builder::BoolishValueParser;
use color_eyre::eyre::{Result, WrapErr};
use idct_cli::progress::ConsoleProgress;
use idct_cli::report::{write_config, write_report};
use idct_offload::bench::run_benchmark;
use idct_offload::config::{
    DEFAULT_BATCH_SIZE, DEFAULT_MAX_SLOTS, DEFAULT_NUM_BATCHES, EMULATION_MODE_VAR,
    ExecutionProfile, RunConfig, TransformSize,
};
use idct_offload::device::EmulatedDevice;
use idct_offload::memory::HostMemory;
use idct_offload::monitor::ProgressMonitor;

const BUILD_VERSION: &str = match option_env!("VERGEN_GIT_DESCRIBE") {
    Some(describe) => describe,
    None => env!("CARGO_PKG_VERSION"),
};

#[derive(Parser)]
#[command(name = "idct_bench", version = BUILD_VERSION)]
#[command(
    about = "Offloads 8x8 IDCTs to an accelerator and checks them against a software reference"
)]
struct Opt {
    /// Accelerator image used to program the device
    image: PathBuf,

    /// IDCT blocks processed per kernel call
    batch_size: Option<usize>,

    /// Total number of batches (kernel calls)
    num_batches: Option<usize>,

    /// Maximum number of batches in flight
    max_slots: Option<usize>,

    /// Run the requested size even in emulation modes
    #[arg(value_parser = BoolishValueParser::new())]
    full_scale: Option<bool>,

    /// Samples per transform; only 64 is supported
    #[arg(long, default_value_t = 64)]
    transform_size: usize,
}

/// Returns whether the accelerator output matched the reference.
fn run(opt: Opt) -> Result<bool> {
    let profile = ExecutionProfile::from_env()?;
    let config = RunConfig {
        batch_size: opt.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
        num_batches: opt.num_batches.unwrap_or(DEFAULT_NUM_BATCHES),
        max_slots: opt.max_slots.unwrap_or(DEFAULT_MAX_SLOTS),
        full_scale: opt.full_scale.unwrap_or(false),
        profile,
        transform_size: TransformSize::new(opt.transform_size)?,
        ignore_dc: true,
    };

    let mut stdout = io::stdout();
    writeln!(stdout, "\n------ Identified run mode : {profile}")?;
    if config.is_reduced() {
        writeln!(
            stdout,
            "------ Reducing batch size and total number of batches for faster emulation"
        )?;
        writeln!(
            stdout,
            "------ For a full length emulation run pass a full-scale value of 1, or unset {EMULATION_MODE_VAR}"
        )?;
    }
    let effective = config.effective();
    let plan = effective.plan()?;
    write_config(&mut stdout, &effective, &plan)?;

    writeln!(
        stdout,
        "------ Initializing input data arrays and coefficients"
    )?;
    let memory = HostMemory::ramp(plan.num_blocks())?;
    let device = EmulatedDevice::open(&opt.image)
        .wrap_err_with(|| {
            format!("Cannot start the accelerator from {}", opt.image.display())
        })?;
    writeln!(
        stdout,
        "------ Launched reference and accelerator workers, monitoring execution"
    )?;
    stdout.flush()?;

    let mut monitor = ProgressMonitor::new(profile.poll_interval());
    let mut progress = ConsoleProgress::new(io::stdout(), !profile.is_emulation());
    let report = run_benchmark(
        device,
        &memory,
        plan,
        effective.ignore_dc,
        &mut monitor,
        &mut progress,
    )?;

    write_report(&mut stdout, &report, !config.is_reduced())?;
    Ok(report.passed())
}

fn main() -> ExitCode {
    #[cfg(feature = "tracing-subscriber")]
    {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(EnvFilter::from_default_env())
            .init();
    }

    if let Err(err) = color_eyre::install() {
        eprintln!("{err:?}");
        return ExitCode::FAILURE;
    }

    let opt = match Opt::try_parse() {
        Ok(opt) => opt,
        // --help and --version.
        Err(err) if !err.use_stderr() => err.exit(),
        Err(err) => {
            let _ = err.print();
            return ExitCode::FAILURE;
        }
    };

    println!("IDCT accelerator benchmark {BUILD_VERSION}");
    match run(opt) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("{err:?}");
            ExitCode::FAILURE
        }
    }
}
