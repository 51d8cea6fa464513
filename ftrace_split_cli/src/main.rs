// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Command-line front end for the ring-buffer page re-encoder: parses the
//! split window and predicate, opens the input capture, drives
//! [`ftrace_split::run_split`], and reports a diagnostic plus a non-zero
//! exit code on any fatal error.
//!
//! The core (`ftrace_split`) treats every error as fatal and doesn't attempt
//! local recovery; this binary's job is argument validation, path handling,
//! and surfacing that one diagnostic to the user.

mod cli;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;

use cli::Cli;
use ftrace_container::FileInputTrace;
use ftrace_split::{run_split, RepeatOptions, RoutingMode};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match run(Cli::parse()) {
        Ok(outputs) => {
            for path in outputs {
                println!("{}", path.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("ftrace-split: error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<Vec<PathBuf>> {
    let start_ts = seconds_to_ns(cli.start_seconds).context("invalid start time")?;
    let end_ts = match cli.end_seconds {
        Some(s) => seconds_to_ns(s).context("invalid end time")?,
        None => 0,
    };
    if end_ts != 0 && end_ts < start_ts {
        bail!("end time ({} ns) is before start time ({} ns)", end_ts, start_ts);
    }

    let (predicate, split_forces_per_cpu) = cli::resolve_split(&cli);
    let per_cpu = cli.per_cpu || split_forces_per_cpu;

    let routing = match cli.cpu_filter {
        Some(cpu) => RoutingMode::SingleCpu(cpu),
        None if per_cpu => RoutingMode::PerCpu,
        None => RoutingMode::Global,
    };

    let mut input = FileInputTrace::open(&cli.input)
        .with_context(|| format!("failed to open input trace {}", cli.input.display()))?;

    let output_base = output_base_path(&cli);
    let temp_dir = output_base
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let opts = RepeatOptions {
        output_base,
        temp_dir,
        repeat: cli.repeat,
        start_ts,
        end_ts,
        predicate,
        routing,
    };

    let outputs = run_split(&mut input, &opts).map_err(|e| anyhow!(e.to_string()))?;
    return Ok(outputs);
}

/// Converts a CLI-supplied seconds value to nanoseconds, rejecting negative
/// or non-finite input.
fn seconds_to_ns(seconds: f64) -> Result<u64> {
    if !seconds.is_finite() || seconds < 0.0 {
        bail!("time must be a non-negative number of seconds, got {seconds}");
    }
    return Ok((seconds * 1_000_000_000.0).round() as u64);
}

/// The output path(s) base: the user's `-o` argument verbatim, or the
/// input path with `.1` appended when no `-o` was given and repeat mode is
/// off (repeat mode always derives `<base>.NNNN` from whatever base it's
/// handed, so the input path itself is a fine default there too).
fn output_base_path(cli: &Cli) -> PathBuf {
    if let Some(output) = &cli.output {
        return output.clone();
    }
    if cli.repeat {
        return cli.input.clone();
    }
    let mut s = cli.input.clone().into_os_string();
    s.push(".1");
    return PathBuf::from(s);
}
