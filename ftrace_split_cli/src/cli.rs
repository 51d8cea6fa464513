// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use std::path::PathBuf;

use clap::Parser;
use ftrace_format::SplitPredicate;

/// Splits a kernel trace capture into one or more output files covering a
/// sub-range of the input, selected by wall-clock window, elapsed duration,
/// event count, or page count.
#[derive(Parser, Debug)]
#[command(name = "ftrace-split", version, about)]
pub struct Cli {
    /// Start of the window, in seconds (floating point) on the capture's own
    /// clock. `0` means "from the first record".
    pub start_seconds: f64,

    /// End of the window, in seconds (floating point); omit for an
    /// open-ended window.
    pub end_seconds: Option<f64>,

    /// Input trace file.
    #[arg(short = 'i', value_name = "PATH", default_value = "trace.dat")]
    pub input: PathBuf,

    /// Output trace file. Defaults to the input path with `.1` appended
    /// (ignored in repeat mode, where `<path>.NNNN` is always used).
    #[arg(short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Split every N seconds of elapsed time.
    #[arg(
        short = 's',
        value_name = "N",
        group = "split_type",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub seconds: Option<u64>,

    /// Split every N milliseconds of elapsed time.
    #[arg(
        short = 'm',
        value_name = "N",
        group = "split_type",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub millis: Option<u64>,

    /// Split every N microseconds of elapsed time.
    #[arg(
        short = 'u',
        value_name = "N",
        group = "split_type",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub micros: Option<u64>,

    /// Split every N events.
    #[arg(
        short = 'e',
        value_name = "N",
        group = "split_type",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub events: Option<u64>,

    /// Split every N pages per CPU. Implies `-c` (per-CPU routing), since
    /// page counts are only meaningful per CPU.
    #[arg(
        short = 'p',
        value_name = "N",
        group = "split_type",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub pages: Option<u64>,

    /// Keep splitting until the input (or the requested window) is
    /// exhausted, writing `<output>.0001`, `<output>.0002`, ...
    #[arg(short = 'r')]
    pub repeat: bool,

    /// Route and emit records per CPU instead of in global timestamp order.
    #[arg(short = 'c')]
    pub per_cpu: bool,

    /// Restrict output to a single CPU's records (implies per-CPU routing).
    #[arg(short = 'C', value_name = "CPU")]
    pub cpu_filter: Option<u32>,
}

/// One entry of the option-letter -> [`SplitPredicate`] table used by
/// [`resolve_split`]. Kept as data instead of a fall-through `match` chain,
/// per this tool's redesign of the option parsing it's modeled on.
type SplitTableEntry = (Option<u64>, fn(u64) -> SplitPredicate, bool);

/// Resolves the (at most one, enforced by the `split_type` argument group)
/// split option the user supplied into a [`SplitPredicate`], along with
/// whether selecting it forces per-CPU routing.
///
/// Returns `(SplitPredicate::None, false)` if no split option was given --
/// the chunk never terminates early, ending only at `end_ts` or input
/// exhaustion.
pub fn resolve_split(cli: &Cli) -> (SplitPredicate, bool) {
    let table: [SplitTableEntry; 5] = [
        (cli.seconds, SplitPredicate::Seconds, false),
        (cli.millis, SplitPredicate::Millis, false),
        (cli.micros, SplitPredicate::Micros, false),
        (cli.events, SplitPredicate::Events, false),
        (cli.pages, SplitPredicate::Pages, true),
    ];
    for (value, ctor, forces_per_cpu) in table {
        if let Some(n) = value {
            return (ctor(n), forces_per_cpu);
        }
    }
    return (SplitPredicate::None, false);
}
