// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

/// Decides when the current output chunk ends.
///
/// `Seconds`/`Millis`/`Micros` are elapsed-duration limits measured from the
/// chunk's `start_ts`; `Events` counts records emitted into the chunk;
/// `Pages` counts page flushes on the current CPU and is only meaningful in
/// per-CPU mode (selecting it silently upgrades the chunk driver to per-CPU
/// routing).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplitPredicate {
    /// No duration/count limit; the chunk ends only at `end_ts` or input
    /// exhaustion.
    None,
    /// Elapsed seconds since `start_ts`.
    Seconds(u64),
    /// Elapsed milliseconds since `start_ts`.
    Millis(u64),
    /// Elapsed microseconds since `start_ts`.
    Micros(u64),
    /// Number of records emitted into the chunk.
    Events(u64),
    /// Number of pages flushed per CPU; forces per-CPU mode.
    Pages(u64),
}

impl SplitPredicate {
    /// True for the one variant ([`SplitPredicate::Pages`]) that only makes
    /// sense when each CPU is processed independently.
    pub const fn requires_per_cpu_mode(&self) -> bool {
        return matches!(self, SplitPredicate::Pages(_));
    }

    /// Converts a duration-based variant into a nanosecond limit. Returns
    /// `None` for `Events`, `Pages`, and `None` (they aren't duration-based).
    pub const fn duration_limit_ns(&self) -> Option<u64> {
        return match *self {
            SplitPredicate::Seconds(n) => n.checked_mul(1_000_000_000),
            SplitPredicate::Millis(n) => n.checked_mul(1_000_000),
            SplitPredicate::Micros(n) => n.checked_mul(1_000),
            SplitPredicate::None | SplitPredicate::Events(_) | SplitPredicate::Pages(_) => None,
        };
    }
}
