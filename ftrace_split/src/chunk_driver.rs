// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use std::fs::File;
use std::path::{Path, PathBuf};

use ftrace_container::InputTrace;
use ftrace_format::{ByteOrder, Record, SplitPredicate};

use crate::error::SplitError;
use crate::page_builder::{AppendOutcome, CpuPage};

/// How records are pulled from the input and routed to per-CPU pages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoutingMode {
    /// Records are pulled in global timestamp order across every CPU, one
    /// at a time, and routed to whichever CPU produced them.
    Global,
    /// Each CPU's record stream is processed to the chunk's termination
    /// condition independently, one CPU at a time, before moving to the
    /// next. Required by `SplitPredicate::Pages`.
    PerCpu,
    /// Like `PerCpu`, but only the named CPU is processed; every other
    /// CPU's temp file is created empty.
    SingleCpu(u32),
}

/// Inputs to one call of [`drive_chunk`]; mirrors the `Chunk` data model of
/// spec §3 minus the per-CPU page state (owned internally) and
/// `next_start_ts` (returned in [`ChunkResult`]).
#[derive(Clone, Copy, Debug)]
pub struct ChunkOptions {
    /// Start of the window; `0` means "from the first available record".
    pub start_ts: u64,
    /// End of the window (inclusive); `0` means open-ended.
    pub end_ts: u64,
    /// What ends the chunk besides `end_ts`/exhaustion.
    pub predicate: SplitPredicate,
    /// How records are pulled and routed.
    pub routing: RoutingMode,
}

/// Outcome of one call to [`drive_chunk`].
pub struct ChunkResult {
    /// Per-CPU temp files, in CPU order, ready to hand to
    /// `ftrace_container::FileOutputTrace::append_cpu_data`.
    pub cpu_files: Vec<PathBuf>,
    /// Seed `start_ts` for a subsequent chunk in a repeated split; `0` only
    /// when nothing more remains to split.
    pub next_start_ts: u64,
}

/// Orchestrates one output chunk end to end: seeks the input to
/// `opts.start_ts`, pulls records (in the order `opts.routing` selects),
/// routes each to its CPU's [`CpuPage`], applies `opts.predicate`, flushes
/// every still-open page, and computes `next_start_ts` (spec §4.5).
///
/// `temp_dir`/`base_name` name the per-CPU temp files
/// `<temp_dir>/.tmp.<base_name>.<cpu>`, matching the reference's naming.
pub fn drive_chunk(
    input: &mut dyn InputTrace,
    temp_dir: &Path,
    base_name: &str,
    opts: &ChunkOptions,
) -> Result<ChunkResult, SplitError> {
    if opts.predicate.requires_per_cpu_mode() && opts.routing == RoutingMode::Global {
        return Err(SplitError::Unsupported(
            "SplitPredicate::Pages requires per-CPU routing",
        ));
    }

    let cpu_count = input.cpu_count();
    let byte_order = ByteOrder::new(input.is_big_endian());
    let long_size = input.long_size();
    let page_size = input.page_size();

    let mut cpu_files = Vec::with_capacity(cpu_count as usize);
    let mut fds = Vec::with_capacity(cpu_count as usize);
    let mut pages = Vec::with_capacity(cpu_count as usize);
    for cpu in 0..cpu_count {
        let path = temp_dir.join(format!(".tmp.{}.{}", base_name, cpu));
        fds.push(File::create(&path)?);
        cpu_files.push(path);
        pages.push(CpuPage::new(cpu, byte_order, long_size, page_size));
    }

    let targets: Vec<u32> = match opts.routing {
        RoutingMode::Global | RoutingMode::PerCpu => (0..cpu_count).collect(),
        RoutingMode::SingleCpu(cpu) => {
            if cpu >= cpu_count {
                return Err(SplitError::BadArgument("-C cpu index out of range"));
            }
            vec![cpu]
        }
    };

    let mut start_ts = opts.start_ts;
    log::debug!(
        "chunk start: start_ts={} end_ts={} routing={:?} predicate={:?}",
        start_ts,
        opts.end_ts,
        opts.routing,
        opts.predicate
    );

    match opts.routing {
        RoutingMode::Global => {
            if start_ts > 0 {
                for &cpu in &targets {
                    input.seek_cpu_to_ts(cpu, start_ts);
                }
            }
            let first = input.read_next_record();
            if start_ts == 0 {
                if let Some((_, ref r)) = first {
                    start_ts = r.timestamp;
                }
            }
            run_global(input, &mut pages, &mut fds, start_ts, opts.end_ts, opts.predicate, first)?;
        }
        RoutingMode::PerCpu | RoutingMode::SingleCpu(_) => {
            let mut preloaded: Option<Record> = None;
            if start_ts == 0 {
                if let Some(&first_cpu) = targets.first() {
                    preloaded = input.read_cpu_record(first_cpu);
                    if let Some(ref r) = preloaded {
                        start_ts = r.timestamp;
                    }
                }
            }
            for (i, &cpu) in targets.iter().enumerate() {
                let preloaded_here = if i == 0 { preloaded.take() } else { None };
                run_per_cpu(
                    input,
                    &mut pages[cpu as usize],
                    &mut fds[cpu as usize],
                    start_ts,
                    opts.end_ts,
                    opts.predicate,
                    preloaded_here,
                )?;
            }
        }
    }

    for (cpu, page) in pages.iter_mut().enumerate() {
        if page.has_open_page() {
            page.flush(&mut fds[cpu])?;
        }
    }

    let mut next_start_ts = opts.end_ts;
    for page in &pages {
        if let Some(offset) = page.last_record_offset() {
            if let Some(r) = input.read_at_offset(offset) {
                let candidate = r.timestamp + 1;
                if candidate > next_start_ts {
                    next_start_ts = candidate;
                }
                input.free_record(r);
            }
        }
    }

    log::info!(
        "chunk done: {} cpu(s), {} page(s) flushed, next_start_ts={}",
        cpu_count,
        pages.iter().map(|p| p.pages_flushed()).sum::<u64>(),
        next_start_ts
    );

    return Ok(ChunkResult {
        cpu_files,
        next_start_ts,
    });
}

/// Appends `record` to `page`, opening (and, if needed, flushing a full
/// predecessor) a fresh page for it if it doesn't fit the one already open.
/// Returns `Ok(false)` instead of appending if `predicate` is
/// `SplitPredicate::Pages` and the CPU's page budget for this chunk is
/// exhausted -- the chunk should terminate without consuming `record`.
///
/// The budget check counts `pages_opened() + 1`, i.e. the page that is about
/// to be opened, not `pages_flushed()`: the reference's local page counter
/// increments on every page-boundary trigger, including the very first page
/// allocation, which hasn't been flushed yet at the moment it's counted.
/// Checking flushes instead would let one extra page through per CPU.
///
/// When a new page is opened, `record` is appended to it via
/// `append_unchecked`, not another call to `try_append`: `record` is the
/// very one the new page was opened to hold, so re-running `try_append`'s
/// missed-events check against it would always say `NeedsNewPage` again and
/// loop forever for any record carrying missed events.
fn route_record(
    page: &mut CpuPage,
    fd: &mut File,
    predicate: SplitPredicate,
    record: &Record,
) -> Result<bool, SplitError> {
    match page.try_append(record)? {
        AppendOutcome::Appended => return Ok(true),
        AppendOutcome::NeedsNewPage => {
            if let SplitPredicate::Pages(limit) = predicate {
                if page.pages_opened() + 1 > limit {
                    return Ok(false);
                }
            }
            if page.has_open_page() {
                page.flush(fd)?;
            }
            page.open_page(record);
            page.append_unchecked(record)?;
            return Ok(true);
        }
    }
}

/// True if `predicate` should end the chunk now that `events_appended`
/// records have been written and `next` (the record the iterator handed
/// back after the one just appended, if any) is known. `Pages` is handled
/// at append time in [`route_record`], not here.
fn predicate_terminates(
    predicate: SplitPredicate,
    start_ts: u64,
    events_appended: u64,
    next: Option<&Record>,
) -> bool {
    return match predicate {
        SplitPredicate::None | SplitPredicate::Pages(_) => false,
        SplitPredicate::Events(n) => events_appended >= n,
        SplitPredicate::Seconds(_) | SplitPredicate::Millis(_) | SplitPredicate::Micros(_) => {
            match (predicate.duration_limit_ns(), next) {
                (Some(limit_ns), Some(r)) => r.timestamp > start_ts.saturating_add(limit_ns),
                _ => false,
            }
        }
    };
}

/// Drives the shared (interleaved, global-timestamp-order) record stream
/// across every CPU, routing each record to its producing CPU's page.
fn run_global(
    input: &mut dyn InputTrace,
    pages: &mut [CpuPage],
    fds: &mut [File],
    start_ts: u64,
    end_ts: u64,
    predicate: SplitPredicate,
    first: Option<(u32, Record)>,
) -> Result<(), SplitError> {
    let mut events_appended = 0u64;
    let mut current = first;
    let mut exhausted = false;

    loop {
        let (cpu, record) = match current {
            Some(v) => v,
            None => {
                exhausted = true;
                break;
            }
        };

        if end_ts != 0 && record.timestamp > end_ts {
            input.free_record(record);
            break;
        }

        let appended = route_record(&mut pages[cpu as usize], &mut fds[cpu as usize], predicate, &record)?;
        input.free_record(record);
        if !appended {
            break;
        }
        events_appended += 1;

        let next = input.read_next_record();
        if next.is_none() {
            exhausted = true;
        }
        if predicate_terminates(predicate, start_ts, events_appended, next.as_ref().map(|(_, r)| r)) {
            if let Some((_, r)) = next {
                input.free_record(r);
            }
            break;
        }
        current = next;
    }

    if exhausted {
        for page in pages.iter_mut() {
            page.clear_last_record_offset();
        }
    }

    return Ok(());
}

/// Drives one CPU's record stream to completion for this chunk.
///
/// `preloaded`, when set, is a record already pulled from `cpu` (used by
/// [`drive_chunk`] when it had to read one record to discover an implicit
/// `start_ts`); otherwise this seeks (if `start_ts > 0`) and pulls the first
/// record itself.
fn run_per_cpu(
    input: &mut dyn InputTrace,
    page: &mut CpuPage,
    fd: &mut File,
    start_ts: u64,
    end_ts: u64,
    predicate: SplitPredicate,
    preloaded: Option<Record>,
) -> Result<(), SplitError> {
    let cpu = page.cpu();
    let mut events_appended = 0u64;
    let mut current = if preloaded.is_some() {
        preloaded
    } else {
        if start_ts > 0 {
            input.seek_cpu_to_ts(cpu, start_ts);
        }
        input.read_cpu_record(cpu)
    };
    let mut exhausted = false;

    loop {
        let record = match current {
            Some(r) => r,
            None => {
                exhausted = true;
                break;
            }
        };

        if end_ts != 0 && record.timestamp > end_ts {
            input.free_record(record);
            break;
        }

        let appended = route_record(page, fd, predicate, &record)?;
        input.free_record(record);
        if !appended {
            break;
        }
        events_appended += 1;

        let next = input.read_cpu_record(cpu);
        if next.is_none() {
            exhausted = true;
        }
        if predicate_terminates(predicate, start_ts, events_appended, next.as_ref()) {
            if let Some(r) = next {
                input.free_record(r);
            }
            break;
        }
        current = next;
    }

    if exhausted {
        page.clear_last_record_offset();
    }

    return Ok(());
}
