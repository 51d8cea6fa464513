// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use std::fs;
use std::path::PathBuf;

use ftrace_container::FileInputTrace;
use ftrace_format::SplitPredicate;

use crate::chunk_driver::{drive_chunk, ChunkOptions, RoutingMode};
use crate::error::SplitError;
use ftrace_container::FileOutputTrace;

/// Drives one non-repeating split, or a full repeat run, to completion.
#[derive(Clone, Debug)]
pub struct RepeatOptions {
    /// Output path. In repeat mode this is a prefix; each chunk is written
    /// to `<output_base>.NNNN` (4-digit, 1-based), matching the reference's
    /// `"%s.%04d"`. Otherwise it's the exact output path.
    pub output_base: PathBuf,
    /// Directory for the per-CPU temp files created while a chunk is built.
    pub temp_dir: PathBuf,
    /// If true, keep producing chunks (seeding each one's `start_ts` from
    /// the previous chunk's `next_start_ts`) until the input is exhausted or
    /// `end_ts` is reached. If false, exactly one chunk is written.
    pub repeat: bool,
    /// First chunk's window start; `0` means "from the first record".
    pub start_ts: u64,
    /// Window end (inclusive) shared by every chunk; `0` means open-ended.
    pub end_ts: u64,
    /// Chunk termination predicate, shared by every chunk.
    pub predicate: SplitPredicate,
    /// Record routing mode, shared by every chunk.
    pub routing: RoutingMode,
}

/// Runs [`RepeatOptions`] against `input`, returning the output paths
/// written, in order.
///
/// Mirrors `trace-split.c`'s `trace_split()` outer loop: one non-repeating
/// call writes `output_base` directly; a repeating run writes
/// `output_base.0001`, `.0002`, ... and stops as soon as the next chunk's
/// `start_ts` would be `0` or would not precede `end_ts`.
pub fn run_split(input: &mut FileInputTrace, opts: &RepeatOptions) -> Result<Vec<PathBuf>, SplitError> {
    let base_name = opts
        .output_base
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("split")
        .to_string();
    let base_display = opts.output_base.display().to_string();

    let mut outputs = Vec::new();
    let mut start_ts = opts.start_ts;
    let mut chunk_index: u32 = 1;

    loop {
        let output_path = if opts.repeat {
            PathBuf::from(format!("{base_display}.{chunk_index:04}"))
        } else {
            opts.output_base.clone()
        };
        chunk_index += 1;

        let chunk_opts = ChunkOptions {
            start_ts,
            end_ts: opts.end_ts,
            predicate: opts.predicate,
            routing: opts.routing,
        };
        let result = drive_chunk(input, &opts.temp_dir, &base_name, &chunk_opts)?;

        let mut output = FileOutputTrace::copy_header_from(input, &output_path)?;
        output.append_cpu_data(&result.cpu_files)?;
        output.close()?;
        for temp_file in &result.cpu_files {
            let _ = fs::remove_file(temp_file);
        }

        log::info!("wrote {}", output_path.display());
        outputs.push(output_path);

        if !opts.repeat {
            break;
        }
        start_ts = result.next_start_ts;
        if start_ts == 0 || (opts.end_ts != 0 && start_ts >= opts.end_ts) {
            break;
        }
    }

    return Ok(outputs);
}
