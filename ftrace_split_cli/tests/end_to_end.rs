// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Black-box round-trip tests against a hand-built capture file, exercising
//! the full pipeline (`FileInputTrace::open` -> `ftrace_split::run_split` ->
//! `FileInputTrace::open` on the result) through nothing but the public API
//! of `ftrace_container`/`ftrace_format`/`ftrace_split`. Mirrors the
//! end-to-end scenarios of a kernel-trace splitter's test suite: identity,
//! time window, duration predicate, event-count predicate with repeat, and
//! missed-events page flags.

use std::fs;
use std::path::{Path, PathBuf};

use ftrace_container::FileInputTrace;
use ftrace_format::{encode, ByteOrder, SplitPredicate};
use ftrace_split::{run_split, RepeatOptions, RoutingMode};

const MAGIC: [u8; 8] = *b"FTRACE01";
const FILE_STATE_NORMAL: u8 = 0;

/// One record to bake into a fixture CPU stream.
struct FixtureRecord {
    ts: u64,
    payload: Vec<u8>,
    missed_events: u64,
}

fn rec(ts: u64, payload: &[u8]) -> FixtureRecord {
    return FixtureRecord {
        ts,
        payload: payload.to_vec(),
        missed_events: 0,
    };
}

/// Packs one CPU's records into as many `page_size` pages as needed,
/// following the same rules `ftrace_split::page_builder::CpuPage` applies:
/// a missed-events annotation always forces a fresh page, and a record that
/// doesn't fit the remaining space forces a flush-and-reopen. Implemented
/// independently (not by calling into `ftrace_split`) so this fixture
/// exercises the wire format rather than the module under test.
fn pack_cpu_pages(byte_order: ByteOrder, long_size: u8, page_size: u32, records: &[FixtureRecord]) -> Vec<u8> {
    let header_bytes: usize = if long_size == 8 { 16 } else { 12 };
    let mut pages: Vec<Vec<u8>> = Vec::new();
    let mut page: Vec<u8> = Vec::new();
    let mut write_idx = 0usize;
    let mut base_ts = 0u64;
    let mut pending_missed = 0u64;
    let mut open = false;

    let close_page = |page: &mut Vec<u8>, write_idx: usize, pending_missed: u64| {
        page.resize(page_size as usize, 0);
        let mut flags = 0u64;
        if pending_missed != 0 {
            flags |= 1 << 31; // MISSING_EVENTS
            flags |= 1 << 30; // MISSING_STORED
        }
        let commit = (write_idx - header_bytes) as u64 | flags;
        if long_size == 8 {
            byte_order.write_u64(&mut page[8..16], commit);
        } else {
            byte_order.write_u32(&mut page[8..12], commit as u32);
        }
        if flags & (1 << 30) != 0 {
            byte_order.write_u64(&mut page[write_idx..write_idx + 8], pending_missed);
        }
    };

    for record in records {
        let framed = ftrace_format::Record::new(record.ts, record.payload.clone(), 0, record.missed_events);
        loop {
            let needs_new_page =
                !open || write_idx as u32 + framed.record_size as u32 > page_size || record.missed_events != 0;
            if needs_new_page {
                if open {
                    close_page(&mut page, write_idx, pending_missed);
                    pages.push(std::mem::take(&mut page));
                }
                page = vec![0u8; page_size as usize];
                byte_order.write_u64(&mut page[0..8], record.ts);
                write_idx = header_bytes;
                base_ts = record.ts;
                pending_missed = record.missed_events;
                open = true;
            }

            let delta = record.ts - base_ts;
            let mut out = vec![0u8; page_size as usize - write_idx];
            let encoded = encode(byte_order, delta, &record.payload, framed.record_size, &mut out).unwrap();
            page[write_idx..write_idx + encoded.bytes_written].copy_from_slice(&out[..encoded.bytes_written]);
            write_idx += encoded.bytes_written;

            if encoded.kind == ftrace_format::HeaderKind::TimeExtend {
                base_ts += delta;
                continue;
            }
            base_ts = record.ts;
            break;
        }
    }
    if open {
        close_page(&mut page, write_idx, pending_missed);
        pages.push(page);
    }

    return pages.into_iter().flatten().collect();
}

/// Writes a complete capture file: header, per-CPU section index,
/// command-line block, then each CPU's packed page stream.
fn write_fixture(path: &Path, page_size: u32, long_size: u8, big_endian: bool, streams: &[Vec<FixtureRecord>]) {
    let byte_order = ByteOrder::new(big_endian);
    let cpu_count = streams.len() as u32;
    let cmd_line = b"trace-cmd record -e sched\0".to_vec();

    let header_len = 36usize; // magic(8) + 4 flag bytes + page_size(4) + cpu_count(4) + clock_name(16)
    let section_len = 16usize; // offset(8) + size(8)
    let mut data_offset = header_len + cpu_count as usize * section_len + 8 + cmd_line.len();

    let page_streams: Vec<Vec<u8>> = streams
        .iter()
        .map(|records| pack_cpu_pages(byte_order, long_size, page_size, records))
        .collect();

    let mut sections = Vec::with_capacity(page_streams.len());
    for stream in &page_streams {
        sections.push((data_offset as u64, stream.len() as u64));
        data_offset += stream.len();
    }

    let mut bytes = Vec::new();
    bytes.extend_from_slice(&MAGIC);
    bytes.push(big_endian as u8);
    bytes.push(long_size);
    bytes.push(FILE_STATE_NORMAL);
    bytes.push(0); // reserved
    bytes.extend_from_slice(&page_size.to_ne_bytes());
    bytes.extend_from_slice(&cpu_count.to_ne_bytes());
    let mut clock_name = [0u8; 16];
    clock_name[..5].copy_from_slice(b"local");
    bytes.extend_from_slice(&clock_name);
    for (offset, size) in &sections {
        bytes.extend_from_slice(&offset.to_ne_bytes());
        bytes.extend_from_slice(&size.to_ne_bytes());
    }
    bytes.extend_from_slice(&(cmd_line.len() as u64).to_ne_bytes());
    bytes.extend_from_slice(&cmd_line);
    for stream in &page_streams {
        bytes.extend_from_slice(stream);
    }

    fs::write(path, bytes).unwrap();
}

fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("ftrace_split_cli_e2e_{tag}_{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    return dir;
}

/// Reads back every record of every CPU from a capture, in per-CPU order.
fn read_all(path: &Path) -> Vec<Vec<(u64, Vec<u8>)>> {
    use ftrace_container::InputTrace;
    let mut input = FileInputTrace::open(path).unwrap();
    let mut out = vec![Vec::new(); input.cpu_count() as usize];
    while let Some((cpu, record)) = input.read_next_record() {
        out[cpu as usize].push((record.timestamp, record.payload.clone()));
        input.free_record(record);
    }
    return out;
}

fn three_cpu_fixture(dir: &Path) -> PathBuf {
    let mut streams = Vec::new();
    for _cpu in 0..3u32 {
        let records: Vec<FixtureRecord> = (0..10)
            .map(|i| rec(100 + i * 10, &[1, 2, 3, 4]))
            .collect();
        streams.push(records);
    }
    let path = dir.join("input.dat");
    write_fixture(&path, 4096, 8, false, &streams);
    return path;
}

#[test]
fn identity_split_preserves_every_record() {
    let dir = scratch_dir("identity");
    let input_path = three_cpu_fixture(&dir);
    let mut input = FileInputTrace::open(&input_path).unwrap();

    let opts = RepeatOptions {
        output_base: dir.join("out.dat"),
        temp_dir: dir.clone(),
        repeat: false,
        start_ts: 0,
        end_ts: 0,
        predicate: SplitPredicate::None,
        routing: RoutingMode::Global,
    };
    let outputs = run_split(&mut input, &opts).unwrap();
    assert_eq!(outputs.len(), 1);

    let before = read_all(&input_path);
    let after = read_all(&outputs[0]);
    assert_eq!(before, after);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn time_window_excludes_records_outside_range() {
    let dir = scratch_dir("window");
    let input_path = three_cpu_fixture(&dir);
    let mut input = FileInputTrace::open(&input_path).unwrap();

    let opts = RepeatOptions {
        output_base: dir.join("out.dat"),
        temp_dir: dir.clone(),
        repeat: false,
        start_ts: 120,
        end_ts: 170,
        predicate: SplitPredicate::None,
        routing: RoutingMode::Global,
    };
    let outputs = run_split(&mut input, &opts).unwrap();
    let after = read_all(&outputs[0]);
    for cpu_records in &after {
        for (ts, _) in cpu_records {
            assert!((120..=170).contains(ts));
        }
        // ts in [120, 170] step 10 => 120,130,...,170 = 6 records.
        assert_eq!(cpu_records.len(), 6);
    }

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn duration_predicate_bounds_a_single_chunk() {
    let dir = scratch_dir("duration");
    let input_path = three_cpu_fixture(&dir);
    let mut input = FileInputTrace::open(&input_path).unwrap();

    let opts = RepeatOptions {
        output_base: dir.join("out.dat"),
        temp_dir: dir.clone(),
        repeat: false,
        start_ts: 100,
        end_ts: 0,
        predicate: SplitPredicate::Micros(50), // 50us = 50_000 ns
        routing: RoutingMode::Global,
    };
    let outputs = run_split(&mut input, &opts).unwrap();
    let after = read_all(&outputs[0]);
    for cpu_records in &after {
        for (ts, _) in cpu_records {
            assert!(*ts <= 100 + 50_000);
        }
    }

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn event_count_predicate_with_repeat_splits_into_equal_chunks() {
    let dir = scratch_dir("events_repeat");
    let mut streams = Vec::new();
    for _cpu in 0..1u32 {
        let records: Vec<FixtureRecord> = (0..30).map(|i| rec(100 + i * 10, &[9, 9, 9, 9])).collect();
        streams.push(records);
    }
    let input_path = dir.join("input.dat");
    write_fixture(&input_path, 4096, 8, false, &streams);
    let mut input = FileInputTrace::open(&input_path).unwrap();

    let opts = RepeatOptions {
        output_base: dir.join("out.dat"),
        temp_dir: dir.clone(),
        repeat: true,
        start_ts: 0,
        end_ts: 0,
        predicate: SplitPredicate::Events(10),
        routing: RoutingMode::Global,
    };
    let outputs = run_split(&mut input, &opts).unwrap();
    assert_eq!(outputs.len(), 3);

    let mut all_ts = Vec::new();
    for output in &outputs {
        let chunk = read_all(output);
        assert_eq!(chunk[0].len(), 10);
        all_ts.extend(chunk[0].iter().map(|(ts, _)| *ts));
    }
    let expected: Vec<u64> = (0..30).map(|i| 100 + i * 10).collect();
    assert_eq!(all_ts, expected);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn missed_events_force_a_fresh_page_with_flags_set() {
    use ftrace_container::InputTrace;

    let dir = scratch_dir("missed_events");
    let mut cpu1_records: Vec<FixtureRecord> = (0..10).map(|i| rec(100 + i * 10, &[1, 2, 3, 4])).collect();
    cpu1_records[4].missed_events = 7; // 5th record on CPU 1, ts=140

    let streams = vec![
        (0..10).map(|i| rec(100 + i * 10, &[1, 2, 3, 4])).collect(), // CPU 0, no drops
        cpu1_records,                                                // CPU 1, drop before record 5
    ];
    let input_path = dir.join("input.dat");
    write_fixture(&input_path, 128, 8, false, &streams);

    // The fixture itself decodes the dropped-event count back at the right record.
    let mut check = FileInputTrace::open(&input_path).unwrap();
    let dropped = std::iter::from_fn(|| check.read_cpu_record(1))
        .find(|r| r.missed_events != 0)
        .unwrap();
    assert_eq!(dropped.timestamp, 140);
    assert_eq!(dropped.missed_events, 7);

    let mut input = FileInputTrace::open(&input_path).unwrap();
    let opts = RepeatOptions {
        output_base: dir.join("out.dat"),
        temp_dir: dir.clone(),
        repeat: false,
        start_ts: 0,
        end_ts: 0,
        predicate: SplitPredicate::None,
        routing: RoutingMode::PerCpu,
    };
    let outputs = run_split(&mut input, &opts).unwrap();
    let before = read_all(&input_path);
    let after = read_all(&outputs[0]);
    assert_eq!(before, after);

    // The annotation survives the re-encode too.
    let mut reopened = FileInputTrace::open(&outputs[0]).unwrap();
    let dropped = std::iter::from_fn(|| reopened.read_cpu_record(1))
        .find(|r| r.missed_events != 0)
        .unwrap();
    assert_eq!(dropped.timestamp, 140);
    assert_eq!(dropped.missed_events, 7);

    let _ = fs::remove_dir_all(&dir);
}
