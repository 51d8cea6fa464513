// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! In-memory [`ftrace_container::InputTrace`] fixture for exercising the
//! chunk driver and repeat controller without a real container file on
//! disk. Not part of this crate's stable API; used by this crate's own
//! tests and by `tests/` integration tests.

use std::collections::HashMap;

use ftrace_container::{FileState, InputTrace};
use ftrace_format::Record;

struct CpuStream {
    records: Vec<Record>,
    cursor: usize,
}

/// A hand-built capture: push records per CPU in timestamp order, then
/// drive a chunk (or a full repeat run) against it.
pub struct FakeInputTrace {
    cpu_count: u32,
    page_size: u32,
    long_size: u8,
    big_endian: bool,
    clock_name: String,
    streams: Vec<CpuStream>,
    by_offset: HashMap<u64, (u32, usize)>,
    next_offset: u64,
}

impl FakeInputTrace {
    /// Creates an empty fixture with `cpu_count` streams, all initially
    /// empty.
    pub fn new(cpu_count: u32, page_size: u32, long_size: u8, big_endian: bool) -> Self {
        let streams = (0..cpu_count)
            .map(|_| CpuStream {
                records: Vec::new(),
                cursor: 0,
            })
            .collect();
        return Self {
            cpu_count,
            page_size,
            long_size,
            big_endian,
            clock_name: "local".to_string(),
            streams,
            by_offset: HashMap::new(),
            next_offset: 0,
        };
    }

    /// Appends a record to `cpu`'s stream and returns the offset assigned to
    /// it. Records on a given CPU must be pushed in non-decreasing
    /// timestamp order, matching a real capture.
    pub fn push(&mut self, cpu: u32, timestamp: u64, payload: &[u8], missed_events: u64) -> u64 {
        let offset = self.next_offset;
        self.next_offset += 1;
        let idx = self.streams[cpu as usize].records.len();
        let record = Record::new(timestamp, payload.to_vec(), offset, missed_events);
        self.streams[cpu as usize].records.push(record);
        self.by_offset.insert(offset, (cpu, idx));
        return offset;
    }

    /// Number of records pushed to `cpu` so far.
    pub fn cpu_record_count(&self, cpu: u32) -> usize {
        return self.streams[cpu as usize].records.len();
    }
}

impl InputTrace for FakeInputTrace {
    fn cpu_count(&self) -> u32 {
        return self.cpu_count;
    }

    fn page_size(&self) -> u32 {
        return self.page_size;
    }

    fn long_size(&self) -> u8 {
        return self.long_size;
    }

    fn is_big_endian(&self) -> bool {
        return self.big_endian;
    }

    fn clock_name(&self) -> &str {
        return &self.clock_name;
    }

    fn file_state(&self) -> FileState {
        return FileState::Normal;
    }

    fn seek_cpu_to_ts(&mut self, cpu: u32, ts: u64) {
        let stream = &mut self.streams[cpu as usize];
        stream.cursor = stream
            .records
            .iter()
            .position(|r| r.timestamp >= ts)
            .unwrap_or(stream.records.len());
    }

    fn read_next_record(&mut self) -> Option<(u32, Record)> {
        let mut best: Option<(u32, u64)> = None;
        for (cpu, stream) in self.streams.iter().enumerate() {
            if let Some(record) = stream.records.get(stream.cursor) {
                if best.is_none() || record.timestamp < best.unwrap().1 {
                    best = Some((cpu as u32, record.timestamp));
                }
            }
        }
        let (cpu, _) = best?;
        let stream = &mut self.streams[cpu as usize];
        let record = stream.records[stream.cursor].clone();
        stream.cursor += 1;
        return Some((cpu, record));
    }

    fn read_cpu_record(&mut self, cpu: u32) -> Option<Record> {
        let stream = &mut self.streams[cpu as usize];
        let record = stream.records.get(stream.cursor)?.clone();
        stream.cursor += 1;
        return Some(record);
    }

    fn read_at_offset(&self, offset: u64) -> Option<Record> {
        let (cpu, idx) = *self.by_offset.get(&offset)?;
        return self.streams[cpu as usize].records.get(idx).cloned();
    }
}
