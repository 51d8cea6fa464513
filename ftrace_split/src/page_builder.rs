// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use std::fs::File;
use std::io::Write;

use ftrace_format::{encode, ByteOrder, HeaderKind, Record};

use crate::error::SplitError;

const MISSING_EVENTS: u64 = 1 << 31;
const MISSING_STORED: u64 = 1 << 30;

/// Result of [`CpuPage::try_append`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The record was written; the page's `write_idx`/`base_ts` advanced.
    Appended,
    /// The page has no room for this record (or the record carries a
    /// missed-events annotation, which always forces a page boundary). The
    /// caller must flush the current page (if any), open a fresh one, and
    /// retry.
    NeedsNewPage,
}

/// One CPU's in-flight output page: the fixed `page_size` buffer, the
/// write cursor into it, and the bookkeeping needed to fill in the commit
/// field at flush time.
///
/// A `CpuPage` is created the first time a record is routed to its CPU
/// within a chunk (see `ftrace_split::chunk_driver`), mutated only through
/// `open_page`/`try_append`/`flush`, and dropped at chunk end. It owns its
/// buffer exclusively; the chunk driver owns the array of `CpuPage`s.
pub struct CpuPage {
    cpu: u32,
    byte_order: ByteOrder,
    long_size: u8,
    page_size: u32,
    buffer: Vec<u8>,
    write_idx: usize,
    base_ts: u64,
    pending_missed_events: u64,
    has_open_page: bool,
    last_record_offset: Option<u64>,
    pages_flushed: u64,
    pages_opened: u64,
}

impl CpuPage {
    /// Creates the (initially closed) page state for `cpu`. No buffer is
    /// allocated until the first call to `open_page`.
    pub fn new(cpu: u32, byte_order: ByteOrder, long_size: u8, page_size: u32) -> Self {
        return Self {
            cpu,
            byte_order,
            long_size,
            page_size,
            buffer: vec![0u8; page_size as usize],
            write_idx: page_size as usize + 1, // sentinel: "no open page"
            base_ts: 0,
            pending_missed_events: 0,
            has_open_page: false,
            last_record_offset: None,
            pages_flushed: 0,
            pages_opened: 0,
        };
    }

    /// The CPU this page belongs to.
    pub fn cpu(&self) -> u32 {
        return self.cpu;
    }

    /// True if a page is currently open (between `open_page` and `flush`).
    pub fn has_open_page(&self) -> bool {
        return self.has_open_page;
    }

    /// Number of pages flushed on this CPU so far in the current chunk.
    pub fn pages_flushed(&self) -> u64 {
        return self.pages_flushed;
    }

    /// Number of pages opened (via `open_page`) on this CPU so far in the
    /// current chunk, including the currently open one if any.
    ///
    /// This is what `SplitPredicate::Pages` actually counts against: the
    /// reference increments its page counter on every page-boundary trigger,
    /// including the very first page allocation (which hasn't been flushed
    /// yet). Counting flushes instead would let one extra page through per
    /// CPU before the limit engages.
    pub fn pages_opened(&self) -> u64 {
        return self.pages_opened;
    }

    /// Offset (in the source trace) of the last record successfully routed
    /// to this CPU, or `None` if no record has been routed yet this chunk.
    /// Used by the chunk driver to compute `next_start_ts`.
    pub fn last_record_offset(&self) -> Option<u64> {
        return self.last_record_offset;
    }

    /// Clears the remembered last-record offset. Called by the chunk driver
    /// when a CPU's record stream runs out mid-chunk, matching the
    /// reference's "if we hit the end of the cpu, clear the offset".
    pub fn clear_last_record_offset(&mut self) {
        self.last_record_offset = None;
    }

    /// Header bytes preceding the record stream: the 8-byte base timestamp
    /// plus the 4- or 8-byte commit field.
    fn header_bytes(&self) -> usize {
        return if self.long_size == 8 { 16 } else { 12 };
    }

    /// Zeroes the buffer and opens a fresh page seeded by `first_record`.
    ///
    /// PRECONDITION: no page is currently open (callers flush first).
    pub fn open_page(&mut self, first_record: &Record) {
        debug_assert!(!self.has_open_page);
        self.buffer.iter_mut().for_each(|b| *b = 0);
        self.byte_order
            .write_u64(&mut self.buffer[0..8], first_record.timestamp);
        self.write_idx = self.header_bytes();
        self.base_ts = first_record.timestamp;
        self.pending_missed_events = first_record.missed_events;
        self.has_open_page = true;
        self.pages_opened += 1;
    }

    /// Bytes of record stream this page can hold before flush-time framing:
    /// the full `page_size`, minus the trailing 8-byte missed-events count
    /// reserved once the open page carries a missed-events annotation (see
    /// `flush`).
    fn effective_page_size(&self) -> u32 {
        return if self.pending_missed_events != 0 {
            self.page_size.saturating_sub(8)
        } else {
            self.page_size
        };
    }

    /// Attempts to append `record` to the currently open page.
    ///
    /// Returns `NeedsNewPage` without mutating anything if there's no open
    /// page, the record's framed size doesn't fit the remaining space, or
    /// the record carries a missed-events annotation -- a record with
    /// missed events always forces a fresh page boundary, even one that
    /// would otherwise fit. Otherwise delegates to `append_unchecked`.
    ///
    /// Callers that have just called `open_page(record)` specifically to
    /// hold `record` must call `append_unchecked` directly instead of
    /// calling this again: the missed-events check above is only the
    /// "should I open a new page" decision, and re-running it against the
    /// very record the new page was opened for would never succeed.
    pub fn try_append(&mut self, record: &Record) -> Result<AppendOutcome, SplitError> {
        if !self.has_open_page
            || self.write_idx as u32 + record.record_size as u32 > self.effective_page_size()
            || record.missed_events != 0
        {
            return Ok(AppendOutcome::NeedsNewPage);
        }

        self.append_unchecked(record)?;
        return Ok(AppendOutcome::Appended);
    }

    /// Encodes `record` onto the currently open page without first deciding
    /// whether a new page is needed. Used by `try_append`'s own success
    /// path, and directly by `ftrace_split::chunk_driver::route_record`
    /// right after `open_page`, mirroring `trace-split.c`'s single-pass
    /// `write_record()`, which never re-examines `record->missed_events`
    /// once the fresh page exists.
    ///
    /// Retries internally, with an advanced `base_ts`, if the encoder had
    /// to emit a `TIME_EXTEND` escape first.
    ///
    /// PRECONDITION: a page is open. Fails with `SplitError::PageOverflow`
    /// if `record`'s framing doesn't fit even a freshly opened page --
    /// callers only reach here for a record whose size was already checked
    /// against a fresh page's capacity, so this is a defensive backstop,
    /// not an expected outcome.
    pub fn append_unchecked(&mut self, record: &Record) -> Result<(), SplitError> {
        debug_assert!(self.has_open_page);

        if self.write_idx as u32 + record.record_size as u32 > self.effective_page_size() {
            let trailer = if self.pending_missed_events != 0 { 8 } else { 0 };
            return Err(SplitError::PageOverflow {
                needed: self.write_idx as u32 + record.record_size as u32 + trailer,
                page_size: self.page_size,
            });
        }

        loop {
            let delta = record.timestamp - self.base_ts;
            let encoded = {
                let out = &mut self.buffer[self.write_idx..];
                encode(self.byte_order, delta, &record.payload, record.record_size, out)?
            };
            self.write_idx += encoded.bytes_written;

            if encoded.kind == HeaderKind::TimeExtend {
                self.base_ts += delta;
                continue;
            }

            self.base_ts = record.timestamp;
            self.last_record_offset = Some(record.offset);
            return Ok(());
        }
    }

    /// Writes the commit field (and, if the page carries a missed-events
    /// annotation, the trailing 8-byte count) and emits the whole
    /// `page_size` buffer to `fd` in one write. Short writes are fatal, per
    /// `io::Write::write_all`'s contract.
    pub fn flush(&mut self, fd: &mut File) -> Result<(), SplitError> {
        debug_assert!(self.has_open_page);

        let mut flags = 0u64;
        if self.pending_missed_events != 0 {
            // The reference always sets both flags together; see
            // DESIGN.md's `MISSING_STORED` Open Question decision.
            flags |= MISSING_EVENTS | MISSING_STORED;
        }

        let header_bytes = self.header_bytes();
        let commit = (self.write_idx - header_bytes) as u64 | flags;
        if self.long_size == 8 {
            self.byte_order.write_u64(&mut self.buffer[8..16], commit);
        } else {
            self.byte_order.write_u32(&mut self.buffer[8..12], commit as u32);
        }

        if flags & MISSING_STORED != 0 {
            let end = self.write_idx + 8;
            // `try_append`/`append_unchecked` reserve this trailer via
            // `effective_page_size`, so this should never fire -- but a
            // maximal-size record sharing a page with missed events would
            // overrun the buffer here if that reservation were ever wrong,
            // so this is a real check rather than a `debug_assert!`.
            if end > self.buffer.len() {
                return Err(SplitError::PageOverflow {
                    needed: end as u32,
                    page_size: self.page_size,
                });
            }
            self.byte_order.write_u64(
                &mut self.buffer[self.write_idx..end],
                self.pending_missed_events,
            );
        }

        fd.write_all(&self.buffer)?;
        self.has_open_page = false;
        self.pages_flushed += 1;
        return Ok(());
    }
}
