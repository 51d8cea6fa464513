// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

/// One event record as read from a ring-buffer page.
///
/// This is an immutable view: the fields describe exactly what was stored in
/// the source page, including any padding already accounted for in
/// `record_size`. Nothing here attempts to decode the payload itself --
/// event-format decoding is outside this crate's scope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    /// Absolute timestamp, nanoseconds, monotonic within a CPU's stream.
    pub timestamp: u64,

    /// Event payload, unpadded.
    pub payload: Vec<u8>,

    /// `payload.len()` as stored on the wire; always `<= page_size - header`.
    pub payload_len: u16,

    /// Total on-disk size of this record's framing (header word, optional
    /// explicit-length word, and payload padded up to a 4-byte multiple).
    pub record_size: u16,

    /// Byte offset of this record within its source file. Used as an opaque
    /// cursor handle by `read_at_offset` -- never interpreted by this crate.
    pub offset: u64,

    /// Count of events the kernel dropped immediately before this record on
    /// the same CPU. Zero when nothing was dropped.
    pub missed_events: u64,
}

impl Record {
    /// Creates a record, computing `record_size` from `payload.len()` the
    /// way the on-disk format requires: 4-byte header, padded payload, plus
    /// an explicit 4-byte length word when the payload doesn't fit the
    /// inline length field (see [`crate::tlv`]).
    pub fn new(timestamp: u64, payload: Vec<u8>, offset: u64, missed_events: u64) -> Self {
        let payload_len = payload.len() as u16;
        let padded_len = (payload.len() as u32 + 3) & !3;
        let len_words = padded_len / 4;
        let needs_length_word = len_words == 0 || len_words > crate::tlv::MAX_INLINE_LEN_WORDS;
        let header_bytes = if needs_length_word { 8 } else { 4 };
        let record_size = (header_bytes + padded_len) as u16;
        return Self {
            timestamp,
            payload,
            payload_len,
            record_size,
            offset,
            missed_events,
        };
    }
}
