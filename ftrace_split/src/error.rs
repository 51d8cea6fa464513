// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use core::fmt;

use std::io;

use ftrace_container::ContainerError;
use ftrace_format::EncodeError;

/// Fatal error from the splitter core. Every variant is unrecoverable at the
/// point it's raised: the chunk (or the whole repeat run) aborts rather than
/// trying to continue with partial output (spec §7).
#[derive(Debug)]
pub enum SplitError {
    /// Propagated from `ftrace_container` (bad magic, latency-format input,
    /// a section entry pointing outside the file, or raw I/O failure).
    Container(ContainerError),
    /// The TLV encoder's framing assertion failed: the record's claimed
    /// `record_size` disagreed with what the encoder computed.
    Encode(EncodeError),
    /// A split type was requested in a mode it doesn't support (e.g.
    /// `SplitPredicate::Pages` outside per-CPU mode, before the implicit
    /// upgrade in `ftrace_split_cli` applies).
    Unsupported(&'static str),
    /// A count-like argument (split units, CPU index) was not positive, or
    /// otherwise out of range.
    BadArgument(&'static str),
    /// A record's framing (plus, when the page also carries a missed-events
    /// annotation, the 8-byte trailing count) doesn't fit in a single fresh
    /// page. No record should ever reach this -- page-fit is checked before
    /// a record is routed to a page -- so this only fires if that upstream
    /// invariant is violated.
    PageOverflow {
        /// Bytes the write actually needed.
        needed: u32,
        /// Total bytes available in one page.
        page_size: u32,
    },
    /// Direct I/O failure not already wrapped by `ContainerError` (e.g.
    /// opening or writing a per-CPU temp file).
    Io(io::Error),
}

impl fmt::Display for SplitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return match self {
            SplitError::Container(e) => e.fmt(f),
            SplitError::Encode(e) => e.fmt(f),
            SplitError::Unsupported(msg) => f.pad(msg),
            SplitError::BadArgument(msg) => f.pad(msg),
            SplitError::PageOverflow { needed, page_size } => write!(
                f,
                "record framing needs {needed} bytes but a page holds only {page_size}"
            ),
            SplitError::Io(e) => e.fmt(f),
        };
    }
}

impl From<ContainerError> for SplitError {
    fn from(e: ContainerError) -> Self {
        return SplitError::Container(e);
    }
}

impl From<EncodeError> for SplitError {
    fn from(e: EncodeError) -> Self {
        return SplitError::Encode(e);
    }
}

impl From<io::Error> for SplitError {
    fn from(e: io::Error) -> Self {
        return SplitError::Io(e);
    }
}
