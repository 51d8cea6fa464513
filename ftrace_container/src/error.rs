// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use core::fmt;

use std::io;

/// Errors from opening, reading, or writing a trace container file.
#[derive(Debug)]
pub enum ContainerError {
    /// The file didn't start with [`crate::file_abi::MAGIC`].
    BadMagic,
    /// The file is a `cpu latency` capture, which this crate doesn't decode.
    LatencyFormat,
    /// A read came up short of what the section table promised.
    ShortRead,
    /// A `RawCpuSection` entry pointed outside the file.
    SectionOutOfRange,
    /// Underlying I/O failure.
    Io(io::Error),
}

impl fmt::Display for ContainerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return match self {
            ContainerError::BadMagic => f.pad("input file does not start with the trace container magic"),
            ContainerError::LatencyFormat => f.pad("cpu latency captures are not supported"),
            ContainerError::ShortRead => f.pad("short read: section table promised more data than the file has"),
            ContainerError::SectionOutOfRange => f.pad("cpu section entry points outside the file"),
            ContainerError::Io(e) => e.fmt(f),
        };
    }
}

impl From<io::Error> for ContainerError {
    fn from(e: io::Error) -> Self {
        return ContainerError::Io(e);
    }
}
