// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

/// Magic bytes at the start of every trace container file.
pub const MAGIC: [u8; 8] = *b"FTRACE01";

/// A capture recorded with the kernel's "cpu latency" ring buffer instead of
/// the normal event ring buffer. The page re-encoder doesn't understand its
/// record layout and rejects it at open time.
pub const FILE_STATE_CPU_LATENCY: u8 = 1;

/// An ordinary event-trace capture.
pub const FILE_STATE_NORMAL: u8 = 0;

/// Fixed-size file header: magic, capture-wide format parameters, and the
/// declared clock name. Always followed by `cpu_count` [`RawCpuSection`]
/// entries and then a length-prefixed command-line block.
///
/// Unlike page data (whose multi-byte fields are stored in the endianness
/// declared by `big_endian` and decoded through `ftrace_format::ByteOrder`),
/// the header and section-index integers are always written host-native:
/// this format doesn't support exchanging captures across hosts of
/// differing endianness, so there's nothing to byte-swap when reading them
/// back via [`crate::input_file::InputFile::read_struct`].
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub struct RawHeader {
    /// Must equal [`MAGIC`].
    pub magic: [u8; 8],
    /// 0 = little-endian page data, 1 = big-endian page data.
    pub big_endian: u8,
    /// 4 or 8; width of the per-page commit field.
    pub long_size: u8,
    /// [`FILE_STATE_NORMAL`] or [`FILE_STATE_CPU_LATENCY`].
    pub file_state: u8,
    _reserved: u8,
    /// Page size in bytes used by every per-CPU page in this file.
    pub page_size: u32,
    /// Number of per-CPU sections that follow the header.
    pub cpu_count: u32,
    /// Null-padded clock name, e.g. `"local"` or `"mono"`.
    pub clock_name: [u8; 16],
}

impl Default for RawHeader {
    fn default() -> Self {
        return Self {
            magic: MAGIC,
            big_endian: 0,
            long_size: 8,
            file_state: FILE_STATE_NORMAL,
            _reserved: 0,
            page_size: 0,
            cpu_count: 0,
            clock_name: [0u8; 16],
        };
    }
}

/// One entry in the per-CPU section index: where that CPU's concatenated
/// page stream lives in the file.
#[derive(Clone, Copy, Debug, Default)]
#[repr(C)]
pub struct RawCpuSection {
    /// Byte offset from the start of the file.
    pub offset: u64,
    /// Size in bytes.
    pub size: u64,
}
