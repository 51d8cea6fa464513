// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ContainerError;
use crate::file_abi::{RawCpuSection, RawHeader, FILE_STATE_NORMAL};
use crate::input_trace::FileInputTrace;
use crate::output_file::OutputFile;

/// Writes a trace container file: header, per-CPU section index, and
/// command-line block, followed by each CPU's concatenated page stream.
///
/// Mirrors `tracecmd_copy` / `tracecmd_append_cpu_data` / `tracecmd_output_close`:
/// the header and command-line block are copied from an already-open input
/// at construction time (placeholder section entries are written so the
/// command-line block and CPU data land at their final offsets immediately),
/// CPU data is appended once the splitter has finished writing every
/// per-CPU temp file, and `close` rewrites the section index now that every
/// CPU's final offset and size are known.
pub struct FileOutputTrace {
    file: OutputFile,
    header: RawHeader,
    cmd_line: Vec<u8>,
    sections: Vec<RawCpuSection>,
}

impl FileOutputTrace {
    /// Opens `path` for writing and copies the input's format header and
    /// command-line block (everything up to, but excluding, per-CPU data).
    pub fn copy_header_from(input: &FileInputTrace, path: &Path) -> Result<Self, ContainerError> {
        let mut header = input.raw_header();
        header.file_state = FILE_STATE_NORMAL;
        let cmd_line = input.cmd_line_bytes().to_vec();
        let cpu_count = header.cpu_count as usize;

        let mut file = OutputFile::create(path)?;
        file.write_struct(&header)?;
        for _ in 0..cpu_count {
            file.write_struct(&RawCpuSection::default())?;
        }
        file.write_all(&(cmd_line.len() as u64).to_ne_bytes())?;
        file.write_all(&cmd_line)?;

        return Ok(Self {
            file,
            header,
            cmd_line,
            sections: vec![RawCpuSection::default(); cpu_count],
        });
    }

    /// Overrides the output's declared clock name.
    ///
    /// The splitter always forwards the input's own clock (see
    /// `ftrace_split::chunk_driver`), so this is unused by the core today,
    /// but is kept on the adapter because it's part of the external
    /// interface this crate stands in for (spec §6).
    pub fn set_out_clock(&mut self, name: &str) {
        let mut bytes = [0u8; 16];
        let src = name.as_bytes();
        let n = src.len().min(bytes.len());
        bytes[..n].copy_from_slice(&src[..n]);
        self.header.clock_name = bytes;
    }

    /// Concatenates each per-CPU temp file into the output's per-CPU
    /// section, in order, recording a [`RawCpuSection`] entry for each one.
    ///
    /// PRECONDITION: `cpu_files.len() == cpu_count` as copied from the input
    /// header.
    pub fn append_cpu_data(&mut self, cpu_files: &[PathBuf]) -> Result<(), ContainerError> {
        debug_assert_eq!(cpu_files.len(), self.sections.len());
        for (cpu, path) in cpu_files.iter().enumerate() {
            let data = fs::read(path)?;
            let offset = self.file.pos();
            self.file.write_all(&data)?;
            self.sections[cpu] = RawCpuSection {
                offset,
                size: data.len() as u64,
            };
        }
        return Ok(());
    }

    /// Finalizes the section index (now that every CPU's offset and size is
    /// known) and flushes the output file.
    pub fn close(mut self) -> Result<(), ContainerError> {
        self.file.seek_absolute(0)?;
        self.file.write_struct(&self.header)?;
        for section in &self.sections {
            self.file.write_struct(section)?;
        }
        self.file.flush()?;
        return Ok(());
    }
}
