// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use core::mem;
use core::slice;

use std::fs;
use std::io;
use std::io::Seek;
use std::io::Write;

/// A file opened for sequential writes, tracking its own position the way
/// [`crate::input_file::InputFile`] tracks its read position.
#[derive(Debug)]
pub(crate) struct OutputFile {
    inner: fs::File,
    inner_pos: u64,
}

impl OutputFile {
    pub fn create(path: &std::path::Path) -> io::Result<Self> {
        let mut options = fs::OpenOptions::new();
        options.create(true);
        options.truncate(true);
        options.write(true);
        return Ok(Self {
            inner: options.open(path)?,
            inner_pos: 0,
        });
    }

    pub fn pos(&self) -> u64 {
        return self.inner_pos;
    }

    pub fn flush(&mut self) -> io::Result<()> {
        return self.inner.flush();
    }

    pub fn seek_absolute(&mut self, new_pos: u64) -> io::Result<u64> {
        self.inner_pos = self.inner.seek(io::SeekFrom::Start(new_pos))?;
        return Ok(self.inner_pos);
    }

    pub fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.inner.write_all(data)?;
        self.inner_pos += data.len() as u64;
        return Ok(());
    }

    pub fn write_struct<T>(&mut self, value: &T) -> io::Result<()>
    where
        T: Copy, // Proxy for "T is a plain-old-data struct"
    {
        return self.write_all(unsafe {
            slice::from_raw_parts(value as *const T as *const u8, mem::size_of::<T>())
        });
    }
}
