// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use core::mem;
use core::slice;

use std::fs;
use std::io;
use std::io::Read;
use std::io::Seek;

/// A file opened for sequential and random-access reads, tracking its own
/// position so callers don't need to reason about seek cost on every read.
#[derive(Debug)]
pub(crate) struct InputFile {
    inner: fs::File,
    inner_pos: u64,
    inner_len: u64,
}

impl InputFile {
    pub fn new(file: fs::File) -> io::Result<Self> {
        let inner_len = file.metadata()?.len();
        return Ok(Self {
            inner: file,
            inner_pos: 0,
            inner_len,
        });
    }

    pub fn len(&self) -> u64 {
        return self.inner_len;
    }

    pub fn pos(&self) -> u64 {
        return self.inner_pos;
    }

    pub fn seek_absolute(&mut self, new_pos: u64) -> io::Result<()> {
        if new_pos > self.inner_len {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof));
        }
        if new_pos != self.inner_pos {
            self.inner_pos = self.inner.seek(io::SeekFrom::Start(new_pos))?;
        }
        return Ok(());
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.inner.read_exact(buf)?;
        self.inner_pos += buf.len() as u64;
        return Ok(());
    }

    pub fn read_struct<T>(&mut self) -> io::Result<T>
    where
        T: Copy, // Proxy for "T is a plain-old-data struct"
    {
        let mut value = mem::MaybeUninit::<T>::zeroed();
        let buf = unsafe {
            slice::from_raw_parts_mut(value.as_mut_ptr() as *mut u8, mem::size_of::<T>())
        };
        self.read_exact(buf)?;
        return Ok(unsafe { value.assume_init() });
    }

    pub fn read_vec(&mut self, len: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        return Ok(buf);
    }
}
