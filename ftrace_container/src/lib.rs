// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Trace container file format: the fixed-size header, the per-CPU section
//! index, the command-line block, and the `InputTrace`/`OutputTrace`
//! adapters the splitter core reads and writes through.
//!
//! Everything in this crate is concerned with bytes and file layout; none of
//! it knows how to re-encode a page -- that's [`ftrace_format`] and
//! `ftrace_split`'s job. This crate only knows how to get `Record`s in and
//! out of a container file.

#![warn(missing_docs)]
#![allow(clippy::needless_return)]

mod error;
mod file_abi;
mod input_file;
mod input_trace;
mod output_file;
mod output_trace;

pub use error::ContainerError;
pub use file_abi::{FILE_STATE_CPU_LATENCY, FILE_STATE_NORMAL, MAGIC};
pub use input_trace::{FileInputTrace, FileState, InputTrace};
pub use output_trace::FileOutputTrace;
