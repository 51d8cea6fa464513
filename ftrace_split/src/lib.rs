// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

#![warn(missing_docs)]

//! Ring-buffer page re-encoder: reads an already-decoded trace capture one
//! record at a time and re-packs it into one or more output chunks, each a
//! valid capture in its own right.
//!
//! [`chunk_driver::drive_chunk`] builds one chunk; [`repeat_controller::run_split`]
//! drives a full (optionally repeating) split and writes the output
//! container file(s).

mod chunk_driver;
mod error;
mod page_builder;
mod repeat_controller;

#[doc(hidden)]
pub mod test_support;

pub use chunk_driver::{drive_chunk, ChunkOptions, ChunkResult, RoutingMode};
pub use error::SplitError;
pub use page_builder::{AppendOutcome, CpuPage};
pub use repeat_controller::{run_split, RepeatOptions};
