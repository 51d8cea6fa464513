// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Wire format for kernel ring-buffer trace pages.
//!
//! This crate has no knowledge of files or containers; it only knows how to
//! turn a stream of `(timestamp, payload)` records into the bytes a
//! ring-buffer page is made of, and back. See [`byte_order`] for the
//! endian-aware integer codec and [`tlv`] for the per-record header encoding.

#![warn(missing_docs)]
#![allow(clippy::needless_return)]

mod byte_order;
mod record;
mod split_predicate;
mod tlv;

pub use byte_order::{ByteOrder, HOST_IS_BIG_ENDIAN, KEEP_ENDIAN, SWAP_ENDIAN};
pub use record::Record;
pub use split_predicate::SplitPredicate;
pub use tlv::{
    decode_header, encode, DecodedHeader, EncodeError, EncodedHeader, HeaderKind,
    MAX_INLINE_DELTA, MAX_INLINE_LEN_WORDS, TIME_EXTEND_BITS,
};
