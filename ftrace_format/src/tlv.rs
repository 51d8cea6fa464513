// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use core::fmt;

use crate::byte_order::ByteOrder;

/// Number of low bits of a header word given to the inter-record delta
/// before a `TIME_EXTEND` escape record becomes necessary.
pub const TIME_EXTEND_BITS: u32 = 27;

/// Largest delta (in nanoseconds) that fits inline in a header word without
/// a `TIME_EXTEND` escape.
pub const MAX_INLINE_DELTA: u64 = (1u64 << TIME_EXTEND_BITS) - 1;

/// Largest payload size, in 4-byte words, that fits in the inline `len_field`.
/// Payloads larger than this need an explicit 4-byte length word.
pub const MAX_INLINE_LEN_WORDS: u32 = 28;

const EXPLICIT_LEN_FIELD: u32 = 0;
const TIME_EXTEND_LEN_FIELD: u32 = 30;

/// What kind of header a call to [`encode`] produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeaderKind {
    /// An ordinary record; payload length is carried inline in the header.
    Inline,
    /// An ordinary record whose payload didn't fit the inline length field;
    /// an explicit 4-byte length word follows the header.
    ExplicitLength,
    /// A `TIME_EXTEND` escape record: no payload, just the header and a
    /// trailing word carrying the high bits of the delta.
    TimeExtend,
}

/// Result of a successful [`encode`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncodedHeader {
    /// Which kind of record was written.
    pub kind: HeaderKind,
    /// Total bytes written to the output buffer (header word, optional
    /// length word, and padded payload for `Inline`/`ExplicitLength`; 8 for
    /// `TimeExtend`).
    pub bytes_written: usize,
}

/// Fatal encoding error: the framing the caller computed doesn't match what
/// the encoder actually needs to write. Mirrors the reference's
/// `die("Bad calculation of record len ...")` assertion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncodeError {
    /// `record_size` passed to [`encode`] didn't match header + payload
    /// framing computed from `payload.len()`.
    RecordSizeMismatch {
        /// Size the encoder computed.
        expected: u16,
        /// Size the caller claimed.
        actual: u16,
    },
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return match self {
            EncodeError::RecordSizeMismatch { expected, actual } => write!(
                f,
                "record framing mismatch: encoder computed {} bytes, caller claimed {} bytes",
                expected, actual
            ),
        };
    }
}

/// Packs a record header word given the capture's bit layout.
///
/// Big-endian captures store the delta in the low 27 bits and the length
/// field in the top 5 bits; little-endian captures store the length field
/// in the low 5 bits and the delta above it.
///
/// PRECONDITION: `delta` fits in 27 bits and `len_field` fits in 5 bits.
fn pack_header(big_endian: bool, delta: u32, len_field: u32) -> u32 {
    return if big_endian {
        delta | (len_field << TIME_EXTEND_BITS)
    } else {
        (delta << 5) | len_field
    };
}

/// Encodes one record into `out`, honoring the `TIME_EXTEND` overflow rule.
///
/// `delta` is the full (possibly > 27-bit) inter-record delta. `payload` is
/// the record's unpadded event payload. `record_size` is the framed size the
/// caller already computed for this record (used only to cross-check against
/// what the encoder computes here).
///
/// If `delta` exceeds [`MAX_INLINE_DELTA`], this writes an 8-byte
/// `TIME_EXTEND` escape record instead of the payload record and returns
/// `HeaderKind::TimeExtend`. The caller must advance its base timestamp by
/// the full `delta` and call `encode` again for the same record with
/// `delta = 0`.
///
/// PRECONDITION: `out.len()` is at least large enough for whichever record
/// kind gets written (8 bytes for `TimeExtend`; `record_size` bytes
/// otherwise).
pub fn encode(
    byte_order: ByteOrder,
    delta: u64,
    payload: &[u8],
    record_size: u16,
    out: &mut [u8],
) -> Result<EncodedHeader, EncodeError> {
    let big_endian = byte_order.source_big_endian();

    if delta > MAX_INLINE_DELTA {
        let low = (delta & MAX_INLINE_DELTA) as u32;
        let high = (delta >> TIME_EXTEND_BITS) as u32;
        let header = pack_header(big_endian, low, TIME_EXTEND_LEN_FIELD);
        byte_order.write_u32(&mut out[0..4], header);
        byte_order.write_u32(&mut out[4..8], high);
        return Ok(EncodedHeader {
            kind: HeaderKind::TimeExtend,
            bytes_written: 8,
        });
    }

    let padded_len = (payload.len() as u32 + 3) & !3;
    let len_words = padded_len / 4;
    let use_explicit = len_words == 0 || len_words > MAX_INLINE_LEN_WORDS;
    let header_bytes: u32 = if use_explicit { 8 } else { 4 };

    let expected_record_size = header_bytes + padded_len;
    if expected_record_size != record_size as u32 {
        return Err(EncodeError::RecordSizeMismatch {
            expected: expected_record_size as u16,
            actual: record_size,
        });
    }

    let len_field = if use_explicit { EXPLICIT_LEN_FIELD } else { len_words };
    let header = pack_header(big_endian, delta as u32, len_field);
    byte_order.write_u32(&mut out[0..4], header);

    let mut pos = 4usize;
    if use_explicit {
        byte_order.write_u32(&mut out[pos..pos + 4], payload.len() as u32);
        pos += 4;
    }

    out[pos..pos + payload.len()].copy_from_slice(payload);
    for b in out[pos + payload.len()..pos + padded_len as usize].iter_mut() {
        *b = 0;
    }

    return Ok(EncodedHeader {
        kind: if use_explicit {
            HeaderKind::ExplicitLength
        } else {
            HeaderKind::Inline
        },
        bytes_written: header_bytes as usize + padded_len as usize,
    });
}

/// Result of decoding a record header with [`decode_header`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodedHeader {
    /// Delta encoded by this record. For `TimeExtend`, this is the full
    /// (possibly > 27-bit) delta reconstructed from both header words.
    pub delta: u64,
    /// Which kind of header this was.
    pub kind: HeaderKind,
    /// Bytes occupied by the header itself (4 for inline, 8 for
    /// explicit-length and time-extend).
    pub header_bytes: usize,
    /// Payload length in bytes; 0 for `TimeExtend`.
    pub payload_len: u32,
    /// Total bytes this record occupies, header through padded payload.
    pub bytes_consumed: usize,
}

/// Decodes one record header from the start of `data`, the inverse of
/// [`encode`].
///
/// Returns the delta, the payload's offset (`header_bytes`) and length
/// within `data`, and the total size of the record so the caller can advance
/// past it. Does not copy the payload; the caller slices
/// `&data[header_bytes..header_bytes + payload_len as usize]` itself.
///
/// PRECONDITION: `data` holds at least 8 bytes (enough for any header
/// shape), and at least `bytes_consumed` bytes once the header reveals the
/// full size.
pub fn decode_header(byte_order: ByteOrder, data: &[u8]) -> DecodedHeader {
    let big_endian = byte_order.source_big_endian();
    let header = byte_order.read_u32(&data[0..4]);

    let (delta_field, len_field) = if big_endian {
        (header & MAX_INLINE_DELTA as u32, header >> TIME_EXTEND_BITS)
    } else {
        (header >> 5, header & 0x1f)
    };

    if len_field == TIME_EXTEND_LEN_FIELD {
        let high = byte_order.read_u32(&data[4..8]);
        let delta = ((high as u64) << TIME_EXTEND_BITS) | delta_field as u64;
        return DecodedHeader {
            delta,
            kind: HeaderKind::TimeExtend,
            header_bytes: 8,
            payload_len: 0,
            bytes_consumed: 8,
        };
    }

    if len_field == EXPLICIT_LEN_FIELD {
        let payload_len = byte_order.read_u32(&data[4..8]);
        let padded = (payload_len + 3) & !3;
        return DecodedHeader {
            delta: delta_field as u64,
            kind: HeaderKind::ExplicitLength,
            header_bytes: 8,
            payload_len,
            bytes_consumed: 8 + padded as usize,
        };
    }

    let payload_len = len_field * 4;
    return DecodedHeader {
        delta: delta_field as u64,
        kind: HeaderKind::Inline,
        header_bytes: 4,
        payload_len,
        bytes_consumed: 4 + payload_len as usize,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_inline(big_endian: bool, delta: u64, payload: &[u8]) -> (Vec<u8>, EncodedHeader) {
        let byte_order = ByteOrder::new(big_endian);
        let padded = (payload.len() + 3) & !3;
        let record_size = (4 + padded) as u16;
        let mut out = vec![0u8; record_size as usize];
        let header = encode(byte_order, delta, payload, record_size, &mut out).unwrap();
        return (out, header);
    }

    #[test]
    fn inline_payload_little_endian() {
        let (out, header) = encode_inline(false, 42, &[1, 2, 3, 4]);
        assert_eq!(header.kind, HeaderKind::Inline);
        assert_eq!(header.bytes_written, 8);
        let word = u32::from_le_bytes(out[0..4].try_into().unwrap());
        assert_eq!(word & 0x1f, 1); // len_field = 1 word
        assert_eq!(word >> 5, 42); // delta
        assert_eq!(&out[4..8], &[1, 2, 3, 4]);
    }

    #[test]
    fn inline_payload_big_endian() {
        let (out, header) = encode_inline(true, 42, &[1, 2, 3, 4]);
        assert_eq!(header.kind, HeaderKind::Inline);
        let word = u32::from_be_bytes(out[0..4].try_into().unwrap());
        assert_eq!(word >> TIME_EXTEND_BITS, 1); // len_field
        assert_eq!(word & MAX_INLINE_DELTA as u32, 42);
    }

    #[test]
    fn explicit_length_for_large_payload() {
        let payload = vec![7u8; 120]; // 30 words > MAX_INLINE_LEN_WORDS
        let byte_order = ByteOrder::new(false);
        let record_size = (8 + 120) as u16;
        let mut out = vec![0u8; record_size as usize];
        let header = encode(byte_order, 0, &payload, record_size, &mut out).unwrap();
        assert_eq!(header.kind, HeaderKind::ExplicitLength);
        let word = u32::from_le_bytes(out[0..4].try_into().unwrap());
        assert_eq!(word & 0x1f, 0);
        let len = u32::from_le_bytes(out[4..8].try_into().unwrap());
        assert_eq!(len, 120);
    }

    #[test]
    fn zero_length_payload_uses_explicit_length() {
        let byte_order = ByteOrder::new(false);
        let record_size = 8u16;
        let mut out = vec![0u8; record_size as usize];
        let header = encode(byte_order, 5, &[], record_size, &mut out).unwrap();
        assert_eq!(header.kind, HeaderKind::ExplicitLength);
    }

    #[test]
    fn delta_at_boundary_triggers_time_extend() {
        let byte_order = ByteOrder::new(false);
        let mut out = [0u8; 8];
        let header = encode(byte_order, 1u64 << TIME_EXTEND_BITS, &[], 8, &mut out).unwrap();
        assert_eq!(header.kind, HeaderKind::TimeExtend);
    }

    #[test]
    fn delta_just_below_boundary_does_not_extend() {
        let (_, header) = encode_inline(false, MAX_INLINE_DELTA, &[1, 2, 3, 4]);
        assert_eq!(header.kind, HeaderKind::Inline);
    }

    #[test]
    fn time_extend_round_trips_high_and_low_bits() {
        let byte_order = ByteOrder::new(false);
        let delta: u64 = (1u64 << TIME_EXTEND_BITS) + 0x1234_5678;
        let mut out = [0u8; 8];
        let header = encode(byte_order, delta, &[], 8, &mut out).unwrap();
        assert_eq!(header.kind, HeaderKind::TimeExtend);
        let word = u32::from_le_bytes(out[0..4].try_into().unwrap());
        let low = word >> 5;
        let high = u32::from_le_bytes(out[4..8].try_into().unwrap());
        let reconstructed = ((high as u64) << TIME_EXTEND_BITS) | low as u64;
        assert_eq!(reconstructed, delta);
    }

    #[test]
    fn decode_inverts_encode_for_inline_record() {
        let byte_order = ByteOrder::new(false);
        let (out, _) = encode_inline(false, 42, &[1, 2, 3, 4]);
        let decoded = decode_header(byte_order, &out);
        assert_eq!(decoded.kind, HeaderKind::Inline);
        assert_eq!(decoded.delta, 42);
        assert_eq!(decoded.header_bytes, 4);
        assert_eq!(decoded.payload_len, 4);
        assert_eq!(decoded.bytes_consumed, out.len());
        assert_eq!(
            &out[decoded.header_bytes..decoded.header_bytes + decoded.payload_len as usize],
            &[1, 2, 3, 4]
        );
    }

    #[test]
    fn decode_inverts_encode_for_explicit_length() {
        let byte_order = ByteOrder::new(true);
        let payload = vec![9u8; 120];
        let record_size = (8 + 120) as u16;
        let mut out = vec![0u8; record_size as usize];
        encode(byte_order, 7, &payload, record_size, &mut out).unwrap();
        let decoded = decode_header(byte_order, &out);
        assert_eq!(decoded.kind, HeaderKind::ExplicitLength);
        assert_eq!(decoded.delta, 7);
        assert_eq!(decoded.payload_len, 120);
        assert_eq!(decoded.bytes_consumed, out.len());
    }

    #[test]
    fn decode_inverts_encode_for_time_extend() {
        let byte_order = ByteOrder::new(false);
        let delta: u64 = (1u64 << TIME_EXTEND_BITS) + 0x55;
        let mut out = [0u8; 8];
        encode(byte_order, delta, &[], 8, &mut out).unwrap();
        let decoded = decode_header(byte_order, &out);
        assert_eq!(decoded.kind, HeaderKind::TimeExtend);
        assert_eq!(decoded.delta, delta);
        assert_eq!(decoded.bytes_consumed, 8);
    }

    #[test]
    fn record_size_mismatch_is_fatal() {
        let byte_order = ByteOrder::new(false);
        let mut out = vec![0u8; 16];
        let err = encode(byte_order, 0, &[1, 2, 3, 4], 99, &mut out).unwrap_err();
        assert_eq!(
            err,
            EncodeError::RecordSizeMismatch {
                expected: 8,
                actual: 99
            }
        );
    }
}
