//! Wire-format primitives for the protobuf binary encoding.
//!
//! Everything here works on plain byte slices and `Vec<u8>`:
//!
//! - varints (unsigned LEB128, at most 10 bytes)
//! - zigzag transforms for `sint32`/`sint64`
//! - little-endian `fixed32`/`fixed64`
//! - tags (`field_number << 3 | wire_type`) and wire types
//! - length-delimited payloads, with a UTF-8-classifying string variant
//! - skipping over unknown records, including nested groups
//!
//! `get_*` functions consume from the front of a slice and return the decoded
//! value together with the number of bytes consumed; `put_*` functions append
//! to a buffer; `size_*` functions return the encoded width without writing.

use crate::error::DecodeError;

/// Smallest valid field number.
pub const MIN_FIELD_NUMBER: u32 = 1;
/// Largest valid field number, `2^29 - 1`.
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;

/// The 3-bit encoding class carried in every tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum WireType {
    Varint = 0,
    Fixed64 = 1,
    LengthDelimited = 2,
    StartGroup = 3,
    EndGroup = 4,
    Fixed32 = 5,
}

impl WireType {
    /// Decodes the low three bits of a tag. Bit patterns 6 and 7 are not
    /// assigned and yield `None`.
    pub const fn from_bits(bits: u8) -> Option<WireType> {
        match bits {
            0 => Some(WireType::Varint),
            1 => Some(WireType::Fixed64),
            2 => Some(WireType::LengthDelimited),
            3 => Some(WireType::StartGroup),
            4 => Some(WireType::EndGroup),
            5 => Some(WireType::Fixed32),
            _ => None,
        }
    }
}

/// Joins a field number and wire type into a tag value.
pub const fn make_tag(number: u32, wire_type: WireType) -> u32 {
    number << 3 | wire_type as u32
}

/// Encoded width of any tag for `number`, independent of wire type.
pub const fn size_tag(number: u32) -> usize {
    size_varint((number as u64) << 3)
}

pub fn put_tag(buf: &mut Vec<u8>, number: u32, wire_type: WireType) {
    put_varint(buf, make_tag(number, wire_type) as u64);
}

/// Consumes a tag, validating the field number range and wire type bits.
pub fn get_tag(buf: &[u8]) -> Result<(u32, WireType, usize), DecodeError> {
    let (v, n) = get_varint(buf)?;
    let number = v >> 3;
    if number < MIN_FIELD_NUMBER as u64 || number > MAX_FIELD_NUMBER as u64 {
        return Err(DecodeError::InvalidFieldNumber(number));
    }
    match WireType::from_bits((v & 7) as u8) {
        Some(wire_type) => Ok((number as u32, wire_type, n)),
        None => Err(DecodeError::InvalidWireType((v & 7) as u8)),
    }
}

/// Encoded width of `v` as a varint, between 1 and 10 bytes.
pub const fn size_varint(v: u64) -> usize {
    // Bit length divided by 7, rounded up; `| 1` makes zero one byte wide.
    (64 - (v | 1).leading_zeros() as usize + 6) / 7
}

pub fn put_varint(buf: &mut Vec<u8>, mut v: u64) {
    while v >= 0x80 {
        buf.push(v as u8 | 0x80);
        v >>= 7;
    }
    buf.push(v as u8);
}

/// Consumes a varint. Over-long encodings of small values are accepted up to
/// the 10-byte cap; anything longer, or a 10th byte above 1, overflows.
pub fn get_varint(buf: &[u8]) -> Result<(u64, usize), DecodeError> {
    let mut value = 0u64;
    for (i, &b) in buf.iter().enumerate().take(10) {
        value |= u64::from(b & 0x7f) << (7 * i);
        if b < 0x80 {
            if i == 9 && b > 1 {
                return Err(DecodeError::VarintOverflow);
            }
            return Ok((value, i + 1));
        }
    }
    if buf.len() >= 10 {
        Err(DecodeError::VarintOverflow)
    } else {
        Err(DecodeError::Truncated)
    }
}

/// Maps a signed value onto the unsigned varint domain: `(n << 1) ^ (n >> 63)`.
pub const fn zigzag_encode(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

pub const fn zigzag_decode(v: u64) -> i64 {
    (v >> 1) as i64 ^ -((v & 1) as i64)
}

/// 32-bit values travel through the 64-bit zigzag; decode masks first so the
/// upper half of a sloppily sign-extended varint cannot leak into the result.
pub const fn zigzag_decode32(v: u64) -> i32 {
    zigzag_decode(v & 0xffff_ffff) as i32
}

pub fn put_fixed32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub fn put_fixed64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub fn get_fixed32(buf: &[u8]) -> Result<(u32, usize), DecodeError> {
    match buf.first_chunk::<4>() {
        Some(b) => Ok((u32::from_le_bytes(*b), 4)),
        None => Err(DecodeError::Truncated),
    }
}

pub fn get_fixed64(buf: &[u8]) -> Result<(u64, usize), DecodeError> {
    match buf.first_chunk::<8>() {
        Some(b) => Ok((u64::from_le_bytes(*b), 8)),
        None => Err(DecodeError::Truncated),
    }
}

/// Encoded width of a length-delimited payload of `len` bytes, including the
/// length prefix.
pub const fn size_len_prefixed(len: usize) -> usize {
    size_varint(len as u64) + len
}

pub fn put_bytes(buf: &mut Vec<u8>, payload: &[u8]) {
    put_varint(buf, payload.len() as u64);
    buf.extend_from_slice(payload);
}

/// Consumes a length-delimited payload, returning the payload slice and the
/// total bytes consumed (prefix included).
pub fn get_bytes(buf: &[u8]) -> Result<(&[u8], usize), DecodeError> {
    let (len, n) = get_varint(buf)?;
    let len = usize::try_from(len).map_err(|_| DecodeError::Truncated)?;
    let end = n.checked_add(len).ok_or(DecodeError::Truncated)?;
    if end > buf.len() {
        return Err(DecodeError::Truncated);
    }
    Ok((&buf[n..end], end))
}

/// Like [`get_bytes`] but also classifies the payload as UTF-8. The payload
/// is returned either way; the flag lets the caller decide severity.
pub fn get_string(buf: &[u8]) -> Result<(&[u8], bool, usize), DecodeError> {
    let (payload, consumed) = get_bytes(buf)?;
    Ok((payload, std::str::from_utf8(payload).is_ok(), consumed))
}

/// Consumes the value of a record whose tag has already been read, for fields
/// nothing resolves. Groups are walked iteratively through their matching end
/// tags.
pub fn skip_field(buf: &[u8], number: u32, wire_type: WireType) -> Result<usize, DecodeError> {
    match wire_type {
        WireType::StartGroup => skip_group(buf, number),
        WireType::EndGroup => Err(DecodeError::UnexpectedEndGroup(number)),
        _ => skip_scalar(buf, wire_type),
    }
}

fn skip_scalar(buf: &[u8], wire_type: WireType) -> Result<usize, DecodeError> {
    match wire_type {
        WireType::Varint => get_varint(buf).map(|(_, n)| n),
        WireType::Fixed64 => {
            if buf.len() < 8 {
                Err(DecodeError::Truncated)
            } else {
                Ok(8)
            }
        }
        WireType::LengthDelimited => get_bytes(buf).map(|(_, n)| n),
        WireType::Fixed32 => {
            if buf.len() < 4 {
                Err(DecodeError::Truncated)
            } else {
                Ok(4)
            }
        }
        WireType::StartGroup | WireType::EndGroup => unreachable!("group handled by skip_field"),
    }
}

fn skip_group(buf: &[u8], number: u32) -> Result<usize, DecodeError> {
    // Stack of group numbers still waiting for their end tag.
    let mut open = vec![number];
    let mut pos = 0;
    while let Some(&top) = open.last() {
        if pos >= buf.len() {
            return Err(DecodeError::MissingEndGroup(top));
        }
        let (num, wire_type, n) = get_tag(&buf[pos..])?;
        pos += n;
        match wire_type {
            WireType::StartGroup => open.push(num),
            WireType::EndGroup => {
                if num != top {
                    return Err(DecodeError::UnexpectedEndGroup(num));
                }
                open.pop();
            }
            _ => pos += skip_scalar(&buf[pos..], wire_type)?,
        }
    }
    Ok(pos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    fn varint_bytes(v: u64) -> Vec<u8> {
        let mut buf = Vec::new();
        put_varint(&mut buf, v);
        buf
    }

    #[test]
    fn test_varint_vectors() {
        assert_eq!(varint_bytes(0), [0x00]);
        assert_eq!(varint_bytes(1), [0x01]);
        assert_eq!(varint_bytes(127), [0x7f]);
        assert_eq!(varint_bytes(128), [0x80, 0x01]);
        assert_eq!(varint_bytes(300), [0xac, 0x02]);
        assert_eq!(varint_bytes(u64::MAX).len(), 10);
        for v in [0, 1, 127, 128, 300, u64::MAX] {
            let bytes = varint_bytes(v);
            assert_eq!(size_varint(v), bytes.len());
            assert_eq!(get_varint(&bytes).unwrap(), (v, bytes.len()));
        }
    }

    #[test]
    fn test_varint_random_roundtrip() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0x1dea);
        for _ in 0..1000 {
            let shift = rng.gen_range(0..64);
            let v: u64 = rng.r#gen::<u64>() >> shift;
            let bytes = varint_bytes(v);
            assert_eq!(get_varint(&bytes).unwrap(), (v, bytes.len()));
        }
    }

    #[test]
    fn test_varint_overlong_accepted() {
        // 300 padded with continuation bytes of zero payload.
        let bytes = [0xac, 0x82, 0x80, 0x00];
        assert_eq!(get_varint(&bytes).unwrap(), (300, 4));
    }

    #[test]
    fn test_varint_overflow() {
        let eleven = [0x80u8; 11];
        assert_eq!(get_varint(&eleven), Err(DecodeError::VarintOverflow));
        // Tenth byte may only contribute the final bit.
        let mut max_plus = [0xffu8; 10];
        max_plus[9] = 0x02;
        assert_eq!(get_varint(&max_plus), Err(DecodeError::VarintOverflow));
        let mut max = [0xffu8; 10];
        max[9] = 0x01;
        assert_eq!(get_varint(&max).unwrap(), (u64::MAX, 10));
    }

    #[test]
    fn test_varint_truncated() {
        assert_eq!(get_varint(&[]), Err(DecodeError::Truncated));
        assert_eq!(get_varint(&[0x80]), Err(DecodeError::Truncated));
    }

    #[test]
    fn test_zigzag_vectors() {
        assert_eq!(zigzag_encode(0), 0);
        assert_eq!(zigzag_encode(-1), 1);
        assert_eq!(zigzag_encode(1), 2);
        assert_eq!(zigzag_encode(-2), 3);
        assert_eq!(zigzag_encode(i64::MAX), u64::MAX - 1);
        assert_eq!(zigzag_encode(i64::MIN), u64::MAX);
        for n in [0, -1, 1, -2, 2, i64::MIN, i64::MAX, 12345, -12345] {
            assert_eq!(zigzag_decode(zigzag_encode(n)), n);
        }
        assert_eq!(zigzag_decode32(zigzag_encode(-1) & 0xffff_ffff), -1);
        assert_eq!(zigzag_decode32(zigzag_encode(i32::MIN as i64)), i32::MIN);
    }

    #[test]
    fn test_tag_roundtrip() {
        let mut buf = Vec::new();
        put_tag(&mut buf, 1, WireType::Varint);
        assert_eq!(buf, [0x08]);
        put_tag(&mut buf, 2, WireType::LengthDelimited);
        assert_eq!(buf[1..], [0x12]);

        let (num, wt, n) = get_tag(&buf).unwrap();
        assert_eq!((num, wt, n), (1, WireType::Varint, 1));

        let mut big = Vec::new();
        put_tag(&mut big, MAX_FIELD_NUMBER, WireType::Fixed32);
        let (num, wt, _) = get_tag(&big).unwrap();
        assert_eq!((num, wt), (MAX_FIELD_NUMBER, WireType::Fixed32));
    }

    #[test]
    fn test_tag_rejects_bad_number_and_type() {
        // Field number 0.
        assert_eq!(get_tag(&[0x00]), Err(DecodeError::InvalidFieldNumber(0)));
        // Wire type 6.
        assert_eq!(get_tag(&[0x0e]), Err(DecodeError::InvalidWireType(6)));
        // Wire type 7.
        assert_eq!(get_tag(&[0x0f]), Err(DecodeError::InvalidWireType(7)));
        // Number above 2^29 - 1.
        let mut buf = Vec::new();
        put_varint(&mut buf, (1u64 << 29) << 3);
        assert_eq!(
            get_tag(&buf),
            Err(DecodeError::InvalidFieldNumber(1 << 29))
        );
    }

    #[test]
    fn test_fixed_roundtrip() {
        let mut buf = Vec::new();
        put_fixed32(&mut buf, 0xdead_beef);
        put_fixed64(&mut buf, 0x0123_4567_89ab_cdef);
        assert_eq!(get_fixed32(&buf).unwrap(), (0xdead_beef, 4));
        assert_eq!(get_fixed64(&buf[4..]).unwrap(), (0x0123_4567_89ab_cdef, 8));
        assert_eq!(get_fixed32(&buf[..3]), Err(DecodeError::Truncated));
        assert_eq!(get_fixed64(&buf[..7]), Err(DecodeError::Truncated));
    }

    #[test]
    fn test_bytes_roundtrip() {
        let mut buf = Vec::new();
        put_bytes(&mut buf, b"hello");
        assert_eq!(buf, [0x05, b'h', b'e', b'l', b'l', b'o']);
        let (payload, n) = get_bytes(&buf).unwrap();
        assert_eq!(payload, b"hello");
        assert_eq!(n, 6);
        assert_eq!(size_len_prefixed(5), 6);
        // Length prefix longer than the remaining input.
        assert_eq!(get_bytes(&[0x05, b'h']), Err(DecodeError::Truncated));
    }

    #[test]
    fn test_string_classifies_utf8() {
        let mut buf = Vec::new();
        put_bytes(&mut buf, b"caf\xc3\xa9");
        let (payload, ok, _) = get_string(&buf).unwrap();
        assert!(ok);
        assert_eq!(payload, "café".as_bytes());

        let mut bad = Vec::new();
        put_bytes(&mut bad, b"\xff\xfe");
        let (payload, ok, n) = get_string(&bad).unwrap();
        assert!(!ok);
        assert_eq!(payload, b"\xff\xfe");
        assert_eq!(n, 3);
    }

    #[test]
    fn test_skip_scalars() {
        assert_eq!(skip_field(&varint_bytes(300), 1, WireType::Varint), Ok(2));
        assert_eq!(skip_field(&[0u8; 8], 1, WireType::Fixed64), Ok(8));
        assert_eq!(skip_field(&[0u8; 4], 1, WireType::Fixed32), Ok(4));
        let mut buf = Vec::new();
        put_bytes(&mut buf, b"abc");
        assert_eq!(skip_field(&buf, 1, WireType::LengthDelimited), Ok(4));
        assert_eq!(
            skip_field(&[], 1, WireType::EndGroup),
            Err(DecodeError::UnexpectedEndGroup(1))
        );
    }

    #[test]
    fn test_skip_nested_groups() {
        // group 1 { field 2 = varint 5; group 3 { } } end 1
        let mut buf = Vec::new();
        put_tag(&mut buf, 2, WireType::Varint);
        put_varint(&mut buf, 5);
        put_tag(&mut buf, 3, WireType::StartGroup);
        put_tag(&mut buf, 3, WireType::EndGroup);
        put_tag(&mut buf, 1, WireType::EndGroup);
        assert_eq!(skip_field(&buf, 1, WireType::StartGroup), Ok(buf.len()));

        // Truncated before the end tag.
        assert_eq!(
            skip_field(&buf[..buf.len() - 1], 1, WireType::StartGroup),
            Err(DecodeError::MissingEndGroup(1))
        );

        // End tag for the wrong group number.
        let mut bad = Vec::new();
        put_tag(&mut bad, 7, WireType::EndGroup);
        assert_eq!(
            skip_field(&bad, 1, WireType::StartGroup),
            Err(DecodeError::UnexpectedEndGroup(7))
        );
    }
}
