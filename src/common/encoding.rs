//! Varint primitives shared by the chunk encodings.

/// Writes an unsigned varint to the buffer.
pub(crate) fn write_uvarint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

/// Writes a signed varint using zigzag encoding.
pub(crate) fn write_signed_varint(buf: &mut Vec<u8>, value: i64) {
    write_uvarint(buf, zigzag_encode(value));
}

/// Reads an unsigned varint starting at `offset`.
/// Returns the value and the number of bytes consumed, or None if the buffer
/// is truncated or the varint is malformed.
pub(crate) fn read_uvarint(buf: &[u8], offset: usize) -> Option<(u64, usize)> {
    let mut value: u64 = 0;
    let mut shift = 0;
    let mut pos = offset;

    loop {
        let byte = *buf.get(pos)?;
        pos += 1;

        value |= ((byte & 0x7F) as u64) << shift;
        if byte & 0x80 == 0 {
            break;
        }

        shift += 7;
        if shift > 63 {
            // protect against malicious inputs
            return None;
        }
    }

    Some((value, pos - offset))
}

/// Reads a zigzag-encoded signed varint starting at `offset`.
pub(crate) fn read_signed_varint(buf: &[u8], offset: usize) -> Option<(i64, usize)> {
    read_uvarint(buf, offset).map(|(unsigned, n)| (zigzag_decode(unsigned), n))
}

// see: http://stackoverflow.com/a/2211086/56332
// casting required because operations like unary negation
// cannot be performed on unsigned integers
#[inline]
pub(crate) fn zigzag_decode(from: u64) -> i64 {
    ((from >> 1) ^ (-((from & 1) as i64)) as u64) as i64
}

#[inline]
pub(crate) fn zigzag_encode(from: i64) -> u64 {
    ((from << 1) ^ (from >> 63)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0)]
    #[test_case(1)]
    #[test_case(127)]
    #[test_case(128)]
    #[test_case(16_383)]
    #[test_case(16_384)]
    #[test_case(u64::MAX)]
    fn test_uvarint_round_trip(value: u64) {
        let mut buf = Vec::new();
        write_uvarint(&mut buf, value);
        let (decoded, consumed) = read_uvarint(&buf, 0).unwrap();
        assert_eq!(decoded, value);
        assert_eq!(consumed, buf.len());
    }

    #[test_case(0)]
    #[test_case(1)]
    #[test_case(-1; "minus_one")]
    #[test_case(63)]
    #[test_case(-64; "minus_64")]
    #[test_case(i64::MAX)]
    #[test_case(i64::MIN)]
    fn test_signed_varint_round_trip(value: i64) {
        let mut buf = Vec::new();
        write_signed_varint(&mut buf, value);
        let (decoded, consumed) = read_signed_varint(&buf, 0).unwrap();
        assert_eq!(decoded, value);
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn test_read_uvarint_truncated() {
        // continuation bit set, but no following byte
        assert!(read_uvarint(&[0x80], 0).is_none());
        assert!(read_uvarint(&[], 0).is_none());
        assert!(read_uvarint(&[0x01], 1).is_none());
    }

    #[test]
    fn test_read_uvarint_overlong() {
        // eleven continuation bytes exceed the 64-bit range
        let buf = [0xFF; 11];
        assert!(read_uvarint(&buf, 0).is_none());
    }

    #[test]
    fn test_read_at_offset() {
        let mut buf = vec![0xAA, 0xBB];
        write_uvarint(&mut buf, 300);
        let (decoded, consumed) = read_uvarint(&buf, 2).unwrap();
        assert_eq!(decoded, 300);
        assert_eq!(consumed, 2);
    }
}
