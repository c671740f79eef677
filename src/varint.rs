//! Wire primitives for the binary dialect: base-128 varints, zigzag mapping, and little-endian
//! fixed-width integers.

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};

use crate::error::{Error, Result};

/// Longest possible encoding of a 64-bit varint.
const MAX_VARINT_LEN: usize = 10;

/// Append `v` as a varint.
pub fn write(buf: &mut Vec<u8>, mut v: u64) {
    while v >= 0x80 {
        buf.push((v as u8) | 0x80);
        v >>= 7;
    }
    buf.push(v as u8);
}

/// Number of bytes [`write`] would produce for `v`.
pub fn len(v: u64) -> usize {
    let bits = 64 - (v | 1).leading_zeros() as usize;
    (bits + 6) / 7
}

/// Read a varint off the front of `buf`, advancing it.
pub fn read(buf: &mut &[u8]) -> Result<u64> {
    let mut v = 0u64;
    for i in 0..MAX_VARINT_LEN {
        let byte = buf
            .read_u8()
            .map_err(|_| Error::BadEncode("Truncated varint".to_string()))?;
        if i == MAX_VARINT_LEN - 1 && byte > 1 {
            return Err(Error::BadEncode("Varint larger than a u64".to_string()));
        }
        v |= ((byte & 0x7F) as u64) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(v);
        }
    }
    Err(Error::BadEncode("Varint larger than a u64".to_string()))
}

pub fn zigzag32(v: i32) -> u32 {
    ((v << 1) ^ (v >> 31)) as u32
}

pub fn unzigzag32(v: u32) -> i32 {
    ((v >> 1) as i32) ^ -((v & 1) as i32)
}

pub fn zigzag64(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

pub fn unzigzag64(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

pub fn write_fixed32(buf: &mut Vec<u8>, v: u32) {
    let mut raw = [0u8; 4];
    LittleEndian::write_u32(&mut raw, v);
    buf.extend_from_slice(&raw);
}

pub fn write_fixed64(buf: &mut Vec<u8>, v: u64) {
    let mut raw = [0u8; 8];
    LittleEndian::write_u64(&mut raw, v);
    buf.extend_from_slice(&raw);
}

pub fn read_fixed32(buf: &mut &[u8]) -> Result<u32> {
    buf.read_u32::<LittleEndian>()
        .map_err(|_| Error::BadEncode("Truncated fixed32".to_string()))
}

pub fn read_fixed64(buf: &mut &[u8]) -> Result<u64> {
    buf.read_u64::<LittleEndian>()
        .map_err(|_| Error::BadEncode("Truncated fixed64".to_string()))
}

/// Split `len` bytes off the front of `buf`.
pub fn read_bytes<'a>(buf: &mut &'a [u8], len: u64) -> Result<&'a [u8]> {
    let len = usize::try_from(len)
        .ok()
        .filter(|len| *len <= buf.len())
        .ok_or_else(|| {
            Error::BadEncode(format!(
                "Length-delimited value of {} bytes overruns the {} remaining",
                len,
                buf.len()
            ))
        })?;
    let (head, tail) = buf.split_at(len);
    *buf = tail;
    Ok(head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode() {
        for s in 0..64 {
            let i = 1u64 << s;
            let mut buf = Vec::new();
            write(&mut buf, i);
            assert_eq!(buf.len(), len(i));
            let o = read(&mut &buf[..]).unwrap();
            assert_eq!(i, o, "u64 results should match");
        }
    }

    #[test]
    fn known_encodings() {
        let mut buf = Vec::new();
        write(&mut buf, 300);
        assert_eq!(buf, vec![0xAC, 0x02]);
        buf.clear();
        write(&mut buf, 0);
        assert_eq!(buf, vec![0]);
        assert_eq!(len(u64::MAX), 10);
    }

    #[test]
    fn bad_varints() {
        assert!(matches!(read(&mut &[0x80u8, 0x80][..]), Err(Error::BadEncode(_))));
        let long = [0xFFu8; 11];
        assert!(matches!(read(&mut &long[..]), Err(Error::BadEncode(_))));
    }

    #[test]
    fn zigzag() {
        for v in [0i32, -1, 1, -2, i32::MAX, i32::MIN] {
            assert_eq!(unzigzag32(zigzag32(v)), v);
        }
        for v in [0i64, -1, 1, i64::MAX, i64::MIN] {
            assert_eq!(unzigzag64(zigzag64(v)), v);
        }
        assert_eq!(zigzag32(-1), 1);
        assert_eq!(zigzag64(1), 2);
    }

    #[test]
    fn fixed_and_bytes() {
        let mut buf = Vec::new();
        write_fixed32(&mut buf, 0xDEADBEEF);
        write_fixed64(&mut buf, 7);
        buf.extend_from_slice(b"abc");
        let mut cursor = &buf[..];
        assert_eq!(read_fixed32(&mut cursor).unwrap(), 0xDEADBEEF);
        assert_eq!(read_fixed64(&mut cursor).unwrap(), 7);
        assert_eq!(read_bytes(&mut cursor, 3).unwrap(), b"abc");
        assert!(cursor.is_empty());
        assert!(matches!(read_bytes(&mut cursor, 1), Err(Error::BadEncode(_))));
        assert!(matches!(read_fixed32(&mut cursor), Err(Error::BadEncode(_))));
    }
}
