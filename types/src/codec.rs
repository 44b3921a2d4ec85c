use bytes::{Buf, BufMut};
use commonware_codec::{Error, ReadExt, Write};

/// Helper to write a string as length-prefixed UTF-8 bytes.
pub fn write_string(s: &str, writer: &mut impl BufMut) {
    let bytes = s.as_bytes();
    (bytes.len() as u32).write(writer);
    writer.put_slice(bytes);
}

/// Helper to read a string from length-prefixed UTF-8 bytes.
pub fn read_string(reader: &mut impl Buf, max_len: usize) -> Result<String, Error> {
    let len = u32::read(reader)? as usize;
    if len > max_len {
        return Err(Error::Invalid("String", "too long"));
    }
    if reader.remaining() < len {
        return Err(Error::EndOfBuffer);
    }
    if reader.chunk().len() >= len {
        let result = {
            let chunk = reader.chunk();
            match std::str::from_utf8(&chunk[..len]) {
                Ok(s) => Ok(s.to_owned()),
                Err(_) => Err(Error::Invalid("String", "invalid UTF-8")),
            }
        };
        reader.advance(len);
        return result;
    }
    let mut bytes = vec![0u8; len];
    reader.copy_to_slice(&mut bytes);
    String::from_utf8(bytes).map_err(|_| Error::Invalid("String", "invalid UTF-8"))
}

/// Helper to get encode size of a string.
pub fn string_encode_size(s: &str) -> usize {
    4 + s.len()
}

pub fn write_opt_string(s: &Option<String>, writer: &mut impl BufMut) {
    match s {
        Some(s) => {
            true.write(writer);
            write_string(s, writer);
        }
        None => false.write(writer),
    }
}

pub fn read_opt_string(reader: &mut impl Buf, max_len: usize) -> Result<Option<String>, Error> {
    if bool::read(reader)? {
        Ok(Some(read_string(reader, max_len)?))
    } else {
        Ok(None)
    }
}

pub fn opt_string_encode_size(s: &Option<String>) -> usize {
    1 + s.as_deref().map(string_encode_size).unwrap_or(0)
}

/// Writes an id index as a `u32` count followed by big-endian `u64`s.
pub fn write_ids(ids: &[u64], writer: &mut impl BufMut) {
    (ids.len() as u32).write(writer);
    for id in ids {
        id.write(writer);
    }
}

pub fn read_ids(reader: &mut impl Buf, max_len: usize) -> Result<Vec<u64>, Error> {
    let len = u32::read(reader)? as usize;
    if len > max_len {
        return Err(Error::Invalid("Ids", "too long"));
    }
    if reader.remaining() < len.saturating_mul(8) {
        return Err(Error::EndOfBuffer);
    }
    let mut ids = Vec::with_capacity(len);
    for _ in 0..len {
        ids.push(u64::read(reader)?);
    }
    Ok(ids)
}

pub fn ids_encode_size(ids: &[u64]) -> usize {
    4 + ids.len() * 8
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use rand::{rngs::StdRng, RngCore, SeedableRng};

    #[test]
    fn read_string_rejects_too_long() {
        let mut buf = BytesMut::new();
        (5u32).write(&mut buf);
        buf.extend_from_slice(b"hello");

        let mut reader = buf.as_ref();
        let err = read_string(&mut reader, 4).expect_err("should reject too-long string");
        assert!(matches!(err, Error::Invalid("String", "too long")));
    }

    #[test]
    fn read_string_rejects_truncated_buffers() {
        let mut buf = BytesMut::new();
        (3u32).write(&mut buf);
        buf.extend_from_slice(b"ab");

        let mut reader = buf.as_ref();
        let err = read_string(&mut reader, 10).expect_err("should reject truncated buffer");
        assert!(matches!(err, Error::EndOfBuffer));
    }

    #[test]
    fn read_ids_rejects_truncated_buffers() {
        let mut buf = BytesMut::new();
        (3u32).write(&mut buf);
        7u64.write(&mut buf);

        let mut reader = buf.as_ref();
        let err = read_ids(&mut reader, 10).expect_err("should reject truncated ids");
        assert!(matches!(err, Error::EndOfBuffer));
    }

    #[test]
    fn opt_string_size_matches_written_bytes() {
        for value in [None, Some(String::new()), Some("ref:bet:42".to_string())] {
            let mut buf = BytesMut::new();
            write_opt_string(&value, &mut buf);
            assert_eq!(buf.len(), opt_string_encode_size(&value));

            let mut reader = buf.as_ref();
            assert_eq!(read_opt_string(&mut reader, 64).unwrap(), value);
        }
    }

    #[test]
    fn read_ids_handles_malformed_inputs() {
        let mut rng = StdRng::seed_from_u64(0x5eed_c0de);
        let max_len = 64;

        for _ in 0..500 {
            let len = (rng.next_u32() as usize) % 512;
            let mut buf = vec![0u8; len];
            rng.fill_bytes(&mut buf);
            let mut reader = buf.as_slice();
            if let Ok(ids) = read_ids(&mut reader, max_len) {
                assert!(ids.len() <= max_len);
            }
            let mut reader = buf.as_slice();
            if let Ok(s) = read_string(&mut reader, max_len) {
                assert!(s.len() <= max_len);
            }
        }
    }
}
