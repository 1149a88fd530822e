//! # Compact Binary Encoding
//!
//! Writer and reader for the field encoding shared by transaction
//! serialization and op-return payloads:
//!
//! - fixed-width integers, little-endian;
//! - compact-size length prefixes (`< 0xfd` in one byte, then `0xfd`+u16,
//!   `0xfe`+u32, `0xff`+u64);
//! - length-prefixed byte strings and UTF-8 strings;
//! - 32-byte transaction ids, raw.
//!
//! ## Security Invariant
//!
//! `ByteReader` never fabricates data. A short read, an oversized length
//! prefix, a non-canonical compact size or invalid UTF-8 is an error, and
//! [`ByteReader::finish`] rejects trailing bytes. A decoder built on it
//! therefore either returns every field or none.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::CodecError;
use crate::identity::TxId;

/// Append-only encoder.
#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: BytesMut,
}

impl ByteWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write one byte.
    pub fn put_u8(&mut self, v: u8) -> &mut Self {
        self.buf.put_u8(v);
        self
    }

    /// Write a little-endian u32.
    pub fn put_u32(&mut self, v: u32) -> &mut Self {
        self.buf.put_u32_le(v);
        self
    }

    /// Write a little-endian i64.
    pub fn put_i64(&mut self, v: i64) -> &mut Self {
        self.buf.put_i64_le(v);
        self
    }

    /// Write a compact-size integer.
    pub fn put_compact_size(&mut self, n: u64) -> &mut Self {
        if n < 0xfd {
            self.buf.put_u8(n as u8);
        } else if n <= u64::from(u16::MAX) {
            self.buf.put_u8(0xfd);
            self.buf.put_u16_le(n as u16);
        } else if n <= u64::from(u32::MAX) {
            self.buf.put_u8(0xfe);
            self.buf.put_u32_le(n as u32);
        } else {
            self.buf.put_u8(0xff);
            self.buf.put_u64_le(n);
        }
        self
    }

    /// Write a compact-size length followed by the bytes.
    pub fn put_var_bytes(&mut self, data: &[u8]) -> &mut Self {
        self.put_compact_size(data.len() as u64);
        self.buf.put_slice(data);
        self
    }

    /// Write a length-prefixed UTF-8 string.
    pub fn put_string(&mut self, s: &str) -> &mut Self {
        self.put_var_bytes(s.as_bytes())
    }

    /// Write a 32-byte id.
    pub fn put_txid(&mut self, id: &TxId) -> &mut Self {
        self.buf.put_slice(id.as_bytes());
        self
    }

    /// Write a count-prefixed list of byte strings.
    pub fn put_bytes_list(&mut self, items: &[Vec<u8>]) -> &mut Self {
        self.put_compact_size(items.len() as u64);
        for item in items {
            self.put_var_bytes(item);
        }
        self
    }

    /// Write raw bytes with no prefix.
    pub fn put_raw(&mut self, data: &[u8]) -> &mut Self {
        self.buf.put_slice(data);
        self
    }

    /// Consume the writer and return the encoded bytes.
    pub fn into_vec(self) -> Vec<u8> {
        self.buf.to_vec()
    }
}

/// Strict decoder over a borrowed buffer.
#[derive(Debug)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
}

impl<'a> ByteReader<'a> {
    /// Start reading `data` from the beginning.
    pub fn new(data: &'a [u8]) -> Self {
        Self { buf: data }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn need(&self, field: &'static str, needed: usize) -> Result<(), CodecError> {
        if self.buf.remaining() < needed {
            return Err(CodecError::UnexpectedEof {
                field,
                needed,
                remaining: self.buf.remaining(),
            });
        }
        Ok(())
    }

    /// Read one byte.
    pub fn get_u8(&mut self, field: &'static str) -> Result<u8, CodecError> {
        self.need(field, 1)?;
        Ok(self.buf.get_u8())
    }

    /// Read a little-endian u32.
    pub fn get_u32(&mut self, field: &'static str) -> Result<u32, CodecError> {
        self.need(field, 4)?;
        Ok(self.buf.get_u32_le())
    }

    /// Read a little-endian i64.
    pub fn get_i64(&mut self, field: &'static str) -> Result<i64, CodecError> {
        self.need(field, 8)?;
        Ok(self.buf.get_i64_le())
    }

    /// Read a canonical compact-size integer.
    pub fn get_compact_size(&mut self, field: &'static str) -> Result<u64, CodecError> {
        let first = self.get_u8(field)?;
        let (value, min) = match first {
            0xfd => {
                self.need(field, 2)?;
                (u64::from(self.buf.get_u16_le()), 0xfd)
            }
            0xfe => {
                self.need(field, 4)?;
                (u64::from(self.buf.get_u32_le()), 0x1_0000)
            }
            0xff => {
                self.need(field, 8)?;
                (self.buf.get_u64_le(), 0x1_0000_0000)
            }
            n => return Ok(u64::from(n)),
        };
        if value < min {
            return Err(CodecError::NonCanonical(field));
        }
        Ok(value)
    }

    /// Read exactly `len` raw bytes.
    pub fn get_raw(&mut self, field: &'static str, len: usize) -> Result<Vec<u8>, CodecError> {
        self.need(field, len)?;
        let out = self.buf[..len].to_vec();
        self.buf.advance(len);
        Ok(out)
    }

    /// Read a compact-size length followed by that many bytes.
    pub fn get_var_bytes(&mut self, field: &'static str) -> Result<Vec<u8>, CodecError> {
        let len = self.get_compact_size(field)?;
        let remaining = self.buf.remaining();
        if len > remaining as u64 {
            return Err(CodecError::LengthOverflow {
                field,
                len,
                remaining,
            });
        }
        self.get_raw(field, len as usize)
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn get_string(&mut self, field: &'static str) -> Result<String, CodecError> {
        let bytes = self.get_var_bytes(field)?;
        String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8(field))
    }

    /// Read a 32-byte id.
    pub fn get_txid(&mut self, field: &'static str) -> Result<TxId, CodecError> {
        self.need(field, 32)?;
        let mut arr = [0u8; 32];
        self.buf.copy_to_slice(&mut arr);
        Ok(TxId(arr))
    }

    /// Read a count-prefixed list of byte strings.
    pub fn get_bytes_list(&mut self, field: &'static str) -> Result<Vec<Vec<u8>>, CodecError> {
        let count = self.get_compact_size(field)?;
        // Every element costs at least one byte of length prefix.
        let remaining = self.buf.remaining();
        if count > remaining as u64 {
            return Err(CodecError::LengthOverflow {
                field,
                len: count,
                remaining,
            });
        }
        let mut items = Vec::with_capacity(count as usize);
        for _ in 0..count {
            items.push(self.get_var_bytes(field)?);
        }
        Ok(items)
    }

    /// Succeed only if every byte has been consumed.
    pub fn finish(self) -> Result<(), CodecError> {
        match self.buf.remaining() {
            0 => Ok(()),
            n => Err(CodecError::TrailingBytes(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn compact_size_boundaries() {
        for (n, len) in [
            (0u64, 1usize),
            (0xfc, 1),
            (0xfd, 3),
            (0xffff, 3),
            (0x1_0000, 5),
            (0xffff_ffff, 5),
            (0x1_0000_0000, 9),
        ] {
            let mut w = ByteWriter::new();
            w.put_compact_size(n);
            let bytes = w.into_vec();
            assert_eq!(bytes.len(), len, "encoded length of {n:#x}");
            let mut r = ByteReader::new(&bytes);
            assert_eq!(r.get_compact_size("n").unwrap(), n);
            r.finish().unwrap();
        }
    }

    #[test]
    fn non_canonical_compact_size_rejected() {
        let bytes = [0xfd, 0x10, 0x00];
        let mut r = ByteReader::new(&bytes);
        assert_eq!(
            r.get_compact_size("len"),
            Err(CodecError::NonCanonical("len"))
        );
    }

    #[test]
    fn short_read_is_error() {
        let bytes = [1u8, 2, 3];
        let mut r = ByteReader::new(&bytes);
        assert!(matches!(
            r.get_i64("amount"),
            Err(CodecError::UnexpectedEof {
                field: "amount",
                needed: 8,
                remaining: 3
            })
        ));
    }

    #[test]
    fn oversized_length_prefix_rejected() {
        let bytes = [0x05, b'a', b'b'];
        let mut r = ByteReader::new(&bytes);
        assert!(matches!(
            r.get_var_bytes("name"),
            Err(CodecError::LengthOverflow { len: 5, .. })
        ));
    }

    #[test]
    fn invalid_utf8_rejected() {
        let bytes = [0x02, 0xff, 0xfe];
        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.get_string("memo"), Err(CodecError::InvalidUtf8("memo")));
    }

    #[test]
    fn trailing_bytes_rejected() {
        let bytes = [0x01, 0x02];
        let mut r = ByteReader::new(&bytes);
        r.get_u8("a").unwrap();
        assert_eq!(r.finish(), Err(CodecError::TrailingBytes(1)));
    }

    #[test]
    fn mixed_fields_in_order() {
        let id = TxId([9u8; 32]);
        let mut w = ByteWriter::new();
        w.put_u8(7)
            .put_i64(-5)
            .put_string("hello")
            .put_txid(&id)
            .put_bytes_list(&[vec![1, 2], vec![]]);
        let bytes = w.into_vec();
        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.get_u8("a").unwrap(), 7);
        assert_eq!(r.get_i64("b").unwrap(), -5);
        assert_eq!(r.get_string("c").unwrap(), "hello");
        assert_eq!(r.get_txid("d").unwrap(), id);
        assert_eq!(r.get_bytes_list("e").unwrap(), vec![vec![1, 2], vec![]]);
        r.finish().unwrap();
    }

    proptest! {
        #[test]
        fn var_bytes_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..600)) {
            let mut w = ByteWriter::new();
            w.put_var_bytes(&data);
            let bytes = w.into_vec();
            let mut r = ByteReader::new(&bytes);
            prop_assert_eq!(r.get_var_bytes("data").unwrap(), data);
            prop_assert!(r.finish().is_ok());
        }

        #[test]
        fn reader_never_panics(data in proptest::collection::vec(any::<u8>(), 0..64)) {
            let mut r = ByteReader::new(&data);
            let _ = r.get_compact_size("a");
            let _ = r.get_string("b");
            let _ = r.get_bytes_list("c");
            let _ = r.get_i64("d");
        }
    }
}
