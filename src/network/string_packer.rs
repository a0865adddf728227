// src/network/string_packer.rs
//! Length-prefixed string list embedded at the tail of some messages
//!
//! Layout: one count byte, then `count` entries of `{len: u8, bytes[len]}`.
//! The packer is a view over a byte region owned by the message.

use crate::utils::errors::{EngineError, Result};

/// Accessor over an encoded string pack
pub struct StringPacker<B> {
    buf: B,
}

impl<B: AsRef<[u8]>> StringPacker<B> {
    pub fn new(buf: B) -> Self {
        Self { buf }
    }

    /// Number of strings in the pack
    pub fn count(&self) -> u8 {
        self.buf.as_ref().first().copied().unwrap_or(0)
    }

    /// Borrow the string at `index`, or `None` past the last entry
    pub fn get_string(&self, index: usize) -> Option<&[u8]> {
        read_entry(self.buf.as_ref(), index)
    }

    /// Iterate over every entry
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> + '_ {
        (0..self.count() as usize).map_while(move |i| self.get_string(i))
    }

    /// Bytes used by the encoded pack
    pub fn used_len(&self) -> usize {
        entry_offset(self.buf.as_ref(), self.count() as usize).unwrap_or(0)
    }
}

impl<'a> StringPacker<&'a [u8]> {
    /// Same as [`get_string`](Self::get_string), borrowing from the region itself
    pub fn entry(&self, index: usize) -> Option<&'a [u8]> {
        read_entry(self.buf, index)
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> StringPacker<B> {
    /// Append `s` after the existing entries
    pub fn add_string(&mut self, s: &[u8]) -> Result<()> {
        if s.len() > u8::MAX as usize {
            return Err(EngineError::FieldTooLong {
                field: "string pack entry",
                max: u8::MAX as usize,
                actual: s.len(),
            });
        }

        let count = self.count();
        let capacity = self.buf.as_ref().len();
        let start = entry_offset(self.buf.as_ref(), count as usize)
            .filter(|_| count < u8::MAX)
            .ok_or(EngineError::StringPackOverflow {
                needed: capacity + 1,
                capacity,
            })?;

        let needed = start + 1 + s.len();
        if needed > capacity {
            return Err(EngineError::StringPackOverflow { needed, capacity });
        }

        let buf = self.buf.as_mut();
        buf[start] = s.len() as u8;
        buf[start + 1..needed].copy_from_slice(s);
        buf[0] = count + 1;
        Ok(())
    }
}

/// Encoded size of a pack holding `strings`
pub fn encoded_len<'a>(strings: impl IntoIterator<Item = &'a [u8]>) -> usize {
    1 + strings.into_iter().map(|s| 1 + s.len()).sum::<usize>()
}

fn read_entry(buf: &[u8], index: usize) -> Option<&[u8]> {
    if index >= *buf.first()? as usize {
        return None;
    }

    let start = entry_offset(buf, index)?;
    let len = *buf.get(start)? as usize;
    buf.get(start + 1..start + 1 + len)
}

/// Offset of entry `index`, walking the length prefixes before it
fn entry_offset(buf: &[u8], index: usize) -> Option<usize> {
    if buf.is_empty() {
        return None;
    }

    let mut pos = 1;
    for _ in 0..index {
        let len = *buf.get(pos)? as usize;
        pos += 1 + len;
    }
    (pos <= buf.len()).then_some(pos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_add_and_get() {
        let mut region = [0u8; 32];
        let mut packer = StringPacker::new(&mut region[..]);
        packer.add_string(b"SYSTEM").unwrap();
        packer.add_string(b"").unwrap();
        packer.add_string(b"ANSWER_OK").unwrap();

        assert_eq!(packer.count(), 3);
        assert_eq!(packer.get_string(0), Some(&b"SYSTEM"[..]));
        assert_eq!(packer.get_string(1), Some(&b""[..]));
        assert_eq!(packer.get_string(2), Some(&b"ANSWER_OK"[..]));
        assert_eq!(packer.get_string(3), None);
        assert_eq!(packer.used_len(), 1 + 7 + 1 + 10);

        assert_eq!(&region[..8], &[3, 6, b'S', b'Y', b'S', b'T', b'E', b'M']);
    }

    #[test]
    fn test_overflow_rejected() {
        let mut region = [0u8; 8];
        let mut packer = StringPacker::new(&mut region[..]);
        packer.add_string(b"abc").unwrap();
        let err = packer.add_string(b"defg").unwrap_err();
        assert!(matches!(err, EngineError::StringPackOverflow { needed: 10, capacity: 8 }));
        assert_eq!(packer.count(), 1);
    }

    #[test]
    fn test_corrupt_lengths() {
        // count says 2 but the first entry claims more bytes than exist
        let region = [2u8, 200, b'a', b'b'];
        let packer = StringPacker::new(&region[..]);
        assert_eq!(packer.get_string(0), None);
        assert_eq!(packer.get_string(1), None);
    }

    #[test]
    fn test_empty_region() {
        let packer = StringPacker::new(&[0u8; 0][..]);
        assert_eq!(packer.count(), 0);
        assert_eq!(packer.get_string(0), None);
    }

    #[test]
    fn test_encoded_len() {
        assert_eq!(encoded_len([&b"Offline"[..], &b"None"[..]]), 1 + 8 + 5);
    }

    proptest! {
        #[test]
        fn prop_entries_read_back(strings in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..20), 0..8)) {
            let mut region = vec![0u8; encoded_len(strings.iter().map(|s| s.as_slice()))];
            let mut packer = StringPacker::new(region.as_mut_slice());
            for s in &strings {
                packer.add_string(s).unwrap();
            }
            let read: Vec<Vec<u8>> = packer.iter().map(|s| s.to_vec()).collect();
            prop_assert_eq!(read, strings);
        }
    }
}
