//! DNS wire-format encoding of dotted names
//!
//! A name is written as a sequence of `[length][label bytes]` chunks followed by
//! a single NUL byte, which is the zero-length root label.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{BonjourError, Result};

/// Largest chunk a single length byte can describe
pub const MAX_CHUNK_LEN: usize = u8::MAX as usize;

/// A name in DNS wire format
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncodedName {
    bytes: Bytes,
}

impl EncodedName {
    /// Raw wire bytes, terminator included
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of wire bytes, terminator included
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Never true: the terminator is always present
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Cheap clone of the underlying buffer
    pub fn to_bytes(&self) -> Bytes {
        self.bytes.clone()
    }

    /// Split the buffer back into its labels.
    ///
    /// Stops at the first zero-length chunk, which terminates the name.
    pub fn labels(&self) -> Vec<&[u8]> {
        let mut labels = Vec::new();
        let mut rest = self.as_bytes();
        while let Some((&len, tail)) = rest.split_first() {
            let len = len as usize;
            if len == 0 || len > tail.len() {
                break;
            }
            labels.push(&tail[..len]);
            rest = &tail[len..];
        }
        labels
    }
}

impl AsRef<[u8]> for EncodedName {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Encode a dotted name into DNS wire format.
///
/// Every `.` closes a chunk, so empty interior components become zero-length
/// chunks. A trailing `.` does not add a chunk of its own: the terminator is
/// the zero-length root chunk, which makes `"host.local."` and `"host.local"`
/// encode identically.
pub fn encode_name(name: &str) -> Result<EncodedName> {
    let mut buf = BytesMut::with_capacity(name.len() + 2);
    let mut components = name.split('.').peekable();

    while let Some(component) = components.next() {
        if component.is_empty() && components.peek().is_none() {
            break;
        }
        if component.len() > MAX_CHUNK_LEN {
            return Err(BonjourError::encoding(
                name,
                format!(
                    "label of {} bytes exceeds {MAX_CHUNK_LEN}",
                    component.len()
                ),
            ));
        }
        buf.put_u8(component.len() as u8);
        buf.put_slice(component.as_bytes());
    }
    buf.put_u8(0);

    Ok(EncodedName {
        bytes: buf.freeze(),
    })
}
