//! # Message Header
//!
//! Every message starts with a fixed little-endian header:
//!
//! ```text
//! offset  size  field
//! 0       4     header_size (payload offset)
//! 4       4     version
//! 8       4     ordinal
//! 12      4     flags
//! 16      8     request_id
//! ```
//!
//! Senders may emit a larger `header_size` to carry extension fields; readers
//! skip straight to `header_size` for the payload.

use crate::errors::CodecError;
use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Size of the header this crate writes.
pub const HEADER_SIZE: usize = 24;

/// Header version this crate writes.
pub const HEADER_VERSION: u32 = 1;

/// Flag bits carried in the header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageFlags(u32);

impl MessageFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);
    /// The sender waits for a reply with the same request id.
    pub const EXPECTS_RESPONSE: Self = Self(1 << 0);
    /// This message is a reply.
    pub const IS_RESPONSE: Self = Self(1 << 1);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn expects_response(self) -> bool {
        self.contains(Self::EXPECTS_RESPONSE)
    }

    pub const fn is_response(self) -> bool {
        self.contains(Self::IS_RESPONSE)
    }
}

impl std::ops::BitOr for MessageFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for MessageFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Decoded message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    /// Offset of the payload from the start of the message.
    pub header_size: u32,
    /// Header layout version.
    pub version: u32,
    /// Logical operation or control message.
    pub ordinal: u32,
    /// Expects-response / is-response bits.
    pub flags: MessageFlags,
    /// Correlation key between a request and its reply.
    pub request_id: u64,
}

impl MessageHeader {
    /// Header for an outgoing message.
    pub fn new(ordinal: u32, request_id: u64, flags: MessageFlags) -> Self {
        Self {
            header_size: HEADER_SIZE as u32,
            version: HEADER_VERSION,
            ordinal,
            flags,
            request_id,
        }
    }

    /// Append the wire form of this header.
    pub fn encode(&self, out: &mut impl BufMut) {
        out.put_u32_le(self.header_size);
        out.put_u32_le(self.version);
        out.put_u32_le(self.ordinal);
        out.put_u32_le(self.flags.bits());
        out.put_u64_le(self.request_id);
    }

    /// Slice of `buffer` that holds the payload.
    pub fn payload<'a>(&self, buffer: &'a [u8]) -> &'a [u8] {
        buffer.get(self.header_size as usize..).unwrap_or_default()
    }
}

/// Decode the header at the start of `buffer`.
pub fn deserialize_message_header(buffer: &[u8]) -> Result<MessageHeader, CodecError> {
    if buffer.len() < HEADER_SIZE {
        return Err(CodecError::Truncated {
            offset: 0,
            needed: HEADER_SIZE,
            available: buffer.len(),
        });
    }

    let mut cursor = buffer;
    let header_size = cursor.get_u32_le();
    if (header_size as usize) < HEADER_SIZE || header_size as usize > buffer.len() {
        return Err(CodecError::InvalidHeaderSize {
            header_size,
            buffer_len: buffer.len(),
        });
    }

    Ok(MessageHeader {
        header_size,
        version: cursor.get_u32_le(),
        ordinal: cursor.get_u32_le(),
        flags: MessageFlags::from_bits(cursor.get_u32_le()),
        request_id: cursor.get_u64_le(),
    })
}
