//! Reply assembly.
//!
//! Replies are built in a small inline buffer (a full data chunk spills to
//! the heap) and copied out into the caller's reply window at the end of
//! dispatch.

use log::error;
use smallvec::SmallVec;

use super::Status;

const INLINE_REPLY_THRESHOLD: usize = 32;

pub(crate) type ResponseBuf = SmallVec<[u8; INLINE_REPLY_THRESHOLD]>;

/// One reply in construction. Most replies are a bare status byte; transfer
/// chunks append sequence, payload and checksum fields behind it.
#[derive(Debug)]
pub(crate) struct Response {
    buf: ResponseBuf,
}

impl Response {
    /// A zero-length reply (cancel, upload finish).
    pub(crate) fn empty() -> Self {
        Response {
            buf: ResponseBuf::new(),
        }
    }

    /// A reply starting with the given status byte.
    pub(crate) fn status(status: Status) -> Self {
        let mut response = Self::empty();
        response.push(status.into());
        response
    }

    /// A reply starting with the success status byte.
    pub(crate) fn ok() -> Self {
        Self::status(Status::Ok)
    }

    pub(crate) fn push(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    pub(crate) fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub(crate) fn push_u16_le(&mut self, value: u16) {
        self.extend(&value.to_le_bytes());
    }

    pub(crate) fn push_u16_be(&mut self, value: u16) {
        self.extend(&value.to_be_bytes());
    }

    pub(crate) fn push_u32_le(&mut self, value: u32) {
        self.extend(&value.to_le_bytes());
    }

    pub(crate) fn len(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Copy the reply into the caller's window, returning the number of
    /// bytes written. An overlong reply is truncated; transfer chunk sizes
    /// are validated against the window at session open, so truncation only
    /// happens for hosts with windows too small for this protocol.
    pub(crate) fn write_to(&self, out: &mut [u8]) -> usize {
        let len = self.buf.len().min(out.len());
        if len < self.buf.len() {
            error!(
                "reply of {} bytes truncated to capacity {}",
                self.buf.len(),
                out.len()
            );
        }
        out[..len].copy_from_slice(&self.buf[..len]);
        len
    }
}
