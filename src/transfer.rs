//! Chunked transfer engine.
//!
//! Chunks are numbered from 1; the engine keeps a cursor over the open file
//! so the expected next sequence continues from the current position, and
//! seeks to `(sequence - 1) * payload window` whenever the controller skips
//! or repeats a sequence. Replaying a chunk therefore lands on the same file
//! offset, which is what makes retransmission idempotent.

use log::debug;
use log::error;
use log::warn;

use crate::checksum::crc16_modbus;
use crate::ll::Status;
use crate::ll::command::op::WriteChunk;
use crate::ll::reply::Response;
use crate::session::FileSession;
use crate::vfs::File;

/// Reply bytes around a download payload: status, sequence, count, CRC-16.
const DOWNLOAD_CHUNK_OVERHEAD: usize = 6;
/// Request bytes in front of an upload payload: sequence, count.
const UPLOAD_CHUNK_OVERHEAD: usize = 3;
/// Every this many chunks an upload flushes, bounding loss on power cut.
const WRITE_FLUSH_INTERVAL: u16 = 10;

impl<F: File> FileSession<F> {
    /// Data bytes carried per download chunk.
    fn download_window(&self) -> usize {
        (self.chunk_size as usize).saturating_sub(DOWNLOAD_CHUNK_OVERHEAD)
    }

    /// Data bytes carried per upload chunk.
    fn upload_window(&self) -> usize {
        (self.chunk_size as usize).saturating_sub(UPLOAD_CHUNK_OVERHEAD)
    }

    fn seek_to(&mut self, sequence: u16, window: usize) -> Result<(), Status> {
        let position = u64::from(sequence - 1) * window as u64;
        debug!("seeking to {position}");
        self.file.seek(position).map_err(|err| {
            error!("seek to {position} failed: {err}");
            Status::SeekFailed
        })
    }

    /// Serve one download chunk.
    ///
    /// Returns the reply frame and whether the stream is exhausted; the
    /// caller closes the session on exhaustion. The terminal chunk (zero
    /// bytes read, or the cursor reaching the end) is still a full reply so
    /// the controller sees the end of the stream.
    pub(crate) fn read_chunk(&mut self, sequence: u16) -> Result<(Response, bool), Status> {
        if self.last_sequence.wrapping_add(1) != sequence {
            self.seek_to(sequence, self.download_window())?;
        }

        let mut buf = [0u8; 256];
        let window = self.download_window();
        let read = match self.file.read(&mut buf[..window]) {
            Ok(read) => read,
            Err(err) => {
                // An unreadable file ends the stream like a clean EOF would.
                error!("chunk read failed: {err}");
                0
            }
        };
        debug!("read {read}/{window} bytes");

        let mut response = Response::ok();
        response.push_u16_le(sequence);
        response.push(read as u8);
        response.extend(&buf[..read]);
        let crc = crc16_modbus(&response.as_bytes()[1..]);
        response.push_u16_be(crc);

        let exhausted = read == 0 || !self.file.available();
        self.last_sequence = sequence;
        Ok((response, exhausted))
    }

    /// Apply one upload chunk.
    ///
    /// A failed write leaves the session open; `last_sequence` is set so a
    /// retry of the same sequence takes the seek path, since the partial
    /// write left the cursor mid-chunk.
    pub(crate) fn write_chunk(&mut self, chunk: &WriteChunk<'_>) -> Result<Response, Status> {
        if self.last_sequence.wrapping_add(1) != chunk.sequence {
            self.seek_to(chunk.sequence, self.upload_window())?;
        }

        let data = chunk.data();
        let written = match self.file.write(data) {
            Ok(written) => written,
            Err(err) => {
                error!("chunk write failed: {err}");
                self.last_sequence = chunk.sequence;
                return Err(Status::ShortWrite);
            }
        };

        if chunk.sequence % WRITE_FLUSH_INTERVAL == 0 {
            if let Err(err) = self.file.flush() {
                warn!("flush failed: {err}");
            }
        }

        if written != data.len() {
            error!("wrote {written} of {} chunk bytes", data.len());
            self.last_sequence = chunk.sequence;
            return Err(Status::ShortWrite);
        }

        let mut response = Response::ok();
        response.push_u16_le(chunk.sequence);
        response.push_u16_be(crc16_modbus(chunk.frame));

        self.last_sequence = chunk.sequence;
        Ok(response)
    }

    /// Finish an upload: push everything down to the flash.
    pub(crate) fn finish(mut self) {
        if let Err(err) = self.file.flush() {
            warn!("final flush failed: {err}");
        }
    }
}
