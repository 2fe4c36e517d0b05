//! Session bookkeeping.
//!
//! At most one file session and at most one directory session exist at a
//! time, and never both. The `Option` slots below are the authoritative
//! open/closed state: dropping a slot releases the underlying handle, so no
//! exit path (completion, cancel, timeout, error) can leak one.

use std::fmt;

use log::error;

use crate::ll::Status;
use crate::vfs::Dir;
use crate::vfs::File;

/// An open file transfer session.
pub(crate) struct FileSession<F> {
    pub(crate) file: F,
    /// Payload-window size negotiated at session open.
    pub(crate) chunk_size: u8,
    /// Sequence number of the most recently completed chunk; 0 right after
    /// open.
    pub(crate) last_sequence: u16,
}

impl<F> fmt::Debug for FileSession<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSession")
            .field("chunk_size", &self.chunk_size)
            .field("last_sequence", &self.last_sequence)
            .finish_non_exhaustive()
    }
}

/// The at-most-one file and at-most-one directory session slots.
pub(crate) struct Sessions<F, D> {
    file: Option<FileSession<F>>,
    dir: Option<D>,
}

impl<F, D> fmt::Debug for Sessions<F, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sessions")
            .field("file_open", &self.file.is_some())
            .field("dir_open", &self.dir.is_some())
            .finish()
    }
}

impl<F: File, D: Dir> Sessions<F, D> {
    pub(crate) fn new() -> Self {
        Sessions {
            file: None,
            dir: None,
        }
    }

    pub(crate) fn file_open(&self) -> bool {
        self.file.is_some()
    }

    pub(crate) fn dir_open(&self) -> bool {
        self.dir.is_some()
    }

    /// Start a file session. Callers must have passed the guards first.
    pub(crate) fn open_file(&mut self, file: F, chunk_size: u8) {
        debug_assert!(self.file.is_none() && self.dir.is_none());
        self.file = Some(FileSession {
            file,
            chunk_size,
            last_sequence: 0,
        });
    }

    /// Start a directory session. Callers must have passed the guards first.
    pub(crate) fn open_dir(&mut self, dir: D) {
        debug_assert!(self.file.is_none() && self.dir.is_none());
        self.dir = Some(dir);
    }

    /// End the file session, handing the handle back for a final flush.
    pub(crate) fn close_file(&mut self) -> Option<FileSession<F>> {
        self.file.take()
    }

    /// End the directory session.
    pub(crate) fn close_dir(&mut self) {
        self.dir = None;
    }

    /// Release whatever is open.
    pub(crate) fn cancel(&mut self) {
        self.file = None;
        self.dir = None;
    }

    pub(crate) fn require_no_file(&self) -> Result<(), Status> {
        if self.file.is_some() {
            error!("file already open");
            return Err(Status::FileAlreadyOpen);
        }
        Ok(())
    }

    pub(crate) fn require_file(&mut self) -> Result<&mut FileSession<F>, Status> {
        self.file.as_mut().ok_or_else(|| {
            error!("file not open");
            Status::FileNotOpen
        })
    }

    pub(crate) fn require_no_dir(&self) -> Result<(), Status> {
        if self.dir.is_some() {
            error!("directory already open");
            return Err(Status::DirAlreadyOpen);
        }
        Ok(())
    }

    pub(crate) fn require_dir(&mut self) -> Result<&mut D, Status> {
        self.dir.as_mut().ok_or_else(|| {
            error!("directory not open");
            Status::DirNotOpen
        })
    }
}
