//! Flash filesystem interface.
//!
//! The module drives the device's on-flash filesystem exclusively through
//! these traits; the host wires in the concrete backend. All calls are
//! synchronous and expected to complete in bounded time.

use std::fmt;

/// Error raised by the filesystem backend.
///
/// The module maps every failure to the status byte of the command that hit
/// it, so the variants only need to be broad enough for useful logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    /// The path does not name an existing entry.
    NotFound,
    /// The backing store is full.
    NoSpace,
    /// Any other backend failure.
    Io,
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsError::NotFound => f.write_str("entry not found"),
            FsError::NoSpace => f.write_str("no space left on flash"),
            FsError::Io => f.write_str("filesystem I/O error"),
        }
    }
}

impl std::error::Error for FsError {}

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Regular file.
    File,
    /// Directory.
    Dir,
}

impl EntryKind {
    /// Listing replies encode files as `0x01` and directories as `0x02`
    /// (`0x00` marks the end of the listing).
    pub(crate) fn wire_code(self) -> u8 {
        match self {
            EntryKind::File => 0x01,
            EntryKind::Dir => 0x02,
        }
    }
}

/// One entry yielded by a directory iterator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name, without any path prefix.
    pub name: String,
    /// Whether the entry is a file or a directory.
    pub kind: EntryKind,
}

/// An open file.
pub trait File {
    /// Read up to `buf.len()` bytes from the current position. Returns the
    /// number of bytes read; 0 means end of file.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, FsError>;

    /// Write the given bytes at the current position, returning how many
    /// were written. A short count means the store filled up mid-write.
    fn write(&mut self, data: &[u8]) -> Result<usize, FsError>;

    /// Position the cursor at an absolute byte offset.
    fn seek(&mut self, position: u64) -> Result<(), FsError>;

    /// Push buffered writes down to the flash.
    fn flush(&mut self) -> Result<(), FsError>;

    /// Current size of the file in bytes.
    fn size(&self) -> u64;

    /// True while the cursor has bytes left to read.
    fn available(&self) -> bool;
}

/// A directory iterator positioned at the next entry to yield.
pub trait Dir {
    /// Advance to the next entry, or `None` when the listing is exhausted.
    fn next_entry(&mut self) -> Option<DirEntry>;
}

/// The flash filesystem.
///
/// `mount` is idempotent; the module calls it in front of every command
/// that touches the store, mirroring a lazily-mounted flash backend.
pub trait Filesystem {
    /// Open file handle type.
    type File: File;
    /// Directory iterator type.
    type Dir: Dir;

    /// Mount the backing store if it is not already mounted.
    fn mount(&mut self) -> Result<(), FsError>;

    /// Re-create an empty filesystem.
    fn format(&mut self) -> Result<(), FsError>;

    /// True if the path names an existing file or directory.
    fn exists(&mut self, path: &str) -> bool;

    /// Rename a file or directory.
    fn rename(&mut self, from: &str, to: &str) -> Result<(), FsError>;

    /// Delete a file.
    fn remove(&mut self, path: &str) -> Result<(), FsError>;

    /// Create a directory.
    fn mkdir(&mut self, path: &str) -> Result<(), FsError>;

    /// Remove a directory.
    fn rmdir(&mut self, path: &str) -> Result<(), FsError>;

    /// Open a file for reading, positioned at the start.
    fn open_read(&mut self, path: &str) -> Result<Self::File, FsError>;

    /// Open a file for writing, truncating any existing content.
    fn open_write(&mut self, path: &str) -> Result<Self::File, FsError>;

    /// Open a directory for iteration.
    fn open_dir(&mut self, path: &str) -> Result<Self::Dir, FsError>;
}
