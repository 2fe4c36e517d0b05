//! Reply status taxonomy.

use std::fmt;

use num_enum::IntoPrimitive;
use num_enum::TryFromPrimitive;

/// Status byte carried in reply position 0.
///
/// `0x00` is success; every other value names the failure kind. File-session
/// errors live in the `0x4x` range, directory-session errors in `0x8x`. No
/// error is ever retried by the module; retransmission is the controller's
/// call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Status {
    /// Success.
    Ok = 0x00,
    /// Filesystem mount failed.
    MountFailed = 0x01,
    /// Filesystem format failed.
    FormatFailed = 0x02,
    /// Requested chunk is larger than the reply capacity.
    ChunkTooLarge = 0x04,
    /// A file session is already open.
    FileAlreadyOpen = 0x41,
    /// The file could not be opened.
    FileOpenFailed = 0x42,
    /// No file session is open.
    FileNotOpen = 0x43,
    /// File delete failed.
    FileDeleteFailed = 0x44,
    /// Rename failed.
    RenameFailed = 0x45,
    /// Seek to the chunk position failed.
    SeekFailed = 0x46,
    /// Fewer bytes were written than the chunk carried.
    ShortWrite = 0x47,
    /// A directory session is already open.
    DirAlreadyOpen = 0x81,
    /// No directory session is open.
    DirNotOpen = 0x83,
    /// Directory remove failed.
    DirRemoveFailed = 0x84,
    /// Directory create failed.
    DirCreateFailed = 0x85,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Status::Ok => "ok",
            Status::MountFailed => "filesystem mount failed",
            Status::FormatFailed => "filesystem format failed",
            Status::ChunkTooLarge => "requested chunk larger than reply capacity",
            Status::FileAlreadyOpen => "file already open",
            Status::FileOpenFailed => "file can't be opened",
            Status::FileNotOpen => "file not open",
            Status::FileDeleteFailed => "file delete failed",
            Status::RenameFailed => "rename failed",
            Status::SeekFailed => "seek failed",
            Status::ShortWrite => "short write",
            Status::DirAlreadyOpen => "directory already open",
            Status::DirNotOpen => "directory not open",
            Status::DirRemoveFailed => "directory remove failed",
            Status::DirCreateFailed => "directory create failed",
        };
        f.write_str(text)
    }
}
