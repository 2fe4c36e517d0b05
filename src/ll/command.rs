//! Typed decoding of function-property commands.
//!
//! A request arrives as a one-byte command code (the bus property id) plus a
//! payload. Decoding produces an [`Operation`] value borrowing from the
//! payload; the dispatcher matches on it exhaustively.

use std::error;
use std::fmt;

use num_enum::TryFromPrimitive;
use zerocopy::little_endian::U16;

use super::argument::ArgumentIterator;

/// Sequence number reserved for the session-opening sub-command.
pub(crate) const OPEN_SEQUENCE: u16 = 0x0000;
/// Upload sequence sentinel meaning "no more data".
pub(crate) const FINAL_SEQUENCE: u16 = 0xFFFF;

/// Error that may occur while decoding a function-property request.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum RequestError {
    /// The property id is not a known command code.
    UnknownCommand(u8),
    /// The payload is too short for the command, a path is missing its NUL
    /// terminator, or a path is not valid UTF-8.
    InvalidPayload(CommandCode),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::UnknownCommand(code) => {
                write!(f, "Unknown file transfer command ({code})")
            }
            RequestError::InvalidPayload(command) => {
                write!(f, "Invalid payload for {command:?} command")
            }
        }
    }
}

impl error::Error for RequestError {}

/// The closed command-code space carried in the bus property id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub(crate) enum CommandCode {
    Format = 0,
    Exists = 1,
    Rename = 2,
    FileUpload = 40,
    FileDownload = 41,
    FileDelete = 42,
    FileInfo = 43,
    DirList = 80,
    DirCreate = 81,
    DirDelete = 82,
    Cancel = 90,
    Version = 100,
    FwUpdate = 101,
}

pub(crate) mod op {
    #[derive(Debug)]
    pub(crate) struct Rename<'a> {
        pub from: &'a str,
        pub to: &'a str,
    }

    /// First chunk of an upload or download: negotiates the chunk size and
    /// names the file.
    #[derive(Debug)]
    pub(crate) struct SessionOpen<'a> {
        pub chunk_size: u8,
        pub path: &'a str,
    }

    /// Download data chunk request.
    #[derive(Debug)]
    pub(crate) struct ReadChunk {
        pub sequence: u16,
    }

    /// Upload data chunk: `seqLo seqHi count data…` with exactly `count`
    /// data bytes.
    #[derive(Debug)]
    pub(crate) struct WriteChunk<'a> {
        pub sequence: u16,
        /// The full inbound payload (header plus data); the chunk CRC is
        /// computed over it.
        pub frame: &'a [u8],
    }

    impl<'a> WriteChunk<'a> {
        pub(crate) fn data(&self) -> &'a [u8] {
            &self.frame[3..]
        }
    }
}

use op::ReadChunk;
use op::Rename;
use op::SessionOpen;
use op::WriteChunk;

/// Sub-commands of the chunked upload.
#[derive(Debug)]
pub(crate) enum Upload<'a> {
    Open(SessionOpen<'a>),
    Chunk(WriteChunk<'a>),
    Finish,
}

/// Sub-commands of the chunked download.
#[derive(Debug)]
pub(crate) enum Download<'a> {
    Open(SessionOpen<'a>),
    Chunk(ReadChunk),
}

/// A fully decoded function-property request.
#[derive(Debug)]
pub(crate) enum Operation<'a> {
    Format,
    Exists { path: &'a str },
    Rename(Rename<'a>),
    FileUpload(Upload<'a>),
    FileDownload(Download<'a>),
    FileDelete { path: &'a str },
    FileInfo { path: &'a str },
    DirList { path: &'a str },
    DirCreate { path: &'a str },
    DirDelete { path: &'a str },
    Cancel,
    Version,
    FwUpdate { path: &'a str },
}

impl fmt::Display for Operation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Format => write!(f, "FORMAT"),
            Operation::Exists { path } => write!(f, "EXISTS path {path:?}"),
            Operation::Rename(x) => write!(f, "RENAME from {:?}, to {:?}", x.from, x.to),
            Operation::FileUpload(Upload::Open(x)) => {
                write!(f, "UPLOAD open path {:?}, chunk size {}", x.path, x.chunk_size)
            }
            Operation::FileUpload(Upload::Chunk(x)) => {
                write!(f, "UPLOAD chunk seq {}, {} bytes", x.sequence, x.data().len())
            }
            Operation::FileUpload(Upload::Finish) => write!(f, "UPLOAD finish"),
            Operation::FileDownload(Download::Open(x)) => {
                write!(f, "DOWNLOAD open path {:?}, chunk size {}", x.path, x.chunk_size)
            }
            Operation::FileDownload(Download::Chunk(x)) => {
                write!(f, "DOWNLOAD chunk seq {}", x.sequence)
            }
            Operation::FileDelete { path } => write!(f, "FILE DELETE path {path:?}"),
            Operation::FileInfo { path } => write!(f, "FILE INFO path {path:?}"),
            Operation::DirList { path } => write!(f, "DIR LIST path {path:?}"),
            Operation::DirCreate { path } => write!(f, "DIR CREATE path {path:?}"),
            Operation::DirDelete { path } => write!(f, "DIR DELETE path {path:?}"),
            Operation::Cancel => write!(f, "CANCEL"),
            Operation::Version => write!(f, "VERSION"),
            Operation::FwUpdate { path } => write!(f, "FW UPDATE path {path:?}"),
        }
    }
}

impl<'a> Operation<'a> {
    /// Decode a `(property id, payload)` pair into a typed operation.
    pub(crate) fn decode(property_id: u8, payload: &'a [u8]) -> Result<Self, RequestError> {
        let command = CommandCode::try_from(property_id)
            .map_err(|_| RequestError::UnknownCommand(property_id))?;
        let mut args = ArgumentIterator::new(payload);
        Self::parse(command, payload, &mut args)
            .ok_or(RequestError::InvalidPayload(command))
    }

    fn parse(
        command: CommandCode,
        payload: &'a [u8],
        args: &mut ArgumentIterator<'a>,
    ) -> Option<Self> {
        Some(match command {
            CommandCode::Format => Operation::Format,
            CommandCode::Exists => Operation::Exists {
                path: args.fetch_path()?,
            },
            CommandCode::Rename => Operation::Rename(Rename {
                from: args.fetch_path()?,
                to: args.fetch_path()?,
            }),
            CommandCode::FileUpload => {
                Operation::FileUpload(match args.fetch::<U16>()?.get() {
                    OPEN_SEQUENCE => Upload::Open(SessionOpen {
                        chunk_size: *args.fetch::<u8>()?,
                        path: args.fetch_path()?,
                    }),
                    FINAL_SEQUENCE => Upload::Finish,
                    sequence => {
                        let count = *args.fetch::<u8>()?;
                        if args.len() != count as usize {
                            return None;
                        }
                        Upload::Chunk(WriteChunk {
                            sequence,
                            frame: payload,
                        })
                    }
                })
            }
            CommandCode::FileDownload => {
                Operation::FileDownload(match args.fetch::<U16>()?.get() {
                    OPEN_SEQUENCE => Download::Open(SessionOpen {
                        chunk_size: *args.fetch::<u8>()?,
                        path: args.fetch_path()?,
                    }),
                    sequence => Download::Chunk(ReadChunk { sequence }),
                })
            }
            CommandCode::FileDelete => Operation::FileDelete {
                path: args.fetch_path()?,
            },
            CommandCode::FileInfo => Operation::FileInfo {
                path: args.fetch_path()?,
            },
            CommandCode::DirList => Operation::DirList {
                path: args.fetch_path()?,
            },
            CommandCode::DirCreate => Operation::DirCreate {
                path: args.fetch_path()?,
            },
            CommandCode::DirDelete => Operation::DirDelete {
                path: args.fetch_path()?,
            },
            CommandCode::Cancel => Operation::Cancel,
            CommandCode::Version => Operation::Version,
            CommandCode::FwUpdate => Operation::FwUpdate {
                path: args.fetch_path()?,
            },
        })
    }
}
