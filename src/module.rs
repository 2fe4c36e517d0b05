//! The file transfer module: command dispatch, utility commands and the
//! periodic housekeeping tick.

use std::fmt;

use log::debug;
use log::error;
use log::info;

use crate::Module;
use crate::checksum;
use crate::firmware::Firmware;
use crate::ll::Status;
use crate::ll::command::Download;
use crate::ll::command::Operation;
use crate::ll::command::Upload;
use crate::ll::command::op::SessionOpen;
use crate::ll::reply::Response;
use crate::session::Sessions;
use crate::time::Clock;
use crate::time::SystemClock;
use crate::vfs::Dir;
use crate::vfs::File;
use crate::vfs::Filesystem;

/// Object index reserved for the file transfer function properties.
pub const OBJECT_INDEX: u8 = 159;

/// A session whose last chunk is older than this is considered abandoned
/// and closed by the periodic tick.
pub const HEARTBEAT_INTERVAL_MS: u64 = 11_000;

/// Delay between the firmware update command and the actual reboot, giving
/// the bus time to finish the exchange.
pub const REBOOT_GRACE_MS: u64 = 2_000;

/// Block size for streaming a file through the metadata CRC-32.
const CRC_BLOCK_SIZE: usize = 1000;

/// Module version as carried in the version reply: three 16-bit fields,
/// big-endian on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleVersion {
    /// Major version.
    pub major: u16,
    /// Minor version.
    pub minor: u16,
    /// Build number.
    pub build: u16,
}

impl fmt::Display for ModuleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.build)
    }
}

/// The file transfer and firmware update service.
///
/// One long-lived value, owned by the host's module registry and driven
/// from a single thread: the bus delivers requests through
/// [`Module::process_function_property`] and the host scheduler calls
/// [`Module::tick`] in between.
pub struct FileTransferModule<FS: Filesystem, FW, C = SystemClock> {
    fs: FS,
    firmware: FW,
    clock: C,
    version: ModuleVersion,
    sessions: Sessions<FS::File, FS::Dir>,
    /// Timestamp of the most recent transfer or listing request.
    heartbeat: u64,
    /// Timestamp of the most recent accepted request, for diagnostics.
    last_access: u64,
    /// Reboot deadline once a firmware update has been staged.
    reboot_at: Option<u64>,
}

impl<FS: Filesystem, FW, C> fmt::Debug for FileTransferModule<FS, FW, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileTransferModule")
            .field("version", &self.version)
            .field("sessions", &self.sessions)
            .field("reboot_at", &self.reboot_at)
            .finish_non_exhaustive()
    }
}

impl<FS: Filesystem, FW: Firmware> FileTransferModule<FS, FW> {
    /// Create the module with the default monotonic clock.
    pub fn new(fs: FS, firmware: FW, version: ModuleVersion) -> Self {
        Self::with_clock(fs, firmware, version, SystemClock::default())
    }
}

impl<FS: Filesystem, FW: Firmware, C: Clock> FileTransferModule<FS, FW, C> {
    /// Create the module with an explicit clock.
    pub fn with_clock(fs: FS, firmware: FW, version: ModuleVersion, clock: C) -> Self {
        FileTransferModule {
            fs,
            firmware,
            clock,
            version,
            sessions: Sessions::new(),
            heartbeat: 0,
            last_access: 0,
            reboot_at: None,
        }
    }

    /// True while a file transfer session is open.
    pub fn file_session_open(&self) -> bool {
        self.sessions.file_open()
    }

    /// True while a directory listing session is open.
    pub fn dir_session_open(&self) -> bool {
        self.sessions.dir_open()
    }

    /// True once a firmware update has been staged and the reboot deadline
    /// is pending.
    pub fn reboot_pending(&self) -> bool {
        self.reboot_at.is_some()
    }

    /// Timestamp of the most recent accepted request.
    pub fn last_access_ms(&self) -> u64 {
        self.last_access
    }

    fn touch_heartbeat(&mut self) {
        self.heartbeat = self.clock.now_ms();
    }

    fn ensure_mounted(&mut self) -> Result<(), Status> {
        self.fs.mount().map_err(|err| {
            error!("filesystem mount failed: {err}");
            Status::MountFailed
        })
    }

    fn format(&mut self) -> Result<Response, Status> {
        self.ensure_mounted()?;
        if let Err(err) = self.fs.format() {
            error!("formatting the filesystem failed: {err}");
            return Err(Status::FormatFailed);
        }
        info!("filesystem formatted");
        Ok(Response::ok())
    }

    fn exists(&mut self, path: &str) -> Result<Response, Status> {
        self.ensure_mounted()?;
        let exists = self.fs.exists(path);
        debug!(
            "{path:?} {}",
            if exists { "exists" } else { "does not exist" }
        );
        let mut response = Response::ok();
        response.push(exists as u8);
        Ok(response)
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<Response, Status> {
        self.ensure_mounted()?;
        if let Err(err) = self.fs.rename(from, to) {
            error!("renaming {from:?} to {to:?} failed: {err}");
            return Err(Status::RenameFailed);
        }
        info!("renamed {from:?} to {to:?}");
        Ok(Response::ok())
    }

    fn open_transfer(&mut self, open: &SessionOpen<'_>, file: FS::File) {
        self.sessions.open_file(file, open.chunk_size);
    }

    fn upload(&mut self, upload: Upload<'_>) -> Result<Response, Status> {
        self.touch_heartbeat();
        match upload {
            Upload::Open(open) => {
                self.ensure_mounted()?;
                self.sessions.require_no_file()?;
                self.sessions.require_no_dir()?;
                let file = self.fs.open_write(open.path).map_err(|err| {
                    error!("starting upload to {:?} failed: {err}", open.path);
                    Status::FileOpenFailed
                })?;
                info!("upload to {:?} started, chunk size {}", open.path, open.chunk_size);
                self.open_transfer(&open, file);
                Ok(Response::ok())
            }
            Upload::Chunk(chunk) => {
                let session = self.sessions.require_file()?;
                session.write_chunk(&chunk)
            }
            Upload::Finish => {
                self.sessions.require_file()?;
                if let Some(session) = self.sessions.close_file() {
                    session.finish();
                }
                info!("upload completed");
                Ok(Response::empty())
            }
        }
    }

    fn download(&mut self, download: Download<'_>, capacity: usize) -> Result<Response, Status> {
        self.touch_heartbeat();
        match download {
            Download::Open(open) => {
                self.ensure_mounted()?;
                self.sessions.require_no_file()?;
                self.sessions.require_no_dir()?;
                if open.chunk_size as usize > capacity {
                    error!(
                        "requested chunk size {} exceeds reply capacity {capacity}",
                        open.chunk_size
                    );
                    return Err(Status::ChunkTooLarge);
                }
                let file = self.fs.open_read(open.path).map_err(|err| {
                    error!("starting download of {:?} failed: {err}", open.path);
                    Status::FileOpenFailed
                })?;
                let size = file.size() as u32;
                info!(
                    "download of {:?} started, {size} bytes, chunk size {}",
                    open.path, open.chunk_size
                );
                self.open_transfer(&open, file);
                let mut response = Response::ok();
                response.push_u32_le(size);
                response.push(0);
                Ok(response)
            }
            Download::Chunk(chunk) => {
                let session = self.sessions.require_file()?;
                let (response, exhausted) = session.read_chunk(chunk.sequence)?;
                if exhausted {
                    self.sessions.close_file();
                    info!("download completed");
                }
                Ok(response)
            }
        }
    }

    fn file_delete(&mut self, path: &str) -> Result<Response, Status> {
        self.ensure_mounted()?;
        self.sessions.require_no_file()?;
        self.sessions.require_no_dir()?;
        if let Err(err) = self.fs.remove(path) {
            error!("deleting {path:?} failed: {err}");
            return Err(Status::FileDeleteFailed);
        }
        info!("deleted {path:?}");
        Ok(Response::ok())
    }

    fn file_info(&mut self, path: &str) -> Result<Response, Status> {
        self.ensure_mounted()?;
        self.sessions.require_no_file()?;
        self.sessions.require_no_dir()?;

        // Scoped handle: metadata never leaves a session behind.
        let mut file = self.fs.open_read(path).map_err(|err| {
            error!("reading file info of {path:?} failed: {err}");
            Status::FileOpenFailed
        })?;

        let size = file.size() as u32;
        let mut digest = checksum::CRC32.digest();
        let mut buf = [0u8; CRC_BLOCK_SIZE];
        while file.available() {
            let read = file.read(&mut buf).map_err(|err| {
                error!("reading {path:?} for file info failed: {err}");
                Status::FileOpenFailed
            })?;
            if read == 0 {
                break;
            }
            digest.update(&buf[..read]);
        }
        let crc = digest.finalize();
        info!("file info of {path:?}: {size} bytes, crc32 {crc:#010X}");

        let mut response = Response::ok();
        response.push_u32_le(size);
        response.push_u32_le(crc);
        Ok(response)
    }

    fn dir_list(&mut self, path: &str) -> Result<Response, Status> {
        self.touch_heartbeat();
        self.ensure_mounted()?;
        self.sessions.require_no_file()?;

        if !self.sessions.dir_open() {
            debug!("listing directory {path:?}");
            match self.fs.open_dir(path) {
                Ok(dir) => self.sessions.open_dir(dir),
                Err(err) => {
                    // An unopenable path lists as empty.
                    debug!("opening directory {path:?} failed: {err}");
                    let mut response = Response::ok();
                    response.push(0x00);
                    return Ok(response);
                }
            }
        }

        let dir = self.sessions.require_dir()?;
        match dir.next_entry() {
            Some(entry) => {
                debug!("- {}", entry.name);
                let mut response = Response::ok();
                response.push(entry.kind.wire_code());
                response.extend(entry.name.as_bytes());
                Ok(response)
            }
            None => {
                debug!("directory listing completed");
                self.sessions.close_dir();
                let mut response = Response::ok();
                response.push(0x00);
                Ok(response)
            }
        }
    }

    fn dir_create(&mut self, path: &str) -> Result<Response, Status> {
        self.ensure_mounted()?;
        self.sessions.require_no_file()?;
        self.sessions.require_no_dir()?;
        if let Err(err) = self.fs.mkdir(path) {
            error!("creating directory {path:?} failed: {err}");
            return Err(Status::DirCreateFailed);
        }
        info!("created directory {path:?}");
        Ok(Response::ok())
    }

    fn dir_delete(&mut self, path: &str) -> Result<Response, Status> {
        self.ensure_mounted()?;
        self.sessions.require_no_file()?;
        self.sessions.require_no_dir()?;
        if let Err(err) = self.fs.rmdir(path) {
            error!("removing directory {path:?} failed: {err}");
            return Err(Status::DirRemoveFailed);
        }
        info!("removed directory {path:?}");
        Ok(Response::ok())
    }

    fn cancel(&mut self) -> Result<Response, Status> {
        debug!("cancel");
        self.sessions.cancel();
        Ok(Response::empty())
    }

    fn module_version(&self) -> Result<Response, Status> {
        let mut response = Response::empty();
        response.push_u16_be(self.version.major);
        response.push_u16_be(self.version.minor);
        response.push_u16_be(self.version.build);
        Ok(response)
    }

    fn fw_update(&mut self, path: &str) {
        info!("firmware update from {path:?}, restart in {REBOOT_GRACE_MS} ms");
        self.firmware.stage(path);
        self.reboot_at = Some(self.clock.now_ms() + REBOOT_GRACE_MS);
    }

    fn dispatch(&mut self, operation: Operation<'_>, capacity: usize) -> Option<Response> {
        let result = match operation {
            Operation::Format => self.format(),
            Operation::Exists { path } => self.exists(path),
            Operation::Rename(rename) => self.rename(rename.from, rename.to),
            Operation::FileUpload(upload) => self.upload(upload),
            Operation::FileDownload(download) => self.download(download, capacity),
            Operation::FileDelete { path } => self.file_delete(path),
            Operation::FileInfo { path } => self.file_info(path),
            Operation::DirList { path } => self.dir_list(path),
            Operation::DirCreate { path } => self.dir_create(path),
            Operation::DirDelete { path } => self.dir_delete(path),
            Operation::Cancel => self.cancel(),
            Operation::Version => self.module_version(),
            Operation::FwUpdate { path } => {
                // The bus layer acknowledges this one itself while the
                // device prepares to reboot, so it is reported unhandled.
                self.fw_update(path);
                return None;
            }
        };
        Some(result.unwrap_or_else(Response::status))
    }

    fn close_expired_sessions(&mut self, now: u64) {
        if now.saturating_sub(self.heartbeat) <= HEARTBEAT_INTERVAL_MS {
            return;
        }
        if let Some(session) = self.sessions.close_file() {
            session.finish();
            error!("file session closed, no heartbeat");
        }
        if self.sessions.dir_open() {
            self.sessions.close_dir();
            error!("directory session closed, no heartbeat");
        }
    }
}

impl<FS: Filesystem, FW: Firmware, C: Clock> Module for FileTransferModule<FS, FW, C> {
    fn name(&self) -> &str {
        "FileTransferModule"
    }

    fn version(&self) -> ModuleVersion {
        self.version
    }

    fn tick(&mut self) {
        let now = self.clock.now_ms();
        self.close_expired_sessions(now);

        if let Some(deadline) = self.reboot_at {
            if now >= deadline {
                info!("restarting now");
                self.reboot_at = None;
                self.firmware.save_state();
                self.firmware.reboot();
            }
        }
    }

    fn process_function_property(
        &mut self,
        object_index: u8,
        property_id: u8,
        data: &[u8],
        reply: &mut [u8],
    ) -> Option<usize> {
        if object_index != OBJECT_INDEX {
            return None;
        }
        self.last_access = self.clock.now_ms();

        let operation = match Operation::decode(property_id, data) {
            Ok(operation) => operation,
            Err(err) => {
                debug!("{err}");
                return None;
            }
        };
        debug!("{operation}");

        let response = self.dispatch(operation, reply.len())?;
        Some(response.write_to(reply))
    }
}
