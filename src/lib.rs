//! File transfer and firmware update service for field-bus devices.
//!
//! A controller drives this module over a field-bus by invoking *function
//! properties*: requests of `(object index, property id, payload)` addressed
//! to the reserved object index 159. Each property id is a command code
//! (format, exists, rename, chunked upload/download, delete, directory
//! listing, file metadata, module version, firmware flash) executed against
//! an on-flash filesystem, answered with a status-prefixed reply. Transfers
//! are chunked with 16-bit sequence numbers and checksummed with
//! CRC-16/Modbus.
//!
//! The crate only implements the command dispatcher, the session state
//! machine and the transfer engine. The bus transport, the flash filesystem
//! and the firmware staging facility are external collaborators, abstracted
//! behind the [`Filesystem`], [`Firmware`] and [`Clock`] traits so the
//! module can be embedded in any single-threaded host scheduler.

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub use crate::firmware::Firmware;
pub use crate::ll::Status;
pub use crate::module::FileTransferModule;
pub use crate::module::HEARTBEAT_INTERVAL_MS;
pub use crate::module::ModuleVersion;
pub use crate::module::OBJECT_INDEX;
pub use crate::module::REBOOT_GRACE_MS;
pub use crate::time::Clock;
pub use crate::time::SystemClock;
pub use crate::vfs::Dir;
pub use crate::vfs::DirEntry;
pub use crate::vfs::EntryKind;
pub use crate::vfs::File;
pub use crate::vfs::Filesystem;
pub use crate::vfs::FsError;

mod checksum;
mod firmware;
mod ll;
mod module;
mod session;
mod time;
mod transfer;
mod vfs;

/// Capability set a hot-pluggable device module exposes to the host's module
/// registry: a name, a version, a periodic tick and the function-property
/// dispatch entry point.
pub trait Module {
    /// Human-readable module name, shown in host diagnostics.
    fn name(&self) -> &str;

    /// Module version as reported on the wire by the version command.
    fn version(&self) -> ModuleVersion;

    /// Periodic housekeeping, invoked on each scheduler quantum. Closes
    /// sessions whose heartbeat lapsed and performs a scheduled reboot.
    fn tick(&mut self);

    /// Handle one function-property request.
    ///
    /// `reply` is the caller's reply window; its length is the maximum reply
    /// capacity. Returns `Some(len)` with the number of reply bytes written
    /// when the request was handled, or `None` when it was not (foreign
    /// object index, unknown command code, malformed payload). The bus layer
    /// is expected to turn `None` into its own protocol-level response.
    fn process_function_property(
        &mut self,
        object_index: u8,
        property_id: u8,
        data: &[u8],
        reply: &mut [u8],
    ) -> Option<usize>;
}
