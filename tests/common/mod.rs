//! In-memory test doubles for the external collaborators: a flash
//! filesystem, the firmware staging facility and a hand-cranked clock.

#![allow(dead_code)]

use std::cell::Cell;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::rc::Rc;

use filebus::Clock;
use filebus::Dir;
use filebus::DirEntry;
use filebus::EntryKind;
use filebus::File;
use filebus::FileTransferModule;
use filebus::Filesystem;
use filebus::Firmware;
use filebus::FsError;
use filebus::Module;
use filebus::ModuleVersion;
use filebus::OBJECT_INDEX;

#[derive(Default)]
struct Store {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
}

/// In-memory filesystem; clones share the same store so tests can inspect
/// what the module wrote.
#[derive(Clone, Default)]
pub struct MemFs {
    store: Rc<RefCell<Store>>,
    fail_mount: Rc<Cell<bool>>,
}

impl MemFs {
    pub fn seed_file(&self, path: &str, data: &[u8]) {
        self.store
            .borrow_mut()
            .files
            .insert(path.to_string(), data.to_vec());
    }

    pub fn seed_dir(&self, path: &str) {
        self.store.borrow_mut().dirs.insert(path.to_string());
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.store.borrow().files.get(path).cloned()
    }

    pub fn set_fail_mount(&self, fail: bool) {
        self.fail_mount.set(fail);
    }

    fn parent(path: &str) -> &str {
        match path.rfind('/') {
            Some(0) | None => "/",
            Some(index) => &path[..index],
        }
    }
}

pub struct MemFile {
    store: Rc<RefCell<Store>>,
    path: String,
    position: usize,
    writable: bool,
}

impl File for MemFile {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, FsError> {
        let store = self.store.borrow();
        let data = store.files.get(&self.path).ok_or(FsError::NotFound)?;
        let remaining = &data[self.position.min(data.len())..];
        let len = remaining.len().min(buf.len());
        buf[..len].copy_from_slice(&remaining[..len]);
        self.position += len;
        Ok(len)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, FsError> {
        if !self.writable {
            return Err(FsError::Io);
        }
        let mut store = self.store.borrow_mut();
        let file = store.files.get_mut(&self.path).ok_or(FsError::NotFound)?;
        let end = self.position + data.len();
        if file.len() < end {
            file.resize(end, 0);
        }
        file[self.position..end].copy_from_slice(data);
        self.position = end;
        Ok(data.len())
    }

    fn seek(&mut self, position: u64) -> Result<(), FsError> {
        self.position = position as usize;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), FsError> {
        Ok(())
    }

    fn size(&self) -> u64 {
        self.store
            .borrow()
            .files
            .get(&self.path)
            .map_or(0, |data| data.len() as u64)
    }

    fn available(&self) -> bool {
        (self.position as u64) < self.size()
    }
}

pub struct MemDir {
    entries: Vec<DirEntry>,
    index: usize,
}

impl Dir for MemDir {
    fn next_entry(&mut self) -> Option<DirEntry> {
        let entry = self.entries.get(self.index).cloned();
        self.index += 1;
        entry
    }
}

impl Filesystem for MemFs {
    type File = MemFile;
    type Dir = MemDir;

    fn mount(&mut self) -> Result<(), FsError> {
        if self.fail_mount.get() {
            return Err(FsError::Io);
        }
        Ok(())
    }

    fn format(&mut self) -> Result<(), FsError> {
        let mut store = self.store.borrow_mut();
        store.files.clear();
        store.dirs.clear();
        Ok(())
    }

    fn exists(&mut self, path: &str) -> bool {
        let store = self.store.borrow();
        store.files.contains_key(path) || store.dirs.contains(path)
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), FsError> {
        let mut store = self.store.borrow_mut();
        if let Some(data) = store.files.remove(from) {
            store.files.insert(to.to_string(), data);
            return Ok(());
        }
        if store.dirs.remove(from) {
            store.dirs.insert(to.to_string());
            return Ok(());
        }
        Err(FsError::NotFound)
    }

    fn remove(&mut self, path: &str) -> Result<(), FsError> {
        self.store
            .borrow_mut()
            .files
            .remove(path)
            .map(drop)
            .ok_or(FsError::NotFound)
    }

    fn mkdir(&mut self, path: &str) -> Result<(), FsError> {
        let mut store = self.store.borrow_mut();
        if store.files.contains_key(path) {
            return Err(FsError::Io);
        }
        store.dirs.insert(path.to_string());
        Ok(())
    }

    fn rmdir(&mut self, path: &str) -> Result<(), FsError> {
        if self.store.borrow_mut().dirs.remove(path) {
            Ok(())
        } else {
            Err(FsError::NotFound)
        }
    }

    fn open_read(&mut self, path: &str) -> Result<MemFile, FsError> {
        if !self.store.borrow().files.contains_key(path) {
            return Err(FsError::NotFound);
        }
        Ok(MemFile {
            store: Rc::clone(&self.store),
            path: path.to_string(),
            position: 0,
            writable: false,
        })
    }

    fn open_write(&mut self, path: &str) -> Result<MemFile, FsError> {
        self.store
            .borrow_mut()
            .files
            .insert(path.to_string(), Vec::new());
        Ok(MemFile {
            store: Rc::clone(&self.store),
            path: path.to_string(),
            position: 0,
            writable: true,
        })
    }

    fn open_dir(&mut self, path: &str) -> Result<MemDir, FsError> {
        let store = self.store.borrow();
        if path != "/" && !store.dirs.contains(path) {
            return Err(FsError::NotFound);
        }
        let mut entries = Vec::new();
        for name in store.files.keys() {
            if Self::parent(name) == path {
                entries.push(DirEntry {
                    name: name[name.rfind('/').map_or(0, |i| i + 1)..].to_string(),
                    kind: EntryKind::File,
                });
            }
        }
        for name in store.dirs.iter() {
            if Self::parent(name) == path {
                entries.push(DirEntry {
                    name: name[name.rfind('/').map_or(0, |i| i + 1)..].to_string(),
                    kind: EntryKind::Dir,
                });
            }
        }
        Ok(MemDir { entries, index: 0 })
    }
}

#[derive(Default)]
pub struct FirmwareState {
    pub staged: Vec<String>,
    pub saves: usize,
    pub reboots: usize,
}

/// Recording firmware double; clones share the same state.
#[derive(Clone, Default)]
pub struct MemFirmware(pub Rc<RefCell<FirmwareState>>);

impl Firmware for MemFirmware {
    fn stage(&mut self, path: &str) {
        self.0.borrow_mut().staged.push(path.to_string());
    }

    fn save_state(&mut self) {
        self.0.borrow_mut().saves += 1;
    }

    fn reboot(&mut self) {
        self.0.borrow_mut().reboots += 1;
    }
}

/// Hand-cranked monotonic clock.
#[derive(Clone, Default)]
pub struct ManualClock(Rc<Cell<u64>>);

impl ManualClock {
    pub fn advance(&self, ms: u64) {
        self.0.set(self.0.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.get()
    }
}

/// A module wired to the in-memory doubles, plus handles to inspect them.
pub struct Harness {
    pub module: FileTransferModule<MemFs, MemFirmware, ManualClock>,
    pub fs: MemFs,
    pub firmware: MemFirmware,
    pub clock: ManualClock,
}

pub const TEST_VERSION: ModuleVersion = ModuleVersion {
    major: 0,
    minor: 0,
    build: 4,
};

impl Harness {
    pub fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let fs = MemFs::default();
        let firmware = MemFirmware::default();
        let clock = ManualClock::default();
        let module = FileTransferModule::with_clock(
            fs.clone(),
            firmware.clone(),
            TEST_VERSION,
            clock.clone(),
        );
        Harness {
            module,
            fs,
            firmware,
            clock,
        }
    }

    /// Issue one request with the default reply capacity, returning the
    /// reply bytes, or `None` when the module reported it unhandled.
    pub fn request(&mut self, property_id: u8, data: &[u8]) -> Option<Vec<u8>> {
        self.request_with_capacity(property_id, data, 256)
    }

    pub fn request_with_capacity(
        &mut self,
        property_id: u8,
        data: &[u8],
        capacity: usize,
    ) -> Option<Vec<u8>> {
        let mut reply = vec![0u8; capacity];
        self.module
            .process_function_property(OBJECT_INDEX, property_id, data, &mut reply)
            .map(|len| reply[..len].to_vec())
    }
}

/// Bitwise CRC-16/Modbus, independent of the implementation under test.
pub fn crc16_oracle(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for byte in data {
        crc ^= u16::from(*byte);
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Bitwise reflected CRC-32, independent of the implementation under test.
pub fn crc32_oracle(data: &[u8]) -> u32 {
    let mut crc: u32 = 0xFFFF_FFFF;
    for byte in data {
        crc ^= u32::from(*byte);
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xEDB8_8320;
            } else {
                crc >>= 1;
            }
        }
    }
    !crc
}
