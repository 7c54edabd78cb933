//! [`BackingStore`] over a sysfs tree and a char-device directory.
//!
//! Layout expected under `sys_root`:
//!
//! ```text
//! available_buffers, available_triggers
//! devices/<name>[-0x<id>]/{name,devname,devtype,enable,standard/*,extended/*}
//!     cset*/{direction,current_trigger,current_buffer,trigger/...}
//!         chan*/{current_control,alarms,buffer/flush,...}
//! ```
//!
//! Each channel's streams live at `<dev_root>/<chan devname>-data` and
//! `-ctrl`. Both roots are configurable so the store can run over a fixture.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::errno::{
    StoreError, StoreResult, EUZIOICHAN, EUZIOICSET, EUZIOIDEV, EUZIONODEV, EUZIONOMODLIST,
};
use crate::layout::{ZIO_MAX_EXT_ATTR, ZIO_MAX_STD_ATTR};
use crate::record::{
    BufferRecord, ChannelIo, ChannelRecord, CsetRecord, DeviceRecord, Direction, HeadRecord,
    ObjectType, TriggerRecord,
};
use crate::store::{BackingStore, ModuleKind};

/// Default location of the ZIO bus in sysfs.
pub const DEFAULT_SYS_ROOT: &str = "/sys/bus/zio";
/// Default location of the ZIO char devices.
pub const DEFAULT_DEV_ROOT: &str = "/dev/zio";

/// The native backend.
#[derive(Debug, Clone)]
pub struct SysfsStore {
    sys_root: PathBuf,
    dev_root: PathBuf,
}

impl Default for SysfsStore {
    fn default() -> Self {
        Self::new(DEFAULT_SYS_ROOT, DEFAULT_DEV_ROOT)
    }
}

impl SysfsStore {
    /// A store over explicit roots.
    pub fn new(sys_root: impl Into<PathBuf>, dev_root: impl Into<PathBuf>) -> Self {
        Self {
            sys_root: sys_root.into(),
            dev_root: dev_root.into(),
        }
    }

    /// Root of the ZIO bus.
    pub fn sys_root(&self) -> &Path {
        &self.sys_root
    }

    /// Directory of the char devices.
    pub fn dev_root(&self) -> &Path {
        &self.dev_root
    }

    fn devices_dir(&self) -> PathBuf {
        self.sys_root.join("devices")
    }

    fn open_path(&self, base: PathBuf) -> StoreResult<DeviceRecord> {
        // A symlinked base (the usual case on a live bus) is resolved first.
        let base = fs::canonicalize(&base).map_err(|_| StoreError::new(EUZIONODEV))?;
        if !base.is_dir() {
            return Err(StoreError::new(EUZIONODEV));
        }

        let head = self.scan_object(&base)?;
        if head.obj_type != ObjectType::Device {
            return Err(StoreError::new(EUZIOIDEV));
        }

        let mut cset = Vec::new();
        for path in sub_dirs(&base, "cset")? {
            cset.push(self.scan_cset(&path)?);
        }
        debug!(
            sysbase = %head.sysbase,
            devname = %head.devname,
            n_cset = cset.len(),
            "Scanned ZIO device"
        );
        Ok(DeviceRecord { head, cset })
    }

    fn scan_cset(&self, base: &Path) -> StoreResult<CsetRecord> {
        let direction_attr = path_string(&base.join("direction"));
        // A cset without a readable direction is an input cset.
        let direction = self
            .attr_string_get(&direction_attr)
            .map(|text| Direction::from_attr(&text))
            .unwrap_or_default();

        let head = self.scan_object(base)?;
        if head.obj_type != ObjectType::Cset {
            return Err(StoreError::new(EUZIOICSET));
        }

        let trigger_base = base.join("trigger");
        let trigger = TriggerRecord {
            head: scan_attributes(&trigger_base)?,
        };

        let mut chan = Vec::new();
        for path in sub_dirs(base, "chan")? {
            chan.push(self.scan_channel(&path, direction)?);
        }

        Ok(CsetRecord {
            head,
            direction,
            direction_attr,
            current_trigger: path_string(&base.join("current_trigger")),
            current_buffer: path_string(&base.join("current_buffer")),
            trigger,
            chan,
        })
    }

    fn scan_channel(&self, base: &Path, direction: Direction) -> StoreResult<ChannelRecord> {
        let head = self.scan_object(base)?;
        if head.obj_type != ObjectType::Channel {
            return Err(StoreError::new(EUZIOICHAN));
        }

        let buffer_base = base.join("buffer");
        let buffer = BufferRecord {
            head: scan_attributes(&buffer_base)?,
            flush: path_string(&buffer_base.join("flush")),
        };

        let data = self.open_chardev(&head.devname, "data", direction)?;
        let ctrl = self.open_chardev(&head.devname, "ctrl", direction)?;

        Ok(ChannelRecord {
            current_control: path_string(&base.join("current_control")),
            alarms: path_string(&base.join("alarms")),
            head,
            buffer,
            io: ChannelIo::new(direction, Box::new(data), Box::new(ctrl)),
        })
    }

    fn open_chardev(&self, devname: &str, kind: &str, direction: Direction) -> StoreResult<File> {
        let path = self.dev_root.join(format!("{devname}-{kind}"));
        trace!(path = %path.display(), %direction, "Opening char device");
        let file = match direction {
            Direction::Input => OpenOptions::new().read(true).open(&path)?,
            Direction::Output => OpenOptions::new().write(true).open(&path)?,
        };
        Ok(file)
    }

    /// Read the identity files of the object at `base` and list its attributes.
    fn scan_object(&self, base: &Path) -> StoreResult<HeadRecord> {
        let mut head = scan_attributes(base)?;
        head.enable = path_string(&base.join("enable"));
        head.name = self.attr_string_get(&path_string(&base.join("name")))?;
        head.devname = self.attr_string_get(&path_string(&base.join("devname")))?;
        let devtype = self.attr_string_get(&path_string(&base.join("devtype")))?;
        head.obj_type = ObjectType::from_type_name(&devtype);
        Ok(head)
    }

    fn device_list(&self) -> StoreResult<Vec<String>> {
        let entries = match fs::read_dir(self.devices_dir()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with("hw-") || !entry.path().is_dir() {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }
}

impl BackingStore for SysfsStore {
    fn open_by_name(&self, name: &str) -> StoreResult<DeviceRecord> {
        self.open_path(self.devices_dir().join(name))
    }

    fn open_by_id(&self, name: &str, dev_id: u32) -> StoreResult<DeviceRecord> {
        self.open_path(self.devices_dir().join(format!("{name}-0x{dev_id:04x}")))
    }

    fn close(&self, sysbase: &str) {
        trace!(sysbase, "Released ZIO device");
    }

    fn attr_raw_get(&self, path: &str, len: usize) -> StoreResult<Vec<u8>> {
        let file = File::open(path)?;
        let mut out = Vec::with_capacity(len.min(4096));
        file.take(len as u64).read_to_end(&mut out)?;
        Ok(out)
    }

    fn attr_raw_set(&self, path: &str, bytes: &[u8]) -> StoreResult<()> {
        let mut file = OpenOptions::new().write(true).truncate(true).open(path)?;
        file.write_all(bytes)?;
        Ok(())
    }

    fn attr_mode(&self, path: &str) -> StoreResult<u32> {
        let meta = fs::metadata(path)?;
        Ok(meta.permissions().mode() & 0o7777)
    }

    fn module_list(&self, kind: ModuleKind) -> StoreResult<Vec<String>> {
        let file = match kind {
            ModuleKind::Device => return self.device_list(),
            ModuleKind::Buffer => "available_buffers",
            ModuleKind::Trigger => "available_triggers",
        };
        let text = self
            .attr_string_get(&path_string(&self.sys_root.join(file)))
            .map_err(|_| StoreError::new(EUZIONOMODLIST))?;
        let names: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        if names.is_empty() {
            return Err(StoreError::new(EUZIONOMODLIST));
        }
        Ok(names)
    }
}

/// Head record named after its directory, with the attribute slots filled in.
fn scan_attributes(base: &Path) -> StoreResult<HeadRecord> {
    let mut head = HeadRecord {
        sysbase: path_string(base),
        name: base
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        ..Default::default()
    };
    for (slot, path) in head
        .std
        .iter_mut()
        .zip(files_in(&base.join("standard"), ZIO_MAX_STD_ATTR)?)
    {
        *slot = path;
    }
    for (slot, path) in head
        .ext
        .iter_mut()
        .zip(files_in(&base.join("extended"), ZIO_MAX_EXT_ATTR)?)
    {
        *slot = path;
    }
    Ok(head)
}

/// Sorted paths of the entries of `dir`, at most `cap`. A missing directory is empty.
fn files_in(dir: &Path, cap: usize) -> StoreResult<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut paths = entries
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    paths.sort();
    Ok(paths.iter().take(cap).map(|p| path_string(p)).collect())
}

/// Sorted sub-directories of `dir` whose name starts with `prefix`.
fn sub_dirs(dir: &Path, prefix: &str) -> StoreResult<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let matches = path
            .file_name()
            .map(|n| n.to_string_lossy().starts_with(prefix))
            .unwrap_or(false);
        if matches && path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
