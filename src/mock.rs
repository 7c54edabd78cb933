//! In-memory backend.
//!
//! [`MockStore`] implements [`BackingStore`] over a map of attribute files and
//! a set of registered devices, so the object model can be exercised without
//! a ZIO kernel. Channel streams are shared queues: blocks pushed with
//! [`MockStore::push_block`] are what the next `block_read` returns, and
//! blocks written by an output channel can be collected with
//! [`MockStore::take_written`].
//!
//! ```
//! use std::sync::Arc;
//! use rust_zio::mock::{MockCset, MockDevice, MockStore};
//! use rust_zio::Device;
//! use zio_sys::Direction;
//!
//! let store = Arc::new(MockStore::new());
//! store.add_device(MockDevice::new("zzero").with_cset(MockCset::new(Direction::Input, 2)));
//! let dev = Device::open(store, "zzero", None)?;
//! assert_eq!(dev.cset(0).map(|c| c.n_chan()), Some(2));
//! # Ok::<(), rust_zio::ZioError>(())
//! ```

use std::collections::{HashMap, VecDeque};
use std::io::{self, Read, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;
use zio_sys::errno::{EUZIONODEV, EUZIONOMODLIST};
use zio_sys::{
    BackingStore, BufferRecord, ChannelIo, ChannelRecord, ControlHeader, CsetRecord,
    DeviceRecord, Direction, HeadRecord, ModuleKind, ObjectType, StoreError, StoreResult,
    TriggerRecord, ZIO_MAX_EXT_ATTR, ZIO_MAX_STD_ATTR,
};

const SYS_DEVICES: &str = "/sys/bus/zio/devices";

/// One end of an in-memory channel stream.
///
/// Clones share the same queue. Reading an empty queue returns end-of-file.
#[derive(Clone, Default)]
pub struct MockStream {
    queue: Arc<Mutex<VecDeque<u8>>>,
}

impl MockStream {
    fn push(&self, bytes: &[u8]) {
        self.queue.lock().extend(bytes);
    }

    fn drain(&self) -> Vec<u8> {
        self.queue.lock().drain(..).collect()
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut queue = self.queue.lock();
        let n = buf.len().min(queue.len());
        for (dst, src) in buf.iter_mut().zip(queue.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.push(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Blueprint of a channel-set for [`MockDevice`].
#[derive(Debug, Clone)]
pub struct MockCset {
    direction: Direction,
    n_chan: usize,
    attrs: Vec<(String, u32)>,
    trigger_attrs: Vec<(String, u32)>,
    chan_attrs: Vec<(String, u32)>,
}

impl MockCset {
    /// A cset of `n_chan` channels, without attributes.
    pub fn new(direction: Direction, n_chan: usize) -> Self {
        Self {
            direction,
            n_chan,
            attrs: Vec::new(),
            trigger_attrs: Vec::new(),
            chan_attrs: Vec::new(),
        }
    }

    /// Standard attribute on the channel-set.
    pub fn with_attr(mut self, name: &str, value: u32) -> Self {
        self.attrs.push((name.to_string(), value));
        self
    }

    /// Standard attribute on the trigger.
    pub fn with_trigger_attr(mut self, name: &str, value: u32) -> Self {
        self.trigger_attrs.push((name.to_string(), value));
        self
    }

    /// Standard attribute on every channel.
    pub fn with_chan_attr(mut self, name: &str, value: u32) -> Self {
        self.chan_attrs.push((name.to_string(), value));
        self
    }
}

/// Blueprint of a device registered with [`MockStore::add_device`].
#[derive(Debug, Clone)]
pub struct MockDevice {
    name: String,
    id: Option<u32>,
    std_attrs: Vec<(String, u32)>,
    ext_attrs: Vec<(String, u32)>,
    csets: Vec<MockCset>,
}

impl MockDevice {
    /// A device registered under `name`, without channel-sets.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            id: None,
            std_attrs: Vec::new(),
            ext_attrs: Vec::new(),
            csets: Vec::new(),
        }
    }

    /// Register the device as the instance `name-0x<id>`.
    pub fn with_id(mut self, id: u32) -> Self {
        self.id = Some(id);
        self
    }

    /// Standard attribute on the device.
    pub fn with_attr(mut self, name: &str, value: u32) -> Self {
        self.std_attrs.push((name.to_string(), value));
        self
    }

    /// Extended attribute on the device.
    pub fn with_ext_attr(mut self, name: &str, value: u32) -> Self {
        self.ext_attrs.push((name.to_string(), value));
        self
    }

    /// Append a channel-set.
    pub fn with_cset(mut self, cset: MockCset) -> Self {
        self.csets.push(cset);
        self
    }

    fn key(&self) -> String {
        match self.id {
            Some(id) => format!("{}-0x{id:04x}", self.name),
            None => self.name.clone(),
        }
    }

    fn devname(&self) -> String {
        format!("{}-{:04x}", self.name, self.id.unwrap_or(0))
    }
}

struct MockFile {
    content: Vec<u8>,
    mode: u32,
}

struct Streams {
    data: MockStream,
    ctrl: MockStream,
}

#[derive(Default)]
struct MockState {
    files: HashMap<String, MockFile>,
    devices: HashMap<String, MockDevice>,
    streams: HashMap<String, Streams>,
    failures: HashMap<String, i32>,
    open_failure: Option<i32>,
    reads: HashMap<String, usize>,
    closed: Vec<String>,
    modules: HashMap<ModuleKind, Vec<String>>,
}

/// In-memory [`BackingStore`].
#[derive(Default)]
pub struct MockStore {
    state: Mutex<MockState>,
}

impl MockStore {
    /// An empty store with no devices.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace an attribute file (mode `0o644`).
    pub fn set_file(&self, path: &str, content: &str) {
        self.set_file_bytes(path, content.as_bytes().to_vec());
    }

    fn set_file_bytes(&self, path: &str, content: Vec<u8>) {
        let mut state = self.state.lock();
        let mode = state.files.get(path).map(|f| f.mode).unwrap_or(0o644);
        state
            .files
            .insert(path.to_string(), MockFile { content, mode });
    }

    /// Content of an attribute file as text.
    pub fn file(&self, path: &str) -> Option<String> {
        let state = self.state.lock();
        state
            .files
            .get(path)
            .map(|f| String::from_utf8_lossy(&f.content).into_owned())
    }

    /// Change the permission bits of an existing file.
    pub fn set_mode(&self, path: &str, mode: u32) {
        if let Some(file) = self.state.lock().files.get_mut(path) {
            file.mode = mode;
        }
    }

    /// Make every access to `path` fail with `code`.
    pub fn fail_path(&self, path: &str, code: i32) {
        self.state.lock().failures.insert(path.to_string(), code);
    }

    /// Undo [`fail_path`](Self::fail_path).
    pub fn clear_failure(&self, path: &str) {
        self.state.lock().failures.remove(path);
    }

    /// Make every open fail with `code`, or restore normal opens with `None`.
    pub fn fail_open(&self, code: Option<i32>) {
        self.state.lock().open_failure = code;
    }

    /// Number of reads served for `path`.
    pub fn read_count(&self, path: &str) -> usize {
        self.state.lock().reads.get(path).copied().unwrap_or(0)
    }

    /// Sysbases passed to `close`, in call order.
    pub fn closed(&self) -> Vec<String> {
        self.state.lock().closed.clone()
    }

    /// Publish a module list. An empty list reads as unavailable.
    pub fn set_modules(&self, kind: ModuleKind, names: &[&str]) {
        let names = names.iter().map(|n| n.to_string()).collect();
        self.state.lock().modules.insert(kind, names);
    }

    /// Queue one block on the channel whose devname is `chan`.
    pub fn push_block(&self, chan: &str, ctrl: &ControlHeader, data: &[u8]) {
        self.push_raw(chan, &ctrl.encode(), data);
    }

    /// Queue raw control and data bytes on a channel.
    pub fn push_raw(&self, chan: &str, ctrl: &[u8], data: &[u8]) {
        let state = self.state.lock();
        if let Some(streams) = state.streams.get(chan) {
            streams.ctrl.push(ctrl);
            streams.data.push(data);
        }
    }

    /// Drain the control and data bytes written to a channel.
    pub fn take_written(&self, chan: &str) -> (Vec<u8>, Vec<u8>) {
        let state = self.state.lock();
        match state.streams.get(chan) {
            Some(streams) => (streams.ctrl.drain(), streams.data.drain()),
            None => (Vec::new(), Vec::new()),
        }
    }

    /// Register a device and create all of its attribute files.
    pub fn add_device(&self, device: MockDevice) {
        let base = format!("{SYS_DEVICES}/{}", device.key());
        let devname = device.devname();
        self.add_object(&base, &device.name, &devname, ObjectType::Device);
        self.add_attrs(&base, "standard", &device.std_attrs);
        self.add_attrs(&base, "extended", &device.ext_attrs);

        for (i, cset) in device.csets.iter().enumerate() {
            let cset_base = format!("{base}/cset{i}");
            let cset_devname = format!("{devname}-{i}");
            self.add_object(&cset_base, &format!("cset{i}"), &cset_devname, ObjectType::Cset);
            self.add_attrs(&cset_base, "standard", &cset.attrs);
            self.add_attrs(&format!("{cset_base}/trigger"), "standard", &cset.trigger_attrs);
            self.set_file(&format!("{cset_base}/direction"), cset.direction.as_str());
            self.set_file(&format!("{cset_base}/current_trigger"), "user\n");
            self.set_file(&format!("{cset_base}/current_buffer"), "kmalloc\n");

            for j in 0..cset.n_chan {
                let chan_base = format!("{cset_base}/chan{j}");
                let chan_devname = format!("{cset_devname}-{j}");
                self.add_object(&chan_base, &format!("chan{j}"), &chan_devname, ObjectType::Channel);
                self.add_attrs(&chan_base, "standard", &cset.chan_attrs);
                self.set_file(&format!("{chan_base}/alarms"), "0 0\n");
                self.set_file(&format!("{chan_base}/buffer/flush"), "");

                let mut ctrl = ControlHeader::default();
                ctrl.addr.cset = i as u16;
                ctrl.addr.chan = j as u16;
                ctrl.addr.dev_id = device.id.unwrap_or(0);
                ctrl.addr.set_devname(&device.name);
                self.set_file_bytes(&format!("{chan_base}/current_control"), ctrl.encode());

                self.state.lock().streams.insert(
                    chan_devname,
                    Streams {
                        data: MockStream::default(),
                        ctrl: MockStream::default(),
                    },
                );
            }
        }
        self.state.lock().devices.insert(device.key(), device);
    }

    fn add_object(&self, base: &str, name: &str, devname: &str, obj_type: ObjectType) {
        self.set_file(&format!("{base}/name"), &format!("{name}\n"));
        self.set_file(&format!("{base}/devname"), &format!("{devname}\n"));
        self.set_file(&format!("{base}/devtype"), &format!("{}\n", obj_type.type_name()));
        self.set_file(&format!("{base}/enable"), "1\n");
    }

    fn add_attrs(&self, base: &str, group: &str, attrs: &[(String, u32)]) {
        for (name, value) in attrs {
            self.set_file(&format!("{base}/{group}/{name}"), &format!("{value}\n"));
        }
    }

    fn check(&self, path: &str) -> StoreResult<()> {
        match self.state.lock().failures.get(path) {
            Some(&code) => Err(StoreError::new(code)),
            None => Ok(()),
        }
    }

    fn open_key(&self, key: &str) -> StoreResult<DeviceRecord> {
        let device = {
            let state = self.state.lock();
            if let Some(code) = state.open_failure {
                return Err(StoreError::new(code));
            }
            state
                .devices
                .get(key)
                .cloned()
                .ok_or_else(|| StoreError::new(EUZIONODEV))?
        };
        trace!(device = key, "Opening mock device");

        let base = format!("{SYS_DEVICES}/{key}");
        let devname = device.devname();
        let head = self.head(&base, &device.name, &devname, ObjectType::Device, &device.std_attrs, &device.ext_attrs);

        let mut cset = Vec::with_capacity(device.csets.len());
        for (i, blueprint) in device.csets.iter().enumerate() {
            let cset_base = format!("{base}/cset{i}");
            let cset_devname = format!("{devname}-{i}");
            let trigger_base = format!("{cset_base}/trigger");

            let mut chan = Vec::with_capacity(blueprint.n_chan);
            for j in 0..blueprint.n_chan {
                let chan_base = format!("{cset_base}/chan{j}");
                let chan_devname = format!("{cset_devname}-{j}");
                let buffer_base = format!("{chan_base}/buffer");
                let io = {
                    let state = self.state.lock();
                    let streams = state
                        .streams
                        .get(&chan_devname)
                        .ok_or_else(|| StoreError::new(libc::ENOENT))?;
                    ChannelIo::new(
                        blueprint.direction,
                        Box::new(streams.data.clone()),
                        Box::new(streams.ctrl.clone()),
                    )
                };
                chan.push(ChannelRecord {
                    head: self.head(&chan_base, &format!("chan{j}"), &chan_devname, ObjectType::Channel, &blueprint.chan_attrs, &[]),
                    current_control: format!("{chan_base}/current_control"),
                    alarms: format!("{chan_base}/alarms"),
                    buffer: BufferRecord {
                        head: self.head(&buffer_base, "buffer", "", ObjectType::Buffer, &[], &[]),
                        flush: format!("{buffer_base}/flush"),
                    },
                    io,
                });
            }

            cset.push(CsetRecord {
                head: self.head(&cset_base, &format!("cset{i}"), &cset_devname, ObjectType::Cset, &blueprint.attrs, &[]),
                direction: blueprint.direction,
                direction_attr: format!("{cset_base}/direction"),
                current_trigger: format!("{cset_base}/current_trigger"),
                current_buffer: format!("{cset_base}/current_buffer"),
                trigger: TriggerRecord {
                    head: self.head(&trigger_base, "trigger", "", ObjectType::Trigger, &blueprint.trigger_attrs, &[]),
                },
                chan,
            });
        }
        Ok(DeviceRecord { head, cset })
    }

    fn head(
        &self,
        base: &str,
        name: &str,
        devname: &str,
        obj_type: ObjectType,
        std: &[(String, u32)],
        ext: &[(String, u32)],
    ) -> HeadRecord {
        let mut head = HeadRecord {
            sysbase: base.to_string(),
            name: name.to_string(),
            devname: devname.to_string(),
            obj_type,
            enable: format!("{base}/enable"),
            ..Default::default()
        };
        for (slot, (attr, _)) in head.std.iter_mut().zip(std.iter().take(ZIO_MAX_STD_ATTR)) {
            *slot = format!("{base}/standard/{attr}");
        }
        for (slot, (attr, _)) in head.ext.iter_mut().zip(ext.iter().take(ZIO_MAX_EXT_ATTR)) {
            *slot = format!("{base}/extended/{attr}");
        }
        head
    }
}

impl BackingStore for MockStore {
    fn open_by_name(&self, name: &str) -> StoreResult<DeviceRecord> {
        self.open_key(name)
    }

    fn open_by_id(&self, name: &str, dev_id: u32) -> StoreResult<DeviceRecord> {
        self.open_key(&format!("{name}-0x{dev_id:04x}"))
    }

    fn close(&self, sysbase: &str) {
        self.state.lock().closed.push(sysbase.to_string());
    }

    fn attr_raw_get(&self, path: &str, len: usize) -> StoreResult<Vec<u8>> {
        self.check(path)?;
        let mut state = self.state.lock();
        let content = match state.files.get(path) {
            Some(file) => file.content.iter().take(len).copied().collect(),
            None => return Err(StoreError::new(libc::ENOENT)),
        };
        *state.reads.entry(path.to_string()).or_default() += 1;
        Ok(content)
    }

    fn attr_raw_set(&self, path: &str, bytes: &[u8]) -> StoreResult<()> {
        self.check(path)?;
        let mut state = self.state.lock();
        match state.files.get_mut(path) {
            Some(file) => {
                file.content = bytes.to_vec();
                Ok(())
            }
            None => Err(StoreError::new(libc::ENOENT)),
        }
    }

    fn attr_mode(&self, path: &str) -> StoreResult<u32> {
        self.check(path)?;
        let state = self.state.lock();
        state
            .files
            .get(path)
            .map(|f| f.mode)
            .ok_or_else(|| StoreError::new(libc::ENOENT))
    }

    fn module_list(&self, kind: ModuleKind) -> StoreResult<Vec<String>> {
        let state = self.state.lock();
        if kind == ModuleKind::Device {
            let mut names: Vec<String> = state
                .devices
                .keys()
                .filter(|k| !k.starts_with("hw-"))
                .cloned()
                .collect();
            names.sort();
            return Ok(names);
        }
        match state.modules.get(&kind) {
            Some(names) if !names.is_empty() => Ok(names.clone()),
            _ => Err(StoreError::new(EUZIONOMODLIST)),
        }
    }
}
