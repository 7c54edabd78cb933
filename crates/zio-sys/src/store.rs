//! The backend seam.
//!
//! A [`BackingStore`] knows how to turn a device name into a [`DeviceRecord`],
//! how to read and write attribute files, and how to list installed modules.
//! [`SysfsStore`](crate::SysfsStore) talks to the kernel; tests use an
//! in-memory implementation.

use tracing::trace;

use crate::errno::{StoreError, StoreResult};
use crate::layout::{ControlHeader, ZIO_CONTROL_SIZE};
use crate::record::{ChannelIo, DeviceRecord, RawBlock};

/// Read size used for textual attributes.
pub const ATTR_READ_LEN: usize = 4096;

/// Kinds of module list the framework publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    /// `available_buffers`
    Buffer,
    /// `available_triggers`
    Trigger,
    /// Directories under `devices/`
    Device,
}

impl ModuleKind {
    /// Name used in messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buffer => "buffer",
            Self::Trigger => "trigger",
            Self::Device => "device",
        }
    }
}

/// Access to a ZIO backend.
///
/// Errors carry the numeric code of the failed operation, see
/// [`errno`](crate::errno).
pub trait BackingStore: Send + Sync {
    /// Open the device whose sysfs directory is called `name`.
    fn open_by_name(&self, name: &str) -> StoreResult<DeviceRecord>;

    /// Open the device instance `name-0x<id>`.
    fn open_by_id(&self, name: &str, dev_id: u32) -> StoreResult<DeviceRecord>;

    /// Release backend resources tied to the device at `sysbase`.
    ///
    /// Channel streams are owned by the records and close when those drop.
    fn close(&self, sysbase: &str);

    /// Read up to `len` raw bytes from an attribute file.
    fn attr_raw_get(&self, path: &str, len: usize) -> StoreResult<Vec<u8>>;

    /// Replace the content of an attribute file.
    fn attr_raw_set(&self, path: &str, bytes: &[u8]) -> StoreResult<()>;

    /// Permission bits of an attribute file.
    fn attr_mode(&self, path: &str) -> StoreResult<u32>;

    /// Names of the installed modules of `kind`.
    fn module_list(&self, kind: ModuleKind) -> StoreResult<Vec<String>>;

    /// Attribute content as text, without the trailing newline.
    fn attr_string_get(&self, path: &str) -> StoreResult<String> {
        let raw = self.attr_raw_get(path, ATTR_READ_LEN)?;
        let text = String::from_utf8_lossy(&raw);
        Ok(text.trim_end_matches('\n').to_string())
    }

    /// Replace the attribute with `value`.
    fn attr_string_set(&self, path: &str, value: &str) -> StoreResult<()> {
        self.attr_raw_set(path, value.as_bytes())
    }

    /// Attribute content parsed as an unsigned decimal.
    fn attr_value_get(&self, path: &str) -> StoreResult<u32> {
        let text = self.attr_string_get(path)?;
        text.trim().parse::<u32>().map_err(|_| {
            trace!(path, value = %text, "attribute is not a decimal value");
            StoreError::new(libc::EINVAL)
        })
    }

    /// Write `value` as decimal text.
    fn attr_value_set(&self, path: &str, value: u32) -> StoreResult<()> {
        self.attr_string_set(path, &value.to_string())
    }

    /// Read one block from an input channel.
    fn block_read(&self, io: &mut ChannelIo) -> StoreResult<RawBlock> {
        io.read_block()
    }

    /// Write one block to an output channel.
    fn block_write(&self, io: &mut ChannelIo, ctrl: &[u8], data: &[u8]) -> StoreResult<()> {
        io.write_block(ctrl, data)
    }

    /// Read and decode a channel's `current_control` attribute.
    fn ctrl_get(&self, path: &str) -> StoreResult<ControlHeader> {
        let raw = self.attr_raw_get(path, ZIO_CONTROL_SIZE)?;
        ControlHeader::decode(&raw)
            .map_err(|_| StoreError::new(crate::errno::EUZIOBLKCTRLWRONG))
    }
}
