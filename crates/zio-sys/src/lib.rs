//! Low-level interface to the Linux ZIO framework.
//!
//! ZIO exposes every device as a tree of sysfs objects (device, channel-sets,
//! channels, buffers, triggers) plus a pair of char devices per channel that
//! carry acquisition blocks: a fixed 512-byte control record followed by the
//! sample payload.
//!
//! This crate holds the parts of that contract that are pure data or raw I/O:
//!
//! - [`layout`] - bit-exact encode/decode of the control record
//! - [`errno`] - OS-style error codes and their string rendering
//! - [`record`] - the records produced when a device is opened
//! - [`store`] - the [`BackingStore`] trait every backend implements
//! - [`sysfs`] - [`SysfsStore`], the backend over sysfs and `/dev/zio`
//!
//! For the safe object model built on top of these records, use the
//! `rust_zio` crate instead.
//!
//! # Example
//!
//! ```no_run
//! use zio_sys::{BackingStore, SysfsStore};
//!
//! let store = SysfsStore::default();
//! let record = store.open_by_name("zzero")?;
//! println!("{} has {} channel-sets", record.head.devname, record.n_cset());
//! # Ok::<(), zio_sys::StoreError>(())
//! ```

pub mod errno;
pub mod layout;
pub mod record;
pub mod store;
pub mod sysfs;

pub use errno::{strerror, StoreError, StoreResult};
pub use layout::{
    Address, Alarms, ControlFlags, ControlHeader, CtrlAttrTable, LayoutError, Timestamp, Tlv,
    ZIO_CONTROL_SIZE, ZIO_MAX_EXT_ATTR, ZIO_MAX_STD_ATTR, ZIO_TLV_SIZE,
};
pub use record::{
    BufferRecord, ChannelIo, ChannelRecord, ChannelStream, CsetRecord, DeviceRecord, Direction,
    HeadRecord, ObjectType, RawBlock, TriggerRecord,
};
pub use store::{BackingStore, ModuleKind};
pub use sysfs::SysfsStore;
