//! Records produced when a device is opened.
//!
//! A [`DeviceRecord`] is the plain-data image of one ZIO device: every object
//! in its tree with the paths of its attribute files, plus the open channel
//! streams. Higher layers wrap these records into live objects.

use std::fmt;
use std::io::{Read, Write};

use crate::errno::{StoreError, StoreResult, EUZIOBLKCTRLWRONG, EUZIOBLKDIRECTION};
use crate::layout::{ZIO_CONTROL_SIZE, ZIO_MAX_EXT_ATTR, ZIO_MAX_STD_ATTR};

/// Kind of a ZIO object, taken from its `devtype` file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ObjectType {
    /// `zio_zdev_type`
    Device,
    /// `zio_cset_type`
    Cset,
    /// `zio_chan_type`
    Channel,
    /// `zio_ti_type`
    Trigger,
    /// `zio_bi_type`
    Buffer,
    /// Any other or missing `devtype`
    #[default]
    Unknown,
}

impl ObjectType {
    /// Map a `devtype` string to a kind.
    pub fn from_type_name(name: &str) -> Self {
        match name.trim() {
            "zio_zdev_type" => Self::Device,
            "zio_cset_type" => Self::Cset,
            "zio_chan_type" => Self::Channel,
            "zio_ti_type" => Self::Trigger,
            "zio_bi_type" => Self::Buffer,
            _ => Self::Unknown,
        }
    }

    /// The `devtype` string for this kind.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Device => "zio_zdev_type",
            Self::Cset => "zio_cset_type",
            Self::Channel => "zio_chan_type",
            Self::Trigger => "zio_ti_type",
            Self::Buffer => "zio_bi_type",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Data direction of a channel-set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    /// Blocks flow from the device to user space.
    #[default]
    Input,
    /// Blocks flow from user space to the device.
    Output,
}

impl Direction {
    /// Parse the content of a `direction` attribute.
    pub fn from_attr(text: &str) -> Self {
        if text.trim() == "output" {
            Self::Output
        } else {
            Self::Input
        }
    }

    /// Text as stored in the `direction` attribute.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields shared by every object.
///
/// Attribute fields hold absolute paths; an empty string marks an absent slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadRecord {
    /// Directory of the object.
    pub sysbase: String,
    /// Short name.
    pub name: String,
    /// Device-qualified name; for channels also the char-device stem.
    pub devname: String,
    /// Kind of object.
    pub obj_type: ObjectType,
    /// Path of the `enable` attribute.
    pub enable: String,
    /// Standard attribute paths, in slot order.
    pub std: [String; ZIO_MAX_STD_ATTR],
    /// Extended attribute paths, in slot order.
    pub ext: [String; ZIO_MAX_EXT_ATTR],
}

impl Default for HeadRecord {
    fn default() -> Self {
        Self {
            sysbase: String::new(),
            name: String::new(),
            devname: String::new(),
            obj_type: ObjectType::Unknown,
            enable: String::new(),
            std: std::array::from_fn(|_| String::new()),
            ext: std::array::from_fn(|_| String::new()),
        }
    }
}

/// The buffer of a channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferRecord {
    /// Buffer identity and attributes.
    pub head: HeadRecord,
    /// Path of the `flush` attribute.
    pub flush: String,
}

/// The trigger of a channel-set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerRecord {
    /// Trigger identity and attributes.
    pub head: HeadRecord,
}

/// Byte stream behind a channel char device.
pub trait ChannelStream: Read + Write + Send {}

impl<T: Read + Write + Send> ChannelStream for T {}

/// Raw bytes of one block as read from the char devices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawBlock {
    /// Control record bytes.
    pub ctrl: Vec<u8>,
    /// Payload bytes.
    pub data: Vec<u8>,
}

/// The open data and control streams of a channel.
pub struct ChannelIo {
    /// Direction of the owning channel-set.
    pub direction: Direction,
    /// The `-data` char device.
    pub data: Box<dyn ChannelStream>,
    /// The `-ctrl` char device.
    pub ctrl: Box<dyn ChannelStream>,
}

impl fmt::Debug for ChannelIo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelIo")
            .field("direction", &self.direction)
            .finish_non_exhaustive()
    }
}

impl ChannelIo {
    /// Bundle the streams of one channel.
    pub fn new(
        direction: Direction,
        data: Box<dyn ChannelStream>,
        ctrl: Box<dyn ChannelStream>,
    ) -> Self {
        Self {
            direction,
            data,
            ctrl,
        }
    }

    /// Read the next block: the control record, then the payload it announces.
    ///
    /// A control record with a sample size other than 1, 2, 4 or 8 bytes is
    /// rejected before any payload is read. A payload shorter than announced
    /// is returned as-is.
    pub fn read_block(&mut self) -> StoreResult<RawBlock> {
        if self.direction != Direction::Input {
            return Err(StoreError::new(EUZIOBLKDIRECTION));
        }

        let mut ctrl = Vec::with_capacity(ZIO_CONTROL_SIZE);
        (&mut self.ctrl)
            .take(ZIO_CONTROL_SIZE as u64)
            .read_to_end(&mut ctrl)?;
        if ctrl.len() != ZIO_CONTROL_SIZE {
            return Err(StoreError::new(EUZIOBLKCTRLWRONG));
        }

        let nsamples = u64::from(u32::from_le_bytes([ctrl[8], ctrl[9], ctrl[10], ctrl[11]]));
        let ssize = u16::from_le_bytes([ctrl[12], ctrl[13]]);
        if !matches!(ssize, 1 | 2 | 4 | 8) {
            return Err(StoreError::new(EUZIOBLKCTRLWRONG));
        }

        // The header is untrusted: the buffer grows with the bytes actually read.
        let mut data = Vec::new();
        (&mut self.data)
            .take(nsamples * u64::from(ssize))
            .read_to_end(&mut data)?;
        Ok(RawBlock { ctrl, data })
    }

    /// Write a block: the control record, then the payload.
    pub fn write_block(&mut self, ctrl: &[u8], data: &[u8]) -> StoreResult<()> {
        if self.direction != Direction::Output {
            return Err(StoreError::new(EUZIOBLKDIRECTION));
        }
        if ctrl.len() < ZIO_CONTROL_SIZE {
            return Err(StoreError::new(EUZIOBLKCTRLWRONG));
        }
        self.ctrl.write_all(ctrl)?;
        self.ctrl.flush()?;
        self.data.write_all(data)?;
        self.data.flush()?;
        Ok(())
    }
}

/// A channel with its buffer and open streams.
#[derive(Debug)]
pub struct ChannelRecord {
    /// Channel identity and attributes.
    pub head: HeadRecord,
    /// Path of the `current_control` attribute.
    pub current_control: String,
    /// Path of the `alarms` attribute.
    pub alarms: String,
    /// The channel buffer.
    pub buffer: BufferRecord,
    /// Open char devices.
    pub io: ChannelIo,
}

/// A channel-set with its trigger and channels.
#[derive(Debug)]
pub struct CsetRecord {
    /// Channel-set identity and attributes.
    pub head: HeadRecord,
    /// Parsed content of the `direction` attribute.
    pub direction: Direction,
    /// Path of the `direction` attribute.
    pub direction_attr: String,
    /// Path of the `current_trigger` attribute.
    pub current_trigger: String,
    /// Path of the `current_buffer` attribute.
    pub current_buffer: String,
    /// The trigger instance.
    pub trigger: TriggerRecord,
    /// Channels in index order.
    pub chan: Vec<ChannelRecord>,
}

impl CsetRecord {
    /// Number of channels.
    pub fn n_chan(&self) -> usize {
        self.chan.len()
    }
}

/// An opened device and its whole tree.
#[derive(Debug)]
pub struct DeviceRecord {
    /// Device identity and attributes.
    pub head: HeadRecord,
    /// Channel-sets in index order.
    pub cset: Vec<CsetRecord>,
}

impl DeviceRecord {
    /// Number of channel-sets.
    pub fn n_cset(&self) -> usize {
        self.cset.len()
    }
}
