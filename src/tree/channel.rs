use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;
use zio_sys::{Alarms, ChannelIo, ChannelRecord, ControlHeader, Direction, StoreError};

use crate::attribute::{Attribute, StoreHandle};
use crate::decoder::{decode_block, Block};
use crate::error::{Result, ZioError};
use crate::node::ResourceNode;

use super::Buffer;

/// One channel with its buffer and open data/control streams.
///
/// Block operations on the same channel are serialized by an internal lock;
/// different channels never contend.
pub struct Channel {
    node: ResourceNode,
    buffer: Buffer,
    current_control: Attribute,
    alarms: Attribute,
    direction: Direction,
    io: Mutex<ChannelIo>,
    handle: Arc<StoreHandle>,
}

impl Channel {
    pub(crate) fn from_record(record: ChannelRecord, handle: &Arc<StoreHandle>) -> Self {
        Self {
            node: ResourceNode::from_head(&record.head, handle),
            buffer: Buffer::from_record(&record.buffer, handle),
            current_control: Attribute::new(record.current_control, handle.clone()),
            alarms: Attribute::new(record.alarms, handle.clone()),
            direction: record.io.direction,
            io: Mutex::new(record.io),
            handle: handle.clone(),
        }
    }

    /// Name, attributes and enable switch of the channel.
    pub fn node(&self) -> &ResourceNode {
        &self.node
    }

    /// The channel buffer.
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    /// Direction of the owning channel-set.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Read and decode the next block.
    ///
    /// Blocks until the backend delivers one.
    pub fn block_read(&self) -> Result<Block> {
        let store = self.handle.store()?;
        let raw = {
            let mut io = self.io.lock();
            store.block_read(&mut io)
        }
        .map_err(|e| ZioError::ReadFailure {
            context: format!("Cannot read block on channel '{:#}'", self.node),
            strerror: e.strerror(),
        })?;

        let block = decode_block(&raw)?;
        debug!(
            channel = %self.node.devname(),
            seq = block.ctrl.seq_num,
            nsamples = block.ctrl.nsamples,
            ssize = block.ctrl.ssize,
            "Read block"
        );
        Ok(block)
    }

    /// Encode and write a block on an output channel.
    pub fn block_write(&self, block: &Block) -> Result<()> {
        let store = self.handle.store()?;
        let ctrl = block.ctrl.encode();
        let data = block.payload();
        let written = {
            let mut io = self.io.lock();
            store.block_write(&mut io, &ctrl, &data)
        };
        written.map_err(|e| ZioError::WriteFailure {
            context: format!("Cannot write block on channel '{:#}'", self.node),
            strerror: e.strerror(),
        })?;
        debug!(
            channel = %self.node.devname(),
            seq = block.ctrl.seq_num,
            bytes = data.len(),
            "Wrote block"
        );
        Ok(())
    }

    /// The control record the channel would attach to its next block.
    pub fn current_control(&self) -> Result<ControlHeader> {
        let store = self.handle.store()?;
        store
            .ctrl_get(self.current_control.path())
            .map_err(|e| ZioError::io(self.current_control.path(), e))
    }

    /// Alarms currently raised on the channel.
    ///
    /// The attribute holds the framework and driver alarm bytes as two decimals.
    pub fn alarms(&self) -> Result<ChannelAlarms> {
        let text = self.alarms.read_text()?;
        let mut fields = text.split_whitespace().map(str::parse::<u8>);
        match (fields.next(), fields.next()) {
            (Some(Ok(zio)), driver) => Ok(ChannelAlarms {
                zio: Alarms::from_bits_retain(zio),
                driver: driver.and_then(|d| d.ok()).unwrap_or(0),
            }),
            _ => Err(ZioError::io(
                self.alarms.path(),
                StoreError::new(libc::EINVAL),
            )),
        }
    }

    /// Clear the given framework and driver alarm bits.
    pub fn clear_alarms(&self, alarms: ChannelAlarms) -> Result<()> {
        self.alarms
            .write_text(&format!("{} {}", alarms.zio.bits(), alarms.driver))
    }
}

/// Alarm state of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelAlarms {
    /// Framework alarms.
    pub zio: Alarms,
    /// Driver-specific alarm bits.
    pub driver: u8,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.node, f)
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("node", &self.node)
            .field("direction", &self.direction)
            .finish_non_exhaustive()
    }
}
