use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};
use zio_sys::{CsetRecord, Direction};

use crate::attribute::{Attribute, StoreHandle};
use crate::decoder::Block;
use crate::error::{Result, ZioError};
use crate::node::ResourceNode;

use super::{Channel, Trigger};

/// A group of channels sharing one trigger.
#[derive(Debug)]
pub struct ChannelSet {
    node: ResourceNode,
    trigger: Trigger,
    channels: Vec<Channel>,
    direction: Direction,
    current_trigger: Attribute,
    current_buffer: Attribute,
}

impl ChannelSet {
    pub(crate) fn from_record(record: CsetRecord, handle: &Arc<StoreHandle>) -> Self {
        let node = ResourceNode::from_head(&record.head, handle);
        let trigger = Trigger::from_record(&record.trigger, handle);
        let channels: Vec<Channel> = record
            .chan
            .into_iter()
            .map(|chan| Channel::from_record(chan, handle))
            .collect();
        debug!(
            cset = %node.devname(),
            direction = %record.direction,
            n_chan = channels.len(),
            "Built channel-set"
        );
        Self {
            node,
            trigger,
            channels,
            direction: record.direction,
            current_trigger: Attribute::new(record.current_trigger, handle.clone()),
            current_buffer: Attribute::new(record.current_buffer, handle.clone()),
        }
    }

    /// Name, attributes and enable switch of the channel-set.
    pub fn node(&self) -> &ResourceNode {
        &self.node
    }

    /// The trigger shared by every channel.
    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    /// Whether the channels acquire or emit blocks.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Number of channels.
    pub fn n_chan(&self) -> usize {
        self.channels.len()
    }

    /// Channels in index order.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Channel `index`, if present.
    pub fn channel(&self, index: usize) -> Option<&Channel> {
        self.channels.get(index)
    }

    /// Read one block from every channel, in index order.
    ///
    /// Stops at the first failing channel; blocks already read are dropped.
    pub fn block_read_all(&self) -> Result<Vec<Block>> {
        self.channels.iter().map(Channel::block_read).collect()
    }

    /// Flush the buffer of every channel.
    ///
    /// Every channel is attempted; the last failure, if any, is returned.
    pub fn flush_all(&self) -> Result<()> {
        let mut last: Option<ZioError> = None;
        for chan in &self.channels {
            if let Err(e) = chan.buffer().flush() {
                warn!(channel = %chan.node().devname(), error = %e, "Buffer flush failed");
                last = Some(e);
            }
        }
        match last {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Name of the trigger type currently in use.
    pub fn current_trigger(&self) -> Result<String> {
        self.current_trigger.read_text()
    }

    /// Replace the trigger with an instance of `name`.
    pub fn change_trigger(&self, name: &str) -> Result<()> {
        self.current_trigger.write_text(name)
    }

    /// Name of the buffer type currently in use.
    pub fn current_buffer(&self) -> Result<String> {
        self.current_buffer.read_text()
    }

    /// Replace every channel's buffer with an instance of `name`.
    pub fn change_buffer(&self, name: &str) -> Result<()> {
        self.current_buffer.write_text(name)
    }
}

impl fmt::Display for ChannelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.node, f)
    }
}
