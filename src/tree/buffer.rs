use std::fmt;
use std::sync::Arc;

use tracing::debug;
use zio_sys::BufferRecord;

use crate::attribute::{Attribute, StoreHandle};
use crate::error::Result;
use crate::node::ResourceNode;

/// The buffer instance of a channel.
#[derive(Debug)]
pub struct Buffer {
    node: ResourceNode,
    flush: Attribute,
}

impl Buffer {
    pub(crate) fn from_record(record: &BufferRecord, handle: &Arc<StoreHandle>) -> Self {
        Self {
            node: ResourceNode::from_head(&record.head, handle),
            flush: Attribute::new(record.flush.clone(), handle.clone()),
        }
    }

    /// Name and attributes of the buffer.
    pub fn node(&self) -> &ResourceNode {
        &self.node
    }

    /// Drop every block currently stored in the buffer.
    pub fn flush(&self) -> Result<()> {
        self.flush.write_text("1")?;
        debug!(buffer = %self.node.sysbase(), "Flushed buffer");
        Ok(())
    }
}

impl fmt::Display for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.node, f)
    }
}
