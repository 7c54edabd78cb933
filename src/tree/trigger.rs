use std::fmt;
use std::sync::Arc;

use zio_sys::TriggerRecord;

use crate::attribute::StoreHandle;
use crate::node::ResourceNode;

/// The trigger instance of a channel-set.
#[derive(Debug)]
pub struct Trigger {
    node: ResourceNode,
}

impl Trigger {
    pub(crate) fn from_record(record: &TriggerRecord, handle: &Arc<StoreHandle>) -> Self {
        Self {
            node: ResourceNode::from_head(&record.head, handle),
        }
    }

    /// Name and attributes of the trigger.
    pub fn node(&self) -> &ResourceNode {
        &self.node
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.node, f)
    }
}
