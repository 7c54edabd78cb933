use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};
use zio_sys::{BackingStore, DeviceRecord, StoreError};

use crate::attribute::StoreHandle;
use crate::error::{Result, ZioError};
use crate::node::ResourceNode;

use super::ChannelSet;

/// An open ZIO device and its whole object tree.
///
/// The device owns every channel-set, channel, buffer and trigger below it.
/// Closing it (explicitly or on drop) releases the channel streams and the
/// backend handle exactly once; [`Attribute`](crate::Attribute) clones that
/// outlive the device report [`ZioError::DeviceClosed`].
pub struct Device {
    node: ResourceNode,
    csets: Vec<ChannelSet>,
    id: Option<u32>,
    handle: Arc<StoreHandle>,
}

impl Device {
    /// Open `name`, or the instance `name-0x<id>` when `id` is given.
    ///
    /// Either the full tree is returned or nothing is.
    pub fn open(store: Arc<dyn BackingStore>, name: &str, id: Option<u32>) -> Result<Self> {
        if name.is_empty() {
            return Err(ZioError::OpenFailure {
                name: name.to_string(),
                id,
                strerror: StoreError::new(libc::EINVAL).strerror(),
            });
        }

        let opened = match id {
            Some(dev_id) => store.open_by_id(name, dev_id),
            None => store.open_by_name(name),
        };
        let record = opened.map_err(|e| ZioError::OpenFailure {
            name: name.to_string(),
            id,
            strerror: e.strerror(),
        })?;

        let handle = StoreHandle::new(store, record.head.sysbase.clone());
        let device = Self::from_record(record, id, handle);
        info!(
            device = %device.node.devname(),
            sysbase = %device.node.sysbase(),
            n_cset = device.n_cset(),
            "Opened ZIO device"
        );
        Ok(device)
    }

    fn from_record(record: DeviceRecord, id: Option<u32>, handle: Arc<StoreHandle>) -> Self {
        let node = ResourceNode::from_head(&record.head, &handle);
        let csets = record
            .cset
            .into_iter()
            .map(|cset| ChannelSet::from_record(cset, &handle))
            .collect();
        Self {
            node,
            csets,
            id,
            handle,
        }
    }

    /// Name, attributes and enable switch of the device.
    pub fn node(&self) -> &ResourceNode {
        &self.node
    }

    /// The id the device was opened with, if any.
    pub fn id(&self) -> Option<u32> {
        self.id
    }

    /// Number of channel-sets.
    pub fn n_cset(&self) -> usize {
        self.csets.len()
    }

    /// Channel-sets in index order.
    pub fn csets(&self) -> &[ChannelSet] {
        &self.csets
    }

    /// Channel-set `index`, if present.
    pub fn cset(&self, index: usize) -> Option<&ChannelSet> {
        self.csets.get(index)
    }

    /// True once the device has been torn down.
    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    /// Close the device now instead of at drop.
    pub fn close(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if !self.handle.mark_closed() {
            warn!(device = %self.node.sysbase(), "Device already closed");
            return;
        }
        debug!(device = %self.node.sysbase(), "Closing ZIO device");
        self.csets.clear();
        self.handle.raw_store().close(self.handle.sysbase());
        info!(device = %self.node.devname(), "Closed ZIO device");
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if !self.handle.is_closed() {
            self.teardown();
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.node, f)
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("node", &self.node)
            .field("id", &self.id)
            .field("n_cset", &self.csets.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
