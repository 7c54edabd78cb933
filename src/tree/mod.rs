//! The device tree.
//!
//! ```text
//! Device
//! └── ChannelSet (n_cset)
//!     ├── Trigger
//!     └── Channel (n_chan)
//!         └── Buffer
//! ```
//!
//! Every object wraps one [`ResourceNode`](crate::node::ResourceNode) and owns
//! its children exclusively. Channels hold the open data and control streams
//! for as long as the device is open.

mod buffer;
mod channel;
mod cset;
mod device;
mod trigger;

pub use buffer::Buffer;
pub use channel::{Channel, ChannelAlarms};
pub use cset::ChannelSet;
pub use device::Device;
pub use trigger::Trigger;
