//! # Rust ZIO
//!
//! Safe user-space model of Linux ZIO data-acquisition devices. A device is
//! opened through a [`BackingStore`](zio_sys::BackingStore), which yields the
//! full object tree; attributes are read and written live, and blocks read from
//! channels are decoded into typed sample vectors.
//!
//! ## Crate Structure
//!
//! - **`attribute`**: [`Attribute`], a live handle to one value file.
//! - **`node`**: [`ResourceNode`], the enable switch and attribute list every object carries.
//! - **`tree`**: [`Device`], [`ChannelSet`], [`Channel`], [`Buffer`] and [`Trigger`].
//! - **`decoder`**: control header and sample payload decoding into [`Block`]s.
//! - **`session`**: [`DeviceSession`], scoped ownership of one open device.
//! - **`acquisition`**: repeated block reads with a cooperative stop flag.
//! - **`listing`**: names of installed buffers, triggers and devices.
//! - **`mock`**: an in-memory backend for tests and demos.
//! - **`config`** / **`tracing_setup`**: Figment configuration and subscriber setup.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rust_zio::{config::ZioConfig, DeviceSession};
//!
//! let config = ZioConfig::load()?;
//! let session = DeviceSession::open(Arc::new(config.sysfs_store()), "wr-nic", None)?;
//! for cset in session.device().csets() {
//!     for block in cset.block_read_all()? {
//!         println!("{} samples of {} bytes", block.samples.len(), block.samples.width());
//!     }
//! }
//! session.close();
//! # Ok::<(), rust_zio::ZioError>(())
//! ```

pub mod acquisition;
pub mod attribute;
pub mod config;
pub mod decoder;
pub mod error;
pub mod listing;
pub mod mock;
pub mod node;
pub mod session;
pub mod tracing_setup;
pub mod tree;

pub use acquisition::{Acquisition, AcquisitionConfig, AcquisitionStats, StopHandle};
pub use attribute::{Attribute, Permissions};
pub use decoder::{decode_block, decode_header, decode_samples, Block, Samples};
pub use error::{Result, ZioError};
pub use listing::{buffer_list, device_list, trigger_list};
pub use node::ResourceNode;
pub use session::DeviceSession;
pub use tree::{Buffer, Channel, ChannelAlarms, ChannelSet, Device, Trigger};
