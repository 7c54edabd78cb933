//! Names of installed buffers, triggers and devices.

use zio_sys::{BackingStore, ModuleKind};

use crate::error::{Result, ZioError};

fn list(store: &dyn BackingStore, kind: ModuleKind) -> Result<Vec<String>> {
    store
        .module_list(kind)
        .map_err(|e| ZioError::ListFailure {
            kind: kind.as_str(),
            strerror: e.strerror(),
        })
}

/// Installed buffer types.
pub fn buffer_list(store: &dyn BackingStore) -> Result<Vec<String>> {
    list(store, ModuleKind::Buffer)
}

/// Installed trigger types.
pub fn trigger_list(store: &dyn BackingStore) -> Result<Vec<String>> {
    list(store, ModuleKind::Trigger)
}

/// Devices present on the bus. No devices is an empty list, not an error.
pub fn device_list(store: &dyn BackingStore) -> Result<Vec<String>> {
    list(store, ModuleKind::Device)
}
