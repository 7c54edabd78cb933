//! Scoped ownership of one open device.

use std::sync::Arc;

use tracing::info_span;
use zio_sys::BackingStore;

use crate::error::Result;
use crate::tree::Device;

/// Owns exactly one [`Device`] for its lifetime.
///
/// A failed open leaves nothing behind. The device is torn down exactly once,
/// either by [`close`](Self::close) or when the session is dropped, whichever
/// comes first.
#[derive(Debug)]
pub struct DeviceSession {
    device: Device,
}

impl DeviceSession {
    /// Open `name` (or `name-0x<id>`) and build its tree.
    pub fn open(store: Arc<dyn BackingStore>, name: &str, id: Option<u32>) -> Result<Self> {
        let device = Device::open(store, name, id)?;
        Ok(Self { device })
    }

    /// The open device.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Tear the device down now.
    pub fn close(self) {
        self.device.close();
    }

    /// Open a device, run `f` on it and close it again, whether `f`
    /// succeeded or not.
    pub fn scoped<T, F>(store: Arc<dyn BackingStore>, name: &str, id: Option<u32>, f: F) -> Result<T>
    where
        F: FnOnce(&Device) -> Result<T>,
    {
        let span = info_span!("zio_session", device = name, id = ?id);
        let _enter = span.enter();
        let session = Self::open(store, name, id)?;
        let result = f(session.device());
        session.close();
        result
    }
}

impl AsRef<Device> for DeviceSession {
    fn as_ref(&self) -> &Device {
        &self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ZioError;
    use crate::mock::{MockCset, MockDevice, MockStore};
    use zio_sys::Direction;

    fn store() -> Arc<MockStore> {
        let store = Arc::new(MockStore::new());
        store.add_device(MockDevice::new("zzero").with_cset(MockCset::new(Direction::Input, 1)));
        store
    }

    #[test]
    fn test_close_releases_once() {
        let store = store();
        let session = DeviceSession::open(store.clone(), "zzero", None).unwrap();
        assert_eq!(session.device().n_cset(), 1);
        session.close();
        assert_eq!(store.closed(), vec!["/sys/bus/zio/devices/zzero"]);
    }

    #[test]
    fn test_drop_releases_once() {
        let store = store();
        {
            let _session = DeviceSession::open(store.clone(), "zzero", None).unwrap();
        }
        assert_eq!(store.closed().len(), 1);
    }

    #[test]
    fn test_scoped_closes_on_error() {
        let store = store();
        let result: Result<()> = DeviceSession::scoped(store.clone(), "zzero", None, |dev| {
            Err(ZioError::DeviceClosed {
                path: dev.node().sysbase().to_string(),
            })
        });
        assert!(result.is_err());
        assert_eq!(store.closed().len(), 1);
    }

    #[test]
    fn test_failed_open_leaves_nothing() {
        let store = store();
        store.fail_open(Some(libc::EBUSY));
        let err = DeviceSession::open(store.clone(), "zzero", None).unwrap_err();
        assert!(matches!(err, ZioError::OpenFailure { ref name, id: None, .. } if name == "zzero"));
        assert!(store.closed().is_empty());
    }
}
