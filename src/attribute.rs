//! Live attribute handles.
//!
//! An [`Attribute`] names one value file of a ZIO object. Nothing is cached:
//! each [`read`](Attribute::read) and [`write`](Attribute::write) performs
//! exactly one call into the backend.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bitflags::bitflags;
use tracing::{debug, trace};
use zio_sys::BackingStore;

use crate::error::{Result, ZioError};

/// Backend access shared by every handle of one device tree.
///
/// Once the device is closed the flag is raised and every handle reports
/// [`ZioError::DeviceClosed`] instead of touching the backend.
pub(crate) struct StoreHandle {
    store: Arc<dyn BackingStore>,
    sysbase: String,
    closed: AtomicBool,
}

impl StoreHandle {
    pub(crate) fn new(store: Arc<dyn BackingStore>, sysbase: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            store,
            sysbase: sysbase.into(),
            closed: AtomicBool::new(false),
        })
    }

    /// The backend, if the device is still open.
    pub(crate) fn store(&self) -> Result<&dyn BackingStore> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ZioError::DeviceClosed {
                path: self.sysbase.clone(),
            });
        }
        Ok(self.store.as_ref())
    }

    pub(crate) fn sysbase(&self) -> &str {
        &self.sysbase
    }

    /// Raise the closed flag. Returns false if it was already raised.
    pub(crate) fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Backend access for teardown, regardless of the closed flag.
    pub(crate) fn raw_store(&self) -> &dyn BackingStore {
        self.store.as_ref()
    }
}

impl fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHandle")
            .field("sysbase", &self.sysbase)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

bitflags! {
    /// Permission bits of an attribute file.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Permissions: u32 {
        /// `0o400`
        const OWNER_READ = 0o400;
        /// `0o200`
        const OWNER_WRITE = 0o200;
        /// `0o040`
        const GROUP_READ = 0o040;
        /// `0o020`
        const GROUP_WRITE = 0o020;
        /// `0o004`
        const OTHER_READ = 0o004;
        /// `0o002`
        const OTHER_WRITE = 0o002;
    }
}

impl Permissions {
    const ANY_WRITE: Self = Self::OWNER_WRITE
        .union(Self::GROUP_WRITE)
        .union(Self::OTHER_WRITE);

    /// True if any of owner, group or other may write.
    pub fn is_writable(&self) -> bool {
        self.intersects(Self::ANY_WRITE)
    }
}

/// Handle to one attribute file.
///
/// The path is fixed at construction. Display renders `name = value`; the
/// alternate form (`{:#}`) uses the full path instead of the short name.
#[derive(Clone)]
pub struct Attribute {
    path: String,
    handle: Arc<StoreHandle>,
}

impl Attribute {
    pub(crate) fn new(path: impl Into<String>, handle: Arc<StoreHandle>) -> Self {
        Self {
            path: path.into(),
            handle,
        }
    }

    /// Full path of the attribute file.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last component of the path.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Read the current value.
    pub fn read(&self) -> Result<u32> {
        let store = self.handle.store()?;
        let value = store
            .attr_value_get(&self.path)
            .map_err(|e| ZioError::io(&self.path, e))?;
        trace!(path = %self.path, value, "Read attribute");
        Ok(value)
    }

    /// Write a new value. A failed write must not be assumed to have had any effect.
    pub fn write(&self, value: u32) -> Result<()> {
        let store = self.handle.store()?;
        store
            .attr_value_set(&self.path, value)
            .map_err(|e| ZioError::io(&self.path, e))?;
        debug!(path = %self.path, value, "Wrote attribute");
        Ok(())
    }

    /// Read the raw text of the attribute, trailing newline removed.
    pub fn read_text(&self) -> Result<String> {
        let store = self.handle.store()?;
        store
            .attr_string_get(&self.path)
            .map_err(|e| ZioError::io(&self.path, e))
    }

    /// Write raw text to the attribute.
    pub fn write_text(&self, text: &str) -> Result<()> {
        let store = self.handle.store()?;
        store
            .attr_string_set(&self.path, text)
            .map_err(|e| ZioError::io(&self.path, e))?;
        debug!(path = %self.path, text, "Wrote attribute");
        Ok(())
    }

    /// Permission bits of the attribute file.
    pub fn permissions(&self) -> Result<Permissions> {
        let store = self.handle.store()?;
        let mode = store
            .attr_mode(&self.path)
            .map_err(|e| ZioError::io(&self.path, e))?;
        Ok(Permissions::from_bits_truncate(mode))
    }

    #[cfg(test)]
    pub(crate) fn handle(&self) -> &Arc<StoreHandle> {
        &self.handle
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = if f.alternate() { self.path() } else { self.name() };
        match self.read() {
            Ok(value) => write!(f, "{label} = {value}"),
            Err(_) => write!(f, "{label} = ?"),
        }
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute").field("path", &self.path).finish()
    }
}
