//! The attribute-bearing shape shared by every object of a device tree.

use std::fmt;
use std::sync::Arc;

use tracing::debug;
use zio_sys::{HeadRecord, ObjectType};

use crate::attribute::{Attribute, StoreHandle};
use crate::error::Result;

/// Paths of the attributes exposed by a head record, standard group first.
///
/// Each group is scanned in slot order and stops at the first empty slot.
pub fn scan_attribute_paths<'a>(std: &'a [String], ext: &'a [String]) -> Vec<&'a str> {
    let group = |slots: &'a [String]| {
        slots
            .iter()
            .take_while(|p| !p.is_empty())
            .map(String::as_str)
    };
    group(std).chain(group(ext)).collect()
}

/// A named ZIO object with its `enable` switch and attribute list.
///
/// The attribute list is built once from the head record and never re-scanned.
#[derive(Clone)]
pub struct ResourceNode {
    name: String,
    devname: String,
    sysbase: String,
    obj_type: ObjectType,
    enable: Attribute,
    attrs: Vec<Attribute>,
}

impl ResourceNode {
    pub(crate) fn from_head(head: &HeadRecord, handle: &Arc<StoreHandle>) -> Self {
        let attrs: Vec<Attribute> = scan_attribute_paths(&head.std, &head.ext)
            .into_iter()
            .map(|path| Attribute::new(path, handle.clone()))
            .collect();
        debug!(
            sysbase = %head.sysbase,
            n_attrs = attrs.len(),
            "Built resource node"
        );
        Self {
            name: head.name.clone(),
            devname: head.devname.clone(),
            sysbase: head.sysbase.clone(),
            obj_type: head.obj_type,
            enable: Attribute::new(head.enable.clone(), handle.clone()),
            attrs,
        }
    }

    /// Short name, such as `chan0`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Device-qualified name.
    pub fn devname(&self) -> &str {
        &self.devname
    }

    /// Directory of the object in the backend.
    pub fn sysbase(&self) -> &str {
        &self.sysbase
    }

    /// Kind of object.
    pub fn obj_type(&self) -> ObjectType {
        self.obj_type
    }

    /// Standard attributes followed by extended ones.
    pub fn attributes(&self) -> &[Attribute] {
        &self.attrs
    }

    /// Look up an attribute by its short name.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attrs.iter().find(|a| a.name() == name)
    }

    /// The `enable` attribute itself.
    pub fn enable_attribute(&self) -> &Attribute {
        &self.enable
    }

    /// Write `1` to `enable`. The effect is not verified; use
    /// [`is_enabled`](Self::is_enabled) to confirm.
    pub fn enable(&self) -> Result<()> {
        self.enable.write_text("1")
    }

    /// Write `0` to `enable`. The effect is not verified.
    pub fn disable(&self) -> Result<()> {
        self.enable.write_text("0")
    }

    /// Read `enable` back from the device.
    pub fn is_enabled(&self) -> Result<bool> {
        Ok(self.enable.read()? != 0)
    }
}

impl fmt::Display for ResourceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            f.write_str(&self.devname)
        } else {
            f.write_str(&self.name)
        }
    }
}

impl fmt::Debug for ResourceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceNode")
            .field("name", &self.name)
            .field("devname", &self.devname)
            .field("obj_type", &self.obj_type)
            .field("n_attrs", &self.attrs.len())
            .finish()
    }
}
