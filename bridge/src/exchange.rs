//! Exchange slot and accessor object
//!
//! A value cannot be handed to the macro engine directly, so it takes a
//! detour: the bridge stores it in the process-wide [`ExchangeSlot`], then runs
//! macro code that instantiates the accessor object and calls `drain` (slot to
//! macro) or `fill` (macro to slot) on it.
//!
//! There is exactly one slot per process and no per-call correlation, so two
//! threads using it at once corrupt each other's values. The lock below only
//! keeps each individual access well-formed; callers serialize whole
//! operations.

use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use parking_lot::Mutex;

use crate::config::AccessorConfig;
use crate::value::MacroValue;

lazy_static! {
    static ref SLOT: Mutex<Option<MacroValue>> = Mutex::new(None);
}

/// Held by unit tests that touch the slot
#[cfg(test)]
pub(crate) static TEST_SLOT_LOCK: Mutex<()> = parking_lot::const_mutex(());

/// The process-wide value holder.
pub struct ExchangeSlot;

impl ExchangeSlot {
    pub fn store(value: MacroValue) {
        log::trace!("slot <- {:?}", value);
        *SLOT.lock() = Some(value);
    }

    /// Move the value out, leaving the slot empty.
    pub fn take() -> Option<MacroValue> {
        let value = SLOT.lock().take();
        log::trace!("slot -> {:?}", value);
        value
    }

    /// Copy of the held value; the slot keeps its own.
    pub(crate) fn peek() -> Option<MacroValue> {
        SLOT.lock().clone()
    }

    pub fn clear() {
        *SLOT.lock() = None;
    }

    #[cfg(test)]
    pub(crate) fn is_empty() -> bool {
        SLOT.lock().is_none()
    }
}

/// The two operations macro code reaches through the accessor object.
pub struct ExchangeAccessor;

impl ExchangeAccessor {
    /// Hand the held value to the macro caller.
    pub fn drain() -> Option<MacroValue> {
        ExchangeSlot::peek()
    }

    /// Store a value coming from macro code.
    pub fn fill(value: MacroValue) -> i32 {
        ExchangeSlot::store(value);
        1
    }
}

/// Where macro code finds the accessor object.
///
/// Macro code creates the object from an assembly path plus a class. When a
/// shim file sits next to the assembly the shim is loaded instead and the
/// class is named by its interface id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessorLocator {
    assembly_path: PathBuf,
    type_name: String,
    interface_id: String,
    shim_extension: String,
}

/// A resolved `createobject` target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessorTarget {
    pub path: PathBuf,
    pub class: String,
}

impl AccessorLocator {
    pub fn new(assembly_path: PathBuf, config: &AccessorConfig) -> Self {
        Self {
            assembly_path,
            type_name: config.type_name.clone(),
            interface_id: config.interface_id.clone(),
            shim_extension: config.shim_extension.clone(),
        }
    }

    pub fn assembly_path(&self) -> &Path {
        &self.assembly_path
    }

    pub fn shim_path(&self) -> PathBuf {
        self.assembly_path.with_extension(&self.shim_extension)
    }

    /// Decide the target now; the shim is looked up on every call.
    pub fn resolve(&self) -> AccessorTarget {
        let shim = self.shim_path();
        if shim.exists() {
            AccessorTarget {
                path: shim,
                class: format!("{{{}}}", self.interface_id),
            }
        } else {
            AccessorTarget {
                path: self.assembly_path.clone(),
                class: self.type_name.clone(),
            }
        }
    }
}
