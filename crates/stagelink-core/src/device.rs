//! Device identifiers and the collaborator capabilities the server consumes.
//!
//! The server never touches devices itself. It asks a [`DeviceController`]
//! to change a device's on/off state and a [`TargetResolver`] to find out
//! which device the operator currently means. [`DeviceTable`] is an
//! in-memory implementation of both, used by the `stagelink` binary and in
//! tests.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Opaque device identifier, understood only by the device controller.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Creates a device identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the identifier, returning the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Result of asking a controller to change a device's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetStateOutcome {
    /// Whether the requested state was applied.
    pub success: bool,
    /// The device's state after the attempt.
    pub current_state: bool,
}

impl SetStateOutcome {
    /// The state was applied; the device is now in `state`.
    pub fn applied(state: bool) -> Self {
        Self {
            success: true,
            current_state: state,
        }
    }

    /// The state could not be applied; the device remains in `current_state`.
    pub fn failed(current_state: bool) -> Self {
        Self {
            success: false,
            current_state,
        }
    }
}

/// Errors a device controller may report instead of an outcome.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The controller could not be reached or refused to act.
    #[error("device controller unavailable: {reason}")]
    Unavailable { reason: String },

    /// The controller failed while changing the device.
    #[error("failed to set state of device {device_id}: {reason}")]
    Failed { device_id: DeviceId, reason: String },
}

impl DeviceError {
    /// Creates an unavailable error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Creates a failure error for the given device.
    pub fn failed(device_id: DeviceId, reason: impl Into<String>) -> Self {
        Self::Failed {
            device_id,
            reason: reason.into(),
        }
    }
}

/// Result type for device operations.
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Future returned by [`DeviceController::set_state`].
pub type DeviceFuture<'a> = Pin<Box<dyn Future<Output = DeviceResult<SetStateOutcome>> + Send + 'a>>;

/// Capability that performs the actual state change on a named device.
pub trait DeviceController: Send + Sync {
    /// Sets the on/off state of `device_id`.
    ///
    /// An unknown device is reported as a failed outcome, not an error.
    fn set_state(&self, device_id: &DeviceId, desired_state: bool) -> DeviceFuture<'_>;
}

/// Capability that identifies which device an operator currently means.
pub trait TargetResolver: Send + Sync {
    /// Returns the currently selected device, if any.
    fn resolve_selected(&self) -> Option<DeviceId>;
}

/// A device known to a [`DeviceTable`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Identifier used on the wire.
    pub id: DeviceId,
    /// Human readable label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Whether the device is switched on.
    #[serde(default)]
    pub on: bool,
}

impl Device {
    /// Creates a switched-off device without a label.
    pub fn new(id: impl Into<DeviceId>) -> Self {
        Self {
            id: id.into(),
            name: None,
            on: false,
        }
    }

    /// Builder: set the label.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builder: set the initial state.
    pub fn with_state(mut self, on: bool) -> Self {
        self.on = on;
        self
    }
}

#[derive(Debug, Default)]
struct TableInner {
    devices: BTreeMap<DeviceId, Device>,
    selected: Option<DeviceId>,
}

/// In-memory device table acting as both controller and target resolver.
#[derive(Debug, Default)]
pub struct DeviceTable {
    inner: Mutex<TableInner>,
}

impl DeviceTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table seeded with the given devices.
    pub fn with_devices(devices: impl IntoIterator<Item = Device>) -> Self {
        let table = Self::new();
        {
            let mut inner = table.lock();
            for device in devices {
                inner.devices.insert(device.id.clone(), device);
            }
        }
        table
    }

    fn lock(&self) -> MutexGuard<'_, TableInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds or replaces a device.
    pub fn insert(&self, device: Device) {
        self.lock().devices.insert(device.id.clone(), device);
    }

    /// Returns a device by id.
    pub fn get(&self, id: &DeviceId) -> Option<Device> {
        self.lock().devices.get(id).cloned()
    }

    /// Returns all devices ordered by id.
    pub fn devices(&self) -> Vec<Device> {
        self.lock().devices.values().cloned().collect()
    }

    /// Selects the device the operator is aiming at.
    ///
    /// Returns `false` if the device is unknown; the selection is unchanged.
    pub fn select(&self, id: &DeviceId) -> bool {
        let mut inner = self.lock();
        if inner.devices.contains_key(id) {
            info!(device_id = %id, "Device selected");
            inner.selected = Some(id.clone());
            true
        } else {
            false
        }
    }

    /// Clears the current selection.
    pub fn clear_selection(&self) {
        self.lock().selected = None;
    }

    /// Applies a state change synchronously.
    pub fn apply(&self, id: &DeviceId, desired_state: bool) -> SetStateOutcome {
        let mut inner = self.lock();
        match inner.devices.get_mut(id) {
            Some(device) => {
                device.on = desired_state;
                debug!(device_id = %id, state = desired_state, "Device state changed");
                SetStateOutcome::applied(desired_state)
            }
            None => {
                debug!(device_id = %id, "Device not found");
                SetStateOutcome::failed(false)
            }
        }
    }
}

impl DeviceController for DeviceTable {
    fn set_state(&self, device_id: &DeviceId, desired_state: bool) -> DeviceFuture<'_> {
        let outcome = self.apply(device_id, desired_state);
        Box::pin(async move { Ok(outcome) })
    }
}

impl TargetResolver for DeviceTable {
    fn resolve_selected(&self) -> Option<DeviceId> {
        let inner = self.lock();
        // A device removed after selection no longer resolves.
        inner
            .selected
            .as_ref()
            .filter(|id| inner.devices.contains_key(*id))
            .cloned()
    }
}
