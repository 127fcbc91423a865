//! Device nodes and the device manager
//!
//! A driver asks the [`DeviceManager`] to create a node, then to add it
//! under a parent to publish it. Destroying a node unpublishes it and
//! drops the manager's reference.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::state::{DeviceState, StateSignal};
use crate::{DriverError, Result};

/// Device identifier assigned by the manager
pub type DeviceId = u64;

/// Framework device manager
pub trait DeviceManager: Send + Sync {
    /// Create an unpublished device node
    fn create(&self, name: &str) -> Result<DeviceRef>;

    /// Publish `device` under `parent`
    fn add(&self, device: &DeviceRef, parent: &DeviceRef) -> Result<()>;

    /// Unpublish and drop `device`
    fn destroy(&self, device: DeviceRef);
}

struct DeviceNode {
    id: DeviceId,
    name: String,
    state: Mutex<DeviceState>,
    changed: Condvar,
}

/// Reference-counted handle to a device node
#[derive(Clone)]
pub struct DeviceRef {
    node: Arc<DeviceNode>,
}

impl DeviceRef {
    fn new(id: DeviceId, name: &str) -> Self {
        Self {
            node: Arc::new(DeviceNode {
                id,
                name: name.to_owned(),
                state: Mutex::new(DeviceState::empty()),
                changed: Condvar::new(),
            }),
        }
    }

    pub fn id(&self) -> DeviceId {
        self.node.id
    }

    pub fn name(&self) -> &str {
        &self.node.name
    }

    fn lock_state(&self) -> MutexGuard<'_, DeviceState> {
        // State is a plain bit set; a panicking holder cannot leave it torn.
        self.node.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait until any of `bits` is set or `timeout` elapses
    ///
    /// Returns `true` if one of the bits was observed set.
    pub fn wait_for(&self, bits: DeviceState, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock_state();
        while !state.intersects(bits) {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = self
                .node
                .changed
                .wait_timeout(state, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
        true
    }
}

impl StateSignal for DeviceRef {
    fn set_state(&self, bits: DeviceState) {
        let mut state = self.lock_state();
        state.insert(bits);
        self.node.changed.notify_all();
    }

    fn clear_state(&self, bits: DeviceState) {
        let mut state = self.lock_state();
        state.remove(bits);
        self.node.changed.notify_all();
    }

    fn state(&self) -> DeviceState {
        *self.lock_state()
    }
}

impl PartialEq for DeviceRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }
}

impl Eq for DeviceRef {}

impl fmt::Debug for DeviceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceRef")
            .field("id", &self.node.id)
            .field("name", &self.node.name)
            .field("state", &self.state())
            .finish()
    }
}

struct Entry {
    device: DeviceRef,
    parent: Option<DeviceId>,
}

struct RegistryInner {
    next_id: DeviceId,
    nodes: BTreeMap<DeviceId, Entry>,
}

/// In-process device manager
///
/// Keeps every live node together with its parent link. Nodes created
/// with [`DeviceRegistry::root`] are published with no parent.
pub struct DeviceRegistry {
    inner: spin::Mutex<RegistryInner>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self {
            inner: spin::Mutex::new(RegistryInner {
                next_id: 1,
                nodes: BTreeMap::new(),
            }),
        }
    }

    fn insert(&self, name: &str) -> DeviceRef {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        let device = DeviceRef::new(id, name);
        inner.nodes.insert(
            id,
            Entry {
                device: device.clone(),
                parent: None,
            },
        );
        device
    }

    /// Create a published top-level device
    pub fn root(&self, name: &str) -> DeviceRef {
        let device = self.insert(name);
        log::debug!("dddk: root device {} ({})", name, device.id());
        device
    }

    /// Number of live device nodes
    pub fn len(&self) -> usize {
        self.inner.lock().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: DeviceId) -> bool {
        self.inner.lock().nodes.contains_key(&id)
    }

    /// Parent of a published device
    pub fn parent_of(&self, id: DeviceId) -> Option<DeviceId> {
        self.inner.lock().nodes.get(&id).and_then(|entry| entry.parent)
    }

    /// Live devices published under `parent`
    pub fn children(&self, parent: DeviceId) -> Vec<DeviceRef> {
        self.inner
            .lock()
            .nodes
            .values()
            .filter(|entry| entry.parent == Some(parent))
            .map(|entry| entry.device.clone())
            .collect()
    }

    /// Look up a live device by name
    pub fn find(&self, name: &str) -> Option<DeviceRef> {
        self.inner
            .lock()
            .nodes
            .values()
            .find(|entry| entry.device.name() == name)
            .map(|entry| entry.device.clone())
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceManager for DeviceRegistry {
    fn create(&self, name: &str) -> Result<DeviceRef> {
        if name.is_empty() {
            return Err(DriverError::DeviceCreate("empty device name".into()));
        }
        Ok(self.insert(name))
    }

    fn add(&self, device: &DeviceRef, parent: &DeviceRef) -> Result<()> {
        let mut inner = self.inner.lock();
        if !inner.nodes.contains_key(&parent.id()) {
            return Err(DriverError::NotFound(parent.id()));
        }
        let entry = inner
            .nodes
            .get_mut(&device.id())
            .ok_or(DriverError::NotFound(device.id()))?;
        if entry.parent.is_some() {
            return Err(DriverError::DeviceAdd(format!(
                "{} already published",
                device.name()
            )));
        }
        entry.parent = Some(parent.id());
        log::debug!(
            "dddk: published {} ({}) under {}",
            device.name(),
            device.id(),
            parent.id()
        );
        Ok(())
    }

    fn destroy(&self, device: DeviceRef) {
        if self.inner.lock().nodes.remove(&device.id()).is_none() {
            log::warn!("dddk: destroy of unknown device {}", device.id());
            return;
        }
        log::debug!("dddk: destroyed {} ({})", device.name(), device.id());
    }
}
