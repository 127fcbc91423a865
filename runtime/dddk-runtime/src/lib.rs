//! DDDK Runtime - Runtime support for device driver development
//!
//! This crate provides the framework-side types and traits that drivers
//! bind against: error types, driver and device traits, the device state
//! word with its signaling primitive, the device manager that creates and
//! registers device nodes, and the debug channel primitive.
//!
//! # Integration Points
//! - Provides to: driver components (e.g. the debug console)
//! - Collaborators: the device manager, the debug channel
//!
//! # Testing Strategy
//! - Unit tests: registry bookkeeping, state signaling
//! - Test doubles: the `mock` module (feature `mock`) provides a device
//!   manager with failure injection and a scriptable debug channel

use std::sync::Arc;

use thiserror::Error;

pub mod debug;
pub mod device;
pub mod state;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use debug::{DebugChannel, HostDebugChannel};
pub use device::{DeviceId, DeviceManager, DeviceRef, DeviceRegistry};
pub use state::{DeviceState, StateSignal};

/// Driver error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    #[error("Out of memory")]
    NoMemory,

    #[error("Device creation failed: {0}")]
    DeviceCreate(String),

    #[error("Device registration failed: {0}")]
    DeviceAdd(String),

    #[error("Task spawn failed: {0}")]
    TaskSpawn(String),

    #[error("Driver already bound to {0}")]
    AlreadyBound(String),

    #[error("Device not found: {0}")]
    NotFound(DeviceId),

    /// No data is available yet; wait for a readiness signal and retry.
    #[error("Operation should wait")]
    ShouldWait,

    #[error("Debug channel I/O failed (status {0})")]
    Io(i32),
}

impl DriverError {
    /// True for the flow-control condition, which is not a failure
    pub fn is_should_wait(&self) -> bool {
        matches!(self, DriverError::ShouldWait)
    }
}

pub type Result<T> = core::result::Result<T, DriverError>;

/// Trait for driver metadata
pub trait DriverMetadata {
    /// Get the driver name
    fn driver_name() -> &'static str;

    /// Get driver version (default: "0.1.0")
    fn driver_version() -> &'static str {
        "0.1.0"
    }
}

/// Framework collaborators handed to a driver when it is bound
#[derive(Clone)]
pub struct BindContext {
    /// Creates, registers and destroys device nodes
    pub manager: Arc<dyn DeviceManager>,

    /// Device the new device is published under
    pub parent: DeviceRef,

    /// Debug input/output primitive
    pub debug: Arc<dyn DebugChannel>,
}

impl BindContext {
    pub fn new(
        manager: Arc<dyn DeviceManager>,
        parent: DeviceRef,
        debug: Arc<dyn DebugChannel>,
    ) -> Self {
        Self {
            manager,
            parent,
            debug,
        }
    }
}

/// Trait for driver lifecycle
pub trait Driver: DriverMetadata {
    /// Device instance produced by a successful bind
    type Device: DeviceOps;

    /// Create and publish one device instance under `ctx.parent`
    ///
    /// # Errors
    /// Allocation, registration or task-spawn failures. A failed bind
    /// leaves no device behind.
    fn bind(&self, ctx: &BindContext) -> Result<Self::Device>;
}

/// Framework-facing device operations
pub trait DeviceOps: Send + Sync {
    /// Read up to `buf.len()` bytes
    ///
    /// Returns [`DriverError::ShouldWait`] instead of `Ok(0)` when nothing
    /// is pending.
    fn read(&self, buf: &mut [u8], offset: u64) -> Result<usize>;

    /// Write `buf`, returning the number of bytes accepted
    fn write(&self, buf: &[u8], offset: u64) -> Result<usize>;

    /// Tear down the device instance
    fn release(self)
    where
        Self: Sized;
}
