//! Device state word
//!
//! Each device node carries a small set of state bits that callers can
//! observe (and wait on) to avoid busy-polling a device that would block.

use std::sync::Arc;

use bitflags::bitflags;

bitflags! {
    /// Device state bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DeviceState: u32 {
        /// A read would return data immediately
        const READABLE = 1 << 0;
        /// A write would be accepted immediately
        const WRITABLE = 1 << 1;
        /// The device is in an error state
        const ERROR    = 1 << 2;
    }
}

/// Set/clear/query access to a device's state bits
///
/// Implementations must be callable while a driver holds its own locks:
/// they take at most one internal lock and never block on I/O.
pub trait StateSignal: Send + Sync {
    /// Set `bits`, waking any waiters
    fn set_state(&self, bits: DeviceState);

    /// Clear `bits`, waking any waiters
    fn clear_state(&self, bits: DeviceState);

    /// Current state bits
    fn state(&self) -> DeviceState;

    fn is_readable(&self) -> bool {
        self.state().contains(DeviceState::READABLE)
    }
}

impl<T: StateSignal + ?Sized> StateSignal for Arc<T> {
    fn set_state(&self, bits: DeviceState) {
        (**self).set_state(bits)
    }

    fn clear_state(&self, bits: DeviceState) {
        (**self).clear_state(bits)
    }

    fn state(&self) -> DeviceState {
        (**self).state()
    }
}
