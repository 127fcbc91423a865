//! Test doubles for drivers
//!
//! [`MockDeviceManager`] wraps a [`DeviceRegistry`] and can fail the next
//! create or add call. [`MockDebugChannel`] is fed input from the test
//! and records every write.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};

use crate::debug::DebugChannel;
use crate::device::{DeviceId, DeviceManager, DeviceRef, DeviceRegistry};
use crate::{DriverError, Result};

/// Device manager with failure injection
pub struct MockDeviceManager {
    registry: DeviceRegistry,
    fail_create: spin::Mutex<Option<DriverError>>,
    fail_add: spin::Mutex<Option<DriverError>>,
    destroyed: spin::Mutex<Vec<DeviceId>>,
}

impl MockDeviceManager {
    pub fn new() -> Self {
        Self {
            registry: DeviceRegistry::new(),
            fail_create: spin::Mutex::new(None),
            fail_add: spin::Mutex::new(None),
            destroyed: spin::Mutex::new(Vec::new()),
        }
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Fail the next `create` with `err`
    pub fn fail_next_create(&self, err: DriverError) {
        *self.fail_create.lock() = Some(err);
    }

    /// Fail the next `add` with `err`
    pub fn fail_next_add(&self, err: DriverError) {
        *self.fail_add.lock() = Some(err);
    }

    /// Ids passed to `destroy`, in call order
    pub fn destroyed(&self) -> Vec<DeviceId> {
        self.destroyed.lock().clone()
    }
}

impl Default for MockDeviceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceManager for MockDeviceManager {
    fn create(&self, name: &str) -> Result<DeviceRef> {
        if let Some(err) = self.fail_create.lock().take() {
            return Err(err);
        }
        self.registry.create(name)
    }

    fn add(&self, device: &DeviceRef, parent: &DeviceRef) -> Result<()> {
        if let Some(err) = self.fail_add.lock().take() {
            return Err(err);
        }
        self.registry.add(device, parent)
    }

    fn destroy(&self, device: DeviceRef) {
        self.destroyed.lock().push(device.id());
        self.registry.destroy(device);
    }
}

enum MockInput {
    Byte(u8),
    Error(i32),
}

/// Scriptable debug channel
///
/// Reads deliver one queued item per call and return `Ok(0)` after
/// `poll` elapses with nothing queued.
pub struct MockDebugChannel {
    tx: Sender<MockInput>,
    rx: Receiver<MockInput>,
    poll: Duration,
    reads: AtomicUsize,
    writes: spin::Mutex<Vec<Vec<u8>>>,
    write_result: spin::Mutex<Option<Result<usize>>>,
}

impl MockDebugChannel {
    pub const DEFAULT_POLL: Duration = Duration::from_millis(5);

    pub fn new() -> Self {
        Self::with_poll(Self::DEFAULT_POLL)
    }

    pub fn with_poll(poll: Duration) -> Self {
        let (tx, rx) = channel::unbounded();
        Self {
            tx,
            rx,
            poll,
            reads: AtomicUsize::new(0),
            writes: spin::Mutex::new(Vec::new()),
            write_result: spin::Mutex::new(None),
        }
    }

    /// Queue input bytes
    pub fn feed(&self, bytes: &[u8]) {
        for &byte in bytes {
            // The receiver lives in `self`, so the channel cannot be closed.
            let _ = self.tx.send(MockInput::Byte(byte));
        }
    }

    /// Queue a failed read with `status`
    pub fn feed_error(&self, status: i32) {
        let _ = self.tx.send(MockInput::Error(status));
    }

    /// Queued input not yet consumed
    pub fn pending_input(&self) -> usize {
        self.rx.len()
    }

    /// Number of `read` calls so far
    pub fn read_calls(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    /// Every buffer passed to `write`, in call order
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().clone()
    }

    /// Make every later `write` return `result`
    pub fn set_write_result(&self, result: Result<usize>) {
        *self.write_result.lock() = Some(result);
    }
}

impl Default for MockDebugChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl DebugChannel for MockDebugChannel {
    fn read(&self, buf: &mut [u8]) -> Result<usize> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        if buf.is_empty() {
            return Ok(0);
        }
        match self.rx.recv_timeout(self.poll) {
            Ok(MockInput::Byte(byte)) => {
                buf[0] = byte;
                Ok(1)
            }
            Ok(MockInput::Error(status)) => Err(DriverError::Io(status)),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => Ok(0),
        }
    }

    fn write(&self, buf: &[u8]) -> Result<usize> {
        self.writes.lock().push(buf.to_vec());
        match self.write_result.lock().clone() {
            Some(result) => result,
            None => Ok(buf.len()),
        }
    }
}
