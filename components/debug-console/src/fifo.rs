//! Locked console FIFO
//!
//! The reader task and every device reader share one [`ConsoleFifo`].
//! The device's READABLE bit is changed only while the FIFO lock is held,
//! so after any push or drain completes the bit equals "FIFO non-empty".
//!
//! The FIFO outlives individual devices. Its producer signals a
//! [`SignalTarget`], which forwards to whichever device is currently
//! attached; a rebound device picks up input buffered in between.
//!
//! Lock order is FIFO lock, then the target, then the device state lock
//! inside [`StateSignal`]. Nothing takes them the other way round.

use dddk_runtime::{DeviceRef, DeviceState, StateSignal};

use crate::ring_buffer::RingBuffer;
use crate::FIFO_SIZE;

/// Ring buffer plus the lock that serializes it
pub struct ConsoleFifo<const N: usize = FIFO_SIZE> {
    ring: spin::Mutex<RingBuffer<N>>,
}

impl<const N: usize> ConsoleFifo<N> {
    pub const fn new() -> Self {
        Self {
            ring: spin::Mutex::new(RingBuffer::new()),
        }
    }

    /// Append one byte, setting READABLE on the empty to non-empty edge
    ///
    /// A full FIFO drops the byte.
    pub fn enqueue(&self, byte: u8, signal: &dyn StateSignal) {
        let mut ring = self.ring.lock();
        if ring.is_empty() {
            signal.set_state(DeviceState::READABLE);
        }
        ring.push(byte);
    }

    /// Move up to `out.len()` bytes into `out`, returning the count
    ///
    /// Clears READABLE if the FIFO is left empty.
    pub fn drain_into(&self, out: &mut [u8], signal: &dyn StateSignal) -> usize {
        let mut ring = self.ring.lock();
        let mut copied = 0;
        for slot in out.iter_mut() {
            match ring.try_pop() {
                Some(byte) => {
                    *slot = byte;
                    copied += 1;
                }
                None => break,
            }
        }
        if ring.is_empty() {
            signal.clear_state(DeviceState::READABLE);
        }
        copied
    }

    /// Point `target` at `device` and sync READABLE with the contents
    ///
    /// Returns `false`, leaving everything unchanged, if another device
    /// is already attached.
    pub fn attach(&self, target: &SignalTarget, device: DeviceRef) -> bool {
        let ring = self.ring.lock();
        if !target.try_attach(device) {
            return false;
        }
        if ring.is_empty() {
            target.clear_state(DeviceState::READABLE);
        } else {
            target.set_state(DeviceState::READABLE);
        }
        true
    }

    /// Disconnect the attached device from `target`
    ///
    /// Input keeps accumulating until the next [`attach`](Self::attach).
    pub fn detach(&self, target: &SignalTarget) -> Option<DeviceRef> {
        let _ring = self.ring.lock();
        target.take()
    }

    /// Bytes currently buffered
    pub fn len(&self) -> usize {
        self.ring.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.lock().is_empty()
    }

    /// Usable capacity in bytes
    pub fn capacity(&self) -> usize {
        self.ring.lock().capacity()
    }

    /// Bytes dropped on overflow since creation
    pub fn dropped(&self) -> u64 {
        self.ring.lock().dropped()
    }
}

impl<const N: usize> Default for ConsoleFifo<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Forwards state changes to the currently attached device
///
/// With nothing attached, changes are discarded and the state reads as
/// empty.
#[derive(Default)]
pub struct SignalTarget {
    device: spin::Mutex<Option<DeviceRef>>,
}

impl SignalTarget {
    pub const fn new() -> Self {
        Self {
            device: spin::Mutex::new(None),
        }
    }

    /// Currently attached device
    pub fn device(&self) -> Option<DeviceRef> {
        self.device.lock().clone()
    }

    pub fn is_attached(&self) -> bool {
        self.device.lock().is_some()
    }

    fn try_attach(&self, device: DeviceRef) -> bool {
        let mut slot = self.device.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(device);
        true
    }

    fn take(&self) -> Option<DeviceRef> {
        self.device.lock().take()
    }
}

impl StateSignal for SignalTarget {
    fn set_state(&self, bits: DeviceState) {
        if let Some(device) = self.device.lock().as_ref() {
            device.set_state(bits);
        }
    }

    fn clear_state(&self, bits: DeviceState) {
        if let Some(device) = self.device.lock().as_ref() {
            device.clear_state(bits);
        }
    }

    fn state(&self) -> DeviceState {
        self.device
            .lock()
            .as_ref()
            .map_or(DeviceState::empty(), |device| device.state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dddk_runtime::{DeviceManager, DeviceRegistry};
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    #[derive(Default)]
    struct TestSignal {
        bits: AtomicU32,
        sets: AtomicUsize,
        clears: AtomicUsize,
    }

    impl StateSignal for TestSignal {
        fn set_state(&self, bits: DeviceState) {
            self.sets.fetch_add(1, Ordering::Relaxed);
            self.bits.fetch_or(bits.bits(), Ordering::Relaxed);
        }

        fn clear_state(&self, bits: DeviceState) {
            self.clears.fetch_add(1, Ordering::Relaxed);
            self.bits.fetch_and(!bits.bits(), Ordering::Relaxed);
        }

        fn state(&self) -> DeviceState {
            DeviceState::from_bits_truncate(self.bits.load(Ordering::Relaxed))
        }
    }

    #[test]
    fn test_enqueue_sets_readable_on_first_byte_only() {
        let fifo = ConsoleFifo::<256>::new();
        let signal = TestSignal::default();
        fifo.enqueue(b'a', &signal);
        fifo.enqueue(b'b', &signal);
        assert!(signal.is_readable());
        assert_eq!(signal.sets.load(Ordering::Relaxed), 1);
        assert_eq!(fifo.len(), 2);
    }

    #[test]
    fn test_partial_drain_keeps_readable() {
        let fifo = ConsoleFifo::<256>::new();
        let signal = TestSignal::default();
        for &byte in b"ABC" {
            fifo.enqueue(byte, &signal);
        }

        let mut out = [0u8; 2];
        assert_eq!(fifo.drain_into(&mut out, &signal), 2);
        assert_eq!(&out, b"AB");
        assert!(signal.is_readable());

        let mut out = [0u8; 4];
        assert_eq!(fifo.drain_into(&mut out, &signal), 1);
        assert_eq!(out[0], b'C');
        assert!(!signal.is_readable());
        assert!(fifo.is_empty());
    }

    #[test]
    fn test_drain_empty_clears_readable() {
        let fifo = ConsoleFifo::<256>::new();
        let signal = TestSignal::default();
        signal.set_state(DeviceState::READABLE);
        let mut out = [0u8; 8];
        assert_eq!(fifo.drain_into(&mut out, &signal), 0);
        assert!(!signal.is_readable());
    }

    #[test]
    fn test_overflow_counts_drops() {
        let fifo = ConsoleFifo::<4>::new();
        let signal = TestSignal::default();
        for &byte in b"wxyz!" {
            fifo.enqueue(byte, &signal);
        }
        assert_eq!(fifo.capacity(), 3);
        assert_eq!(fifo.len(), 3);
        assert_eq!(fifo.dropped(), 2);

        let mut out = [0u8; 8];
        assert_eq!(fifo.drain_into(&mut out, &signal), 3);
        assert_eq!(&out[..3], b"wxy");
    }

    #[test]
    fn test_detached_target_discards_signals() {
        let fifo = ConsoleFifo::<16>::new();
        let target = SignalTarget::new();
        fifo.enqueue(b'q', &target);
        assert!(!target.is_readable());
        assert_eq!(fifo.len(), 1);
    }

    #[test]
    fn test_attach_syncs_readable_with_buffered_input() {
        let registry = DeviceRegistry::new();
        let first = registry.create("console").unwrap();
        let second = registry.create("console").unwrap();
        let fifo = ConsoleFifo::<16>::new();
        let target = SignalTarget::new();

        assert!(fifo.attach(&target, first.clone()));
        assert!(!first.is_readable());
        assert!(!fifo.attach(&target, second.clone()));

        fifo.enqueue(b'a', &target);
        assert!(first.is_readable());
        assert_eq!(fifo.detach(&target), Some(first.clone()));

        // Arrives while no device is attached.
        fifo.enqueue(b'b', &target);
        assert!(fifo.attach(&target, second.clone()));
        assert!(second.is_readable());

        let mut out = [0u8; 4];
        assert_eq!(fifo.drain_into(&mut out, &target), 2);
        assert_eq!(&out[..2], b"ab");
        assert!(!second.is_readable());
    }
}
