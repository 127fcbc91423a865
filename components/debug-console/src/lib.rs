//! Debug Console - buffered character device over the kernel debug channel
//!
//! # Purpose
//! Relays bytes arriving on the debug input channel into a bounded FIFO
//! that device reads drain, and passes device writes straight through to
//! the debug output channel.
//!
//! # Integration Points
//! - Depends on: `dddk-runtime` (device manager, state signaling, debug channel)
//! - Provides to: anything that binds drivers through [`dddk_runtime::Driver`]
//!
//! # Architecture
//! ```text
//! debug channel -> reader task -> ConsoleFifo -> ConsoleDevice::read -> caller
//! caller -> ConsoleDevice::write -> debug channel
//! ```
//! The FIFO is a 256-byte ring that keeps one slot free (255 usable
//! bytes). Input that arrives while it is full is dropped and counted.
//! The device's READABLE bit tracks "FIFO non-empty" and is only changed
//! under the FIFO lock.
//!
//! # Testing Strategy
//! - Unit tests: ring, FIFO readiness, reader task, bind/read/write/release
//! - Integration tests: end-to-end relay, concurrent producer/consumers
//! - Benchmarks: ring push/pop throughput

use static_assertions::{assert_impl_all, const_assert};

pub mod config;
pub mod device;
pub mod fifo;
pub mod reader;
pub mod ring_buffer;

pub use config::{ConfigError, ConsoleConfig, ReaderPolicy};
pub use device::{ConsoleDevice, ConsoleDriver};
pub use fifo::{ConsoleFifo, SignalTarget};
pub use reader::{ReaderHandle, ReaderStats};
pub use ring_buffer::RingBuffer;

/// Console FIFO size in bytes (one slot is always free)
pub const FIFO_SIZE: usize = 256;

const_assert!(FIFO_SIZE.is_power_of_two());
assert_impl_all!(ConsoleFifo: Send, Sync);
assert_impl_all!(ConsoleDevice: Send, Sync);
assert_impl_all!(ConsoleDriver: Send, Sync);
