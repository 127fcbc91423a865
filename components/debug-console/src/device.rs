//! Console driver and device front-end
//!
//! Binding creates the `console` device, publishes it under the parent
//! and attaches it to the driver's FIFO. Reads drain the FIFO without
//! blocking; writes go straight to the debug channel.
//!
//! The FIFO belongs to the driver, not to a device, so input buffered
//! across a release and rebind is delivered to the next device. Under
//! [`ReaderPolicy::Persist`] the driver also owns the one reader task and
//! reuses it for every bind; that reader keeps the debug channel of the
//! bind that started it.

use std::sync::Arc;

use dddk_runtime::{
    BindContext, DebugChannel, DeviceManager, DeviceOps, DeviceRef, Driver, DriverError,
    DriverMetadata, Result,
};

use crate::config::{ConsoleConfig, ReaderPolicy};
use crate::fifo::{ConsoleFifo, SignalTarget};
use crate::reader::ReaderHandle;

/// Debug console driver
pub struct ConsoleDriver {
    config: ConsoleConfig,
    fifo: Arc<ConsoleFifo>,
    target: Arc<SignalTarget>,
    persisted: spin::Mutex<Option<ReaderHandle>>,
}

impl ConsoleDriver {
    pub fn new(config: ConsoleConfig) -> Self {
        Self {
            config,
            fifo: Arc::new(ConsoleFifo::new()),
            target: Arc::new(SignalTarget::new()),
            persisted: spin::Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    /// Bytes buffered and not yet read by any device
    pub fn pending(&self) -> usize {
        self.fifo.len()
    }

    /// True while a bound device is attached to the FIFO
    pub fn is_bound(&self) -> bool {
        self.target.is_attached()
    }

    fn spawn_reader(&self, debug: &Arc<dyn DebugChannel>) -> Result<ReaderHandle> {
        ReaderHandle::spawn(
            &self.config.reader_name,
            debug.clone(),
            self.fifo.clone(),
            self.target.clone(),
        )
    }

    /// Start the per-device reader, or make sure the shared one is running
    fn start_reader(&self, debug: &Arc<dyn DebugChannel>) -> Result<Option<ReaderHandle>> {
        match self.config.reader_policy {
            ReaderPolicy::StopOnRelease => self.spawn_reader(debug).map(Some),
            ReaderPolicy::Persist => {
                let mut persisted = self.persisted.lock();
                match persisted.as_ref() {
                    Some(reader) if !reader.is_finished() => {
                        log::debug!("console: reusing reader task {}", reader.name());
                    }
                    _ => *persisted = Some(self.spawn_reader(debug)?),
                }
                Ok(None)
            }
        }
    }
}

impl Default for ConsoleDriver {
    fn default() -> Self {
        Self::new(ConsoleConfig::default())
    }
}

impl DriverMetadata for ConsoleDriver {
    fn driver_name() -> &'static str {
        "console"
    }

    fn driver_version() -> &'static str {
        "0.1"
    }
}

impl Driver for ConsoleDriver {
    type Device = ConsoleDevice;

    fn bind(&self, ctx: &BindContext) -> Result<ConsoleDevice> {
        if self.target.is_attached() {
            return Err(DriverError::AlreadyBound(self.config.device_name.clone()));
        }

        let device = ctx.manager.create(&self.config.device_name)?;

        if let Err(err) = ctx.manager.add(&device, &ctx.parent) {
            log::error!("console: device_add() failed: {}", err);
            ctx.manager.destroy(device);
            return Err(err);
        }

        let reader = match self.start_reader(&ctx.debug) {
            Ok(reader) => reader,
            Err(err) => {
                log::error!("console: reader task failed to start: {}", err);
                ctx.manager.destroy(device);
                return Err(err);
            }
        };

        if !self.fifo.attach(&self.target, device.clone()) {
            log::error!("console: lost bind race for {}", device.name());
            if let Some(reader) = reader {
                reader.stop();
            }
            ctx.manager.destroy(device);
            return Err(DriverError::AlreadyBound(self.config.device_name.clone()));
        }

        log::info!(
            "console: bound {} ({}) under {}",
            device.name(),
            device.id(),
            ctx.parent.name()
        );

        Ok(ConsoleDevice {
            device,
            fifo: self.fifo.clone(),
            target: self.target.clone(),
            debug: ctx.debug.clone(),
            manager: ctx.manager.clone(),
            reader,
            reader_name: self.config.reader_name.clone(),
        })
    }
}

/// A bound console device
///
/// Must be torn down with [`DeviceOps::release`]; dropping it leaves the
/// device node published and the driver bound.
pub struct ConsoleDevice {
    device: DeviceRef,
    fifo: Arc<ConsoleFifo>,
    target: Arc<SignalTarget>,
    debug: Arc<dyn DebugChannel>,
    manager: Arc<dyn DeviceManager>,
    reader: Option<ReaderHandle>,
    reader_name: String,
}

impl ConsoleDevice {
    /// Framework handle of this device
    pub fn device(&self) -> &DeviceRef {
        &self.device
    }

    /// Bytes buffered and not yet read
    pub fn pending(&self) -> usize {
        self.fifo.len()
    }

    /// Debug input lost because the FIFO was full
    pub fn dropped_bytes(&self) -> u64 {
        self.fifo.dropped()
    }

    pub fn reader_name(&self) -> &str {
        &self.reader_name
    }
}

impl DeviceOps for ConsoleDevice {
    fn read(&self, buf: &mut [u8], _offset: u64) -> Result<usize> {
        match self.fifo.drain_into(buf, &*self.target) {
            0 => Err(DriverError::ShouldWait),
            copied => Ok(copied),
        }
    }

    fn write(&self, buf: &[u8], _offset: u64) -> Result<usize> {
        self.debug.write(buf)
    }

    fn release(self) {
        let dropped = self.fifo.dropped();
        if dropped > 0 {
            log::warn!("console: {} input bytes dropped on overflow", dropped);
        }

        self.fifo.detach(&self.target);
        if let Some(reader) = self.reader {
            reader.stop();
        }

        log::info!("console: released {} ({})", self.device.name(), self.device.id());
        self.manager.destroy(self.device);
    }
}
