//! Debug input reader task
//!
//! A named thread pulls one byte at a time from the debug channel and
//! appends it to the console FIFO. Failed or empty reads are retried
//! immediately; nothing is reported to the device side.
//!
//! The task stops only when [`ReaderHandle::stop`] is called. Dropping
//! the handle detaches the task, which then runs for the life of the
//! process.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use dddk_runtime::{DebugChannel, DriverError, Result, StateSignal};

use crate::fifo::ConsoleFifo;

/// Counters returned by a stopped reader
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    /// Bytes read from the channel and handed to the FIFO
    pub received: u64,

    /// Channel reads that returned an error
    pub read_errors: u64,
}

struct ReaderTask<S> {
    channel: Arc<dyn DebugChannel>,
    fifo: Arc<ConsoleFifo>,
    signal: S,
    stop_rx: Receiver<()>,
}

impl<S: StateSignal> ReaderTask<S> {
    fn run(self) -> ReaderStats {
        let mut stats = ReaderStats::default();
        let mut byte = [0u8; 1];
        loop {
            match self.stop_rx.try_recv() {
                Ok(()) => break,
                // Disconnected: the handle was dropped, keep running.
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {}
            }

            match self.channel.read(&mut byte) {
                Ok(1) => {
                    self.fifo.enqueue(byte[0], &self.signal);
                    stats.received += 1;
                }
                Ok(_) => {}
                Err(err) => {
                    stats.read_errors += 1;
                    log::trace!("console: debug read failed: {}", err);
                }
            }
        }
        stats
    }
}

/// Owner of a running reader task
pub struct ReaderHandle {
    name: String,
    stop_tx: Sender<()>,
    thread: JoinHandle<ReaderStats>,
}

impl ReaderHandle {
    /// Spawn a reader thread called `name`
    ///
    /// # Errors
    /// Returns [`DriverError::TaskSpawn`] if the thread cannot be created.
    pub fn spawn<S>(
        name: &str,
        channel: Arc<dyn DebugChannel>,
        fifo: Arc<ConsoleFifo>,
        signal: S,
    ) -> Result<Self>
    where
        S: StateSignal + 'static,
    {
        let (stop_tx, stop_rx) = channel::bounded(1);
        let task = ReaderTask {
            channel,
            fifo,
            signal,
            stop_rx,
        };
        let thread = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || task.run())
            .map_err(|err| DriverError::TaskSpawn(err.to_string()))?;

        log::debug!("console: started reader task {}", name);
        Ok(Self {
            name: name.to_owned(),
            stop_tx,
            thread,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True once the thread has exited
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Ask the task to stop and wait for it
    ///
    /// The task notices the request after its current channel read
    /// returns.
    pub fn stop(self) -> ReaderStats {
        let _ = self.stop_tx.try_send(());
        match self.thread.join() {
            Ok(stats) => {
                log::debug!(
                    "console: reader task {} stopped ({} bytes, {} read errors)",
                    self.name,
                    stats.received,
                    stats.read_errors
                );
                stats
            }
            Err(_) => {
                log::error!("console: reader task {} panicked", self.name);
                ReaderStats::default()
            }
        }
    }
}
