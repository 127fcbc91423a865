//! Debug channel primitive
//!
//! The lowest-level byte channel a kernel offers for diagnostics: a read
//! that yields whatever input is pending (or nothing) and a write that
//! pushes bytes straight to the debug output.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::{DriverError, Result};

/// Debug input/output primitive
pub trait DebugChannel: Send + Sync {
    /// Read pending input into `buf`
    ///
    /// May block, but must return periodically (with `Ok(0)` if nothing
    /// arrived) so callers can observe cancellation.
    fn read(&self, buf: &mut [u8]) -> Result<usize>;

    /// Write `buf` to the debug output, returning the bytes accepted
    fn write(&self, buf: &[u8]) -> Result<usize>;
}

fn io_status(err: &io::Error) -> i32 {
    err.raw_os_error().map_or(-1, |code| -code)
}

enum HostInput {
    Byte(u8),
    Eof,
    Error(i32),
}

/// Pulls from a blocking reader and forwards each byte
fn pump_input<R: Read>(mut source: R, tx: Sender<HostInput>) {
    let mut chunk = [0u8; 256];
    loop {
        let event = match source.read(&mut chunk) {
            Ok(0) => HostInput::Eof,
            Ok(n) => {
                for &byte in &chunk[..n] {
                    if tx.send(HostInput::Byte(byte)).is_err() {
                        return;
                    }
                }
                continue;
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => HostInput::Error(io_status(&err)),
        };
        // Eof and read errors both end the pump.
        let _ = tx.send(event);
        return;
    }
}

/// Debug channel backed by a host byte source (stdin) and stderr
///
/// The source is drained by a helper thread, so `read` waits at most
/// the idle interval before returning `Ok(0)`.
pub struct HostDebugChannel {
    idle: Duration,
    input: Receiver<HostInput>,
    eof: AtomicBool,
}

impl HostDebugChannel {
    /// Longest a `read` waits for input
    pub const DEFAULT_IDLE: Duration = Duration::from_millis(100);

    /// Bytes buffered between the helper thread and `read`
    const INPUT_DEPTH: usize = 4096;

    /// Channel reading the process's stdin
    pub fn new() -> Result<Self> {
        Self::from_reader(io::stdin(), Self::DEFAULT_IDLE)
    }

    /// Channel reading `source` on a helper thread
    ///
    /// # Errors
    /// Returns [`DriverError::TaskSpawn`] if the helper thread cannot be
    /// created.
    pub fn from_reader<R>(source: R, idle: Duration) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = channel::bounded(Self::INPUT_DEPTH);
        thread::Builder::new()
            .name("debug-input".into())
            .spawn(move || pump_input(source, tx))
            .map_err(|err| DriverError::TaskSpawn(err.to_string()))?;
        Ok(Self {
            idle,
            input: rx,
            eof: AtomicBool::new(false),
        })
    }

    /// True once the source has reported end of input
    pub fn at_eof(&self) -> bool {
        self.eof.load(Ordering::Acquire)
    }

    fn mark_eof(&self) {
        if !self.eof.swap(true, Ordering::AcqRel) {
            log::debug!("dddk: debug input reached end of stream");
        }
    }
}

impl DebugChannel for HostDebugChannel {
    fn read(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.at_eof() {
            thread::sleep(self.idle);
            return Ok(0);
        }

        match self.input.recv_timeout(self.idle) {
            Ok(HostInput::Byte(byte)) => buf[0] = byte,
            Ok(HostInput::Eof) | Err(RecvTimeoutError::Disconnected) => {
                self.mark_eof();
                return Ok(0);
            }
            Ok(HostInput::Error(status)) => {
                self.mark_eof();
                return Err(DriverError::Io(status));
            }
            Err(RecvTimeoutError::Timeout) => return Ok(0),
        }

        let mut copied = 1;
        while copied < buf.len() {
            match self.input.try_recv() {
                Ok(HostInput::Byte(byte)) => {
                    buf[copied] = byte;
                    copied += 1;
                }
                Ok(HostInput::Eof) | Err(TryRecvError::Disconnected) => {
                    self.mark_eof();
                    break;
                }
                Ok(HostInput::Error(status)) => {
                    log::debug!("dddk: debug input failed (status {})", status);
                    self.mark_eof();
                    break;
                }
                Err(TryRecvError::Empty) => break,
            }
        }
        Ok(copied)
    }

    fn write(&self, buf: &[u8]) -> Result<usize> {
        let mut stderr = io::stderr().lock();
        let written = stderr.write(buf).map_err(|err| DriverError::Io(io_status(&err)))?;
        stderr.flush().map_err(|err| DriverError::Io(io_status(&err)))?;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    /// Source that blocks until its sender is dropped
    struct StalledSource(Receiver<()>);

    impl Read for StalledSource {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            let _ = self.0.recv();
            Ok(0)
        }
    }

    struct FailingSource;

    impl Read for FailingSource {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::from_raw_os_error(5))
        }
    }

    #[test]
    fn test_io_status_uses_negated_errno() {
        let err = io::Error::from_raw_os_error(5);
        assert_eq!(io_status(&err), -5);
        let err = io::Error::new(io::ErrorKind::Other, "synthetic");
        assert_eq!(io_status(&err), -1);
    }

    #[test]
    fn test_host_write_reports_count() {
        let channel = HostDebugChannel::from_reader(io::empty(), Duration::from_millis(5)).unwrap();
        assert_eq!(channel.write(b"").unwrap(), 0);
    }

    #[test]
    fn test_read_returns_while_source_blocks() {
        let (hold, stalled) = channel::bounded::<()>(0);
        let channel =
            HostDebugChannel::from_reader(StalledSource(stalled), Duration::from_millis(10))
                .unwrap();

        let mut byte = [0u8; 1];
        let start = Instant::now();
        assert_eq!(channel.read(&mut byte), Ok(0));
        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(!channel.at_eof());
        drop(hold);
    }

    #[test]
    fn test_read_delivers_bytes_then_eof() {
        let source = io::Cursor::new(b"hi!".to_vec());
        let channel = HostDebugChannel::from_reader(source, Duration::from_millis(50)).unwrap();

        let mut out = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(5);
        while !channel.at_eof() && Instant::now() < deadline {
            let mut byte = [0u8; 1];
            if channel.read(&mut byte).unwrap() == 1 {
                out.push(byte[0]);
            }
        }
        assert_eq!(out, b"hi!");
        assert!(channel.at_eof());
    }

    #[test]
    fn test_read_fills_larger_buffer() {
        let source = io::Cursor::new(b"abcd".to_vec());
        let channel = HostDebugChannel::from_reader(source, Duration::from_millis(50)).unwrap();
        // Let the helper forward everything before reading.
        thread::sleep(Duration::from_millis(50));

        let mut buf = [0u8; 8];
        let n = channel.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], &b"abcd"[..n]);
        assert!(n >= 1);
    }

    #[test]
    fn test_source_error_is_reported_once() {
        let channel = HostDebugChannel::from_reader(FailingSource, Duration::from_millis(200)).unwrap();
        let mut byte = [0u8; 1];
        assert_eq!(channel.read(&mut byte), Err(DriverError::Io(-5)));
        assert_eq!(channel.read(&mut byte), Ok(0));
        assert!(channel.at_eof());
    }
}
