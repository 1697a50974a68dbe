//! # Transport Module
//!
//! Line oriented duplex channel to the robot's controller. Commands are written synchronously on
//! the caller's thread, while a background reader thread splits the incoming byte stream into
//! lines and queues them for whoever needs them next.
//!
//! The transport makes no attempt to pair responses with commands, a response may arrive at any
//! time relative to the next [`Transport::send`].

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    collections::HashSet,
    io::{self, BufRead, BufReader, Read, Write},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{sync_channel, Receiver, RecvTimeoutError, SyncSender, TryRecvError, TrySendError},
        Arc, Mutex, MutexGuard,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use comms_if::eqpt::pip::PipCmd;
use conquer_once::OnceCell;
use log::{debug, trace, warn};
use serial2::SerialPort;

// ------------------------------------------------------------------------------------------------
// STATICS
// ------------------------------------------------------------------------------------------------

/// Serial devices which currently have an open transport.
static OPEN_DEVICES: OnceCell<Mutex<HashSet<String>>> = OnceCell::uninit();

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// How long the reader waits before retrying when the line queue is full.
const FULL_QUEUE_BACKOFF: Duration = Duration::from_millis(10);

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

type LineResult = Result<String, io::Error>;

/// A line oriented connection to the robot's controller.
///
/// Dropping the transport (or calling [`Transport::close`]) stops the reader thread and releases
/// the device.
pub struct Transport {
    writer: Box<dyn Write + Send>,

    lines: Receiver<LineResult>,

    shutdown: Arc<AtomicBool>,

    join_handle: Option<JoinHandle<()>>,

    /// Path of the serial device, if this transport holds one
    device: Option<String>,
}

/// Options for the transport's reader.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Delay applied to each received line before it is made available, so that the controller's
    /// reply buffer is not overrun.
    ///
    /// The default value is 100 ms.
    pub line_pacing: Duration,

    /// Maximum number of received lines held in the queue. When the queue is full the reader
    /// stops reading from the device until lines are consumed.
    ///
    /// The default value is 32.
    pub queue_depth: usize,

    /// Read timeout set on serial devices. The reader checks for shutdown at least this often.
    ///
    /// The default value is 50 ms.
    pub read_timeout: Duration,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("Could not open serial device {0}: {1}")]
    OpenError(String, io::Error),

    #[error("Serial device {0} is already in use by another session")]
    DeviceBusy(String),

    #[error("Could not write to the device: {0}")]
    WriteError(io::Error),

    #[error("Could not read from the device: {0}")]
    ReadError(io::Error),

    #[error("The response reader has stopped, the device may have been disconnected")]
    ReaderStopped,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Transport {
    /// Open a transport over the serial device at `path`.
    ///
    /// Only one transport may hold a device at a time, a second open of the same path fails with
    /// [`TransportError::DeviceBusy`] until the first is closed.
    pub fn open_serial(
        path: &str,
        baud: u32,
        options: TransportOptions,
    ) -> Result<Self, TransportError> {
        register_device(path)?;

        match open_port(path, baud, &options) {
            Ok((reader, writer)) => {
                debug!("Opened serial device {} at {} baud", path, baud);
                let mut transport = Self::new(reader, writer, options);
                transport.device = Some(path.to_string());
                Ok(transport)
            }
            Err(e) => {
                release_device(path);
                Err(TransportError::OpenError(path.to_string(), e))
            }
        }
    }

    /// Create a transport over an arbitrary reader/writer pair.
    ///
    /// The reader must not block indefinitely: it should return `TimedOut` or `WouldBlock` errors
    /// periodically, otherwise closing the transport will wait for the next byte from the device.
    pub fn new<R, W>(reader: R, writer: W, options: TransportOptions) -> Self
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let (tx, rx) = sync_channel(options.queue_depth.max(1));

        let shutdown_clone = shutdown.clone();
        let pacing = options.line_pacing;
        let join_handle = thread::spawn(move || read_lines(reader, tx, shutdown_clone, pacing));

        Self {
            writer: Box::new(writer),
            lines: rx,
            shutdown,
            join_handle: Some(join_handle),
            device: None,
        }
    }

    /// Send a command to the device.
    pub fn send(&mut self, cmd: &PipCmd) -> Result<(), TransportError> {
        trace!("-> {}", cmd);
        self.send_raw(cmd.to_line().as_bytes())
    }

    /// Write bytes to the device verbatim. The caller supplies the line terminator.
    ///
    /// Any failure here leaves the controller with a partial command, so the session must be torn
    /// down rather than retried.
    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.writer
            .write_all(bytes)
            .and_then(|_| self.writer.flush())
            .map_err(TransportError::WriteError)
    }

    /// Block until the next response line arrives.
    pub fn next_line(&self) -> Result<String, TransportError> {
        match self.lines.recv() {
            Ok(line) => line.map_err(TransportError::ReadError),
            Err(_) => Err(TransportError::ReaderStopped),
        }
    }

    /// Wait up to `timeout` for the next response line, `None` if none arrived.
    pub fn next_line_timeout(&self, timeout: Duration) -> Result<Option<String>, TransportError> {
        match self.lines.recv_timeout(timeout) {
            Ok(line) => line.map(Some).map_err(TransportError::ReadError),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(TransportError::ReaderStopped),
        }
    }

    /// Take every line that is already queued without waiting.
    pub fn drain(&self) -> Result<Vec<String>, TransportError> {
        let mut drained = Vec::new();

        loop {
            match self.lines.try_recv() {
                Ok(line) => drained.push(line.map_err(TransportError::ReadError)?),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        Ok(drained)
    }

    /// Blocking iterator over response lines, ending when the reader stops.
    pub fn lines(&self) -> impl Iterator<Item = Result<String, TransportError>> + '_ {
        std::iter::from_fn(move || match self.next_line() {
            Err(TransportError::ReaderStopped) => None,
            r => Some(r),
        })
    }

    /// The serial device held by this transport, if any.
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    /// Stop the reader and release the device. Lines that have not been read are lost.
    pub fn close(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);

        if let Some(jh) = self.join_handle.take() {
            if jh.join().is_err() {
                warn!("Transport reader thread panicked");
            }
        }

        if let Some(device) = self.device.take() {
            release_device(&device);
            debug!("Released serial device {}", device);
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            line_pacing: Duration::from_millis(100),
            queue_depth: 32,
            read_timeout: Duration::from_millis(50),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn open_port(
    path: &str,
    baud: u32,
    options: &TransportOptions,
) -> io::Result<(SerialPort, SerialPort)> {
    let mut port = SerialPort::open(path, baud)?;
    port.set_read_timeout(options.read_timeout)?;
    let reader = port.try_clone()?;

    Ok((reader, port))
}

fn open_devices() -> MutexGuard<'static, HashSet<String>> {
    let devices = OPEN_DEVICES.get_or_init(|| Mutex::new(HashSet::new()));

    // The set is valid even if a holder panicked
    match devices.lock() {
        Ok(d) => d,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn register_device(path: &str) -> Result<(), TransportError> {
    match open_devices().insert(path.to_string()) {
        true => Ok(()),
        false => Err(TransportError::DeviceBusy(path.to_string())),
    }
}

fn release_device(path: &str) {
    open_devices().remove(path);
}

/// Reader thread body.
///
/// Reads lines until shutdown is requested, the device reaches EOF, or a read fails. A read
/// failure is passed on to the consumer before the thread exits.
fn read_lines<R: Read>(
    reader: R,
    sender: SyncSender<LineResult>,
    shutdown: Arc<AtomicBool>,
    pacing: Duration,
) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    while !shutdown.load(Ordering::Relaxed) {
        match reader.read_until(b'\n', &mut buf) {
            // EOF
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf).trim_end().to_string();
                buf.clear();

                if line.is_empty() {
                    continue;
                }

                trace!("<- {}", line);

                thread::sleep(pacing);

                if !push(&sender, Ok(line), &shutdown) {
                    break;
                }
            }
            // Partial data stays in buf until the rest of the line arrives
            Err(e) if e.kind() == io::ErrorKind::TimedOut || e.kind() == io::ErrorKind::WouldBlock => {
                continue
            }
            Err(e) => {
                warn!("Reading from the device failed: {}", e);
                push(&sender, Err(e), &shutdown);
                break;
            }
        }
    }

    debug!("Transport reader stopped");
}

/// Push an item into the queue, waiting for space. Returns false if the item could not be
/// delivered because of shutdown or because the consumer has gone.
fn push(sender: &SyncSender<LineResult>, item: LineResult, shutdown: &AtomicBool) -> bool {
    let mut item = item;

    loop {
        match sender.try_send(item) {
            Ok(()) => return true,
            Err(TrySendError::Full(i)) => {
                if shutdown.load(Ordering::Relaxed) {
                    return false;
                }
                item = i;
                thread::sleep(FULL_QUEUE_BACKOFF);
            }
            Err(TrySendError::Disconnected(_)) => return false,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// MOCK DEVICE
// ------------------------------------------------------------------------------------------------
