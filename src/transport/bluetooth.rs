//! # Bluetooth RFCOMM Transport
//!
//! Communication with label printers over Bluetooth Serial Port Profile
//! (SPP) via RFCOMM.
//!
//! ## Connection Model
//!
//! ```text
//! Disconnected ──connect()──► Connecting ──► Connected
//!      ▲                          │               │
//!      └───────── failure ────────┘    disconnect()┘
//! ```
//!
//! The transport holds at most one session; `connect()` while connecting or
//! connected is rejected rather than queued. Connecting walks the ordered
//! strategy chain from [`strategy`](super::strategy); if every strategy
//! fails with errors suggesting an unpaired device, the device is paired and
//! the chain retried, with the insecure-channel variant as the final
//! resort.
//!
//! ## TTY Configuration
//!
//! RFCOMM device nodes are configured for raw binary transmission:
//!
//! - **No input processing**: IGNBRK, BRKINT, PARMRK, ISTRIP, etc. disabled
//! - **No output processing**: OPOST disabled (no CR/LF translation)
//! - **8-bit characters**: CS8, no parity
//! - **No echo, non-canonical**: ECHO/ICANON disabled
//! - **No XON/XOFF**: 0x11/0x13 appear in binary raster data
//!
//! Plain-file targets (dry-run printing) skip TTY configuration.
//!
//! ## Chunked Writes
//!
//! Large command streams are written in chunks with a small delay between
//! chunks; the serial channel has no flow-control feedback and printer
//! receive buffers are small.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::process::Command;
use std::thread;
use std::time::Duration;

use crate::error::RotuloError;
use crate::protocol::CommandStream;

use super::strategy::{self, ConnectStrategy};
use super::{BluetoothDevice, ConnectionState, Transport};

/// Default chunk size for writes (bytes)
const CHUNK_SIZE: usize = 4096;

/// Delay between chunks (milliseconds)
const CHUNK_DELAY_MS: u64 = 2;

// ============================================================================
// RFCOMM PORT
// ============================================================================

/// An open serial channel to a printer: an RFCOMM device node, or a plain
/// file for dry-run printing.
pub struct RfcommPort {
    file: std::fs::File,
    path: String,
    /// RFCOMM index this session bound, if any; released on disconnect.
    bound_index: Option<u8>,
}

impl RfcommPort {
    /// Open a device node (or plain file) for writing.
    ///
    /// TTY raw mode is applied only when the target actually is a terminal
    /// device; plain files pass through so command streams can be captured
    /// for inspection.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RotuloError> {
        let path = path.as_ref();
        let file = OpenOptions::new().write(true).open(path).map_err(|e| {
            RotuloError::Connect(format!("failed to open {}: {}", path.display(), e))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            let fd = file.as_raw_fd();
            if unsafe { libc::isatty(fd) } == 1 {
                configure_tty_raw(fd)?;
            }
        }

        Ok(Self {
            file,
            path: path.display().to_string(),
            bound_index: None,
        })
    }

    /// Record the RFCOMM index this port's binding occupies.
    pub fn with_bound_index(mut self, index: u8) -> Self {
        self.bound_index = Some(index);
        self
    }

    /// Device path this port writes to.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.file.write_all(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Configure a file descriptor for raw TTY mode so binary data passes
/// through unmodified.
///
/// IXON/IXOFF/IXANY disable XON/XOFF software flow control; 0x11 (XON/DC1)
/// and 0x13 (XOFF/DC3) can appear in binary raster data.
#[cfg(unix)]
fn configure_tty_raw(fd: i32) -> Result<(), RotuloError> {
    use std::mem::MaybeUninit;

    let mut termios = MaybeUninit::uninit();
    let result = unsafe { libc::tcgetattr(fd, termios.as_mut_ptr()) };
    if result != 0 {
        return Err(RotuloError::Connect(format!(
            "tcgetattr failed: {}",
            io::Error::last_os_error()
        )));
    }
    let mut termios = unsafe { termios.assume_init() };

    termios.c_iflag &= !(libc::IGNBRK
        | libc::BRKINT
        | libc::PARMRK
        | libc::ISTRIP
        | libc::INLCR
        | libc::IGNCR
        | libc::ICRNL
        | libc::IXON
        | libc::IXOFF
        | libc::IXANY);

    termios.c_oflag &= !libc::OPOST;

    termios.c_lflag &= !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::ISIG | libc::IEXTEN);

    termios.c_cflag &= !(libc::CSIZE | libc::PARENB);
    termios.c_cflag |= libc::CS8;

    let result = unsafe { libc::tcsetattr(fd, libc::TCSANOW, &termios) };
    if result != 0 {
        return Err(RotuloError::Connect(format!(
            "tcsetattr failed: {}",
            io::Error::last_os_error()
        )));
    }

    Ok(())
}

// ============================================================================
// SESSION
// ============================================================================

/// A live connection: the device plus its open port. Constructed on
/// successful connect, torn down on disconnect or failure.
struct Session {
    device: BluetoothDevice,
    port: RfcommPort,
}

// ============================================================================
// TRANSPORT
// ============================================================================

/// # Bluetooth Printer Transport
///
/// Owns the (single) connection session and the strategy chain used to
/// establish it.
///
/// ## Example
///
/// ```no_run
/// use rotulo::transport::{BluetoothTransport, Transport};
/// use rotulo::protocol::CommandStream;
///
/// let mut transport = BluetoothTransport::new();
/// transport.connect("00:11:62:AA:BB:CC")?;
/// transport.send(&CommandStream::Text("FORM\r\nPRINT\r\n".into()))?;
/// transport.disconnect();
/// # Ok::<(), rotulo::RotuloError>(())
/// ```
pub struct BluetoothTransport {
    state: ConnectionState,
    session: Option<Session>,
    strategies: Vec<Box<dyn ConnectStrategy>>,
    chunk_size: usize,
    chunk_delay: Duration,
}

impl BluetoothTransport {
    /// Transport with the platform's default strategy chain.
    pub fn new() -> Self {
        Self::with_strategies(strategy::default_strategies())
    }

    /// Transport with an explicit strategy chain (tests, exotic platforms).
    pub fn with_strategies(strategies: Vec<Box<dyn ConnectStrategy>>) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            session: None,
            strategies,
            chunk_size: CHUNK_SIZE,
            chunk_delay: Duration::from_millis(CHUNK_DELAY_MS),
        }
    }

    /// Set the chunk size for large writes.
    pub fn set_chunk_size(&mut self, size: usize) {
        self.chunk_size = size.max(1);
    }

    /// Set the delay between chunks.
    pub fn set_chunk_delay(&mut self, delay: Duration) {
        self.chunk_delay = delay;
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The connected device, if a session is active.
    pub fn connected_device(&self) -> Option<&BluetoothDevice> {
        self.session.as_ref().map(|s| &s.device)
    }

    /// List already-paired devices. Open scanning of unpaired devices is
    /// not part of the print path.
    pub fn paired_devices() -> Result<Vec<BluetoothDevice>, RotuloError> {
        let output = Command::new("bluetoothctl")
            .arg("paired-devices")
            .output()
            .map_err(|e| RotuloError::Adapter(format!("failed to run bluetoothctl: {}", e)))?;
        Ok(parse_paired_devices(&String::from_utf8_lossy(
            &output.stdout,
        )))
    }

    /// Best-effort adapter preflight: request runtime permissions where the
    /// platform has them and power the adapter on. Failures are logged and
    /// ignored; they never block a connect attempt.
    pub fn preflight() {
        let result = Command::new("bluetoothctl").arg("power").arg("on").output();
        match result {
            Ok(output) if !output.status.success() => {
                log::debug!(
                    "adapter power-on ignored failure: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                );
            }
            Err(e) => log::debug!("adapter preflight unavailable: {}", e),
            _ => {}
        }
    }

    /// Connect to a device by address, walking the strategy chain.
    ///
    /// ## Errors
    ///
    /// - `Connect` if already connecting/connected (caller error), or when
    ///   every strategy, the pairing retry, and the insecure last resort
    ///   have failed. The message names each strategy and its failure.
    pub fn connect(&mut self, address: &str) -> Result<(), RotuloError> {
        match self.state {
            ConnectionState::Connecting => {
                return Err(RotuloError::Connect(
                    "connect attempt already in progress".into(),
                ));
            }
            ConnectionState::Connected => {
                return Err(RotuloError::Connect(
                    "already connected; disconnect first".into(),
                ));
            }
            ConnectionState::Disconnected => {}
        }

        self.state = ConnectionState::Connecting;
        Self::preflight();

        match self.run_strategy_chain(address) {
            Ok(port) => {
                self.session = Some(Session {
                    device: BluetoothDevice {
                        name: None,
                        address: address.to_string(),
                    },
                    port,
                });
                self.state = ConnectionState::Connected;
                Ok(())
            }
            Err(e) => {
                self.state = ConnectionState::Disconnected;
                Err(e)
            }
        }
    }

    /// Open a session directly on a known device node or plain file,
    /// bypassing the strategy chain (the node is the address).
    pub fn connect_path<P: AsRef<Path>>(&mut self, path: P) -> Result<(), RotuloError> {
        match self.state {
            ConnectionState::Connecting => {
                return Err(RotuloError::Connect(
                    "connect attempt already in progress".into(),
                ));
            }
            ConnectionState::Connected => {
                return Err(RotuloError::Connect(
                    "already connected; disconnect first".into(),
                ));
            }
            ConnectionState::Disconnected => {}
        }

        let port = RfcommPort::open(path)?;
        self.session = Some(Session {
            device: BluetoothDevice {
                name: None,
                address: port.path().to_string(),
            },
            port,
        });
        self.state = ConnectionState::Connected;
        Ok(())
    }

    fn run_strategy_chain(&self, address: &str) -> Result<RfcommPort, RotuloError> {
        let mut failures: Vec<(&'static str, String)> = Vec::new();

        for s in &self.strategies {
            log::debug!("connect {}: trying strategy {}", address, s.name());
            match s.attempt(address) {
                Ok(port) => return Ok(port),
                Err(e) => failures.push((s.name(), e.to_string())),
            }
        }

        // All strategies failed. If the failures smell like an unpaired
        // device, pair and walk the chain again (skipping stale-binding
        // reuse, which cannot exist for a freshly paired device).
        if failures.iter().any(|(_, msg)| suggests_unpaired(msg)) {
            log::warn!("connect {}: errors suggest unpaired device, pairing", address);
            if pair_device(address) {
                for s in self.strategies.iter().skip(1) {
                    log::debug!("connect {}: retry strategy {}", address, s.name());
                    match s.attempt(address) {
                        Ok(port) => return Ok(port),
                        Err(e) => failures.push((s.name(), format!("after pairing: {}", e))),
                    }
                }
            }
        }

        // Last resort: insecure channel variant.
        let insecure = strategy::insecure_strategy();
        log::debug!("connect {}: trying strategy {}", address, insecure.name());
        match insecure.attempt(address) {
            Ok(port) => return Ok(port),
            Err(e) => failures.push((insecure.name(), e.to_string())),
        }

        let detail = failures
            .iter()
            .map(|(name, msg)| format!("{}: {}", name, msg))
            .collect::<Vec<_>>()
            .join("; ");
        Err(RotuloError::Connect(format!(
            "all connection strategies failed for {} ({})",
            address, detail
        )))
    }

    /// Tear down the session.
    ///
    /// The in-memory session is always cleared, even when flushing the port
    /// or releasing the RFCOMM binding fails; those failures are logged
    /// only.
    pub fn disconnect(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.port.flush() {
                log::warn!("flush during disconnect failed: {}", e);
            }
            if let Some(index) = session.port.bound_index {
                strategy::release_binding(index);
            }
        }
        self.state = ConnectionState::Disconnected;
    }

    /// Write raw bytes through the active session, chunked.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<(), RotuloError> {
        let chunk_size = self.chunk_size;
        let chunk_delay = self.chunk_delay;
        let session = self.session.as_mut().ok_or_else(|| {
            RotuloError::Transport("no active session (connect first)".into())
        })?;

        if data.len() <= chunk_size {
            session
                .port
                .write_all(data)
                .map_err(|e| RotuloError::Transport(format!("write failed: {}", e)))?;
        } else {
            for chunk in data.chunks(chunk_size) {
                session
                    .port
                    .write_all(chunk)
                    .map_err(|e| RotuloError::Transport(format!("write failed: {}", e)))?;
                if !chunk_delay.is_zero() {
                    thread::sleep(chunk_delay);
                }
            }
        }

        session
            .port
            .flush()
            .map_err(|e| RotuloError::Transport(format!("flush failed: {}", e)))
    }

    /// Write a UTF-8 command script through the active session.
    pub fn write_str(&mut self, text: &str) -> Result<(), RotuloError> {
        self.write_bytes(text.as_bytes())
    }
}

impl Default for BluetoothTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for BluetoothTransport {
    fn send(&mut self, stream: &CommandStream) -> Result<(), RotuloError> {
        // Binary regions become raw bytes here, immediately before the
        // write; no other layer handles true binary I/O.
        self.write_bytes(&stream.to_bytes())
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Validate a Bluetooth MAC address format (XX:XX:XX:XX:XX:XX).
///
/// Addresses are platform identifiers and not guaranteed to be MACs; this
/// is a convenience check for CLI input, not a gate on connect().
pub fn is_valid_mac(mac: &str) -> bool {
    let parts: Vec<&str> = mac.split(':').collect();
    if parts.len() != 6 {
        return false;
    }
    parts
        .iter()
        .all(|part| part.len() == 2 && part.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Parse `bluetoothctl paired-devices` output.
///
/// Lines look like `Device 00:11:62:AA:BB:CC Gainscha GA-2408` (the name may
/// be absent).
fn parse_paired_devices(listing: &str) -> Vec<BluetoothDevice> {
    let mut devices = Vec::new();
    for line in listing.lines() {
        let Some(rest) = line.trim().strip_prefix("Device ") else {
            continue;
        };
        let mut parts = rest.splitn(2, ' ');
        let Some(address) = parts.next().filter(|a| !a.is_empty()) else {
            continue;
        };
        let name = parts
            .next()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from);
        devices.push(BluetoothDevice {
            name,
            address: address.to_string(),
        });
    }
    devices
}

/// Whether a strategy failure message suggests the device is unpaired.
fn suggests_unpaired(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("not paired")
        || lower.contains("not available")
        || lower.contains("authentication")
        || lower.contains("no such device")
}

/// Pair with a device via the stack's pairing entry point. Returns whether
/// pairing reported success.
fn pair_device(address: &str) -> bool {
    let result = Command::new("bluetoothctl").arg("pair").arg(address).output();
    match result {
        Ok(output) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let ok = stdout.contains("Pairing successful") || stdout.contains("already paired");
            if !ok {
                log::warn!("pairing {} failed: {}", address, stdout.trim());
            }
            ok
        }
        Err(e) => {
            log::warn!("failed to run bluetoothctl pair: {}", e);
            false
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysFails(&'static str);

    impl ConnectStrategy for AlwaysFails {
        fn name(&self) -> &'static str {
            self.0
        }

        fn attempt(&self, _address: &str) -> Result<RfcommPort, RotuloError> {
            Err(RotuloError::Connect("boom".into()))
        }
    }

    #[test]
    fn test_valid_mac_addresses() {
        assert!(is_valid_mac("00:11:22:33:44:55"));
        assert!(is_valid_mac("AA:BB:CC:DD:EE:FF"));
        assert!(is_valid_mac("aa:bb:cc:dd:ee:ff"));
    }

    #[test]
    fn test_invalid_mac_addresses() {
        assert!(!is_valid_mac("00:11:22:33:44")); // too short
        assert!(!is_valid_mac("00:11:22:33:44:55:66")); // too long
        assert!(!is_valid_mac("00-11-22-33-44-55")); // wrong separator
        assert!(!is_valid_mac("GG:HH:II:JJ:KK:LL")); // invalid hex
        assert!(!is_valid_mac("")); // empty
    }

    #[test]
    fn test_parse_paired_devices() {
        let listing = "Device 00:11:62:AA:BB:CC Gainscha GA-2408\n\
                       Device 11:22:33:44:55:66\n\
                       something else entirely\n";
        let devices = parse_paired_devices(listing);
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].address, "00:11:62:AA:BB:CC");
        assert_eq!(devices[0].name.as_deref(), Some("Gainscha GA-2408"));
        assert_eq!(devices[1].name, None);
    }

    #[test]
    fn test_parse_paired_devices_empty() {
        assert!(parse_paired_devices("").is_empty());
    }

    #[test]
    fn test_suggests_unpaired() {
        assert!(suggests_unpaired("Device 00:11 not paired"));
        assert!(suggests_unpaired("org.bluez.Error: Authentication Failed"));
        assert!(!suggests_unpaired("write failed: broken pipe"));
    }

    #[test]
    fn test_write_without_session_is_transport_error() {
        let mut transport = BluetoothTransport::with_strategies(Vec::new());
        let err = transport.write_bytes(b"CLS\r\n").unwrap_err();
        assert!(matches!(err, RotuloError::Transport(_)));
    }

    #[test]
    fn test_connect_with_empty_chain_fails_and_resets_state() {
        let mut transport = BluetoothTransport::with_strategies(Vec::new());
        // Empty chain: only the insecure last resort runs, which fails off-hardware
        let result = transport.connect("00:11:22:33:44:55");
        assert!(result.is_err());
        assert_eq!(transport.state(), ConnectionState::Disconnected);
        assert!(transport.connected_device().is_none());
    }

    #[test]
    fn test_connect_error_names_failed_strategies() {
        let mut transport = BluetoothTransport::with_strategies(vec![
            Box::new(AlwaysFails("first")),
            Box::new(AlwaysFails("second")),
        ]);
        let err = transport.connect("00:11:22:33:44:55").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("first"));
        assert!(msg.contains("second"));
    }

    #[test]
    fn test_disconnect_when_disconnected_is_noop() {
        let mut transport = BluetoothTransport::with_strategies(Vec::new());
        transport.disconnect();
        assert_eq!(transport.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_connect_path_to_plain_file_and_write() {
        let path = std::env::temp_dir().join(format!("rotulo-test-{}.bin", std::process::id()));
        std::fs::write(&path, b"").unwrap();

        let mut transport = BluetoothTransport::with_strategies(Vec::new());
        transport.connect_path(&path).unwrap();
        assert_eq!(transport.state(), ConnectionState::Connected);

        // Re-entrant connect is rejected while connected
        let err = transport.connect("00:11:22:33:44:55").unwrap_err();
        assert!(matches!(err, RotuloError::Connect(_)));

        transport.write_bytes(b"CLS\r\n").unwrap();
        transport.disconnect();
        assert_eq!(transport.state(), ConnectionState::Disconnected);

        assert_eq!(std::fs::read(&path).unwrap(), b"CLS\r\n");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_chunked_write_preserves_byte_order() {
        let path = std::env::temp_dir().join(format!("rotulo-chunk-{}.bin", std::process::id()));
        std::fs::write(&path, b"").unwrap();

        let mut transport = BluetoothTransport::with_strategies(Vec::new());
        transport.set_chunk_size(4);
        transport.set_chunk_delay(Duration::ZERO);
        transport.connect_path(&path).unwrap();

        let data: Vec<u8> = (0..=255u8).collect();
        transport.write_bytes(&data).unwrap();
        transport.disconnect();

        assert_eq!(std::fs::read(&path).unwrap(), data);
        let _ = std::fs::remove_file(&path);
    }
}
