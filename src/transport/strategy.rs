//! # Connection Strategies
//!
//! No single Bluetooth serial surface is guaranteed present across
//! vendor/OS combinations, so connecting is an explicit, ordered list of
//! named strategies. Each strategy is self-contained: it either produces an
//! open [`RfcommPort`] or reports why it could not. The chain driver in
//! [`bluetooth`](super::bluetooth) iterates the list and stops at the first
//! success. Straight-line iteration, no exception-driven fallbacks.
//!
//! ## Default Unix Chain
//!
//! 1. [`ReuseBinding`]: an RFCOMM device node already bound to the address
//! 2. [`BindAndOpen`]: bind a free RFCOMM channel, then open it
//! 3. [`StackConnect`]: drive `bluetoothctl connect`, then bind and open
//!
//! Pairing is not a strategy: when every strategy fails and the collected
//! errors suggest an unpaired device, the chain driver pairs and retries.
//! [`InsecureChannel`] sits outside the list as the driver's last resort.

use std::path::Path;
use std::process::Command;
use std::thread;
use std::time::Duration;

use crate::error::RotuloError;

use super::bluetooth::RfcommPort;

/// Standard SPP channel
const SPP_CHANNEL: u8 = 1;

/// Channels tried by the insecure last-resort variant
const INSECURE_CHANNELS: &[u8] = &[2, 3];

/// Settle time after driving an external Bluetooth tool
const SETTLE: Duration = Duration::from_millis(500);

/// One self-contained way of opening a serial channel to a device.
pub trait ConnectStrategy {
    /// Strategy name, used in logs and in the aggregated connect error.
    fn name(&self) -> &'static str;

    /// Try to open a port to `address`. Must not leave half-open state
    /// behind on failure.
    fn attempt(&self, address: &str) -> Result<RfcommPort, RotuloError>;
}

/// The platform's default strategy chain, fixed at build time.
#[cfg(unix)]
pub fn default_strategies() -> Vec<Box<dyn ConnectStrategy>> {
    vec![
        Box::new(ReuseBinding),
        Box::new(BindAndOpen),
        Box::new(StackConnect),
    ]
}

#[cfg(not(unix))]
pub fn default_strategies() -> Vec<Box<dyn ConnectStrategy>> {
    Vec::new()
}

/// The last-resort insecure-channel variant, applied by the chain driver
/// after pairing retries are exhausted.
pub fn insecure_strategy() -> Box<dyn ConnectStrategy> {
    Box::new(InsecureChannel)
}

// ============================================================================
// STRATEGIES (Unix / BlueZ)
// ============================================================================

/// Reuse an RFCOMM device node already bound to the address from an earlier
/// session or an operator's manual `rfcomm bind`.
pub struct ReuseBinding;

impl ConnectStrategy for ReuseBinding {
    fn name(&self) -> &'static str {
        "reuse-binding"
    }

    fn attempt(&self, address: &str) -> Result<RfcommPort, RotuloError> {
        let device = find_bound_device(address)?.ok_or_else(|| {
            RotuloError::Connect(format!("no existing RFCOMM binding for {}", address))
        })?;
        RfcommPort::open(&device)
    }
}

/// Bind a free RFCOMM index to the address on the standard SPP channel,
/// then open the resulting device node.
pub struct BindAndOpen;

impl ConnectStrategy for BindAndOpen {
    fn name(&self) -> &'static str {
        "bind-and-open"
    }

    fn attempt(&self, address: &str) -> Result<RfcommPort, RotuloError> {
        bind_and_open(address, SPP_CHANNEL)
    }
}

/// Ask the Bluetooth stack to connect first (`bluetoothctl connect`), then
/// bind and open. Some controllers only expose the serial channel once a
/// baseband connection exists.
pub struct StackConnect;

impl ConnectStrategy for StackConnect {
    fn name(&self) -> &'static str {
        "stack-connect"
    }

    fn attempt(&self, address: &str) -> Result<RfcommPort, RotuloError> {
        let output = Command::new("bluetoothctl")
            .arg("connect")
            .arg(address)
            .output()
            .map_err(|e| RotuloError::Connect(format!("failed to run bluetoothctl: {}", e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.contains("Connection successful") && !stdout.contains("already connected") {
            return Err(RotuloError::Connect(format!(
                "bluetoothctl connect {}: {}",
                address,
                stdout.trim()
            )));
        }

        thread::sleep(SETTLE);
        bind_and_open(address, SPP_CHANNEL)
    }
}

/// Last resort: bind alternate SPP channels without re-authentication.
/// Some printers expose an unauthenticated serial channel above the
/// standard one.
pub struct InsecureChannel;

impl ConnectStrategy for InsecureChannel {
    fn name(&self) -> &'static str {
        "insecure-channel"
    }

    fn attempt(&self, address: &str) -> Result<RfcommPort, RotuloError> {
        let mut last = None;
        for &channel in INSECURE_CHANNELS {
            match bind_and_open(address, channel) {
                Ok(port) => return Ok(port),
                Err(e) => last = Some(e),
            }
        }
        Err(last.unwrap_or_else(|| {
            RotuloError::Connect("no insecure channels configured".into())
        }))
    }
}

// ============================================================================
// SHARED HELPERS
// ============================================================================

/// Find an existing RFCOMM device node bound to the given address.
///
/// Checks `/proc/net/rfcomm` first (format: `rfcomm0: XX:XX:XX:XX:XX:XX
/// channel N ...`), falling back to `rfcomm -a`.
#[cfg(unix)]
pub fn find_bound_device(address: &str) -> Result<Option<String>, RotuloError> {
    let needle = address.to_uppercase();

    if let Ok(contents) = std::fs::read_to_string("/proc/net/rfcomm") {
        if let Some(device) = scan_rfcomm_table(&contents, &needle) {
            return Ok(Some(device));
        }
    }

    let output = Command::new("rfcomm")
        .arg("-a")
        .output()
        .map_err(|e| RotuloError::Connect(format!("failed to run 'rfcomm -a': {}", e)))?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(scan_rfcomm_table(&stdout, &needle))
}

#[cfg(not(unix))]
pub fn find_bound_device(_address: &str) -> Result<Option<String>, RotuloError> {
    Ok(None)
}

/// Scan an rfcomm listing for a line mentioning `needle` (uppercased
/// address) and return the corresponding `/dev/rfcommN` path if it exists.
fn scan_rfcomm_table(listing: &str, needle: &str) -> Option<String> {
    for line in listing.lines() {
        if !line.to_uppercase().contains(needle) {
            continue;
        }
        if let Some(dev_name) = line.split(':').next() {
            let device_path = format!("/dev/{}", dev_name.trim());
            if Path::new(&device_path).exists() {
                return Some(device_path);
            }
        }
    }
    None
}

/// First `/dev/rfcommN` index not currently present.
#[cfg(unix)]
fn free_rfcomm_index() -> Option<u8> {
    (0..=9u8).find(|n| !Path::new(&format!("/dev/rfcomm{}", n)).exists())
}

/// Bind a free RFCOMM index to `address` on `channel` and open the node.
///
/// The binding is released again if the node never appears or cannot be
/// opened, so a failed attempt leaves nothing behind.
#[cfg(unix)]
pub fn bind_and_open(address: &str, channel: u8) -> Result<RfcommPort, RotuloError> {
    let index = free_rfcomm_index()
        .ok_or_else(|| RotuloError::Connect("no free RFCOMM device index".into()))?;
    let device_path = format!("/dev/rfcomm{}", index);

    let output = Command::new("rfcomm")
        .arg("bind")
        .arg(index.to_string())
        .arg(address)
        .arg(channel.to_string())
        .output()
        .map_err(|e| RotuloError::Connect(format!("failed to run rfcomm bind: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(RotuloError::Connect(format!(
            "rfcomm bind {} ch{}: {}",
            address,
            channel,
            stderr.trim()
        )));
    }

    thread::sleep(SETTLE);

    if !Path::new(&device_path).exists() {
        release_binding(index);
        return Err(RotuloError::Connect(format!(
            "{} was not created after bind",
            device_path
        )));
    }

    match RfcommPort::open(&device_path) {
        Ok(port) => Ok(port.with_bound_index(index)),
        Err(e) => {
            release_binding(index);
            Err(e)
        }
    }
}

#[cfg(not(unix))]
pub fn bind_and_open(_address: &str, _channel: u8) -> Result<RfcommPort, RotuloError> {
    Err(RotuloError::Connect(
        "RFCOMM binding not supported on this platform".into(),
    ))
}

/// Release an rfcomm binding, logging but swallowing failures.
pub fn release_binding(index: u8) {
    let result = Command::new("rfcomm")
        .arg("release")
        .arg(index.to_string())
        .output();
    match result {
        Ok(output) if !output.status.success() => {
            log::warn!(
                "rfcomm release {} failed: {}",
                index,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Err(e) => log::warn!("rfcomm release {} failed: {}", index, e),
        _ => {}
    }
}
