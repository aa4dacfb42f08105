//! # Communication Backends
//!
//! Transport layer for reaching printers over Bluetooth Classic serial
//! (RFCOMM / Serial Port Profile).
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bluetooth`] | Connection state machine, discovery, raw writes |
//! | [`strategy`] | Ordered, named connection strategies |

pub mod bluetooth;
pub mod strategy;

use serde::{Deserialize, Serialize};

use crate::error::RotuloError;
use crate::printer::PrinterKind;
use crate::protocol::CommandStream;

pub use bluetooth::{BluetoothTransport, RfcommPort};
pub use strategy::ConnectStrategy;

/// A paired Bluetooth device as reported by discovery.
///
/// `address` is the platform's device identifier; on Linux/BlueZ it is a MAC
/// string, but the format is not guaranteed across platforms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BluetoothDevice {
    /// Display name, when the platform reports one
    pub name: Option<String>,

    /// Platform device identifier
    pub address: String,
}

/// Connection lifecycle. No `Connecting → Connecting` re-entry: a connect
/// attempt while already connecting or connected is a caller error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Anything that can carry a command stream to a printer.
///
/// The single seam between job orchestration and device I/O; tests drive the
/// orchestrator against recording implementations.
pub trait Transport {
    /// Write one command stream, splicing any binary region in as raw bytes.
    ///
    /// Fire-and-forget: no acknowledgement is read back. Fails with
    /// [`RotuloError::Transport`] if no session is active or the underlying
    /// write fails; the failure is never retried here.
    fn send(&mut self, stream: &CommandStream) -> Result<(), RotuloError>;

    /// Write a wire-text command stream, decoding any sentinel-delimited
    /// base64 region back to raw bytes immediately before the write. This
    /// is the entry point for callers holding the external-interface string
    /// form.
    fn send_wire_text(&mut self, wire: &str) -> Result<(), RotuloError> {
        let stream = CommandStream::from_wire_text(wire)?;
        self.send(&stream)
    }
}

/// Operator guidance appended to connection failures, per printer family.
pub fn connect_remediation(kind: PrinterKind) -> &'static str {
    match kind {
        PrinterKind::Desktop => {
            "check that the desktop label printer is powered on, paired, and \
             not held open by another host"
        }
        PrinterKind::Portable => {
            "check that the portable printer is charged, in range, and paired \
             (portable units drop pairing after long power-off)"
        }
    }
}
