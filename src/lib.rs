//! # Rotulo - Thermal Label Printing Library
//!
//! Rotulo prints declarative labels (product tags, receipt tags) on thermal
//! printers reached over a Bluetooth Classic serial link. Labels are
//! authored as HTML-like templates with `{{field}}` placeholders; at print
//! time they are rasterized to a monochrome bitmap and embedded in the
//! command language of the target device family:
//!
//! - **Desktop** label printers speaking a TSPL-style language
//!   (`BITMAP` command with a raw binary payload)
//! - **Portable** printers speaking a line-oriented CPCL-style language
//!   (`EG` command with a hex-text payload)
//!
//! ## Quick Start
//!
//! ```no_run
//! use rotulo::{
//!     client::PrintClient,
//!     label::{LabelTemplate, RenderRequest},
//!     printer::PrinterKind,
//! };
//!
//! let template = LabelTemplate {
//!     id: "tag".into(),
//!     name: "Product tag".into(),
//!     body: "<div>{{spec}}</div><img src=\"{{qrDataUrl}}\">".into(),
//!     device_body: None,
//!     is_default: true,
//! };
//!
//! let request = RenderRequest {
//!     fields: vec![
//!         ("spec".into(), "500g".into()),
//!         ("qrDataUrl".into(), "SKU123".into()),
//!     ],
//!     printer: PrinterKind::Desktop,
//!     copies: 1,
//!     render_as_bitmap: true,
//! };
//!
//! let mut client = PrintClient::new();
//! client.connect("00:11:62:AA:BB:CC", request.printer)?;
//! client.print(&template, &request)?;
//! client.disconnect();
//! # Ok::<(), rotulo::RotuloError>(())
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`label`] | Templates, render requests, placeholder substitution |
//! | [`render`] | Raster pipeline: engine, fallback, monochrome encoding |
//! | [`protocol`] | TSPL and CPCL command encoders, command streams |
//! | [`job`] | Copy semantics, batch pacing, per-item outcomes |
//! | [`transport`] | Bluetooth RFCOMM transport and connection strategies |
//! | [`printer`] | Printer kinds and label geometry |
//! | [`client`] | Caller-facing composition of the pipeline |
//! | [`error`] | Error types |

pub mod client;
pub mod error;
pub mod job;
pub mod label;
pub mod printer;
pub mod protocol;
pub mod render;
pub mod transport;

// Re-exports for convenience
pub use client::PrintClient;
pub use error::RotuloError;
pub use printer::{LabelConfig, PrinterKind};
pub use protocol::CommandStream;
pub use render::MonoBitmap;
pub use transport::BluetoothTransport;
