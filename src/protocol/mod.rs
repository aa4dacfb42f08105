//! # Printer Command Languages
//!
//! Two incompatible device families share the same bitmap input contract:
//!
//! | Module | Family | Framing |
//! |--------|--------|---------|
//! | [`tspl`] | Desktop label printers | Text header + raw binary `BITMAP` payload |
//! | [`cpcl`] | Portable printers | Pure text, hex-encoded `EG` payload |
//!
//! Both invert the working bitmap polarity on emission (TSPL per byte,
//! CPCL per hex nibble) because both languages mark on 0.
//!
//! [`stream`] holds the [`CommandStream`](stream::CommandStream) union the
//! encoders produce and the transport consumes.

pub mod cpcl;
pub mod stream;
pub mod tspl;

pub use cpcl::{CpclEncoder, MediaMode};
pub use stream::{BINARY_BEGIN, BINARY_END, CommandStream};
pub use tspl::TsplEncoder;
