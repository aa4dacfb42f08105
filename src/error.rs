//! # Error Types
//!
//! This module defines error types used throughout the rotulo library.

use thiserror::Error;

/// Main error type for rotulo operations
#[derive(Debug, Error)]
pub enum RotuloError {
    /// Raster render engine unavailable or timed out.
    ///
    /// Never fatal to a print: callers fall back to the built-in
    /// minimal renderer.
    #[error("Render error: {0}")]
    Render(String),

    /// Bad or missing template (empty body, unresolved placeholder).
    ///
    /// Callers recover by substituting the built-in fallback template.
    #[error("Template error: {0}")]
    Template(String),

    /// Command-language encoding error (bitmap/label geometry mismatch,
    /// malformed wire-form stream)
    #[error("Encode error: {0}")]
    Encode(String),

    /// All connection strategies exhausted
    #[error("Connect error: {0}")]
    Connect(String),

    /// Transport-level write errors (no session, write rejected).
    ///
    /// Aborts only the current job; never silently retried.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Bluetooth adapter / permission preflight failure.
    ///
    /// Best-effort only: logged by the transport, never blocks a
    /// subsequent connect attempt.
    #[error("Adapter error: {0}")]
    Adapter(String),

    /// Image processing error
    #[error("Image error: {0}")]
    Image(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
