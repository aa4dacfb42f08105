//! # Command Streams
//!
//! A command stream is either pure text or text wrapping exactly one binary
//! region (the raw bitmap payload of a `BITMAP` command). The stream is kept
//! as a typed union in memory; string sentinels exist only in the *wire text*
//! form handed across the caller boundary, where the stream must survive a
//! text-oriented channel.
//!
//! ## Wire Text Form
//!
//! ```text
//! SIZE 40 mm,30 mm\r\n...BITMAP 0,0,40,240,0,__BINARY_DATA_BASE64__<b64>__END_BINARY__\r\nPRINT 1\r\n
//! ```
//!
//! The transport decodes the base64 region back to raw bytes immediately
//! before writing, so only that layer ever handles true binary I/O.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::error::RotuloError;

/// Marks the start of a base64-encoded binary region in wire text.
pub const BINARY_BEGIN: &str = "__BINARY_DATA_BASE64__";

/// Marks the end of a base64-encoded binary region in wire text.
pub const BINARY_END: &str = "__END_BINARY__";

/// A printer command stream.
///
/// Invariant: at most one binary region per stream, guaranteed by
/// construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandStream {
    /// A pure text command script (CPCL, or legacy pre-encoded templates)
    Text(String),

    /// A text script with one embedded binary payload (TSPL `BITMAP`)
    WithBinaryPayload {
        /// Text commands up to and including the binary command's header
        prefix: String,
        /// Raw payload bytes, spliced in verbatim at write time
        payload: Vec<u8>,
        /// Text commands following the payload
        suffix: String,
    },
}

impl CommandStream {
    /// Whether this stream carries a binary region.
    pub fn has_binary_payload(&self) -> bool {
        matches!(self, CommandStream::WithBinaryPayload { .. })
    }

    /// Flatten to the exact byte sequence the printer receives.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            CommandStream::Text(text) => text.as_bytes().to_vec(),
            CommandStream::WithBinaryPayload {
                prefix,
                payload,
                suffix,
            } => {
                let mut out = Vec::with_capacity(prefix.len() + payload.len() + suffix.len());
                out.extend_from_slice(prefix.as_bytes());
                out.extend_from_slice(payload);
                out.extend_from_slice(suffix.as_bytes());
                out
            }
        }
    }

    /// Render the caller-facing wire text: pure text streams pass through,
    /// binary regions become sentinel-delimited base64.
    pub fn to_wire_text(&self) -> String {
        match self {
            CommandStream::Text(text) => text.clone(),
            CommandStream::WithBinaryPayload {
                prefix,
                payload,
                suffix,
            } => {
                let mut out = String::with_capacity(
                    prefix.len() + suffix.len() + payload.len() * 4 / 3 + 40,
                );
                out.push_str(prefix);
                out.push_str(BINARY_BEGIN);
                out.push_str(&BASE64.encode(payload));
                out.push_str(BINARY_END);
                out.push_str(suffix);
                out
            }
        }
    }

    /// Parse wire text back into a typed stream, decoding the base64 region.
    ///
    /// ## Errors
    ///
    /// `Encode` if a begin sentinel has no matching end, the base64 is
    /// malformed, or more than one region is present.
    pub fn from_wire_text(wire: &str) -> Result<CommandStream, RotuloError> {
        let Some(begin) = wire.find(BINARY_BEGIN) else {
            return Ok(CommandStream::Text(wire.to_string()));
        };

        let after_begin = begin + BINARY_BEGIN.len();
        let end_rel = wire[after_begin..].find(BINARY_END).ok_or_else(|| {
            RotuloError::Encode("binary region begin sentinel without end sentinel".into())
        })?;
        let end = after_begin + end_rel;
        let after_end = end + BINARY_END.len();

        if wire[after_end..].contains(BINARY_BEGIN) {
            return Err(RotuloError::Encode(
                "command stream contains more than one binary region".into(),
            ));
        }

        let payload = BASE64
            .decode(&wire[after_begin..end])
            .map_err(|e| RotuloError::Encode(format!("invalid base64 binary region: {}", e)))?;

        Ok(CommandStream::WithBinaryPayload {
            prefix: wire[..begin].to_string(),
            payload,
            suffix: wire[after_end..].to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_stream_bytes() {
        let stream = CommandStream::Text("FORM\r\nPRINT\r\n".into());
        assert_eq!(stream.to_bytes(), b"FORM\r\nPRINT\r\n");
        assert!(!stream.has_binary_payload());
    }

    #[test]
    fn test_binary_stream_bytes_splice() {
        let stream = CommandStream::WithBinaryPayload {
            prefix: "BITMAP 0,0,1,2,0,".into(),
            payload: vec![0x00, 0xFF],
            suffix: "\r\nPRINT 1\r\n".into(),
        };
        let bytes = stream.to_bytes();
        assert_eq!(&bytes[..17], b"BITMAP 0,0,1,2,0,");
        assert_eq!(&bytes[17..19], &[0x00, 0xFF]);
        assert_eq!(&bytes[19..], b"\r\nPRINT 1\r\n");
    }

    #[test]
    fn test_wire_text_round_trip() {
        let stream = CommandStream::WithBinaryPayload {
            prefix: "HEAD,".into(),
            payload: vec![0xDE, 0xAD, 0xBE, 0xEF],
            suffix: "\r\nTAIL\r\n".into(),
        };
        let wire = stream.to_wire_text();
        assert!(wire.contains(BINARY_BEGIN));
        assert!(wire.contains(BINARY_END));

        let parsed = CommandStream::from_wire_text(&wire).unwrap();
        assert_eq!(parsed, stream);
    }

    #[test]
    fn test_wire_text_pure_text_passthrough() {
        let parsed = CommandStream::from_wire_text("! 0 203 203 240 1\r\n").unwrap();
        assert_eq!(parsed, CommandStream::Text("! 0 203 203 240 1\r\n".into()));
    }

    #[test]
    fn test_unterminated_region_rejected() {
        let wire = format!("HEAD{}AAAA", BINARY_BEGIN);
        assert!(CommandStream::from_wire_text(&wire).is_err());
    }

    #[test]
    fn test_second_region_rejected() {
        let wire = format!(
            "A{b}{p}{e}B{b}{p}{e}C",
            b = BINARY_BEGIN,
            e = BINARY_END,
            p = BASE64.encode([0u8])
        );
        assert!(CommandStream::from_wire_text(&wire).is_err());
    }

    #[test]
    fn test_bad_base64_rejected() {
        let wire = format!("A{}not-base64!{}B", BINARY_BEGIN, BINARY_END);
        assert!(CommandStream::from_wire_text(&wire).is_err());
    }
}
