//! # CPCL Encoder (Portable Printers)
//!
//! Emits the line-oriented CPCL-style command subset used by portable
//! printers:
//!
//! ```text
//! ! 0 203 203 240 1
//! PAGE-WIDTH 320
//! LABEL
//! GAP-SENSE
//! SPEED 4
//! TONE 0
//! EG 40 240 0 0 <hex>
//! FORM
//! PRINT
//! ```
//!
//! CPCL accepts only printable text, so the bitmap travels as uppercase
//! two-digits-per-byte hex with no separators.
//!
//! ## Polarity
//!
//! CPCL marks on 0 like TSPL, but the inversion is applied at *nibble*
//! granularity: each hex nibble `n` is emitted as `15 - n`. CPCL decoders
//! read nibbles independently, so the substitution is performed per nibble
//! while formatting, never as a byte-level shortcut.
//!
//! ## Media Modes
//!
//! `LABEL` + `GAP-SENSE` (gapped label stock) and `JOURNAL` (continuous
//! receipt paper) are mutually exclusive; [`MediaMode`] selects which
//! directives the header carries.

use crate::printer::config::LabelConfig;
use crate::protocol::stream::CommandStream;
use crate::render::mono::MonoBitmap;

/// Default print speed (0-5)
pub const DEFAULT_SPEED: u8 = 4;

/// Default darkness tone (-99 to 200; 0 = nominal)
pub const DEFAULT_TONE: i16 = 0;

/// Which media directives the CPCL header carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaMode {
    /// Gapped label stock: `LABEL` + `GAP-SENSE`
    #[default]
    Gapped,
    /// Continuous receipt paper: `JOURNAL`
    Continuous,
}

/// CPCL command stream builder for one label geometry.
#[derive(Debug, Clone)]
pub struct CpclEncoder {
    config: LabelConfig,
    media: MediaMode,
    speed: u8,
    tone: i16,
}

impl CpclEncoder {
    pub fn new(config: LabelConfig) -> Self {
        Self {
            config,
            media: MediaMode::default(),
            speed: DEFAULT_SPEED,
            tone: DEFAULT_TONE,
        }
    }

    pub fn with_media(mut self, media: MediaMode) -> Self {
        self.media = media;
        self
    }

    pub fn with_speed(mut self, speed: u8) -> Self {
        self.speed = speed.min(5);
        self
    }

    pub fn with_tone(mut self, tone: i16) -> Self {
        self.tone = tone.clamp(-99, 200);
        self
    }

    /// Encode a bitmap into a complete CPCL print job.
    ///
    /// `copies` is embedded in the `!` header quantity field; the stream is
    /// written to the transport exactly once regardless of copy count.
    pub fn encode(&self, bitmap: &MonoBitmap, copies: u32) -> CommandStream {
        let dpi = self.config.dpi;
        let mut out = String::with_capacity(bitmap.len() * 2 + 160);

        // ! <offset> <hdpi> <vdpi> <height> <qty>
        out.push_str(&format!(
            "! 0 {} {} {} {}\r\n",
            dpi,
            dpi,
            bitmap.height,
            copies.max(1)
        ));
        out.push_str(&format!("PAGE-WIDTH {}\r\n", bitmap.width_dots));
        match self.media {
            MediaMode::Gapped => {
                out.push_str("LABEL\r\n");
                out.push_str("GAP-SENSE\r\n");
            }
            MediaMode::Continuous => {
                out.push_str("JOURNAL\r\n");
            }
        }
        out.push_str(&format!("SPEED {}\r\n", self.speed));
        out.push_str(&format!("TONE {}\r\n", self.tone));

        out.push_str(&format!(
            "EG {} {} 0 0 ",
            bitmap.width_bytes, bitmap.height
        ));
        out.push_str(&hex_nibble_inverted(&bitmap.data));
        out.push_str("\r\n");

        out.push_str("FORM\r\n");
        out.push_str("PRINT\r\n");

        CommandStream::Text(out)
    }
}

/// Format bytes as uppercase hex with each nibble `n` replaced by `15 - n`.
pub fn hex_nibble_inverted(data: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(data.len() * 2);
    for &byte in data {
        let hi = (byte >> 4) & 0x0F;
        let lo = byte & 0x0F;
        out.push(HEX[(15 - hi) as usize] as char);
        out.push(HEX[(15 - lo) as usize] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::mono::BinarizePolicy;
    use image::{GrayImage, Luma};

    fn bitmap(width: u32, height: u32, luma: u8) -> MonoBitmap {
        let img = GrayImage::from_pixel(width, height, Luma([luma]));
        MonoBitmap::from_gray(&img, BinarizePolicy::default())
    }

    fn encode_text(bitmap: &MonoBitmap, copies: u32) -> String {
        let stream = CpclEncoder::new(LabelConfig::LABEL_40X30).encode(bitmap, copies);
        let CommandStream::Text(text) = stream else {
            panic!("CPCL streams are pure text");
        };
        text
    }

    #[test]
    fn test_header_layout() {
        let text = encode_text(&bitmap(320, 240, 255), 1);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "! 0 203 203 240 1");
        assert_eq!(lines[1], "PAGE-WIDTH 320");
        assert_eq!(lines[2], "LABEL");
        assert_eq!(lines[3], "GAP-SENSE");
        assert_eq!(lines[4], "SPEED 4");
        assert_eq!(lines[5], "TONE 0");
        assert!(lines[6].starts_with("EG 40 240 0 0 "));
        assert_eq!(lines[7], "FORM");
        assert_eq!(lines[8], "PRINT");
    }

    #[test]
    fn test_journal_media_mode() {
        let stream = CpclEncoder::new(LabelConfig::LABEL_40X30)
            .with_media(MediaMode::Continuous)
            .encode(&bitmap(8, 1, 255), 1);
        let CommandStream::Text(text) = stream else {
            panic!("CPCL streams are pure text");
        };
        assert!(text.contains("JOURNAL\r\n"));
        assert!(!text.contains("LABEL\r\n"));
        assert!(!text.contains("GAP-SENSE\r\n"));
    }

    #[test]
    fn test_quantity_in_header() {
        let text = encode_text(&bitmap(8, 1, 255), 3);
        assert!(text.starts_with("! 0 203 203 1 3\r\n"));
    }

    #[test]
    fn test_nibble_inversion_samples() {
        // 0x00 → both nibbles become 15 → "FF"
        assert_eq!(hex_nibble_inverted(&[0x00]), "FF");
        // 0xF0 → high nibble 15-15=0, low nibble 15-0=15 → "0F"
        assert_eq!(hex_nibble_inverted(&[0xF0]), "0F");
        assert_eq!(hex_nibble_inverted(&[0xFF]), "00");
        // 0x12 → 15-1=14 (E), 15-2=13 (D)
        assert_eq!(hex_nibble_inverted(&[0x12]), "ED");
    }

    #[test]
    fn test_hex_is_uppercase_and_contiguous() {
        let text = encode_text(&bitmap(16, 1, 0), 1);
        let eg_line = text.lines().find(|l| l.starts_with("EG ")).unwrap();
        let hex = eg_line.rsplit(' ').next().unwrap();
        assert_eq!(hex.len(), 2 * 2); // 2 bytes per row, 1 row
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hex, hex.to_uppercase());
    }

    #[test]
    fn test_all_white_body_is_ff_hex() {
        // Working convention all-blank (0x00) → wire "FF" per byte
        let text = encode_text(&bitmap(8, 2, 255), 1);
        let eg_line = text.lines().find(|l| l.starts_with("EG ")).unwrap();
        assert!(eg_line.ends_with("FFFF"));
    }
}
