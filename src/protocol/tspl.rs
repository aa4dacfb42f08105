//! # TSPL Encoder (Desktop Printers)
//!
//! Emits the TSPL-style command subset used by desktop label printers:
//!
//! ```text
//! SIZE 40 mm,30 mm
//! GAP 2 mm,0 mm
//! DIRECTION 1
//! REFERENCE 0,0
//! DENSITY 8
//! CLS
//! BITMAP 0,0,40,240,0,<raw bytes>
//! PRINT 1
//! ```
//!
//! The `BITMAP` payload is the raw bitmap bytes, not a printable encoding;
//! the serial channel carries arbitrary bytes. Header and footer are text,
//! so the encoder returns a [`CommandStream::WithBinaryPayload`].
//!
//! ## Polarity
//!
//! TSPL bitmap polarity is 1 = blank, 0 = mark, the opposite of the
//! [`MonoBitmap`](crate::render::mono::MonoBitmap) working convention, so
//! every payload byte is bitwise-inverted on emission.

use crate::printer::config::{LabelConfig, format_mm};
use crate::protocol::stream::CommandStream;
use crate::render::mono::MonoBitmap;

/// Default print density (0-15)
pub const DEFAULT_DENSITY: u8 = 8;

/// BITMAP draw mode: 0 = overwrite
const BITMAP_MODE_OVERWRITE: u8 = 0;

/// TSPL command stream builder for one label geometry.
#[derive(Debug, Clone)]
pub struct TsplEncoder {
    config: LabelConfig,
    density: u8,
}

impl TsplEncoder {
    pub fn new(config: LabelConfig) -> Self {
        Self {
            config,
            density: DEFAULT_DENSITY,
        }
    }

    /// Override the print density (0-15).
    pub fn with_density(mut self, density: u8) -> Self {
        self.density = density.min(15);
        self
    }

    /// Encode a bitmap into a complete TSPL print job.
    ///
    /// `copies` lands in the `PRINT` trailer. The orchestrator encodes
    /// desktop jobs with `copies = 1` and repeats the whole stream instead,
    /// because the multi-copy trailer is unreliable across controller
    /// firmware; the parameter is honored here for direct callers.
    pub fn encode(&self, bitmap: &MonoBitmap, copies: u32) -> CommandStream {
        let mut prefix = String::new();
        prefix.push_str(&format!(
            "SIZE {} mm,{} mm\r\n",
            format_mm(self.config.width_mm),
            format_mm(self.config.height_mm)
        ));
        prefix.push_str(&format!("GAP {} mm,0 mm\r\n", format_mm(self.config.gap_mm)));
        prefix.push_str("DIRECTION 1\r\n");
        prefix.push_str("REFERENCE 0,0\r\n");
        prefix.push_str(&format!("DENSITY {}\r\n", self.density));
        prefix.push_str("CLS\r\n");
        prefix.push_str(&format!(
            "BITMAP 0,0,{},{},{},",
            bitmap.width_bytes, bitmap.height, BITMAP_MODE_OVERWRITE
        ));

        // 1 = blank on the wire: invert every working-convention byte
        let payload: Vec<u8> = bitmap.data.iter().map(|&b| !b).collect();

        CommandStream::WithBinaryPayload {
            prefix,
            payload,
            suffix: format!("\r\nPRINT {}\r\n", copies.max(1)),
        }
    }
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

    #[test]
    fn test_header_layout() {
        let encoder = TsplEncoder::new(LabelConfig::LABEL_40X30);
        let stream = encoder.encode(&bitmap(320, 240, 255), 1);
        let CommandStream::WithBinaryPayload { prefix, suffix, .. } = stream else {
            panic!("expected binary stream");
        };
        assert!(prefix.starts_with("SIZE 40 mm,30 mm\r\n"));
        assert!(prefix.contains("GAP 2 mm,0 mm\r\n"));
        assert!(prefix.contains("DIRECTION 1\r\n"));
        assert!(prefix.contains("REFERENCE 0,0\r\n"));
        assert!(prefix.contains("DENSITY 8\r\n"));
        assert!(prefix.contains("CLS\r\n"));
        assert!(prefix.ends_with("BITMAP 0,0,40,240,0,"));
        assert_eq!(suffix, "\r\nPRINT 1\r\n");
    }

    #[test]
    fn test_polarity_is_full_byte_inversion() {
        // All-black working bitmap (0xFF) → all-0x00 on the wire
        let stream = TsplEncoder::new(LabelConfig::LABEL_40X30).encode(&bitmap(16, 2, 0), 1);
        let CommandStream::WithBinaryPayload { payload, .. } = stream else {
            panic!("expected binary stream");
        };
        assert!(payload.iter().all(|&b| b == 0x00));

        // All-white working bitmap (0x00) → all-0xFF on the wire
        let stream = TsplEncoder::new(LabelConfig::LABEL_40X30).encode(&bitmap(16, 2, 255), 1);
        let CommandStream::WithBinaryPayload { payload, .. } = stream else {
            panic!("expected binary stream");
        };
        assert!(payload.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_sample_byte_inversion() {
        // Spot-check the documented polarity samples
        assert_eq!(!0x00u8, 0xFF);
        assert_eq!(!0xF0u8, 0x0F);

        // And that the encoder applies exactly that mapping
        let mono = MonoBitmap {
            width_dots: 8,
            width_bytes: 1,
            height: 2,
            data: vec![0x00, 0xF0],
        };
        let stream = TsplEncoder::new(LabelConfig::LABEL_40X30).encode(&mono, 1);
        let CommandStream::WithBinaryPayload { payload, .. } = stream else {
            panic!("expected binary stream");
        };
        assert_eq!(payload, vec![0xFF, 0x0F]);
    }

    #[test]
    fn test_copies_in_trailer() {
        let stream = TsplEncoder::new(LabelConfig::LABEL_40X30).encode(&bitmap(8, 1, 255), 4);
        let CommandStream::WithBinaryPayload { suffix, .. } = stream else {
            panic!("expected binary stream");
        };
        assert_eq!(suffix, "\r\nPRINT 4\r\n");
    }

    #[test]
    fn test_zero_copies_clamped_to_one() {
        let stream = TsplEncoder::new(LabelConfig::LABEL_40X30).encode(&bitmap(8, 1, 255), 0);
        let CommandStream::WithBinaryPayload { suffix, .. } = stream else {
            panic!("expected binary stream");
        };
        assert_eq!(suffix, "\r\nPRINT 1\r\n");
    }
}
