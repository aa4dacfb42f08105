//! # Label Geometry and Printer Kinds
//!
//! This module defines the two supported printer families and the physical
//! geometry of the labels they print.
//!
//! ## Printer Families
//!
//! | Kind | Command language | Bitmap framing |
//! |------|------------------|----------------|
//! | Desktop | TSPL-style | `BITMAP` with raw binary payload |
//! | Portable | CPCL-style | `EG` with hex-text payload |
//!
//! ## Usage
//!
//! ```
//! use rotulo::printer::LabelConfig;
//!
//! let config = LabelConfig::LABEL_40X30;
//! assert_eq!(config.width_dots(), 320);
//! assert_eq!(config.width_bytes(), 40);
//! ```

use serde::{Deserialize, Serialize};

/// Which printer family a job targets.
///
/// The selector crosses the caller boundary as `"desktop"` / `"portable"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrinterKind {
    /// Desktop label printers speaking a TSPL-style vector/bitmap language.
    Desktop,
    /// Portable printers speaking a line-oriented CPCL-style language.
    Portable,
}

impl std::fmt::Display for PrinterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrinterKind::Desktop => write!(f, "desktop"),
            PrinterKind::Portable => write!(f, "portable"),
        }
    }
}

/// # Label Configuration
///
/// Physical label geometry plus print resolution. All device-dot dimensions
/// are derived from millimeters and DPI; the dot width is always rounded up
/// to a multiple of 8 so rows pack into whole bytes.
///
/// ## Calculations
///
/// ```text
/// dots_per_mm = dpi / 25.4
///
/// For LABEL_40X30 (203 DPI):
///   dots_per_mm ≈ 8
///   width  = 40mm → 320 dots → 40 bytes
///   height = 30mm → 240 dots
/// ```
#[derive(Debug, Clone, Copy)]
pub struct LabelConfig {
    /// Profile name
    pub name: &'static str,

    /// Label width in millimeters
    pub width_mm: f32,

    /// Label height in millimeters
    pub height_mm: f32,

    /// Gap between labels in millimeters (gap-sensed media)
    pub gap_mm: f32,

    /// Resolution in dots per inch
    pub dpi: u16,
}

impl LabelConfig {
    /// # 40mm × 30mm Product Tag
    ///
    /// The standard product/receipt tag profile at 203 DPI.
    ///
    /// | Property | Value |
    /// |----------|-------|
    /// | Label | 40mm × 30mm |
    /// | Gap | 2mm |
    /// | Canvas | 320 × 240 dots |
    pub const LABEL_40X30: Self = Self {
        name: "40x30",
        width_mm: 40.0,
        height_mm: 30.0,
        gap_mm: 2.0,
        dpi: 203,
    };

    /// Calculate dots per millimeter
    #[inline]
    pub fn dots_per_mm(&self) -> f32 {
        self.dpi as f32 / 25.4
    }

    /// Convert millimeters to dots
    #[inline]
    pub fn mm_to_dots(&self, mm: f32) -> u32 {
        (mm * self.dots_per_mm()).round() as u32
    }

    /// Canvas width in dots, rounded up to a multiple of 8
    #[inline]
    pub fn width_dots(&self) -> u32 {
        self.mm_to_dots(self.width_mm).div_ceil(8) * 8
    }

    /// Canvas height in dots
    #[inline]
    pub fn height_dots(&self) -> u32 {
        self.mm_to_dots(self.height_mm)
    }

    /// Canvas width in bytes (width_dots / 8)
    #[inline]
    pub fn width_bytes(&self) -> u32 {
        self.width_dots() / 8
    }
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self::LABEL_40X30
    }
}

/// Format a millimeter value the way the command languages expect:
/// whole numbers without a decimal point, fractions with one.
pub(crate) fn format_mm(mm: f32) -> String {
    if (mm - mm.round()).abs() < f32::EPSILON {
        format!("{}", mm.round() as i32)
    } else {
        format!("{:.1}", mm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_40x30_dimensions() {
        let config = LabelConfig::LABEL_40X30;
        assert_eq!(config.width_dots(), 320);
        assert_eq!(config.height_dots(), 240);
        assert_eq!(config.width_bytes(), 40);
    }

    #[test]
    fn test_width_is_multiple_of_8() {
        // An awkward width must still round up to whole bytes
        let config = LabelConfig {
            name: "odd",
            width_mm: 25.0,
            height_mm: 15.0,
            gap_mm: 2.0,
            dpi: 203,
        };
        assert_eq!(config.width_dots() % 8, 0);
        assert_eq!(config.width_bytes() * 8, config.width_dots());
    }

    #[test]
    fn test_dots_per_mm() {
        let config = LabelConfig::LABEL_40X30;
        assert!((config.dots_per_mm() - 8.0).abs() < 0.1);
    }

    #[test]
    fn test_format_mm() {
        assert_eq!(format_mm(40.0), "40");
        assert_eq!(format_mm(2.0), "2");
        assert_eq!(format_mm(2.5), "2.5");
    }

    #[test]
    fn test_printer_kind_serde() {
        let kind: PrinterKind = serde_json::from_str("\"desktop\"").unwrap();
        assert_eq!(kind, PrinterKind::Desktop);
        assert_eq!(
            serde_json::to_string(&PrinterKind::Portable).unwrap(),
            "\"portable\""
        );
    }
}
