//! # Monochrome Encoding
//!
//! Converts a grayscale raster into a packed 1-bit-per-pixel bitmap suitable
//! for printer graphics commands.
//!
//! ## Bit Packing
//!
//! Graphics data is packed as bytes where each bit represents one dot:
//! - Bit 7 (MSB) = leftmost dot
//! - Bit 0 (LSB) = rightmost dot
//! - 1 = mark (print), 0 = blank
//!
//! ```text
//! Byte value 0xF0 = 11110000 = ████░░░░
//! Byte value 0x0F = 00001111 = ░░░░████
//! ```
//!
//! Rows whose pixel width is not a multiple of 8 are zero-padded (blank) on
//! the right up to the next byte boundary.
//!
//! ## Polarity
//!
//! The bitmap produced here is protocol-agnostic: 1 always means mark.
//! Which bit value actually fires a dot differs per printer language (TSPL
//! inverts whole bytes, CPCL inverts hex nibbles) and is applied by the
//! command encoders, never here.
//!
//! ## Binarization
//!
//! Two deterministic policies:
//!
//! | Policy | Behavior |
//! |--------|----------|
//! | `Threshold(t)` | luma < t → mark. Default t = 128 (~50% gray). |
//! | `Bayer` | 8×8 ordered dithering on darkness intensity |
//!
//! The same policy is used for both the engine-rendered and fallback-rendered
//! rasters, so the two paths binarize identically.

use image::GrayImage;

/// Bayer 8x8 dithering matrix
///
/// Values range from 0-63, arranged to minimize visible artifacts when used
/// as thresholds for binary conversion.
pub const BAYER8: [[u8; 8]; 8] = [
    [0, 32, 8, 40, 2, 34, 10, 42],
    [48, 16, 56, 24, 50, 18, 58, 26],
    [12, 44, 4, 36, 14, 46, 6, 38],
    [60, 28, 52, 20, 62, 30, 54, 22],
    [3, 35, 11, 43, 1, 33, 9, 41],
    [51, 19, 59, 27, 49, 17, 57, 25],
    [15, 47, 7, 39, 13, 45, 5, 37],
    [63, 31, 55, 23, 61, 29, 53, 21],
];

/// Default brightness threshold (~50% gray): luma below this is a mark.
pub const DEFAULT_THRESHOLD: u8 = 128;

/// How a grayscale raster is classified into mark/blank pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinarizePolicy {
    /// Fixed brightness threshold: luma < t → mark
    Threshold(u8),
    /// Bayer 8x8 ordered dithering on darkness intensity
    Bayer,
}

impl Default for BinarizePolicy {
    fn default() -> Self {
        BinarizePolicy::Threshold(DEFAULT_THRESHOLD)
    }
}

/// Get the dithering threshold for a pixel position.
///
/// Returns a value in (0, 1). Adding 0.5 before dividing ensures full black
/// always marks and full white never does.
#[inline]
fn bayer_threshold(x: usize, y: usize) -> f32 {
    let matrix_value = BAYER8[y & 7][x & 7];
    (matrix_value as f32 + 0.5) / 64.0
}

/// # Packed 1-bit Bitmap
///
/// The protocol-agnostic monochrome raster consumed by the command encoders.
///
/// ## Invariant
///
/// `data.len() == width_bytes * height`, with `width_bytes = ceil(width_dots / 8)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonoBitmap {
    /// Width in dots (pixels)
    pub width_dots: usize,

    /// Width in bytes: `ceil(width_dots / 8)`
    pub width_bytes: usize,

    /// Height in dots (rows)
    pub height: usize,

    /// Packed rows, MSB-first, 1 = mark
    pub data: Vec<u8>,
}

impl MonoBitmap {
    /// Binarize and pack a grayscale image.
    ///
    /// ## Example
    ///
    /// ```
    /// use image::GrayImage;
    /// use rotulo::render::mono::{BinarizePolicy, MonoBitmap};
    ///
    /// let img = GrayImage::from_pixel(16, 4, image::Luma([0u8])); // all black
    /// let bitmap = MonoBitmap::from_gray(&img, BinarizePolicy::default());
    /// assert_eq!(bitmap.width_bytes, 2);
    /// assert!(bitmap.data.iter().all(|&b| b == 0xFF));
    /// ```
    pub fn from_gray(image: &GrayImage, policy: BinarizePolicy) -> Self {
        let width = image.width() as usize;
        let height = image.height() as usize;
        let width_bytes = width.div_ceil(8);

        let mut data = Vec::with_capacity(width_bytes * height);
        let mut row = Vec::with_capacity(width);

        for y in 0..height {
            row.clear();
            for x in 0..width {
                let luma = image.get_pixel(x as u32, y as u32)[0];
                let mark = match policy {
                    BinarizePolicy::Threshold(t) => luma < t,
                    BinarizePolicy::Bayer => {
                        // Darkness intensity: 0.0 = white, 1.0 = black
                        let intensity = 1.0 - luma as f32 / 255.0;
                        intensity > bayer_threshold(x, y)
                    }
                };
                row.push(mark);
            }
            data.extend(pack_row(&row));
        }

        Self {
            width_dots: width,
            width_bytes,
            height,
            data,
        }
    }

    /// Total packed size in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Pack a row of mark/blank values into bytes, MSB first.
///
/// If the row length is not a multiple of 8, the last byte is padded with
/// zeros (blank) on the right.
///
/// ## Example
///
/// ```
/// use rotulo::render::mono::pack_row;
///
/// let row = vec![true, true, true, true, false, false, false, false];
/// assert_eq!(pack_row(&row), vec![0xF0]); // 11110000
///
/// let row = vec![true; 12];
/// assert_eq!(pack_row(&row), vec![0xFF, 0xF0]);
/// ```
pub fn pack_row(pixels: &[bool]) -> Vec<u8> {
    let num_bytes = pixels.len().div_ceil(8);
    let mut bytes = vec![0u8; num_bytes];

    for (i, &pixel) in pixels.iter().enumerate() {
        if pixel {
            let byte_idx = i / 8;
            let bit_idx = 7 - (i % 8); // MSB first
            bytes[byte_idx] |= 1 << bit_idx;
        }
    }

    bytes
}
