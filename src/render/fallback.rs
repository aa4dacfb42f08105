//! # Fallback Renderer
//!
//! A minimal, always-available renderer used when the headless engine cannot
//! be started or times out: white canvas, black border, plain text lines
//! stamped from Spleen bitmap glyphs. Degraded output, but a label still
//! prints.

use image::{GrayImage, Luma};
use spleen_font::{FONT_8X16, PSF2Font};

const GLYPH_W: u32 = 8;
const GLYPH_H: u32 = 16;

/// Border thickness in dots
const BORDER: u32 = 2;

/// Inner padding between border and text
const PADDING: u32 = 6;

/// Extra dots between text lines
const LINE_GAP: u32 = 4;

const WHITE: Luma<u8> = Luma([255u8]);
const BLACK: Luma<u8> = Luma([0u8]);

/// Render text lines into a bordered canvas of exactly `width` × `height`.
///
/// Lines that overflow the canvas horizontally are truncated; lines beyond
/// the bottom edge are dropped.
pub fn render_basic(lines: &[String], width: u32, height: u32) -> GrayImage {
    let mut canvas = GrayImage::from_pixel(width, height, WHITE);
    draw_border(&mut canvas);

    let mut font = PSF2Font::new(FONT_8X16).unwrap();
    let max_cols = ((width.saturating_sub(2 * (BORDER + PADDING))) / GLYPH_W) as usize;

    let mut y = BORDER + PADDING;
    for line in lines {
        if y + GLYPH_H > height.saturating_sub(BORDER + PADDING) {
            break;
        }
        let mut x = BORDER + PADDING;
        for ch in line.chars().take(max_cols) {
            stamp_glyph(&mut canvas, &mut font, ch, x, y);
            x += GLYPH_W;
        }
        y += GLYPH_H + LINE_GAP;
    }

    canvas
}

fn draw_border(canvas: &mut GrayImage) {
    let (width, height) = canvas.dimensions();
    for y in 0..height {
        for x in 0..width {
            let edge = x < BORDER || y < BORDER || x >= width - BORDER || y >= height - BORDER;
            if edge {
                canvas.put_pixel(x, y, BLACK);
            }
        }
    }
}

/// Stamp one glyph at (x, y). Unknown characters render as a hollow box.
fn stamp_glyph(canvas: &mut GrayImage, font: &mut PSF2Font, ch: char, x: u32, y: u32) {
    let utf8 = ch.to_string();
    let (width, height) = canvas.dimensions();

    if let Some(glyph) = font.glyph_for_utf8(utf8.as_bytes()) {
        for (row_y, row) in glyph.enumerate() {
            for (col_x, on) in row.enumerate() {
                if !on {
                    continue;
                }
                let px = x + col_x as u32;
                let py = y + row_y as u32;
                if px < width && py < height {
                    canvas.put_pixel(px, py, BLACK);
                }
            }
        }
    } else {
        for dy in 0..GLYPH_H {
            for dx in 0..GLYPH_W {
                let boxed = dx == 0 || dy == 0 || dx == GLYPH_W - 1 || dy == GLYPH_H - 1;
                let (px, py) = (x + dx, y + dy);
                if boxed && px < width && py < height {
                    canvas.put_pixel(px, py, BLACK);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_canvas_size() {
        let img = render_basic(&["hello".to_string()], 320, 240);
        assert_eq!((img.width(), img.height()), (320, 240));
    }

    #[test]
    fn test_border_is_black() {
        let img = render_basic(&[], 64, 48);
        assert_eq!(img.get_pixel(0, 0)[0], 0);
        assert_eq!(img.get_pixel(63, 0)[0], 0);
        assert_eq!(img.get_pixel(0, 47)[0], 0);
        assert_eq!(img.get_pixel(63, 47)[0], 0);
        assert_eq!(img.get_pixel(1, 1)[0], 0); // 2px border
    }

    #[test]
    fn test_interior_is_white_without_text() {
        let img = render_basic(&[], 64, 48);
        assert_eq!(img.get_pixel(32, 24)[0], 255);
    }

    #[test]
    fn test_text_produces_marks() {
        let blank = render_basic(&[], 320, 240);
        let texty = render_basic(&["SKU 12345678".to_string()], 320, 240);
        let blank_dark = blank.pixels().filter(|p| p[0] == 0).count();
        let texty_dark = texty.pixels().filter(|p| p[0] == 0).count();
        assert!(texty_dark > blank_dark);
    }

    #[test]
    fn test_overflowing_lines_are_dropped_not_panicking() {
        let lines: Vec<String> = (0..100).map(|i| format!("line {}", i)).collect();
        let img = render_basic(&lines, 96, 64);
        assert_eq!((img.width(), img.height()), (96, 64));
    }
}
