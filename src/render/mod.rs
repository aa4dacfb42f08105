//! # Raster Pipeline
//!
//! Renders label markup to a fixed-size grayscale canvas and converts it to
//! the packed 1-bit bitmap the command encoders consume.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`engine`] | Headless HTML render engine (external browser, hard timeout) |
//! | [`fallback`] | Built-in border-and-text renderer, always available |
//! | [`mono`] | Grayscale → packed 1-bit monochrome encoding |

pub mod engine;
pub mod fallback;
pub mod mono;

use image::GrayImage;

pub use engine::{HeadlessBrowser, RenderEngine};
pub use mono::{BinarizePolicy, MonoBitmap};

/// Render markup through `engine`, falling back to the built-in renderer on
/// any engine failure. Engine failure is logged, never propagated: a
/// degraded label is always produced.
pub fn render_with_fallback(
    engine: Option<&dyn RenderEngine>,
    html: &str,
    fallback_lines: &[String],
    width_px: u32,
    height_px: u32,
) -> GrayImage {
    if let Some(engine) = engine {
        match engine.render_html(html, width_px, height_px) {
            Ok(image) => return image,
            Err(e) => {
                log::warn!(
                    "render engine {} failed, using fallback renderer: {}",
                    engine.name(),
                    e
                );
            }
        }
    }
    fallback::render_basic(fallback_lines, width_px, height_px)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RotuloError;

    struct FailingEngine;

    impl RenderEngine for FailingEngine {
        fn name(&self) -> &str {
            "failing"
        }

        fn render_html(&self, _: &str, _: u32, _: u32) -> Result<GrayImage, RotuloError> {
            Err(RotuloError::Render("engine unavailable".into()))
        }
    }

    struct SolidEngine(u8);

    impl RenderEngine for SolidEngine {
        fn name(&self) -> &str {
            "solid"
        }

        fn render_html(&self, _: &str, w: u32, h: u32) -> Result<GrayImage, RotuloError> {
            Ok(GrayImage::from_pixel(w, h, image::Luma([self.0])))
        }
    }

    #[test]
    fn test_engine_output_used_when_available() {
        let img = render_with_fallback(Some(&SolidEngine(9)), "<html/>", &[], 32, 16);
        assert!(img.pixels().all(|p| p[0] == 9));
    }

    #[test]
    fn test_engine_failure_falls_back() {
        let lines = vec!["degraded".to_string()];
        let img = render_with_fallback(Some(&FailingEngine), "<html/>", &lines, 320, 240);
        assert_eq!((img.width(), img.height()), (320, 240));
        // Fallback draws the border
        assert_eq!(img.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn test_no_engine_uses_fallback() {
        let img = render_with_fallback(None, "<html/>", &[], 64, 48);
        assert_eq!(img.get_pixel(0, 0)[0], 0);
    }
}
