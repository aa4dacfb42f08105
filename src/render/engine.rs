//! # Headless Render Engine
//!
//! Renders HTML-like label markup into a fixed-size grayscale canvas by
//! driving an external headless browser. The engine is behind the
//! [`RenderEngine`] trait so the pipeline can swap in the built-in fallback
//! renderer (or a test double) when no browser is available.
//!
//! ## Invocation
//!
//! The markup is written to a temp file and the browser is invoked as
//!
//! ```text
//! chromium --headless --disable-gpu --hide-scrollbars \
//!     --window-size=320,240 --screenshot=/tmp/rotulo-…png file:///tmp/rotulo-…html
//! ```
//!
//! The child is polled against a hard timeout and killed on expiry; a hung
//! engine must fail fast, never stall the print job.
//!
//! ## Canvas Size
//!
//! The canvas is fixed per physical label size and DPI. Browsers do not
//! always honor `--window-size` exactly (minimum window sizes, DPI scaling),
//! so the screenshot is resized to the requested pixel size with a bilinear
//! filter whenever it comes back at any other size.

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use image::GrayImage;
use image::imageops::FilterType;

use crate::error::RotuloError;

/// Hard ceiling on one engine invocation.
const RENDER_TIMEOUT: Duration = Duration::from_secs(10);

/// Poll interval while waiting for the child to exit.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Browser binaries probed in order.
const BROWSER_CANDIDATES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
];

static RENDER_SEQ: AtomicU64 = AtomicU64::new(0);

/// A renderer from markup to a fixed-size grayscale canvas.
pub trait RenderEngine {
    /// Engine name, for logs and error messages.
    fn name(&self) -> &str;

    /// Render `html` to exactly `width_px` × `height_px` grayscale pixels.
    ///
    /// Fails with [`RotuloError::Render`] if the engine cannot be started
    /// or times out.
    fn render_html(
        &self,
        html: &str,
        width_px: u32,
        height_px: u32,
    ) -> Result<GrayImage, RotuloError>;
}

/// External headless-browser engine.
pub struct HeadlessBrowser {
    binary: String,
    timeout: Duration,
}

impl HeadlessBrowser {
    /// Probe the system for a usable browser binary.
    ///
    /// ## Errors
    ///
    /// [`RotuloError::Render`] if none of the candidate binaries can be
    /// executed. Callers treat this as a signal to use the fallback
    /// renderer, not as a fatal error.
    pub fn detect() -> Result<Self, RotuloError> {
        for candidate in BROWSER_CANDIDATES {
            let probe = Command::new(candidate)
                .arg("--version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
            if matches!(probe, Ok(status) if status.success()) {
                log::debug!("render engine: using {}", candidate);
                return Ok(Self {
                    binary: candidate.to_string(),
                    timeout: RENDER_TIMEOUT,
                });
            }
        }
        Err(RotuloError::Render(format!(
            "no headless browser found (tried {})",
            BROWSER_CANDIDATES.join(", ")
        )))
    }

    /// Use a specific browser binary.
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            timeout: RENDER_TIMEOUT,
        }
    }

    /// Override the render timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Unique temp path pair (html input, png output) for one invocation.
    fn temp_paths() -> (PathBuf, PathBuf) {
        let seq = RENDER_SEQ.fetch_add(1, Ordering::Relaxed);
        let stem = format!("rotulo-{}-{}", std::process::id(), seq);
        let dir = std::env::temp_dir();
        (
            dir.join(format!("{}.html", stem)),
            dir.join(format!("{}.png", stem)),
        )
    }

    /// Wait for the child to exit, killing it at the timeout boundary.
    fn wait_with_timeout(
        &self,
        child: &mut std::process::Child,
    ) -> Result<std::process::ExitStatus, RotuloError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RotuloError::Render(format!(
                    "{} timed out after {:?}",
                    self.binary, self.timeout
                )));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl RenderEngine for HeadlessBrowser {
    fn name(&self) -> &str {
        &self.binary
    }

    fn render_html(
        &self,
        html: &str,
        width_px: u32,
        height_px: u32,
    ) -> Result<GrayImage, RotuloError> {
        let (html_path, png_path) = Self::temp_paths();
        fs::write(&html_path, html)?;

        let result = (|| {
            let mut child = Command::new(&self.binary)
                .arg("--headless")
                .arg("--disable-gpu")
                .arg("--hide-scrollbars")
                .arg(format!("--window-size={},{}", width_px, height_px))
                .arg(format!("--screenshot={}", png_path.display()))
                .arg(format!("file://{}", html_path.display()))
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
                .map_err(|e| {
                    RotuloError::Render(format!("failed to start {}: {}", self.binary, e))
                })?;

            let status = self.wait_with_timeout(&mut child)?;
            if !status.success() {
                return Err(RotuloError::Render(format!(
                    "{} exited with {}",
                    self.binary, status
                )));
            }

            let screenshot = image::open(&png_path)
                .map_err(|e| RotuloError::Render(format!("screenshot unreadable: {}", e)))?
                .to_luma8();
            Ok(fit_to_canvas(screenshot, width_px, height_px))
        })();

        let _ = fs::remove_file(&html_path);
        let _ = fs::remove_file(&png_path);
        result
    }
}

/// Resize `image` to exactly `width` × `height` with a bilinear filter.
/// Images already at the target size pass through untouched.
pub fn fit_to_canvas(image: GrayImage, width: u32, height: u32) -> GrayImage {
    if image.width() == width && image.height() == height {
        image
    } else {
        image::imageops::resize(&image, width, height, FilterType::Triangle)
    }
}
