//! # Template Model and Placeholder Substitution
//!
//! A label template is an HTML-like markup body with `{{field}}`
//! placeholders. At print time every placeholder is replaced by the string
//! value of the matching request field.
//!
//! ## The QR Field
//!
//! The field named `qrDataUrl` is special-cased: the markup expects an image
//! reference there, not a payload string, so its value is first rendered to
//! a QR matrix, scaled into a grayscale PNG and substituted as a
//! `data:image/png;base64,…` URL.

use std::io::Cursor;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::{DynamicImage, GrayImage, Luma};
use qrcode::{EcLevel, QrCode};
use serde::{Deserialize, Serialize};

use crate::error::RotuloError;
use crate::printer::PrinterKind;

/// Field name whose value is a QR payload to be expanded into an image URL.
pub const QR_FIELD: &str = "qrDataUrl";

/// Pixel edge of the QR image substituted into the markup.
const QR_TARGET_PX: u32 = 160;

/// Quiet-zone width in modules on each side of the QR matrix.
const QR_QUIET_MODULES: u32 = 2;

/// A declarative label template.
///
/// Owned by the external template store; treated as immutable during a
/// render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelTemplate {
    /// Store identity
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Markup body with `{{field}}` placeholders
    pub body: String,

    /// Alternate device body: markup, or already-encoded command text used
    /// by the legacy text-field render path
    #[serde(default)]
    pub device_body: Option<String>,

    /// Whether this is the store's default template
    #[serde(default)]
    pub is_default: bool,
}

/// One print request against a template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderRequest {
    /// Placeholder name → value, in authored order
    pub fields: Vec<(String, String)>,

    /// Target printer family
    pub printer: PrinterKind,

    /// Copy count (positive)
    pub copies: u32,

    /// Bitmap rendering vs. legacy text-field rendering
    #[serde(default = "default_true")]
    pub render_as_bitmap: bool,
}

fn default_true() -> bool {
    true
}

impl RenderRequest {
    /// Look up a field value by name.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Fallback-renderer text: one `name: value` line per field, QR payload
    /// shown as its raw value.
    pub fn fallback_lines(&self, template_name: &str) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.fields.len() + 1);
        lines.push(template_name.to_string());
        for (name, value) in &self.fields {
            lines.push(format!("{}: {}", name, value));
        }
        lines
    }
}

/// Replace every `{{name}}` occurrence in `markup` with the matching field
/// value. The QR field is expanded to a PNG data URL first.
///
/// ## Errors
///
/// - `Template` if the markup is empty or any placeholder stays unresolved.
/// - `Render` if the QR payload cannot be encoded.
pub fn substitute(markup: &str, fields: &[(String, String)]) -> Result<String, RotuloError> {
    substitute_inner(markup, fields, true)
}

/// Placeholder substitution without the QR image expansion, for device
/// bodies that are already command text rather than markup.
pub fn substitute_plain(body: &str, fields: &[(String, String)]) -> Result<String, RotuloError> {
    substitute_inner(body, fields, false)
}

fn substitute_inner(
    markup: &str,
    fields: &[(String, String)],
    expand_qr: bool,
) -> Result<String, RotuloError> {
    if markup.trim().is_empty() {
        return Err(RotuloError::Template("template body is empty".into()));
    }

    let mut out = markup.to_string();
    for (name, value) in fields {
        let placeholder = format!("{{{{{}}}}}", name);
        if !out.contains(&placeholder) {
            continue;
        }
        let replacement = if expand_qr && name == QR_FIELD {
            qr_data_url(value, QR_TARGET_PX)?
        } else {
            value.clone()
        };
        out = out.replace(&placeholder, &replacement);
    }

    if let Some(start) = out.find("{{") {
        let tail = &out[start + 2..];
        let name = tail.split("}}").next().unwrap_or(tail);
        return Err(RotuloError::Template(format!(
            "unresolved placeholder `{}`",
            name.trim()
        )));
    }

    Ok(out)
}

/// Render a QR payload into a `data:image/png;base64,…` URL.
///
/// The matrix is scaled in whole modules to approach `target_px`, with a
/// quiet zone on all sides.
pub fn qr_data_url(payload: &str, target_px: u32) -> Result<String, RotuloError> {
    let code = QrCode::with_error_correction_level(payload, EcLevel::M)
        .map_err(|e| RotuloError::Render(format!("QR encoding failed: {}", e)))?;

    let modules = code.width() as u32;
    let total_modules = modules + 2 * QR_QUIET_MODULES;
    let scale = (target_px / total_modules).max(1);
    let edge = total_modules * scale;

    let mut img = GrayImage::from_pixel(edge, edge, Luma([255u8]));
    for qy in 0..modules {
        for qx in 0..modules {
            if code[(qx as usize, qy as usize)] != qrcode::Color::Dark {
                continue;
            }
            let base_x = (QR_QUIET_MODULES + qx) * scale;
            let base_y = (QR_QUIET_MODULES + qy) * scale;
            for dy in 0..scale {
                for dx in 0..scale {
                    img.put_pixel(base_x + dx, base_y + dy, Luma([0u8]));
                }
            }
        }
    }

    let mut png = Vec::new();
    DynamicImage::ImageLuma8(img)
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|e| RotuloError::Image(format!("QR PNG encoding failed: {}", e)))?;

    Ok(format!("data:image/png;base64,{}", BASE64.encode(&png)))
}

/// Markup of the built-in minimal template used when the stored template is
/// bad or missing.
pub const FALLBACK_TEMPLATE_BODY: &str = r#"<html>
<body style="margin:0;width:100%;height:100%;border:2px solid #000;font-family:sans-serif">
  <div style="padding:6px">
    <div style="font-size:18px;font-weight:bold">{{spec}}</div>
    <img src="{{qrDataUrl}}" width="120" height="120" alt="">
    <div style="font-size:14px">{{barcodeTail}}</div>
  </div>
</body>
</html>
"#;

/// The built-in minimal fallback template.
pub fn fallback_template() -> LabelTemplate {
    LabelTemplate {
        id: "builtin-fallback".into(),
        name: "Fallback label".into(),
        body: FALLBACK_TEMPLATE_BODY.into(),
        device_body: None,
        is_default: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_substitute_replaces_all_occurrences() {
        let out = substitute(
            "<b>{{spec}}</b><i>{{spec}}</i>",
            &fields(&[("spec", "500g")]),
        )
        .unwrap();
        assert_eq!(out, "<b>500g</b><i>500g</i>");
    }

    #[test]
    fn test_substitute_empty_body_is_template_error() {
        let err = substitute("   ", &fields(&[])).unwrap_err();
        assert!(matches!(err, RotuloError::Template(_)));
    }

    #[test]
    fn test_substitute_unresolved_placeholder_is_template_error() {
        let err = substitute("{{spec}} {{missing}}", &fields(&[("spec", "x")])).unwrap_err();
        let RotuloError::Template(msg) = err else {
            panic!("expected Template error");
        };
        assert!(msg.contains("missing"));
    }

    #[test]
    fn test_qr_field_becomes_data_url() {
        let out = substitute(
            "<img src=\"{{qrDataUrl}}\">",
            &fields(&[("qrDataUrl", "SKU123")]),
        )
        .unwrap();
        assert!(out.contains("data:image/png;base64,"));
        assert!(!out.contains("SKU123"));
    }

    #[test]
    fn test_substitute_plain_keeps_qr_payload_verbatim() {
        let out = substitute_plain(
            "EG-QR {{qrDataUrl}}",
            &fields(&[("qrDataUrl", "SKU123")]),
        )
        .unwrap();
        assert_eq!(out, "EG-QR SKU123");
    }

    #[test]
    fn test_qr_data_url_shape() {
        let url = qr_data_url("SKU123", 160).unwrap();
        let b64 = url.strip_prefix("data:image/png;base64,").unwrap();
        let png = BASE64.decode(b64).unwrap();
        let img = image::load_from_memory(&png).unwrap();
        assert_eq!(img.width(), img.height());
        assert!(img.width() >= 21); // at least one dot per module
    }

    #[test]
    fn test_fallback_template_substitutes_cleanly() {
        let template = fallback_template();
        let out = substitute(
            &template.body,
            &fields(&[
                ("spec", "500g"),
                ("qrDataUrl", "SKU123"),
                ("barcodeTail", "12345678"),
            ]),
        )
        .unwrap();
        assert!(out.contains("500g"));
        assert!(out.contains("12345678"));
        assert!(!out.contains("{{"));
    }

    #[test]
    fn test_request_field_lookup_and_lines() {
        let request = RenderRequest {
            fields: fields(&[("spec", "500g"), ("barcodeTail", "12345678")]),
            printer: PrinterKind::Desktop,
            copies: 1,
            render_as_bitmap: true,
        };
        assert_eq!(request.field("spec"), Some("500g"));
        assert_eq!(request.field("nope"), None);
        let lines = request.fallback_lines("Tag");
        assert_eq!(lines[0], "Tag");
        assert_eq!(lines[1], "spec: 500g");
    }
}
