//! # Label Templates and Render Requests
//!
//! The declarative inputs handed to the print pipeline by the (external)
//! template store: an HTML-like template with `{{field}}` placeholders and a
//! per-print request carrying the field values, printer-kind selector and
//! copy count.

pub mod template;

pub use template::{
    FALLBACK_TEMPLATE_BODY, LabelTemplate, QR_FIELD, RenderRequest, fallback_template,
    qr_data_url, substitute, substitute_plain,
};
