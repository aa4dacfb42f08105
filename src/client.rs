//! # Print Client
//!
//! Caller-facing composition of the whole pipeline: template substitution →
//! raster render (with fallback) → monochrome encode → command-language
//! encode → orchestrated transport writes.
//!
//! The client is what the (external) template-management layer talks to: it
//! hands over a template, a field payload and a printer-type selector, and
//! receives either a command stream or an error.

use serde::{Deserialize, Serialize};

use crate::error::RotuloError;
use crate::job::{BatchReport, JobOutcome, Orchestrator, PrintJob};
use crate::label::{LabelTemplate, RenderRequest, fallback_template, substitute, substitute_plain};
use crate::printer::{LabelConfig, PrinterKind};
use crate::protocol::{CommandStream, CpclEncoder, TsplEncoder};
use crate::render::{self, BinarizePolicy, HeadlessBrowser, MonoBitmap, RenderEngine};
use crate::transport::{BluetoothTransport, Transport, connect_remediation};

/// Render response handed across the caller boundary: the command stream as
/// wire text, binary regions in sentinel/base64 form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderResponse {
    pub command_stream: String,
}

/// One entry in a batch print: a distinct label to render and print.
#[derive(Debug, Clone)]
pub struct BatchItem {
    /// Item identity carried into the batch report
    pub id: String,
    pub template: LabelTemplate,
    pub request: RenderRequest,
}

/// # Print Client
///
/// Owns the transport, the render engine (if one was found) and the job
/// orchestrator.
pub struct PrintClient<T: Transport> {
    transport: T,
    engine: Option<Box<dyn RenderEngine>>,
    config: LabelConfig,
    policy: BinarizePolicy,
    orchestrator: Orchestrator,
}

impl PrintClient<BluetoothTransport> {
    /// Client over a fresh Bluetooth transport, probing the system for a
    /// headless render engine. A missing engine is not an error: the
    /// fallback renderer takes over, degraded but printable.
    pub fn new() -> Self {
        Self::over(BluetoothTransport::new())
    }

    /// Connect the underlying Bluetooth transport, attaching printer-kind
    /// remediation guidance to connection failures.
    pub fn connect(&mut self, address: &str, kind: PrinterKind) -> Result<(), RotuloError> {
        self.transport.connect(address).map_err(|e| {
            RotuloError::Connect(format!("{} ({})", e, connect_remediation(kind)))
        })
    }

    /// Disconnect the underlying transport (always clears the session).
    pub fn disconnect(&mut self) {
        self.transport.disconnect();
    }
}

impl Default for PrintClient<BluetoothTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> PrintClient<T> {
    /// Client over an explicit transport.
    pub fn over(transport: T) -> Self {
        let engine: Option<Box<dyn RenderEngine>> = match HeadlessBrowser::detect() {
            Ok(engine) => Some(Box::new(engine)),
            Err(e) => {
                log::warn!("no render engine available, labels use the fallback renderer: {}", e);
                None
            }
        };
        Self {
            transport,
            engine,
            config: LabelConfig::default(),
            policy: BinarizePolicy::default(),
            orchestrator: Orchestrator::new(),
        }
    }

    /// Replace the render engine (tests, embedded deployments).
    pub fn with_engine(mut self, engine: Option<Box<dyn RenderEngine>>) -> Self {
        self.engine = engine;
        self
    }

    /// Use a different label geometry.
    pub fn with_config(mut self, config: LabelConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a different binarization policy.
    pub fn with_policy(mut self, policy: BinarizePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Use a different orchestrator (tests tune the inter-job delays).
    pub fn with_orchestrator(mut self, orchestrator: Orchestrator) -> Self {
        self.orchestrator = orchestrator;
        self
    }

    /// Access the underlying transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Run the render → encode pipeline for one request, without touching
    /// the transport.
    ///
    /// Desktop streams always carry `PRINT 1`; the orchestrator repeats the
    /// write per copy. Portable streams embed the copy count in their
    /// header.
    pub fn build_stream(
        &self,
        template: &LabelTemplate,
        request: &RenderRequest,
    ) -> Result<CommandStream, RotuloError> {
        if !request.render_as_bitmap {
            // Legacy text-field path: the device body is command text with
            // placeholders, no rasterization involved.
            let body = template.device_body.as_deref().unwrap_or(&template.body);
            return Ok(CommandStream::Text(substitute_plain(body, &request.fields)?));
        }

        let markup = substitute(&template.body, &request.fields)?;
        let width = self.config.width_dots();
        let height = self.config.height_dots();
        let fallback_lines = request.fallback_lines(&template.name);

        let image = render::render_with_fallback(
            self.engine.as_deref(),
            &markup,
            &fallback_lines,
            width,
            height,
        );
        let bitmap = MonoBitmap::from_gray(&image, self.policy);

        let stream = match request.printer {
            PrinterKind::Desktop => TsplEncoder::new(self.config).encode(&bitmap, 1),
            PrinterKind::Portable => {
                CpclEncoder::new(self.config).encode(&bitmap, request.copies)
            }
        };
        Ok(stream)
    }

    /// [`build_stream`](Self::build_stream), retrying once with the
    /// built-in fallback template when the stored template is bad.
    pub fn build_stream_or_fallback(
        &self,
        template: &LabelTemplate,
        request: &RenderRequest,
    ) -> Result<CommandStream, RotuloError> {
        match self.build_stream(template, request) {
            Err(RotuloError::Template(msg)) => {
                log::warn!(
                    "template {} unusable ({}), using built-in fallback template",
                    template.id,
                    msg
                );
                self.build_stream(&fallback_template(), request)
            }
            other => other,
        }
    }

    /// The external render interface: the command stream as wire text.
    pub fn render_response(
        &self,
        template: &LabelTemplate,
        request: &RenderRequest,
    ) -> Result<RenderResponse, RotuloError> {
        let stream = self.build_stream_or_fallback(template, request)?;
        Ok(RenderResponse {
            command_stream: stream.to_wire_text(),
        })
    }

    /// Render and print one label.
    pub fn print(
        &mut self,
        template: &LabelTemplate,
        request: &RenderRequest,
    ) -> Result<(), RotuloError> {
        let stream = self.build_stream_or_fallback(template, request)?;
        let job = PrintJob {
            id: template.id.clone(),
            stream,
            printer: request.printer,
            copies: request.copies,
        };
        self.orchestrator.dispatch(&mut self.transport, &job)
    }

    /// Render and print a batch of distinct labels sequentially.
    ///
    /// Items whose render/encode fails (past all fallbacks) are reported in
    /// place without reaching the transport; the rest are dispatched with
    /// the orchestrator's pacing. One outcome per item, in input order.
    pub fn print_batch(&mut self, items: &[BatchItem]) -> BatchReport {
        let mut slots: Vec<Option<JobOutcome>> = Vec::with_capacity(items.len());
        let mut jobs = Vec::new();

        for item in items {
            match self.build_stream_or_fallback(&item.template, &item.request) {
                Ok(stream) => {
                    jobs.push(PrintJob {
                        id: item.id.clone(),
                        stream,
                        printer: item.request.printer,
                        copies: item.request.copies,
                    });
                    slots.push(None);
                }
                Err(e) => {
                    log::warn!("batch item {} failed to render: {}", item.id, e);
                    slots.push(Some(JobOutcome {
                        id: item.id.clone(),
                        result: Err(e),
                    }));
                }
            }
        }

        let mut dispatched = self
            .orchestrator
            .dispatch_batch(&mut self.transport, &jobs)
            .outcomes
            .into_iter();

        let mut report = BatchReport::default();
        for slot in slots {
            match slot {
                Some(outcome) => report.outcomes.push(outcome),
                None => {
                    if let Some(outcome) = dispatched.next() {
                        report.outcomes.push(outcome);
                    }
                }
            }
        }
        report
    }
}
