//! # Print Job Orchestration
//!
//! Turns encoded command streams into transport writes, applying the
//! per-family copy semantics:
//!
//! - **Portable** (CPCL): the copy count already sits in the `!` header
//!   quantity field, so the stream is written exactly once.
//! - **Desktop** (TSPL): the `PRINT` trailer nominally takes a quantity, but
//!   controller firmware handles it unreliably, so the whole stream is
//!   written once per copy, back to back with no delay.
//!
//! Batches run strictly sequentially on the single serial connection. A
//! fixed inter-job delay separates *different* labels so the printer's
//! receive buffer can drain, never between repeated copies of the same label. A
//! failed write aborts only its own job; the batch continues and the report
//! carries one outcome per item. Nothing is rolled back.

use std::thread;
use std::time::Duration;

use crate::error::RotuloError;
use crate::printer::PrinterKind;
use crate::protocol::CommandStream;
use crate::transport::Transport;

/// Pause between distinct labels on portable printers
pub const INTER_JOB_DELAY_PORTABLE: Duration = Duration::from_millis(200);

/// Pause between distinct labels on desktop printers
pub const INTER_JOB_DELAY_DESKTOP: Duration = Duration::from_millis(500);

/// One encoded label ready for dispatch.
#[derive(Debug, Clone)]
pub struct PrintJob {
    /// Item identity carried through to the batch report
    pub id: String,

    /// Encoded command stream. Desktop streams are expected to carry
    /// `PRINT 1`; portable streams carry the quantity in their header.
    pub stream: CommandStream,

    /// Target printer family
    pub printer: PrinterKind,

    /// Copy count (positive)
    pub copies: u32,
}

/// Outcome of one job within a batch.
#[derive(Debug)]
pub struct JobOutcome {
    pub id: String,
    pub result: Result<(), RotuloError>,
}

/// Per-item outcomes of a batch. Partial success is expected: some labels
/// printed, some failed, nothing rolled back.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<JobOutcome>,
}

impl BatchReport {
    /// Whether every job succeeded.
    pub fn all_ok(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    /// Identities of the failed jobs.
    pub fn failed_ids(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.result.is_err())
            .map(|o| o.id.as_str())
            .collect()
    }
}

/// Stateless dispatcher applying copy and pacing semantics per printer
/// family.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    delay_portable: Duration,
    delay_desktop: Duration,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self {
            delay_portable: INTER_JOB_DELAY_PORTABLE,
            delay_desktop: INTER_JOB_DELAY_DESKTOP,
        }
    }

    /// Override the inter-job delays (tests, tuned deployments).
    pub fn with_delays(delay_portable: Duration, delay_desktop: Duration) -> Self {
        Self {
            delay_portable,
            delay_desktop,
        }
    }

    /// Dispatch a single job.
    ///
    /// Desktop: `copies` identical writes, no inter-write delay. Portable:
    /// one write. The first failed write aborts the job.
    pub fn dispatch(
        &self,
        transport: &mut dyn Transport,
        job: &PrintJob,
    ) -> Result<(), RotuloError> {
        match job.printer {
            PrinterKind::Desktop => {
                for _ in 0..job.copies.max(1) {
                    transport.send(&job.stream)?;
                }
            }
            PrinterKind::Portable => {
                transport.send(&job.stream)?;
            }
        }
        Ok(())
    }

    /// Dispatch a batch of distinct labels sequentially.
    ///
    /// Each failure is recorded against its job identity and the batch
    /// moves on. The inter-job delay is applied between jobs, not after the
    /// last one.
    pub fn dispatch_batch(
        &self,
        transport: &mut dyn Transport,
        jobs: &[PrintJob],
    ) -> BatchReport {
        let mut report = BatchReport::default();

        for (index, job) in jobs.iter().enumerate() {
            let result = self.dispatch(transport, job);
            if let Err(e) = &result {
                log::warn!("print job {} failed: {}", job.id, e);
            }
            report.outcomes.push(JobOutcome {
                id: job.id.clone(),
                result,
            });

            if index + 1 < jobs.len() {
                let delay = match job.printer {
                    PrinterKind::Portable => self.delay_portable,
                    PrinterKind::Desktop => self.delay_desktop,
                };
                if !delay.is_zero() {
                    thread::sleep(delay);
                }
            }
        }

        report
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Transport double that records every stream it is handed.
    struct Recording {
        sent: Vec<Vec<u8>>,
        fail_on: Option<usize>,
        calls: usize,
    }

    impl Recording {
        fn new() -> Self {
            Self {
                sent: Vec::new(),
                fail_on: None,
                calls: 0,
            }
        }

        fn failing_on(call: usize) -> Self {
            Self {
                sent: Vec::new(),
                fail_on: Some(call),
                calls: 0,
            }
        }
    }

    impl Transport for Recording {
        fn send(&mut self, stream: &CommandStream) -> Result<(), RotuloError> {
            let call = self.calls;
            self.calls += 1;
            if self.fail_on == Some(call) {
                return Err(RotuloError::Transport("printer went away".into()));
            }
            self.sent.push(stream.to_bytes());
            Ok(())
        }
    }

    fn desktop_job(id: &str, copies: u32) -> PrintJob {
        PrintJob {
            id: id.into(),
            stream: CommandStream::Text("CLS\r\nPRINT 1\r\n".into()),
            printer: PrinterKind::Desktop,
            copies,
        }
    }

    fn portable_job(id: &str, copies: u32) -> PrintJob {
        PrintJob {
            id: id.into(),
            stream: CommandStream::Text(format!("! 0 203 203 240 {}\r\nPRINT\r\n", copies)),
            printer: PrinterKind::Portable,
            copies,
        }
    }

    fn quiet() -> Orchestrator {
        Orchestrator::with_delays(Duration::ZERO, Duration::ZERO)
    }

    #[test]
    fn test_desktop_copies_write_per_copy() {
        let mut transport = Recording::new();
        quiet()
            .dispatch(&mut transport, &desktop_job("a", 3))
            .unwrap();
        assert_eq!(transport.sent.len(), 3);
        assert_eq!(transport.sent[0], transport.sent[1]);
        assert_eq!(transport.sent[1], transport.sent[2]);
    }

    #[test]
    fn test_portable_copies_single_write_with_quantity() {
        let mut transport = Recording::new();
        quiet()
            .dispatch(&mut transport, &portable_job("a", 3))
            .unwrap();
        assert_eq!(transport.sent.len(), 1);
        let text = String::from_utf8(transport.sent[0].clone()).unwrap();
        assert!(text.starts_with("! 0 203 203 240 3\r\n"));
    }

    #[test]
    fn test_desktop_zero_copies_still_prints_once() {
        let mut transport = Recording::new();
        quiet()
            .dispatch(&mut transport, &desktop_job("a", 0))
            .unwrap();
        assert_eq!(transport.sent.len(), 1);
    }

    #[test]
    fn test_failed_write_aborts_job_mid_copies() {
        let mut transport = Recording::failing_on(1);
        let err = quiet()
            .dispatch(&mut transport, &desktop_job("a", 3))
            .unwrap_err();
        assert!(matches!(err, RotuloError::Transport(_)));
        assert_eq!(transport.sent.len(), 1); // first copy went out, rest aborted
    }

    #[test]
    fn test_batch_continues_past_failure_and_reports_per_item() {
        // Second write (job "b") fails; "a" and "c" still print
        let mut transport = Recording::failing_on(1);
        let jobs = vec![
            portable_job("a", 1),
            portable_job("b", 1),
            portable_job("c", 1),
        ];
        let report = quiet().dispatch_batch(&mut transport, &jobs);

        assert_eq!(report.outcomes.len(), 3);
        assert!(!report.all_ok());
        assert_eq!(report.failed_ids(), vec!["b"]);
        assert_eq!(transport.sent.len(), 2);
    }

    #[test]
    fn test_batch_all_ok() {
        let mut transport = Recording::new();
        let jobs = vec![desktop_job("a", 2), desktop_job("b", 1)];
        let report = quiet().dispatch_batch(&mut transport, &jobs);
        assert!(report.all_ok());
        assert_eq!(transport.sent.len(), 3); // 2 copies + 1 copy
    }
}
