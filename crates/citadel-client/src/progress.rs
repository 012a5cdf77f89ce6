//! Progress reporting for remote training/testing runs.

use crate::proto;

/// Events emitted while a run is polled.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Started { run_id: String },
    Metric { run_id: String, name: String, metric: proto::Metric },
    Finished { run_id: String },
}

pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: ProgressEvent);
}

/// Prints run progress to stdout, one line per event.
#[derive(Debug, Default)]
pub struct StdoutProgressSink;

impl ProgressSink for StdoutProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Started { run_id } => println!("[run:{run_id}] started"),
            ProgressEvent::Metric { run_id, name, metric } => println!(
                "[run:{run_id}] epoch {}/{} batch {}/{} {name}={:.4} (+/- {:.4})",
                metric.epoch + 1,
                metric.nb_epochs,
                metric.batch + 1,
                metric.nb_batches,
                metric.value,
                metric.uncertainty
            ),
            ProgressEvent::Finished { run_id } => println!("[run:{run_id}] finished"),
        }
    }
}

/// Discards all events; the default when callers only want the result.
#[derive(Debug, Default)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn on_event(&self, _event: ProgressEvent) {}
}
