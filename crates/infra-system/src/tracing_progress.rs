// Progress reporter backed by tracing
use tracing::info;

use guestctl_core::port::ProgressReporter;

/// Emits one info event per processed machine
pub struct TracingProgress;

impl ProgressReporter for TracingProgress {
    fn processing(&self, machine: &str) {
        info!(machine = %machine, "Processing {} ...", machine);
    }
}
