// Progress Reporter Port
// Console/log sink for per-machine progress lines

/// Progress reporter interface
pub trait ProgressReporter: Send + Sync {
    /// Called once per probe, before any command is sent to the machine
    fn processing(&self, machine: &str);
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Records every progress line
    #[derive(Default)]
    pub struct RecordingProgress {
        lines: Mutex<Vec<String>>,
    }

    impl RecordingProgress {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn lines(&self) -> Vec<String> {
            self.lines.lock().unwrap().clone()
        }
    }

    impl ProgressReporter for RecordingProgress {
        fn processing(&self, machine: &str) {
            self.lines.lock().unwrap().push(machine.to_string());
        }
    }
}
