// Command Output Accumulator

use serde::{Deserialize, Serialize};

/// Stream a chunk of command output arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamTag {
    Stdout,
    Stderr,
}

impl std::fmt::Display for StreamTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamTag::Stdout => write!(f, "stdout"),
            StreamTag::Stderr => write!(f, "stderr"),
        }
    }
}

/// Accumulates the stdout chunks of one command, in delivery order
///
/// Stderr chunks are dropped on arrival.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    stdout: String,
}

impl CommandOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one tagged chunk
    pub fn push(&mut self, tag: StreamTag, chunk: &str) {
        if tag == StreamTag::Stdout {
            self.stdout.push_str(chunk);
        }
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    /// Last line of the accumulated stdout
    ///
    /// Trailing line terminators are stripped before splitting on `\n`.
    /// Returns `None` when nothing but line terminators was received.
    pub fn last_line(&self) -> Option<&str> {
        let trimmed = self.stdout.trim_end_matches(['\n', '\r']);
        if trimmed.is_empty() {
            return None;
        }
        trimmed
            .rsplit('\n')
            .next()
            .map(|line| line.trim_end_matches('\r'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stderr_is_excluded() {
        let mut output = CommandOutput::new();
        output.push(StreamTag::Stdout, "10.0.");
        output.push(StreamTag::Stderr, "warning: something\n");
        output.push(StreamTag::Stdout, "0.5");
        output.push(StreamTag::Stderr, "more noise");
        output.push(StreamTag::Stdout, "\n");

        assert_eq!(output.stdout(), "10.0.0.5\n");
    }

    #[test]
    fn test_last_line_single() {
        let mut output = CommandOutput::new();
        output.push(StreamTag::Stdout, "10.0.0.5\n");
        assert_eq!(output.last_line(), Some("10.0.0.5"));
    }

    #[test]
    fn test_last_line_wins() {
        let mut output = CommandOutput::new();
        output.push(StreamTag::Stdout, "eth0\n192.168.1.10\n");
        assert_eq!(output.last_line(), Some("192.168.1.10"));
    }

    #[test]
    fn test_multiple_trailing_newlines() {
        let mut output = CommandOutput::new();
        output.push(StreamTag::Stdout, "10.0.2.15\n172.28.128.3\n\n\n");
        assert_eq!(output.last_line(), Some("172.28.128.3"));
    }

    #[test]
    fn test_crlf_terminators() {
        let mut output = CommandOutput::new();
        output.push(StreamTag::Stdout, "10.0.2.15\r\n172.28.128.3\r\n");
        assert_eq!(output.last_line(), Some("172.28.128.3"));
    }

    #[test]
    fn test_no_trailing_newline() {
        let mut output = CommandOutput::new();
        output.push(StreamTag::Stdout, "10.0.2.15\n172.28.128.3");
        assert_eq!(output.last_line(), Some("172.28.128.3"));
    }

    #[test]
    fn test_empty_output_has_no_line() {
        assert_eq!(CommandOutput::new().last_line(), None);

        let mut output = CommandOutput::new();
        output.push(StreamTag::Stdout, "\n\n");
        assert_eq!(output.last_line(), None);
    }
}
