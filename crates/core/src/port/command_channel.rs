// Command Channel Port
// Abstraction for running a command on a guest machine and streaming back
// its output, tagged by stream

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::domain::{Machine, StreamTag};

/// Command to run on a guest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub command: String,
    /// Run with elevated privilege (sudo on the guest)
    pub privileged: bool,
    /// Bytes written to the command's stdin, then closed
    pub stdin: Option<Vec<u8>>,
}

impl CommandRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            privileged: false,
            stdin: None,
        }
    }

    pub fn privileged(mut self, privileged: bool) -> Self {
        self.privileged = privileged;
        self
    }

    pub fn with_stdin(mut self, stdin: Vec<u8>) -> Self {
        self.stdin = Some(stdin);
        self
    }
}

/// Channel errors
///
/// Every variant is a channel execution failure as far as probing is
/// concerned; they stay distinct here so callers can tell them apart.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ChannelError {
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    #[error("Command exited with code {code}")]
    NonZeroExit { code: i32 },

    #[error("Command terminated by signal")]
    Signaled,

    #[error("Command timeout after {0}ms")]
    Timeout(u64),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("IO error: {0}")]
    IoError(String),
}

/// Receives output chunks as they arrive
pub type OutputSink<'a> = dyn FnMut(StreamTag, &str) + Send + 'a;

/// Command Channel trait
///
/// Implementations:
/// - SubprocessChannel: local shell, `ssh` or `vagrant ssh` child process
/// - mocks::MockCommandChannel: scripted output for tests
#[async_trait]
pub trait CommandChannel: Send + Sync {
    /// Run `request` on `machine`, calling `sink` once per output chunk in
    /// arrival order
    ///
    /// # Errors
    /// - ChannelError::ConnectFailed if the guest cannot be reached
    /// - ChannelError::NonZeroExit if the command fails
    /// - ChannelError::Timeout if the adapter's deadline passes
    async fn execute(
        &self,
        machine: &Machine,
        request: &CommandRequest,
        sink: &mut OutputSink<'_>,
    ) -> Result<(), ChannelError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// One scripted event of a mock command run
    #[derive(Debug, Clone)]
    pub enum MockEvent {
        /// Deliver an output chunk
        Chunk(StreamTag, String),
        /// Abort the run with an error
        Fail(ChannelError),
    }

    impl MockEvent {
        pub fn stdout(text: impl Into<String>) -> Self {
            MockEvent::Chunk(StreamTag::Stdout, text.into())
        }

        pub fn stderr(text: impl Into<String>) -> Self {
            MockEvent::Chunk(StreamTag::Stderr, text.into())
        }
    }

    /// Call recorded by the mock channel
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct RecordedCall {
        pub machine: String,
        pub request: CommandRequest,
    }

    /// Mock Command Channel for testing
    ///
    /// Each call consumes the next scripted response; once the queue is empty
    /// calls succeed without output.
    pub struct MockCommandChannel {
        responses: Mutex<VecDeque<Vec<MockEvent>>>,
        calls: Mutex<Vec<RecordedCall>>,
    }

    impl MockCommandChannel {
        pub fn new() -> Self {
            Self::with_responses(Vec::new())
        }

        pub fn with_responses(responses: Vec<Vec<MockEvent>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Single response emitting `text` on stdout
        pub fn stdout(text: impl Into<String>) -> Self {
            Self::with_responses(vec![vec![MockEvent::stdout(text)]])
        }

        /// Single response failing with `error`
        pub fn failing(error: ChannelError) -> Self {
            Self::with_responses(vec![vec![MockEvent::Fail(error)]])
        }

        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl Default for MockCommandChannel {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl CommandChannel for MockCommandChannel {
        async fn execute(
            &self,
            machine: &Machine,
            request: &CommandRequest,
            sink: &mut OutputSink<'_>,
        ) -> Result<(), ChannelError> {
            self.calls.lock().unwrap().push(RecordedCall {
                machine: machine.name.clone(),
                request: request.clone(),
            });

            let events = self.responses.lock().unwrap().pop_front().unwrap_or_default();

            for event in events {
                match event {
                    MockEvent::Chunk(tag, text) => sink(tag, &text),
                    MockEvent::Fail(err) => return Err(err),
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mocks::*;
    use super::*;

    #[tokio::test]
    async fn test_mock_replays_chunks_in_order() {
        let channel = MockCommandChannel::with_responses(vec![vec![
            MockEvent::stdout("a"),
            MockEvent::stderr("b"),
            MockEvent::stdout("c"),
        ]]);
        let machine = Machine::new("web").unwrap();

        let mut seen = Vec::new();
        channel
            .execute(&machine, &CommandRequest::new("true"), &mut |tag, text| {
                seen.push((tag, text.to_string()))
            })
            .await
            .unwrap();

        assert_eq!(
            seen,
            vec![
                (StreamTag::Stdout, "a".to_string()),
                (StreamTag::Stderr, "b".to_string()),
                (StreamTag::Stdout, "c".to_string()),
            ]
        );
        assert_eq!(channel.calls()[0].machine, "web");
    }

    #[test]
    fn test_request_builder() {
        let request = CommandRequest::new("bash -s")
            .privileged(true)
            .with_stdin(b"echo hi".to_vec());

        assert!(request.privileged);
        assert_eq!(request.stdin.as_deref(), Some(&b"echo hi"[..]));
    }
}
