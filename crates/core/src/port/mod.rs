// Port Layer - Interfaces for external dependencies

pub mod command_channel;
pub mod progress;
pub mod script_source;
pub mod time_provider; // For deterministic step timings

// Re-exports
pub use command_channel::{ChannelError, CommandChannel, CommandRequest, OutputSink};
pub use progress::ProgressReporter;
pub use script_source::ScriptSource;
pub use time_provider::TimeProvider;
