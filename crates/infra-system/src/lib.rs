// guestctl Infrastructure - System Adapters
// Implements: CommandChannel, ScriptSource, ProgressReporter

pub mod fs_script_source;
pub mod subprocess_channel;
pub mod tracing_progress;
pub mod transport;

pub use fs_script_source::FsScriptSource;
pub use subprocess_channel::SubprocessChannel;
pub use tracing_progress::TracingProgress;
pub use transport::{SshOptions, Transport};
