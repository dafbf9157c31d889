// Domain Layer - Machines, settings, provisioning steps and command output

pub mod error;
pub mod machine;
pub mod output;
pub mod settings;
pub mod step;

// Re-exports
pub use error::DomainError;
pub use machine::Machine;
pub use output::{CommandOutput, StreamTag};
pub use settings::ProvisionSettings;
pub use step::{ProvisionPlan, ProvisionStep, StepArg, StepKind, DEFAULT_INTERPRETER};
