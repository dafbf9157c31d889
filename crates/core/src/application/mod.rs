// Application Layer - Use Cases

pub mod constants;
pub mod hosts;
pub mod inventory;
pub mod probe;
pub mod provision;

// Re-exports
pub use inventory::Inventory;
pub use probe::{AddressProbe, ProbeError, ProbeOutcome, ProbeReport};
pub use provision::{ProvisionError, ProvisionReport, Provisioner, StepReport};
