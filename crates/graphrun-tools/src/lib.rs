pub mod builtin;
pub mod registry;

pub use registry::{Capability, CapabilityInfo, CapabilityMode, CapabilityRegistry};
