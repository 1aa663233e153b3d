pub mod message;
pub mod settings;
pub mod types;

pub use message::{ControlMessage, ControlResponse, HostEvent, StructuralChange};
pub use settings::{ClassifierAccess, FilterConfiguration, InvalidSettings};
pub use types::{ContextSignals, FilterAction, FilterDecision};
