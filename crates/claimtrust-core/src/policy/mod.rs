//! Provider chain policy: configuration, schema validation and the gate.

mod config;
pub mod gate;
pub mod schema;

pub use config::{PolicyConfig, PolicyError, ProviderPolicy, TokenLimit};
pub use gate::{GateDecision, GateSignals, GateStop, PolicyGate};
