//! Chip transport implementations.
//!
//! - [`simulation`] - In-process secure element for development and testing
//!
//! # Adding New Transports
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement the `ChipTransport` trait from `uap_common::transport`
//! 3. Register it in `register_builtin()`

pub mod simulation;

use crate::transport_registry::TransportRegistry;

/// Register every built-in transport.
pub fn register_builtin(registry: &mut TransportRegistry) {
    registry.register("simulation", simulation::create_transport);
}
