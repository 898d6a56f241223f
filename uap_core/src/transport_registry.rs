//! Transport registry.
//!
//! Provides a `TransportRegistry` for registering and retrieving chip
//! transport factories by name. Built at startup and passed by value; no
//! global state.

use std::collections::HashMap;
use uap_common::error::TransportError;
use uap_common::transport::{ChipTransport, TransportFactory};

use crate::drivers;

/// Registry of available chip transports.
pub struct TransportRegistry {
    factories: HashMap<&'static str, TransportFactory>,
}

impl TransportRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry pre-populated with every built-in transport.
    pub fn with_builtin() -> Self {
        let mut reg = Self::new();
        drivers::register_builtin(&mut reg);
        reg
    }

    /// Register a transport factory.
    ///
    /// # Panics
    /// Panics if a transport with the same name is already registered.
    pub fn register(&mut self, name: &'static str, factory: TransportFactory) {
        if self.factories.contains_key(name) {
            panic!("Transport '{name}' is already registered");
        }
        self.factories.insert(name, factory);
    }

    /// Get a transport factory by name.
    pub fn get_factory(&self, name: &str) -> Option<TransportFactory> {
        self.factories.get(name).copied()
    }

    /// Create a transport instance by name.
    ///
    /// # Errors
    /// Returns `TransportError::NotFound` if nothing is registered under `name`.
    pub fn create(&self, name: &str) -> Result<Box<dyn ChipTransport>, TransportError> {
        let factory = self
            .get_factory(name)
            .ok_or_else(|| TransportError::NotFound(name.to_string()))?;
        Ok(factory())
    }

    /// List all registered transport names.
    pub fn list(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }
}

impl Default for TransportRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::simulation::SimulatedChip;

    fn create_test_transport() -> Box<dyn ChipTransport> {
        Box::new(SimulatedChip::new())
    }

    #[test]
    fn registry_register_and_create() {
        let mut reg = TransportRegistry::new();
        reg.register("test_transport", create_test_transport);

        let transport = reg.create("test_transport").expect("should create");
        assert_eq!(transport.name(), "simulation");
    }

    #[test]
    fn registry_transport_not_found() {
        let reg = TransportRegistry::new();
        let result = reg.create("spi");
        assert!(matches!(result, Err(TransportError::NotFound(_))));
    }

    #[test]
    fn builtin_contains_simulation() {
        let reg = TransportRegistry::with_builtin();
        assert_eq!(reg.list(), vec!["simulation"]);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn registry_duplicate_panics() {
        let mut reg = TransportRegistry::new();
        reg.register("dup", create_test_transport);
        reg.register("dup", create_test_transport);
    }
}
