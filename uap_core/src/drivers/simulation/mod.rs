//! Simulated secure element.
//!
//! Holds both config objects and the pairing-key slots in memory, checks
//! session proofs with X25519 and enforces permissions the way the chip
//! does. State can be persisted across runs.

mod chip;
mod state;

pub use chip::{FACTORY_SH0_PRIVATE, SimulatedChip, derive_public, factory_credentials};
pub use state::{PairingKeyState, PersistedChipState, StatePersistence};

use uap_common::transport::ChipTransport;

/// Factory function to create a simulated chip in factory state.
pub fn create_transport() -> Box<dyn ChipTransport> {
    Box::new(SimulatedChip::new())
}
