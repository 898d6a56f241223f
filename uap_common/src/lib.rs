//! UAP Common Library
//!
//! This crate provides the shared vocabulary of the secure-element access
//! model: pairing-key slots, the versioned config-object layout, bit-packing
//! helpers, the access decision, the transport trait, errors and
//! configuration loading.
//!
//! # Module Structure
//!
//! - [`slot`] - Pairing-key slots and slot masks
//! - [`bits`] - Permission-field bit packing
//! - [`layout`] - Register map, operations and factory values
//! - [`object`] - Whole config-object values
//! - [`access`] - Effective-permission decision
//! - [`transport`] - Transport collaborator trait
//! - [`error`] - Error taxonomy
//! - [`config`] - Configuration loading traits and types
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use uap_common::prelude::*;
//!
//! let loc = Operation::EccKeyGenerate(3).locate().unwrap();
//! let obj = ConfigObject::factory_reset();
//! assert!(obj.at(loc).permits(PairingKeySlot::SH1));
//! ```

pub mod access;
pub mod bits;
pub mod config;
pub mod consts;
pub mod error;
pub mod layout;
pub mod object;
pub mod prelude;
pub mod slot;
pub mod transport;
