//! # UAP Core Library
//!
//! Session authorization and config-object access for a secure element,
//! with a pluggable transport architecture.
//!
//! Transports implement the `ChipTransport` trait defined in
//! `uap_common::transport`.
//!
//! # Module Structure
//!
//! - [`authorizer`] - Session state machine and permission decisions
//! - [`registry`] - Authorized R-config / I-config access
//! - [`profile`] - Declarative configuration profile builder
//! - [`handle`] - `ChipHandle`, the per-chip entry point
//! - [`provision`] - End-to-end provisioning flow
//! - [`transport_registry`] - Transport factory registration
//! - [`drivers`] - Transport implementations
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          ChipHandle                              │
//! │  ┌──────────────────┐   ┌──────────────────┐                     │
//! │  │ SessionAuthorizer│◄──│ ConfigRegistry   │◄── ConfigProfile    │
//! │  │ (state + cache)  │   │ (read/write/...) │                     │
//! │  └────────┬─────────┘   └────────┬─────────┘                     │
//! │           │                      │                               │
//! │           ▼                      ▼                               │
//! │                ┌────────────────┐                                │
//! │                │ ChipTransport  │ (simulation, ...)              │
//! │                └────────────────┘                                │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

pub mod authorizer;
pub mod drivers;
pub mod handle;
pub mod profile;
pub mod provision;
pub mod registry;
pub mod transport_registry;

pub use crate::authorizer::{SessionAuthorizer, SessionState};
pub use crate::handle::ChipHandle;
pub use crate::profile::{
    ConfigProfile, FieldSelector, ProfileBuilder, ProfileRule, reference_r_config,
};
pub use crate::provision::{ProvisionError, ProvisionReport, provision};
pub use crate::registry::ConfigRegistry;
pub use crate::transport_registry::TransportRegistry;
