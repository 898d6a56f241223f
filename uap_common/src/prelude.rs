//! Prelude module for common re-exports.
//!
//! ```rust
//! use uap_common::prelude::*;
//! ```

// ─── Logging / Configuration ────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, ProvisionConfig, SharedConfig};

// ─── Layout ─────────────────────────────────────────────────────────
pub use crate::bits::{ConfigRegister, FieldLayout, get_field, set_field};
pub use crate::layout::{
    ConfigObjectId, ConfigObjectKind, FieldLocation, LAYOUT_VERSION, Operation, RegisterGroup,
};
pub use crate::object::ConfigObject;
pub use crate::slot::{PairingKeySlot, SlotMask};

// ─── Errors / Transport ─────────────────────────────────────────────
pub use crate::error::{TransportError, UapError};
pub use crate::transport::{
    ChipTransport, PairingCredentials, PairingPublicKey, SessionContext, TransportFactory,
};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{CONFIG_OBJ_COUNT, PAIRING_KEY_LEN};
