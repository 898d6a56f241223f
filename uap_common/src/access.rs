//! Access decision shared by the client authorizer and chip-side checks.
//!
//! The effective permission of a field is the AND of its R-config and
//! I-config values: I-config acts as a permanent ceiling.

use crate::bits::ConfigRegister;
use crate::layout::{ConfigObjectId, FieldLocation};
use crate::slot::{PairingKeySlot, SlotMask};

/// Effective slot mask of a field given both config words of its register.
#[inline]
pub const fn effective_mask(
    r_config: ConfigRegister,
    i_config: ConfigRegister,
    location: FieldLocation,
) -> SlotMask {
    r_config
        .field(location.field)
        .intersection(i_config.field(location.field))
}

/// Whether `slot` may perform the operation located at `location`.
#[inline]
pub const fn permits(
    r_config: ConfigRegister,
    i_config: ConfigRegister,
    location: FieldLocation,
    slot: PairingKeySlot,
) -> bool {
    effective_mask(r_config, i_config, location).permits(slot)
}

/// Whether `value`, as the `CFG_UAP_PAIRING_KEY_WRITE` word of either config
/// object, still grants the admin slot write access to every pairing-key slot.
pub fn keeps_admin_key_write(value: ConfigRegister) -> bool {
    ConfigObjectId::PairingKeyWrite
        .layout()
        .fields
        .iter()
        .all(|rf| value.field(rf.field).permits(PairingKeySlot::ADMIN))
}
