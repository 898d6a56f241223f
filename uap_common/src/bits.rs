//! Bit-packing helpers for permission fields.
//!
//! Pure arithmetic, no I/O. A field is addressed by `(offset, width)` inside a
//! 32-bit register word; bits outside the field are never touched.

use crate::slot::SlotMask;
use core::fmt;
use serde::{Deserialize, Serialize};

/// Width of every per-pairing-key permission field.
pub const SLOT_FIELD_WIDTH: u8 = 4;

/// Location of one permission field inside a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldLayout {
    /// Bit offset of the least significant field bit.
    pub offset: u8,
    /// Field width in bits.
    pub width: u8,
}

impl FieldLayout {
    /// Slot-mask field starting at `offset`.
    pub const fn slots_at(offset: u8) -> Self {
        Self {
            offset,
            width: SLOT_FIELD_WIDTH,
        }
    }

    /// Register bits covered by this field.
    #[inline]
    pub const fn mask(self) -> u32 {
        let ones = if self.width >= 32 {
            u32::MAX
        } else {
            (1u32 << self.width) - 1
        };
        ones << self.offset
    }

    /// Whether two fields share any register bit.
    #[inline]
    pub const fn overlaps(self, other: FieldLayout) -> bool {
        self.mask() & other.mask() != 0
    }
}

/// Place `mask` into the field at `(offset, width)` of `register`.
///
/// Slot bits that do not fit in `width` are dropped.
#[inline]
pub const fn set_field(register: u32, offset: u8, width: u8, mask: SlotMask) -> u32 {
    let field = FieldLayout { offset, width }.mask();
    (register & !field) | (((mask.bits() as u32) << offset) & field)
}

/// Extract the slot mask stored in the field at `(offset, width)` of `register`.
#[inline]
pub const fn get_field(register: u32, offset: u8, width: u8) -> SlotMask {
    let field = FieldLayout { offset, width }.mask();
    SlotMask::from_bits_truncate(((register & field) >> offset) as u8)
}

/// One 32-bit configuration register word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigRegister(pub u32);

impl ConfigRegister {
    /// Raw word value.
    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Slot mask stored in `field`.
    #[inline]
    pub const fn field(self, field: FieldLayout) -> SlotMask {
        get_field(self.0, field.offset, field.width)
    }

    /// Copy of this register with `field` replaced by `mask`.
    #[inline]
    #[must_use]
    pub const fn with_field(self, field: FieldLayout, mask: SlotMask) -> Self {
        Self(set_field(self.0, field.offset, field.width, mask))
    }

    /// Bits that would go from 0 to 1 when replacing `self` with `next`.
    #[inline]
    pub const fn raised_bits(self, next: ConfigRegister) -> u32 {
        !self.0 & next.0
    }
}

impl From<u32> for ConfigRegister {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<ConfigRegister> for u32 {
    fn from(value: ConfigRegister) -> Self {
        value.0
    }
}

impl fmt::Display for ConfigRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

impl fmt::LowerHex for ConfigRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}
