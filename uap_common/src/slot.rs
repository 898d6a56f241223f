//! Pairing-key slot identities and per-field slot masks.
//!
//! A permission field carries one bit per pairing-key slot. `SlotMask` is the
//! typed form of that 4-bit value; `PairingKeySlot` names the slot a session
//! authenticated with.

use bitflags::bitflags;
use core::fmt;
use serde::{Deserialize, Serialize};

/// One of the four pairing-key slots able to open a secure session.
///
/// `SH0` is the factory admin slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum PairingKeySlot {
    /// Factory admin slot.
    SH0 = 0,
    SH1 = 1,
    SH2 = 2,
    SH3 = 3,
}

impl PairingKeySlot {
    /// All slots in index order.
    pub const ALL: [Self; 4] = [Self::SH0, Self::SH1, Self::SH2, Self::SH3];

    /// The factory admin slot.
    pub const ADMIN: Self = Self::SH0;

    /// Convert from raw `u8`. Returns `None` for values above 3.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::SH0),
            1 => Some(Self::SH1),
            2 => Some(Self::SH2),
            3 => Some(Self::SH3),
            _ => None,
        }
    }

    /// Slot index (0..=3).
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Single-bit mask selecting this slot.
    #[inline]
    pub const fn mask(self) -> SlotMask {
        SlotMask::from_bits_truncate(1 << (self as u8))
    }
}

impl fmt::Display for PairingKeySlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SH{}", *self as u8)
    }
}

impl TryFrom<u8> for PairingKeySlot {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_u8(value).ok_or_else(|| format!("pairing key slot {value} out of range 0..=3"))
    }
}

impl From<PairingKeySlot> for u8 {
    fn from(slot: PairingKeySlot) -> Self {
        slot as u8
    }
}

bitflags! {
    /// 4-bit access mask of a permission field, one bit per pairing-key slot.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SlotMask: u8 {
        /// A session opened with SH0 has access.
        const SH0 = 0x01;
        /// A session opened with SH1 has access.
        const SH1 = 0x02;
        /// A session opened with SH2 has access.
        const SH2 = 0x04;
        /// A session opened with SH3 has access.
        const SH3 = 0x08;
    }
}

impl SlotMask {
    /// Whether a session authenticated as `slot` is covered by this mask.
    #[inline]
    pub const fn permits(self, slot: PairingKeySlot) -> bool {
        self.contains(slot.mask())
    }

    /// Slots covered by this mask, in index order.
    pub fn slots(self) -> impl Iterator<Item = PairingKeySlot> {
        PairingKeySlot::ALL
            .into_iter()
            .filter(move |slot| self.permits(*slot))
    }
}

impl From<PairingKeySlot> for SlotMask {
    fn from(slot: PairingKeySlot) -> Self {
        slot.mask()
    }
}

impl FromIterator<PairingKeySlot> for SlotMask {
    fn from_iter<I: IntoIterator<Item = PairingKeySlot>>(iter: I) -> Self {
        iter.into_iter()
            .fold(SlotMask::empty(), |acc, slot| acc | slot.mask())
    }
}

impl fmt::Display for SlotMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        let mut first = true;
        for slot in self.slots() {
            if !first {
                write!(f, "|")?;
            }
            write!(f, "{slot}")?;
            first = false;
        }
        Ok(())
    }
}
