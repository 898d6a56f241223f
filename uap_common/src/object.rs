//! Whole config-object values.
//!
//! A `ConfigObject` is the client-side mirror of one R-config or I-config:
//! one word per register, in layout order.

use crate::bits::{ConfigRegister, FieldLayout};
use crate::consts::CONFIG_OBJ_COUNT;
use crate::layout::{ConfigObjectId, FieldLocation};
use crate::slot::SlotMask;
use core::fmt;
use serde::{Deserialize, Serialize};

/// All registers of one config object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigObject {
    regs: [ConfigRegister; CONFIG_OBJ_COUNT],
}

impl ConfigObject {
    /// Object holding the factory-reset value in every register.
    pub fn factory_reset() -> Self {
        let mut regs = [ConfigRegister::default(); CONFIG_OBJ_COUNT];
        for id in ConfigObjectId::ALL {
            regs[id.index()] = ConfigRegister(id.factory_default());
        }
        Self { regs }
    }

    /// Build from raw words in register order.
    pub fn from_words(words: [u32; CONFIG_OBJ_COUNT]) -> Self {
        Self {
            regs: words.map(ConfigRegister),
        }
    }

    /// Raw words in register order.
    pub fn to_words(&self) -> [u32; CONFIG_OBJ_COUNT] {
        self.regs.map(ConfigRegister::bits)
    }

    #[inline]
    pub fn get(&self, id: ConfigObjectId) -> ConfigRegister {
        self.regs[id.index()]
    }

    #[inline]
    pub fn set(&mut self, id: ConfigObjectId, value: ConfigRegister) {
        self.regs[id.index()] = value;
    }

    /// Slot mask of one field.
    #[inline]
    pub fn field(&self, id: ConfigObjectId, field: FieldLayout) -> SlotMask {
        self.get(id).field(field)
    }

    /// Slot mask at a resolved operation location.
    #[inline]
    pub fn at(&self, location: FieldLocation) -> SlotMask {
        self.field(location.register, location.field)
    }

    /// Replace one field, leaving the rest of the register untouched.
    pub fn set_field(&mut self, id: ConfigObjectId, field: FieldLayout, mask: SlotMask) {
        let updated = self.get(id).with_field(field, mask);
        self.set(id, updated);
    }

    /// `(id, value)` pairs in register order.
    pub fn iter(&self) -> impl Iterator<Item = (ConfigObjectId, ConfigRegister)> + '_ {
        ConfigObjectId::ALL.into_iter().map(|id| (id, self.get(id)))
    }

    /// Registers whose value differs from `other`.
    pub fn diff(&self, other: &ConfigObject) -> Vec<ConfigObjectId> {
        self.iter()
            .filter(|(id, value)| other.get(*id) != *value)
            .map(|(id, _)| id)
            .collect()
    }
}

impl Default for ConfigObject {
    fn default() -> Self {
        Self::factory_reset()
    }
}

/// One `NAME: 0xVALUE` line per register.
impl fmt::Display for ConfigObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (id, value) in self.iter() {
            writeln!(f, "{}: {value}", id.name())?;
        }
        Ok(())
    }
}
