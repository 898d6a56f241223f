//! Configuration Profile Builder.
//!
//! A profile is a complete assignment of every register of one config
//! object. It is built from factory values by applying an ordered list of
//! declarative rules. `Restrict` clears a field before setting the granted
//! slots, so the outcome never depends on what the field held before.

use heapless::Vec as FixedVec;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uap_common::access::keeps_admin_key_write;
use uap_common::bits::FieldLayout;
use uap_common::error::UapError;
use uap_common::layout::{
    ConfigObjectId, ConfigObjectKind, LAYOUT_VERSION, Operation, SLEEP_MODE_EN_MASK,
};
use uap_common::object::ConfigObject;
use uap_common::slot::{PairingKeySlot, SlotMask};

/// Upper bound on rules in one builder.
pub const MAX_PROFILE_RULES: usize = 64;

/// Which fields of a register a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSelector {
    /// Every permission field of the register.
    All,
    /// Fields whose resource range lies inside `first..=last`.
    Resources { first: u16, last: u16 },
}

impl FieldSelector {
    pub const fn range(first: u16, last: u16) -> Self {
        Self::Resources { first, last }
    }
}

/// One declarative provisioning step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileRule {
    /// Disable every slot in the selected fields, then enable `slots`.
    Restrict {
        register: ConfigObjectId,
        fields: FieldSelector,
        slots: SlotMask,
    },
    /// Add `slots` to the selected fields.
    Grant {
        register: ConfigObjectId,
        fields: FieldSelector,
        slots: SlotMask,
    },
    /// Remove `slots` from the selected fields.
    Revoke {
        register: ConfigObjectId,
        fields: FieldSelector,
        slots: SlotMask,
    },
    /// Clear raw bits of a register without permission fields.
    ClearBits { register: ConfigObjectId, mask: u32 },
}

/// Complete, verifiable content of one config object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigProfile {
    kind: ConfigObjectKind,
    layout_version: u16,
    object: ConfigObject,
}

impl ConfigProfile {
    pub fn kind(&self) -> ConfigObjectKind {
        self.kind
    }

    pub fn layout_version(&self) -> u16 {
        self.layout_version
    }

    pub fn object(&self) -> &ConfigObject {
        &self.object
    }

    /// Slot mask this profile assigns to `operation`.
    pub fn field(&self, operation: Operation) -> Result<SlotMask, UapError> {
        Ok(self.object.at(operation.locate()?))
    }

    /// Whether this profile alone grants `operation` to `slot`.
    pub fn permits(&self, operation: Operation, slot: PairingKeySlot) -> Result<bool, UapError> {
        Ok(self.field(operation)?.permits(slot))
    }
}

/// Accumulates rules and produces a `ConfigProfile`.
#[derive(Debug, Clone)]
pub struct ProfileBuilder {
    kind: ConfigObjectKind,
    base: ConfigObject,
    rules: FixedVec<ProfileRule, MAX_PROFILE_RULES>,
    overflowed: bool,
}

impl ProfileBuilder {
    /// Start from factory-reset values.
    pub fn new(kind: ConfigObjectKind) -> Self {
        Self::from_base(kind, ConfigObject::factory_reset())
    }

    /// Start from an arbitrary object, e.g. one read back from the chip.
    pub fn from_base(kind: ConfigObjectKind, base: ConfigObject) -> Self {
        Self {
            kind,
            base,
            rules: FixedVec::new(),
            overflowed: false,
        }
    }

    pub fn rule(mut self, rule: ProfileRule) -> Self {
        if self.rules.push(rule).is_err() {
            self.overflowed = true;
        }
        self
    }

    pub fn restrict(
        self,
        register: ConfigObjectId,
        fields: FieldSelector,
        slots: impl Into<SlotMask>,
    ) -> Self {
        self.rule(ProfileRule::Restrict {
            register,
            fields,
            slots: slots.into(),
        })
    }

    pub fn grant(
        self,
        register: ConfigObjectId,
        fields: FieldSelector,
        slots: impl Into<SlotMask>,
    ) -> Self {
        self.rule(ProfileRule::Grant {
            register,
            fields,
            slots: slots.into(),
        })
    }

    pub fn revoke(
        self,
        register: ConfigObjectId,
        fields: FieldSelector,
        slots: impl Into<SlotMask>,
    ) -> Self {
        self.rule(ProfileRule::Revoke {
            register,
            fields,
            slots: slots.into(),
        })
    }

    pub fn clear_bits(self, register: ConfigObjectId, mask: u32) -> Self {
        self.rule(ProfileRule::ClearBits { register, mask })
    }

    pub fn rules(&self) -> &[ProfileRule] {
        &self.rules
    }

    /// Apply every rule in order.
    ///
    /// # Errors
    /// Returns `InvalidProfileRule` when a selector matches no field, a
    /// `ClearBits` rule targets a permission register, or more than
    /// `MAX_PROFILE_RULES` rules were added.
    pub fn build(&self) -> Result<ConfigProfile, UapError> {
        if self.overflowed {
            return Err(UapError::InvalidProfileRule(format!(
                "more than {MAX_PROFILE_RULES} rules"
            )));
        }
        let mut object = self.base;
        for rule in &self.rules {
            apply_rule(&mut object, rule)?;
        }
        let key_write = object.get(ConfigObjectId::PairingKeyWrite);
        if !keeps_admin_key_write(key_write) {
            return Err(UapError::AdminLockout {
                kind: self.kind,
                requested: key_write.bits(),
            });
        }
        Ok(ConfigProfile {
            kind: self.kind,
            layout_version: LAYOUT_VERSION,
            object,
        })
    }
}

fn selected_fields(
    register: ConfigObjectId,
    selector: FieldSelector,
) -> Result<Vec<FieldLayout>, UapError> {
    let fields: Vec<FieldLayout> = register
        .layout()
        .fields
        .iter()
        .filter(|rf| match selector {
            FieldSelector::All => true,
            FieldSelector::Resources { first, last } => rf.first >= first && rf.last <= last,
        })
        .map(|rf| rf.field)
        .collect();
    if fields.is_empty() {
        return Err(UapError::InvalidProfileRule(format!(
            "{register} has no field matching {selector:?}"
        )));
    }
    Ok(fields)
}

fn apply_rule(object: &mut ConfigObject, rule: &ProfileRule) -> Result<(), UapError> {
    debug!("Profile rule {rule:?}");
    match *rule {
        ProfileRule::Restrict {
            register,
            fields,
            slots,
        } => {
            for field in selected_fields(register, fields)? {
                object.set_field(register, field, SlotMask::empty());
                object.set_field(register, field, slots);
            }
        }
        ProfileRule::Grant {
            register,
            fields,
            slots,
        } => {
            for field in selected_fields(register, fields)? {
                let current = object.field(register, field);
                object.set_field(register, field, current | slots);
            }
        }
        ProfileRule::Revoke {
            register,
            fields,
            slots,
        } => {
            for field in selected_fields(register, fields)? {
                let current = object.field(register, field);
                object.set_field(register, field, current - slots);
            }
        }
        ProfileRule::ClearBits { register, mask } => {
            if !register.layout().fields.is_empty() {
                return Err(UapError::InvalidProfileRule(format!(
                    "{register} holds permission fields; use a field rule"
                )));
            }
            let value = object.get(register).bits() & !mask;
            object.set(register, value.into());
        }
    }
    Ok(())
}

/// Reference provisioning policy for the R-config.
///
/// SH0 is the admin key, SH2 the user key, SH1 owns the low ECC key slots
/// and SH3 may additionally erase ECC keys. Monotonic counters and
/// MAC-and-destroy are left at factory reset.
pub fn reference_builder() -> ProfileBuilder {
    use ConfigObjectId as Reg;
    use FieldSelector::All;

    let admin = SlotMask::SH0;
    let admin_user = SlotMask::SH0 | SlotMask::SH2;
    let low_ecc = FieldSelector::range(0, 7);
    let high_ecc = FieldSelector::range(8, 31);

    ProfileBuilder::new(ConfigObjectKind::RConfig)
        .clear_bits(Reg::SleepMode, SLEEP_MODE_EN_MASK)
        // Pairing keys
        .restrict(Reg::PairingKeyWrite, All, admin)
        .restrict(Reg::PairingKeyRead, All, admin_user)
        .restrict(Reg::PairingKeyInvalidate, All, admin_user)
        // Config objects
        .restrict(Reg::RConfigWriteErase, All, admin_user)
        .restrict(Reg::RConfigRead, All, admin_user)
        .restrict(Reg::IConfigWrite, All, admin)
        .restrict(Reg::IConfigRead, All, admin_user)
        // Utility commands
        .restrict(Reg::Ping, All, SlotMask::all())
        .restrict(Reg::RMemDataWrite, FieldSelector::range(0, 127), admin)
        .restrict(Reg::RMemDataWrite, FieldSelector::range(128, 511), admin_user)
        .restrict(Reg::RMemDataRead, FieldSelector::range(0, 127), admin)
        .restrict(Reg::RMemDataRead, FieldSelector::range(128, 511), admin_user)
        .restrict(Reg::RMemDataErase, FieldSelector::range(0, 127), admin)
        .restrict(Reg::RMemDataErase, FieldSelector::range(128, 511), admin_user)
        .restrict(Reg::RandomValueGet, All, admin_user)
        // ECC keys
        .restrict(Reg::EccKeyGenerate, low_ecc, SlotMask::SH1)
        .restrict(Reg::EccKeyGenerate, high_ecc, SlotMask::SH1 | SlotMask::SH2)
        .restrict(Reg::EccKeyStore, All, SlotMask::empty())
        .restrict(Reg::EccKeyRead, All, SlotMask::SH1 | SlotMask::SH2 | SlotMask::SH3)
        .restrict(Reg::EccKeyErase, low_ecc, SlotMask::SH1 | SlotMask::SH3)
        .restrict(
            Reg::EccKeyErase,
            high_ecc,
            SlotMask::SH1 | SlotMask::SH2 | SlotMask::SH3,
        )
        .restrict(Reg::EcdsaSign, low_ecc, SlotMask::SH1)
        .restrict(Reg::EcdsaSign, high_ecc, SlotMask::SH1 | SlotMask::SH2)
        .restrict(Reg::EddsaSign, All, SlotMask::empty())
}

/// The reference R-config profile built from factory values.
pub fn reference_r_config() -> Result<ConfigProfile, UapError> {
    reference_builder().build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uap_common::layout::FACTORY_RESET_VALUE;

    #[test]
    fn restrict_ignores_previous_field_value() {
        let mut base = ConfigObject::factory_reset();
        base.set(ConfigObjectId::Ping, 0xFFFF_FFF0.into());
        let from_reset = ProfileBuilder::new(ConfigObjectKind::RConfig)
            .restrict(ConfigObjectId::Ping, FieldSelector::All, SlotMask::SH3)
            .build()
            .unwrap();
        let from_cleared = ProfileBuilder::from_base(ConfigObjectKind::RConfig, base)
            .restrict(ConfigObjectId::Ping, FieldSelector::All, SlotMask::SH3)
            .build()
            .unwrap();
        assert_eq!(from_reset, from_cleared);
        assert_eq!(from_reset.object().get(ConfigObjectId::Ping).bits(), 0xFFFF_FFF8);
    }

    #[test]
    fn grant_and_revoke_edit_single_slots() {
        let profile = ProfileBuilder::new(ConfigObjectKind::RConfig)
            .restrict(ConfigObjectId::EccKeyRead, FieldSelector::All, SlotMask::empty())
            .grant(ConfigObjectId::EccKeyRead, FieldSelector::range(8, 15), PairingKeySlot::SH3)
            .revoke(ConfigObjectId::Ping, FieldSelector::All, PairingKeySlot::SH1)
            .build()
            .unwrap();
        assert_eq!(profile.field(Operation::EccKeyRead(9)).unwrap(), SlotMask::SH3);
        assert_eq!(profile.field(Operation::EccKeyRead(0)).unwrap(), SlotMask::empty());
        assert!(!profile.permits(Operation::Ping, PairingKeySlot::SH1).unwrap());
        assert!(profile.permits(Operation::Ping, PairingKeySlot::SH0).unwrap());
    }

    #[test]
    fn misaligned_selector_is_rejected() {
        let err = ProfileBuilder::new(ConfigObjectKind::RConfig)
            .restrict(ConfigObjectId::EccKeyGenerate, FieldSelector::range(2, 5), SlotMask::SH1)
            .build()
            .unwrap_err();
        assert!(matches!(err, UapError::InvalidProfileRule(_)));
    }

    #[test]
    fn clear_bits_refuses_permission_registers() {
        let err = ProfileBuilder::new(ConfigObjectKind::RConfig)
            .clear_bits(ConfigObjectId::Ping, 0x1)
            .build()
            .unwrap_err();
        assert!(matches!(err, UapError::InvalidProfileRule(_)));
    }

    #[test]
    fn rule_overflow_is_reported() {
        let mut builder = ProfileBuilder::new(ConfigObjectKind::RConfig);
        for _ in 0..=MAX_PROFILE_RULES {
            builder = builder.grant(ConfigObjectId::Ping, FieldSelector::All, SlotMask::SH0);
        }
        assert!(matches!(builder.build(), Err(UapError::InvalidProfileRule(_))));
    }

    #[test]
    fn profile_cannot_lock_out_admin() {
        let builder = ProfileBuilder::new(ConfigObjectKind::IConfig).revoke(
            ConfigObjectId::PairingKeyWrite,
            FieldSelector::range(3, 3),
            SlotMask::SH0,
        );
        assert_eq!(
            builder.build(),
            Err(UapError::AdminLockout {
                kind: ConfigObjectKind::IConfig,
                requested: 0xFEFF_FFFF,
            })
        );
        let narrowed = ProfileBuilder::new(ConfigObjectKind::RConfig)
            .restrict(ConfigObjectId::PairingKeyWrite, FieldSelector::All, SlotMask::SH0)
            .build()
            .unwrap();
        assert!(narrowed
            .permits(Operation::PairingKeyWrite(3), PairingKeySlot::SH0)
            .unwrap());
    }

    #[test]
    fn reference_policy_literal_words() {
        let profile = reference_r_config().unwrap();
        let obj = profile.object();
        assert_eq!(profile.kind(), ConfigObjectKind::RConfig);
        assert_eq!(obj.get(ConfigObjectId::SleepMode).bits(), 0xFFFF_FFFE);
        assert_eq!(obj.get(ConfigObjectId::PairingKeyWrite).bits(), 0xF1F1_F1F1);
        assert_eq!(obj.get(ConfigObjectId::PairingKeyRead).bits(), 0xF5F5_F5F5);
        assert_eq!(obj.get(ConfigObjectId::RConfigWriteErase).bits(), 0xFFFF_FFF5);
        assert_eq!(obj.get(ConfigObjectId::IConfigWrite).bits(), 0xFFFF_F1F1);
        assert_eq!(obj.get(ConfigObjectId::EccKeyGenerate).bits(), 0xF6F6_F6F2);
        assert_eq!(obj.get(ConfigObjectId::EccKeyStore).bits(), 0xF0F0_F0F0);
        assert_eq!(obj.get(ConfigObjectId::EccKeyErase).bits(), 0xFEFE_FEFA);
        assert_eq!(obj.get(ConfigObjectId::RMemDataWrite).bits(), 0xF5F5_F5F1);
        for untouched in [
            ConfigObjectId::StartUp,
            ConfigObjectId::MCounterInit,
            ConfigObjectId::MCounterGet,
            ConfigObjectId::MCounterUpdate,
            ConfigObjectId::MacAndDestroy,
        ] {
            assert_eq!(obj.get(untouched).bits(), FACTORY_RESET_VALUE, "{untouched}");
        }
    }
}
