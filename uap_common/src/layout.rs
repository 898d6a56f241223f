//! Versioned register layout of the configuration objects.
//!
//! The table maps every privileged operation and resource range onto one
//! `(register, field)` pair. Client and chip must agree on `LAYOUT_VERSION`;
//! nothing here is derived at runtime.

use crate::bits::FieldLayout;
use crate::consts::{
    CONFIG_OBJ_COUNT, ECC_KEY_SLOT_COUNT, MAC_AND_DESTROY_SLOT_COUNT, MCOUNTER_COUNT,
    PAIRING_KEY_SLOT_COUNT, R_MEM_DATA_SLOT_COUNT,
};
use crate::error::UapError;
use core::fmt;
use serde::{Deserialize, Serialize};
use static_assertions::const_assert_eq;

/// Layout table revision.
pub const LAYOUT_VERSION: u16 = 1;

/// Factory-reset value of every register of both config objects.
pub const FACTORY_RESET_VALUE: u32 = 0xFFFF_FFFF;

/// `SLEEP_MODE_EN` bit of `CFG_SLEEP_MODE`.
pub const SLEEP_MODE_EN_MASK: u32 = 0x0000_0001;

// ─── Object kinds ───────────────────────────────────────────────────

/// Which of the two config objects a register belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ConfigObjectKind {
    /// Reversible config: rewritable and erasable.
    RConfig = 0,
    /// Irreversible config: bits can only be cleared, never erased.
    IConfig = 1,
}

impl ConfigObjectKind {
    /// Whether the object supports `erase`.
    #[inline]
    pub const fn is_erasable(self) -> bool {
        matches!(self, Self::RConfig)
    }
}

impl fmt::Display for ConfigObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RConfig => write!(f, "R-config"),
            Self::IConfig => write!(f, "I-config"),
        }
    }
}

/// Read/write permission group of a register.
///
/// `CFG_UAP_{R,I}_CONFIG_{READ,WRITE}` carry one field per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RegisterGroup {
    /// Start-up, sensor, debug, GPO and sleep settings.
    Config = 0,
    /// User access privilege (UAP) registers.
    Func = 1,
}

// ─── Registers ──────────────────────────────────────────────────────

/// Identity of one register inside a config object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum ConfigObjectId {
    StartUp = 0,
    Sensors = 1,
    Debug = 2,
    Gpo = 3,
    SleepMode = 4,
    PairingKeyWrite = 5,
    PairingKeyRead = 6,
    PairingKeyInvalidate = 7,
    RConfigWriteErase = 8,
    RConfigRead = 9,
    IConfigWrite = 10,
    IConfigRead = 11,
    Ping = 12,
    RMemDataWrite = 13,
    RMemDataRead = 14,
    RMemDataErase = 15,
    RandomValueGet = 16,
    EccKeyGenerate = 17,
    EccKeyStore = 18,
    EccKeyRead = 19,
    EccKeyErase = 20,
    EcdsaSign = 21,
    EddsaSign = 22,
    MCounterInit = 23,
    MCounterGet = 24,
    MCounterUpdate = 25,
    MacAndDestroy = 26,
}

impl ConfigObjectId {
    /// Every register in index order.
    pub const ALL: [Self; CONFIG_OBJ_COUNT] = [
        Self::StartUp,
        Self::Sensors,
        Self::Debug,
        Self::Gpo,
        Self::SleepMode,
        Self::PairingKeyWrite,
        Self::PairingKeyRead,
        Self::PairingKeyInvalidate,
        Self::RConfigWriteErase,
        Self::RConfigRead,
        Self::IConfigWrite,
        Self::IConfigRead,
        Self::Ping,
        Self::RMemDataWrite,
        Self::RMemDataRead,
        Self::RMemDataErase,
        Self::RandomValueGet,
        Self::EccKeyGenerate,
        Self::EccKeyStore,
        Self::EccKeyRead,
        Self::EccKeyErase,
        Self::EcdsaSign,
        Self::EddsaSign,
        Self::MCounterInit,
        Self::MCounterGet,
        Self::MCounterUpdate,
        Self::MacAndDestroy,
    ];

    /// Position of the register in the object.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Convert from a register index.
    #[inline]
    pub const fn from_index(index: usize) -> Option<Self> {
        if index < CONFIG_OBJ_COUNT {
            Some(Self::ALL[index])
        } else {
            None
        }
    }

    /// Look a register up by its byte address.
    pub fn from_addr(addr: u16) -> Option<Self> {
        LAYOUT.iter().find(|reg| reg.addr == addr).map(|reg| reg.id)
    }

    /// Static layout entry of this register.
    #[inline]
    pub fn layout(self) -> &'static RegisterLayout {
        &LAYOUT[self as usize]
    }

    /// Byte address of the register in the object.
    #[inline]
    pub fn addr(self) -> u16 {
        self.layout().addr
    }

    /// Canonical register name.
    #[inline]
    pub fn name(self) -> &'static str {
        self.layout().name
    }

    /// Permission group of the register.
    #[inline]
    pub fn group(self) -> RegisterGroup {
        self.layout().group
    }

    /// Factory-reset value of the register.
    #[inline]
    pub const fn factory_default(self) -> u32 {
        FACTORY_RESET_VALUE
    }
}

impl fmt::Display for ConfigObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One permission field and the resource range it governs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceField {
    /// Bit placement inside the register.
    pub field: FieldLayout,
    /// First resource index covered (inclusive).
    pub first: u16,
    /// Last resource index covered (inclusive).
    pub last: u16,
}

impl ResourceField {
    const fn new(offset: u8, first: u16, last: u16) -> Self {
        Self {
            field: FieldLayout::slots_at(offset),
            first,
            last,
        }
    }

    /// Whether `index` falls in this field's range.
    #[inline]
    pub const fn covers(&self, index: u16) -> bool {
        index >= self.first && index <= self.last
    }
}

/// Static description of one register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterLayout {
    pub id: ConfigObjectId,
    pub name: &'static str,
    pub addr: u16,
    pub group: RegisterGroup,
    /// Permission fields; empty for non-UAP registers.
    pub fields: &'static [ResourceField],
}

const NO_FIELDS: &[ResourceField] = &[];

const PER_PAIRING_KEY: &[ResourceField] = &[
    ResourceField::new(0, 0, 0),
    ResourceField::new(8, 1, 1),
    ResourceField::new(16, 2, 2),
    ResourceField::new(24, 3, 3),
];

const SINGLE: &[ResourceField] = &[ResourceField::new(0, 0, 0)];

/// Lane 0 governs `RegisterGroup::Config`, lane 1 `RegisterGroup::Func`.
const PER_GROUP: &[ResourceField] = &[ResourceField::new(0, 0, 0), ResourceField::new(8, 1, 1)];

const R_MEM_DATA_RANGES: &[ResourceField] = &[
    ResourceField::new(0, 0, 127),
    ResourceField::new(8, 128, 255),
    ResourceField::new(16, 256, 383),
    ResourceField::new(24, 384, 511),
];

const ECC_KEY_RANGES: &[ResourceField] = &[
    ResourceField::new(0, 0, 7),
    ResourceField::new(8, 8, 15),
    ResourceField::new(16, 16, 23),
    ResourceField::new(24, 24, 31),
];

const MCOUNTER_RANGES: &[ResourceField] = &[
    ResourceField::new(0, 0, 3),
    ResourceField::new(8, 4, 7),
    ResourceField::new(16, 8, 11),
    ResourceField::new(24, 12, 15),
];

const MAC_AND_DESTROY_RANGES: &[ResourceField] = &[
    ResourceField::new(0, 0, 31),
    ResourceField::new(8, 32, 63),
    ResourceField::new(16, 64, 95),
    ResourceField::new(24, 96, 127),
];

macro_rules! reg {
    ($id:ident, $name:literal, $addr:literal, $group:ident, $fields:expr) => {
        RegisterLayout {
            id: ConfigObjectId::$id,
            name: $name,
            addr: $addr,
            group: RegisterGroup::$group,
            fields: $fields,
        }
    };
}

/// Register layout, version `LAYOUT_VERSION`, indexed by `ConfigObjectId`.
pub static LAYOUT: [RegisterLayout; CONFIG_OBJ_COUNT] = [
    reg!(StartUp, "CFG_START_UP", 0x000, Config, NO_FIELDS),
    reg!(Sensors, "CFG_SENSORS", 0x008, Config, NO_FIELDS),
    reg!(Debug, "CFG_DEBUG", 0x010, Config, NO_FIELDS),
    reg!(Gpo, "CFG_GPO", 0x014, Config, NO_FIELDS),
    reg!(SleepMode, "CFG_SLEEP_MODE", 0x018, Config, NO_FIELDS),
    reg!(PairingKeyWrite, "CFG_UAP_PAIRING_KEY_WRITE", 0x020, Func, PER_PAIRING_KEY),
    reg!(PairingKeyRead, "CFG_UAP_PAIRING_KEY_READ", 0x024, Func, PER_PAIRING_KEY),
    reg!(PairingKeyInvalidate, "CFG_UAP_PAIRING_KEY_INVALIDATE", 0x028, Func, PER_PAIRING_KEY),
    reg!(RConfigWriteErase, "CFG_UAP_R_CONFIG_WRITE_ERASE", 0x030, Func, SINGLE),
    reg!(RConfigRead, "CFG_UAP_R_CONFIG_READ", 0x034, Func, PER_GROUP),
    reg!(IConfigWrite, "CFG_UAP_I_CONFIG_WRITE", 0x040, Func, PER_GROUP),
    reg!(IConfigRead, "CFG_UAP_I_CONFIG_READ", 0x044, Func, PER_GROUP),
    reg!(Ping, "CFG_UAP_PING", 0x100, Func, SINGLE),
    reg!(RMemDataWrite, "CFG_UAP_R_MEM_DATA_WRITE", 0x110, Func, R_MEM_DATA_RANGES),
    reg!(RMemDataRead, "CFG_UAP_R_MEM_DATA_READ", 0x114, Func, R_MEM_DATA_RANGES),
    reg!(RMemDataErase, "CFG_UAP_R_MEM_DATA_ERASE", 0x118, Func, R_MEM_DATA_RANGES),
    reg!(RandomValueGet, "CFG_UAP_RANDOM_VALUE_GET", 0x120, Func, SINGLE),
    reg!(EccKeyGenerate, "CFG_UAP_ECC_KEY_GENERATE", 0x130, Func, ECC_KEY_RANGES),
    reg!(EccKeyStore, "CFG_UAP_ECC_KEY_STORE", 0x134, Func, ECC_KEY_RANGES),
    reg!(EccKeyRead, "CFG_UAP_ECC_KEY_READ", 0x138, Func, ECC_KEY_RANGES),
    reg!(EccKeyErase, "CFG_UAP_ECC_KEY_ERASE", 0x13C, Func, ECC_KEY_RANGES),
    reg!(EcdsaSign, "CFG_UAP_ECDSA_SIGN", 0x140, Func, ECC_KEY_RANGES),
    reg!(EddsaSign, "CFG_UAP_EDDSA_SIGN", 0x144, Func, ECC_KEY_RANGES),
    reg!(MCounterInit, "CFG_UAP_MCOUNTER_INIT", 0x150, Func, MCOUNTER_RANGES),
    reg!(MCounterGet, "CFG_UAP_MCOUNTER_GET", 0x154, Func, MCOUNTER_RANGES),
    reg!(MCounterUpdate, "CFG_UAP_MCOUNTER_UPDATE", 0x158, Func, MCOUNTER_RANGES),
    reg!(MacAndDestroy, "CFG_UAP_MAC_AND_DESTROY", 0x160, Func, MAC_AND_DESTROY_RANGES),
];

const_assert_eq!(PAIRING_KEY_SLOT_COUNT, 4);
const_assert_eq!(ConfigObjectId::MacAndDestroy as usize + 1, CONFIG_OBJ_COUNT);

// ─── Operations ─────────────────────────────────────────────────────

/// A privileged command together with the resource it targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    PairingKeyWrite(u8),
    PairingKeyRead(u8),
    PairingKeyInvalidate(u8),
    /// Write or erase any R-config register.
    RConfigWriteErase,
    RConfigRead(ConfigObjectId),
    IConfigWrite(ConfigObjectId),
    IConfigRead(ConfigObjectId),
    Ping,
    RMemDataWrite(u16),
    RMemDataRead(u16),
    RMemDataErase(u16),
    RandomValueGet,
    EccKeyGenerate(u8),
    EccKeyStore(u8),
    EccKeyRead(u8),
    EccKeyErase(u8),
    EcdsaSign(u8),
    EddsaSign(u8),
    MCounterInit(u8),
    MCounterGet(u8),
    MCounterUpdate(u8),
    MacAndDestroy(u8),
}

/// Where an operation's permission bits live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldLocation {
    pub register: ConfigObjectId,
    pub field: FieldLayout,
}

impl Operation {
    /// UAP register governing this operation.
    pub fn register(self) -> ConfigObjectId {
        match self {
            Self::PairingKeyWrite(_) => ConfigObjectId::PairingKeyWrite,
            Self::PairingKeyRead(_) => ConfigObjectId::PairingKeyRead,
            Self::PairingKeyInvalidate(_) => ConfigObjectId::PairingKeyInvalidate,
            Self::RConfigWriteErase => ConfigObjectId::RConfigWriteErase,
            Self::RConfigRead(_) => ConfigObjectId::RConfigRead,
            Self::IConfigWrite(_) => ConfigObjectId::IConfigWrite,
            Self::IConfigRead(_) => ConfigObjectId::IConfigRead,
            Self::Ping => ConfigObjectId::Ping,
            Self::RMemDataWrite(_) => ConfigObjectId::RMemDataWrite,
            Self::RMemDataRead(_) => ConfigObjectId::RMemDataRead,
            Self::RMemDataErase(_) => ConfigObjectId::RMemDataErase,
            Self::RandomValueGet => ConfigObjectId::RandomValueGet,
            Self::EccKeyGenerate(_) => ConfigObjectId::EccKeyGenerate,
            Self::EccKeyStore(_) => ConfigObjectId::EccKeyStore,
            Self::EccKeyRead(_) => ConfigObjectId::EccKeyRead,
            Self::EccKeyErase(_) => ConfigObjectId::EccKeyErase,
            Self::EcdsaSign(_) => ConfigObjectId::EcdsaSign,
            Self::EddsaSign(_) => ConfigObjectId::EddsaSign,
            Self::MCounterInit(_) => ConfigObjectId::MCounterInit,
            Self::MCounterGet(_) => ConfigObjectId::MCounterGet,
            Self::MCounterUpdate(_) => ConfigObjectId::MCounterUpdate,
            Self::MacAndDestroy(_) => ConfigObjectId::MacAndDestroy,
        }
    }

    /// Resource index within the register's ranges, and the number of
    /// resources the operation may address.
    fn resource(self) -> (u16, usize) {
        match self {
            Self::PairingKeyWrite(s) | Self::PairingKeyRead(s) | Self::PairingKeyInvalidate(s) => {
                (s as u16, PAIRING_KEY_SLOT_COUNT)
            }
            Self::RConfigWriteErase | Self::Ping | Self::RandomValueGet => (0, 1),
            Self::RConfigRead(reg) | Self::IConfigWrite(reg) | Self::IConfigRead(reg) => {
                (reg.group() as u16, 2)
            }
            Self::RMemDataWrite(s) | Self::RMemDataRead(s) | Self::RMemDataErase(s) => {
                (s, R_MEM_DATA_SLOT_COUNT)
            }
            Self::EccKeyGenerate(s)
            | Self::EccKeyStore(s)
            | Self::EccKeyRead(s)
            | Self::EccKeyErase(s)
            | Self::EcdsaSign(s)
            | Self::EddsaSign(s) => (s as u16, ECC_KEY_SLOT_COUNT),
            Self::MCounterInit(c) | Self::MCounterGet(c) | Self::MCounterUpdate(c) => {
                (c as u16, MCOUNTER_COUNT)
            }
            Self::MacAndDestroy(s) => (s as u16, MAC_AND_DESTROY_SLOT_COUNT),
        }
    }

    /// Resolve the `(register, field)` pair holding this operation's permission.
    ///
    /// # Errors
    /// Returns `UapError::InvalidResource` when the resource index is outside
    /// every range of the register.
    pub fn locate(self) -> Result<FieldLocation, UapError> {
        let register = self.register();
        let (index, count) = self.resource();
        let invalid = || UapError::InvalidResource {
            operation: self,
            index,
        };
        if usize::from(index) >= count {
            return Err(invalid());
        }
        register
            .layout()
            .fields
            .iter()
            .find(|rf| rf.covers(index))
            .map(|rf| FieldLocation {
                register,
                field: rf.field,
            })
            .ok_or_else(invalid)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RConfigWriteErase => write!(f, "R_CONFIG_WRITE_ERASE"),
            Self::Ping => write!(f, "PING"),
            Self::RandomValueGet => write!(f, "RANDOM_VALUE_GET"),
            Self::RConfigRead(reg) | Self::IConfigWrite(reg) | Self::IConfigRead(reg) => {
                write!(f, "{}[{reg}]", uap_suffix(self.register()))
            }
            other => write!(f, "{}[{}]", uap_suffix(other.register()), other.resource().0),
        }
    }
}

fn uap_suffix(register: ConfigObjectId) -> &'static str {
    register
        .name()
        .strip_prefix("CFG_UAP_")
        .unwrap_or(register.name())
}
