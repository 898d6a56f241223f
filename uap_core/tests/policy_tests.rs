//! Reference policy tests.
//!
//! Every operation and resource index is checked for every slot, once
//! against the built profile and once through live sessions on a chip the
//! profile was written to.

use uap_common::consts::{
    ECC_KEY_SLOT_COUNT, MAC_AND_DESTROY_SLOT_COUNT, MCOUNTER_COUNT, PAIRING_KEY_SLOT_COUNT,
    R_MEM_DATA_SLOT_COUNT,
};
use uap_common::error::UapError;
use uap_common::layout::{ConfigObjectId, Operation};
use uap_common::slot::{PairingKeySlot, SlotMask};
use uap_common::transport::PairingCredentials;
use uap_core::drivers::simulation::{SimulatedChip, derive_public, factory_credentials};
use uap_core::{ChipHandle, reference_r_config};

/// Slots the reference policy grants each operation.
fn expected(op: Operation) -> SlotMask {
    use Operation::*;
    let admin = SlotMask::SH0;
    let admin_user = SlotMask::SH0 | SlotMask::SH2;
    match op {
        PairingKeyWrite(_) => admin,
        PairingKeyRead(_) | PairingKeyInvalidate(_) => admin_user,
        RConfigWriteErase | RConfigRead(_) | IConfigRead(_) => admin_user,
        IConfigWrite(_) => admin,
        Ping => SlotMask::all(),
        RMemDataWrite(i) | RMemDataRead(i) | RMemDataErase(i) => {
            if i < 128 {
                admin
            } else {
                admin_user
            }
        }
        RandomValueGet => admin_user,
        EccKeyGenerate(i) | EcdsaSign(i) => {
            if i < 8 {
                SlotMask::SH1
            } else {
                SlotMask::SH1 | SlotMask::SH2
            }
        }
        EccKeyStore(_) | EddsaSign(_) => SlotMask::empty(),
        EccKeyRead(_) => SlotMask::SH1 | SlotMask::SH2 | SlotMask::SH3,
        EccKeyErase(i) => {
            if i < 8 {
                SlotMask::SH1 | SlotMask::SH3
            } else {
                SlotMask::SH1 | SlotMask::SH2 | SlotMask::SH3
            }
        }
        // Left at factory reset.
        MCounterInit(_) | MCounterGet(_) | MCounterUpdate(_) | MacAndDestroy(_) => {
            SlotMask::all()
        }
    }
}

fn all_operations() -> Vec<Operation> {
    let mut ops = vec![
        Operation::RConfigWriteErase,
        Operation::Ping,
        Operation::RandomValueGet,
    ];
    for s in 0..PAIRING_KEY_SLOT_COUNT as u8 {
        ops.extend([
            Operation::PairingKeyWrite(s),
            Operation::PairingKeyRead(s),
            Operation::PairingKeyInvalidate(s),
        ]);
    }
    for id in ConfigObjectId::ALL {
        ops.extend([
            Operation::RConfigRead(id),
            Operation::IConfigWrite(id),
            Operation::IConfigRead(id),
        ]);
    }
    for s in 0..R_MEM_DATA_SLOT_COUNT as u16 {
        ops.extend([
            Operation::RMemDataWrite(s),
            Operation::RMemDataRead(s),
            Operation::RMemDataErase(s),
        ]);
    }
    for s in 0..ECC_KEY_SLOT_COUNT as u8 {
        ops.extend([
            Operation::EccKeyGenerate(s),
            Operation::EccKeyStore(s),
            Operation::EccKeyRead(s),
            Operation::EccKeyErase(s),
            Operation::EcdsaSign(s),
            Operation::EddsaSign(s),
        ]);
    }
    for c in 0..MCOUNTER_COUNT as u8 {
        ops.extend([
            Operation::MCounterInit(c),
            Operation::MCounterGet(c),
            Operation::MCounterUpdate(c),
        ]);
    }
    for s in 0..MAC_AND_DESTROY_SLOT_COUNT as u8 {
        ops.push(Operation::MacAndDestroy(s));
    }
    ops
}

fn seed(slot: PairingKeySlot) -> u8 {
    0x30 + u8::from(slot)
}

#[test]
fn test_profile_matches_policy_table() {
    let profile = reference_r_config().unwrap();
    for op in all_operations() {
        assert_eq!(profile.field(op).unwrap(), expected(op), "{op}");
    }
}

#[test]
fn test_live_sessions_follow_policy_table() {
    let mut handle = ChipHandle::new(SimulatedChip::new());
    handle.init().unwrap();
    handle
        .start_session(&factory_credentials(), PairingKeySlot::SH0)
        .unwrap();
    for slot in [PairingKeySlot::SH1, PairingKeySlot::SH2, PairingKeySlot::SH3] {
        handle
            .pairing_key_write(slot, &derive_public(&[seed(slot); 32]))
            .unwrap();
    }
    handle
        .config()
        .apply_profile(&reference_r_config().unwrap())
        .unwrap();

    let ops = all_operations();
    for slot in PairingKeySlot::ALL {
        handle.abort_session();
        let creds = if slot == PairingKeySlot::SH0 {
            factory_credentials()
        } else {
            let private = [seed(slot); 32];
            PairingCredentials::new(private, derive_public(&private))
        };
        handle.start_session(&creds, slot).unwrap();
        for &op in &ops {
            assert_eq!(
                handle.authorize(op).unwrap(),
                expected(op).permits(slot),
                "{op} for {slot}"
            );
        }
    }
}

#[test]
fn test_out_of_range_resource_is_rejected() {
    let mut handle = ChipHandle::new(SimulatedChip::new());
    handle.init().unwrap();
    handle
        .start_session(&factory_credentials(), PairingKeySlot::SH0)
        .unwrap();
    assert!(matches!(
        handle.authorize(Operation::EccKeyGenerate(ECC_KEY_SLOT_COUNT as u8)),
        Err(UapError::InvalidResource { .. })
    ));
    assert!(matches!(
        handle.authorize(Operation::RMemDataRead(R_MEM_DATA_SLOT_COUNT as u16)),
        Err(UapError::InvalidResource { .. })
    ));
}
