//! Simulated chip implementation.
//!
//! The `SimulatedChip` implements `ChipTransport` without any hardware. It
//! applies the same rules as the secure element: a session needs an X25519
//! proof for a written pairing-key slot, every privileged command is checked
//! against the effective permission of the active slot, I-config bits only
//! ever go 1→0 and the I-config cannot be erased.

use super::state::{PairingKeyState, PersistedChipState, StatePersistence};
use std::path::Path;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};
use uap_common::access::{keeps_admin_key_write, permits};
use uap_common::consts::{PAIRING_KEY_LEN, PAIRING_KEY_SLOT_COUNT, PING_MAX_LEN};
use uap_common::error::TransportError;
use uap_common::layout::{ConfigObjectId, ConfigObjectKind, Operation};
use uap_common::object::ConfigObject;
use uap_common::slot::PairingKeySlot;
use uap_common::transport::{
    ChipTransport, PairingCredentials, PairingPublicKey, SessionContext,
};
use x25519_dalek::{PublicKey, StaticSecret};

/// Private half of the pairing key a factory-fresh chip holds in SH0.
pub const FACTORY_SH0_PRIVATE: [u8; PAIRING_KEY_LEN] = [
    0xd0, 0x99, 0x92, 0xb1, 0xf1, 0x7a, 0xbc, 0x4d, 0xb9, 0x37, 0x17, 0x68, 0xa2, 0x7d, 0xa0,
    0x5b, 0x18, 0xfa, 0xb8, 0x56, 0x13, 0xa7, 0x84, 0x2c, 0xa6, 0x4c, 0x79, 0x10, 0xf2, 0x2e,
    0x71, 0x6b,
];

/// X25519 public key of `private_key`.
pub fn derive_public(private_key: &[u8; PAIRING_KEY_LEN]) -> PairingPublicKey {
    let secret = StaticSecret::from(*private_key);
    PublicKey::from(&secret).to_bytes()
}

/// Credentials matching the factory SH0 key.
pub fn factory_credentials() -> PairingCredentials {
    PairingCredentials::new(FACTORY_SH0_PRIVATE, derive_public(&FACTORY_SH0_PRIVATE))
}

/// In-process secure element.
pub struct SimulatedChip {
    name: &'static str,
    version: &'static str,
    initialized: bool,
    r_config: ConfigObject,
    i_config: ConfigObject,
    pairing_keys: [PairingKeyState; PAIRING_KEY_SLOT_COUNT],
    session: Option<PairingKeySlot>,
    /// Whether the chip's certificate chain verifies.
    identity_valid: bool,
    /// Every request fails with a communication error while set.
    offline: bool,
    /// Sessions and privileged commands are refused while set.
    locked: bool,
    state_persistence: Option<StatePersistence>,
}

impl SimulatedChip {
    /// Chip in factory state: both objects reset, SH0 holding the factory key.
    pub fn new() -> Self {
        let mut pairing_keys = [PairingKeyState::Blank; PAIRING_KEY_SLOT_COUNT];
        pairing_keys[PairingKeySlot::ADMIN.index()] =
            PairingKeyState::Written(derive_public(&FACTORY_SH0_PRIVATE));
        Self {
            name: "simulation",
            version: env!("CARGO_PKG_VERSION"),
            initialized: false,
            r_config: ConfigObject::factory_reset(),
            i_config: ConfigObject::factory_reset(),
            pairing_keys,
            session: None,
            identity_valid: true,
            offline: false,
            locked: false,
            state_persistence: None,
        }
    }

    /// Persist chip state to `path`: loaded on `init`, saved on `deinit`.
    pub fn with_state_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.state_persistence = Some(StatePersistence::new(path));
        self
    }

    /// Make the chip present an identity that fails verification.
    pub fn set_identity_valid(&mut self, valid: bool) {
        self.identity_valid = valid;
    }

    /// Simulate a dead bus.
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    /// Simulate a tamper lockdown: the chip answers but refuses everything
    /// that needs a permission.
    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn r_config(&self) -> &ConfigObject {
        &self.r_config
    }

    pub fn i_config(&self) -> &ConfigObject {
        &self.i_config
    }

    pub fn pairing_key_state(&self, slot: PairingKeySlot) -> PairingKeyState {
        self.pairing_keys[slot.index()]
    }

    /// Slot of the session the chip currently holds.
    pub fn session_slot(&self) -> Option<PairingKeySlot> {
        self.session
    }

    fn object(&self, kind: ConfigObjectKind) -> &ConfigObject {
        match kind {
            ConfigObjectKind::RConfig => &self.r_config,
            ConfigObjectKind::IConfig => &self.i_config,
        }
    }

    fn persisted_state(&self) -> PersistedChipState {
        PersistedChipState {
            version: PersistedChipState::CURRENT_VERSION,
            r_config: self.r_config,
            i_config: self.i_config,
            pairing_keys: self.pairing_keys,
            saved_at: 0,
        }
    }

    fn link(&self) -> Result<(), TransportError> {
        if self.offline {
            return Err(TransportError::Communication("chip not responding".to_string()));
        }
        if !self.initialized {
            return Err(TransportError::Communication(
                "transport not initialized".to_string(),
            ));
        }
        Ok(())
    }

    fn session_slot_or_err(&self) -> Result<PairingKeySlot, TransportError> {
        self.link()?;
        self.session.ok_or(TransportError::NoSession)
    }

    /// Chip-side permission check for the active session.
    fn check(&self, operation: Operation) -> Result<PairingKeySlot, TransportError> {
        let slot = self.session_slot_or_err()?;
        let location = operation
            .locate()
            .map_err(|e| TransportError::Rejected(e.to_string()))?;
        let register = location.register;
        if !self.locked
            && permits(
            self.r_config.get(register),
            self.i_config.get(register),
            location,
            slot,
        ) {
            Ok(slot)
        } else {
            debug!("Chip refused {operation} for {slot}");
            Err(TransportError::Unauthorized)
        }
    }

    fn verify_proof(
        &self,
        credentials: &PairingCredentials,
        slot: PairingKeySlot,
    ) -> Result<(), TransportError> {
        let stored = match self.pairing_keys[slot.index()] {
            PairingKeyState::Written(key) => key,
            PairingKeyState::Blank => {
                return Err(TransportError::HandshakeFailed(format!("{slot} is blank")));
            }
            PairingKeyState::Invalidated => {
                return Err(TransportError::HandshakeFailed(format!(
                    "{slot} is invalidated"
                )));
            }
        };
        let proven = derive_public(credentials.private_key());
        let matches: bool = proven[..].ct_eq(&stored[..]).into();
        if matches {
            Ok(())
        } else {
            Err(TransportError::HandshakeFailed(format!(
                "pairing key proof rejected for {slot}"
            )))
        }
    }
}

impl Default for SimulatedChip {
    fn default() -> Self {
        Self::new()
    }
}

impl ChipTransport for SimulatedChip {
    fn name(&self) -> &'static str {
        self.name
    }

    fn version(&self) -> &'static str {
        self.version
    }

    fn init(&mut self) -> Result<(), TransportError> {
        if self.offline {
            return Err(TransportError::Communication("chip not responding".to_string()));
        }
        if let Some(persistence) = &self.state_persistence {
            match persistence.load() {
                Ok(Some(state)) => {
                    self.r_config = state.r_config;
                    self.i_config = state.i_config;
                    self.pairing_keys = state.pairing_keys;
                }
                Ok(None) => {}
                Err(e) => warn!("Failed to load chip state: {}", e),
            }
        }
        self.session = None;
        self.initialized = true;
        info!("Simulated chip up");
        Ok(())
    }

    fn deinit(&mut self) -> Result<(), TransportError> {
        self.session = None;
        if !self.initialized {
            return Ok(());
        }
        self.initialized = false;
        if let Some(persistence) = &self.state_persistence {
            persistence.save(&self.persisted_state())?;
        }
        info!("Simulated chip down");
        Ok(())
    }

    fn establish_session(
        &mut self,
        credentials: &PairingCredentials,
        slot: PairingKeySlot,
    ) -> Result<SessionContext, TransportError> {
        self.link()?;
        self.session = None;
        if self.locked {
            return Err(TransportError::Unauthorized);
        }
        if !self.identity_valid {
            return Err(TransportError::HandshakeFailed(
                "chip certificate chain did not verify".to_string(),
            ));
        }
        self.verify_proof(credentials, slot)?;
        self.session = Some(slot);
        debug!("Chip accepted session for {slot}");
        Ok(SessionContext::new(slot))
    }

    fn abort_session(&mut self) -> Result<(), TransportError> {
        self.session = None;
        self.link()
    }

    fn read_register(
        &mut self,
        kind: ConfigObjectKind,
        id: ConfigObjectId,
    ) -> Result<u32, TransportError> {
        self.session_slot_or_err()?;
        Ok(self.object(kind).get(id).bits())
    }

    fn write_register(
        &mut self,
        kind: ConfigObjectKind,
        id: ConfigObjectId,
        value: u32,
    ) -> Result<(), TransportError> {
        match kind {
            ConfigObjectKind::RConfig => {
                self.check(Operation::RConfigWriteErase)?;
            }
            ConfigObjectKind::IConfig => {
                self.check(Operation::IConfigWrite(id))?;
                let current = self.i_config.get(id);
                if current.raised_bits(value.into()) != 0 {
                    return Err(TransportError::Rejected(format!(
                        "I-config {id} bits cannot be set back to 1"
                    )));
                }
            }
        }
        if id == ConfigObjectId::PairingKeyWrite && !keeps_admin_key_write(value.into()) {
            warn!("Chip refused {kind} {id} = 0x{value:08X}: SH0 lockout");
            return Err(TransportError::Rejected(format!(
                "{kind} {id} must keep SH0 write access"
            )));
        }
        match kind {
            ConfigObjectKind::RConfig => self.r_config.set(id, value.into()),
            ConfigObjectKind::IConfig => self.i_config.set(id, value.into()),
        }
        Ok(())
    }

    fn erase_object(&mut self, kind: ConfigObjectKind) -> Result<(), TransportError> {
        if !kind.is_erasable() {
            self.link()?;
            return Err(TransportError::Rejected(format!("{kind} cannot be erased")));
        }
        self.check(Operation::RConfigWriteErase)?;
        self.r_config = ConfigObject::factory_reset();
        Ok(())
    }

    fn pairing_key_write(
        &mut self,
        slot: PairingKeySlot,
        key: &PairingPublicKey,
    ) -> Result<(), TransportError> {
        self.check(Operation::PairingKeyWrite(slot.into()))?;
        let entry = &mut self.pairing_keys[slot.index()];
        if !entry.is_blank() {
            return Err(TransportError::Rejected(format!("{slot} is not blank")));
        }
        *entry = PairingKeyState::Written(*key);
        Ok(())
    }

    fn pairing_key_read(
        &mut self,
        slot: PairingKeySlot,
    ) -> Result<PairingPublicKey, TransportError> {
        self.check(Operation::PairingKeyRead(slot.into()))?;
        match self.pairing_keys[slot.index()] {
            PairingKeyState::Written(key) => Ok(key),
            PairingKeyState::Blank => Err(TransportError::Rejected(format!("{slot} is blank"))),
            PairingKeyState::Invalidated => {
                Err(TransportError::Rejected(format!("{slot} is invalidated")))
            }
        }
    }

    fn pairing_key_invalidate(&mut self, slot: PairingKeySlot) -> Result<(), TransportError> {
        self.check(Operation::PairingKeyInvalidate(slot.into()))?;
        self.pairing_keys[slot.index()] = PairingKeyState::Invalidated;
        Ok(())
    }

    fn ping(&mut self, message: &[u8]) -> Result<Vec<u8>, TransportError> {
        self.check(Operation::Ping)?;
        if message.len() > PING_MAX_LEN {
            return Err(TransportError::Rejected(format!(
                "ping payload of {} bytes exceeds {PING_MAX_LEN}",
                message.len()
            )));
        }
        Ok(message.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uap_common::layout::FACTORY_RESET_VALUE;

    fn admin_session() -> SimulatedChip {
        let mut chip = SimulatedChip::new();
        chip.init().unwrap();
        chip.establish_session(&factory_credentials(), PairingKeySlot::SH0)
            .unwrap();
        chip
    }

    #[test]
    fn factory_key_opens_sh0_only() {
        let mut chip = SimulatedChip::new();
        chip.init().unwrap();
        let creds = factory_credentials();
        assert!(matches!(
            chip.establish_session(&creds, PairingKeySlot::SH1),
            Err(TransportError::HandshakeFailed(_))
        ));
        let ctx = chip.establish_session(&creds, PairingKeySlot::SH0).unwrap();
        assert_eq!(ctx.slot, PairingKeySlot::SH0);
    }

    #[test]
    fn wrong_private_key_is_rejected() {
        let mut chip = SimulatedChip::new();
        chip.init().unwrap();
        let creds = PairingCredentials::new([0x42; 32], derive_public(&FACTORY_SH0_PRIVATE));
        assert!(matches!(
            chip.establish_session(&creds, PairingKeySlot::SH0),
            Err(TransportError::HandshakeFailed(_))
        ));
        assert_eq!(chip.session_slot(), None);
    }

    #[test]
    fn bad_identity_fails_handshake() {
        let mut chip = SimulatedChip::new();
        chip.init().unwrap();
        chip.set_identity_valid(false);
        assert!(matches!(
            chip.establish_session(&factory_credentials(), PairingKeySlot::SH0),
            Err(TransportError::HandshakeFailed(_))
        ));
    }

    #[test]
    fn commands_need_a_session() {
        let mut chip = SimulatedChip::new();
        chip.init().unwrap();
        assert_eq!(chip.ping(b"hi"), Err(TransportError::NoSession));
        assert_eq!(
            chip.read_register(ConfigObjectKind::RConfig, ConfigObjectId::Ping),
            Err(TransportError::NoSession)
        );
    }

    #[test]
    fn i_config_only_clears_bits() {
        let mut chip = admin_session();
        chip.write_register(ConfigObjectKind::IConfig, ConfigObjectId::Gpo, 0xFFFF_00FF)
            .unwrap();
        assert!(matches!(
            chip.write_register(ConfigObjectKind::IConfig, ConfigObjectId::Gpo, 0xFFFF_01FF),
            Err(TransportError::Rejected(_))
        ));
        assert_eq!(chip.i_config().get(ConfigObjectId::Gpo).bits(), 0xFFFF_00FF);
        assert!(matches!(
            chip.erase_object(ConfigObjectKind::IConfig),
            Err(TransportError::Rejected(_))
        ));
    }

    #[test]
    fn pairing_key_lifecycle() {
        let mut chip = admin_session();
        let key = derive_public(&[0x11; 32]);
        assert!(chip.pairing_key_read(PairingKeySlot::SH2).is_err());
        chip.pairing_key_write(PairingKeySlot::SH2, &key).unwrap();
        assert_eq!(chip.pairing_key_read(PairingKeySlot::SH2).unwrap(), key);
        assert!(chip.pairing_key_write(PairingKeySlot::SH2, &key).is_err());
        chip.pairing_key_invalidate(PairingKeySlot::SH2).unwrap();
        assert_eq!(
            chip.pairing_key_state(PairingKeySlot::SH2),
            PairingKeyState::Invalidated
        );
        let creds = PairingCredentials::new([0x11; 32], key);
        assert!(chip.establish_session(&creds, PairingKeySlot::SH2).is_err());
    }

    #[test]
    fn chip_enforces_r_config_permissions() {
        let mut chip = admin_session();
        // Ping restricted to SH1.
        chip.write_register(ConfigObjectKind::RConfig, ConfigObjectId::Ping, 0xFFFF_FFF2)
            .unwrap();
        assert_eq!(chip.ping(b"x"), Err(TransportError::Unauthorized));
        chip.erase_object(ConfigObjectKind::RConfig).unwrap();
        assert_eq!(
            chip.r_config().get(ConfigObjectId::Ping).bits(),
            FACTORY_RESET_VALUE
        );
        assert_eq!(chip.ping(b"x").unwrap(), b"x".to_vec());
    }

    #[test]
    fn admin_keeps_pairing_key_write() {
        let mut chip = admin_session();
        assert!(matches!(
            chip.write_register(
                ConfigObjectKind::RConfig,
                ConfigObjectId::PairingKeyWrite,
                0xF0F0_F0F0
            ),
            Err(TransportError::Rejected(_))
        ));
        assert!(matches!(
            chip.write_register(
                ConfigObjectKind::IConfig,
                ConfigObjectId::PairingKeyWrite,
                0xFFFF_FFFE
            ),
            Err(TransportError::Rejected(_))
        ));
        assert_eq!(
            chip.r_config().get(ConfigObjectId::PairingKeyWrite).bits(),
            FACTORY_RESET_VALUE
        );
        assert_eq!(
            chip.i_config().get(ConfigObjectId::PairingKeyWrite).bits(),
            FACTORY_RESET_VALUE
        );
        // Narrowing to SH0 alone is fine.
        chip.write_register(
            ConfigObjectKind::IConfig,
            ConfigObjectId::PairingKeyWrite,
            0xF1F1_F1F1,
        )
        .unwrap();
        chip.pairing_key_write(PairingKeySlot::SH1, &derive_public(&[0x21; 32]))
            .unwrap();
    }

    #[test]
    fn locked_chip_refuses_sessions_and_commands() {
        let mut chip = admin_session();
        chip.set_locked(true);
        assert_eq!(chip.ping(b"x"), Err(TransportError::Unauthorized));
        assert_eq!(
            chip.establish_session(&factory_credentials(), PairingKeySlot::SH0),
            Err(TransportError::Unauthorized)
        );
        chip.set_locked(false);
        chip.establish_session(&factory_credentials(), PairingKeySlot::SH0)
            .unwrap();
        assert_eq!(chip.ping(b"x").unwrap(), b"x".to_vec());
    }

    #[test]
    fn oversized_ping_is_rejected() {
        let mut chip = admin_session();
        let payload = vec![0u8; PING_MAX_LEN + 1];
        assert!(matches!(chip.ping(&payload), Err(TransportError::Rejected(_))));
    }

    #[test]
    fn offline_chip_reports_communication_error() {
        let mut chip = admin_session();
        chip.set_offline(true);
        assert!(matches!(chip.ping(b"x"), Err(TransportError::Communication(_))));
    }

    #[test]
    fn state_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chip.bin");
        let key = derive_public(&[0x22; 32]);

        let mut chip = SimulatedChip::new().with_state_file(&path);
        chip.init().unwrap();
        chip.establish_session(&factory_credentials(), PairingKeySlot::SH0)
            .unwrap();
        chip.pairing_key_write(PairingKeySlot::SH1, &key).unwrap();
        chip.deinit().unwrap();

        let mut again = SimulatedChip::new().with_state_file(&path);
        again.init().unwrap();
        assert_eq!(
            again.pairing_key_state(PairingKeySlot::SH1),
            PairingKeyState::Written(key)
        );
    }
}
