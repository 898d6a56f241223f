//! Transport collaborator trait and session credentials.
//!
//! This module defines:
//! - `ChipTransport` trait - Interface for pluggable chip transports
//! - `TransportFactory` type alias - Factory function type
//! - `PairingCredentials` - Keypair proving possession of a pairing key
//! - `SessionContext` - What a successful handshake yields
//!
//! Framing, encryption and key agreement live behind the trait. The
//! authorization layer only sees the fallible primitives below.

use crate::consts::PAIRING_KEY_LEN;
use crate::error::TransportError;
use crate::layout::{ConfigObjectId, ConfigObjectKind};
use crate::slot::PairingKeySlot;
use core::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Public half of a pairing key.
pub type PairingPublicKey = [u8; PAIRING_KEY_LEN];

/// Factory function type for creating transport instances.
pub type TransportFactory = fn() -> Box<dyn ChipTransport>;

/// Keypair used to open a secure session.
///
/// The private half is wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PairingCredentials {
    private_key: [u8; PAIRING_KEY_LEN],
    #[zeroize(skip)]
    public_key: PairingPublicKey,
}

impl PairingCredentials {
    pub fn new(private_key: [u8; PAIRING_KEY_LEN], public_key: PairingPublicKey) -> Self {
        Self {
            private_key,
            public_key,
        }
    }

    pub fn private_key(&self) -> &[u8; PAIRING_KEY_LEN] {
        &self.private_key
    }

    pub fn public_key(&self) -> &PairingPublicKey {
        &self.public_key
    }
}

impl fmt::Debug for PairingCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PairingCredentials")
            .field("private_key", &"<redacted>")
            .field("public_key", &hex::encode(self.public_key))
            .finish()
    }
}

/// Result of a successful session handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionContext {
    /// Slot the session is authenticated as.
    pub slot: PairingKeySlot,
    /// Cleared once the session is aborted or the handle deinitialized.
    pub live: bool,
}

impl SessionContext {
    pub fn new(slot: PairingKeySlot) -> Self {
        Self { slot, live: true }
    }
}

/// Trait defining the interface for chip transports.
///
/// `ChipHandle` drives a transport through this trait, enabling pluggable
/// backends (simulator, SPI, USB dongle, etc.).
///
/// # Lifecycle
///
/// 1. `init()` - Bring up the physical channel
/// 2. `establish_session()` - Verify the chip and prove a pairing key
/// 3. command primitives - One blocking round-trip each
/// 4. `abort_session()` / `deinit()`
///
/// Every primitive is a single request/response. Calls never overlap.
pub trait ChipTransport: Send {
    /// Returns the transport's unique identifier (e.g., "simulation").
    fn name(&self) -> &'static str;

    /// Returns the transport's semantic version.
    fn version(&self) -> &'static str;

    /// Bring up the channel to the chip.
    fn init(&mut self) -> Result<(), TransportError>;

    /// Release the channel. Any open session is dropped.
    fn deinit(&mut self) -> Result<(), TransportError>;

    /// Verify the chip identity and prove possession of the pairing key in `slot`.
    ///
    /// # Errors
    /// Returns `TransportError::HandshakeFailed` when either the chip
    /// certificate chain or the pairing-key proof does not verify.
    fn establish_session(
        &mut self,
        credentials: &PairingCredentials,
        slot: PairingKeySlot,
    ) -> Result<SessionContext, TransportError>;

    /// Drop the secure session. Safe to call without one.
    fn abort_session(&mut self) -> Result<(), TransportError>;

    /// Read one config register over the secure channel.
    fn read_register(
        &mut self,
        kind: ConfigObjectKind,
        id: ConfigObjectId,
    ) -> Result<u32, TransportError>;

    /// Write one config register over the secure channel.
    fn write_register(
        &mut self,
        kind: ConfigObjectKind,
        id: ConfigObjectId,
        value: u32,
    ) -> Result<(), TransportError>;

    /// Erase a whole config object back to factory values.
    fn erase_object(&mut self, kind: ConfigObjectKind) -> Result<(), TransportError>;

    /// Store a pairing public key in a blank slot.
    fn pairing_key_write(
        &mut self,
        slot: PairingKeySlot,
        key: &PairingPublicKey,
    ) -> Result<(), TransportError>;

    /// Read a pairing public key.
    fn pairing_key_read(&mut self, slot: PairingKeySlot)
    -> Result<PairingPublicKey, TransportError>;

    /// Permanently invalidate a pairing-key slot.
    fn pairing_key_invalidate(&mut self, slot: PairingKeySlot) -> Result<(), TransportError>;

    /// Echo `message` through the secure channel.
    fn ping(&mut self, message: &[u8]) -> Result<Vec<u8>, TransportError>;
}

impl ChipTransport for Box<dyn ChipTransport> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn version(&self) -> &'static str {
        (**self).version()
    }

    fn init(&mut self) -> Result<(), TransportError> {
        (**self).init()
    }

    fn deinit(&mut self) -> Result<(), TransportError> {
        (**self).deinit()
    }

    fn establish_session(
        &mut self,
        credentials: &PairingCredentials,
        slot: PairingKeySlot,
    ) -> Result<SessionContext, TransportError> {
        (**self).establish_session(credentials, slot)
    }

    fn abort_session(&mut self) -> Result<(), TransportError> {
        (**self).abort_session()
    }

    fn read_register(
        &mut self,
        kind: ConfigObjectKind,
        id: ConfigObjectId,
    ) -> Result<u32, TransportError> {
        (**self).read_register(kind, id)
    }

    fn write_register(
        &mut self,
        kind: ConfigObjectKind,
        id: ConfigObjectId,
        value: u32,
    ) -> Result<(), TransportError> {
        (**self).write_register(kind, id, value)
    }

    fn erase_object(&mut self, kind: ConfigObjectKind) -> Result<(), TransportError> {
        (**self).erase_object(kind)
    }

    fn pairing_key_write(
        &mut self,
        slot: PairingKeySlot,
        key: &PairingPublicKey,
    ) -> Result<(), TransportError> {
        (**self).pairing_key_write(slot, key)
    }

    fn pairing_key_read(
        &mut self,
        slot: PairingKeySlot,
    ) -> Result<PairingPublicKey, TransportError> {
        (**self).pairing_key_read(slot)
    }

    fn pairing_key_invalidate(&mut self, slot: PairingKeySlot) -> Result<(), TransportError> {
        (**self).pairing_key_invalidate(slot)
    }

    fn ping(&mut self, message: &[u8]) -> Result<Vec<u8>, TransportError> {
        (**self).ping(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_debug_redacts_private_half() {
        let creds = PairingCredentials::new([0xAB; PAIRING_KEY_LEN], [0x01; PAIRING_KEY_LEN]);
        let dbg = format!("{creds:?}");
        assert!(dbg.contains("<redacted>"));
        assert!(!dbg.contains("abab"));
        assert!(dbg.contains("0101"));
    }

    #[test]
    fn new_session_is_live() {
        let ctx = SessionContext::new(PairingKeySlot::SH1);
        assert!(ctx.live);
        assert_eq!(ctx.slot, PairingKeySlot::SH1);
    }
}
