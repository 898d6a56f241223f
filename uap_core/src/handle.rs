//! Chip handle: one transport, one session, one authorizer.
//!
//! Every privileged command goes through `SessionAuthorizer::require` before
//! it is dispatched. Handles are independent; nothing is shared between
//! them, so separate handles may live on separate threads.

use tracing::{info, warn};
use uap_common::error::{TransportError, UapError};
use uap_common::layout::Operation;
use uap_common::slot::PairingKeySlot;
use uap_common::transport::{ChipTransport, PairingCredentials, PairingPublicKey, SessionContext};

use crate::authorizer::{SessionAuthorizer, SessionState};
use crate::registry::ConfigRegistry;

/// Owner of a chip transport and its session state.
pub struct ChipHandle<T: ChipTransport = Box<dyn ChipTransport>> {
    transport: T,
    authorizer: SessionAuthorizer,
}

impl<T: ChipTransport> ChipHandle<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            authorizer: SessionAuthorizer::new(),
        }
    }

    /// Bring the transport up. A no-op on an initialized handle.
    pub fn init(&mut self) -> Result<(), UapError> {
        if self.authorizer.state() != SessionState::Closed {
            return Ok(());
        }
        self.transport.init()?;
        self.authorizer.on_init();
        info!(
            "Handle up on transport {} v{}",
            self.transport.name(),
            self.transport.version()
        );
        Ok(())
    }

    /// Drop any session and release the transport.
    ///
    /// The handle is `Closed` afterwards even if the transport reports an error.
    pub fn deinit(&mut self) -> Result<(), UapError> {
        self.authorizer.close();
        self.transport.deinit()?;
        info!("Handle closed");
        Ok(())
    }

    /// Authenticate as `slot` with `credentials`.
    ///
    /// # Errors
    /// - `NotInitialized` before `init`
    /// - `SessionAlreadyActive` while a session is open
    /// - `AuthenticationFailed` when the chip rejects the proof, refuses the
    ///   session or its identity fails
    /// - `ChipUnavailable` on any other transport failure
    pub fn start_session(
        &mut self,
        credentials: &PairingCredentials,
        slot: PairingKeySlot,
    ) -> Result<SessionContext, UapError> {
        self.authorizer.begin()?;
        match self.transport.establish_session(credentials, slot) {
            Ok(ctx) if ctx.slot == slot => {
                self.authorizer.complete(ctx);
                Ok(ctx)
            }
            Ok(ctx) => {
                self.authorizer.fail();
                if let Err(e) = self.transport.abort_session() {
                    warn!("Transport failed to drop mismatched session: {}", e);
                }
                Err(UapError::AuthenticationFailed(format!(
                    "requested {slot}, chip opened {}",
                    ctx.slot
                )))
            }
            Err(TransportError::HandshakeFailed(reason)) => {
                self.authorizer.fail();
                warn!("Handshake as {slot} failed: {reason}");
                Err(UapError::AuthenticationFailed(reason))
            }
            Err(TransportError::Unauthorized) => {
                self.authorizer.fail();
                warn!("Chip refused a session for {slot}");
                Err(UapError::AuthenticationFailed(format!(
                    "chip refused a session for {slot}"
                )))
            }
            Err(e) => {
                self.authorizer.fail();
                Err(UapError::ChipUnavailable(e))
            }
        }
    }

    /// Drop the session. Always succeeds; transport errors are only logged.
    pub fn abort_session(&mut self) {
        if self.authorizer.state() != SessionState::Closed {
            if let Err(e) = self.transport.abort_session() {
                warn!("Transport failed to abort session: {}", e);
            }
        }
        self.authorizer.abort();
        info!("Session aborted");
    }

    pub fn state(&self) -> SessionState {
        self.authorizer.state()
    }

    pub fn session(&self) -> Option<SessionContext> {
        self.authorizer.session()
    }

    /// Whether the active session may perform `operation`. Nothing is dispatched.
    pub fn authorize(&mut self, operation: Operation) -> Result<bool, UapError> {
        self.authorizer.authorize(&mut self.transport, operation)
    }

    /// Authorized access to the config objects.
    pub fn config(&mut self) -> ConfigRegistry<'_> {
        ConfigRegistry::new(&mut self.transport, &mut self.authorizer)
    }

    // ─── Pairing keys ───────────────────────────────────────────────

    pub fn pairing_key_write(
        &mut self,
        slot: PairingKeySlot,
        key: &PairingPublicKey,
    ) -> Result<(), UapError> {
        let operation = Operation::PairingKeyWrite(slot.into());
        self.require(operation)?;
        let result = self.transport.pairing_key_write(slot, key);
        result.map_err(|err| self.authorizer.chip_failure(operation, err))?;
        info!("Pairing key written to {slot}");
        Ok(())
    }

    pub fn pairing_key_read(&mut self, slot: PairingKeySlot) -> Result<PairingPublicKey, UapError> {
        let operation = Operation::PairingKeyRead(slot.into());
        self.require(operation)?;
        let result = self.transport.pairing_key_read(slot);
        result.map_err(|err| self.authorizer.chip_failure(operation, err))
    }

    /// Permanently disable a slot. There is no way back.
    pub fn pairing_key_invalidate(&mut self, slot: PairingKeySlot) -> Result<(), UapError> {
        let operation = Operation::PairingKeyInvalidate(slot.into());
        self.require(operation)?;
        let result = self.transport.pairing_key_invalidate(slot);
        result.map_err(|err| self.authorizer.chip_failure(operation, err))?;
        warn!("Pairing key {slot} invalidated");
        Ok(())
    }

    // ─── Utility ────────────────────────────────────────────────────

    pub fn ping(&mut self, message: &[u8]) -> Result<Vec<u8>, UapError> {
        self.require(Operation::Ping)?;
        let result = self.transport.ping(message);
        result.map_err(|err| self.authorizer.chip_failure(Operation::Ping, err))
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Direct transport access. Anything done through it bypasses the
    /// authorizer, so cached permissions are dropped.
    pub fn transport_mut(&mut self) -> &mut T {
        self.authorizer.invalidate_all();
        &mut self.transport
    }

    /// Consume the handle. The session state goes with it.
    pub fn into_transport(self) -> T {
        self.transport
    }

    fn require(&mut self, operation: Operation) -> Result<PairingKeySlot, UapError> {
        self.authorizer.require(&mut self.transport, operation)
    }
}
