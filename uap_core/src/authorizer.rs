//! Secure Session Authorizer.
//!
//! Tracks the session lifecycle of one chip handle and decides whether the
//! authenticated pairing-key slot may perform a privileged operation.
//!
//! ```text
//!  Closed ──init──► Unauthenticated ──begin──► Authenticating ──ok──► Authenticated
//!    ▲                    ▲   ▲                      │                     │
//!    │                    │   └──────── fail ────────┘                   abort
//!    └──── deinit ────────┴──────────── (any) ◄──── Aborted ◄──────────────┘
//! ```
//!
//! Decisions read the governing register of both config objects through the
//! transport the first time they are needed in a session and cache them until
//! the registry reports a write, an erase or the session ends.

use std::collections::HashMap;
use tracing::{debug, info, warn};
use uap_common::access::effective_mask;
use uap_common::bits::ConfigRegister;
use uap_common::error::{TransportError, UapError};
use uap_common::layout::{ConfigObjectId, ConfigObjectKind, Operation};
use uap_common::slot::PairingKeySlot;
use uap_common::transport::{ChipTransport, SessionContext};

/// Lifecycle state of the session on one handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum SessionState {
    /// Handle not initialized, or deinitialized.
    #[default]
    Closed = 0,
    /// Handle up, no session.
    Unauthenticated = 1,
    /// Handshake in progress.
    Authenticating = 2,
    /// Privileged commands may be issued.
    Authenticated = 3,
    /// Session dropped by the client; behaves like `Unauthenticated`.
    Aborted = 4,
}

impl SessionState {
    /// Whether a new handshake may start from this state.
    #[inline]
    pub const fn can_authenticate(self) -> bool {
        matches!(self, Self::Unauthenticated | Self::Aborted)
    }
}

/// Per-handle session state machine and permission cache.
#[derive(Debug, Default)]
pub struct SessionAuthorizer {
    state: SessionState,
    session: Option<SessionContext>,
    cache: HashMap<(ConfigObjectKind, ConfigObjectId), ConfigRegister>,
}

impl SessionAuthorizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Context of the live session, if any.
    pub fn session(&self) -> Option<SessionContext> {
        self.session.filter(|ctx| ctx.live)
    }

    /// Slot of the authenticated session.
    ///
    /// # Errors
    /// Returns `UapError::NoActiveSession` outside `Authenticated`.
    pub fn active_slot(&self) -> Result<PairingKeySlot, UapError> {
        match (self.state, self.session()) {
            (SessionState::Authenticated, Some(ctx)) => Ok(ctx.slot),
            _ => Err(UapError::NoActiveSession),
        }
    }

    /// Handle came up.
    pub fn on_init(&mut self) {
        if self.state == SessionState::Closed {
            self.state = SessionState::Unauthenticated;
        }
    }

    /// Enter `Authenticating`.
    ///
    /// # Errors
    /// - `NotInitialized` when the handle is closed
    /// - `SessionAlreadyActive` when a session is open; it must be aborted first
    pub fn begin(&mut self) -> Result<(), UapError> {
        match self.state {
            SessionState::Closed => Err(UapError::NotInitialized),
            SessionState::Authenticated => Err(UapError::SessionAlreadyActive(
                self.session.map_or(PairingKeySlot::ADMIN, |ctx| ctx.slot),
            )),
            SessionState::Authenticating => Err(UapError::AuthenticationFailed(
                "handshake already in progress".to_string(),
            )),
            SessionState::Unauthenticated | SessionState::Aborted => {
                self.state = SessionState::Authenticating;
                Ok(())
            }
        }
    }

    /// Handshake verified.
    pub fn complete(&mut self, ctx: SessionContext) {
        self.cache.clear();
        self.session = Some(ctx);
        self.state = SessionState::Authenticated;
        info!("Secure session established as {}", ctx.slot);
    }

    /// Handshake rejected.
    pub fn fail(&mut self) {
        self.session = None;
        self.cache.clear();
        if self.state == SessionState::Authenticating {
            self.state = SessionState::Unauthenticated;
        }
    }

    /// Drop the session. Always succeeds.
    pub fn abort(&mut self) {
        if let Some(ctx) = self.session.as_mut() {
            ctx.live = false;
        }
        self.session = None;
        self.cache.clear();
        if matches!(
            self.state,
            SessionState::Authenticated | SessionState::Authenticating
        ) {
            self.state = SessionState::Aborted;
        }
    }

    /// Handle went down.
    pub fn close(&mut self) {
        self.abort();
        self.state = SessionState::Closed;
    }

    /// Decide whether the session may perform `operation`.
    ///
    /// Pure decision: nothing is dispatched. The governing register of both
    /// config objects is fetched once per session and cached.
    ///
    /// # Errors
    /// - `NoActiveSession` outside `Authenticated`
    /// - `InvalidResource` for an out-of-range resource index
    /// - `ChipUnavailable` when a register fetch fails
    pub fn authorize<T: ChipTransport + ?Sized>(
        &mut self,
        transport: &mut T,
        operation: Operation,
    ) -> Result<bool, UapError> {
        let slot = self.active_slot()?;
        let location = operation.locate()?;
        let r_config = self.cached(transport, ConfigObjectKind::RConfig, location.register)?;
        let i_config = self.cached(transport, ConfigObjectKind::IConfig, location.register)?;
        let mask = effective_mask(r_config, i_config, location);
        let granted = mask.permits(slot);
        if granted {
            debug!("{operation} granted to {slot} (field {mask})");
        } else {
            warn!("{operation} denied to {slot} (field {mask})");
        }
        Ok(granted)
    }

    /// `authorize`, turning a denial into `UapError::NotAuthorized`.
    pub fn require<T: ChipTransport + ?Sized>(
        &mut self,
        transport: &mut T,
        operation: Operation,
    ) -> Result<PairingKeySlot, UapError> {
        if self.authorize(transport, operation)? {
            self.active_slot()
        } else {
            Err(UapError::NotAuthorized {
                operation,
                slot: self.active_slot()?,
            })
        }
    }

    /// Record a value just read back through the registry.
    pub fn observe(&mut self, kind: ConfigObjectKind, id: ConfigObjectId, value: ConfigRegister) {
        if self.session().is_some() {
            self.cache.insert((kind, id), value);
        }
    }

    /// Forget one cached register after a write.
    pub fn invalidate(&mut self, kind: ConfigObjectKind, id: ConfigObjectId) {
        self.cache.remove(&(kind, id));
    }

    /// Forget every cached register of an object after an erase.
    pub fn invalidate_object(&mut self, kind: ConfigObjectKind) {
        self.cache.retain(|(cached_kind, _), _| *cached_kind != kind);
    }

    /// Forget everything cached; the chip may have been changed behind our back.
    pub fn invalidate_all(&mut self) {
        self.cache.clear();
    }

    /// Translate a chip-side failure of `operation` into a `UapError`.
    ///
    /// A chip `Unauthorized` on a live session is a permission denial that
    /// the cache did not predict: the governing register is dropped from the
    /// cache and the caller gets `NotAuthorized`.
    pub fn chip_failure(&mut self, operation: Operation, err: TransportError) -> UapError {
        match (err, self.active_slot()) {
            (TransportError::Unauthorized, Ok(slot)) => {
                let register = operation.register();
                self.invalidate(ConfigObjectKind::RConfig, register);
                self.invalidate(ConfigObjectKind::IConfig, register);
                warn!("Chip refused {operation} to {slot}");
                UapError::NotAuthorized { operation, slot }
            }
            (err, _) => UapError::ChipUnavailable(err),
        }
    }

    /// Number of cached registers.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    fn cached<T: ChipTransport + ?Sized>(
        &mut self,
        transport: &mut T,
        kind: ConfigObjectKind,
        id: ConfigObjectId,
    ) -> Result<ConfigRegister, UapError> {
        if let Some(value) = self.cache.get(&(kind, id)) {
            return Ok(*value);
        }
        let value = ConfigRegister(transport.read_register(kind, id)?);
        debug!("Cached {kind} {id} = {value}");
        self.cache.insert((kind, id), value);
        Ok(value)
    }
}
