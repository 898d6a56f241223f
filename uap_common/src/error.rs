//! Error taxonomy for session authorization and config-object access.
//!
//! `TransportError` is what the transport collaborator reports. It is carried
//! verbatim inside `UapError::ChipUnavailable`, never reinterpreted.

use crate::layout::{ConfigObjectId, ConfigObjectKind, Operation};
use crate::slot::PairingKeySlot;
use thiserror::Error;

/// Failures reported by a chip transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Bus or framing failure
    #[error("Communication error: {0}")]
    Communication(String),

    /// Chip did not answer in time
    #[error("Chip response timeout")]
    Timeout,

    /// Session handshake rejected by the chip
    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),

    /// Chip refused the command for the current session
    #[error("Chip rejected command as unauthorized")]
    Unauthorized,

    /// Chip refused the command for another reason
    #[error("Command rejected: {0}")]
    Rejected(String),

    /// No live secure session on the channel
    #[error("No secure session on channel")]
    NoSession,

    /// Transport driver not found
    #[error("Transport not found: {0}")]
    NotFound(String),

    /// State persistence error
    #[error("State persistence error: {0}")]
    Persistence(String),
}

/// Errors of the authorization and config-object layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UapError {
    /// Session establishment rejected; retry with correct credentials
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Authorization check denied the operation
    #[error("{slot} is not authorized for {operation}")]
    NotAuthorized {
        operation: Operation,
        slot: PairingKeySlot,
    },

    /// I-config write would raise a bit from 0 to 1
    #[error(
        "Irreversible write rejected for {register}: current 0x{current:08X}, requested 0x{requested:08X}"
    )]
    IrreversibleWriteRejected {
        register: ConfigObjectId,
        current: u32,
        requested: u32,
    },

    /// Write would take pairing-key write access away from the admin slot
    #[error(
        "{kind} write of 0x{requested:08X} to CFG_UAP_PAIRING_KEY_WRITE would lock SH0 out of pairing-key writes"
    )]
    AdminLockout { kind: ConfigObjectKind, requested: u32 },

    /// Operation not available for this object
    #[error("Operation not supported: {0}")]
    OperationNotSupported(String),

    /// Transport failure, propagated unchanged
    #[error("Chip unavailable: {0}")]
    ChipUnavailable(#[from] TransportError),

    /// Privileged command issued outside an authenticated session
    #[error("No authenticated session")]
    NoActiveSession,

    /// A session is already open on this handle
    #[error("Session already active as {0}; abort it first")]
    SessionAlreadyActive(PairingKeySlot),

    /// Handle used before `init` or after `deinit`
    #[error("Handle not initialized")]
    NotInitialized,

    /// Resource index outside the operation's ranges
    #[error("Resource index {index} out of range for {operation}")]
    InvalidResource { operation: Operation, index: u16 },

    /// Profile rule does not fit the register layout
    #[error("Invalid profile rule: {0}")]
    InvalidProfileRule(String),

    /// Read-back after a write did not match
    #[error(
        "{kind} verification mismatch at {register}: expected 0x{expected:08X}, read 0x{actual:08X}"
    )]
    VerificationMismatch {
        kind: ConfigObjectKind,
        register: ConfigObjectId,
        expected: u32,
        actual: u32,
    },
}

impl UapError {
    /// Whether a caller may reasonably retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed(_)
                | Self::ChipUnavailable(TransportError::Communication(_) | TransportError::Timeout)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_is_carried_verbatim() {
        let err: UapError = TransportError::Timeout.into();
        assert_eq!(err, UapError::ChipUnavailable(TransportError::Timeout));
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn not_authorized_names_slot_and_operation() {
        let err = UapError::NotAuthorized {
            operation: Operation::PairingKeyWrite(2),
            slot: PairingKeySlot::SH2,
        };
        assert_eq!(err.to_string(), "SH2 is not authorized for PAIRING_KEY_WRITE[2]");
        assert!(!err.is_retryable());
    }

    #[test]
    fn admin_lockout_names_object_and_word() {
        let err = UapError::AdminLockout {
            kind: ConfigObjectKind::IConfig,
            requested: 0xFFFF_FFFE,
        };
        let msg = err.to_string();
        assert!(msg.starts_with("I-config write of 0xFFFFFFFE"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn irreversible_write_shows_both_words() {
        let err = UapError::IrreversibleWriteRejected {
            register: ConfigObjectId::Ping,
            current: 0x0000_00F0,
            requested: 0x0000_00FF,
        };
        let msg = err.to_string();
        assert!(msg.contains("CFG_UAP_PING"));
        assert!(msg.contains("0x000000F0"));
        assert!(msg.contains("0x000000FF"));
    }

    #[test]
    fn retry_policy_hint() {
        assert!(UapError::AuthenticationFailed("bad key".into()).is_retryable());
        assert!(UapError::from(TransportError::Communication("spi".into())).is_retryable());
        assert!(!UapError::from(TransportError::Unauthorized).is_retryable());
        assert!(!UapError::OperationNotSupported("erase".into()).is_retryable());
    }
}
