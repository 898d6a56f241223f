//! Configuration Registry.
//!
//! Authorized access to the chip-resident R-config and I-config. Every call
//! asks the `SessionAuthorizer` first; a denial is returned before anything
//! reaches the transport.
//!
//! Multi-register writes are not atomic across registers. Callers confirm
//! them with `verify` (write, read back, compare).

use tracing::{debug, info, warn};
use uap_common::access::{keeps_admin_key_write, permits};
use uap_common::bits::ConfigRegister;
use uap_common::error::UapError;
use uap_common::layout::{ConfigObjectId, ConfigObjectKind, Operation};
use uap_common::object::ConfigObject;
use uap_common::transport::ChipTransport;

use crate::authorizer::SessionAuthorizer;
use crate::profile::ConfigProfile;

/// Borrowed view over one handle's transport and authorizer.
pub struct ConfigRegistry<'a> {
    transport: &'a mut dyn ChipTransport,
    authorizer: &'a mut SessionAuthorizer,
}

impl<'a> ConfigRegistry<'a> {
    pub fn new(transport: &'a mut dyn ChipTransport, authorizer: &'a mut SessionAuthorizer) -> Self {
        Self {
            transport,
            authorizer,
        }
    }

    /// Read one register.
    ///
    /// # Errors
    /// - `NotAuthorized` without read permission for the register's group
    /// - `ChipUnavailable` on transport failure
    pub fn read(
        &mut self,
        kind: ConfigObjectKind,
        id: ConfigObjectId,
    ) -> Result<ConfigRegister, UapError> {
        let operation = read_operation(kind, id);
        self.authorizer.require(&mut *self.transport, operation)?;
        let value = self
            .transport
            .read_register(kind, id)
            .map(ConfigRegister)
            .map_err(|err| self.authorizer.chip_failure(operation, err))?;
        self.authorizer.observe(kind, id, value);
        debug!("{kind} {id} read {value}");
        Ok(value)
    }

    /// Write one register.
    ///
    /// I-config writes may only clear bits; a 0→1 transition is rejected
    /// before the write is issued.
    ///
    /// # Errors
    /// - `NotAuthorized` without write permission
    /// - `AdminLockout` when SH0 would lose pairing-key write access
    /// - `IrreversibleWriteRejected` for an I-config bit raise
    /// - `ChipUnavailable` on transport failure
    pub fn write(
        &mut self,
        kind: ConfigObjectKind,
        id: ConfigObjectId,
        value: impl Into<ConfigRegister>,
    ) -> Result<(), UapError> {
        let value = value.into();
        self.authorizer.require(&mut *self.transport, write_operation(kind, id))?;
        reject_admin_lockout(kind, id, value)?;
        if kind == ConfigObjectKind::IConfig {
            self.check_clear_only(id, value)?;
        }
        self.issue_write(kind, id, value)
    }

    /// Reset every register of the object to its factory value.
    ///
    /// # Errors
    /// - `OperationNotSupported` for I-config
    /// - `NotAuthorized` without R-config write/erase permission
    pub fn erase(&mut self, kind: ConfigObjectKind) -> Result<(), UapError> {
        if !kind.is_erasable() {
            return Err(UapError::OperationNotSupported(format!("{kind} cannot be erased")));
        }
        self.authorizer
            .require(&mut *self.transport, Operation::RConfigWriteErase)?;
        let result = self.transport.erase_object(kind);
        self.authorizer.invalidate_object(kind);
        result.map_err(|err| self.authorizer.chip_failure(Operation::RConfigWriteErase, err))?;
        info!("{kind} erased");
        Ok(())
    }

    /// Read every register of the object.
    pub fn read_whole(&mut self, kind: ConfigObjectKind) -> Result<ConfigObject, UapError> {
        let mut object = ConfigObject::factory_reset();
        for id in ConfigObjectId::ALL {
            object.set(id, self.read(kind, id)?);
        }
        Ok(object)
    }

    /// Write every register of the object.
    ///
    /// All registers are authorized (and, for I-config, checked clear-only)
    /// before the first write is issued. The register governing writes to
    /// this object goes last, so every write is decided on the state the
    /// checks saw. I-config registers already holding the target value are
    /// skipped.
    pub fn write_whole(
        &mut self,
        kind: ConfigObjectKind,
        object: &ConfigObject,
    ) -> Result<(), UapError> {
        let mut pending = Vec::with_capacity(ConfigObjectId::ALL.len());
        for (id, value) in object.iter() {
            self.authorizer.require(&mut *self.transport, write_operation(kind, id))?;
            if kind == ConfigObjectKind::IConfig {
                let current = ConfigRegister(self.transport.read_register(kind, id)?);
                if current == value {
                    continue;
                }
                reject_raised_bits(id, current, value)?;
            }
            reject_admin_lockout(kind, id, value)?;
            pending.push((id, value));
        }
        let governing = governing_register(kind);
        pending.sort_by_key(|(id, _)| *id == governing);

        info!("Writing {} {kind} registers", pending.len());
        for (id, value) in pending {
            self.issue_write(kind, id, value)?;
        }
        Ok(())
    }

    /// Read the object back and compare with `expected`.
    ///
    /// # Errors
    /// Returns `VerificationMismatch` for the first register that differs.
    pub fn verify(
        &mut self,
        kind: ConfigObjectKind,
        expected: &ConfigObject,
    ) -> Result<ConfigObject, UapError> {
        let actual = self.read_whole(kind)?;
        if let Some(id) = expected.diff(&actual).into_iter().next() {
            warn!("{kind} verification failed at {id}");
            return Err(UapError::VerificationMismatch {
                kind,
                register: id,
                expected: expected.get(id).bits(),
                actual: actual.get(id).bits(),
            });
        }
        Ok(actual)
    }

    /// Write a profile into its target object and verify the read-back.
    ///
    /// # Errors
    /// `NotAuthorized` before anything is written when the profile would
    /// leave the session unable to read the object back.
    pub fn apply_profile(&mut self, profile: &ConfigProfile) -> Result<ConfigObject, UapError> {
        let kind = profile.kind();
        info!("Applying profile to {kind} (layout v{})", profile.layout_version());
        self.check_read_back(kind, profile.object())?;
        self.write_whole(kind, profile.object())?;
        self.verify(kind, profile.object())
    }

    /// Every register of `kind` must stay readable once `object` is written.
    fn check_read_back(
        &mut self,
        kind: ConfigObjectKind,
        object: &ConfigObject,
    ) -> Result<(), UapError> {
        let slot = self.authorizer.active_slot()?;
        for id in ConfigObjectId::ALL {
            let operation = read_operation(kind, id);
            let location = operation.locate()?;
            let r_config = self.projected(kind, object, ConfigObjectKind::RConfig, location.register)?;
            let i_config = self.projected(kind, object, ConfigObjectKind::IConfig, location.register)?;
            if !permits(r_config, i_config, location, slot) {
                warn!("{kind} profile would revoke {operation} from {slot}");
                return Err(UapError::NotAuthorized { operation, slot });
            }
        }
        Ok(())
    }

    /// Value of `id` in `of` after `object` replaces `target`.
    fn projected(
        &mut self,
        target: ConfigObjectKind,
        object: &ConfigObject,
        of: ConfigObjectKind,
        id: ConfigObjectId,
    ) -> Result<ConfigRegister, UapError> {
        if of == target {
            return Ok(object.get(id));
        }
        Ok(ConfigRegister(self.transport.read_register(of, id)?))
    }

    fn check_clear_only(&mut self, id: ConfigObjectId, value: ConfigRegister) -> Result<(), UapError> {
        let current = ConfigRegister(
            self.transport
                .read_register(ConfigObjectKind::IConfig, id)?,
        );
        reject_raised_bits(id, current, value)
    }

    fn issue_write(
        &mut self,
        kind: ConfigObjectKind,
        id: ConfigObjectId,
        value: ConfigRegister,
    ) -> Result<(), UapError> {
        let result = self.transport.write_register(kind, id, value.bits());
        // The chip may have changed even if the answer was lost.
        self.authorizer.invalidate(kind, id);
        result.map_err(|err| self.authorizer.chip_failure(write_operation(kind, id), err))?;
        debug!("{kind} {id} written {value}");
        Ok(())
    }
}

fn read_operation(kind: ConfigObjectKind, id: ConfigObjectId) -> Operation {
    match kind {
        ConfigObjectKind::RConfig => Operation::RConfigRead(id),
        ConfigObjectKind::IConfig => Operation::IConfigRead(id),
    }
}

fn write_operation(kind: ConfigObjectKind, id: ConfigObjectId) -> Operation {
    match kind {
        ConfigObjectKind::RConfig => Operation::RConfigWriteErase,
        ConfigObjectKind::IConfig => Operation::IConfigWrite(id),
    }
}

/// Register whose fields decide writes to `kind`.
fn governing_register(kind: ConfigObjectKind) -> ConfigObjectId {
    match kind {
        ConfigObjectKind::RConfig => ConfigObjectId::RConfigWriteErase,
        ConfigObjectKind::IConfig => ConfigObjectId::IConfigWrite,
    }
}

fn reject_admin_lockout(
    kind: ConfigObjectKind,
    id: ConfigObjectId,
    value: ConfigRegister,
) -> Result<(), UapError> {
    if id == ConfigObjectId::PairingKeyWrite && !keeps_admin_key_write(value) {
        warn!("{kind} {id}: refusing {value}, SH0 would lose pairing-key writes");
        return Err(UapError::AdminLockout {
            kind,
            requested: value.bits(),
        });
    }
    Ok(())
}

fn reject_raised_bits(
    id: ConfigObjectId,
    current: ConfigRegister,
    requested: ConfigRegister,
) -> Result<(), UapError> {
    if current.raised_bits(requested) != 0 {
        warn!(
            "I-config {id}: refusing 0->1 transition {current} -> {requested}"
        );
        return Err(UapError::IrreversibleWriteRejected {
            register: id,
            current: current.bits(),
            requested: requested.bits(),
        });
    }
    Ok(())
}
