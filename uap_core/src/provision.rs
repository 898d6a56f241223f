//! Provisioning flow driven by a `ProvisionConfig`.
//!
//! Opens a session, stores the configured pairing keys and checks each one
//! by reading it back, then (optionally) erases the R-config and writes the
//! reference profile. The session is always aborted and the handle closed,
//! whatever the outcome.

use thiserror::Error;
use tracing::{debug, info};
use uap_common::config::{ConfigError, ProvisionConfig};
use uap_common::error::{TransportError, UapError};
use uap_common::layout::ConfigObjectKind;
use uap_common::object::ConfigObject;
use uap_common::slot::PairingKeySlot;
use uap_common::transport::ChipTransport;

use crate::handle::ChipHandle;
use crate::profile::reference_r_config;

/// Provisioning failures.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Uap(#[from] UapError),

    /// Read-back of a pairing key differs from the configured key
    #[error("Pairing key in {0} does not match the configured key")]
    KeyMismatch(PairingKeySlot),
}

/// What a provisioning run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    /// Slots written during this run.
    pub keys_written: Vec<PairingKeySlot>,
    /// Slots that already held the configured key.
    pub keys_present: Vec<PairingKeySlot>,
    /// R-config as read back after the profile, when one was applied.
    pub r_config: Option<ConfigObject>,
}

/// Run the whole flow on `handle`.
pub fn provision<T: ChipTransport>(
    handle: &mut ChipHandle<T>,
    config: &ProvisionConfig,
) -> Result<ProvisionReport, ProvisionError> {
    config.validate()?;
    handle.init()?;
    let result = run_session(handle, config);
    handle.abort_session();
    let closed = handle.deinit();
    let report = result?;
    closed?;
    Ok(report)
}

fn run_session<T: ChipTransport>(
    handle: &mut ChipHandle<T>,
    config: &ProvisionConfig,
) -> Result<ProvisionReport, ProvisionError> {
    let credentials = config.session.credentials()?;
    handle.start_session(&credentials, config.session.slot)?;

    let mut report = ProvisionReport::default();
    for entry in &config.pairing_keys {
        let key = entry.key()?;
        match handle.pairing_key_read(entry.slot) {
            Ok(existing) if existing == key => {
                info!("{} already holds the configured key", entry.slot);
                report.keys_present.push(entry.slot);
                continue;
            }
            Ok(_) => return Err(ProvisionError::KeyMismatch(entry.slot)),
            // Blank slots are refused by the chip on read.
            Err(UapError::ChipUnavailable(TransportError::Rejected(reason))) => {
                debug!("{} not readable before write: {reason}", entry.slot);
            }
            Err(e) => return Err(e.into()),
        }

        handle.pairing_key_write(entry.slot, &key)?;
        if handle.pairing_key_read(entry.slot)? != key {
            return Err(ProvisionError::KeyMismatch(entry.slot));
        }
        report.keys_written.push(entry.slot);
    }

    if config.profile.apply {
        let mut registry = handle.config();
        if config.profile.erase_first {
            registry.erase(ConfigObjectKind::RConfig)?;
        }
        debug!(
            "R-config before profile:\n{}",
            registry.read_whole(ConfigObjectKind::RConfig)?
        );
        let profile = reference_r_config()?;
        let written = registry.apply_profile(&profile)?;
        info!("R-config after profile:\n{written}");
        report.r_config = Some(written);
    }

    Ok(report)
}
