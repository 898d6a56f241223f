//! Provisioning flow tests driven by TOML configuration files.

use std::io::Write;
use tempfile::{NamedTempFile, tempdir};
use uap_common::config::{ConfigError, ConfigLoader, ProvisionConfig};
use uap_common::error::UapError;
use uap_common::layout::{ConfigObjectId, SLEEP_MODE_EN_MASK};
use uap_common::slot::PairingKeySlot;
use uap_core::drivers::simulation::{
    FACTORY_SH0_PRIVATE, PairingKeyState, SimulatedChip, derive_public,
};
use uap_core::{ChipHandle, ProvisionError, TransportRegistry, provision, reference_r_config};

fn write_config(body: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(body.as_bytes()).unwrap();
    file
}

fn admin_session_toml() -> String {
    format!(
        r#"
[shared]
service_name = "uap-provision-test"

[session]
slot = 0
private_key = "{}"
public_key = "{}"
"#,
        hex::encode(FACTORY_SH0_PRIVATE),
        hex::encode(derive_public(&FACTORY_SH0_PRIVATE))
    )
}

#[test]
fn test_provision_from_file_with_persisted_chip() {
    let dir = tempdir().unwrap();
    let state = dir.path().join("chip.bin");
    let user_key = derive_public(&[0x77; 32]);
    let body = format!(
        "{}\n[[pairing_keys]]\nslot = 2\npublic_key = \"{}\"\n\n[profile]\napply = true\n",
        admin_session_toml(),
        hex::encode(user_key)
    );
    let file = write_config(&body);
    let config = ProvisionConfig::load(file.path()).unwrap();

    let mut handle = ChipHandle::new(SimulatedChip::new().with_state_file(&state));
    let report = provision(&mut handle, &config).unwrap();
    assert_eq!(report.keys_written, vec![PairingKeySlot::SH2]);

    // Reload the chip from disk and inspect it.
    let mut chip = SimulatedChip::new().with_state_file(&state);
    uap_common::transport::ChipTransport::init(&mut chip).unwrap();
    assert_eq!(
        chip.pairing_key_state(PairingKeySlot::SH2),
        PairingKeyState::Written(user_key)
    );
    let profile = reference_r_config().unwrap();
    assert_eq!(chip.r_config(), profile.object());
    assert_eq!(
        chip.r_config().get(ConfigObjectId::SleepMode).bits() & SLEEP_MODE_EN_MASK,
        0
    );
}

#[test]
fn test_boxed_transport_from_registry() {
    let file = write_config(&admin_session_toml());
    let config = ProvisionConfig::load(file.path()).unwrap();
    let transport = TransportRegistry::with_builtin().create("simulation").unwrap();
    let mut handle: ChipHandle = ChipHandle::new(transport);
    let report = provision(&mut handle, &config).unwrap();
    assert!(report.keys_written.is_empty());
    assert_eq!(report.r_config, None);
}

#[test]
fn test_wrong_session_key_fails_authentication() {
    let body = format!(
        r#"
[shared]
service_name = "uap-provision-test"

[session]
private_key = "{}"
public_key = "{}"
"#,
        hex::encode([0x01u8; 32]),
        hex::encode(derive_public(&[0x01; 32]))
    );
    let file = write_config(&body);
    let config = ProvisionConfig::load(file.path()).unwrap();
    let mut handle = ChipHandle::new(SimulatedChip::new());
    let err = provision(&mut handle, &config).unwrap_err();
    assert!(matches!(
        err,
        ProvisionError::Uap(UapError::AuthenticationFailed(_))
    ));
    assert!(!handle.transport().is_initialized());
}

#[test]
fn test_short_key_rejected_before_touching_chip() {
    let body = format!(
        "{}\n[[pairing_keys]]\nslot = 1\npublic_key = \"abcd\"\n",
        admin_session_toml()
    );
    let file = write_config(&body);
    let config = ProvisionConfig::load(file.path()).unwrap();
    let mut handle = ChipHandle::new(SimulatedChip::new());
    let err = provision(&mut handle, &config).unwrap_err();
    assert!(matches!(
        err,
        ProvisionError::Config(ConfigError::ValidationError(_))
    ));
    assert!(!handle.transport().is_initialized());
}

#[test]
fn test_missing_config_file() {
    let result = ProvisionConfig::load(std::path::Path::new("/nonexistent/provision.toml"));
    assert!(matches!(result, Err(ConfigError::FileNotFound)));
}
