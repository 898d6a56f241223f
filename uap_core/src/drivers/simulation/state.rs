//! State persistence for the simulated chip.
//!
//! Both config objects and the pairing-key slots survive restarts so a
//! provisioning run can be resumed against the same "chip". State is stored
//! with bincode.

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uap_common::consts::PAIRING_KEY_SLOT_COUNT;
use uap_common::error::TransportError;
use uap_common::object::ConfigObject;
use uap_common::transport::PairingPublicKey;

/// Lifecycle of one pairing-key slot. Invalidation is permanent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PairingKeyState {
    #[default]
    Blank,
    Written(PairingPublicKey),
    Invalidated,
}

impl PairingKeyState {
    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Blank)
    }
}

/// Everything the chip keeps in non-volatile memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedChipState {
    /// Version of state format (for migration)
    pub version: u32,
    pub r_config: ConfigObject,
    pub i_config: ConfigObject,
    pub pairing_keys: [PairingKeyState; PAIRING_KEY_SLOT_COUNT],
    /// Timestamp of last save (Unix epoch seconds)
    pub saved_at: u64,
}

impl PersistedChipState {
    /// Current state format version.
    pub const CURRENT_VERSION: u32 = 1;
}

/// State persistence manager.
#[derive(Debug, Clone)]
pub struct StatePersistence {
    path: PathBuf,
}

impl StatePersistence {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Save state to file.
    pub fn save(&self, state: &PersistedChipState) -> Result<(), TransportError> {
        debug!("Saving chip state to {:?}", self.path);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                TransportError::Persistence(format!("Failed to create directory: {}", e))
            })?;
        }

        let mut state = state.clone();
        state.saved_at = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let file = File::create(&self.path).map_err(|e| {
            TransportError::Persistence(format!("Failed to create state file: {}", e))
        })?;

        let writer = BufWriter::new(file);
        bincode::serialize_into(writer, &state).map_err(|e| {
            TransportError::Persistence(format!("Failed to serialize state: {}", e))
        })?;

        info!("Saved chip state to {:?}", self.path);
        Ok(())
    }

    /// Load state from file. A missing file or an older format yields `None`.
    pub fn load(&self) -> Result<Option<PersistedChipState>, TransportError> {
        debug!("Loading chip state from {:?}", self.path);

        if !self.path.exists() {
            debug!("State file does not exist, starting from factory state");
            return Ok(None);
        }

        let file = File::open(&self.path).map_err(|e| {
            TransportError::Persistence(format!("Failed to open state file: {}", e))
        })?;

        let reader = BufReader::new(file);
        let state: PersistedChipState = bincode::deserialize_from(reader).map_err(|e| {
            warn!("Failed to deserialize state file: {}", e);
            TransportError::Persistence(format!("Failed to deserialize state: {}", e))
        })?;

        if state.version != PersistedChipState::CURRENT_VERSION {
            warn!(
                "State file version {} differs from current {}, starting from factory state",
                state.version,
                PersistedChipState::CURRENT_VERSION
            );
            return Ok(None);
        }

        info!(
            "Loaded chip state from {:?} (saved at {})",
            self.path, state.saved_at
        );
        Ok(Some(state))
    }

    /// Delete state file.
    pub fn delete(&self) -> Result<(), TransportError> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| {
                TransportError::Persistence(format!("Failed to delete state file: {}", e))
            })?;
            info!("Deleted state file {:?}", self.path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use uap_common::layout::ConfigObjectId;

    fn sample_state() -> PersistedChipState {
        let mut r_config = ConfigObject::factory_reset();
        r_config.set(ConfigObjectId::Ping, 0xFFFF_FFF1.into());
        PersistedChipState {
            version: PersistedChipState::CURRENT_VERSION,
            r_config,
            i_config: ConfigObject::factory_reset(),
            pairing_keys: [
                PairingKeyState::Written([7; 32]),
                PairingKeyState::Blank,
                PairingKeyState::Invalidated,
                PairingKeyState::Blank,
            ],
            saved_at: 0,
        }
    }

    #[test]
    fn test_persistence_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chip.bin");
        let persistence = StatePersistence::new(&path);
        let state = sample_state();

        persistence.save(&state).unwrap();
        assert!(path.exists());

        let loaded = persistence.load().unwrap().unwrap();
        assert_eq!(loaded.r_config, state.r_config);
        assert_eq!(loaded.pairing_keys, state.pairing_keys);
        assert!(loaded.saved_at > 0);

        persistence.delete().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_persistence_load_missing() {
        let dir = tempdir().unwrap();
        let persistence = StatePersistence::new(dir.path().join("nonexistent.bin"));
        assert!(persistence.load().unwrap().is_none());
    }

    #[test]
    fn test_persistence_version_mismatch_starts_fresh() {
        let dir = tempdir().unwrap();
        let persistence = StatePersistence::new(dir.path().join("old.bin"));
        let mut state = sample_state();
        state.version = 0;
        persistence.save(&state).unwrap();
        assert!(persistence.load().unwrap().is_none());
    }

    #[test]
    fn test_persistence_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("corrupt.bin");
        fs::write(&path, b"\x01").unwrap();
        let result = StatePersistence::new(&path).load();
        assert!(matches!(result, Err(TransportError::Persistence(_))));
    }
}
