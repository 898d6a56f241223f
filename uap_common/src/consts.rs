//! System-wide constants shared by every UAP workspace crate.

/// Canonical provisioning service name (used for logging).
pub const UAP_SERVICE_NAME: &str = "uap";

/// Number of registers in each config object.
pub const CONFIG_OBJ_COUNT: usize = 27;

/// Number of pairing-key slots.
pub const PAIRING_KEY_SLOT_COUNT: usize = 4;

/// Length of a pairing public key in bytes (X25519).
pub const PAIRING_KEY_LEN: usize = 32;

/// Number of ECC key slots.
pub const ECC_KEY_SLOT_COUNT: usize = 32;

/// Number of user-data slots in R memory.
pub const R_MEM_DATA_SLOT_COUNT: usize = 512;

/// Number of monotonic counters.
pub const MCOUNTER_COUNT: usize = 16;

/// Number of MAC-and-destroy slots.
pub const MAC_AND_DESTROY_SLOT_COUNT: usize = 128;

/// Maximum ping payload in bytes.
pub const PING_MAX_LEN: usize = 4096;

/// Default provisioning configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "/etc/uap/provision.toml";

/// Default simulator state file name
pub const DEFAULT_STATE_FILE: &str = "uap_chip_state";
