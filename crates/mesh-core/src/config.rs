//! Node configuration: nested sub-configs with sane defaults, loadable from
//! a TOML file on disk.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::MeshError;

/// Top-level configuration for a mesh node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    /// Crypto and identity settings.
    pub crypto: CryptoConfig,
    /// Anti-abuse gate thresholds.
    pub abuse: AbuseConfig,
    /// Link layer settings.
    pub link: LinkConfig,
    /// Store-and-forward settings.
    pub store: StoreConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            crypto: CryptoConfig::default(),
            abuse: AbuseConfig::default(),
            link: LinkConfig::default(),
            store: StoreConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl MeshConfig {
    /// Load configuration from a TOML file, falling back to defaults for any
    /// field not present.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or fails to parse.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MeshError> {
        let text = std::fs::read_to_string(path).map_err(|e| MeshError::Link(e.to_string()))?;
        toml::from_str(&text).map_err(|e| MeshError::Link(e.to_string()))
    }

    /// Serialize this configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), MeshError> {
        let text = toml::to_string_pretty(self).map_err(|e| MeshError::Link(e.to_string()))?;
        std::fs::write(path, text).map_err(|e| MeshError::Link(e.to_string()))
    }
}

/// Identity keyfile location and handshake timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Path to the encrypted identity keyfile.
    pub keyfile_path: String,
    /// Handshake timeout before a pending session is abandoned.
    #[serde(with = "duration_secs")]
    pub handshake_timeout: Duration,
    /// Maximum age of an established session before it is rekeyed.
    #[serde(with = "duration_secs")]
    pub session_max_age: Duration,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            keyfile_path: "identity.keyfile".to_string(),
            handshake_timeout: crate::session_manager::HANDSHAKE_TIMEOUT,
            session_max_age: crate::session_manager::SESSION_MAX_AGE,
        }
    }
}

/// Rate limiting and trust-score thresholds for the anti-abuse gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AbuseConfig {
    /// Messages/minute allowed for a newly seen peer.
    pub new_peer_rate_per_min: u32,
    /// Messages/minute allowed once a peer has built trust.
    pub trusted_rate_per_min: u32,
    /// Trust score threshold above which the trusted rate applies.
    pub trust_threshold: f32,
    /// Starting trust score for a newly seen peer.
    pub initial_trust: f32,
    /// Messages within this window count toward rapid-fire detection.
    #[serde(with = "duration_secs")]
    pub rapid_fire_window: Duration,
    /// Message count within the rapid-fire window that triggers a warning.
    pub rapid_fire_threshold: u32,
    /// Number of warnings before the first mute is applied.
    pub warnings_before_mute: u32,
    /// Duration of the first mute.
    #[serde(with = "duration_secs")]
    pub first_mute_duration: Duration,
    /// Duration of escalated mutes after repeat offenses.
    #[serde(with = "duration_secs")]
    pub escalated_mute_duration: Duration,
    /// Directory for replicated, reinstall-surviving mute records. `None`
    /// disables persistence: mutes last only as long as the process runs.
    pub mute_store_dir: Option<PathBuf>,
}

impl Default for AbuseConfig {
    fn default() -> Self {
        Self {
            new_peer_rate_per_min: 10,
            trusted_rate_per_min: 30,
            trust_threshold: 0.7,
            initial_trust: 0.5,
            rapid_fire_window: Duration::from_secs(10),
            rapid_fire_threshold: 6,
            warnings_before_mute: 3,
            first_mute_duration: Duration::from_secs(30 * 60),
            escalated_mute_duration: Duration::from_secs(12 * 3600),
            mute_store_dir: Some(PathBuf::from("mute_store")),
        }
    }
}

/// Link layer framing limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Maximum bytes deliverable in a single link-layer write.
    pub max_write_size: usize,
    /// Interval between neighbor re-scans.
    #[serde(with = "duration_secs")]
    pub scan_interval: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self { max_write_size: 244, scan_interval: Duration::from_secs(5) }
    }
}

/// Store-and-forward mailbox limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum queued frames per recipient.
    pub max_per_recipient: usize,
    /// Maximum queued frames across all recipients.
    pub max_total: usize,
    /// Expiry for a queued frame.
    #[serde(with = "duration_secs")]
    pub expiry: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { max_per_recipient: 100, max_total: 10_000, expiry: Duration::from_secs(24 * 3600) }
    }
}

/// Structured logging output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber` env-filter directive, e.g. `"mesh_core=debug"`.
    pub filter: String,
    /// Emit JSON-formatted log lines instead of human-readable text.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: "info".to_string(), json: false }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
