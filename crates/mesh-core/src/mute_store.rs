//! Disk-backed, replicated persistence for anti-abuse mute records.
//!
//! A mute keyed only by in-memory state vanishes on restart; a mute keyed
//! only by a single file disappears if that one file is deleted (a
//! reinstall, a cleared app sandbox directory, a user finding and removing
//! it). Records here are written to several distinct storage keys so that
//! clearing any subset smaller than all of them leaves the mute in effect.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::device::DeviceFingerprint;

/// Number of distinct storage keys each mute record is replicated to.
const STORAGE_KEYS: [&str; 4] = ["mutes_primary.json", "mutes_shadow_a.json", "mutes_shadow_b.json", "mutes_shadow_c.json"];

/// Salt mixed into the storage key derived from a device fingerprint, kept
/// distinct from [`crate::device::device_fingerprint`]'s own salt so the two
/// hashes cannot be correlated from the on-disk files alone.
const STORAGE_KEY_SALT: &[u8] = b"mesh-core/mute-store/v1";

/// A persisted mute: when it expires and why it was applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MuteRecord {
    /// Unix epoch milliseconds after which the mute no longer applies.
    pub muted_until_ms: u64,
    /// Human-readable reason, as passed to the gate's violation path.
    pub reason: String,
}

/// Replicated on-disk store, rooted at a directory the host application
/// provisions (ideally outside any cache directory the OS may clear).
pub struct MuteStore {
    dir: PathBuf,
}

impl MuteStore {
    /// Open (creating if necessary) a mute store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if `dir` cannot be created.
    pub fn open(dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Persist a mute for `fingerprint`, replicated across every storage key.
    pub fn record(&self, fingerprint: &DeviceFingerprint, muted_until_ms: u64, reason: &str) {
        let key_id = storage_key_id(fingerprint);
        let record = MuteRecord { muted_until_ms, reason: reason.to_string() };
        for file_name in STORAGE_KEYS {
            let mut map = self.read_map(file_name);
            map.insert(key_id.clone(), record.clone());
            let _ = self.write_map(file_name, &map);
        }
    }

    /// Look up a mute record for `fingerprint`. Any single storage key that
    /// still carries the record is trusted, so deleting fewer than all four
    /// leaves the mute discoverable; when keys disagree (e.g. a later
    /// re-mute only reached some of them) the longest remaining mute wins.
    #[must_use]
    pub fn lookup(&self, fingerprint: &DeviceFingerprint) -> Option<MuteRecord> {
        let key_id = storage_key_id(fingerprint);
        STORAGE_KEYS
            .iter()
            .filter_map(|file_name| self.read_map(file_name).remove(&key_id))
            .max_by_key(|record| record.muted_until_ms)
    }

    fn read_map(&self, file_name: &str) -> HashMap<String, MuteRecord> {
        std::fs::read_to_string(self.dir.join(file_name))
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok())
            .unwrap_or_default()
    }

    fn write_map(&self, file_name: &str, map: &HashMap<String, MuteRecord>) -> std::io::Result<()> {
        let text = serde_json::to_string(map).unwrap_or_default();
        let tmp = self.dir.join(format!("{file_name}.tmp"));
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, self.dir.join(file_name))
    }
}

fn storage_key_id(fingerprint: &DeviceFingerprint) -> String {
    let mut hasher = Sha256::new();
    hasher.update(fingerprint);
    hasher.update(STORAGE_KEY_SALT);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_survives_reopening_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let fingerprint = [7u8; 32];

        {
            let store = MuteStore::open(dir.path()).unwrap();
            store.record(&fingerprint, 1_000_000, "spam-like content pattern");
        }

        let reopened = MuteStore::open(dir.path()).unwrap();
        let record = reopened.lookup(&fingerprint).expect("mute should survive a reopen");
        assert_eq!(record.muted_until_ms, 1_000_000);
        assert_eq!(record.reason, "spam-like content pattern");
    }

    #[test]
    fn clearing_one_storage_key_does_not_clear_the_mute() {
        let dir = tempfile::tempdir().unwrap();
        let fingerprint = [8u8; 32];
        let store = MuteStore::open(dir.path()).unwrap();
        store.record(&fingerprint, 2_000_000, "rapid-fire sending");

        std::fs::remove_file(dir.path().join(STORAGE_KEYS[0])).unwrap();

        assert!(store.lookup(&fingerprint).is_some());
    }

    #[test]
    fn unknown_fingerprint_has_no_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = MuteStore::open(dir.path()).unwrap();
        assert!(store.lookup(&[1u8; 32]).is_none());
    }

    #[test]
    fn uses_at_least_four_distinct_storage_keys() {
        let unique: std::collections::HashSet<_> = STORAGE_KEYS.iter().collect();
        assert!(unique.len() >= 4);
    }
}
