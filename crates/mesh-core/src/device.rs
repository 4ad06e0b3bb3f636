//! Local device fingerprinting, used to anchor anti-abuse state to a
//! physical device rather than to a freely regenerable [`crate::identity::Fingerprint`].

use sha2::{Digest, Sha256};

/// SHA-256 fingerprint of this host's stable hardware identifiers.
pub type DeviceFingerprint = [u8; 32];

const DEVICE_FINGERPRINT_SALT: &[u8] = b"mesh-core/device-fingerprint/v1";

/// Stable, locally-observable identifiers describing the host device.
///
/// Collecting these is platform-specific (Android `ANDROID_ID`, an iOS
/// `IOKit` platform UUID, a Windows machine GUID, ...) and happens outside
/// this crate; the caller supplies whatever the host OS exposes, leaving a
/// field empty if it cannot be determined.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceIdentifiers {
    /// Platform-stable device identifier.
    pub device_id: String,
    /// Hardware model string.
    pub hardware_model: String,
    /// Hardware brand string.
    pub hardware_brand: String,
    /// Hardware board/revision string.
    pub hardware_board: String,
    /// OS build identifier.
    pub os_build: String,
    /// Display geometry, e.g. `"1170x2532@3x"`.
    pub display_geometry: String,
}

/// Derive this host's device fingerprint: a SHA-256 over the concatenation
/// of every identifier field plus a fixed salt.
///
/// Announced alongside a node's identity so a remote peer can anchor
/// anti-abuse state to the sending hardware rather than to the sender's
/// signing key, which costs nothing to regenerate.
#[must_use]
pub fn device_fingerprint(identifiers: &DeviceIdentifiers) -> DeviceFingerprint {
    let mut hasher = Sha256::new();
    hasher.update(identifiers.device_id.as_bytes());
    hasher.update(identifiers.hardware_model.as_bytes());
    hasher.update(identifiers.hardware_brand.as_bytes());
    hasher.update(identifiers.hardware_board.as_bytes());
    hasher.update(identifiers.os_build.as_bytes());
    hasher.update(identifiers.display_geometry.as_bytes());
    hasher.update(DEVICE_FINGERPRINT_SALT);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DeviceIdentifiers {
        DeviceIdentifiers {
            device_id: "abc123".into(),
            hardware_model: "Pixel 9".into(),
            hardware_brand: "Google".into(),
            hardware_board: "caiman".into(),
            os_build: "AP3A.241005.015".into(),
            display_geometry: "1080x2424@2.6".into(),
        }
    }

    #[test]
    fn identical_identifiers_produce_identical_fingerprint() {
        assert_eq!(device_fingerprint(&sample()), device_fingerprint(&sample()));
    }

    #[test]
    fn differing_identifiers_produce_different_fingerprints() {
        let mut other = sample();
        other.device_id = "xyz789".into();
        assert_ne!(device_fingerprint(&sample()), device_fingerprint(&other));
    }

    #[test]
    fn empty_identifiers_still_produce_a_stable_fingerprint() {
        let a = DeviceIdentifiers::default();
        let b = DeviceIdentifiers::default();
        assert_eq!(device_fingerprint(&a), device_fingerprint(&b));
    }
}
