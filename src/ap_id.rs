//! Access point identity hashing.
//!
//! Multiple daemon-level access point records can represent the same
//! logical network (several radios broadcasting one SSID). The identity
//! digest merges them: it covers the SSID bytes, the 802.11 mode, and a
//! coarse security classification, and deliberately ignores BSSID and
//! signal strength.

use sha3::{Digest, Sha3_256};

use crate::constants::{ApFlags, ApSecurityFlags, wifi_mode};
use crate::models::{ApId, SecurityType};

/// Length of the SSID prefix covered by the digest. 802.11 caps SSIDs at
/// 32 bytes; longer input is truncated.
const SSID_FIELD: usize = 32;

/// Computes the identity digest for one raw access point record.
///
/// The digest input is a zeroed 66-byte buffer: SSID bytes in `[0..32]`,
/// byte 32 ORed with one mode bit and one coarse-security bit, and bytes
/// `[0..32]` duplicated into `[33..65]`.
pub(crate) fn hash_ap(ssid: &[u8], mode: u32, flags: u32, wpa_flags: u32, rsn_flags: u32) -> ApId {
    let mut input = [0u8; 66];

    let len = ssid.len().min(SSID_FIELD);
    input[..len].copy_from_slice(&ssid[..len]);

    input[SSID_FIELD] |= match mode {
        wifi_mode::INFRA => 1 << 0,
        wifi_mode::ADHOC => 1 << 1,
        _ => 1 << 2,
    };
    input[SSID_FIELD] |= coarse_security_bit(flags, wpa_flags, rsn_flags);

    let (head, tail) = input.split_at_mut(SSID_FIELD + 1);
    tail[..SSID_FIELD].copy_from_slice(&head[..SSID_FIELD]);

    let digest = Sha3_256::digest(input);
    ApId(digest.into())
}

/// Maps capability flag words onto one of four coarse security buckets:
/// open, privacy-bit-only (WEP), WPA-capable without privacy, other.
fn coarse_security_bit(flags: u32, wpa_flags: u32, rsn_flags: u32) -> u8 {
    let privacy = ApFlags::from_bits_truncate(flags).contains(ApFlags::PRIVACY);
    let wpa = !ApSecurityFlags::from_bits_truncate(wpa_flags).is_empty();
    let rsn = !ApSecurityFlags::from_bits_truncate(rsn_flags).is_empty();

    if !privacy && !wpa && !rsn {
        1 << 3
    } else if privacy && !wpa && !rsn {
        1 << 4
    } else if !privacy && wpa && rsn {
        1 << 5
    } else {
        1 << 6
    }
}

/// Classifies an access point's security from its capability flag words.
pub(crate) fn security_type(flags: u32, wpa_flags: u32, rsn_flags: u32) -> SecurityType {
    let privacy = ApFlags::from_bits_truncate(flags).contains(ApFlags::PRIVACY);
    if wpa_flags != 0 || rsn_flags != 0 {
        SecurityType::Wpa
    } else if privacy {
        SecurityType::Wep
    } else {
        SecurityType::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::wifi_mode;

    const PSK: u32 = 0x0100;

    #[test]
    fn equal_identity_tuple_gives_equal_hash() {
        let a = hash_ap(b"HomeNet", wifi_mode::INFRA, 0x1, PSK, PSK);
        let b = hash_ap(b"HomeNet", wifi_mode::INFRA, 0x1, PSK, PSK);
        assert_eq!(a, b);
    }

    #[test]
    fn hash_ignores_strength_and_bssid_by_construction() {
        // The digest input has no BSSID or strength field at all; records
        // differing only in those collapse to one id.
        let a = hash_ap(b"Mesh", wifi_mode::INFRA, 0x1, PSK, PSK);
        let b = hash_ap(b"Mesh", wifi_mode::INFRA, 0x1, PSK, PSK);
        assert_eq!(a, b);
    }

    #[test]
    fn different_ssid_gives_different_hash() {
        let a = hash_ap(b"NetA", wifi_mode::INFRA, 0, 0, 0);
        let b = hash_ap(b"NetB", wifi_mode::INFRA, 0, 0, 0);
        assert_ne!(a, b);
    }

    #[test]
    fn different_mode_gives_different_hash() {
        let a = hash_ap(b"Net", wifi_mode::INFRA, 0, 0, 0);
        let b = hash_ap(b"Net", wifi_mode::ADHOC, 0, 0, 0);
        assert_ne!(a, b);
    }

    #[test]
    fn different_security_class_gives_different_hash() {
        let open = hash_ap(b"Net", wifi_mode::INFRA, 0, 0, 0);
        let wep = hash_ap(b"Net", wifi_mode::INFRA, 0x1, 0, 0);
        let wpa = hash_ap(b"Net", wifi_mode::INFRA, 0, PSK, PSK);
        assert_ne!(open, wep);
        assert_ne!(open, wpa);
        assert_ne!(wep, wpa);
    }

    #[test]
    fn hidden_ssid_hashes() {
        let a = hash_ap(b"", wifi_mode::INFRA, 0x1, 0, 0);
        let b = hash_ap(b"", wifi_mode::INFRA, 0x1, 0, 0);
        assert_eq!(a, b);
    }

    #[test]
    fn overlong_ssid_is_truncated() {
        let long = [b'x'; 40];
        let a = hash_ap(&long, wifi_mode::INFRA, 0, 0, 0);
        let b = hash_ap(&long[..32], wifi_mode::INFRA, 0, 0, 0);
        assert_eq!(a, b);
    }

    #[test]
    fn security_type_classification() {
        assert_eq!(security_type(0, 0, 0), SecurityType::Open);
        assert_eq!(security_type(0x1, 0, 0), SecurityType::Wep);
        assert_eq!(security_type(0x1, PSK, PSK), SecurityType::Wpa);
        assert_eq!(security_type(0, 0, PSK), SecurityType::Wpa);
    }
}
