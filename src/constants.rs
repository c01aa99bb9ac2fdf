//! Constants for NetworkManager D-Bus interface values.
//!
//! These constants correspond to the numeric codes used by NetworkManager's
//! D-Bus API for device types, states, 802.11 modes, and security flags.

use bitflags::bitflags;

/// NetworkManager device type constants.
pub mod device_type {
    pub const WIFI: u32 = 2;
}

/// NetworkManager device state constants.
pub mod device_state {
    pub const UNKNOWN: u32 = 0;
    pub const UNMANAGED: u32 = 10;
    pub const UNAVAILABLE: u32 = 20;
    pub const DISCONNECTED: u32 = 30;
    pub const PREPARE: u32 = 40;
    pub const CONFIG: u32 = 50;
    pub const NEED_AUTH: u32 = 60;
    pub const IP_CONFIG: u32 = 70;
    pub const IP_CHECK: u32 = 80;
    pub const SECONDARIES: u32 = 90;
    pub const ACTIVATED: u32 = 100;
    pub const DEACTIVATING: u32 = 110;
    pub const FAILED: u32 = 120;
}

/// 802.11 operating mode constants.
pub mod wifi_mode {
    pub const ADHOC: u32 = 1;
    pub const INFRA: u32 = 2;
    pub const AP: u32 = 3;
}

bitflags! {
    /// General 802.11 access point capability flags (`Flags` property).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ApFlags: u32 {
        /// The access point requires authentication and encryption
        /// (usually WEP when the WPA/RSN flag words are empty).
        const PRIVACY = 0x1;
    }

    /// 802.11 security flags (`WpaFlags` / `RsnFlags` properties).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ApSecurityFlags: u32 {
        const PAIR_WEP40  = 0x0001;
        const PAIR_WEP104 = 0x0002;
        const PAIR_TKIP   = 0x0004;
        const PAIR_CCMP   = 0x0008;
        const GROUP_WEP40  = 0x0010;
        const GROUP_WEP104 = 0x0020;
        const GROUP_TKIP   = 0x0040;
        const GROUP_CCMP   = 0x0080;
        const KEY_MGMT_PSK = 0x0100;
        const KEY_MGMT_802_1X = 0x0200;
        const KEY_MGMT_SAE = 0x0400;
    }
}

/// Wired parts of the `802-11-wireless-security` settings vocabulary.
pub mod wep_key_type {
    /// Hexadecimal or raw key material (lengths 10 and 26).
    pub const KEY: u32 = 1;
    /// ASCII passphrase hashed into key material (lengths 5 and 13).
    pub const PASSPHRASE: u32 = 2;
}

/// Settle delays for daemon operations.
pub mod timeouts {
    use std::time::Duration;

    pub const DISCONNECT_SETTLE_MS: u64 = 300;

    pub fn disconnect_settle() -> Duration {
        Duration::from_millis(DISCONNECT_SETTLE_MS)
    }
}
