//! NetworkManager connection settings construction.
//!
//! Builds the nested settings dictionaries required by NetworkManager's
//! `AddAndActivateConnection` method, and validates credentials before any
//! daemon call is made.
//!
//! # NetworkManager Settings Structure
//!
//! A connection is represented as a nested dictionary:
//! - `connection`: General settings (type, id, uuid, autoconnect)
//! - `802-11-wireless`: Wi-Fi settings (ssid, mode, security reference)
//! - `802-11-wireless-security`: Security settings (key-mgmt, psk or WEP key)
//! - `ipv4` / `ipv6`: IP configuration ("auto" for DHCP)

use std::collections::HashMap;
use zvariant::Value;

use crate::constants::wep_key_type;
use crate::models::{AccessPoint, SecurityType, WifiError};
use crate::Result;

/// Valid WEP secret lengths: 5/13 are ASCII passphrase forms, 10/26 are
/// hex-key forms. Only length is checked, not character content; the
/// daemon applies its own stricter validation if any.
const WEP_KEY_LENGTHS: [usize; 2] = [10, 26];
const WEP_PASSPHRASE_LENGTHS: [usize; 2] = [5, 13];

/// Minimum WPA pre-shared key length.
const WPA_PSK_MIN: usize = 8;

/// Validates a pre-shared key against the target's security class.
///
/// Runs before any daemon call so a malformed key costs no round trip.
/// Open networks accept the absence of a key and ignore any supplied one.
pub(crate) fn validate_credentials(security: SecurityType, psk: Option<&str>) -> Result<()> {
    match (security, psk) {
        (SecurityType::Open, _) => Ok(()),
        (SecurityType::Wep, Some(key)) if is_valid_wep_length(key.len()) => Ok(()),
        (SecurityType::Wpa, Some(key)) if key.len() >= WPA_PSK_MIN => Ok(()),
        _ => Err(WifiError::InvalidCredentialFormat),
    }
}

fn is_valid_wep_length(len: usize) -> bool {
    WEP_KEY_LENGTHS.contains(&len) || WEP_PASSPHRASE_LENGTHS.contains(&len)
}

/// Builds the `connection` section with type, id, uuid, and autoconnect.
fn base_connection_section(ap: &AccessPoint) -> HashMap<&'static str, Value<'static>> {
    let mut s = HashMap::new();
    s.insert("type", Value::from("802-11-wireless"));
    s.insert("id", Value::from(ap.ssid_text.clone()));
    s.insert("uuid", Value::from(uuid::Uuid::new_v4().to_string()));
    s.insert("autoconnect", Value::from(true));
    s
}

/// Builds the `802-11-wireless` section with SSID bytes and mode.
fn base_wifi_section(ap: &AccessPoint) -> HashMap<&'static str, Value<'static>> {
    let mut s = HashMap::new();
    s.insert("ssid", Value::from(ap.ssid.clone()));
    s.insert("mode", Value::from("infrastructure"));
    s.insert("hidden", Value::from(false));
    s
}

/// Builds the `802-11-wireless-security` section for a WEP network.
///
/// The key slot and type follow the length-based inference the launcher
/// has always used: 10/26 characters are stored as a hex key, 5/13 as a
/// passphrase.
fn build_wep_security(key: &str) -> HashMap<&'static str, Value<'static>> {
    let mut sec = HashMap::new();
    sec.insert("key-mgmt", Value::from("none"));
    sec.insert("auth-alg", Value::from("open"));
    sec.insert("wep-key0", Value::from(key.to_string()));

    let key_type = if WEP_KEY_LENGTHS.contains(&key.len()) {
        wep_key_type::KEY
    } else {
        wep_key_type::PASSPHRASE
    };
    sec.insert("wep-key-type", Value::from(key_type));

    sec
}

/// Builds the `802-11-wireless-security` section for a WPA-PSK network.
fn build_psk_security(psk: &str) -> HashMap<&'static str, Value<'static>> {
    let mut sec = HashMap::new();
    sec.insert("key-mgmt", Value::from("wpa-psk"));
    sec.insert("auth-alg", Value::from("open"));
    sec.insert("psk", Value::from(psk.to_string()));
    sec
}

/// Builds a complete connection settings dictionary for a new profile.
///
/// The caller must have validated credentials first; this function assumes
/// a key of acceptable length when the target is secured. The returned
/// dictionary can be passed directly to `AddAndActivateConnection`.
pub(crate) fn build_connection_settings(
    ap: &AccessPoint,
    psk: Option<&str>,
) -> HashMap<&'static str, HashMap<&'static str, Value<'static>>> {
    let mut conn: HashMap<&'static str, HashMap<&'static str, Value<'static>>> = HashMap::new();

    conn.insert("connection", base_connection_section(ap));
    conn.insert("802-11-wireless", base_wifi_section(ap));

    let mut ipv4 = HashMap::new();
    ipv4.insert("method", Value::from("auto"));
    conn.insert("ipv4", ipv4);

    let mut ipv6 = HashMap::new();
    ipv6.insert("method", Value::from("auto"));
    conn.insert("ipv6", ipv6);

    let security = match (ap.security, psk) {
        (SecurityType::Open, _) | (_, None) => None,
        (SecurityType::Wep, Some(key)) => Some(build_wep_security(key)),
        (SecurityType::Wpa, Some(key)) => Some(build_psk_security(key)),
    };

    if let Some(sec) = security {
        if let Some(w) = conn.get_mut("802-11-wireless") {
            w.insert("security", Value::from("802-11-wireless-security"));
        }
        conn.insert("802-11-wireless-security", sec);
    }

    conn
}
