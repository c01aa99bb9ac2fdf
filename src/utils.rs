//! Helpers for SSID decoding and signal strength handling.

use log::warn;
use std::str;

/// Decodes SSID bytes into a display-safe string.
///
/// SSIDs are raw bytes with no guaranteed encoding. Valid UTF-8 is passed
/// through; anything else is decoded lossily so the UI always has something
/// printable. An empty SSID (hidden network) decodes to an empty string.
pub(crate) fn ssid_display(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return String::new();
    }
    match str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(e) => {
            warn!("Invalid UTF-8 in SSID, decoding lossily: {e}");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Clamps a raw strength reading to the 0-100 range NetworkManager promises.
pub(crate) fn clamp_strength(strength: u8) -> u8 {
    strength.min(100)
}
