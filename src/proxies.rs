//! D-Bus proxy traits for NetworkManager interfaces.
//!
//! These traits define the NetworkManager D-Bus API surface used by this
//! crate. The `zbus::proxy` macro generates proxy implementations that
//! handle D-Bus communication automatically.
//!
//! # NetworkManager D-Bus Structure
//!
//! - `/org/freedesktop/NetworkManager` - Main NM object
//! - `/org/freedesktop/NetworkManager/Devices/*` - Device objects
//! - `/org/freedesktop/NetworkManager/AccessPoint/*` - Access point objects
//! - `/org/freedesktop/NetworkManager/ActiveConnection/*` - Active connections
//! - `/org/freedesktop/NetworkManager/Settings/*` - Saved connection profiles

use std::collections::HashMap;
use zbus::{Result, proxy};
use zvariant::OwnedObjectPath;

/// Proxy for the main NetworkManager interface.
///
/// Provides methods for listing devices, managing connections,
/// and controlling the wireless radio.
#[proxy(
    interface = "org.freedesktop.NetworkManager",
    default_service = "org.freedesktop.NetworkManager",
    default_path = "/org/freedesktop/NetworkManager"
)]
pub trait NM {
    /// Returns paths to all network devices.
    fn get_devices(&self) -> Result<Vec<OwnedObjectPath>>;

    /// Whether the wireless radio is globally enabled.
    #[zbus(property)]
    fn wireless_enabled(&self) -> Result<bool>;

    /// Enables or disables the wireless radio.
    #[zbus(property)]
    fn set_wireless_enabled(&self, value: bool) -> Result<()>;

    /// Path to the connection currently being activated ("/" if none).
    #[zbus(property)]
    fn activating_connection(&self) -> Result<OwnedObjectPath>;

    /// Path to the primary active connection ("/" if none).
    #[zbus(property)]
    fn primary_connection(&self) -> Result<OwnedObjectPath>;

    /// Creates a new connection profile and activates it in one step.
    ///
    /// Returns paths to both the new settings object and the active
    /// connection.
    fn add_and_activate_connection(
        &self,
        connection: HashMap<&str, HashMap<&str, zvariant::Value<'_>>>,
        device: OwnedObjectPath,
        specific_object: OwnedObjectPath,
    ) -> Result<(OwnedObjectPath, OwnedObjectPath)>;

    /// Activates an existing saved connection.
    fn activate_connection(
        &self,
        connection: OwnedObjectPath,
        device: OwnedObjectPath,
        specific_object: OwnedObjectPath,
    ) -> Result<OwnedObjectPath>;
}

/// Proxy for the NetworkManager device interface.
///
/// Provides access to device properties like interface name, type, and
/// state.
///
/// # Signals
///
/// The `StateChanged` signal is emitted whenever the device state changes.
/// Use `receive_device_state_changed()` to get a stream of state change
/// events.
#[proxy(
    interface = "org.freedesktop.NetworkManager.Device",
    default_service = "org.freedesktop.NetworkManager"
)]
pub trait NMDevice {
    /// The network interface name (e.g., "wlan0").
    #[zbus(property)]
    fn interface(&self) -> Result<String>;

    /// Device type as a numeric code (2 = Wi-Fi).
    #[zbus(property)]
    fn device_type(&self) -> Result<u32>;

    /// Current device state (100 = activated, 120 = failed).
    #[zbus(property)]
    fn state(&self) -> Result<u32>;

    /// Saved connection profiles that could be activated on this device.
    #[zbus(property)]
    fn available_connections(&self) -> Result<Vec<OwnedObjectPath>>;

    /// Deactivates whatever connection the device is using and prevents
    /// automatic reactivation.
    fn disconnect(&self) -> Result<()>;

    /// Signal emitted when device state changes.
    ///
    /// The method is named `device_state_changed` to avoid conflicts with
    /// the `state` property's change stream. Use
    /// `receive_device_state_changed()` to subscribe to this signal.
    ///
    /// Arguments:
    /// - `new_state`: The new device state code
    /// - `old_state`: The previous device state code
    /// - `reason`: The reason code for the state change
    #[zbus(signal, name = "StateChanged")]
    fn device_state_changed(&self, new_state: u32, old_state: u32, reason: u32);
}

/// Proxy for the wireless device interface.
///
/// Extends the base device interface with Wi-Fi specific functionality
/// like scanning and access point enumeration.
#[proxy(
    interface = "org.freedesktop.NetworkManager.Device.Wireless",
    default_service = "org.freedesktop.NetworkManager"
)]
pub trait NMWireless {
    /// Returns paths to all visible access points, including hidden ones.
    fn get_all_access_points(&self) -> Result<Vec<OwnedObjectPath>>;

    /// Requests a Wi-Fi scan. Options are usually empty.
    fn request_scan(&self, options: HashMap<String, zvariant::Value<'_>>) -> Result<()>;

    /// Path to the currently connected access point ("/" if none).
    #[zbus(property)]
    fn active_access_point(&self) -> Result<OwnedObjectPath>;

    /// Signal emitted when a new access point becomes visible.
    #[zbus(signal)]
    fn access_point_added(&self, path: OwnedObjectPath);

    /// Signal emitted when an access point is no longer visible.
    #[zbus(signal)]
    fn access_point_removed(&self, path: OwnedObjectPath);
}

/// Proxy for the access point interface.
///
/// Provides information about a visible Wi-Fi network including SSID,
/// signal strength, and security capabilities.
#[proxy(
    interface = "org.freedesktop.NetworkManager.AccessPoint",
    default_service = "org.freedesktop.NetworkManager"
)]
pub trait NMAccessPoint {
    /// SSID as raw bytes (may be empty for hidden networks, and is not
    /// guaranteed to be valid UTF-8).
    #[zbus(property)]
    fn ssid(&self) -> Result<Vec<u8>>;

    /// Signal strength as a percentage (0-100).
    #[zbus(property)]
    fn strength(&self) -> Result<u8>;

    /// BSSID (MAC address) of the access point.
    #[zbus(property)]
    fn hw_address(&self) -> Result<String>;

    /// General capability flags (bit 0 = privacy/WEP).
    #[zbus(property)]
    fn flags(&self) -> Result<u32>;

    /// WPA security flags.
    #[zbus(property)]
    fn wpa_flags(&self) -> Result<u32>;

    /// RSN/WPA2 security flags.
    #[zbus(property)]
    fn rsn_flags(&self) -> Result<u32>;

    /// 802.11 mode (1 = adhoc, 2 = infrastructure, 3 = AP).
    #[zbus(property)]
    fn mode(&self) -> Result<u32>;
}

/// Proxy for the active connection interface.
///
/// Used to resolve an in-progress or established activation back to the
/// access point and profile behind it.
#[proxy(
    interface = "org.freedesktop.NetworkManager.Connection.Active",
    default_service = "org.freedesktop.NetworkManager"
)]
pub trait NMActiveConnection {
    /// Path to the specific object (the access point, for Wi-Fi) used for
    /// this activation.
    #[zbus(property)]
    fn specific_object(&self) -> Result<OwnedObjectPath>;

    /// Connection UUID.
    #[zbus(property)]
    fn uuid(&self) -> Result<String>;

    /// Paths to the devices using this connection.
    #[zbus(property)]
    fn devices(&self) -> Result<Vec<OwnedObjectPath>>;
}

/// Proxy for a saved connection profile.
///
/// `GetSettings` is called through the raw proxy and deserialized into
/// borrowed values, so only the typed methods live here.
#[proxy(
    interface = "org.freedesktop.NetworkManager.Settings.Connection",
    default_service = "org.freedesktop.NetworkManager"
)]
pub trait NMSettingsConnection {
    /// Deletes the profile.
    fn delete(&self) -> Result<()>;
}
