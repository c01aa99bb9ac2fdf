//! Public data model: device states, access points, connection states,
//! events, and the error taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;

use crate::constants::device_state;

/// NetworkManager device states.
///
/// These values represent the lifecycle states of a network device as
/// reported by the NM D-Bus API. Codes not mapped to a specific variant
/// are preserved as `Other(u32)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceState {
    Unknown,
    Unmanaged,
    Unavailable,
    Disconnected,
    Prepare,
    Config,
    NeedAuth,
    IpConfig,
    IpCheck,
    Secondaries,
    Activated,
    Deactivating,
    Failed,
    Other(u32),
}

impl From<u32> for DeviceState {
    fn from(code: u32) -> Self {
        match code {
            device_state::UNKNOWN => Self::Unknown,
            device_state::UNMANAGED => Self::Unmanaged,
            device_state::UNAVAILABLE => Self::Unavailable,
            device_state::DISCONNECTED => Self::Disconnected,
            device_state::PREPARE => Self::Prepare,
            device_state::CONFIG => Self::Config,
            device_state::NEED_AUTH => Self::NeedAuth,
            device_state::IP_CONFIG => Self::IpConfig,
            device_state::IP_CHECK => Self::IpCheck,
            device_state::SECONDARIES => Self::Secondaries,
            device_state::ACTIVATED => Self::Activated,
            device_state::DEACTIVATING => Self::Deactivating,
            device_state::FAILED => Self::Failed,
            v => Self::Other(v),
        }
    }
}

impl DeviceState {
    /// True for the states a device passes through while activating.
    pub fn is_activating(self) -> bool {
        matches!(
            self,
            Self::Prepare
                | Self::Config
                | Self::NeedAuth
                | Self::IpConfig
                | Self::IpCheck
                | Self::Secondaries
        )
    }
}

impl Display for DeviceState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Unmanaged => write!(f, "unmanaged"),
            Self::Unavailable => write!(f, "unavailable"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Prepare => write!(f, "preparing"),
            Self::Config => write!(f, "configuring"),
            Self::NeedAuth => write!(f, "needs authentication"),
            Self::IpConfig => write!(f, "IP configuration"),
            Self::IpCheck => write!(f, "IP check"),
            Self::Secondaries => write!(f, "waiting for secondaries"),
            Self::Activated => write!(f, "activated"),
            Self::Deactivating => write!(f, "deactivating"),
            Self::Failed => write!(f, "failed"),
            Self::Other(v) => write!(f, "unknown state ({v})"),
        }
    }
}

/// NetworkManager device state reason codes.
///
/// These values come from the NM D-Bus API and indicate why a device
/// transitioned to its current state. Use `StateReason::from(code)` to
/// convert from the raw u32 values returned by NetworkManager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateReason {
    Unknown,
    None,
    UserDisconnected,
    DeviceDisconnected,
    SupplicantDisconnected,
    SupplicantConfigFailed,
    SupplicantFailed,
    SupplicantTimeout,
    DhcpStartFailed,
    DhcpError,
    DhcpFailed,
    FirmwareMissing,
    DeviceRemoved,
    Sleeping,
    ConnectionRemoved,
    UserRequested,
    SsidNotFound,
    Other(u32),
}

impl From<u32> for StateReason {
    fn from(code: u32) -> Self {
        match code {
            0 => Self::Unknown,
            1 => Self::None,
            2 => Self::UserDisconnected,
            3 => Self::DeviceDisconnected,
            7 => Self::SupplicantDisconnected,
            8 => Self::SupplicantConfigFailed,
            9 => Self::SupplicantFailed,
            10 => Self::SupplicantTimeout,
            15 => Self::DhcpStartFailed,
            16 => Self::DhcpError,
            17 => Self::DhcpFailed,
            52 => Self::FirmwareMissing,
            53 => Self::DeviceRemoved,
            54 => Self::Sleeping,
            55 => Self::ConnectionRemoved,
            56 => Self::UserRequested,
            70 => Self::SsidNotFound,
            v => Self::Other(v),
        }
    }
}

impl Display for StateReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::None => write!(f, "none"),
            Self::UserDisconnected => write!(f, "user disconnected"),
            Self::DeviceDisconnected => write!(f, "device disconnected"),
            Self::SupplicantDisconnected => write!(f, "supplicant disconnected"),
            Self::SupplicantConfigFailed => write!(f, "supplicant config failed"),
            Self::SupplicantFailed => write!(f, "supplicant failed"),
            Self::SupplicantTimeout => write!(f, "supplicant timeout"),
            Self::DhcpStartFailed => write!(f, "DHCP start failed"),
            Self::DhcpError => write!(f, "DHCP error"),
            Self::DhcpFailed => write!(f, "DHCP failed"),
            Self::FirmwareMissing => write!(f, "firmware missing"),
            Self::DeviceRemoved => write!(f, "device removed"),
            Self::Sleeping => write!(f, "sleeping"),
            Self::ConnectionRemoved => write!(f, "connection removed"),
            Self::UserRequested => write!(f, "user requested"),
            Self::SsidNotFound => write!(f, "SSID not found"),
            Self::Other(v) => write!(f, "unknown reason ({v})"),
        }
    }
}

/// Coarse security classification of an access point, derived from its
/// capability flag words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityType {
    /// No encryption.
    Open,
    /// Privacy bit set with empty WPA/RSN flag words.
    Wep,
    /// WPA or stronger (RSN/WPA2/WPA3).
    Wpa,
}

impl Display for SecurityType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Wep => write!(f, "WEP"),
            Self::Wpa => write!(f, "WPA"),
        }
    }
}

/// Identity digest of a logical wireless network.
///
/// Two daemon-level access point records carry the same `ApId` exactly when
/// their (SSID bytes, 802.11 mode, coarse security class) tuples are
/// identical, regardless of BSSID or signal strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApId(pub(crate) [u8; 32]);

impl ApId {
    /// Wraps a raw digest. Useful for persisting and restoring ids.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Display for ApId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// A deduplicated representation of one logical wireless network.
///
/// May aggregate several daemon-level access point records (multiple radios
/// broadcasting the same network); `strength` is the maximum across the
/// group and `paths` lists every aggregated record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessPoint {
    /// Identity digest; equal ids mean "the same logical network".
    pub id: ApId,
    /// Raw SSID bytes. Empty for hidden networks; not guaranteed UTF-8.
    pub ssid: Vec<u8>,
    /// Display-safe text form of the SSID (lossily decoded).
    pub ssid_text: String,
    /// BSSID of the strongest aggregated record.
    pub bssid: String,
    /// Signal strength percentage, 0-100.
    pub strength: u8,
    /// Coarse security classification.
    pub security: SecurityType,
    /// D-Bus object paths of the aggregated daemon records.
    pub paths: Vec<String>,
}

impl AccessPoint {
    /// True when the network does not broadcast an SSID.
    pub fn is_hidden(&self) -> bool {
        self.ssid.is_empty()
    }
}

/// The connection state machine's externally visible state.
#[derive(Debug, Clone, PartialEq)]
pub enum WifiState {
    Disconnected,
    Connecting(AccessPoint),
    Connected(AccessPoint),
    Disconnecting,
    Failed(WifiError),
}

impl Display for WifiState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting(ap) => write!(f, "connecting to {}", ap.ssid_text),
            Self::Connected(ap) => write!(f, "connected to {}", ap.ssid_text),
            Self::Disconnecting => write!(f, "disconnecting"),
            Self::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}

/// Notifications delivered to listeners on the UI-visible thread.
#[derive(Debug, Clone)]
pub enum WifiEvent {
    /// The wireless radio was enabled or disabled.
    EnabledChanged(bool),
    /// The device moved between operational states.
    DeviceStateChanged {
        new_state: DeviceState,
        old_state: DeviceState,
        reason: StateReason,
    },
    /// A logical network became visible.
    AccessPointAdded(AccessPoint),
    /// A logical network is no longer visible.
    AccessPointRemoved(AccessPoint),
    /// The device's connection changed: `Some` with the resolved access
    /// point when connected, `None` when disconnected or failed.
    ConnectionChanged(Option<AccessPoint>),
}

/// Errors that can occur during Wi-Fi operations.
///
/// Nothing here is fatal to the process: a failed attempt leaves the state
/// machine at `Disconnected`/`Failed` and the caller may retry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WifiError {
    /// No daemon connection or no wireless hardware. Checked before every
    /// operation; operations silently degrade to neutral values.
    #[error("wireless device or daemon unavailable")]
    DeviceUnavailable,

    /// A supplied key failed format validation (WEP length not in
    /// {5, 10, 13, 26}, or WPA key shorter than 8 bytes). Rejected before
    /// any daemon call is made.
    #[error("invalid credential format")]
    InvalidCredentialFormat,

    /// The target access point is no longer in the visible set (stale scan
    /// data relative to the requested target).
    #[error("no matching access point")]
    NoMatchingAccessPoint,

    /// The daemon returned an error for an activate, add-and-activate, or
    /// delete request.
    #[error("daemon rejected the request: {0}")]
    DaemonRejected(String),

    /// Activation succeeded per the daemon but the associated access point
    /// could not be resolved. Treated as a failure, since the UI cannot
    /// display an unresolved access point.
    #[error("activated connection resolved to no access point")]
    ResolutionFailure,

    /// A D-Bus transport error occurred.
    #[error("D-Bus error: {0}")]
    Dbus(String),

    /// The daemon thread could not be started.
    #[error("failed to start daemon thread: {0}")]
    Init(String),
}

impl From<zbus::Error> for WifiError {
    fn from(e: zbus::Error) -> Self {
        Self::Dbus(e.to_string())
    }
}
