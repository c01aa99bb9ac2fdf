//! Saved connection profiles and activation plumbing.
//!
//! Connection attempts reuse a saved profile when one matches the target
//! network (same SSID, compatible security class), and create a new one
//! otherwise. This module also knows how to tear down the activating
//! connection, which includes deleting its daemon-side profile so a
//! wrong key is not silently retried on every scan.

use std::collections::HashMap;

use log::{debug, info, warn};
use zbus::Connection;
use zvariant::{OwnedObjectPath, Value};

use crate::builders::build_connection_settings;
use crate::models::{AccessPoint, SecurityType};
use crate::proxies::{
    NMActiveConnectionProxy, NMDeviceProxy, NMProxy, NMSettingsConnectionProxy,
};
use crate::Result;

/// The daemon uses "/" as a null object path.
const NULL_PATH: &str = "/";

/// The subset of a saved profile's settings needed for matching.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SavedProfile {
    pub path: String,
    pub ssid: Vec<u8>,
    /// `key-mgmt` from the security section; `None` when the profile has
    /// no security section at all (an open network).
    pub key_mgmt: Option<String>,
    pub uuid: String,
}

/// Reads one saved profile's settings. Secrets are not included and are
/// not needed for matching.
pub(crate) async fn load_saved_profile(
    conn: &Connection,
    path: &OwnedObjectPath,
) -> Result<SavedProfile> {
    let proxy = NMSettingsConnectionProxy::builder(conn)
        .path(path.clone())?
        .build()
        .await?;
    let msg = proxy.inner().call_method("GetSettings", &()).await?;
    let body = msg.body();
    let settings: HashMap<String, HashMap<String, Value<'_>>> = body.deserialize()?;

    let ssid = settings
        .get("802-11-wireless")
        .and_then(|s| s.get("ssid"))
        .and_then(value_as_bytes)
        .unwrap_or_default();

    let key_mgmt = settings
        .get("802-11-wireless-security")
        .and_then(|s| s.get("key-mgmt"))
        .and_then(value_as_string);

    let uuid = settings
        .get("connection")
        .and_then(|s| s.get("uuid"))
        .and_then(value_as_string)
        .unwrap_or_default();

    Ok(SavedProfile {
        path: path.to_string(),
        ssid,
        key_mgmt,
        uuid,
    })
}

fn value_as_string(v: &Value<'_>) -> Option<String> {
    match v {
        Value::Str(s) => Some(s.to_string()),
        _ => None,
    }
}

fn value_as_bytes(v: &Value<'_>) -> Option<Vec<u8>> {
    match v {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|item| u8::try_from(item).ok())
                .collect(),
        ),
        _ => None,
    }
}

/// Classifies a profile's security from its `key-mgmt` setting, mirroring
/// how access points are classified from their capability flags.
fn profile_security(key_mgmt: Option<&str>) -> SecurityType {
    match key_mgmt {
        None => SecurityType::Open,
        Some("none") => SecurityType::Wep,
        Some(_) => SecurityType::Wpa,
    }
}

/// True when a saved profile can be activated against the given network.
pub(crate) fn profile_matches_ap(
    profile: &SavedProfile,
    ssid: &[u8],
    security: SecurityType,
) -> bool {
    !profile.ssid.is_empty()
        && profile.ssid == ssid
        && profile_security(profile.key_mgmt.as_deref()) == security
}

/// Loads every saved profile the device could activate. Profiles that
/// fail to load are skipped.
pub(crate) async fn load_available_profiles(
    conn: &Connection,
    device: &NMDeviceProxy<'_>,
) -> Result<Vec<SavedProfile>> {
    let mut profiles = Vec::new();
    for path in device.available_connections().await? {
        match load_saved_profile(conn, &path).await {
            Ok(profile) => profiles.push(profile),
            Err(e) => warn!("skipping saved profile {path}: {e}"),
        }
    }
    Ok(profiles)
}

/// How a connection attempt should be issued to the daemon.
#[derive(Debug)]
pub(crate) enum ActivationPlan {
    /// Activate the saved profile at this settings path.
    Reuse(String),
    /// No saved profile fits: create one from these settings and activate
    /// it in a single call.
    Create(HashMap<&'static str, HashMap<&'static str, Value<'static>>>),
}

/// Decides between reusing a saved profile and creating a new one.
/// The first profile matching the target network wins; otherwise the
/// settings for a fresh profile are built from the network and key.
pub(crate) fn plan_activation(
    profiles: &[SavedProfile],
    ap: &AccessPoint,
    psk: Option<&str>,
) -> ActivationPlan {
    match profiles
        .iter()
        .find(|p| profile_matches_ap(p, &ap.ssid, ap.security))
    {
        Some(profile) => {
            debug!("matched saved profile {} ({})", profile.path, profile.uuid);
            ActivationPlan::Reuse(profile.path.clone())
        }
        None => ActivationPlan::Create(build_connection_settings(ap, psk)),
    }
}

/// Returns the specific-object path (the access point) of the device's
/// active connection, or `None` when nothing is active.
pub(crate) async fn active_ap_path(
    conn: &Connection,
    active: &OwnedObjectPath,
) -> Result<Option<OwnedObjectPath>> {
    if active.as_str() == NULL_PATH {
        return Ok(None);
    }
    let proxy = NMActiveConnectionProxy::builder(conn)
        .path(active.clone())?
        .build()
        .await?;
    let specific = proxy.specific_object().await?;
    if specific.as_str() == NULL_PATH {
        Ok(None)
    } else {
        Ok(Some(specific))
    }
}

/// Deletes the daemon profile behind the currently activating connection,
/// if that activation belongs to our device.
///
/// Used when an attempt is cancelled mid-flight (wrong key at the
/// authentication step): the daemon created a profile for the attempt and
/// would keep retrying it unless it is removed. A no-op when nothing is
/// activating.
pub(crate) async fn delete_activating_profile(
    conn: &Connection,
    nm: &NMProxy<'_>,
    device_path: &OwnedObjectPath,
    device: &NMDeviceProxy<'_>,
) -> Result<()> {
    let activating = nm.activating_connection().await?;
    if activating.as_str() == NULL_PATH {
        return Ok(());
    }

    let active = NMActiveConnectionProxy::builder(conn)
        .path(activating.clone())?
        .build()
        .await?;

    // Only touch activations running on our device.
    let devices = active.devices().await?;
    if !devices.iter().any(|d| d == device_path) {
        debug!("activating connection {activating} is not on our device");
        return Ok(());
    }

    let uuid = active.uuid().await?;
    for path in device.available_connections().await? {
        match load_saved_profile(conn, &path).await {
            Ok(profile) if profile.uuid == uuid => {
                info!("deleting cancelled connection profile {} ({uuid})", profile.path);
                let settings = NMSettingsConnectionProxy::builder(conn)
                    .path(path)?
                    .build()
                    .await?;
                settings.delete().await?;
                return Ok(());
            }
            Ok(_) => {}
            Err(e) => warn!("skipping saved profile {path}: {e}"),
        }
    }

    debug!("no saved profile found for activating connection {uuid}");
    Ok(())
}
