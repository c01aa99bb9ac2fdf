//! Wireless device discovery and raw access point snapshots.
//!
//! Everything here runs inside the daemon context. The functions are
//! thin: they walk the daemon's object tree and return plain data for the
//! registry and state machine to consume.

use log::{debug, warn};
use zbus::Connection;
use zvariant::OwnedObjectPath;

use crate::constants::device_type;
use crate::proxies::{NMAccessPointProxy, NMDeviceProxy, NMProxy, NMWirelessProxy};
use crate::registry::ApRecord;
use crate::Result;

/// Finds the first wireless device the daemon manages.
///
/// Returns `Ok(None)` when the daemon is reachable but no Wi-Fi hardware
/// exists; the caller then runs in degraded mode rather than failing.
pub(crate) async fn find_wireless_device(
    conn: &Connection,
    nm: &NMProxy<'_>,
) -> Result<Option<OwnedObjectPath>> {
    for path in nm.get_devices().await? {
        let device = NMDeviceProxy::builder(conn)
            .path(path.clone())?
            .build()
            .await?;
        match device.device_type().await {
            Ok(device_type::WIFI) => {
                let name = device.interface().await.unwrap_or_default();
                debug!("wireless device {name} at {path}");
                return Ok(Some(path));
            }
            Ok(_) => {}
            Err(e) => warn!("skipping device {path}: {e}"),
        }
    }
    Ok(None)
}

/// Reads every visible access point into raw records.
///
/// A record that errors mid-read (the point vanished between enumeration
/// and property access, common during scans) is skipped with a warning
/// rather than failing the whole snapshot.
pub(crate) async fn snapshot_access_points(
    conn: &Connection,
    wireless: &NMWirelessProxy<'_>,
) -> Result<Vec<ApRecord>> {
    let paths = wireless.get_all_access_points().await?;
    let mut records = Vec::with_capacity(paths.len());

    for path in paths {
        match read_access_point(conn, &path).await {
            Ok(record) => records.push(record),
            Err(e) => warn!("skipping access point {path}: {e}"),
        }
    }

    Ok(records)
}

async fn read_access_point(conn: &Connection, path: &OwnedObjectPath) -> Result<ApRecord> {
    let ap = NMAccessPointProxy::builder(conn)
        .path(path.clone())?
        .build()
        .await?;

    Ok(ApRecord {
        path: path.to_string(),
        ssid: ap.ssid().await?,
        bssid: ap.hw_address().await?,
        strength: ap.strength().await?,
        mode: ap.mode().await?,
        flags: ap.flags().await?,
        wpa_flags: ap.wpa_flags().await?,
        rsn_flags: ap.rsn_flags().await?,
    })
}

/// Reads one access point as a raw record, for resolving an active
/// connection's specific object when the registry has not seen it yet.
pub(crate) async fn read_single_record(
    conn: &Connection,
    path: &OwnedObjectPath,
) -> Result<ApRecord> {
    read_access_point(conn, path).await
}

/// Asks the device to rescan. Daemon-side rate limiting can reject the
/// request; that is reported, not fatal.
pub(crate) async fn request_scan(wireless: &NMWirelessProxy<'_>) -> Result<()> {
    wireless.request_scan(std::collections::HashMap::new()).await?;
    Ok(())
}
