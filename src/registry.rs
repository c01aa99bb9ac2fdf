//! The deduplicated access point registry.
//!
//! The registry maintains the current set of visible logical networks.
//! Each entry merges every daemon-level access point record whose
//! (SSID, mode, coarse security class) identity matches, and reports the
//! maximum signal strength across the group.
//!
//! The registry is owned exclusively by the daemon context; everything it
//! hands out is a copy.

use std::collections::HashMap;

use crate::ap_id::{hash_ap, security_type};
use crate::models::{AccessPoint, ApId};
use crate::utils::{clamp_strength, ssid_display};

/// One raw access point record as read from the daemon, before merging.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ApRecord {
    pub path: String,
    pub ssid: Vec<u8>,
    pub bssid: String,
    pub strength: u8,
    pub mode: u32,
    pub flags: u32,
    pub wpa_flags: u32,
    pub rsn_flags: u32,
}

impl ApRecord {
    pub fn id(&self) -> ApId {
        hash_ap(
            &self.ssid,
            self.mode,
            self.flags,
            self.wpa_flags,
            self.rsn_flags,
        )
    }
}

/// A merged entry: the public access point plus per-record strengths, kept
/// so connection attempts can target the strongest physical radio.
#[derive(Debug, Clone)]
struct ApEntry {
    ap: AccessPoint,
    members: Vec<(String, u8)>,
}

/// Changes produced by one rebuild, expressed as logical networks.
#[derive(Debug, Default)]
pub(crate) struct RegistryDiff {
    pub added: Vec<AccessPoint>,
    pub removed: Vec<AccessPoint>,
}

impl RegistryDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// The current deduplicated view of visible networks.
#[derive(Debug, Default)]
pub(crate) struct ApRegistry {
    entries: HashMap<ApId, ApEntry>,
}

impl ApRegistry {
    /// Rebuilds the registry from a fresh snapshot of raw records.
    ///
    /// Records grouped by identity collapse into one entry with the
    /// maximum observed strength; entries absent from the snapshot are
    /// dropped (presence is scan-driven, not time-driven). Idempotent:
    /// rebuilding twice from the same snapshot yields an identical set
    /// and an empty diff the second time.
    pub fn rebuild(&mut self, records: &[ApRecord]) -> RegistryDiff {
        let mut next: HashMap<ApId, ApEntry> = HashMap::new();

        for record in records {
            let id = record.id();
            let strength = clamp_strength(record.strength);

            next.entry(id)
                .and_modify(|entry| {
                    entry.members.push((record.path.clone(), strength));
                    entry.ap.paths.push(record.path.clone());
                    if strength > entry.ap.strength {
                        entry.ap.strength = strength;
                        entry.ap.bssid = record.bssid.clone();
                    }
                })
                .or_insert_with(|| ApEntry {
                    ap: AccessPoint {
                        id,
                        ssid: record.ssid.clone(),
                        ssid_text: ssid_display(&record.ssid),
                        bssid: record.bssid.clone(),
                        strength,
                        security: security_type(
                            record.flags,
                            record.wpa_flags,
                            record.rsn_flags,
                        ),
                        paths: vec![record.path.clone()],
                    },
                    members: vec![(record.path.clone(), strength)],
                });
        }

        let mut diff = RegistryDiff::default();
        for (id, entry) in &next {
            if !self.entries.contains_key(id) {
                diff.added.push(entry.ap.clone());
            }
        }
        for (id, entry) in &self.entries {
            if !next.contains_key(id) {
                diff.removed.push(entry.ap.clone());
            }
        }

        self.entries = next;
        diff
    }

    /// Returns a copy of the current visible set.
    pub fn visible(&self) -> Vec<AccessPoint> {
        self.entries.values().map(|e| e.ap.clone()).collect()
    }

    /// Looks up the logical network aggregating the given daemon record
    /// path. Used to resolve active/activating connections, whose
    /// specific-object path names a single physical record.
    pub fn by_path(&self, path: &str) -> Option<AccessPoint> {
        self.entries
            .values()
            .find(|e| e.members.iter().any(|(p, _)| p == path))
            .map(|e| e.ap.clone())
    }

    /// Looks up a logical network by identity.
    pub fn by_id(&self, id: &ApId) -> Option<AccessPoint> {
        self.entries.get(id).map(|e| e.ap.clone())
    }

    /// Returns the daemon record path with the strongest signal among the
    /// network's aggregated records.
    pub fn strongest_path(&self, id: &ApId) -> Option<String> {
        self.entries.get(id).and_then(|e| {
            e.members
                .iter()
                .max_by_key(|(_, strength)| *strength)
                .map(|(path, _)| path.clone())
        })
    }
}
