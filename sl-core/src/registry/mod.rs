//! Persistent sensor identity map
//!
//! Native sensor identifiers are long strings that are only stable for the
//! life of one process run. This registry assigns each one a compact 16-bit
//! id the first time it is seen and remembers the assignment across
//! restarts, so the wire protocol and the firmware compiled against the
//! exported header keep agreeing on who is who.
//!
//! Ids are allocated by a forward scan from a rolling cursor, skipping any
//! candidate whose high or low byte equals a frame marker (0xAA / 0x55,
//! see [`sl_protocol::is_reserved_id`]). 0x0000 is kept as an "unassigned"
//! sentinel.
//!
//! The map is stored as pretty JSON in the application config directory and
//! rewritten (atomically) after every structural mutation. Persistence
//! failures are logged and never fail the caller; the in-memory table stays
//! authoritative for the session.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::constants::registry::{FIRST_ID, LAST_ID};
use crate::error::{Result, SensorLinkError};
use crate::feed::{SensorKind, SensorReading};
use sl_protocol::is_reserved_id;

pub mod export;

/// One persisted registry record, keyed by the native sensor id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub id: u16,
    pub name: String,
    pub hardware: String,
    pub kind: SensorKind,
    pub unit: String,
    /// Unix seconds of the first observation
    #[serde(default)]
    pub first_seen: u64,
    /// Unix seconds of the most recent observation
    #[serde(default)]
    pub last_seen: u64,
}

#[derive(Debug, Default)]
struct RegistryInner {
    map: HashMap<String, RegistryEntry>,
    next_id: u16,
}

/// The persistent native-id → compact-id map.
///
/// All read-modify-write sequences go through one internal mutex, so
/// concurrent collector calls never race on id allocation. Owned by the
/// application's composition root and shared by reference.
pub struct SensorRegistry {
    inner: Mutex<RegistryInner>,
    path: PathBuf,
}

impl SensorRegistry {
    /// Open the registry backed by `path`, loading any persisted table.
    ///
    /// A missing file starts empty; an unreadable or unparsable file is
    /// logged and also starts empty (the map is a cache of assignments, not
    /// irreplaceable data). Entries that predate the reserved-byte scheme
    /// are reassigned here and the repaired table is written back.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut inner = RegistryInner::default();

        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<HashMap<String, RegistryEntry>>(&contents)
            {
                Ok(map) => {
                    inner.map = map;
                    info!("Loaded {} sensors from {:?}", inner.map.len(), path);
                }
                Err(e) => {
                    warn!("Sensor map {:?} is unreadable, starting fresh: {}", path, e);
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No sensor map at {:?}, starting fresh", path);
            }
            Err(e) => {
                warn!("Failed to read sensor map {:?}, starting fresh: {}", path, e);
            }
        }

        let repaired = repair_ids(&mut inner.map);
        inner.next_id = next_cursor(&inner.map);

        let registry = Self {
            inner: Mutex::new(inner),
            path,
        };
        if repaired {
            info!("Migrated sensor ids that collided with frame markers");
            registry.persist_or_log(&registry.inner.lock());
        }
        registry
    }

    /// Open the registry at the default platform location.
    pub fn open_default() -> Self {
        Self::open(crate::constants::paths::registry_path())
    }

    /// Return the compact id for `reading`, assigning and persisting a new
    /// one if this native id has never been seen.
    ///
    /// Refreshes `last_seen` on every call. Persistence failures do not fail
    /// the call; only id-space exhaustion does.
    pub fn get_or_assign(&self, reading: &SensorReading) -> Result<u16> {
        let now = now_secs();
        let mut inner = self.inner.lock();

        if let Some(entry) = inner.map.get_mut(&reading.native_id) {
            entry.last_seen = now;
            return Ok(entry.id);
        }

        let id = allocate_id(&mut inner)?;
        let unit = if reading.unit.is_empty() {
            reading.kind.default_unit().to_string()
        } else {
            reading.unit.clone()
        };
        inner.map.insert(
            reading.native_id.clone(),
            RegistryEntry {
                id,
                name: reading.name.clone(),
                hardware: reading.hardware.clone(),
                kind: reading.kind,
                unit,
                first_seen: now,
                last_seen: now,
            },
        );
        info!("New sensor: 0x{:04X} = {}", id, reading.name);
        self.persist_or_log(&inner);
        Ok(id)
    }

    /// Look up the compact id of a known native id, refreshing `last_seen`.
    pub fn lookup(&self, native_id: &str) -> Option<u16> {
        let now = now_secs();
        let mut inner = self.inner.lock();
        inner.map.get_mut(native_id).map(|entry| {
            entry.last_seen = now;
            entry.id
        })
    }

    /// Remove entries not seen for more than `max_age_days` days.
    /// Returns the number of entries removed.
    pub fn cleanup(&self, max_age_days: u64) -> usize {
        let cutoff = now_secs().saturating_sub(max_age_days * 86_400);
        let mut inner = self.inner.lock();
        let before = inner.map.len();
        inner.map.retain(|_, entry| entry.last_seen >= cutoff);
        let removed = before - inner.map.len();
        if removed > 0 {
            info!("Cleanup removed {} stale sensors", removed);
            self.persist_or_log(&inner);
        }
        removed
    }

    /// Clear all entries and restart id allocation from the lowest value.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.map.clear();
        inner.next_id = FIRST_ID;
        info!("Sensor map reset");
        self.persist_or_log(&inner);
    }

    /// Persist the current table, propagating any write error.
    /// Intended for shutdown, where the caller decides how loud to be.
    pub fn flush(&self) -> Result<()> {
        let inner = self.inner.lock();
        self.persist(&inner)
    }

    /// Number of mapped sensors.
    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().map.is_empty()
    }

    /// Snapshot of all entries, sorted by compact id.
    pub fn entries(&self) -> Vec<(String, RegistryEntry)> {
        let inner = self.inner.lock();
        let mut entries: Vec<(String, RegistryEntry)> = inner
            .map
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort_by(|a, b| a.1.id.cmp(&b.1.id));
        entries
    }

    /// Write the (optionally filtered) table as a C header for the firmware
    /// side. Fails if the filter selects nothing.
    pub fn export(&self, path: &Path, filter: Option<&HashSet<String>>) -> Result<usize> {
        let entries = self.filtered_entries(filter);
        if entries.is_empty() {
            return Err(SensorLinkError::ExportEmpty);
        }
        export::write_header(&entries, path)?;
        info!("Exported {} sensors to {:?}", entries.len(), path);
        Ok(entries.len())
    }

    /// Human-readable table of the (optionally filtered) map.
    pub fn preview(&self, filter: Option<&HashSet<String>>) -> String {
        export::preview(&self.filtered_entries(filter))
    }

    fn filtered_entries(&self, filter: Option<&HashSet<String>>) -> Vec<(String, RegistryEntry)> {
        let mut entries = self.entries();
        if let Some(selected) = filter {
            entries.retain(|(native_id, _)| selected.contains(native_id));
        }
        entries
    }

    fn persist(&self, inner: &RegistryInner) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| SensorLinkError::FileWrite {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let json = serde_json::to_string_pretty(&inner.map)?;

        // Write to a temp file then rename, so a crash mid-write never
        // leaves a truncated map behind.
        use std::io::Write;
        let temp_path = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&temp_path).map_err(|e| SensorLinkError::FileWrite {
            path: temp_path.clone(),
            source: e,
        })?;
        file.write_all(json.as_bytes())
            .map_err(|e| SensorLinkError::FileWrite {
                path: temp_path.clone(),
                source: e,
            })?;
        file.sync_all().map_err(|e| SensorLinkError::FileWrite {
            path: temp_path.clone(),
            source: e,
        })?;
        drop(file);

        fs::rename(&temp_path, &self.path).map_err(|e| SensorLinkError::FileWrite {
            path: self.path.clone(),
            source: e,
        })?;

        debug!("Saved {} sensors to {:?}", inner.map.len(), self.path);
        Ok(())
    }

    fn persist_or_log(&self, inner: &RegistryInner) {
        if let Err(e) = self.persist(inner) {
            warn!("Failed to persist sensor map (in-memory map still valid): {}", e);
        }
    }
}

/// Allocate the next free non-reserved id, scanning forward from the
/// rolling cursor and wrapping once before giving up.
fn allocate_id(inner: &mut RegistryInner) -> Result<u16> {
    let used: HashSet<u16> = inner.map.values().map(|e| e.id).collect();
    let span = (LAST_ID - FIRST_ID) as u32 + 1;

    let mut candidate = inner.next_id.max(FIRST_ID);
    for _ in 0..span {
        if !is_reserved_id(candidate) && !used.contains(&candidate) {
            inner.next_id = if candidate == LAST_ID { FIRST_ID } else { candidate + 1 };
            return Ok(candidate);
        }
        candidate = if candidate == LAST_ID { FIRST_ID } else { candidate + 1 };
    }
    Err(SensorLinkError::RegistryExhausted)
}

/// Reassign loaded entries whose id is reserved, out of range, or taken by
/// another entry (legacy single-byte maps and hand-edited files).
/// Returns true if anything changed.
fn repair_ids(map: &mut HashMap<String, RegistryEntry>) -> bool {
    let mut keys: Vec<String> = map.keys().cloned().collect();
    // deterministic repair order: keep the lowest-id claimant of a duplicate
    keys.sort_by(|a, b| (map[a].id, a).cmp(&(map[b].id, b)));

    // valid entries claim their ids first, so a reassignment can never
    // steal an id that another entry legitimately holds
    let mut used: HashSet<u16> = HashSet::new();
    let mut invalid: Vec<String> = Vec::new();
    for key in keys {
        let id = map[&key].id;
        if id >= FIRST_ID && !is_reserved_id(id) && used.insert(id) {
            continue;
        }
        invalid.push(key);
    }

    let mut changed = false;
    for key in invalid {
        let id = map[&key].id;
        match lowest_free_id(&used) {
            Some(new_id) => {
                warn!(
                    "Reassigning sensor {:?}: 0x{:04X} -> 0x{:04X}",
                    key, id, new_id
                );
                map.get_mut(&key).expect("key from map").id = new_id;
                used.insert(new_id);
                changed = true;
            }
            None => {
                warn!("No free id while repairing {:?}, dropping entry", key);
                map.remove(&key);
                changed = true;
            }
        }
    }
    changed
}

fn lowest_free_id(used: &HashSet<u16>) -> Option<u16> {
    (FIRST_ID..=LAST_ID).find(|&id| !is_reserved_id(id) && !used.contains(&id))
}

/// Cursor position after a load: one past the highest assigned id.
fn next_cursor(map: &HashMap<String, RegistryEntry>) -> u16 {
    match map.values().map(|e| e.id).max() {
        Some(LAST_ID) | None => FIRST_ID,
        Some(max) => max + 1,
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
