//! Durable wakeup preferences.
//!
//! The store keeps an in-memory copy of the preference record behind a
//! mutex and writes it through to a JSON file on every set. Reads take a
//! consistent snapshot, so the scheduler never observes a half-applied
//! update while a client command is in flight. Sets validate and persist
//! before committing, so a failed write leaves both memory and disk on
//! the previous value.

use std::fs;
use std::io;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The preference record, one row per device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub wakeup_hour: u8,
    pub wakeup_minute: u8,
    pub utc_offset: i32,
    /// Minutes before wakeup time at which the countdown may begin.
    pub wakeup_window: u32,
    pub active_state: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            wakeup_hour: 16,
            wakeup_minute: 0,
            utc_offset: 2,
            wakeup_window: 5,
            active_state: false,
        }
    }
}

/// Addressable fields of [`Preferences`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum PrefField {
    WakeupHour,
    WakeupMinute,
    UtcOffset,
    WakeupWindow,
    ActiveState,
}

struct Inner {
    prefs: Preferences,
    path: Option<PathBuf>,
}

/// Shared handle to the preference store. Cloning is cheap; all clones
/// see the same record.
#[derive(Clone)]
pub struct PreferenceStore {
    inner: Arc<Mutex<Inner>>,
}

impl PreferenceStore {
    /// Open the store at `path`, creating it with defaults when absent.
    ///
    /// An existing but unreadable or unparsable file is an error; the
    /// daemon treats that as fatal at startup rather than silently
    /// re-provisioning.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let prefs = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let prefs = Preferences::default();
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent).map_err(Error::Store)?;
                }
                write_file(&path, &prefs)?;
                prefs
            }
            Err(e) => return Err(Error::Store(e)),
        };
        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                prefs,
                path: Some(path),
            })),
        })
    }

    /// A store with no backing file. Used by tests.
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                prefs: Preferences::default(),
                path: None,
            })),
        }
    }

    /// A consistent copy of the whole record.
    pub fn snapshot(&self) -> Preferences {
        self.inner.lock().prefs
    }

    pub fn get(&self, field: PrefField) -> i64 {
        let prefs = self.snapshot();
        match field {
            PrefField::WakeupHour => i64::from(prefs.wakeup_hour),
            PrefField::WakeupMinute => i64::from(prefs.wakeup_minute),
            PrefField::UtcOffset => i64::from(prefs.utc_offset),
            PrefField::WakeupWindow => i64::from(prefs.wakeup_window),
            PrefField::ActiveState => i64::from(prefs.active_state),
        }
    }

    /// Validate and apply a single-field update.
    ///
    /// The new value is persisted before it becomes visible to readers;
    /// on any failure the stored record is unchanged.
    pub fn set(&self, field: PrefField, value: i64) -> Result<()> {
        let mut inner = self.inner.lock();
        let mut next = inner.prefs;
        apply(&mut next, field, value)?;
        if let Some(path) = &inner.path {
            write_file(path, &next)?;
        }
        inner.prefs = next;
        Ok(())
    }
}

fn apply(prefs: &mut Preferences, field: PrefField, value: i64) -> Result<()> {
    match field {
        PrefField::WakeupHour => {
            prefs.wakeup_hour = checked(field, value, 0..=23)? as u8;
        }
        PrefField::WakeupMinute => {
            prefs.wakeup_minute = checked(field, value, 0..=59)? as u8;
        }
        PrefField::UtcOffset => {
            prefs.utc_offset = checked(field, value, -12..=14)? as i32;
        }
        PrefField::WakeupWindow => {
            prefs.wakeup_window = checked(field, value, 0..=i64::from(u32::MAX))? as u32;
        }
        PrefField::ActiveState => {
            prefs.active_state = checked(field, value, 0..=1)? != 0;
        }
    }
    Ok(())
}

fn checked(field: PrefField, value: i64, range: RangeInclusive<i64>) -> Result<i64> {
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(Error::InvalidValue { field, value })
    }
}

// Temp file plus rename, so a crash mid-write cannot leave a truncated
// record behind.
fn write_file(path: &Path, prefs: &Preferences) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(prefs)?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, &bytes).map_err(Error::Store)?;
    fs::rename(&tmp, path).map_err(Error::Store)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use test_case::test_case;

    use super::*;

    fn temp_path() -> PathBuf {
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("reveille-store-{}-{n}.json", std::process::id()))
    }

    #[test]
    fn set_then_get_round_trips() {
        let store = PreferenceStore::in_memory();
        store.set(PrefField::WakeupHour, 7).unwrap();
        store.set(PrefField::WakeupMinute, 30).unwrap();
        assert_eq!(store.get(PrefField::WakeupHour), 7);
        assert_eq!(store.get(PrefField::WakeupMinute), 30);
    }

    #[test_case(PrefField::WakeupHour, -1; "hour below range")]
    #[test_case(PrefField::WakeupHour, 24; "hour above range")]
    #[test_case(PrefField::WakeupMinute, 60; "minute above range")]
    #[test_case(PrefField::WakeupWindow, -5; "negative window")]
    #[test_case(PrefField::ActiveState, 2; "active beyond flag")]
    #[test_case(PrefField::UtcOffset, 30; "offset beyond fixed range")]
    fn rejects_out_of_range_values(field: PrefField, value: i64) {
        let store = PreferenceStore::in_memory();
        let before = store.snapshot();
        assert!(matches!(
            store.set(field, value),
            Err(Error::InvalidValue { .. })
        ));
        assert_eq!(store.snapshot(), before, "rejected set must not change state");
    }

    #[test]
    fn first_open_provisions_defaults() {
        let path = temp_path();
        let store = PreferenceStore::open(&path).unwrap();
        assert_eq!(store.snapshot(), Preferences::default());
        assert!(path.exists());
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn values_survive_reopen() {
        let path = temp_path();
        {
            let store = PreferenceStore::open(&path).unwrap();
            store.set(PrefField::WakeupHour, 6).unwrap();
            store.set(PrefField::ActiveState, 1).unwrap();
        }
        let store = PreferenceStore::open(&path).unwrap();
        assert_eq!(store.get(PrefField::WakeupHour), 6);
        assert_eq!(store.get(PrefField::ActiveState), 1);
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let path = temp_path();
        fs::write(&path, b"not json").unwrap();
        assert!(PreferenceStore::open(&path).is_err());
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn concurrent_sets_land_on_a_written_value() {
        let store = PreferenceStore::in_memory();
        let writers: Vec<_> = [10i64, 20]
            .into_iter()
            .map(|minute| {
                let store = store.clone();
                std::thread::spawn(move || store.set(PrefField::WakeupMinute, minute).unwrap())
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }
        let minute = store.get(PrefField::WakeupMinute);
        assert!(minute == 10 || minute == 20);
    }
}
