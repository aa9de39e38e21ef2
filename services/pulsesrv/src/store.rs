//! Counter store
//!
//! Owns the five channel counters and the state file. All access to the
//! counters goes through [`CounterStore`]; it is shared by reference
//! (`Arc`) between the link reader, which is the only writer, and the
//! HTTP handlers, which only read.
//!
//! Mutations happen under a short write lock over the counter array.
//! Persistence runs outside that lock, serialized by its own mutex, so a
//! reader never waits on a disk write.
//!
//! The state file is a single line of comma-separated decimal integers,
//! one per channel. It is replaced atomically: the new content is written
//! to a sibling temporary file, synced, then renamed over the target.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::{PulseSrvError, Result};
use crate::telegram::CHANNEL_COUNT;

/// Counter values, index = channel number
pub type Counters = [u64; CHANNEL_COUNT];

/// Thread-safe owner of the channel counters and their state file
#[derive(Debug)]
pub struct CounterStore {
    path: PathBuf,
    values: RwLock<Counters>,
    /// Serializes writers of the state file
    persist_lock: Mutex<()>,
    /// Successful state file writes since construction
    saves: AtomicU64,
}

impl CounterStore {
    /// Create a store backed by `path` with all counters at zero.
    ///
    /// Nothing is read from disk until [`CounterStore::load`] is called.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            values: RwLock::new([0; CHANNEL_COUNT]),
            persist_lock: Mutex::new(()),
            saves: AtomicU64::new(0),
        }
    }

    /// State file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Restore counters from the state file.
    ///
    /// Returns `true` if the file existed and was valid. A missing or
    /// unreadable file leaves the counters at zero; the latter is logged.
    pub fn load(&self) -> bool {
        let _persist = self.persist_lock.lock();

        if !self.path.exists() {
            info!("no state recovered from {:?}; counters reset", self.path);
            return false;
        }

        match read_state_file(&self.path) {
            Ok(values) => {
                *self.values.write() = values;
                info!("counters initialized at {}", format_state(&values));
                true
            },
            Err(e) => {
                warn!(
                    "failed to load counter states from {:?}: {} (counters reset)",
                    self.path, e
                );
                *self.values.write() = [0; CHANNEL_COUNT];
                false
            },
        }
    }

    /// Add `pulses` to the counters, channel by channel.
    ///
    /// All five additions become visible to readers at once. When at least
    /// one pulse was counted the new values are persisted before returning;
    /// a failed write is logged and retried implicitly by the next
    /// non-empty increment.
    pub fn increment(&self, pulses: &Counters) {
        {
            let mut values = self.values.write();
            for (channel, (value, &count)) in values.iter_mut().zip(pulses.iter()).enumerate() {
                if count > 0 {
                    debug!("increment counter {} by {}", channel, count);
                }
                *value = value.saturating_add(count);
            }
        }

        if pulses.iter().any(|&count| count > 0) {
            if let Err(e) = self.save() {
                warn!("failed to save counter states: {}", e);
            }
        }
    }

    /// Consistent copy of all counters
    pub fn snapshot(&self) -> Counters {
        *self.values.read()
    }

    /// Value of a single channel, `None` if out of range
    pub fn get(&self, channel: usize) -> Option<u64> {
        self.values.read().get(channel).copied()
    }

    /// Write the current counters to the state file
    pub fn save(&self) -> Result<()> {
        let _persist = self.persist_lock.lock();
        let values = self.snapshot();

        write_state_file(&self.path, &values)?;
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Number of successful state file writes
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::Relaxed)
    }
}

/// Render counters in state file format: `1,2,3,4,5`
pub fn format_state(values: &Counters) -> String {
    values
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse the first line of a state file
pub fn parse_state(content: &str) -> Result<Counters> {
    let line = content.lines().next().unwrap_or("").trim();
    let fields: Vec<&str> = line.split(',').collect();

    if fields.len() != CHANNEL_COUNT {
        return Err(PulseSrvError::persistence(format!(
            "expected {} values, got {}: {:?}",
            CHANNEL_COUNT,
            fields.len(),
            line
        )));
    }

    let mut values = [0u64; CHANNEL_COUNT];
    for (value, field) in values.iter_mut().zip(fields) {
        *value = field.trim().parse::<u64>().map_err(|e| {
            PulseSrvError::persistence(format!("invalid counter value {:?}: {}", field, e))
        })?;
    }
    Ok(values)
}

fn read_state_file(path: &Path) -> Result<Counters> {
    let content = fs::read_to_string(path)
        .map_err(|e| PulseSrvError::persistence(format!("read {:?}: {}", path, e)))?;
    parse_state(&content)
}

fn write_state_file(path: &Path, values: &Counters) -> Result<()> {
    let tmp_path = temp_path(path);
    let write = || -> std::io::Result<()> {
        let mut file = File::create(&tmp_path)?;
        file.write_all(format_state(values).as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    };

    write().map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        PulseSrvError::persistence(format!("write {:?}: {}", path, e))
    })
}

/// `pulse_counter.state` -> `pulse_counter.state.tmp`
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}
