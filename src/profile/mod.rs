//! # Implementation Profiles
//!
//! A profile records, per (kernel, host) pair, the implementations measured
//! fastest on the aligned and unaligned paths. Profiles are advisory: the
//! selector applies an entry only when the named implementation exists, the
//! host supports its tags and its alignment fits the path.
//!
//! ## Storage format
//!
//! ```json
//! {
//!   "version": 1,
//!   "entries": [
//!     { "kernel": "dot_prod_32fc", "host": "x86_64:GenuineIntel:...",
//!       "aligned": "a_avx_fma", "unaligned": "u_avx", "recorded_at": 1700000000 }
//!   ]
//! }
//! ```
//!
//! A file with another version is ignored whole. Malformed entries are
//! skipped individually. A missing file is an empty profile.

use crate::dispatch::MemoryPath;
use crate::error::{Result, VkernError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod benchmarks;
pub mod profiler;

pub use benchmarks::{BenchmarkResults, MicroBenchmark};
pub use profiler::{KernelProfile, Measurement, Profiler};

/// Current on-disk format version
pub const PROFILE_VERSION: u64 = 1;

/// Preferred implementations for one kernel on one host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileEntry {
    /// Kernel name
    pub kernel: String,
    /// Host identity the measurement was taken on
    pub host: String,
    /// Fastest implementation on the aligned path
    pub aligned: String,
    /// Fastest implementation on the unaligned path
    pub unaligned: String,
    /// Seconds since the Unix epoch
    #[serde(default)]
    pub recorded_at: u64,
}

impl ProfileEntry {
    /// Create an entry stamped with the current time
    pub fn new(
        kernel: impl Into<String>,
        host: impl Into<String>,
        aligned: impl Into<String>,
        unaligned: impl Into<String>,
    ) -> Self {
        let recorded_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            kernel: kernel.into(),
            host: host.into(),
            aligned: aligned.into(),
            unaligned: unaligned.into(),
            recorded_at,
        }
    }

    /// Implementation name recorded for `path`
    pub fn preferred(&self, path: MemoryPath) -> &str {
        match path {
            MemoryPath::Aligned => &self.aligned,
            MemoryPath::Unaligned => &self.unaligned,
        }
    }

    fn is_well_formed(&self) -> bool {
        !self.kernel.is_empty()
            && !self.host.is_empty()
            && !self.aligned.is_empty()
            && !self.unaligned.is_empty()
    }
}

#[derive(Serialize)]
struct ProfileDocument<'a> {
    version: u64,
    entries: Vec<&'a ProfileEntry>,
}

/// Keyed store of profile entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    entries: BTreeMap<(String, String), ProfileEntry>,
}

impl Profile {
    /// Empty profile
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries are recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ordered by kernel, then host
    pub fn entries(&self) -> impl Iterator<Item = &ProfileEntry> {
        self.entries.values()
    }

    /// Insert an entry, replacing any previous entry for the same kernel and
    /// host
    pub fn insert(&mut self, entry: ProfileEntry) -> Option<ProfileEntry> {
        let key = (entry.kernel.clone(), entry.host.clone());
        self.entries.insert(key, entry)
    }

    /// Merge `other` into `self`; entries from `other` win
    pub fn merge(&mut self, other: Profile) {
        for entry in other.entries.into_values() {
            self.insert(entry);
        }
    }

    /// Entry for a kernel on a host
    pub fn lookup(&self, kernel: &str, host: &str) -> Option<&ProfileEntry> {
        self.entries.get(&(kernel.to_string(), host.to_string()))
    }

    /// Preferred implementation name for a kernel, host and path
    pub fn preferred(&self, kernel: &str, host: &str, path: MemoryPath) -> Option<&str> {
        self.lookup(kernel, host).map(|entry| entry.preferred(path))
    }

    /// Parse a profile document.
    ///
    /// Fails only when the text is not JSON or not an object. Unknown
    /// versions and malformed entries are dropped with a warning.
    pub fn from_json(text: &str) -> Result<Self> {
        let document: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| VkernError::profile(format!("profile is not valid JSON: {}", e)))?;
        let object = document
            .as_object()
            .ok_or_else(|| VkernError::profile("profile root is not an object"))?;

        let mut profile = Profile::new();

        let version = object.get("version").and_then(|v| v.as_u64());
        if version != Some(PROFILE_VERSION) {
            log::warn!(
                "Ignoring profile with unsupported version {:?} (expected {})",
                version,
                PROFILE_VERSION
            );
            return Ok(profile);
        }

        let entries = match object.get("entries").and_then(|v| v.as_array()) {
            Some(entries) => entries,
            None => {
                log::warn!("Profile has no entry list");
                return Ok(profile);
            }
        };

        for (index, value) in entries.iter().enumerate() {
            match serde_json::from_value::<ProfileEntry>(value.clone()) {
                Ok(entry) if entry.is_well_formed() => {
                    profile.insert(entry);
                }
                Ok(_) => log::warn!("Skipping profile entry {}: empty field", index),
                Err(e) => log::warn!("Skipping malformed profile entry {}: {}", index, e),
            }
        }

        Ok(profile)
    }

    /// Serialize to the versioned JSON document
    pub fn to_json(&self) -> Result<String> {
        let document = ProfileDocument {
            version: PROFILE_VERSION,
            entries: self.entries.values().collect(),
        };
        serde_json::to_string_pretty(&document)
            .map_err(|e| VkernError::profile(format!("failed to serialize profile: {}", e)))
    }

    /// Read a profile file. A missing file is an empty profile.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_json(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Read a profile file, treating every failure as an empty profile
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(profile) => {
                log::debug!("Loaded {} profile entries from {}", profile.len(), path.display());
                profile
            }
            Err(e) => {
                log::warn!("Ignoring profile {}: {}", path.display(), e);
                Self::new()
            }
        }
    }

    /// Write the profile, creating parent directories.
    ///
    /// The document is written to a sibling temporary file and renamed into
    /// place so readers never observe a partial file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let text = self.to_json()?;
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Per-user default location, `$HOME/.vkern/profile.json`
    pub fn default_path() -> Option<PathBuf> {
        std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .filter(|home| !home.is_empty())
            .map(|home| PathBuf::from(home).join(".vkern").join("profile.json"))
    }
}
