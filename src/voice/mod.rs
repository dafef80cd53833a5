//! Content-addressed cache of pre-rendered speech.
//!
//! Layout under the data directory:
//!
//! ```text
//! voice-cache/<hash>.wav
//! voice-cache.json        hash -> entry
//! ```
//!
//! The hash is the first 8 bytes of SHA-256 over the exact input text, as 16
//! lowercase hex characters.

use chrono::{Local, SecondsFormat};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Result;
use crate::infra::fs::{read_json_lenient, remove_if_exists, write_atomic, write_json_atomic};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceEntry {
    pub text: String,
    pub voice: String,
    pub hash: String,
    pub size_bytes: u64,
    pub created_at: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VoiceStats {
    pub count: usize,
    pub total_bytes: u64,
}

type Index = BTreeMap<String, VoiceEntry>;

pub struct VoiceCache {
    dir: PathBuf,
    index_path: PathBuf,
    write_lock: Mutex<()>,
}

/// Truncated SHA-256 of `text`.
pub fn text_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    hex::encode(&digest[..8])
}

/// True for strings shaped like a cache hash.
pub fn is_valid_hash(s: &str) -> bool {
    s.len() == 16 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

impl VoiceCache {
    /// Open the cache rooted at `data_dir`. Nothing is created until the
    /// first `add`.
    pub fn open(data_dir: &Path) -> Self {
        Self {
            dir: data_dir.join("voice-cache"),
            index_path: data_dir.join("voice-cache.json"),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cached WAV for `text`, only if the index has it and the file exists.
    pub fn lookup(&self, text: &str) -> Option<PathBuf> {
        self.lookup_hash(&text_hash(text))
    }

    pub fn lookup_hash(&self, hash: &str) -> Option<PathBuf> {
        let entry = self.load().remove(hash)?;
        entry.path.is_file().then_some(entry.path)
    }

    /// Store a rendered WAV for `text`.
    pub fn add(&self, text: &str, voice: &str, wav: &[u8]) -> Result<VoiceEntry> {
        let _guard = self.write_lock.lock();
        let hash = text_hash(text);
        let path = self.dir.join(format!("{hash}.wav"));
        write_atomic(&path, wav)?;

        let entry = VoiceEntry {
            text: text.to_string(),
            voice: voice.to_string(),
            hash: hash.clone(),
            size_bytes: wav.len() as u64,
            created_at: Local::now().to_rfc3339_opts(SecondsFormat::Secs, false),
            path,
        };
        let mut index = self.load();
        index.insert(hash, entry.clone());
        write_json_atomic(&self.index_path, &index)?;
        debug!(hash = %entry.hash, bytes = entry.size_bytes, "voice cached");
        Ok(entry)
    }

    /// Remove one entry. `false` when the hash is unknown.
    pub fn remove(&self, hash: &str) -> Result<bool> {
        let _guard = self.write_lock.lock();
        let mut index = self.load();
        let Some(entry) = index.remove(hash) else {
            return Ok(false);
        };
        remove_if_exists(&entry.path)?;
        write_json_atomic(&self.index_path, &index)?;
        Ok(true)
    }

    /// Remove every entry and WAV. Returns how many index entries existed.
    pub fn clear(&self) -> Result<usize> {
        let _guard = self.write_lock.lock();
        let index = self.load();
        for entry in index.values() {
            remove_if_exists(&entry.path)?;
        }
        if self.dir.is_dir() {
            for file in std::fs::read_dir(&self.dir)?.flatten() {
                if file.path().extension().is_some_and(|e| e == "wav") {
                    remove_if_exists(&file.path())?;
                }
            }
        }
        write_json_atomic(&self.index_path, &Index::new())?;
        Ok(index.len())
    }

    /// Every entry, newest first.
    pub fn entries(&self) -> Vec<VoiceEntry> {
        let mut entries: Vec<VoiceEntry> = self.load().into_values().collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.hash.cmp(&b.hash)));
        entries
    }

    pub fn stats(&self) -> VoiceStats {
        let index = self.load();
        VoiceStats {
            count: index.len(),
            total_bytes: index.values().map(|e| e.size_bytes).sum(),
        }
    }

    fn load(&self) -> Index {
        read_json_lenient(&self.index_path).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn hash_is_sixteen_hex_chars() {
        let h = text_hash("Boss done");
        assert_eq!(h.len(), 16);
        assert!(is_valid_hash(&h));
        assert_eq!(h, text_hash("Boss done"));
        assert_ne!(h, text_hash("Boss done "));
        assert!(!is_valid_hash("../../etc/passwd"));
        assert!(!is_valid_hash("ABCDEF0123456789"));
    }

    #[test]
    fn add_lookup_remove() {
        let dir = TempDir::new().unwrap();
        let cache = VoiceCache::open(dir.path());
        assert_eq!(cache.lookup("Boss done"), None);

        let entry = cache.add("Boss done", "alloy", b"RIFF....").unwrap();
        let path = cache.lookup("Boss done").unwrap();
        assert_eq!(path, entry.path);
        assert!(path.is_file());
        assert_eq!(
            cache.stats(),
            VoiceStats {
                count: 1,
                total_bytes: 8
            }
        );

        assert!(cache.remove(&entry.hash).unwrap());
        assert!(!cache.remove(&entry.hash).unwrap());
        assert_eq!(cache.lookup("Boss done"), None);
    }

    #[test]
    fn lookup_requires_the_wav_on_disk() {
        let dir = TempDir::new().unwrap();
        let cache = VoiceCache::open(dir.path());
        let entry = cache.add("hello", "", b"data").unwrap();
        std::fs::remove_file(&entry.path).unwrap();
        assert_eq!(cache.lookup("hello"), None);
    }

    #[test]
    fn clear_empties_index_and_directory() {
        let dir = TempDir::new().unwrap();
        let cache = VoiceCache::open(dir.path());
        cache.add("one", "", b"1").unwrap();
        cache.add("two", "", b"22").unwrap();
        assert_eq!(cache.entries().len(), 2);

        assert_eq!(cache.clear().unwrap(), 2);
        assert!(cache.entries().is_empty());
        assert_eq!(std::fs::read_dir(cache.dir()).unwrap().count(), 0);
    }

    #[test]
    fn corrupt_index_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("voice-cache.json"), "[oops").unwrap();
        let cache = VoiceCache::open(dir.path());
        assert_eq!(cache.stats().count, 0);
        cache.add("fresh", "", b"x").unwrap();
        assert_eq!(cache.stats().count, 1);
    }
}
