// Path: crates/numerics/src/dictionary.rs

//! The extension dictionary: a persisted allocator mapping out-of-vocabulary
//! words to symbol combinations.
//!
//! Combinations are strings of 1 to 3 glyphs over a 91-glyph Braille
//! alphabet (U+2801..=U+285B), giving 91 + 91² + 91³ = 761,943 slots. They
//! are enumerated by length, then lexicographically by glyph index. Every
//! single-glyph combination is reserved for the base vocabulary, so
//! allocations start at length two.
//!
//! Allocation advances a cursor over that enumeration and skips claimed
//! slots, so the cost is one set lookup per skipped slot rather than a scan
//! of the whole space. When a path is configured, every allocation is
//! persisted before it is returned.

use forge_types::config::DictionaryConfig;
use forge_types::error::DictionaryError;
use fs2::FileExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// First glyph of the extension alphabet.
pub const GLYPH_BASE: u32 = 0x2801;
/// Number of glyphs in the extension alphabet.
pub const ALPHABET_SIZE: u64 = 91;
/// Longest combination the alphabet supports.
pub const MAX_COMBO_LEN: usize = 3;

/// Core protocol words, assigned in order to single-glyph combinations.
pub const BASE_VOCABULARY: &[&str] = &[
    "true", "false", "null", "and", "or", "not", "is", "has", "of", "in", "to", "the", "a", "an",
    "if", "then", "else", "for", "each", "with", "from", "by", "as", "at", "on", "yes", "no",
    "none", "all", "any", "some", "agent", "user", "system", "fact", "vector", "matrix", "tensor",
    "log", "grammar", "schema", "explain", "task", "caps", "error", "train", "pair", "input",
    "output", "value", "key", "type", "name", "id", "time", "start", "end", "ok", "fail",
    "unknown",
];

const LOCK_RETRY_DELAY: Duration = Duration::from_millis(25);

/// A symbol combination: 1 to 3 glyph indices, each below [`ALPHABET_SIZE`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Combo(Vec<u8>);

impl Combo {
    /// Parses a glyph string.
    pub fn from_glyphs(glyphs: &str) -> Result<Self, DictionaryError> {
        let invalid = || DictionaryError::InvalidCombo(glyphs.to_string());
        let mut indices = Vec::with_capacity(MAX_COMBO_LEN);
        for c in glyphs.chars() {
            let index = u32::from(c)
                .checked_sub(GLYPH_BASE)
                .filter(|i| u64::from(*i) < ALPHABET_SIZE)
                .ok_or_else(invalid)?;
            indices.push(u8::try_from(index).map_err(|_| invalid())?);
        }
        if indices.is_empty() || indices.len() > MAX_COMBO_LEN {
            return Err(invalid());
        }
        Ok(Self(indices))
    }

    /// The combination at `index` in the enumeration order, if within `max_len`.
    pub fn from_index(index: u64, max_len: usize) -> Option<Self> {
        let mut remaining = index;
        for len in 1..=max_len.min(MAX_COMBO_LEN) {
            let bucket = bucket_size(len);
            if remaining < bucket {
                let mut glyphs = vec![0u8; len];
                let mut value = remaining;
                for slot in glyphs.iter_mut().rev() {
                    *slot = (value % ALPHABET_SIZE) as u8;
                    value /= ALPHABET_SIZE;
                }
                return Some(Self(glyphs));
            }
            remaining -= bucket;
        }
        None
    }

    /// Position of this combination in the enumeration order.
    pub fn index(&self) -> u64 {
        let shorter: u64 = (1..self.0.len()).map(bucket_size).sum();
        let within = self
            .0
            .iter()
            .fold(0u64, |acc, g| acc * ALPHABET_SIZE + u64::from(*g));
        shorter + within
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True for single-glyph combinations, which belong to the base vocabulary.
    pub fn is_reserved(&self) -> bool {
        self.0.len() == 1
    }
}

impl fmt::Display for Combo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for g in &self.0 {
            let c = char::from_u32(GLYPH_BASE + u32::from(*g)).ok_or(fmt::Error)?;
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl TryFrom<String> for Combo {
    type Error = DictionaryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Combo::from_glyphs(&value)
    }
}

impl From<Combo> for String {
    fn from(combo: Combo) -> Self {
        combo.to_string()
    }
}

fn bucket_size(len: usize) -> u64 {
    // len is at most MAX_COMBO_LEN.
    ALPHABET_SIZE.pow(len as u32)
}

/// Total number of combinations of length 1..=`max_len`.
pub fn capacity(max_len: usize) -> u64 {
    (1..=max_len.min(MAX_COMBO_LEN)).map(bucket_size).sum()
}

/// The base-vocabulary combination for a word, if it has one.
pub fn base_combo(word: &str) -> Option<Combo> {
    BASE_VOCABULARY
        .iter()
        .position(|w| *w == word)
        .and_then(|i| u8::try_from(i).ok())
        .map(|i| Combo(vec![i]))
}

/// The base-vocabulary word for a single-glyph combination.
pub fn base_word(combo: &Combo) -> Option<&'static str> {
    match combo.0.as_slice() {
        [i] => BASE_VOCABULARY.get(usize::from(*i)).copied(),
        _ => None,
    }
}

/// One persisted allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Allocation order, starting at 0.
    pub seq: u64,
    pub word: String,
    pub combo: Combo,
}

#[derive(Debug, Default)]
struct Allocations {
    by_word: HashMap<String, Combo>,
    by_combo: HashMap<Combo, String>,
    entries: Vec<Entry>,
    cursor: u64,
}

impl Allocations {
    fn insert(&mut self, word: String, combo: Combo) {
        let seq = self.entries.len() as u64;
        self.by_word.insert(word.clone(), combo.clone());
        self.by_combo.insert(combo.clone(), word.clone());
        self.entries.push(Entry { seq, word, combo });
    }

    fn pop(&mut self) {
        if let Some(entry) = self.entries.pop() {
            self.by_word.remove(&entry.word);
            self.by_combo.remove(&entry.combo);
        }
    }

    fn is_claimed(&self, combo: &Combo) -> bool {
        combo.is_reserved() || self.by_combo.contains_key(combo)
    }
}

/// The allocator handle. All mutation goes through one exclusive section.
#[derive(Debug)]
pub struct ExtensionDictionary {
    config: DictionaryConfig,
    state: Mutex<Allocations>,
}

impl ExtensionDictionary {
    /// A dictionary that is never persisted.
    pub fn in_memory() -> Self {
        Self {
            config: DictionaryConfig::in_memory(),
            state: Mutex::new(Allocations::default()),
        }
    }

    /// Opens a dictionary, loading prior allocations if the file exists.
    pub fn open(config: DictionaryConfig) -> Result<Self, DictionaryError> {
        config.validate().map_err(|e| DictionaryError::Io(e.to_string()))?;
        let state = match &config.path {
            Some(path) if path.exists() => read_allocations(path)?,
            _ => Allocations::default(),
        };
        tracing::debug!(
            target: "dictionary",
            entries = state.entries.len(),
            path = ?config.path,
            "extension dictionary opened"
        );
        Ok(Self {
            config,
            state: Mutex::new(state),
        })
    }

    /// Returns the combination for `word`, allocating one if needed.
    ///
    /// Idempotent per word. With a configured path the new entry is on disk
    /// before this returns; if persisting fails the allocation is undone.
    pub fn allocate(&self, word: &str) -> Result<Combo, DictionaryError> {
        if word.is_empty() || word.chars().any(char::is_whitespace) {
            return Err(DictionaryError::InvalidWord(word.to_string()));
        }
        if let Some(combo) = base_combo(word) {
            return Ok(combo);
        }

        let mut state = self.state.lock();
        let _file_lock = match &self.config.path {
            Some(path) => {
                let guard = FileLock::acquire(path)?;
                // Another process may have allocated since we last looked.
                if path.exists() {
                    merge(&mut state, read_allocations(path)?);
                }
                Some(guard)
            }
            None => None,
        };

        if let Some(combo) = state.by_word.get(word) {
            return Ok(combo.clone());
        }

        let max_len = usize::from(self.config.max_combo_len);
        let total = capacity(max_len);
        let combo = loop {
            let candidate = Combo::from_index(state.cursor, max_len).ok_or(
                DictionaryError::Exhausted { capacity: total },
            )?;
            state.cursor += 1;
            if !state.is_claimed(&candidate) {
                break candidate;
            }
        };
        state.insert(word.to_string(), combo.clone());

        if let Some(path) = &self.config.path {
            if let Err(e) = write_allocations(path, &state.entries) {
                state.pop();
                return Err(e);
            }
        }
        tracing::debug!(target: "dictionary", word, combo = %combo, "allocated extension symbol");
        Ok(combo)
    }

    /// The word a combination stands for, base vocabulary included.
    pub fn resolve(&self, combo: &Combo) -> Option<String> {
        if let Some(word) = base_word(combo) {
            return Some(word.to_string());
        }
        self.state.lock().by_combo.get(combo).cloned()
    }

    /// The combination already assigned to a word, without allocating.
    pub fn lookup(&self, word: &str) -> Option<Combo> {
        base_combo(word).or_else(|| self.state.lock().by_word.get(word).cloned())
    }

    /// Rewrites the persisted file from memory merged with what is already
    /// on disk. A no-op without a path.
    pub fn persist(&self) -> Result<(), DictionaryError> {
        let Some(path) = &self.config.path else {
            return Ok(());
        };
        let mut state = self.state.lock();
        let _guard = FileLock::acquire(path)?;
        if path.exists() {
            merge(&mut state, read_allocations(path)?);
        }
        write_allocations(path, &state.entries)
    }

    /// Re-reads the persisted file, picking up allocations made elsewhere.
    pub fn reload(&self) -> Result<(), DictionaryError> {
        let Some(path) = &self.config.path else {
            return Ok(());
        };
        let mut state = self.state.lock();
        if path.exists() {
            let loaded = read_allocations(path)?;
            merge(&mut state, loaded);
        }
        Ok(())
    }

    /// Allocated entries in allocation order (base vocabulary excluded).
    pub fn entries(&self) -> Vec<Entry> {
        self.state.lock().entries.clone()
    }

    /// Number of allocated entries (base vocabulary excluded).
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of the configured combination space, reserved slots included.
    pub fn capacity(&self) -> u64 {
        capacity(usize::from(self.config.max_combo_len))
    }

    pub fn config(&self) -> &DictionaryConfig {
        &self.config
    }
}

fn merge(state: &mut Allocations, loaded: Allocations) {
    for entry in loaded.entries.into_iter().skip(state.entries.len()) {
        if !state.by_word.contains_key(&entry.word) && !state.by_combo.contains_key(&entry.combo) {
            state.insert(entry.word, entry.combo);
        }
    }
}

fn read_allocations(path: &Path) -> Result<Allocations, DictionaryError> {
    let file = File::open(path).map_err(io_error)?;
    let mut state = Allocations::default();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line_no = i + 1;
        let line = line.map_err(io_error)?;
        if line.trim().is_empty() {
            continue;
        }
        let corrupt = |reason: String| DictionaryError::Corrupt {
            line: line_no,
            reason,
        };
        let entry: Entry = serde_json::from_str(&line).map_err(|e| corrupt(e.to_string()))?;
        if entry.word.is_empty() || entry.word.chars().any(char::is_whitespace) {
            return Err(corrupt(format!("invalid word {:?}", entry.word)));
        }
        if entry.combo.is_reserved() || base_combo(&entry.word).is_some() {
            return Err(corrupt(format!(
                "{} collides with the base vocabulary",
                entry.combo
            )));
        }
        if state.by_word.contains_key(&entry.word) {
            return Err(corrupt(format!("word {:?} allocated twice", entry.word)));
        }
        if state.by_combo.contains_key(&entry.combo) {
            return Err(corrupt(format!("combination {} allocated twice", entry.combo)));
        }
        state.insert(entry.word, entry.combo);
    }
    Ok(state)
}

/// Writes every entry to a temp file and renames it over the target, so
/// readers see either the old or the new file, never a partial one.
fn write_allocations(path: &Path, entries: &[Entry]) -> Result<(), DictionaryError> {
    let tmp_path = sibling(path, "tmp");
    {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)
            .map_err(io_error)?;
        let mut writer = BufWriter::new(file);
        for entry in entries {
            let line = serde_json::to_string(entry).map_err(|e| DictionaryError::Io(e.to_string()))?;
            writer.write_all(line.as_bytes()).map_err(io_error)?;
            writer.write_all(b"\n").map_err(io_error)?;
        }
        writer.flush().map_err(io_error)?;
        writer.get_ref().sync_all().map_err(io_error)?;
    }
    fs::rename(&tmp_path, path).map_err(io_error)
}

fn sibling(path: &Path, extension: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(extension);
    path.with_file_name(name)
}

fn io_error(e: std::io::Error) -> DictionaryError {
    DictionaryError::Io(e.to_string())
}

/// Exclusive advisory lock on `<dictionary>.lock`, released on drop.
struct FileLock {
    file: File,
}

impl FileLock {
    /// Takes the lock, retrying once on contention before giving up.
    fn acquire(path: &Path) -> Result<Self, DictionaryError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(sibling(path, "lock"))
            .map_err(io_error)?;
        if file.try_lock_exclusive().is_err() {
            std::thread::sleep(LOCK_RETRY_DELAY);
            file.try_lock_exclusive().map_err(|e| match e.kind() {
                ErrorKind::WouldBlock => DictionaryError::Lock(format!(
                    "{} is held by another writer",
                    path.display()
                )),
                _ => DictionaryError::Lock(e.to_string()),
            })?;
        }
        Ok(Self { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn enumeration_order_is_length_then_lexicographic() {
        assert_eq!(Combo::from_index(0, 3).unwrap().0, vec![0]);
        assert_eq!(Combo::from_index(90, 3).unwrap().0, vec![90]);
        assert_eq!(Combo::from_index(91, 3).unwrap().0, vec![0, 0]);
        assert_eq!(Combo::from_index(92, 3).unwrap().0, vec![0, 1]);
        assert_eq!(Combo::from_index(91 + 91, 3).unwrap().0, vec![1, 0]);
        assert!(Combo::from_index(capacity(3), 3).is_none());
        assert!(Combo::from_index(91, 1).is_none());
        for i in [0, 5, 91, 8000, 9000, capacity(3) - 1] {
            assert_eq!(Combo::from_index(i, 3).unwrap().index(), i);
        }
    }

    #[test]
    fn capacity_matches_combination_space() {
        assert_eq!(capacity(3), 761_943);
        assert_eq!(capacity(1), 91);
    }

    #[test]
    fn glyph_round_trip() {
        let combo = Combo::from_index(12_345, 3).unwrap();
        let text = combo.to_string();
        assert_eq!(Combo::from_glyphs(&text).unwrap(), combo);
        assert!(Combo::from_glyphs("").is_err());
        assert!(Combo::from_glyphs("abc").is_err());
        assert!(Combo::from_glyphs("⠁⠁⠁⠁").is_err());
    }

    #[test]
    fn megafauna_is_stable_and_outside_base_vocabulary() {
        let dict = ExtensionDictionary::in_memory();
        let first = dict.allocate("megafauna").unwrap();
        let second = dict.allocate("megafauna").unwrap();
        assert_eq!(first, second);
        assert!(!first.is_reserved());
        assert!(base_word(&first).is_none());
        assert_eq!(dict.resolve(&first).as_deref(), Some("megafauna"));
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn first_allocation_takes_first_free_two_glyph_slot() {
        let dict = ExtensionDictionary::in_memory();
        assert_eq!(dict.allocate("alpha").unwrap().index(), 91);
        assert_eq!(dict.allocate("beta").unwrap().index(), 92);
    }

    #[test]
    fn base_words_resolve_without_allocation() {
        let dict = ExtensionDictionary::in_memory();
        let combo = dict.allocate("true").unwrap();
        assert!(combo.is_reserved());
        assert!(dict.is_empty());
        assert_eq!(dict.resolve(&combo).as_deref(), Some("true"));
        assert_eq!(dict.lookup("fact"), base_combo("fact"));
    }

    #[test]
    fn invalid_words_are_rejected() {
        let dict = ExtensionDictionary::in_memory();
        assert!(matches!(
            dict.allocate(""),
            Err(DictionaryError::InvalidWord(_))
        ));
        assert!(matches!(
            dict.allocate("two words"),
            Err(DictionaryError::InvalidWord(_))
        ));
    }

    #[test]
    fn exhaustion_is_explicit() {
        let config = DictionaryConfig {
            path: None,
            max_combo_len: 1,
        };
        let dict = ExtensionDictionary::open(config).unwrap();
        let err = dict.allocate("megafauna").unwrap_err();
        assert!(matches!(err, DictionaryError::Exhausted { capacity: 91 }));
    }

    #[test]
    fn allocations_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dict.jsonl");
        let combo = {
            let dict = ExtensionDictionary::open(DictionaryConfig::persistent(&path)).unwrap();
            dict.allocate("alpha").unwrap();
            dict.allocate("megafauna").unwrap()
        };
        let reopened = ExtensionDictionary::open(DictionaryConfig::persistent(&path)).unwrap();
        assert_eq!(reopened.lookup("megafauna"), Some(combo.clone()));
        assert_eq!(reopened.allocate("megafauna").unwrap(), combo);
        let next = reopened.allocate("gamma").unwrap();
        assert_ne!(next, combo);
        assert_eq!(next.index(), 93);
    }

    #[test]
    fn persisted_file_is_line_delimited_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dict.jsonl");
        let dict = ExtensionDictionary::open(DictionaryConfig::persistent(&path)).unwrap();
        dict.allocate("alpha").unwrap();
        dict.allocate("beta").unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let entry: Entry = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(entry.seq, 1);
        assert_eq!(entry.word, "beta");
        assert!(!sibling(&path, "tmp").exists());
    }

    #[test]
    fn second_handle_sees_allocations_from_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dict.jsonl");
        let a = ExtensionDictionary::open(DictionaryConfig::persistent(&path)).unwrap();
        let b = ExtensionDictionary::open(DictionaryConfig::persistent(&path)).unwrap();
        let from_a = a.allocate("alpha").unwrap();
        let from_b = b.allocate("beta").unwrap();
        assert_ne!(from_a, from_b);
        assert_eq!(b.lookup("alpha"), Some(from_a));
    }

    #[test]
    fn stale_handle_persist_keeps_other_allocations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dict.jsonl");
        let a = ExtensionDictionary::open(DictionaryConfig::persistent(&path)).unwrap();
        let b = ExtensionDictionary::open(DictionaryConfig::persistent(&path)).unwrap();
        let alpha = a.allocate("alpha").unwrap();
        b.persist().unwrap();
        assert_eq!(b.lookup("alpha"), Some(alpha.clone()));

        let reopened = ExtensionDictionary::open(DictionaryConfig::persistent(&path)).unwrap();
        assert_eq!(reopened.lookup("alpha"), Some(alpha.clone()));
        let gamma = reopened.allocate("gamma").unwrap();
        assert_ne!(gamma, alpha);
        assert_eq!(reopened.resolve(&alpha).as_deref(), Some("alpha"));
    }

    #[test]
    fn colliding_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dict.jsonl");
        let combo = Combo::from_index(91, 3).unwrap();
        let line_a = serde_json::to_string(&Entry {
            seq: 0,
            word: "alpha".into(),
            combo: combo.clone(),
        })
        .unwrap();
        let line_b = serde_json::to_string(&Entry {
            seq: 1,
            word: "beta".into(),
            combo,
        })
        .unwrap();
        fs::write(&path, format!("{line_a}\n{line_b}\n")).unwrap();
        let err = ExtensionDictionary::open(DictionaryConfig::persistent(&path)).unwrap_err();
        assert!(matches!(err, DictionaryError::Corrupt { line: 2, .. }));
    }

    #[test]
    fn concurrent_allocations_never_share_a_combination() {
        let dict = Arc::new(ExtensionDictionary::in_memory());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let dict = Arc::clone(&dict);
                std::thread::spawn(move || {
                    (0..50)
                        .map(|i| dict.allocate(&format!("w{t}_{i}")).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let mut all: Vec<Combo> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 400);
    }
}
