//! Storage engine implementation
//!
//! File layout:
//! - `<name>.list`: one file per named list, see [`crate::parser`]
//! - `<name>.list.tmp`: write-ahead copy, renamed over the list on commit

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::parser::{encode_list, parse_list};

/// Maximum entry size (4 KB)
const MAX_ENTRY_SIZE: usize = 4 * 1024;

/// Maximum encoded list size (1 MB)
const MAX_LIST_SIZE: usize = 1024 * 1024;

const LIST_EXT: &str = "list";

/// ListStore is a directory of named, durable string lists.
///
/// Every write replaces the whole list atomically (temp file, fsync, rename),
/// so a crash leaves either the previous or the new contents on disk.
pub struct ListStore {
    /// Path to the store directory
    path: PathBuf,

    /// In-memory mirror of every list on disk
    lists: RwLock<HashMap<String, Vec<String>>>,

    /// Is the store closed?
    closed: RwLock<bool>,
}

impl ListStore {
    /// Open or create a store at the given directory
    ///
    /// Files that fail to parse are skipped with a warning rather than
    /// failing the open; the next write of that list replaces them.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        fs::create_dir_all(path)?;

        let mut lists = HashMap::new();
        for entry in fs::read_dir(path)? {
            let file_path = entry?.path();
            if file_path.extension().and_then(|e| e.to_str()) != Some(LIST_EXT) {
                continue;
            }
            let Some(name) = file_path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            match fs::read(&file_path).map_err(Error::from).and_then(|b| parse_list(&b)) {
                Ok(entries) => {
                    debug!(list = name, entries = entries.len(), "loaded list");
                    lists.insert(name.to_string(), entries);
                }
                Err(e) => warn!(path = %file_path.display(), error = %e, "skipping unreadable list"),
            }
        }

        Ok(ListStore {
            path: path.to_path_buf(),
            lists: RwLock::new(lists),
            closed: RwLock::new(false),
        })
    }

    /// Get a list by name; a list that was never written is empty
    pub fn get_list(&self, name: &str) -> Result<Vec<String>> {
        self.ensure_open()?;
        Ok(self.lists.read().get(name).cloned().unwrap_or_default())
    }

    /// Replace a list durably
    pub fn set_list<S: AsRef<str>>(&self, name: &str, entries: &[S]) -> Result<()> {
        self.ensure_open()?;
        validate_name(name)?;
        for entry in entries {
            validate_entry(entry.as_ref())?;
        }

        let encoded = encode_list(entries);
        if encoded.len() > MAX_LIST_SIZE {
            return Err(Error::InvalidEntry(format!(
                "list {:?} is {} bytes (max 1 MB)",
                name,
                encoded.len()
            )));
        }

        // Holding the write lock serializes file replacement per store.
        let mut lists = self.lists.write();
        self.write_atomic(name, &encoded)?;
        lists.insert(
            name.to_string(),
            entries.iter().map(|e| e.as_ref().to_string()).collect(),
        );
        debug!(list = name, entries = entries.len(), "list saved");
        Ok(())
    }

    /// Get a single string value stored under `name`
    pub fn get_string(&self, name: &str) -> Result<Option<String>> {
        Ok(self.get_list(name)?.into_iter().next())
    }

    /// Store a single string value under `name`
    pub fn set_string(&self, name: &str, value: &str) -> Result<()> {
        self.set_list(name, &[value])
    }

    /// Delete a list; returns whether it existed
    pub fn remove(&self, name: &str) -> Result<bool> {
        self.ensure_open()?;
        validate_name(name)?;

        let mut lists = self.lists.write();
        let existed = lists.remove(name).is_some();
        match fs::remove_file(self.list_path(name)) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(existed)
    }

    /// Names of all stored lists, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lists.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Get the number of stored lists
    pub fn len(&self) -> usize {
        self.lists.read().len()
    }

    /// Check if the store holds no lists
    pub fn is_empty(&self) -> bool {
        self.lists.read().is_empty()
    }

    /// Directory backing this store
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the store and fsync the directory
    pub fn close(&self) -> Result<()> {
        if *self.closed.read() {
            return Ok(());
        }

        // Directory fsync makes the last rename durable; not supported everywhere.
        if let Ok(dir) = File::open(&self.path) {
            let _ = dir.sync_all();
        }

        *self.closed.write() = true;
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if *self.closed.read() {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }

    fn list_path(&self, name: &str) -> PathBuf {
        self.path.join(format!("{}.{}", name, LIST_EXT))
    }

    fn write_atomic(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let final_path = self.list_path(name);
        let tmp_path = self.path.join(format!("{}.{}.tmp", name, LIST_EXT));

        let mut tmp = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        tmp.write_all(bytes)?;
        tmp.sync_all()?;
        drop(tmp);

        fs::rename(&tmp_path, &final_path)?;
        Ok(())
    }
}

impl Drop for ListStore {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn validate_name(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if ok {
        Ok(())
    } else {
        Err(Error::InvalidName(name.to_string()))
    }
}

fn validate_entry(entry: &str) -> Result<()> {
    if entry.contains('\n') {
        return Err(Error::InvalidEntry(format!("{:?} contains a newline", entry)));
    }
    if entry.len() > MAX_ENTRY_SIZE {
        return Err(Error::InvalidEntry(format!(
            "{} bytes (max {} bytes)",
            entry.len(),
            MAX_ENTRY_SIZE
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_and_open() {
        let dir = TempDir::new().unwrap();
        let store = ListStore::open(dir.path()).unwrap();

        assert_eq!(store.len(), 0);
        assert!(store.is_empty());

        store.close().unwrap();

        let store = ListStore::open(dir.path()).unwrap();
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_set_and_get() {
        let dir = TempDir::new().unwrap();
        let store = ListStore::open(dir.path()).unwrap();

        store.set_list("liked", &["clip-1", "clip-7"]).unwrap();

        assert_eq!(store.get_list("liked").unwrap(), vec!["clip-1", "clip-7"]);
        assert_eq!(store.names(), vec!["liked"]);
    }

    #[test]
    fn test_missing_list_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = ListStore::open(dir.path()).unwrap();

        assert!(store.get_list("liked").unwrap().is_empty());
        assert_eq!(store.get_string("token").unwrap(), None);
    }

    #[test]
    fn test_overwrite_replaces() {
        let dir = TempDir::new().unwrap();
        let store = ListStore::open(dir.path()).unwrap();

        store.set_list("liked", &["a", "b", "c"]).unwrap();
        store.set_list("liked", &["d"]).unwrap();

        assert_eq!(store.get_list("liked").unwrap(), vec!["d"]);
    }

    #[test]
    fn test_persistence() {
        let dir = TempDir::new().unwrap();

        {
            let store = ListStore::open(dir.path()).unwrap();
            store.set_list("liked", &["clip-1", "clip-2"]).unwrap();
            store.set_string("last_tab", "following").unwrap();
            store.close().unwrap();
        }

        {
            let store = ListStore::open(dir.path()).unwrap();
            assert_eq!(store.len(), 2);
            assert_eq!(store.get_list("liked").unwrap(), vec!["clip-1", "clip-2"]);
            assert_eq!(
                store.get_string("last_tab").unwrap().as_deref(),
                Some("following")
            );
        }
    }

    #[test]
    fn test_remove() {
        let dir = TempDir::new().unwrap();
        let store = ListStore::open(dir.path()).unwrap();

        store.set_list("liked", &["clip-1"]).unwrap();
        assert!(store.remove("liked").unwrap());
        assert!(!store.remove("liked").unwrap());

        let reopened = ListStore::open(dir.path()).unwrap();
        assert!(reopened.get_list("liked").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_name() {
        let dir = TempDir::new().unwrap();
        let store = ListStore::open(dir.path()).unwrap();

        for name in ["", ".hidden", "../escape", "a/b"] {
            let result = store.set_list(name, &["x"]);
            assert!(matches!(result, Err(Error::InvalidName(_))), "{name}");
        }
    }

    #[test]
    fn test_entry_with_newline() {
        let dir = TempDir::new().unwrap();
        let store = ListStore::open(dir.path()).unwrap();

        let result = store.set_list("liked", &["clip\n1"]);
        assert!(matches!(result, Err(Error::InvalidEntry(_))));
        assert!(store.get_list("liked").unwrap().is_empty());
    }

    #[test]
    fn test_entry_too_large() {
        let dir = TempDir::new().unwrap();
        let store = ListStore::open(dir.path()).unwrap();

        let large = "x".repeat(MAX_ENTRY_SIZE + 1);
        let result = store.set_list("liked", &[large]);
        assert!(matches!(result, Err(Error::InvalidEntry(_))));
    }

    #[test]
    fn test_corrupt_file_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("liked.list"), b"garbage").unwrap();
        fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let store = ListStore::open(dir.path()).unwrap();
        assert!(store.is_empty());

        store.set_list("liked", &["clip-1"]).unwrap();
        let reopened = ListStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get_list("liked").unwrap(), vec!["clip-1"]);
    }

    #[test]
    fn test_close_twice() {
        let dir = TempDir::new().unwrap();
        let store = ListStore::open(dir.path()).unwrap();

        store.close().unwrap();
        store.close().unwrap();
    }

    #[test]
    fn test_set_after_close() {
        let dir = TempDir::new().unwrap();
        let store = ListStore::open(dir.path()).unwrap();

        store.close().unwrap();

        let result = store.set_list("liked", &["x"]);
        assert!(matches!(result, Err(Error::Closed)));
    }
}
