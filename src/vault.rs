//! Storage the templates are read from and notes are written to.
//!
//! Paths are vault-relative strings using `/` as the separator; the root folder is `""`.

use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VaultError {
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("File already exists: {0}")]
    AlreadyExists(String),
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum VaultEntry {
    File(String),
    Folder(String),
}

pub trait Vault {
    fn read_file(&self, path: &str) -> Result<String, VaultError>;

    /// Creates a new file and returns its path. Never overwrites an existing file.
    fn create_file(&self, path: &str, content: &str) -> Result<String, VaultError>;

    /// Immediate children of a folder, sorted by path.
    fn list_children(&self, path: &str) -> Result<Vec<VaultEntry>, VaultError>;
}

/// Cleans up a vault path: unifies separators, collapses repeats, drops leading and
/// trailing slashes and turns non-breaking spaces into plain ones.
pub fn normalize_path(path: &str) -> String {
    path.replace(['\u{00a0}', '\u{202f}'], " ")
        .split(['/', '\\'])
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Joins a folder and a leaf name, treating an empty folder as the vault root.
pub fn join_path(folder: &str, name: &str) -> String {
    if folder.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", folder, name)
    }
}

/// A vault backed by a directory on disk.
#[derive(Debug, Clone)]
pub struct FsVault {
    root: PathBuf,
}

impl FsVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, VaultError> {
        let normalized = normalize_path(path);
        let relative = Path::new(&normalized);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(VaultError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

fn io_error(path: &str, source: io::Error) -> VaultError {
    match source.kind() {
        io::ErrorKind::NotFound => VaultError::NotFound(path.to_string()),
        io::ErrorKind::AlreadyExists => VaultError::AlreadyExists(path.to_string()),
        _ => VaultError::Io {
            path: path.to_string(),
            source,
        },
    }
}

/// Writes a freshly created file, removing it again if the write fails.
fn write_new(full: &Path, mut file: impl Write, content: &[u8]) -> io::Result<()> {
    if let Err(e) = file.write_all(content).and_then(|()| file.flush()) {
        drop(file);
        if let Err(remove) = fs::remove_file(full) {
            warn!("Couldn't remove partly written {:?}: {}", full, remove);
        }
        return Err(e);
    }
    Ok(())
}

impl Vault for FsVault {
    fn read_file(&self, path: &str) -> Result<String, VaultError> {
        let full = self.resolve(path)?;
        fs::read_to_string(&full).map_err(|e| io_error(path, e))
    }

    fn create_file(&self, path: &str, content: &str) -> Result<String, VaultError> {
        let normalized = normalize_path(path);
        let full = self.resolve(&normalized)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error(path, e))?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full)
            .map_err(|e| io_error(path, e))?;
        write_new(&full, file, content.as_bytes()).map_err(|e| io_error(path, e))?;
        debug!("Created {:?}", full);
        Ok(normalized)
    }

    fn list_children(&self, path: &str) -> Result<Vec<VaultEntry>, VaultError> {
        let folder = normalize_path(path);
        let full = self.resolve(&folder)?;
        let mut entries = Vec::new();
        for entry in fs::read_dir(&full).map_err(|e| io_error(path, e))? {
            let entry = entry.map_err(|e| io_error(path, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let child = join_path(&folder, &name);
            let file_type = entry.file_type().map_err(|e| io_error(&child, e))?;
            if file_type.is_dir() {
                entries.push(VaultEntry::Folder(child));
            } else {
                entries.push(VaultEntry::File(child));
            }
        }
        entries.sort();
        Ok(entries)
    }
}

/// A vault held in memory.
#[derive(Debug, Default)]
pub struct MemoryVault {
    files: RwLock<BTreeMap<String, String>>,
    folders: RwLock<BTreeSet<String>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a file.
    pub fn insert(&self, path: &str, content: &str) {
        self.files
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(normalize_path(path), content.to_string());
    }

    /// Adds an empty folder.
    pub fn add_folder(&self, path: &str) {
        self.folders
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(normalize_path(path));
    }

    pub fn get(&self, path: &str) -> Option<String> {
        self.files
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&normalize_path(path))
            .cloned()
    }

    /// Every folder, explicit or implied by a file path.
    fn all_folders(&self) -> BTreeSet<String> {
        let mut folders = self
            .folders
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let files = self.files.read().unwrap_or_else(|e| e.into_inner());
        for path in files.keys() {
            let mut current = path.as_str();
            while let Some((parent, _)) = current.rsplit_once('/') {
                folders.insert(parent.to_string());
                current = parent;
            }
        }
        folders
    }
}

fn parent_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

impl Vault for MemoryVault {
    fn read_file(&self, path: &str) -> Result<String, VaultError> {
        self.get(path)
            .ok_or_else(|| VaultError::NotFound(path.to_string()))
    }

    fn create_file(&self, path: &str, content: &str) -> Result<String, VaultError> {
        let normalized = normalize_path(path);
        if normalized.is_empty() {
            return Err(VaultError::InvalidPath(path.to_string()));
        }
        let mut files = self.files.write().unwrap_or_else(|e| e.into_inner());
        if files.contains_key(&normalized) {
            return Err(VaultError::AlreadyExists(normalized));
        }
        files.insert(normalized.clone(), content.to_string());
        Ok(normalized)
    }

    fn list_children(&self, path: &str) -> Result<Vec<VaultEntry>, VaultError> {
        let folder = normalize_path(path);
        let folders = self.all_folders();
        if !folder.is_empty() && !folders.contains(&folder) {
            return Err(VaultError::NotFound(path.to_string()));
        }
        let files = self.files.read().unwrap_or_else(|e| e.into_inner());
        let mut entries: Vec<VaultEntry> = folders
            .into_iter()
            .filter(|f| !f.is_empty() && parent_of(f) == folder)
            .map(VaultEntry::Folder)
            .chain(
                files
                    .keys()
                    .filter(|f| parent_of(f) == folder)
                    .cloned()
                    .map(VaultEntry::File),
            )
            .collect();
        entries.sort();
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/notes//people\\Kevin/"), "notes/people/Kevin");
        assert_eq!(normalize_path("a\u{00a0}b"), "a b");
        assert_eq!(normalize_path(""), "");
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("", "note.md"), "note.md");
        assert_eq!(join_path("people", "note.md"), "people/note.md");
    }

    #[test]
    fn test_fs_vault_create_and_read() {
        let dir = tempdir().unwrap();
        let vault = FsVault::new(dir.path());
        let path = vault.create_file("people/Kevin.md", "hello").unwrap();
        assert_eq!(path, "people/Kevin.md");
        assert_eq!(vault.read_file("people/Kevin.md").unwrap(), "hello");
    }

    #[test]
    fn test_fs_vault_never_overwrites() {
        let dir = tempdir().unwrap();
        let vault = FsVault::new(dir.path());
        vault.create_file("note.md", "first").unwrap();
        let result = vault.create_file("note.md", "second");
        assert!(matches!(result, Err(VaultError::AlreadyExists(_))));
        assert_eq!(vault.read_file("note.md").unwrap(), "first");
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "no space left"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failed_write_leaves_no_file() {
        let dir = tempdir().unwrap();
        let vault = FsVault::new(dir.path());
        let full = dir.path().join("note.md");
        fs::write(&full, "").unwrap();

        let err = write_new(&full, FullDisk, b"hello").unwrap_err();
        assert_eq!(err.to_string(), "no space left");
        assert!(!full.exists());

        vault.create_file("note.md", "hello").unwrap();
        assert_eq!(vault.read_file("note.md").unwrap(), "hello");
    }

    #[test]
    fn test_fs_vault_missing_file() {
        let dir = tempdir().unwrap();
        let vault = FsVault::new(dir.path());
        assert!(matches!(
            vault.read_file("missing.md"),
            Err(VaultError::NotFound(_))
        ));
    }

    #[test]
    fn test_fs_vault_rejects_parent_components() {
        let dir = tempdir().unwrap();
        let vault = FsVault::new(dir.path());
        assert!(matches!(
            vault.create_file("../escape.md", "x"),
            Err(VaultError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_fs_vault_list_children() {
        let dir = tempdir().unwrap();
        let vault = FsVault::new(dir.path());
        vault.create_file("templates/b.md", "").unwrap();
        vault.create_file("templates/a.md", "").unwrap();
        vault.create_file("templates/nested/c.md", "").unwrap();
        let children = vault.list_children("templates").unwrap();
        assert_eq!(
            children,
            vec![
                VaultEntry::File("templates/a.md".to_string()),
                VaultEntry::File("templates/b.md".to_string()),
                VaultEntry::Folder("templates/nested".to_string()),
            ]
        );
        assert!(vault.list_children("missing").is_err());
    }

    #[test]
    fn test_memory_vault_list_children() {
        let vault = MemoryVault::new();
        vault.insert("templates/Person.md", "x");
        vault.insert("templates/deep/Task.md", "y");
        vault.add_folder("empty");
        let root = vault.list_children("").unwrap();
        assert_eq!(
            root,
            vec![
                VaultEntry::Folder("empty".to_string()),
                VaultEntry::Folder("templates".to_string()),
            ]
        );
        let templates = vault.list_children("templates").unwrap();
        assert_eq!(
            templates,
            vec![
                VaultEntry::File("templates/Person.md".to_string()),
                VaultEntry::Folder("templates/deep".to_string()),
            ]
        );
        assert!(matches!(
            vault.list_children("nowhere"),
            Err(VaultError::NotFound(_))
        ));
    }

    #[test]
    fn test_memory_vault_create_conflict() {
        let vault = MemoryVault::new();
        vault.create_file("a/b.md", "1").unwrap();
        assert!(matches!(
            vault.create_file("a//b.md", "2"),
            Err(VaultError::AlreadyExists(_))
        ));
        assert_eq!(vault.get("a/b.md").as_deref(), Some("1"));
    }
}
