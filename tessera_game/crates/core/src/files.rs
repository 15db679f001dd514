use ahash::AHashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

/// Read-only access to bundled assets (textures, sounds, music).
pub trait AssetSource: Send + Sync {
    fn open(&self, name: &str) -> io::Result<Vec<u8>>;

    fn exists(&self, name: &str) -> bool {
        self.open(name).is_ok()
    }
}

/// Assets served from a directory on disk.
#[derive(Debug, Clone)]
pub struct DirAssets {
    root: PathBuf,
}

impl DirAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetSource for DirAssets {
    fn open(&self, name: &str) -> io::Result<Vec<u8>> {
        fs::read(self.root.join(name))
    }

    fn exists(&self, name: &str) -> bool {
        self.root.join(name).is_file()
    }
}

/// Assets held in memory, keyed by name. Used for embedded data and tests.
#[derive(Debug, Default)]
pub struct MemoryAssets {
    files: Mutex<AHashMap<String, Vec<u8>>>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), bytes.into());
    }
}

impl AssetSource for MemoryAssets {
    fn open(&self, name: &str) -> io::Result<Vec<u8>> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("asset {name} not found")))
    }

    fn exists(&self, name: &str) -> bool {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }
}

/// User-writable storage rooted at one directory. All paths are relative to
/// the root.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.root.join(rel)
    }

    pub fn exists(&self, rel: impl AsRef<Path>) -> bool {
        self.path(rel).exists()
    }

    /// Length in bytes, 0 when the file is missing.
    pub fn file_length(&self, rel: impl AsRef<Path>) -> u64 {
        fs::metadata(self.path(rel)).map(|m| m.len()).unwrap_or(0)
    }

    pub fn modified(&self, rel: impl AsRef<Path>) -> io::Result<SystemTime> {
        fs::metadata(self.path(rel))?.modified()
    }

    pub fn read(&self, rel: impl AsRef<Path>) -> io::Result<Vec<u8>> {
        fs::read(self.path(rel))
    }

    /// Writes `bytes`, creating parent directories as needed.
    pub fn write(&self, rel: impl AsRef<Path>, bytes: &[u8]) -> io::Result<()> {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, bytes)
    }

    /// Returns whether the file was found and deleted.
    pub fn delete_file(&self, rel: impl AsRef<Path>) -> bool {
        fs::remove_file(self.path(rel)).is_ok()
    }

    /// Replaces the file with `length` bytes of junk. Some sync services do
    /// not propagate deletions of empty or zeroed files.
    pub fn overwrite_file(&self, rel: impl AsRef<Path>, length: usize) -> io::Result<()> {
        self.write(rel, &vec![1u8; length])
    }

    pub fn dir_exists(&self, rel: impl AsRef<Path>) -> bool {
        self.path(rel).is_dir()
    }

    /// Returns whether the directory was found and deleted.
    pub fn delete_dir(&self, rel: impl AsRef<Path>) -> bool {
        let path = self.path(rel);
        path.is_dir() && fs::remove_dir_all(path).is_ok()
    }

    /// Names of the entries directly inside `rel`, sorted. Empty when `rel`
    /// is not a directory.
    pub fn files_in_dir(&self, rel: impl AsRef<Path>) -> Vec<String> {
        let Ok(entries) = fs::read_dir(self.path(rel)) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();
        names
    }

    /// Renames within storage, replacing `to` if it exists.
    pub fn rename(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> io::Result<()> {
        fs::rename(self.path(from), self.path(to))
    }
}
