use super::{Bundle, BundleError, DEFAULT_COMPRESSION};
use std::path::{Path, PathBuf};
use tessera_game_core::Storage;

pub const TEMP_SUFFIX: &str = ".tmp";

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

pub fn load_bundle(storage: &Storage, path: impl AsRef<Path>) -> Result<Bundle, BundleError> {
    Bundle::from_bytes(&storage.read(path)?)
}

/// Writes `bundle` next to `path` as a temp file, then swaps it in. An
/// interrupted write leaves the previous file intact.
pub fn save_bundle(storage: &Storage, path: impl AsRef<Path>, bundle: &Bundle) -> Result<(), BundleError> {
    save_bundle_with(storage, path, bundle, DEFAULT_COMPRESSION)
}

pub fn save_bundle_with(
    storage: &Storage,
    path: impl AsRef<Path>,
    bundle: &Bundle,
    compressed: bool,
) -> Result<(), BundleError> {
    let path = path.as_ref();
    let temp = temp_path(path);
    storage.write(&temp, &bundle.to_bytes(compressed)?)?;
    storage.delete_file(path);
    storage.rename(&temp, path)?;
    Ok(())
}

fn is_valid(storage: &Storage, path: &Path) -> bool {
    load_bundle(storage, path).is_ok()
}

/// Recovers from interrupted saves under `dir`, recursively. For each temp
/// file: an unreadable temp is deleted; a readable temp replaces an
/// unreadable original, or a readable but older one. Returns whether any
/// temp file was found.
pub fn clean_temp_files(storage: &Storage, dir: impl AsRef<Path>) -> bool {
    let dir = dir.as_ref();
    let mut found = false;
    for name in storage.files_in_dir(dir) {
        let path = dir.join(&name);
        if storage.dir_exists(&path) {
            found |= clean_temp_files(storage, &path);
            continue;
        }
        let Some(base) = name.strip_suffix(TEMP_SUFFIX) else {
            continue;
        };
        found = true;
        let original = dir.join(base);
        if !is_valid(storage, &path) {
            log::warn!("discarding unreadable temp file {}", path.display());
            storage.delete_file(&path);
            continue;
        }
        let keep_temp = !is_valid(storage, &original)
            || match (storage.modified(&path), storage.modified(&original)) {
                (Ok(temp), Ok(orig)) => temp > orig,
                _ => true,
            };
        if keep_temp {
            log::info!("recovered {} from temp file", original.display());
            storage.delete_file(&original);
            if let Err(err) = storage.rename(&path, &original) {
                log::warn!("could not restore {}: {err}", original.display());
            }
        } else {
            log::warn!("discarding stale temp file {}", path.display());
            storage.delete_file(&path);
        }
    }
    found
}
