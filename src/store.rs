//! Store path handling.

use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Anything that resolves to an on-disk store location.
///
/// Store handles expose their path explicitly rather than being probed for one.
pub trait StorePath {
    fn path(&self) -> &Path;
}

impl StorePath for Path {
    fn path(&self) -> &Path {
        self
    }
}

impl StorePath for PathBuf {
    fn path(&self) -> &Path {
        self
    }
}

impl StorePath for str {
    fn path(&self) -> &Path {
        Path::new(self)
    }
}

impl StorePath for String {
    fn path(&self) -> &Path {
        Path::new(self)
    }
}

impl<T: StorePath + ?Sized> StorePath for &T {
    fn path(&self) -> &Path {
        (**self).path()
    }
}

/// Ensure nothing exists at the store location.
///
/// With `force`, an existing store is removed (recursively for a directory
/// store, directly for a single-file store). Without it, an existing store is
/// an error. There is no atomicity between this check and a later write; the
/// surrounding system is single-writer.
pub fn ensure_store_absent(store: &impl StorePath, force: bool) -> Result<()> {
    let path = store.path();
    if !path.exists() {
        return Ok(());
    }
    if !force {
        return Err(Error::StoreExists(path.to_path_buf()));
    }
    log::warn!("removing existing store at {}", path.display());
    if path.is_dir() {
        std::fs::remove_dir_all(path)?;
    } else {
        std::fs::remove_file(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.zarr");
        ensure_store_absent(&path, false).unwrap();
        ensure_store_absent(&path, true).unwrap();
    }

    #[test]
    fn existing_path_without_force_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.zarr");
        std::fs::create_dir(&path).unwrap();
        let err = ensure_store_absent(&path, false).unwrap_err();
        assert!(matches!(err, Error::StoreExists(_)));
        assert!(path.exists());
    }

    #[test]
    fn force_removes_a_directory_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.zarr");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("zarr.json"), b"{}").unwrap();
        ensure_store_absent(&path, true).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn force_removes_a_single_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.zip");
        std::fs::write(&path, b"").unwrap();
        ensure_store_absent(&path, true).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn string_paths_resolve() {
        let path = "/tmp/some-store.zarr".to_string();
        assert_eq!(StorePath::path(&path), Path::new("/tmp/some-store.zarr"));
        assert_eq!(StorePath::path("x.zarr"), Path::new("x.zarr"));
    }
}
