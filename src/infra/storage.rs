//! Directory-backed local storage for persisted stores.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::stores::{LocalStorage, StorageError};

/// Keeps one `{name}.json` file per store inside `root`.
#[derive(Debug)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf) -> Result<Self, io::Error> {
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> Result<PathBuf, StorageError> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StorageError::InvalidName {
                name: name.to_string(),
            });
        }
        Ok(self.root.join(format!("{name}.json")))
    }
}

fn io_error(name: &str) -> impl FnOnce(io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        name: name.to_string(),
        source,
    }
}

impl LocalStorage for FileStorage {
    fn load(&self, name: &str) -> Result<Option<String>, StorageError> {
        let path = self.resolve(name)?;
        match fs::read_to_string(&path) {
            Ok(blob) => Ok(Some(blob)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error(name)(err)),
        }
    }

    /// Write through a sibling temp file and rename, so readers never see a
    /// torn blob.
    fn save(&self, name: &str, blob: &str) -> Result<(), StorageError> {
        let path = self.resolve(name)?;
        let staging = path.with_extension("json.tmp");

        let mut file = fs::File::create(&staging).map_err(io_error(name))?;
        file.write_all(blob.as_bytes()).map_err(io_error(name))?;
        file.sync_all().map_err(io_error(name))?;
        drop(file);
        fs::rename(&staging, &path).map_err(io_error(name))?;

        debug!(store = name, path = %path.display(), bytes = blob.len(), "persisted store");
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), StorageError> {
        let path = self.resolve(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error(name)(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn blobs_round_trip_through_files() {
        let dir = tempdir().expect("tempdir");
        let storage = FileStorage::new(dir.path().join("nested")).expect("storage");

        assert_eq!(storage.load("todo-storage").unwrap(), None);
        storage.save("todo-storage", r#"{"state":{"todos":[]},"version":0}"#).unwrap();

        assert!(storage.root().join("todo-storage.json").exists());
        assert_eq!(
            storage.load("todo-storage").unwrap().as_deref(),
            Some(r#"{"state":{"todos":[]},"version":0}"#)
        );

        storage.remove("todo-storage").unwrap();
        storage.remove("todo-storage").unwrap();
        assert_eq!(storage.load("todo-storage").unwrap(), None);
    }

    #[test]
    fn path_like_names_are_rejected() {
        let dir = tempdir().expect("tempdir");
        let storage = FileStorage::new(dir.path().to_path_buf()).expect("storage");

        for name in ["", "../escape", "a/b", "dot.name"] {
            assert!(matches!(
                storage.save(name, "{}"),
                Err(StorageError::InvalidName { .. })
            ));
        }
    }
}
