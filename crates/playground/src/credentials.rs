use std::fs;
use std::io::{self, ErrorKind};
use std::path::PathBuf;

const KEY_FILE_NAME: &str = "api_key";

/// Persistent storage for the provider API key.
///
/// The key lives in a single plain-text file under a root directory.
/// Sessions receive a store instead of reaching for a hard-wired
/// location, so tests can point one at a scratch directory.
#[derive(Clone, Debug)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Creates a store rooted at the user's configuration directory,
    /// `None` when the platform has no such directory.
    pub fn from_default_location() -> Option<Self> {
        let root = dirs::config_dir()?.join("playground");
        Some(Self::with_root(root))
    }

    /// Creates a store rooted at the given directory.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            path: root.into().join(KEY_FILE_NAME),
        }
    }

    /// Loads the stored key, `None` when nothing has been stored.
    pub fn load(&self) -> io::Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let key = contents.trim();
                Ok((!key.is_empty()).then(|| key.to_owned()))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Stores the key, replacing any previous one.
    pub fn store(&self, key: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, key)
    }

    /// Removes the stored key. Removing a key that was never stored is
    /// not an error.
    pub fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_root(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("playground-cred-{}-{name}", std::process::id()))
    }

    #[test]
    fn test_round_trip() {
        let root = scratch_root("round-trip");
        let store = CredentialStore::with_root(&root);

        assert_eq!(store.load().unwrap(), None);
        store.store("sk-test").unwrap();
        assert_eq!(store.load().unwrap(), Some("sk-test".to_owned()));
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);

        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_stored_keys_are_trimmed() {
        let root = scratch_root("trimmed");
        let store = CredentialStore::with_root(&root);

        store.store("sk-test\n").unwrap();
        assert_eq!(store.load().unwrap(), Some("sk-test".to_owned()));

        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_clearing_a_missing_key_is_fine() {
        let root = scratch_root("missing");
        let store = CredentialStore::with_root(&root);
        store.clear().unwrap();
    }
}
