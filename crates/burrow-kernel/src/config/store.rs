//! The live configuration.

use std::path::Path;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::{Config, ConfigChange, ConfigError, diff, merge};

/// Holder of the live [`Config`] snapshot.
///
/// Readers take a cheap `Arc` clone and keep using it for the rest of their
/// request, so they never observe a half-applied reload. Reconciliations are
/// serialized and publish a new snapshot with a single pointer swap.
pub struct ConfigStore {
    live: RwLock<Arc<Config>>,
    reconcile_lock: Mutex<()>,
}

impl ConfigStore {
    pub fn new(config: Config) -> Self {
        Self {
            live: RwLock::new(Arc::new(config)),
            reconcile_lock: Mutex::new(()),
        }
    }

    /// Current snapshot.
    pub fn current(&self) -> Arc<Config> {
        Arc::clone(&self.live.read())
    }

    /// Bring the live config in line with `candidate`.
    ///
    /// Reloadable sections (users, logging flags, deny lists) are taken from
    /// the candidate; anything else that differs is reported as
    /// [`ConfigChange::RestartRequired`] and left alone. Directories for the
    /// merged user set are created before the new snapshot is published.
    pub fn reconcile(&self, candidate: Config) -> Vec<ConfigChange> {
        let _guard = self.reconcile_lock.lock();
        let current = self.current();

        let changes = diff(&current, &candidate);
        if changes.is_empty() {
            tracing::debug!("Config unchanged");
            return changes;
        }
        for change in &changes {
            change.log();
        }

        let next = merge(&current, &candidate);
        if next == *current {
            return changes;
        }
        next.ensure_dirs();
        *self.live.write() = Arc::new(next);
        changes
    }

    /// Re-read `path` and reconcile against it.
    ///
    /// A file that fails to read, parse or validate leaves the live config
    /// untouched.
    pub fn reload_from(&self, path: &Path) -> Result<Vec<ConfigChange>, ConfigError> {
        tracing::info!(path = %path.display(), "Config file changed");
        let candidate = Config::parse_file(path)?;
        Ok(self.reconcile(candidate))
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore").field("live", &self.current()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UserInfo;
    use crate::identity::Identity;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn user(password: &str, subdir: Option<&str>) -> UserInfo {
        UserInfo {
            password: password.to_string(),
            subdir: subdir.map(str::to_string),
        }
    }

    fn config_in(dir: &Path) -> Config {
        let mut config = Config {
            dir: dir.to_path_buf(),
            ..Config::default()
        };
        config.users.insert("alice".into(), user("a", Some("alice")));
        config.users.insert("bob".into(), user("b", Some("bob")));
        config
    }

    #[test]
    fn test_reconcile_same_config_is_noop() {
        let tmp = TempDir::new().unwrap();
        let store = ConfigStore::new(config_in(tmp.path()));
        let before = store.current();

        let changes = store.reconcile(config_in(tmp.path()));
        assert!(changes.is_empty());
        assert!(Arc::ptr_eq(&before, &store.current()));
    }

    #[test]
    fn test_reconcile_twice_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = ConfigStore::new(config_in(tmp.path()));

        let mut candidate = config_in(tmp.path());
        candidate.log.delete = true;
        assert_eq!(store.reconcile(candidate.clone()).len(), 1);
        let after_first = store.current();

        assert!(store.reconcile(candidate).is_empty());
        assert!(Arc::ptr_eq(&after_first, &store.current()));
    }

    #[test]
    fn test_removed_user_disappears() {
        let tmp = TempDir::new().unwrap();
        let store = ConfigStore::new(config_in(tmp.path()));

        let mut candidate = config_in(tmp.path());
        candidate.users.remove("bob");
        let changes = store.reconcile(candidate);

        assert_eq!(changes, vec![ConfigChange::UserRemoved { username: "bob".into() }]);
        let live = store.current();
        assert!(!live.users.contains_key("bob"));
        assert!(live.users.contains_key("alice"));
        // Bob no longer has a jail at all, not even the base directory.
        assert_eq!(live.jail_base(&Identity::authenticated("bob")), None);
    }

    #[test]
    fn test_added_user_gets_directory() {
        let tmp = TempDir::new().unwrap();
        let store = ConfigStore::new(config_in(tmp.path()));

        let mut candidate = config_in(tmp.path());
        candidate.users.insert("carol".into(), user("c", Some("carol")));
        store.reconcile(candidate);

        assert!(tmp.path().join("carol").is_dir());
        assert_eq!(
            store.current().jail_base(&Identity::authenticated("carol")),
            Some(tmp.path().join("carol"))
        );
    }

    #[test]
    fn test_restart_only_change_keeps_snapshot() {
        let tmp = TempDir::new().unwrap();
        let store = ConfigStore::new(config_in(tmp.path()));
        let before = store.current();

        let mut candidate = config_in(tmp.path());
        candidate.dir = PathBuf::from("/somewhere/else");
        let changes = store.reconcile(candidate);

        assert_eq!(changes, vec![ConfigChange::RestartRequired { field: "dir" }]);
        assert!(Arc::ptr_eq(&before, &store.current()));
    }

    #[test]
    fn test_reader_keeps_its_snapshot() {
        let tmp = TempDir::new().unwrap();
        let store = ConfigStore::new(config_in(tmp.path()));
        let held = store.current();

        let mut candidate = config_in(tmp.path());
        candidate.users.clear();
        store.reconcile(candidate);

        assert_eq!(held.users.len(), 2);
        assert!(store.current().users.is_empty());
    }

    #[test]
    fn test_reload_from_bad_file_keeps_config() {
        let tmp = TempDir::new().unwrap();
        let store = ConfigStore::new(config_in(tmp.path()));
        let before = store.current();

        let path = tmp.path().join("config.yaml");
        std::fs::write(&path, "users: [unclosed").unwrap();
        assert!(store.reload_from(&path).is_err());
        assert!(Arc::ptr_eq(&before, &store.current()));
    }

    #[test]
    fn test_reload_from_file() {
        let tmp = TempDir::new().unwrap();
        let store = ConfigStore::new(config_in(tmp.path()));

        let path = tmp.path().join("config.yaml");
        std::fs::write(
            &path,
            format!(
                "dir: {}\nusers:\n  alice:\n    password: a\n    subdir: alice\n",
                tmp.path().display()
            ),
        )
        .unwrap();

        let changes = store.reload_from(&path).unwrap();
        assert_eq!(changes, vec![ConfigChange::UserRemoved { username: "bob".into() }]);
    }

    #[test]
    fn test_concurrent_readers_see_whole_snapshots() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(ConfigStore::new(config_in(tmp.path())));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        let snapshot = store.current();
                        // Either both users or neither; never a partial set.
                        let n = snapshot.users.len();
                        assert!(n == 2 || n == 0, "saw {n} users");
                        assert_eq!(snapshot.log.read, n == 0);
                    }
                })
            })
            .collect();

        for i in 0..50 {
            let mut candidate = config_in(tmp.path());
            if i % 2 == 0 {
                candidate.users.clear();
                candidate.log.read = true;
            }
            store.reconcile(candidate);
        }

        for reader in readers {
            reader.join().unwrap();
        }
    }
}
