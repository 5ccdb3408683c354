//! Server configuration: the snapshot type, file loading and defaults.
//!
//! A [`Config`] is an immutable value. The live one is owned by
//! [`ConfigStore`], which swaps it wholesale when the file on disk changes.
//!
//! # File format
//!
//! YAML (`.yaml`, `.yml`, or anything unrecognised) or TOML (`.toml`):
//!
//! ```yaml
//! address: 0.0.0.0
//! port: 8000
//! prefix: /dav
//! dir: /srv/dav
//! realm: burrow
//! tls:
//!   certFile: /etc/burrow/cert.pem
//!   keyFile: /etc/burrow/key.pem
//! log:
//!   create: true
//!   delete: true
//! deny:
//!   create:
//!     file: ["*.exe"]
//!     directory: [".git"]
//! users:
//!   alice:
//!     password: "$argon2id$v=19$m=19456,t=2,p=1$..."
//!     subdir: alice
//! cors:
//!   origin: https://app.example.com
//!   credentials: true
//! authenticationBypassIpAddresses: ["127.0.0.1"]
//! ```

mod diff;
mod store;
mod watch;

pub use diff::{ConfigChange, DenyTarget, LogFlag, diff, merge};
pub use store::ConfigStore;
pub use watch::{ConfigWatcherHandle, watch};

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::audit::OperationKind;
use crate::identity::Identity;
use crate::vfs::path::{clean_logical, join_clean};

/// Default bind address.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1";

/// Default port.
pub const DEFAULT_PORT: &str = "8000";

/// Default base directory.
pub const DEFAULT_DIR: &str = "/tmp";

/// Default authentication realm.
pub const DEFAULT_REALM: &str = "dave";

/// Directories searched by [`Config::discover`], in order. `~` is the home
/// directory.
const SEARCH_DIRS: &[&str] = &["./config", "~/.swd", "~/.dave", "."];

/// File names tried in each search directory.
const SEARCH_NAMES: &[&str] = &["config.yaml", "config.yml", "config.toml"];

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("can't read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("can't parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("can't parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TLS {kind} doesn't exist: {path}")]
    TlsFileMissing { kind: &'static str, path: PathBuf },

    #[error("no config file found (looked for config.yaml/yml/toml in ./config, ~/.swd, ~/.dave, .)")]
    NotFound,

    #[error("config watcher error: {0}")]
    Watch(#[from] notify::Error),
}

/// Config file syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
}

impl ConfigFormat {
    /// Pick a format from the file extension; YAML unless it says `.toml`.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Yaml,
        }
    }
}

/// Certificate and private key for HTTPS.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfig {
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
}

/// Per-operation logging switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub error: bool,
    pub create: bool,
    pub read: bool,
    pub update: bool,
    pub delete: bool,
}

impl LogConfig {
    /// Whether the switch for `kind` is on.
    pub fn enabled(&self, kind: OperationKind) -> bool {
        match kind {
            OperationKind::Create => self.create,
            OperationKind::Read => self.read,
            OperationKind::Update => self.update,
            OperationKind::Delete => self.delete,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            error: true,
            create: false,
            read: false,
            update: false,
            delete: false,
        }
    }
}

/// A configured user.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct UserInfo {
    /// Argon2 PHC hash of the password.
    pub password: String,
    /// Directory below the base dir this user is confined to.
    #[serde(default)]
    pub subdir: Option<String>,
}

impl fmt::Debug for UserInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserInfo")
            .field("password", &"<redacted>")
            .field("subdir", &self.subdir)
            .finish()
    }
}

/// Glob patterns refusing creation by base name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DenyCreate {
    #[serde(deserialize_with = "null_as_default")]
    pub file: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub directory: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DenyConfig {
    pub create: DenyCreate,
}

/// Cross-origin settings for browser clients.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origin; empty disables CORS handling.
    pub origin: String,
    pub credentials: bool,
}

impl CorsConfig {
    pub fn enabled(&self) -> bool {
        !self.origin.is_empty()
    }

    /// Whether a request's `Origin` header is the configured one.
    pub fn allows(&self, origin: &str) -> bool {
        self.enabled() && (self.origin == "*" || self.origin == origin)
    }
}

/// A configuration snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub address: String,
    #[serde(deserialize_with = "string_or_number")]
    pub port: String,
    pub prefix: String,
    /// Base directory; the jail for anonymous users and users without a subdir.
    pub dir: PathBuf,
    pub tls: Option<TlsConfig>,
    pub log: LogConfig,
    pub realm: String,
    #[serde(deserialize_with = "null_as_default")]
    pub users: BTreeMap<String, UserInfo>,
    pub deny: DenyConfig,
    pub cors: CorsConfig,
    #[serde(
        alias = "authentication_bypass_ip_addresses",
        deserialize_with = "null_as_default"
    )]
    pub authentication_bypass_ip_addresses: Vec<IpAddr>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_PORT.to_string(),
            prefix: String::new(),
            dir: PathBuf::from(DEFAULT_DIR),
            tls: None,
            log: LogConfig::default(),
            realm: DEFAULT_REALM.to_string(),
            users: BTreeMap::new(),
            deny: DenyConfig::default(),
            cors: CorsConfig::default(),
            authentication_bypass_ip_addresses: Vec::new(),
        }
    }
}

impl Config {
    /// Parse config text. Missing keys take their defaults.
    pub fn parse(text: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        let config = match format {
            // An empty YAML document is `null`, which is "all defaults".
            ConfigFormat::Yaml if text.trim().is_empty() => Config::default(),
            ConfigFormat::Yaml => serde_yaml::from_str(text)?,
            ConfigFormat::Toml => toml::from_str(text)?,
        };
        Ok(config)
    }

    /// Read, parse and validate a config file without touching anything else
    /// on disk.
    pub fn parse_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&text, ConfigFormat::from_path(path))?;
        config.validate()?;
        Ok(config)
    }

    /// Startup load: parse, validate, then make sure the base directory and
    /// every user directory exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::parse_file(path)?;
        tracing::info!(path = %path.display(), users = config.users.len(), "Loaded configuration");
        config.ensure_dirs();
        Ok(config)
    }

    /// Find a config file in the usual places.
    pub fn discover() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir();
        for dir in SEARCH_DIRS {
            let dir = match dir.strip_prefix("~/") {
                Some(rest) => match &home {
                    Some(home) => home.join(rest),
                    None => continue,
                },
                None => PathBuf::from(dir),
            };
            for name in SEARCH_NAMES {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    return Ok(candidate);
                }
            }
        }
        Err(ConfigError::NotFound)
    }

    /// Check that referenced files exist.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(tls) = &self.tls {
            if !tls.key_file.exists() {
                return Err(ConfigError::TlsFileMissing {
                    kind: "keyFile",
                    path: tls.key_file.clone(),
                });
            }
            if !tls.cert_file.exists() {
                return Err(ConfigError::TlsFileMissing {
                    kind: "certFile",
                    path: tls.cert_file.clone(),
                });
            }
        }
        Ok(())
    }

    /// `address:port` for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// Whether requests from `remote` must present credentials.
    pub fn authentication_needed(&self, remote: Option<IpAddr>) -> bool {
        if let Some(ip) = remote {
            if self.authentication_bypass_ip_addresses.contains(&ip) {
                return false;
            }
        }
        !self.users.is_empty()
    }

    /// Physical directory for a user's configured subdir, if any.
    ///
    /// The subdir is cleaned like a logical name, so it always lands below
    /// the base directory.
    pub fn user_dir(&self, username: &str) -> Option<PathBuf> {
        let subdir = self.users.get(username)?.subdir.as_deref()?;
        Some(join_clean(&self.dir, &clean_logical(subdir)))
    }

    /// The directory an identity may never leave.
    ///
    /// `None` for an authenticated user that is not in this snapshot; such a
    /// request has no jail and must not touch the filesystem.
    pub fn jail_base(&self, identity: &Identity) -> Option<PathBuf> {
        match identity.user() {
            None => Some(join_clean(&self.dir, &[])),
            Some(username) => {
                let info = self.users.get(username)?;
                Some(match info.subdir.as_deref() {
                    Some(subdir) => join_clean(&self.dir, &clean_logical(subdir)),
                    None => join_clean(&self.dir, &[]),
                })
            }
        }
    }

    /// Create the base directory and user directories that are missing.
    ///
    /// Failures are logged and skipped; a missing directory shows up later as
    /// a not-found on the requests that need it.
    pub fn ensure_dirs(&self) {
        let base = join_clean(&self.dir, &[]);
        if !base.exists() {
            if let Err(e) = std::fs::create_dir_all(&base) {
                tracing::warn!(path = %base.display(), error = %e, "Can't create base dir");
                return;
            }
            tracing::info!(path = %base.display(), "Created base dir");
        }

        for username in self.users.keys() {
            let Some(path) = self.user_dir(username) else {
                continue;
            };
            if path.exists() {
                continue;
            }
            match std::fs::create_dir_all(&path) {
                Ok(()) => tracing::info!(path = %path.display(), user = %username, "Created user dir"),
                Err(e) => {
                    tracing::warn!(path = %path.display(), user = %username, error = %e, "Can't create user dir")
                }
            }
        }
    }
}

/// Accept `port: 8000` as well as `port: "8000"`.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(u64),
    }

    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s,
        StringOrNumber::Number(n) => n.to_string(),
    })
}

/// Treat an explicit `null` (e.g. a bare `users:` key) as the empty value.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::parse("", ConfigFormat::Yaml).unwrap();
        assert_eq!(config.address, "127.0.0.1");
        assert_eq!(config.port, "8000");
        assert_eq!(config.prefix, "");
        assert_eq!(config.dir, PathBuf::from("/tmp"));
        assert_eq!(config.realm, "dave");
        assert!(config.tls.is_none());
        assert!(config.users.is_empty());
        assert!(config.log.error);
        assert!(!config.log.create && !config.log.read && !config.log.update && !config.log.delete);
        assert!(config.deny.create.file.is_empty());
        assert!(config.deny.create.directory.is_empty());
        assert!(!config.cors.enabled());
        assert!(!config.cors.credentials);
    }

    #[test]
    fn test_parse_yaml() {
        let text = r#"
address: 0.0.0.0
port: 8080
prefix: /dav
dir: /srv/dav
realm: burrow
log:
  create: true
  error: false
deny:
  create:
    file: ["*.exe", "*.bat"]
    directory: [".git"]
users:
  alice:
    password: hash-a
    subdir: alice
  bob:
    password: hash-b
cors:
  origin: https://app.example.com
  credentials: true
authenticationBypassIpAddresses: ["10.0.0.1"]
"#;
        let config = Config::parse(text, ConfigFormat::Yaml).unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.prefix, "/dav");
        assert_eq!(config.realm, "burrow");
        assert!(config.log.create);
        assert!(!config.log.error);
        assert!(!config.log.read);
        assert_eq!(config.deny.create.file, vec!["*.exe", "*.bat"]);
        assert_eq!(config.deny.create.directory, vec![".git"]);
        assert_eq!(config.users["alice"].subdir.as_deref(), Some("alice"));
        assert_eq!(config.users["bob"].subdir, None);
        assert!(config.cors.allows("https://app.example.com"));
        assert!(!config.cors.allows("https://evil.example.com"));
        assert_eq!(
            config.authentication_bypass_ip_addresses,
            vec!["10.0.0.1".parse::<IpAddr>().unwrap()]
        );
    }

    #[test]
    fn test_parse_toml() {
        let text = r#"
port = "9000"
dir = "/srv/dav"

[tls]
certFile = "/etc/cert.pem"
keyFile = "/etc/key.pem"

[users.carol]
password = "hash-c"
subdir = "carol"
"#;
        let config = Config::parse(text, ConfigFormat::Toml).unwrap();
        assert_eq!(config.port, "9000");
        assert_eq!(config.address, "127.0.0.1");
        let tls = config.tls.unwrap();
        assert_eq!(tls.cert_file, PathBuf::from("/etc/cert.pem"));
        assert_eq!(config.users["carol"].password, "hash-c");
    }

    #[test]
    fn test_bare_users_key_is_empty() {
        let config = Config::parse("users:\n", ConfigFormat::Yaml).unwrap();
        assert!(config.users.is_empty());
    }

    #[test]
    fn test_malformed_yaml_is_error() {
        assert!(Config::parse("users: [unclosed", ConfigFormat::Yaml).is_err());
        assert!(Config::parse("port: {a: 1}", ConfigFormat::Yaml).is_err());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("a/config.toml")), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("config.yaml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("config")), ConfigFormat::Yaml);
    }

    #[test]
    fn test_missing_tls_files_rejected() {
        let tmp = TempDir::new().unwrap();
        let cert = tmp.path().join("cert.pem");
        std::fs::write(&cert, "cert").unwrap();

        let config = Config {
            tls: Some(TlsConfig {
                cert_file: cert.clone(),
                key_file: tmp.path().join("missing-key.pem"),
            }),
            ..Config::default()
        };
        match config.validate() {
            Err(ConfigError::TlsFileMissing { kind, .. }) => assert_eq!(kind, "keyFile"),
            other => panic!("expected missing key file, got {other:?}"),
        }

        let key = tmp.path().join("key.pem");
        std::fs::write(&key, "key").unwrap();
        let config = Config {
            tls: Some(TlsConfig { cert_file: cert, key_file: key }),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_file_unreadable() {
        let tmp = TempDir::new().unwrap();
        let err = Config::parse_file(&tmp.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_creates_dirs() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().join("base");
        let path = tmp.path().join("config.yaml");
        std::fs::write(
            &path,
            format!(
                "dir: {}\nusers:\n  alice:\n    password: x\n    subdir: /alice\n  bob:\n    password: y\n",
                base.display()
            ),
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert!(base.is_dir());
        assert!(base.join("alice").is_dir());
        assert_eq!(config.user_dir("alice"), Some(base.join("alice")));
        assert_eq!(config.user_dir("bob"), None);
    }

    #[test]
    fn test_subdir_cannot_escape_base() {
        let mut config = Config {
            dir: PathBuf::from("/srv/dav"),
            ..Config::default()
        };
        config.users.insert(
            "mallory".into(),
            UserInfo {
                password: "x".into(),
                subdir: Some("../../etc".into()),
            },
        );
        assert_eq!(config.user_dir("mallory"), Some(PathBuf::from("/srv/dav/etc")));
    }

    #[test]
    fn test_jail_base() {
        let mut config = Config::default();
        config.users.insert(
            "alice".into(),
            UserInfo {
                password: "x".into(),
                subdir: Some("/alice".into()),
            },
        );
        config.users.insert(
            "bob".into(),
            UserInfo {
                password: "y".into(),
                subdir: None,
            },
        );

        assert_eq!(
            config.jail_base(&Identity::authenticated("alice")),
            Some(PathBuf::from("/tmp/alice"))
        );
        assert_eq!(config.jail_base(&Identity::authenticated("bob")), Some(PathBuf::from("/tmp")));
        assert_eq!(config.jail_base(&Identity::authenticated("ghost")), None);
        assert_eq!(config.jail_base(&Identity::anonymous()), Some(PathBuf::from("/tmp")));
    }

    #[test]
    fn test_log_switch_per_operation() {
        let log = LogConfig {
            create: true,
            delete: true,
            ..LogConfig::default()
        };
        assert!(log.enabled(OperationKind::Create));
        assert!(!log.enabled(OperationKind::Read));
        assert!(!log.enabled(OperationKind::Update));
        assert!(log.enabled(OperationKind::Delete));
    }

    #[test]
    fn test_authentication_needed() {
        let mut config = Config {
            authentication_bypass_ip_addresses: vec!["10.0.0.1".parse().unwrap()],
            ..Config::default()
        };
        assert!(!config.authentication_needed(None));

        config.users.insert(
            "alice".into(),
            UserInfo {
                password: "x".into(),
                subdir: None,
            },
        );
        assert!(config.authentication_needed(None));
        assert!(config.authentication_needed(Some("10.0.0.2".parse().unwrap())));
        assert!(!config.authentication_needed(Some("10.0.0.1".parse().unwrap())));
    }

    #[test]
    fn test_user_info_debug_redacts_password() {
        let user = UserInfo {
            password: "$argon2id$secret".into(),
            subdir: None,
        };
        let debug = format!("{user:?}");
        assert!(!debug.contains("secret"));
    }
}
