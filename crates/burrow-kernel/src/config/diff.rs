//! Field-by-field comparison of two config snapshots.

use super::Config;

/// One of the per-operation logging switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFlag {
    Error,
    Create,
    Read,
    Update,
    Delete,
}

impl LogFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFlag::Error => "error",
            LogFlag::Create => "create",
            LogFlag::Read => "read",
            LogFlag::Update => "update",
            LogFlag::Delete => "delete",
        }
    }
}

/// Which creation deny list changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyTarget {
    File,
    Directory,
}

impl DenyTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyTarget::File => "file",
            DenyTarget::Directory => "directory",
        }
    }
}

/// A difference between the live config and a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigChange {
    UserRemoved { username: String },
    UserAdded { username: String },
    PasswordChanged { username: String },
    SubdirChanged { username: String, subdir: Option<String> },
    LoggingChanged { flag: LogFlag, enabled: bool },
    DenyListChanged { target: DenyTarget, patterns: Vec<String> },
    /// A field that only takes effect at startup differs; the live value is kept.
    RestartRequired { field: &'static str },
}

impl ConfigChange {
    /// Emit the change as a log event. Restart-only fields warn.
    pub fn log(&self) {
        match self {
            ConfigChange::UserRemoved { username } => {
                tracing::info!(user = %username, "Removed user from configuration");
            }
            ConfigChange::UserAdded { username } => {
                tracing::info!(user = %username, "Added user to configuration");
            }
            ConfigChange::PasswordChanged { username } => {
                tracing::info!(user = %username, "Updated password of user");
            }
            ConfigChange::SubdirChanged { username, subdir } => {
                tracing::info!(
                    user = %username,
                    subdir = subdir.as_deref().unwrap_or(""),
                    "Updated subdir of user"
                );
            }
            ConfigChange::LoggingChanged { flag, enabled } => {
                tracing::info!(flag = flag.as_str(), enabled, "Set logging");
            }
            ConfigChange::DenyListChanged { target, patterns } => {
                tracing::info!(list = target.as_str(), patterns = ?patterns, "Updated deny list");
            }
            ConfigChange::RestartRequired { field } => {
                tracing::warn!(field, "Config field changed but needs a restart to take effect");
            }
        }
    }
}

/// List everything that differs between `current` and `candidate`.
///
/// An empty result means the candidate is indistinguishable from the live
/// config as far as reconciliation is concerned.
pub fn diff(current: &Config, candidate: &Config) -> Vec<ConfigChange> {
    let mut changes = Vec::new();

    for username in current.users.keys() {
        if !candidate.users.contains_key(username) {
            changes.push(ConfigChange::UserRemoved {
                username: username.clone(),
            });
        }
    }

    for (username, next) in &candidate.users {
        match current.users.get(username) {
            None => changes.push(ConfigChange::UserAdded {
                username: username.clone(),
            }),
            Some(prev) => {
                if prev.password != next.password {
                    changes.push(ConfigChange::PasswordChanged {
                        username: username.clone(),
                    });
                }
                if prev.subdir != next.subdir {
                    changes.push(ConfigChange::SubdirChanged {
                        username: username.clone(),
                        subdir: next.subdir.clone(),
                    });
                }
            }
        }
    }

    let flags = [
        (LogFlag::Error, current.log.error, candidate.log.error),
        (LogFlag::Create, current.log.create, candidate.log.create),
        (LogFlag::Read, current.log.read, candidate.log.read),
        (LogFlag::Update, current.log.update, candidate.log.update),
        (LogFlag::Delete, current.log.delete, candidate.log.delete),
    ];
    for (flag, prev, next) in flags {
        if prev != next {
            changes.push(ConfigChange::LoggingChanged { flag, enabled: next });
        }
    }

    if current.deny.create.file != candidate.deny.create.file {
        changes.push(ConfigChange::DenyListChanged {
            target: DenyTarget::File,
            patterns: candidate.deny.create.file.clone(),
        });
    }
    if current.deny.create.directory != candidate.deny.create.directory {
        changes.push(ConfigChange::DenyListChanged {
            target: DenyTarget::Directory,
            patterns: candidate.deny.create.directory.clone(),
        });
    }

    let restart_only = [
        ("address", current.address != candidate.address),
        ("port", current.port != candidate.port),
        ("prefix", current.prefix != candidate.prefix),
        ("dir", current.dir != candidate.dir),
        ("realm", current.realm != candidate.realm),
        ("tls", current.tls != candidate.tls),
        ("cors", current.cors != candidate.cors),
        (
            "authenticationBypassIpAddresses",
            current.authentication_bypass_ip_addresses != candidate.authentication_bypass_ip_addresses,
        ),
    ];
    for (field, changed) in restart_only {
        if changed {
            changes.push(ConfigChange::RestartRequired { field });
        }
    }

    changes
}

/// Build the next live snapshot: reloadable sections from `candidate`,
/// everything else from `current`.
pub fn merge(current: &Config, candidate: &Config) -> Config {
    Config {
        users: candidate.users.clone(),
        log: candidate.log,
        deny: candidate.deny.clone(),
        ..current.clone()
    }
}
