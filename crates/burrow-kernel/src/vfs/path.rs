//! Lexical path cleaning for the jail.
//!
//! Nothing in here touches the filesystem. Logical names are treated as
//! absolute `/`-rooted paths, so `..` can never climb above the logical root
//! and therefore never above the physical jail base they get joined onto.

use std::path::{Component, Path, PathBuf};

/// Clean a logical name and return its remaining segments.
///
/// `.` and empty segments vanish; `..` pops the previous segment and is a
/// no-op at the root.
pub fn clean_logical(name: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    for segment in name.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments
}

/// Lexically clean a physical path. An empty result becomes `.`.
pub fn clean_base(base: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    let mut depth = 0usize;

    for component in base.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if depth > 0 {
                    out.pop();
                    depth -= 1;
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            Component::Normal(segment) => {
                out.push(segment);
                depth += 1;
            }
        }
    }

    if out.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        out
    }
}

/// Join cleaned logical segments onto a base, cleaning the base as well.
pub fn join_clean(base: &Path, segments: &[&str]) -> PathBuf {
    let base = clean_base(base);
    if segments.is_empty() {
        return base;
    }

    let mut out = if base == Path::new(".") {
        PathBuf::new()
    } else {
        base
    };
    out.extend(segments);
    out
}

/// Final segment of a physical path, as matched by deny patterns.
pub fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join(base: &str, name: &str) -> PathBuf {
        join_clean(Path::new(base), &clean_logical(name))
    }

    #[test]
    fn test_clean_logical() {
        assert!(clean_logical("").is_empty());
        assert!(clean_logical("/../..").is_empty());
        assert_eq!(clean_logical("a/./b"), vec!["a", "b"]);
        assert_eq!(clean_logical("a/b/c/../../d"), vec!["a", "d"]);
        assert_eq!(clean_logical(".../a"), vec!["...", "a"]);
    }

    #[test]
    fn test_join_absolute_base() {
        let cases = [
            ("", "/tmp"),
            (".", "/tmp"),
            ("/", "/tmp"),
            ("./a", "/tmp/a"),
            ("..", "/tmp"),
            ("../", "/tmp"),
            ("../.", "/tmp"),
            ("../a", "/tmp/a"),
            ("../..", "/tmp"),
            ("...", "/tmp/..."),
            (".../..", "/tmp"),
            ("a/../../b", "/tmp/b"),
            ("a/b/c/../../../../d", "/tmp/d"),
            ("/a/b/c/d", "/tmp/a/b/c/d"),
            ("../../../../etc/passwd", "/tmp/etc/passwd"),
        ];
        for (name, want) in cases {
            assert_eq!(join("/tmp", name), PathBuf::from(want), "name {name:?}");
        }
    }

    #[test]
    fn test_join_filesystem_root() {
        assert_eq!(join("/", ""), PathBuf::from("/"));
        assert_eq!(join("/", "../.."), PathBuf::from("/"));
        assert_eq!(join("/", "a/b/c/../../../d"), PathBuf::from("/d"));
    }

    #[test]
    fn test_join_relative_base() {
        assert_eq!(join(".", ""), PathBuf::from("."));
        assert_eq!(join(".", "./a"), PathBuf::from("a"));
        assert_eq!(join(".", "../bar/a"), PathBuf::from("bar/a"));
        assert_eq!(join("", ""), PathBuf::from("."));
    }

    #[test]
    fn test_clean_base() {
        assert_eq!(clean_base(Path::new("/tmp/")), PathBuf::from("/tmp"));
        assert_eq!(clean_base(Path::new("/tmp/./x/..")), PathBuf::from("/tmp"));
        assert_eq!(clean_base(Path::new("/..")), PathBuf::from("/"));
        assert_eq!(clean_base(Path::new("../a/..")), PathBuf::from(".."));
    }

    #[test]
    fn test_never_escapes_base() {
        let names = ["..", "../..", "a/../../..", "./../x/../../y", "//..//..//z"];
        for name in names {
            for depth in 1..6 {
                let deep = format!("{}{}", "../".repeat(depth), name);
                let resolved = join("/srv/jail", &deep);
                assert!(resolved.starts_with("/srv/jail"), "{deep:?} -> {resolved:?}");
            }
        }
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name(Path::new("/tmp/a/virus.exe")), "virus.exe");
        assert_eq!(base_name(Path::new("/")), "/");
    }
}
