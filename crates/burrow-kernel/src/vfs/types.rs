//! Core VFS types.

/// File type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Symbolic link.
    Symlink,
}

impl FileType {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }

    fn from_std(ft: std::fs::FileType) -> Self {
        if ft.is_dir() {
            FileType::Directory
        } else if ft.is_symlink() {
            FileType::Symlink
        } else {
            FileType::File
        }
    }
}

/// File attributes (metadata).
#[derive(Debug, Clone)]
pub struct FileAttr {
    /// Size in bytes.
    pub size: u64,
    /// File type.
    pub kind: FileType,
}

impl FileAttr {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}

impl From<&std::fs::Metadata> for FileAttr {
    fn from(meta: &std::fs::Metadata) -> Self {
        Self {
            size: meta.len(),
            kind: FileType::from_std(meta.file_type()),
        }
    }
}

/// Directory entry.
#[derive(Debug, Clone)]
pub struct DirEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Entry type.
    pub kind: FileType,
}

impl DirEntry {
    pub(crate) fn from_std(name: String, ft: std::fs::FileType) -> Self {
        Self {
            name,
            kind: FileType::from_std(ft),
        }
    }
}

/// Open file flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFlags {
    /// Read access requested.
    pub read: bool,
    /// Write access requested.
    pub write: bool,
    /// Create if not exists.
    pub create: bool,
    /// Truncate on open.
    pub truncate: bool,
}

impl Default for OpenFlags {
    fn default() -> Self {
        Self {
            read: true,
            write: false,
            create: false,
            truncate: false,
        }
    }
}

impl OpenFlags {
    /// Read-only access.
    pub fn read() -> Self {
        Self::default()
    }

    /// Write access (also enables read).
    pub fn write() -> Self {
        Self {
            read: true,
            write: true,
            ..Default::default()
        }
    }

    /// Create and truncate.
    pub fn create_truncate() -> Self {
        Self {
            read: true,
            write: true,
            create: true,
            truncate: true,
            ..Default::default()
        }
    }

    /// Whether opening with these flags may bring a new file into existence.
    pub fn creates(&self) -> bool {
        self.create
    }

    pub(crate) fn to_open_options(self, perm: u32) -> tokio::fs::OpenOptions {
        let mut opts = tokio::fs::OpenOptions::new();
        opts.read(self.read)
            .write(self.write)
            .create(self.create)
            .truncate(self.truncate);
        #[cfg(unix)]
        opts.mode(perm);
        #[cfg(not(unix))]
        let _ = perm;
        opts
    }
}
