//! Server constants.

/// Permission bits for files created by `PUT`, before the umask.
pub const FILE_PERM: u32 = 0o666;

/// Permission bits for directories created by `MKCOL`, before the umask.
pub const DIR_PERM: u32 = 0o777;

/// Methods the file engine answers, for the `Allow` header.
pub const ALLOWED_METHODS: &str = "OPTIONS, GET, HEAD, PUT, DELETE, MKCOL, MOVE";
