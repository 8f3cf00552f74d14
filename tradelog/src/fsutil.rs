// Filesystem helpers shared by the collection and attachment stores.

use std::io;
use std::path::Path;

/// Set `mode` on `path` so a co-located reader process can access the file
/// regardless of this process's umask. Callers log failures; they never
/// propagate them.
#[cfg(unix)]
pub(crate) fn normalize_permissions(path: &Path, mode: u32) -> io::Result<()> {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
pub(crate) fn normalize_permissions(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}
