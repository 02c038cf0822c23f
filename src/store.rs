//! Content-addressed file storage for raw message bytes.
//!
//! One file per message at `<root>/<list>/<hashcode>`, with the auxiliary
//! `_attachments`, `_failed` and `_removed` subdirectories under the same
//! list root. The layout is shared with other archiving processes, so
//! directories are created group/world writable with the setgid bit and
//! creation tolerates the already-exists race.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use sha1::{Digest, Sha1};
use tracing::{debug, info, warn};

use crate::error::Result;

/// Attachment files subdirectory name
pub const ATTACHMENTS_DIR: &str = "_attachments";
/// Unparseable message subdirectory name
pub const FAILED_DIR: &str = "_failed";
/// Removed message subdirectory name
pub const REMOVED_DIR: &str = "_removed";

#[cfg(unix)]
const SHARED_DIR_MODE: u32 = 0o2777;

/// Compute the content hashcode for raw message bytes.
///
/// SHA-1 over the bytes, URL-safe base64 encoded (28 characters with
/// padding) so the result is a safe filename and URL component.
#[must_use]
pub fn compute_hashcode(raw: &[u8]) -> String {
    let digest = Sha1::digest(raw);
    URL_SAFE.encode(digest)
}

/// Durable file store rooted at the configured archive directory
#[derive(Debug, Clone)]
pub struct MessageStore {
    root: PathBuf,
}

impl MessageStore {
    /// Create a store over the given archive root. The root itself is
    /// created lazily on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The configured archive root
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding a list's message files
    #[must_use]
    pub fn list_dir(&self, list_name: &str) -> PathBuf {
        self.root.join(list_name)
    }

    /// Path of a message file within its list
    #[must_use]
    pub fn message_path(&self, list_name: &str, hashcode: &str) -> PathBuf {
        self.list_dir(list_name).join(hashcode)
    }

    /// Path of an auxiliary subdirectory (`_attachments`, `_failed`,
    /// `_removed`) within a list
    #[must_use]
    pub fn subdir(&self, list_name: &str, subdir: &str) -> PathBuf {
        self.list_dir(list_name).join(subdir)
    }

    /// Write raw message bytes under the list, returning the file path
    pub fn write(&self, list_name: &str, hashcode: &str, raw: &[u8]) -> Result<PathBuf> {
        let dir = self.list_dir(list_name);
        ensure_shared_dir(&dir)?;
        let path = dir.join(hashcode);
        fs::write(&path, raw)?;
        debug!(path = %path.display(), bytes = raw.len(), "message file written");
        Ok(path)
    }

    /// Read raw message bytes back
    pub fn read(&self, list_name: &str, hashcode: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.message_path(list_name, hashcode))?)
    }

    /// Read a message body, substituting a diagnostic placeholder when the
    /// backing file is missing or unreadable.
    ///
    /// Historical data loss is tolerated but logged; callers get a readable
    /// marker instead of an error.
    #[must_use]
    pub fn read_or_placeholder(&self, list_name: &str, hashcode: &str) -> String {
        let path = self.message_path(list_name, hashcode);
        match fs::read(&path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(_) => {
                let msg = format!("Error reading message file: {}", path.display());
                warn!("{msg}");
                msg
            }
        }
    }

    /// True if the message file exists on disk
    #[must_use]
    pub fn exists(&self, list_name: &str, hashcode: &str) -> bool {
        self.message_path(list_name, hashcode).exists()
    }

    /// Move a message file into one of the list's auxiliary subdirectories.
    ///
    /// A single rename, never a copy-then-delete, so there is no window
    /// where neither location has the file. Returns `Ok(false)` when the
    /// source file is already absent.
    pub fn relocate(&self, list_name: &str, hashcode: &str, target_subdir: &str) -> Result<bool> {
        let source = self.message_path(list_name, hashcode);
        let target_dir = self.subdir(list_name, target_subdir);
        ensure_shared_dir(&target_dir)?;
        let target = target_dir.join(hashcode);

        match fs::rename(&source, &target) {
            Ok(()) => {
                info!(
                    "message file moved: {} => {}",
                    source.display(),
                    target_dir.display()
                );
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %source.display(), "no message file to relocate");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write an extracted attachment under the list's `_attachments`
    /// directory, returning the file path
    pub fn write_attachment(
        &self,
        list_name: &str,
        filename: &str,
        data: &[u8],
    ) -> Result<PathBuf> {
        let dir = self.subdir(list_name, ATTACHMENTS_DIR);
        ensure_shared_dir(&dir)?;
        let path = dir.join(filename);
        fs::write(&path, data)?;
        debug!(path = %path.display(), bytes = data.len(), "attachment file written");
        Ok(path)
    }

    /// Preserve an unparseable inbound message under `_failed`, keyed by
    /// its content hash so repeated deliveries land on the same file.
    pub fn write_failed(&self, list_name: &str, raw: &[u8]) -> Result<PathBuf> {
        let dir = self.subdir(list_name, FAILED_DIR);
        ensure_shared_dir(&dir)?;
        let path = dir.join(compute_hashcode(raw));
        fs::write(&path, raw)?;
        warn!(path = %path.display(), "unparseable message preserved");
        Ok(path)
    }
}

/// Create a directory shared between archiving processes.
///
/// Tolerates the already-exists race: concurrent creators must not fail on
/// each other, so errors from `create_dir_all` are only surfaced when the
/// directory still does not exist afterwards.
fn ensure_shared_dir(path: &Path) -> Result<()> {
    if let Err(e) = fs::create_dir_all(path) {
        if !path.is_dir() {
            return Err(e.into());
        }
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(SHARED_DIR_MODE);
        if let Err(e) = fs::set_permissions(path, perms) {
            // Non-fatal: the tree may be owned by another archiving user
            debug!(path = %path.display(), error = %e, "could not set shared directory mode");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashcode_is_stable_and_filename_safe() {
        let a = compute_hashcode(b"message body");
        let b = compute_hashcode(b"message body");
        assert_eq!(a, b);
        assert_eq!(a.len(), 28);
        assert!(!a.contains('/'));
        assert_ne!(a, compute_hashcode(b"other body"));
    }
}
