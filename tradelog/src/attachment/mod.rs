// Attachment store - maps (entity id, slot) to a file under the images root.

use crate::error::{Result, TradelogError};
use crate::fsutil;
use std::fs;
use std::path::{Path, PathBuf};

/// URL prefix stored paths are exposed under; documents reference their
/// screenshots as `/images/<entity>/<slot>.<ext>`.
pub const MOUNT_PATH: &str = "/images";

/// Upload ceiling, enforced before any bytes hit disk.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];
const DEFAULT_EXTENSION: &str = "jpg";

pub struct AttachmentStore {
    root: PathBuf,
    max_bytes: usize,
}

impl AttachmentStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(AttachmentStore {
            root,
            max_bytes: MAX_UPLOAD_BYTES,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `bytes` to `<root>/<entity_id>/<slot>.<ext>` and return the
    /// public path. File names are slot-deterministic, so re-uploading a
    /// slot overwrites the previous screenshot (last write wins).
    pub fn store(
        &self,
        entity_id: &str,
        slot: &str,
        original_name: Option<&str>,
        bytes: &[u8],
    ) -> Result<String> {
        validate_key(entity_id, "entity id")?;
        validate_key(slot, "slot")?;
        if bytes.is_empty() {
            return Err(TradelogError::Validation("empty upload".into()));
        }
        if bytes.len() > self.max_bytes {
            return Err(TradelogError::Validation(format!(
                "upload of {} bytes exceeds the {} byte limit",
                bytes.len(),
                self.max_bytes
            )));
        }
        let ext = resolve_extension(original_name)?;

        let dir = self.root.join(entity_id);
        fs::create_dir_all(&dir)?;
        let file = dir.join(format!("{slot}.{ext}"));
        fs::write(&file, bytes).map_err(|source| TradelogError::WriteFailure {
            path: file.display().to_string(),
            source,
        })?;

        if let Err(err) = fsutil::normalize_permissions(&dir, 0o755) {
            log::warn!("failed to normalize permissions on {}: {err}", dir.display());
        }
        if let Err(err) = fsutil::normalize_permissions(&file, 0o644) {
            log::warn!("failed to normalize permissions on {}: {err}", file.display());
        }

        Ok(format!("{MOUNT_PATH}/{entity_id}/{slot}.{ext}"))
    }
}

// Entity ids are uuids and slots are short role names; anything else (path
// separators, traversal, whitespace) is rejected before touching the disk.
fn validate_key(value: &str, what: &str) -> Result<()> {
    let ok = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'));
    if ok {
        Ok(())
    } else {
        Err(TradelogError::Validation(format!("invalid {what}: {value:?}")))
    }
}

fn resolve_extension(original_name: Option<&str>) -> Result<&'static str> {
    let Some(ext) = original_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
    else {
        return Ok(DEFAULT_EXTENSION);
    };

    let lower = ext.to_ascii_lowercase();
    IMAGE_EXTENSIONS
        .iter()
        .find(|&&known| known == lower)
        .copied()
        .ok_or_else(|| TradelogError::Validation(format!("unsupported image extension: .{ext}")))
}
