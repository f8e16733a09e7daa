//! Filesystem helpers shared by the channel and the image store.

use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// Replace `path` with `bytes` so readers never observe a partial write.
///
/// The bytes land in a temporary file next to the target, are flushed to
/// disk, and the temporary file is renamed over the target. This orders a
/// single writer against readers; it does not arbitrate between writers.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
