//! The single piece of on-disk state: the listening port as ASCII, written
//! under the working directory on start and removed on graceful stop.

use sshmux_core::config::PORT_FILE_NAME;
use std::path::{Path, PathBuf};
use tracing::warn;

pub fn path_in(dir: &Path) -> PathBuf {
    dir.join(PORT_FILE_NAME)
}

pub fn write(dir: &Path, port: u16) -> std::io::Result<()> {
    std::fs::write(path_in(dir), port.to_string())
}

pub fn remove(dir: &Path) {
    if let Err(e) = std::fs::remove_file(path_in(dir)) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(error = %e, "failed to remove port file");
        }
    }
}
