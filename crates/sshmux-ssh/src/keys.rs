//! Private-key path resolution with sanitized failures.
//!
//! A leading `~` expands to the process user's home directory. Any
//! component containing `..` is rejected, as is any path under the system
//! prefixes below — including symlinks that resolve into them. Failures
//! surface only the three canonical messages defined on [`SshError`];
//! absolute paths and home-directory strings never appear in errors.

use std::path::{Path, PathBuf};

use crate::error::{Result, SshError};

const FORBIDDEN_PREFIXES: &[&str] = &["/etc/", "/proc/", "/sys/", "/dev/", "/boot/", "/root/"];

/// Resolve a user-supplied key path to a canonical on-disk path.
pub fn resolve_key_path(raw: &str) -> Result<PathBuf> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SshError::InvalidPath);
    }

    let expanded = expand_tilde(trimmed)?;

    if expanded
        .components()
        .any(|c| c.as_os_str().to_string_lossy().contains(".."))
    {
        return Err(SshError::InvalidPath);
    }
    if is_forbidden(&expanded) {
        return Err(SshError::InvalidPath);
    }

    // Canonicalization resolves symlinks; a link into a forbidden prefix is
    // refused the same as a direct path.
    let canonical = expanded.canonicalize().map_err(sanitize_io)?;
    if is_forbidden(&canonical) {
        return Err(SshError::InvalidPath);
    }
    Ok(canonical)
}

/// Resolve and read a key file, with sanitized errors throughout.
pub fn read_key_file(raw: &str) -> Result<String> {
    let path = resolve_key_path(raw)?;
    std::fs::read_to_string(path).map_err(sanitize_io)
}

fn expand_tilde(path: &str) -> Result<PathBuf> {
    if path == "~" {
        return dirs::home_dir().ok_or(SshError::InvalidPath);
    }
    if let Some(rest) = path.strip_prefix("~/") {
        return Ok(dirs::home_dir().ok_or(SshError::InvalidPath)?.join(rest));
    }
    Ok(PathBuf::from(path))
}

fn is_forbidden(path: &Path) -> bool {
    let text = path.to_string_lossy();
    FORBIDDEN_PREFIXES.iter().any(|prefix| text.starts_with(prefix))
}

fn sanitize_io(e: std::io::Error) -> SshError {
    match e.kind() {
        std::io::ErrorKind::PermissionDenied => SshError::KeyPermissionDenied,
        _ => SshError::KeyNotAccessible,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("sshmux-keys-{}-{name}", std::process::id()))
    }

    #[test]
    fn traversal_components_are_rejected() {
        assert!(matches!(
            resolve_key_path("/tmp/../etc/passwd"),
            Err(SshError::InvalidPath)
        ));
        assert!(matches!(
            resolve_key_path("keys/../../secret"),
            Err(SshError::InvalidPath)
        ));
    }

    #[test]
    fn system_prefixes_are_rejected() {
        for path in [
            "/etc/ssh/ssh_host_rsa_key",
            "/proc/self/environ",
            "/sys/kernel/x",
            "/dev/null",
            "/boot/vmlinuz",
            "/root/.ssh/id_rsa",
        ] {
            assert!(
                matches!(resolve_key_path(path), Err(SshError::InvalidPath)),
                "{path} must be refused"
            );
        }
    }

    #[test]
    fn missing_file_is_not_accessible() {
        let err = resolve_key_path("/tmp/sshmux-definitely-missing-key").unwrap_err();
        assert!(matches!(err, SshError::KeyNotAccessible));
    }

    #[test]
    fn error_messages_are_canonical_and_path_free() {
        let err = resolve_key_path("/tmp/sshmux-definitely-missing-key").unwrap_err();
        assert_eq!(err.to_string(), "Key file not accessible");

        let err = resolve_key_path("/etc/shadow").unwrap_err();
        assert_eq!(err.to_string(), "Invalid path");
    }

    #[test]
    fn readable_file_resolves() {
        let path = temp_path("ok");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "not really a key").unwrap();

        let resolved = resolve_key_path(path.to_str().unwrap()).unwrap();
        assert!(resolved.is_absolute());
        assert!(read_key_file(path.to_str().unwrap()).is_ok());

        let _ = std::fs::remove_file(path);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_into_forbidden_prefix_is_refused() {
        let link = temp_path("link");
        let _ = std::fs::remove_file(&link);
        std::os::unix::fs::symlink("/etc/hostname", &link).unwrap();

        let err = resolve_key_path(link.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, SshError::InvalidPath));

        let _ = std::fs::remove_file(link);
    }

    #[test]
    fn empty_path_is_invalid() {
        assert!(matches!(resolve_key_path("   "), Err(SshError::InvalidPath)));
    }
}
