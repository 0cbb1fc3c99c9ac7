//! Keeps the session between invocations as a JSON file.

use std::io::Write;
use std::path::Path;

use rankgrid_client::{Session, StoredSession};

/// Read the stored session, or an empty one when the file does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub(crate) fn load(path: &Path) -> anyhow::Result<StoredSession> {
    if !path.exists() {
        return Ok(StoredSession::default());
    }
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read session file {}: {e}", path.display()))?;
    serde_json::from_str(&raw).map_err(|e| {
        anyhow::anyhow!(
            "session file {} is corrupt ({e}); delete it and run `rankgrid login`",
            path.display()
        )
    })
}

/// Write the current session to `path`, creating parent directories.
///
/// The file holds the login cookie and CSRF token, so on unix it is only
/// readable by its owner.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub(crate) async fn save(path: &Path, session: &Session) -> anyhow::Result<()> {
    let stored = session.export().await;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            anyhow::anyhow!("failed to create session directory {}: {e}", parent.display())
        })?;
    }
    let json = serde_json::to_string_pretty(&stored)?;
    write_private(path, json.as_bytes())
        .map_err(|e| anyhow::anyhow!("failed to write session file {}: {e}", path.display()))?;
    tracing::debug!(path = %path.display(), "session saved");
    Ok(())
}

fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    // `mode` only applies on creation; tighten files left by older runs.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(contents)?;
    file.flush()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn missing_file_is_an_empty_session() {
        let dir = tempfile::tempdir().unwrap();
        let stored = load(&dir.path().join("session.json")).unwrap();
        assert_eq!(stored, StoredSession::default());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");
        let session = Session::restore(
            StoredSession {
                csrf_token: Some("tok".to_string()),
                authenticated: true,
                email: Some("owner@pizzaplace.com".to_string()),
                ..StoredSession::default()
            },
            Duration::from_secs(2),
        );

        save(&path, &session).await.unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded, session.export().await);
    }

    #[test]
    fn corrupt_file_points_at_login() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = load(&path).unwrap_err();
        assert!(err.to_string().contains("rankgrid login"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{}").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let session = Session::restore(
            StoredSession {
                cookies: std::collections::BTreeMap::from([(
                    "sessionid".to_string(),
                    "s-42".to_string(),
                )]),
                csrf_token: Some("tok".to_string()),
                authenticated: true,
                ..StoredSession::default()
            },
            Duration::from_secs(2),
        );
        save(&path, &session).await.unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600, "mode was {mode:o}");

        let fresh = dir.path().join("fresh").join("session.json");
        save(&fresh, &session).await.unwrap();
        let mode = std::fs::metadata(&fresh).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0, "mode was {mode:o}");
    }
}
