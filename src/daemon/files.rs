//! Filesystem side effects requested by clients.

use anyhow::{Context, Result, bail};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::debug;

/// Whether `path` exists. An empty path never does and is not looked up.
pub async fn path_exists(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Open `path` in the platform's file manager.
///
/// Returns once the opener has started; it is waited on in the background.
pub async fn open_folder(path: &str) -> Result<()> {
    if path.trim().is_empty() {
        bail!("No folder to open");
    }
    if !path_exists(path).await {
        bail!("Folder does not exist: {}", path);
    }

    launch(opener(), path)?;
    Ok(())
}

/// Start `program path` and reap it when it exits.
fn launch(program: &str, path: &str) -> Result<JoinHandle<()>> {
    let mut child = Command::new(program)
        .arg(path)
        .spawn()
        .with_context(|| format!("Failed to open {}", path))?;

    let program = program.to_string();
    Ok(tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => debug!(%program, %status, "Folder opener exited"),
            Err(e) => debug!(%program, error = %e, "Failed to wait on folder opener"),
        }
    }))
}

/// Delete an install directory if it is still there.
pub async fn remove_install_dir(path: &str) -> Result<()> {
    if !path_exists(path).await {
        return Ok(());
    }
    tokio::fs::remove_dir_all(path)
        .await
        .with_context(|| format!("Failed to delete {}", path))
}

fn opener() -> &'static str {
    if cfg!(target_os = "windows") {
        "explorer"
    } else if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_path_exists() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().to_string_lossy().to_string();

        assert!(path_exists(&dir).await);
        assert!(!path_exists(&format!("{}/missing", dir)).await);
        assert!(!path_exists("").await);
        assert!(!path_exists("   ").await);
    }

    #[tokio::test]
    async fn test_remove_install_dir() {
        let temp = tempfile::tempdir().unwrap();
        let install = temp.path().join("game");
        std::fs::create_dir_all(install.join("bin")).unwrap();
        let install = install.to_string_lossy().to_string();

        remove_install_dir(&install).await.unwrap();
        assert!(!path_exists(&install).await);

        // Already gone
        remove_install_dir(&install).await.unwrap();
    }

    #[tokio::test]
    async fn test_open_folder_rejects_missing_paths() {
        assert!(open_folder("").await.is_err());
        assert!(open_folder("/definitely/not/here").await.is_err());
    }

    /// Children of this process that have exited but were never waited on.
    #[cfg(target_os = "linux")]
    fn zombie_children() -> usize {
        let me = std::process::id().to_string();
        std::fs::read_dir("/proc")
            .unwrap()
            .filter_map(|entry| std::fs::read_to_string(entry.ok()?.path().join("stat")).ok())
            .filter(|stat| {
                // Fields after the parenthesised command name: state, ppid, ...
                let Some((_, rest)) = stat.rsplit_once(") ") else {
                    return false;
                };
                let mut fields = rest.split_whitespace();
                fields.next() == Some("Z") && fields.next() == Some(me.as_str())
            })
            .count()
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_opener_processes_are_reaped() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().to_string_lossy().to_string();

        let handles: Vec<_> = (0..5).map(|_| launch("true", &dir).unwrap()).collect();
        for handle in handles {
            tokio::time::timeout(std::time::Duration::from_secs(5), handle)
                .await
                .unwrap()
                .unwrap();
        }

        assert_eq!(zombie_children(), 0);
    }
}
