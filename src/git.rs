// src/git.rs

//! Refreshing a git-checked-out distribution definition
//!
//! Shells out to the system git binary. Failures report as false so a
//! cycle can still run against the stale checkout.

use std::path::Path;
use std::process::Command;
use tracing::{info, warn};

/// True when `path` holds a working git checkout
pub fn is_git_repository(path: &Path) -> bool {
    if !path.join(".git").is_dir() {
        return false;
    }

    match Command::new("git")
        .arg("-C")
        .arg(path)
        .arg("status")
        .output()
    {
        Ok(output) => output.status.success(),
        Err(e) => {
            warn!(
                "Error checking if {} is a git repository: {}",
                path.display(),
                e
            );
            false
        }
    }
}

/// Pull the latest changes for the checkout at `path`.
///
/// Pulls the current branch unless one is named. Not-a-repository and
/// pull failures are logged and reported as false.
pub fn refresh(path: &Path, remote: &str, branch: Option<&str>) -> bool {
    if !is_git_repository(path) {
        warn!("{} is not a git repository, skipping update", path.display());
        return false;
    }

    info!("Updating git repository at {}", path.display());

    let mut cmd = Command::new("git");
    cmd.arg("-C").arg(path).arg("pull").arg(remote);
    if let Some(branch) = branch {
        cmd.arg(branch);
    }

    match cmd.output() {
        Ok(output) if output.status.success() => {
            info!(
                "Git repository updated successfully: {}",
                String::from_utf8_lossy(&output.stdout).trim()
            );
            true
        }
        Ok(output) => {
            warn!(
                "Failed to update git repository: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
            false
        }
        Err(e) => {
            warn!("Error updating git repository: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_directory_is_not_a_repository() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_git_repository(dir.path()));
    }

    #[test]
    fn test_fake_git_dir_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        // A bare .git directory without repository contents fails git status
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        assert!(!is_git_repository(dir.path()));
    }

    #[test]
    fn test_refresh_skips_non_repository() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!refresh(dir.path(), "origin", None));
    }
}
