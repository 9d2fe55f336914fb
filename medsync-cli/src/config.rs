//! Data directory layout for medsync-cli.
//!
//! ```text
//! <data-dir>/
//!   medsync.toml   optional core configuration
//!   state.json     persisted queue, cache, endpoints and session
//! ```

use anyhow::{Context, Result};
use medsync_client::CoreConfig;
use std::path::{Path, PathBuf};

/// Configuration file name inside the data directory.
pub const CONFIG_FILE: &str = "medsync.toml";

/// State file name inside the data directory.
pub const STATE_FILE: &str = "state.json";

/// Load `medsync.toml` from the data directory, or defaults when absent.
pub fn load_core_config(data_dir: &Path) -> Result<CoreConfig> {
    let path = data_dir.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(CoreConfig::default());
    }
    CoreConfig::from_file(&path).with_context(|| format!("Failed to load {}", path.display()))
}

/// Path of the persisted state file.
pub fn state_path(data_dir: &Path) -> PathBuf {
    data_dir.join(STATE_FILE)
}

/// Set directory permissions to 0700 (owner only) on Unix.
/// No-op on non-Unix platforms.
pub async fn set_dir_permissions_0700(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
            .await
            .context("Failed to set directory permissions")?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
