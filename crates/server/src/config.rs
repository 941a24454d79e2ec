//! Server configuration: deployment knobs layered on top of [`braid_core::CollabConfig`].

use std::path::PathBuf;

use braid_core::CollabConfig;

/// Top-level server configuration, matching the teacher's `ChatServerConfig`/`with_base_dir`
/// pattern: a struct with sane defaults, environment overrides for the handful of
/// deployment-varying knobs, and a constructor that roots storage under one base directory.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub storage_dir: PathBuf,
    pub database_path: PathBuf,
    pub bind_port: u16,
    pub collab: CollabConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let storage_dir = std::env::var("BRAID_ROOT").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("braid_data"));
        Self {
            database_path: storage_dir.join("wiki.sqlite"),
            storage_dir,
            bind_port: std::env::var("PORT").ok().and_then(|s| s.parse().ok()).unwrap_or(3001),
            collab: CollabConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let storage_dir = base_dir.into();
        Self { database_path: storage_dir.join("wiki.sqlite"), storage_dir, ..Self::default() }
    }

    pub async fn ensure_dirs(&self) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.storage_dir).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_base_dir_roots_database_under_it() {
        let config = ServerConfig::with_base_dir("/tmp/example-wiki");
        assert_eq!(config.database_path, PathBuf::from("/tmp/example-wiki/wiki.sqlite"));
    }
}
