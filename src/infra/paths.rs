// src/infra/paths.rs — Path management
//
// All paths respect the CHARLA_HOME environment variable for isolation.
// When CHARLA_HOME is set, config and data both live under that directory.
// When unset, config uses ~/.charla/ and data uses the platform data dir.

use directories::ProjectDirs;
use std::path::PathBuf;
use std::sync::OnceLock;

static PROJECT_DIRS: OnceLock<ProjectDirs> = OnceLock::new();

fn project_dirs() -> &'static ProjectDirs {
    PROJECT_DIRS.get_or_init(|| {
        ProjectDirs::from("", "", "charla").expect("Could not determine home directory")
    })
}

fn charla_home() -> Option<PathBuf> {
    std::env::var_os("CHARLA_HOME").map(PathBuf::from)
}

/// Configuration directory: $CHARLA_HOME/ or ~/.charla/
pub fn config_dir() -> PathBuf {
    if let Some(home) = charla_home() {
        return home;
    }
    dirs_home().join(".charla")
}

/// Data directory: $CHARLA_HOME/data/ or the platform-local data dir
pub fn data_dir() -> PathBuf {
    if let Some(home) = charla_home() {
        return home.join("data");
    }
    project_dirs().data_local_dir().to_path_buf()
}

/// Home directory
pub fn dirs_home() -> PathBuf {
    directories::BaseDirs::new()
        .expect("Could not determine home directory")
        .home_dir()
        .to_path_buf()
}

/// Chat history database path
pub fn db_path() -> PathBuf {
    data_dir().join("charla.db")
}

/// Config file path
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Ensure all required directories exist
pub async fn ensure_dirs() -> anyhow::Result<()> {
    let dirs = [config_dir(), data_dir()];

    for dir in &dirs {
        tokio::fs::create_dir_all(dir).await?;
    }

    Ok(())
}
