pub mod ask;
pub mod chats;
pub mod doctor;
pub mod ingest;
pub mod serve;
pub mod warehouse;

use std::path::{Path, PathBuf};

use dataclaw_config::AppConfig;

/// The config file in effect: the explicit one if given, else the default.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(AppConfig::default_config_path)
}

/// Load from an explicit path, or from `~/.dataclaw/config.toml`.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    };
    config.map_err(|e| format!("Failed to load config: {e}").into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_config_path_wins() {
        let explicit = Path::new("/srv/dataclaw/prod.toml");
        assert_eq!(config_path(Some(explicit)), explicit);
        assert_eq!(config_path(None), AppConfig::default_config_path());
    }
}
