mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./config.toml",
        "./reelhouse.toml",
        "~/.config/reelhouse/config.toml",
        "/etc/reelhouse/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::info!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.rate_limit.per_second == 0 {
        anyhow::bail!("rate_limit.per_second must be at least 1");
    }
    if config.rate_limit.burst == 0 {
        anyhow::bail!("rate_limit.burst must be at least 1");
    }

    if config.streaming.chunk_size == 0 {
        anyhow::bail!("streaming.chunk_size must be at least 1 byte");
    }

    if config.transcode.workers == 0 {
        anyhow::bail!("transcode.workers must be at least 1");
    }
    if config.transcode.queue_capacity == 0 {
        anyhow::bail!("transcode.queue_capacity must be at least 1");
    }
    for name in &config.transcode.qualities {
        reelhouse_common::quality::lookup(name)
            .with_context(|| format!("transcode.qualities contains '{name}'"))?;
    }

    if !config.storage.videos_dir.exists() {
        tracing::warn!(
            "Videos directory does not exist yet: {:?}",
            config.storage.videos_dir
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.rate_limit.per_second, 10);
        assert_eq!(config.rate_limit.burst, 5);
        assert_eq!(config.streaming.chunk_size, 1 << 20);
        assert_eq!(config.streaming.cache_max_age_secs, 3600);
        assert_eq!(
            config.transcode.qualities,
            vec!["1080p", "720p", "480p", "360p"]
        );
        assert!(config.transcode.enabled);
        validate_config(&config).unwrap();
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [rate_limit]
            burst = 20

            [transcode]
            qualities = ["720p"]
            workers = 4

            [tools]
            ffmpeg_path = "/opt/ffmpeg/bin/ffmpeg"
            "#,
        )
        .unwrap();
        assert_eq!(config.rate_limit.burst, 20);
        assert_eq!(config.rate_limit.per_second, 10);
        assert_eq!(config.transcode.qualities, vec!["720p"]);
        assert_eq!(config.transcode.workers, 4);
        assert_eq!(config.transcode.queue_capacity, 32);
        assert!(config.tools.ffmpeg_path.is_some());
    }

    #[test]
    fn unknown_quality_is_rejected() {
        let mut config = Config::default();
        config.transcode.qualities = vec!["720p".into(), "8k".into()];
        let err = validate_config(&config).unwrap_err();
        assert!(format!("{err:#}").contains("8k"));
    }

    #[test]
    fn zero_values_are_rejected() {
        let mut config = Config::default();
        config.rate_limit.burst = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.streaming.chunk_size = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.transcode.workers = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.server.port = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn load_config_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reelhouse.toml");
        std::fs::write(
            &path,
            "[server]\nport = 9000\n[storage]\nvideos_dir = \"/srv/videos\"\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.storage.videos_dir, std::path::PathBuf::from("/srv/videos"));
    }

    #[test]
    fn load_config_missing_file_errors() {
        assert!(load_config(Path::new("/nonexistent/reelhouse.toml")).is_err());
    }
}
