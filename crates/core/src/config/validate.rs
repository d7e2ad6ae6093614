use super::{types::Config, types::MAX_TIMEOUT_SECS, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Concurrency limit is positive and every timeout is within 1..=MAX_TIMEOUT_SECS
/// - Upstream base URLs are http(s)
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.orchestrator.max_concurrent_downloads == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.max_concurrent_downloads must be at least 1".to_string(),
        ));
    }

    let timeouts = [
        ("video_host.timeout_secs", config.video_host.timeout_secs),
        (
            "video_host.socket_timeout_secs",
            config.video_host.socket_timeout_secs,
        ),
        ("torrent_index.timeout_secs", config.torrent_index.timeout_secs),
        ("metadata.timeout_secs", config.metadata.timeout_secs),
    ];
    for (key, value) in timeouts {
        if value == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be 0",
                key
            )));
        }
        if value > MAX_TIMEOUT_SECS {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot exceed {} seconds",
                key, MAX_TIMEOUT_SECS
            )));
        }
    }

    for (key, url) in [
        ("torrent_index.base_url", &config.torrent_index.base_url),
        ("metadata.base_url", &config.metadata.base_url),
    ] {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "{} must be an http(s) URL, got {:?}",
                key, url
            )));
        }
    }

    if config.video_host.binary.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "video_host.binary cannot be empty".to_string(),
        ));
    }

    Ok(())
}
