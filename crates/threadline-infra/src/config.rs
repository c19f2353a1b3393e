//! Configuration loader for Threadline.
//!
//! Reads `config.toml` from the data directory (`~/.threadline/` in production)
//! and deserializes it into [`ChatConfig`]. Falls back to defaults when the
//! file is missing or malformed.

use std::path::{Path, PathBuf};

use threadline_types::config::ChatConfig;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "THREADLINE_DATA_DIR";

/// Resolve the data directory: `THREADLINE_DATA_DIR`, else `~/.threadline`.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".threadline")
}

/// Load configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`ChatConfig::default()`].
/// - If the file exists but cannot be read or parsed, logs a warning and
///   returns the default.
pub async fn load_config(data_dir: &Path) -> ChatConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return ChatConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return ChatConfig::default();
        }
    };

    match toml::from_str::<ChatConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            ChatConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use threadline_types::config::UnknownCommandPolicy;

    #[tokio::test]
    async fn load_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).await;
        assert_eq!(config.default_max_input_chars, 60_000);
        assert!(config.models.is_empty());
    }

    #[tokio::test]
    async fn load_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
credential_prefix = "key-"
unknown_command = "pass_through"

[models.gpt-4]
max_input_chars = 32000

[generation]
endpoint = "http://localhost:8080/generate"
timeout_secs = 30
"#,
        )
        .await
        .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.credential_prefix, "key-");
        assert_eq!(config.unknown_command, UnknownCommandPolicy::PassThrough);
        assert_eq!(config.max_input_chars("gpt-4"), 32_000);
        assert_eq!(config.max_input_chars("gpt-3.5-turbo"), 60_000);
        assert_eq!(config.generation.timeout_secs, 30);
    }

    #[tokio::test]
    async fn load_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.credential_prefix, "sk-");
    }

    #[test]
    fn resolve_data_dir_ends_with_threadline_or_env() {
        let dir = resolve_data_dir();
        match std::env::var(DATA_DIR_ENV) {
            Ok(value) if !value.is_empty() => assert_eq!(dir, PathBuf::from(value)),
            _ => assert!(dir.ends_with(".threadline")),
        }
    }
}
