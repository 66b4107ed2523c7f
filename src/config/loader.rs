use std::path::Path;

use super::{AppConfig, ConfigError};

/// Load configuration from a YAML file and validate it
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(ConfigError::NotFound(path.display().to_string()));
    }

    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_yaml::from_str(&content)?;
    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::BackendId;
    use crate::config::{SecretsConfig, ServeMode};

    #[test]
    fn test_load_missing_config() {
        let result = load_config("/nonexistent/config.yaml");
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_config_invalid_yaml() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let temp_file = temp_dir.path().join("invalid.yaml");
        std::fs::write(&temp_file, "invalid: yaml: content: [").unwrap();

        let result = load_config(&temp_file);
        assert!(matches!(result.unwrap_err(), ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_config_valid() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let temp_file = temp_dir.path().join("config.yaml");

        let config_content = r#"
server:
  port: 8066
  host: "0.0.0.0"

mode: streaming
default_backend: openai

fallback:
  enabled: false

providers:
  openai:
    url: "http://127.0.0.1:18080/openai/v1"
    model: "gpt-5-nano"
    timeout_seconds: 10
  xai:
    url: "http://127.0.0.1:18080/xai/v1"
    model: "grok-4-1-fast-non-reasoning"

secrets:
  source: file
  path: "test_configs/secrets.json"

instructions:
  work_item_key:
    partition: "prompts"
    name: "comment"
  entries:
    - partition: "prompts"
      name: "comment"
      text: "Write one short comment."

streaming:
  idle_timeout_seconds: 5

cors:
  allowed_origins:
    - "chrome-extension://abcdef"
"#;
        std::fs::write(&temp_file, config_content).unwrap();

        let config = load_config(&temp_file).unwrap();
        assert_eq!(config.server.port, 8066);
        assert_eq!(config.mode, ServeMode::Streaming);
        assert_eq!(config.default_backend, BackendId::OpenAi);
        assert!(!config.fallback.enabled);
        assert_eq!(config.providers.openai.timeout_seconds, 10);
        assert_eq!(config.providers.xai.timeout_seconds, 60);
        assert!(matches!(config.secrets, SecretsConfig::File { .. }));
        assert_eq!(config.instructions.entries.len(), 1);
        assert_eq!(config.streaming.idle_timeout_seconds, 5);
        assert_eq!(config.cors.allowed_origins.len(), 1);
    }

    #[test]
    fn test_load_config_fails_validation() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let temp_file = temp_dir.path().join("config.yaml");
        std::fs::write(
            &temp_file,
            r#"
server:
  port: 8066
  host: "0.0.0.0"
providers:
  openai:
    url: "http://localhost/v1"
    model: ""
"#,
        )
        .unwrap();

        let result = load_config(&temp_file);
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_config_from_file() {
        let result = AppConfig::from_file("/nonexistent/path.yaml");
        assert!(result.is_err());
    }
}
