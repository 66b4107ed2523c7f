//! Stored instruction text, looked up by composite key

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::config::{InstructionEntry, InstructionsConfig};

/// Composite lookup key, rendered as `partition/name`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct InstructionKey {
    pub partition: String,
    pub name: String,
}

impl InstructionKey {
    pub fn new(partition: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for InstructionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.partition, self.name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InstructionError {
    #[error("Failed to read instruction file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse instruction file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("No instruction stored for key '{0}'")]
    Missing(InstructionKey),
}

/// Key/value source of instruction text
#[async_trait]
pub trait InstructionStore: Send + Sync {
    async fn fetch(&self, key: &InstructionKey) -> Result<Option<String>, InstructionError>;

    /// Fail unless `key` resolves to some text
    async fn require(&self, key: &InstructionKey) -> Result<String, InstructionError> {
        self.fetch(key)
            .await?
            .ok_or_else(|| InstructionError::Missing(key.clone()))
    }
}

/// In-memory store built from configuration
#[derive(Debug, Default)]
pub struct StaticInstructionStore {
    entries: HashMap<InstructionKey, String>,
}

impl StaticInstructionStore {
    pub fn new(entries: impl IntoIterator<Item = InstructionEntry>) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.key, e.text)).collect(),
        }
    }

    /// Inline entries first, then the optional file; file entries win on conflict
    pub fn from_config(config: &InstructionsConfig) -> Result<Self, InstructionError> {
        let mut store = Self::new(config.entries.iter().cloned());

        if let Some(ref path) = config.file {
            let loaded = load_entries(path)?;
            tracing::info!(path = %path, count = loaded.len(), "Loaded instruction file");
            store.entries.extend(loaded.into_iter().map(|e| (e.key, e.text)));
        }

        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl InstructionStore for StaticInstructionStore {
    async fn fetch(&self, key: &InstructionKey) -> Result<Option<String>, InstructionError> {
        Ok(self.entries.get(key).cloned())
    }
}

fn load_entries(path: impl AsRef<Path>) -> Result<Vec<InstructionEntry>, InstructionError> {
    let display = path.as_ref().display().to_string();
    let contents = std::fs::read_to_string(&path).map_err(|source| InstructionError::Io {
        path: display.clone(),
        source,
    })?;
    serde_yaml::from_str(&contents).map_err(|source| InstructionError::Parse {
        path: display,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn entry(partition: &str, name: &str, text: &str) -> InstructionEntry {
        InstructionEntry {
            key: InstructionKey::new(partition, name),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_key_display() {
        assert_eq!(InstructionKey::new("prompts", "comment").to_string(), "prompts/comment");
    }

    #[tokio::test]
    async fn test_fetch_inline_entries() {
        let store = StaticInstructionStore::new(vec![entry("prompts", "comment", "Be witty")]);

        let found = store.fetch(&InstructionKey::new("prompts", "comment")).await.unwrap();
        assert_eq!(found.as_deref(), Some("Be witty"));

        let missing = store.fetch(&InstructionKey::new("prompts", "other")).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_require_missing_key() {
        let store = StaticInstructionStore::default();
        let err = store
            .require(&InstructionKey::new("prompts", "comment"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("prompts/comment"));
    }

    #[tokio::test]
    async fn test_from_config_file_overrides_inline() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
- partition: prompts
  name: comment
  text: From file
- partition: prompts
  name: review
  text: Review text
"#
        )
        .unwrap();

        let config = InstructionsConfig {
            work_item_key: None,
            entries: vec![entry("prompts", "comment", "Inline")],
            file: Some(file.path().to_string_lossy().to_string()),
        };

        let store = StaticInstructionStore::from_config(&config).unwrap();
        assert_eq!(store.len(), 2);
        let text = store.require(&InstructionKey::new("prompts", "comment")).await.unwrap();
        assert_eq!(text, "From file");
    }

    #[test]
    fn test_from_config_missing_file() {
        let config = InstructionsConfig {
            file: Some("/nonexistent/instructions.yaml".to_string()),
            ..Default::default()
        };
        let err = StaticInstructionStore::from_config(&config).unwrap_err();
        assert!(matches!(err, InstructionError::Io { .. }));
    }

    #[test]
    fn test_from_config_bad_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not: [a list").unwrap();

        let config = InstructionsConfig {
            file: Some(file.path().to_string_lossy().to_string()),
            ..Default::default()
        };
        let err = StaticInstructionStore::from_config(&config).unwrap_err();
        assert!(matches!(err, InstructionError::Parse { .. }));
    }
}
