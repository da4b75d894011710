//! Configuration management for the AptWise question bank.
//!
//! Configuration is layered, lowest precedence first:
//! - Built-in defaults
//! - Config file (`.aptwise/config.yaml` or `APTWISE_CONFIG`)
//! - Environment variables
//! - Command-line flags
//!
//! State (the on-disk vector index) lives under `.aptwise/` in the workspace.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Default collection name for the question bank.
pub const DEFAULT_COLLECTION: &str = "python_questions";

/// Default similarity threshold for near-duplicate detection.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.85;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .aptwise/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Directory holding the JSON question corpus
    pub data_dir: PathBuf,

    /// Directory of the persistent vector index (relative paths resolve against the workspace)
    pub index_path: PathBuf,

    /// Collection holding the question bank
    pub collection: String,

    /// Embedding provider settings
    pub embedding: EmbeddingSettings,

    /// Similarity at or above which two questions count as duplicates
    pub similarity_threshold: f32,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

/// Embedding provider selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingSettings {
    /// Provider name: "trigram" or "ollama"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Provider endpoint override (Ollama base URL)
    pub endpoint: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 384,
            endpoint: None,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    workspace: Option<WorkspaceSection>,
    bank: Option<BankSection>,
    embedding: Option<EmbeddingSection>,
    logging: Option<LoggingSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceSection {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BankSection {
    data_dir: Option<String>,
    index_path: Option<String>,
    collection: Option<String>,
    similarity_threshold: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EmbeddingSection {
    provider: Option<String>,
    model: Option<String>,
    dimensions: Option<usize>,
    endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            data_dir: PathBuf::from("data"),
            index_path: PathBuf::from(".aptwise/index"),
            collection: DEFAULT_COLLECTION.to_string(),
            embedding: EmbeddingSettings::default(),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            log_level: None,
            verbose: false,
            no_color: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from the config file, environment variables and defaults.
    ///
    /// Environment variables:
    /// - `APTWISE_WORKSPACE`: Override workspace path
    /// - `APTWISE_CONFIG`: Path to config file
    /// - `APTWISE_DATA_DIR`: Corpus directory
    /// - `APTWISE_INDEX_PATH`: Vector index directory
    /// - `APTWISE_COLLECTION`: Collection name
    /// - `APTWISE_EMBEDDING_PROVIDER` / `APTWISE_EMBEDDING_MODEL`
    /// - `APTWISE_SIMILARITY_THRESHOLD`: Duplicate threshold in [0, 1]
    /// - `OLLAMA_URL`: Ollama endpoint
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use aptwise_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Collection: {}", config.collection);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_from(None, None)
    }

    /// Load configuration with an explicit workspace and/or config file.
    ///
    /// Explicit arguments win over `APTWISE_WORKSPACE` and `APTWISE_CONFIG`;
    /// they are needed before the file is read, so they cannot wait for
    /// [`with_overrides`](Self::with_overrides).
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        let workspace =
            workspace.or_else(|| std::env::var("APTWISE_WORKSPACE").ok().map(PathBuf::from));
        if let Some(workspace) = workspace {
            config.workspace = workspace;
        }

        config.config_file =
            config_file.or_else(|| std::env::var("APTWISE_CONFIG").ok().map(PathBuf::from));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.aptwise_dir().join("config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        config.apply_env()?;
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides on top of file settings.
    fn apply_env(&mut self) -> AppResult<()> {
        if let Ok(dir) = std::env::var("APTWISE_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }

        if let Ok(path) = std::env::var("APTWISE_INDEX_PATH") {
            self.index_path = PathBuf::from(path);
        }

        if let Ok(collection) = std::env::var("APTWISE_COLLECTION") {
            self.collection = collection;
        }

        if let Ok(provider) = std::env::var("APTWISE_EMBEDDING_PROVIDER") {
            self.embedding.provider = provider;
        }

        if let Ok(model) = std::env::var("APTWISE_EMBEDDING_MODEL") {
            self.embedding.model = model;
        }

        if let Ok(endpoint) = std::env::var("OLLAMA_URL") {
            self.embedding.endpoint = Some(endpoint);
        }

        if let Ok(raw) = std::env::var("APTWISE_SIMILARITY_THRESHOLD") {
            self.similarity_threshold = raw.trim().parse().map_err(|e| {
                AppError::Config(format!(
                    "Invalid APTWISE_SIMILARITY_THRESHOLD '{}': {}",
                    raw, e
                ))
            })?;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            self.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            self.no_color = true;
        }

        Ok(())
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        Ok(self.merge_file(file))
    }

    fn merge_file(&self, file: ConfigFile) -> Self {
        let mut result = self.clone();

        if let Some(path) = file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(bank) = file.bank {
            if let Some(dir) = bank.data_dir {
                result.data_dir = PathBuf::from(dir);
            }
            if let Some(path) = bank.index_path {
                result.index_path = PathBuf::from(path);
            }
            if let Some(collection) = bank.collection {
                result.collection = collection;
            }
            if let Some(threshold) = bank.similarity_threshold {
                result.similarity_threshold = threshold;
            }
        }

        if let Some(embedding) = file.embedding {
            if let Some(provider) = embedding.provider {
                result.embedding.provider = provider;
            }
            if let Some(model) = embedding.model {
                result.embedding.model = model;
            }
            if let Some(dimensions) = embedding.dimensions {
                result.embedding.dimensions = dimensions;
            }
            if embedding.endpoint.is_some() {
                result.embedding.endpoint = embedding.endpoint;
            }
        }

        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        result
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Flags win over the environment and the config file.
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        data_dir: Option<PathBuf>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(data_dir) = data_dir {
            self.data_dir = data_dir;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .aptwise directory.
    pub fn aptwise_dir(&self) -> PathBuf {
        self.workspace.join(".aptwise")
    }

    /// Ensure the .aptwise directory exists.
    pub fn ensure_aptwise_dir(&self) -> AppResult<()> {
        let dir = self.aptwise_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .aptwise directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Corpus directory resolved against the workspace.
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.resolve(&self.data_dir)
    }

    /// Vector index directory resolved against the workspace.
    pub fn resolved_index_path(&self) -> PathBuf {
        self.resolve(&self.index_path)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.join(path)
        }
    }

    /// Validate settings that would otherwise fail deep inside the bank.
    pub fn validate(&self) -> AppResult<()> {
        let known_providers = ["trigram", "ollama"];
        if !known_providers.contains(&self.embedding.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                self.embedding.provider,
                known_providers.join(", ")
            )));
        }

        if self.embedding.dimensions == 0 {
            return Err(AppError::Config(
                "Embedding dimensions must be greater than zero".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(AppError::Config(format!(
                "Similarity threshold must be within [0.0, 1.0], got {}",
                self.similarity_threshold
            )));
        }

        if self.collection.trim().is_empty() {
            return Err(AppError::Config("Collection name must not be empty".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.collection, "python_questions");
        assert_eq!(config.embedding.provider, "trigram");
        assert_eq!(config.embedding.dimensions, 384);
        assert!((config.similarity_threshold - 0.85).abs() < f32::EPSILON);
        assert!(!config.verbose);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_aptwise_dir() {
        let config = AppConfig::default();
        assert!(config.aptwise_dir().ends_with(".aptwise"));
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default().with_overrides(
            Some(PathBuf::from("/srv/aptwise")),
            Some(PathBuf::from("corpus")),
            None,
            true,
            false,
        );

        assert_eq!(config.workspace, PathBuf::from("/srv/aptwise"));
        assert_eq!(config.resolved_data_dir(), PathBuf::from("/srv/aptwise/corpus"));
        assert!(config.verbose);
        assert_eq!(config.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_absolute_paths_are_not_rebased() {
        let mut config = AppConfig::default();
        config.index_path = PathBuf::from("/var/lib/aptwise/index");
        assert_eq!(config.resolved_index_path(), PathBuf::from("/var/lib/aptwise/index"));
    }

    #[test]
    fn test_merge_yaml_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(
            &path,
            r#"
bank:
  dataDir: seed
  collection: interview_bank
  similarityThreshold: 0.9
embedding:
  provider: ollama
  model: all-minilm
logging:
  color: false
"#,
        )
        .unwrap();

        let merged = AppConfig::default().merge_yaml(&path).unwrap();
        assert_eq!(merged.data_dir, PathBuf::from("seed"));
        assert_eq!(merged.collection, "interview_bank");
        assert!((merged.similarity_threshold - 0.9).abs() < f32::EPSILON);
        assert_eq!(merged.embedding.provider, "ollama");
        assert_eq!(merged.embedding.model, "all-minilm");
        assert_eq!(merged.embedding.dimensions, 384);
        assert!(merged.no_color);
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let mut config = AppConfig::default();
        config.similarity_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_explicit_workspace() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join(".aptwise")).unwrap();
        std::fs::write(
            temp.path().join(".aptwise").join("config.yaml"),
            "bank:\n  collection: from_file\n",
        )
        .unwrap();

        let config = AppConfig::load_from(Some(temp.path().to_path_buf()), None).unwrap();
        assert_eq!(config.workspace, temp.path());
        if std::env::var("APTWISE_COLLECTION").is_err() {
            assert_eq!(config.collection, "from_file");
        }
    }

    #[test]
    fn test_load_from_missing_workspace_fails() {
        let result = AppConfig::load_from(Some(PathBuf::from("/definitely/not/here")), None);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = AppConfig::default();
        config.embedding.provider = "word2vec".to_string();
        assert!(config.validate().is_err());
    }
}
