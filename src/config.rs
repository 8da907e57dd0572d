use crate::error::AppError;
use crate::services::classifier::model_manager::ModelType;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "config.json";

/// User settings, stored as JSON in the app config directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Which ONNX model to download and load.
    pub model: ModelType,
    /// Try GPU execution providers before falling back to the CPU.
    pub use_gpu: bool,
    /// Number of ranked labels returned per photo.
    pub top_k: usize,
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: ModelType::MobileNetV2,
            use_gpu: true,
            top_k: 3,
            log_filter: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn path_in(config_dir: &Path) -> PathBuf {
        config_dir.join(CONFIG_FILE_NAME)
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        let content = fs::read_to_string(path).map_err(|e| AppError {
            message: format!("Failed to read config {}: {}", path.display(), e),
        })?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Loads the config from `path`, writing the defaults there on first run.
    /// A broken file is replaced by defaults in memory only.
    ///
    /// Runs before logging is set up, so problems come back as a warning for
    /// the caller to log instead of being traced here.
    pub fn load_or_default(path: &Path) -> (Self, Option<String>) {
        if !path.exists() {
            let config = Self::default();
            let warning = config
                .save(path)
                .err()
                .map(|e| format!("could not write default config: {}", e));
            return (config, warning);
        }

        match Self::load(path) {
            Ok(config) => (config, None),
            Err(e) => (
                Self::default(),
                Some(format!("invalid config {}, using defaults: {}", path.display(), e)),
            ),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
