//! Application settings.
//!
//! Loaded from `<config-dir>/default.toml`, overlaid by an optional
//! `local.toml` and `TOLK__`-prefixed environment variables. A missing or
//! malformed configuration is never fatal: the built-in defaults take over
//! with a warning, so the tool always starts. `local.toml` is also where the
//! tool remembers the last successfully loaded model path.

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::engine::EngineConfig;

/// Model file and load parameters.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ModelConfig {
    /// Path to the GGUF file; empty until a model has been loaded once.
    pub path: PathBuf,
    /// Layers offloaded to the GPU.
    pub gpu_layers: u32,
    /// Context window requested at load.
    pub context_size: u32,
}

/// Sampling parameters for translation passes.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GenerationConfig {
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
}

/// Translation defaults and the language list offered in the REPL.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TranslationConfig {
    pub default_target_language: String,
    pub default_flavor: String,
    pub languages: Vec<String>,
}

/// Logging configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace).
    pub level: String,
    /// Directory for the rolling log files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

/// All configuration, grouped by concern.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub model: ModelConfig,
    pub generation: GenerationConfig,
    pub translation: TranslationConfig,
    pub logging: LoggingConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            model: ModelConfig {
                path: PathBuf::new(),
                gpu_layers: 35,
                context_size: 4096,
            },
            generation: GenerationConfig {
                max_tokens: 1024,
                temperature: 0.7,
                top_p: 0.9,
            },
            translation: TranslationConfig {
                default_target_language: "English".to_string(),
                default_flavor: "Casual".to_string(),
                languages: [
                    "English",
                    "Japanese",
                    "Chinese",
                    "Korean",
                    "French",
                    "German",
                    "Spanish",
                    "Portuguese",
                    "Italian",
                    "Russian",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some(PathBuf::from("logs")),
            },
        }
    }
}

impl Settings {
    /// Loads settings from `config_dir`, falling back to the defaults when
    /// the directory or file is missing, unparsable, or fails validation.
    pub fn load(config_dir: &Path) -> Settings {
        match Self::try_load(config_dir) {
            Ok(settings) => {
                info!(config_dir = %config_dir.display(), "loaded settings");
                settings
            }
            Err(e) => {
                warn!(
                    config_dir = %config_dir.display(),
                    error = %e,
                    "could not load settings, using built-in defaults"
                );
                Settings::default()
            }
        }
    }

    /// Loads from default.toml, then local.toml if present, then
    /// environment variables (e.g. `TOLK__MODEL__GPU_LAYERS=0`).
    fn try_load(config_dir: &Path) -> Result<Settings, ConfigError> {
        let default_config = config_dir.join("default.toml");
        let local_config = config_dir.join("local.toml");

        let settings = Config::builder()
            .add_source(File::with_name(&default_config.to_string_lossy()))
            .add_source(File::with_name(&local_config.to_string_lossy()).required(false))
            .add_source(Environment::with_prefix("TOLK").separator("__"))
            .build()?
            .try_deserialize::<Settings>()?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.model.context_size == 0 {
            return Err(ConfigError::Message(
                "context_size must be greater than 0".to_string(),
            ));
        }

        if self.generation.max_tokens == 0 {
            return Err(ConfigError::Message(
                "max_tokens must be greater than 0".to_string(),
            ));
        }

        if self.generation.temperature < 0.0 {
            return Err(ConfigError::Message(format!(
                "temperature must not be negative, got: {}",
                self.generation.temperature
            )));
        }

        if !(0.0..=1.0).contains(&self.generation.top_p) {
            return Err(ConfigError::Message(format!(
                "top_p must be between 0.0 and 1.0, got: {}",
                self.generation.top_p
            )));
        }

        match self.logging.level.to_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => Ok(()),
            other => Err(ConfigError::Message(format!(
                "invalid logging level: {}. Must be one of: error, warn, info, debug, trace",
                other
            ))),
        }
    }

    /// Writes the current values to `local.toml` so they win over
    /// default.toml on the next start.
    pub fn save(&self, config_dir: &Path) -> Result<(), Box<dyn Error + Send + Sync>> {
        fs::create_dir_all(config_dir)?;
        let content = toml::to_string_pretty(self)?;
        fs::write(config_dir.join("local.toml"), content)?;
        info!(config_dir = %config_dir.display(), "saved settings to local.toml");
        Ok(())
    }

    /// The immutable parameter bundle handed to the engine at construction.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            gpu_layers: self.model.gpu_layers,
            context_size: self.model.context_size,
            max_tokens: self.generation.max_tokens,
            temperature: self.generation.temperature,
            top_p: self.generation.top_p,
        }
    }
}

/// `./config` next to the working directory, the conventional location.
pub fn default_config_dir() -> PathBuf {
    std::env::current_dir()
        .map(|dir| dir.join("config"))
        .unwrap_or_else(|_| PathBuf::from("config"))
}
