//! # Configuration
//!
//! @title Configuration Discovery and Defaults
//! @author Ramprasad
//!
//! Reads the optional `imdbug.json` configuration file. Lookup order:
//!
//! 1. The path given with `--config`
//! 2. The path in the `IMDBUG_CONFIG` environment variable
//! 3. `imdbug.json` in the current working directory
//!
//! A file named explicitly (1 or 2) must exist and parse. When no file is
//! found the defaults below apply. CLI flags override file values.
//!
//! ```json
//! {
//!   "segment_depth": 8,
//!   "default_model": "TokenRisk",
//!   "token_risk": { "threshold": 0.5, "lexicon": "lexicon.json" },
//!   "external_models": [
//!     { "label": "LineVul", "detail": "...", "command": "python3",
//!       "args": ["bridges/linevul.py"], "load_args": ["bridges/linevul.py", "--warmup"] }
//!   ]
//! }
//! ```

use crate::error::{ImdbugError, Result};
use crate::parser::DEFAULT_MAX_DEPTH;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming a configuration file.
pub const CONFIG_ENV: &str = "IMDBUG_CONFIG";

/// File name looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "imdbug.json";

/// Model used when neither the CLI nor the configuration names one.
pub const DEFAULT_MODEL: &str = "TokenRisk";

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Levels below the syntax tree root inspected for function definitions.
    pub segment_depth: usize,

    /// Label of the model used when none is requested.
    pub default_model: String,

    /// Settings of the built-in TokenRisk model.
    pub token_risk: TokenRiskConfig,

    /// External-process models to register.
    pub external_models: Vec<ExternalModelConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            segment_depth: DEFAULT_MAX_DEPTH,
            default_model: DEFAULT_MODEL.to_string(),
            token_risk: TokenRiskConfig::default(),
            external_models: Vec::new(),
        }
    }
}

/// Settings of the TokenRisk model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenRiskConfig {
    /// Probability above which a function is called vulnerable.
    pub threshold: f64,

    /// Optional JSON object `{ "token": weight }` merged over the built-in lexicon.
    pub lexicon: Option<PathBuf>,
}

impl Default for TokenRiskConfig {
    fn default() -> Self {
        Self {
            threshold: crate::models::DEFAULT_THRESHOLD,
            lexicon: None,
        }
    }
}

/// An external detection model driven over stdin/stdout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalModelConfig {
    pub label: String,

    #[serde(default = "default_external_detail")]
    pub detail: String,

    /// Program to run, either a path or a name looked up in `PATH`.
    pub command: String,

    /// Arguments for inference runs.
    #[serde(default)]
    pub args: Vec<String>,

    /// Arguments for the one-time load run. No load run when empty.
    #[serde(default)]
    pub load_args: Vec<String>,
}

fn default_external_detail() -> String {
    "An external detection model".to_string()
}

impl AppConfig {
    /// Reads a configuration file.
    ///
    /// Relative lexicon paths are resolved against the file's directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ImdbugError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut config: AppConfig =
            serde_json::from_str(&contents).map_err(|e| ImdbugError::Config {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        if let (Some(lexicon), Some(base)) = (config.token_risk.lexicon.as_ref(), path.parent()) {
            if lexicon.is_relative() {
                config.token_risk.lexicon = Some(base.join(lexicon));
            }
        }

        config.validate(path)?;
        Ok(config)
    }

    /// Finds and reads the configuration following the documented lookup order.
    ///
    /// Returns the configuration together with the file it came from, if any.
    pub fn discover(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            return Ok((Self::from_file(path)?, Some(path.to_path_buf())));
        }

        if let Some(from_env) = std::env::var_os(CONFIG_ENV) {
            let path = PathBuf::from(from_env);
            return Ok((Self::from_file(&path)?, Some(path)));
        }

        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.is_file() {
            return Ok((Self::from_file(&local)?, Some(local)));
        }

        log::debug!("No configuration file found, using defaults");
        Ok((Self::default(), None))
    }

    fn validate(&self, path: &Path) -> Result<()> {
        let invalid = |reason: String| ImdbugError::Config {
            path: path.to_path_buf(),
            reason,
        };

        if self.segment_depth == 0 {
            return Err(invalid("segment_depth must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.token_risk.threshold) {
            return Err(invalid(format!(
                "token_risk.threshold must lie in [0, 1], got {}",
                self.token_risk.threshold
            )));
        }
        for model in &self.external_models {
            if model.label.trim().is_empty() || model.command.trim().is_empty() {
                return Err(invalid(
                    "external models need a non-empty label and command".to_string(),
                ));
            }
        }

        Ok(())
    }
}
