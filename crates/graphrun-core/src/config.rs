use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GraphrunError, Result};
use crate::graph::DEFAULT_MAX_STEPS;

/// Top-level graphrun configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Step budget applied to graphs that do not declare `max_steps`.
    #[serde(default = "default_max_steps")]
    pub default_max_steps: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_max_steps: default_max_steps(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_max_steps() -> usize { DEFAULT_MAX_STEPS }
fn default_bind() -> String { "127.0.0.1:8000".to_string() }

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| GraphrunError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        toml::from_str(&expanded).map_err(|e| GraphrunError::Config(e.to_string()))
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| GraphrunError::Config(e.to_string()))
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                // Keep the reference when the variable is unset
                Err(_) => result.push_str(&format!("${{{}}}", var_name)),
            }
        } else {
            result.push(c);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("TEST_GRAPHRUN_BIND", "0.0.0.0:9000");
        let result = expand_env_vars("bind = \"${TEST_GRAPHRUN_BIND}\"");
        assert_eq!(result, "bind = \"0.0.0.0:9000\"");
        std::env::remove_var("TEST_GRAPHRUN_BIND");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("key = \"${NONEXISTENT_GRAPHRUN_VAR}\"");
        assert_eq!(result, "key = \"${NONEXISTENT_GRAPHRUN_VAR}\"");
    }

    #[test]
    fn test_defaults_from_empty_toml() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.engine.default_max_steps, 500);
        assert_eq!(config.gateway.bind, "127.0.0.1:8000");
    }

    #[test]
    fn test_partial_sections() {
        let config: AppConfig = toml::from_str(
            r#"
[engine]
default_max_steps = 25
"#,
        )
        .unwrap();
        assert_eq!(config.engine.default_max_steps, 25);
        assert_eq!(config.gateway.bind, "127.0.0.1:8000");
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config =
            AppConfig::load_or_default(Path::new("/nonexistent/graphrun-test.toml")).unwrap();
        assert_eq!(config.engine.default_max_steps, 500);
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let err = AppConfig::load(Path::new("/nonexistent/graphrun-test.toml")).unwrap_err();
        assert!(matches!(err, GraphrunError::ConfigNotFound(_)));
    }

    #[test]
    fn test_to_toml_roundtrip() {
        let config = AppConfig::default();
        let rendered = config.to_toml().unwrap();
        assert!(rendered.contains("default_max_steps = 500"));
        let parsed: AppConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.gateway.bind, config.gateway.bind);
    }
}
