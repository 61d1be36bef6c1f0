//! Configuration management for webpilot
//!
//! Supports environment variables, config files, and runtime overrides.
//!
//! Config file location: ~/.config/webpilot/config.toml

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::core::error::{Result, WebpilotError};

/// Main configuration for webpilot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Model client configuration
    pub model: ModelConfig,
    /// Browser session configuration
    pub browser: BrowserConfig,
    /// Agent loop configuration
    pub agent: AgentConfig,
}

/// Model client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name sent to the Gemini API
    /// Default: gemini-2.5-computer-use-preview-10-2025
    pub name: String,
    /// Base URL of the generative language API
    pub base_url: String,
    /// API key; read from GEMINI_API_KEY, never written to the config file
    #[serde(skip)]
    pub api_key: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Browser session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// DevTools remote debugging port to attach to or launch with
    pub debug_port: u16,
    /// Browser executable used when no running instance is found
    pub executable: String,
    /// Fixed viewport width in pixels
    pub viewport_width: u32,
    /// Fixed viewport height in pixels
    pub viewport_height: u32,
    /// Session acquisition attempts before giving up
    pub connect_attempts: u32,
    /// Backoff between acquisition attempts in milliseconds
    pub connect_backoff_ms: u64,
    /// Timeout for individual CDP commands in milliseconds
    pub command_timeout_ms: u64,
    /// Timeout waiting for DOMContentLoaded after a navigation, in milliseconds
    pub navigation_timeout_ms: u64,
}

/// Agent loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum request/act cycles before the task fails
    /// Default: 50
    pub max_iterations: usize,
    /// Delay after a successful action so the UI can settle, in milliseconds
    pub settle_delay_ms: u64,
    /// URL opened by the `search` action
    pub search_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            browser: BrowserConfig::default(),
            agent: AgentConfig::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: env::var("WEBPILOT_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-computer-use-preview-10-2025".to_string()),
            base_url: env::var("WEBPILOT_API_BASE")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string()),
            api_key: env::var("GEMINI_API_KEY").unwrap_or_default(),
            timeout_secs: 120,
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            debug_port: env::var("WEBPILOT_CDP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(9222),
            executable: env::var("WEBPILOT_BROWSER")
                .unwrap_or_else(|_| "chromium".to_string()),
            viewport_width: 1440,
            viewport_height: 900,
            connect_attempts: 10,
            connect_backoff_ms: 1000,
            command_timeout_ms: 30_000,
            navigation_timeout_ms: 30_000,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            settle_delay_ms: 500,
            search_url: "https://www.google.com/".to_string(),
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("webpilot")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load() -> Self {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        if let Ok(mut config) = Self::load_from_file() {
            // The key is env-only regardless of where the rest came from.
            config.model.api_key = env::var("GEMINI_API_KEY").unwrap_or_default();
            return config;
        }

        Self::default()
    }

    /// Load configuration from file only
    pub fn load_from_file() -> Result<Self> {
        let config_path = Self::config_file();

        if !config_path.exists() {
            return Err(WebpilotError::config("config file not found"));
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|e| WebpilotError::config(format!("failed to read config: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| WebpilotError::config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_dir = Self::config_dir();
        let config_path = Self::config_file();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .map_err(|e| WebpilotError::config(format!("failed to create config dir: {}", e)))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| WebpilotError::config(format!("failed to serialize config: {}", e)))?;

        fs::write(&config_path, content)
            .map_err(|e| WebpilotError::config(format!("failed to write config: {}", e)))?;

        Ok(())
    }

    /// The generateContent endpoint for the configured model
    pub fn generate_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.model.base_url.trim_end_matches('/'),
            self.model.name
        )
    }

    /// Fixed viewport size as (width, height)
    pub fn viewport(&self) -> (u32, u32) {
        (self.browser.viewport_width, self.browser.viewport_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.browser.debug_port, 9222);
        assert_eq!(config.browser.viewport_width, 1440);
        assert_eq!(config.browser.viewport_height, 900);
        assert_eq!(config.browser.connect_attempts, 10);
        assert_eq!(config.agent.max_iterations, 50);
        assert_eq!(config.agent.settle_delay_ms, 500);
    }

    #[test]
    fn test_generate_url() {
        let mut config = Config::default();
        config.model.name = "gemini-test".to_string();
        config.model.base_url = "https://example.test/".to_string();
        assert_eq!(
            config.generate_url(),
            "https://example.test/v1beta/models/gemini-test:generateContent"
        );
    }

    #[test]
    fn test_config_serialization_skips_api_key() {
        let mut config = Config::default();
        config.model.api_key = "secret".to_string();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("viewport_width"));
        assert!(!toml_str.contains("secret"));
    }

    #[test]
    fn test_config_dir() {
        let dir = Config::config_dir();
        assert!(dir.to_string_lossy().contains("webpilot"));
    }
}
