//! Environment-driven configuration.
//!
//! Constructed once by the composition root and passed to backend
//! constructors; there is no process-global instance.

use std::collections::HashMap;

/// API keys and base-URL overrides, keyed by backend name.
#[derive(Debug, Clone, Default)]
pub struct DroverConfig {
    api_keys: HashMap<String, String>,
    base_urls: HashMap<String, String>,
}

impl DroverConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from environment variables (GEMINI_API_KEY etc.).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let mut config = Self::new();

        let env_mappings = [
            ("GEMINI_API_KEY", "gemini"),
            ("GOOGLE_API_KEY", "gemini"),
            ("OPENAI_COMPAT_API_KEY", "openai-compatible"),
            ("OPENAI_API_KEY", "openai-compatible"),
        ];
        for (env_var, backend) in &env_mappings {
            if let Ok(key) = std::env::var(env_var) {
                config.api_keys.entry(backend.to_string()).or_insert(key);
            }
        }

        let url_mappings = [
            ("GEMINI_BASE_URL", "gemini"),
            ("OPENAI_COMPAT_BASE_URL", "openai-compatible"),
        ];
        for (env_var, backend) in &url_mappings {
            if let Ok(url) = std::env::var(env_var) {
                config.base_urls.insert(backend.to_string(), url);
            }
        }

        config
    }

    pub fn set_api_key(&mut self, backend: &str, key: impl Into<String>) -> &mut Self {
        self.api_keys.insert(backend.to_string(), key.into());
        self
    }

    pub fn get_api_key(&self, backend: &str) -> Option<String> {
        self.api_keys.get(backend).cloned()
    }

    pub fn set_base_url(&mut self, backend: &str, url: impl Into<String>) -> &mut Self {
        self.base_urls.insert(backend.to_string(), url.into());
        self
    }

    pub fn get_base_url(&self, backend: &str) -> Option<String> {
        self.base_urls.get(backend).cloned()
    }

    /// Check if a backend has a key configured.
    pub fn has_credentials(&self, backend: &str) -> bool {
        self.api_keys.contains_key(backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_keys_round_trip() {
        let mut config = DroverConfig::new();
        config.set_api_key("gemini", "k1");
        config.set_base_url("gemini", "http://localhost:9999");

        assert_eq!(config.get_api_key("gemini"), Some("k1".to_string()));
        assert_eq!(
            config.get_base_url("gemini"),
            Some("http://localhost:9999".to_string())
        );
        assert!(config.has_credentials("gemini"));
    }

    #[test]
    fn missing_backend_returns_none() {
        let config = DroverConfig::new();
        assert_eq!(config.get_api_key("gemini"), None);
        assert_eq!(config.get_base_url("gemini"), None);
        assert!(!config.has_credentials("gemini"));
    }
}
