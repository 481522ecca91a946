use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for the SPMS workflow tools
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SpmsConfig {
    /// SPMS API connection
    pub api: ApiConfig,
    /// Response cache settings
    pub cache: CacheConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ApiConfig {
    /// Base URL of the REST API, ending in a slash
    pub base_url: String,
    /// API token (can be set via env var)
    pub token: Option<String>,
    /// Per-request timeout
    pub timeout_seconds: u64,
    /// Rate limiting settings
    pub rate_limit: RateLimitConfig,
    /// Default for the email toggle on approval actions
    pub send_emails: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RateLimitConfig {
    /// Sustained requests per second
    pub requests_per_second: u32,
    /// Burst capacity
    pub burst_capacity: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_seconds: u64,
    pub max_capacity: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ObservabilityConfig {
    /// Log level, in `EnvFilter` syntax
    pub log_level: String,
    /// Emit JSON lines instead of compact text
    pub json_logs: bool,
    /// Log API metrics on shutdown
    pub metrics_enabled: bool,
}

impl Default for SpmsConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                base_url: "http://127.0.0.1:8000/api/v1/".to_string(),
                token: None, // Will be read from env var or .spms-rc
                timeout_seconds: 30,
                rate_limit: RateLimitConfig {
                    requests_per_second: 10,
                    burst_capacity: 20,
                },
                send_emails: false,
            },
            cache: CacheConfig {
                enabled: true,
                ttl_seconds: 300, // 5 minutes
                max_capacity: 1000,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: true,
                metrics_enabled: true,
            },
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        SpmsConfig::default().observability
    }
}

impl SpmsConfig {
    /// Load configuration from the current directory. See [`SpmsConfig::load_from`].
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files in `dir` (spms.toml, .spms-rc)
    /// 3. Environment variables (prefixed with SPMS_, `__` between sections)
    pub fn load_from(dir: &Path) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        let toml_path = dir.join("spms.toml");
        if toml_path.exists() {
            builder = builder.add_source(File::from(toml_path));
        }

        let rc_path = dir.join(".spms-rc");
        if rc_path.exists() {
            builder = builder.add_source(File::from(rc_path).format(config::FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("SPMS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut spms_config: SpmsConfig = builder.build()?.try_deserialize()?;

        // Flat token variables for shells and CI
        if spms_config.api.token.is_none() {
            if let Ok(token) = std::env::var("SPMS_API_TOKEN") {
                spms_config.api.token = Some(token);
            } else if let Ok(token) = std::env::var("SPMS_TOKEN") {
                spms_config.api.token = Some(token);
            }
        }

        spms_config.validate()?;
        Ok(spms_config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://") {
            anyhow::bail!("api.base_url must be an http(s) URL, got {:?}", self.api.base_url);
        }
        if self.api.rate_limit.requests_per_second == 0 || self.api.rate_limit.burst_capacity == 0 {
            anyhow::bail!("api.rate_limit values must be greater than zero");
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<SpmsConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        // Load .env file first
        let _ = SpmsConfig::load_env_file();
        SpmsConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static SpmsConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::info!("Configuration loaded successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_validate() {
        assert!(SpmsConfig::default().validate().is_ok());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("spms.toml"),
            "[api]\nbase_url = \"https://spms.example.org/api/v1/\"\n\n[cache]\nttl_seconds = 60\n",
        )
        .unwrap();

        let loaded = SpmsConfig::load_from(dir.path()).unwrap();
        assert_eq!(loaded.api.base_url, "https://spms.example.org/api/v1/");
        assert_eq!(loaded.cache.ttl_seconds, 60);
        assert_eq!(loaded.cache.max_capacity, 1000);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let mut original = SpmsConfig::default();
        original.api.timeout_seconds = 5;
        original.observability.json_logs = false;
        original.save_to_file(dir.path().join("spms.toml")).unwrap();

        let loaded = SpmsConfig::load_from(dir.path()).unwrap();
        assert_eq!(loaded.api.timeout_seconds, 5);
        assert!(!loaded.observability.json_logs);
    }

    #[test]
    fn test_rejects_bad_base_url() {
        let mut config = SpmsConfig::default();
        config.api.base_url = "spms.local".into();
        assert!(config.validate().is_err());
    }
}
