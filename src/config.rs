use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

lazy_static! {
    static ref ENV_VAR: Regex =
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").unwrap();
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("environment variable {0} not found and no default provided")]
    MissingEnvVar(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: TokenAuthConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Scheme and authority used for `meta.location`; derived from the request
    /// headers when unset.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_url: None,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

/// Bearer token lookup settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TokenAuthConfig {
    /// Namespace holding the token secrets.
    #[serde(default = "default_token_namespace")]
    pub namespace: String,
    /// Tokens older than this are rejected and cleaned up; 0 disables expiry.
    #[serde(default)]
    pub token_ttl_seconds: u64,
}

impl Default for TokenAuthConfig {
    fn default() -> Self {
        Self {
            namespace: default_token_namespace(),
            token_ttl_seconds: 0,
        }
    }
}

fn default_token_namespace() -> String {
    "scim-tokens".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub disabled: Vec<String>,
}

/// Seed data for the bundled in-memory directory.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BootstrapConfig {
    #[serde(default = "default_admin_username")]
    pub admin_username: String,
    #[serde(default)]
    pub tokens: Vec<BootstrapToken>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            admin_username: default_admin_username(),
            tokens: Vec::new(),
        }
    }
}

fn default_admin_username() -> String {
    "admin".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BootstrapToken {
    pub provider: String,
    pub token: String,
}

impl AppConfig {
    /// Load configuration from a YAML file, expanding `${VAR}` and
    /// `${VAR:-default}` references first.
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let path = config_path.as_ref();

        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_yaml_str(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let expanded = Self::expand_env_vars(content)?;
        let config: AppConfig =
            serde_yaml::from_str(&expanded).map_err(|source| ConfigError::Parse {
                path: PathBuf::new(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration used when no file is present: local bind, no tokens.
    pub fn default_config() -> Self {
        AppConfig::default()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.namespace.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "auth.namespace must not be empty".to_string(),
            ));
        }
        for token in &self.bootstrap.tokens {
            if token.token.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "bootstrap token for provider {} is empty",
                    token.provider
                )));
            }
        }
        Ok(())
    }

    fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
        let mut missing = None;
        let expanded = ENV_VAR.replace_all(content, |caps: &Captures| {
            match (std::env::var(&caps[1]), caps.get(2)) {
                (Ok(value), _) => value,
                (Err(_), Some(default)) => default.as_str().to_string(),
                (Err(_), None) => {
                    missing.get_or_insert_with(|| caps[1].to_string());
                    String::new()
                }
            }
        });

        match missing {
            Some(var) => Err(ConfigError::MissingEnvVar(var)),
            None => Ok(expanded.into_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_expansion() {
        std::env::set_var("SCIM_TEST_TOKEN", "secret_token_123");

        let expanded = AppConfig::expand_env_vars(
            "token: \"${SCIM_TEST_TOKEN:-default}\"\nport: ${SCIM_TEST_MISSING_PORT:-3000}",
        )
        .unwrap();
        assert!(expanded.contains("secret_token_123"));
        assert!(expanded.contains("3000"));

        let missing = AppConfig::expand_env_vars("token: ${SCIM_TEST_NOT_SET_ANYWHERE}");
        assert!(matches!(missing, Err(ConfigError::MissingEnvVar(_))));
    }

    #[test]
    fn test_parse_full_config() {
        let config = AppConfig::from_yaml_str(
            r#"
server:
  host: "0.0.0.0"
  port: 8443
  base_url: "https://scim.example.com"
auth:
  namespace: "cattle-global-data"
  token_ttl_seconds: 86400
providers:
  disabled: ["github"]
bootstrap:
  admin_username: "root"
  tokens:
    - provider: okta
      token: "okta-token"
"#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8443);
        assert_eq!(
            config.server.base_url.as_deref(),
            Some("https://scim.example.com")
        );
        assert_eq!(config.auth.token_ttl_seconds, 86400);
        assert_eq!(config.providers.disabled, vec!["github".to_string()]);
        assert_eq!(config.bootstrap.admin_username, "root");
        assert_eq!(config.bootstrap.tokens[0].provider, "okta");
    }

    #[test]
    fn test_defaults_apply_to_empty_sections() {
        let config = AppConfig::from_yaml_str("server:\n  port: 9000\n").unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.auth.namespace, "scim-tokens");
        assert_eq!(config.auth.token_ttl_seconds, 0);
        assert_eq!(config.bootstrap.admin_username, "admin");
    }

    #[test]
    fn test_empty_bootstrap_token_rejected() {
        let result = AppConfig::from_yaml_str(
            "bootstrap:\n  tokens:\n    - provider: okta\n      token: \"\"\n",
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
