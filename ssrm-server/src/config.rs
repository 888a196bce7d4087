use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use ssrm_core::{BackendConfig, ConnectionDescriptor};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// HTTP worker threads; 0 uses one per CPU
    #[serde(default)]
    pub workers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Plain,
    Json,
    #[default]
    Pretty,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

/// Command-line values that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub database: Option<PathBuf>,
    pub table: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl Config {
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = if let Some(path) = config_path {
            Self::load_from_file(path)?
        } else {
            Self::load_default()?
        };

        Ok(config)
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => {
                toml::from_str(&content).with_context(|| "Failed to parse TOML config")?
            }
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&content).with_context(|| "Failed to parse YAML config")?
            }
            Some("json") => {
                serde_json::from_str(&content).with_context(|| "Failed to parse JSON config")?
            }
            _ => {
                return Err(anyhow::anyhow!(
                    "Unsupported config file format: {}",
                    path.display()
                ))
            }
        };

        Ok(config)
    }

    fn load_default() -> Result<Self> {
        let config_paths = [
            "ssrm.toml",
            "ssrm.yaml",
            "ssrm.yml",
            "ssrm.json",
            ".ssrm.toml",
            ".ssrm.yaml",
            ".ssrm.yml",
            ".ssrm.json",
        ];

        for path in &config_paths {
            if Path::new(path).exists() {
                return Self::load_from_file(Path::new(path));
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let xdg_paths = [
                config_dir.join("ssrm").join("config.toml"),
                config_dir.join("ssrm").join("config.yaml"),
                config_dir.join("ssrm").join("config.yml"),
                config_dir.join("ssrm").join("config.json"),
            ];

            for path in &xdg_paths {
                if path.exists() {
                    return Self::load_from_file(path);
                }
            }
        }

        Ok(Self::default())
    }

    /// Apply command-line overrides; `--database` selects a SQLite file
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(path) = overrides.database {
            self.backend.connection = ConnectionDescriptor::Sqlite { path };
            self.backend.quote_char = None;
        }
        if let Some(table) = overrides.table {
            self.backend.table = table;
        }
        if let Some(host) = overrides.host {
            self.server.host = host;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8008
}

fn default_level() -> String {
    "info".to_string()
}
