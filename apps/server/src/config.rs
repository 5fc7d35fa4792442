// [apps/server/src/config.rs]
/*!
 * =================================================================
 * APARATO: LAYERED CONFIGURATION (V1.0 - FLEET EDITION)
 * CLASIFICACIÓN: BOOTSTRAP STRATUM (ESTRATO L2)
 * RESPONSABILIDAD: CARGA, FUSIÓN Y VALIDACIÓN DE LA CONFIGURACIÓN
 *
 * VISION HIPER-HOLÍSTICA:
 * Capas de precedencia creciente: valores por defecto compilados,
 * un archivo YAML, variables de entorno (incluyendo `_FILE` para
 * secretos montados como archivo) y finalmente flags de CLI. El
 * `Config` resultante es inmutable durante la vida del proceso.
 * =================================================================
 */

use base64::Engine;
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClusterBackendKind {
    #[default]
    Memory,
    File,
    Kv,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsConfig {
    pub cert_file: Option<String>,
    pub key_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub port: u16,
    pub tls: TlsConfig,
    pub api_key: Option<String>,
    pub encryption_key: Option<String>,
    pub db_encryption_key: Option<String>,
    pub history_size: usize,
    pub session_ttl_seconds: i64,
    pub online_window_seconds: i64,
    pub stale_window_seconds: i64,
    pub log_format: Option<String>,
    pub command_ttl_seconds: i64,
    pub persistence_path: Option<PathBuf>,
    pub persistence_interval_seconds: u64,
    pub initial_admin_username: String,
    pub initial_admin_password: Option<String>,
    pub rate_limit_per_minute: u32,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: 8768,
            tls: TlsConfig::default(),
            api_key: None,
            encryption_key: None,
            db_encryption_key: None,
            history_size: 1000,
            session_ttl_seconds: 3600,
            online_window_seconds: 60,
            stale_window_seconds: 300,
            log_format: None,
            command_ttl_seconds: 3600,
            persistence_path: None,
            persistence_interval_seconds: 60,
            initial_admin_username: "admin".to_string(),
            initial_admin_password: None,
            rate_limit_per_minute: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct KvSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub auth: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClusterSection {
    pub enabled: bool,
    pub backend: ClusterBackendKind,
    pub secret: Option<String>,
    pub heartbeat_interval_seconds: u64,
    pub node_timeout_seconds: i64,
    pub kv: KvSection,
    pub file_path: PathBuf,
}

impl Default for ClusterSection {
    fn default() -> Self {
        Self {
            enabled: false,
            backend: ClusterBackendKind::Memory,
            secret: None,
            heartbeat_interval_seconds: 10,
            node_timeout_seconds: 30,
            kv: KvSection::default(),
            file_path: PathBuf::from("coordination.bin"),
        }
    }
}

/// Mirrors §6 exactly: `server.*` and `cluster.*`. Deserialized from the
/// YAML file layer, then selectively overridden by env/CLI in `load()`.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub server: ServerSection,
    pub cluster: ClusterSection,
}

/// CLI surface. Every flag also has an env fallback via `clap`'s `env`
/// feature, per §10.3 ("environment-variable overrides ... and CLI flag
/// overrides layered on top via clap").
#[derive(Debug, Parser)]
#[command(name = "fleetops-server", about = "Fleet monitoring control plane")]
pub struct Cli {
    #[arg(long, env = "FLEET_CONFIG_PATH", default_value = "config.yaml")]
    pub config: PathBuf,

    #[arg(long, env = "FLEET_SERVER__PORT")]
    pub port: Option<u16>,

    #[arg(long, env = "FLEET_SERVER__API_KEY")]
    pub api_key: Option<String>,

    #[arg(long, env = "FLEET_SERVER__ENCRYPTION_KEY")]
    pub encryption_key: Option<String>,

    #[arg(long, env = "FLEET_SERVER__DB_ENCRYPTION_KEY")]
    pub db_encryption_key: Option<String>,

    #[arg(long, env = "FLEET_CLUSTER__ENABLED")]
    pub cluster_enabled: Option<bool>,

    #[arg(long, env = "FLEET_CLUSTER__SECRET")]
    pub cluster_secret: Option<String>,

    #[arg(long, env = "FLEET_SERVER__INITIAL_ADMIN_USERNAME")]
    pub initial_admin_username: Option<String>,

    #[arg(long, env = "FLEET_SERVER__INITIAL_ADMIN_PASSWORD")]
    pub initial_admin_password: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFailed { path: String, #[source] source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    ParseFailed { path: String, #[source] source: serde_yaml::Error },
    #[error("missing required secret: {0}")]
    MissingSecret(&'static str),
    #[error("malformed base64 key {field}: {source}")]
    MalformedKey { field: &'static str, #[source] source: base64::DecodeError },
    #[error("key {field} must be exactly 32 bytes, got {actual}")]
    WrongKeyLength { field: &'static str, actual: usize },
    #[error("server.port is out of range")]
    PortOutOfRange,
    #[error("server.initial_admin_password must be set on first boot (no admin exists yet)")]
    MissingInitialAdminPassword,
}

/// The fully validated, immutable runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub tls: TlsConfig,
    pub api_key: String,
    pub encryption_key: Vec<u8>,
    pub db_encryption_key: Option<Vec<u8>>,
    pub history_size: usize,
    pub session_ttl_seconds: i64,
    pub online_window_seconds: i64,
    pub stale_window_seconds: i64,
    pub log_format: Option<String>,
    pub cluster_enabled: bool,
    pub cluster_backend: ClusterBackendKind,
    pub cluster_secret: Vec<u8>,
    pub heartbeat_interval_seconds: u64,
    pub node_timeout_seconds: i64,
    pub kv: KvSection,
    pub cluster_file_path: PathBuf,
    pub command_ttl_seconds: i64,
    pub persistence_path: Option<PathBuf>,
    pub persistence_interval_seconds: u64,
    pub initial_admin_username: String,
    pub initial_admin_password: String,
    pub rate_limit_per_minute: u32,
}

fn read_secret_env(plain_var: &str, file_var: &str) -> Option<String> {
    if let Ok(path) = std::env::var(file_var) {
        return std::fs::read_to_string(path).ok().map(|value| value.trim().to_string());
    }
    std::env::var(plain_var).ok()
}

fn decode_key(field: &'static str, value: &str) -> Result<Vec<u8>, ConfigError> {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(value)
        .map_err(|source| ConfigError::MalformedKey { field, source })?;
    if decoded.len() != 32 {
        return Err(ConfigError::WrongKeyLength { field, actual: decoded.len() });
    }
    Ok(decoded)
}

impl Config {
    /// Loads defaults, then the YAML file (if present), then environment
    /// overrides (including `_FILE`-suffixed secret mounts), then CLI
    /// flags, and validates the result. Fatal config errors should exit
    /// with code 1 per §6; unparseable files are a usage error (64) —
    /// callers distinguish via `ConfigError` variant.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let mut file_config = if cli.config.exists() {
            let raw = std::fs::read_to_string(&cli.config).map_err(|source| ConfigError::ReadFailed {
                path: cli.config.display().to_string(),
                source,
            })?;
            serde_yaml::from_str(&raw).map_err(|source| ConfigError::ParseFailed {
                path: cli.config.display().to_string(),
                source,
            })?
        } else {
            FileConfig::default()
        };

        if let Some(api_key) = read_secret_env("FLEET_SERVER__API_KEY", "FLEET_SERVER__API_KEY_FILE") {
            file_config.server.api_key = Some(api_key);
        }
        if let Some(key) = read_secret_env("FLEET_SERVER__ENCRYPTION_KEY", "FLEET_SERVER__ENCRYPTION_KEY_FILE") {
            file_config.server.encryption_key = Some(key);
        }
        if let Some(key) = read_secret_env("FLEET_SERVER__DB_ENCRYPTION_KEY", "FLEET_SERVER__DB_ENCRYPTION_KEY_FILE") {
            file_config.server.db_encryption_key = Some(key);
        }
        if let Some(secret) = read_secret_env("FLEET_CLUSTER__SECRET", "FLEET_CLUSTER__SECRET_FILE") {
            file_config.cluster.secret = Some(secret);
        }
        if let Some(password) =
            read_secret_env("FLEET_SERVER__INITIAL_ADMIN_PASSWORD", "FLEET_SERVER__INITIAL_ADMIN_PASSWORD_FILE")
        {
            file_config.server.initial_admin_password = Some(password);
        }

        if let Some(port) = cli.port {
            file_config.server.port = port;
        }
        if let Some(api_key) = &cli.api_key {
            file_config.server.api_key = Some(api_key.clone());
        }
        if let Some(key) = &cli.encryption_key {
            file_config.server.encryption_key = Some(key.clone());
        }
        if let Some(key) = &cli.db_encryption_key {
            file_config.server.db_encryption_key = Some(key.clone());
        }
        if let Some(enabled) = cli.cluster_enabled {
            file_config.cluster.enabled = enabled;
        }
        if let Some(secret) = &cli.cluster_secret {
            file_config.cluster.secret = Some(secret.clone());
        }
        if let Some(username) = &cli.initial_admin_username {
            file_config.server.initial_admin_username = username.clone();
        }
        if let Some(password) = &cli.initial_admin_password {
            file_config.server.initial_admin_password = Some(password.clone());
        }

        Self::validate(file_config)
    }

    fn validate(raw: FileConfig) -> Result<Self, ConfigError> {
        if raw.server.port == 0 {
            return Err(ConfigError::PortOutOfRange);
        }

        let api_key = raw.server.api_key.ok_or(ConfigError::MissingSecret("server.api_key"))?;
        let encryption_key_raw =
            raw.server.encryption_key.ok_or(ConfigError::MissingSecret("server.encryption_key"))?;
        let encryption_key = decode_key("server.encryption_key", &encryption_key_raw)?;

        let db_encryption_key = raw
            .server
            .db_encryption_key
            .map(|value| decode_key("server.db_encryption_key", &value))
            .transpose()?;

        let cluster_secret = if raw.cluster.enabled {
            let secret_raw = raw.cluster.secret.ok_or(ConfigError::MissingSecret("cluster.secret"))?;
            decode_key("cluster.secret", &secret_raw)?
        } else {
            Vec::new()
        };

        let initial_admin_password =
            raw.server.initial_admin_password.ok_or(ConfigError::MissingInitialAdminPassword)?;

        Ok(Config {
            port: raw.server.port,
            tls: raw.server.tls,
            api_key,
            encryption_key,
            db_encryption_key,
            history_size: raw.server.history_size,
            session_ttl_seconds: raw.server.session_ttl_seconds,
            online_window_seconds: raw.server.online_window_seconds,
            stale_window_seconds: raw.server.stale_window_seconds,
            log_format: raw.server.log_format,
            cluster_enabled: raw.cluster.enabled,
            cluster_backend: raw.cluster.backend,
            cluster_secret,
            heartbeat_interval_seconds: raw.cluster.heartbeat_interval_seconds,
            node_timeout_seconds: raw.cluster.node_timeout_seconds,
            kv: raw.cluster.kv,
            cluster_file_path: raw.cluster.file_path,
            command_ttl_seconds: raw.server.command_ttl_seconds,
            persistence_path: raw.server.persistence_path,
            persistence_interval_seconds: raw.server.persistence_interval_seconds,
            initial_admin_username: raw.server.initial_admin_username,
            initial_admin_password,
            rate_limit_per_minute: raw.server.rate_limit_per_minute,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_key() -> String {
        base64::engine::general_purpose::STANDARD.encode([7u8; 32])
    }

    #[test]
    fn validate_rejects_zero_port() {
        let mut raw = FileConfig::default();
        raw.server.port = 0;
        raw.server.api_key = Some("k".into());
        raw.server.encryption_key = Some(sample_key());
        assert!(matches!(Config::validate(raw), Err(ConfigError::PortOutOfRange)));
    }

    #[test]
    fn validate_rejects_missing_api_key() {
        let mut raw = FileConfig::default();
        raw.server.encryption_key = Some(sample_key());
        assert!(matches!(Config::validate(raw), Err(ConfigError::MissingSecret("server.api_key"))));
    }

    #[test]
    fn validate_rejects_wrong_key_length() {
        let mut raw = FileConfig::default();
        raw.server.api_key = Some("k".into());
        raw.server.encryption_key = Some(base64::engine::general_purpose::STANDARD.encode([1u8; 16]));
        assert!(matches!(Config::validate(raw), Err(ConfigError::WrongKeyLength { .. })));
    }

    #[test]
    fn validate_requires_cluster_secret_only_when_enabled() {
        let mut raw = FileConfig::default();
        raw.server.api_key = Some("k".into());
        raw.server.encryption_key = Some(sample_key());
        raw.server.initial_admin_password = Some("p".into());
        raw.cluster.enabled = false;
        assert!(Config::validate(raw).is_ok());
    }

    #[test]
    fn validate_rejects_missing_initial_admin_password() {
        let mut raw = FileConfig::default();
        raw.server.api_key = Some("k".into());
        raw.server.encryption_key = Some(sample_key());
        assert!(matches!(Config::validate(raw), Err(ConfigError::MissingInitialAdminPassword)));
    }
}
