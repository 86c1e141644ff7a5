//! Application configuration and credential resolution.
//!
//! Settings live in `~/.config/glass-pilot/config.json` (macOS:
//! `~/Library/Application Support/glass-pilot/config.json`). A missing
//! file means defaults. Environment variables override a few fields, and
//! service credentials fall back from config → env var → OS keychain.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "glass-pilot";
const CONFIG_FILE: &str = "config.json";
const KEYRING_SERVICE: &str = "glass-pilot";

// ── Types ──────────────────────────────────────────────────────────

/// How a service expects its credential to be presented.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthScheme {
    /// `Authorization: Bearer <credential>`
    #[default]
    Bearer,
    /// A custom header carrying the raw credential, e.g. `x-service-key`.
    Header(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub auth: AuthScheme,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeConfig {
    pub url: String,
    pub reconnect_base_ms: u64,
    pub max_reconnect_attempts: u32,
    /// Handshake timeout for a single connection attempt.
    pub connect_timeout_ms: u64,
    pub provider: String,
    pub temperature: f32,
    pub task_type: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8765/bridge".to_string(),
            reconnect_base_ms: 2000,
            max_reconnect_attempts: 5,
            connect_timeout_ms: 10_000,
            provider: "default".to_string(),
            temperature: 0.7,
            task_type: "chat".to_string(),
        }
    }
}

/// Thresholds for the clipboard highlight filters. These are tuning
/// knobs, not protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClipboardPolicy {
    pub poll_interval_ms: u64,
    pub self_submission_ttl_secs: u64,
    pub short_text_max_chars: usize,
}

impl Default for ClipboardPolicy {
    fn default() -> Self {
        Self {
            poll_interval_ms: 300,
            self_submission_ttl_secs: 60,
            short_text_max_chars: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutomationConfig {
    pub user_id: String,
    pub source: String,
    /// Upper bound on skip/replan answers per automation. `None` = unbounded.
    pub max_resume_rounds: Option<u32>,
    /// RPC service hosting the execution engine.
    pub engine_service: String,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            user_id: "local-user".to_string(),
            source: "desktop".to_string(),
            max_resume_rounds: None,
            engine_service: "automation".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub services: Vec<ServiceConfig>,
    pub rpc_timeout_ms: u64,
    pub health_timeout_ms: u64,
    pub health_paths: Vec<String>,
    pub bridge: BridgeConfig,
    pub clipboard: ClipboardPolicy,
    pub automation: AutomationConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            services: Vec::new(),
            rpc_timeout_ms: 10_000,
            health_timeout_ms: 3_000,
            health_paths: vec!["/health".to_string(), "/api/health".to_string()],
            bridge: BridgeConfig::default(),
            clipboard: ClipboardPolicy::default(),
            automation: AutomationConfig::default(),
        }
    }
}

// ── Loading / saving ───────────────────────────────────────────────

/// Directory where the config file is stored.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

pub fn config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE)
}

/// Load `.env.local` → `.env` from the working directory. First hit wins.
/// Runs before the logger exists, so it reports on stderr.
pub fn load_env_files() {
    for env_file in [".env.local", ".env"] {
        let path = Path::new(env_file);
        if path.exists() {
            match dotenvy::from_path(path) {
                Ok(_) => eprintln!("[STARTUP] Loaded {}", path.display()),
                Err(e) => eprintln!("[STARTUP] Failed to load {}: {}", path.display(), e),
            }
            break;
        }
    }
}

/// Load the config from the default location and apply env overrides.
pub fn load_config() -> Result<AppConfig> {
    let mut config = load_config_from(&config_path())?;
    config.apply_env_overrides();
    Ok(config)
}

/// Load a config file. A missing file yields defaults; bad JSON is an error.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    match std::fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("invalid JSON in {}: {}", path.display(), e))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::info!("[CONFIG] No config at {}, using defaults", path.display());
            Ok(AppConfig::default())
        }
        Err(e) => Err(Error::Config(format!(
            "failed to read {}: {}",
            path.display(),
            e
        ))),
    }
}

/// Persist the config, creating the directory if needed.
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::Config(format!("failed to create config dir: {}", e)))?;
    }
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
    std::fs::write(path, json)
        .map_err(|e| Error::Config(format!("failed to write config: {}", e)))?;
    log::info!("[CONFIG] Saved config to {}", path.display());
    Ok(())
}

impl AppConfig {
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("GLASS_PILOT_BRIDGE_URL") {
            if !url.is_empty() {
                self.bridge.url = url;
            }
        }
        if let Ok(user) = std::env::var("GLASS_PILOT_USER_ID") {
            if !user.is_empty() {
                self.automation.user_id = user;
            }
        }
        if let Ok(raw) = std::env::var("GLASS_PILOT_RPC_TIMEOUT_MS") {
            match raw.parse::<u64>() {
                Ok(ms) if ms > 0 => self.rpc_timeout_ms = ms,
                _ => log::warn!("[CONFIG] Ignoring bad GLASS_PILOT_RPC_TIMEOUT_MS={}", raw),
            }
        }
    }
}

// ── Credentials ────────────────────────────────────────────────────

/// Env var consulted for a service's credential: `GLASS_PILOT_<NAME>_KEY`.
pub fn credential_env_key(service_name: &str) -> String {
    let upper: String = service_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("GLASS_PILOT_{}_KEY", upper)
}

/// Resolve a service credential: config entry, then env var, then keychain.
pub fn resolve_credential(service: &ServiceConfig) -> Option<String> {
    if let Some(cred) = service.credential.as_ref().filter(|c| !c.is_empty()) {
        return Some(cred.clone());
    }

    let env_key = credential_env_key(&service.name);
    if let Ok(cred) = std::env::var(&env_key) {
        if !cred.is_empty() {
            return Some(cred);
        }
    }

    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &service.name) {
        if let Ok(cred) = entry.get_password() {
            if !cred.is_empty() {
                log::info!("[CONFIG] Loaded '{}' credential from OS keychain", service.name);
                return Some(cred);
            }
        }
    }

    None
}

/// Store a service credential in the OS keychain.
pub fn save_credential(service_name: &str, credential: &str) -> Result<()> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, service_name)
        .map_err(|e| Error::Config(format!("keyring error: {}", e)))?;
    entry
        .set_password(credential)
        .map_err(|e| Error::Config(format!("failed to save credential: {}", e)))
}
