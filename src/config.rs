use color_eyre::eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::{
    env, fs, io,
    path::PathBuf,
    sync::{OnceLock, RwLock},
};

/// Globally accessible application configuration values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the hosted data store, e.g. `https://xyz.supabase.co`.
    #[serde(default)]
    pub store_url: String,
    /// Publishable API key sent with every store request.
    #[serde(default)]
    pub store_api_key: String,
    /// Optional credentials used to resolve a session automatically at startup.
    #[serde(default)]
    pub sign_in_email: String,
    #[serde(default)]
    pub sign_in_password: String,
}

impl AppConfig {
    fn hydrate_from_env(&mut self) {
        if let Ok(url) = env::var("COURSEDECK_STORE_URL") {
            if !url.trim().is_empty() {
                self.store_url = url;
            }
        }
        if let Ok(key) = env::var("COURSEDECK_STORE_API_KEY") {
            if !key.trim().is_empty() {
                self.store_api_key = key;
            }
        }
        if let Ok(email) = env::var("COURSEDECK_EMAIL") {
            if !email.trim().is_empty() {
                self.sign_in_email = email;
            }
        }
        if let Ok(password) = env::var("COURSEDECK_PASSWORD") {
            if !password.trim().is_empty() {
                self.sign_in_password = password;
            }
        }
    }

    pub fn has_store_credentials(&self) -> bool {
        !self.store_url.trim().is_empty() && !self.store_api_key.trim().is_empty()
    }

    pub fn has_sign_in_credentials(&self) -> bool {
        !self.sign_in_email.trim().is_empty() && !self.sign_in_password.trim().is_empty()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_url: String::new(),
            store_api_key: String::new(),
            sign_in_email: String::new(),
            sign_in_password: String::new(),
        }
    }
}

const CONFIG_FILE_PATH: &str = "config/app_config.toml";

static APP_CONFIG: OnceLock<RwLock<AppConfig>> = OnceLock::new();

fn config_lock() -> &'static RwLock<AppConfig> {
    APP_CONFIG.get_or_init(|| RwLock::new(AppConfig::default()))
}

/// Attempt to load configuration from disk and the environment. If loading fails, the
/// in-memory config falls back to environment values only and the error is returned for
/// the caller to surface if desired.
pub fn initialize() -> Result<()> {
    match load_config_from_disk() {
        Ok(mut config) => {
            config.hydrate_from_env();
            let lock = config_lock();
            *lock.write().expect("config lock poisoned") = config;
            Ok(())
        }
        Err(err) => {
            let mut config = AppConfig::default();
            config.hydrate_from_env();
            let lock = config_lock();
            *lock.write().expect("config lock poisoned") = config;
            Err(err)
        }
    }
}

/// Retrieve a clone of the current configuration.
pub fn current() -> AppConfig {
    config_lock().read().expect("config lock poisoned").clone()
}

/// Absolute path to the configuration file used for persistence.
pub fn config_file_path() -> PathBuf {
    PathBuf::from(CONFIG_FILE_PATH)
}

fn load_config_from_disk() -> Result<AppConfig> {
    let path = config_file_path();
    match fs::read_to_string(&path) {
        Ok(contents) => toml::from_str(&contents)
            .wrap_err_with(|| format!("failed to parse configuration at {}", path.display())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(err) => Err(eyre!(format!(
            "failed to read configuration at {}: {}",
            path.display(),
            err
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_deserialize_to_empty_strings() {
        let config: AppConfig = toml::from_str("store_url = \"https://example.test\"").unwrap();
        assert_eq!(config.store_url, "https://example.test");
        assert!(config.store_api_key.is_empty());
        assert!(!config.has_store_credentials());
        assert!(!config.has_sign_in_credentials());
    }

    #[test]
    fn store_credentials_require_both_url_and_key() {
        let config = AppConfig {
            store_url: "https://example.test".to_string(),
            store_api_key: "anon-key".to_string(),
            ..AppConfig::default()
        };
        assert!(config.has_store_credentials());
    }
}
