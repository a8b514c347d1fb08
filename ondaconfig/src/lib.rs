//! # Onda Configuration Module
//!
//! This module provides configuration management for the Onda player, including:
//! - Loading configuration from YAML files
//! - Merging with embedded default configuration
//! - Environment variable overrides
//! - Type-safe getters and setters for configuration values
//! - Lazily loaded process-wide instance
//!
//! ## Usage
//!
//! ```no_run
//! use ondaconfig::get_config;
//!
//! let config = get_config()?;
//!
//! let timeout = config.get_load_timeout_secs()?;
//! config.set_last_bandwidth(2_400_000)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Result, anyhow};
use dirs::home_dir;
use lazy_static::lazy_static;
use serde_yaml::{Mapping, Number, Value};
use std::{
    env, fs,
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};
use tracing::{info, warn};

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("onda.yaml");

lazy_static! {
    static ref CONFIG: Mutex<Option<Arc<Config>>> = Mutex::new(None);
}

const ENV_CONFIG_DIR: &str = "ONDA_CONFIG";
const ENV_PREFIX: &str = "ONDA_CONFIG__";
const CONFIG_DIR_NAME: &str = ".onda";

// Default values for configuration
const DEFAULT_PROVISION_DELAY_MS: u64 = 100;
const DEFAULT_LOAD_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MAX_RETRIES: u64 = 3;
const DEFAULT_QUALITY_RECHECK_DELAYS_MS: [u64; 4] = [0, 500, 1000, 2000];
const DEFAULT_LADDER_REFRESH_DELAYS_MS: [u64; 2] = [1000, 3000];
const DEFAULT_BUFFER_GOOD_SECS: u64 = 5;
const DEFAULT_MAX_BUFFER_SECS: u64 = 15;
const DEFAULT_GOAL_BUFFER_SECS: u64 = 5;
const DEFAULT_BACK_BUFFER_SECS: u64 = 0;
const DEFAULT_BANDWIDTH_UPGRADE_TARGET: f64 = 0.85;
const DEFAULT_INITIAL_BANDWIDTH: u64 = 500_000;
const DEFAULT_RELAY_PATH: &str = "/relay";
const DEFAULT_EMBED_API_SCRIPT_URL: &str = "https://www.youtube.com/iframe_api";
const DEFAULT_EMBED_API_ELEMENT_ID: &str = "youtube-iframe-api";
const DEFAULT_EMBED_ORIGIN: &str = "http://localhost";
const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";

/// Macro to generate getter/setter for u64 values with default
macro_rules! impl_u64_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<u64> {
            match self.get_value($path) {
                Ok(Value::Number(n)) if n.is_u64() => Ok(n.as_u64().unwrap_or($default)),
                Ok(Value::String(s)) => Ok(s.trim().parse::<u64>().unwrap_or($default)),
                _ => Ok($default),
            }
        }

        pub fn $setter(&self, value: u64) -> Result<()> {
            self.set_value($path, Value::Number(Number::from(value)))
        }
    };
}

/// Macro to generate getter/setter for string values with default
macro_rules! impl_string_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<String> {
            match self.get_value($path) {
                Ok(Value::String(s)) if !s.is_empty() => Ok(s),
                _ => Ok($default.to_string()),
            }
        }

        pub fn $setter(&self, value: String) -> Result<()> {
            self.set_value($path, Value::String(value))
        }
    };
}

/// Macro to generate getter for millisecond delay lists with default
macro_rules! impl_delays_config {
    ($getter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<Vec<u64>> {
            match self.get_value($path) {
                Ok(Value::Sequence(seq)) => {
                    let delays: Option<Vec<u64>> = seq.iter().map(Value::as_u64).collect();
                    match delays {
                        Some(delays) => Ok(delays),
                        None => {
                            warn!(path = %$path.join("."), "Invalid delay list, using default");
                            Ok($default.to_vec())
                        }
                    }
                }
                _ => Ok($default.to_vec()),
            }
        }
    };
}

/// Configuration manager for the Onda player
///
/// This structure manages the application configuration, including:
/// - Loading configuration from YAML files
/// - Merging with default configuration
/// - Handling environment variable overrides
/// - Providing typed getters/setters for configuration values
///
/// # Examples
///
/// ```no_run
/// use ondaconfig::Config;
///
/// let config = Config::load_config("/tmp/onda")?;
/// println!("watchdog: {}s", config.get_load_timeout_secs()?);
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    path: String,
    data: Mutex<Value>,
}

impl Config {
    /// Finds a config directory by trying different locations in order
    fn find_config_dir(directory: &str) -> String {
        // 1. Try provided directory
        if !directory.is_empty() {
            return directory.to_string();
        }

        // 2. Try environment variable
        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %env_path, "Trying to load config from env");
            return env_path;
        }

        // 3. Try current directory
        if Path::new(CONFIG_DIR_NAME).exists() {
            return CONFIG_DIR_NAME.to_string();
        }

        // 4. Try home directory
        if let Some(home) = home_dir() {
            let home_config = home.join(CONFIG_DIR_NAME);
            if home_config.exists() {
                return home_config.to_string_lossy().to_string();
            }
        }

        CONFIG_DIR_NAME.to_string()
    }

    /// Validates and prepares a config directory
    fn validate_config_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(anyhow!("{} is not a directory", path.display()));
        }

        // Test write permission
        let test_file = path.join(".write_test");
        fs::write(&test_file, b"test")?;
        fs::remove_file(&test_file)?;

        fs::read_dir(path)?;

        Ok(())
    }

    /// Determines and validates the configuration directory
    ///
    /// The directory is searched in the following order:
    /// 1. The provided `directory` parameter if not empty
    /// 2. The `ONDA_CONFIG` environment variable
    /// 3. `.onda` in the current directory
    /// 4. `.onda` in the user's home directory
    ///
    /// The directory is created if it doesn't exist, and validated for read/write permissions.
    pub fn config_dir(directory: &str) -> Result<String> {
        let dir_path = Self::find_config_dir(directory);
        Self::validate_config_dir(Path::new(&dir_path))?;
        Ok(dir_path)
    }

    /// Loads the configuration from the specified directory
    ///
    /// This method:
    /// 1. Determines the configuration directory
    /// 2. Loads the default embedded configuration
    /// 3. Merges it with the external config.yaml file if present
    /// 4. Applies environment variable overrides
    /// 5. Saves the merged configuration
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::config_dir(directory)?;
        info!(config_dir = %config_dir, "Using config directory");

        let config_file_path = Path::new(&config_dir).join("config.yaml");
        let path = config_file_path.to_string_lossy().to_string();

        let mut default_value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;

        let yaml_data = if let Ok(data) = fs::read(&path) {
            info!(config_file = %path, "Loaded config file");
            data
        } else {
            info!(config_file = %path, "Config file not found, using default embedded config");
            DEFAULT_CONFIG.as_bytes().to_vec()
        };

        let external_value: Value = serde_yaml::from_slice(&yaml_data)?;
        merge_yaml(&mut default_value, &external_value);
        let mut config_value = Self::lower_keys_value(default_value);

        Self::apply_env_overrides(&mut config_value);

        let config = Config {
            config_dir,
            path,
            data: Mutex::new(config_value),
        };

        config.save()?;
        Ok(config)
    }

    /// Returns the directory the configuration was loaded from.
    pub fn directory(&self) -> &str {
        &self.config_dir
    }

    fn data(&self) -> Result<MutexGuard<'_, Value>> {
        self.data
            .lock()
            .map_err(|_| anyhow!("configuration lock poisoned"))
    }

    /// Saves the current configuration to the config.yaml file
    pub fn save(&self) -> Result<()> {
        let yaml = {
            let data = self.data()?;
            serde_yaml::to_string(&*data)?
        };
        fs::write(&self.path, yaml)?;
        Ok(())
    }

    /// Sets a configuration value at the specified path and saves it
    ///
    /// # Arguments
    ///
    /// * `path` - Array of keys representing the path (e.g., `&["player", "max_retries"]`)
    /// * `value` - The YAML value to set
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        {
            let mut data = self.data()?;
            Self::set_value_internal(&mut data, path, value)?;
        }
        self.save()
    }

    fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
        if path.is_empty() {
            *data = value;
            return Ok(());
        }
        if let Value::Mapping(map) = data {
            let key_value = Value::String(path[0].to_lowercase());
            if path.len() == 1 {
                map.insert(key_value, value);
            } else {
                let entry = map
                    .entry(key_value)
                    .or_insert(Value::Mapping(Mapping::new()));
                Self::set_value_internal(entry, &path[1..], value)?;
            }
            Ok(())
        } else {
            Err(anyhow!("Current node is not a map"))
        }
    }

    /// Gets a configuration value at the specified path
    ///
    /// Returns an error if the path doesn't exist.
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.data()?;
        Self::get_value_internal(&data, path)
    }

    fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
        let mut current = data;
        for (i, key) in path.iter().enumerate() {
            if let Value::Mapping(map) = current {
                if let Some(next) = map.get(&Value::String(key.to_lowercase())) {
                    current = next;
                } else {
                    return Err(anyhow!("Path {} does not exist", path[..=i].join(".")));
                }
            } else {
                return Err(anyhow!("Path {} is not a Config", path[..i].join(".")));
            }
        }
        Ok(current.clone())
    }

    fn apply_env_overrides(config: &mut Value) {
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                let key_path = stripped.split("__").collect::<Vec<_>>();
                let yaml_value = Self::convert_env_value(&value);
                if let Err(err) = Self::set_value_internal(config, &key_path, yaml_value) {
                    warn!(env_var = %key, error = %err, "Ignoring configuration override");
                }
            }
        }
    }

    fn convert_env_value(value: &str) -> Value {
        if let Ok(parsed) = serde_yaml::from_str::<Value>(value) {
            return parsed;
        }
        Value::String(value.to_string())
    }

    fn lower_keys_value(value: Value) -> Value {
        match value {
            Value::Mapping(map) => {
                let mut new_map = Mapping::new();
                for (k, v) in map {
                    if let Value::String(s) = k {
                        new_map.insert(Value::String(s.to_lowercase()), Self::lower_keys_value(v));
                    } else {
                        new_map.insert(k, Self::lower_keys_value(v));
                    }
                }
                Value::Mapping(new_map)
            }
            Value::Sequence(seq) => {
                Value::Sequence(seq.into_iter().map(Self::lower_keys_value).collect())
            }
            _ => value,
        }
    }

    impl_u64_config!(
        get_provision_delay_ms,
        set_provision_delay_ms,
        &["player", "provision_delay_ms"],
        DEFAULT_PROVISION_DELAY_MS
    );

    impl_u64_config!(
        get_load_timeout_secs,
        set_load_timeout_secs,
        &["player", "load_timeout_secs"],
        DEFAULT_LOAD_TIMEOUT_SECS
    );

    impl_u64_config!(
        get_max_retries,
        set_max_retries,
        &["player", "max_retries"],
        DEFAULT_MAX_RETRIES
    );

    impl_delays_config!(
        get_quality_recheck_delays_ms,
        &["player", "quality_recheck_delays_ms"],
        DEFAULT_QUALITY_RECHECK_DELAYS_MS
    );

    impl_delays_config!(
        get_ladder_refresh_delays_ms,
        &["player", "ladder_refresh_delays_ms"],
        DEFAULT_LADDER_REFRESH_DELAYS_MS
    );

    impl_u64_config!(
        get_buffer_good_secs,
        set_buffer_good_secs,
        &["adaptive", "buffer_good_secs"],
        DEFAULT_BUFFER_GOOD_SECS
    );

    impl_u64_config!(
        get_max_buffer_secs,
        set_max_buffer_secs,
        &["adaptive", "max_buffer_secs"],
        DEFAULT_MAX_BUFFER_SECS
    );

    impl_u64_config!(
        get_goal_buffer_secs,
        set_goal_buffer_secs,
        &["adaptive", "goal_buffer_secs"],
        DEFAULT_GOAL_BUFFER_SECS
    );

    impl_u64_config!(
        get_back_buffer_secs,
        set_back_buffer_secs,
        &["adaptive", "back_buffer_secs"],
        DEFAULT_BACK_BUFFER_SECS
    );

    impl_u64_config!(
        get_default_initial_bandwidth,
        set_default_initial_bandwidth,
        &["adaptive", "default_initial_bandwidth"],
        DEFAULT_INITIAL_BANDWIDTH
    );

    impl_string_config!(
        get_relay_path,
        set_relay_path,
        &["relay", "path"],
        DEFAULT_RELAY_PATH
    );

    impl_string_config!(
        get_embed_api_script_url,
        set_embed_api_script_url,
        &["embed", "api_script_url"],
        DEFAULT_EMBED_API_SCRIPT_URL
    );

    impl_string_config!(
        get_embed_api_element_id,
        set_embed_api_element_id,
        &["embed", "api_element_id"],
        DEFAULT_EMBED_API_ELEMENT_ID
    );

    impl_string_config!(
        get_embed_origin,
        set_embed_origin,
        &["embed", "origin"],
        DEFAULT_EMBED_ORIGIN
    );

    impl_string_config!(
        get_log_min_level,
        set_log_min_level,
        &["logger", "min_level"],
        DEFAULT_LOG_MIN_LEVEL
    );

    /// Ratio of the measured bandwidth a higher rendition must fit in before
    /// the adaptive engine switches up.
    pub fn get_bandwidth_upgrade_target(&self) -> Result<f64> {
        match self.get_value(&["adaptive", "bandwidth_upgrade_target"]) {
            Ok(Value::Number(n)) => Ok(n.as_f64().unwrap_or(DEFAULT_BANDWIDTH_UPGRADE_TARGET)),
            _ => Ok(DEFAULT_BANDWIDTH_UPGRADE_TARGET),
        }
    }

    pub fn set_bandwidth_upgrade_target(&self, ratio: f64) -> Result<()> {
        self.set_value(
            &["adaptive", "bandwidth_upgrade_target"],
            Value::Number(Number::from(ratio)),
        )
    }

    /// Last bandwidth estimate (bits per second) reported by an adaptive engine.
    ///
    /// Returns `None` when no estimate was ever recorded.
    pub fn get_last_bandwidth(&self) -> Result<Option<u64>> {
        match self.get_value(&["state", "last_bandwidth"]) {
            Ok(Value::Number(n)) => Ok(n.as_u64().filter(|bw| *bw > 0)),
            Ok(Value::String(s)) => Ok(s.trim().parse::<u64>().ok().filter(|bw| *bw > 0)),
            _ => Ok(None),
        }
    }

    pub fn set_last_bandwidth(&self, bandwidth: u64) -> Result<()> {
        self.set_value(
            &["state", "last_bandwidth"],
            Value::Number(Number::from(bandwidth)),
        )
    }
}

/// Returns the process-wide configuration instance
///
/// The instance is loaded on first access from the default directory lookup.
pub fn get_config() -> Result<Arc<Config>> {
    let mut slot = CONFIG
        .lock()
        .map_err(|_| anyhow!("configuration lock poisoned"))?;
    if let Some(config) = slot.as_ref() {
        return Ok(config.clone());
    }
    let config = Arc::new(Config::load_config("")?);
    *slot = Some(config.clone());
    Ok(config)
}

/// Merges external YAML configuration into default configuration
///
/// Mappings are merged key by key; scalars and sequences from `external`
/// replace the default values.
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(),
    }
}
