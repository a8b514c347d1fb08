//! Session tuning, loaded from `ondaconfig` or taken from defaults.

use std::time::Duration;

use ondaconfig::Config;

use crate::errors::PlayerError;

/// Buffering and ABR knobs for the adaptive engine.
///
/// Defaults favour a small memory footprint over resilience: TV hardware
/// runs out of memory long before it runs out of bandwidth.
#[derive(Clone, Debug, PartialEq)]
pub struct AdaptiveTuning {
    pub buffer_good: Duration,
    pub max_buffer: Duration,
    pub goal_buffer: Duration,
    pub back_buffer: Duration,
    pub bandwidth_upgrade_target: f64,
    /// Initial estimate when no bandwidth was ever recorded.
    pub default_initial_bandwidth: u64,
}

impl Default for AdaptiveTuning {
    fn default() -> Self {
        Self {
            buffer_good: Duration::from_secs(5),
            max_buffer: Duration::from_secs(15),
            goal_buffer: Duration::from_secs(5),
            back_buffer: Duration::ZERO,
            bandwidth_upgrade_target: 0.85,
            default_initial_bandwidth: 500_000,
        }
    }
}

impl AdaptiveTuning {
    /// Builds the construction options for one engine instance.
    pub fn engine_config(
        &self,
        last_bandwidth: Option<u64>,
        autoplay: bool,
        volume: f64,
    ) -> AdaptiveEngineConfig {
        AdaptiveEngineConfig {
            autoplay,
            volume,
            seeded_bandwidth: last_bandwidth,
            initial_bandwidth: last_bandwidth.unwrap_or(self.default_initial_bandwidth),
            buffer_good: self.buffer_good,
            max_buffer: self.max_buffer,
            goal_buffer: self.goal_buffer,
            back_buffer: self.back_buffer,
            fast_quality_change: true,
            smooth_quality_change: false,
            override_native: true,
            limit_rendition_by_player_dimensions: false,
            use_device_pixel_ratio: false,
            use_network_information: true,
            bandwidth_upgrade_target: self.bandwidth_upgrade_target,
        }
    }
}

/// Options handed to [`crate::EngineFactory::create`].
#[derive(Clone, Debug, PartialEq)]
pub struct AdaptiveEngineConfig {
    pub autoplay: bool,
    pub volume: f64,
    /// Persisted estimate from a previous session, if any.
    pub seeded_bandwidth: Option<u64>,
    pub initial_bandwidth: u64,
    pub buffer_good: Duration,
    pub max_buffer: Duration,
    pub goal_buffer: Duration,
    pub back_buffer: Duration,
    pub fast_quality_change: bool,
    pub smooth_quality_change: bool,
    pub override_native: bool,
    pub limit_rendition_by_player_dimensions: bool,
    pub use_device_pixel_ratio: bool,
    pub use_network_information: bool,
    pub bandwidth_upgrade_target: f64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmbedSettings {
    pub api_script_url: String,
    /// Element id used to make script injection idempotent.
    pub api_element_id: String,
    /// Page origin appended to embed URLs for postMessage checks.
    pub origin: String,
}

impl Default for EmbedSettings {
    fn default() -> Self {
        Self {
            api_script_url: "https://www.youtube.com/iframe_api".to_string(),
            api_element_id: "youtube-iframe-api".to_string(),
            origin: "http://localhost".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlayerSettings {
    /// Delay between disposal and provisioning, lets the surface remount.
    pub provision_delay: Duration,
    /// Load watchdog bound.
    pub load_timeout: Duration,
    /// Consecutive playlist retries tolerated before giving up.
    pub max_retries: u32,
    /// Convergence checks after returning to Auto.
    pub quality_recheck_delays: Vec<Duration>,
    /// Ladder refreshes after provisioning.
    pub ladder_refresh_delays: Vec<Duration>,
    pub relay_path: String,
    pub adaptive: AdaptiveTuning,
    pub embed: EmbedSettings,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            provision_delay: Duration::from_millis(100),
            load_timeout: Duration::from_secs(10),
            max_retries: 3,
            quality_recheck_delays: millis(&[0, 500, 1000, 2000]),
            ladder_refresh_delays: millis(&[1000, 3000]),
            relay_path: "/relay".to_string(),
            adaptive: AdaptiveTuning::default(),
            embed: EmbedSettings::default(),
        }
    }
}

impl PlayerSettings {
    pub fn from_config(config: &Config) -> Result<Self, PlayerError> {
        Ok(Self {
            provision_delay: Duration::from_millis(config.get_provision_delay_ms()?),
            load_timeout: Duration::from_secs(config.get_load_timeout_secs()?),
            max_retries: u32::try_from(config.get_max_retries()?).unwrap_or(u32::MAX),
            quality_recheck_delays: millis(&config.get_quality_recheck_delays_ms()?),
            ladder_refresh_delays: millis(&config.get_ladder_refresh_delays_ms()?),
            relay_path: config.get_relay_path()?,
            adaptive: AdaptiveTuning {
                buffer_good: Duration::from_secs(config.get_buffer_good_secs()?),
                max_buffer: Duration::from_secs(config.get_max_buffer_secs()?),
                goal_buffer: Duration::from_secs(config.get_goal_buffer_secs()?),
                back_buffer: Duration::from_secs(config.get_back_buffer_secs()?),
                bandwidth_upgrade_target: config.get_bandwidth_upgrade_target()?,
                default_initial_bandwidth: config.get_default_initial_bandwidth()?,
            },
            embed: EmbedSettings {
                api_script_url: config.get_embed_api_script_url()?,
                api_element_id: config.get_embed_api_element_id()?,
                origin: config.get_embed_origin()?,
            },
        })
    }
}

fn millis(values: &[u64]) -> Vec<Duration> {
    values.iter().copied().map(Duration::from_millis).collect()
}
