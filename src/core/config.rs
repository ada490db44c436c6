use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::core::deletion::{DEFAULT_CONFIDENCE_THRESHOLD, effective_threshold};

const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub gemini: GeminiConfig,

    #[serde(default)]
    pub kakao: KakaoConfig,

    #[serde(default)]
    pub weather: WeatherConfig,

    #[serde(default)]
    pub location: LocationConfig,

    #[serde(default)]
    pub assistant: AssistantConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Resolved at load time, never read from the file.
    #[serde(skip)]
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    /// Plain chat, intent parsing and weather answers.
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    #[serde(default = "default_routing_model")]
    pub routing_model: String,

    #[serde(default = "default_geocoding_model")]
    pub geocoding_model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KakaoConfig {
    #[serde(default)]
    pub rest_api_key: String,

    #[serde(default = "default_kakao_base_url")]
    pub base_url: String,

    #[serde(default = "default_search_radius")]
    pub search_radius: u32,

    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeatherConfig {
    #[serde(default)]
    pub short_range_key: String,

    #[serde(default)]
    pub mid_range_key: String,

    #[serde(default = "default_short_range_url")]
    pub short_range_url: String,

    #[serde(default = "default_mid_range_url")]
    pub mid_range_url: String,

    #[serde(default = "default_mid_station_id")]
    pub mid_station_id: String,

    #[serde(default = "default_mid_region_id")]
    pub mid_region_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocationConfig {
    #[serde(default = "default_latitude")]
    pub latitude: f64,

    #[serde(default = "default_longitude")]
    pub longitude: f64,

    #[serde(default = "default_location_name")]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssistantConfig {
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_confidence_threshold")]
    pub deletion_confidence_threshold: f64,

    #[serde(default = "default_reminder_lead")]
    pub reminder_lead_minutes: i64,

    #[serde(default = "default_max_places")]
    pub max_nearby_results: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub echo_stderr: bool,
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta/models".to_string()
}
fn default_chat_model() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_routing_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_geocoding_model() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_kakao_base_url() -> String {
    "https://dapi.kakao.com/v2/local".to_string()
}
fn default_search_radius() -> u32 {
    1000
}
fn default_page_size() -> u32 {
    15
}
fn default_short_range_url() -> String {
    "https://apis.data.go.kr/1360000/VilageFcstInfoService_2.0".to_string()
}
fn default_mid_range_url() -> String {
    "https://apis.data.go.kr/1360000/MidFcstInfoService".to_string()
}
fn default_mid_station_id() -> String {
    "108".to_string()
}
fn default_mid_region_id() -> String {
    "11A00101".to_string()
}
fn default_latitude() -> f64 {
    37.5665
}
fn default_longitude() -> f64 {
    126.9780
}
fn default_location_name() -> String {
    "서울".to_string()
}
fn default_timeout_secs() -> u64 {
    8
}
fn default_confidence_threshold() -> f64 {
    DEFAULT_CONFIDENCE_THRESHOLD
}
fn default_reminder_lead() -> i64 {
    60
}
fn default_max_places() -> usize {
    10
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_gemini_base_url(),
            chat_model: default_chat_model(),
            routing_model: default_routing_model(),
            geocoding_model: default_geocoding_model(),
        }
    }
}

impl Default for KakaoConfig {
    fn default() -> Self {
        Self {
            rest_api_key: String::new(),
            base_url: default_kakao_base_url(),
            search_radius: default_search_radius(),
            page_size: default_page_size(),
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            short_range_key: String::new(),
            mid_range_key: String::new(),
            short_range_url: default_short_range_url(),
            mid_range_url: default_mid_range_url(),
            mid_station_id: default_mid_station_id(),
            mid_region_id: default_mid_region_id(),
        }
    }
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            latitude: default_latitude(),
            longitude: default_longitude(),
            name: default_location_name(),
        }
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_timeout_secs(),
            deletion_confidence_threshold: default_confidence_threshold(),
            reminder_lead_minutes: default_reminder_lead(),
            max_nearby_results: default_max_places(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            echo_stderr: false,
        }
    }
}

/// Root data directory. `DAYMATE_DATA_DIR` wins over `~/.daymate`.
pub fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("DAYMATE_DATA_DIR")
        && !dir.trim().is_empty()
    {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".daymate")
}

impl AppConfig {
    /// Load `config.toml` from `data_dir` (defaults when missing), then apply
    /// environment overrides.
    pub async fn load<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        let config_path = data_dir.join(CONFIG_FILE);
        let mut config = if config_path.exists() {
            let content = tokio::fs::read_to_string(&config_path).await?;
            toml::from_str::<AppConfig>(&content)?
        } else {
            info!("No config.toml found in {:?}, using defaults.", data_dir);
            AppConfig::default()
        };
        config.data_dir = data_dir;
        config.apply_env(|key| std::env::var(key).ok());
        config.clamp();

        info!(
            "Loaded config: gemini={}, kakao={}, weather={}, timeout={}s",
            config.is_gemini_configured(),
            !config.kakao.rest_api_key.is_empty(),
            !config.weather.short_range_key.is_empty(),
            config.assistant.request_timeout_secs
        );
        Ok(config)
    }

    /// Overlay secrets and log level from the environment. `lookup` is injected
    /// so tests do not touch the process environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("GEMINI_API_KEY") {
            self.gemini.api_key = key;
        }
        if let Some(key) = non_empty("KAKAO_REST_API_KEY") {
            self.kakao.rest_api_key = key;
        }
        if let Some(key) = non_empty("KMA_API_KEY") {
            self.weather.short_range_key = key;
        }
        if let Some(key) = non_empty("KMA_MID_API_KEY") {
            self.weather.mid_range_key = key;
        }
        if let Some(level) = non_empty("DAYMATE_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    fn clamp(&mut self) {
        self.assistant.deletion_confidence_threshold =
            effective_threshold(self.assistant.deletion_confidence_threshold);
        if self.assistant.request_timeout_secs == 0 {
            self.assistant.request_timeout_secs = default_timeout_secs();
        }
        if self.assistant.max_nearby_results == 0 {
            self.assistant.max_nearby_results = default_max_places();
        }
    }

    /// False when the key is missing or still the placeholder value.
    pub fn is_gemini_configured(&self) -> bool {
        let key = self.gemini.api_key.trim();
        !key.is_empty() && key != "your_gemini_api_key"
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("daymate.db")
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("daymate.log")
    }
}
