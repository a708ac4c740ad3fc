//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `iot-status.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - CollectionConfig: where records are read from and posted to.
//!     - ClockConfig: the fixed civil timezone records are stamped in.
//!     - IdentityConfig: fallback device name and the public ip echo service.
//!     - StorageConfig: where the remembered device name lives.
//!     - RecorderConfig: the status labels offered as buttons.
//!     - ViewsConfig: window size and poll interval of each view.
//!     - ServerConfig / LoggingConfig: dashboard bind address, log level.
//!
//! ==============================================================================

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub collection: CollectionConfig,
    #[serde(default)]
    pub clock: ClockConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub recorder: RecorderConfig,
    #[serde(default)]
    pub views: ViewsConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CollectionConfig {
    pub url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ClockConfig {
    /// IANA zone name, e.g. "America/Mexico_City"
    pub timezone: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IdentityConfig {
    pub fallback_name: String,
    pub max_label_len: usize,
    pub ip_lookup_url: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// json file holding remembered values
    pub path: PathBuf,
    /// keep remembered values in memory only, `path` is ignored
    pub in_memory: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RecorderConfig {
    pub statuses: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewConfig {
    pub window: usize,
    pub interval_seconds: u64,
}

/// a `[views.*]` table as written; unset keys take that view's defaults
#[derive(Debug, Deserialize, Clone, Copy, Default)]
struct ViewOverrides {
    window: Option<usize>,
    interval_seconds: Option<u64>,
}

impl ViewOverrides {
    fn over(self, base: ViewConfig) -> ViewConfig {
        ViewConfig {
            window: self.window.unwrap_or(base.window),
            interval_seconds: self.interval_seconds.unwrap_or(base.interval_seconds),
        }
    }
}

impl ViewConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds.max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(from = "ViewsFile")]
pub struct ViewsConfig {
    pub recorder: ViewConfig,
    pub monitor: ViewConfig,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ViewsFile {
    recorder: ViewOverrides,
    monitor: ViewOverrides,
}

impl From<ViewsFile> for ViewsConfig {
    fn from(file: ViewsFile) -> Self {
        Self {
            recorder: file.recorder.over(default_recorder_view()),
            monitor: file.monitor.over(default_monitor_view()),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

pub const DEFAULT_API_URL: &str =
    "https://68bb0e9184055bce63f10925.mockapi.io/api/v1/dispositivos_IoT";

fn default_timeout_seconds() -> u64 {
    10
}

fn default_max_label_len() -> usize {
    60
}

fn default_recorder_view() -> ViewConfig {
    ViewConfig { window: 5, interval_seconds: 15 }
}

fn default_monitor_view() -> ViewConfig {
    ViewConfig { window: 10, interval_seconds: 2 }
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self { url: DEFAULT_API_URL.to_string(), timeout_seconds: default_timeout_seconds() }
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self { timezone: "America/Mexico_City".to_string() }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            fallback_name: "IoT Web Panel".to_string(),
            max_label_len: default_max_label_len(),
            ip_lookup_url: "https://api.ipify.org?format=json".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { path: PathBuf::from("state").join("device.json"), in_memory: false }
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            statuses: ["online", "offline", "maintenance", "error"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl Default for ViewsConfig {
    fn default() -> Self {
        Self { recorder: default_recorder_view(), monitor: default_monitor_view() }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "0.0.0.0:3000".to_string() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;

        if config.views.recorder.window == 0 || config.views.monitor.window == 0 {
            anyhow::bail!("view window must be at least 1");
        }
        if config.recorder.statuses.is_empty() {
            anyhow::bail!("recorder.statuses must offer at least one status");
        }
        Ok(config)
    }

    /// Load an explicit path, or search the default locations and fall back to defaults
    ///
    /// an explicit path that fails to load is an error; the default search
    /// only warns. runs before logging is set up, so it prints.
    pub fn load_or_default(explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            let config = Self::load(path)?;
            println!("[CONFIG] Loaded from {}", path.display());
            return Ok(config);
        }

        let paths = [
            PathBuf::from("config").join("iot-status.toml"),
            PathBuf::from("..").join("config").join("iot-status.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        println!("[CONFIG] Loaded from {}", path.display());
                        return Ok(config);
                    }
                    Err(e) => {
                        println!("[CONFIG] Warning: Failed to load {}: {:#}", path.display(), e);
                    }
                }
            }
        }

        println!("[CONFIG] Warning: No config file found - using defaults");
        Ok(Self::default())
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("┌─────────────────────────────────────────┐");
        println!("│           IOT STATUS CONFIGURATION      │");
        println!("├─────────────────────────────────────────┤");
        println!("│ Collection: {}", self.collection.url);
        println!("│ Timezone: {}", self.clock.timezone);
        println!(
            "│ Recorder view: {} rows every {}s",
            self.views.recorder.window, self.views.recorder.interval_seconds
        );
        println!(
            "│ Monitor view: {} rows every {}s",
            self.views.monitor.window, self.views.monitor.interval_seconds
        );
        println!("│ Statuses: {}", self.recorder.statuses.join(", "));
        println!("│ Log Level: {}", self.logging.level);
        println!("└─────────────────────────────────────────┘");
    }
}
