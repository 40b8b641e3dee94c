use crate::application::locator::FeatureLocator;
use crate::domain::staleness::StalenessPolicy;
use crate::domain::thing::SignalPolicy;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    #[serde(default)]
    pub server: ServerSettings,
    pub sensor_feed: SensorFeedSettings,
    pub dataset_feed: DatasetFeedSettings,
    #[serde(default)]
    pub staleness: StalenessSettings,
    #[serde(default)]
    pub signals: SignalSettings,
    #[serde(default)]
    pub view: ViewSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SensorFeedSettings {
    pub url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_refresh_ms")]
    pub refresh_ms: u64,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatasetFeedSettings {
    pub url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StalenessSettings {
    #[serde(default = "default_offline_threshold_ms")]
    pub offline_threshold_ms: i64,
}

impl Default for StalenessSettings {
    fn default() -> Self {
        Self {
            offline_threshold_ms: default_offline_threshold_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SignalSettings {
    #[serde(default = "default_preferred_signals")]
    pub preferred: Vec<String>,
}

impl Default for SignalSettings {
    fn default() -> Self {
        Self {
            preferred: default_preferred_signals(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ViewSettings {
    #[serde(default = "default_initial_zoom")]
    pub initial_zoom: u8,
    #[serde(default = "default_point_zoom")]
    pub point_zoom: u8,
    #[serde(default = "default_point_zoom")]
    pub max_fit_zoom: u8,
    #[serde(default = "default_fit_padding_px")]
    pub fit_padding_px: u32,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            initial_zoom: default_initial_zoom(),
            point_zoom: default_point_zoom(),
            max_fit_zoom: default_point_zoom(),
            fit_padding_px: default_fit_padding_px(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_timeout_ms() -> u64 {
    15_000
}

fn default_refresh_ms() -> u64 {
    300_000
}

fn default_history_limit() -> usize {
    300
}

fn default_offline_threshold_ms() -> i64 {
    15_000
}

fn default_preferred_signals() -> Vec<String> {
    vec!["sound".to_string(), "level".to_string()]
}

fn default_initial_zoom() -> u8 {
    13
}

fn default_point_zoom() -> u8 {
    16
}

fn default_fit_padding_px() -> u32 {
    50
}

impl SensorFeedSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_ms)
    }
}

impl DatasetFeedSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl DashboardConfig {
    pub fn staleness_policy(&self) -> StalenessPolicy {
        StalenessPolicy::new(chrono::Duration::milliseconds(self.staleness.offline_threshold_ms))
    }

    pub fn signal_policy(&self) -> SignalPolicy {
        SignalPolicy::preferring(self.signals.preferred.as_slice())
    }

    /// Rejects settings that would stall or panic the refresh loop.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.sensor_feed.refresh_ms > 0,
            "sensor_feed.refresh_ms must be greater than zero"
        );
        anyhow::ensure!(
            self.sensor_feed.timeout_ms > 0,
            "sensor_feed.timeout_ms must be greater than zero"
        );
        anyhow::ensure!(
            self.dataset_feed.timeout_ms > 0,
            "dataset_feed.timeout_ms must be greater than zero"
        );
        Ok(())
    }

    pub fn locator(&self) -> FeatureLocator {
        FeatureLocator {
            point_zoom: self.view.point_zoom,
            max_fit_zoom: self.view.max_fit_zoom,
            padding_px: self.view.fit_padding_px,
        }
    }
}

/// Reads `config/dashboard.*`, then `DASHBOARD__SECTION__KEY` overrides.
pub fn load_dashboard_config() -> anyhow::Result<DashboardConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/dashboard"))
        .add_source(config::Environment::with_prefix("DASHBOARD").separator("__"))
        .build()?;

    let config: DashboardConfig = settings.try_deserialize()?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> DashboardConfig {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config = parse(
            r#"
            [sensor_feed]
            url = "https://feed.example/frost/get"

            [dataset_feed]
            url = "https://data.example"
            "#,
        );

        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert_eq!(config.sensor_feed.refresh_interval(), Duration::from_secs(300));
        assert_eq!(config.sensor_feed.timeout(), Duration::from_secs(15));
        assert_eq!(config.sensor_feed.token, None);
        assert_eq!(config.staleness_policy(), StalenessPolicy::default());
        assert_eq!(config.signal_policy(), SignalPolicy::default());
        assert_eq!(config.locator(), FeatureLocator::default());
        assert_eq!(config.view.initial_zoom, 13);
    }

    #[test]
    fn test_knobs_override_defaults() {
        let config = parse(
            r#"
            [sensor_feed]
            url = "https://feed.example/frost/get"
            token = "abc"
            refresh_ms = 5000

            [dataset_feed]
            url = "https://data.example"
            timeout_ms = 2000

            [staleness]
            offline_threshold_ms = 60000

            [signals]
            preferred = ["temp"]
            "#,
        );

        assert_eq!(config.sensor_feed.refresh_interval(), Duration::from_secs(5));
        assert_eq!(config.sensor_feed.token.as_deref(), Some("abc"));
        assert_eq!(config.dataset_feed.timeout(), Duration::from_secs(2));
        assert_eq!(
            config.staleness_policy().offline_threshold,
            chrono::Duration::seconds(60)
        );
        assert_eq!(config.signal_policy(), SignalPolicy::preferring(&["temp"]));
    }

    #[test]
    fn test_zero_refresh_period_is_rejected() {
        let config = parse(
            r#"
            [sensor_feed]
            url = "https://feed.example/frost/get"
            refresh_ms = 0

            [dataset_feed]
            url = "https://data.example"
            "#,
        );

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("refresh_ms"));

        let valid = parse(
            r#"
            [sensor_feed]
            url = "https://feed.example/frost/get"

            [dataset_feed]
            url = "https://data.example"
            "#,
        );
        assert!(valid.validate().is_ok());
    }
}
