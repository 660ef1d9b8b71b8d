//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `host.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - ServerConfig: Where the http server listens.
//!     - PathsConfig: The tmpfs locations written by the sniffer and webcam jobs.
//!     - SummaryConfig: Excluded models and the unit normalization table.
//!     - LoggingConfig: Default log level (RUST_LOG still wins).
//!
//! every section is optional in the file; missing sections take the defaults
//! of the deployed site (everything lives under /ram).
//!
//! ==============================================================================

use anyhow::Context;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::summary::{Conversion, NormalizationRule, MAX_DECIMALS};

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct HostConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// file this was loaded from, None for built-in defaults
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "0.0.0.0:3000".to_string() }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PathsConfig {
    /// json-lines log appended by the 433 MHz sniffer
    pub sensor_log: PathBuf,
    /// holds current.jpg and the .mtime stamp
    pub webcam_dir: PathBuf,
    /// one file per reading of the outdoor sensor (temperature_C, humidity, ...)
    pub sensor_dir: PathBuf,
    /// images that may be requested through /image
    pub image_dir: PathBuf,
    pub video_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            sensor_log: PathBuf::from("/ram/433/433.json"),
            webcam_dir: PathBuf::from("/ram/webcam"),
            sensor_dir: PathBuf::from("/ram/433/Nexus-TH/231"),
            image_dir: PathBuf::from("/ram/webcam"),
            video_dir: PathBuf::from("/ram/videos"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SummaryConfig {
    /// models that never reach /sensors.json
    pub exclude: Vec<String>,
    pub rules: Vec<NormalizationRule>,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            exclude: [
                "Acurite-986",
                "Smoke-GS558",
                "Proove-Security",
                "Nexa-Security",
                "Rubicson-Temperature",
                "Nexus-TH",
                "Prologue-TH",
                "Generic-Temperature",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            rules: default_rules(),
        }
    }
}

impl SummaryConfig {
    pub fn exclude_set(&self) -> BTreeSet<String> {
        self.exclude.iter().cloned().collect()
    }

    fn validate(&self) -> anyhow::Result<()> {
        for rule in &self.rules {
            if rule.decimals > MAX_DECIMALS {
                anyhow::bail!(
                    "rule {}: decimals = {} (at most {})",
                    rule.source,
                    rule.decimals,
                    MAX_DECIMALS
                );
            }
        }
        Ok(())
    }
}

/// fahrenheit -> celsius, psi/kpa -> bar
pub fn default_rules() -> Vec<NormalizationRule> {
    vec![
        NormalizationRule::new("temperature_F", "temperature_C", Conversion::FahrenheitToCelsius, 0),
        NormalizationRule::new("pressure_PSI", "pressure_BAR", Conversion::Scale { factor: 0.06894757 }, 2),
        NormalizationRule::new("pressure_kPa", "pressure_BAR", Conversion::Scale { factor: 0.01 }, 2),
    ]
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

impl HostConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::parse(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse config")?;
        config.summary.validate()?;
        Ok(config)
    }

    /// Load from the usual locations, defaults if none exists
    ///
    /// runs before logging is up, so a config file that exists but does not
    /// parse is an error rather than a warning nobody sees.
    pub fn load_or_default() -> anyhow::Result<Self> {
        let paths = [
            PathBuf::from("config").join("host.toml"),
            PathBuf::from("..").join("config").join("host.toml"),
        ];

        match paths.iter().find(|path| path.exists()) {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Log configuration summary
    pub fn log_summary(&self) {
        match &self.source {
            Some(path) => tracing::info!("Loaded config from {}", path.display()),
            None => tracing::warn!("No config file found - using defaults"),
        }
        tracing::info!(
            bind = %self.server.bind,
            sensor_log = %self.paths.sensor_log.display(),
            webcam_dir = %self.paths.webcam_dir.display(),
            sensor_dir = %self.paths.sensor_dir.display(),
            video_dir = %self.paths.video_dir.display(),
            excluded_models = self.summary.exclude.len(),
            rules = self.summary.rules.len(),
            "host configuration"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_site_defaults() {
        let config = HostConfig::parse("").unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:3000");
        assert_eq!(config.paths.sensor_log, PathBuf::from("/ram/433/433.json"));
        assert!(config.summary.exclude_set().contains("Acurite-986"));
        assert_eq!(config.summary.rules.len(), 3);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = HostConfig::parse(
            r#"
            [paths]
            sensor_log = "/tmp/433.json"

            [summary]
            exclude = ["Oregon-THGR122N"]
            "#,
        )
        .unwrap();

        assert_eq!(config.paths.sensor_log, PathBuf::from("/tmp/433.json"));
        assert_eq!(config.paths.webcam_dir, PathBuf::from("/ram/webcam"));
        assert_eq!(config.summary.exclude, vec!["Oregon-THGR122N".to_string()]);
        // rules not given, defaults stay
        assert_eq!(config.summary.rules.len(), 3);
    }

    #[test]
    fn rules_from_toml() {
        let config = HostConfig::parse(
            r#"
            [[summary.rules]]
            source = "wind_speed_mph"
            target = "wind_speed_kmh"
            conversion = { kind = "scale", factor = 1.609344 }
            decimals = 1

            [[summary.rules]]
            source = "temperature_F"
            target = "temperature_C"
            conversion = { kind = "fahrenheit_to_celsius" }
            "#,
        )
        .unwrap();

        let rules = &config.summary.rules;
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].source, "wind_speed_mph");
        assert_eq!(rules[0].conversion, Conversion::Scale { factor: 1.609344 });
        assert_eq!(rules[0].decimals, 1);
        assert_eq!(rules[1].conversion, Conversion::FahrenheitToCelsius);
        assert_eq!(rules[1].decimals, 0);
    }

    #[test]
    fn shipped_host_toml_matches_defaults() {
        let shipped = HostConfig::parse(include_str!("../config/host.toml")).unwrap();
        let defaults = HostConfig::default();
        assert_eq!(shipped.server.bind, defaults.server.bind);
        assert_eq!(shipped.paths.sensor_dir, defaults.paths.sensor_dir);
        assert_eq!(shipped.summary.exclude, defaults.summary.exclude);
        assert_eq!(shipped.summary.rules, defaults.summary.rules);
    }

    #[test]
    fn excessive_precision_is_rejected() {
        let rule = |decimals: usize| {
            format!(
                "[[summary.rules]]\nsource = \"pressure_kPa\"\ntarget = \"pressure_BAR\"\n\
                 conversion = {{ kind = \"scale\", factor = 0.01 }}\ndecimals = {}\n",
                decimals
            )
        };

        let err = HostConfig::parse(&rule(400)).unwrap_err();
        assert!(format!("{:#}", err).contains("pressure_kPa"));
        assert!(HostConfig::parse(&rule(MAX_DECIMALS)).is_ok());
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(HostConfig::parse("[server\nbind = 1").is_err());
    }

    #[test]
    fn load_records_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host.toml");
        std::fs::write(&path, "[server]\nbind = \"127.0.0.1:8080\"\n").unwrap();

        let config = HostConfig::load(&path).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.source.as_deref(), Some(path.as_path()));
        assert!(HostConfig::default().source.is_none());
    }
}
