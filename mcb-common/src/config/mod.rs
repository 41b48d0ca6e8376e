//! Configuration model for MCBench.
//!
//! A single TOML file (`mcbench.toml`) holds every tunable. All sections have
//! defaults, so an empty or missing file yields a usable configuration with
//! the stock `minimum`/`normal`/`extreme` profiles. Values are read once when
//! a session starts; `reload` only affects later sessions.

pub mod env;

pub use env::{EnvError, EnvParser};

use crate::errors::ConfigError;
use crate::types::BenchmarkProfile;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const CONFIG_FILE_NAME: &str = "mcbench.toml";
pub const DEFAULT_MINIMUM_RAM_MB: u64 = 1024;

/// Root of the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BenchConfig {
    pub settings: Settings,
    pub benchmark_point: BenchmarkPointSettings,
    pub profiles: BTreeMap<String, ProfileSettings>,
    /// Canonical location of scoring coefficients: `scoring.<profile>`.
    pub scoring: BTreeMap<String, ScoringSettings>,
    pub minimum_ram_per_profile: BTreeMap<String, u64>,
    pub recommendations: RecommendationSettings,
    pub host: HostSettings,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            benchmark_point: BenchmarkPointSettings::default(),
            profiles: default_profiles(),
            scoring: default_scoring(),
            minimum_ram_per_profile: default_minimum_ram(),
            recommendations: RecommendationSettings::default(),
            host: HostSettings::default(),
        }
    }
}

impl BenchConfig {
    /// Parse and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&raw).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        info!(path = %path.display(), profiles = config.profiles.len(), "Loaded configuration");
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!(path = %path.display(), "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Default location: `$MCB_CONFIG`, else `<config dir>/mcbench/mcbench.toml`,
    /// else `./mcbench.toml`.
    pub fn default_path() -> PathBuf {
        let mut parser = EnvParser::new();
        if let Some(path) = parser.get_path("CONFIG") {
            return path;
        }
        dirs::config_dir()
            .map(|dir| dir.join("mcbench").join(CONFIG_FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.profiles.is_empty() {
            return Err(ConfigError::invalid("profiles", "at least one profile is required"));
        }
        for (name, profile) in &self.profiles {
            profile.validate(name)?;
        }
        for (name, scoring) in &self.scoring {
            if !scoring.penalty_per_second.is_finite() || scoring.penalty_per_second < 0.0 {
                return Err(ConfigError::invalid(
                    format!("scoring.{name}.penaltyPerSecond"),
                    "must be a non-negative number",
                ));
            }
        }
        if self.settings.global_timeout_seconds == 0 {
            return Err(ConfigError::invalid(
                "settings.globalTimeoutSeconds",
                "must be greater than 0",
            ));
        }
        if self.settings.confirmation_seconds == 0 {
            return Err(ConfigError::invalid(
                "settings.confirmationSeconds",
                "must be greater than 0",
            ));
        }
        if self.settings.emergency.duration_seconds == 0 {
            return Err(ConfigError::invalid(
                "settings.emergency.durationSeconds",
                "must be greater than 0",
            ));
        }
        if !(self.benchmark_point.divisor.is_finite() && self.benchmark_point.divisor > 0.0) {
            return Err(ConfigError::invalid(
                "benchmarkPoint.divisor",
                "must be greater than 0",
            ));
        }
        Ok(())
    }

    pub fn profile_names(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }

    /// Resolve a named profile into its immutable session form.
    pub fn profile(&self, name: &str) -> Result<BenchmarkProfile, ConfigError> {
        let settings = self
            .profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile {
                name: name.to_string(),
                available: self.profile_names(),
            })?;
        Ok(settings.to_profile(name))
    }

    /// Scoring coefficients for a profile; missing entries use the stock values.
    pub fn scoring_for(&self, profile: &str) -> ScoringSettings {
        self.scoring.get(profile).cloned().unwrap_or_default()
    }

    pub fn minimum_ram_mb(&self, profile: &str) -> u64 {
        self.minimum_ram_per_profile
            .get(profile)
            .copied()
            .unwrap_or(DEFAULT_MINIMUM_RAM_MB)
    }
}

// ── settings.* ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_global_timeout")]
    pub global_timeout_seconds: u64,
    /// Countdown units before an unconfirmed start expires.
    #[serde(default = "default_confirmation_seconds")]
    pub confirmation_seconds: u32,
    #[serde(default = "default_grace_delay")]
    pub grace_delay_seconds: u64,
    #[serde(default)]
    pub emergency: EmergencySettings,
    #[serde(default)]
    pub export: ExportSettings,
    #[serde(default)]
    pub safe_mode: SafeModeSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            global_timeout_seconds: default_global_timeout(),
            confirmation_seconds: default_confirmation_seconds(),
            grace_delay_seconds: default_grace_delay(),
            emergency: EmergencySettings::default(),
            export: ExportSettings::default(),
            safe_mode: SafeModeSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencySettings {
    /// How long MSPT must stay above the profile threshold before aborting.
    #[serde(default = "default_emergency_duration")]
    pub duration_seconds: u64,
}

impl Default for EmergencySettings {
    fn default() -> Self {
        Self {
            duration_seconds: default_emergency_duration(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_export_dir")]
    pub directory: PathBuf,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: default_export_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeModeSettings {
    #[serde(default = "default_kick_message")]
    pub kick_message: String,
    #[serde(default = "default_true")]
    pub clear_dropped_items: bool,
}

impl Default for SafeModeSettings {
    fn default() -> Self {
        Self {
            kick_message: default_kick_message(),
            clear_dropped_items: true,
        }
    }
}

// ── benchmarkPoint.* ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkPointSettings {
    #[serde(default = "default_divisor")]
    pub divisor: f64,
    /// Recovery is complete once TPS is at least this...
    #[serde(default = "default_target_tps")]
    pub target_tps: f64,
    /// ...and MSPT is at most this.
    #[serde(default = "default_target_mspt")]
    pub target_mspt: f64,
}

impl Default for BenchmarkPointSettings {
    fn default() -> Self {
        Self {
            divisor: default_divisor(),
            target_tps: default_target_tps(),
            target_mspt: default_target_mspt(),
        }
    }
}

// ── profiles.<name> / scoring.<name> ────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSettings {
    #[serde(default = "default_duration")]
    pub duration_seconds: u64,
    #[serde(default = "default_intensity")]
    pub intensity_multiplier: f64,
    #[serde(default = "default_tick_interval")]
    pub tick_interval: u64,
    #[serde(default = "default_loop_count")]
    pub loop_count_per_tick: u64,
    #[serde(default = "default_emergency_mspt")]
    pub emergency_mspt_threshold: f64,
}

impl Default for ProfileSettings {
    fn default() -> Self {
        Self {
            duration_seconds: default_duration(),
            intensity_multiplier: default_intensity(),
            tick_interval: default_tick_interval(),
            loop_count_per_tick: default_loop_count(),
            emergency_mspt_threshold: default_emergency_mspt(),
        }
    }
}

impl ProfileSettings {
    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        let key = |field: &str| format!("profiles.{name}.{field}");
        if self.duration_seconds == 0 {
            return Err(ConfigError::invalid(key("durationSeconds"), "must be greater than 0"));
        }
        if !(self.intensity_multiplier.is_finite() && self.intensity_multiplier > 0.0) {
            return Err(ConfigError::invalid(
                key("intensityMultiplier"),
                "must be greater than 0",
            ));
        }
        if self.tick_interval == 0 {
            return Err(ConfigError::invalid(key("tickInterval"), "must be greater than 0"));
        }
        if self.loop_count_per_tick == 0 {
            return Err(ConfigError::invalid(
                key("loopCountPerTick"),
                "must be greater than 0",
            ));
        }
        if !(self.emergency_mspt_threshold.is_finite() && self.emergency_mspt_threshold > 0.0) {
            return Err(ConfigError::invalid(
                key("emergencyMsptThreshold"),
                "must be greater than 0",
            ));
        }
        Ok(())
    }

    pub fn to_profile(&self, name: &str) -> BenchmarkProfile {
        BenchmarkProfile {
            name: name.to_string(),
            duration_seconds: self.duration_seconds,
            intensity_multiplier: self.intensity_multiplier,
            tick_interval: self.tick_interval,
            loop_count_per_tick: self.loop_count_per_tick,
            emergency_mspt_threshold: self.emergency_mspt_threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringSettings {
    #[serde(default = "default_base_points")]
    pub profile_base_points: i64,
    #[serde(default = "default_penalty")]
    pub penalty_per_second: f64,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            profile_base_points: default_base_points(),
            penalty_per_second: default_penalty(),
        }
    }
}

// ── recommendations.thresholds.* ────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationSettings {
    #[serde(default)]
    pub thresholds: RecommendationThresholds,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationThresholds {
    #[serde(default = "default_low_tps")]
    pub low_tps: f64,
    #[serde(default = "default_high_mspt")]
    pub high_mspt: f64,
    #[serde(default = "default_high_ram")]
    pub high_ram_usage: f64,
    #[serde(default = "default_high_cpu")]
    pub high_cpu_usage: f64,
    #[serde(default = "default_high_chunks")]
    pub high_chunk_count: u64,
    #[serde(default = "default_high_entities")]
    pub high_entity_count: u64,
}

impl Default for RecommendationThresholds {
    fn default() -> Self {
        Self {
            low_tps: default_low_tps(),
            high_mspt: default_high_mspt(),
            high_ram_usage: default_high_ram(),
            high_cpu_usage: default_high_cpu(),
            high_chunk_count: default_high_chunks(),
            high_entity_count: default_high_entities(),
        }
    }
}

// ── host.* ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostSettings {
    /// Heap ceiling in MB reported to scoring and RAM checks. 0 = physical memory.
    #[serde(default)]
    pub memory_limit_mb: u64,
    #[serde(default = "default_run_log")]
    pub run_log: PathBuf,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            memory_limit_mb: 0,
            run_log: default_run_log(),
        }
    }
}

// ── defaults ────────────────────────────────────────────────────────────

fn default_true() -> bool {
    true
}

fn default_global_timeout() -> u64 {
    300
}

fn default_confirmation_seconds() -> u32 {
    60
}

fn default_grace_delay() -> u64 {
    3
}

fn default_emergency_duration() -> u64 {
    10
}

fn default_export_dir() -> PathBuf {
    PathBuf::from("results")
}

fn default_kick_message() -> String {
    "Server is running a performance benchmark. Please rejoin shortly.".to_string()
}

fn default_divisor() -> f64 {
    50000.0
}

fn default_target_tps() -> f64 {
    20.0
}

fn default_target_mspt() -> f64 {
    25.0
}

fn default_duration() -> u64 {
    120
}

fn default_intensity() -> f64 {
    1.0
}

fn default_tick_interval() -> u64 {
    1
}

fn default_loop_count() -> u64 {
    1_000_000
}

fn default_emergency_mspt() -> f64 {
    1000.0
}

fn default_base_points() -> i64 {
    1000
}

fn default_penalty() -> f64 {
    10.0
}

fn default_low_tps() -> f64 {
    18.0
}

fn default_high_mspt() -> f64 {
    30.0
}

fn default_high_ram() -> f64 {
    80.0
}

fn default_high_cpu() -> f64 {
    85.0
}

fn default_high_chunks() -> u64 {
    500
}

fn default_high_entities() -> u64 {
    1000
}

fn default_run_log() -> PathBuf {
    PathBuf::from("runs.log")
}

fn default_profiles() -> BTreeMap<String, ProfileSettings> {
    let mut profiles = BTreeMap::new();
    profiles.insert(
        "minimum".to_string(),
        ProfileSettings {
            duration_seconds: 60,
            intensity_multiplier: 0.5,
            loop_count_per_tick: 500_000,
            ..ProfileSettings::default()
        },
    );
    profiles.insert("normal".to_string(), ProfileSettings::default());
    profiles.insert(
        "extreme".to_string(),
        ProfileSettings {
            duration_seconds: 180,
            intensity_multiplier: 2.0,
            loop_count_per_tick: 2_000_000,
            emergency_mspt_threshold: 2000.0,
            ..ProfileSettings::default()
        },
    );
    profiles
}

fn default_scoring() -> BTreeMap<String, ScoringSettings> {
    [("minimum", 500, 5.0), ("normal", 1000, 10.0), ("extreme", 2000, 15.0)]
        .into_iter()
        .map(|(name, base, penalty)| {
            (
                name.to_string(),
                ScoringSettings {
                    profile_base_points: base,
                    penalty_per_second: penalty,
                },
            )
        })
        .collect()
}

fn default_minimum_ram() -> BTreeMap<String, u64> {
    [("minimum", 1024), ("normal", 2048), ("extreme", 4096)]
        .into_iter()
        .map(|(name, mb)| (name.to_string(), mb))
        .collect()
}

#[cfg(test)]
pub(crate) fn env_test_lock() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_yields_stock_profiles() {
        let config = BenchConfig::from_toml("").unwrap();
        assert_eq!(config.profile_names(), vec!["extreme", "minimum", "normal"]);
        assert_eq!(config.settings.global_timeout_seconds, 300);
        assert_eq!(config.settings.emergency.duration_seconds, 10);
        assert_eq!(config.benchmark_point.divisor, 50000.0);
        assert_eq!(config.benchmark_point.target_tps, 20.0);
        assert_eq!(config.benchmark_point.target_mspt, 25.0);
        assert_eq!(config.recommendations.thresholds.high_entity_count, 1000);
    }

    #[test]
    fn parses_camel_case_keys() {
        let raw = r#"
            [settings]
            globalTimeoutSeconds = 90

            [settings.emergency]
            durationSeconds = 4

            [profiles.quick]
            durationSeconds = 2
            intensityMultiplier = 0.25
            loopCountPerTick = 1000

            [scoring.quick]
            profileBasePoints = 700
            penaltyPerSecond = 2.5

            [minimumRamPerProfile]
            quick = 256
        "#;
        let config = BenchConfig::from_toml(raw).unwrap();
        assert_eq!(config.settings.global_timeout_seconds, 90);
        assert_eq!(config.settings.emergency.duration_seconds, 4);
        assert_eq!(config.profile_names(), vec!["quick"]);

        let profile = config.profile("quick").unwrap();
        assert_eq!(profile.duration_seconds, 2);
        assert_eq!(profile.tick_interval, 1);
        assert_eq!(profile.adjusted_loop_count(), 250);

        let scoring = config.scoring_for("quick");
        assert_eq!(scoring.profile_base_points, 700);
        assert_eq!(scoring.penalty_per_second, 2.5);
        assert_eq!(config.minimum_ram_mb("quick"), 256);
        assert_eq!(config.minimum_ram_mb("other"), DEFAULT_MINIMUM_RAM_MB);
    }

    #[test]
    fn unknown_profile_is_config_error() {
        let config = BenchConfig::default();
        let err = config.profile("turbo").unwrap_err();
        match err {
            ConfigError::UnknownProfile { name, available } => {
                assert_eq!(name, "turbo");
                assert!(available.contains(&"normal".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_non_positive_profile_values() {
        let raw = r#"
            [profiles.broken]
            durationSeconds = 0
        "#;
        let err = BenchConfig::from_toml(raw).unwrap_err();
        assert!(err.to_string().contains("profiles.broken.durationSeconds"));

        let raw = r#"
            [profiles.broken]
            intensityMultiplier = -1.0
        "#;
        let err = BenchConfig::from_toml(raw).unwrap_err();
        assert!(err.to_string().contains("intensityMultiplier"));
    }

    #[test]
    fn rejects_zero_divisor() {
        let err = BenchConfig::from_toml("[benchmarkPoint]\ndivisor = 0.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn load_reports_path_on_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[settings\nbroken").unwrap();
        let err = BenchConfig::load(file.path()).unwrap_err();
        match err {
            ConfigError::Parse { path, .. } => assert_eq!(path, file.path()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn load_or_default_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = BenchConfig::load_or_default(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.profiles.len(), 3);
    }

    #[test]
    fn default_path_honors_env() {
        let _guard = env_test_lock();
        // SAFETY: serialized by env_test_lock
        #[allow(unsafe_code)]
        unsafe {
            std::env::set_var("MCB_CONFIG", "/tmp/custom-mcbench.toml");
        }
        assert_eq!(
            BenchConfig::default_path(),
            PathBuf::from("/tmp/custom-mcbench.toml")
        );
        #[allow(unsafe_code)]
        unsafe {
            std::env::remove_var("MCB_CONFIG");
        }
    }
}
