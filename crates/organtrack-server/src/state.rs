use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use config::{Config, ConfigBuilder, Environment, File};
use organtrack_engine::{
    LandmarkDetector, NullDetector, PositionEngine, PositionSettings, ProfileTable, ReplayDetector,
};
use organtrack_protocol::codec::MAX_FRAME_LENGTH;
use serde::Deserialize;

use crate::error::{RelayError, Result};
use crate::relay::arbiter::HostArbiter;
use crate::relay::registry::SessionRegistry;
use crate::relay::worker::FramePool;
use crate::relay::TransformCache;

/// Settings file read when `ORGANTRACK_CONFIG` is unset
pub const DEFAULT_SETTINGS_PATH: &str = "settings/default.settings.yaml";

/// Overlay applied on top of the settings file when `enable_adjustments` is set
pub const ADJUSTMENT_SETTINGS_PATH: &str = "settings/adjustment.settings.yaml";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Pause between two ticks of a connection loop
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Idle time after which a session is evicted
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    /// Concurrent frame computations
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    #[serde(default = "default_max_frame_length")]
    pub max_frame_length: usize,
}

fn default_bind_address() -> String { "0.0.0.0:5000".to_string() }
fn default_tick_interval_ms() -> u64 { 30 }
fn default_session_ttl_secs() -> u64 { 10 }
fn default_worker_threads() -> usize { 4 }
fn default_max_frame_length() -> usize { MAX_FRAME_LENGTH }

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            tick_interval_ms: default_tick_interval_ms(),
            session_ttl_secs: default_session_ttl_secs(),
            worker_threads: default_worker_threads(),
            max_frame_length: default_max_frame_length(),
        }
    }
}

impl ServerSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingSettings {
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetectorSettings {
    /// Recorded landmark frames to replay instead of a live model
    #[serde(default)]
    pub fixture: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub position: PositionSettings,
    /// Per-bucket per-organ overrides merged over the built-in table
    #[serde(default)]
    pub profiles: Option<ProfileTable>,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub detector: DetectorSettings,
    #[serde(default)]
    pub enable_adjustments: bool,
}

fn builder(path: &str, adjustments: bool) -> ConfigBuilder<config::builder::DefaultState> {
    let mut builder = Config::builder().add_source(File::with_name(path).required(false));
    if adjustments {
        builder = builder.add_source(File::with_name(ADJUSTMENT_SETTINGS_PATH).required(false));
    }
    builder.add_source(
        Environment::with_prefix("ORGANTRACK")
            .separator("__")
            .try_parsing(true),
    )
}

impl Settings {
    /// Load settings from the settings file, the optional adjustment overlay
    /// and `ORGANTRACK__SECTION__KEY` environment variables
    pub fn load() -> Result<Self> {
        let path =
            std::env::var("ORGANTRACK_CONFIG").unwrap_or_else(|_| DEFAULT_SETTINGS_PATH.to_string());

        let mut settings: Settings = builder(&path, false).build()?.try_deserialize()?;
        if settings.enable_adjustments {
            tracing::info!(path = ADJUSTMENT_SETTINGS_PATH, "Applying settings adjustments");
            settings = builder(&path, true).build()?.try_deserialize()?;
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.tick_interval_ms == 0 {
            return Err(RelayError::InvalidConfig(
                "server.tick_interval_ms must be positive".to_string(),
            ));
        }
        if self.server.worker_threads == 0 {
            return Err(RelayError::InvalidConfig(
                "server.worker_threads must be positive".to_string(),
            ));
        }
        if self.server.max_frame_length == 0 {
            return Err(RelayError::InvalidConfig(
                "server.max_frame_length must be positive".to_string(),
            ));
        }
        self.position.validate()?;
        if let Some(profiles) = &self.profiles {
            profiles.validate()?;
        }
        Ok(())
    }

    /// Built-in profile table with the configured overrides applied
    pub fn profile_table(&self) -> ProfileTable {
        let mut table = ProfileTable::builtin();
        if let Some(overrides) = &self.profiles {
            table.merge(overrides.clone());
        }
        table
    }

    /// Detector selected by the `detector` section
    pub fn detector(&self) -> Result<Arc<dyn LandmarkDetector>> {
        match &self.detector.fixture {
            Some(path) => Ok(Arc::new(ReplayDetector::from_path(path)?)),
            None => {
                tracing::warn!("No landmark detector configured; Host frames will not be tracked");
                Ok(Arc::new(NullDetector))
            }
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub registry: Arc<SessionRegistry>,
    pub arbiter: Arc<HostArbiter>,
    pub engine: Arc<PositionEngine>,
    pub detector: Arc<dyn LandmarkDetector>,
    pub pool: FramePool,
    pub transforms: Arc<TransformCache>,
}

impl AppState {
    pub fn new(settings: Settings, detector: Arc<dyn LandmarkDetector>) -> Result<Self> {
        settings.validate()?;
        let engine = PositionEngine::new(settings.position.clone(), settings.profile_table())?;
        let pool = FramePool::new(settings.server.worker_threads);

        Ok(Self {
            settings: Arc::new(settings),
            registry: Arc::new(SessionRegistry::new()),
            arbiter: Arc::new(HostArbiter::new()),
            engine: Arc::new(engine),
            detector,
            pool,
            transforms: Arc::new(TransformCache::default()),
        })
    }
}
