use anyhow::{Context, Result};
use dusklight_gradient_lib::{ParamsError, PhaseBoundary, RawRenderParams, RenderParams, RGB8};
use log::{debug, info, warn, LevelFilter};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configurable log level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
}

impl LogLevel {
    #[must_use]
    pub const fn as_level_filter(self) -> LevelFilter {
        match self {
            Self::Off => LevelFilter::Off,
            Self::Error => LevelFilter::Error,
            Self::Warn => LevelFilter::Warn,
            Self::Info => LevelFilter::Info,
            Self::Debug => LevelFilter::Debug,
        }
    }

    /// Same level for the host log sink
    #[must_use]
    pub const fn as_tracing_filter(self) -> tracing_subscriber::filter::LevelFilter {
        use tracing_subscriber::filter::LevelFilter as Tracing;
        match self {
            Self::Off => Tracing::OFF,
            Self::Error => Tracing::ERROR,
            Self::Warn => Tracing::WARN,
            Self::Info => Tracing::INFO,
            Self::Debug => Tracing::DEBUG,
        }
    }

    /// Narrow the `log` facade to this level once the sink is installed
    pub fn apply(self) {
        log::set_max_level(self.as_level_filter());
        info!("Log level: {self:?}");
    }
}

/// Fallback values for one phase, used when a stored record is absent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamDefaults {
    #[serde(default)]
    pub status: bool,
    pub brightness: u8,
    #[serde(default)]
    pub amplifier: i8,
    #[serde(default = "default_tau")]
    pub tau: f32,
    pub color_bottom: RGB8,
    pub color_top: RGB8,
    #[serde(default)]
    pub white_target: u8,
}

const fn default_tau() -> f32 {
    5.125
}

impl ParamDefaults {
    #[must_use]
    pub const fn day() -> Self {
        Self {
            status: false,
            brightness: 70,
            amplifier: 0,
            tau: default_tau(),
            color_bottom: RGB8::new(194, 255, 0),
            color_top: RGB8::new(0, 193, 255),
            white_target: 0,
        }
    }

    #[must_use]
    pub const fn night() -> Self {
        Self {
            status: false,
            brightness: 30,
            amplifier: 0,
            tau: default_tau(),
            color_bottom: RGB8::new(118, 0, 255),
            color_top: RGB8::new(255, 0, 119),
            white_target: 0,
        }
    }

    pub fn to_params(&self, pixel_count: usize) -> Result<RenderParams, ParamsError> {
        RenderParams::new(RawRenderParams {
            pixel_count,
            status: self.status,
            brightness: self.brightness,
            amplifier: self.amplifier,
            tau: self.tau,
            color_bottom: self.color_bottom,
            color_top: self.color_top,
            white_target: self.white_target,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseDefaults {
    #[serde(default = "ParamDefaults::day")]
    pub day: ParamDefaults,
    #[serde(default = "ParamDefaults::night")]
    pub night: ParamDefaults,
}

impl Default for PhaseDefaults {
    fn default() -> Self {
        Self {
            day: ParamDefaults::day(),
            night: ParamDefaults::night(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub log_level: LogLevel,
    /// Number of pixels on the strip (at least 2)
    #[serde(default = "default_pixel_count")]
    pub pixel_count: usize,
    /// Address the message broker listens on
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// JSON file holding the persisted parameter records
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    /// Control loop period (ms)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Start of the day phase, used until a stored boundary exists
    #[serde(default = "default_day_start")]
    pub day_start: PhaseBoundary,
    /// Start of the night phase, used until a stored boundary exists
    #[serde(default = "default_night_start")]
    pub night_start: PhaseBoundary,
    #[serde(default)]
    pub defaults: PhaseDefaults,
}

const fn default_pixel_count() -> usize {
    41
}

fn default_listen_addr() -> String {
    "0.0.0.0:1883".to_string()
}

fn default_state_file() -> PathBuf {
    PathBuf::from("dusklight-state.json")
}

const fn default_poll_interval_ms() -> u64 {
    100
}

/// Poll interval bounds; slower than this and phase changes lag noticeably
const MIN_POLL_INTERVAL_MS: u64 = 10;
const MAX_POLL_INTERVAL_MS: u64 = 10_000;

const DAY_START: PhaseBoundary = match PhaseBoundary::new(13, 30) {
    Ok(boundary) => boundary,
    Err(_) => panic!("invalid built-in day start"),
};

const NIGHT_START: PhaseBoundary = match PhaseBoundary::new(23, 30) {
    Ok(boundary) => boundary,
    Err(_) => panic!("invalid built-in night start"),
};

const fn default_day_start() -> PhaseBoundary {
    DAY_START
}

const fn default_night_start() -> PhaseBoundary {
    NIGHT_START
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            pixel_count: default_pixel_count(),
            listen_addr: default_listen_addr(),
            state_file: default_state_file(),
            poll_interval_ms: default_poll_interval_ms(),
            day_start: default_day_start(),
            night_start: default_night_start(),
            defaults: PhaseDefaults::default(),
        }
    }
}

impl Config {
    /// Clamp values to valid ranges and fix invalid values
    pub fn validate(&mut self) {
        if self.pixel_count < 2 {
            warn!(
                "pixel_count {} is too small, resetting to {}",
                self.pixel_count,
                default_pixel_count()
            );
            self.pixel_count = default_pixel_count();
        }
        let clamped = self
            .poll_interval_ms
            .clamp(MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS);
        if clamped != self.poll_interval_ms {
            warn!(
                "Clamping poll_interval_ms from {} to {clamped}",
                self.poll_interval_ms
            );
            self.poll_interval_ms = clamped;
        }
        if self.listen_addr.is_empty() {
            warn!("listen_addr is empty, resetting to default");
            self.listen_addr = default_listen_addr();
        }
        if let Err(e) = self.defaults.day.to_params(self.pixel_count) {
            warn!("Day defaults are invalid ({e}), resetting to built-in values");
            self.defaults.day = ParamDefaults::day();
        }
        if let Err(e) = self.defaults.night.to_params(self.pixel_count) {
            warn!("Night defaults are invalid ({e}), resetting to built-in values");
            self.defaults.night = ParamDefaults::night();
        }
    }

    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(mut config) => {
                info!("Loaded config from {}", path.display());
                config.validate();
                config
            }
            Err(e) => {
                warn!("Failed to load config: {e:#}, using defaults");
                Self::default()
            }
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading config from {}", path.display());
        let buf = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let config: Self = serde_json::from_slice(&buf)
            .with_context(|| format!("parsing {}", path.display()))?;
        debug!(
            "Config parsed: pixel_count={}, listen_addr={:?}, log_level={:?}",
            config.pixel_count, config.listen_addr, config.log_level
        );
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        debug!("Saving config to {}", path.display());
        let json = serde_json::to_vec_pretty(self)?;
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        info!("Config saved to {}", path.display());
        Ok(())
    }

    /// Validated per-phase defaults, `(day, night)`
    pub fn default_params(&self) -> Result<(RenderParams, RenderParams), ParamsError> {
        Ok((
            self.defaults.day.to_params(self.pixel_count)?,
            self.defaults.night.to_params(self.pixel_count)?,
        ))
    }
}
