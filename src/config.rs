use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::sim::{entity::TrackingParams, garden::GardenParams};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Two hand-driven puppets; the browser draws them from entity records.
    #[default]
    Puppets,
    /// Fire and water particles tending a row of plants.
    Garden,
}

impl Mode {
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Puppets => "puppets",
            Mode::Garden => "garden",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mode: Mode,
    pub frame_width: u32,
    pub frame_height: u32,
    pub tick_interval_ms: u64,

    pub smoothing: f32,
    pub inactivity_timeout_ms: u64,
    pub angry_jitter: f32,
    /// Puppets float this far (normalized) above the wrist.
    pub puppet_y_offset: f32,
    pub puppet_start_x: [f32; 2],

    pub slot_size: u32,
    pub ground_band: f32,
    pub max_height_range: (u32, u32),
    /// Fire speed in pixels per tick along the wrist to middle fingertip line.
    pub fire_speed: f32,

    pub catalog_path: PathBuf,
    pub catalog_limit: usize,
    pub fetch_timeout_secs: u64,

    pub listen_addr: String,
    /// JPEG quality; `None` picks the per-mode default.
    pub jpeg_quality: Option<u8>,
    pub queue_capacity: usize,
    pub replay_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            frame_width: 1280,
            frame_height: 720,
            tick_interval_ms: 15,
            smoothing: 0.2,
            inactivity_timeout_ms: 500,
            angry_jitter: 0.01,
            puppet_y_offset: 0.2,
            puppet_start_x: [0.75, 0.25],
            slot_size: 60,
            ground_band: 15.0,
            max_height_range: (200, 500),
            fire_speed: 30.0,
            catalog_path: PathBuf::from("JSON").join("plants.json"),
            catalog_limit: 50,
            fetch_timeout_secs: 3,
            listen_addr: "127.0.0.1:5050".to_string(),
            jpeg_quality: None,
            queue_capacity: 4,
            replay_path: None,
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Config = serde_json::from_str(&text)
            .with_context(|| format!("invalid config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parses `[puppets|garden] [--config FILE] [--replay FILE] [--listen ADDR]`.
    /// Flags after `--config` override values from the file.
    pub fn from_args<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = Config::default();
        let mut mode = None;
        let mut replay = None;
        let mut listen = None;

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "puppets" => mode = Some(Mode::Puppets),
                "garden" => mode = Some(Mode::Garden),
                "--config" => {
                    let path = args.next().context("--config needs a file path")?;
                    config = Config::from_file(Path::new(&path))?;
                }
                "--replay" => {
                    let path = args.next().context("--replay needs a file path")?;
                    replay = Some(PathBuf::from(path));
                }
                "--listen" => {
                    listen = Some(args.next().context("--listen needs an address")?);
                }
                other => bail!("unrecognized argument `{other}`"),
            }
        }

        if let Some(mode) = mode {
            config.mode = mode;
        }
        if replay.is_some() {
            config.replay_path = replay;
        }
        if let Some(listen) = listen {
            config.listen_addr = listen;
        }
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.frame_width == 0 || self.frame_height == 0 {
            bail!("frame size must be non-zero");
        }
        if self.slot_size == 0 {
            bail!("slot_size must be non-zero");
        }
        if !(0.0..=1.0).contains(&self.smoothing) {
            bail!("smoothing must lie in [0, 1], got {}", self.smoothing);
        }
        if self.max_height_range.0 >= self.max_height_range.1 {
            bail!("max_height_range must be a non-empty [min, max) range");
        }
        if self.queue_capacity == 0 {
            bail!("queue_capacity must be at least 1");
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
            .unwrap_or(match self.mode {
                Mode::Puppets => 50,
                Mode::Garden => 60,
            })
            .clamp(1, 100)
    }

    pub fn tracking(&self) -> TrackingParams {
        TrackingParams {
            smoothing: self.smoothing,
            angry_jitter: self.angry_jitter,
            inactivity_timeout: Duration::from_millis(self.inactivity_timeout_ms),
        }
    }

    pub fn garden(&self) -> GardenParams {
        GardenParams {
            width: self.frame_width,
            height: self.frame_height,
            slot_size: self.slot_size,
            ground_band: self.ground_band,
            max_height_range: self.max_height_range,
        }
    }
}
