use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::job::{JobConfig, DEFAULT_SEGMENT_NAME};
use crate::monitor::{interval_for_hz, DEFAULT_POLL_HZ};
use crate::pipeline::{PipelineEnv, DEFAULT_AUDIO_QUALITY};
use crate::process::DEFAULT_POLL_INTERVAL;
use crate::scheduler::default_pool_size;
use crate::tools::ToolPaths;

/// Values new jobs start with (`[defaults]` in config.toml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDefaults {
    /// Segment naming pattern; `%03d` gives 000.mp3, 001.mp3, ...
    #[serde(default = "default_segment_name")]
    pub segment_name: String,
}

impl Default for JobDefaults {
    fn default() -> Self {
        Self {
            segment_name: default_segment_name(),
        }
    }
}

fn default_segment_name() -> String {
    DEFAULT_SEGMENT_NAME.to_string()
}

fn default_fetcher() -> PathBuf {
    ToolPaths::default().fetcher
}

fn default_transcoder() -> PathBuf {
    ToolPaths::default().transcoder
}

fn default_poll_hz() -> u32 {
    DEFAULT_POLL_HZ
}

fn default_process_poll_ms() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

fn default_audio_quality() -> u8 {
    DEFAULT_AUDIO_QUALITY
}

/// Global configuration loaded from `~/.config/yt2mp3/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Video fetcher program (name on PATH or explicit path).
    #[serde(default = "default_fetcher")]
    pub fetcher: PathBuf,
    /// Media transcoder program.
    #[serde(default = "default_transcoder")]
    pub transcoder: PathBuf,
    /// Root for per-job temporary directories (None = `$TMPDIR/yt2mp3`).
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
    /// Worker pool size (None = logical CPUs minus one, at least one).
    #[serde(default)]
    pub workers: Option<usize>,
    /// Status monitor cadence in Hz; clamped to 20..=50.
    #[serde(default = "default_poll_hz")]
    pub poll_hz: u32,
    /// Transcoder VBR quality (`-q:a`), 0 best .. 9 worst.
    #[serde(default = "default_audio_quality")]
    pub audio_quality: u8,
    /// Milliseconds between exit checks on a running tool.
    #[serde(default = "default_process_poll_ms")]
    pub process_poll_ms: u64,
    #[serde(default)]
    pub defaults: JobDefaults,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            fetcher: default_fetcher(),
            transcoder: default_transcoder(),
            work_dir: None,
            workers: None,
            poll_hz: DEFAULT_POLL_HZ,
            audio_quality: DEFAULT_AUDIO_QUALITY,
            process_poll_ms: default_process_poll_ms(),
            defaults: JobDefaults::default(),
        }
    }
}

impl AppConfig {
    pub fn tools(&self) -> ToolPaths {
        ToolPaths {
            fetcher: self.fetcher.clone(),
            transcoder: self.transcoder.clone(),
        }
    }

    pub fn work_root(&self) -> PathBuf {
        self.work_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("yt2mp3"))
    }

    pub fn pool_size(&self) -> usize {
        self.workers.unwrap_or_else(default_pool_size).max(1)
    }

    pub fn poll_interval(&self) -> Duration {
        interval_for_hz(self.poll_hz)
    }

    pub fn pipeline_env(&self) -> PipelineEnv {
        let mut env = PipelineEnv::new(self.tools(), self.work_root());
        env.audio_quality = self.audio_quality;
        env.process_poll_interval = Duration::from_millis(self.process_poll_ms);
        env
    }

    /// Configuration a fresh job starts from.
    pub fn job_defaults(&self) -> JobConfig {
        JobConfig {
            segment_name: self.defaults.segment_name.clone(),
            ..JobConfig::default()
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("yt2mp3")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<AppConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = AppConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from(&path)
}

/// Load configuration from an explicit file. Missing keys take defaults.
pub fn load_from(path: &Path) -> Result<AppConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let cfg: AppConfig = toml::from_str(&data)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    Ok(cfg)
}

/// One `[[job]]` entry of a jobs file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Video ids or URLs. Only the first one is converted.
    #[serde(default)]
    pub video: Vec<String>,
    #[serde(default)]
    pub output: Option<PathBuf>,
    /// Segment length in seconds; presence turns segmentation on.
    #[serde(default)]
    pub segment_length: Option<u32>,
    #[serde(default)]
    pub segment_name: Option<String>,
}

impl JobSpec {
    /// Builds a job configuration on top of `defaults`. A missing output is
    /// derived from the video id.
    pub fn into_config(self, defaults: &JobConfig) -> JobConfig {
        let mut videos = self.video.into_iter();
        let video = videos.next().unwrap_or_default();
        let ignored = videos.count();
        if ignored > 0 {
            tracing::warn!(video = %video, ignored, "only the first video of a job is converted");
        }
        let output = match self.output {
            Some(output) => output,
            None if !video.trim().is_empty() => JobConfig::default_output_for(&video),
            None => defaults.output.clone(),
        };
        JobConfig {
            video,
            output,
            segment: self.segment_length.is_some() || defaults.segment,
            segment_length: self.segment_length.or(defaults.segment_length),
            segment_name: self
                .segment_name
                .unwrap_or_else(|| defaults.segment_name.clone()),
        }
    }
}

/// Contents of a batch jobs file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobsFile {
    #[serde(default, rename = "job")]
    pub jobs: Vec<JobSpec>,
}

/// Reads a jobs file; `.json` files are parsed as JSON, anything else as TOML.
pub fn load_jobs_file(path: &Path) -> Result<JobsFile> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read jobs file {}", path.display()))?;
    if path.extension().and_then(|s| s.to_str()) == Some("json") {
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse JSON jobs file {}", path.display()))
    } else {
        toml::from_str(&content)
            .with_context(|| format!("failed to parse TOML jobs file {}", path.display()))
    }
}
