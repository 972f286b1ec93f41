use anyhow::{anyhow, bail, Context, Result};
use directories::{ProjectDirs, UserDirs};
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

const CONFIG_FILE_NAME: &str = "config.toml";
const ENV_CONFIG_PATH: &str = "MOODTONE_CONFIG_PATH";
const ENV_API_URL: &str = "MOODTONE_API_URL";
const ENV_DOWNLOAD_DIR: &str = "MOODTONE_DOWNLOAD_DIR";
const ENV_SAMPLE_RATE: &str = "MOODTONE_SAMPLE_RATE";
const ENV_AUDIO_OUTPUT: &str = "MOODTONE_AUDIO_OUTPUT";

const DEFAULT_SAMPLE_RATE: u32 = 44_100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioOutputKind {
    /// The default sound device.
    Device,
    /// No sound device; melodies can still be rendered to files.
    None,
}

impl FromStr for AudioOutputKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "device" => Ok(Self::Device),
            "none" => Ok(Self::None),
            other => bail!("unknown audio output `{other}` (expected `device` or `none`)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    api_url: Option<String>,
    download_dir: PathBuf,
    sample_rate: u32,
    audio_output: AudioOutputKind,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        let path = match config_file_override() {
            Some(path) => path,
            None => Self::default_config_path()?,
        };
        if path.exists() {
            let partial = read_partial(&path)?;
            config.apply_partial(partial);
        }

        config.apply_env(|key| env::var(key).ok())?;
        Ok(config)
    }

    pub fn api_url(&self) -> Option<&str> {
        self.api_url.as_deref()
    }

    pub fn download_dir(&self) -> &PathBuf {
        &self.download_dir
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn audio_output(&self) -> AudioOutputKind {
        self.audio_output
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("com", "Moodtone", "Moodtone")
            .ok_or_else(|| anyhow!("unable to determine config directory"))?;
        Ok(dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    fn apply_partial(&mut self, partial: PartialConfig) {
        if let Some(url) = partial.api_url {
            self.api_url = Some(url);
        }
        if let Some(dir) = partial.download_dir {
            self.download_dir = dir;
        }
        if let Some(rate) = partial.sample_rate {
            self.sample_rate = rate;
        }
        if let Some(output) = partial.audio_output {
            self.audio_output = output;
        }
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(value) = lookup(ENV_API_URL) {
            if value.trim().is_empty() {
                self.api_url = None;
            } else {
                self.api_url = Some(value);
            }
        }
        if let Some(value) = lookup(ENV_DOWNLOAD_DIR) {
            if !value.trim().is_empty() {
                self.download_dir = PathBuf::from(value);
            }
        }
        if let Some(value) = lookup(ENV_SAMPLE_RATE) {
            if !value.trim().is_empty() {
                let rate = value
                    .trim()
                    .parse::<u32>()
                    .ok()
                    .filter(|rate| *rate > 0)
                    .with_context(|| format!("{ENV_SAMPLE_RATE} must be a positive integer"))?;
                self.sample_rate = rate;
            }
        }
        if let Some(value) = lookup(ENV_AUDIO_OUTPUT) {
            if !value.trim().is_empty() {
                self.audio_output = value.parse().with_context(|| format!("invalid {ENV_AUDIO_OUTPUT}"))?;
            }
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            download_dir: default_download_dir(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            audio_output: AudioOutputKind::Device,
        }
    }
}

fn config_file_override() -> Option<PathBuf> {
    let value = env::var_os(ENV_CONFIG_PATH)?;
    if value.is_empty() {
        return None;
    }
    let path = PathBuf::from(value);
    if path.is_dir() {
        return Some(path.join(CONFIG_FILE_NAME));
    }
    Some(path)
}

fn read_partial(path: &Path) -> Result<PartialConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let partial: PartialConfig =
        toml::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(partial)
}

fn default_download_dir() -> PathBuf {
    UserDirs::new()
        .and_then(|dirs| dirs.download_dir().map(Path::to_path_buf))
        .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("./downloads"))
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct PartialConfig {
    api_url: Option<String>,
    download_dir: Option<PathBuf>,
    sample_rate: Option<u32>,
    audio_output: Option<AudioOutputKind>,
}
