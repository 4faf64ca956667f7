use anyhow::{bail, Context};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Values shipped in sample `.env` files that must never be sent to a service.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "your_openai_api_key_here",
    "your_speech_key_here",
    "your_azure_speech_key_here",
];

const REDACTED: &str = "<redacted>";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub text: TextServiceConfig,
    #[serde(default)]
    pub speech: SpeechServiceConfig,
    #[serde(default)]
    pub local_voice: LocalVoiceConfig,
    #[serde(default)]
    pub story: StoryConfig,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextServiceConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_deployment")]
    pub deployment: String,
    #[serde(default = "default_analysis_temperature")]
    pub analysis_temperature: f32,
    #[serde(default = "default_analysis_max_tokens")]
    pub analysis_max_tokens: u32,
    #[serde(default = "default_story_temperature")]
    pub story_temperature: f32,
    #[serde(default = "default_story_max_tokens")]
    pub story_max_tokens: u32,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechServiceConfig {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default = "default_voice")]
    pub voice: String,
    #[serde(default = "default_male_voice")]
    pub male_voice: String,
    #[serde(default = "default_voice")]
    pub female_voice: String,
    /// Send two-voice markup for `Man:`/`Woman:` narratives.
    #[serde(default)]
    pub dialogue_markup: bool,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalVoiceConfig {
    #[serde(default = "default_local_program")]
    pub program: String,
    /// Words per minute.
    #[serde(default = "default_local_rate")]
    pub rate: u32,
    #[serde(default = "default_local_volume")]
    pub volume: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoryConfig {
    /// Ask the text service for alternating `Man:`/`Woman:` lines.
    #[serde(default)]
    pub dialogue: bool,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_file()?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_file() -> anyhow::Result<Self> {
        let project = Self::project_path();
        if project.exists() {
            return Self::load_from_path(&project);
        }

        if let Ok(path) = Self::default_path() {
            if path.exists() {
                return Self::load_from_path(&path);
            }
        }

        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config at {}", path.display()))?;
        let config: Config = serde_json::from_str(&raw)
            .with_context(|| format!("parse config at {}", path.display()))?;
        Ok(config)
    }

    pub fn init_default() -> anyhow::Result<PathBuf> {
        let path = Self::default_path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let config = Self::default();
        fs::write(&path, serde_json::to_string_pretty(&config)?)?;
        Ok(path)
    }

    pub fn default_path() -> anyhow::Result<PathBuf> {
        let base = BaseDirs::new().context("unable to resolve home directory")?;
        Ok(base.config_dir().join("storyteller").join("config.json"))
    }

    fn project_path() -> PathBuf {
        PathBuf::from("storyteller.json")
    }

    /// Overlays process environment values. `lookup` returns `None` for
    /// unset keys.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = get("AZURE_OPENAI_ENDPOINT") {
            self.text.endpoint = Some(value);
        }
        if let Some(value) = get("AZURE_OPENAI_API_KEY") {
            self.text.api_key = Some(value);
        }
        if let Some(value) = get("AZURE_OPENAI_API_VERSION") {
            self.text.api_version = value;
        }
        if let Some(value) = get("AZURE_OPENAI_DEPLOYMENT_NAME") {
            self.text.deployment = value;
        }
        if let Some(value) = get("AZURE_SPEECH_KEY") {
            self.speech.key = Some(value);
        }
        if let Some(value) = get("AZURE_SPEECH_REGION") {
            self.speech.region = Some(value);
        }
        if let Some(value) = get("AZURE_VOICE_NAME") {
            self.speech.voice = value;
        }
        if let Some(value) = get("STORYTELLER_LOCAL_TTS") {
            self.local_voice.program = value;
        }
        if let Some(value) = get("OUTPUT_DIR") {
            self.output_dir = PathBuf::from(value);
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, temperature) in [
            ("text.analysis_temperature", self.text.analysis_temperature),
            ("text.story_temperature", self.text.story_temperature),
        ] {
            if !(0.0..=2.0).contains(&temperature) {
                bail!("{name} must be between 0.0 and 2.0");
            }
        }

        if self.text.analysis_max_tokens == 0 || self.text.story_max_tokens == 0 {
            bail!("token limits must be greater than 0");
        }

        if !(0.0..=1.0).contains(&self.local_voice.volume) {
            bail!("local_voice.volume must be between 0.0 and 1.0");
        }

        if self.local_voice.rate == 0 {
            bail!("local_voice.rate must be greater than 0");
        }

        if self.local_voice.program.trim().is_empty() {
            bail!("local_voice.program must not be empty");
        }

        Ok(())
    }

    /// Copy that is safe to print.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.text.api_key.is_some() {
            config.text.api_key = Some(REDACTED.to_string());
        }
        if config.speech.key.is_some() {
            config.speech.key = Some(REDACTED.to_string());
        }
        config
    }
}

impl TextServiceConfig {
    /// API key, unless missing or a known placeholder.
    pub fn api_key(&self) -> Option<&str> {
        usable_secret(self.api_key.as_deref())
    }
}

impl SpeechServiceConfig {
    pub fn key(&self) -> Option<&str> {
        usable_secret(self.key.as_deref())
    }

    pub fn region(&self) -> Option<&str> {
        self.region
            .as_deref()
            .map(str::trim)
            .filter(|region| !region.is_empty())
    }
}

pub fn is_placeholder(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || PLACEHOLDER_SECRETS.contains(&value)
}

fn usable_secret(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !is_placeholder(value))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            text: TextServiceConfig::default(),
            speech: SpeechServiceConfig::default(),
            local_voice: LocalVoiceConfig::default(),
            story: StoryConfig::default(),
            output_dir: default_output_dir(),
        }
    }
}

impl Default for TextServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            api_version: default_api_version(),
            deployment: default_deployment(),
            analysis_temperature: default_analysis_temperature(),
            analysis_max_tokens: default_analysis_max_tokens(),
            story_temperature: default_story_temperature(),
            story_max_tokens: default_story_max_tokens(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Default for SpeechServiceConfig {
    fn default() -> Self {
        Self {
            key: None,
            region: None,
            voice: default_voice(),
            male_voice: default_male_voice(),
            female_voice: default_voice(),
            dialogue_markup: false,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Default for LocalVoiceConfig {
    fn default() -> Self {
        Self {
            program: default_local_program(),
            rate: default_local_rate(),
            volume: default_local_volume(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./output")
}

fn default_api_version() -> String {
    "2024-02-15-preview".to_string()
}

fn default_deployment() -> String {
    "gpt-4".to_string()
}

fn default_analysis_temperature() -> f32 {
    0.3
}

fn default_analysis_max_tokens() -> u32 {
    500
}

fn default_story_temperature() -> f32 {
    0.7
}

fn default_story_max_tokens() -> u32 {
    1000
}

fn default_timeout_seconds() -> u64 {
    60
}

fn default_voice() -> String {
    "en-US-AriaNeural".to_string()
}

fn default_male_voice() -> String {
    "en-US-GuyNeural".to_string()
}

fn default_local_program() -> String {
    "espeak-ng".to_string()
}

fn default_local_rate() -> u32 {
    130
}

fn default_local_volume() -> f32 {
    0.9
}
