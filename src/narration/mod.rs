//! Narration: story text in, an audio or text artifact on disk out.
//!
//! Tiers are tried in order until one produces an artifact. The text file
//! tier always runs last and only fails on filesystem errors.

pub mod local;
pub mod remote;
pub mod ssml;
pub mod text;

use anyhow::Context;
use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::config::Config;
use crate::story::split_paragraphs;
use local::LocalSpeechTier;
use remote::RemoteSpeechTier;
use text::TextFileTier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Audio,
    Text,
}

impl ArtifactKind {
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::Audio => "wav",
            ArtifactKind::Text => "txt",
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "wav" => Some(ArtifactKind::Audio),
            "txt" => Some(ArtifactKind::Text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub kind: ArtifactKind,
}

impl Artifact {
    pub fn new(path: PathBuf, kind: ArtifactKind) -> Self {
        Self { path, kind }
    }
}

/// The artifact and the name of the tier that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Narration {
    pub artifact: Artifact,
    pub tier: String,
}

#[derive(Debug, thiserror::Error)]
pub enum NarrationError {
    #[error("failed to create output directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Everything a tier needs for one narration.
#[derive(Debug, Clone)]
pub struct NarrationJob<'a> {
    /// Narrative exactly as composed.
    pub original: &'a str,
    /// Cleaned text for speech engines.
    pub speech_text: String,
    pub audio_path: PathBuf,
    pub text_path: PathBuf,
}

#[derive(Debug)]
pub enum TierOutcome {
    Produced(Artifact),
    /// The tier's dependency is missing or unconfigured.
    Unavailable(String),
    /// The tier ran and did not produce audio.
    Failed(String),
}

pub trait NarrationTier: Send + Sync {
    fn name(&self) -> &str;
    fn attempt(&self, job: &NarrationJob<'_>) -> TierOutcome;
}

pub struct Narrator {
    output_dir: PathBuf,
    tiers: Vec<Box<dyn NarrationTier>>,
    terminal: TextFileTier,
}

impl Narrator {
    /// `tiers` run in order before the text file tier.
    pub fn new(output_dir: impl Into<PathBuf>, tiers: Vec<Box<dyn NarrationTier>>) -> Self {
        Self {
            output_dir: output_dir.into(),
            tiers,
            terminal: TextFileTier,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let tiers: Vec<Box<dyn NarrationTier>> = vec![
            Box::new(RemoteSpeechTier::from_config(&config.speech)),
            Box::new(LocalSpeechTier::from_config(&config.local_voice)),
        ];
        Self::new(config.output_dir.clone(), tiers)
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn tier_names(&self) -> Vec<&str> {
        self.tiers
            .iter()
            .map(|tier| tier.name())
            .chain(std::iter::once(self.terminal.name()))
            .collect()
    }

    /// `filename` is a base name; `.wav`/`.txt` is appended per tier and a
    /// timestamped name is generated when it is `None`.
    pub fn narrate(&self, text: &str, filename: Option<&str>) -> Result<Narration, NarrationError> {
        fs::create_dir_all(&self.output_dir).map_err(|source| NarrationError::OutputDir {
            path: self.output_dir.clone(),
            source,
        })?;

        let base = base_name(filename);
        let job = NarrationJob {
            original: text,
            speech_text: prepare_text_for_speech(text),
            audio_path: self.output_dir.join(format!("{base}.{}", ArtifactKind::Audio.extension())),
            text_path: self.output_dir.join(format!("{base}.{}", ArtifactKind::Text.extension())),
        };

        for tier in &self.tiers {
            match tier.attempt(&job) {
                TierOutcome::Produced(artifact) => {
                    tracing::info!(tier = tier.name(), path = %artifact.path.display(), "narration complete");
                    return Ok(Narration {
                        artifact,
                        tier: tier.name().to_string(),
                    });
                }
                TierOutcome::Unavailable(reason) => {
                    tracing::warn!(tier = tier.name(), %reason, "narration tier unavailable; trying next");
                }
                TierOutcome::Failed(error) => {
                    tracing::warn!(tier = tier.name(), %error, "narration tier failed; trying next");
                    discard_partial_audio(&job.audio_path);
                }
            }
        }

        let artifact = self.terminal.write(&job)?;
        tracing::info!(path = %artifact.path.display(), "story saved as text");
        Ok(Narration {
            artifact,
            tier: self.terminal.name().to_string(),
        })
    }
}

/// Strips `.wav`/`.txt` from a caller-supplied name, or generates
/// `story_<unix seconds>`.
pub fn base_name(filename: Option<&str>) -> String {
    let name = filename.map(str::trim).filter(|name| !name.is_empty());
    match name {
        Some(name) => {
            let lowered = name.to_ascii_lowercase();
            [".wav", ".txt"]
                .iter()
                .find(|ext| lowered.ends_with(*ext) && name.len() > ext.len())
                .map(|ext| name[..name.len() - ext.len()].to_string())
                .unwrap_or_else(|| name.to_string())
        }
        None => format!("story_{}", Utc::now().timestamp()),
    }
}

/// Cleans narrative text for speech: blank lines become pauses, lines
/// within a paragraph are joined and each line goes through
/// [`clean_line_for_speech`].
pub fn prepare_text_for_speech(text: &str) -> String {
    let text = text.replace("\r\n", "\n");
    split_paragraphs(&text)
        .map(|paragraph| {
            paragraph
                .lines()
                .map(clean_line_for_speech)
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|paragraph| !paragraph.is_empty())
        .collect::<Vec<_>>()
        .join(" ... ")
}

/// Drops emoji, straightens quotes and collapses whitespace in one line.
pub fn clean_line_for_speech(line: &str) -> String {
    static EMOJI: OnceLock<Regex> = OnceLock::new();
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();

    let emoji = EMOJI.get_or_init(|| {
        Regex::new(concat!(
            "[",
            "\u{1F600}-\u{1F64F}",
            "\u{1F300}-\u{1F5FF}",
            "\u{1F680}-\u{1F6FF}",
            "\u{1F900}-\u{1F9FF}",
            "\u{1F1E0}-\u{1F1FF}",
            "\u{2600}-\u{26FF}",
            "\u{2702}-\u{27B0}",
            "\u{24C2}",
            "\u{1F170}-\u{1F251}",
            "\u{FE0F}",
            "]+"
        ))
        .expect("emoji pattern is valid")
    });
    let whitespace =
        WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

    let line = emoji.replace_all(line, "");
    let line = line
        .replace(['\u{201C}', '\u{201D}', '\u{201E}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    whitespace.replace_all(&line, " ").trim().to_string()
}

/// Removes audio a tier left behind before reporting failure.
fn discard_partial_audio(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "removed unusable audio"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => tracing::debug!(path = %path.display(), error = %err, "could not remove unusable audio"),
    }
}

/// Confirms that `path` holds a readable, non-empty WAV file.
pub fn verify_wav(path: &Path) -> anyhow::Result<()> {
    let reader = hound::WavReader::open(path)
        .with_context(|| format!("read WAV header of {}", path.display()))?;
    let spec = reader.spec();
    let size = fs::metadata(path)
        .with_context(|| format!("stat {}", path.display()))?
        .len();
    if size <= 44 {
        anyhow::bail!("{} contains no audio", path.display());
    }
    tracing::debug!(
        path = %path.display(),
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        bytes = size,
        "verified WAV output"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleans_emoji_quotes_and_breaks() {
        let text = "🎭 The Drum\n\n\u{201C}Hello,\u{201D} said the bear.\nIt\u{2019}s fine.  ✨";
        assert_eq!(
            prepare_text_for_speech(text),
            "The Drum ... \"Hello,\" said the bear. It's fine."
        );
    }

    #[test]
    fn blank_line_with_spaces_is_a_pause() {
        assert_eq!(
            prepare_text_for_speech("The Drum\n  \t\nOnce upon a time.\r\n\r\nThe end."),
            "The Drum ... Once upon a time. ... The end."
        );
    }

    #[test]
    fn emoji_only_paragraph_leaves_no_pause() {
        assert_eq!(prepare_text_for_speech("Good night.\n\n✨\n\nThe end."), "Good night. ... The end.");
    }

    #[test]
    fn keeps_non_latin_letters() {
        assert_eq!(prepare_text_for_speech("Мама: привет"), "Мама: привет");
        assert_eq!(prepare_text_for_speech("小熊"), "小熊");
    }

    #[test]
    fn base_name_strips_known_extensions() {
        assert_eq!(base_name(Some("bedtime.wav")), "bedtime");
        assert_eq!(base_name(Some("bedtime.TXT")), "bedtime");
        assert_eq!(base_name(Some("bedtime")), "bedtime");
        assert!(base_name(None).starts_with("story_"));
        assert!(base_name(Some("  ")).starts_with("story_"));
    }

    #[test]
    fn artifact_kind_follows_extension() {
        assert_eq!(ArtifactKind::from_path(Path::new("a/b.wav")), Some(ArtifactKind::Audio));
        assert_eq!(ArtifactKind::from_path(Path::new("a/b.txt")), Some(ArtifactKind::Text));
        assert_eq!(ArtifactKind::from_path(Path::new("a/b.mp3")), None);
    }
}
