use anyhow::{bail, Context};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use super::{verify_wav, Artifact, ArtifactKind, NarrationJob, NarrationTier, TierOutcome};
use crate::config::LocalVoiceConfig;
use crate::service::ServiceStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalVoice {
    pub id: String,
    pub name: String,
    pub gender: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSettings {
    pub voice: Option<String>,
    /// Words per minute.
    pub rate: u32,
    /// 0.0 to 1.0.
    pub volume: f32,
}

/// Speech engine installed on this machine.
pub trait LocalSpeechEngine: Send + Sync {
    fn name(&self) -> &str;
    fn voices(&self) -> anyhow::Result<Vec<LocalVoice>>;
    fn render_to_file(&self, text: &str, settings: &VoiceSettings, output: &Path) -> anyhow::Result<()>;
}

impl<T: LocalSpeechEngine + ?Sized> LocalSpeechEngine for std::sync::Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn voices(&self) -> anyhow::Result<Vec<LocalVoice>> {
        (**self).voices()
    }

    fn render_to_file(&self, text: &str, settings: &VoiceSettings, output: &Path) -> anyhow::Result<()> {
        (**self).render_to_file(text, settings, output)
    }
}

/// Heuristic: a voice whose name says female (or is Zira), else one whose
/// gender column is `F`.
pub fn pick_female_voice(voices: &[LocalVoice]) -> Option<&LocalVoice> {
    voices
        .iter()
        .find(|voice| {
            let name = voice.name.to_lowercase();
            let id = voice.id.to_lowercase();
            ["female", "zira"]
                .iter()
                .any(|hint| name.contains(hint) || id.contains(hint))
        })
        .or_else(|| {
            voices.iter().find(|voice| {
                voice
                    .gender
                    .as_deref()
                    .is_some_and(|gender| gender.eq_ignore_ascii_case("f"))
            })
        })
}

/// An espeak-compatible command line engine (`espeak-ng`, `espeak`).
pub struct CommandEngine {
    program: String,
}

impl CommandEngine {
    /// Available only if `program --version` can be spawned.
    pub fn probe(program: &str) -> ServiceStatus<Self> {
        let status = Command::new(program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(_) => ServiceStatus::Available(Self {
                program: program.to_string(),
            }),
            Err(err) => ServiceStatus::unconfigured(format!("{program} not usable: {err}")),
        }
    }
}

impl LocalSpeechEngine for CommandEngine {
    fn name(&self) -> &str {
        &self.program
    }

    fn voices(&self) -> anyhow::Result<Vec<LocalVoice>> {
        let output = Command::new(&self.program)
            .arg("--voices")
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .with_context(|| format!("list voices with {}", self.program))?;

        if !output.status.success() {
            bail!("{} --voices exited with status {}", self.program, output.status);
        }

        Ok(parse_voice_list(&String::from_utf8_lossy(&output.stdout)))
    }

    fn render_to_file(&self, text: &str, settings: &VoiceSettings, output: &Path) -> anyhow::Result<()> {
        let amplitude = (settings.volume.clamp(0.0, 1.0) * 100.0).round() as u32;

        let mut cmd = Command::new(&self.program);
        cmd.arg("-w")
            .arg(output)
            .arg("-s")
            .arg(settings.rate.to_string())
            .arg("-a")
            .arg(amplitude.to_string());
        if let Some(voice) = &settings.voice {
            cmd.arg("-v").arg(voice);
        }
        cmd.arg("--stdin")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawn {}", self.program))?;
        {
            let stdin = child.stdin.as_mut().context("open engine stdin")?;
            stdin
                .write_all(text.as_bytes())
                .context("write text to engine")?;
        }

        let status = child.wait().context("wait for speech engine")?;
        if !status.success() {
            bail!("{} exited with status {status}", self.program);
        }
        Ok(())
    }
}

/// Parses `espeak-ng --voices`:
/// `Pty Language Age/Gender VoiceName File Other Languages`.
pub fn parse_voice_list(listing: &str) -> Vec<LocalVoice> {
    listing
        .lines()
        .skip_while(|line| line.trim_start().starts_with("Pty"))
        .filter_map(|line| {
            let columns: Vec<&str> = line.split_whitespace().collect();
            if columns.len() < 4 {
                return None;
            }
            let gender = columns[2]
                .split('/')
                .nth(1)
                .filter(|gender| !gender.is_empty() && *gender != "-")
                .map(str::to_string);
            Some(LocalVoice {
                id: columns[1].to_string(),
                name: columns[3].to_string(),
                gender,
            })
        })
        .collect()
}

/// Secondary tier: on-device speech.
pub struct LocalSpeechTier {
    engine: ServiceStatus<Box<dyn LocalSpeechEngine>>,
    rate: u32,
    volume: f32,
}

impl LocalSpeechTier {
    pub fn new(engine: ServiceStatus<Box<dyn LocalSpeechEngine>>, config: &LocalVoiceConfig) -> Self {
        Self {
            engine,
            rate: config.rate,
            volume: config.volume,
        }
    }

    pub fn from_config(config: &LocalVoiceConfig) -> Self {
        let engine = CommandEngine::probe(&config.program)
            .map(|engine| Box::new(engine) as Box<dyn LocalSpeechEngine>);
        Self::new(engine, config)
    }

    fn settings(&self, engine: &dyn LocalSpeechEngine) -> VoiceSettings {
        let voice = match engine.voices() {
            Ok(voices) => pick_female_voice(&voices).map(|voice| voice.id.clone()),
            Err(err) => {
                tracing::debug!(error = ?err, "could not list local voices");
                None
            }
        };
        VoiceSettings {
            voice,
            rate: self.rate,
            volume: self.volume,
        }
    }
}

impl NarrationTier for LocalSpeechTier {
    fn name(&self) -> &str {
        "local-speech"
    }

    fn attempt(&self, job: &NarrationJob<'_>) -> TierOutcome {
        let engine = match &self.engine {
            ServiceStatus::Available(engine) => &**engine,
            ServiceStatus::Unconfigured { reason } => {
                return TierOutcome::Unavailable(reason.clone())
            }
        };

        let settings = self.settings(engine);
        tracing::info!(engine = engine.name(), voice = ?settings.voice, "generating audio locally");

        let rendered = engine
            .render_to_file(&job.speech_text, &settings, &job.audio_path)
            .and_then(|()| verify_wav(&job.audio_path));
        match rendered {
            Ok(()) => TierOutcome::Produced(Artifact::new(job.audio_path.clone(), ArtifactKind::Audio)),
            Err(err) => TierOutcome::Failed(format!("{err:#}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "Pty Language       Age/Gender VoiceName          File                 Other Languages
 5  af              --/M      Afrikaans          gmw/af
 5  en-gb           --/M      English_(Great_Britain) gmw/en
 5  en-us           --/F      English_(America)  gmw/en-US
";

    #[test]
    fn parses_espeak_listing() {
        let voices = parse_voice_list(LISTING);
        assert_eq!(voices.len(), 3);
        assert_eq!(voices[0].id, "af");
        assert_eq!(voices[0].gender.as_deref(), Some("M"));
    }

    #[test]
    fn prefers_named_female_voice() {
        let mut voices = parse_voice_list(LISTING);
        voices.push(LocalVoice {
            id: "zira".to_string(),
            name: "Microsoft Zira".to_string(),
            gender: None,
        });
        assert_eq!(pick_female_voice(&voices).map(|v| v.id.as_str()), Some("zira"));
    }

    #[test]
    fn falls_back_to_gender_column() {
        let voices = parse_voice_list(LISTING);
        assert_eq!(pick_female_voice(&voices).map(|v| v.id.as_str()), Some("en-us"));
    }

    #[test]
    fn missing_program_is_unconfigured() {
        let status = CommandEngine::probe("/nonexistent/storyteller-tts");
        assert!(!status.is_available());
    }
}
