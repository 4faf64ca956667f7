use std::io::Write;
use std::path::Path;
use std::time::Duration;

use super::ssml::{self, DialogueVoices};
use super::{verify_wav, Artifact, ArtifactKind, NarrationJob, NarrationTier, TierOutcome};
use crate::config::SpeechServiceConfig;
use crate::service::ServiceStatus;

/// Child-friendly neural voices offered by the remote service.
pub const RECOMMENDED_VOICES: [(&str, &str); 4] = [
    ("en-US-AriaNeural", "warm, friendly female voice"),
    ("en-US-JennyNeural", "clear female voice"),
    ("en-US-GuyNeural", "warm male voice"),
    ("en-US-DavisNeural", "friendly male voice"),
];

const OUTPUT_FORMAT: &str = "riff-24khz-16bit-mono-pcm";

pub const TIER_NAME: &str = "remote-speech";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechInput {
    Text(String),
    Ssml(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    pub voice: String,
    pub input: SpeechInput,
}

/// Structured answer of a synthesis call that reached the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultReason {
    Completed,
    Canceled { details: String },
}

#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("synthesis timed out after {0} seconds")]
    Timeout(u64),

    #[error("failed to write audio: {0}")]
    Io(#[from] std::io::Error),
}

pub trait SpeechService: Send + Sync {
    fn name(&self) -> &str;
    /// Writes audio to `output` when the result is `Completed`.
    fn synthesize(
        &self,
        request: &SynthesisRequest,
        output: &Path,
    ) -> Result<ResultReason, SpeechError>;
}

impl<T: SpeechService + ?Sized> SpeechService for std::sync::Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn synthesize(
        &self,
        request: &SynthesisRequest,
        output: &Path,
    ) -> Result<ResultReason, SpeechError> {
        (**self).synthesize(request, output)
    }
}

/// Azure Speech text-to-speech REST endpoint.
pub struct AzureSpeechClient {
    url: String,
    key: String,
    timeout_secs: u64,
    client: reqwest::blocking::Client,
}

impl AzureSpeechClient {
    pub fn new(key: &str, region: &str, timeout_secs: u64) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| anyhow::anyhow!("failed to create HTTP client: {e}"))?;

        Ok(Self {
            url: synthesis_url(region),
            key: key.to_string(),
            timeout_secs,
            client,
        })
    }

    pub fn from_config(config: &SpeechServiceConfig) -> ServiceStatus<Self> {
        let (Some(key), Some(region)) = (config.key(), config.region()) else {
            return ServiceStatus::unconfigured(
                "AZURE_SPEECH_KEY and AZURE_SPEECH_REGION must both be set",
            );
        };

        match Self::new(key, region, config.timeout_seconds) {
            Ok(client) => ServiceStatus::Available(client),
            Err(err) => ServiceStatus::unconfigured(format!("{err:#}")),
        }
    }
}

impl SpeechService for AzureSpeechClient {
    fn name(&self) -> &str {
        "azure-speech"
    }

    fn synthesize(
        &self,
        request: &SynthesisRequest,
        output: &Path,
    ) -> Result<ResultReason, SpeechError> {
        let body = match &request.input {
            SpeechInput::Text(text) => ssml::single_voice_ssml(&request.voice, text),
            SpeechInput::Ssml(markup) => markup.clone(),
        };

        let response = self
            .client
            .post(&self.url)
            .header("Ocp-Apim-Subscription-Key", &self.key)
            .header("Content-Type", "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", OUTPUT_FORMAT)
            .header("User-Agent", "storyteller")
            .body(body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    SpeechError::Timeout(self.timeout_secs)
                } else {
                    SpeechError::Http(format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let details = response.text().unwrap_or_default();
            return Ok(ResultReason::Canceled {
                details: format!("HTTP {status}: {}", details.trim()),
            });
        }

        let audio = response
            .bytes()
            .map_err(|e| SpeechError::Http(format!("failed to read audio: {e}")))?;
        if audio.is_empty() {
            return Ok(ResultReason::Canceled {
                details: "service returned no audio".to_string(),
            });
        }

        write_atomically(output, &audio)?;
        Ok(ResultReason::Completed)
    }
}

pub fn synthesis_url(region: &str) -> String {
    format!(
        "https://{}.tts.speech.microsoft.com/cognitiveservices/v1",
        region.trim()
    )
}

/// Writes through a temp file next to `path` so a failed download never
/// leaves a truncated file behind.
fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Primary tier: the remote speech service.
pub struct RemoteSpeechTier {
    service: ServiceStatus<Box<dyn SpeechService>>,
    voice: String,
    dialogue_voices: Option<DialogueVoices>,
}

impl RemoteSpeechTier {
    pub fn new(service: ServiceStatus<Box<dyn SpeechService>>, voice: impl Into<String>) -> Self {
        Self {
            service,
            voice: voice.into(),
            dialogue_voices: None,
        }
    }

    /// Send two-voice markup for narratives with speaker tags.
    pub fn with_dialogue_voices(mut self, voices: DialogueVoices) -> Self {
        self.dialogue_voices = Some(voices);
        self
    }

    pub fn from_config(config: &SpeechServiceConfig) -> Self {
        let service = AzureSpeechClient::from_config(config)
            .map(|client| Box::new(client) as Box<dyn SpeechService>);
        let tier = Self::new(service, config.voice.clone());
        if config.dialogue_markup {
            tier.with_dialogue_voices(DialogueVoices {
                male: config.male_voice.clone(),
                female: config.female_voice.clone(),
                narrator: config.voice.clone(),
            })
        } else {
            tier
        }
    }

    fn request_for(&self, job: &NarrationJob<'_>) -> SynthesisRequest {
        let input = match &self.dialogue_voices {
            Some(voices) if ssml::has_speaker_tags(job.original) => {
                SpeechInput::Ssml(ssml::build_dialogue_ssml(job.original, voices))
            }
            _ => SpeechInput::Text(job.speech_text.clone()),
        };
        SynthesisRequest {
            voice: self.voice.clone(),
            input,
        }
    }
}

impl NarrationTier for RemoteSpeechTier {
    fn name(&self) -> &str {
        TIER_NAME
    }

    fn attempt(&self, job: &NarrationJob<'_>) -> TierOutcome {
        let service = match &self.service {
            ServiceStatus::Available(service) => service,
            ServiceStatus::Unconfigured { reason } => {
                return TierOutcome::Unavailable(reason.clone())
            }
        };

        tracing::info!(service = service.name(), voice = %self.voice, "synthesizing speech");
        let request = self.request_for(job);
        match service.synthesize(&request, &job.audio_path) {
            Ok(ResultReason::Completed) => match verify_wav(&job.audio_path) {
                Ok(()) => TierOutcome::Produced(Artifact::new(
                    job.audio_path.clone(),
                    ArtifactKind::Audio,
                )),
                Err(err) => TierOutcome::Failed(format!("{err:#}")),
            },
            Ok(ResultReason::Canceled { details }) => {
                TierOutcome::Failed(format!("synthesis canceled: {details}"))
            }
            Err(err) => TierOutcome::Failed(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_uses_region_host() {
        assert_eq!(
            synthesis_url("westeurope"),
            "https://westeurope.tts.speech.microsoft.com/cognitiveservices/v1"
        );
    }

    #[test]
    fn missing_region_is_unconfigured() {
        let config = SpeechServiceConfig {
            key: Some("key".to_string()),
            ..SpeechServiceConfig::default()
        };
        assert!(!AzureSpeechClient::from_config(&config).is_available());
    }
}
