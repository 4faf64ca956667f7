//! Scripted collaborators for exercising the pipeline without network access
//! or an installed speech engine.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::llm::{CompletionRequest, LlmError, TextGenerator};
use crate::narration::local::{LocalSpeechEngine, LocalVoice, VoiceSettings};
use crate::narration::remote::{ResultReason, SpeechError, SpeechService, SynthesisRequest};

/// Writes a short silent mono WAV.
pub fn write_silent_wav(path: &Path) -> anyhow::Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for _ in 0..1_600 {
        writer.write_sample(0i16)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Text generator returning scripted answers in order; the last one repeats.
pub struct FakeTextGenerator {
    responses: Mutex<Vec<Result<String, LlmError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    calls: AtomicUsize,
}

impl FakeTextGenerator {
    pub fn new(responses: Vec<Result<String, LlmError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always(answer: impl Into<String>) -> Self {
        Self::new(vec![Ok(answer.into())])
    }

    pub fn always_error(error: LlmError) -> Self {
        Self::new(vec![Err(error)])
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl TextGenerator for FakeTextGenerator {
    fn name(&self) -> &str {
        "fake-text"
    }

    fn complete(&self, request: &CompletionRequest) -> Result<Vec<String>, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let mut responses = self.responses.lock().unwrap();
        let next = match responses.len() {
            0 => Err(LlmError::EmptyResponse),
            1 => responses[0].clone(),
            _ => responses.remove(0),
        };
        next.map(|answer| vec![answer])
    }
}

#[derive(Debug, Clone)]
pub enum FakeSynthesis {
    Complete,
    /// Reports success after writing bytes that are not audio.
    Corrupt,
    Cancel(String),
    Error(String),
}

pub struct FakeSpeechService {
    behavior: FakeSynthesis,
    requests: Mutex<Vec<SynthesisRequest>>,
    calls: AtomicUsize,
}

impl FakeSpeechService {
    pub fn new(behavior: FakeSynthesis) -> Self {
        Self {
            behavior,
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<SynthesisRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl SpeechService for FakeSpeechService {
    fn name(&self) -> &str {
        "fake-speech"
    }

    fn synthesize(&self, request: &SynthesisRequest, output: &Path) -> Result<ResultReason, SpeechError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        match &self.behavior {
            FakeSynthesis::Complete => {
                write_silent_wav(output).map_err(|e| SpeechError::Http(e.to_string()))?;
                Ok(ResultReason::Completed)
            }
            FakeSynthesis::Corrupt => {
                std::fs::write(output, b"not a wav at all")?;
                Ok(ResultReason::Completed)
            }
            FakeSynthesis::Cancel(details) => Ok(ResultReason::Canceled {
                details: details.clone(),
            }),
            FakeSynthesis::Error(message) => Err(SpeechError::Http(message.clone())),
        }
    }
}

/// Local engine that records what it was asked to say. A failing engine
/// leaves a truncated file behind.
pub struct FakeLocalEngine {
    voices: Vec<LocalVoice>,
    fail: bool,
    rendered: Mutex<Vec<(String, VoiceSettings)>>,
}

impl FakeLocalEngine {
    pub fn new(voices: Vec<LocalVoice>) -> Self {
        Self {
            voices,
            fail: false,
            rendered: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn rendered(&self) -> Vec<(String, VoiceSettings)> {
        self.rendered.lock().unwrap().clone()
    }
}

impl LocalSpeechEngine for FakeLocalEngine {
    fn name(&self) -> &str {
        "fake-local"
    }

    fn voices(&self) -> anyhow::Result<Vec<LocalVoice>> {
        Ok(self.voices.clone())
    }

    fn render_to_file(&self, text: &str, settings: &VoiceSettings, output: &Path) -> anyhow::Result<()> {
        self.rendered
            .lock()
            .unwrap()
            .push((text.to_string(), settings.clone()));
        if self.fail {
            std::fs::write(output, b"RIFF")?;
            anyhow::bail!("fake engine crashed");
        }
        write_silent_wav(output)
    }
}
