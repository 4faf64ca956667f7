use std::fs;
use std::path::Path;
use std::sync::Arc;

use storyteller::analysis::Analyzer;
use storyteller::config::{LocalVoiceConfig, StoryConfig, TextServiceConfig};
use storyteller::events::{Provenance, Stage};
use storyteller::llm::{LlmError, TextGenerator};
use storyteller::narration::local::LocalSpeechTier;
use storyteller::narration::remote::{RemoteSpeechTier, SpeechService};
use storyteller::narration::{ArtifactKind, NarrationTier, Narrator};
use storyteller::pipeline::{PipelineError, StoryPipeline};
use storyteller::service::ServiceStatus;
use storyteller::story::Composer;
use storyteller::testing::{FakeSpeechService, FakeSynthesis, FakeTextGenerator};

const SHARING_PROBLEM: &str = "My daughter won't share her favorite toy with her little brother";

const ANALYSIS_JSON: &str = r#"{"problem_type": "sharing conflict", "emotions": "possessiveness", "moral": "sharing makes play better", "story_theme": "friendship"}"#;

fn offline_narrator(dir: &Path) -> Narrator {
    let tiers: Vec<Box<dyn NarrationTier>> = vec![
        Box::new(RemoteSpeechTier::new(
            ServiceStatus::unconfigured("no speech key"),
            "en-US-AriaNeural",
        )),
        Box::new(LocalSpeechTier::new(
            ServiceStatus::unconfigured("no engine"),
            &LocalVoiceConfig::default(),
        )),
    ];
    Narrator::new(dir, tiers)
}

fn remote_narrator(dir: &Path, speech: &Arc<FakeSpeechService>) -> Narrator {
    let service: Box<dyn SpeechService> = Box::new(Arc::clone(speech));
    let tiers: Vec<Box<dyn NarrationTier>> = vec![Box::new(RemoteSpeechTier::new(
        ServiceStatus::Available(service),
        "en-US-AriaNeural",
    ))];
    Narrator::new(dir, tiers)
}

fn remote_pipeline(text: &Arc<FakeTextGenerator>, narrator: Narrator) -> StoryPipeline {
    let client: Arc<dyn TextGenerator> = text.clone();
    let config = TextServiceConfig::default();
    StoryPipeline::new(
        Analyzer::new(ServiceStatus::Available(Arc::clone(&client)), &config).with_seed(5),
        Composer::new(ServiceStatus::Available(client), &config, &StoryConfig::default()),
        narrator,
    )
}

#[test]
fn offline_run_saves_a_sharing_story_as_text() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = StoryPipeline::new(
        Analyzer::offline().with_seed(9),
        Composer::offline(),
        offline_narrator(dir.path()),
    );

    let summary = pipeline.run(SHARING_PROBLEM).unwrap();
    assert_eq!(summary.artifact.kind, ArtifactKind::Text);
    assert!(summary.artifact.path.starts_with(dir.path()));
    assert_eq!(summary.report.problem_type, "sharing conflict");

    let saved = fs::read_to_string(&summary.artifact.path).unwrap();
    assert!(!saved.is_empty());
    assert!(saved.contains("twice as much fun"));
    assert_eq!(saved, summary.narrative.text);

    let stages: Vec<(Stage, Provenance)> = summary
        .events
        .iter()
        .map(|event| (event.stage, event.provenance))
        .collect();
    assert_eq!(
        stages,
        vec![
            (Stage::Analysis, Provenance::Fallback),
            (Stage::Composition, Provenance::Fallback),
            (Stage::Narration, Provenance::Fallback),
        ]
    );
}

#[test]
fn remote_run_produces_audio() {
    let dir = tempfile::tempdir().unwrap();
    let story = "Once upon a time a little bear had a red drum. ".repeat(6);
    let text = Arc::new(FakeTextGenerator::new(vec![
        Ok(ANALYSIS_JSON.to_string()),
        Ok(story),
    ]));
    let speech = Arc::new(FakeSpeechService::new(FakeSynthesis::Complete));
    let mut pipeline = remote_pipeline(&text, remote_narrator(dir.path(), &speech));

    let summary = pipeline.run(SHARING_PROBLEM).unwrap();
    assert_eq!(summary.artifact.kind, ArtifactKind::Audio);
    assert_eq!(summary.tier, "remote-speech");
    assert_eq!(summary.report.moral, "sharing makes play better");
    assert_eq!(text.call_count(), 2);
    assert_eq!(speech.call_count(), 1);
    assert!(summary
        .events
        .iter()
        .all(|event| event.provenance == Provenance::Remote));
}

#[test]
fn analysis_failure_stops_before_narration() {
    let dir = tempfile::tempdir().unwrap();
    let text = Arc::new(FakeTextGenerator::always_error(LlmError::Http(
        "connection refused".to_string(),
    )));
    let speech = Arc::new(FakeSpeechService::new(FakeSynthesis::Complete));
    let mut pipeline = remote_pipeline(&text, remote_narrator(dir.path(), &speech));

    let err = pipeline.run(SHARING_PROBLEM).unwrap_err();
    assert!(matches!(err, PipelineError::Analysis(LlmError::Http(_))));
    assert_eq!(err.stage(), Stage::Analysis);
    assert_eq!(text.call_count(), 1);
    assert_eq!(speech.call_count(), 0);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn composition_failure_stops_before_narration() {
    let dir = tempfile::tempdir().unwrap();
    let text = Arc::new(FakeTextGenerator::new(vec![
        Ok(ANALYSIS_JSON.to_string()),
        Err(LlmError::Status {
            status: 429,
            body: "rate limited".to_string(),
        }),
    ]));
    let speech = Arc::new(FakeSpeechService::new(FakeSynthesis::Complete));
    let mut pipeline = remote_pipeline(&text, remote_narrator(dir.path(), &speech));

    let err = pipeline.run(SHARING_PROBLEM).unwrap_err();
    assert_eq!(err.stage(), Stage::Composition);
    assert!(matches!(
        err,
        PipelineError::Composition(LlmError::Status { status: 429, .. })
    ));
    assert_eq!(text.call_count(), 2);
    assert_eq!(speech.call_count(), 0);
}

#[test]
fn canceled_speech_still_yields_the_story() {
    let dir = tempfile::tempdir().unwrap();
    let speech = Arc::new(FakeSpeechService::new(FakeSynthesis::Cancel(
        "HTTP 401".to_string(),
    )));
    let mut pipeline = StoryPipeline::new(
        Analyzer::offline(),
        Composer::offline(),
        remote_narrator(dir.path(), &speech),
    );

    let summary = pipeline.run("He never listens at bedtime").unwrap();
    assert_eq!(summary.artifact.kind, ArtifactKind::Text);
    assert_eq!(summary.tier, "text-file");
    assert_eq!(speech.call_count(), 1);
    assert_eq!(
        fs::read_to_string(&summary.artifact.path).unwrap(),
        summary.narrative.text
    );
}
