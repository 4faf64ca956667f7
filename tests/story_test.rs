use std::sync::Arc;

use storyteller::analysis::ProblemReport;
use storyteller::config::{StoryConfig, TextServiceConfig};
use storyteller::events::Provenance;
use storyteller::llm::{LlmError, TextGenerator};
use storyteller::narration::ssml::has_speaker_tags;
use storyteller::service::ServiceStatus;
use storyteller::story::{story_prompt, validate_story, Composer, StoryIssue, StoryTemplate, TITLE_MARKER};
use storyteller::testing::FakeTextGenerator;

fn report(problem_type: &str, character: &str, moral: &str) -> ProblemReport {
    ProblemReport {
        problem_type: problem_type.to_string(),
        emotions: "possessiveness, fear of loss".to_string(),
        moral: moral.to_string(),
        story_theme: "friendship and cooperation".to_string(),
        character: character.to_string(),
    }
}

fn remote_composer(fake: &Arc<FakeTextGenerator>, dialogue: bool) -> Composer {
    let client: Arc<dyn TextGenerator> = fake.clone();
    Composer::new(
        ServiceStatus::Available(client),
        &TextServiceConfig::default(),
        &StoryConfig { dialogue },
    )
}

#[test]
fn sharing_problem_uses_sharing_template() {
    let report = report(
        "sharing conflict",
        "a generous little bear",
        "the importance of sharing and friendship",
    );
    let outcome = Composer::offline().compose(&report).unwrap();

    assert_eq!(outcome.provenance, Provenance::Fallback);
    let narrative = outcome.value;
    assert_eq!(narrative.template, Some(StoryTemplate::Sharing));
    assert!(narrative.text.contains("a generous little bear"));
    assert!(narrative.text.contains("A generous little bear"));
    assert!(narrative.text.contains("the importance of sharing and friendship"));
    assert!(narrative.text.contains("twice as much fun"));
    assert!(!narrative.text.contains("flower and candle"));
    assert!(!narrative.text.contains('{'));
}

#[test]
fn template_selection_follows_problem_type() {
    assert_eq!(StoryTemplate::for_problem_type("sharing conflict"), StoryTemplate::Sharing);
    assert_eq!(StoryTemplate::for_problem_type("won't share"), StoryTemplate::Sharing);
    assert_eq!(StoryTemplate::for_problem_type("aggression"), StoryTemplate::Aggression);
    assert_eq!(StoryTemplate::for_problem_type("fighting siblings"), StoryTemplate::Aggression);
    assert_eq!(StoryTemplate::for_problem_type("lying"), StoryTemplate::Generic);
    assert_eq!(StoryTemplate::for_problem_type("behavioral challenge"), StoryTemplate::Generic);
}

#[test]
fn templates_alternate_speakers() {
    for template in [StoryTemplate::Sharing, StoryTemplate::Aggression, StoryTemplate::Generic] {
        let text = template.render("a calm hedgehog", "kindness and peaceful resolution");
        assert!(has_speaker_tags(&text));
        let tags: Vec<&str> = text
            .lines()
            .map(|line| line.split(':').next().unwrap_or(""))
            .collect();
        for pair in tags.windows(2) {
            assert_ne!(pair[0], pair[1], "{template:?} repeats a speaker");
        }
    }
}

#[test]
fn generic_template_carries_the_moral() {
    let report = report("lying", "an honest owl", "honesty builds trust");
    let narrative = Composer::offline().compose(&report).unwrap().value;
    assert_eq!(narrative.template, Some(StoryTemplate::Generic));
    assert!(narrative.text.contains("an honest owl"));
    assert!(narrative.text.contains("honesty builds trust"));
}

#[test]
fn remote_story_is_cleaned_and_titled() {
    let body = "Once upon a time, in a meadow full of daisies, a little bear found a **shiny** red ball. ".repeat(3);
    let fake = Arc::new(FakeTextGenerator::new(vec![Ok(format!(
        "*The Shiny Red Ball*\n\n{body}\n\n\n_The end._"
    ))]));
    let composer = remote_composer(&fake, false);

    let outcome = composer
        .compose(&report("sharing conflict", "a kind squirrel", "sharing is caring"))
        .unwrap();
    assert_eq!(outcome.provenance, Provenance::Remote);
    assert_eq!(outcome.value.template, None);

    let text = outcome.value.text;
    assert!(text.starts_with(&format!("{TITLE_MARKER} The Shiny Red Ball\n\n")));
    assert!(!text.contains('*'));
    assert!(!text.contains('_'));
    assert!(text.ends_with("\n\nThe end."));

    let request = &fake.requests()[0];
    assert!(request.user.contains("a kind squirrel"));
    assert!(request.user.contains("sharing is caring"));
    assert!(!request.user.contains("Man:"));
}

#[test]
fn dialogue_mode_asks_for_speaker_tags() {
    let report = report("aggression", "a calm hedgehog", "kindness and peaceful resolution");
    assert!(story_prompt(&report, true).contains("\"Man:\" or \"Woman:\""));
    assert!(!story_prompt(&report, false).contains("\"Man:\""));
}

#[test]
fn remote_failure_is_an_error() {
    let fake = Arc::new(FakeTextGenerator::always_error(LlmError::Timeout(60)));
    let composer = remote_composer(&fake, false);

    let err = composer
        .compose(&report("aggression", "a gentle deer", "kindness"))
        .unwrap_err();
    assert!(matches!(err, LlmError::Timeout(60)));
}

#[test]
fn quality_check_reports_length_and_words() {
    assert!(matches!(validate_story("Too short.")[0], StoryIssue::TooShort(10)));

    let long = "The fox and the hen walked on. ".repeat(40);
    assert!(matches!(validate_story(&long)[0], StoryIssue::TooLong(_)));

    let unkind = format!("{} The fox said, \"I hate rain.\"", "The fox and the hen walked on. ".repeat(8));
    assert_eq!(validate_story(&unkind), vec![StoryIssue::DiscouragedWord("hate")]);
}
