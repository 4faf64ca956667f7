//! Story composition: [`ProblemReport`] in, narrative text out.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

use crate::analysis::{ProblemCategory, ProblemReport};
use crate::config::{StoryConfig, TextServiceConfig};
use crate::events::Outcome;
use crate::llm::{first_completion, CompletionRequest, LlmError, TextGenerator};
use crate::service::ServiceStatus;

/// Prefix marking a short first paragraph as the story title.
pub const TITLE_MARKER: &str = "🎭";

const SYSTEM_PROMPT: &str = "You are a master storyteller who writes enchanting fairy tales \
for children aged 4 to 8. Your stories are gentle and never accusatory, use simple language \
and vivid imagery, end happily, and let the lesson emerge from what happens rather than \
from a lecture.";

const MIN_STORY_CHARS: usize = 200;
const MAX_STORY_CHARS: usize = 1000;
const DISCOURAGED_WORDS: [&str; 5] = ["bad", "wrong", "naughty", "stupid", "hate"];

/// Which fixed story a fallback narrative was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoryTemplate {
    Sharing,
    Aggression,
    Generic,
}

impl StoryTemplate {
    pub fn for_problem_type(problem_type: &str) -> Self {
        match ProblemCategory::detect(problem_type) {
            ProblemCategory::Sharing => StoryTemplate::Sharing,
            ProblemCategory::Aggression => StoryTemplate::Aggression,
            _ => StoryTemplate::Generic,
        }
    }

    fn body(self) -> &'static str {
        match self {
            StoryTemplate::Sharing => SHARING_TEMPLATE,
            StoryTemplate::Aggression => AGGRESSION_TEMPLATE,
            StoryTemplate::Generic => GENERIC_TEMPLATE,
        }
    }

    /// Fills `{character}`, `{Character}` and `{moral}`.
    pub fn render(self, character: &str, moral: &str) -> String {
        self.body()
            .trim()
            .replace("{Character}", &capitalize(character))
            .replace("{character}", character)
            .replace("{moral}", moral)
    }
}

const SHARING_TEMPLATE: &str = r#"
Woman: Once upon a time, in a forest full of tall whispering pines, there lived {character}. {Character} owned a little wooden drum, painted red and gold, and played it every single morning.
Man: One sunny day a young rabbit hopped up and asked, "May I have a turn with your drum?"
Woman: {Character} hugged the drum tightly. "What if it gets scratched? What if I never get it back?"
Man: Just then the old owl called down from her branch. "A drum played by two friends makes twice as much fun as a drum played alone."
Woman: So {character} took a deep breath and held out the drum. "Let's take turns," {character} said. "You play, and I will dance."
Man: The rabbit drummed, {character} danced, and soon the squirrels and the hedgehogs came to join the music. The whole clearing was laughing.
Woman: That evening the drum went home with {character}, safe and sound. And {character} had learned {moral}.
Man: The end.
"#;

const AGGRESSION_TEMPLATE: &str = r#"
Woman: Once upon a time, in a meadow full of clover and buttercups, there lived {character}. {Character} loved racing games more than anything.
Man: One afternoon {character} lost a race to a quick little fox. Hot, stormy feelings rushed up, and {character} stomped and wanted to push the fox right over.
Woman: An old turtle crept out from under a leaf. "When the storm is inside you," she said softly, "breathe in like you are smelling a flower, and breathe out like you are blowing out a candle."
Man: {Character} breathed in, and breathed out, and breathed in again. Slowly the storm grew quiet.
Woman: "That was a fast run," {character} told the fox. "Will you race me again tomorrow?" The fox grinned and said yes.
Man: From then on, whenever the stormy feelings came, {character} remembered the turtle's flower and candle, and learned {moral}.
Woman: The end.
"#;

const GENERIC_TEMPLATE: &str = r#"
Woman: Once upon a time, in a magical forest where the streams sang lullabies, there lived {character}.
Man: Every day brought a new adventure, and with every adventure {character} was learning about {moral}.
Woman: One morning {character} faced a challenge that seemed much too big. At first it was hard, and {character} wanted to give up.
Man: But the forest friends gathered close, and with their help and a little courage, {character} found the right thing to do.
Woman: That night the fireflies lit up the sky, and everyone in the forest celebrated. {Character} felt proud and happy, because {character} had discovered {moral}.
Man: And from that day on, {character} shared that lesson with every new friend. The end.
"#;

/// Narrative text plus the template it came from, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeText {
    pub text: String,
    pub template: Option<StoryTemplate>,
}

pub struct Composer {
    client: ServiceStatus<Arc<dyn TextGenerator>>,
    temperature: f32,
    max_tokens: u32,
    dialogue: bool,
}

impl Composer {
    pub fn new(
        client: ServiceStatus<Arc<dyn TextGenerator>>,
        text: &TextServiceConfig,
        story: &StoryConfig,
    ) -> Self {
        Self {
            client,
            temperature: text.story_temperature,
            max_tokens: text.story_max_tokens,
            dialogue: story.dialogue,
        }
    }

    pub fn offline() -> Self {
        Self::new(
            ServiceStatus::unconfigured("offline composer"),
            &TextServiceConfig::default(),
            &StoryConfig::default(),
        )
    }

    pub fn compose(&self, report: &ProblemReport) -> Result<Outcome<NarrativeText>, LlmError> {
        let client = match &self.client {
            ServiceStatus::Available(client) => client,
            ServiceStatus::Unconfigured { reason } => {
                tracing::warn!(%reason, "text service not configured; using fallback story");
                return Ok(Outcome::fallback(fallback_story(report)));
            }
        };

        let request = CompletionRequest {
            system: SYSTEM_PROMPT.to_string(),
            user: story_prompt(report, self.dialogue),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        let story = first_completion(client.complete(&request)?)?;

        Ok(Outcome::remote(NarrativeText {
            text: format_story(&story),
            template: None,
        }))
    }
}

pub fn fallback_story(report: &ProblemReport) -> NarrativeText {
    let template = StoryTemplate::for_problem_type(&report.problem_type);
    NarrativeText {
        text: template.render(&report.character, &report.moral),
        template: Some(template),
    }
}

pub fn story_prompt(report: &ProblemReport, dialogue: bool) -> String {
    let mut prompt = format!(
        r#"Write a children's fairy tale with these elements:

Main character: {character}
Problem theme: {problem_type}
Lesson: {moral}
Story theme: {story_theme}
Emotions to address: {emotions}

Requirements:
1. Length: 300 to 500 words, about three to five minutes when read aloud.
2. Structure: a beginning that introduces the character and setting, a middle with a gentle challenge, and an ending where the character grows.
3. Tone: warm, magical and encouraging, with simple language.
4. Setting: a magical forest, meadow or another enchanting place, with one or two friendly animal friends or a wise mentor.
5. Include sounds, colors and textures, and let the characters speak.
6. End with the character feeling proud and happy.

Never name the child's real problem directly. The animal is a gentle mirror, not a parallel, and the story should feel like entertainment rather than a lesson."#,
        character = report.character,
        problem_type = report.problem_type,
        moral = report.moral,
        story_theme = report.story_theme,
        emotions = report.emotions,
    );

    if dialogue {
        prompt.push_str(
            "\n\nFormat the story as a dialogue for two narrators. Start every line with \
\"Man:\" or \"Woman:\" and alternate between them.",
        );
    }

    prompt.push_str("\n\nWrite the story now:");
    prompt
}

/// Strips markdown emphasis and marks a short first paragraph as the title.
pub fn format_story(story: &str) -> String {
    let cleaned = story.replace("**", "").replace(['*', '_'], "");

    let mut paragraphs: Vec<String> = Vec::new();
    for paragraph in split_paragraphs(&cleaned) {
        if paragraphs.is_empty() && paragraph.chars().count() < 100 {
            paragraphs.push(format!("{TITLE_MARKER} {paragraph}"));
        } else {
            paragraphs.push(paragraph.to_string());
        }
    }
    paragraphs.join("\n\n")
}

/// Trimmed, non-empty paragraphs separated by blank lines, which may hold
/// spaces or tabs.
pub fn split_paragraphs(text: &str) -> impl Iterator<Item = &str> {
    static BLANK_LINE: OnceLock<Regex> = OnceLock::new();
    BLANK_LINE
        .get_or_init(|| Regex::new(r"\r?\n[ \t]*\r?\n").expect("paragraph pattern is valid"))
        .split(text)
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoryIssue {
    TooShort(usize),
    TooLong(usize),
    DiscouragedWord(&'static str),
}

/// Optional quality gate; never applied by the pipeline itself.
pub fn validate_story(text: &str) -> Vec<StoryIssue> {
    let mut issues = Vec::new();
    let length = text.chars().count();
    if length < MIN_STORY_CHARS {
        issues.push(StoryIssue::TooShort(length));
    }
    if length > MAX_STORY_CHARS {
        issues.push(StoryIssue::TooLong(length));
    }

    let lowered = text.to_lowercase();
    for word in DISCOURAGED_WORDS {
        let found = lowered
            .split(|c: char| !c.is_alphanumeric())
            .any(|token| token == word);
        if found {
            issues.push(StoryIssue::DiscouragedWord(word));
        }
    }
    issues
}

impl std::fmt::Display for StoryIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoryIssue::TooShort(n) => write!(f, "story is {n} characters, below {MIN_STORY_CHARS}"),
            StoryIssue::TooLong(n) => write!(f, "story is {n} characters, above {MAX_STORY_CHARS}"),
            StoryIssue::DiscouragedWord(word) => write!(f, "story uses the word \"{word}\""),
        }
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_first_paragraph_becomes_title() {
        let story = format!("**The Kind Bear**\n\n{}\n\nThe end.", "Once there was a bear. ".repeat(6));
        let formatted = format_story(&story);
        assert!(formatted.starts_with("🎭 The Kind Bear\n\n"));
        assert!(formatted.ends_with("The end."));
        assert!(!formatted.contains('*'));
    }

    #[test]
    fn long_first_paragraph_is_not_a_title() {
        let opening = "Once upon a time ".repeat(10);
        let formatted = format_story(&opening);
        assert!(!formatted.starts_with(TITLE_MARKER));
    }

    #[test]
    fn capitalize_handles_empty_and_ascii() {
        assert_eq!(capitalize(""), "");
        assert_eq!(capitalize("a calm hedgehog"), "A calm hedgehog");
    }

    #[test]
    fn discouraged_words_match_whole_words_only() {
        let text = "The badger was glad. ".repeat(12);
        assert!(validate_story(&text).is_empty());

        let text = format!("{} That was bad.", "The badger was glad. ".repeat(12));
        assert_eq!(validate_story(&text), vec![StoryIssue::DiscouragedWord("bad")]);
    }
}
