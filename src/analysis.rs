//! Problem analysis: free-text description in, [`ProblemReport`] out.
//!
//! A configured text service is asked for a JSON answer. Without one, a
//! keyword classifier runs directly on the description.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, OnceLock};

use crate::config::TextServiceConfig;
use crate::events::Outcome;
use crate::llm::{first_completion, CompletionRequest, LlmError, TextGenerator};
use crate::service::ServiceStatus;

const SYSTEM_PROMPT: &str = "You are an expert child psychologist and storyteller. \
You read descriptions of children's behavioral problems and extract the elements \
needed to write a gentle, therapeutic children's story.";

const DEFAULT_CHARACTERS: [&str; 12] = [
    "a brave little bear",
    "a curious rabbit",
    "a playful fox",
    "a gentle deer",
    "a clever owl",
    "a friendly squirrel",
    "a determined mouse",
    "a kind hedgehog",
    "an adventurous frog",
    "a wise turtle",
    "an energetic chipmunk",
    "a caring bunny",
];

/// Semantic summary of a behavioral problem. Every field is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemReport {
    pub problem_type: String,
    pub emotions: String,
    pub moral: String,
    pub story_theme: String,
    pub character: String,
}

/// The four fields produced before a character is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisFields {
    pub problem_type: String,
    pub emotions: String,
    pub moral: String,
    pub story_theme: String,
}

impl AnalysisFields {
    pub fn with_character(self, character: impl Into<String>) -> ProblemReport {
        ProblemReport {
            problem_type: self.problem_type,
            emotions: self.emotions,
            moral: self.moral,
            story_theme: self.story_theme,
            character: character.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProblemCategory {
    Sharing,
    Aggression,
    Lying,
    Listening,
    General,
}

struct Profile {
    problem_type: &'static str,
    emotions: &'static str,
    moral: &'static str,
    story_theme: &'static str,
}

impl Profile {
    fn fields(&self) -> AnalysisFields {
        AnalysisFields {
            problem_type: self.problem_type.to_string(),
            emotions: self.emotions.to_string(),
            moral: self.moral.to_string(),
            story_theme: self.story_theme.to_string(),
        }
    }
}

const GENERAL_PROFILE: Profile = Profile {
    problem_type: "behavioral challenge",
    emotions: "mixed emotions",
    moral: "the importance of good behavior",
    story_theme: "learning and growing",
};

/// Catch-all used when a model answer mentions no known category.
const UNRECOGNISED_RESPONSE_PROFILE: Profile = Profile {
    problem_type: "behavioral issue",
    ..GENERAL_PROFILE
};

impl ProblemCategory {
    /// Precedence used when classifying a parent's description.
    pub const DESCRIPTION_ORDER: [ProblemCategory; 4] = [
        ProblemCategory::Sharing,
        ProblemCategory::Aggression,
        ProblemCategory::Lying,
        ProblemCategory::Listening,
    ];

    /// Precedence used when scanning a model answer that was not valid JSON.
    pub const RESPONSE_ORDER: [ProblemCategory; 4] = [
        ProblemCategory::Sharing,
        ProblemCategory::Lying,
        ProblemCategory::Listening,
        ProblemCategory::Aggression,
    ];

    /// Category of a `problem_type` label or any other text, `General` when
    /// nothing matches.
    pub fn detect(text: &str) -> Self {
        Self::detect_in(text, &Self::DESCRIPTION_ORDER)
    }

    pub fn detect_in(text: &str, order: &[ProblemCategory]) -> Self {
        order
            .iter()
            .copied()
            .find(|category| category.matches(text))
            .unwrap_or(ProblemCategory::General)
    }

    pub fn matches(self, text: &str) -> bool {
        match self.pattern() {
            Some(pattern) => pattern.is_match(text),
            None => false,
        }
    }

    /// Candidate characters for this category.
    pub fn characters(self) -> &'static [&'static str] {
        match self {
            ProblemCategory::Sharing => &["a generous little bear", "a sharing rabbit", "a kind squirrel"],
            ProblemCategory::Lying => &["a truthful little fox", "an honest owl", "a trustworthy deer"],
            ProblemCategory::Listening => &[
                "an attentive little mouse",
                "a respectful bunny",
                "a patient turtle",
            ],
            ProblemCategory::Aggression => &["a peaceful little bear", "a gentle deer", "a calm hedgehog"],
            ProblemCategory::General => &DEFAULT_CHARACTERS,
        }
    }

    fn profile(self) -> Profile {
        match self {
            ProblemCategory::Sharing => Profile {
                problem_type: "sharing conflict",
                emotions: "possessiveness, fear of loss",
                moral: "the importance of sharing and friendship",
                story_theme: "friendship and cooperation",
            },
            ProblemCategory::Aggression => Profile {
                problem_type: "aggression",
                emotions: "anger, frustration",
                moral: "kindness and peaceful resolution",
                story_theme: "peace and understanding",
            },
            ProblemCategory::Lying => Profile {
                problem_type: "lying",
                emotions: "fear, guilt",
                moral: "honesty builds trust",
                story_theme: "honesty and trust",
            },
            ProblemCategory::Listening => Profile {
                problem_type: "not listening",
                emotions: "frustration, impatience",
                moral: "listening shows respect",
                story_theme: "respect and communication",
            },
            ProblemCategory::General => GENERAL_PROFILE,
        }
    }

    fn pattern(self) -> Option<&'static Regex> {
        static SHARING: OnceLock<Regex> = OnceLock::new();
        static AGGRESSION: OnceLock<Regex> = OnceLock::new();
        static LYING: OnceLock<Regex> = OnceLock::new();
        static LISTENING: OnceLock<Regex> = OnceLock::new();

        let (cell, source) = match self {
            ProblemCategory::Sharing => (&SHARING, r"(?i)shar(e|es|ed|ing)"),
            ProblemCategory::Aggression => (&AGGRESSION, r"(?i)fight|fought|aggress"),
            // word boundary keeps "believe" and "lied" apart
            ProblemCategory::Lying => (&LYING, r"(?i)\bl(ie|ies|ied|ying|iar|iars)\b|honest"),
            ProblemCategory::Listening => (&LISTENING, r"(?i)listen"),
            ProblemCategory::General => return None,
        };
        Some(cell.get_or_init(|| Regex::new(source).expect("category pattern is valid")))
    }
}

/// Classifies a description without any remote service.
pub fn classify_description(description: &str) -> AnalysisFields {
    ProblemCategory::detect_in(description, &ProblemCategory::DESCRIPTION_ORDER)
        .profile()
        .fields()
}

/// Keyword scan over a model answer that could not be parsed as JSON.
pub fn scan_response(response: &str) -> AnalysisFields {
    match ProblemCategory::detect_in(response, &ProblemCategory::RESPONSE_ORDER) {
        ProblemCategory::General => UNRECOGNISED_RESPONSE_PROFILE.fields(),
        category => category.profile().fields(),
    }
}

/// Parses the model answer: the span from the first `{` to the last `}` as
/// JSON, otherwise a keyword scan of the whole answer. Missing or blank
/// fields are taken from the keyword scan.
pub fn parse_analysis_response(response: &str) -> AnalysisFields {
    let object = match json_span(response).map(serde_json::from_str::<Value>) {
        Some(Ok(Value::Object(object))) => object,
        Some(Ok(_)) => {
            tracing::warn!("analysis answer is JSON but not an object; using keyword scan");
            return scan_response(response);
        }
        Some(Err(err)) => {
            tracing::warn!(error = %err, "could not parse analysis answer; using keyword scan");
            return scan_response(response);
        }
        None => {
            tracing::warn!("no JSON found in analysis answer; using keyword scan");
            return scan_response(response);
        }
    };

    let scanned = scan_response(response);
    let field = |name: &str, default: String| object.get(name).and_then(field_text).unwrap_or(default);

    AnalysisFields {
        problem_type: field("problem_type", scanned.problem_type),
        emotions: field("emotions", scanned.emotions),
        moral: field("moral", scanned.moral),
        story_theme: field("story_theme", scanned.story_theme),
    }
}

fn json_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

fn field_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => text.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Picks a character matching the category of `problem_type`.
pub fn select_character<R: Rng + ?Sized>(problem_type: &str, rng: &mut R) -> String {
    let candidates = ProblemCategory::detect(problem_type).characters();
    candidates
        .choose(rng)
        .copied()
        .unwrap_or(DEFAULT_CHARACTERS[0])
        .to_string()
}

pub fn analysis_prompt(description: &str) -> String {
    format!(
        r#"Analyze this description of a child's behavior and extract what is needed for a therapeutic story.

Problem: "{description}"

Answer with JSON only, using exactly these fields:
{{
    "problem_type": "short label for the core behavioral issue, e.g. 'sharing conflict', 'lying', 'not listening', 'aggression'",
    "emotions": "the main emotions involved, e.g. 'anger, frustration'",
    "moral": "the lesson the story should teach, e.g. 'honesty builds trust'",
    "story_theme": "a positive theme for the story, e.g. 'friendship and cooperation'"
}}

The lesson must suit children between 4 and 8 years old."#
    )
}

pub struct Analyzer {
    client: ServiceStatus<Arc<dyn TextGenerator>>,
    temperature: f32,
    max_tokens: u32,
    rng: StdRng,
}

impl Analyzer {
    pub fn new(client: ServiceStatus<Arc<dyn TextGenerator>>, config: &TextServiceConfig) -> Self {
        Self {
            client,
            temperature: config.analysis_temperature,
            max_tokens: config.analysis_max_tokens,
            rng: StdRng::from_entropy(),
        }
    }

    /// Local classifier only.
    pub fn offline() -> Self {
        Self::new(
            ServiceStatus::unconfigured("offline analyzer"),
            &TextServiceConfig::default(),
        )
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Only transport failures of a configured service are errors.
    pub fn analyze(&mut self, description: &str) -> Result<Outcome<ProblemReport>, LlmError> {
        let client = match &self.client {
            ServiceStatus::Available(client) => Arc::clone(client),
            ServiceStatus::Unconfigured { reason } => {
                tracing::warn!(%reason, "text service not configured; using fallback analysis");
                let fields = classify_description(description);
                let character = select_character(&fields.problem_type, &mut self.rng);
                return Ok(Outcome::fallback(fields.with_character(character)));
            }
        };

        let request = CompletionRequest {
            system: SYSTEM_PROMPT.to_string(),
            user: analysis_prompt(description),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        let answer = first_completion(client.complete(&request)?)?;
        tracing::debug!(service = client.name(), %answer, "analysis answer received");

        let fields = parse_analysis_response(&answer);
        let character = select_character(&fields.problem_type, &mut self.rng);
        Ok(Outcome::remote(fields.with_character(character)))
    }
}
