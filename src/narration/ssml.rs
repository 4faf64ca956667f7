//! Speech markup for the remote speech service.

use regex::Regex;
use std::sync::OnceLock;

use super::clean_line_for_speech;

const SPEAK_OPEN: &str =
    r#"<speak version="1.0" xmlns="http://www.w3.org/2001/10/synthesis" xml:lang="en-US">"#;
const SPEAK_CLOSE: &str = "</speak>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogueVoices {
    pub male: String,
    pub female: String,
    /// Untagged lines.
    pub narrator: String,
}

impl Default for DialogueVoices {
    fn default() -> Self {
        Self {
            male: "en-US-GuyNeural".to_string(),
            female: "en-US-AriaNeural".to_string(),
            narrator: "en-US-AriaNeural".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    Male,
    Female,
    Narrator,
}

impl Speaker {
    fn prosody(self) -> &'static str {
        match self {
            Speaker::Male => "<prosody pitch='-6st' rate='-10%'>",
            Speaker::Female => "<prosody pitch='+0st' rate='-10%'>",
            Speaker::Narrator => "<prosody rate='-10%'>",
        }
    }
}

fn male_tag() -> &'static Regex {
    static MALE: OnceLock<Regex> = OnceLock::new();
    MALE.get_or_init(|| {
        Regex::new(r"(?i)^(man|male|father|dad|papa|мужчина|муж\w*|отец|папа\w*|папочка)\s*:\s*(.*)$")
            .expect("male speaker pattern is valid")
    })
}

fn female_tag() -> &'static Regex {
    static FEMALE: OnceLock<Regex> = OnceLock::new();
    FEMALE.get_or_init(|| {
        Regex::new(r"(?i)^(woman|female|mother|mom|mama|женщина|жен\w*|мать|мама\w*|мамочка)\s*:\s*(.*)$")
            .expect("female speaker pattern is valid")
    })
}

/// Speaker of a single line and the line without its tag.
pub fn speaker_of(line: &str) -> (Speaker, &str) {
    let line = line.trim();
    if let Some(caps) = male_tag().captures(line) {
        let text = caps.get(2).map_or("", |m| m.as_str());
        return (Speaker::Male, text);
    }
    if let Some(caps) = female_tag().captures(line) {
        let text = caps.get(2).map_or("", |m| m.as_str());
        return (Speaker::Female, text);
    }
    (Speaker::Narrator, line)
}

pub fn has_speaker_tags(text: &str) -> bool {
    text.lines()
        .any(|line| speaker_of(line).0 != Speaker::Narrator)
}

pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn single_voice_ssml(voice: &str, text: &str) -> String {
    format!(
        "{SPEAK_OPEN}<voice name='{}'>{}</voice>{SPEAK_CLOSE}",
        escape_xml(voice),
        escape_xml(text)
    )
}

/// Two-voice markup: `Man:`-style lines get the male voice with a lower
/// pitch, `Woman:`-style lines the female voice, untagged lines the
/// narrator voice. Lines are cleaned for speech first.
pub fn build_dialogue_ssml(text: &str, voices: &DialogueVoices) -> String {
    let lines: Vec<String> = text
        .lines()
        .map(clean_line_for_speech)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let (speaker, spoken) = speaker_of(&line);
            let voice = match speaker {
                Speaker::Male => &voices.male,
                Speaker::Female => &voices.female,
                Speaker::Narrator => &voices.narrator,
            };
            format!(
                "<voice name='{}'>{}{}</prosody></voice>",
                escape_xml(voice),
                speaker.prosody(),
                escape_xml(spoken)
            )
        })
        .collect();

    format!("{SPEAK_OPEN}\n{}\n{SPEAK_CLOSE}", lines.join("\n"))
}
