use crate::level::Level;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the system prompt frames the learner's level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PromptMode {
    /// Ask for one answer pitched at the active level.
    SingleLevel,
    /// Ask for all three sections at once and keep only the active one.
    #[default]
    MultiLevel,
}

impl PromptMode {
    pub fn display_name(&self) -> &'static str {
        match self {
            PromptMode::SingleLevel => "single-level",
            PromptMode::MultiLevel => "multi-level",
        }
    }
}

impl fmt::Display for PromptMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for PromptMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "s" | "single" | "single-level" => Ok(PromptMode::SingleLevel),
            "m" | "multi" | "multi-level" => Ok(PromptMode::MultiLevel),
            other => Err(format!("unknown mode '{}' (expected single or multi)", other)),
        }
    }
}

pub const DEFAULT_SUBJECT: &str = "data science";

/// Return the system instruction for a level and prompt mode.
///
/// In single-level mode only the level name varies. In multi-level mode the
/// text is fixed apart from `subject`, and always lists every marker so the
/// answer can be sliced afterwards.
pub fn build_system_prompt(level: Level, mode: PromptMode, subject: &str) -> String {
    match mode {
        PromptMode::SingleLevel => format!("Provide responses at a {} level.", level),
        PromptMode::MultiLevel => multi_level_prompt(subject),
    }
}

fn multi_level_prompt(subject: &str) -> String {
    format!(
        r#"You are a friendly and encouraging {subject} tutor.

Scope:
- Only answer questions about {subject}.
- If a question is outside {subject}, politely decline and invite the learner to ask a {subject} question instead.

Answer format:
Always answer with exactly three sections, in this order, each starting with its label written exactly as shown:

{beginner} {beginner_depth}. Use simple words and everyday analogies.
{intermediate} {intermediate_depth}. Introduce the proper terminology and explain the mechanics.
{advanced} {advanced_depth}. Cover the mathematics, edge cases and cutting-edge work where relevant.

Do not add any other headings before the first section."#,
        subject = subject,
        beginner = Level::Beginner.marker(),
        beginner_depth = capitalize(Level::Beginner.description()),
        intermediate = Level::Intermediate.marker(),
        intermediate_depth = capitalize(Level::Intermediate.description()),
        advanced = Level::Advanced.marker(),
        advanced_depth = capitalize(Level::Advanced.description()),
    )
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
