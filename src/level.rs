use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Proficiency tier the learner picked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

pub const BEGINNER_MARKER: &str = "🔰 Beginner:";
pub const INTERMEDIATE_MARKER: &str = "📚 Intermediate:";
pub const ADVANCED_MARKER: &str = "🚀 Advanced:";

impl Level {
    /// All levels in the order their sections appear in a multi-level answer.
    pub const ALL: [Level; 3] = [Level::Beginner, Level::Intermediate, Level::Advanced];

    pub fn display_name(&self) -> &'static str {
        match self {
            Level::Beginner => "Beginner",
            Level::Intermediate => "Intermediate",
            Level::Advanced => "Advanced",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Level::Beginner => "plain language, no jargon, everyday analogies",
            Level::Intermediate => "technical vocabulary and how things work under the hood",
            Level::Advanced => "research-level depth, trade-offs and current developments",
        }
    }

    /// Literal label the model must emit in front of this level's section.
    ///
    /// Shared by prompt construction and [`crate::extract::extract_section`];
    /// both sides must see byte-identical text.
    pub fn marker(&self) -> &'static str {
        match self {
            Level::Beginner => BEGINNER_MARKER,
            Level::Intermediate => INTERMEDIATE_MARKER,
            Level::Advanced => ADVANCED_MARKER,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "b" | "beginner" => Ok(Level::Beginner),
            "i" | "intermediate" => Ok(Level::Intermediate),
            "a" | "advanced" => Ok(Level::Advanced),
            other => Err(format!(
                "unknown level '{}' (expected beginner, intermediate or advanced)",
                other
            )),
        }
    }
}
