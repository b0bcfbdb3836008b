use std::str::FromStr;

use crate::level::Level;
use crate::prompts::PromptMode;

use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Commands that can be invoked by starting a message with a leading slash.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, AsRefStr, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum SlashCommand {
    /// Switch learning level (beginner, intermediate, advanced)
    Level,
    /// Switch prompt mode (single, multi)
    Mode,
    /// Clear the conversation
    Clear,
    /// Save the conversation to a text file
    Export,
    /// Show current weather for a city
    Weather,
    /// Print the conversation so far
    History,
    /// Start a fresh session
    New,
    /// Show help
    Help,
    /// Exit the application
    Bye,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: SlashCommand,
    pub argument: Option<String>,
}

impl ParsedCommand {
    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }

    pub fn level_target(&self) -> Option<Level> {
        if self.command != SlashCommand::Level {
            return None;
        }
        self.argument()?.parse().ok()
    }

    pub fn mode_target(&self) -> Option<PromptMode> {
        if self.command != SlashCommand::Mode {
            return None;
        }
        self.argument()?.parse().ok()
    }
}

impl SlashCommand {
    /// User-visible description shown in help.
    pub fn description(self) -> &'static str {
        match self {
            SlashCommand::Level => "switch learning level (beginner, intermediate, advanced)",
            SlashCommand::Mode => "switch prompt mode (single, multi)",
            SlashCommand::Clear => "clear the conversation, keeping the level",
            SlashCommand::Export => "save the conversation to a text file",
            SlashCommand::Weather => "show the current weather for a city",
            SlashCommand::History => "print the conversation so far",
            SlashCommand::New => "start a fresh session",
            SlashCommand::Help => "show available commands",
            SlashCommand::Bye => "exit the application",
        }
    }

    /// Command string without the leading '/'.
    pub fn command(self) -> &'static str {
        self.into()
    }
}

/// Parse a slash command from user input
pub fn parse_slash_command(input: &str) -> Option<ParsedCommand> {
    let rest = input.trim().strip_prefix('/')?;

    let mut parts = rest.split_whitespace();
    let head = parts.next()?;
    let args: Vec<&str> = parts.collect();

    let command = SlashCommand::from_str(&head.to_lowercase())
        .ok()
        .or_else(|| match head.to_lowercase().as_str() {
            "q" | "quit" | "exit" => Some(SlashCommand::Bye),
            "reset" => Some(SlashCommand::Clear),
            "l" | "lvl" => Some(SlashCommand::Level),
            "h" | "?" => Some(SlashCommand::Help),
            _ => None,
        })?;

    let argument = if args.is_empty() {
        None
    } else {
        Some(args.join(" "))
    };

    Some(ParsedCommand { command, argument })
}

/// Get help text for all available commands
pub fn get_help_text() -> String {
    let mut help = String::from("Available commands:\n\n");
    for command in SlashCommand::iter() {
        help.push_str(&format!("/{} - {}\n", command.command(), command.description()));
    }

    help.push_str("\nAliases: /q for /bye, /reset for /clear, /l for /level");
    help.push_str("\nUse /level <b|i|a> to jump straight to Beginner, Intermediate or Advanced.");

    help
}
