use anyhow::{Context, Result};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;

use crate::commands::{get_help_text, parse_slash_command, ParsedCommand, SlashCommand};
use crate::config::Config;
use crate::llm::{build_backend, ModelBackend};
use crate::session::{ConversationSession, PromptOptions, SessionManager};
use crate::weather::WeatherClient;

/// What the loop should do after handling one line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Line-oriented chat driver, one active session at a time
pub struct ChatLoop<W: Write> {
    manager: SessionManager,
    active: Uuid,
    base_options: PromptOptions,
    weather: WeatherClient,
    export_file: PathBuf,
    out: W,
}

impl<W: Write> ChatLoop<W> {
    pub fn new(
        backend: Arc<dyn ModelBackend>,
        options: PromptOptions,
        weather: WeatherClient,
        export_file: PathBuf,
        out: W,
    ) -> Self {
        let mut manager = SessionManager::new(backend, options.clone());
        let active = manager.create();
        Self {
            manager,
            active,
            base_options: options,
            weather,
            export_file,
            out,
        }
    }

    fn session(&self) -> Result<&ConversationSession> {
        self.manager
            .get(&self.active)
            .context("active session is missing")
    }

    fn session_mut(&mut self) -> Result<&mut ConversationSession> {
        self.manager
            .get_mut(&self.active)
            .context("active session is missing")
    }

    pub fn greet(&mut self) -> Result<()> {
        let session = self.session()?;
        let (level, mode) = (session.level(), session.mode());
        writeln!(self.out, "🎓 Welcome to tutorchat!")?;
        writeln!(self.out, "{}", "=".repeat(50))?;
        writeln!(self.out, "Level: {} ({})  Mode: {}", level, level.description(), mode)?;
        writeln!(self.out, "Type a question, or /help for commands.")?;
        writeln!(self.out)?;
        Ok(())
    }

    pub fn prompt_label(&self) -> String {
        match self.session() {
            Ok(session) => format!("💭 [{}] > ", session.level()),
            Err(_) => "💭 > ".to_string(),
        }
    }

    /// Handle one line of input: a slash command or a question.
    pub async fn handle_input(&mut self, input: &str) -> Result<Flow> {
        if let Some(parsed) = parse_slash_command(input) {
            return self.handle_command(parsed).await;
        }
        if input.trim_start().starts_with('/') {
            writeln!(self.out, "❓ Unknown command. Type /help for the list.")?;
            return Ok(Flow::Continue);
        }

        let result = self.session_mut()?.submit(input).await;
        match result {
            Ok(Some(turn)) => {
                writeln!(self.out, "🤖 {}", turn.content)?;
                writeln!(self.out)?;
            }
            Ok(None) => {}
            Err(e) => {
                writeln!(self.out, "❌ The tutor could not answer: {}", e)?;
                writeln!(self.out, "   Your question is kept in the history; try again.")?;
            }
        }
        Ok(Flow::Continue)
    }

    async fn handle_command(&mut self, parsed: ParsedCommand) -> Result<Flow> {
        match parsed.command {
            SlashCommand::Level => match parsed.level_target() {
                Some(level) => {
                    self.session_mut()?.set_level(level);
                    writeln!(self.out, "🎯 Level set to {} ({})", level, level.description())?;
                }
                None => writeln!(self.out, "Usage: /level <beginner|intermediate|advanced>")?,
            },
            SlashCommand::Mode => match parsed.mode_target() {
                Some(mode) => {
                    self.session_mut()?.set_mode(mode);
                    writeln!(self.out, "🧭 Prompt mode set to {}", mode)?;
                }
                None => writeln!(self.out, "Usage: /mode <single|multi>")?,
            },
            SlashCommand::Clear => {
                self.session_mut()?.reset();
                writeln!(self.out, "🧹 Conversation cleared.")?;
            }
            SlashCommand::Export => {
                let path = parsed
                    .argument()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| self.export_file.clone());
                let saved = self.session()?.save_export(&path);
                match saved {
                    Ok(()) => writeln!(self.out, "💾 Conversation saved to {}", path.display())?,
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "export failed");
                        writeln!(self.out, "❌ Could not save the conversation: {:#}", e)?;
                    }
                }
            }
            SlashCommand::Weather => {
                let Some(city) = parsed.argument() else {
                    writeln!(self.out, "Usage: /weather <city>")?;
                    return Ok(Flow::Continue);
                };
                if !self.weather.is_enabled() {
                    writeln!(self.out, "🌥️ Weather is off. Set OPENWEATHER_API_KEY to enable it.")?;
                    return Ok(Flow::Continue);
                }
                match self.weather.fetch_weather(city).await {
                    Some(report) => writeln!(self.out, "🌤️ {}", report.summary())?,
                    None => writeln!(self.out, "🌥️ Weather for '{}' is unavailable right now.", city)?,
                }
            }
            SlashCommand::History => {
                let session = self.session()?;
                let (count, transcript) = (session.len(), session.export());
                if session.is_empty() {
                    writeln!(self.out, "📭 No messages yet.")?;
                } else {
                    writeln!(self.out, "📜 {} messages", count)?;
                    write!(self.out, "{}", transcript)?;
                }
            }
            SlashCommand::New => {
                let current = self.session()?;
                let options = PromptOptions {
                    level: current.level(),
                    mode: current.mode(),
                    ..self.base_options.clone()
                };
                let previous = self.active;
                self.active = self.manager.create_with(options);
                self.manager.remove(&previous);
                writeln!(self.out, "✨ Started a new session.")?;
            }
            SlashCommand::Help => writeln!(self.out, "{}", get_help_text())?,
            SlashCommand::Bye => {
                writeln!(self.out, "👋 Happy learning!")?;
                return Ok(Flow::Exit);
            }
        }
        Ok(Flow::Continue)
    }

    #[cfg(test)]
    fn into_output(self) -> W {
        self.out
    }
}

fn prompt_options(config: &Config) -> PromptOptions {
    PromptOptions {
        level: config.default_level,
        mode: config.default_mode,
        subject: config.subject.clone(),
        temperature: config.temperature as f32,
        max_tokens: config.max_tokens,
    }
}

/// Interactive chat on stdin/stdout until EOF or `/bye`
pub async fn run_chat(config: &Config) -> Result<()> {
    let api_key = config.require_model_api_key()?;
    let backend = build_backend(config, api_key)?;
    let weather = WeatherClient::new(
        config.weather_api_key(),
        std::time::Duration::from_secs(config.request_timeout_secs),
    );

    let mut chat = ChatLoop::new(
        backend,
        prompt_options(config),
        weather,
        config.export_file.clone(),
        std::io::stdout(),
    );
    chat.greet()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{}", chat.prompt_label());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await.context("Failed to read user input")? else {
            println!();
            break;
        };
        if chat.handle_input(&line).await? == Flow::Exit {
            break;
        }
    }
    Ok(())
}

/// Ask one question and print the stored answer
pub async fn ask_once(config: &Config, question: &str) -> Result<()> {
    let api_key = config.require_model_api_key()?;
    let backend = build_backend(config, api_key)?;
    let mut session = ConversationSession::new(backend, prompt_options(config));

    match session.submit(question).await? {
        Some(turn) => println!("{}", turn.content),
        None => println!("👋 No question asked."),
    }
    Ok(())
}
