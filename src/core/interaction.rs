//! Operator interaction
//!
//! Prompts (remote publishing confirmation, dirty repository confirmation, missing
//! secrets) go through the [`Interaction`] trait so that the run can be driven from a
//! terminal, from CI without any prompt, or from tests.

use crate::core::error::PublishError;
use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Argument name of the remote publishing prompt
pub const PUSH_TO_REMOTE: &str = "PushToRemote";

/// Argument name of the invalid version prompt
pub const PUBLISH_DIRTY_REPO: &str = "PublishDirtyRepo";

/// How prompts are answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionMode {
    /// Never prompt: callers apply their non-interactive default
    NoInteraction,
    /// Answer every prompt with its first option
    AutoInteraction,
    /// Ask the operator on the terminal
    Interactive,
}

#[async_trait]
pub trait Interaction: Send + Sync {
    fn mode(&self) -> InteractionMode;

    /// Ask the operator to pick one of `options` (case-insensitive, returned uppercase)
    async fn read_option(
        &self,
        arg_name: &str,
        message: &str,
        options: &[char],
    ) -> Result<char, PublishError>;

    /// Ask the operator for a secret value; `None` when no value is supplied
    async fn read_secret(&self, variable: &str) -> Result<Option<SecretString>, PublishError>;
}

/// Terminal interaction with optional preset answers (`--answer PushToRemote=N`)
#[derive(Debug, Clone)]
pub struct ConsoleInteraction {
    mode: InteractionMode,
    presets: HashMap<String, char>,
}

impl ConsoleInteraction {
    pub fn new(mode: InteractionMode) -> Self {
        Self {
            mode,
            presets: HashMap::new(),
        }
    }

    /// Preset the answer of a prompt, bypassing the terminal
    pub fn with_answer(mut self, arg_name: impl Into<String>, answer: char) -> Self {
        self.presets
            .insert(arg_name.into(), answer.to_ascii_uppercase());
        self
    }

    async fn prompt_line(message: &str) -> Result<String, PublishError> {
        let mut stdout = io::stdout();
        stdout
            .write_all(message.as_bytes())
            .await
            .map_err(|e| PublishError::io("stdout", e))?;
        stdout.flush().await.map_err(|e| PublishError::io("stdout", e))?;

        let mut reader = BufReader::new(io::stdin());
        let mut answer = String::new();
        reader
            .read_line(&mut answer)
            .await
            .map_err(|e| PublishError::io("stdin", e))?;
        Ok(answer.trim().to_string())
    }
}

#[async_trait]
impl Interaction for ConsoleInteraction {
    fn mode(&self) -> InteractionMode {
        self.mode
    }

    async fn read_option(
        &self,
        arg_name: &str,
        message: &str,
        options: &[char],
    ) -> Result<char, PublishError> {
        let options: Vec<char> = options.iter().map(|c| c.to_ascii_uppercase()).collect();
        let Some(&first) = options.first() else {
            return Err(PublishError::ConfigError(format!(
                "Prompt {} has no option",
                arg_name
            )));
        };

        if let Some(&preset) = self.presets.get(arg_name)
            && options.contains(&preset)
        {
            return Ok(preset);
        }

        match self.mode {
            InteractionMode::NoInteraction => Err(PublishError::ConfigError(format!(
                "Prompt {} requires interaction (use --answer {}=<option>)",
                arg_name, arg_name
            ))),
            InteractionMode::AutoInteraction => Ok(first),
            InteractionMode::Interactive => {
                let choices: Vec<String> = options.iter().map(|c| c.to_string()).collect();
                loop {
                    let line =
                        Self::prompt_line(&format!("{} ({}): ", message, choices.join("/"))).await?;
                    if let Some(c) = line.chars().next().map(|c| c.to_ascii_uppercase())
                        && options.contains(&c)
                    {
                        return Ok(c);
                    }
                }
            }
        }
    }

    async fn read_secret(&self, variable: &str) -> Result<Option<SecretString>, PublishError> {
        if self.mode != InteractionMode::Interactive {
            return Ok(None);
        }
        let line = Self::prompt_line(&format!(
            "Environment variable '{}' not found. Enter its value (empty to skip): ",
            variable
        ))
        .await?;
        Ok((!line.is_empty()).then(|| SecretString::new(line.into())))
    }
}
