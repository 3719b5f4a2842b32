//! Static instructions — the fixed system-role text every conversation starts with.
//!
//! Two prompts are loaded, in fixed order:
//!
//! 1. **System prompt** — role definition and behaviour rules
//! 2. **Guidelines** — tone, formatting and escalation guidance
//!
//! Loading fails closed: a missing, unreadable, empty or whitespace-only
//! prompt is a configuration error surfaced at startup, never per turn.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A source of named static prompt texts.
pub trait PromptSource: Send + Sync {
    /// Load the prompt called `name`. The returned text is trimmed and non-empty.
    fn load(&self, name: &str) -> Result<String>;
}

/// Reads prompts from files in a directory.
#[derive(Debug, Clone)]
pub struct FilePromptSource {
    dir: PathBuf,
}

impl FilePromptSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl PromptSource for FilePromptSource {
    fn load(&self, name: &str) -> Result<String> {
        let path = self.dir.join(name);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            Error::config(format!("Failed to read prompt {}: {e}", path.display()))
        })?;
        debug!(file = %path.display(), "Loaded prompt file");
        non_blank(name, content)
    }
}

/// In-memory prompt texts, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct InlinePromptSource {
    prompts: HashMap<String, String>,
}

impl InlinePromptSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.prompts.insert(name.into(), text.into());
        self
    }
}

impl PromptSource for InlinePromptSource {
    fn load(&self, name: &str) -> Result<String> {
        let content = self
            .prompts
            .get(name)
            .cloned()
            .ok_or_else(|| Error::config(format!("Prompt not found: {name}")))?;
        non_blank(name, content)
    }
}

fn non_blank(name: &str, content: String) -> Result<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(Error::config(format!(
            "Empty or whitespace-only prompt: {name}"
        )));
    }
    Ok(trimmed.to_string())
}

/// The two static instruction texts, loaded once per process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticInstructions {
    pub system_prompt: String,
    pub guidelines: String,
}

impl StaticInstructions {
    /// Load both prompts from `source`, failing on the first bad one.
    pub fn load(source: &dyn PromptSource, system_name: &str, guidelines_name: &str) -> Result<Self> {
        let system_prompt = source.load(system_name)?;
        let guidelines = source.load(guidelines_name)?;
        info!(
            system_prompt = system_name,
            guidelines = guidelines_name,
            "Static prompts loaded"
        );
        Ok(Self {
            system_prompt,
            guidelines,
        })
    }

    /// Both texts in seeding order.
    pub fn in_order(&self) -> [&str; 2] {
        [&self.system_prompt, &self.guidelines]
    }

    /// The concatenated text, as counted for context-size metrics.
    pub fn combined(&self) -> String {
        format!("{}{}", self.system_prompt, self.guidelines)
    }
}
