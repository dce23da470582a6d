//! Interactive prompt reading one query per line

use crate::error::{CsvqlError, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

pub const PROMPT: &str = "csvql> ";

/// Supplies queries to the interactive loop
pub trait CommandSource {
    /// Next non-blank command, or `None` when the session ends
    fn next_command(&mut self) -> Result<Option<String>>;
}

/// Line editor with history.
///
/// Ctrl-D ends the session. Ctrl-C ends it too, even with text on the line:
/// the editor reports an interrupt without the pending input, so a partly
/// typed query cannot be told apart from an empty line.
pub struct CommandPrompt {
    editor: DefaultEditor,
}

impl CommandPrompt {
    pub fn new() -> Result<Self> {
        let editor = DefaultEditor::new().map_err(|e| CsvqlError::Prompt(e.to_string()))?;
        Ok(Self { editor })
    }
}

impl CommandSource for CommandPrompt {
    fn next_command(&mut self) -> Result<Option<String>> {
        loop {
            match prompt_step(self.editor.readline(PROMPT))? {
                PromptStep::Command(command) => {
                    let _ = self.editor.add_history_entry(command.as_str());
                    return Ok(Some(command));
                }
                PromptStep::Blank => continue,
                PromptStep::End => return Ok(None),
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum PromptStep {
    Command(String),
    Blank,
    End,
}

fn prompt_step(read: std::result::Result<String, ReadlineError>) -> Result<PromptStep> {
    match read {
        Ok(line) => Ok(normalize(&line).map_or(PromptStep::Blank, PromptStep::Command)),
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(PromptStep::End),
        Err(e) => Err(CsvqlError::Prompt(e.to_string())),
    }
}

/// Fixed list of commands, one per entry
pub struct ScriptedCommands {
    lines: std::vec::IntoIter<String>,
}

impl ScriptedCommands {
    pub fn new<I, L>(lines: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<String>,
    {
        let lines: Vec<String> = lines.into_iter().map(Into::into).collect();
        Self {
            lines: lines.into_iter(),
        }
    }
}

impl CommandSource for ScriptedCommands {
    fn next_command(&mut self) -> Result<Option<String>> {
        Ok(self.lines.by_ref().find_map(|line| normalize(&line)))
    }
}

fn normalize(line: &str) -> Option<String> {
    let trimmed = line.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
