pub mod chat;
pub mod selector;

use serde::{ Deserialize, Serialize };
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The two interchangeable completion backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Local Ollama server.
    Ollama,
    /// OpenRouter, reached through its OpenAI-compatible API.
    OpenRouter,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Ollama => "ollama",
            BackendKind::OpenRouter => "openrouter",
        }
    }

    /// Human-facing vendor name used in error fragments.
    pub fn display_name(&self) -> &'static str {
        match self {
            BackendKind::Ollama => "Ollama",
            BackendKind::OpenRouter => "OpenRouter",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq, Error)]
#[error("Invalid AI method: '{0}' (expected auto, ollama or openrouter)")]
pub struct ParseSelectionModeError(String);

impl FromStr for BackendKind {
    type Err = ParseSelectionModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(BackendKind::Ollama),
            "openrouter" => Ok(BackendKind::OpenRouter),
            _ => Err(ParseSelectionModeError(s.to_string())),
        }
    }
}

/// How the active backend is chosen at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    Auto,
    Pinned(BackendKind),
}

impl FromStr for SelectionMode {
    type Err = ParseSelectionModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            return Ok(SelectionMode::Auto);
        }
        s.parse().map(SelectionMode::Pinned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_selection_modes() {
        assert_eq!("auto".parse(), Ok(SelectionMode::Auto));
        assert_eq!("AUTO".parse(), Ok(SelectionMode::Auto));
        assert_eq!("ollama".parse(), Ok(SelectionMode::Pinned(BackendKind::Ollama)));
        assert_eq!(" OpenRouter ".parse(), Ok(SelectionMode::Pinned(BackendKind::OpenRouter)));
        assert!("gemini".parse::<SelectionMode>().is_err());
    }

    #[test]
    fn backend_kind_serializes_as_status_string() {
        assert_eq!(serde_json::to_string(&BackendKind::OpenRouter).unwrap(), "\"openrouter\"");
        assert_eq!(BackendKind::Ollama.to_string(), "ollama");
    }
}
