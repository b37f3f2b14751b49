use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::router::Command;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub anki: AnkiConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub recognizer: RecognizerConfig,
    #[serde(default)]
    pub feedback: FeedbackConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

// ============================================================================
// AnkiConnect
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AnkiConfig {
    /// AnkiConnect listen address
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// AnkiConnect API version sent with every request
    #[serde(default = "default_api_version")]
    pub api_version: u32,
    /// Deck whose overview `close` returns to
    #[serde(default = "default_deck")]
    pub deck: String,
    /// Request timeout; unset keeps the HTTP client's default
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for AnkiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_version: default_api_version(),
            deck: default_deck(),
            timeout_secs: None,
        }
    }
}

fn default_endpoint() -> String {
    "http://localhost:8765".into()
}

fn default_api_version() -> u32 {
    6
}

fn default_deck() -> String {
    "Default".into()
}

// ============================================================================
// Audio / recognition
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Samples per frame handed to the recognizer
    #[serde(default = "default_frame_samples")]
    pub frame_samples: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            frame_samples: default_frame_samples(),
        }
    }
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_frame_samples() -> usize {
    2048
}

#[derive(Debug, Deserialize)]
pub struct RecognizerConfig {
    /// Directory holding the unpacked recognition model
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
        }
    }
}

fn default_model_path() -> PathBuf {
    PathBuf::from("model")
}

// ============================================================================
// Feedback
// ============================================================================

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackEngine {
    /// Speak the confirmation through an external speech program
    #[default]
    Speech,
    /// Play a short tone instead of speaking
    Chime,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackConfig {
    /// Confirmation sounds for attach, pause and unpause
    #[serde(default = "default_feedback_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub engine: FeedbackEngine,
    /// Speech program, the phrase is passed as its last argument
    #[serde(default = "default_speech_program")]
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            enabled: default_feedback_enabled(),
            engine: FeedbackEngine::default(),
            program: default_speech_program(),
            args: Vec::new(),
        }
    }
}

fn default_feedback_enabled() -> bool {
    true
}

fn default_speech_program() -> String {
    if cfg!(target_os = "macos") {
        "say".into()
    } else {
        "espeak-ng".into()
    }
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_file")]
    pub file: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
        }
    }
}

fn default_log_file() -> PathBuf {
    PathBuf::from("anki-voice.log")
}

impl Config {
    /// Load settings. An explicitly named file must exist; without one,
    /// `config.toml` is used when present and built-in defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    Self::from_file(path)
                } else {
                    Ok(Config::default())
                }
            }
        }
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = read(path)?;
        Ok(toml::from_str(&text)?)
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

// ============================================================================
// Command phrases
// ============================================================================

#[derive(Debug, Deserialize)]
struct CommandEntry {
    related_words: Vec<String>,
}

/// Spoken triggers for every command class.
///
/// Built once at startup and read-only afterwards. Phrases are lowercase,
/// trimmed, and never shared between two classes; each class always answers
/// to its own name.
#[derive(Debug, Clone)]
pub struct CommandTable {
    entries: Vec<(Command, Vec<String>)>,
}

impl CommandTable {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_json(&read(path)?)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let mut raw: HashMap<String, CommandEntry> = serde_json::from_str(text)?;
        let mut owner: HashMap<String, Command> = HashMap::new();
        let mut entries = Vec::with_capacity(Command::ALL.len());

        for command in Command::ALL {
            let entry = raw
                .remove(command.name())
                .ok_or(ConfigError::MissingCommand(command.name()))?;

            let mut phrases: Vec<String> = Vec::with_capacity(entry.related_words.len() + 1);
            let candidates = std::iter::once(command.name().to_string())
                .chain(entry.related_words)
                .map(|p| p.trim().to_lowercase());

            for phrase in candidates {
                if phrase.is_empty() {
                    return Err(ConfigError::EmptyPhrase(command.name()));
                }
                match owner.get(&phrase) {
                    Some(&other) if other == command => continue,
                    Some(&other) => {
                        return Err(ConfigError::DuplicatePhrase {
                            phrase,
                            first: other.name(),
                            second: command.name(),
                        });
                    }
                    None => {
                        owner.insert(phrase.clone(), command);
                        phrases.push(phrase);
                    }
                }
            }

            entries.push((command, phrases));
        }

        Ok(Self { entries })
    }

    /// Ordered phrases for a command, canonical name first
    pub fn phrases(&self, command: Command) -> &[String] {
        self.entries
            .iter()
            .find(|(c, _)| *c == command)
            .map(|(_, p)| p.as_slice())
            .unwrap_or(&[])
    }

    pub fn matches(&self, command: Command, phrase: &str) -> bool {
        self.phrases(command).iter().any(|p| p == phrase)
    }

    /// First command class whose phrase set contains `phrase`
    pub fn lookup(&self, phrase: &str) -> Option<Command> {
        self.entries
            .iter()
            .find(|(_, phrases)| phrases.iter().any(|p| p == phrase))
            .map(|(c, _)| *c)
    }
}
