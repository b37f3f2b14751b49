//! Voice remote control for Anki reviews over AnkiConnect

pub mod audio;
pub mod capture;
pub mod config;
pub mod error;
pub mod feedback;
pub mod gateway;
pub mod recognizer;
pub mod router;
pub mod session;
pub mod tts;
pub mod ui;

#[cfg(test)]
mod testing;

pub use config::{CommandTable, Config};
pub use error::{ConfigError, GatewayError};
pub use gateway::{AnkiConnect, ControlApi, Method};
pub use router::{Command, CommandRouter, Flow};
pub use session::{CardSnapshot, Grade, ReviewSession, ReviewState};
