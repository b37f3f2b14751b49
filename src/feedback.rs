//! Audible confirmation for attach, pause and unpause
//!
//! Producers push phrases onto an unbounded FIFO and never block; a single
//! worker thread drains it and speaks each phrase in order.

use flume::{Receiver, Sender};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

use crate::config::FeedbackConfig;
use crate::tts::{self, Synthesizer};

pub const ATTACHED: &str = "Success: Attached.";
pub const PAUSED: &str = "Success: Paused.";
pub const UNPAUSED: &str = "Success: Unpaused.";

/// Producer handle for the feedback queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct FeedbackQueue {
    tx: Sender<String>,
    enabled: bool,
}

impl FeedbackQueue {
    /// Create the queue and the receiving end for `run_feedback`
    pub fn channel(enabled: bool) -> (Self, Receiver<String>) {
        let (tx, rx) = flume::unbounded();
        (Self { tx, enabled }, rx)
    }

    /// Queue a confirmation phrase; dropped when alerts are disabled
    pub fn announce(&self, phrase: &str) {
        if !self.enabled {
            return;
        }
        // Receiver gone means we are shutting down
        let _ = self.tx.send(phrase.to_string());
    }
}

/// Feedback worker loop - runs on its own thread until every producer is gone
pub fn run_feedback(rx: Receiver<String>, engine: &mut dyn Synthesizer) {
    info!("feedback worker started ({})", engine.name());
    while let Ok(phrase) = rx.recv() {
        if let Err(e) = engine.speak(&phrase) {
            debug!("feedback for {:?} dropped: {}", phrase, e);
        }
    }
}

/// Start the feedback thread. Nothing is spawned and no engine (or audio
/// device) is opened when feedback is disabled.
pub fn spawn_worker(
    config: FeedbackConfig,
    rx: Receiver<String>,
) -> std::io::Result<Option<JoinHandle<()>>> {
    if !config.enabled {
        info!("audible feedback disabled");
        return Ok(None);
    }
    thread::Builder::new()
        .name("feedback".into())
        .spawn(move || match tts::create_engine(&config) {
            Ok(mut engine) => run_feedback(rx, engine.as_mut()),
            Err(e) => warn!("audible feedback unavailable: {:#}", e),
        })
        .map(Some)
}
