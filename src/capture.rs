//! Intake loops. Each one owns the router and calls it synchronously, so
//! recognition and dispatch never overlap.

use std::io::BufRead;
use tracing::{debug, info, warn};

use crate::audio::FrameSource;
use crate::gateway::ControlApi;
use crate::recognizer::Recognizer;
use crate::router::{CommandRouter, Flow};

/// Why an intake loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureExit {
    /// The quit command was spoken
    Quit,
    /// Zero-length read from the audio source, or stdin closed
    EndOfStream,
    /// The audio source failed to deliver a frame
    DeviceError,
}

/// What the process does once intake has stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    /// Exit 0 at once; queued feedback is not drained
    Immediate,
    /// Recorded or typed input ran out; exit 0
    Finished,
    /// The microphone stopped; no command can arrive any more, exit 1
    Failed,
}

impl CaptureExit {
    /// `replaying` is true for WAV and keyboard intake, whose input is
    /// expected to end. A live microphone is not.
    pub fn shutdown(self, replaying: bool) -> Shutdown {
        match self {
            CaptureExit::Quit => Shutdown::Immediate,
            CaptureExit::EndOfStream if replaying => Shutdown::Finished,
            CaptureExit::EndOfStream | CaptureExit::DeviceError => Shutdown::Failed,
        }
    }
}

/// Lowercase and trim; `None` for empty text
pub fn normalize(text: &str) -> Option<String> {
    let phrase = text.trim().to_lowercase();
    (!phrase.is_empty()).then_some(phrase)
}

pub struct CaptureWorker<S, R, A> {
    source: S,
    recognizer: R,
    router: CommandRouter<A>,
}

impl<S, R, A> CaptureWorker<S, R, A>
where
    S: FrameSource,
    R: Recognizer,
    A: ControlApi,
{
    pub fn new(source: S, recognizer: R, router: CommandRouter<A>) -> Self {
        Self {
            source,
            recognizer,
            router,
        }
    }

    pub fn router(&self) -> &CommandRouter<A> {
        &self.router
    }

    /// Pull frames until quit or the source ends
    pub fn run(&mut self) -> CaptureExit {
        info!("capture worker started");
        let mut frame = Vec::new();
        loop {
            let len = match self.source.read_frame(&mut frame) {
                Ok(len) => len,
                Err(e) => {
                    warn!("audio read failed: {:#}", e);
                    return CaptureExit::DeviceError;
                }
            };
            if len == 0 {
                return self.flush();
            }

            match self.recognizer.accept(&frame[..len]) {
                Ok(Some(text)) => {
                    if self.forward(&text) == Flow::Quit {
                        return CaptureExit::Quit;
                    }
                }
                Ok(None) => {}
                Err(e) => warn!("recognizer error: {:#}", e),
            }
        }
    }

    fn flush(&mut self) -> CaptureExit {
        debug!("audio source ended");
        match self.recognizer.finish() {
            Ok(Some(text)) => match self.forward(&text) {
                Flow::Quit => CaptureExit::Quit,
                Flow::Continue => CaptureExit::EndOfStream,
            },
            Ok(None) => CaptureExit::EndOfStream,
            Err(e) => {
                warn!("recognizer error: {:#}", e);
                CaptureExit::EndOfStream
            }
        }
    }

    fn forward(&mut self, text: &str) -> Flow {
        match normalize(text) {
            Some(phrase) => self.router.route(&phrase),
            None => Flow::Continue,
        }
    }
}

/// Keyboard intake: one phrase per line
pub fn run_typed<A: ControlApi>(router: &mut CommandRouter<A>, input: impl BufRead) -> CaptureExit {
    info!("keyboard intake started");
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("stdin read failed: {}", e);
                return CaptureExit::DeviceError;
            }
        };
        if let Some(phrase) = normalize(&line) {
            if router.route(&phrase) == Flow::Quit {
                return CaptureExit::Quit;
            }
        }
    }
    CaptureExit::EndOfStream
}
