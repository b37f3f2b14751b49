use rodio::source::{SineWave, Source};
use rodio::{OutputStream, OutputStreamBuilder, Sink};
use std::process::{Command, Stdio};
use std::time::Duration;

use crate::config::{FeedbackConfig, FeedbackEngine};

/// Speech-synthesis engine. `speak` returns once the audio has played.
pub trait Synthesizer {
    fn speak(&mut self, text: &str) -> anyhow::Result<()>;

    fn name(&self) -> &'static str;
}

/// Build the configured engine. Call on the thread that will use it,
/// audio output handles are not `Send` on every platform.
pub fn create_engine(config: &FeedbackConfig) -> anyhow::Result<Box<dyn Synthesizer>> {
    match config.engine {
        FeedbackEngine::Speech => Ok(Box::new(SpeechCommand::new(
            &config.program,
            config.args.clone(),
        ))),
        FeedbackEngine::Chime => Ok(Box::new(Chime::new()?)),
    }
}

// ============================================================================
// External speech program (say, espeak-ng, ...)
// ============================================================================

pub struct SpeechCommand {
    program: String,
    args: Vec<String>,
}

impl SpeechCommand {
    pub fn new(program: &str, args: Vec<String>) -> Self {
        Self {
            program: program.to_string(),
            args,
        }
    }
}

impl Synthesizer for SpeechCommand {
    fn speak(&mut self, text: &str) -> anyhow::Result<()> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;
        anyhow::ensure!(status.success(), "{} exited with {}", self.program, status);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "speech"
    }
}

// ============================================================================
// Chime - two short tones through the default output device
// ============================================================================

const CHIME_TONES: [f32; 2] = [660.0, 880.0];
const CHIME_TONE_MS: u64 = 120;
const CHIME_VOLUME: f32 = 0.2;

pub struct Chime {
    // Dropping the stream silences the sink
    _stream: OutputStream,
    sink: Sink,
}

impl Chime {
    pub fn new() -> anyhow::Result<Self> {
        let stream = OutputStreamBuilder::open_default_stream()?;
        let sink = Sink::connect_new(stream.mixer());
        Ok(Self {
            _stream: stream,
            sink,
        })
    }
}

impl Synthesizer for Chime {
    fn speak(&mut self, _text: &str) -> anyhow::Result<()> {
        for freq in CHIME_TONES {
            self.sink.append(
                SineWave::new(freq)
                    .take_duration(Duration::from_millis(CHIME_TONE_MS))
                    .amplify(CHIME_VOLUME),
            );
        }
        self.sink.sleep_until_end();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "chime"
    }
}
