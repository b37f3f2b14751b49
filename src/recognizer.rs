use crate::config::RecognizerConfig;
#[cfg(feature = "vosk")]
use crate::error::ConfigError;

/// Streaming speech recognizer. Frames are 16-bit mono PCM at the
/// configured sample rate.
pub trait Recognizer {
    /// Feed one frame; returns the finalized text when an utterance ends
    fn accept(&mut self, frame: &[i16]) -> anyhow::Result<Option<String>>;

    /// Flush whatever utterance is still pending at end of input
    fn finish(&mut self) -> anyhow::Result<Option<String>> {
        Ok(None)
    }
}

impl<R: Recognizer + ?Sized> Recognizer for Box<R> {
    fn accept(&mut self, frame: &[i16]) -> anyhow::Result<Option<String>> {
        (**self).accept(frame)
    }

    fn finish(&mut self) -> anyhow::Result<Option<String>> {
        (**self).finish()
    }
}

#[cfg(feature = "vosk")]
pub use vosk_engine::VoskRecognizer;

/// Build the recognizer. Call on the thread that will feed it.
#[cfg(feature = "vosk")]
pub fn create_recognizer(
    config: &RecognizerConfig,
    sample_rate: u32,
) -> anyhow::Result<Box<dyn Recognizer>> {
    Ok(Box::new(VoskRecognizer::new(config, sample_rate)?))
}

/// Startup check for voice intake, cheap enough for the main thread.
/// Loading the model itself waits for the capture thread.
#[cfg(feature = "vosk")]
pub fn check_model(config: &RecognizerConfig) -> anyhow::Result<()> {
    let path = &config.model_path;
    if !path.is_dir() {
        println!("{}", vosk_engine::MODEL_HINT);
        return Err(ConfigError::Read {
            path: path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "model directory not found"),
        }
        .into());
    }
    Ok(())
}

#[cfg(not(feature = "vosk"))]
pub fn check_model(_config: &RecognizerConfig) -> anyhow::Result<()> {
    anyhow::bail!(NO_ENGINE)
}

#[cfg(not(feature = "vosk"))]
const NO_ENGINE: &str = "built without a speech recognizer; rebuild with --features vosk or run with --typed";

#[cfg(not(feature = "vosk"))]
pub fn create_recognizer(
    _config: &RecognizerConfig,
    _sample_rate: u32,
) -> anyhow::Result<Box<dyn Recognizer>> {
    anyhow::bail!(NO_ENGINE)
}

#[cfg(feature = "vosk")]
mod vosk_engine {
    use anyhow::Context;
    use vosk::{DecodingState, LogLevel, Model};

    use super::Recognizer;
    use crate::config::RecognizerConfig;

    pub(super) const MODEL_HINT: &str = "Please download a model from https://alphacephei.com/vosk/models and unpack it as 'model' (directory) in the current folder.";

    pub struct VoskRecognizer {
        // Kept alive for the recognizer's lifetime
        _model: Model,
        recognizer: vosk::Recognizer,
    }

    impl VoskRecognizer {
        pub fn new(config: &RecognizerConfig, sample_rate: u32) -> anyhow::Result<Self> {
            super::check_model(config)?;
            let path = &config.model_path;

            vosk::set_log_level(LogLevel::Error);
            let model_path = path.to_str().context("model path is not valid UTF-8")?;
            let model = Model::new(model_path)
                .with_context(|| format!("failed to load model from {}", path.display()))?;
            let recognizer = vosk::Recognizer::new(&model, sample_rate as f32)
                .context("failed to create recognizer")?;

            Ok(Self {
                _model: model,
                recognizer,
            })
        }
    }

    impl Recognizer for VoskRecognizer {
        fn accept(&mut self, frame: &[i16]) -> anyhow::Result<Option<String>> {
            let state = self
                .recognizer
                .accept_waveform(frame)
                .map_err(|e| anyhow::anyhow!("recognizer rejected frame: {:?}", e))?;
            if !matches!(state, DecodingState::Finalized) {
                return Ok(None);
            }
            Ok(self.recognizer.result().single().map(|r| r.text.to_string()))
        }

        fn finish(&mut self) -> anyhow::Result<Option<String>> {
            Ok(self
                .recognizer
                .final_result()
                .single()
                .map(|r| r.text.to_string()))
        }
    }
}
