use cpal::Stream;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use flume::{Receiver, Sender};
use rubato::{FftFixedIn, Resampler};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{info, warn};

use crate::error::ConfigError;

const RESAMPLE_CHUNK: usize = 1024;

/// Source of fixed-size 16-bit mono frames
pub trait FrameSource {
    /// Replace `frame` with the next frame and return its length.
    /// 0 means the stream has ended.
    fn read_frame(&mut self, frame: &mut Vec<i16>) -> anyhow::Result<usize>;
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

struct FrameResampler {
    resampler: Option<FftFixedIn<f32>>,
    in_buf: Vec<f32>,
    pending: Vec<i16>,
    frame_samples: usize,
}

impl FrameResampler {
    fn new(in_hz: usize, out_hz: usize, frame_samples: usize) -> anyhow::Result<Self> {
        let resampler = if in_hz != out_hz {
            Some(FftFixedIn::<f32>::new(in_hz, out_hz, RESAMPLE_CHUNK, 1, 1)?)
        } else {
            None
        };
        Ok(Self {
            resampler,
            in_buf: Vec::with_capacity(RESAMPLE_CHUNK),
            pending: Vec::with_capacity(frame_samples),
            frame_samples,
        })
    }

    fn push(&mut self, src: &[f32], mut emit: impl FnMut(Vec<i16>)) {
        let Some(resampler) = self.resampler.as_mut() else {
            self.pending.extend(src.iter().copied().map(to_i16));
            self.emit_frames(&mut emit);
            return;
        };

        self.in_buf.extend_from_slice(src);

        while self.in_buf.len() >= RESAMPLE_CHUNK {
            let chunk: Vec<f32> = self.in_buf.drain(..RESAMPLE_CHUNK).collect();
            match resampler.process(&[&chunk], None) {
                Ok(out) => self.pending.extend(out[0].iter().copied().map(to_i16)),
                Err(e) => warn!("resampling failed, chunk dropped: {}", e),
            }
        }
        self.emit_frames(&mut emit);
    }

    fn emit_frames(&mut self, emit: &mut impl FnMut(Vec<i16>)) {
        while self.pending.len() >= self.frame_samples {
            let frame: Vec<i16> = self.pending.drain(..self.frame_samples).collect();
            emit(frame);
        }
    }
}

// ============================================================================
// Microphone
// ============================================================================

/// Default input device, downmixed and resampled to the target rate.
///
/// The cpal stream is not `Send`; open this on the thread that reads it.
pub struct MicSource {
    _stream: Stream,
    rx: Receiver<Vec<i16>>,
}

impl MicSource {
    pub fn open(sample_rate: u32, frame_samples: usize) -> anyhow::Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow::anyhow!("no input device"))?;
        let supported = device.default_input_config()?;
        let input_rate = u32::from(supported.sample_rate()) as usize;
        let channels = supported.channels() as usize;

        info!(
            "audio: {}Hz {}ch -> {}Hz mono, {} samples per frame",
            input_rate, channels, sample_rate, frame_samples
        );

        let mut resampler = FrameResampler::new(input_rate, sample_rate as usize, frame_samples)?;
        let (tx, rx) = flume::unbounded::<Vec<i16>>();
        let err_tx: Sender<Vec<i16>> = tx.clone();

        let stream = device.build_input_stream(
            &supported.config(),
            move |data: &[f32], _| {
                let mono: Vec<f32> = if channels == 1 {
                    data.to_vec()
                } else {
                    data.chunks(channels)
                        .map(|c| c.iter().sum::<f32>() / channels as f32)
                        .collect()
                };
                resampler.push(&mono, |frame| {
                    let _ = tx.send(frame);
                });
            },
            move |err| match err {
                cpal::StreamError::DeviceNotAvailable => {
                    warn!("input device disappeared");
                    // Empty frame reads as end of stream
                    let _ = err_tx.send(Vec::new());
                }
                err => warn!("input stream error: {}", err),
            },
            None,
        )?;

        stream.play()?;
        Ok(Self {
            _stream: stream,
            rx,
        })
    }
}

impl FrameSource for MicSource {
    fn read_frame(&mut self, frame: &mut Vec<i16>) -> anyhow::Result<usize> {
        match self.rx.recv() {
            Ok(next) => {
                *frame = next;
                Ok(frame.len())
            }
            Err(_) => Ok(0),
        }
    }
}

// ============================================================================
// Recorded WAV file
// ============================================================================

/// Replays a recording; must already be mono 16-bit PCM at the target rate
pub struct WavSource {
    reader: hound::WavReader<BufReader<File>>,
    frame_samples: usize,
}

impl WavSource {
    pub fn open(path: &Path, sample_rate: u32, frame_samples: usize) -> anyhow::Result<Self> {
        let reader = hound::WavReader::open(path)?;
        let spec = reader.spec();
        if spec.channels != 1
            || spec.bits_per_sample != 16
            || spec.sample_format != hound::SampleFormat::Int
            || spec.sample_rate != sample_rate
        {
            return Err(ConfigError::InvalidAudio(format!(
                "{} is {}ch {}-bit {:?} at {}Hz, expected mono 16-bit PCM at {}Hz",
                path.display(),
                spec.channels,
                spec.bits_per_sample,
                spec.sample_format,
                spec.sample_rate,
                sample_rate
            ))
            .into());
        }
        info!("replaying {} ({} samples)", path.display(), reader.len());
        Ok(Self {
            reader,
            frame_samples,
        })
    }
}

impl FrameSource for WavSource {
    fn read_frame(&mut self, frame: &mut Vec<i16>) -> anyhow::Result<usize> {
        frame.clear();
        for sample in self.reader.samples::<i16>().take(self.frame_samples) {
            frame.push(sample?);
        }
        Ok(frame.len())
    }
}
