use crate::abi::{AudioBufferStatusFn, AudioCallback};
use crate::processor::AudioProcessor;

/// Fixed gain mapping `i16` samples to `[-1.0, 1.0)`.
pub const SAMPLE_GAIN: f32 = 1.0 / 32768.0;

pub struct AudioBridge {
    pub enabled: bool,
    processor: Box<dyn AudioProcessor>,
    scratch: Vec<f32>,
    sample_rate: f64,
    /// `SET_MINIMUM_AUDIO_LATENCY`, advisory only.
    pub minimum_latency_ms: u32,
    /// `SET_AUDIO_BUFFER_STATUS_CALLBACK`, advisory only.
    pub buffer_status: Option<AudioBufferStatusFn>,
    /// `SET_AUDIO_CALLBACK`: the core produces audio when the session asks for it.
    pub callback: Option<AudioCallback>,
}

impl AudioBridge {
    pub fn new(processor: Box<dyn AudioProcessor>) -> Self {
        Self {
            enabled: true,
            processor,
            scratch: Vec::new(),
            sample_rate: 0.0,
            minimum_latency_ms: 0,
            buffer_status: None,
            callback: None,
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// (Re)initialize the processor for a negotiated rate. Ignores non-positive rates.
    pub fn init(&mut self, sample_rate: f64) {
        if sample_rate <= 0.0 || sample_rate == self.sample_rate {
            return;
        }
        tracing::debug!(sample_rate, "audio sample rate negotiated");
        self.sample_rate = sample_rate;
        self.processor.init(sample_rate);
    }

    pub fn sample(&mut self, left: i16, right: i16) {
        if !self.enabled {
            return;
        }
        self.processor
            .process_sample(left as f32 * SAMPLE_GAIN, right as f32 * SAMPLE_GAIN);
    }

    /// Interleaved stereo samples. Returns the number of frames consumed, which is always
    /// all of them, muted or not.
    pub fn sample_batch(&mut self, samples: &[i16]) -> usize {
        let frames = samples.len() / 2;
        if !self.enabled || frames == 0 {
            return frames;
        }
        self.scratch.clear();
        self.scratch
            .extend(samples[..frames * 2].iter().map(|&s| s as f32 * SAMPLE_GAIN));
        self.processor.process_sample_batch(&self.scratch);
        frames
    }

    /// Shut the processor down. The next negotiated rate initializes it again, even if
    /// it matches the previous one.
    pub fn dispose(&mut self) {
        self.enabled = false;
        self.sample_rate = 0.0;
        self.minimum_latency_ms = 0;
        self.callback = None;
        self.buffer_status = None;
        self.processor.dispose();
    }
}
