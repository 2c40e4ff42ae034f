//! [`StreamerConfig`]: immutable buffering/channel parameters for a session.

use derive_more::Display;

use crate::audio::{bytes_per_ms, AudioConfig};

/// Reasons [`StreamerConfigBuilder::build`] can reject a configuration.
///
/// These surface synchronously at streamer construction, per the
/// "Configuration error" kind in the error handling design.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum ConfigError {
    /// `input_channel_size` or `output_channel_size` was `0`.
    #[display(fmt = "channel size must be >= 1")]
    ZeroChannelSize,
    /// `output_frame_size` resolved to `0`.
    #[display(fmt = "output_frame_size must be >= 1")]
    ZeroOutputFrameSize,
    /// `output_buffer_threshold` was non-zero but smaller than
    /// `output_frame_size`.
    #[display(fmt = "output_buffer_threshold must be 0 or >= output_frame_size")]
    ThresholdBelowFrameSize,
}

impl std::error::Error for ConfigError {}

/// Buffering and channel-capacity parameters for one [`BaseStreamer`].
///
/// Built once via [`StreamerConfig::builder`] and never mutated afterwards.
///
/// [`BaseStreamer`]: https://docs.rs/callbridge-core
#[derive(Clone, Copy, Debug)]
pub struct StreamerConfig {
    input_channel_size: usize,
    output_channel_size: usize,
    input_buffer_threshold: usize,
    output_frame_size: usize,
    output_buffer_threshold: usize,
}

impl StreamerConfig {
    /// Capacity of the bounded input channel.
    #[must_use]
    pub fn input_channel_size(&self) -> usize {
        self.input_channel_size
    }

    /// Capacity of the bounded output channel.
    #[must_use]
    pub fn output_channel_size(&self) -> usize {
        self.output_channel_size
    }

    /// Bytes of input audio that must accumulate before a message is
    /// emitted upstream.
    #[must_use]
    pub fn input_buffer_threshold(&self) -> usize {
        self.input_buffer_threshold
    }

    /// Bytes per emitted output frame.
    #[must_use]
    pub fn output_frame_size(&self) -> usize {
        self.output_frame_size
    }

    /// Bytes of output audio that must accumulate before frame slicing
    /// runs. Zero means "emit immediately".
    #[must_use]
    pub fn output_buffer_threshold(&self) -> usize {
        self.output_buffer_threshold
    }

    /// Starts building a [`StreamerConfig`].
    #[must_use]
    pub fn builder() -> StreamerConfigBuilder {
        StreamerConfigBuilder::default()
    }
}

/// Builder for [`StreamerConfig`], applying the derivation rules from an
/// optional [`AudioConfig`] pair before explicit overrides win.
#[derive(Clone, Copy, Debug, Default)]
pub struct StreamerConfigBuilder {
    input_channel_size: Option<usize>,
    output_channel_size: Option<usize>,
    input_buffer_threshold: Option<usize>,
    output_frame_size: Option<usize>,
    output_buffer_threshold: Option<usize>,
    input_audio_config: Option<AudioConfig>,
    output_audio_config: Option<AudioConfig>,
}

impl StreamerConfigBuilder {
    /// Sets the input channel capacity. Must be >= 1.
    #[must_use]
    pub fn input_channel_size(mut self, size: usize) -> Self {
        self.input_channel_size = Some(size);
        self
    }

    /// Sets the output channel capacity. Must be >= 1.
    #[must_use]
    pub fn output_channel_size(mut self, size: usize) -> Self {
        self.output_channel_size = Some(size);
        self
    }

    /// Overrides the derived input buffer threshold.
    #[must_use]
    pub fn input_buffer_threshold(mut self, bytes: usize) -> Self {
        self.input_buffer_threshold = Some(bytes);
        self
    }

    /// Overrides the derived output frame size. Must be >= 1.
    #[must_use]
    pub fn output_frame_size(mut self, bytes: usize) -> Self {
        self.output_frame_size = Some(bytes);
        self
    }

    /// Overrides the derived output buffer threshold.
    #[must_use]
    pub fn output_buffer_threshold(mut self, bytes: usize) -> Self {
        self.output_buffer_threshold = Some(bytes);
        self
    }

    /// Sets the native input audio config used to derive thresholds.
    #[must_use]
    pub fn input_audio_config(mut self, cfg: AudioConfig) -> Self {
        self.input_audio_config = Some(cfg);
        self
    }

    /// Sets the native output audio config used to derive thresholds.
    #[must_use]
    pub fn output_audio_config(mut self, cfg: AudioConfig) -> Self {
        self.output_audio_config = Some(cfg);
        self
    }

    /// Finalizes the config, deriving thresholds from the audio configs
    /// where no explicit value was given.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a channel size is `0`, the resolved
    /// `output_frame_size` is `0`, or `output_buffer_threshold` is
    /// non-zero and smaller than `output_frame_size`.
    pub fn build(self) -> Result<StreamerConfig, ConfigError> {
        let input_ms_rate = bytes_per_ms(self.input_audio_config.as_ref());
        let output_ms_rate = bytes_per_ms(self.output_audio_config.as_ref());

        let input_buffer_threshold = self
            .input_buffer_threshold
            .unwrap_or_else(|| (input_ms_rate * 60) as usize);
        let output_frame_size = self
            .output_frame_size
            .unwrap_or_else(|| (output_ms_rate * 20) as usize);
        let output_buffer_threshold = self
            .output_buffer_threshold
            .unwrap_or(output_frame_size);

        let input_channel_size = self.input_channel_size.unwrap_or(500);
        let output_channel_size = self.output_channel_size.unwrap_or(1500);

        if input_channel_size == 0 || output_channel_size == 0 {
            return Err(ConfigError::ZeroChannelSize);
        }
        if output_frame_size == 0 {
            return Err(ConfigError::ZeroOutputFrameSize);
        }
        if output_buffer_threshold != 0 && output_buffer_threshold < output_frame_size {
            return Err(ConfigError::ThresholdBelowFrameSize);
        }

        Ok(StreamerConfig {
            input_channel_size,
            output_channel_size,
            input_buffer_threshold,
            output_frame_size,
            output_buffer_threshold,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioFormat;

    #[test]
    fn derives_thresholds_from_audio_config() {
        let cfg = StreamerConfig::builder()
            .input_audio_config(AudioConfig {
                sample_rate_hz: 8000,
                format: AudioFormat::Mulaw8,
                channels: 1,
            })
            .output_audio_config(AudioConfig {
                sample_rate_hz: 8000,
                format: AudioFormat::Mulaw8,
                channels: 1,
            })
            .build()
            .unwrap();

        assert_eq!(cfg.input_buffer_threshold(), 480);
        assert_eq!(cfg.output_frame_size(), 160);
        assert_eq!(cfg.output_buffer_threshold(), 160);
    }

    #[test]
    fn explicit_values_override_derived_ones() {
        let cfg = StreamerConfig::builder()
            .input_audio_config(AudioConfig {
                sample_rate_hz: 8000,
                format: AudioFormat::Mulaw8,
                channels: 1,
            })
            .input_buffer_threshold(999)
            .output_frame_size(160)
            .output_buffer_threshold(480)
            .build()
            .unwrap();

        assert_eq!(cfg.input_buffer_threshold(), 999);
        assert_eq!(cfg.output_frame_size(), 160);
        assert_eq!(cfg.output_buffer_threshold(), 480);
    }

    #[test]
    fn zero_output_threshold_means_emit_immediately() {
        let cfg = StreamerConfig::builder()
            .output_frame_size(160)
            .output_buffer_threshold(0)
            .build()
            .unwrap();
        assert_eq!(cfg.output_buffer_threshold(), 0);
    }

    #[test]
    fn rejects_zero_frame_size() {
        let err = StreamerConfig::builder()
            .output_frame_size(0)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::ZeroOutputFrameSize);
    }
}
