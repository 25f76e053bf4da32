//! Sample types and audio buffer definitions

/// Type alias for audio samples (always f64 for maximum precision)
pub type Sample = f64;

/// Stereo sample pair
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    #[inline]
    pub const fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    #[inline]
    pub const fn mono(value: Sample) -> Self {
        Self {
            left: value,
            right: value,
        }
    }

    #[inline]
    pub fn to_mid_side(self) -> MidSideSample {
        MidSideSample {
            mid: (self.left + self.right) * 0.5,
            side: (self.left - self.right) * 0.5,
        }
    }
}

/// Mid/Side sample pair
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct MidSideSample {
    pub mid: Sample,
    pub side: Sample,
}

impl MidSideSample {
    #[inline]
    pub fn to_stereo(self) -> StereoSample {
        StereoSample {
            left: self.mid + self.side,
            right: self.mid - self.side,
        }
    }
}

/// Audio buffer trait for generic buffer operations
pub trait AudioBuffer {
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn clear(&mut self);
}

/// Planar multichannel buffer
///
/// Channels are stored as separate contiguous vectors of equal length.
/// Renderers address a sub-range with `start_sample`/`num_samples`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelBuffer {
    channels: Vec<Vec<Sample>>,
    num_samples: usize,
}

impl ChannelBuffer {
    pub fn new(num_channels: usize, num_samples: usize) -> Self {
        Self {
            channels: vec![vec![0.0; num_samples]; num_channels],
            num_samples,
        }
    }

    /// Build a buffer from per-channel sample vectors.
    ///
    /// Channels shorter than the longest one are zero-padded.
    pub fn from_channels(channels: Vec<Vec<Sample>>) -> Self {
        let num_samples = channels.iter().map(Vec::len).max().unwrap_or(0);
        let channels = channels
            .into_iter()
            .map(|mut c| {
                c.resize(num_samples, 0.0);
                c
            })
            .collect();

        Self {
            channels,
            num_samples,
        }
    }

    /// Stereo buffer with the same signal on both channels
    pub fn dual_mono(samples: &[Sample]) -> Self {
        Self::from_channels(vec![samples.to_vec(), samples.to_vec()])
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    #[inline]
    pub fn channel(&self, index: usize) -> &[Sample] {
        &self.channels[index]
    }

    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [Sample] {
        &mut self.channels[index]
    }

    /// Mutable view of `num_samples` samples of one channel starting at `start`
    #[inline]
    pub fn range_mut(&mut self, index: usize, start: usize, num_samples: usize) -> &mut [Sample] {
        &mut self.channels[index][start..start + num_samples]
    }

    #[inline]
    pub fn range(&self, index: usize, start: usize, num_samples: usize) -> &[Sample] {
        &self.channels[index][start..start + num_samples]
    }

    #[inline]
    pub fn get_sample(&self, channel: usize, index: usize) -> Sample {
        self.channels[channel][index]
    }

    #[inline]
    pub fn set_sample(&mut self, channel: usize, index: usize, value: Sample) {
        self.channels[channel][index] = value;
    }

    /// Clamp a `(start, num)` range to the buffer length
    #[inline]
    pub fn clamp_range(&self, start: usize, num_samples: usize) -> (usize, usize) {
        let start = start.min(self.num_samples);
        let num = num_samples.min(self.num_samples - start);
        (start, num)
    }

    pub fn iter_channels(&self) -> impl Iterator<Item = &[Sample]> {
        self.channels.iter().map(Vec::as_slice)
    }
}

impl AudioBuffer for ChannelBuffer {
    fn len(&self) -> usize {
        self.num_samples
    }

    fn clear(&mut self) {
        for channel in &mut self.channels {
            channel.fill(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_channels_pads_short_channels() {
        let buffer = ChannelBuffer::from_channels(vec![vec![1.0, 2.0, 3.0], vec![4.0]]);
        assert_eq!(buffer.num_channels(), 2);
        assert_eq!(buffer.num_samples(), 3);
        assert_eq!(buffer.channel(1), &[4.0, 0.0, 0.0]);
    }

    #[test]
    fn test_clamp_range() {
        let buffer = ChannelBuffer::new(2, 100);
        assert_eq!(buffer.clamp_range(90, 64), (90, 10));
        assert_eq!(buffer.clamp_range(200, 10), (100, 0));
    }

    #[test]
    fn test_mid_side_roundtrip() {
        let s = StereoSample::new(0.75, -0.25);
        assert_eq!(s.to_mid_side().to_stereo(), s);
    }

    #[test]
    fn test_clear() {
        let mut buffer = ChannelBuffer::dual_mono(&[1.0, 1.0]);
        buffer.clear();
        assert!(buffer.iter_channels().all(|c| c.iter().all(|&x| x == 0.0)));
    }
}
