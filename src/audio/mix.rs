//! Sample-level helpers for playback: rate conversion and channel fan-out.

/// Linear-interpolation resampler for mono f32 audio.
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }
    let ratio = f64::from(from_rate) / f64::from(to_rate);
    let out_len = ((samples.len() as f64) / ratio).round().max(1.0) as usize;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let src = i as f64 * ratio;
            let idx = (src.floor() as usize).min(last);
            let next = (idx + 1).min(last);
            let frac = (src - idx as f64) as f32;
            samples[idx] + (samples[next] - samples[idx]) * frac
        })
        .collect()
}

/// Write mono `source` into an interleaved buffer, copying each sample to every
/// channel of its frame. Pads with silence past the end; returns true once the
/// source is exhausted.
pub fn fill_frames(data: &mut [f32], channels: usize, source: &[f32], position: &mut usize) -> bool {
    for frame in data.chunks_mut(channels.max(1)) {
        let sample = source.get(*position).copied().unwrap_or(0.0);
        frame.fill(sample);
        if *position < source.len() {
            *position += 1;
        }
    }
    *position >= source.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsampling_interpolates() {
        let out = resample_linear(&[0.0, 1.0], 24_000, 48_000);
        assert_eq!(out.len(), 4);
        assert_eq!(out[0], 0.0);
        assert!((out[1] - 0.5).abs() < 1e-6);
        assert_eq!(out[2], 1.0);
    }

    #[test]
    fn downsampling_shrinks() {
        let input: Vec<f32> = (0..480).map(|i| i as f32).collect();
        assert_eq!(resample_linear(&input, 48_000, 16_000).len(), 160);
        assert_eq!(resample_linear(&input, 44_100, 44_100), input);
    }

    #[test]
    fn stereo_frames_carry_the_same_sample() {
        let source = [0.25, -0.5];
        let mut pos = 0;
        let mut data = [9.0f32; 6];
        let done = fill_frames(&mut data, 2, &source, &mut pos);
        assert_eq!(data, [0.25, 0.25, -0.5, -0.5, 0.0, 0.0]);
        assert!(done);
        assert_eq!(pos, 2);
    }

    #[test]
    fn partial_fill_is_not_finished() {
        let source = [0.1, 0.2, 0.3];
        let mut pos = 0;
        let mut data = [0.0f32; 2];
        assert!(!fill_frames(&mut data, 1, &source, &mut pos));
        assert_eq!(data, [0.1, 0.2]);
        assert_eq!(pos, 2);
    }
}
