//! Fixed-length temporal sampling of clips.

use crate::common::*;

/// Compute the frame offsets selected from a clip spanning frames
/// `start..=end`.
///
/// `num_samples` positions are spread evenly over `[start, end]` with both
/// ends included, clamped to `[0, end]`, truncated, and shifted by `start`
/// so that they index the decoded frame sequence of the clip. Frames are
/// repeated when the clip is shorter than `num_samples`.
pub fn temporal_indices(start: usize, end: usize, num_samples: usize) -> Result<Vec<i64>> {
    if num_samples == 0 {
        return Err(DatasetError::InvalidSamplingSpec(
            "num_samples must be positive".into(),
        ));
    }
    if start > end {
        return Err(DatasetError::InvalidSamplingSpec(format!(
            "start frame {} is after end frame {}",
            start, end
        )));
    }

    let start_f = start as f64;
    let end_f = end as f64;
    let step = if num_samples > 1 {
        (end_f - start_f) / (num_samples - 1) as f64
    } else {
        0.0
    };
    let half = num_samples / 2;

    let indices = (0..num_samples)
        .map(|index| {
            // fill the first half from the start and the rest from the end
            // so that both endpoints are exact
            let position = if index < half {
                start_f + step * index as f64
            } else {
                end_f - step * (num_samples - 1 - index) as f64
            };
            let position = position.clamp(0.0, end_f) as i64;
            position - start as i64
        })
        .collect();

    Ok(indices)
}

/// Select `num_samples` frames out of a decoded clip along the first
/// dimension.
///
/// * `frames` - The decoded frames of the clip with the frame axis first.
/// * `start` - The frame number of the first decoded frame.
/// * `end` - The frame number of the last decoded frame.
pub fn temporal_sampling(
    frames: &Tensor,
    start: usize,
    end: usize,
    num_samples: usize,
) -> Result<Tensor> {
    let indices = temporal_indices(start, end, num_samples)?;
    let num_frames = frames
        .size()
        .first()
        .cloned()
        .ok_or_else(|| DatasetError::InvalidSamplingSpec("frames must not be a scalar".into()))?;

    if let Some(&max_offset) = indices.iter().max() {
        if max_offset >= num_frames {
            return Err(DatasetError::InvalidSamplingSpec(format!(
                "clip holds {} frames, but offset {} is requested",
                num_frames, max_offset
            )));
        }
    }

    let indices = Tensor::of_slice(&indices).to_device(frames.device());
    let sampled = frames.f_index_select(0, &indices)?;
    Ok(sampled)
}
