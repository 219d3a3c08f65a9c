use crate::common::*;

/// One labeled clip of the manifest, without frame pixels.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClipRecord {
    /// The directory holding the frame files of the video.
    pub location: PathBuf,
    /// The action noun column of the manifest.
    pub noun: String,
    /// The first frame number, inclusive.
    pub frame_start: usize,
    /// The last frame number, inclusive.
    pub frame_end: usize,
    pub label: usize,
    /// The index of the clip within its video.
    pub split_index: usize,
}

impl ClipRecord {
    /// The number of frames in the clip, or zero for a record with
    /// `frame_start > frame_end`.
    pub fn num_frames(&self) -> usize {
        if self.frame_start > self.frame_end {
            0
        } else {
            self.frame_end - self.frame_start + 1
        }
    }
}

/// The sampled clip with its label.
#[derive(Debug, TensorLike)]
pub struct ClipSample {
    /// A `[channels, frames, height, width]` float tensor in `[0, 1]`.
    pub frames: Tensor,
    #[tensor_like(clone)]
    pub label: usize,
}
