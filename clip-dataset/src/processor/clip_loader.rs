//! The per-clip loading pipeline.

use super::{spatial_sampling, temporal_sampling, FrameStore, SamplingSpec};
use crate::{
    common::*,
    dataset::{ClipRecord, ClipSample},
};

/// Loads a clip and samples it to a fixed shape.
///
/// A lookup decodes the frames of the clip, keeps `num_frames` of them,
/// scales pixels to `[0, 1]`, permutes to `[channels, frames, height,
/// width]` and applies spatial sampling. Nothing is cached between lookups.
#[derive(Debug, Clone)]
pub struct ClipLoader {
    frame_store: FrameStore,
    num_frames: usize,
    spec: SamplingSpec,
}

impl ClipLoader {
    /// Build a clip loader.
    ///
    /// * `frame_store` - Where frames are read from.
    /// * `num_frames` - The number of frames of every output clip.
    /// * `spec` - The spatial sampling parameters.
    pub fn new(frame_store: FrameStore, num_frames: usize, spec: SamplingSpec) -> Result<Self> {
        if num_frames == 0 {
            return Err(DatasetError::InvalidSamplingSpec(
                "num_frames must be positive".into(),
            ));
        }
        spec.validate()?;

        Ok(Self {
            frame_store,
            num_frames,
            spec,
        })
    }

    pub fn frame_store(&self) -> &FrameStore {
        &self.frame_store
    }

    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    pub fn spec(&self) -> &SamplingSpec {
        &self.spec
    }

    /// Load a clip with a freshly seeded random generator.
    pub fn load(&self, record: &ClipRecord) -> Result<ClipSample> {
        let mut rng = StdRng::from_entropy();
        self.load_with_rng(record, &mut rng)
    }

    pub fn load_with_rng<R>(&self, record: &ClipRecord, rng: &mut R) -> Result<ClipSample>
    where
        R: Rng,
    {
        tch::no_grad(|| -> Result<_> {
            let frames = self.frame_store.load_frames(record)?;
            let frames = temporal_sampling(
                &frames,
                record.frame_start,
                record.frame_end,
                self.num_frames,
            )?;
            let frames = frames.f_to_kind(Kind::Float)? / 255.0;
            let frames = frames.f_permute(&[1, 0, 2, 3])?;
            let frames = spatial_sampling(&frames, &self.spec, rng)?;

            debug!(
                "sampled clip '{}' [{}, {}] to shape {:?}",
                record.location.display(),
                record.frame_start,
                record.frame_end,
                frames.size()
            );

            Ok(ClipSample {
                frames,
                label: record.label,
            })
        })
    }
}
