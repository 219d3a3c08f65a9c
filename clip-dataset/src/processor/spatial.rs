//! Spatial scaling, cropping and flipping of frame sequences.
//!
//! Every function here works on the last two dimensions of the input, so a
//! single `[channels, height, width]` image, a `[frames, channels, height,
//! width]` sequence and a `[channels, frames, height, width]` clip are
//! handled alike.

use crate::common::*;

/// The fixed crop position used by uniform sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CropPosition {
    /// Top or left.
    Start,
    Center,
    /// Bottom or right.
    End,
}

/// Selects random or uniform spatial sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpatialIndex {
    Random,
    Uniform(CropPosition),
}

impl TryFrom<i64> for SpatialIndex {
    type Error = DatasetError;

    fn try_from(index: i64) -> Result<Self, Self::Error> {
        let spatial_index = match index {
            -1 => Self::Random,
            0 => Self::Uniform(CropPosition::Start),
            1 => Self::Uniform(CropPosition::Center),
            2 => Self::Uniform(CropPosition::End),
            _ => return Err(DatasetError::InvalidSpatialIndex(index)),
        };
        Ok(spatial_index)
    }
}

impl From<SpatialIndex> for i64 {
    fn from(index: SpatialIndex) -> Self {
        match index {
            SpatialIndex::Random => -1,
            SpatialIndex::Uniform(CropPosition::Start) => 0,
            SpatialIndex::Uniform(CropPosition::Center) => 1,
            SpatialIndex::Uniform(CropPosition::End) => 2,
        }
    }
}

/// The parameters of one spatial sampling pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplingSpec {
    pub spatial_index: SpatialIndex,
    pub min_scale: i64,
    pub max_scale: i64,
    pub crop_size: i64,
}

impl SamplingSpec {
    /// Random short side jitter in `[min_scale, max_scale]` followed by a
    /// random crop and a random horizontal flip.
    pub fn random(min_scale: i64, max_scale: i64, crop_size: i64) -> Result<Self> {
        let spec = Self {
            spatial_index: SpatialIndex::Random,
            min_scale,
            max_scale,
            crop_size,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Short side scaling to `size` followed by a crop at a fixed position.
    pub fn uniform(position: CropPosition, size: i64) -> Result<Self> {
        let spec = Self {
            spatial_index: SpatialIndex::Uniform(position),
            min_scale: size,
            max_scale: size,
            crop_size: size,
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<()> {
        let Self {
            spatial_index,
            min_scale,
            max_scale,
            crop_size,
        } = *self;

        if min_scale <= 0 || max_scale <= 0 || crop_size <= 0 {
            return Err(DatasetError::InvalidSamplingSpec(format!(
                "sizes must be positive, but get min_scale={}, max_scale={}, crop_size={}",
                min_scale, max_scale, crop_size
            )));
        }
        if min_scale > max_scale {
            return Err(DatasetError::InvalidSamplingSpec(format!(
                "min_scale {} exceeds max_scale {}",
                min_scale, max_scale
            )));
        }
        match spatial_index {
            SpatialIndex::Uniform(_) => {
                if !(min_scale == max_scale && max_scale == crop_size) {
                    return Err(DatasetError::InvalidSamplingSpec(format!(
                        "uniform sampling requires min_scale == max_scale == crop_size, \
                         but get {}, {}, {}",
                        min_scale, max_scale, crop_size
                    )));
                }
            }
            SpatialIndex::Random => {
                if crop_size > min_scale {
                    return Err(DatasetError::InvalidSamplingSpec(format!(
                        "crop_size {} exceeds min_scale {}",
                        crop_size, min_scale
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Scale, crop and flip the frames according to `spec`.
///
/// The output spatial size is always `crop_size x crop_size`. The uniform
/// path draws nothing from `rng` and is reproducible.
pub fn spatial_sampling<R>(frames: &Tensor, spec: &SamplingSpec, rng: &mut R) -> Result<Tensor>
where
    R: Rng,
{
    spec.validate()?;

    let SamplingSpec {
        spatial_index,
        min_scale,
        max_scale,
        crop_size,
    } = *spec;

    tch::no_grad(|| match spatial_index {
        SpatialIndex::Random => {
            let frames = random_short_side_scale_jitter(frames, min_scale, max_scale, rng)?;
            let frames = random_crop(&frames, crop_size, rng)?;
            horizontal_flip(0.5, &frames, rng)
        }
        SpatialIndex::Uniform(position) => {
            let frames = short_side_scale(frames, min_scale)?;
            uniform_crop(&frames, crop_size, position, None)
        }
    })
}

/// Rescale the frames so that the short side is a size drawn uniformly from
/// `[min_size, max_size]`.
pub fn random_short_side_scale_jitter<R>(
    images: &Tensor,
    min_size: i64,
    max_size: i64,
    rng: &mut R,
) -> Result<Tensor>
where
    R: Rng,
{
    if min_size <= 0 || min_size > max_size {
        return Err(DatasetError::InvalidSamplingSpec(format!(
            "invalid jitter range [{}, {}]",
            min_size, max_size
        )));
    }
    let size = rng.gen_range(min_size..=max_size);
    short_side_scale(images, size)
}

/// Rescale the frames with bilinear interpolation so that the short side
/// equals `size`, preserving the aspect ratio.
///
/// The frames are returned as is if the short side already equals `size`.
pub fn short_side_scale(images: &Tensor, size: i64) -> Result<Tensor> {
    let (height, width) = spatial_size(images)?;

    if (width <= height && width == size) || (height <= width && height == size) {
        return Ok(images.shallow_clone());
    }

    let (new_height, new_width) = if width < height {
        let new_height = (height as f64 / width as f64 * size as f64).floor() as i64;
        (new_height, size)
    } else {
        let new_width = (width as f64 / height as f64 * size as f64).floor() as i64;
        (size, new_width)
    };

    resize_bilinear(images, new_height, new_width)
}

/// Crop a `size x size` window at a uniformly random offset.
pub fn random_crop<R>(images: &Tensor, size: i64, rng: &mut R) -> Result<Tensor>
where
    R: Rng,
{
    let (height, width) = spatial_size(images)?;
    check_crop(size, height, width)?;

    if height == size && width == size {
        return Ok(images.shallow_clone());
    }

    let y_offset = if height > size {
        rng.gen_range(0..=(height - size))
    } else {
        0
    };
    let x_offset = if width > size {
        rng.gen_range(0..=(width - size))
    } else {
        0
    };

    crop(images, y_offset, x_offset, size)
}

/// Crop a `size x size` window at a fixed position.
///
/// The window is centered by default. On portrait frames `position` moves
/// it to the top, center or bottom, otherwise to the left, center or
/// right. If `scale_size` is set, the frames are first rescaled so that the
/// short side equals it.
pub fn uniform_crop(
    images: &Tensor,
    size: i64,
    position: CropPosition,
    scale_size: Option<i64>,
) -> Result<Tensor> {
    let scaled;
    let images = match scale_size {
        Some(scale_size) => {
            scaled = short_side_scale(images, scale_size)?;
            &scaled
        }
        None => images,
    };

    let (height, width) = spatial_size(images)?;
    check_crop(size, height, width)?;
    let (y_offset, x_offset) = uniform_crop_offsets(height, width, size, position);
    crop(images, y_offset, x_offset, size)
}

/// The `(y_offset, x_offset)` of a uniform crop.
pub fn uniform_crop_offsets(
    height: i64,
    width: i64,
    size: i64,
    position: CropPosition,
) -> (i64, i64) {
    let centered = |len: i64| (len - size + 1).div_euclid(2);
    let mut y_offset = centered(height);
    let mut x_offset = centered(width);

    if height > width {
        match position {
            CropPosition::Start => y_offset = 0,
            CropPosition::Center => {}
            CropPosition::End => y_offset = height - size,
        }
    } else {
        match position {
            CropPosition::Start => x_offset = 0,
            CropPosition::Center => {}
            CropPosition::End => x_offset = width - size,
        }
    }

    (y_offset, x_offset)
}

/// Mirror the frames along the width axis with probability `prob`.
pub fn horizontal_flip<R>(prob: f64, images: &Tensor, rng: &mut R) -> Result<Tensor>
where
    R: Rng,
{
    let ndim = images.dim() as i64;
    if ndim < 3 {
        return Err(DatasetError::InvalidSamplingSpec(format!(
            "expect at least 3 dimensions, but get {}",
            ndim
        )));
    }

    if rng.gen::<f64>() < prob {
        Ok(images.f_flip(&[ndim - 1])?)
    } else {
        Ok(images.shallow_clone())
    }
}

fn spatial_size(images: &Tensor) -> Result<(i64, i64)> {
    match images.size().as_slice() {
        &[.., height, width] if images.dim() >= 3 => Ok((height, width)),
        shape => Err(DatasetError::InvalidSamplingSpec(format!(
            "expect at least 3 dimensions, but get shape {:?}",
            shape
        ))),
    }
}

fn check_crop(size: i64, height: i64, width: i64) -> Result<()> {
    if size <= 0 || size > height || size > width {
        return Err(DatasetError::CropOutOfBounds {
            crop: size,
            height,
            width,
        });
    }
    Ok(())
}

fn crop(images: &Tensor, y_offset: i64, x_offset: i64, size: i64) -> Result<Tensor> {
    let ndim = images.dim() as i64;
    let cropped = images
        .f_narrow(ndim - 2, y_offset, size)?
        .f_narrow(ndim - 1, x_offset, size)?;
    Ok(cropped)
}

fn resize_bilinear(images: &Tensor, new_height: i64, new_width: i64) -> Result<Tensor> {
    let images = match images.kind() {
        Kind::Float | Kind::Double => images.shallow_clone(),
        _ => images.f_to_kind(Kind::Float)?,
    };

    // fold the leading dimensions into the batch dimension
    let shape = images.size();
    let (leading, spatial) = shape.split_at(shape.len() - 2);
    let batch: i64 = leading.iter().product();
    let new_shape: Vec<i64> = leading
        .iter()
        .cloned()
        .chain([new_height, new_width])
        .collect();

    let resized = images
        .f_reshape(&[batch, 1, spatial[0], spatial[1]])?
        .f_upsample_bilinear2d(&[new_height, new_width], false, None::<f64>, None::<f64>)?
        .f_reshape(&new_shape)?;

    Ok(resized)
}
