//! Per-channel pixel statistics of a frame dataset.

use crate::common::*;

/// The dataset splits scanned for frames.
pub const SPLITS: [&str; 3] = ["train", "test", "val"];

/// Only every n-th row and column of a frame is sampled.
pub const PIXEL_STRIDE: usize = 10;

/// Per-channel mean and population standard deviation of pixel values in
/// `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub mean: [f64; 3],
    pub std: [f64; 3],
    pub num_images: usize,
    pub num_skipped: usize,
}

impl ChannelStats {
    /// Render the statistics as `Mean: [..]` and `Std: [..]` lines.
    pub fn to_report(&self) -> String {
        format!("Mean: {:?}\nStd: {:?}\n", self.mean, self.std)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_report())?;
        Ok(())
    }
}

/// List the frame files under `<root>/{train,test,val}/<video>/`.
pub fn collect_frame_files(root: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let root = root.as_ref();
    let root_str = root.to_str().ok_or_else(|| {
        DatasetError::InvalidConfig(format!("non UTF-8 path '{}'", root.display()))
    })?;
    let root_pattern = glob::Pattern::escape(root_str);

    let mut files = vec![];

    for split in SPLITS {
        let split_dir = root.join(split);
        if !split_dir.is_dir() {
            continue;
        }

        let pattern = format!("{}/{}/*/*", root_pattern, split);
        let paths = glob::glob(&pattern)
            .map_err(|err| DatasetError::InvalidConfig(err.to_string()))?;

        for path in paths {
            let path = path.map_err(glob::GlobError::into_error)?;
            if path.is_file() {
                files.push(path);
            }
        }
    }

    Ok(files)
}

/// Compute channel statistics over every frame under the dataset root.
pub fn dataset_channel_stats(root: impl AsRef<Path>) -> Result<ChannelStats> {
    let root = root.as_ref();
    let files = collect_frame_files(root)?;
    info!("found {} images under '{}'", files.len(), root.display());

    if files.is_empty() {
        return Err(DatasetError::NoFrames {
            path: root.to_owned(),
        });
    }

    let stats = channel_stats(&files)?;
    if stats.num_images == 0 {
        return Err(DatasetError::NoFrames {
            path: root.to_owned(),
        });
    }
    Ok(stats)
}

/// Compute channel statistics over a list of image files.
///
/// Files that fail to decode are logged and skipped.
pub fn channel_stats<P>(files: &[P]) -> Result<ChannelStats>
where
    P: AsRef<Path>,
{
    let mut acc = Accumulator::default();
    let mut num_images = 0;
    let mut num_skipped = 0;

    for (index, file) in files.iter().enumerate() {
        let file = file.as_ref();

        let result = vision::image::load(file)
            .map_err(DatasetError::from)
            .and_then(|image| acc.add_image(file, &image));

        match result {
            Ok(()) => num_images += 1,
            Err(err) => {
                warn!("unable to process '{}': {}", file.display(), err);
                num_skipped += 1;
            }
        }

        if (index + 1) % 1000 == 0 {
            info!("processed {}/{} images", index + 1, files.len());
        }
    }

    let (mean, std) = acc.finish();

    Ok(ChannelStats {
        mean,
        std,
        num_images,
        num_skipped,
    })
}

#[derive(Debug, Default)]
struct Accumulator {
    sum: [f64; 3],
    sum_sq: [f64; 3],
    count: usize,
}

impl Accumulator {
    /// Accumulate a `[channels, height, width]` image.
    fn add_image(&mut self, path: &Path, image: &Tensor) -> Result<()> {
        let (height, width) = match image.size().as_slice() {
            &[3, height, width] => (height as usize, width as usize),
            shape => {
                return Err(DatasetError::InvalidFrame {
                    path: path.to_owned(),
                    reason: format!("expect an RGB image, but get shape {:?}", shape),
                })
            }
        };

        let pixels = Vec::<u8>::from(&image.to_kind(Kind::Uint8).contiguous());
        let plane = height * width;

        for y in (0..height).step_by(PIXEL_STRIDE) {
            for x in (0..width).step_by(PIXEL_STRIDE) {
                for c in 0..3 {
                    let value = pixels[c * plane + y * width + x] as f64 / 255.0;
                    self.sum[c] += value;
                    self.sum_sq[c] += value * value;
                }
                self.count += 1;
            }
        }

        Ok(())
    }

    fn finish(&self) -> ([f64; 3], [f64; 3]) {
        if self.count == 0 {
            return ([0.0; 3], [0.0; 3]);
        }

        let count = self.count as f64;
        let mut mean = [0.0; 3];
        let mut std = [0.0; 3];

        for c in 0..3 {
            mean[c] = self.sum[c] / count;
            std[c] = (self.sum_sq[c] / count - mean[c] * mean[c]).max(0.0).sqrt();
        }

        (mean, std)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn save_image(path: &Path, rgb: [i64; 3], height: i64, width: i64) {
        let image = Tensor::of_slice(&rgb)
            .view([3, 1, 1])
            .expand(&[3, height, width], false)
            .to_kind(Kind::Uint8)
            .contiguous();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        vision::image::save(&image, path).unwrap();
    }

    #[test]
    fn stats_of_uniform_frames() {
        let dir = tempfile::tempdir().unwrap();
        save_image(&dir.path().join("train/0001/00000.png"), [0, 51, 255], 20, 20);
        save_image(&dir.path().join("val/0002/00000.png"), [255, 51, 255], 20, 20);
        fs::write(dir.path().join("train/0001/broken.png"), b"oops").unwrap();
        fs::write(dir.path().join("train.csv"), b"not a frame").unwrap();

        let files = collect_frame_files(dir.path()).unwrap();
        assert_eq!(files.len(), 3);

        let stats = dataset_channel_stats(dir.path()).unwrap();
        assert_eq!(stats.num_images, 2);
        assert_eq!(stats.num_skipped, 1);
        assert_abs_diff_eq!(stats.mean[0], 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(stats.mean[1], 0.2, epsilon = 1e-9);
        assert_abs_diff_eq!(stats.mean[2], 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(stats.std[0], 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(stats.std[1], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(stats.std[2], 0.0, epsilon = 1e-6);

        let report = stats.to_report();
        assert!(report.starts_with("Mean: ["));
        assert!(report.contains("\nStd: ["));
    }

    #[test]
    fn empty_root_has_no_frames() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            dataset_channel_stats(dir.path()),
            Err(DatasetError::NoFrames { .. })
        ));
    }
}
