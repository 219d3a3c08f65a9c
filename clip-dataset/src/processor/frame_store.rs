//! Frame file resolution and decoding.

use super::RetryPolicy;
use crate::{common::*, dataset::ClipRecord};

/// The number of digits of zero-padded frame file names.
pub const FRAME_NAME_DIGITS: usize = 5;

/// Resolves the frames of a clip to image files and decodes them.
#[derive(Debug, Clone)]
pub struct FrameStore {
    extension: String,
    retry: RetryPolicy,
}

impl FrameStore {
    /// Build a frame store.
    ///
    /// * `extension` - The frame file extension without the leading dot.
    /// * `retry` - The retry policy for transient read failures on frames
    ///   that exist.
    pub fn new(extension: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            extension: extension.into(),
            retry,
        }
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// The file path of frame `frame` in `dir`, e.g. `dir/00042.jpg`.
    pub fn frame_path(&self, dir: impl AsRef<Path>, frame: usize) -> PathBuf {
        dir.as_ref().join(format!(
            "{:0width$}.{}",
            frame,
            self.extension,
            width = FRAME_NAME_DIGITS
        ))
    }

    /// Decode a single frame into a `[3, height, width]` uint8 tensor.
    pub fn load_frame(&self, path: impl AsRef<Path>) -> Result<Tensor> {
        let path = path.as_ref();

        if !path.is_file() {
            return Err(DatasetError::FrameNotFound {
                path: path.to_owned(),
            });
        }

        let bytes = self
            .retry
            .run(|_| fs::read(path), is_transient_io_error)
            .map_err(|err| DatasetError::FrameRead {
                path: path.to_owned(),
                attempts: err.attempts,
                source: err.error,
            })?;
        let image =
            vision::image::load_from_memory(&bytes).map_err(|err| DatasetError::FrameDecode {
                path: path.to_owned(),
                attempts: 1,
                source: err,
            })?;

        match image.size().as_slice() {
            &[3, _, _] => Ok(image),
            shape => Err(DatasetError::InvalidFrame {
                path: path.to_owned(),
                reason: format!("expect an RGB image, but get shape {:?}", shape),
            }),
        }
    }

    /// Decode every frame of the clip in ascending frame order.
    ///
    /// The output is a `[num_frames, 3, height, width]` uint8 tensor, where
    /// `num_frames = frame_end - frame_start + 1`.
    pub fn load_frames(&self, record: &ClipRecord) -> Result<Tensor> {
        let ClipRecord {
            ref location,
            frame_start,
            frame_end,
            ..
        } = *record;

        let mut frames = Vec::with_capacity(frame_end.saturating_sub(frame_start) + 1);
        let mut expect_shape: Option<Vec<i64>> = None;

        for frame in frame_start..=frame_end {
            let path = self.frame_path(location, frame);
            let image = self.load_frame(&path)?;
            let shape = image.size();

            match &expect_shape {
                Some(expect) if *expect != shape => {
                    return Err(DatasetError::InvalidFrame {
                        path,
                        reason: format!(
                            "frame shape {:?} differs from the first frame shape {:?}",
                            shape, expect
                        ),
                    });
                }
                Some(_) => {}
                None => expect_shape = Some(shape),
            }

            frames.push(image);
        }

        debug!(
            "decoded {} frames from '{}'",
            frames.len(),
            location.display()
        );

        let frames = Tensor::f_stack(&frames, 0)?;
        Ok(frames)
    }
}

/// I/O errors that may succeed when the read is repeated.
pub fn is_transient_io_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
    )
}

impl Default for FrameStore {
    fn default() -> Self {
        Self::new("jpg", RetryPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_frame(dir: &Path, frame: usize, height: i64, width: i64) {
        let store = FrameStore::new("png", RetryPolicy::no_retry());
        let image = Tensor::full(
            &[3, height, width],
            frame as i64,
            (Kind::Uint8, Device::Cpu),
        );
        vision::image::save(&image, store.frame_path(dir, frame)).unwrap();
    }

    fn record(dir: &Path, frame_start: usize, frame_end: usize) -> ClipRecord {
        ClipRecord {
            location: dir.to_owned(),
            noun: "bolt".into(),
            frame_start,
            frame_end,
            label: 0,
            split_index: 0,
        }
    }

    #[test]
    fn frame_file_names_are_zero_padded() {
        let store = FrameStore::default();
        assert_eq!(
            store.frame_path("/data/train/0001", 42),
            Path::new("/data/train/0001/00042.jpg")
        );
        assert_eq!(
            store.frame_path("/data/train/0001", 123456),
            Path::new("/data/train/0001/123456.jpg")
        );
    }

    #[test]
    fn load_frames_in_order() {
        let dir = tempfile::tempdir().unwrap();
        (3..=6).for_each(|frame| write_frame(dir.path(), frame, 12, 16));

        let store = FrameStore::new("png", RetryPolicy::no_retry());
        let frames = store.load_frames(&record(dir.path(), 3, 6)).unwrap();
        assert_eq!(frames.size(), vec![4, 3, 12, 16]);
        assert_eq!(frames.kind(), Kind::Uint8);

        let firsts: Vec<i64> = (0..4)
            .map(|index| frames.int64_value(&[index, 0, 0, 0]))
            .collect();
        assert_eq!(firsts, vec![3, 4, 5, 6]);
    }

    #[test]
    fn missing_frame_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), 1, 8, 8);
        write_frame(dir.path(), 3, 8, 8);

        let store = FrameStore::new("png", RetryPolicy::new(3, Duration::ZERO, 1.0));
        let err = store.load_frames(&record(dir.path(), 1, 3)).unwrap_err();
        match err {
            DatasetError::FrameNotFound { path } => {
                assert_eq!(path, dir.path().join("00002.png"));
            }
            err => panic!("unexpected error {:?}", err),
        }
    }

    #[test]
    fn undecodable_frame_is_decoded_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = FrameStore::new("png", RetryPolicy::default());
        fs::write(store.frame_path(dir.path(), 0), b"not an image").unwrap();

        let err = store.load_frames(&record(dir.path(), 0, 0)).unwrap_err();
        assert!(matches!(err, DatasetError::FrameDecode { attempts: 1, .. }));
    }

    #[test]
    fn transient_read_errors_are_retried() {
        let policy = RetryPolicy::new(3, Duration::ZERO, 1.0);
        let mut calls = 0;

        let bytes = policy
            .run(
                |attempt| {
                    calls += 1;
                    if attempt < 2 {
                        Err(io::Error::new(io::ErrorKind::Interrupted, "interrupted"))
                    } else {
                        Ok(vec![0u8; 4])
                    }
                },
                is_transient_io_error,
            )
            .unwrap();
        assert_eq!(bytes.len(), 4);
        assert_eq!(calls, 3);

        let mut calls = 0;
        let err = policy
            .run(
                |_| -> io::Result<()> {
                    calls += 1;
                    Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
                },
                is_transient_io_error,
            )
            .unwrap_err();
        assert_eq!(err.attempts, 1);
        assert_eq!(calls, 1);
    }

    #[test]
    fn mixed_frame_sizes_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), 0, 8, 8);
        write_frame(dir.path(), 1, 8, 10);

        let store = FrameStore::new("png", RetryPolicy::no_retry());
        let err = store.load_frames(&record(dir.path(), 0, 1)).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidFrame { .. }));
    }
}
