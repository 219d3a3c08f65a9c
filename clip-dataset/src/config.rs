//! Dataset configuration format.

use crate::{common::*, processor::RetryPolicy};

/// The main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data: DataConfig,
}

impl Config {
    /// Load a JSON5 configuration file and validate it.
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let text = fs::read_to_string(path)?;
        let config: Self = json5::from_str(&text)?;
        config.data.validate()?;
        Ok(config)
    }
}

/// Clip loading options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    /// The dataset root holding `{train,val,test}.csv` and one frame
    /// directory per split.
    pub path_to_data_dir: PathBuf,
    /// The `[min, max]` range of the short side size for training jitter.
    pub train_jitter_scales: (NonZeroUsize, NonZeroUsize),
    pub train_crop_size: NonZeroUsize,
    pub test_crop_size: NonZeroUsize,
    /// The number of frames sampled from each clip.
    pub num_frames: NonZeroUsize,
    /// Optional class vocabulary file, one class name per line.
    #[serde(default)]
    pub classes_file: Option<PathBuf>,
    /// The file extension of frame images without the leading dot.
    #[serde(default = "default_frame_extension")]
    pub frame_extension: String,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl DataConfig {
    /// Create a configuration with default crop sizes and frame count.
    pub fn new(path_to_data_dir: impl Into<PathBuf>) -> Self {
        let size = |val: usize| NonZeroUsize::new(val).unwrap();

        Self {
            path_to_data_dir: path_to_data_dir.into(),
            train_jitter_scales: (size(256), size(320)),
            train_crop_size: size(224),
            test_crop_size: size(224),
            num_frames: size(16),
            classes_file: None,
            frame_extension: default_frame_extension(),
            retry: RetryConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let (min_scale, max_scale) = self.train_jitter_scales;

        if min_scale > max_scale {
            return Err(DatasetError::InvalidConfig(format!(
                "train_jitter_scales must be ordered, but get [{}, {}]",
                min_scale, max_scale
            )));
        }
        if self.train_crop_size > min_scale {
            return Err(DatasetError::InvalidConfig(format!(
                "train_crop_size {} exceeds the minimum jitter scale {}",
                self.train_crop_size, min_scale
            )));
        }
        if self.frame_extension.is_empty() || self.frame_extension.starts_with('.') {
            return Err(DatasetError::InvalidConfig(format!(
                "frame_extension must be a bare extension like 'jpg', but get '{}'",
                self.frame_extension
            )));
        }
        self.retry.validate()?;

        Ok(())
    }
}

/// Retry options for transient frame decoding failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    #[serde(default)]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.backoff_multiplier.is_finite() && self.backoff_multiplier >= 1.0) {
            return Err(DatasetError::InvalidConfig(format!(
                "backoff_multiplier must be at least 1.0, but get {}",
                self.backoff_multiplier
            )));
        }
        Ok(())
    }

    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.initial_backoff_ms),
            self.backoff_multiplier,
        )
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: 0,
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

fn default_frame_extension() -> String {
    "jpg".into()
}

fn default_max_retries() -> usize {
    10
}

fn default_backoff_multiplier() -> f64 {
    2.0
}
