use super::*;
use crate::{
    common::*,
    config::DataConfig,
    processor::{ClipLoader, CropPosition, FrameStore, SamplingSpec},
};

/// The dataset split and its sampling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Train,
    Val,
    Test,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Val => "val",
            Self::Test => "test",
        }
    }

    /// The spatial sampling parameters of the split.
    ///
    /// Training and validation clips use random jitter, crop and flip.
    /// Test clips are scaled and center cropped to the test crop size.
    pub fn sampling_spec(&self, config: &DataConfig) -> Result<SamplingSpec> {
        match self {
            Self::Train | Self::Val => {
                let (min_scale, max_scale) = config.train_jitter_scales;
                SamplingSpec::random(
                    min_scale.get() as i64,
                    max_scale.get() as i64,
                    config.train_crop_size.get() as i64,
                )
            }
            Self::Test => {
                SamplingSpec::uniform(CropPosition::Center, config.test_crop_size.get() as i64)
            }
        }
    }
}

impl FromStr for Mode {
    type Err = DatasetError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mode = match text {
            "train" => Self::Train,
            "val" => Self::Val,
            "test" => Self::Test,
            _ => return Err(DatasetError::UnsupportedMode(text.to_owned())),
        };
        Ok(mode)
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The MECCANO action recognition dataset.
#[derive(Debug, Clone)]
pub struct MeccanoDataset {
    mode: Mode,
    catalog: Arc<ClipCatalog>,
    loader: Arc<ClipLoader>,
    classes: Option<ClassVocabulary>,
}

impl MeccanoDataset {
    /// Build the dataset of a split from `<path_to_data_dir>/<mode>.csv`.
    pub fn new(config: &DataConfig, mode: Mode) -> Result<Self> {
        config.validate()?;

        let data_dir = &config.path_to_data_dir;
        let manifest = data_dir.join(format!("{}.csv", mode));
        if !manifest.is_file() {
            return Err(DatasetError::ManifestNotFound { path: manifest });
        }

        info!("constructing MECCANO {} split", mode);

        let catalog = ClipCatalog::load(&manifest, data_dir, mode.as_str())?;
        let classes = config
            .classes_file
            .as_ref()
            .map(ClassVocabulary::load)
            .transpose()?;
        let loader = ClipLoader::new(
            FrameStore::new(&config.frame_extension, config.retry.policy()),
            config.num_frames.get(),
            mode.sampling_spec(config)?,
        )?;

        Self::from_parts(mode, catalog, loader, classes)
    }

    /// Assemble a dataset from a parsed catalog and a clip loader.
    pub fn from_parts(
        mode: Mode,
        catalog: ClipCatalog,
        loader: ClipLoader,
        classes: Option<ClassVocabulary>,
    ) -> Result<Self> {
        if let Some(classes) = &classes {
            catalog.validate_labels(classes)?;
        }

        info!(
            "constructed MECCANO {} dataset with {} clips from '{}'",
            mode,
            catalog.len(),
            catalog.manifest().display()
        );

        Ok(Self {
            mode,
            catalog: Arc::new(catalog),
            loader: Arc::new(loader),
            classes,
        })
    }

    /// Build the training and validation datasets.
    pub fn train_val(config: &DataConfig) -> Result<(Self, Self)> {
        let train = Self::new(config, Mode::Train)?;
        let val = Self::new(config, Mode::Val)?;
        Ok((train, val))
    }

    /// Build the test dataset.
    pub fn test(config: &DataConfig) -> Result<Self> {
        Self::new(config, Mode::Test)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn catalog(&self) -> &ClipCatalog {
        &self.catalog
    }

    pub fn loader(&self) -> &ClipLoader {
        &self.loader
    }

    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }

    /// The labels of all clips in catalog order.
    pub fn labels(&self) -> Vec<usize> {
        self.catalog
            .records()
            .iter()
            .map(|record| record.label)
            .collect()
    }

    /// Load and sample the clip at `index`.
    pub fn get(&self, index: usize) -> Result<ClipSample> {
        let record = self.record(index)?;
        self.loader.load(record)
    }

    fn record(&self, index: usize) -> Result<&Arc<ClipRecord>> {
        self.catalog.get(index).ok_or(DatasetError::InvalidIndex {
            index,
            len: self.catalog.len(),
        })
    }
}

impl GenericDataset for MeccanoDataset {
    fn input_channels(&self) -> usize {
        3
    }

    fn classes(&self) -> Option<&ClassVocabulary> {
        self.classes.as_ref()
    }
}

impl RandomAccessDataset for MeccanoDataset {
    fn num_records(&self) -> usize {
        self.catalog.len()
    }

    fn nth(&self, index: usize) -> Pin<Box<dyn Future<Output = Result<ClipSample>> + Send>> {
        let record = self.record(index).map(Arc::clone);
        let loader = self.loader.clone();

        Box::pin(async move {
            let record = record?;

            // load in place when polled outside of a tokio runtime
            let sample = match tokio::runtime::Handle::try_current() {
                Ok(handle) => handle
                    .spawn_blocking(move || loader.load(&record))
                    .await
                    .map_err(|err| io::Error::new(io::ErrorKind::Other, err))??,
                Err(_) => loader.load(&record)?,
            };
            Ok(sample)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_modes() {
        assert_eq!("train".parse::<Mode>().unwrap(), Mode::Train);
        assert_eq!("val".parse::<Mode>().unwrap(), Mode::Val);
        assert_eq!("test".parse::<Mode>().unwrap(), Mode::Test);
        assert!(matches!(
            "eval".parse::<Mode>(),
            Err(DatasetError::UnsupportedMode(mode)) if mode == "eval"
        ));
        assert_eq!(Mode::Val.to_string(), "val");
    }

    #[test]
    fn sampling_spec_per_mode() {
        let mut config = DataConfig::new("/data");
        config.test_crop_size = NonZeroUsize::new(256).unwrap();

        let train = Mode::Train.sampling_spec(&config).unwrap();
        assert_eq!(train, SamplingSpec::random(256, 320, 224).unwrap());
        assert_eq!(Mode::Val.sampling_spec(&config).unwrap(), train);

        let test = Mode::Test.sampling_spec(&config).unwrap();
        assert_eq!(test, SamplingSpec::uniform(CropPosition::Center, 256).unwrap());
    }

    #[test]
    fn missing_manifest_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = DataConfig::new(dir.path());
        assert!(matches!(
            MeccanoDataset::new(&config, Mode::Test),
            Err(DatasetError::ManifestNotFound { .. })
        ));
    }
}
