use super::*;
use crate::common::*;

/// The number of fields of a manifest row.
pub const MANIFEST_FIELDS: usize = 5;

/// The length of the file name suffix attached to frame numbers, e.g. `.jpg`.
pub const FRAME_SUFFIX_LEN: usize = 4;

/// The list of clips of one dataset split.
///
/// The catalog is parsed once from a manifest and never changes afterwards.
#[derive(Debug, Clone)]
pub struct ClipCatalog {
    manifest: PathBuf,
    records: Vec<Arc<ClipRecord>>,
}

impl ClipCatalog {
    /// Parse a split manifest.
    ///
    /// Each row after the header carries `video_path, action_label,
    /// action_noun, frame_start, frame_end`. Frame bounds are frame file
    /// names such as `00010.jpg`. The clip location resolves to
    /// `data_root/split/video_path`.
    pub fn load(
        manifest: impl AsRef<Path>,
        data_root: impl AsRef<Path>,
        split: &str,
    ) -> Result<Self> {
        let manifest = manifest.as_ref();
        let split_dir = data_root.as_ref().join(split);

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(manifest)?;

        let records = reader
            .records()
            .map(|row| -> Result<_> {
                let row = row?;
                // the header occupies line 1
                let line = row
                    .position()
                    .map(|pos| pos.line() as usize)
                    .unwrap_or_default();
                let malformed = |reason: String| DatasetError::MalformedManifest {
                    path: manifest.to_owned(),
                    line,
                    reason,
                };

                if row.len() != MANIFEST_FIELDS {
                    return Err(malformed(format!(
                        "expect {} fields, but get {}",
                        MANIFEST_FIELDS,
                        row.len()
                    )));
                }

                let video_path = &row[0];
                let label: usize = row[1]
                    .parse()
                    .map_err(|_| malformed(format!("invalid action label '{}'", &row[1])))?;
                let noun = row[2].to_owned();
                let frame_start = parse_frame_number(&row[3]).ok_or_else(|| {
                    malformed(format!("invalid start frame '{}'", &row[3]))
                })?;
                let frame_end = parse_frame_number(&row[4])
                    .ok_or_else(|| malformed(format!("invalid end frame '{}'", &row[4])))?;

                if frame_start > frame_end {
                    return Err(malformed(format!(
                        "start frame {} is after end frame {}",
                        frame_start, frame_end
                    )));
                }

                let record = ClipRecord {
                    location: split_dir.join(video_path),
                    noun,
                    frame_start,
                    frame_end,
                    label,
                    split_index: 0,
                };
                Ok(Arc::new(record))
            })
            .collect::<Result<Vec<_>>>()?;

        if records.is_empty() {
            return Err(DatasetError::EmptyCatalog {
                path: manifest.to_owned(),
            });
        }

        info!(
            "loaded {} clips of split '{}' from '{}'",
            records.len(),
            split,
            manifest.display()
        );

        Ok(Self {
            manifest: manifest.to_owned(),
            records,
        })
    }

    pub fn manifest(&self) -> &Path {
        &self.manifest
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<ClipRecord>> {
        self.records.get(index)
    }

    pub fn records(&self) -> &[Arc<ClipRecord>] {
        &self.records
    }

    /// Count the clips per label.
    pub fn label_histogram(&self) -> BTreeMap<usize, usize> {
        self.records
            .iter()
            .map(|record| record.label)
            .counts()
            .into_iter()
            .collect()
    }

    /// Check that every label indexes into the vocabulary.
    pub fn validate_labels(&self, classes: &ClassVocabulary) -> Result<()> {
        match self
            .records
            .iter()
            .find(|record| record.label >= classes.len())
        {
            Some(record) => Err(DatasetError::LabelOutOfRange {
                label: record.label,
                num_classes: classes.len(),
            }),
            None => Ok(()),
        }
    }
}

/// Parse a frame file name like `00042.jpg` into its frame number.
pub fn parse_frame_number(field: &str) -> Option<usize> {
    let end = field.len().checked_sub(FRAME_SUFFIX_LEN)?;
    field.get(..end)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_manifest(dir: &Path, text: &str) -> PathBuf {
        let path = dir.join("train.csv");
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn parse_frame_numbers() {
        assert_eq!(parse_frame_number("00010.jpg"), Some(10));
        assert_eq!(parse_frame_number("12345.png"), Some(12345));
        assert_eq!(parse_frame_number(".jpg"), None);
        assert_eq!(parse_frame_number("abc"), None);
        assert_eq!(parse_frame_number("0x1f.jpg"), None);
    }

    #[test]
    fn load_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = write_manifest(
            dir.path(),
            "video_id,action_id,action_name,frame_start,frame_end\n\
             0001_1,3,take_bolt,00010.jpg,00019.jpg\n\
             0002_4,21,take_screw,00120.jpg,00120.jpg\n\
             0002_4,3,take_bolt,00200.jpg,00251.jpg\n",
        );

        let catalog = ClipCatalog::load(&manifest, "/data", "train").unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.manifest(), manifest.as_path());

        let first = catalog.get(0).unwrap();
        assert_eq!(first.location, Path::new("/data/train/0001_1"));
        assert_eq!(first.label, 3);
        assert_eq!(first.noun, "take_bolt");
        assert_eq!(first.frame_start, 10);
        assert_eq!(first.frame_end, 19);
        assert_eq!(first.num_frames(), 10);
        assert_eq!(first.split_index, 0);

        assert_eq!(catalog.get(1).unwrap().num_frames(), 1);
        assert!(catalog.get(3).is_none());

        let histogram = catalog.label_histogram();
        assert_eq!(histogram.get(&3), Some(&2));
        assert_eq!(histogram.get(&21), Some(&1));
    }

    #[test]
    fn malformed_row_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = write_manifest(
            dir.path(),
            "video_id,action_id,action_name,frame_start,frame_end\n\
             0001_1,3,take_bolt,00010.jpg,00019.jpg\n\
             0001_1,3,00010.jpg,00019.jpg\n",
        );

        match ClipCatalog::load(&manifest, "/data", "train").unwrap_err() {
            DatasetError::MalformedManifest { line, .. } => assert_eq!(line, 3),
            err => panic!("unexpected error {:?}", err),
        }
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        for row in [
            "0001_1,three,take_bolt,00010.jpg,00019.jpg",
            "0001_1,3,take_bolt,jpg,00019.jpg",
            "0001_1,3,take_bolt,00020.jpg,00019.jpg",
        ] {
            let manifest = write_manifest(
                dir.path(),
                &format!("video_id,action_id,action_name,frame_start,frame_end\n{}\n", row),
            );
            assert!(matches!(
                ClipCatalog::load(&manifest, "/data", "train"),
                Err(DatasetError::MalformedManifest { .. })
            ));
        }
    }

    #[test]
    fn header_only_manifest_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = write_manifest(
            dir.path(),
            "video_id,action_id,action_name,frame_start,frame_end\n",
        );
        assert!(matches!(
            ClipCatalog::load(&manifest, "/data", "train"),
            Err(DatasetError::EmptyCatalog { .. })
        ));
    }

    #[test]
    fn labels_are_checked_against_vocabulary() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = write_manifest(
            dir.path(),
            "video_id,action_id,action_name,frame_start,frame_end\n\
             0001_1,2,take_bolt,00010.jpg,00019.jpg\n",
        );
        let catalog = ClipCatalog::load(&manifest, "/data", "train").unwrap();

        let small = ClassVocabulary::new(["a", "b"]).unwrap();
        let large = ClassVocabulary::new(["a", "b", "c"]).unwrap();
        assert!(matches!(
            catalog.validate_labels(&small),
            Err(DatasetError::LabelOutOfRange {
                label: 2,
                num_classes: 2
            })
        ));
        assert!(catalog.validate_labels(&large).is_ok());
    }
}
