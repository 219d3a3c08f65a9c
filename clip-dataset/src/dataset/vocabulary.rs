use crate::common::*;

/// The ordered list of class names. The position of a name is its label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassVocabulary {
    names: IndexSet<String>,
}

impl ClassVocabulary {
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = IndexSet::new();

        for name in names {
            let name = name.into();
            if !set.insert(name.clone()) {
                return Err(DatasetError::InvalidConfig(format!(
                    "duplicated class name '{}'",
                    name
                )));
            }
        }
        if set.is_empty() {
            return Err(DatasetError::InvalidConfig("no classes found".into()));
        }

        Ok(Self { names: set })
    }

    /// Load a class file with one name per line.
    ///
    /// Lines may carry an `N: ` prefix as written by [ClassVocabulary::to_lines],
    /// in which case `N` must match the line position. Blank lines are
    /// ignored.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;

        let names = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .enumerate()
            .map(|(position, line)| match line.split_once(": ") {
                Some((index, name)) if index.chars().all(|c| c.is_ascii_digit()) => {
                    let index: usize = index.parse().map_err(|_| {
                        DatasetError::InvalidConfig(format!("invalid class index '{}'", index))
                    })?;
                    if index != position {
                        return Err(DatasetError::InvalidConfig(format!(
                            "class '{}' is numbered {} but found at position {} in '{}'",
                            name,
                            index,
                            position,
                            path.display()
                        )));
                    }
                    Ok(name.to_owned())
                }
                _ => Ok(line.to_owned()),
            })
            .collect::<Result<Vec<_>>>()?;

        let classes = Self::new(names)?;
        info!(
            "loaded {} classes from '{}'",
            classes.len(),
            path.display()
        );
        Ok(classes)
    }

    /// Build the vocabulary from action annotation files with `action_id`
    /// and `action_name` columns, ordered by action id.
    ///
    /// Missing files are skipped with a warning. Later files override the
    /// names of ids seen in earlier files.
    pub fn from_action_csvs<I, P>(paths: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        #[derive(Deserialize)]
        struct ActionRow {
            action_id: usize,
            action_name: String,
        }

        let mut actions = BTreeMap::new();

        for path in paths {
            let path = path.as_ref();
            if !path.is_file() {
                warn!("'{}' not found, skipped", path.display());
                continue;
            }

            let mut reader = csv::ReaderBuilder::new()
                .has_headers(true)
                .from_path(path)?;
            for row in reader.deserialize() {
                let ActionRow {
                    action_id,
                    action_name,
                } = row?;
                actions.insert(action_id, action_name);
            }
        }

        let is_contiguous = actions.keys().cloned().eq(0..actions.len());
        if !is_contiguous {
            warn!("action ids are not contiguous, labels will not match action ids");
        }

        Self::new(actions.into_values())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, label: usize) -> Option<&str> {
        self.names.get_index(label).map(String::as_str)
    }

    pub fn label_of(&self, name: &str) -> Option<usize> {
        self.names.get_index_of(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Render the vocabulary as `N: name` lines.
    pub fn to_lines(&self) -> String {
        self.names
            .iter()
            .enumerate()
            .map(|(index, name)| format!("{}: {}\n", index, name))
            .collect()
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_lines())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reject_duplicates_and_empty() {
        assert!(ClassVocabulary::new(["take_bolt", "put_bolt", "take_bolt"]).is_err());
        assert!(ClassVocabulary::new(Vec::<String>::new()).is_err());
    }

    #[test]
    fn bundled_meccano_classes() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("assets/meccano-classes.txt");
        let classes = ClassVocabulary::load(path).unwrap();
        assert_eq!(classes.len(), 61);
        assert_eq!(classes.name(0), Some("check_booklet"));
        assert_eq!(classes.label_of("take_bolt"), Some(21));
        assert_eq!(classes.name(60), Some("unscrew_screw_with_screwdriver"));
    }

    #[test]
    fn load_plain_and_numbered_lines() {
        let dir = tempfile::tempdir().unwrap();

        let plain = dir.path().join("plain.txt");
        fs::write(&plain, "take_bolt\nput_bolt\n\ncheck_booklet\n").unwrap();
        let classes = ClassVocabulary::load(&plain).unwrap();
        assert_eq!(classes.len(), 3);
        assert_eq!(classes.name(2), Some("check_booklet"));
        assert_eq!(classes.label_of("put_bolt"), Some(1));

        let numbered = dir.path().join("numbered.txt");
        classes.write(&numbered).unwrap();
        assert_eq!(ClassVocabulary::load(&numbered).unwrap(), classes);

        let shuffled = dir.path().join("shuffled.txt");
        fs::write(&shuffled, "1: take_bolt\n0: put_bolt\n").unwrap();
        assert!(ClassVocabulary::load(&shuffled).is_err());
    }

    #[test]
    fn build_from_action_csvs() {
        let dir = tempfile::tempdir().unwrap();
        let train = dir.path().join("train.csv");
        let val = dir.path().join("val.csv");
        fs::write(
            &train,
            "video_id,action_id,action_name,frame_start,frame_end\n\
             0001,2,take_screw,00001.jpg,00010.jpg\n\
             0001,0,check_booklet,00011.jpg,00020.jpg\n",
        )
        .unwrap();
        fs::write(
            &val,
            "video_id,action_id,action_name,frame_start,frame_end\n\
             0002,1,browse_booklet,00001.jpg,00010.jpg\n\
             0002,2,take_screw,00011.jpg,00020.jpg\n",
        )
        .unwrap();

        let classes = ClassVocabulary::from_action_csvs([
            train,
            val,
            dir.path().join("missing.csv"),
        ])
        .unwrap();
        let names: Vec<_> = classes.names().collect();
        assert_eq!(names, vec!["check_booklet", "browse_booklet", "take_screw"]);
        assert_eq!(
            classes.to_lines(),
            "0: check_booklet\n1: browse_booklet\n2: take_screw\n"
        );
    }
}
